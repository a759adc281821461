//! Test fixtures for the runner: a small schema and an executor with canned
//! resolvers that follow reference GraphQL execution semantics closely
//! enough for pipeline tests, including operation selection and required
//! variable checks.

use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use apollo_compiler::ast;
use apollo_compiler::executable::Field;
use apollo_compiler::executable::Operation;
use apollo_compiler::executable::Selection;
use apollo_compiler::validation::Valid;
use apollo_compiler::Node;
use apollo_compiler::Schema;
use async_trait::async_trait;
use graphql_runner::graphql;
use graphql_runner::BoxError;
use graphql_runner::ExecutionRequest;
use graphql_runner::ExecutionResponse;
use graphql_runner::Object;
use graphql_runner::Path;
use graphql_runner::QueryExecutor;
use serde_json_bytes::json;
use serde_json_bytes::Value;

/// The schema every mock test runs against.
pub const TEST_SCHEMA: &str = r#"
type Query {
  testString: String
  testRootValue: String
  testContextValue: String
  testArgumentValue(base: Int!): Int
  testAwaitedValue: String
  testError: String
}
"#;

pub fn test_schema() -> Arc<Valid<Schema>> {
    Arc::new(
        Schema::parse_and_validate(TEST_SCHEMA, "schema.graphql").expect("test schema is valid"),
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Resolve,
    FailCall,
    Panic,
}

/// An executor that resolves the fields of [`TEST_SCHEMA`] with fixed
/// values, counts its calls, and can be switched to fail or panic instead.
#[derive(Debug)]
pub struct MockExecutor {
    calls: AtomicUsize,
    mode: Mode,
    awaited_delay: Duration,
}

impl Default for MockExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl MockExecutor {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            mode: Mode::Resolve,
            awaited_delay: Duration::from_millis(20),
        }
    }

    /// An executor whose `execute` call itself fails.
    pub fn failing() -> Self {
        Self {
            mode: Mode::FailCall,
            ..Self::new()
        }
    }

    /// An executor that panics when called.
    pub fn panicking() -> Self {
        Self {
            mode: Mode::Panic,
            ..Self::new()
        }
    }

    /// How long `testAwaitedValue` waits before resolving.
    pub fn with_awaited_delay(mut self, delay: Duration) -> Self {
        self.awaited_delay = delay;
        self
    }

    /// How many times `execute` has been called.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn resolve_field(
        &self,
        field: &Field,
        request: &ExecutionRequest,
    ) -> Result<Value, String> {
        match field.name.as_str() {
            "testString" => Ok(json!("it works")),
            "testRootValue" => Ok(match &request.root_value {
                Some(Value::String(root)) => json!(format!("{} works", root.as_str())),
                _ => Value::Null,
            }),
            "testContextValue" => {
                let context_value: Option<String> =
                    request.context.get("testContext").unwrap_or_default();
                Ok(match context_value {
                    Some(value) => json!(format!("{value} works")),
                    None => Value::Null,
                })
            }
            "testArgumentValue" => {
                let base = int_argument(field, "base", &request.variables)?;
                Ok(json!(base + 5))
            }
            "testAwaitedValue" => {
                tokio::time::sleep(self.awaited_delay).await;
                Ok(json!("it works"))
            }
            "testError" => Err("Secret error message".to_string()),
            other => Err(format!("Cannot query field \"{other}\".")),
        }
    }
}

#[async_trait]
impl QueryExecutor for MockExecutor {
    async fn execute(&self, request: ExecutionRequest) -> Result<ExecutionResponse, BoxError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.mode {
            Mode::FailCall => return Err("forced execution failure".into()),
            Mode::Panic => panic!("executor panicked on purpose"),
            Mode::Resolve => {}
        }

        let operation = match select_operation(&request) {
            Ok(operation) => operation,
            Err(message) => return Ok(request_error(message)),
        };
        if let Err(message) = check_required_variables(operation, &request) {
            return Ok(request_error(message));
        }

        let mut data = Object::default();
        let mut errors = Vec::new();
        for selection in &operation.selection_set.selections {
            if let Selection::Field(field) = selection {
                let key = field.alias.as_ref().unwrap_or(&field.name).as_str();
                match self.resolve_field(field, &request).await {
                    Ok(value) => {
                        data.insert(key, value);
                    }
                    Err(message) => {
                        data.insert(key, Value::Null);
                        errors.push(
                            graphql::Error::builder()
                                .message(message)
                                .path(Path::from(key))
                                .build(),
                        );
                    }
                }
            }
        }
        Ok(ExecutionResponse::builder()
            .data(Value::Object(data))
            .errors(errors)
            .build())
    }
}

/// Pick the operation to run the way reference executors do, including
/// their exact error messages.
fn select_operation(request: &ExecutionRequest) -> Result<&Node<Operation>, String> {
    let operations = &request.document.operations;
    match request.operation_name.as_deref() {
        Some(name) => operations
            .named
            .iter()
            .find(|(operation_name, _)| operation_name.as_str() == name)
            .map(|(_, operation)| operation)
            .ok_or_else(|| format!("Unknown operation named \"{name}\".")),
        None => {
            let mut all = operations.anonymous.iter().chain(operations.named.values());
            match (all.next(), all.next()) {
                (Some(operation), None) => Ok(operation),
                (None, _) => Err("Must provide an operation.".to_string()),
                _ => Err(
                    "Must provide operation name if query contains multiple operations."
                        .to_string(),
                ),
            }
        }
    }
}

fn check_required_variables(
    operation: &Operation,
    request: &ExecutionRequest,
) -> Result<(), String> {
    for variable in &operation.variables {
        let required = matches!(
            *variable.ty,
            ast::Type::NonNullNamed(_) | ast::Type::NonNullList(_)
        ) && variable.default_value.is_none();
        if required && !request.variables.contains_key(variable.name.as_str()) {
            return Err(format!(
                "Variable \"${}\" of required type \"{}\" was not provided.",
                variable.name, variable.ty
            ));
        }
    }
    Ok(())
}

fn int_argument(field: &Field, name: &str, variables: &Object) -> Result<i64, String> {
    let argument = field
        .arguments
        .iter()
        .find(|argument| argument.name.as_str() == name)
        .ok_or_else(|| format!("Field argument \"{name}\" was not provided."))?;
    match &*argument.value {
        ast::Value::Int(value) => value
            .try_to_i32()
            .map(i64::from)
            .map_err(|_| "Int cannot represent non 32-bit signed integer value.".to_string()),
        ast::Value::Variable(variable) => match variables.get(variable.as_str()) {
            Some(value) => value
                .as_i64()
                .ok_or_else(|| format!("Variable \"${variable}\" got invalid value.")),
            None => Err(format!("Variable \"${variable}\" was not provided.")),
        },
        _ => Err(format!("Argument \"{name}\" has an unexpected value.")),
    }
}

/// A failure before any field resolution started: errors only, no data key.
fn request_error(message: String) -> ExecutionResponse {
    ExecutionResponse::builder()
        .error(graphql::Error::builder().message(message).build())
        .build()
}
