//! The request pipeline: parse, validate, execute, strictly in that order.
//!
//! Stages short-circuit. A request that fails to parse is never validated,
//! a request that fails validation is never executed, and a pre-parsed
//! document skips straight to execution. Whatever happens inside,
//! [`QueryRunner::execute`] resolves to a [`Response`].

use std::sync::Arc;

use apollo_compiler::validation::Valid;
use apollo_compiler::validation::WithErrors;
use apollo_compiler::ExecutableDocument;
use apollo_compiler::Schema;
use derivative::Derivative;
use futures::future::join_all;
use tracing::info_span;
use tracing::Instrument;

use crate::error::ExecutionError;
use crate::error::ParseErrors;
use crate::error::ValidationErrors;
use crate::events::emit;
use crate::events::LifecycleEvent;
use crate::events::LogFunction;
use crate::executor::ExecutionRequest;
use crate::executor::QueryExecutor;
use crate::graphql;
use crate::graphql::IntoGraphQLErrors;
use crate::graphql::Query;
use crate::graphql::Request;
use crate::graphql::Response;

/// Rewrites a request before the pipeline looks at it.
///
/// This is the place to swap a stored-operation name for its document,
/// seed the context, or pin hooks the caller may not override.
pub type FormatParams = Arc<dyn Fn(Request) -> Request + Send + Sync>;

/// Runs GraphQL requests against one schema and one executor.
#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub struct QueryRunner {
    schema: Arc<Valid<Schema>>,
    executor: Arc<dyn QueryExecutor>,
    #[derivative(Debug = "ignore")]
    format_params: Option<FormatParams>,
}

#[buildstructor::buildstructor]
impl QueryRunner {
    /// Returns a builder for a [`QueryRunner`].
    ///
    /// `.schema(...)` and `.executor(...)` are required;
    /// `.format_params(...)` is optional.
    #[builder(visibility = "pub")]
    fn new(
        schema: Arc<Valid<Schema>>,
        executor: Arc<dyn QueryExecutor>,
        format_params: Option<FormatParams>,
    ) -> Self {
        Self {
            schema,
            executor,
            format_params,
        }
    }
}

impl QueryRunner {
    /// The schema every request is parsed and validated against.
    pub fn schema(&self) -> &Arc<Valid<Schema>> {
        &self.schema
    }

    /// Run one request through the pipeline.
    ///
    /// Never returns an error: every failure mode becomes GraphQL errors in
    /// the response, with an extension code naming the failing stage.
    /// Lifecycle events fire around each stage that actually runs, and
    /// `request.end` fires on every path out of this function.
    #[tracing::instrument(level = "debug", skip_all)]
    pub async fn execute(&self, request: Request) -> Response {
        let request = match &self.format_params {
            Some(format_params) => format_params(request),
            None => request,
        };
        let log = request.log_function.clone();

        emit(&log, LifecycleEvent::RequestStart);
        emit(&log, LifecycleEvent::RequestQuery(&request.query.as_text()));
        emit(&log, LifecycleEvent::RequestVariables(&request.variables));
        emit(
            &log,
            LifecycleEvent::RequestOperationName(request.operation_name.as_deref()),
        );

        let response = match self.run_stages(&request, &log).await {
            Ok(response) => {
                let response = Response {
                    errors: format_errors(&request, response.errors),
                    ..response
                };
                match &request.format_response {
                    Some(format_response) => tracing::debug_span!("format_response")
                        .in_scope(|| format_response(response, &request)),
                    None => response,
                }
            }
            Err(errors) => Response::from_errors(format_errors(&request, errors)),
        };

        emit(&log, LifecycleEvent::RequestEnd);
        response
    }

    /// Run a batch of requests concurrently.
    ///
    /// Resolves to exactly one response per request, in request order.
    /// Requests are independent: a failing stage in one never touches its
    /// neighbors.
    #[tracing::instrument(level = "debug", skip_all)]
    pub async fn execute_batch(&self, requests: Vec<Request>) -> Vec<Response> {
        join_all(requests.into_iter().map(|request| self.execute(request))).await
    }

    async fn run_stages(
        &self,
        request: &Request,
        log: &Option<LogFunction>,
    ) -> Result<Response, Vec<graphql::Error>> {
        let document = match &request.query {
            Query::Document(document) => Arc::clone(document),
            Query::Text(text) => {
                let parsed = self.parse(text.clone(), log).await?;
                self.validate(parsed, request, log).await?
            }
        };
        self.run_execution(document, request, log).await
    }

    /// Syntax-check the query text off the async runtime.
    async fn parse(
        &self,
        text: String,
        log: &Option<LogFunction>,
    ) -> Result<ExecutableDocument, Vec<graphql::Error>> {
        let schema = Arc::clone(&self.schema);
        emit(log, LifecycleEvent::ParseStart);
        let parsed = tokio::task::spawn_blocking(move || {
            ExecutableDocument::parse(&schema, text, "query.graphql")
        })
        .instrument(info_span!("query_parsing"))
        .await;
        emit(log, LifecycleEvent::ParseEnd);
        match parsed {
            Ok(Ok(document)) => Ok(document),
            Ok(Err(errors)) => Err(graphql_errors(ParseErrors::from(errors))),
            Err(join_error) => Err(vec![ExecutionError::from(join_error).to_graphql_error()]),
        }
    }

    /// Validate the document against the schema, then run any extra rules.
    ///
    /// Extra-rule violations are appended after the default diagnostics, so
    /// clients always see compiler errors first.
    async fn validate(
        &self,
        document: ExecutableDocument,
        request: &Request,
        log: &Option<LogFunction>,
    ) -> Result<Arc<Valid<ExecutableDocument>>, Vec<graphql::Error>> {
        let schema = Arc::clone(&self.schema);
        let rules = request.validation_rules.clone();
        emit(log, LifecycleEvent::ValidationStart);
        let validated = tokio::task::spawn_blocking(move || match document.validate(&schema) {
            Ok(document) => {
                let violations: Vec<graphql::Error> = rules
                    .iter()
                    .flat_map(|rule| rule.check(&schema, &document))
                    .collect();
                if violations.is_empty() {
                    Ok(document)
                } else {
                    Err(violations)
                }
            }
            Err(WithErrors { partial, errors }) => {
                let mut violations = graphql_errors(ValidationErrors::from(errors));
                violations.extend(rules.iter().flat_map(|rule| rule.check(&schema, &partial)));
                Err(violations)
            }
        })
        .instrument(info_span!("query_validation"))
        .await;
        emit(log, LifecycleEvent::ValidationEnd);
        match validated {
            Ok(Ok(document)) => Ok(Arc::new(document)),
            Ok(Err(errors)) => Err(errors),
            Err(join_error) => Err(vec![ExecutionError::from(join_error).to_graphql_error()]),
        }
    }

    /// Hand the validated document to the executor.
    ///
    /// The call runs in its own task so that a panicking executor surfaces
    /// as an INTERNAL_ERROR response instead of unwinding into the caller.
    async fn run_execution(
        &self,
        document: Arc<Valid<ExecutableDocument>>,
        request: &Request,
        log: &Option<LogFunction>,
    ) -> Result<Response, Vec<graphql::Error>> {
        let execution_request = ExecutionRequest::builder()
            .schema(Arc::clone(&self.schema))
            .document(document)
            .and_operation_name(request.operation_name.clone())
            .variables(Arc::clone(&request.variables))
            .and_root_value(request.root_value.clone())
            .context(request.context.clone())
            .build();

        emit(log, LifecycleEvent::ExecutionStart);
        let executor = Arc::clone(&self.executor);
        let executed = tokio::spawn(async move { executor.execute(execution_request).await })
            .instrument(info_span!("execution"))
            .await;
        emit(log, LifecycleEvent::ExecutionEnd);

        match executed {
            Ok(Ok(execution_response)) => Ok(Response::builder()
                .and_data(execution_response.data)
                .errors(execution_response.errors)
                .build()),
            Ok(Err(reason)) => Err(vec![ExecutionError::ExecutionFailed {
                reason: reason.to_string(),
            }
            .to_graphql_error()]),
            Err(join_error) => Err(vec![ExecutionError::from(join_error).to_graphql_error()]),
        }
    }
}

fn format_errors(request: &Request, errors: Vec<graphql::Error>) -> Vec<graphql::Error> {
    match &request.format_error {
        Some(format_error) => errors.into_iter().map(|error| format_error(error)).collect(),
        None => errors,
    }
}

fn graphql_errors<T>(errors: T) -> Vec<graphql::Error>
where
    T: IntoGraphQLErrors + std::fmt::Display,
{
    match errors.into_graphql_errors() {
        Ok(errors) => errors,
        Err(errors) => vec![graphql::Error::builder()
            .message(errors.to_string())
            .extension_code("INTERNAL_ERROR")
            .build()],
    }
}
