//! The execution seam.
//!
//! Parsing and validation are supplied by apollo-compiler; running the
//! validated document against resolvers is not. Implement [`QueryExecutor`]
//! over whatever resolver machinery the application has and hand it to the
//! runner. The runner owns staging, events, and formatting; the executor owns
//! field resolution.

use std::fmt::Debug;
use std::sync::Arc;

use apollo_compiler::validation::Valid;
use apollo_compiler::ExecutableDocument;
use apollo_compiler::Schema;
use async_trait::async_trait;
use serde_json_bytes::Value;

use crate::context::Context;
use crate::graphql;
use crate::json_ext::Object;
use crate::BoxError;

/// Everything an executor needs to run one operation.
///
/// All fields are owned or reference-counted so the execution call can be
/// spawned onto the runtime, which is how a panicking resolver is kept from
/// tearing the pipeline down.
#[derive(Clone, Debug)]
pub struct ExecutionRequest {
    /// The schema the document was validated against (or trusted against).
    pub schema: Arc<Valid<Schema>>,
    /// The document to execute.
    pub document: Arc<Valid<ExecutableDocument>>,
    /// Which operation in the document to run.
    pub operation_name: Option<String>,
    /// Coerced-input candidates for the operation's variables.
    pub variables: Arc<Object>,
    /// Seed value for root field resolvers.
    pub root_value: Option<Value>,
    /// The caller's request context, threaded to every resolver.
    pub context: Context,
}

#[buildstructor::buildstructor]
impl ExecutionRequest {
    #[builder(visibility = "pub")]
    fn new(
        schema: Arc<Valid<Schema>>,
        document: Arc<Valid<ExecutableDocument>>,
        operation_name: Option<String>,
        variables: Option<Arc<Object>>,
        root_value: Option<Value>,
        context: Option<Context>,
    ) -> Self {
        Self {
            schema,
            document,
            operation_name,
            variables: variables.unwrap_or_default(),
            root_value,
            context: context.unwrap_or_default(),
        }
    }
}

/// What an executor produced for one operation.
///
/// `data` and `errors` are merged into the pipeline's response as-is:
/// field errors ride alongside (possibly partial) data. A failure of the
/// execution call itself is the `Err` arm of [`QueryExecutor::execute`],
/// not an [`ExecutionResponse`].
#[derive(Clone, Debug, Default)]
pub struct ExecutionResponse {
    /// The result tree, or `None` when the request failed before any field
    /// resolved (for example an unknown operation name).
    pub data: Option<Value>,
    /// Resolver-level errors.
    pub errors: Vec<graphql::Error>,
}

#[buildstructor::buildstructor]
impl ExecutionResponse {
    #[builder(visibility = "pub")]
    fn new(data: Option<Value>, errors: Vec<graphql::Error>) -> Self {
        Self { data, errors }
    }
}

/// An executor is responsible for turning a validated document into a result
/// tree by invoking resolvers.
///
/// The goal of this trait is to hide the implementation details of field
/// resolution. Resolvers may suspend; the runner waits for the returned
/// future to resolve fully before formatting anything.
#[async_trait]
pub trait QueryExecutor: Send + Sync + Debug {
    /// Run one operation to completion.
    ///
    /// Resolver-level failures belong inside the [`ExecutionResponse`];
    /// `Err` is reserved for faults of the execution call itself and becomes
    /// a single formatted error with no data.
    #[must_use = "execution results must be turned into a response"]
    async fn execute(&self, request: ExecutionRequest) -> Result<ExecutionResponse, BoxError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use static_assertions::*;

    assert_obj_safe!(QueryExecutor);
}
