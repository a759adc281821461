//! Runner errors.
//!
//! Every type here is an internal, typed form that converts to the wire
//! [`struct@Error`] before a client ever sees it.

use apollo_compiler::validation::DiagnosticList;
use apollo_compiler::validation::WithErrors;
use displaydoc::Display;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinError;

use crate::graphql::Error;
use crate::graphql::ErrorExtension;
use crate::graphql::IntoGraphQLErrors;
use crate::graphql::Location as ErrorLocation;

/// Collection of syntax errors from parsing a query or operation document.
#[derive(Debug)]
pub struct ParseErrors {
    pub errors: DiagnosticList,
}

impl std::fmt::Display for ParseErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut errors = self.errors.iter();
        for (i, error) in errors.by_ref().take(5).enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{}", error)?;
        }
        let remaining = errors.count();
        if remaining > 0 {
            write!(f, "\n...and {remaining} other errors")?;
        }
        Ok(())
    }
}

impl<T> From<WithErrors<T>> for ParseErrors {
    fn from(WithErrors { errors, .. }: WithErrors<T>) -> Self {
        Self { errors }
    }
}

impl IntoGraphQLErrors for ParseErrors {
    fn into_graphql_errors(self) -> Result<Vec<Error>, Self> {
        Ok(self
            .errors
            .iter()
            .map(|diagnostic| {
                Error::builder()
                    .message(diagnostic.error.to_string())
                    .locations(
                        diagnostic
                            .line_column_range()
                            .map(|location| {
                                vec![ErrorLocation {
                                    line: location.start.line as u32,
                                    column: location.start.column as u32,
                                }]
                            })
                            .unwrap_or_default(),
                    )
                    .extension_code("GRAPHQL_PARSING_FAILED")
                    .build()
            })
            .collect())
    }
}

/// Collection of validation errors for a query or operation document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationErrors {
    pub errors: Vec<apollo_compiler::response::GraphQLError>,
}

impl IntoGraphQLErrors for ValidationErrors {
    fn into_graphql_errors(self) -> Result<Vec<Error>, Self> {
        Ok(self
            .errors
            .iter()
            .map(|diagnostic| {
                Error::builder()
                    .message(diagnostic.message.to_string())
                    .locations(
                        diagnostic
                            .locations
                            .iter()
                            .map(|loc| ErrorLocation {
                                line: loc.line as u32,
                                column: loc.column as u32,
                            })
                            .collect(),
                    )
                    .extension_code("GRAPHQL_VALIDATION_FAILED")
                    .build()
            })
            .collect())
    }
}

impl From<DiagnosticList> for ValidationErrors {
    fn from(errors: DiagnosticList) -> Self {
        Self {
            errors: errors.iter().map(|e| e.unstable_to_json_compat()).collect(),
        }
    }
}

impl<T> From<WithErrors<T>> for ValidationErrors {
    fn from(WithErrors { errors, .. }: WithErrors<T>) -> Self {
        errors.into()
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (index, error) in self.errors.iter().enumerate() {
            if index > 0 {
                f.write_str("\n")?;
            }
            if let Some(location) = error.locations.first() {
                write!(
                    f,
                    "[{}:{}] {}",
                    location.line, location.column, error.message
                )?;
            } else {
                write!(f, "{}", error.message)?;
            }
        }
        Ok(())
    }
}

/// Failures raised by the execution call itself, as opposed to resolver-level
/// errors, which the executor returns inside its response.
///
/// Note that these are not actually returned to the client, but are instead
/// converted to JSON for [`struct@Error`].
#[derive(Error, Display, Debug, Clone, Serialize)]
#[serde(untagged)]
#[non_exhaustive]
pub enum ExecutionError {
    /// execution failed: {reason}
    ExecutionFailed {
        /// The failure reason.
        reason: String,
    },

    /// request handling panicked: {reason}
    Panicked {
        /// What the panic said, when it said anything.
        reason: String,
    },
}

impl ExecutionError {
    /// Convert the execution error to a GraphQL error.
    pub(crate) fn to_graphql_error(&self) -> Error {
        let extensions = serde_json_bytes::to_value(self)
            .ok()
            .and_then(|value| value.as_object().cloned())
            .unwrap_or_default();
        Error::builder()
            .message(self.to_string())
            .extension_code(self.extension_code())
            .extensions(extensions)
            .build()
    }
}

impl ErrorExtension for ExecutionError {
    fn extension_code(&self) -> String {
        match self {
            ExecutionError::ExecutionFailed { .. } => "EXECUTION_FAILED",
            ExecutionError::Panicked { .. } => "INTERNAL_ERROR",
        }
        .to_string()
    }
}

impl From<JoinError> for ExecutionError {
    fn from(err: JoinError) -> Self {
        ExecutionError::Panicked {
            reason: err.to_string(),
        }
    }
}

/// Errors raised by [`OperationStore::put`](crate::OperationStore::put).
///
/// These are synchronous pre-checks on stored operations; nothing here ever
/// reaches a request-serving path.
#[derive(Error, Display, Debug)]
#[non_exhaustive]
pub enum StoreError {
    /// operation parse error: {0}
    Parse(ParseErrors),

    /// operation document must contain exactly one definition
    MalformedOperation,

    /// operation document must contain an operation definition
    NotAnOperation,

    /// stored operations must be named
    UnnamedOperation,

    /// operation validation failed: {0}
    ValidationFailed(ValidationErrors),
}

impl ErrorExtension for StoreError {
    fn extension_code(&self) -> String {
        match self {
            StoreError::Parse(_) => "GRAPHQL_PARSING_FAILED",
            StoreError::MalformedOperation => "MALFORMED_OPERATION",
            StoreError::NotAnOperation => "NOT_AN_OPERATION",
            StoreError::UnnamedOperation => "UNNAMED_OPERATION",
            StoreError::ValidationFailed(_) => "GRAPHQL_VALIDATION_FAILED",
        }
        .to_string()
    }
}

impl IntoGraphQLErrors for StoreError {
    fn into_graphql_errors(self) -> Result<Vec<Error>, Self> {
        match self {
            StoreError::Parse(errors) => errors
                .into_graphql_errors()
                .map_err(StoreError::Parse),
            StoreError::ValidationFailed(errors) => errors
                .into_graphql_errors()
                .map_err(StoreError::ValidationFailed),
            other => {
                let code = other.extension_code();
                Ok(vec![Error::builder()
                    .message(other.to_string())
                    .extension_code(code)
                    .build()])
            }
        }
    }
}
