//! Types related to GraphQL requests, responses, etc.

mod request;
mod response;

use std::fmt;

use heck::ToShoutySnakeCase;
pub use request::ErrorFormatter;
pub use request::Query;
pub use request::Request;
pub use request::ResponseFormatter;
pub use response::Response;
use serde::Deserialize;
use serde::Serialize;
use serde_json_bytes::ByteString;
use serde_json_bytes::Map as JsonMap;
use serde_json_bytes::Value;

use crate::json_ext::Object;
use crate::json_ext::Path;

/// The error location
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    /// The line number
    pub line: u32,
    /// The column number
    pub column: u32,
}

/// A [GraphQL error](https://spec.graphql.org/October2021/#sec-Errors)
/// as may be found in the `errors` field of a GraphQL [`Response`].
///
/// Converted to (or from) JSON with serde.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
#[non_exhaustive]
pub struct Error {
    /// The error message.
    pub message: String,

    /// The locations of the error in the GraphQL document of the originating request.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<Location>,

    /// If this is a field error, the JSON path to that field in [`Response::data`]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<Path>,

    /// The optional GraphQL extensions for this error.
    #[serde(skip_serializing_if = "Object::is_empty")]
    pub extensions: Object,
}

#[buildstructor::buildstructor]
impl Error {
    /// Returns a builder that builds a GraphQL [`Error`] from its components.
    ///
    /// Builder methods:
    ///
    /// * `.message(impl Into<String>)`, required, sets [`Error::message`]
    /// * `.locations(Vec<Location>)` / repeated `.location(Location)`, optional
    /// * `.path(impl Into<Path>)`, optional
    /// * `.extension_code(impl Into<String>)`, optional, sets `"code"` in the
    ///   extension map unless the map already has one
    /// * `.extensions(map)` / repeated `.extension(key, value)`, optional
    /// * `.build()`
    #[builder(visibility = "pub")]
    fn new(
        message: String,
        locations: Vec<Location>,
        path: Option<Path>,
        extension_code: Option<String>,
        // Skip the `Object` type alias in order to use buildstructor's map special-casing
        mut extensions: JsonMap<ByteString, Value>,
    ) -> Self {
        if let Some(code) = extension_code {
            extensions
                .entry("code")
                .or_insert(Value::String(ByteString::from(code)));
        }
        Self {
            message,
            locations,
            path,
            extensions,
        }
    }

    /// Extract the error code from [`Error::extensions`] as a String if it is set.
    pub fn extension_code(&self) -> Option<String> {
        self.extensions.get("code").and_then(|c| match c {
            Value::String(s) => Some(s.as_str().to_owned()),
            Value::Number(n) => Some(n.to_string()),
            Value::Null | Value::Array(_) | Value::Object(_) | Value::Bool(_) => None,
        })
    }
}

/// Displays (only) the error message.
impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.message.fmt(f)
    }
}

/// Trait used to convert expected errors into a list of GraphQL errors
pub trait IntoGraphQLErrors
where
    Self: Sized,
{
    fn into_graphql_errors(self) -> Result<Vec<Error>, Self>;
}

/// Trait used to get extension type from an error
pub trait ErrorExtension
where
    Self: Sized,
{
    fn extension_code(&self) -> String {
        std::any::type_name::<Self>().to_shouty_snake_case()
    }

    fn custom_extension_details(&self) -> Option<Object> {
        None
    }
}

#[cfg(test)]
mod tests {
    use serde_json_bytes::json;

    use super::*;

    #[test]
    fn error_builder_sets_code_in_extensions() {
        let error = Error::builder()
            .message("forbidden")
            .extension_code("ACCESS_DENIED")
            .build();
        assert_eq!(error.extension_code().as_deref(), Some("ACCESS_DENIED"));
        assert_eq!(error.to_string(), "forbidden");
    }

    #[test]
    fn error_builder_does_not_clobber_existing_code() {
        let error = Error::builder()
            .message("nope")
            .extension("code", json!("FIRST"))
            .extension_code("SECOND")
            .build();
        assert_eq!(error.extension_code().as_deref(), Some("FIRST"));
    }

    #[test]
    fn error_serializes_to_wire_shape() {
        let error = Error::builder()
            .message("it broke")
            .location(Location { line: 2, column: 7 })
            .path(Path::from("topField"))
            .build();
        let value = serde_json_bytes::to_value(&error).unwrap();
        assert_eq!(
            value,
            json!({
                "message": "it broke",
                "locations": [{"line": 2, "column": 7}],
                "path": ["topField"],
            })
        );
    }
}
