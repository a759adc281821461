use serde::Deserialize;
use serde::Serialize;
use serde_json_bytes::ByteString;
use serde_json_bytes::Map as JsonMap;
use serde_json_bytes::Value;

use crate::graphql::Error;
use crate::json_ext::Object;

/// A GraphQL response.
///
/// `data` is `None` when execution never started (a parse or validation
/// failure, or an execution-call fault), and the key is then omitted from the
/// serialized form. `Some(Value::Null)` is different: execution ran and
/// null-propagation erased the tree, serialized as `"data": null`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    /// The response data.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub data: Option<Value>,

    /// The optional graphql errors encountered.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub errors: Vec<Error>,

    /// The optional graphql extensions.
    #[serde(skip_serializing_if = "Object::is_empty", default)]
    pub extensions: Object,
}

#[buildstructor::buildstructor]
impl Response {
    /// Returns a builder that builds a GraphQL [`Response`] from its components.
    ///
    /// Builder methods:
    ///
    /// * `.data(impl Into<Value>)`, optional
    /// * `.errors(Vec<Error>)` / repeated `.error(Error)`, optional
    /// * `.extensions(map)` / repeated `.extension(key, value)`, optional
    /// * `.build()`
    #[builder(visibility = "pub")]
    fn new(
        data: Option<Value>,
        errors: Vec<Error>,
        // Skip the `Object` type alias in order to use buildstructor's map special-casing
        extensions: JsonMap<ByteString, Value>,
    ) -> Self {
        Self {
            data,
            errors,
            extensions,
        }
    }

    /// A response carrying only errors, with the `data` key absent.
    pub fn from_errors(errors: Vec<Error>) -> Self {
        Self {
            data: None,
            errors,
            extensions: Object::default(),
        }
    }

    /// `true` when the response carries errors and no data at all, the shape
    /// transport adapters map to a client-error status.
    pub fn is_errors_only(&self) -> bool {
        self.data.is_none() && !self.errors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use serde_json_bytes::json;

    use super::*;

    #[test]
    fn data_key_is_omitted_when_execution_never_started() {
        let response = Response::from_errors(vec![Error::builder()
            .message("Must provide query string.")
            .build()]);
        assert_eq!(
            serde_json::to_string(&response).unwrap(),
            r#"{"errors":[{"message":"Must provide query string."}]}"#
        );
        assert!(response.is_errors_only());
    }

    #[test]
    fn null_data_is_serialized_when_execution_ran() {
        let response = Response::builder().data(Value::Null).build();
        assert_eq!(serde_json::to_string(&response).unwrap(), r#"{"data":null}"#);
        assert!(!response.is_errors_only());
    }

    #[test]
    fn round_trips_data_and_errors() {
        let response = Response::builder()
            .data(json!({"testString": "it works"}))
            .error(
                Error::builder()
                    .message("once upon a resolver")
                    .path("testString")
                    .build(),
            )
            .build();
        let serialized = serde_json::to_string(&response).unwrap();
        let deserialized: Response = serde_json::from_str(&serialized).unwrap();
        assert_eq!(deserialized, response);
    }
}
