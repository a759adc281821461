use std::borrow::Cow;
use std::sync::Arc;

use apollo_compiler::validation::Valid;
use apollo_compiler::ExecutableDocument;
use bytes::Bytes;
use derivative::Derivative;
use serde::de::DeserializeOwned;
use serde::de::Error as _;
use serde::Deserialize;
use serde_json_bytes::Value;

use crate::context::Context;
use crate::events::LogFunction;
use crate::graphql::Error;
use crate::graphql::Response;
use crate::json_ext::Object;
use crate::validation::ValidationRule;

/// The query to run: raw source text or an already-parsed document.
#[derive(Clone, Debug)]
pub enum Query {
    /// GraphQL source text. The pipeline parses and validates it.
    Text(String),
    /// A pre-parsed document the caller asserts is trusted. Parsing and
    /// validation are skipped entirely, whatever the document contains;
    /// wrap with [`Valid::assume_valid`] to make that assertion explicit.
    Document(Arc<Valid<ExecutableDocument>>),
}

impl Query {
    /// The query as text. A document is rendered back to canonical form.
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            Query::Text(text) => Cow::Borrowed(text.as_str()),
            Query::Document(document) => Cow::Owned(document.to_string()),
        }
    }
}

impl From<String> for Query {
    fn from(text: String) -> Self {
        Query::Text(text)
    }
}

impl From<&str> for Query {
    fn from(text: &str) -> Self {
        Query::Text(text.to_string())
    }
}

impl From<Arc<Valid<ExecutableDocument>>> for Query {
    fn from(document: Arc<Valid<ExecutableDocument>>) -> Self {
        Query::Document(document)
    }
}

impl From<Valid<ExecutableDocument>> for Query {
    fn from(document: Valid<ExecutableDocument>) -> Self {
        Query::Document(Arc::new(document))
    }
}

/// Rewrites each formatted error before it is placed in a response.
pub type ErrorFormatter = Arc<dyn Fn(Error) -> Error + Send + Sync>;

/// Replaces the assembled response of a completed execution. Receives the
/// request so it can reach variables or context for side-channel data.
pub type ResponseFormatter = Arc<dyn Fn(Response, &Request) -> Response + Send + Sync>;

/// A graphql request: one query and everything needed to run it.
///
/// Never mutated by the pipeline; the runner's `format_params` hook is the
/// one sanctioned rewrite point, applied before anything else happens.
#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub struct Request {
    /// The graphql query.
    pub query: Query,

    /// The optional graphql operation to run, for documents holding several.
    pub operation_name: Option<String>,

    /// The optional variables in the form of a json object.
    pub variables: Arc<Object>,

    /// Optional seed value handed to root field resolvers.
    pub root_value: Option<Value>,

    /// Caller-supplied context threaded to every resolver.
    pub context: Context,

    /// Extra validation rules, run after the default set in this order.
    pub validation_rules: Vec<Arc<dyn ValidationRule>>,

    /// Lifecycle event sink. Absent means events go nowhere.
    #[derivative(Debug = "ignore")]
    pub log_function: Option<LogFunction>,

    /// Per-error rewrite applied at every point errors enter a response.
    #[derivative(Debug = "ignore")]
    pub format_error: Option<ErrorFormatter>,

    /// Whole-response replacement applied after a completed execution.
    #[derivative(Debug = "ignore")]
    pub format_response: Option<ResponseFormatter>,
}

#[buildstructor::buildstructor]
impl Request {
    /// Returns a builder for a [`Request`].
    ///
    /// `.query(...)` is required and accepts text or a trusted document;
    /// everything else defaults to empty/absent.
    #[builder(visibility = "pub")]
    #[allow(clippy::too_many_arguments)]
    fn new(
        query: Query,
        operation_name: Option<String>,
        variables: Option<Object>,
        root_value: Option<Value>,
        context: Option<Context>,
        validation_rules: Vec<Arc<dyn ValidationRule>>,
        log_function: Option<LogFunction>,
        format_error: Option<ErrorFormatter>,
        format_response: Option<ResponseFormatter>,
    ) -> Self {
        Self {
            query,
            operation_name,
            variables: Arc::new(variables.unwrap_or_default()),
            root_value,
            context: context.unwrap_or_default(),
            validation_rules,
            log_function,
            format_error,
            format_response,
        }
    }
}

impl Request {
    /// Decode a single JSON request body.
    ///
    /// `variables` may be an object, `null`, or a JSON-encoded string of
    /// either; strings are decoded here so nothing downstream ever sees
    /// encoded variables.
    pub fn from_bytes(b: Bytes) -> Result<Request, serde_json::Error> {
        let raw = serde_json::from_slice::<RawRequest>(&b)?;
        Ok(raw.into_request())
    }

    /// Decode a JSON array of request bodies, preserving order.
    pub fn batch_from_bytes(b: Bytes) -> Result<Vec<Request>, serde_json::Error> {
        let raw = serde_json::from_slice::<Vec<RawRequest>>(&b)?;
        Ok(raw.into_iter().map(RawRequest::into_request).collect())
    }

    /// Decode a GET-style query string (`query=...&variables=%7B...%7D`), as
    /// submitted by exploration pages. `variables` arrives as a JSON string.
    pub fn from_urlencoded_query(url_encoded_query: &str) -> Result<Request, serde_json::Error> {
        let urldecoded: serde_json::Value =
            serde_urlencoded::from_str(url_encoded_query).map_err(serde_json::Error::custom)?;

        let query = if let Some(serde_json::Value::String(query)) = urldecoded.get("query") {
            query.clone()
        } else {
            return Err(serde_json::Error::missing_field("query"));
        };
        let operation_name =
            if let Some(serde_json::Value::String(name)) = urldecoded.get("operationName") {
                Some(name.clone())
            } else {
                None
            };
        let variables: Object = get(&urldecoded, "variables")?.unwrap_or_default();

        Ok(Request::builder()
            .query(query)
            .and_operation_name(operation_name)
            .variables(variables)
            .build())
    }
}

fn get<T: DeserializeOwned>(
    object: &serde_json::Value,
    key: &str,
) -> Result<Option<T>, serde_json::Error> {
    if let Some(serde_json::Value::String(byte_string)) = object.get(key) {
        Some(serde_json::from_str(byte_string.as_str())).transpose()
    } else {
        Ok(None)
    }
}

/// The wire shape of one request body.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRequest {
    query: String,
    #[serde(default)]
    operation_name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_variables")]
    variables: Object,
}

impl RawRequest {
    fn into_request(self) -> Request {
        Request::builder()
            .query(self.query)
            .and_operation_name(self.operation_name)
            .variables(self.variables)
            .build()
    }
}

// NOTE: this deserialize helper turns `null` into Default::default() and
// decodes JSON-encoded string forms of the variables object.
fn deserialize_variables<'de, D>(deserializer: D) -> Result<Object, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match <Option<Value>>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(Object::default()),
        Some(Value::Object(object)) => Ok(object),
        Some(Value::String(encoded)) => {
            match serde_json::from_str::<Value>(encoded.as_str())
                .map_err(serde::de::Error::custom)?
            {
                Value::Null => Ok(Object::default()),
                Value::Object(object) => Ok(object),
                _ => Err(serde::de::Error::custom(
                    "`variables` must encode a JSON object",
                )),
            }
        }
        Some(_) => Err(serde::de::Error::custom(
            "`variables` must be a JSON object or an encoded string",
        )),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use serde_json_bytes::json as bjson;
    use test_log::test;

    use super::*;

    fn request_from_json(body: serde_json::Value) -> Request {
        Request::from_bytes(Bytes::from(body.to_string())).expect("body should decode")
    }

    #[test]
    fn test_request() {
        let request = request_from_json(json!({
            "query": "query aTest($arg1: String!) { test(who: $arg1) }",
            "operationName": "aTest",
            "variables": { "arg1": "me" },
        }));
        assert_eq!(
            request.query.as_text(),
            "query aTest($arg1: String!) { test(who: $arg1) }"
        );
        assert_eq!(request.operation_name.as_deref(), Some("aTest"));
        assert_eq!(
            *request.variables,
            bjson!({ "arg1": "me" }).as_object().unwrap().clone()
        );
    }

    #[test]
    fn test_no_variables() {
        let request = request_from_json(json!({
            "query": "{ testString }",
        }));
        assert!(request.variables.is_empty());
        assert!(request.operation_name.is_none());
    }

    #[test]
    // clients sometimes send { "variables": null } when running the
    // introspection query, and possibly other queries as well.
    fn test_variables_is_null() {
        let request = request_from_json(json!({
            "query": "{ testString }",
            "variables": null,
        }));
        assert!(request.variables.is_empty());
    }

    #[test]
    fn variables_may_arrive_as_a_json_string() {
        let request = request_from_json(json!({
            "query": "query aTest($arg1: String!) { test(who: $arg1) }",
            "variables": "{\"arg1\": \"me\"}",
        }));
        assert_eq!(
            *request.variables,
            bjson!({ "arg1": "me" }).as_object().unwrap().clone()
        );
    }

    #[test]
    fn malformed_variables_string_is_an_input_error() {
        let result = Request::from_bytes(Bytes::from(
            json!({
                "query": "{ testString }",
                "variables": "{ not json",
            })
            .to_string(),
        ));
        assert!(result.is_err());
    }

    #[test]
    fn missing_query_is_an_input_error() {
        let result = Request::from_bytes(Bytes::from(json!({ "variables": {} }).to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn batch_preserves_order() {
        let batch = Request::batch_from_bytes(Bytes::from(
            json!([
                { "query": "{ first }" },
                { "query": "{ second }" },
            ])
            .to_string(),
        ))
        .expect("batch should decode");
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].query.as_text(), "{ first }");
        assert_eq!(batch[1].query.as_text(), "{ second }");
    }

    #[test]
    fn from_urlencoded_query_works() {
        let query_string =
            "query=query+aTest%28%24arg1%3A+String%21%29+%7B+test%28who%3A+%24arg1%29+%7D\
             &operationName=aTest\
             &variables=%7B+%22arg1%22%3A+%22me%22+%7D";

        let request = Request::from_urlencoded_query(query_string).unwrap();
        assert_eq!(
            request.query.as_text(),
            "query aTest($arg1: String!) { test(who: $arg1) }"
        );
        assert_eq!(request.operation_name.as_deref(), Some("aTest"));
        assert_eq!(
            *request.variables,
            bjson!({ "arg1": "me" }).as_object().unwrap().clone()
        );
    }

    #[test]
    fn from_urlencoded_query_without_query_is_an_input_error() {
        assert!(Request::from_urlencoded_query("operationName=aTest").is_err());
    }
}
