//! JSON aliases and the error `path` representation.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde_json_bytes::ByteString;
use serde_json_bytes::Map;
pub use serde_json_bytes::Value;

/// A JSON object.
pub type Object = Map<ByteString, Value>;

/// One segment of a [`Path`] into a response tree.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathElement {
    /// The index of an element in a list.
    Index(usize),
    /// The key of a field in an object.
    Key(String),
}

/// A path into the `data` tree of a response, as attached to field errors.
///
/// Serializes to the GraphQL wire form: an array mixing field names and list
/// indices, for example `["users", 0, "name"]`.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Path(pub Vec<PathElement>);

impl Path {
    pub fn empty() -> Path {
        Path(Vec::new())
    }

    pub fn from_response_slice(s: &[&str]) -> Self {
        Self(
            s.iter()
                .map(|x| PathElement::Key(x.to_string()))
                .collect(),
        )
    }

    pub fn iter(&self) -> impl Iterator<Item = &PathElement> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn push(&mut self, element: PathElement) {
        self.0.push(element)
    }
}

impl<T> From<T> for Path
where
    T: AsRef<str>,
{
    fn from(s: T) -> Self {
        Self(
            s.as_ref()
                .split('/')
                .filter(|x| !x.is_empty())
                .map(|x| {
                    if let Ok(index) = x.parse::<usize>() {
                        PathElement::Index(index)
                    } else {
                        PathElement::Key(x.to_string())
                    }
                })
                .collect(),
        )
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for element in self.iter() {
            write!(f, "/")?;
            match element {
                PathElement::Index(index) => write!(f, "{index}")?,
                PathElement::Key(key) => write!(f, "{key}")?,
            }
        }
        Ok(())
    }
}
