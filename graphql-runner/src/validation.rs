//! Caller-supplied validation rules.
//!
//! The default rule set is apollo-compiler's full executable-document
//! validation. Extra rules registered on a request run after it, in
//! registration order, and their violations are appended after the default
//! set's. A rule inspects, never executes.

use std::collections::HashMap;
use std::fmt::Debug;

use apollo_compiler::executable::Fragment;
use apollo_compiler::executable::Selection;
use apollo_compiler::executable::SelectionSet;
use apollo_compiler::validation::Valid;
use apollo_compiler::ExecutableDocument;
use apollo_compiler::Node;
use apollo_compiler::Schema;

use crate::graphql;

/// A check over a document that reports violations without executing it.
pub trait ValidationRule: Send + Sync + Debug {
    /// Inspect `document` against `schema`; one wire error per violation,
    /// empty when the document passes.
    fn check(
        &self,
        schema: &Valid<Schema>,
        document: &ExecutableDocument,
    ) -> Vec<graphql::Error>;
}

/// Rejects operations whose field selections nest deeper than a limit.
///
/// Depth counts field nesting only; inline fragments and fragment spreads are
/// transparent. Fragment definitions are measured once and memoized, and a
/// fragment cycle contributes nothing here since the default rule set
/// rejects it anyway.
#[derive(Clone, Copy, Debug)]
pub struct MaxDepth {
    pub limit: u32,
}

impl MaxDepth {
    pub fn new(limit: u32) -> Self {
        Self { limit }
    }
}

impl ValidationRule for MaxDepth {
    fn check(
        &self,
        _schema: &Valid<Schema>,
        document: &ExecutableDocument,
    ) -> Vec<graphql::Error> {
        let mut fragment_cache = HashMap::new();
        let exceeded = document
            .operations
            .anonymous
            .iter()
            .chain(document.operations.named.values())
            .any(|operation| {
                depth(document, &mut fragment_cache, &operation.selection_set) > self.limit
            });
        if exceeded {
            vec![graphql::Error::builder()
                .message("Maximum depth limit exceeded in this operation")
                .extension_code("MAX_DEPTH_LIMIT")
                .build()]
        } else {
            Vec::new()
        }
    }
}

enum Computation<T> {
    InProgress,
    Done(T),
}

/// Recursively measure the nesting depth of the given selection set
fn depth<'doc>(
    document: &'doc ExecutableDocument,
    fragment_cache: &mut HashMap<&'doc str, Computation<u32>>,
    selection_set: &'doc SelectionSet,
) -> u32 {
    let mut max_depth = 0;
    for selection in &selection_set.selections {
        match selection {
            Selection::Field(field) => {
                let nested = depth(document, fragment_cache, &field.selection_set);
                max_depth = max_depth.max(1 + nested);
            }
            Selection::InlineFragment(fragment) => {
                let nested = depth(document, fragment_cache, &fragment.selection_set);
                max_depth = max_depth.max(nested);
            }
            Selection::FragmentSpread(spread) => {
                let name = spread.fragment_name.as_str();
                let nested;
                match fragment_cache.get(name) {
                    None => {
                        if let Some(definition) = fragment_definition(document, name) {
                            fragment_cache.insert(name, Computation::InProgress);
                            nested = depth(document, fragment_cache, &definition.selection_set);
                            fragment_cache.insert(name, Computation::Done(nested));
                        } else {
                            // Undefined fragment. The operation is invalid
                            // and the default rule set rejects it.
                            continue;
                        }
                    }
                    Some(Computation::InProgress) => {
                        // This fragment references itself (maybe indirectly).
                        // https://spec.graphql.org/October2021/#sec-Fragment-spreads-must-not-form-cycles
                        // The operation is invalid and the default rule set
                        // rejects it.
                        continue;
                    }
                    Some(Computation::Done(cached)) => nested = *cached,
                }
                max_depth = max_depth.max(nested);
            }
        }
    }
    max_depth
}

fn fragment_definition<'doc>(
    document: &'doc ExecutableDocument,
    name: &str,
) -> Option<&'doc Node<Fragment>> {
    document
        .fragments
        .iter()
        .find(|(fragment_name, _)| fragment_name.as_str() == name)
        .map(|(_, fragment)| fragment)
}
