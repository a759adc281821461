//! Registry of named, pre-validated operations bound to one schema.
//!
//! Clients that only ever run a fixed set of operations can register them
//! here once and submit names instead of full documents. Everything in the
//! store has already passed schema validation, so a runner configured to
//! serve stored operations can skip parsing and validation per request.

use std::collections::HashMap;
use std::sync::Arc;

use apollo_compiler::ast;
use apollo_compiler::validation::Valid;
use apollo_compiler::ExecutableDocument;
use apollo_compiler::Schema;
use dashmap::DashMap;

use crate::error::StoreError;

/// A shareable map of operation name to validated document.
///
/// Cloning is cheap and clones observe the same entries. Reads never block
/// each other; writes lock only the entry they touch.
#[derive(Clone, Debug)]
pub struct OperationStore {
    schema: Arc<Valid<Schema>>,
    entries: Arc<DashMap<String, Arc<Valid<ExecutableDocument>>>>,
}

impl OperationStore {
    /// Create an empty store. Every operation put later is validated
    /// against this schema.
    pub fn new(schema: Arc<Valid<Schema>>) -> Self {
        Self {
            schema,
            entries: Default::default(),
        }
    }

    /// The schema this store validates against.
    pub fn schema(&self) -> &Arc<Valid<Schema>> {
        &self.schema
    }

    /// Validate `body` and register it under its operation name, which is
    /// returned. An existing entry under the same name is replaced.
    ///
    /// The body must be a single named operation definition that validates
    /// against the store's schema; anything else is rejected before the
    /// entries are touched.
    pub fn put(&self, body: &str) -> Result<String, StoreError> {
        let ast = ast::Document::parse(body, "operation.graphql")
            .map_err(|errors| StoreError::Parse(errors.into()))?;

        if ast.definitions.len() != 1 {
            return Err(StoreError::MalformedOperation);
        }
        let operation = match ast.definitions.first() {
            Some(ast::Definition::OperationDefinition(operation)) => operation,
            _ => return Err(StoreError::NotAnOperation),
        };
        let name = operation
            .name
            .as_ref()
            .ok_or(StoreError::UnnamedOperation)?
            .as_str()
            .to_string();

        // The body is known to be syntactically clean here, so any
        // diagnostics from this pass are validation failures.
        let document =
            ExecutableDocument::parse_and_validate(&self.schema, body, "operation.graphql")
                .map_err(|errors| StoreError::ValidationFailed(errors.into()))?;

        self.entries.insert(name.clone(), Arc::new(document));
        Ok(name)
    }

    /// Look up a stored operation.
    pub fn get(&self, operation_name: &str) -> Option<Arc<Valid<ExecutableDocument>>> {
        self.entries
            .get(operation_name)
            .map(|entry| entry.value().clone())
    }

    /// Remove a stored operation. Returns whether an entry was present.
    pub fn delete(&self, operation_name: &str) -> bool {
        self.entries.remove(operation_name).is_some()
    }

    /// Snapshot of every stored operation by name.
    pub fn get_map(&self) -> HashMap<String, Arc<Valid<ExecutableDocument>>> {
        self.entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }
}
