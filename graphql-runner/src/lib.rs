//! Runs GraphQL requests through parse, validation and execution against a
//! fixed schema, and keeps a registry of pre-validated named operations for
//! clients that only ever run a known set of queries.

#![warn(unreachable_pub)]

mod context;
mod error;
mod events;
mod executor;
pub mod graphql;
mod json_ext;
mod runner;
mod store;
mod validation;

pub use context::*;
pub use error::*;
pub use events::*;
pub use executor::*;
pub use json_ext::*;
pub use runner::*;
pub use store::*;
pub use validation::*;

/// Errors suited to crossing task and trait boundaries: boxed, sendable,
/// and displayable.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
