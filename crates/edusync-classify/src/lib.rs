//! Group classification and container naming for edusync.
//!
//! Maps raw directory group identifiers to semantic roles through an
//! ordered, configurable rule schema, and derives display names and
//! parent category paths for the groups that become containers.
//!
//! Both halves are pure: classification and formatting have no I/O and no
//! state across calls, so the same inputs always produce the same outputs.
//! Classifications are derived per run and never persisted; changing the
//! active schema changes future runs without any data migration.

mod classifier;
mod error;
mod naming;
mod schema;

pub use classifier::{classify, GroupClassification};
pub use error::{SchemaError, SchemaResult};
pub use naming::{format_container, ContainerSpec, NamingOptions};
pub use schema::{
    ClassificationRule, CompiledSchema, GroupRole, NamingSchema, PatternKind, SchemaSelector,
};
