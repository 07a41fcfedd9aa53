//! Fix generation and application.
//!
//! - [`snapshot`]: bounded listing of project source files
//! - [`generator`]: prompts the model for a fix plan
//! - [`plan`]: parses and validates the model's plan
//! - [`paths`]: keeps fix targets inside the project root
//! - [`applicator`]: executes a plan and reports per-item outcomes

pub mod applicator;
pub mod generator;
pub mod paths;
pub mod plan;
pub mod snapshot;

pub use crate::config::ApplyPolicy;
pub use applicator::{ApplyReport, FixApplicator, ItemOutcome, ItemStatus, ItemTarget};
pub use generator::FixGenerator;
pub use paths::{resolve_project_path, ProjectPath};
pub use plan::{FileFix, FixAction, FixPlan};
pub use snapshot::ProjectSnapshot;
