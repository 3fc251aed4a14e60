//! # patchloop-core
//!
//! The task-to-change pipeline: repository mapping, context selection, edit
//! generation and application, task validation, and the three flows
//! ([`Orchestrator`], [`FixLoop`], [`ReviewRunner`]).
//!
//! The hosting platform and the local working tree are reached only through
//! the [`TaskStore`] and [`ChangeRequestStore`] ports.

mod apply;
mod budget;
mod config;
mod context;
mod error;
mod fix_loop;
mod generator;
mod locks;
mod model;
mod orchestrator;
mod outcome;
mod pipeline;
pub mod ports;
mod prompts;
pub mod repo_map;
mod review;
mod symbols;
mod validate;

pub use apply::{ApplyError, ApplyReport, EditApplier};
pub use budget::{BudgetStatus, IterationBudget};
pub use config::{ContextStrategy, PipelineConfig};
pub use context::{naive_scan, parse_selection, ContextGatherer, ContextSelector, ContextSource, GatheredContext};
pub use error::PipelineError;
pub use fix_loop::FixLoop;
pub use generator::{parse_response, ChangeGenerator};
pub use locks::ChangeLocks;
pub use model::{ChangeRequest, FileEdit, Task};
pub use orchestrator::{branch_name, Orchestrator};
pub use outcome::RunOutcome;
pub use pipeline::PipelineContext;
pub use ports::{ChangeRequestStore, StoreError, TaskStore};
pub use prompts::ChangePrompts;
pub use repo_map::{generate_map, MapError, RepoMap, RepoMapEntry, PARSE_ERROR_MARKER};
pub use review::ReviewRunner;
pub use symbols::{extract_symbols, FileSymbols, Language};
pub use validate::{TaskValidator, Validation, ACTION_KEYWORDS};
