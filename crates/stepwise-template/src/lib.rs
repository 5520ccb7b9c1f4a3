//! Stepwise Template
//!
//! Data-flow between steps. Each executed step records its result in an
//! [`ExecutionContext`]; later steps reference those results with
//! placeholders:
//!
//! ```text
//! "/posts?userId={{ steps.user.id }}"
//! "{{ steps.search.results.0.title }}"
//! "{{ steps.greeting }}"
//! ```
//!
//! Resolution is infallible. A placeholder naming a step that has not run, or
//! a path that does not exist, is replaced with an empty string.

mod context;
mod path;
mod resolver;

pub use context::ExecutionContext;
pub use path::lookup_path;
pub use resolver::{display_string, resolve_str, resolve_value, step_references};
