//! Stepwise Config
//!
//! This crate contains the serializable step types for stepwise. A step
//! describes one HTTP action plus the data-flow metadata the orchestrator uses
//! to wire it to other steps.
//!
//! Step lists arrive from an upstream collaborator either as an ordered array
//! or as an object keyed by step name:
//!
//! ```json
//! [
//!   { "id": "user", "endpoint": "https://api.example.com", "url_ext": "/users/1" },
//!   { "id": "posts", "endpoint": "https://api.example.com",
//!     "url_ext": "/posts?userId={{ steps.user.id }}", "outputAs": "data.posts" }
//! ]
//! ```
//!
//! [`normalize_steps`] validates that input once and turns it into an ordered
//! list of [`StepDescriptor`]s, each carrying a unique id.

mod collect;
mod error;
mod normalize;
mod step;

pub use collect::CollectPolicy;
pub use error::ConfigError;
pub use normalize::normalize_steps;
pub use step::StepDescriptor;
