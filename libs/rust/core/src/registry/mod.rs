//! Bounty-backed model registry.
//!
//! Sponsors register models with an escrowed bounty, contributors submit
//! gradients against them, and the model owner evaluates each gradient at most once.

pub mod gradient;
pub mod model;
pub mod store;

pub use gradient::{EvalOutcome, Evaluation, Gradient};
pub use model::Model;
pub use store::{EvaluationPolicy, Registry, RegistryConfig};
