//! callplan: natural-language intent → contract-call agent and its
//! evaluation harness.
//!
//! - `selection`: narrows candidate contracts (model first, heuristic fallback)
//! - `agent`: two-stage query pipeline over external model collaborators
//! - `eval`: tolerant comparison of produced calls against ground truth
//! - `runner`: timed, retried, optionally parallel evaluation runs
//! - `config`: layered runner configuration

pub mod agent;
pub mod config;
pub mod eval;
pub mod protocol;
pub mod runner;
pub mod selection;

pub use protocol::AgentError;
