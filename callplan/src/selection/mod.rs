//! Contract relevance selection
//!
//! Narrows a large candidate set to a short list before call generation.
//! A model-driven answer is tried first; any failure falls back to the
//! keyword scorer.

pub mod cache;
pub mod model_gateway;
pub mod scorer;
pub mod selector;
pub mod simplify;

pub use cache::{CacheError, CandidateCache};
pub use model_gateway::{ContractSelectionModel, SharedSelectionModel};
pub use scorer::{score_candidates, ScoredCandidate};
pub use selector::{decide_strategy, ContractSelection, ContractSelector, SelectionStrategy};
pub use simplify::{simplify, SimplifiedContract};
