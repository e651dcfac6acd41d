//! Model-driven contract selection seam.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::protocol::AgentError;
use crate::selection::simplify::SimplifiedContract;

pub type SharedSelectionModel = Arc<dyn ContractSelectionModel>;

/// Language-model call that shortlists contracts for a query.
///
/// Returns the raw JSON response; shape validation happens in the selector so
/// every malformed answer takes the same fallback path.
#[async_trait]
pub trait ContractSelectionModel: Send + Sync {
    async fn select_contracts(
        &self,
        query: &str,
        candidates: &BTreeMap<String, SimplifiedContract>,
        max_contracts: usize,
    ) -> Result<serde_json::Value, AgentError>;
}
