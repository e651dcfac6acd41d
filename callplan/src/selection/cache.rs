//! Candidate contract cache.
//!
//! Candidates come either from a fixed list or from a directory of
//! enhanced-ABI JSON files. Directory contents are read lazily on first use and
//! stay fixed until [`CandidateCache::reload`] is called.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use shared_types::{CandidateContract, FunctionMetadata, FunctionParameter};
use tokio::sync::RwLock;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("failed to read candidate directory {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug)]
enum CandidateSource {
    Static(Arc<[CandidateContract]>),
    Directory(PathBuf),
}

#[derive(Debug)]
pub struct CandidateCache {
    source: CandidateSource,
    loaded: RwLock<Option<Arc<[CandidateContract]>>>,
}

impl CandidateCache {
    pub fn from_candidates(candidates: Vec<CandidateContract>) -> Self {
        Self {
            source: CandidateSource::Static(candidates.into()),
            loaded: RwLock::new(None),
        }
    }

    pub fn from_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            source: CandidateSource::Directory(dir.into()),
            loaded: RwLock::new(None),
        }
    }

    /// Current candidate set, loading it on first access.
    pub async fn candidates(&self) -> Result<Arc<[CandidateContract]>, CacheError> {
        if let Some(loaded) = self.loaded.read().await.as_ref() {
            return Ok(Arc::clone(loaded));
        }

        let mut slot = self.loaded.write().await;
        // Another task may have filled the slot while we waited for the lock.
        if let Some(loaded) = slot.as_ref() {
            return Ok(Arc::clone(loaded));
        }
        let fresh = self.load().await?;
        *slot = Some(Arc::clone(&fresh));
        Ok(fresh)
    }

    /// Drop the cached set and read the source again. Returns the new count.
    pub async fn reload(&self) -> Result<usize, CacheError> {
        let mut slot = self.loaded.write().await;
        *slot = None;
        let fresh = self.load().await?;
        let count = fresh.len();
        *slot = Some(fresh);
        tracing::info!(count, "Reloaded candidate contracts");
        Ok(count)
    }

    async fn load(&self) -> Result<Arc<[CandidateContract]>, CacheError> {
        match &self.source {
            CandidateSource::Static(candidates) => Ok(Arc::clone(candidates)),
            CandidateSource::Directory(dir) => {
                let candidates = load_candidate_dir(dir).await?;
                tracing::info!(
                    dir = %dir.display(),
                    count = candidates.len(),
                    "Loaded enhanced ABIs"
                );
                Ok(candidates.into())
            }
        }
    }
}

async fn load_candidate_dir(dir: &Path) -> Result<Vec<CandidateContract>, CacheError> {
    let io_err = |source| CacheError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut entries = tokio::fs::read_dir(dir).await.map_err(io_err)?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) == Some("json") {
            files.push(path);
        }
    }
    files.sort();

    // A later file replaces an earlier one with the same address.
    let mut by_address: Vec<CandidateContract> = Vec::new();
    for path in files {
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read enhanced ABI");
                continue;
            }
        };
        let value: Value = match serde_json::from_str(&content) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to parse enhanced ABI");
                continue;
            }
        };
        let Some(candidate) = candidate_from_enhanced_abi(&value) else {
            tracing::warn!(path = %path.display(), "Skipping enhanced ABI without contract_address");
            continue;
        };
        match by_address.iter_mut().find(|c| c.address == candidate.address) {
            Some(existing) => *existing = candidate,
            None => by_address.push(candidate),
        }
    }
    Ok(by_address)
}

/// Build a candidate from an enhanced-ABI document
/// `{contract_id, contract_address, enhanced_abi}`.
pub fn candidate_from_enhanced_abi(doc: &Value) -> Option<CandidateContract> {
    let address = doc
        .get("contract_address")
        .and_then(Value::as_str)
        .filter(|a| !a.trim().is_empty())?;
    let identifier = doc
        .get("contract_id")
        .and_then(Value::as_str)
        .unwrap_or_default();

    let abi = doc.get("enhanced_abi").unwrap_or(doc);
    // A `functions` table lists functions only; a flat document mixes them
    // with metadata and each entry must look like a function.
    let (table, flat) = match abi.get("functions").and_then(Value::as_object) {
        Some(table) => (Some(table), false),
        None => (abi.as_object(), true),
    };

    let mut functions = BTreeMap::new();
    for (name, entry) in table.into_iter().flatten() {
        let keep = if flat {
            is_function_entry(entry)
        } else {
            entry.is_object()
        };
        if keep {
            functions.insert(name.clone(), function_metadata(entry));
        }
    }

    Some(CandidateContract {
        address: address.to_string(),
        identifier: identifier.to_string(),
        functions,
    })
}

fn is_function_entry(entry: &Value) -> bool {
    entry.as_object().is_some_and(|obj| {
        ["stateMutability", "inputs", "parameters", "name"]
            .iter()
            .any(|key| obj.contains_key(*key))
    })
}

fn function_metadata(entry: &Value) -> FunctionMetadata {
    let description = entry
        .get("description")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let parameters = entry
        .get("parameters")
        .or_else(|| entry.get("inputs"))
        .and_then(|raw| serde_json::from_value::<Vec<FunctionParameter>>(raw.clone()).ok())
        .unwrap_or_default();
    let state_mutability = entry
        .get("stateMutability")
        .and_then(Value::as_str)
        .map(str::to_string);

    FunctionMetadata {
        description,
        parameters,
        state_mutability,
    }
}
