use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::{
    types::{CollectionId, Document},
    upstream::{Upstream, UpstreamError},
};

/// Which documents a listing covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "collection_id", rename_all = "snake_case")]
pub enum Scope {
    Collection(CollectionId),
    /// Every collection. Only reachable through the explicit admin toggle.
    All,
}

impl Scope {
    fn collection_id(&self) -> Option<&str> {
        match self {
            Scope::Collection(id) => Some(id),
            Scope::All => None,
        }
    }
}

#[derive(Default)]
struct ViewState {
    scope: Option<Scope>,
    documents: Vec<Document>,
    refreshed_at: Option<DateTime<Utc>>,
}

/// Cached document list for the active collection.
///
/// The ingestion path and the deletion path both call [`DocumentView::refresh`]
/// instead of patching the cache, so the list always reflects the server.
#[derive(Clone)]
pub struct DocumentView {
    upstream: Arc<dyn Upstream>,
    state: Arc<RwLock<ViewState>>,
}

impl DocumentView {
    pub fn new(upstream: Arc<dyn Upstream>) -> Self {
        Self {
            upstream,
            state: Arc::new(RwLock::new(ViewState::default())),
        }
    }

    /// Lists documents straight from the service without touching the cache.
    pub async fn list(&self, scope: &Scope) -> Result<Vec<Document>, UpstreamError> {
        self.upstream.documents(scope.collection_id()).await
    }

    /// Points the view at another scope. The cache is emptied until the next refresh.
    pub fn set_scope(&self, scope: Option<Scope>) {
        let mut state = self.write();
        if state.scope != scope {
            state.scope = scope;
            state.documents.clear();
            state.refreshed_at = None;
        }
    }

    pub fn scope(&self) -> Option<Scope> {
        self.read().scope.clone()
    }

    /// Reloads the cache for the current scope.
    ///
    /// A response that arrives after the scope changed is dropped. Between
    /// refreshes of the same scope the last write wins.
    pub async fn refresh(&self) -> Result<Vec<Document>, UpstreamError> {
        let Some(scope) = self.scope() else {
            return Ok(Vec::new());
        };
        let documents = self.list(&scope).await?;

        let mut state = self.write();
        if state.scope.as_ref() == Some(&scope) {
            state.documents = documents.clone();
            state.refreshed_at = Some(Utc::now());
        } else {
            tracing::debug!(?scope, "Discarding document list for a stale scope");
        }
        Ok(documents)
    }

    pub async fn delete(&self, document_id: &str) -> Result<(), UpstreamError> {
        self.upstream.delete_document(document_id).await?;
        tracing::info!(document_id, "Deleted document");
        self.refresh().await?;
        Ok(())
    }

    pub fn documents(&self) -> Vec<Document> {
        self.read().documents.clone()
    }

    /// Documents whose processing produced no chunks.
    pub fn failed_documents(&self) -> Vec<Document> {
        self.read()
            .documents
            .iter()
            .filter(|doc| !doc.is_searchable())
            .cloned()
            .collect()
    }

    pub fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.read().refreshed_at
    }

    fn read(&self) -> RwLockReadGuard<'_, ViewState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, ViewState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
