//! One user's session: conversations, the document view bound to the current
//! conversation, background ingestion, and the query draft.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::{
    collection::{DocumentView, Scope},
    conversation::{ConversationError, ConversationStore, ConversationSummary},
    orchestrator::{Orchestrator, SearchError, SearchOptions},
    tracker::{JobSlot, JobTracker, TrackerPolicy, TransitionError},
    types::{CollectionId, Document, FileId, Turn, UploadFile},
    upstream::{Upstream, UpstreamError},
};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Search(#[from] SearchError),

    #[error(transparent)]
    Conversation(#[from] ConversationError),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error(transparent)]
    Job(#[from] TransitionError),

    #[error("The conversation changed while the query was running")]
    ConversationChanged,

    #[error("No files to upload")]
    NothingToUpload,
}

/// Result of selecting another conversation.
#[derive(Debug, Clone, Serialize)]
pub struct Switched {
    pub conversation: ConversationSummary,
    pub turns: Vec<Turn>,
    pub documents: Vec<Document>,
    /// Set when the document list could not be reloaded. The switch itself still
    /// happened.
    pub refresh_error: Option<String>,
}

pub struct Session {
    view: DocumentView,
    tracker: JobTracker,
    orchestrator: Orchestrator,
    conversations: Mutex<ConversationStore>,
    draft: Mutex<String>,
    default_options: SearchOptions,
}

impl Session {
    pub fn new(upstream: Arc<dyn Upstream>, policy: TrackerPolicy) -> Self {
        let view = DocumentView::new(upstream.clone());
        let tracker = JobTracker::new(upstream.clone(), view.clone(), policy);
        Self {
            view,
            tracker,
            orchestrator: Orchestrator::new(upstream),
            conversations: Mutex::new(ConversationStore::new()),
            draft: Mutex::new(String::new()),
            default_options: SearchOptions::default(),
        }
    }

    pub fn with_default_options(mut self, options: SearchOptions) -> Self {
        self.default_options = options;
        self
    }

    pub fn default_options(&self) -> &SearchOptions {
        &self.default_options
    }

    // Conversations

    pub fn conversations(&self) -> Vec<ConversationSummary> {
        self.store().list()
    }

    pub fn current_conversation(&self) -> Option<ConversationSummary> {
        self.store().current().map(|c| c.summary())
    }

    pub fn history(&self) -> Vec<Turn> {
        self.store().turns().to_vec()
    }

    /// Starts a fresh conversation. History and draft are reset; documents of
    /// other collections are left alone.
    pub async fn new_conversation(&self) -> Switched {
        let (conversation, collection_id) = {
            let mut store = self.store();
            let conversation = store.create();
            (conversation.summary(), conversation.collection_id.clone())
        };
        self.draft().clear();
        self.rescope(conversation, Vec::new(), collection_id).await
    }

    /// Selects a conversation, reloads its history and rescopes the document view.
    ///
    /// Polling for jobs that have not settled is cancelled, since their progress
    /// slots belong to the previous conversation.
    pub async fn switch_conversation(&self, id: &str) -> Result<Switched, SessionError> {
        let (conversation, turns, collection_id) = {
            let mut store = self.store();
            let conversation = store.switch(id)?;
            (
                conversation.summary(),
                conversation.turns().to_vec(),
                conversation.collection_id.clone(),
            )
        };
        Ok(self.rescope(conversation, turns, collection_id).await)
    }

    pub fn delete_conversation(&self, id: &str) -> Result<ConversationSummary, SessionError> {
        let (removed, was_current) = {
            let mut store = self.store();
            let was_current = store.current().is_some_and(|c| c.id == id);
            (store.delete(id)?, was_current)
        };
        if was_current {
            self.tracker.cancel_pending();
            self.view.set_scope(None);
            self.draft().clear();
        }
        Ok(removed.summary())
    }

    async fn rescope(
        &self,
        conversation: ConversationSummary,
        turns: Vec<Turn>,
        collection_id: CollectionId,
    ) -> Switched {
        self.tracker.cancel_pending();
        self.view.set_scope(Some(Scope::Collection(collection_id)));
        let (documents, refresh_error) = match self.view.refresh().await {
            Ok(documents) => (documents, None),
            Err(err) => {
                tracing::warn!(conversation = %conversation.id, "Failed to refresh documents: {}", err);
                (Vec::new(), Some(err.to_string()))
            }
        };
        Switched {
            conversation,
            turns,
            documents,
            refresh_error,
        }
    }

    /// Collection of the current conversation, creating the conversation on first use.
    fn ensure_collection(&self) -> (String, CollectionId) {
        let mut store = self.store();
        if let Some(current) = store.current() {
            return (current.id.clone(), current.collection_id.clone());
        }
        let conversation = store.create();
        let ids = (conversation.id.clone(), conversation.collection_id.clone());
        drop(store);
        self.view.set_scope(Some(Scope::Collection(ids.1.clone())));
        ids
    }

    // Queries

    pub fn draft_text(&self) -> String {
        self.draft().clone()
    }

    pub fn set_draft(&self, text: &str) {
        *self.draft() = text.to_string();
    }

    /// Runs a query against the current conversation and records the turn.
    ///
    /// `None` submits the current draft. On failure nothing is recorded and the
    /// draft keeps the query so it can be retried.
    pub async fn ask(
        &self,
        query: Option<&str>,
        options: Option<&SearchOptions>,
    ) -> Result<Turn, SessionError> {
        let query = match query {
            Some(query) => {
                self.set_draft(query);
                query.to_string()
            }
            None => self.draft_text(),
        };
        let options = options.unwrap_or(&self.default_options);
        let (conversation_id, collection_id) = self.ensure_collection();
        let history = self.history();

        let turn = self
            .orchestrator
            .search(&query, options, &history, &collection_id)
            .await
            .map_err(|err| {
                tracing::warn!(conversation = %conversation_id, "Query failed: {}", err);
                err
            })?;

        {
            let mut store = self.store();
            if store.current().map(|c| c.id.as_str()) != Some(conversation_id.as_str()) {
                tracing::warn!(
                    conversation = %conversation_id,
                    "Dropping answer for a conversation that is no longer current"
                );
                return Err(SessionError::ConversationChanged);
            }
            store.append(turn.clone());
        }
        self.draft().clear();
        Ok(turn)
    }

    // Documents

    pub fn documents(&self) -> Vec<Document> {
        self.view.documents()
    }

    pub fn failed_documents(&self) -> Vec<Document> {
        self.view.failed_documents()
    }

    pub fn documents_refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.view.refreshed_at()
    }

    pub fn document_scope(&self) -> Option<Scope> {
        self.view.scope()
    }

    pub async fn refresh_documents(&self) -> Result<Vec<Document>, SessionError> {
        Ok(self.view.refresh().await?)
    }

    pub async fn delete_document(&self, document_id: &str) -> Result<(), SessionError> {
        Ok(self.view.delete(document_id).await?)
    }

    /// Admin toggle between the current collection and every collection.
    pub async fn show_all_documents(&self, all: bool) -> Result<Vec<Document>, SessionError> {
        let scope = if all {
            Some(Scope::All)
        } else {
            self.store()
                .current()
                .map(|c| Scope::Collection(c.collection_id.clone()))
        };
        self.view.set_scope(scope);
        self.refresh_documents().await
    }

    // Ingestion

    pub fn upload(&self, files: Vec<UploadFile>) -> Result<Vec<FileId>, SessionError> {
        if files.is_empty() {
            return Err(SessionError::NothingToUpload);
        }
        let (_, collection_id) = self.ensure_collection();
        Ok(self.tracker.upload_batch(files, &collection_id))
    }

    pub fn jobs(&self) -> Vec<JobSlot> {
        self.tracker.slots()
    }

    pub fn job(&self, file_id: &FileId) -> Option<JobSlot> {
        self.tracker.slot(file_id)
    }

    pub fn dismiss_job(&self, file_id: &FileId) -> bool {
        self.tracker.dismiss(file_id)
    }

    pub fn recheck_job(&self, file_id: FileId) -> Result<(), SessionError> {
        Ok(self.tracker.recheck(file_id)?)
    }

    pub fn active_timers(&self) -> usize {
        self.tracker.active_timers()
    }

    /// Cancels every timer and drops all progress slots.
    pub fn teardown(&self) {
        self.tracker.shutdown();
    }

    fn store(&self) -> MutexGuard<'_, ConversationStore> {
        self.conversations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn draft(&self) -> MutexGuard<'_, String> {
        self.draft.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
