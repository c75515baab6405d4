use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::types::{CollectionId, Turn};

const TITLE_LEN: usize = 50;
const UNTITLED: &str = "New conversation";

#[derive(Debug, thiserror::Error)]
pub enum ConversationError {
    #[error("Conversation '{0}' does not exist")]
    NotFound(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct Conversation {
    pub id: String,
    pub title: String,
    pub collection_id: CollectionId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    turns: Vec<Turn>,
}

impl Conversation {
    fn new() -> Self {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        Self {
            collection_id: format!("collection-{}", id),
            id,
            title: UNTITLED.to_string(),
            created_at: now,
            updated_at: now,
            turns: Vec::new(),
        }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn summary(&self) -> ConversationSummary {
        ConversationSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            collection_id: self.collection_id.clone(),
            turn_count: self.turns.len(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationSummary {
    pub id: String,
    pub title: String,
    pub collection_id: CollectionId,
    pub turn_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Ordered conversations with one current selection.
///
/// Turns can only be added through [`ConversationStore::append`], which always
/// targets the current conversation. Nothing hands out mutable access to a turn.
#[derive(Debug, Default)]
pub struct ConversationStore {
    conversations: Vec<Conversation>,
    current: Option<usize>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts an empty conversation bound to a fresh collection and selects it.
    pub fn create(&mut self) -> &Conversation {
        self.conversations.push(Conversation::new());
        let index = self.conversations.len() - 1;
        self.current = Some(index);
        let conversation = &self.conversations[index];
        tracing::info!(id = %conversation.id, "Created conversation");
        conversation
    }

    /// Selects a conversation and returns its history.
    pub fn switch(&mut self, id: &str) -> Result<&Conversation, ConversationError> {
        let index = self
            .position(id)
            .ok_or_else(|| ConversationError::NotFound(id.to_string()))?;
        self.current = Some(index);
        Ok(&self.conversations[index])
    }

    /// Appends to the current conversation, creating one if none is selected.
    pub fn append(&mut self, turn: Turn) -> &Conversation {
        let index = match self.current {
            Some(index) => index,
            None => {
                self.create();
                self.conversations.len() - 1
            }
        };
        let conversation = &mut self.conversations[index];
        if conversation.turns.is_empty() {
            conversation.title = title_from(&turn.query);
        }
        conversation.turns.push(turn);
        conversation.updated_at = Utc::now();
        conversation
    }

    /// Removes a conversation with all of its turns.
    pub fn delete(&mut self, id: &str) -> Result<Conversation, ConversationError> {
        let index = self
            .position(id)
            .ok_or_else(|| ConversationError::NotFound(id.to_string()))?;
        let removed = self.conversations.remove(index);
        self.current = match self.current {
            Some(current) if current == index => None,
            Some(current) if current > index => Some(current - 1),
            other => other,
        };
        tracing::info!(id, turns = removed.turns.len(), "Deleted conversation");
        Ok(removed)
    }

    pub fn current(&self) -> Option<&Conversation> {
        self.current.map(|index| &self.conversations[index])
    }

    pub fn get(&self, id: &str) -> Option<&Conversation> {
        self.position(id).map(|index| &self.conversations[index])
    }

    /// History of the current conversation.
    pub fn turns(&self) -> &[Turn] {
        self.current().map(Conversation::turns).unwrap_or_default()
    }

    /// Summaries, most recently updated first.
    pub fn list(&self) -> Vec<ConversationSummary> {
        let mut summaries: Vec<ConversationSummary> =
            self.conversations.iter().map(Conversation::summary).collect();
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        summaries
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.conversations.iter().position(|c| c.id == id)
    }
}

fn title_from(query: &str) -> String {
    let query = query.trim();
    if query.is_empty() {
        return UNTITLED.to_string();
    }
    if query.chars().count() <= TITLE_LEN {
        return query.to_string();
    }
    let mut title: String = query.chars().take(TITLE_LEN).collect();
    title.push_str("...");
    title
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PriorityOrder, SearchMode, SearchParams};

    fn turn(query: &str) -> Turn {
        Turn {
            query: query.to_string(),
            answer: format!("answer to {}", query),
            extracted_info: None,
            online_search_response: None,
            selected_mode: None,
            mode_reasoning: None,
            results: Vec::new(),
            search_params: SearchParams {
                top_k: 5,
                search_mode: SearchMode::FilesOnly,
                reasoning_mode: None,
                priority_order: PriorityOrder::FilesFirst,
                collection_id: "c".into(),
            },
        }
    }

    #[test]
    fn test_append_preserves_order() {
        let mut store = ConversationStore::new();
        store.create();
        for i in 0..5 {
            store.append(turn(&format!("q{}", i)));
        }
        let queries: Vec<&str> = store.turns().iter().map(|t| t.query.as_str()).collect();
        assert_eq!(queries, vec!["q0", "q1", "q2", "q3", "q4"]);
        assert_eq!(store.current().unwrap().title, "q0");
    }

    #[test]
    fn test_append_without_current_creates_conversation() {
        let mut store = ConversationStore::new();
        let conversation = store.append(turn("hello"));
        assert_eq!(conversation.turns().len(), 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_append_targets_current_only() {
        let mut store = ConversationStore::new();
        let a = store.create().id.clone();
        let b = store.create().id.clone();
        store.append(turn("to b"));
        store.switch(&a).unwrap();
        store.append(turn("to a"));

        assert_eq!(store.get(&a).unwrap().turns()[0].query, "to a");
        assert_eq!(store.get(&b).unwrap().turns()[0].query, "to b");
        assert_eq!(store.get(&a).unwrap().turns().len(), 1);
    }

    #[test]
    fn test_each_conversation_has_its_own_collection() {
        let mut store = ConversationStore::new();
        let a = store.create().collection_id.clone();
        let b = store.create().collection_id.clone();
        assert_ne!(a, b);
    }

    #[test]
    fn test_delete_current_clears_selection() {
        let mut store = ConversationStore::new();
        let a = store.create().id.clone();
        let b = store.create().id.clone();
        store.append(turn("x"));

        let removed = store.delete(&b).unwrap();
        assert_eq!(removed.turns().len(), 1);
        assert!(store.current().is_none());
        assert!(store.turns().is_empty());
        assert!(store.get(&a).is_some());
        assert!(matches!(
            store.switch(&b),
            Err(ConversationError::NotFound(_))
        ));
    }

    #[test]
    fn test_delete_before_current_keeps_selection() {
        let mut store = ConversationStore::new();
        let a = store.create().id.clone();
        let b = store.create().id.clone();
        store.delete(&a).unwrap();
        assert_eq!(store.current().unwrap().id, b);
    }

    #[test]
    fn test_long_query_title_is_truncated() {
        let title = title_from(&"x".repeat(80));
        assert_eq!(title.chars().count(), TITLE_LEN + 3);
        assert!(title.ends_with("..."));
    }
}
