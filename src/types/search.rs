use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use super::CollectionId;

/// Retrieval strategy selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    #[default]
    FilesOnly,
    OnlineOnly,
    Both,
    Auto,
    SequentialAnalysis,
}

impl SearchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchMode::FilesOnly => "files_only",
            SearchMode::OnlineOnly => "online_only",
            SearchMode::Both => "both",
            SearchMode::Auto => "auto",
            SearchMode::SequentialAnalysis => "sequential_analysis",
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown search mode '{0}'")]
pub struct UnknownSearchMode(pub String);

impl FromStr for SearchMode {
    type Err = UnknownSearchMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "files_only" => Ok(SearchMode::FilesOnly),
            "online_only" => Ok(SearchMode::OnlineOnly),
            "both" => Ok(SearchMode::Both),
            "auto" => Ok(SearchMode::Auto),
            "sequential_analysis" => Ok(SearchMode::SequentialAnalysis),
            other => Err(UnknownSearchMode(other.to_string())),
        }
    }
}

/// Model tier serving the query. Passed through to the search service untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReasoningMode(pub String);

impl Default for ReasoningMode {
    fn default() -> Self {
        Self("non_reasoning".to_string())
    }
}

/// Which source is primary context when both are queried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PriorityOrder {
    OnlineFirst,
    #[default]
    FilesFirst,
}

/// Parameters a turn was produced with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchParams {
    pub top_k: u32,
    pub search_mode: SearchMode,
    pub reasoning_mode: Option<ReasoningMode>,
    pub priority_order: PriorityOrder,
    pub collection_id: CollectionId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ResultMetadata {
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub file_type: String,
    #[serde(default)]
    pub page: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub content: String,
    pub score: f32,
    #[serde(default)]
    pub metadata: ResultMetadata,
    #[serde(default)]
    pub retrieval_method: String,
}

/// One query/answer exchange. Immutable once appended to a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub query: String,
    pub answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_info: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub online_search_response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode_reasoning: Option<String>,
    #[serde(default)]
    pub results: Vec<SearchResult>,
    pub search_params: SearchParams,
}

/// Body of `POST search`.
#[derive(Debug, Serialize)]
pub struct SearchRequest<'a> {
    pub query: &'a str,
    pub top_k: u32,
    pub search_mode: SearchMode,
    pub reasoning_mode: Option<&'a ReasoningMode>,
    pub priority_order: PriorityOrder,
    pub conversation_history: &'a [Turn],
    pub collection_id: &'a str,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResponse {
    pub success: bool,
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub extracted_info: Option<String>,
    #[serde(default)]
    pub online_search_response: Option<String>,
    #[serde(default)]
    pub selected_mode: Option<String>,
    #[serde(default)]
    pub mode_reasoning: Option<String>,
    #[serde(default)]
    pub results: Vec<SearchResult>,
    #[serde(default, alias = "error")]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_mode_from_str() {
        assert_eq!("auto".parse::<SearchMode>().unwrap(), SearchMode::Auto);
        assert_eq!(
            " Sequential_Analysis ".parse::<SearchMode>().unwrap(),
            SearchMode::SequentialAnalysis
        );
        assert!("hybrid".parse::<SearchMode>().is_err());
    }
}
