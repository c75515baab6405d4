//! Query-time retrieval orchestration.
//!
//! The orchestrator works out which sources a mode touches, and in what order.
//! It sends one request to the search service with the full conversation
//! history and turns the response into a [`Turn`]. It never re-sorts results
//! and never second-guesses the mode the service picked in `auto`.

use serde::Serialize;
use std::sync::Arc;
use tokio::time::Instant;

use crate::{
    types::{
        PriorityOrder, ReasoningMode, SearchMode, SearchParams, SearchRequest, SearchResponse,
        Turn,
    },
    upstream::{Upstream, UpstreamError},
};

pub const MAX_TOP_K: u32 = 50;

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Query is empty")]
    EmptyQuery,

    #[error("top_k must be between 1 and 50, got {0}")]
    InvalidTopK(u32),

    #[error("Search request failed: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("Search failed: {0}")]
    Rejected(String),

    #[error("Malformed search response: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, serde::Deserialize)]
pub struct SearchOptions {
    pub top_k: u32,
    pub mode: SearchMode,
    #[serde(default)]
    pub reasoning_mode: ReasoningMode,
    #[serde(default)]
    pub priority_order: PriorityOrder,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            top_k: 5,
            mode: SearchMode::default(),
            reasoning_mode: ReasoningMode::default(),
            priority_order: PriorityOrder::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Files,
    Online,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum Stage {
    Retrieve { source: Source },
    /// Both sources dispatched at once. `primary` only shapes the final prompt.
    RetrieveConcurrently { primary: Source, secondary: Source },
    /// The service inspects the query and picks a mode.
    Delegate,
    /// Pull facts out of the collection.
    Extract,
    /// Search the web with the extraction as context.
    CompareOnline,
    Synthesize,
}

/// Ordered stages a mode runs through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetrievalPlan {
    pub mode: SearchMode,
    pub stages: Vec<Stage>,
}

impl RetrievalPlan {
    pub fn for_mode(mode: SearchMode, priority: PriorityOrder) -> Self {
        let stages = match mode {
            SearchMode::FilesOnly => vec![Stage::Retrieve {
                source: Source::Files,
            }],
            SearchMode::OnlineOnly => vec![
                Stage::Retrieve {
                    source: Source::Online,
                },
                Stage::Synthesize,
            ],
            SearchMode::Both => {
                let (primary, secondary) = match priority {
                    PriorityOrder::FilesFirst => (Source::Files, Source::Online),
                    PriorityOrder::OnlineFirst => (Source::Online, Source::Files),
                };
                vec![
                    Stage::RetrieveConcurrently { primary, secondary },
                    Stage::Synthesize,
                ]
            }
            SearchMode::Auto => vec![Stage::Delegate],
            SearchMode::SequentialAnalysis => {
                vec![Stage::Extract, Stage::CompareOnline, Stage::Synthesize]
            }
        };
        Self { mode, stages }
    }

    /// The model tier matters only when a generative step runs.
    pub fn uses_reasoning(&self) -> bool {
        self.mode != SearchMode::FilesOnly
    }

    pub fn is_sequential(&self) -> bool {
        self.stages.contains(&Stage::Extract)
    }

    pub fn touches(&self, source: Source) -> bool {
        self.stages.iter().any(|stage| match stage {
            Stage::Retrieve { source: s } => *s == source,
            Stage::RetrieveConcurrently { .. } | Stage::Delegate => true,
            Stage::Extract => source == Source::Files,
            Stage::CompareOnline => source == Source::Online,
            Stage::Synthesize => false,
        })
    }
}

#[derive(Clone)]
pub struct Orchestrator {
    upstream: Arc<dyn Upstream>,
}

impl Orchestrator {
    pub fn new(upstream: Arc<dyn Upstream>) -> Self {
        Self { upstream }
    }

    /// Runs one query against the collection. Nothing is recorded here; the
    /// caller appends the returned turn.
    pub async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
        history: &[Turn],
        collection_id: &str,
    ) -> Result<Turn, SearchError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(SearchError::EmptyQuery);
        }
        if options.top_k == 0 || options.top_k > MAX_TOP_K {
            return Err(SearchError::InvalidTopK(options.top_k));
        }

        let plan = RetrievalPlan::for_mode(options.mode, options.priority_order);
        let reasoning_mode = plan.uses_reasoning().then_some(&options.reasoning_mode);
        let request = SearchRequest {
            query,
            top_k: options.top_k,
            search_mode: options.mode,
            reasoning_mode,
            priority_order: options.priority_order,
            conversation_history: history,
            collection_id,
        };

        tracing::info!(
            mode = %options.mode,
            top_k = options.top_k,
            history = history.len(),
            collection_id,
            "Searching '{}'",
            query
        );
        let instant = Instant::now();
        let resp = self.upstream.search(&request).await?;
        tracing::info!("Search completed, elapsed {:?}", instant.elapsed());

        let params = SearchParams {
            top_k: options.top_k,
            search_mode: options.mode,
            reasoning_mode: reasoning_mode.cloned(),
            priority_order: options.priority_order,
            collection_id: collection_id.to_string(),
        };
        assemble(query, &plan, resp, params)
    }
}

/// Builds a turn from the fields the plan produces.
pub fn assemble(
    query: &str,
    plan: &RetrievalPlan,
    resp: SearchResponse,
    search_params: SearchParams,
) -> Result<Turn, SearchError> {
    if !resp.success {
        return Err(SearchError::Rejected(
            resp.message
                .unwrap_or_else(|| "Search service reported a failure".to_string()),
        ));
    }

    let (selected_mode, mode_reasoning) = if plan.mode == SearchMode::Auto {
        let selected = non_empty(resp.selected_mode).ok_or_else(|| {
            SearchError::Malformed("auto mode response has no selected_mode".to_string())
        })?;
        let reasoning = non_empty(resp.mode_reasoning).ok_or_else(|| {
            SearchError::Malformed("auto mode response has no mode_reasoning".to_string())
        })?;
        (Some(selected), Some(reasoning))
    } else {
        (None, None)
    };

    // In auto mode the chosen mode decides which fields are meaningful. A mode
    // name we do not recognise keeps everything.
    let effective = match selected_mode.as_deref().map(str::parse::<SearchMode>) {
        Some(Ok(mode)) if mode != SearchMode::Auto => {
            RetrievalPlan::for_mode(mode, search_params.priority_order)
        }
        _ => plan.clone(),
    };

    let extracted_info = if effective.is_sequential() || effective.mode == SearchMode::Auto {
        non_empty(resp.extracted_info)
    } else {
        None
    };
    let online_search_response = if effective.touches(Source::Online) {
        non_empty(resp.online_search_response)
    } else {
        None
    };
    let answer = resp.answer.unwrap_or_default();

    if plan.mode == SearchMode::SequentialAnalysis {
        if extracted_info.is_none() {
            return Err(SearchError::Malformed(
                "sequential analysis response has no extracted_info".to_string(),
            ));
        }
        if answer.trim().is_empty() {
            return Err(SearchError::Malformed(
                "sequential analysis response has no comparative answer".to_string(),
            ));
        }
        if online_search_response.is_none() {
            tracing::warn!("Sequential analysis returned no online search response");
        }
    }

    Ok(Turn {
        query: query.to_string(),
        answer,
        extracted_info,
        online_search_response,
        selected_mode,
        mode_reasoning,
        results: resp.results,
        search_params,
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}
