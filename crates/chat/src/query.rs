//! Search query resolution from a query-generation completion.
//!
//! Fallback chain:
//! 1. `search_sources` tool call with a `search_query` argument
//! 2. the completion's text
//! 3. the user's original question
//!
//! `"0"` means the model could not form a query and is never returned from
//! steps 1 or 2.

use ragchat_core::provider::{ProviderResponse, ToolDefinition};
use serde::Deserialize;
use tracing::debug;

/// Tool the query-generation call may invoke.
pub const SEARCH_SOURCES: &str = "search_sources";

/// Reserved "no query" answer.
pub const NO_RESPONSE: &str = "0";

#[derive(Debug, Deserialize)]
struct SearchSourcesArgs {
    #[serde(default)]
    search_query: Option<String>,
}

/// The `search_sources` tool definition offered to the model.
pub fn search_sources_tool() -> ToolDefinition {
    ToolDefinition {
        name: SEARCH_SOURCES.into(),
        description: "Retrieve sources from the search index".into(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "search_query": {
                    "type": "string",
                    "description": "Query string to retrieve documents from the search index, e.g. 'health care plan'"
                }
            },
            "required": ["search_query"]
        }),
    }
}

/// Pick the retrieval query for a query-generation completion.
pub fn resolve_search_query(completion: &ProviderResponse, user_query: &str) -> String {
    for call in completion.tool_calls.iter().filter(|c| c.name == SEARCH_SOURCES) {
        match serde_json::from_str::<SearchSourcesArgs>(&call.arguments) {
            Ok(SearchSourcesArgs {
                search_query: Some(query),
            }) if query != NO_RESPONSE => return query,
            Ok(_) => {}
            Err(e) => {
                debug!(call_id = %call.id, error = %e, "Malformed search_sources arguments");
            }
        }
    }

    let text = completion.message.text();
    if !text.is_empty() && text.trim() != NO_RESPONSE {
        return text;
    }

    user_query.to_string()
}
