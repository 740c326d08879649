//! Tool trait and registry
//!
//! Tools are what the agent may call between reasoning steps.
//! The only production tool is a DuckDuckGo web search.

use crate::error::AssistantError;
use crate::models::{ToolInput, ToolOutput};
use crate::Result;
use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Observation returned when a search yields nothing usable
pub const NO_SEARCH_RESULT: &str = "No good DuckDuckGo Search Result was found";

const DUCKDUCKGO_API_URL: &str = "https://api.duckduckgo.com/";
const MAX_SEARCH_SNIPPETS: usize = 5;

/// Trait for a single tool
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    /// JSON schema of the parameters object, in the model's declaration dialect
    fn parameters(&self) -> Value;
    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput>;
}

/// Declaration of a tool as advertised to the model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Tool registry for looking up and executing tools
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Tool names, sorted
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Declarations for every registered tool, sorted by name
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.list()
            .into_iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| ToolSpec {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters(),
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn require_query(input: &ToolInput) -> Result<String> {
    input
        .parameters
        .get("query")
        .and_then(|v| v.as_str())
        .or_else(|| input.parameters.get("input").and_then(|v| v.as_str()))
        .or_else(|| input.parameters.as_str())
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(|q| q.to_string())
        .ok_or_else(|| {
            AssistantError::InvalidToolInput(
                "Expected a non-empty 'query' in tool_input".to_string(),
            )
        })
}

/// Web search over the DuckDuckGo Instant Answer API
pub struct WebSearchTool {
    client: Client,
    base_url: String,
}

impl WebSearchTool {
    pub fn new() -> Result<Self> {
        Self::with_base_url(DUCKDUCKGO_API_URL)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(15))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.to_string(),
        })
    }

    async fn search(&self, query: &str) -> Result<Value> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("q", query),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ])
            .send()
            .await
            .map_err(|e| AssistantError::ToolError(format!("DuckDuckGo request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AssistantError::ToolError(format!(
                "DuckDuckGo returned {} for query {:?}",
                status, query
            )));
        }

        // The API answers with a javascript content type, so decode by hand.
        let body = response.text().await?;
        serde_json::from_str(&body)
            .map_err(|e| AssistantError::ToolError(format!("Invalid JSON response: {}", e)))
    }
}

#[async_trait::async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &'static str {
        "web_search"
    }

    fn description(&self) -> &'static str {
        "A wrapper around DuckDuckGo Search. Useful for when you need to answer \
         questions about current events, prices or recent trends. Input should be a search query."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "OBJECT",
            "properties": {
                "query": {
                    "type": "STRING",
                    "description": "The search query"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput> {
        let query = require_query(input)?;
        debug!(query = %query, "Running web search");

        let response = self.search(&query).await?;
        let result = summarize_instant_answer(&response, MAX_SEARCH_SNIPPETS).unwrap_or_else(|| {
            warn!(query = %query, "Web search returned no usable snippets");
            NO_SEARCH_RESULT.to_string()
        });

        Ok(ToolOutput {
            success: true,
            data: json!({ "query": query, "result": result }),
            error: None,
        })
    }
}

/// Flatten an Instant Answer payload into a single snippet string
fn summarize_instant_answer(response: &Value, max_snippets: usize) -> Option<String> {
    let mut snippets: Vec<String> = Vec::new();

    for key in ["Answer", "AbstractText", "Definition"] {
        if let Some(text) = response.get(key).and_then(Value::as_str) {
            let text = text.trim();
            if !text.is_empty() {
                snippets.push(text.to_string());
            }
        }
    }

    if let Some(topics) = response.get("RelatedTopics").and_then(Value::as_array) {
        collect_topic_texts(topics, &mut snippets, max_snippets);
    }

    snippets.truncate(max_snippets);
    if snippets.is_empty() {
        None
    } else {
        Some(snippets.join(" "))
    }
}

fn collect_topic_texts(topics: &[Value], out: &mut Vec<String>, limit: usize) {
    for topic in topics {
        if out.len() >= limit {
            return;
        }
        if let Some(text) = topic.get("Text").and_then(Value::as_str) {
            if !text.trim().is_empty() {
                out.push(text.trim().to_string());
            }
        } else if let Some(nested) = topic.get("Topics").and_then(Value::as_array) {
            collect_topic_texts(nested, out, limit);
        }
    }
}

/// Create the default registry: a single web search tool.
pub fn create_default_registry() -> Result<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(WebSearchTool::new()?));
    Ok(registry)
}
