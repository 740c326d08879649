//! Conversational agent
//!
//! A bounded reasoning loop over a hosted chat model:
//! INPUT → MODEL → (TOOL → OBSERVE → MODEL)* → ANSWER
//!
//! The gateway hands out one [`AgentHandle`] per session. A handle owns the
//! session's conversation memory; its lock is held for a whole turn so turns
//! of the same session never interleave.

use crate::error::AssistantError;
use crate::memory::{ConversationHistory, ConversationMessage, MessageRole};
use crate::models::ToolInput;
use crate::tools::{ToolRegistry, ToolSpec};
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

pub const DEFAULT_MAX_ITERATIONS: usize = 2;

/// Answer recorded when the reasoning budget runs out before a final answer
pub const ITERATION_LIMIT_MESSAGE: &str = "Agent stopped due to iteration limit or time limit.";

/// Persona and formatting rules sent with every model call
pub const SYSTEM_PROMPT: &str = r#"You are a helpful financial assistant.
If you don't know the answer or need to look up current information, use the web_search tool.
If the user query is related to gold, silver, finance, investment, the stock market and similar topics, answer in detail about the different investment options available, recent trends, pros and cons, and suggest the best possible options.
Always format finance answers as a neat list:
    - Use a numbered list (1., 2., 3.) for the main points.
    - For sub-points under each main point, use indented dashes (-).
    - Do not use bold text, asterisks, or markdown formatting.
    - Make the indentation show the hierarchy clearly."#;

//
// ================= Model seam =================
//

/// One entry of the transcript sent to the model
#[derive(Debug, Clone, PartialEq)]
pub enum Turn {
    User(String),
    Model(String),
    ToolCall { name: String, arguments: Value },
    ToolResult { name: String, output: Value },
}

impl From<&ConversationMessage> for Turn {
    fn from(message: &ConversationMessage) -> Self {
        match message.role {
            MessageRole::User => Turn::User(message.content.clone()),
            MessageRole::Agent => Turn::Model(message.content.clone()),
        }
    }
}

/// What the model decided to do next
#[derive(Debug, Clone, PartialEq)]
pub enum ModelTurn {
    Answer(String),
    ToolCall { name: String, arguments: Value },
}

#[derive(Debug, Clone, Copy)]
pub struct ModelRequest<'a> {
    pub system: &'a str,
    pub turns: &'a [Turn],
    pub tools: &'a [ToolSpec],
}

/// Trait for the hosted chat model
#[async_trait]
pub trait ChatModel: Send + Sync {
    fn model_name(&self) -> &str;
    async fn complete(&self, request: ModelRequest<'_>) -> Result<ModelTurn>;
}

//
// ================= Executor =================
//

/// Binds a model, the tool registry and the instruction into a bounded loop
#[derive(Clone)]
pub struct AgentExecutor {
    model: Arc<dyn ChatModel>,
    tools: Arc<ToolRegistry>,
    system_prompt: Arc<str>,
    max_iterations: usize,
}

impl AgentExecutor {
    pub fn new(
        model: Arc<dyn ChatModel>,
        tools: Arc<ToolRegistry>,
        system_prompt: Arc<str>,
        max_iterations: usize,
    ) -> Self {
        Self {
            model,
            tools,
            system_prompt,
            max_iterations: max_iterations.max(1),
        }
    }

    /// Run one user turn against the memory buffer and record the exchange
    pub async fn run(&self, memory: &mut ConversationHistory, input: &str) -> Result<String> {
        let start = Instant::now();
        let mut turns: Vec<Turn> = memory.messages().map(Turn::from).collect();
        turns.push(Turn::User(input.to_string()));
        let specs = self.tools.specs();

        for iteration in 1..=self.max_iterations {
            let request = ModelRequest {
                system: &self.system_prompt,
                turns: &turns,
                tools: &specs,
            };

            let turn = self.model.complete(request).await.map_err(|e| match e {
                AssistantError::EmptyAgentResponse => e,
                other => AssistantError::AgentFailed(other.to_string()),
            })?;

            match turn {
                ModelTurn::Answer(text) => {
                    let answer = text.trim();
                    if answer.is_empty() {
                        return Err(AssistantError::EmptyAgentResponse);
                    }

                    memory.add_exchange(input, answer);
                    debug!(
                        user_id = %memory.user_id,
                        iteration,
                        memory_tokens = memory.total_tokens(),
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "Agent produced final answer"
                    );
                    return Ok(answer.to_string());
                }
                ModelTurn::ToolCall { name, arguments } => {
                    debug!(iteration, tool = %name, "Agent requested tool");
                    let output = self.observe(&name, &arguments).await;
                    turns.push(Turn::ToolCall {
                        name: name.clone(),
                        arguments,
                    });
                    turns.push(Turn::ToolResult { name, output });
                }
            }
        }

        warn!(
            user_id = %memory.user_id,
            max_iterations = self.max_iterations,
            "Agent stopped before producing a final answer"
        );
        memory.add_exchange(input, ITERATION_LIMIT_MESSAGE);
        Ok(ITERATION_LIMIT_MESSAGE.to_string())
    }

    /// Execute a requested tool; failures become observations for the model
    async fn observe(&self, name: &str, arguments: &Value) -> Value {
        let Some(tool) = self.tools.get(name) else {
            warn!(tool = %name, "Model requested an unknown tool");
            return json!({
                "error": format!(
                    "{} is not a valid tool, try one of [{}].",
                    name,
                    self.tools.list().join(", ")
                )
            });
        };

        let input = ToolInput {
            tool_name: name.to_string(),
            parameters: arguments.clone(),
        };

        match tool.execute(&input).await {
            Ok(output) if output.success => output.data,
            Ok(output) => json!({
                "error": output.error.unwrap_or_else(|| format!("{} failed", name))
            }),
            Err(e) => {
                warn!(tool = %name, error = %e, "Tool execution failed");
                json!({ "error": e.to_string() })
            }
        }
    }
}

//
// ================= Handle =================
//

/// A ready agent bound to one user's memory
pub struct AgentHandle {
    user_id: String,
    executor: AgentExecutor,
    memory: Mutex<ConversationHistory>,
    created_at: DateTime<Utc>,
}

impl AgentHandle {
    fn new(user_id: &str, executor: AgentExecutor) -> Self {
        Self {
            user_id: user_id.to_string(),
            executor,
            memory: Mutex::new(ConversationHistory::new(user_id)),
            created_at: Utc::now(),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Snapshot of the conversation so far
    pub async fn transcript(&self) -> ConversationHistory {
        self.memory.lock().await.clone()
    }
}

//
// ================= Gateway =================
//

/// Creates agent handles and routes messages through them
pub struct AgentGateway {
    model: Arc<dyn ChatModel>,
    tools: Arc<ToolRegistry>,
    system_prompt: Arc<str>,
    max_iterations: usize,
}

impl AgentGateway {
    pub fn new(model: Arc<dyn ChatModel>, tools: Arc<ToolRegistry>) -> Self {
        Self {
            model,
            tools,
            system_prompt: Arc::from(SYSTEM_PROMPT),
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Build an agent for the user and greet it with the user's name.
    ///
    /// Any failure is logged and reported as [`AssistantError::AgentUnavailable`].
    pub async fn initialize(&self, user_id: &str) -> Result<AgentHandle> {
        let executor = AgentExecutor::new(
            self.model.clone(),
            self.tools.clone(),
            self.system_prompt.clone(),
            self.max_iterations,
        );
        let handle = AgentHandle::new(user_id, executor);

        let greeting = format!("Hello, My name is {}", user_id);
        match self.respond(&greeting, &handle).await {
            Ok(answer) => {
                info!(
                    user_id = %user_id,
                    model = %self.model.model_name(),
                    "Agent initialized"
                );
                debug!(user_id = %user_id, greeting_reply = %answer, "Agent greeting");
                Ok(handle)
            }
            Err(e) => {
                error!(user_id = %user_id, error = %e, "Agent initialization failed");
                Err(AssistantError::AgentUnavailable(e.to_string()))
            }
        }
    }

    /// Send a user message through the handle's agent
    pub async fn respond(&self, message: &str, handle: &AgentHandle) -> Result<String> {
        let mut memory = handle.memory.lock().await;
        handle.executor.run(&mut memory, message).await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::ToolOutput;
    use crate::tools::Tool;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    /// Model that replays a fixed script and records what it was sent
    pub(crate) struct ScriptedModel {
        script: StdMutex<VecDeque<Result<ModelTurn>>>,
        pub(crate) seen: StdMutex<Vec<Vec<Turn>>>,
    }

    impl ScriptedModel {
        pub(crate) fn new(script: Vec<Result<ModelTurn>>) -> Self {
            Self {
                script: StdMutex::new(script.into()),
                seen: StdMutex::new(Vec::new()),
            }
        }

        pub(crate) fn calls(&self) -> usize {
            self.seen.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        fn model_name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, request: ModelRequest<'_>) -> Result<ModelTurn> {
            assert_eq!(request.system, SYSTEM_PROMPT);
            self.seen.lock().unwrap().push(request.turns.to_vec());
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(ModelTurn::Answer("ok".to_string())))
        }
    }

    struct EchoSearch;

    #[async_trait]
    impl Tool for EchoSearch {
        fn name(&self) -> &'static str {
            "web_search"
        }

        fn description(&self) -> &'static str {
            "echo"
        }

        fn parameters(&self) -> Value {
            json!({ "type": "OBJECT" })
        }

        async fn execute(&self, input: &ToolInput) -> Result<ToolOutput> {
            let query = input.parameters["query"].as_str().unwrap_or_default();
            if query == "boom" {
                return Err(AssistantError::ToolError("search backend down".to_string()));
            }
            Ok(ToolOutput {
                success: true,
                data: json!({ "result": format!("results for {}", query) }),
                error: None,
            })
        }
    }

    fn registry() -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoSearch));
        Arc::new(registry)
    }

    fn search(query: &str) -> Result<ModelTurn> {
        Ok(ModelTurn::ToolCall {
            name: "web_search".to_string(),
            arguments: json!({ "query": query }),
        })
    }

    fn answer(text: &str) -> Result<ModelTurn> {
        Ok(ModelTurn::Answer(text.to_string()))
    }

    #[tokio::test]
    async fn test_initialize_greets_with_name() {
        let model = Arc::new(ScriptedModel::new(vec![answer("Hi Asha!")]));
        let gateway = AgentGateway::new(model.clone(), registry());

        let handle = gateway.initialize("Asha").await.unwrap();
        assert_eq!(handle.user_id(), "Asha");

        let transcript = handle.transcript().await;
        assert_eq!(transcript.message_count(), 2);
        let first = transcript.messages().next().unwrap();
        assert_eq!(first.content, "Hello, My name is Asha");
    }

    #[tokio::test]
    async fn test_initialize_failure_is_unavailable() {
        let model = Arc::new(ScriptedModel::new(vec![Err(AssistantError::LlmError(
            "provider unreachable".to_string(),
        ))]));
        let gateway = AgentGateway::new(model, registry());

        let err = gateway.initialize("Asha").await.err().unwrap();
        assert!(matches!(err, AssistantError::AgentUnavailable(_)));
        assert!(err.to_string().contains("provider unreachable"));
    }

    #[tokio::test]
    async fn test_tool_observation_is_fed_back() {
        let model = Arc::new(ScriptedModel::new(vec![
            answer("hello"),
            search("gold price today"),
            answer("1. Gold trades near 2000 USD"),
        ]));
        let gateway = AgentGateway::new(model.clone(), registry());
        let handle = gateway.initialize("u").await.unwrap();

        let reply = gateway.respond("What is the gold price?", &handle).await.unwrap();
        assert_eq!(reply, "1. Gold trades near 2000 USD");
        assert_eq!(model.calls(), 3);

        let seen = model.seen.lock().unwrap();
        let last = seen.last().unwrap();
        assert!(matches!(last[last.len() - 2], Turn::ToolCall { .. }));
        match &last[last.len() - 1] {
            Turn::ToolResult { output, .. } => {
                assert_eq!(output["result"], "results for gold price today")
            }
            other => panic!("unexpected turn {:?}", other),
        }
        // memory from the greeting precedes the new question
        assert_eq!(last[0], Turn::User("Hello, My name is u".to_string()));
        assert_eq!(last[1], Turn::Model("hello".to_string()));
    }

    #[tokio::test]
    async fn test_iteration_budget_stops_the_loop() {
        let model = Arc::new(ScriptedModel::new(vec![
            answer("hello"),
            search("a"),
            search("b"),
            answer("never reached"),
        ]));
        let gateway = AgentGateway::new(model.clone(), registry());
        assert_eq!(gateway.max_iterations(), 2);
        let handle = gateway.initialize("u").await.unwrap();

        let reply = gateway.respond("loop forever", &handle).await.unwrap();
        assert_eq!(reply, ITERATION_LIMIT_MESSAGE);
        assert_eq!(model.calls(), 3);
    }

    #[tokio::test]
    async fn test_tool_errors_and_unknown_tools_become_observations() {
        let model = Arc::new(ScriptedModel::new(vec![
            search("boom"),
            Ok(ModelTurn::ToolCall {
                name: "calculator".to_string(),
                arguments: json!({}),
            }),
            answer("done"),
        ]));
        let executor = AgentExecutor::new(model.clone(), registry(), Arc::from(SYSTEM_PROMPT), 3);
        let mut memory = ConversationHistory::new("u");

        let reply = executor.run(&mut memory, "hi").await.unwrap();
        assert_eq!(reply, "done");
        assert_eq!(memory.message_count(), 2);

        let seen = model.seen.lock().unwrap();
        let last = seen.last().unwrap();
        let errors: Vec<String> = last
            .iter()
            .filter_map(|t| match t {
                Turn::ToolResult { output, .. } => output["error"].as_str().map(str::to_string),
                _ => None,
            })
            .collect();
        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("search backend down"));
        assert!(errors[1].contains("calculator is not a valid tool"));
    }

    #[tokio::test]
    async fn test_blank_answer_is_empty_response() {
        let model = Arc::new(ScriptedModel::new(vec![answer("hello"), answer("   ")]));
        let gateway = AgentGateway::new(model, registry());
        let handle = gateway.initialize("u").await.unwrap();

        let err = gateway.respond("anything", &handle).await.err().unwrap();
        assert!(matches!(err, AssistantError::EmptyAgentResponse));
        // the failed turn is not recorded
        assert_eq!(handle.transcript().await.message_count(), 2);
    }

    #[tokio::test]
    async fn test_model_error_is_agent_failed() {
        let model = Arc::new(ScriptedModel::new(vec![
            answer("hello"),
            Err(AssistantError::LlmError("429 quota".to_string())),
        ]));
        let gateway = AgentGateway::new(model, registry());
        let handle = gateway.initialize("u").await.unwrap();

        let err = gateway.respond("anything", &handle).await.err().unwrap();
        assert!(matches!(err, AssistantError::AgentFailed(_)));
    }
}
