//! Conversational message handling
//!
//! Classifies a message for gold mentions, routes it to the sender's agent
//! session and degrades to a canned reply when the agent cannot answer.

use crate::agent::AgentGateway;
use crate::classifier::GoldClassifier;
use crate::error::AssistantError;
use crate::responses::{self, ResponseCategory};
use crate::state::{AgentSlot, Session, SessionStore};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Why a canned reply was used instead of the agent's answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    /// The session has no usable agent.
    AgentUnavailable,
    /// The agent answered with blank text.
    EmptyResponse,
    /// The model, a tool or the transport failed.
    AgentFailed,
}

impl FallbackReason {
    fn from_error(error: &AssistantError) -> Self {
        match error {
            AssistantError::AgentUnavailable(_) => FallbackReason::AgentUnavailable,
            AssistantError::EmptyAgentResponse => FallbackReason::EmptyResponse,
            _ => FallbackReason::AgentFailed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReplySource {
    Agent,
    Fallback {
        category: ResponseCategory,
        reason: FallbackReason,
    },
}

/// Reply for one user message
#[derive(Debug, Clone, Serialize)]
pub struct ConversationalReply {
    pub text: String,
    pub contains_gold: bool,
    pub source: ReplySource,
}

/// Glue between the session store and the agent gateway
pub struct ChatService {
    gateway: Arc<AgentGateway>,
    sessions: Arc<SessionStore>,
    /// Per-user locks held while a session is being created.
    creating: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ChatService {
    pub fn new(gateway: Arc<AgentGateway>, sessions: Arc<SessionStore>) -> Self {
        Self {
            gateway,
            sessions,
            creating: Mutex::new(HashMap::new()),
        }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Start a fresh session for the user, replacing any existing one
    pub async fn register_user(&self, user_id: &str) -> Arc<Session> {
        let lock = self.creation_lock(user_id).await;
        let _guard = lock.lock().await;
        self.create_session(user_id).await
    }

    /// Existing session for the user, or a newly registered one.
    ///
    /// Creation is single-flight per user: concurrent first messages share
    /// one session and one greeting.
    pub async fn session_for(&self, user_id: &str) -> Arc<Session> {
        if let Some(session) = self.sessions.get(user_id).await {
            return session;
        }

        let lock = self.creation_lock(user_id).await;
        let _guard = lock.lock().await;
        match self.sessions.get(user_id).await {
            Some(session) => session,
            None => self.create_session(user_id).await,
        }
    }

    async fn creation_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        let mut creating = self.creating.lock().await;
        // entries only the map still holds are idle
        creating.retain(|_, lock| Arc::strong_count(lock) > 1);
        creating.entry(user_id.to_string()).or_default().clone()
    }

    async fn create_session(&self, user_id: &str) -> Arc<Session> {
        let agent = match self.gateway.initialize(user_id).await {
            Ok(handle) => AgentSlot::Ready(Arc::new(handle)),
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Registering session without an agent");
                AgentSlot::Uninitialized {
                    reason: e.to_string(),
                }
            }
        };

        let replaced = self.sessions.insert(Session::new(user_id, agent)).await;
        info!(user_id = %user_id, replaced = replaced.is_some(), "Session registered");

        // The store may have evicted the entry under capacity pressure already;
        // hand back whatever is current.
        match self.sessions.get(user_id).await {
            Some(session) => session,
            None => Arc::new(Session::new(
                user_id,
                AgentSlot::Uninitialized {
                    reason: "session evicted".to_string(),
                },
            )),
        }
    }

    /// Generate the reply for a user message, with gold detection
    pub async fn generate_response(&self, user_id: &str, message: &str) -> ConversationalReply {
        let contains_gold = GoldClassifier::mentions_gold(message);
        if contains_gold {
            debug!(
                user_id = %user_id,
                keywords = ?GoldClassifier::matched_keywords(message),
                "Gold mentioned"
            );
        }
        let session = self.session_for(user_id).await;

        let outcome = match session.agent() {
            AgentSlot::Ready(handle) => self.gateway.respond(message, handle).await,
            AgentSlot::Uninitialized { reason } => {
                Err(AssistantError::AgentUnavailable(reason.clone()))
            }
        };

        match outcome {
            Ok(text) => ConversationalReply {
                text,
                contains_gold,
                source: ReplySource::Agent,
            },
            Err(e) => {
                let reason = FallbackReason::from_error(&e);
                let category = ResponseCategory::for_message(message, contains_gold);
                warn!(
                    user_id = %user_id,
                    ?reason,
                    ?category,
                    error = %e,
                    "Agent could not answer, using canned reply"
                );

                ConversationalReply {
                    text: responses::pick(category).to_string(),
                    contains_gold,
                    source: ReplySource::Fallback { category, reason },
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::tests::ScriptedModel;
    use crate::agent::ModelTurn;
    use crate::tools::ToolRegistry;

    fn service(script: Vec<crate::Result<ModelTurn>>) -> (ChatService, Arc<ScriptedModel>) {
        let model = Arc::new(ScriptedModel::new(script));
        let gateway = Arc::new(AgentGateway::new(model.clone(), Arc::new(ToolRegistry::new())));
        let sessions = Arc::new(SessionStore::default());
        (ChatService::new(gateway, sessions), model)
    }

    fn answer(text: &str) -> crate::Result<ModelTurn> {
        Ok(ModelTurn::Answer(text.to_string()))
    }

    #[tokio::test]
    async fn test_agent_reply_with_gold_flag() {
        let (chat, _) = service(vec![answer("hi"), answer("1. Gold is near its highs")]);

        let reply = chat
            .generate_response("asha", "What is the price of gold today?")
            .await;
        assert_eq!(reply.text, "1. Gold is near its highs");
        assert!(reply.contains_gold);
        assert_eq!(reply.source, ReplySource::Agent);
    }

    #[tokio::test]
    async fn test_unavailable_agent_falls_back() {
        let (chat, model) = service(vec![Err(AssistantError::LlmError("down".to_string()))]);

        let reply = chat.generate_response("asha", "tell me about bonds").await;
        assert!(!reply.text.is_empty());
        assert!(!reply.contains_gold);
        assert_eq!(
            reply.source,
            ReplySource::Fallback {
                category: ResponseCategory::Default,
                reason: FallbackReason::AgentUnavailable,
            }
        );

        // the failed session stays registered, so the model is not retried
        let again = chat.generate_response("asha", "and stocks?").await;
        assert!(matches!(again.source, ReplySource::Fallback { .. }));
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn test_gold_fallback_uses_gold_category() {
        let (chat, _) = service(vec![answer("hi"), answer("  ")]);

        let reply = chat.generate_response("u", "Should I buy gold bars?").await;
        assert!(reply.contains_gold);
        assert!(ResponseCategory::GoldRelated
            .responses()
            .iter()
            .any(|r| *r == reply.text));
        assert_eq!(
            reply.source,
            ReplySource::Fallback {
                category: ResponseCategory::GoldRelated,
                reason: FallbackReason::EmptyResponse,
            }
        );
    }

    #[tokio::test]
    async fn test_users_get_separate_memory() {
        let (chat, _) = service(vec![]);

        chat.generate_response("a", "first from a").await;
        chat.generate_response("b", "first from b").await;

        let a = chat.sessions().get("a").await.unwrap();
        let AgentSlot::Ready(handle) = a.agent() else {
            panic!("session a should be ready");
        };
        let transcript = handle.transcript().await;
        assert!(transcript.messages().any(|m| m.content == "first from a"));
        assert!(!transcript.messages().any(|m| m.content == "first from b"));
    }

    #[tokio::test]
    async fn test_register_replaces_memory() {
        let (chat, _) = service(vec![]);
        chat.generate_response("a", "remember me").await;
        chat.register_user("a").await;

        let session = chat.sessions().get("a").await.unwrap();
        let AgentSlot::Ready(handle) = session.agent() else {
            panic!("session should be ready");
        };
        assert_eq!(handle.transcript().await.message_count(), 2);
    }

    /// Answers "ok" after a delay, so overlapping turns really overlap
    struct SlowModel {
        calls: std::sync::atomic::AtomicUsize,
    }

    #[async_trait::async_trait]
    impl crate::agent::ChatModel for SlowModel {
        fn model_name(&self) -> &str {
            "slow"
        }

        async fn complete(&self, _request: crate::agent::ModelRequest<'_>) -> crate::Result<ModelTurn> {
            self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            Ok(ModelTurn::Answer("ok".to_string()))
        }
    }

    #[tokio::test]
    async fn test_concurrent_first_messages_share_one_session() {
        let model = Arc::new(SlowModel {
            calls: std::sync::atomic::AtomicUsize::new(0),
        });
        let gateway = Arc::new(AgentGateway::new(model.clone(), Arc::new(ToolRegistry::new())));
        let chat = ChatService::new(gateway, Arc::new(SessionStore::default()));

        let (first, second) = tokio::join!(
            chat.generate_response("x", "first message"),
            chat.generate_response("x", "second message"),
        );
        assert_eq!(first.source, ReplySource::Agent);
        assert_eq!(second.source, ReplySource::Agent);

        // one greeting plus one call per message
        assert_eq!(model.calls.load(std::sync::atomic::Ordering::SeqCst), 3);

        let session = chat.sessions().get("x").await.unwrap();
        let AgentSlot::Ready(handle) = session.agent() else {
            panic!("session should be ready");
        };
        let transcript = handle.transcript().await;
        let contents: Vec<&str> = transcript.messages().map(|m| m.content.as_str()).collect();
        assert_eq!(contents.len(), 6);
        assert_eq!(contents[0], "Hello, My name is x");
        assert!(contents.contains(&"first message"));
        assert!(contents.contains(&"second message"));
    }
}
