//! Two-phase turn orchestrator: model → tool execution → model.
//!
//! One turn:
//! 1. **Ask**: append the user message and request a completion over the
//!    context window, offering every registered tool
//! 2. **Execute**: if the model requested tools, dispatch the batch and
//!    record one tool message per result
//! 3. **Answer**: request a follow-up completion over the full history and
//!    return its text
//!
//! Step 2 and 3 repeat at most `max_tool_rounds` times (default 1). Tool
//! calls in the last allowed completion are logged and dropped, never
//! executed. An assistant message with tool calls is stored only together
//! with one tool message per call, so history never holds unanswered calls.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::config::AgentConfig;
use crate::inference::types::{ChatMessage, CompletionRequest, CompletionResponse, ToolDefinition};
use crate::inference::CompletionProvider;
use crate::mcp_client::types::ToolResult;

use super::conversation::{to_chat_messages, ConversationStore, DEFAULT_CONTEXT_WINDOW};
use super::errors::AgentError;
use super::tool_router::ToolRouter;
use super::types::{Message, TurnEvent, TurnReply, TurnState};

/// Default bound on tool rounds per turn.
pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 1;

/// Reply used when the model answers a tool round with no text.
pub const EMPTY_FINAL_REPLY: &str = "I've processed the results but have nothing more to add.";

// ─── Orchestrator ───────────────────────────────────────────────────────────

/// Drives conversation turns through the completion provider and tool router.
pub struct Orchestrator {
    store: Arc<ConversationStore>,
    router: ToolRouter,
    provider: Arc<dyn CompletionProvider>,
    context_window: usize,
    max_tool_rounds: usize,
    system_prompt: Option<String>,
    events: Option<mpsc::UnboundedSender<TurnEvent>>,
}

impl Orchestrator {
    pub fn new(
        store: Arc<ConversationStore>,
        router: ToolRouter,
        provider: Arc<dyn CompletionProvider>,
    ) -> Self {
        Self {
            store,
            router,
            provider,
            context_window: DEFAULT_CONTEXT_WINDOW,
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            system_prompt: None,
            events: None,
        }
    }

    /// Create an orchestrator using the `agent` config section.
    pub fn from_config(
        store: Arc<ConversationStore>,
        router: ToolRouter,
        provider: Arc<dyn CompletionProvider>,
        config: &AgentConfig,
    ) -> Self {
        let mut orchestrator = Self::new(store, router, provider)
            .with_context_window(config.context_window)
            .with_max_tool_rounds(config.max_tool_rounds);
        orchestrator.system_prompt = config.system_prompt.clone();
        orchestrator
    }

    pub fn with_context_window(mut self, size: usize) -> Self {
        self.context_window = size.max(1);
        self
    }

    pub fn with_max_tool_rounds(mut self, rounds: usize) -> Self {
        self.max_tool_rounds = rounds.max(1);
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Attach a channel that receives progress events for every turn.
    pub fn with_events(mut self, tx: mpsc::UnboundedSender<TurnEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn store(&self) -> &Arc<ConversationStore> {
        &self.store
    }

    pub fn router(&self) -> &ToolRouter {
        &self.router
    }

    // ─── Turn Handling ──────────────────────────────────────────────────

    /// Handle one user turn, bounded by a caller deadline.
    ///
    /// Messages appended before the deadline elapsed stay in history. A tool
    /// round cancelled mid-execution leaves no trace of its tool calls.
    pub async fn handle_turn_with_deadline(
        &self,
        conversation_id: &str,
        user_text: &str,
        deadline: Duration,
    ) -> Result<TurnReply, AgentError> {
        match tokio::time::timeout(deadline, self.handle_turn(conversation_id, user_text)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::error!(
                    conversation_id = %conversation_id,
                    timeout_ms = deadline.as_millis() as u64,
                    "orchestrator: turn deadline exceeded"
                );
                Err(AgentError::DeadlineExceeded {
                    timeout_ms: deadline.as_millis() as u64,
                })
            }
        }
    }

    /// Handle one user turn and return the final assistant reply.
    ///
    /// A completion provider failure aborts the turn; everything appended up
    /// to that point is kept.
    pub async fn handle_turn(
        &self,
        conversation_id: &str,
        user_text: &str,
    ) -> Result<TurnReply, AgentError> {
        let mut state = TurnState::AwaitingInput;

        self.store.append(conversation_id, Message::user(user_text))?;

        let registry = self.router.registry();
        let tools = registry.to_openai_tools(None);

        self.transition(conversation_id, &mut state, TurnState::RequestingCompletion);
        let context = self.store.get_context(conversation_id, self.context_window)?;
        let mut response = self
            .request_completion(conversation_id, &context, Some(&tools))
            .await?;

        let mut tool_rounds = 0;
        let mut tool_results: Vec<ToolResult> = Vec::new();

        while response.has_tool_calls() && tool_rounds < self.max_tool_rounds {
            self.transition(conversation_id, &mut state, TurnState::ToolsRequested);
            let CompletionResponse {
                content,
                tool_calls,
            } = response;

            self.emit(TurnEvent::ToolsRequested {
                conversation_id: conversation_id.to_string(),
                tool_names: tool_calls.iter().map(|tc| tc.name.clone()).collect(),
            });

            self.transition(conversation_id, &mut state, TurnState::ExecutingTools);
            let results = self.router.execute_batch(&tool_calls).await;

            // No await between these appends: a cancelled turn stores neither.
            self.store
                .append(conversation_id, Message::assistant(content, tool_calls))?;
            for result in &results {
                self.store.append(conversation_id, Message::tool(result))?;
            }
            self.emit(TurnEvent::ToolResults {
                conversation_id: conversation_id.to_string(),
                results: results.clone(),
            });
            tool_results.extend(results);
            tool_rounds += 1;

            self.transition(conversation_id, &mut state, TurnState::RequestingFinalCompletion);
            let history = self.store.get_history(conversation_id)?;
            let offered = (tool_rounds < self.max_tool_rounds).then_some(tools.as_slice());
            response = self
                .request_completion(conversation_id, &history, offered)
                .await?;
        }

        if response.has_tool_calls() {
            tracing::warn!(
                conversation_id = %conversation_id,
                tool_calls = response.tool_calls.len(),
                tool_names = ?response.tool_calls.iter().map(|tc| tc.name.as_str()).collect::<Vec<_>>(),
                max_tool_rounds = self.max_tool_rounds,
                "orchestrator: tool round limit reached, dropping unexecuted calls"
            );
        }

        let raw_content = response.content.clone();
        self.store.append(
            conversation_id,
            Message::assistant(response.content, Vec::new()),
        )?;

        let content = match raw_content {
            Some(text) if !text.trim().is_empty() => text,
            _ if tool_rounds > 0 => EMPTY_FINAL_REPLY.to_string(),
            other => other.unwrap_or_default(),
        };

        self.transition(conversation_id, &mut state, TurnState::Done);
        tracing::info!(
            conversation_id = %conversation_id,
            tool_rounds,
            tool_calls = tool_results.len(),
            reply_chars = content.len(),
            "orchestrator: turn complete"
        );

        Ok(TurnReply {
            conversation_id: conversation_id.to_string(),
            content,
            tool_results,
            tool_rounds,
        })
    }

    // ─── Helpers ────────────────────────────────────────────────────────

    /// Request a completion over `messages`, offering `tools` when non-empty.
    async fn request_completion(
        &self,
        conversation_id: &str,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
    ) -> Result<CompletionResponse, AgentError> {
        let tools = tools.filter(|t| !t.is_empty()).map(<[ToolDefinition]>::to_vec);
        let request = CompletionRequest {
            messages: self.build_messages(messages),
            tool_choice: tools.as_ref().map(|_| "auto".to_string()),
            tools,
        };

        self.provider.complete(request).await.map_err(|e| {
            tracing::error!(
                conversation_id = %conversation_id,
                error = %e,
                "orchestrator: completion request failed"
            );
            AgentError::from(e)
        })
    }

    fn build_messages(&self, messages: &[Message]) -> Vec<ChatMessage> {
        let mut out = Vec::with_capacity(messages.len() + 1);
        if let Some(prompt) = &self.system_prompt {
            out.push(Message::system(prompt.as_str()).to_chat_message());
        }
        out.extend(to_chat_messages(messages));
        out
    }

    fn transition(&self, conversation_id: &str, state: &mut TurnState, next: TurnState) {
        tracing::debug!(
            conversation_id = %conversation_id,
            from = ?*state,
            to = ?next,
            "orchestrator: state transition"
        );
        self.emit(TurnEvent::StateChanged {
            conversation_id: conversation_id.to_string(),
            from: *state,
            to: next,
        });
        *state = next;
    }

    fn emit(&self, event: TurnEvent) {
        if let Some(tx) = &self.events {
            // Receiver may have gone away; events are best-effort.
            let _ = tx.send(event);
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
