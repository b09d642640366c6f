use crate::error::ChatError;
use crate::llm_client::LlmClient;
use crate::tool_registry::{ToolId, ToolRegistry};
use crate::types::{ChatCompletion, ChatRequest, Message};
use async_trait::async_trait;
use tokio::time::{Duration, timeout};

#[async_trait]
pub trait CompletionApi: Send + Sync {
    async fn complete<'a>(
        &self,
        api_key: &str,
        request: &ChatRequest<'a>,
    ) -> anyhow::Result<ChatCompletion>;
}

// Implement trait for real LlmClient
#[async_trait]
impl CompletionApi for LlmClient {
    async fn complete<'a>(
        &self,
        api_key: &str,
        request: &ChatRequest<'a>,
    ) -> anyhow::Result<ChatCompletion> {
        self.chat_once(api_key, request).await
    }
}

/// Per-turn settings owned by the session layer.
#[derive(Clone, Debug, PartialEq)]
pub struct TurnContext {
    pub model: String,
    pub api_key: String,
    pub temperature: f32,
}

#[derive(Clone)]
pub struct AgentOptions {
    pub step_timeout: Duration,
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self {
            step_timeout: Duration::from_secs(60),
        }
    }
}

/// How a turn produced its reply.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Direct(String),
    Tool { tool: ToolId, output: String },
}

impl Reply {
    pub fn into_text(self) -> String {
        match self {
            Reply::Direct(text) => text,
            Reply::Tool { output, .. } => output,
        }
    }
}

pub struct Agent {
    llm: Box<dyn CompletionApi>,
    tools: ToolRegistry,
    opts: AgentOptions,
}

impl Agent {
    pub fn new(llm: Box<dyn CompletionApi>, tools: ToolRegistry, opts: AgentOptions) -> Self {
        Self { llm, tools, opts }
    }

    /// Run one turn and return the assistant's reply text. Never fails: API
    /// errors come back as `"Error: ..."`, tool errors as their message.
    pub async fn respond(&self, ctx: &TurnContext, history: &[Message]) -> String {
        match self.try_respond(ctx, history).await {
            Ok(reply) => reply.into_text(),
            Err(ChatError::Transport(msg)) => {
                tracing::error!("completion request failed: {}", msg);
                format!("Error: {}", msg)
            }
            Err(e) => {
                tracing::warn!(kind = ?e.kind(), "turn ended with error: {}", e);
                e.to_string()
            }
        }
    }

    pub async fn try_respond(
        &self,
        ctx: &TurnContext,
        history: &[Message],
    ) -> Result<Reply, ChatError> {
        let request = ChatRequest {
            model: &ctx.model,
            messages: history,
            temperature: ctx.temperature,
            tools: self.tools.declarations(),
            tool_choice: "auto",
        };

        tracing::info!(model = %ctx.model, messages = history.len(), "requesting completion");
        let completion = timeout(self.opts.step_timeout, self.llm.complete(&ctx.api_key, &request))
            .await
            .map_err(|_| {
                ChatError::Transport(format!(
                    "request timed out after {:?}",
                    self.opts.step_timeout
                ))
            })?
            .map_err(|e| ChatError::Transport(format!("{:#}", e)))?;

        tracing::debug!(id = ?completion.id, model = ?completion.model, "completion received");

        let Some(choice) = completion.choices.into_iter().next() else {
            return Err(ChatError::Transport("No choices in response".to_string()));
        };
        tracing::debug!(finish_reason = ?choice.finish_reason, "first choice");
        let message = choice.message;

        // Only the first directive is honoured; its output is the final answer.
        let first_call = message.tool_calls.and_then(|calls| {
            if calls.len() > 1 {
                tracing::warn!(count = calls.len(), "ignoring all but the first tool call");
            }
            calls.into_iter().next()
        });

        let Some(tc) = first_call else {
            let text = message.content.unwrap_or_default();
            tracing::info!("no tool called");
            return Ok(Reply::Direct(text));
        };

        tracing::info!(
            tool = %tc.function.name,
            arguments = %tc.function.arguments,
            "tool call requested"
        );
        let id = self.tools.resolve(&tc.function.name)?;
        let invocation = self.tools.decode(id, &tc.function.arguments)?;
        let output = self.tools.execute(&invocation).await;
        let tool = invocation.id();
        tracing::info!(tool = tool.name(), result = %output, "tool finished");

        Ok(Reply::Tool { tool, output })
    }
}
