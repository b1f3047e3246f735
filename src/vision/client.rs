use std::sync::Arc;

use crate::device::types::CapturedFrame;
use crate::errors::TapsightResult;
use crate::llm::provider::LlmProvider;
use crate::llm::registry::{ProviderRegistry, Role};
use crate::llm::types::{CallConfig, ChatMessage};
use crate::vision::prompt::SYSTEM_PROMPT;

/// Multimodal model access with a fixed system prompt.
///
/// Provider failures are returned unmodified; retry policy belongs to the caller.
#[derive(Clone)]
pub struct VisionClient {
    provider: Arc<dyn LlmProvider>,
    call: CallConfig,
    system_prompt: String,
}

impl VisionClient {
    pub fn new(provider: Arc<dyn LlmProvider>, call: CallConfig) -> Self {
        Self {
            provider,
            call,
            system_prompt: SYSTEM_PROMPT.to_string(),
        }
    }

    /// Client for a configured role.
    pub fn for_role(registry: &ProviderRegistry, role: Role) -> TapsightResult<Self> {
        let (provider, call) = registry.resolve(role)?;
        Ok(Self::new(provider, call))
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Single request/response with no session state.
    pub async fn run_prompt(&self, prompt: &str, image: Option<&CapturedFrame>) -> TapsightResult<String> {
        let messages = vec![
            ChatMessage::system(self.system_prompt.clone()),
            ChatMessage::user(prompt, image.map(CapturedFrame::data_url)),
        ];
        let resp = self.provider.chat(messages, &self.call).await?;
        tracing::debug!(
            provider = self.provider.name(),
            reply_len = resp.content.len(),
            "vision prompt answered"
        );
        Ok(resp.content)
    }

    /// Start a multi-turn session. Each run opens its own and closes it when done.
    pub fn open_session(&self) -> ChatSession {
        ChatSession {
            provider: self.provider.clone(),
            call: self.call.clone(),
            system_prompt: self.system_prompt.clone(),
            messages: vec![ChatMessage::system(self.system_prompt.clone())],
        }
    }
}

/// Stateful conversation with the model. Must not be shared between runs.
pub struct ChatSession {
    provider: Arc<dyn LlmProvider>,
    call: CallConfig,
    system_prompt: String,
    messages: Vec<ChatMessage>,
}

impl ChatSession {
    /// Send a turn. Only the newest image is kept inline; earlier turns keep their text.
    pub async fn send(&mut self, prompt: &str, image: Option<&CapturedFrame>) -> TapsightResult<String> {
        let message = ChatMessage::user(prompt, image.map(CapturedFrame::data_url));
        if message.has_image() {
            for m in self.messages.iter_mut().filter(|m| m.role == "user") {
                m.strip_images();
            }
        }
        self.messages.push(message);

        match self.provider.chat(self.messages.clone(), &self.call).await {
            Ok(resp) => {
                self.messages.push(ChatMessage::assistant(resp.content.clone()));
                tracing::debug!(turns = self.turns(), reply_len = resp.content.len(), "chat turn complete");
                Ok(resp.content)
            }
            Err(e) => {
                // Keep the history consistent: an unanswered turn is dropped.
                self.messages.pop();
                Err(e)
            }
        }
    }

    /// Completed user/assistant exchanges.
    pub fn turns(&self) -> usize {
        self.messages.iter().filter(|m| m.role == "assistant").count()
    }

    /// Forget everything but the system prompt.
    pub fn reset(&mut self) {
        self.messages = vec![ChatMessage::system(self.system_prompt.clone())];
    }

    pub fn close(self) {
        tracing::debug!(turns = self.turns(), "chat session closed");
    }

    #[cfg(test)]
    pub(crate) fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }
}
