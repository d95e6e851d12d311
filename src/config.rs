//! Configuration for the assistant
//!
//! Groups the completion, voice and plumbing settings in one place.

use crate::completion::CompletionConfig;
use crate::speech::VoiceSettings;
use crate::{EmtyError, Result};
use std::time::Duration;

/// Configuration for the complete assistant
#[derive(Clone, Debug)]
pub struct AssistantConfig {
    /// Completion service configuration
    pub completion: CompletionConfig,

    /// Voice used when speaking replies
    pub voice: VoiceSettings,

    /// Capacity of the command, event and notice channels
    pub channel_buffer_size: usize,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            completion: CompletionConfig::default(),
            voice: VoiceSettings::default(),
            channel_buffer_size: 100,
        }
    }
}

impl AssistantConfig {
    /// Set the completion configuration
    pub fn with_completion(mut self, completion: CompletionConfig) -> Self {
        self.completion = completion;
        self
    }

    /// Set the voice settings
    pub fn with_voice(mut self, voice: VoiceSettings) -> Self {
        self.voice = voice;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.completion.model = model.into();
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.completion.endpoint = endpoint.into();
        self
    }

    /// Give up on a completion request after `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.completion.timeout = Some(timeout);
        self
    }

    pub fn with_channel_buffer_size(mut self, size: usize) -> Self {
        self.channel_buffer_size = size;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let endpoint = &self.completion.endpoint;
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(EmtyError::Config(format!(
                "Endpoint must be an http(s) URL: {}",
                endpoint
            )));
        }

        if self.completion.model.trim().is_empty() {
            return Err(EmtyError::Config("Model name is required".into()));
        }

        if self.completion.max_tokens == 0 {
            return Err(EmtyError::Config("max_tokens must be positive".into()));
        }

        if !(0.0..=2.0).contains(&self.completion.temperature) {
            return Err(EmtyError::Config(format!(
                "Temperature out of range: {}",
                self.completion.temperature
            )));
        }

        if self.completion.timeout == Some(Duration::ZERO) {
            return Err(EmtyError::Config("Timeout must be positive".into()));
        }

        if self.voice.rate <= 0.0 || self.voice.pitch <= 0.0 {
            return Err(EmtyError::Config(
                "Voice rate and pitch must be positive".into(),
            ));
        }

        if self.channel_buffer_size == 0 {
            return Err(EmtyError::Config(
                "Channel buffer size must be positive".into(),
            ));
        }

        Ok(())
    }
}
