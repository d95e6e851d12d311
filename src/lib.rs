//! Emty - a voice-driven conversational assistant
//!
//! The user speaks, the utterance is transcribed, the transcript is sent to a
//! remote completion service and the reply is displayed and spoken back. The
//! [`controller::InteractionController`] arbitrates between capture, the
//! completion request and speech output so that only one of them is active at
//! any time.

pub mod completion;
pub mod config;
pub mod controller;
pub mod messages;
pub mod settings;
pub mod speech;
pub mod state;

use thiserror::Error;

// Re-export commonly used types
pub use config::AssistantConfig;
pub use controller::{ControllerHandle, InteractionController};
pub use messages::{Message, MessageLog, Role};
pub use settings::{Credential, CredentialSource, SettingsStore};
pub use state::{ConversationStatus, Phase, SharedConversation};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EmtyError {
    #[error("Speech capture is not supported in this environment")]
    Unsupported,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Recognition error: {0}")]
    Recognition(String),

    #[error("Synthesis error: {0}")]
    Synthesis(String),

    #[error("Busy: {0}")]
    Busy(String),

    #[error("Channel error: {0}")]
    Channel(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Settings error: {0}")]
    Settings(String),
}

impl From<std::io::Error> for EmtyError {
    fn from(e: std::io::Error) -> Self {
        EmtyError::Io(e.to_string())
    }
}

impl EmtyError {
    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            // Capture will never become available on this platform
            EmtyError::Unsupported => false,
            // The user can enter a key and speak again
            EmtyError::Config(_) => true,
            EmtyError::Transport(_) => true,
            EmtyError::Recognition(_) => true,
            EmtyError::Synthesis(_) => true,
            EmtyError::Busy(_) => true,
            EmtyError::Channel(_) => false,
            EmtyError::Io(_) => false,
            EmtyError::Settings(_) => true,
        }
    }

    /// Get the text shown to the user in the conversation status
    pub fn user_message(&self) -> String {
        match self {
            EmtyError::Unsupported => "Bu ortam ses tanımayı desteklemiyor".to_string(),
            EmtyError::Config(_) => "API anahtarı yapılandırılmamış".to_string(),
            EmtyError::Transport(_) => "AI yanıtı alınamadı. Lütfen tekrar deneyin.".to_string(),
            EmtyError::Recognition(detail) => format!("Ses tanıma hatası: {}", detail),
            EmtyError::Synthesis(detail) => format!("Seslendirme hatası: {}", detail),
            EmtyError::Busy(_) => "Şu anda meşgul, lütfen bekleyin.".to_string(),
            EmtyError::Channel(_) => {
                "Dahili iletişim hatası. Lütfen uygulamayı yeniden başlatın.".to_string()
            }
            EmtyError::Io(_) => "Dosya sistemi hatası oluştu.".to_string(),
            EmtyError::Settings(detail) => format!("Ayarlar kaydedilemedi: {}", detail),
        }
    }
}

pub type Result<T> = std::result::Result<T, EmtyError>;
