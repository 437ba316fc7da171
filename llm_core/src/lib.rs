//! Chat side of the relay: history validation, context bounding, shaping for
//! the completion service, and the streaming relay itself.

pub mod backend;
pub mod context;
pub mod error;
pub mod gemini;
pub mod history;
pub mod message;
pub mod mock;
pub mod relay;
pub mod shaper;

pub use backend::{CompletionBackend, FragmentStream};
pub use context::ContextWindow;
pub use error::{HistoryError, LlmError};
pub use gemini::GeminiClient;
pub use history::validate_history;
pub use message::{ChatMessage, InlineData, Part, Role, UpstreamMessage};
pub use relay::{relay, RelayOptions, StreamChunk};
pub use shaper::shape;

/// Persona sent ahead of every conversation unless configured otherwise.
pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "\
Ты ИИ-друг для детей 8–12 лет.
Отвечай коротко (до 100 слов), тепло и позитивно.
Поддерживай ребёнка и задавай вопросы.
Используй эмодзи ✨🚀🎨🌟
";
