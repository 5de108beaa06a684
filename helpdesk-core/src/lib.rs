pub mod completion;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod ipc;
pub mod models;
pub mod prompt;
pub mod store;
pub mod turn;

pub use completion::{ChatCompletionClient, Completion, CompletionBackend, CompletionError};
pub use config::HelpdeskConfig;
pub use context::{ContextWindow, DEFAULT_WINDOW_SIZE};
pub use error::HelpdeskError;
pub use models::{Document, DocumentSet, Message, Role, Session, SessionSummary};
pub use store::{Store, StoreError};
pub use turn::{TurnError, TurnOrchestrator, TurnReply};
