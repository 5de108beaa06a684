pub mod document;
pub mod message;
pub mod session;

pub use document::{Document, DocumentSet};
pub use message::{Message, Role};
pub use session::{Session, SessionSummary};
