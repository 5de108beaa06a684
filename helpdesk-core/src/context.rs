use crate::models::Message;
use crate::store::{Store, StoreError};

/// Last 10 messages, i.e. five user/assistant pairs.
pub const DEFAULT_WINDOW_SIZE: u32 = 10;

/// Fixed-size recent-history window. Counts messages across both roles;
/// no token budgeting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextWindow {
    size: u32,
}

impl Default for ContextWindow {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_SIZE)
    }
}

impl ContextWindow {
    pub fn new(size: u32) -> Self {
        Self { size }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// The last `size` messages of the session, oldest first.
    pub async fn fetch(&self, store: &Store, session_id: &str) -> Result<Vec<Message>, StoreError> {
        if self.size == 0 {
            return Ok(Vec::new());
        }
        store.get_recent_messages(session_id, self.size).await
    }
}
