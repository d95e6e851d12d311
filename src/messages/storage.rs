use super::types::{Message, MessageId, Role};
use chrono::Utc;

/// Ordered, append-only message log
///
/// Ids keep increasing across [`MessageLog::clear`], so a message id is never
/// reused within a process.
#[derive(Debug, Clone, Default)]
pub struct MessageLog {
    messages: Vec<Message>,
    next_id: u64,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a new message stamped with the current time
    ///
    /// The timestamp never goes below the previous entry's, so log order and
    /// time order agree even if the wall clock steps back.
    pub fn append(&mut self, role: Role, content: impl Into<String>) -> &Message {
        let mut created_at = Utc::now();
        if let Some(last) = self.messages.last() {
            created_at = created_at.max(last.created_at());
        }

        let id = MessageId(self.next_id);
        self.next_id += 1;

        self.messages.push(Message::new(id, role, content, created_at));
        &self.messages[self.messages.len() - 1]
    }

    pub fn get_all(&self) -> Vec<Message> {
        self.messages.clone()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
