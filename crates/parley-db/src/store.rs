use anyhow::Result;

use crate::models::MessageRow;
use crate::Database;

/// What the message pipeline needs from storage. `Database` is the real
/// implementation; tests substitute their own to simulate failures.
///
/// Calls are blocking and are expected to run under `spawn_blocking`.
pub trait MessageStore: Send + Sync {
    fn user_exists(&self, id: &str) -> Result<bool>;

    fn group_exists(&self, id: &str) -> Result<bool>;

    fn get_message(&self, id: &str) -> Result<Option<MessageRow>>;

    fn insert_message(&self, message: &MessageRow) -> Result<()>;

    fn get_direct_messages(&self, user_a: &str, user_b: &str) -> Result<Vec<MessageRow>>;

    fn get_group_messages(&self, group_id: &str) -> Result<Vec<MessageRow>>;
}

impl MessageStore for Database {
    fn user_exists(&self, id: &str) -> Result<bool> {
        Ok(self.get_user_by_id(id)?.is_some())
    }

    fn group_exists(&self, id: &str) -> Result<bool> {
        Ok(self.get_group(id)?.is_some())
    }

    fn get_message(&self, id: &str) -> Result<Option<MessageRow>> {
        Database::get_message(self, id)
    }

    fn insert_message(&self, message: &MessageRow) -> Result<()> {
        Database::insert_message(self, message)
    }

    fn get_direct_messages(&self, user_a: &str, user_b: &str) -> Result<Vec<MessageRow>> {
        Database::get_direct_messages(self, user_a, user_b)
    }

    fn get_group_messages(&self, group_id: &str) -> Result<Vec<MessageRow>> {
        Database::get_group_messages(self, group_id)
    }
}
