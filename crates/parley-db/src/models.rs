//! Database row types. These map directly to SQLite rows and stay
//! independent of the parley-types API models.

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub password: String,
    pub created_at: String,
}

pub struct GroupRow {
    pub id: String,
    pub name: String,
    pub admin_id: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MessageRow {
    pub id: String,
    pub sender_id: String,
    pub receiver_id: Option<String>,
    pub group_id: Option<String>,
    pub body: Option<String>,
    pub attachment: Option<String>,
    pub is_encrypted: bool,
    pub cipher_method: String,
    pub cipher_key: i64,
    pub sentiment: String,
    pub is_toxic: bool,
    /// JSON document with the full classifier output.
    pub classification: String,
    pub reply_to: Option<String>,
    pub edited: bool,
    pub is_deleted: bool,
    pub pinned: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReactionRow {
    pub id: String,
    pub message_id: String,
    pub user_id: String,
    pub kind: String,
    pub created_at: String,
}
