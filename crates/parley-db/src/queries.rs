use crate::models::{GroupRow, MessageRow, ReactionRow, UserRow};
use crate::Database;
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row};

const MESSAGE_COLUMNS: &str = "id, sender_id, receiver_id, group_id, body, attachment, is_encrypted, \
     cipher_method, cipher_key, sentiment, is_toxic, classification, reply_to, edited, is_deleted, \
     pinned, created_at";

impl Database {
    // -- Users --

    /// Insert a user. Returns `false` when the username is already taken.
    pub fn create_user(&self, id: &str, username: &str, password_hash: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO users (id, username, password) VALUES (?1, ?2, ?3)",
                (id, username, password_hash),
            );
            match inserted {
                Ok(_) => Ok(true),
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
                {
                    Ok(false)
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username", username))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    // -- Groups --

    /// Create a group. The admin is always a member; duplicates in
    /// `member_ids` are ignored.
    pub fn create_group(
        &self,
        id: &str,
        name: &str,
        admin_id: &str,
        member_ids: &[String],
    ) -> Result<()> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            tx.execute(
                "INSERT INTO chat_groups (id, name, admin_id) VALUES (?1, ?2, ?3)",
                (id, name, admin_id),
            )?;
            {
                let mut stmt = tx.prepare(
                    "INSERT OR IGNORE INTO group_members (group_id, user_id) VALUES (?1, ?2)",
                )?;
                stmt.execute((id, admin_id))?;
                for member_id in member_ids {
                    stmt.execute((id, member_id))?;
                }
            }
            tx.commit()?;
            Ok(())
        })
    }

    pub fn get_group(&self, id: &str) -> Result<Option<GroupRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, name, admin_id, created_at FROM chat_groups WHERE id = ?1",
                    [id],
                    group_from_row,
                )
                .optional()?;
            Ok(row)
        })
    }

    pub fn get_groups_for_user(&self, user_id: &str) -> Result<Vec<GroupRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT g.id, g.name, g.admin_id, g.created_at
                 FROM chat_groups g
                 JOIN group_members m ON m.group_id = g.id
                 WHERE m.user_id = ?1
                 ORDER BY g.created_at ASC, g.rowid ASC",
            )?;
            let rows = stmt
                .query_map([user_id], group_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_group_members(&self, group_id: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT user_id FROM group_members WHERE group_id = ?1 ORDER BY rowid ASC",
            )?;
            let rows = stmt
                .query_map([group_id], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;
            Ok(rows)
        })
    }

    // -- Messages --

    pub fn insert_message(&self, message: &MessageRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                &format!(
                    "INSERT INTO messages ({MESSAGE_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)"
                ),
                rusqlite::params![
                    message.id,
                    message.sender_id,
                    message.receiver_id,
                    message.group_id,
                    message.body,
                    message.attachment,
                    message.is_encrypted,
                    message.cipher_method,
                    message.cipher_key,
                    message.sentiment,
                    message.is_toxic,
                    message.classification,
                    message.reply_to,
                    message.edited,
                    message.is_deleted,
                    message.pinned,
                    message.created_at,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_message(&self, id: &str) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1"),
                    [id],
                    message_from_row,
                )
                .optional()?;
            Ok(row)
        })
    }

    /// Both directions of a one-to-one conversation, oldest first.
    pub fn get_direct_messages(&self, user_a: &str, user_b: &str) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE (sender_id = ?1 AND receiver_id = ?2)
                    OR (sender_id = ?2 AND receiver_id = ?1)
                 ORDER BY created_at ASC, rowid ASC"
            ))?;
            let rows = stmt
                .query_map([user_a, user_b], message_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// All messages posted to a group, oldest first.
    pub fn get_group_messages(&self, group_id: &str) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE group_id = ?1
                 ORDER BY created_at ASC, rowid ASC"
            ))?;
            let rows = stmt
                .query_map([group_id], message_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Reactions --

    /// Insert or replace the caller's reaction on a message. A user holds at
    /// most one reaction per message. Returns (created, row).
    pub fn upsert_reaction(
        &self,
        id: &str,
        message_id: &str,
        user_id: &str,
        kind: &str,
        created_at: &str,
    ) -> Result<(bool, ReactionRow)> {
        self.with_conn(|conn| {
            let existing = conn
                .query_row(
                    "SELECT id, message_id, user_id, kind, created_at FROM reactions
                     WHERE message_id = ?1 AND user_id = ?2",
                    [message_id, user_id],
                    reaction_from_row,
                )
                .optional()?;

            if let Some(mut row) = existing {
                conn.execute("UPDATE reactions SET kind = ?1 WHERE id = ?2", (kind, &row.id))?;
                row.kind = kind.to_string();
                return Ok((false, row));
            }

            conn.execute(
                "INSERT INTO reactions (id, message_id, user_id, kind, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                (id, message_id, user_id, kind, created_at),
            )?;
            Ok((
                true,
                ReactionRow {
                    id: id.to_string(),
                    message_id: message_id.to_string(),
                    user_id: user_id.to_string(),
                    kind: kind.to_string(),
                    created_at: created_at.to_string(),
                },
            ))
        })
    }

    /// Remove the caller's reaction. Returns the removed row, if there was one.
    pub fn remove_reaction(&self, message_id: &str, user_id: &str) -> Result<Option<ReactionRow>> {
        self.with_conn(|conn| {
            let existing = conn
                .query_row(
                    "SELECT id, message_id, user_id, kind, created_at FROM reactions
                     WHERE message_id = ?1 AND user_id = ?2",
                    [message_id, user_id],
                    reaction_from_row,
                )
                .optional()?;

            if let Some(row) = &existing {
                conn.execute("DELETE FROM reactions WHERE id = ?1", [&row.id])?;
            }
            Ok(existing)
        })
    }

    pub fn get_reactions_for_message(&self, message_id: &str) -> Result<Vec<ReactionRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, message_id, user_id, kind, created_at FROM reactions
                 WHERE message_id = ?1
                 ORDER BY created_at ASC, rowid ASC",
            )?;
            let rows = stmt
                .query_map([message_id], reaction_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    // `column` is always one of our own literals, never caller input.
    let mut stmt = conn.prepare(&format!(
        "SELECT id, username, password, created_at FROM users WHERE {column} = ?1"
    ))?;

    let row = stmt
        .query_row([value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
                password: row.get(2)?,
                created_at: row.get(3)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn group_from_row(row: &Row<'_>) -> rusqlite::Result<GroupRow> {
    Ok(GroupRow {
        id: row.get(0)?,
        name: row.get(1)?,
        admin_id: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        sender_id: row.get(1)?,
        receiver_id: row.get(2)?,
        group_id: row.get(3)?,
        body: row.get(4)?,
        attachment: row.get(5)?,
        is_encrypted: row.get(6)?,
        cipher_method: row.get(7)?,
        cipher_key: row.get(8)?,
        sentiment: row.get(9)?,
        is_toxic: row.get(10)?,
        classification: row.get(11)?,
        reply_to: row.get(12)?,
        edited: row.get(13)?,
        is_deleted: row.get(14)?,
        pinned: row.get(15)?,
        created_at: row.get(16)?,
    })
}

fn reaction_from_row(row: &Row<'_>) -> rusqlite::Result<ReactionRow> {
    Ok(ReactionRow {
        id: row.get(0)?,
        message_id: row.get(1)?,
        user_id: row.get(2)?,
        kind: row.get(3)?,
        created_at: row.get(4)?,
    })
}
