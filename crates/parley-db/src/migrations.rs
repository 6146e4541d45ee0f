use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          TEXT PRIMARY KEY,
            username    TEXT NOT NULL UNIQUE,
            password    TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS chat_groups (
            id          TEXT PRIMARY KEY,
            name        TEXT NOT NULL,
            admin_id    TEXT NOT NULL REFERENCES users(id),
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS group_members (
            group_id    TEXT NOT NULL REFERENCES chat_groups(id),
            user_id     TEXT NOT NULL REFERENCES users(id),
            PRIMARY KEY (group_id, user_id)
        );

        CREATE INDEX IF NOT EXISTS idx_group_members_user
            ON group_members(user_id);

        -- body holds the transformed text whenever is_encrypted = 1.
        -- created_at is written by the caller as RFC 3339 with microseconds
        -- so lexical order is creation order.
        CREATE TABLE IF NOT EXISTS messages (
            id              TEXT PRIMARY KEY,
            sender_id       TEXT NOT NULL REFERENCES users(id),
            receiver_id     TEXT REFERENCES users(id),
            group_id        TEXT REFERENCES chat_groups(id),
            body            TEXT,
            attachment      TEXT,
            is_encrypted    INTEGER NOT NULL DEFAULT 1,
            cipher_method   TEXT NOT NULL DEFAULT 'cipher',
            cipher_key      INTEGER NOT NULL,
            sentiment       TEXT NOT NULL DEFAULT 'neutral',
            is_toxic        INTEGER NOT NULL DEFAULT 0,
            classification  TEXT NOT NULL,
            reply_to        TEXT REFERENCES messages(id),
            edited          INTEGER NOT NULL DEFAULT 0,
            is_deleted      INTEGER NOT NULL DEFAULT 0,
            pinned          INTEGER NOT NULL DEFAULT 0,
            created_at      TEXT NOT NULL,
            CHECK ((receiver_id IS NULL) <> (group_id IS NULL))
        );

        CREATE INDEX IF NOT EXISTS idx_messages_direct
            ON messages(sender_id, receiver_id, created_at);

        CREATE INDEX IF NOT EXISTS idx_messages_group
            ON messages(group_id, created_at);

        CREATE TABLE IF NOT EXISTS reactions (
            id          TEXT PRIMARY KEY,
            message_id  TEXT NOT NULL REFERENCES messages(id),
            user_id     TEXT NOT NULL REFERENCES users(id),
            kind        TEXT NOT NULL,
            created_at  TEXT NOT NULL,
            UNIQUE(message_id, user_id)
        );

        CREATE INDEX IF NOT EXISTS idx_reactions_message
            ON reactions(message_id);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
