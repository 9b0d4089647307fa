//! `SQLite` implementation of the persistence collaborator.

use std::str::FromStr;

use chrono::{TimeZone, Utc};
use rusqlite::OptionalExtension;
use tokio_rusqlite::Connection;
use tracing::debug;

use crate::chat::backends::contracts::{BackendFuture, MessageStore};
use crate::chat::core::config::StorageConfig;
use crate::chat::core::errors::{ChatError, ChatResult};
use crate::chat::core::ids::{ConversationId, MessageId, UserId};
use crate::chat::core::message::{Message, MessageKind, MessagePage, NewMessage, Sender};

type MessageRow = (i64, String, bool, String, Option<String>, i64);

/// `SQLite`-backed conversation and message storage.
pub struct SqliteMessageStore {
    conn: Connection,
    conversations_table: String,
    messages_table: String,
}

impl SqliteMessageStore {
    /// Open the database file named in `config` and create tables if missing.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub async fn new(config: &StorageConfig) -> ChatResult<Self> {
        let conn = Connection::open(&config.sqlite_path).await?;
        Self::with_connection(conn, config).await
    }

    /// Open a private in-memory database.
    ///
    /// # Errors
    /// Returns an error if the database cannot be created.
    pub async fn in_memory(config: &StorageConfig) -> ChatResult<Self> {
        let conn = Connection::open_in_memory().await?;
        Self::with_connection(conn, config).await
    }

    async fn with_connection(conn: Connection, config: &StorageConfig) -> ChatResult<Self> {
        let conversations_table = config.conversations_table.clone();
        let messages_table = config.messages_table.clone();
        let (conversations, messages) = (conversations_table.clone(), messages_table.clone());

        conn.call(move |conn| {
            conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {conversations} (
                    id TEXT PRIMARY KEY,
                    user_id TEXT NOT NULL,
                    title TEXT,
                    created_at INTEGER NOT NULL,
                    updated_at INTEGER NOT NULL
                );
                CREATE TABLE IF NOT EXISTS {messages} (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    conversation_id TEXT NOT NULL,
                    content TEXT NOT NULL,
                    is_user INTEGER NOT NULL,
                    kind TEXT NOT NULL DEFAULT 'text',
                    filename TEXT,
                    created_at INTEGER NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_{messages}_conversation
                    ON {messages} (conversation_id, id DESC);"
            ))?;
            Ok(())
        })
        .await?;

        Ok(Self {
            conn,
            conversations_table,
            messages_table,
        })
    }
}

fn row_to_message(row: MessageRow) -> ChatResult<Message> {
    let (id, content, is_user, kind, filename, created_at) = row;
    let timestamp = Utc
        .timestamp_millis_opt(created_at)
        .single()
        .ok_or_else(|| ChatError::PersistenceFailure("invalid timestamp".to_string()))?;
    let kind = MessageKind::from_str(&kind)
        .map_err(|err| ChatError::PersistenceFailure(format!("invalid message kind: {err}")))?;

    Ok(Message {
        id: MessageId::persisted(id.to_string()),
        content,
        sender: if is_user { Sender::User } else { Sender::Assistant },
        timestamp,
        kind,
        filename,
    })
}

impl MessageStore for SqliteMessageStore {
    fn insert_message(
        &self,
        conversation_id: ConversationId,
        message: NewMessage,
    ) -> BackendFuture<'_, ChatResult<String>> {
        Box::pin(async move {
            let messages = self.messages_table.clone();
            let conversations = self.conversations_table.clone();
            let now_ms = Utc::now().timestamp_millis();
            let id = self
                .conn
                .call(move |conn| {
                    let tx = conn.transaction()?;
                    tx.execute(
                        &format!(
                            "INSERT INTO {messages}
                             (conversation_id, content, is_user, kind, filename, created_at)
                             VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
                        ),
                        rusqlite::params![
                            conversation_id,
                            message.content,
                            message.is_user,
                            message.kind.as_str(),
                            message.filename,
                            now_ms
                        ],
                    )?;
                    let id = tx.last_insert_rowid();
                    tx.execute(
                        &format!("UPDATE {conversations} SET updated_at = ?1 WHERE id = ?2"),
                        rusqlite::params![now_ms, conversation_id],
                    )?;
                    tx.commit()?;
                    Ok(id)
                })
                .await?;

            debug!("Stored message {id} in conversation {conversation_id}");
            Ok(id.to_string())
        })
    }

    fn list_messages(
        &self,
        conversation_id: ConversationId,
        page: usize,
        page_size: usize,
    ) -> BackendFuture<'_, ChatResult<MessagePage>> {
        Box::pin(async move {
            let table = self.messages_table.clone();
            let limit = i64::try_from(page_size)
                .map_err(|_| ChatError::PersistenceFailure("page size exceeds i64".to_string()))?;
            let offset = page
                .checked_mul(page_size)
                .and_then(|offset| i64::try_from(offset).ok())
                .ok_or_else(|| ChatError::PersistenceFailure("page offset overflow".to_string()))?;

            let (rows, total) = self
                .conn
                .call(move |conn| {
                    let total: i64 = conn.query_row(
                        &format!("SELECT COUNT(*) FROM {table} WHERE conversation_id = ?1"),
                        rusqlite::params![conversation_id],
                        |row| row.get(0),
                    )?;
                    let mut stmt = conn.prepare(&format!(
                        "SELECT id, content, is_user, kind, filename, created_at
                         FROM {table}
                         WHERE conversation_id = ?1
                         ORDER BY id DESC
                         LIMIT ?2 OFFSET ?3"
                    ))?;
                    let rows = stmt
                        .query_map(rusqlite::params![conversation_id, limit, offset], |row| {
                            let id: i64 = row.get(0)?;
                            let content: String = row.get(1)?;
                            let is_user: bool = row.get(2)?;
                            let kind: String = row.get(3)?;
                            let filename: Option<String> = row.get(4)?;
                            let created_at: i64 = row.get(5)?;
                            Ok((id, content, is_user, kind, filename, created_at))
                        })?
                        .collect::<Result<Vec<MessageRow>, rusqlite::Error>>()?;
                    Ok((rows, total))
                })
                .await?;

            let items = rows
                .into_iter()
                .map(row_to_message)
                .collect::<ChatResult<Vec<_>>>()?;
            let total_count = usize::try_from(total)
                .map_err(|_| ChatError::PersistenceFailure("invalid message count".to_string()))?;

            Ok(MessagePage { items, total_count })
        })
    }

    fn update_conversation_title(
        &self,
        conversation_id: ConversationId,
        title: String,
    ) -> BackendFuture<'_, ChatResult<()>> {
        Box::pin(async move {
            let table = self.conversations_table.clone();
            self.conn
                .call(move |conn| {
                    conn.execute(
                        &format!("UPDATE {table} SET title = ?1 WHERE id = ?2"),
                        rusqlite::params![title, conversation_id],
                    )?;
                    Ok(())
                })
                .await?;
            Ok(())
        })
    }

    fn conversation_title(
        &self,
        conversation_id: ConversationId,
    ) -> BackendFuture<'_, ChatResult<Option<String>>> {
        Box::pin(async move {
            let table = self.conversations_table.clone();
            let title = self
                .conn
                .call(move |conn| {
                    let title = conn
                        .query_row(
                            &format!("SELECT title FROM {table} WHERE id = ?1"),
                            rusqlite::params![conversation_id],
                            |row| row.get::<_, Option<String>>(0),
                        )
                        .optional()?;
                    Ok(title.flatten())
                })
                .await?;
            Ok(title)
        })
    }

    fn create_conversation(&self, user_id: UserId) -> BackendFuture<'_, ChatResult<ConversationId>> {
        Box::pin(async move {
            let table = self.conversations_table.clone();
            let id = ConversationId::new();
            let now_ms = Utc::now().timestamp_millis();
            self.conn
                .call(move |conn| {
                    conn.execute(
                        &format!(
                            "INSERT INTO {table} (id, user_id, title, created_at, updated_at)
                             VALUES (?1, ?2, NULL, ?3, ?3)"
                        ),
                        rusqlite::params![id, user_id, now_ms],
                    )?;
                    Ok(())
                })
                .await?;
            debug!("Created conversation {id} for user {user_id}");
            Ok(id)
        })
    }
}
