//! Caixa de mensagens do formulário público de contato

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::DbError;
use crate::models::{Message, MessageChanges, NewMessage};
use crate::Store;

#[derive(FromRow)]
struct MessageRow {
    id: Uuid,
    created_at: DateTime<Utc>,
    first_name: String,
    last_name: String,
    email: String,
    phone: String,
    message: String,
}

impl From<MessageRow> for Message {
    fn from(row: MessageRow) -> Self {
        Self {
            id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            phone: row.phone,
            message: row.message,
            created_at: row.created_at,
        }
    }
}

impl Store {
    pub async fn create_message(&self, new: NewMessage) -> Result<Message, DbError> {
        let message = Message {
            id: Uuid::new_v4(),
            first_name: new.first_name,
            last_name: new.last_name,
            email: new.email,
            phone: new.phone,
            message: new.message,
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO messages (id, created_at, first_name, last_name, email, phone, message)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(message.id)
        .bind(message.created_at)
        .bind(&message.first_name)
        .bind(&message.last_name)
        .bind(&message.email)
        .bind(&message.phone)
        .bind(&message.message)
        .execute(self.pool())
        .await?;

        Ok(message)
    }

    pub async fn find_message(&self, id: Uuid) -> Result<Option<Message>, DbError> {
        let row: Option<MessageRow> = sqlx::query_as(
            "SELECT id, created_at, first_name, last_name, email, phone, message
             FROM messages WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await?;

        Ok(row.map(Message::from))
    }

    /// Todas as mensagens, mais recentes primeiro
    pub async fn list_messages(&self) -> Result<Vec<Message>, DbError> {
        let rows: Vec<MessageRow> = sqlx::query_as(
            "SELECT id, created_at, first_name, last_name, email, phone, message
             FROM messages ORDER BY created_at DESC, rowid DESC",
        )
        .fetch_all(self.pool())
        .await?;

        Ok(rows.into_iter().map(Message::from).collect())
    }

    pub async fn update_message(
        &self,
        id: Uuid,
        changes: &MessageChanges,
    ) -> Result<Option<Message>, DbError> {
        let Some(mut message) = self.find_message(id).await? else {
            return Ok(None);
        };
        changes.apply(&mut message);

        sqlx::query(
            "UPDATE messages SET first_name = ?, last_name = ?, email = ?, phone = ?, message = ?
             WHERE id = ?",
        )
        .bind(&message.first_name)
        .bind(&message.last_name)
        .bind(&message.email)
        .bind(&message.phone)
        .bind(&message.message)
        .bind(id)
        .execute(self.pool())
        .await?;

        Ok(Some(message))
    }

    pub async fn delete_message(&self, id: Uuid) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM messages WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn count_messages(&self) -> Result<i64, DbError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages")
            .fetch_one(self.pool())
            .await?;
        Ok(count)
    }
}
