use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::auth::{UserRole, UserSession};
use crate::error::{AppError, AppResult};
use crate::models::{ChatMessage, ConversationSummary, MessageQuery, SendMessageRequest};

/// Trainer-member messaging.
#[derive(Clone)]
pub struct MessageService {
    db: PgPool,
}

impl MessageService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Members talk to their assigned trainer and back; admins talk to anyone.
    pub async fn ensure_can_message(&self, sender: &UserSession, recipient_id: Uuid) -> AppResult<()> {
        if sender.user_id == recipient_id {
            return Err(AppError::validation("Cannot send a message to yourself"));
        }

        let recipient_role: UserRole = sqlx::query_scalar("SELECT user_type FROM users WHERE id = $1")
            .bind(recipient_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::not_found("Recipient not found"))?;

        let (member_id, trainer_id) = match (sender.role, recipient_role) {
            (UserRole::Admin, _) => return Ok(()),
            (UserRole::User, UserRole::Trainer) => (sender.user_id, recipient_id),
            (UserRole::Trainer, UserRole::User) => (recipient_id, sender.user_id),
            _ => return Err(AppError::forbidden()),
        };

        let assigned: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM trainer_assignments WHERE user_id = $1 AND trainer_id = $2)",
        )
        .bind(member_id)
        .bind(trainer_id)
        .fetch_one(&self.db)
        .await?;

        if assigned {
            Ok(())
        } else {
            Err(AppError::forbidden())
        }
    }

    pub async fn send(&self, sender: &UserSession, request: SendMessageRequest) -> AppResult<ChatMessage> {
        request.validate()?;
        if request.content.trim().is_empty() {
            return Err(AppError::validation("content: must not be blank"));
        }
        self.ensure_can_message(sender, request.recipient_id).await?;

        let message = sqlx::query_as::<_, ChatMessage>(
            r#"
            INSERT INTO chat_messages (id, sender_id, recipient_id, content)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(sender.user_id)
        .bind(request.recipient_id)
        .bind(&request.content)
        .fetch_one(&self.db)
        .await?;

        tracing::debug!(message_id = %message.id, "Message sent");
        Ok(message)
    }

    /// One row per peer with the latest message and unread count, most recent first.
    pub async fn conversations(&self, user_id: Uuid) -> AppResult<Vec<ConversationSummary>> {
        let conversations = sqlx::query_as::<_, ConversationSummary>(
            r#"
            WITH msgs AS (
                SELECT CASE WHEN sender_id = $1 THEN recipient_id ELSE sender_id END AS peer_id,
                       content, created_at,
                       (recipient_id = $1 AND read_at IS NULL) AS unread
                FROM chat_messages
                WHERE sender_id = $1 OR recipient_id = $1
            ),
            latest AS (
                SELECT DISTINCT ON (peer_id) peer_id, content, created_at
                FROM msgs
                ORDER BY peer_id, created_at DESC
            )
            SELECT l.peer_id, u.name AS peer_name, u.user_type AS peer_role,
                   l.content AS last_message, l.created_at AS last_message_at,
                   (SELECT COUNT(*) FROM msgs m WHERE m.peer_id = l.peer_id AND m.unread) AS unread_count
            FROM latest l
            JOIN users u ON u.id = l.peer_id
            ORDER BY l.created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        Ok(conversations)
    }

    /// A page of the conversation with `peer_id`, oldest first. Incoming messages are marked read.
    pub async fn thread(&self, user_id: Uuid, peer_id: Uuid, query: &MessageQuery) -> AppResult<Vec<ChatMessage>> {
        let peer_exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(peer_id)
            .fetch_one(&self.db)
            .await?;
        if !peer_exists {
            return Err(AppError::not_found("User not found"));
        }

        sqlx::query(
            r#"
            UPDATE chat_messages SET read_at = NOW()
            WHERE sender_id = $2 AND recipient_id = $1 AND read_at IS NULL
            "#,
        )
        .bind(user_id)
        .bind(peer_id)
        .execute(&self.db)
        .await?;

        let messages = sqlx::query_as::<_, ChatMessage>(
            r#"
            SELECT * FROM (
                SELECT * FROM chat_messages
                WHERE ((sender_id = $1 AND recipient_id = $2) OR (sender_id = $2 AND recipient_id = $1))
                  AND ($3::timestamptz IS NULL OR created_at < $3)
                ORDER BY created_at DESC
                LIMIT $4
            ) page
            ORDER BY created_at ASC
            "#,
        )
        .bind(user_id)
        .bind(peer_id)
        .bind(query.before)
        .bind(query.page_size())
        .fetch_all(&self.db)
        .await?;

        Ok(messages)
    }
}
