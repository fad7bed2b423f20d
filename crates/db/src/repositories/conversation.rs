use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;

use cartly_core::domain::conversation::{ConversationContext, ConversationId};
use cartly_core::ports::{ConversationStore, ConversationTurn, StorageFailure, TurnRole};

use super::storage_failure;
use crate::DbPool;

pub struct SqlConversationStore {
    pool: DbPool,
}

impl SqlConversationStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn role_tag(role: TurnRole) -> &'static str {
    match role {
        TurnRole::Customer => "customer",
        TurnRole::Bot => "bot",
        TurnRole::Operator => "operator",
    }
}

fn parse_role(raw: &str) -> Result<TurnRole, StorageFailure> {
    match raw {
        "customer" => Ok(TurnRole::Customer),
        "bot" => Ok(TurnRole::Bot),
        "operator" => Ok(TurnRole::Operator),
        other => Err(StorageFailure(format!("unknown turn role `{other}`"))),
    }
}

#[async_trait]
impl ConversationStore for SqlConversationStore {
    async fn load(
        &self,
        id: &ConversationId,
    ) -> Result<Option<ConversationContext>, StorageFailure> {
        let row = sqlx::query("SELECT context FROM conversation WHERE id = ?1")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_failure)?;

        match row {
            None => Ok(None),
            Some(row) => {
                let raw: String = row.get("context");
                serde_json::from_str(&raw)
                    .map(Some)
                    .map_err(|error| StorageFailure(format!("context decode failed: {error}")))
            }
        }
    }

    async fn save(
        &self,
        id: &ConversationId,
        context: &ConversationContext,
    ) -> Result<(), StorageFailure> {
        let raw = serde_json::to_string(context)
            .map_err(|error| StorageFailure(format!("context encode failed: {error}")))?;

        sqlx::query(
            "INSERT INTO conversation (id, current_state, context, last_message_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                 current_state = excluded.current_state,
                 context = excluded.context,
                 last_message_at = excluded.last_message_at",
        )
        .bind(&id.0)
        .bind(format!("{:?}", context.state))
        .bind(raw)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(storage_failure)?;

        Ok(())
    }

    async fn append_turn(
        &self,
        id: &ConversationId,
        turn: ConversationTurn,
    ) -> Result<(), StorageFailure> {
        sqlx::query(
            "INSERT INTO conversation_turn (conversation_id, role, text, occurred_at)
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&id.0)
        .bind(role_tag(turn.role))
        .bind(&turn.text)
        .bind(turn.occurred_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(storage_failure)?;

        Ok(())
    }

    async fn recent_turns(
        &self,
        id: &ConversationId,
        limit: u32,
    ) -> Result<Vec<ConversationTurn>, StorageFailure> {
        let rows = sqlx::query(
            "SELECT role, text, occurred_at FROM conversation_turn
             WHERE conversation_id = ?1
             ORDER BY id DESC
             LIMIT ?2",
        )
        .bind(&id.0)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(storage_failure)?;

        let mut turns = rows
            .into_iter()
            .map(|row| {
                let role = parse_role(&row.get::<String, _>("role"))?;
                let occurred_at = row
                    .get::<String, _>("occurred_at")
                    .parse::<DateTime<Utc>>()
                    .map_err(|error| StorageFailure(format!("bad turn timestamp: {error}")))?;
                Ok(ConversationTurn { role, text: row.get("text"), occurred_at })
            })
            .collect::<Result<Vec<_>, StorageFailure>>()?;

        turns.reverse();
        Ok(turns)
    }
}
