use crate::application::ports::{
    OfflineActionDraft, OfflineActionRecord, OfflineStore, OptimisticSnapshot,
};
use crate::domain::value_objects::{ActionKind, RecordId, TargetRef};
use crate::shared::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use tracing::info;

/// Local persistence for the action queue and optimistic snapshots,
/// kept so an interrupted session can surface unsent drafts and roll
/// half-applied updates back on restart.
pub struct SqliteOfflineStore {
    pool: SqlitePool,
}

impl SqliteOfflineStore {
    pub async fn connect(database_url: &str) -> Result<Self, AppError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        let store = Self { pool };
        store.initialize().await?;
        Ok(store)
    }

    async fn initialize(&self) -> Result<(), AppError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS offline_actions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                action TEXT NOT NULL,
                target TEXT NOT NULL,
                local_id TEXT NOT NULL,
                payload TEXT NOT NULL,
                remote_id TEXT,
                is_synced INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                synced_at TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS optimistic_updates (
                snapshot_id TEXT PRIMARY KEY,
                target TEXT NOT NULL,
                original TEXT NOT NULL,
                updated TEXT NOT NULL,
                is_confirmed INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_offline_actions_pending \
             ON offline_actions (user_id, is_synced)",
        )
        .execute(&self.pool)
        .await?;

        info!("offline store initialized");
        Ok(())
    }

    fn row_to_action(row: &sqlx::sqlite::SqliteRow) -> Result<OfflineActionRecord, AppError> {
        let action: String = row.try_get("action")?;
        let target: String = row.try_get("target")?;
        let payload: String = row.try_get("payload")?;
        let local_id: String = row.try_get("local_id")?;
        let user_id: String = row.try_get("user_id")?;
        let created_at: String = row.try_get("created_at")?;
        let synced_at: Option<String> = row.try_get("synced_at")?;
        Ok(OfflineActionRecord {
            record_id: row.try_get("id")?,
            user: crate::domain::value_objects::UserId::new(user_id)
                .map_err(AppError::Validation)?,
            action: parse_action(&action)?,
            target: serde_json::from_str::<TargetRef>(&target)?,
            local_id: RecordId::from(local_id),
            payload: serde_json::from_str(&payload)?,
            remote_id: row.try_get("remote_id")?,
            is_synced: row.try_get::<i64, _>("is_synced")? != 0,
            created_at: parse_timestamp(&created_at)?,
            synced_at: synced_at.as_deref().map(parse_timestamp).transpose()?,
        })
    }
}

fn parse_action(raw: &str) -> Result<ActionKind, AppError> {
    match raw {
        "toggle_like" => Ok(ActionKind::ToggleLike),
        "add_comment" => Ok(ActionKind::AddComment),
        "delete_comment" => Ok(ActionKind::DeleteComment),
        "send_message" => Ok(ActionKind::SendMessage),
        "delete_message" => Ok(ActionKind::DeleteMessage),
        other => Err(AppError::SerializationError(format!(
            "unknown action kind {other}"
        ))),
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, AppError> {
    raw.parse::<DateTime<Utc>>()
        .map_err(|err| AppError::SerializationError(format!("bad timestamp {raw}: {err}")))
}

#[async_trait]
impl OfflineStore for SqliteOfflineStore {
    async fn save_action(
        &self,
        draft: OfflineActionDraft,
    ) -> Result<OfflineActionRecord, AppError> {
        let created_at = Utc::now();
        let target = serde_json::to_string(&draft.target)?;
        let payload = serde_json::to_string(&draft.payload)?;
        let result = sqlx::query(
            "INSERT INTO offline_actions \
             (user_id, action, target, local_id, payload, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(draft.user.as_str())
        .bind(draft.action.as_str())
        .bind(&target)
        .bind(draft.local_id.to_string())
        .bind(&payload)
        .bind(created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(OfflineActionRecord {
            record_id: result.last_insert_rowid(),
            user: draft.user,
            action: draft.action,
            target: draft.target,
            local_id: draft.local_id,
            payload: draft.payload,
            remote_id: None,
            is_synced: false,
            created_at,
            synced_at: None,
        })
    }

    async fn list_pending(
        &self,
        user: &crate::domain::value_objects::UserId,
    ) -> Result<Vec<OfflineActionRecord>, AppError> {
        let rows = sqlx::query(
            "SELECT * FROM offline_actions \
             WHERE user_id = ? AND is_synced = 0 \
             ORDER BY created_at ASC",
        )
        .bind(user.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_action).collect()
    }

    async fn mark_synced(&self, record_id: i64, remote_id: &str) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE offline_actions \
             SET is_synced = 1, remote_id = ?, synced_at = ? \
             WHERE id = ?",
        )
        .bind(remote_id)
        .bind(Utc::now().to_rfc3339())
        .bind(record_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn discard_action(&self, record_id: i64) -> Result<(), AppError> {
        sqlx::query("DELETE FROM offline_actions WHERE id = ?")
            .bind(record_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn save_snapshot(&self, snapshot: OptimisticSnapshot) -> Result<String, AppError> {
        sqlx::query(
            "INSERT INTO optimistic_updates \
             (snapshot_id, target, original, updated, is_confirmed, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&snapshot.snapshot_id)
        .bind(serde_json::to_string(&snapshot.target)?)
        .bind(serde_json::to_string(&snapshot.original)?)
        .bind(serde_json::to_string(&snapshot.updated)?)
        .bind(snapshot.is_confirmed as i64)
        .bind(snapshot.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(snapshot.snapshot_id)
    }

    async fn confirm_snapshot(&self, snapshot_id: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE optimistic_updates SET is_confirmed = 1 WHERE snapshot_id = ?")
            .bind(snapshot_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn take_snapshot(&self, snapshot_id: &str) -> Result<Option<serde_json::Value>, AppError> {
        let row = sqlx::query("SELECT original FROM optimistic_updates WHERE snapshot_id = ?")
            .bind(snapshot_id)
            .fetch_optional(&self.pool)
            .await?;
        let original = match row {
            Some(row) => {
                let raw: String = row.try_get("original")?;
                Some(serde_json::from_str(&raw)?)
            }
            None => None,
        };
        sqlx::query("DELETE FROM optimistic_updates WHERE snapshot_id = ?")
            .bind(snapshot_id)
            .execute(&self.pool)
            .await?;
        Ok(original)
    }

    async fn purge_confirmed(&self, before: DateTime<Utc>) -> Result<u32, AppError> {
        let stamp = before.to_rfc3339();
        let snapshots = sqlx::query(
            "DELETE FROM optimistic_updates WHERE is_confirmed = 1 AND created_at < ?",
        )
        .bind(&stamp)
        .execute(&self.pool)
        .await?;
        let actions =
            sqlx::query("DELETE FROM offline_actions WHERE is_synced = 1 AND created_at < ?")
                .bind(&stamp)
                .execute(&self.pool)
                .await?;
        Ok((snapshots.rows_affected() + actions.rows_affected()) as u32)
    }
}
