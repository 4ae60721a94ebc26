use crate::application::ports::{InteractionDraft, LikeOutcome, PageCursor, RecordPage, RemoteStore};
use crate::domain::entities::RemoteRecord;
use crate::domain::value_objects::{
    AuthorProfile, Content, GroupId, InteractionKind, PostId, RecordId, TargetRef, UserId,
};
use crate::shared::config::RemoteConfig;
use crate::shared::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Embedded author join plus the row columns the engine renders.
const SELECT_COLUMNS: &str =
    "id,content,created_at,like_count,post_id,group_id,author:profiles(id,username,avatar_url)";

/// PostgREST-style adapter for the managed backend. Mutations that
/// must be atomic (like toggles) go through rpc functions; row inserts
/// and reads hit the table endpoints directly.
pub struct RestRemoteStore {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl RestRemoteStore {
    pub fn new(config: &RemoteConfig) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.base_url)
    }

    fn rpc_url(&self, function: &str) -> String {
        format!("{}/rest/v1/rpc/{function}", self.base_url)
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    fn target_column(kind: InteractionKind) -> &'static str {
        match kind {
            InteractionKind::Comment => "post_id",
            InteractionKind::Message => "group_id",
        }
    }

    /// Keyset predicate matching the `created_at.desc,id.desc` order.
    /// Rows at the cursor's exact timestamp are kept and filtered on
    /// id, so a shared timestamp cannot swallow rows at the boundary.
    fn cursor_filter(cursor: &PageCursor) -> String {
        let stamp = cursor.created_at.to_rfc3339();
        format!(
            "(created_at.lt.{stamp},and(created_at.eq.{stamp},id.lt.{}))",
            cursor.id
        )
    }

    async fn check(response: Response) -> Result<Response, AppError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                AppError::Auth(format!("{status}: {body}"))
            }
            StatusCode::NOT_FOUND => AppError::NotFound(body),
            StatusCode::CONFLICT => AppError::Conflict(body),
            _ => AppError::Network(format!("unexpected status {status}: {body}")),
        })
    }
}

#[derive(Serialize)]
struct LikeArgs<'a> {
    p_user_id: &'a str,
    p_target_id: &'a str,
}

#[derive(Serialize)]
struct NewRow<'a> {
    user_id: &'a str,
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    post_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    group_id: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct AuthorRow {
    id: String,
    username: String,
    avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InteractionRow {
    id: String,
    content: String,
    created_at: DateTime<Utc>,
    #[serde(default)]
    like_count: u32,
    author: AuthorRow,
    #[serde(default)]
    post_id: Option<String>,
    #[serde(default)]
    group_id: Option<String>,
}

impl InteractionRow {
    fn into_record(self, kind: InteractionKind) -> Result<RemoteRecord, AppError> {
        let target = match (self.post_id, self.group_id) {
            (Some(post), _) => TargetRef::post(PostId::new(post).map_err(AppError::Validation)?),
            (None, Some(group)) => {
                TargetRef::group(GroupId::new(group).map_err(AppError::Validation)?)
            }
            (None, None) => {
                return Err(AppError::SerializationError(
                    "row carries neither post_id nor group_id".to_string(),
                ))
            }
        };
        let author_id = UserId::new(self.author.id).map_err(AppError::Validation)?;
        let mut author = AuthorProfile::new(author_id, self.author.username);
        if let Some(avatar) = self.author.avatar_url {
            author = author.with_avatar(avatar);
        }
        Ok(RemoteRecord {
            id: RecordId::server(self.id),
            author,
            target,
            kind,
            content: Content::new(self.content).map_err(AppError::Validation)?,
            created_at: self.created_at,
            like_count: self.like_count,
        })
    }
}

#[async_trait]
impl RemoteStore for RestRemoteStore {
    async fn toggle_like(&self, user: &UserId, post: &PostId) -> Result<LikeOutcome, AppError> {
        let response = self
            .authed(self.client.post(self.rpc_url("toggle_post_like")))
            .json(&LikeArgs {
                p_user_id: user.as_str(),
                p_target_id: post.as_str(),
            })
            .send()
            .await?;
        let response = Self::check(response).await?;
        Ok(response.json::<LikeOutcome>().await?)
    }

    async fn fetch_like_state(
        &self,
        user: &UserId,
        post: &PostId,
    ) -> Result<LikeOutcome, AppError> {
        let response = self
            .authed(self.client.post(self.rpc_url("post_like_state")))
            .json(&LikeArgs {
                p_user_id: user.as_str(),
                p_target_id: post.as_str(),
            })
            .send()
            .await?;
        let response = Self::check(response).await?;
        Ok(response.json::<LikeOutcome>().await?)
    }

    async fn insert_interaction(
        &self,
        draft: InteractionDraft,
    ) -> Result<RemoteRecord, AppError> {
        let (post_id, group_id) = match &draft.target {
            TargetRef::Post(id) => (Some(id.as_str()), None),
            TargetRef::Group(id) => (None, Some(id.as_str())),
        };
        let response = self
            .authed(self.client.post(self.table_url(draft.kind.table())))
            .header("Prefer", "return=representation")
            .query(&[("select", SELECT_COLUMNS)])
            .json(&NewRow {
                user_id: draft.author.id.as_str(),
                content: draft.content.as_str(),
                post_id,
                group_id,
            })
            .send()
            .await?;
        let response = Self::check(response).await?;
        let mut rows = response.json::<Vec<InteractionRow>>().await?;
        debug!(table = draft.kind.table(), "insert confirmed");
        rows.pop()
            .ok_or_else(|| AppError::Internal("insert returned no row".to_string()))?
            .into_record(draft.kind)
    }

    async fn delete_interaction(
        &self,
        kind: InteractionKind,
        id: &RecordId,
    ) -> Result<(), AppError> {
        let id_str = id
            .server_str()
            .ok_or_else(|| AppError::Validation("expected a server identity".to_string()))?;
        let response = self
            .authed(self.client.delete(self.table_url(kind.table())))
            .header("Prefer", "return=representation")
            .query(&[("id", format!("eq.{id_str}"))])
            .send()
            .await?;
        let response = Self::check(response).await?;
        let rows = response.json::<Vec<serde_json::Value>>().await?;
        if rows.is_empty() {
            return Err(AppError::NotFound(format!("no interaction {id_str}")));
        }
        Ok(())
    }

    async fn toggle_interaction_like(
        &self,
        user: &UserId,
        kind: InteractionKind,
        id: &RecordId,
    ) -> Result<LikeOutcome, AppError> {
        let id_str = id
            .server_str()
            .ok_or_else(|| AppError::Validation("expected a server identity".to_string()))?;
        let function = format!("toggle_{}_like", kind.as_str());
        let response = self
            .authed(self.client.post(self.rpc_url(&function)))
            .json(&LikeArgs {
                p_user_id: user.as_str(),
                p_target_id: id_str,
            })
            .send()
            .await?;
        let response = Self::check(response).await?;
        Ok(response.json::<LikeOutcome>().await?)
    }

    async fn fetch_interactions(
        &self,
        target: &TargetRef,
        kind: InteractionKind,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<RecordPage, AppError> {
        let mut params = vec![
            ("select".to_string(), SELECT_COLUMNS.to_string()),
            (
                Self::target_column(kind).to_string(),
                format!("eq.{}", target.id_str()),
            ),
            ("order".to_string(), "created_at.desc,id.desc".to_string()),
            ("limit".to_string(), limit.to_string()),
        ];
        if let Some(cursor) = cursor {
            let cursor = PageCursor::parse(cursor)?;
            params.push(("or".to_string(), Self::cursor_filter(&cursor)));
        }
        let response = self
            .authed(self.client.get(self.table_url(kind.table())))
            .query(&params)
            .send()
            .await?;
        let response = Self::check(response).await?;
        let rows = response.json::<Vec<InteractionRow>>().await?;

        let full_page = rows.len() as u32 == limit;
        let items = rows
            .into_iter()
            .map(|row| row.into_record(kind))
            .collect::<Result<Vec<_>, _>>()?;
        let next_cursor = if full_page {
            items
                .last()
                .and_then(PageCursor::after)
                .map(|cursor| cursor.to_string())
        } else {
            None
        };
        Ok(RecordPage { items, next_cursor })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> RestRemoteStore {
        let config = RemoteConfig {
            base_url: "http://localhost:54321/".to_string(),
            api_key: "anon".to_string(),
            request_timeout: 5,
        };
        RestRemoteStore::new(&config).unwrap()
    }

    #[test]
    fn urls_join_without_double_slash() {
        let store = store();
        assert_eq!(
            store.table_url("comments"),
            "http://localhost:54321/rest/v1/comments"
        );
        assert_eq!(
            store.rpc_url("toggle_post_like"),
            "http://localhost:54321/rest/v1/rpc/toggle_post_like"
        );
    }

    #[test]
    fn kinds_map_to_their_tables_and_columns() {
        assert_eq!(InteractionKind::Comment.table(), "comments");
        assert_eq!(InteractionKind::Message.table(), "group_messages");
        assert_eq!(
            RestRemoteStore::target_column(InteractionKind::Comment),
            "post_id"
        );
        assert_eq!(
            RestRemoteStore::target_column(InteractionKind::Message),
            "group_id"
        );
    }

    #[test]
    fn cursor_filter_keeps_rows_sharing_the_timestamp() {
        let stamp = "2026-08-30T10:00:00Z".parse().unwrap();
        let filter = RestRemoteStore::cursor_filter(&PageCursor::new(stamp, "srv-7"));
        assert_eq!(
            filter,
            "(created_at.lt.2026-08-30T10:00:00+00:00,\
             and(created_at.eq.2026-08-30T10:00:00+00:00,id.lt.srv-7))"
        );
    }

    #[test]
    fn row_mapping_resolves_the_target() {
        let row = InteractionRow {
            id: "srv-1".to_string(),
            content: "hello".to_string(),
            created_at: Utc::now(),
            like_count: 2,
            author: AuthorRow {
                id: "u1".to_string(),
                username: "alice".to_string(),
                avatar_url: None,
            },
            post_id: Some("p1".to_string()),
            group_id: None,
        };

        let record = row.into_record(InteractionKind::Comment).unwrap();

        assert_eq!(record.id, RecordId::server("srv-1"));
        assert_eq!(record.target.id_str(), "p1");
        assert_eq!(record.like_count, 2);
    }

    #[test]
    fn row_without_target_is_rejected() {
        let row = InteractionRow {
            id: "srv-1".to_string(),
            content: "hello".to_string(),
            created_at: Utc::now(),
            like_count: 0,
            author: AuthorRow {
                id: "u1".to_string(),
                username: "alice".to_string(),
                avatar_url: None,
            },
            post_id: None,
            group_id: None,
        };

        assert!(matches!(
            row.into_record(InteractionKind::Comment),
            Err(AppError::SerializationError(_))
        ));
    }
}
