use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use super::handlers::DetailStore;
use super::{is_blank, DetailResource};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfileSummary {
    pub summary: String,
    pub show_summary: bool,
}

impl Default for ProfileSummary {
    fn default() -> Self {
        Self {
            summary: String::new(),
            show_summary: true,
        }
    }
}

impl DetailResource for ProfileSummary {
    const PATH: &'static str = "profile-summary";
    const LABEL: &'static str = "Profile summary";

    fn missing_required(&self) -> Option<&'static str> {
        is_blank(&self.summary).then_some("summary")
    }
}

#[async_trait]
impl DetailStore for ProfileSummary {
    async fn fetch(db: &PgPool, user_id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            "SELECT summary, show_summary FROM profile_summaries WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(db)
        .await
    }

    async fn lock(conn: &mut PgConnection, user_id: Uuid) -> Result<Self, sqlx::Error> {
        sqlx::query(
            "INSERT INTO profile_summaries (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(user_id)
        .execute(&mut *conn)
        .await?;

        sqlx::query_as::<_, Self>(
            "SELECT summary, show_summary FROM profile_summaries WHERE user_id = $1 FOR UPDATE",
        )
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await
    }

    async fn save(&self, conn: &mut PgConnection, user_id: Uuid) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE profile_summaries SET
                summary = $2,
                show_summary = $3,
                updated_at = NOW()
            WHERE user_id = $1
            RETURNING summary, show_summary
            "#,
        )
        .bind(user_id)
        .bind(&self.summary)
        .bind(self.show_summary)
        .fetch_one(&mut *conn)
        .await
    }
}
