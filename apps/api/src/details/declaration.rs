use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use super::handlers::DetailStore;
use super::{is_blank, DetailResource};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase", default)]
pub struct DeclarationDetail {
    pub text: String,
    pub place: Option<String>,
    #[sqlx(rename = "declared_on")]
    pub date: Option<NaiveDate>,
    pub show_declaration: bool,
}

impl Default for DeclarationDetail {
    fn default() -> Self {
        Self {
            text: String::new(),
            place: None,
            date: None,
            show_declaration: true,
        }
    }
}

impl DetailResource for DeclarationDetail {
    const PATH: &'static str = "declaration-detail";
    const LABEL: &'static str = "Declaration detail";

    fn missing_required(&self) -> Option<&'static str> {
        is_blank(&self.text).then_some("text")
    }
}

#[async_trait]
impl DetailStore for DeclarationDetail {
    async fn fetch(db: &PgPool, user_id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            "SELECT text, place, declared_on, show_declaration FROM declaration_details WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(db)
        .await
    }

    async fn lock(conn: &mut PgConnection, user_id: Uuid) -> Result<Self, sqlx::Error> {
        sqlx::query(
            "INSERT INTO declaration_details (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(user_id)
        .execute(&mut *conn)
        .await?;

        sqlx::query_as::<_, Self>(
            r#"
            SELECT text, place, declared_on, show_declaration
            FROM declaration_details
            WHERE user_id = $1
            FOR UPDATE
            "#,
        )
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await
    }

    async fn save(&self, conn: &mut PgConnection, user_id: Uuid) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE declaration_details SET
                text = $2,
                place = $3,
                declared_on = $4,
                show_declaration = $5,
                updated_at = NOW()
            WHERE user_id = $1
            RETURNING text, place, declared_on, show_declaration
            "#,
        )
        .bind(user_id)
        .bind(&self.text)
        .bind(&self.place)
        .bind(self.date)
        .bind(self.show_declaration)
        .fetch_one(&mut *conn)
        .await
    }
}
