use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use super::handlers::DetailStore;
use super::{is_blank, DetailResource};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase", default)]
pub struct PersonalDetail {
    pub full_name: String,
    pub job_title: Option<String>,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub linkedin_url: Option<String>,
    pub website_url: Option<String>,
    /// URL returned by the image upload endpoint.
    pub photo_url: Option<String>,
}

impl DetailResource for PersonalDetail {
    const PATH: &'static str = "personal-detail";
    const LABEL: &'static str = "Personal detail";

    fn missing_required(&self) -> Option<&'static str> {
        if is_blank(&self.full_name) {
            Some("fullName")
        } else if is_blank(&self.email) {
            Some("email")
        } else {
            None
        }
    }
}

#[async_trait]
impl DetailStore for PersonalDetail {
    async fn fetch(db: &PgPool, user_id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT full_name, job_title, email, phone, address, linkedin_url, website_url, photo_url
            FROM personal_details
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(db)
        .await
    }

    async fn lock(conn: &mut PgConnection, user_id: Uuid) -> Result<Self, sqlx::Error> {
        sqlx::query(
            "INSERT INTO personal_details (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(user_id)
        .execute(&mut *conn)
        .await?;

        sqlx::query_as::<_, Self>(
            r#"
            SELECT full_name, job_title, email, phone, address, linkedin_url, website_url, photo_url
            FROM personal_details
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
            UPDATE personal_details SET
                full_name = $2,
                job_title = $3,
                email = $4,
                phone = $5,
                address = $6,
                linkedin_url = $7,
                website_url = $8,
                photo_url = $9,
                updated_at = NOW()
            WHERE user_id = $1
            RETURNING full_name, job_title, email, phone, address, linkedin_url, website_url, photo_url
            "#,
        )
        .bind(user_id)
        .bind(&self.full_name)
        .bind(&self.job_title)
        .bind(&self.email)
        .bind(&self.phone)
        .bind(&self.address)
        .bind(&self.linkedin_url)
        .bind(&self.website_url)
        .bind(&self.photo_url)
        .fetch_one(&mut *conn)
        .await
    }
}
