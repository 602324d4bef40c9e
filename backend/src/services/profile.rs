//! The signed-in user's own profile

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use shared::types::Language;
use shared::Profile;

#[derive(Clone)]
pub struct ProfileService {
    db: PgPool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileInput {
    #[validate(length(min = 1, max = 200))]
    pub full_name: Option<String>,
    #[validate(custom = "crate::validation::phone")]
    pub phone: Option<String>,
    pub preferred_language: Option<Language>,
}

/// Columns selected for a [`Profile`], joined with the user's role
pub(crate) const PROFILE_COLUMNS: &str = r#"
    p.id, p.company_id, p.email, p.full_name, p.phone, p.avatar_url, p.preferred_language,
    ur.role, p.is_active, p.last_login_at, p.created_at, p.updated_at
"#;

#[derive(Debug, FromRow)]
pub(crate) struct ProfileRow {
    id: Uuid,
    company_id: Uuid,
    email: String,
    full_name: String,
    phone: Option<String>,
    avatar_url: Option<String>,
    preferred_language: String,
    role: String,
    is_active: bool,
    last_login_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProfileRow> for Profile {
    type Error = AppError;

    fn try_from(row: ProfileRow) -> Result<Self, Self::Error> {
        Ok(Profile {
            id: row.id,
            company_id: row.company_id,
            email: row.email,
            full_name: row.full_name,
            phone: row.phone,
            avatar_url: row.avatar_url,
            preferred_language: Language::from_code(&row.preferred_language),
            role: row
                .role
                .parse()
                .map_err(|e| AppError::Internal(format!("Stored role is invalid: {}", e)))?,
            is_active: row.is_active,
            last_login_at: row.last_login_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl ProfileService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn get(&self, company_id: Uuid, user_id: Uuid) -> AppResult<Profile> {
        let row = sqlx::query_as::<_, ProfileRow>(&format!(
            r#"
            SELECT {}
            FROM profiles p
            JOIN user_roles ur ON ur.user_id = p.id
            WHERE p.id = $1 AND p.company_id = $2
            "#,
            PROFILE_COLUMNS
        ))
        .bind(user_id)
        .bind(company_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Profile".to_string()))?;

        row.try_into()
    }

    pub async fn update(
        &self,
        company_id: Uuid,
        user_id: Uuid,
        input: UpdateProfileInput,
    ) -> AppResult<Profile> {
        input.validate()?;

        sqlx::query(
            r#"
            UPDATE profiles SET
                full_name = COALESCE($3, full_name),
                phone = COALESCE($4, phone),
                preferred_language = COALESCE($5, preferred_language),
                updated_at = NOW()
            WHERE id = $1 AND company_id = $2
            "#,
        )
        .bind(user_id)
        .bind(company_id)
        .bind(input.full_name.as_deref().map(str::trim))
        .bind(&input.phone)
        .bind(input.preferred_language.map(|l| l.code()))
        .execute(&self.db)
        .await?;

        self.get(company_id, user_id).await
    }

    pub async fn set_avatar_url(&self, company_id: Uuid, user_id: Uuid, url: &str) -> AppResult<Profile> {
        sqlx::query(
            "UPDATE profiles SET avatar_url = $3, updated_at = NOW() WHERE id = $1 AND company_id = $2",
        )
        .bind(user_id)
        .bind(company_id)
        .bind(url)
        .execute(&self.db)
        .await?;

        self.get(company_id, user_id).await
    }
}
