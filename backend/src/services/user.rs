//! Company user management

use bcrypt::{hash, DEFAULT_COST};
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use super::audit::AuditService;
use super::profile::{ProfileRow, PROFILE_COLUMNS};
use crate::error::{AppError, AppResult};
use shared::types::Language;
use shared::{AppRole, AuditAction, Profile};

#[derive(Clone)]
pub struct UserService {
    db: PgPool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserInput {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 200))]
    pub full_name: String,
    #[validate(custom = "crate::validation::password")]
    pub password: String,
    pub role: AppRole,
    #[validate(custom = "crate::validation::phone")]
    pub phone: Option<String>,
    pub preferred_language: Option<Language>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUserInput {
    #[validate(length(min = 1, max = 200))]
    pub full_name: Option<String>,
    pub role: Option<AppRole>,
    pub is_active: Option<bool>,
}

/// An administrator must not lock themself out
fn check_self_update(actor_id: Uuid, user_id: Uuid, input: &UpdateUserInput) -> AppResult<()> {
    if actor_id != user_id {
        return Ok(());
    }
    if matches!(input.role, Some(role) if role != AppRole::Admin) {
        return Err(AppError::Validation {
            field: "role".to_string(),
            message: "You cannot change your own role".to_string(),
            message_pt: "Não pode alterar o seu próprio perfil de acesso".to_string(),
        });
    }
    if input.is_active == Some(false) {
        return Err(AppError::Validation {
            field: "is_active".to_string(),
            message: "You cannot deactivate your own account".to_string(),
            message_pt: "Não pode desativar a sua própria conta".to_string(),
        });
    }
    Ok(())
}

impl UserService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn list(&self, company_id: Uuid) -> AppResult<Vec<Profile>> {
        let rows = sqlx::query_as::<_, ProfileRow>(&format!(
            r#"
            SELECT {}
            FROM profiles p
            JOIN user_roles ur ON ur.user_id = p.id
            WHERE p.company_id = $1
            ORDER BY p.full_name
            "#,
            PROFILE_COLUMNS
        ))
        .bind(company_id)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(Profile::try_from).collect()
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
        .ok_or_else(|| AppError::NotFound("User".to_string()))?;

        row.try_into()
    }

    pub async fn create(
        &self,
        company_id: Uuid,
        actor_id: Uuid,
        input: CreateUserInput,
    ) -> AppResult<Profile> {
        input.validate()?;

        let email = input.email.trim().to_lowercase();
        let taken = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM profiles WHERE company_id = $1 AND email = $2",
        )
        .bind(company_id)
        .bind(&email)
        .fetch_one(&self.db)
        .await?;
        if taken > 0 {
            return Err(AppError::DuplicateEntry("email".to_string()));
        }

        let password_hash = hash(&input.password, DEFAULT_COST)
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))?;

        let mut tx = self.db.begin().await?;

        let user_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO profiles (company_id, email, password_hash, full_name, phone, preferred_language)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(company_id)
        .bind(&email)
        .bind(&password_hash)
        .bind(input.full_name.trim())
        .bind(&input.phone)
        .bind(input.preferred_language.unwrap_or_default().code())
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO user_roles (user_id, company_id, role) VALUES ($1, $2, $3)")
            .bind(user_id)
            .bind(company_id)
            .bind(input.role.as_str())
            .execute(&mut *tx)
            .await?;

        AuditService::record(
            &mut *tx,
            company_id,
            actor_id,
            AuditAction::UserCreate,
            Some(user_id),
            json!({ "email": email, "role": input.role }),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(%company_id, %user_id, role = %input.role, "user created");
        self.get(company_id, user_id).await
    }

    pub async fn update(
        &self,
        company_id: Uuid,
        actor_id: Uuid,
        user_id: Uuid,
        input: UpdateUserInput,
    ) -> AppResult<Profile> {
        input.validate()?;
        check_self_update(actor_id, user_id, &input)?;

        // 404 for users of other companies
        self.get(company_id, user_id).await?;

        let mut tx = self.db.begin().await?;

        sqlx::query(
            r#"
            UPDATE profiles SET
                full_name = COALESCE($3, full_name),
                is_active = COALESCE($4, is_active),
                updated_at = NOW()
            WHERE id = $1 AND company_id = $2
            "#,
        )
        .bind(user_id)
        .bind(company_id)
        .bind(input.full_name.as_deref().map(str::trim))
        .bind(input.is_active)
        .execute(&mut *tx)
        .await?;

        if let Some(role) = input.role {
            sqlx::query("UPDATE user_roles SET role = $3 WHERE user_id = $1 AND company_id = $2")
                .bind(user_id)
                .bind(company_id)
                .bind(role.as_str())
                .execute(&mut *tx)
                .await?;
        }

        if input.is_active == Some(false) {
            sqlx::query(
                "UPDATE refresh_tokens SET revoked_at = NOW() WHERE user_id = $1 AND revoked_at IS NULL",
            )
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        }

        AuditService::record(
            &mut *tx,
            company_id,
            actor_id,
            AuditAction::UserUpdate,
            Some(user_id),
            json!({ "role": input.role, "is_active": input.is_active }),
        )
        .await?;

        tx.commit().await?;

        self.get(company_id, user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(role: Option<AppRole>, is_active: Option<bool>) -> UpdateUserInput {
        UpdateUserInput {
            full_name: None,
            role,
            is_active,
        }
    }

    #[test]
    fn admins_cannot_lock_themselves_out() {
        let me = Uuid::new_v4();
        assert!(check_self_update(me, me, &update(Some(AppRole::Viewer), None)).is_err());
        assert!(check_self_update(me, me, &update(None, Some(false))).is_err());
        assert!(check_self_update(me, me, &update(Some(AppRole::Admin), Some(true))).is_ok());
        assert!(check_self_update(me, Uuid::new_v4(), &update(Some(AppRole::Viewer), Some(false))).is_ok());
    }
}
