//! Authentication service for company registration, login, and token management

use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use shared::types::Language;
use shared::AppRole;

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    db: PgPool,
    jwt_secret: String,
    access_token_expiry: i64,
    refresh_token_expiry: i64,
}

/// Input for registering a new company with its first administrator
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterCompanyInput {
    #[validate(length(min = 1, max = 200))]
    pub company_name: String,
    #[validate(custom = "crate::validation::company_code")]
    pub company_code: String,
    #[validate(custom = "crate::validation::nif")]
    pub company_nif: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub full_name: String,
    #[validate(email)]
    pub email: String,
    #[validate(custom = "crate::validation::password")]
    pub password: String,
    #[validate(custom = "crate::validation::phone")]
    pub phone: Option<String>,
    pub preferred_language: Option<Language>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginInput {
    #[validate(length(min = 1))]
    pub company_code: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

/// Response after successful registration
#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub company_id: Uuid,
    pub user_id: Uuid,
    #[serde(flatten)]
    pub tokens: AuthTokens,
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // User ID
    pub company_id: String,
    pub role: String,
    pub permissions: Vec<String>,
    pub exp: i64,
    pub iat: i64,
}

/// Authentication tokens
#[derive(Debug, Serialize)]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub role: AppRole,
}

#[derive(Debug, sqlx::FromRow)]
struct LoginRow {
    id: Uuid,
    company_id: Uuid,
    password_hash: String,
    is_active: bool,
    role: String,
}

impl AuthService {
    pub fn new(db: PgPool, config: &Config) -> Self {
        Self {
            db,
            jwt_secret: config.jwt.secret.clone(),
            access_token_expiry: config.jwt.access_token_expiry,
            refresh_token_expiry: config.jwt.refresh_token_expiry,
        }
    }

    /// Register a new company and its administrator account
    pub async fn register_company(&self, input: RegisterCompanyInput) -> AppResult<RegisterResponse> {
        input.validate()?;

        let existing = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM companies WHERE code = $1")
            .bind(&input.company_code)
            .fetch_one(&self.db)
            .await?;

        if existing > 0 {
            return Err(AppError::Conflict {
                resource: "company".to_string(),
                message: "Company code already exists".to_string(),
                message_pt: "Este código de empresa já existe".to_string(),
            });
        }

        let password_hash = hash(&input.password, DEFAULT_COST)
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))?;
        let language = input.preferred_language.unwrap_or_default();
        let email = input.email.trim().to_lowercase();

        let mut tx = self.db.begin().await?;

        let company_id = sqlx::query_scalar::<_, Uuid>(
            "INSERT INTO companies (name, code, nif) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(input.company_name.trim())
        .bind(&input.company_code)
        .bind(&input.company_nif)
        .fetch_one(&mut *tx)
        .await?;

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
        .bind(language.code())
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO user_roles (user_id, company_id, role) VALUES ($1, $2, $3)")
            .bind(user_id)
            .bind(company_id)
            .bind(AppRole::Admin.as_str())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(%company_id, code = %input.company_code, "company registered");

        let tokens = self.generate_tokens(user_id, company_id, AppRole::Admin)?;
        self.store_refresh_token(&self.db, user_id, &tokens.refresh_token)
            .await?;

        Ok(RegisterResponse {
            company_id,
            user_id,
            tokens,
        })
    }

    /// Authenticate with company code, e-mail and password
    pub async fn login(&self, input: LoginInput) -> AppResult<AuthTokens> {
        input.validate()?;

        let user = sqlx::query_as::<_, LoginRow>(
            r#"
            SELECT p.id, p.company_id, p.password_hash, p.is_active, ur.role
            FROM profiles p
            JOIN companies c ON c.id = p.company_id
            JOIN user_roles ur ON ur.user_id = p.id
            WHERE c.code = $1 AND p.email = $2
            "#,
        )
        .bind(input.company_code.trim().to_uppercase())
        .bind(input.email.trim().to_lowercase())
        .fetch_optional(&self.db)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

        if !user.is_active {
            return Err(AppError::Unauthorized {
                message: "Account is disabled".to_string(),
                message_pt: "A conta está desativada".to_string(),
            });
        }

        let valid = verify(&input.password, &user.password_hash)
            .map_err(|e| AppError::Internal(format!("Password verification failed: {}", e)))?;

        if !valid {
            return Err(AppError::InvalidCredentials);
        }

        sqlx::query("UPDATE profiles SET last_login_at = NOW() WHERE id = $1")
            .bind(user.id)
            .execute(&self.db)
            .await?;

        let role = parse_role(&user.role)?;
        let tokens = self.generate_tokens(user.id, user.company_id, role)?;
        self.store_refresh_token(&self.db, user.id, &tokens.refresh_token)
            .await?;

        Ok(tokens)
    }

    /// Rotate a refresh token and issue a new access token
    ///
    /// Revoking the presented token is the only check, so a token replayed
    /// concurrently rotates at most once.
    pub async fn refresh_token(&self, refresh_token: &str) -> AppResult<AuthTokens> {
        let token_hash = hash_token(refresh_token);
        let mut tx = self.db.begin().await?;

        let (user_id, company_id, role) =
            sqlx::query_as::<_, (Uuid, Uuid, String)>(ROTATE_REFRESH_TOKEN)
                .bind(&token_hash)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(AppError::InvalidToken)?;

        let tokens = self.generate_tokens(user_id, company_id, parse_role(&role)?)?;
        self.store_refresh_token(&mut *tx, user_id, &tokens.refresh_token)
            .await?;
        tx.commit().await?;

        Ok(tokens)
    }

    /// Revoke every open refresh token of a user
    pub async fn revoke_all(&self, user_id: Uuid) -> AppResult<()> {
        sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = NOW() WHERE user_id = $1 AND revoked_at IS NULL",
        )
        .bind(user_id)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    fn generate_tokens(&self, user_id: Uuid, company_id: Uuid, role: AppRole) -> AppResult<AuthTokens> {
        let now = Utc::now();
        let access_exp = now + Duration::seconds(self.access_token_expiry);

        let access_claims = Claims {
            sub: user_id.to_string(),
            company_id: company_id.to_string(),
            role: role.as_str().to_string(),
            permissions: role.permission_strings(),
            exp: access_exp.timestamp(),
            iat: now.timestamp(),
        };

        let access_token = encode(
            &Header::default(),
            &access_claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))?;

        let refresh_token = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());

        Ok(AuthTokens {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.access_token_expiry,
            role,
        })
    }

    async fn store_refresh_token<'e, E>(&self, executor: E, user_id: Uuid, token: &str) -> AppResult<()>
    where
        E: PgExecutor<'e>,
    {
        let expires_at = Utc::now() + Duration::seconds(self.refresh_token_expiry);

        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (user_id, token_hash, expires_at)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(user_id)
        .bind(hash_token(token))
        .bind(expires_at)
        .execute(executor)
        .await?;

        Ok(())
    }
}

/// Revoke an open, unexpired refresh token and return its active owner
const ROTATE_REFRESH_TOKEN: &str = r#"
    WITH revoked AS (
        UPDATE refresh_tokens SET revoked_at = NOW()
        WHERE token_hash = $1 AND revoked_at IS NULL AND expires_at > NOW()
        RETURNING user_id
    )
    SELECT p.id, p.company_id, ur.role
    FROM revoked r
    JOIN profiles p ON p.id = r.user_id
    JOIN user_roles ur ON ur.user_id = p.id
    WHERE p.is_active = true
"#;

fn parse_role(role: &str) -> AppResult<AppRole> {
    role.parse()
        .map_err(|e| AppError::Internal(format!("Stored role is invalid: {}", e)))
}

/// Hex SHA-256 of a refresh token, as stored
pub(crate) fn hash_token(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_hash_is_stable_hex() {
        let a = hash_token("abc");
        assert_eq!(a.len(), 64);
        assert_eq!(
            a,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_ne!(hash_token("abd"), a);
    }

    #[test]
    fn rotation_is_gated_by_the_revoking_update() {
        let sql: Vec<&str> = ROTATE_REFRESH_TOKEN.split_whitespace().collect();
        let sql = sql.join(" ");

        let update = sql.find("UPDATE refresh_tokens SET revoked_at = NOW()").unwrap();
        let select = sql.find("SELECT").unwrap();
        assert!(update < select);
        assert!(sql.contains("WHERE token_hash = $1 AND revoked_at IS NULL AND expires_at > NOW()"));
        assert!(sql.contains("FROM revoked r"));
        assert_eq!(sql.matches("refresh_tokens").count(), 1);
    }

    #[test]
    fn registration_is_validated() {
        let input = RegisterCompanyInput {
            company_name: "Mármores do Sul".into(),
            company_code: "mms".into(),
            company_nif: Some("123456789".into()),
            full_name: "Ana".into(),
            email: "ana@example.pt".into(),
            password: "secret-pass".into(),
            phone: None,
            preferred_language: None,
        };
        let errors = input.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("company_code"));
    }
}
