use std::sync::Arc;

use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::password::{hash_password, verify_password};
use crate::auth::{
    AuthError, JwtService, LoginRequest, LoginResponse, MessageResponse, RefreshTokenRequest,
    TokenResponse, TokenType, UserSession,
};
use crate::models::User;
use crate::services::identity_provider::IdentityProvider;

#[derive(Clone)]
pub struct AuthService {
    jwt_service: JwtService,
    identity: Arc<dyn IdentityProvider>,
    db: PgPool,
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("jwt_service", &self.jwt_service)
            .finish_non_exhaustive()
    }
}

impl AuthService {
    pub fn new(db: PgPool, jwt_secret: &str, identity: Arc<dyn IdentityProvider>) -> Self {
        Self {
            jwt_service: JwtService::new(jwt_secret),
            identity,
            db,
        }
    }

    pub fn jwt(&self) -> &JwtService {
        &self.jwt_service
    }

    /// Login: the identity provider is the authority on credentials, the local row on role and status
    pub async fn login(&self, request: LoginRequest) -> Result<LoginResponse, AuthError> {
        let email = request.email.as_deref().map(str::trim).unwrap_or_default();
        let password = request.password.as_deref().unwrap_or_default();
        if email.is_empty() || password.is_empty() {
            return Err(AuthError::PasswordValidation(
                "Email and password are required".to_string(),
            ));
        }

        let accepted = self
            .identity
            .verify_password(email, password)
            .await
            .map_err(|e| AuthError::Internal(e.into()))?;
        if !accepted {
            return Err(AuthError::InvalidCredentials);
        }

        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE lower(email) = lower($1)")
            .bind(email)
            .fetch_optional(&self.db)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !user.is_active {
            return Err(AuthError::AccountDisabled);
        }

        // Keep the local hash in step with the provider after out-of-band resets
        if !verify_password(password, &user.password_hash).unwrap_or(false) {
            let password_hash = hash_password(password)?;
            sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
                .bind(user.id)
                .bind(&password_hash)
                .execute(&self.db)
                .await?;
            tracing::info!(user_id = %user.id, "Refreshed local password hash");
        }

        self.issue_tokens(&user).await
    }

    pub async fn issue_tokens(&self, user: &User) -> Result<LoginResponse, AuthError> {
        let (access, refresh) = self
            .jwt_service
            .create_token_pair(user.id, &user.email, user.user_type)?;

        self.store_refresh_token(user.id, &refresh).await?;

        Ok(LoginResponse {
            access,
            refresh,
            token_type: "Bearer".to_string(),
            expires_in: self.jwt_service.access_token_expires_in_seconds(),
            user_id: user.id,
            uid: user.uid.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            user_type: user.user_type,
        })
    }

    /// New access token for a stored refresh token; role and status come from the current user row
    pub async fn refresh_token(&self, request: RefreshTokenRequest) -> Result<TokenResponse, AuthError> {
        let claims = self
            .jwt_service
            .validate_token_of(&request.refresh_token, TokenType::Refresh)?;
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;

        if !self.is_refresh_token_valid(user_id, &request.refresh_token).await? {
            return Err(AuthError::InvalidToken);
        }

        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or(AuthError::InvalidToken)?;
        if !user.is_active {
            return Err(AuthError::AccountDisabled);
        }

        let access_token = self
            .jwt_service
            .create_access_token(user.id, &user.email, user.user_type)?;

        Ok(TokenResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: self.jwt_service.access_token_expires_in_seconds(),
        })
    }

    /// Logout user (blacklist token)
    pub async fn logout(&self, token: &str) -> Result<MessageResponse, AuthError> {
        let claims = self.jwt_service.validate_token_of(token, TokenType::Access)?;
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;

        self.blacklist_token(&claims.jti, claims.exp as i64).await?;
        self.revoke_user_refresh_tokens(user_id).await?;

        Ok(MessageResponse::new("Successfully logged out"))
    }

    pub async fn is_token_blacklisted(&self, jti: &str) -> Result<bool, AuthError> {
        let result = sqlx::query("SELECT 1 FROM token_blacklist WHERE jti = $1 AND expires_at > NOW()")
            .bind(jti)
            .fetch_optional(&self.db)
            .await?;

        Ok(result.is_some())
    }

    pub async fn validate_session(&self, token: &str) -> Result<UserSession, AuthError> {
        let session = self.jwt_service.extract_user_session(token)?;

        if self.is_token_blacklisted(&session.jti).await? {
            return Err(AuthError::InvalidToken);
        }

        Ok(session)
    }

    /// Drop blacklist entries and refresh tokens that can no longer be presented
    pub async fn purge_expired_tokens(&self) -> Result<u64, AuthError> {
        let blacklisted = sqlx::query("DELETE FROM token_blacklist WHERE expires_at <= NOW()")
            .execute(&self.db)
            .await?
            .rows_affected();
        let refresh = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at <= NOW() OR revoked")
            .execute(&self.db)
            .await?
            .rows_affected();

        Ok(blacklisted + refresh)
    }

    async fn store_refresh_token(&self, user_id: Uuid, refresh_token: &str) -> Result<(), AuthError> {
        let claims = self.jwt_service.validate_token(refresh_token)?;
        let expires_at = chrono::DateTime::from_timestamp(claims.exp as i64, 0)
            .ok_or(AuthError::InvalidToken)?;

        sqlx::query(
            "INSERT INTO refresh_tokens (id, user_id, token_hash, expires_at)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(token_digest(refresh_token))
        .bind(expires_at)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    async fn is_refresh_token_valid(&self, user_id: Uuid, refresh_token: &str) -> Result<bool, AuthError> {
        let result = sqlx::query(
            "SELECT 1 FROM refresh_tokens
             WHERE user_id = $1 AND token_hash = $2 AND expires_at > NOW() AND NOT revoked",
        )
        .bind(user_id)
        .bind(token_digest(refresh_token))
        .fetch_optional(&self.db)
        .await?;

        Ok(result.is_some())
    }

    async fn revoke_user_refresh_tokens(&self, user_id: Uuid) -> Result<(), AuthError> {
        sqlx::query("UPDATE refresh_tokens SET revoked = true WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.db)
            .await?;

        Ok(())
    }

    async fn blacklist_token(&self, jti: &str, exp: i64) -> Result<(), AuthError> {
        let expires_at = chrono::DateTime::from_timestamp(exp, 0).ok_or(AuthError::InvalidToken)?;

        sqlx::query(
            "INSERT INTO token_blacklist (jti, expires_at) VALUES ($1, $2)
             ON CONFLICT (jti) DO NOTHING",
        )
        .bind(jti)
        .bind(expires_at)
        .execute(&self.db)
        .await?;

        Ok(())
    }
}

fn token_digest(token: &str) -> String {
    format!("{:x}", md5::compute(token))
}
