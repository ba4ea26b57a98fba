//! Admin credential store and signed session tokens.
//!
//! # Responsibilities
//! - Keep the single admin credential (salted hash, lockout state) on disk
//! - Issue and verify HMAC-signed session tokens
//! - Guard admin routes with a bearer-token middleware
//!
//! Token layout: `base64url(claims-json) "." base64url(hmac-sha256(secret, first-part))`.

use std::io;
use std::path::{Path, PathBuf};

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::clock::SharedClock;
use crate::config::AdminConfig;
use crate::http::response::ApiError;
use crate::http::server::AppState;

type HmacSha256 = Hmac<Sha256>;

pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("login locked for {retry_after_secs}s")]
    LockedOut { retry_after_secs: u64 },
    #[error("admin login is not configured")]
    NotConfigured,
    #[error("invalid or expired session")]
    InvalidSession,
    #[error("password must be at least {} characters", MIN_PASSWORD_LEN)]
    WeakPassword,
    #[error("credential storage error: {0}")]
    Storage(#[from] io::Error),
    #[error("credential serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials | AuthError::InvalidSession => ApiError::Unauthorized,
            AuthError::LockedOut { retry_after_secs } => ApiError::LockedOut { retry_after_secs },
            AuthError::NotConfigured => ApiError::Forbidden("Admin login is not configured"),
            AuthError::WeakPassword => ApiError::validation("newPassword", err.to_string()),
            AuthError::Storage(_) | AuthError::Serialize(_) => {
                tracing::error!(error = %err, "Admin credential storage failed");
                ApiError::Internal
            }
        }
    }
}

/// Persisted admin credential and lockout state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminCredential {
    pub password_hash: String,
    pub salt: String,
    #[serde(default)]
    pub login_attempts: u32,
    /// Unix millis.
    #[serde(default)]
    pub locked_until: Option<u64>,
    #[serde(default)]
    pub last_login: Option<DateTime<Utc>>,
}

impl AdminCredential {
    fn new(password: &str) -> Self {
        let salt = hex::encode(rand::thread_rng().gen::<[u8; 16]>());
        Self {
            password_hash: hash_password(&salt, password),
            salt,
            login_attempts: 0,
            locked_until: None,
            last_login: None,
        }
    }

    fn matches(&self, password: &str) -> bool {
        hash_password(&self.salt, password) == self.password_hash
    }
}

fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Issued at, unix millis.
    pub iat: u64,
    /// Expires at, unix millis.
    pub exp: u64,
    pub nonce: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Signs and checks session tokens.
pub struct SessionSigner {
    secret: Vec<u8>,
    ttl_ms: u64,
}

impl SessionSigner {
    pub fn new(secret: Vec<u8>, ttl_secs: u64) -> Self {
        Self {
            secret,
            ttl_ms: ttl_secs.saturating_mul(1000),
        }
    }

    /// A signer with a random secret; its tokens die with the process.
    pub fn ephemeral(ttl_secs: u64) -> Self {
        Self::new(rand::thread_rng().gen::<[u8; 32]>().to_vec(), ttl_secs)
    }

    pub fn sign(&self, now_ms: u64) -> Result<(String, SessionClaims), AuthError> {
        let claims = SessionClaims {
            iat: now_ms,
            exp: now_ms.saturating_add(self.ttl_ms),
            nonce: Uuid::new_v4().simple().to_string(),
        };
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?);
        let signature = URL_SAFE_NO_PAD.encode(self.mac(&payload)?.finalize().into_bytes());
        Ok((format!("{}.{}", payload, signature), claims))
    }

    pub fn verify(&self, token: &str, now_ms: u64) -> Result<SessionClaims, AuthError> {
        let (payload, signature) = token.split_once('.').ok_or(AuthError::InvalidSession)?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| AuthError::InvalidSession)?;
        self.mac(payload)?
            .verify_slice(&signature)
            .map_err(|_| AuthError::InvalidSession)?;

        let claims: SessionClaims = URL_SAFE_NO_PAD
            .decode(payload)
            .ok()
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
            .ok_or(AuthError::InvalidSession)?;
        if claims.exp <= now_ms {
            return Err(AuthError::InvalidSession);
        }
        Ok(claims)
    }

    fn mac(&self, payload: &str) -> Result<HmacSha256, AuthError> {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).map_err(|_| AuthError::InvalidSession)?;
        mac.update(payload.as_bytes());
        Ok(mac)
    }
}

/// The single admin account.
pub struct AdminAuth {
    path: PathBuf,
    credential: Mutex<Option<AdminCredential>>,
    signer: SessionSigner,
    max_attempts: u32,
    lockout_ms: u64,
    clock: SharedClock,
}

impl AdminAuth {
    /// Load the credential file, creating it from the configured password on first run.
    pub async fn open(
        config: &AdminConfig,
        path: PathBuf,
        clock: SharedClock,
    ) -> Result<Self, AuthError> {
        let mut credential = match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<AdminCredential>(&bytes) {
                Ok(credential) => Some(credential),
                Err(e) => {
                    tracing::warn!(path = ?path, error = %e, "Admin credential file unreadable, ignoring it");
                    None
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };

        if credential.is_none() && !config.password.is_empty() {
            let created = AdminCredential::new(&config.password);
            write_credential(&path, &created).await?;
            tracing::info!(path = ?path, "Admin credential initialized");
            credential = Some(created);
        }
        if credential.is_none() {
            tracing::warn!("No admin password configured, admin login disabled");
        }

        let signer = if config.session_secret.is_empty() {
            tracing::warn!("No session secret configured, sessions will not survive a restart");
            SessionSigner::ephemeral(config.session_ttl_secs)
        } else {
            SessionSigner::new(config.session_secret.as_bytes().to_vec(), config.session_ttl_secs)
        };

        Ok(Self {
            path,
            credential: Mutex::new(credential),
            signer,
            max_attempts: config.max_login_attempts.max(1),
            lockout_ms: config.lockout_secs.saturating_mul(1000),
            clock,
        })
    }

    pub async fn login(&self, password: &str) -> Result<SessionToken, AuthError> {
        let now = self.clock.now_ms();
        let mut guard = self.credential.lock().await;
        let credential = guard.as_mut().ok_or(AuthError::NotConfigured)?;

        if let Some(until) = credential.locked_until {
            if until > now {
                return Err(AuthError::LockedOut {
                    retry_after_secs: (until - now).div_ceil(1000),
                });
            }
            credential.locked_until = None;
        }

        if !credential.matches(password) {
            credential.login_attempts += 1;
            let attempts = credential.login_attempts;
            if attempts >= self.max_attempts {
                credential.login_attempts = 0;
                credential.locked_until = Some(now + self.lockout_ms);
                tracing::warn!(attempts, lockout_ms = self.lockout_ms, "Admin login locked");
            } else {
                tracing::warn!(attempts, "Admin login failed");
            }
            write_credential(&self.path, credential).await?;
            return Err(AuthError::InvalidCredentials);
        }

        credential.login_attempts = 0;
        credential.last_login = Some(self.clock.now());
        write_credential(&self.path, credential).await?;

        let (token, claims) = self.signer.sign(now)?;
        tracing::info!("Admin logged in");
        Ok(SessionToken {
            token,
            expires_at: crate::clock::datetime_from_ms(claims.exp),
        })
    }

    pub fn verify(&self, token: &str) -> Result<SessionClaims, AuthError> {
        self.signer.verify(token, self.clock.now_ms())
    }

    pub async fn change_password(&self, current: &str, new: &str) -> Result<(), AuthError> {
        if new.len() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakPassword);
        }
        let mut guard = self.credential.lock().await;
        let credential = guard.as_mut().ok_or(AuthError::NotConfigured)?;
        if !credential.matches(current) {
            return Err(AuthError::InvalidCredentials);
        }

        let mut updated = AdminCredential::new(new);
        updated.last_login = credential.last_login;
        write_credential(&self.path, &updated).await?;
        *credential = updated;
        tracing::info!("Admin password changed");
        Ok(())
    }
}

async fn write_credential(path: &Path, credential: &AdminCredential) -> Result<(), AuthError> {
    let bytes = serde_json::to_vec_pretty(credential)?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

/// Reject requests without a valid admin session.
pub async fn require_admin(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized)?;

    let claims = state.auth.verify(token.trim()).map_err(|_| ApiError::Unauthorized)?;
    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}
