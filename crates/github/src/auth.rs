//! GitHub App authentication.
//!
//! A short-lived RS256 JWT signed with the App private key is exchanged for an
//! installation access token. Nothing is cached: every call signs a new JWT
//! and requests a new token.

use async_trait::async_trait;
use base64::Engine;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use pipeline::{AuthError, Authenticator, InstallationId, InstallationToken};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::http::{send_with_retry, GithubApiConfig, HttpFailure, Replay};

/// Back-dating applied to `iat` to tolerate clock drift.
const CLOCK_SKEW_SECS: i64 = 60;
/// JWT lifetime; GitHub rejects anything over ten minutes.
const JWT_LIFETIME_SECS: i64 = 540;

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct AppClaims {
    pub(crate) iat: i64,
    pub(crate) exp: i64,
    pub(crate) iss: String,
}

#[derive(Deserialize)]
struct AccessTokenResponse {
    token: String,
}

/// [`Authenticator`] backed by a GitHub App identity.
pub struct AppAuthenticator {
    app_id: u64,
    key: EncodingKey,
    http: reqwest::Client,
    config: GithubApiConfig,
}

impl std::fmt::Debug for AppAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppAuthenticator")
            .field("app_id", &self.app_id)
            .field("api_base", &self.config.api_base)
            .finish_non_exhaustive()
    }
}

impl AppAuthenticator {
    /// `private_key` is the App key in PEM form, or that PEM encoded as
    /// standard base64 (convenient for single-line environment variables).
    pub fn new(app_id: u64, private_key: &str, config: GithubApiConfig) -> Result<Self, AuthError> {
        let pem = decode_private_key(private_key)?;
        let key = EncodingKey::from_rsa_pem(&pem).map_err(|e| AuthError::InvalidKey {
            message: e.to_string(),
        })?;
        let http = config.build_client().map_err(|e| AuthError::Transport {
            message: e.to_string(),
        })?;
        Ok(Self {
            app_id,
            key,
            http,
            config,
        })
    }

    pub(crate) fn app_jwt(&self, now: i64) -> Result<String, AuthError> {
        let claims = AppClaims {
            iat: now - CLOCK_SKEW_SECS,
            exp: now + JWT_LIFETIME_SECS,
            iss: self.app_id.to_string(),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.key).map_err(|e| {
            AuthError::InvalidKey {
                message: e.to_string(),
            }
        })
    }
}

#[async_trait]
impl Authenticator for AppAuthenticator {
    #[instrument(skip(self), fields(app_id = self.app_id))]
    async fn token_for(
        &self,
        installation: InstallationId,
    ) -> Result<InstallationToken, AuthError> {
        let jwt = self.app_jwt(chrono::Utc::now().timestamp())?;
        let url = self.config.url(&format!(
            "/app/installations/{}/access_tokens",
            installation.as_u64()
        ));

        // Minting a second token is harmless.
        let response = send_with_retry(
            &self.config,
            "create installation token",
            Replay::Safe,
            || self.http.post(&url).bearer_auth(&jwt),
        )
        .await
        .map_err(|failure| match failure {
            HttpFailure::Status {
                status, message, ..
            } => AuthError::Api { status, message },
            HttpFailure::Transport { message, .. } => AuthError::Transport { message },
        })?;

        let body: AccessTokenResponse =
            response.json().await.map_err(|e| AuthError::Transport {
                message: format!("invalid token response: {e}"),
            })?;
        debug!(%installation, "obtained installation token");
        Ok(InstallationToken::new(body.token))
    }
}

fn decode_private_key(raw: &str) -> Result<Vec<u8>, AuthError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AuthError::InvalidKey {
            message: "private key is empty".to_string(),
        });
    }
    if trimmed.starts_with("-----BEGIN") {
        // Keys pasted into env files often carry literal `\n` sequences.
        return Ok(trimmed.replace("\\n", "\n").into_bytes());
    }
    base64::engine::general_purpose::STANDARD
        .decode(trimmed)
        .map_err(|e| AuthError::InvalidKey {
            message: format!("private key is neither PEM nor base64: {e}"),
        })
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
