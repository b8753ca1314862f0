//! Service-account OAuth2 tokens for Vertex AI
//!
//! A JWT signed with the account's RSA key is exchanged for an access token,
//! which is cached until shortly before it expires.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;

use crate::error::{Error, Result};

const SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";
const TOKEN_LIFETIME_SECS: u64 = 3600;
/// Refresh this long before the token's nominal expiry
const REFRESH_MARGIN: Duration = Duration::from_secs(5 * 60);

/// GCP authentication manager
pub struct GcpAuth {
    key_path: PathBuf,
    project_id: String,
    http: reqwest::Client,
    token: RwLock<Option<CachedToken>>,
}

#[derive(Clone)]
struct CachedToken {
    access_token: String,
    refresh_at: Instant,
}

#[derive(Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    token_uri: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

impl GcpAuth {
    /// Create from service account JSON key file
    pub fn from_service_account(key_path: impl AsRef<Path>, project_id: String) -> Result<Self> {
        let key_path = key_path.as_ref().to_path_buf();
        if !key_path.is_file() {
            return Err(Error::Config(format!(
                "Service account key not found: {}",
                key_path.display()
            )));
        }

        Ok(Self {
            key_path,
            project_id,
            http: reqwest::Client::new(),
            token: RwLock::new(None),
        })
    }

    /// Get project ID
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Shared HTTP client; pair with [`GcpAuth::get_token`] via `bearer_auth`
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Get a valid access token (refreshing if needed)
    pub async fn get_token(&self) -> Result<String> {
        if let Some(cached) = self.token.read().await.as_ref() {
            if cached.refresh_at > Instant::now() {
                return Ok(cached.access_token.clone());
            }
        }

        let mut slot = self.token.write().await;
        // Another task may have refreshed while we waited for the lock
        if let Some(cached) = slot.as_ref() {
            if cached.refresh_at > Instant::now() {
                return Ok(cached.access_token.clone());
            }
        }

        let (access_token, lifetime) = self.refresh_token().await?;
        tracing::debug!("Refreshed GCP access token for {}", self.project_id);
        *slot = Some(CachedToken {
            access_token: access_token.clone(),
            refresh_at: Instant::now() + lifetime.saturating_sub(REFRESH_MARGIN),
        });

        Ok(access_token)
    }

    async fn refresh_token(&self) -> Result<(String, Duration)> {
        let raw = tokio::fs::read_to_string(&self.key_path).await.map_err(|e| {
            Error::Config(format!(
                "Failed to read service account key {}: {}",
                self.key_path.display(),
                e
            ))
        })?;
        let key: ServiceAccountKey = serde_json::from_str(&raw)
            .map_err(|e| Error::Config(format!("Invalid service account key format: {}", e)))?;

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| Error::Config(format!("System clock before epoch: {}", e)))?
            .as_secs();
        let assertion = sign_assertion(&key, now)?;

        let response = self
            .http
            .post(&key.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Config(format!(
                "Token exchange failed ({}): {}",
                status, body
            )));
        }

        let token: TokenResponse = response.json().await?;
        let lifetime = Duration::from_secs(token.expires_in.unwrap_or(TOKEN_LIFETIME_SECS));
        Ok((token.access_token, lifetime))
    }
}

fn jwt_claims(key: &ServiceAccountKey, issued_at: u64) -> serde_json::Value {
    serde_json::json!({
        "iss": key.client_email,
        "scope": SCOPE,
        "aud": key.token_uri,
        "iat": issued_at,
        "exp": issued_at + TOKEN_LIFETIME_SECS,
    })
}

/// RS256-signed JWT bearer assertion
fn sign_assertion(key: &ServiceAccountKey, issued_at: u64) -> Result<String> {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(jwt_claims(key, issued_at).to_string().as_bytes());
    let signing_input = format!("{}.{}", header, payload);

    let pem = pem::parse(key.private_key.replace("\\n", "\n"))
        .map_err(|e| Error::Config(format!("Failed to parse private key PEM: {}", e)))?;
    let key_pair = ring::signature::RsaKeyPair::from_pkcs8(pem.contents())
        .map_err(|e| Error::Config(format!("Failed to parse private key: {:?}", e)))?;

    let mut signature = vec![0u8; key_pair.public().modulus_len()];
    key_pair
        .sign(
            &ring::signature::RSA_PKCS1_SHA256,
            &ring::rand::SystemRandom::new(),
            signing_input.as_bytes(),
            &mut signature,
        )
        .map_err(|e| Error::Config(format!("Failed to sign JWT: {:?}", e)))?;

    Ok(format!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode(&signature)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> ServiceAccountKey {
        ServiceAccountKey {
            client_email: "svc@demo.iam.gserviceaccount.com".into(),
            private_key: "not a key".into(),
            token_uri: "https://oauth2.googleapis.com/token".into(),
        }
    }

    #[test]
    fn test_missing_key_file_is_config_error() {
        let result = GcpAuth::from_service_account("/nonexistent/key.json", "demo".into());
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_claims_cover_one_hour() {
        let claims = jwt_claims(&key(), 1_000);
        assert_eq!(claims["iss"], "svc@demo.iam.gserviceaccount.com");
        assert_eq!(claims["scope"], SCOPE);
        assert_eq!(claims["exp"], 4_600);
    }

    #[test]
    fn test_invalid_private_key_is_rejected() {
        assert!(matches!(sign_assertion(&key(), 0), Err(Error::Config(_))));
    }
}
