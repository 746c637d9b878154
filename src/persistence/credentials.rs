use crate::persistence::error::{PersistenceError, PersistenceResult};
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use ring::rand::SystemRandom;
use ring::signature::{RsaKeyPair, RSA_PKCS1_SHA256};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::sync::RwLock;
use tracing::{debug, info};

const DATASTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
/// Refresh this long before the cached token expires
const REFRESH_MARGIN_SECS: i64 = 60;
/// Bearer token the Firestore emulator accepts for admin access
const EMULATOR_TOKEN: &str = "owner";

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".into()
}

/// Google service account key file (the JSON downloaded from the Firebase console).
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccount {
    pub project_id: Option<String>,
    pub private_key_id: Option<String>,
    pub private_key: String,
    pub client_email: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl ServiceAccount {
    pub fn load(path: &Path) -> PersistenceResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => PersistenceError::MissingCredentials(path.to_path_buf()),
            _ => PersistenceError::InvalidCredentials {
                path: path.to_path_buf(),
                reason: e.to_string(),
            },
        })?;
        serde_json::from_str(&raw).map_err(|e| PersistenceError::InvalidCredentials {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    expires_at: DateTime<Utc>,
}

impl AccessToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(REFRESH_MARGIN_SECS) < self.expires_at
    }
}

#[derive(Serialize)]
struct JwtHeader<'a> {
    alg: &'a str,
    typ: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    kid: Option<&'a str>,
}

#[derive(Serialize)]
struct JwtClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
}

/// OAuth2 token minting for a service account (RS256 JWT bearer grant).
pub struct ServiceAccountTokens {
    account: ServiceAccount,
    key: RsaKeyPair,
    rng: SystemRandom,
    cached: RwLock<Option<AccessToken>>,
}

impl ServiceAccountTokens {
    pub fn new(account: ServiceAccount, path: &Path) -> PersistenceResult<Self> {
        let invalid = |reason: &str| PersistenceError::InvalidCredentials {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        };
        let der = pem_to_der(&account.private_key).ok_or_else(|| invalid("private_key is not valid PEM"))?;
        let key = RsaKeyPair::from_pkcs8(&der)
            .map_err(|e| invalid(&format!("private_key rejected: {e}")))?;

        Ok(Self {
            account,
            key,
            rng: SystemRandom::new(),
            cached: RwLock::new(None),
        })
    }

    pub fn client_email(&self) -> &str {
        &self.account.client_email
    }

    pub fn project_id(&self) -> Option<&str> {
        self.account.project_id.as_deref()
    }

    /// Build a signed JWT assertion for the token endpoint.
    fn assertion(&self, now: DateTime<Utc>) -> PersistenceResult<String> {
        let header = JwtHeader {
            alg: "RS256",
            typ: "JWT",
            kid: self.account.private_key_id.as_deref(),
        };
        let iat = now.timestamp();
        let claims = JwtClaims {
            iss: &self.account.client_email,
            scope: DATASTORE_SCOPE,
            aud: &self.account.token_uri,
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        };

        let signing_input = format!(
            "{}.{}",
            b64url(&serde_json::to_vec(&header)?),
            b64url(&serde_json::to_vec(&claims)?)
        );

        let mut sig = vec![0u8; self.key.public().modulus_len()];
        self.key
            .sign(&RSA_PKCS1_SHA256, &self.rng, signing_input.as_bytes(), &mut sig)
            .map_err(|_| PersistenceError::Auth("RSA signing failed".into()))?;

        Ok(format!("{signing_input}.{}", b64url(&sig)))
    }

    async fn exchange(&self, http: &reqwest::Client) -> PersistenceResult<AccessToken> {
        let now = Utc::now();
        let jwt = self.assertion(now)?;

        let resp = http
            .post(&self.account.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", jwt.as_str())])
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(PersistenceError::Auth(format!("HTTP {status}: {body}")));
        }

        let token: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| PersistenceError::Auth(format!("Malformed token response: {e}")))?;
        let lifetime = token.expires_in.unwrap_or(ASSERTION_LIFETIME_SECS);
        debug!("Access token minted for {}, valid {lifetime}s", self.account.client_email);

        Ok(AccessToken {
            value: token.access_token,
            expires_at: now + Duration::seconds(lifetime),
        })
    }

    /// Current bearer token, minting a new one when the cached token is near expiry.
    pub async fn bearer(&self, http: &reqwest::Client) -> PersistenceResult<String> {
        {
            let cached = self.cached.read().await;
            if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(Utc::now())) {
                return Ok(token.value.clone());
            }
        }

        let mut cached = self.cached.write().await;
        // Another task may have refreshed while we waited for the write lock
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(Utc::now())) {
            return Ok(token.value.clone());
        }
        let token = self.exchange(http).await?;
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }
}

/// Where request authorization comes from.
pub enum TokenSource {
    Emulator,
    ServiceAccount(ServiceAccountTokens),
}

impl TokenSource {
    /// Load the service account at `path` and prepare to mint tokens from it.
    pub fn from_file(path: &Path) -> PersistenceResult<Self> {
        let account = ServiceAccount::load(path)?;
        let tokens = ServiceAccountTokens::new(account, path)?;
        info!("Loaded service account {}", tokens.client_email());
        Ok(TokenSource::ServiceAccount(tokens))
    }

    /// Project named in the key file; `None` for the emulator.
    pub fn project_id(&self) -> Option<&str> {
        match self {
            TokenSource::Emulator => None,
            TokenSource::ServiceAccount(tokens) => tokens.project_id(),
        }
    }

    pub async fn bearer(&self, http: &reqwest::Client) -> PersistenceResult<String> {
        match self {
            TokenSource::Emulator => Ok(EMULATOR_TOKEN.to_string()),
            TokenSource::ServiceAccount(tokens) => tokens.bearer(http).await,
        }
    }
}

fn pem_to_der(pem: &str) -> Option<Vec<u8>> {
    let body: String = pem
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("-----"))
        .collect();
    if body.is_empty() {
        return None;
    }
    base64::engine::general_purpose::STANDARD.decode(body).ok()
}

fn b64url(input: &[u8]) -> String {
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(input)
}
