//! Credential provider: exchanges client credentials for a bearer token.
//!
//! One provider, two modes. Standard mode talks HTTP Basic to the token
//! endpoint with a scope; platform mode posts the account email and key as a
//! JSON body to the platform SSO endpoint. Expiry is normalized to an
//! absolute instant in both modes.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use serde_json::json;
use tracing::{debug, info};

use crate::api::transport::{ApiError, Transport};
use crate::config::Config;

const AUTH_FAILED_MSG: &str = "Failed to authenticate, please check client ID and client secret value";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    Standard,
    Platform,
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub mode: AuthMode,
    pub scope: String,
}

#[derive(Debug, Clone)]
pub struct Token {
    /// Full `Authorization` header value (`Bearer <token>`).
    pub header_value: String,
    pub expires_at: Option<SystemTime>,
}

impl Token {
    pub fn expires_within(&self, margin: Duration) -> bool {
        match self.expires_at {
            Some(at) => SystemTime::now() + margin > at,
            None => false,
        }
    }
}

pub async fn authenticate(
    transport: &Transport,
    config: &Config,
    credentials: &Credentials,
) -> Result<Token, ApiError> {
    let (url, headers, body, remaining_expiry) = match credentials.mode {
        AuthMode::Platform => {
            info!("Authenticating with platform API key");
            let body = json!({
                "userEmail": credentials.client_id,
                "apiKey": credentials.client_secret,
            });
            (config.platform_access_token_url.clone(), HeaderMap::new(), body, true)
        }
        AuthMode::Standard => {
            info!("Authenticating with client credentials");
            let basic = BASE64.encode(format!("{}:{}", credentials.client_id, credentials.client_secret));
            let mut headers = HeaderMap::new();
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Basic {basic}"))
                    .map_err(|_| ApiError::Authentication(AUTH_FAILED_MSG.into()))?,
            );
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            let body = json!({ "scope": credentials.scope });
            (config.access_token_url.clone(), headers, body, false)
        }
    };

    let reply = transport.request(Method::POST, &url, &headers, &[], Some(&body)).await?;
    let payload = reply.into_value();

    let Some(token) = payload.get("token").and_then(|v| v.as_str()) else {
        // Never echo the secret here.
        return Err(ApiError::Authentication(AUTH_FAILED_MSG.into()));
    };

    let expires_at = if remaining_expiry {
        // Platform endpoint reports seconds remaining.
        payload
            .get("expirationTime")
            .and_then(|v| v.as_f64())
            .map(|secs| SystemTime::now() + Duration::from_secs_f64(secs.max(0.0)))
    } else {
        // Standard endpoint reports an absolute epoch timestamp.
        payload
            .get("expiry")
            .and_then(|v| v.as_f64())
            .map(|epoch| UNIX_EPOCH + Duration::from_secs_f64(epoch.max(0.0)))
    };
    if let Some(at) = expires_at {
        debug!(expires_at = ?at, "auth.token_expiry");
    }

    Ok(Token { header_value: format!("Bearer {token}"), expires_at })
}
