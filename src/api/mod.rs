//! Client for the Aegis application protection REST API.
//!
//! `ProtectApi` owns the transport, endpoint configuration and bearer token;
//! the operation groups (applications, builds, upload, protect) hang their
//! methods off it in their own modules.

pub mod applications;
pub mod auth;
pub mod builds;
pub mod protect;
pub mod transport;
pub mod upload;

use std::path::Path;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::Method;
use tokio::io::AsyncWriteExt;
use tracing::debug;

pub use auth::{AuthMode, Credentials, Token};
pub use transport::{ApiError, RetryPolicy, ServiceReply, Transport};

use crate::config::Config;

/// Version negotiated with the backend through the Accept header.
pub const OPENAPI_VERSION: &str = "1.1.0";

/// Re-authenticate when the token expires within this margin.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(45);

pub struct ProtectApi {
    transport: Transport,
    config: Config,
    credentials: Credentials,
    token: Option<Token>,
}

impl ProtectApi {
    /// Build a client and authenticate immediately.
    pub async fn connect(config: Config, credentials: Credentials) -> Result<Self, ApiError> {
        let mut api = Self {
            transport: Transport::new(RetryPolicy::default()),
            config,
            credentials,
            token: None,
        };
        api.ensure_authenticated().await?;
        Ok(api)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.api_gateway_url.trim_end_matches('/'))
    }

    fn accept_header() -> HeaderValue {
        HeaderValue::from_str(&format!(
            "application/vnd.aegis.appshield.cloud;version={OPENAPI_VERSION}"
        ))
        .expect("static accept header")
    }

    async fn ensure_authenticated(&mut self) -> Result<HeaderMap, ApiError> {
        let needs_token = match &self.token {
            None => true,
            Some(t) => t.expires_within(TOKEN_REFRESH_MARGIN),
        };
        if needs_token {
            debug!("auth.acquiring_token");
            let token = auth::authenticate(&self.transport, &self.config, &self.credentials).await?;
            self.token = Some(token);
        }
        let token = self.token.as_ref().expect("token just ensured");
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&token.header_value)
                .map_err(|_| ApiError::Authentication("token is not a valid header value".into()))?,
        );
        headers.insert(ACCEPT, Self::accept_header());
        Ok(headers)
    }

    pub(crate) async fn get(
        &mut self,
        path: &str,
        query: &[(String, String)],
    ) -> Result<ServiceReply, ApiError> {
        let headers = self.ensure_authenticated().await?;
        self.transport.request(Method::GET, &self.url(path), &headers, query, None).await
    }

    pub(crate) async fn post(
        &mut self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<ServiceReply, ApiError> {
        let headers = self.ensure_authenticated().await?;
        self.transport.request(Method::POST, &self.url(path), &headers, &[], Some(body)).await
    }

    pub(crate) async fn put(
        &mut self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<ServiceReply, ApiError> {
        let headers = self.ensure_authenticated().await?;
        self.transport.request(Method::PUT, &self.url(path), &headers, &[], Some(body)).await
    }

    pub(crate) async fn patch(
        &mut self,
        path: &str,
        query: &[(String, String)],
    ) -> Result<ServiceReply, ApiError> {
        let headers = self.ensure_authenticated().await?;
        self.transport.request(Method::PATCH, &self.url(path), &headers, query, None).await
    }

    pub(crate) async fn patch_json(
        &mut self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<ServiceReply, ApiError> {
        let headers = self.ensure_authenticated().await?;
        self.transport.request(Method::PATCH, &self.url(path), &headers, &[], Some(body)).await
    }

    pub(crate) async fn delete(&mut self, path: &str) -> Result<ServiceReply, ApiError> {
        let headers = self.ensure_authenticated().await?;
        self.transport.request(Method::DELETE, &self.url(path), &headers, &[], None).await
    }

    pub(crate) fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Stream a (presigned) URL to a local file.
    pub(crate) async fn download_to(&self, url: &str, dest: &Path) -> Result<(), ApiError> {
        let response = self.transport.download(url).await?;
        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| ApiError::Workflow(format!("cannot create {}: {e}", dest.display())))?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let bytes = chunk.map_err(|e| ApiError::Transport(format!("download interrupted: {e}")))?;
            file.write_all(&bytes)
                .await
                .map_err(|e| ApiError::Workflow(format!("cannot write {}: {e}", dest.display())))?;
        }
        file.flush()
            .await
            .map_err(|e| ApiError::Workflow(format!("cannot flush {}: {e}", dest.display())))?;
        Ok(())
    }

    /// Local filename for a presigned URL (last path segment, query stripped).
    pub(crate) fn local_filename(url: &str) -> String {
        let tail = url.rsplit('/').next().unwrap_or(url);
        tail.split('?').next().unwrap_or(tail).to_string()
    }

    pub async fn get_account_info(&mut self) -> Result<ServiceReply, ApiError> {
        self.get("/report/account", &[]).await
    }

    pub async fn get_statistics(
        &mut self,
        start: &str,
        end: Option<&str>,
    ) -> Result<ServiceReply, ApiError> {
        let mut query = vec![("start".to_string(), start.to_string())];
        if let Some(end) = end {
            query.push(("end".to_string(), end.to_string()));
        }
        self.get("/report/statistics", &query).await
    }

    /// Download every artifact of a build into a directory named after it.
    pub async fn get_build_artifacts(&mut self, build_id: &str) -> Result<(), ApiError> {
        let query = vec![("buildId".to_string(), build_id.to_string())];
        let reply = self.get("/report/artifacts", &query).await?;
        let urls = match reply.as_json().and_then(|v| v.as_array()) {
            Some(urls) => urls.clone(),
            None => return Err(ApiError::Workflow("unexpected artifact listing response".into())),
        };

        let outdir = std::env::current_dir()
            .map_err(|e| ApiError::Workflow(format!("cannot resolve working directory: {e}")))?
            .join(build_id);
        let _ = std::fs::remove_dir_all(&outdir);
        std::fs::create_dir(&outdir)
            .map_err(|e| ApiError::Workflow(format!("cannot create {}: {e}", outdir.display())))?;

        for url in urls.iter().filter_map(|u| u.as_str()) {
            let name = Self::local_filename(url);
            tracing::info!("Downloading artifact {name}");
            self.download_to(url, &outdir.join(&name)).await?;
        }
        tracing::info!("Build artifacts downloaded to {}", outdir.display());
        Ok(())
    }

    pub async fn get_sail_config(
        &mut self,
        os: &str,
        version: Option<&str>,
    ) -> Result<ServiceReply, ApiError> {
        let mut query = vec![("os".to_string(), os.to_string())];
        if let Some(version) = version {
            query.push(("version".to_string(), version.to_string()));
        }
        self.get("/sail_config", &query).await
    }

    pub async fn get_version(&mut self) -> Result<ServiceReply, ApiError> {
        self.get("/version", &[]).await
    }
}
