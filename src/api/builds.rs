//! Build lifecycle operations: create, metadata, association, listing,
//! deletion, and the add-build building block used by the protect workflow.

use std::path::Path;

use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::{ApiError, ProtectApi, ServiceReply};
use crate::metadata;

impl ProtectApi {
    /// Create a new build record; without an application id it starts
    /// unassociated.
    pub async fn create_build(
        &mut self,
        application_id: Option<&str>,
        subscription_type: Option<&str>,
    ) -> Result<ServiceReply, ApiError> {
        let mut body = json!({});
        if let Some(id) = application_id {
            body["applicationId"] = Value::String(id.into());
        }
        if let Some(st) = subscription_type {
            body["subscriptionType"] = Value::String(st.into());
        }
        let reply = self.post("/builds", &body).await?;
        debug!(?reply, "builds.create");
        Ok(reply)
    }

    /// Extract manifest/plist metadata from the input file and submit it.
    /// Must happen before upload so the backend can validate the binary.
    pub async fn set_build_metadata(
        &mut self,
        build_id: &str,
        file: &Path,
    ) -> Result<ServiceReply, ApiError> {
        let os_data = metadata::extract_os_data(file)?;
        let os = metadata::detect_os(file)?;
        let body = json!({ "os": os, "osData": os_data });
        let reply = self.put(&format!("/builds/{build_id}/metadata"), &body).await?;
        debug!(?reply, "builds.set_metadata");
        Ok(reply)
    }

    pub async fn delete_build(&mut self, build_id: &str) -> Result<ServiceReply, ApiError> {
        let reply = self.delete(&format!("/builds/{build_id}")).await?;
        debug!(?reply, "builds.delete");
        Ok(reply)
    }

    /// Compensating delete: never lets a cleanup failure mask the original
    /// workflow failure.
    pub(crate) async fn delete_build_best_effort(&mut self, build_id: &str) {
        match self.delete_build(build_id).await {
            Ok(reply) => {
                if let Some(code) = reply.service_error_code() {
                    warn!(build_id, code, "builds.compensating_delete_rejected");
                }
            }
            Err(e) => warn!(build_id, error = %e, "builds.compensating_delete_failed"),
        }
    }

    pub async fn add_build_to_application(
        &mut self,
        build_id: &str,
        application_id: &str,
    ) -> Result<ServiceReply, ApiError> {
        let body = json!({ "applicationId": application_id });
        let reply = self.put(&format!("/builds/{build_id}/app"), &body).await?;
        debug!(?reply, "builds.attach");
        Ok(reply)
    }

    /// List builds, or fetch one by id.
    ///
    /// The by-id lookup is strongly consistent and is what the polling loop
    /// uses. Listing without a build id goes through an eventually consistent
    /// index, so wait the settle delay first (skipped when configured to 0).
    pub async fn list_builds(
        &mut self,
        application_id: Option<&str>,
        build_id: Option<&str>,
        subscription_type: Option<&str>,
    ) -> Result<ServiceReply, ApiError> {
        let mut query: Vec<(String, String)> = Vec::new();
        let path = match build_id {
            Some(id) => format!("/builds/{id}"),
            None => {
                if let Some(app) = application_id {
                    query.push(("app".into(), app.into()));
                }
                "/builds".to_string()
            }
        };
        if let Some(st) = subscription_type {
            query.push(("subscriptionType".into(), st.into()));
        }

        if build_id.is_none() && !self.config().settle_delay.is_zero() {
            debug!(delay = ?self.config().settle_delay, "builds.settle_wait");
            tokio::time::sleep(self.config().settle_delay).await;
        }

        self.get(&path, &query).await
    }

    /// Create a build, set its metadata, and (when associated) upload the
    /// binary. Returns the last backend reply; compensates with a delete when
    /// a later step fails.
    pub async fn add_build(
        &mut self,
        file: &Path,
        application_id: Option<&str>,
        set_metadata: bool,
        upload: bool,
        subscription_type: Option<&str>,
    ) -> Result<ServiceReply, ApiError> {
        let reply = self.create_build(application_id, subscription_type).await?;
        if reply.service_error_code().is_some() {
            return Ok(reply);
        }
        let build_id = reply
            .as_json()
            .and_then(|v| v.get("id"))
            .and_then(|v| v.as_str())
            .ok_or_else(|| ApiError::Workflow("create build response is missing id".into()))?
            .to_string();

        let mut last = reply;
        if set_metadata {
            let metadata_reply = match self.set_build_metadata(&build_id, file).await {
                Ok(r) => r,
                Err(e) => {
                    debug!("set build metadata failed, delete build");
                    self.delete_build_best_effort(&build_id).await;
                    return Err(e);
                }
            };
            if metadata_reply.service_error_code().is_some() {
                debug!("set build metadata failed, delete build");
                self.delete_build_best_effort(&build_id).await;
                return Ok(metadata_reply);
            }
            // Carry the created build's identifiers forward; a backend that
            // echoes the updated record on the metadata call wins field by
            // field.
            last = match (last, metadata_reply) {
                (ServiceReply::Json(mut build), ServiceReply::Json(update)) => {
                    if let (Some(dst), Some(src)) = (build.as_object_mut(), update.as_object()) {
                        for (key, value) in src {
                            dst.insert(key.clone(), value.clone());
                        }
                    }
                    ServiceReply::Json(build)
                }
                (created, _) => created,
            };
        }

        // Upload requires an associated build.
        if application_id.is_none() || !upload {
            return Ok(last);
        }

        if !self.multipart_upload(&build_id, file, None).await {
            debug!("upload failed, delete build");
            self.delete_build_best_effort(&build_id).await;
        }
        Ok(last)
    }

    /// Add a build that is not yet associated to an application.
    pub async fn add_build_without_app(
        &mut self,
        file: &Path,
        set_metadata: bool,
        subscription_type: Option<&str>,
    ) -> Result<ServiceReply, ApiError> {
        info!("Adding new build with subscription type {subscription_type:?}");
        self.add_build(file, None, set_metadata, false, subscription_type).await
    }
}
