//! Protection workflow orchestration: start, poll to a terminal state,
//! download, and the end-to-end protect command.

use std::path::Path;

use serde_json::Value;
use tracing::{debug, error, info, warn};

use super::{ApiError, ProtectApi, ServiceReply};
use crate::error_table;
use crate::metadata;

/// Non-terminal protection states observed while polling.
const PROTECT_STATES: &[&str] = &["protect_queue", "protect_in_progress"];

/// Side-channel file consumed by external tooling after a download.
const RESULT_FILE: &str = "protect_result.txt";

fn report_service_error(context: &str, code: &str) {
    let message = error_table::simple_message(code);
    match error_table::lookup(code) {
        Some(entry) => error!(code, "{context}: {}: {message}", entry.title),
        None => error!(code, "{context}: {message}"),
    }
}

/// Progress values arrive as strings ("42%") or bare numbers; strings print
/// without the JSON quoting.
fn progress_display(progress: &Value) -> String {
    match progress.as_str() {
        Some(text) => text.to_string(),
        None => progress.to_string(),
    }
}

impl ProtectApi {
    /// Initiate protection of an uploaded build.
    pub async fn protect_start(&mut self, build_id: &str) -> Result<ServiceReply, ApiError> {
        let query = vec![("cmd".to_string(), "protect".to_string())];
        let reply = self.patch(&format!("/builds/{build_id}"), &query).await?;
        debug!(?reply, "protect.start");
        Ok(reply)
    }

    /// Cancel an ongoing protection job.
    pub async fn protect_cancel(&mut self, build_id: &str) -> Result<ServiceReply, ApiError> {
        let query = vec![("cmd".to_string(), "cancel".to_string())];
        let reply = self.patch(&format!("/builds/{build_id}"), &query).await?;
        debug!(?reply, "protect.cancel");
        Ok(reply)
    }

    /// Current protection status: the strongly consistent by-id lookup.
    pub async fn protect_get_status(&mut self, build_id: &str) -> Result<ServiceReply, ApiError> {
        self.list_builds(None, Some(build_id), None).await
    }

    /// Download the protected binary via its presigned URL, then record the
    /// local filename in the result file for downstream tooling.
    pub async fn protect_download(&mut self, build_id: &str) -> Result<String, ApiError> {
        let query = vec![("url".to_string(), "protected".to_string())];
        let reply = self.get(&format!("/builds/{build_id}"), &query).await?;
        let presigned = match reply {
            ServiceReply::Text(url) => url,
            ServiceReply::Json(Value::String(url)) => url,
            other => {
                if let Some(code) = other.service_error_code() {
                    report_service_error("download failed", code);
                }
                return Err(ApiError::Workflow("no download URL for protected build".into()));
            }
        };
        let presigned = presigned.trim().to_string();

        let local_filename = Self::local_filename(&presigned);
        info!("Starting download of protected file");
        self.download_to(&presigned, Path::new(&local_filename)).await?;
        info!("Protected file downloaded to {local_filename}");

        std::fs::write(RESULT_FILE, &local_filename)
            .map_err(|e| ApiError::Workflow(format!("cannot write {RESULT_FILE}: {e}")))?;
        Ok(local_filename)
    }

    /// Start protection and poll until the build leaves the in-progress
    /// states. True only for `protect_done`. Deliberately unbounded: long
    /// jobs are expected, interruption is the operator's call.
    pub async fn protect_build(&mut self, build_id: &str) -> Result<bool, ApiError> {
        info!("Starting protection for build {build_id}");

        let reply = self.protect_start(build_id).await?;
        if let Some(code) = reply.service_error_code() {
            report_service_error("protection start call failed", code);
            debug!("protection start call failed, delete build");
            self.delete_build_best_effort(build_id).await;
            return Ok(false);
        }

        info!("Protection started, will wait for completion of build {build_id}");
        let poll_interval = self.config().poll_interval;

        let final_state = loop {
            let reply = self.protect_get_status(build_id).await?;
            let build = reply.into_value();
            let Some(state) = build.get("state").and_then(Value::as_str) else {
                info!("Failed to get protect status for build {build_id}");
                info!("{build}");
                return Ok(false);
            };
            if !PROTECT_STATES.contains(&state) {
                info!("Protection complete");
                break state.to_string();
            }
            if state == "protect_queue" {
                info!("In protect queue..");
            } else if let Some(progress) = build.pointer("/progressData/progress") {
                info!("Protecting {} complete", progress_display(progress));
            }
            tokio::time::sleep(poll_interval).await;
        };

        Ok(final_state == "protect_done")
    }

    /// End-to-end protect workflow:
    /// add an unassociated build, resolve or create the target application,
    /// associate, upload, protect, poll, download. Every failure before
    /// protection is requested compensates with a build delete; afterwards
    /// the build stays for remote inspection.
    pub async fn protect(
        &mut self,
        file: &Path,
        subscription_type: Option<&str>,
        signing_certificate: Option<&Path>,
        mapping_file: Option<&Path>,
    ) -> Result<bool, ApiError> {
        let reply = self.add_build_without_app(file, true, subscription_type).await?;
        if let Some(code) = reply.service_error_code() {
            error!("Failed to add new build {code}");
            report_service_error("add build failed", code);
            return Ok(false);
        }
        let build = reply
            .as_json()
            .cloned()
            .ok_or_else(|| ApiError::Workflow("unexpected add build response".into()))?;
        let build_id = build
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| ApiError::Workflow("add build response is missing id".into()))?
            .to_string();
        let package_id = build
            .get("applicationPackageId")
            .and_then(Value::as_str)
            .ok_or_else(|| ApiError::Workflow("add build response is missing applicationPackageId".into()))?
            .to_string();

        let prepared = self
            .prepare_build(&build_id, &package_id, file, subscription_type, signing_certificate, mapping_file)
            .await;
        match prepared {
            Ok(true) => {}
            Ok(false) => {
                self.delete_build_best_effort(&build_id).await;
                return Ok(false);
            }
            Err(e) => {
                self.delete_build_best_effort(&build_id).await;
                return Err(e);
            }
        }

        if !self.protect_build(&build_id).await? {
            info!("Protection failed with build id:{build_id}");
            return Ok(false);
        }

        self.protect_download(&build_id).await?;
        // Parsed by external test harnesses to extract the build id. Do not change.
        println!("Protection succeeded with build id:{build_id}");
        info!("Protection succeeded with build id:{build_id}");

        Ok(true)
    }

    /// Application resolution, association, optional artifacts and the main
    /// upload. False means the workflow failed and the caller compensates.
    async fn prepare_build(
        &mut self,
        build_id: &str,
        package_id: &str,
        file: &Path,
        subscription_type: Option<&str>,
        signing_certificate: Option<&Path>,
        mapping_file: Option<&Path>,
    ) -> Result<bool, ApiError> {
        let os = metadata::detect_os(file)?;

        // Find an existing application for this (packageId, os) pair before
        // creating one; concurrent invocations may still race here.
        let applications = self.list_applications(None, None, subscription_type).await?;
        let existing = applications
            .as_json()
            .and_then(Value::as_array)
            .and_then(|apps| {
                apps.iter()
                    .find(|app| {
                        app.get("applicationPackageId").and_then(Value::as_str) == Some(package_id)
                            && app.get("os").and_then(Value::as_str) == Some(os)
                    })
                    .cloned()
            });

        let application = match existing {
            Some(app) => app,
            None => {
                // Name the application after its package id; permissive defaults.
                let permissions = super::applications::Permissions::default();
                let reply = self
                    .add_application(package_id, package_id, os, &permissions, None, subscription_type)
                    .await?;
                if let Some(code) = reply.service_error_code() {
                    error!("Failed to add new application {code}");
                    report_service_error("add application failed", code);
                    return Ok(false);
                }
                reply
                    .as_json()
                    .cloned()
                    .ok_or_else(|| ApiError::Workflow("unexpected add application response".into()))?
            }
        };
        let application_id = application
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| ApiError::Workflow("application response is missing id".into()))?
            .to_string();

        let reply = self.add_build_to_application(build_id, &application_id).await?;
        if let Some(code) = reply.service_error_code() {
            report_service_error("attach build failed", code);
            return Ok(false);
        }

        if let Some(certificate) = signing_certificate {
            self.set_signing_certificate(&application_id, Some(certificate)).await?;
        }
        if let Some(mapping) = mapping_file {
            if !self.set_mapping_file(build_id, mapping).await {
                warn!("mapping file upload failed for build {build_id}");
            }
        }

        if !self.multipart_upload(build_id, file, None).await {
            debug!("upload failed, delete build");
            return Ok(false);
        }
        Ok(true)
    }

    /// Upload an R8/Proguard mapping file as a secondary build artifact.
    pub async fn set_mapping_file(&mut self, build_id: &str, file: &Path) -> bool {
        self.multipart_upload(build_id, file, Some("MAPPING_FILE")).await
    }
}
