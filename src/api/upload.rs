//! Multipart upload engine.
//!
//! A file is split into fixed-size parts, each PUT to a per-part presigned
//! URL; the upload is finalized with the ordered list of entity tags. Any
//! failure after `start-upload` aborts the session with the same ids so the
//! remote side does not leak partial uploads.

use std::io::IsTerminal;
use std::path::Path;

use indicatif::{ProgressBar, ProgressStyle};
use serde_json::{json, Value};
use tokio::io::AsyncReadExt;
use tracing::{debug, info, warn};

use super::{ApiError, ProtectApi, ServiceReply};

/// Minimum part size accepted by the backend object store (5 MiB).
pub const PART_SIZE: usize = 5_242_880;

/// MIME type guess by extension; the backend only needs a rough hint.
pub fn guess_upload_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("apk") => "application/vnd.android.package-archive",
        Some("zip") => "application/zip",
        Some("txt") => "text/plain",
        _ => "application/zip",
    }
}

/// One completed part: entity tag plus its 1-based position.
#[derive(Debug, Clone)]
pub struct UploadPart {
    pub part_number: u64,
    pub etag: String,
}

impl UploadPart {
    fn to_body(&self) -> Value {
        json!({ "ETag": self.etag, "PartNumber": self.part_number })
    }
}

impl ProtectApi {
    /// Start a multipart upload; returns the upload id and canonical name.
    pub async fn upload_start(
        &mut self,
        build_id: &str,
        file: &Path,
        artifact_type: Option<&str>,
    ) -> Result<(String, String), ApiError> {
        let upload_name = file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| ApiError::Workflow(format!("no file name in {}", file.display())))?;
        let mut query = vec![
            ("uploadName".to_string(), upload_name.clone()),
            ("uploadType".to_string(), guess_upload_type(file).to_string()),
        ];
        if let Some(at) = artifact_type {
            query.push(("artifactType".to_string(), at.to_string()));
        }
        let reply = self.get(&format!("/uploads/{build_id}/start-upload"), &query).await?;
        let upload_id = reply
            .as_json()
            .and_then(|v| v.get("UploadId"))
            .and_then(|v| v.as_str())
            .ok_or_else(|| ApiError::Workflow("start upload response is missing UploadId".into()))?
            .to_string();
        Ok((upload_id, upload_name))
    }

    /// Upload one part: fetch its presigned URL, transmit the chunk, and
    /// return the entity tag needed by the complete call.
    pub async fn upload_part(
        &mut self,
        build_id: &str,
        upload_id: &str,
        upload_name: &str,
        part_number: u64,
        data: Vec<u8>,
    ) -> Result<UploadPart, ApiError> {
        let query = vec![
            ("uploadName".to_string(), upload_name.to_string()),
            ("partNumber".to_string(), part_number.to_string()),
            ("uploadId".to_string(), upload_id.to_string()),
        ];
        let reply = self.get(&format!("/uploads/{build_id}/get-upload-url"), &query).await?;
        let url = match reply {
            ServiceReply::Text(url) => url,
            ServiceReply::Json(Value::String(url)) => url,
            other => {
                return Err(ApiError::Workflow(format!(
                    "unexpected get-upload-url response: {:?}",
                    other.service_error_code()
                )))
            }
        };
        let etag = self.transport().put_part(url.trim(), data).await?;
        Ok(UploadPart { part_number, etag })
    }

    pub async fn upload_complete(
        &mut self,
        build_id: &str,
        upload_id: &str,
        upload_name: &str,
        parts: &[UploadPart],
        artifact_type: Option<&str>,
    ) -> Result<(), ApiError> {
        let mut body = json!({
            "parts": parts.iter().map(UploadPart::to_body).collect::<Vec<_>>(),
            "uploadId": upload_id,
            "uploadName": upload_name,
        });
        if let Some(at) = artifact_type {
            body["artifactType"] = Value::String(at.into());
        }
        let reply = self.post(&format!("/uploads/{build_id}/complete-upload"), &body).await?;
        if let Some(code) = reply.service_error_code() {
            return Err(ApiError::Workflow(format!("complete upload rejected: {code}")));
        }
        debug!("upload.complete");
        Ok(())
    }

    /// Abort a multipart upload. Best-effort and idempotent from the caller's
    /// perspective: a rejection for an already-aborted session is only logged.
    pub async fn upload_abort(
        &mut self,
        build_id: &str,
        upload_id: &str,
        upload_name: &str,
        artifact_type: Option<&str>,
    ) -> Result<(), ApiError> {
        let mut body = json!({
            "uploadId": upload_id,
            "uploadName": upload_name,
        });
        if let Some(at) = artifact_type {
            body["artifactType"] = Value::String(at.into());
        }
        let reply = self.post(&format!("/uploads/{build_id}/abort-upload"), &body).await?;
        if let Some(code) = reply.service_error_code() {
            warn!(code, "upload.abort_rejected");
        }
        Ok(())
    }

    /// Upload a file in `PART_SIZE` chunks. Returns true only after a
    /// successful complete; any failure after start triggers exactly one
    /// abort with the ids start returned, and abort failures never propagate.
    pub async fn multipart_upload(
        &mut self,
        build_id: &str,
        file: &Path,
        artifact_type: Option<&str>,
    ) -> bool {
        info!("Uploading application {}", file.display());
        let mut session: Option<(String, String)> = None;
        match self.run_upload(build_id, file, artifact_type, &mut session).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Upload method failed");
                if let Some((upload_id, upload_name)) = session {
                    if let Err(abort_err) = self
                        .upload_abort(build_id, &upload_id, &upload_name, artifact_type)
                        .await
                    {
                        warn!(error = %abort_err, "upload.abort_failed");
                    }
                }
                false
            }
        }
    }

    async fn run_upload(
        &mut self,
        build_id: &str,
        file: &Path,
        artifact_type: Option<&str>,
        session: &mut Option<(String, String)>,
    ) -> Result<(), ApiError> {
        let (upload_id, upload_name) = self.upload_start(build_id, file, artifact_type).await?;
        *session = Some((upload_id.clone(), upload_name.clone()));

        let total = tokio::fs::metadata(file)
            .await
            .map_err(|e| ApiError::Workflow(format!("cannot stat {}: {e}", file.display())))?
            .len();
        let use_progress = std::io::stderr().is_terminal() && total as usize > PART_SIZE;
        let pb = if use_progress {
            let pb = ProgressBar::new(total);
            pb.set_style(
                ProgressStyle::with_template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})",
                )
                .expect("static template")
                .progress_chars("=>-"),
            );
            Some(pb)
        } else {
            None
        };

        let mut reader = tokio::fs::File::open(file)
            .await
            .map_err(|e| ApiError::Workflow(format!("cannot open {}: {e}", file.display())))?;

        // Sequential read, part numbers from 1; the final part may be short.
        let mut parts: Vec<UploadPart> = Vec::new();
        let mut part_number: u64 = 1;
        let mut buf = vec![0u8; PART_SIZE];
        loop {
            let mut read = 0usize;
            while read < PART_SIZE {
                match reader.read(&mut buf[read..]).await {
                    Ok(0) => break,
                    Ok(n) => read += n,
                    Err(e) => {
                        return Err(ApiError::Workflow(format!("cannot read {}: {e}", file.display())))
                    }
                }
            }
            if read == 0 {
                break;
            }
            let part = self
                .upload_part(build_id, &upload_id, &upload_name, part_number, buf[..read].to_vec())
                .await?;
            parts.push(part);
            if let Some(pb) = &pb {
                pb.inc(read as u64);
            }
            part_number += 1;
        }
        if let Some(pb) = &pb {
            pb.finish_and_clear();
        }

        self.upload_complete(build_id, &upload_id, &upload_name, &parts, artifact_type).await
    }
}
