//! Application CRUD operations.

use std::path::Path;

use serde_json::{json, Value};
use tracing::debug;

use super::{ApiError, ProtectApi, ServiceReply};

/// Access restrictions requested for an application. Private implies that
/// other users can neither upload nor delete, whatever the other flags say.
#[derive(Debug, Clone, Copy, Default)]
pub struct Permissions {
    pub private: bool,
    pub no_upload: bool,
    pub no_delete: bool,
}

impl Permissions {
    fn upload_allowed(&self) -> bool {
        if self.private { false } else { !self.no_upload }
    }

    fn delete_allowed(&self) -> bool {
        if self.private { false } else { !self.no_delete }
    }
}

impl ProtectApi {
    pub async fn add_application(
        &mut self,
        name: &str,
        package_id: &str,
        os: &str,
        permissions: &Permissions,
        group: Option<&str>,
        subscription_type: Option<&str>,
    ) -> Result<ServiceReply, ApiError> {
        let mut body = json!({
            "applicationName": name,
            "applicationPackageId": package_id,
            "permissionPrivate": permissions.private,
            "permissionUpload": permissions.upload_allowed(),
            "permissionDelete": permissions.delete_allowed(),
            "os": os,
        });
        if let Some(group) = group {
            body["group"] = Value::String(group.into());
        }
        if let Some(st) = subscription_type {
            body["subscriptionType"] = Value::String(st.into());
        }
        let reply = self.post("/applications", &body).await?;
        debug!(?reply, "applications.add");
        Ok(reply)
    }

    pub async fn update_application(
        &mut self,
        application_id: &str,
        name: &str,
        permissions: &Permissions,
    ) -> Result<ServiceReply, ApiError> {
        let body = json!({
            "applicationName": name,
            "permissionPrivate": permissions.private,
            "permissionUpload": permissions.upload_allowed(),
            "permissionDelete": permissions.delete_allowed(),
        });
        let reply = self.patch_json(&format!("/applications/{application_id}"), &body).await?;
        debug!(?reply, "applications.update");
        Ok(reply)
    }

    /// List applications, or fetch one by id.
    ///
    /// Listing without an id hits an eventually consistent index; the settle
    /// delay compensates for read-after-write anomalies and must stay.
    pub async fn list_applications(
        &mut self,
        application_id: Option<&str>,
        group: Option<&str>,
        subscription_type: Option<&str>,
    ) -> Result<ServiceReply, ApiError> {
        let mut query: Vec<(String, String)> = Vec::new();
        if let Some(st) = subscription_type {
            query.push(("subscriptionType".into(), st.into()));
        }
        let path = match application_id {
            Some(id) => format!("/applications/{id}"),
            None => {
                if let Some(group) = group {
                    query.push(("group".into(), group.into()));
                }
                "/applications".to_string()
            }
        };

        if application_id.is_none() && !self.config().settle_delay.is_zero() {
            debug!(delay = ?self.config().settle_delay, "applications.settle_wait");
            tokio::time::sleep(self.config().settle_delay).await;
        }

        self.get(&path, &query).await
    }

    pub async fn delete_application(&mut self, application_id: &str) -> Result<ServiceReply, ApiError> {
        let reply = self.delete(&format!("/applications/{application_id}")).await?;
        debug!(?reply, "applications.delete");
        Ok(reply)
    }

    /// Upload (or unset, when `file` is None) the PEM signing certificate.
    pub async fn set_signing_certificate(
        &mut self,
        application_id: &str,
        file: Option<&Path>,
    ) -> Result<ServiceReply, ApiError> {
        let mut body = json!({});
        if let Some(path) = file {
            let certificate = std::fs::read_to_string(path)
                .map_err(|e| ApiError::Workflow(format!("cannot read certificate {}: {e}", path.display())))?;
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            body = json!({ "certificate": certificate, "certificateFileName": file_name });
        }
        let reply = self
            .put(&format!("/applications/{application_id}/signing-certificate"), &body)
            .await?;
        debug!(?reply, "applications.set_signing_certificate");
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn private_forces_upload_and_delete_off() {
        let p = Permissions { private: true, no_upload: false, no_delete: false };
        assert!(!p.upload_allowed());
        assert!(!p.delete_allowed());
    }

    #[test]
    fn default_permissions_are_permissive() {
        let p = Permissions::default();
        assert!(!p.private);
        assert!(p.upload_allowed());
        assert!(p.delete_allowed());
    }
}
