use std::path::PathBuf;

use anyhow::Result;

use super::Globals;
use crate::errors::{CliError, CliErrorKind};

pub async fn handle(
    globals: &Globals,
    file: PathBuf,
    subscription_type: Option<String>,
    signing_certificate: Option<PathBuf>,
    mapping_file: Option<PathBuf>,
) -> Result<()> {
    let mut api = globals.connect("aps").await?;
    let succeeded = api
        .protect(
            &file,
            subscription_type.as_deref(),
            signing_certificate.as_deref(),
            mapping_file.as_deref(),
        )
        .await
        .map_err(CliError::from)?;
    if !succeeded {
        return Err(CliError::new(CliErrorKind::Runtime("protection did not complete".into())).into());
    }
    Ok(())
}
