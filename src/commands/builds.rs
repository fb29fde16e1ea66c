use std::path::PathBuf;

use anyhow::Result;

use super::{print_reply, Globals};
use crate::errors::{CliError, CliErrorKind};

pub async fn add(
    globals: &Globals,
    application_id: String,
    file: PathBuf,
    subscription_type: Option<String>,
) -> Result<()> {
    let mut api = globals.connect("aps").await?;
    let reply = api
        .add_build(&file, Some(&application_id), true, true, subscription_type.as_deref())
        .await
        .map_err(CliError::from)?;
    print_reply(reply)
}

pub async fn delete(globals: &Globals, build_id: String) -> Result<()> {
    let mut api = globals.connect("aps").await?;
    let reply = api.delete_build(&build_id).await.map_err(CliError::from)?;
    print_reply(reply)
}

pub async fn list(
    globals: &Globals,
    application_id: Option<String>,
    build_id: Option<String>,
    subscription_type: Option<String>,
) -> Result<()> {
    let mut api = globals.connect("aps").await?;
    let reply = api
        .list_builds(application_id.as_deref(), build_id.as_deref(), subscription_type.as_deref())
        .await
        .map_err(CliError::from)?;
    print_reply(reply)
}

pub async fn set_mapping_file(globals: &Globals, build_id: String, file: PathBuf) -> Result<()> {
    let mut api = globals.connect("aps").await?;
    if !api.set_mapping_file(&build_id, &file).await {
        return Err(CliError::new(CliErrorKind::Runtime("mapping file upload failed".into())).into());
    }
    Ok(())
}
