use std::path::PathBuf;

use anyhow::Result;

use super::{print_reply, Globals};
use crate::errors::CliError;
use crate::metadata;

pub async fn account_info(globals: &Globals) -> Result<()> {
    let mut api = globals.connect("aps").await?;
    let reply = api.get_account_info().await.map_err(CliError::from)?;
    print_reply(reply)
}

pub async fn sail_config(globals: &Globals, os: String, version: Option<String>) -> Result<()> {
    // The SAIL configuration endpoint needs its own token scope.
    let mut api = globals.connect("sail-config").await?;
    let reply = api.get_sail_config(&os, version.as_deref()).await.map_err(CliError::from)?;
    print_reply(reply)
}

pub async fn version(globals: &Globals) -> Result<()> {
    let mut api = globals.connect("aps").await?;
    let reply = api.get_version().await.map_err(CliError::from)?;
    print_reply(reply)
}

pub async fn display_application_package_id(globals: &Globals, file: PathBuf) -> Result<()> {
    // Auth is required for parity with the service commands even though the
    // extraction itself is local.
    let _api = globals.connect("aps").await?;
    let package_id = metadata::extract_package_id(&file).map_err(CliError::from)?;
    println!("{package_id}");
    Ok(())
}
