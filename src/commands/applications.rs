use std::path::PathBuf;

use anyhow::Result;

use super::{print_reply, Globals};
use crate::api::applications::Permissions;
use crate::errors::CliError;

pub async fn add(
    globals: &Globals,
    name: String,
    package_id: String,
    os: String,
    permissions: Permissions,
    group: Option<String>,
    subscription_type: Option<String>,
) -> Result<()> {
    let mut api = globals.connect("aps").await?;
    let reply = api
        .add_application(&name, &package_id, &os, &permissions, group.as_deref(), subscription_type.as_deref())
        .await
        .map_err(CliError::from)?;
    print_reply(reply)
}

pub async fn update(
    globals: &Globals,
    application_id: String,
    name: String,
    permissions: Permissions,
) -> Result<()> {
    let mut api = globals.connect("aps").await?;
    let reply = api
        .update_application(&application_id, &name, &permissions)
        .await
        .map_err(CliError::from)?;
    print_reply(reply)
}

pub async fn list(
    globals: &Globals,
    application_id: Option<String>,
    group: Option<String>,
    subscription_type: Option<String>,
) -> Result<()> {
    let mut api = globals.connect("aps").await?;
    let reply = api
        .list_applications(application_id.as_deref(), group.as_deref(), subscription_type.as_deref())
        .await
        .map_err(CliError::from)?;
    print_reply(reply)
}

pub async fn delete(globals: &Globals, application_id: String) -> Result<()> {
    let mut api = globals.connect("aps").await?;
    let reply = api.delete_application(&application_id).await.map_err(CliError::from)?;
    print_reply(reply)
}

pub async fn set_signing_certificate(
    globals: &Globals,
    application_id: String,
    file: Option<PathBuf>,
) -> Result<()> {
    let mut api = globals.connect("aps").await?;
    let reply = api
        .set_signing_certificate(&application_id, file.as_deref())
        .await
        .map_err(CliError::from)?;
    print_reply(reply)
}
