use anyhow::Result;

use super::{print_reply, Globals};
use crate::errors::CliError;

pub async fn start(globals: &Globals, build_id: String) -> Result<()> {
    let mut api = globals.connect("aps").await?;
    let reply = api.protect_start(&build_id).await.map_err(CliError::from)?;
    print_reply(reply)
}

pub async fn cancel(globals: &Globals, build_id: String) -> Result<()> {
    let mut api = globals.connect("aps").await?;
    let reply = api.protect_cancel(&build_id).await.map_err(CliError::from)?;
    print_reply(reply)
}

pub async fn get_status(globals: &Globals, build_id: String) -> Result<()> {
    let mut api = globals.connect("aps").await?;
    let reply = api.protect_get_status(&build_id).await.map_err(CliError::from)?;
    print_reply(reply)
}

pub async fn download(globals: &Globals, build_id: String) -> Result<()> {
    let mut api = globals.connect("aps").await?;
    let filename = api.protect_download(&build_id).await.map_err(CliError::from)?;
    println!("{filename}");
    Ok(())
}
