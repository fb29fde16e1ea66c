use anyhow::Result;
use clap::Parser;
use std::process;
use std::time::Instant;
use tracing::{info, info_span};

use aegis_cli::api::applications::Permissions;
use aegis_cli::commands::{self, Cli, Commands};
use aegis_cli::errors::CliError;
use aegis_cli::logging::init_logging;

#[tokio::main]
async fn main() -> Result<()> {
    let start = Instant::now();
    let cli = Cli::parse();
    init_logging(&cli.log_level, &cli.log_format)?;
    let exit_code = match dispatch(cli).await {
        Ok(()) => 0,
        Err(e) => classify_exit_code(&e),
    };
    info!(took_ms = %start.elapsed().as_millis(), event = "cli.finished", exit_code);
    if exit_code != 0 {
        process::exit(exit_code);
    }
    Ok(())
}

async fn dispatch(cli: Cli) -> Result<()> {
    let start = Instant::now();
    let globals = cli.globals;
    let result = match cli.command {
        Commands::Protect { file, subscription_type, signing_certificate, mapping_file } => {
            let _span = info_span!("cmd.protect").entered();
            commands::protect::handle(&globals, file, subscription_type, signing_certificate, mapping_file).await
        }
        Commands::ListApplications { application_id, group, subscription_type } => {
            let _span = info_span!("cmd.list_applications").entered();
            commands::applications::list(&globals, application_id, group, subscription_type).await
        }
        Commands::AddApplication { os, name, package_id, group, subscription_type, private, no_upload, no_delete } => {
            let _span = info_span!("cmd.add_application").entered();
            let permissions = Permissions { private, no_upload, no_delete };
            commands::applications::add(&globals, name, package_id, os, permissions, group, subscription_type).await
        }
        Commands::UpdateApplication { application_id, name, private, no_upload, no_delete } => {
            let _span = info_span!("cmd.update_application").entered();
            let permissions = Permissions { private, no_upload, no_delete };
            commands::applications::update(&globals, application_id, name, permissions).await
        }
        Commands::DeleteApplication { application_id } => {
            let _span = info_span!("cmd.delete_application").entered();
            commands::applications::delete(&globals, application_id).await
        }
        Commands::SetSigningCertificate { application_id, file } => {
            let _span = info_span!("cmd.set_signing_certificate").entered();
            commands::applications::set_signing_certificate(&globals, application_id, file).await
        }
        Commands::SetMappingFile { build_id, file } => {
            let _span = info_span!("cmd.set_mapping_file").entered();
            commands::builds::set_mapping_file(&globals, build_id, file).await
        }
        Commands::ListBuilds { application_id, build_id, subscription_type } => {
            let _span = info_span!("cmd.list_builds").entered();
            commands::builds::list(&globals, application_id, build_id, subscription_type).await
        }
        Commands::AddBuild { application_id, file, subscription_type } => {
            let _span = info_span!("cmd.add_build").entered();
            commands::builds::add(&globals, application_id, file, subscription_type).await
        }
        Commands::DeleteBuild { build_id } => {
            let _span = info_span!("cmd.delete_build").entered();
            commands::builds::delete(&globals, build_id).await
        }
        Commands::ProtectStart { build_id } => {
            let _span = info_span!("cmd.protect_start").entered();
            commands::protection::start(&globals, build_id).await
        }
        Commands::ProtectGetStatus { build_id } => {
            let _span = info_span!("cmd.protect_get_status").entered();
            commands::protection::get_status(&globals, build_id).await
        }
        Commands::ProtectCancel { build_id } => {
            let _span = info_span!("cmd.protect_cancel").entered();
            commands::protection::cancel(&globals, build_id).await
        }
        Commands::ProtectDownload { build_id } => {
            let _span = info_span!("cmd.protect_download").entered();
            commands::protection::download(&globals, build_id).await
        }
        Commands::GetAccountInfo {} => {
            let _span = info_span!("cmd.get_account_info").entered();
            commands::report::account_info(&globals).await
        }
        Commands::DisplayApplicationPackageId { file } => {
            let _span = info_span!("cmd.display_application_package_id").entered();
            commands::report::display_application_package_id(&globals, file).await
        }
        Commands::GetSailConfig { os, version } => {
            let _span = info_span!("cmd.get_sail_config").entered();
            commands::report::sail_config(&globals, os, version).await
        }
        Commands::GetVersion {} => {
            let _span = info_span!("cmd.get_version").entered();
            commands::report::version(&globals).await
        }
    };
    let took = start.elapsed().as_millis();
    match &result {
        Ok(_) => info!(event = "cmd.finished", took_ms = %took),
        Err(e) => {
            eprintln!("error: {e}");
            info!(event = "cmd.failed", took_ms = %took);
        }
    }
    result
}

fn classify_exit_code(e: &anyhow::Error) -> i32 {
    use std::error::Error;
    let mut cur: &dyn Error = e.as_ref();
    loop {
        if let Some(cli) = cur.downcast_ref::<CliError>() {
            tracing::debug!(?cli, code = cli.kind.code(), "classified_cli_error");
            return cli.kind.code();
        }
        if let Some(ioe) = cur.downcast_ref::<std::io::Error>() {
            eprintln!("io error: {ioe}");
            return 30;
        }
        if let Some(src) = cur.source() {
            cur = src;
        } else {
            break;
        }
    }
    eprintln!("runtime error: {e}");
    20
}
