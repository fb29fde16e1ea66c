use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

pub mod applications;
pub mod builds;
pub mod protect;
pub mod protection;
pub mod report;

use crate::api::{AuthMode, Credentials, ProtectApi, ServiceReply};
use crate::config::Config;
use crate::error_table;
use crate::errors::{CliError, CliErrorKind};

pub const SUBSCRIPTION_TYPES: &[&str] = &[
    "APPSHIELD_STANDALONE",
    "APPSHIELD_PLATFORM",
    "COUNTERSPY_PLATFORM",
    "XTD_PLATFORM",
];

fn subscription_type_parser() -> clap::builder::PossibleValuesParser {
    clap::builder::PossibleValuesParser::new(SUBSCRIPTION_TYPES)
}

#[derive(clap::ValueEnum, Clone, Debug)]
pub enum LogFormat { Auto, Text, Json }

#[derive(Parser, Debug)]
#[command(name = "aegis", version, about = "Aegis application protection CLI")]
pub struct Cli {
    /// Log level: trace|debug|info|warn|error
    #[arg(long, default_value = "info")]
    pub log_level: String,
    /// Log format: auto|text|json
    #[arg(long, default_value = "auto")]
    pub log_format: LogFormat,
    #[command(flatten)]
    pub globals: Globals,
    #[command(subcommand)]
    pub command: Commands,
}

/// Connection and credential flags shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct Globals {
    /// Client ID (platform accounts: user email)
    #[arg(short = 'c', long, global = true)]
    pub client_id: Option<String>,
    /// Client secret (platform accounts: API key)
    #[arg(short = 's', long, global = true)]
    pub client_secret: Option<String>,
    /// Account lives on the platform SSO rather than the standalone service
    #[arg(short = 'P', long, global = true, default_value_t = false)]
    pub platform: bool,
    /// Override the API gateway URL
    #[arg(long, global = true)]
    pub api_gateway_url: Option<String>,
    /// Override the access token URL
    #[arg(long, global = true)]
    pub access_token_url: Option<String>,
}

impl Globals {
    /// Load configuration, apply the flag overrides and authenticate.
    pub async fn connect(&self, scope: &str) -> Result<ProtectApi> {
        let mut cfg = Config::load()?;
        if let Some(url) = &self.api_gateway_url {
            cfg.api_gateway_url = url.clone();
        }
        if let Some(url) = &self.access_token_url {
            // The flag overrides whichever token endpoint the mode uses.
            if self.platform {
                cfg.platform_access_token_url = url.clone();
            } else {
                cfg.access_token_url = url.clone();
            }
        }

        let (Some(client_id), Some(client_secret)) = (&self.client_id, &self.client_secret) else {
            return Err(CliError::new(CliErrorKind::Usage(
                "missing authentication credentials: a --client-id, --client-secret pair must be provided".into(),
            ))
            .into());
        };
        let credentials = Credentials {
            client_id: client_id.clone(),
            client_secret: client_secret.clone(),
            mode: if self.platform { AuthMode::Platform } else { AuthMode::Standard },
            scope: scope.to_string(),
        };
        let api = ProtectApi::connect(cfg, credentials).await.map_err(CliError::from)?;
        Ok(api)
    }
}

/// Print a backend reply to stdout. JSON pretty-prints with sorted keys;
/// service error payloads additionally log the human-readable description.
pub fn print_reply(reply: ServiceReply) -> Result<()> {
    if let Some(code) = reply.service_error_code() {
        let message = error_table::simple_message(code);
        match error_table::lookup(code) {
            Some(entry) => tracing::error!(code, "{}: {message}", entry.title),
            None => tracing::error!(code, "{message}"),
        }
    }
    match reply {
        ServiceReply::Text(text) => println!("{text}"),
        other => {
            let value = other.into_value();
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
    }
    Ok(())
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Protect an input binary end to end: upload, protect, poll, download
    Protect {
        /// Build file (aab, apk or zipped xcarchive folder)
        #[arg(long)] file: PathBuf,
        #[arg(long, value_parser = subscription_type_parser())] subscription_type: Option<String>,
        /// PEM encoded certificate file
        #[arg(long)] signing_certificate: Option<PathBuf>,
        /// R8/Proguard mapping file for android
        #[arg(long)] mapping_file: Option<PathBuf>,
    },
    /// List applications, optionally restricted by id or group
    ListApplications {
        #[arg(long)] application_id: Option<String>,
        #[arg(long)] group: Option<String>,
        #[arg(long, value_parser = subscription_type_parser())] subscription_type: Option<String>,
    },
    /// Add a new application
    AddApplication {
        #[arg(long, value_parser = ["ios", "android"])] os: String,
        /// Friendly name for the application
        #[arg(long)] name: String,
        #[arg(long)] package_id: String,
        #[arg(long)] group: Option<String>,
        #[arg(long, value_parser = subscription_type_parser())] subscription_type: Option<String>,
        /// Hide the application from other users (implies --no-upload and --no-delete)
        #[arg(long, default_value_t = false)] private: bool,
        /// Prevent other users from uploading new builds
        #[arg(long, default_value_t = false)] no_upload: bool,
        /// Prevent other users from deleting builds
        #[arg(long, default_value_t = false)] no_delete: bool,
    },
    /// Update application name and permissions
    UpdateApplication {
        #[arg(long)] application_id: String,
        #[arg(long)] name: String,
        #[arg(long, default_value_t = false)] private: bool,
        #[arg(long, default_value_t = false)] no_upload: bool,
        #[arg(long, default_value_t = false)] no_delete: bool,
    },
    /// Delete an application and all of its builds
    DeleteApplication {
        #[arg(long)] application_id: String,
    },
    /// Set (or unset) the signing certificate for an application
    SetSigningCertificate {
        #[arg(long)] application_id: String,
        /// PEM encoded certificate file; omit to unset the current certificate
        #[arg(long)] file: Option<PathBuf>,
    },
    /// Attach an R8/Proguard mapping file to a build
    SetMappingFile {
        #[arg(long)] build_id: String,
        #[arg(long)] file: PathBuf,
    },
    /// List builds, optionally restricted by application or build id
    ListBuilds {
        #[arg(long)] application_id: Option<String>,
        #[arg(long)] build_id: Option<String>,
        #[arg(long, value_parser = subscription_type_parser())] subscription_type: Option<String>,
    },
    /// Add a new build to an application
    AddBuild {
        #[arg(long)] application_id: String,
        /// Build file (apk or zipped xcarchive folder)
        #[arg(long)] file: PathBuf,
        #[arg(long, value_parser = subscription_type_parser())] subscription_type: Option<String>,
    },
    /// Delete a build
    DeleteBuild {
        #[arg(long)] build_id: String,
    },
    /// Initiate protection of a previously added build
    ProtectStart {
        #[arg(long)] build_id: String,
    },
    /// Get the status of a build, including protection progress
    ProtectGetStatus {
        #[arg(long)] build_id: String,
    },
    /// Cancel protection of a build
    ProtectCancel {
        #[arg(long)] build_id: String,
    },
    /// Download a previously protected build
    ProtectDownload {
        #[arg(long)] build_id: String,
    },
    /// Information about the user and organization
    GetAccountInfo {},
    /// Extract and display the application package id from a file
    DisplayApplicationPackageId {
        /// Input file (zipped xcarchive folder)
        #[arg(long)] file: PathBuf,
    },
    /// Fetch the SAIL configuration
    GetSailConfig {
        #[arg(long, value_parser = ["ios", "android"])] os: String,
        #[arg(long)] version: Option<String>,
    },
    /// Backend service version
    GetVersion {},
}
