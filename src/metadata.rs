//! Extraction of OS identification metadata from build artifacts.
//!
//! The backend validates uploads against the manifest (android) or Info.plist
//! (ios) of the input archive. We pull those entries out of the zip and ship
//! them base64 encoded; no binary-XML parsing happens client side.

use std::fs::File;
use std::io::{Cursor, Read};
use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::{json, Value};
use tracing::error;
use zip::ZipArchive;

use crate::api::transport::ApiError;

const ALLOWED_SUFFIXES: &[&str] = &[".apk", ".aab", ".xcarchive.zip"];

/// Deduce the target OS from the file suffix.
pub fn detect_os(path: &Path) -> Result<&'static str, ApiError> {
    let name = path.to_string_lossy();
    if name.ends_with(".apk") || name.ends_with(".aab") {
        Ok("android")
    } else if name.ends_with(".xcarchive.zip") {
        Ok("ios")
    } else {
        Err(ApiError::UnsupportedFile(
            "unsupported file suffix (not .apk, .aab or .xcarchive.zip)".into(),
        ))
    }
}

fn open_archive(path: &Path) -> Result<ZipArchive<File>, ApiError> {
    let file = File::open(path)
        .map_err(|e| ApiError::UnsupportedFile(format!("cannot open {}: {e}", path.display())))?;
    ZipArchive::new(file)
        .map_err(|_| ApiError::UnsupportedFile("input file is not in zipped format".into()))
}

fn read_entry_b64(archive: &mut ZipArchive<File>, name: &str) -> Result<String, ApiError> {
    let mut entry = archive
        .by_name(name)
        .map_err(|_| ApiError::UnsupportedFile(format!("archive is missing {name}")))?;
    let mut buf = Vec::with_capacity(entry.size() as usize);
    entry
        .read_to_end(&mut buf)
        .map_err(|e| ApiError::UnsupportedFile(format!("failed to read {name}: {e}")))?;
    Ok(BASE64.encode(buf))
}

fn dirname(entry: &str) -> &str {
    entry.rsplit_once('/').map(|(d, _)| d).unwrap_or("")
}

/// Extract the OS specific metadata blob submitted with `set_build_metadata`.
pub fn extract_os_data(path: &Path) -> Result<Value, ApiError> {
    let name = path.to_string_lossy().to_string();
    if !ALLOWED_SUFFIXES.iter().any(|s| name.ends_with(s)) {
        error!("input file must be an aab, apk or zipped xcarchive");
        return Err(ApiError::UnsupportedFile(
            "input file must be an aab, apk or zipped xcarchive".into(),
        ));
    }

    let mut archive = open_archive(path)?;

    if name.ends_with(".apk") {
        return Ok(json!({ "androidManifest": read_entry_b64(&mut archive, "AndroidManifest.xml")? }));
    }
    if name.ends_with(".aab") {
        return Ok(json!({
            "androidManifestProtobuf": read_entry_b64(&mut archive, "base/manifest/AndroidManifest.xml")?
        }));
    }

    // Zipped xcarchive: find the archive root folder and collect both the
    // top-level Info.plist (XML) and the app bundle Info.plist (binary).
    let names: Vec<String> = archive.file_names().map(|s| s.to_string()).collect();
    let root = names
        .iter()
        .find(|n| !n.starts_with('.'))
        .map(|n| dirname(n).to_string())
        .unwrap_or_default();

    let mut info = serde_json::Map::new();
    for entry in &names {
        if entry.contains(".app/Info.plist") && entry.matches(".app/").count() == 1 {
            info.insert("iosBinaryPlist".into(), Value::String(read_entry_b64(&mut archive, entry)?));
        }
        if *entry == format!("{root}/Info.plist") {
            info.insert("iosXmlPlist".into(), Value::String(read_entry_b64(&mut archive, entry)?));
        }
    }
    Ok(Value::Object(info))
}

fn decode_plist(b64: &str) -> Result<plist::Value, ApiError> {
    let bytes = BASE64
        .decode(b64)
        .map_err(|e| ApiError::UnsupportedFile(format!("invalid plist encoding: {e}")))?;
    plist::Value::from_reader(Cursor::new(bytes))
        .map_err(|e| ApiError::UnsupportedFile(format!("failed to parse Info.plist: {e}")))
}

/// Extract the application package id from the input file.
///
/// Supported for zipped xcarchives; apk/aab package ids live in the binary
/// AndroidManifest.xml, which is an external parser concern.
pub fn extract_package_id(path: &Path) -> Result<String, ApiError> {
    let name = path.to_string_lossy();
    if name.ends_with(".apk") || name.ends_with(".aab") {
        return Err(ApiError::UnsupportedFile(
            "cannot display application package id for android binaries, pass --package-id to add-application instead".into(),
        ));
    }

    let data = extract_os_data(path)?;
    if let Some(b64) = data.get("iosXmlPlist").and_then(Value::as_str) {
        let plist = decode_plist(b64)?;
        plist
            .as_dictionary()
            .and_then(|d| d.get("ApplicationProperties"))
            .and_then(|v| v.as_dictionary())
            .and_then(|d| d.get("CFBundleIdentifier"))
            .and_then(|v| v.as_string())
            .map(str::to_string)
            .ok_or_else(|| ApiError::UnsupportedFile("plist is missing CFBundleIdentifier".into()))
    } else if let Some(b64) = data.get("iosBinaryPlist").and_then(Value::as_str) {
        let plist = decode_plist(b64)?;
        plist
            .as_dictionary()
            .and_then(|d| d.get("CFBundleIdentifier"))
            .and_then(|v| v.as_string())
            .map(|s| s.replace('"', ""))
            .ok_or_else(|| ApiError::UnsupportedFile("plist is missing CFBundleIdentifier".into()))
    } else {
        Err(ApiError::UnsupportedFile("unsupported file type".into()))
    }
}
