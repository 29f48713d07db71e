use anyhow::{anyhow, Context};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::store;

const MANIFEST_ENTRY: &str = "manifest.json";
const LEDGER_ENTRY: &str = "docs/ledger.json";
const PHOTOS_ENTRY: &str = "docs/photos.json";
const NOTIFICATIONS_ENTRY: &str = "docs/notifications.json";
pub const BUNDLE_FORMAT_V1: &str = "presentify-workspace-v1";

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub bundle_format: String,
    pub entry_count: usize,
}

#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub bundle_format_detected: String,
}

/// Bundles the shared workspace documents into a zip. The session document
/// is per-device and stays out of the bundle.
pub fn export_workspace_bundle(
    workspace_path: &Path,
    out_path: &Path,
) -> anyhow::Result<ExportSummary> {
    let ledger_path = workspace_path.join(store::LEDGER_DOC);
    if !ledger_path.is_file() {
        return Err(anyhow!(
            "workspace ledger not found: {}",
            ledger_path.display()
        ));
    }
    let ledger_bytes = std::fs::read(&ledger_path)
        .with_context(|| format!("failed to read {}", ledger_path.display()))?;
    let ledger_sha256 = hex_digest(&ledger_bytes);

    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }
    let out_file = File::create(out_path)
        .with_context(|| format!("failed to create output file {}", out_path.display()))?;
    let mut zip = ZipWriter::new(out_file);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let exported_at = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let manifest = json!({
        "format": BUNDLE_FORMAT_V1,
        "version": 1,
        "appVersion": env!("CARGO_PKG_VERSION"),
        "exportedAt": exported_at,
        "ledgerSha256": ledger_sha256,
    });
    zip.start_file(MANIFEST_ENTRY, opts)
        .context("failed to start manifest entry")?;
    zip.write_all(
        serde_json::to_string_pretty(&manifest)
            .context("failed to serialize manifest")?
            .as_bytes(),
    )
    .context("failed to write manifest entry")?;

    zip.start_file(LEDGER_ENTRY, opts)
        .context("failed to start ledger entry")?;
    zip.write_all(&ledger_bytes)
        .context("failed to write ledger entry")?;
    let mut entry_count = 2;

    for (doc, entry) in [
        (store::PHOTOS_DOC, PHOTOS_ENTRY),
        (store::NOTIFICATIONS_DOC, NOTIFICATIONS_ENTRY),
    ] {
        let path = workspace_path.join(doc);
        if !path.is_file() {
            continue;
        }
        zip.start_file(entry, opts)
            .with_context(|| format!("failed to start entry {}", entry))?;
        let mut f = File::open(&path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        std::io::copy(&mut f, &mut zip)
            .with_context(|| format!("failed to write entry {}", entry))?;
        entry_count += 1;
    }

    zip.finish().context("failed to finalize zip bundle")?;

    Ok(ExportSummary {
        bundle_format: BUNDLE_FORMAT_V1.to_string(),
        entry_count,
    })
}

/// Restores bundled documents into the workspace. The ledger document is
/// verified against the manifest digest and moved into place via a temp
/// file, so a bad bundle never clobbers a good workspace.
pub fn import_workspace_bundle(
    in_path: &Path,
    workspace_path: &Path,
) -> anyhow::Result<ImportSummary> {
    std::fs::create_dir_all(workspace_path)
        .with_context(|| format!("failed to create workspace {}", workspace_path.display()))?;

    let in_file = File::open(in_path)
        .with_context(|| format!("failed to open bundle {}", in_path.display()))?;
    let mut archive = ZipArchive::new(in_file).context("invalid zip archive")?;

    let mut manifest_text = String::new();
    archive
        .by_name(MANIFEST_ENTRY)
        .context("bundle missing manifest.json")?
        .read_to_string(&mut manifest_text)
        .context("failed to read manifest.json")?;
    let manifest: serde_json::Value =
        serde_json::from_str(&manifest_text).context("manifest.json is invalid JSON")?;
    let format = manifest
        .get("format")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    if format != BUNDLE_FORMAT_V1 {
        return Err(anyhow!("unsupported bundle format: {}", format));
    }
    let expected_sha = manifest
        .get("ledgerSha256")
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow!("manifest missing ledgerSha256"))?
        .to_string();

    let mut ledger_bytes = Vec::new();
    archive
        .by_name(LEDGER_ENTRY)
        .context("bundle missing docs/ledger.json")?
        .read_to_end(&mut ledger_bytes)
        .context("failed to read ledger entry")?;
    if hex_digest(&ledger_bytes) != expected_sha {
        return Err(anyhow!("ledger digest mismatch; refusing to import"));
    }

    let dst = workspace_path.join(store::LEDGER_DOC);
    let tmp_dst = workspace_path.join("ledger.json.importing");
    std::fs::write(&tmp_dst, &ledger_bytes)
        .with_context(|| format!("failed to write {}", tmp_dst.display()))?;
    std::fs::rename(&tmp_dst, &dst)
        .with_context(|| format!("failed to move imported ledger to {}", dst.display()))?;

    for (entry, doc) in [
        (PHOTOS_ENTRY, store::PHOTOS_DOC),
        (NOTIFICATIONS_ENTRY, store::NOTIFICATIONS_DOC),
    ] {
        let mut bytes = Vec::new();
        match archive.by_name(entry) {
            Ok(mut f) => {
                f.read_to_end(&mut bytes)
                    .with_context(|| format!("failed to read entry {}", entry))?;
            }
            Err(_) => continue,
        }
        let path = workspace_path.join(doc);
        std::fs::write(&path, &bytes)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }

    Ok(ImportSummary {
        bundle_format_detected: BUNDLE_FORMAT_V1.to_string(),
    })
}

fn hex_digest(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        out.push_str(&format!("{:02x}", b));
    }
    out
}
