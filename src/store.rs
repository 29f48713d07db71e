use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::ledger::{LedgerState, UserRole};
use crate::seed;

pub const LEDGER_DOC: &str = "ledger.json";
pub const PHOTOS_DOC: &str = "photos.json";
pub const SESSION_DOC: &str = "session.json";
pub const NOTIFICATIONS_DOC: &str = "notifications.json";

/// Placeholder stored in the ledger document in place of an inline photo.
pub const PHOTO_REF_PREFIX: &str = "local_photo:";
const DATA_URL_PREFIX: &str = "data:image";

/// The signed-in user: role, tenant, and a snapshot of the user row taken at
/// login time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub role: UserRole,
    pub institution_id: String,
    pub user: serde_json::Value,
}

/// Owns the workspace directory of JSON documents and the in-memory ledger
/// loaded from it. Mutating handlers save the affected documents before
/// replying, so on-disk state always reflects a completed operation.
pub struct Store {
    root: PathBuf,
    pub ledger: LedgerState,
    pub session: Option<Session>,
    /// Class ids that already received a "send QR codes" reminder. Entries
    /// never expire.
    pub notified_class_ids: BTreeSet<String>,
}

impl Store {
    /// Opens a workspace, falling back document by document: a missing or
    /// corrupt ledger yields the seeded demo dataset; corrupt side documents
    /// are discarded individually. Never fails on bad content, only on I/O.
    pub fn open(root: &Path, today: NaiveDate) -> Result<Store> {
        std::fs::create_dir_all(root)
            .with_context(|| format!("failed to create workspace {}", root.display()))?;

        let mut ledger: LedgerState =
            read_doc(&root.join(LEDGER_DOC)).unwrap_or_else(|| seed::demo_state(today));
        let photos: BTreeMap<String, String> =
            read_doc(&root.join(PHOTOS_DOC)).unwrap_or_default();
        rehydrate_photos(&mut ledger, &photos);

        let session: Option<Session> = read_doc(&root.join(SESSION_DOC));
        let notified: BTreeSet<String> =
            read_doc(&root.join(NOTIFICATIONS_DOC)).unwrap_or_default();

        Ok(Store {
            root: root.to_path_buf(),
            ledger,
            session,
            notified_class_ids: notified,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes the ledger document. Inline photo data URLs are extracted to
    /// the side map first so the main document stays small.
    pub fn save_ledger(&self) -> Result<()> {
        let mut doc = self.ledger.clone();
        let captured = dehydrate_photos(&mut doc);
        if !captured.is_empty() {
            let mut photos: BTreeMap<String, String> =
                read_doc(&self.root.join(PHOTOS_DOC)).unwrap_or_default();
            photos.extend(captured);
            write_doc(&self.root.join(PHOTOS_DOC), &photos)?;
        }
        write_doc(&self.root.join(LEDGER_DOC), &doc)
    }

    pub fn save_session(&self) -> Result<()> {
        let path = self.root.join(SESSION_DOC);
        match &self.session {
            Some(session) => write_doc(&path, session),
            None => {
                if path.exists() {
                    std::fs::remove_file(&path).with_context(|| {
                        format!("failed to remove session document {}", path.display())
                    })?;
                }
                Ok(())
            }
        }
    }

    pub fn save_notifications(&self) -> Result<()> {
        write_doc(&self.root.join(NOTIFICATIONS_DOC), &self.notified_class_ids)
    }
}

fn rehydrate_photos(ledger: &mut LedgerState, photos: &BTreeMap<String, String>) {
    for student in &mut ledger.students {
        if let Some(id) = student.avatar_url.strip_prefix(PHOTO_REF_PREFIX) {
            if let Some(data) = photos.get(id) {
                student.avatar_url = data.clone();
            }
            // A missing side entry keeps the placeholder; the UI falls back
            // to a generic avatar.
        }
    }
}

/// Replaces captured data-URL avatars with placeholder refs and returns the
/// extracted `student id -> data URL` entries. Plain web URLs pass through.
fn dehydrate_photos(ledger: &mut LedgerState) -> BTreeMap<String, String> {
    let mut captured = BTreeMap::new();
    for student in &mut ledger.students {
        if student.avatar_url.starts_with(DATA_URL_PREFIX) {
            captured.insert(student.id.clone(), student.avatar_url.clone());
            student.avatar_url = format!("{}{}", PHOTO_REF_PREFIX, student.id);
        }
    }
    captured
}

/// Missing file reads as `None`; a file that exists but fails to parse is
/// logged to stderr (stdout carries the protocol) and also reads as `None`.
fn read_doc<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let raw = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&raw) {
        Ok(v) => Some(v),
        Err(e) => {
            eprintln!(
                "presentifyd: discarding corrupt document {}: {}",
                path.display(),
                e
            );
            None
        }
    }
}

fn write_doc<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let tmp = path.with_extension("json.writing");
    let body = serde_json::to_string_pretty(value)
        .with_context(|| format!("failed to serialize {}", path.display()))?;
    std::fs::write(&tmp, body)
        .with_context(|| format!("failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("failed to move {} into place", path.display()))?;
    Ok(())
}
