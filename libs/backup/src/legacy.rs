//! Untagged store dumps written before backups carried a `kind`.
//!
//! ```json
//! {
//!   "version": "0.1.0",
//!   "exportedAt": 1700000000000,
//!   "stores": {
//!     "moduleSettings": { "enabled": { "notes": true } },
//!     "notes": { "items": [] },
//!     "tasks": { "items": [] },
//!     "appMeta": { "theme": "dark" },
//!     "userState": { "displayName": "Creator", "avatarDataUrl": null }
//!   }
//! }
//! ```
//!
//! These are imported as a core backup. `appMeta` only held the theme mode;
//! a full import applies that mode and leaves the palette to the theme store.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tracing::debug;

use crate::document::{BackupKind, ThemeSection};
use crate::normalize::{normalize_note, normalize_task};
use crate::plan::ImportPlan;

impl ImportPlan {
    pub(crate) fn from_legacy(
        doc: &Map<String, Value>,
        stores: &Map<String, Value>,
        now_ms: i64,
    ) -> Self {
        debug!(stores = stores.len(), "Translating legacy store dump");

        let mut plan = Self::empty(BackupKind::Core, true);
        plan.read_version(doc.get("version"));
        plan.read_user(stores.get("userState"));
        plan.read_enabled(stores.get("moduleSettings").and_then(|s| s.get("enabled")));
        plan.notes = plan.read_module(stores.get("notes"), normalize_note, now_ms);
        plan.tasks = plan.read_module(stores.get("tasks"), normalize_task, now_ms);
        plan.read_legacy_theme(stores.get("appMeta").and_then(|m| m.get("theme")));
        plan
    }

    fn read_legacy_theme(&mut self, raw: Option<&Value>) {
        match raw.map(|v| v.as_str()) {
            None => {}
            Some(Some(mode @ ("light" | "dark"))) => {
                self.theme = Some(ThemeSection {
                    mode: mode.to_string(),
                    vars: BTreeMap::new(),
                });
            }
            Some(_) => self.skipped += 1,
        }
    }
}
