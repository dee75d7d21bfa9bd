//! Personalization artifacts.
//!
//! Wallet only honours `personalization.json` on passes that carry an NFC
//! payload. Any other pass must not ship the descriptor or its logos.

use super::Bundle;
use crate::schema::{self, Personalization};
use serde_json::Value;
use tracing::warn;

/// Personalization descriptor file.
pub const PERSONALIZATION_FILE: &str = "personalization.json";

/// File name prefix of personalization logos.
pub const LOGO_PREFIX: &str = "personalizationLogo";

/// Whether `personalization.json` content fits the descriptor shape.
pub fn is_valid_descriptor(bytes: &[u8]) -> bool {
    serde_json::from_slice::<Value>(bytes)
        .map(|value| schema::is_valid::<Personalization>(&value))
        .unwrap_or(false)
}

/// Remove personalization files from `bundle` unless they are allowed.
///
/// Pruning happens when the bundle has a descriptor and either the pass has
/// no NFC payload or the descriptor is invalid. Logos are matched by the
/// file name part of each path, so localized copies go too. Returns the
/// removed paths.
pub fn prune(bundle: &mut Bundle, has_nfc: bool) -> Vec<String> {
    let Some(descriptor) = bundle.get(PERSONALIZATION_FILE) else {
        return Vec::new();
    };

    let reason = if !has_nfc {
        "pass has no nfc payload"
    } else if !is_valid_descriptor(descriptor) {
        "invalid personalization descriptor"
    } else {
        return Vec::new();
    };

    let removed: Vec<String> = bundle
        .keys()
        .filter(|path| *path == PERSONALIZATION_FILE || file_name(path).starts_with(LOGO_PREFIX))
        .cloned()
        .collect();
    for path in &removed {
        bundle.remove(path);
    }

    warn!(reason, files = removed.len(), "pruned personalization files");
    removed
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
