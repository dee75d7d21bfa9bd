//! Pass bundle contents.
//!
//! A pass model is split in two partitions:
//!
//! | Partition | Contents |
//! |-----------|----------|
//! | root bundle | `pass.json`, images, `personalization.json`, ... |
//! | localization bundle | `<lang>.lproj` folders, each a file name → bytes map |
//!
//! At generation time the localization folders are flattened into the root
//! bundle as `<lang>.lproj/<file>` (see [`localization`]), the
//! personalization files are pruned when they are not allowed
//! (see [`personalization`]), and every file is digested into the manifest
//! (see [`manifest`]).
//!
//! # Examples
//!
//! ```
//! use passkit::bundle::PartitionedBundle;
//!
//! let model = PartitionedBundle::from_buffers([
//!     ("pass.json".to_string(), br#"{ "generic": {} }"#.to_vec()),
//!     ("icon.png".to_string(), vec![0x89, b'P', b'N', b'G']),
//!     ("it.lproj/pass.strings".to_string(), br#""HELLO" = "Ciao";"#.to_vec()),
//! ])?;
//! assert_eq!(model.bundle().len(), 2);
//! assert!(model.localization().contains_key("it.lproj"));
//! # Ok::<(), passkit::Error>(())
//! ```

pub mod localization;
pub mod manifest;
pub mod personalization;

pub use localization::{LocalizationMerger, Translations};
pub use manifest::{DigestAlgorithm, Manifest, ManifestBuilder};

use crate::{Error, Result};
use path_slash::PathExt;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Template metadata file.
pub const PASS_JSON: &str = "pass.json";

/// Suffix of localization folders.
pub const LPROJ_SUFFIX: &str = ".lproj";

/// Extension appended to model directories given without one.
pub const MODEL_EXTENSION: &str = "pass";

/// Flat relative path → file bytes.
pub type Bundle = BTreeMap<String, Vec<u8>>;

/// `<lang>.lproj` folder name → files of that folder.
pub type LocalizationBundle = BTreeMap<String, Bundle>;

/// Normalize separators to `/` and strip leading `./`.
pub fn normalize_path(path: &str) -> String {
    let path = path.replace('\\', "/");
    path.trim_start_matches("./").to_string()
}

fn is_hidden(path: &str) -> bool {
    path.split('/').any(|component| component.starts_with('.'))
}

/// A pass model split into root and localization partitions.
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionedBundle {
    bundle: Bundle,
    localization: LocalizationBundle,
}

impl PartitionedBundle {
    /// Build a model from its two partitions.
    ///
    /// Fails with [`Error::Construction`] when `pass.json` or an icon is
    /// missing, when a localization folder name lacks the `.lproj` suffix,
    /// or when a root path points inside a localization folder.
    pub fn new(bundle: Bundle, localization: LocalizationBundle) -> Result<Self> {
        if let Some(folder) = localization.keys().find(|f| !f.ends_with(LPROJ_SUFFIX)) {
            return Err(Error::Construction(format!(
                "localization folder {folder} does not end with {LPROJ_SUFFIX}"
            )));
        }
        if let Some(path) = bundle.keys().find(|p| is_localized_path(p)) {
            return Err(Error::Construction(format!(
                "root bundle file {path} belongs in the localization bundle"
            )));
        }

        let model = Self {
            bundle,
            localization,
        };
        model.check_required_files()?;
        Ok(model)
    }

    /// Build a model from a flat path → bytes map.
    ///
    /// Paths under a `<lang>.lproj/` folder go to the localization bundle;
    /// hidden files are skipped.
    pub fn from_buffers(files: impl IntoIterator<Item = (String, Vec<u8>)>) -> Result<Self> {
        let mut bundle = Bundle::new();
        let mut localization = LocalizationBundle::new();

        for (path, bytes) in files {
            let path = normalize_path(&path);
            if is_hidden(&path) {
                debug!(path = %path, "skipping hidden model file");
                continue;
            }
            match split_localized_path(&path) {
                Some((folder, file)) => {
                    localization
                        .entry(folder.to_string())
                        .or_default()
                        .insert(file.to_string(), bytes);
                }
                None => {
                    bundle.insert(path, bytes);
                }
            }
        }

        Self::new(bundle, localization)
    }

    /// Load a model directory.
    ///
    /// A path without extension gets `.pass` appended. Top-level files go
    /// to the root bundle, files inside top-level `*.lproj` directories to
    /// the localization bundle; other directories and hidden files are
    /// ignored.
    ///
    /// Fails with [`Error::ModelNotFound`] if the directory does not exist.
    pub fn from_dir(path: impl AsRef<Path>) -> Result<Self> {
        let model_dir = model_path(path.as_ref());
        if !model_dir.is_dir() {
            return Err(Error::ModelNotFound(model_dir));
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&model_dir).min_depth(1).max_depth(2).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                Error::Io(io::Error::other(format!("Failed to walk model directory: {e}")))
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let relative = entry
                .path()
                .strip_prefix(&model_dir)
                .map_err(|_| {
                    Error::Io(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        "Failed to compute relative path",
                    ))
                })?
                .to_slash_lossy()
                .into_owned();

            if entry.depth() == 2 && split_localized_path(&relative).is_none() {
                debug!(path = %relative, "skipping file outside localization folders");
                continue;
            }

            let bytes = fs::read(entry.path()).map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => Error::FileNotFound(entry.path().to_path_buf()),
                _ => Error::Io(e),
            })?;
            files.push((relative, bytes));
        }

        Self::from_buffers(files)
    }

    pub fn bundle(&self) -> &Bundle {
        &self.bundle
    }

    pub fn localization(&self) -> &LocalizationBundle {
        &self.localization
    }

    pub fn into_parts(self) -> (Bundle, LocalizationBundle) {
        (self.bundle, self.localization)
    }

    /// Language codes that have a localization folder.
    pub fn languages(&self) -> impl Iterator<Item = &str> {
        self.localization
            .keys()
            .filter_map(|folder| folder.strip_suffix(LPROJ_SUFFIX))
    }

    fn check_required_files(&self) -> Result<()> {
        if !self.bundle.contains_key(PASS_JSON) {
            return Err(Error::Construction(format!("model has no {PASS_JSON}")));
        }
        let has_icon = self
            .bundle
            .keys()
            .any(|path| !path.contains('/') && path.starts_with("icon"));
        if !has_icon {
            return Err(Error::Construction("model has no icon file".into()));
        }
        Ok(())
    }
}

fn model_path(path: &Path) -> PathBuf {
    if path.extension().is_some() {
        path.to_path_buf()
    } else {
        path.with_extension(MODEL_EXTENSION)
    }
}

/// Split `<lang>.lproj/<file>` into its folder and file parts.
fn split_localized_path(path: &str) -> Option<(&str, &str)> {
    let (folder, file) = path.split_once('/')?;
    (folder.ends_with(LPROJ_SUFFIX) && folder.len() > LPROJ_SUFFIX.len() && !file.is_empty())
        .then_some((folder, file))
}

fn is_localized_path(path: &str) -> bool {
    split_localized_path(path).is_some()
}
