//! manifest.json generation for pass bundles
//!
//! The manifest maps every file of the finished bundle to the hex digest of
//! its content. It is the payload covered by the detached signature, so any
//! change to a file after the manifest is built invalidates the pass.

use super::Bundle;
use crate::{Error, Result};
use rayon::prelude::*;
use sha1::{Digest, Sha1};
use sha2::Sha256;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Name of the manifest inside the archive.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Hash used for manifest entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DigestAlgorithm {
    /// SHA-1, what Wallet expects
    #[default]
    Sha1,
    Sha256,
}

impl DigestAlgorithm {
    /// Lowercase hex digest of `data`.
    pub fn digest_hex(&self, data: &[u8]) -> String {
        match self {
            DigestAlgorithm::Sha1 => hex::encode(Sha1::digest(data)),
            DigestAlgorithm::Sha256 => hex::encode(Sha256::digest(data)),
        }
    }

    /// Length of a hex digest produced by this algorithm.
    pub fn hex_len(&self) -> usize {
        match self {
            DigestAlgorithm::Sha1 => 40,
            DigestAlgorithm::Sha256 => 64,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DigestAlgorithm::Sha1 => "sha1",
            DigestAlgorithm::Sha256 => "sha256",
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DigestAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('-', "").as_str() {
            "sha1" => Ok(DigestAlgorithm::Sha1),
            "sha256" => Ok(DigestAlgorithm::Sha256),
            _ => Err(Error::Construction(format!("unknown digest algorithm: {s}"))),
        }
    }
}

/// Builder for the manifest of a bundle
#[derive(Debug, Clone, Default)]
pub struct ManifestBuilder {
    algorithm: DigestAlgorithm,
    files: BTreeMap<String, String>,
}

impl ManifestBuilder {
    pub fn new(algorithm: DigestAlgorithm) -> Self {
        Self {
            algorithm,
            files: BTreeMap::new(),
        }
    }

    /// Hash every file of `bundle`, in parallel.
    pub fn scan(&mut self, bundle: &Bundle) -> &mut Self {
        let algorithm = self.algorithm;
        let entries: Vec<(&String, &Vec<u8>)> = bundle.iter().collect();

        let results: Vec<(String, String)> = entries
            .par_iter()
            .map(|(path, data)| ((*path).clone(), algorithm.digest_hex(data)))
            .collect();

        self.files.extend(results);
        self
    }

    /// Hash and add a single file, replacing an earlier entry for `path`.
    pub fn add_file(&mut self, path: impl Into<String>, data: &[u8]) -> &mut Self {
        self.files.insert(path.into(), self.algorithm.digest_hex(data));
        self
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn build(&self) -> Manifest {
        Manifest {
            algorithm: self.algorithm,
            entries: self.files.clone(),
        }
    }
}

/// Path → hex digest of a finished bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    algorithm: DigestAlgorithm,
    entries: BTreeMap<String, String>,
}

impl Manifest {
    /// Build the manifest of `bundle` in one step.
    pub fn of(bundle: &Bundle, algorithm: DigestAlgorithm) -> Self {
        ManifestBuilder::new(algorithm).scan(bundle).build()
    }

    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.entries.get(path).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(p, d)| (p.as_str(), d.as_str()))
    }

    /// Compact JSON object with keys in sorted order.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.entries)?)
    }

    /// Parse manifest bytes. The algorithm is inferred from digest length.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let entries: BTreeMap<String, String> = serde_json::from_slice(bytes)?;
        let algorithm = match entries.values().next().map(String::len) {
            Some(64) => DigestAlgorithm::Sha256,
            _ => DigestAlgorithm::Sha1,
        };
        if let Some((path, _)) = entries
            .iter()
            .find(|(_, digest)| digest.len() != algorithm.hex_len())
        {
            return Err(Error::ManifestMismatch(format!(
                "{path}: digest length does not match {algorithm}"
            )));
        }
        Ok(Self { algorithm, entries })
    }

    /// Check that `bundle` holds exactly the listed files with matching
    /// digests.
    pub fn verify(&self, bundle: &Bundle) -> Result<()> {
        if let Some(path) = self.entries.keys().find(|p| !bundle.contains_key(*p)) {
            return Err(Error::ManifestMismatch(format!("{path}: listed but missing")));
        }
        for (path, data) in bundle {
            let Some(expected) = self.entries.get(path) else {
                return Err(Error::ManifestMismatch(format!("{path}: not listed")));
            };
            if !expected.eq_ignore_ascii_case(&self.algorithm.digest_hex(data)) {
                return Err(Error::ManifestMismatch(format!("{path}: digest differs")));
            }
        }
        Ok(())
    }
}
