//! Reading and verifying `.pkpass` archives.
//!
//! Verification mirrors what a device does when a pass is added: every file
//! must be listed in `manifest.json` with a matching digest, nothing may be
//! missing or extra, and the signature must cover the exact manifest bytes.

use crate::bundle::manifest::{Manifest, MANIFEST_FILE};
use crate::bundle::Bundle;
use crate::crypto::{self, TrustStore, SIGNATURE_FILE};
use crate::{Error, Result};
use openssl::x509::X509;
use std::io::{Cursor, Read};
use tracing::debug;
use zip::ZipArchive;

/// Raw contents of a pass archive.
#[derive(Debug, Clone)]
pub struct PkpassContents {
    /// `signature` bytes
    pub signature: Vec<u8>,
    /// `manifest.json` bytes
    pub manifest: Vec<u8>,
    /// Every other entry
    pub files: Bundle,
    /// Entry names in archive order
    pub entry_order: Vec<String>,
}

/// A pass archive that passed verification.
#[derive(Debug)]
pub struct VerifiedPass {
    pub contents: PkpassContents,
    pub manifest: Manifest,
    pub signers: Vec<X509>,
}

/// Read a pass archive from memory.
///
/// Fails with [`Error::ManifestMismatch`] if `signature` or `manifest.json`
/// is absent.
pub fn read_pkpass(bytes: &[u8]) -> Result<PkpassContents> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(Error::Zip)?;

    let mut signature = None;
    let mut manifest = None;
    let mut files = Bundle::new();
    let mut entry_order = Vec::with_capacity(archive.len());

    for i in 0..archive.len() {
        let mut file = archive.by_index(i).map_err(Error::Zip)?;
        if file.is_dir() {
            continue;
        }
        let name = file.name().to_string();
        if file.enclosed_name().is_none() {
            return Err(Error::ManifestMismatch(format!("{name}: unsafe entry path")));
        }

        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        entry_order.push(name.clone());

        if name == SIGNATURE_FILE {
            signature = Some(data);
        } else if name == MANIFEST_FILE {
            manifest = Some(data);
        } else {
            files.insert(name, data);
        }
    }

    Ok(PkpassContents {
        signature: signature
            .ok_or_else(|| Error::ManifestMismatch(format!("archive has no {SIGNATURE_FILE}")))?,
        manifest: manifest
            .ok_or_else(|| Error::ManifestMismatch(format!("archive has no {MANIFEST_FILE}")))?,
        files,
        entry_order,
    })
}

/// Read a pass archive and check its manifest and signature.
pub fn verify_pkpass(bytes: &[u8], trust: &TrustStore) -> Result<VerifiedPass> {
    let contents = read_pkpass(bytes)?;

    let manifest = Manifest::from_json(&contents.manifest)?;
    manifest.verify(&contents.files)?;
    debug!(files = manifest.len(), algorithm = %manifest.algorithm(), "manifest matches archive");

    let signers = crypto::verify(&contents.signature, &contents.manifest, trust)?;

    Ok(VerifiedPass {
        contents,
        manifest,
        signers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::manifest::DigestAlgorithm;
    use crate::crypto::identity::tests::TestCredentials;
    use crate::pkpass::archive::{create_pkpass, CompressionLevel};

    fn files() -> Bundle {
        let mut files = Bundle::new();
        files.insert("pass.json".into(), br#"{"coupon":{}}"#.to_vec());
        files.insert("icon.png".into(), b"PNG".to_vec());
        files
    }

    fn signed_archive(creds: &TestCredentials, files: &Bundle) -> Vec<u8> {
        let manifest = Manifest::of(files, DigestAlgorithm::Sha1).to_json().unwrap();
        let signature = crypto::sign(&manifest, &creds.identity()).unwrap();
        create_pkpass(&signature, &manifest, files, CompressionLevel::DEFAULT).unwrap()
    }

    #[test]
    fn test_verify_generated_archive() {
        let creds = TestCredentials::generate();
        let bytes = signed_archive(&creds, &files());

        let trust = TrustStore::new([creds.ca_cert.clone()]).unwrap();
        let verified = verify_pkpass(&bytes, &trust).unwrap();
        assert_eq!(verified.manifest.len(), 2);
        assert_eq!(verified.contents.files, files());
        assert_eq!(verified.contents.entry_order[..2], ["signature", "manifest.json"]);
        assert_eq!(verified.signers.len(), 1);
    }

    #[test]
    fn test_tampered_file_fails() {
        let creds = TestCredentials::generate();
        let manifest = Manifest::of(&files(), DigestAlgorithm::Sha1).to_json().unwrap();
        let signature = crypto::sign(&manifest, &creds.identity()).unwrap();

        let mut tampered = files();
        tampered.insert("icon.png".into(), b"GIF".to_vec());
        let bytes = create_pkpass(&signature, &manifest, &tampered, CompressionLevel::NONE).unwrap();

        let trust = TrustStore::new([creds.ca_cert.clone()]).unwrap();
        assert!(matches!(verify_pkpass(&bytes, &trust), Err(Error::ManifestMismatch(_))));
    }

    #[test]
    fn test_missing_signature_fails() {
        let bytes = {
            let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
            zip.start_file("manifest.json", zip::write::SimpleFileOptions::default())
                .unwrap();
            std::io::Write::write_all(&mut zip, b"{}").unwrap();
            zip.finish().unwrap().into_inner()
        };
        assert!(matches!(read_pkpass(&bytes), Err(Error::ManifestMismatch(_))));
    }
}
