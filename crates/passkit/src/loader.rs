//! Loading models and credentials from disk.
//!
//! [`create_pass`] reads the model directory and the credential files
//! concurrently and builds a [`Pass`] once both are available.

use crate::bundle::PartitionedBundle;
use crate::crypto::SigningIdentity;
use crate::schema::Overrides;
use crate::{Error, Pass, Result};
use secrecy::SecretString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Credential files of a signing identity.
///
/// The signer can be given either as a PEM certificate plus PEM key, or as
/// a PKCS#12 container.
#[derive(Debug, Clone)]
pub struct IdentitySource {
    wwdr: PathBuf,
    signer: SignerFiles,
    passphrase: Option<SecretString>,
}

#[derive(Debug, Clone)]
enum SignerFiles {
    Pem { certificate: PathBuf, key: PathBuf },
    Pkcs12(PathBuf),
}

impl IdentitySource {
    /// PEM certificate and PEM private key.
    pub fn new(
        wwdr: impl AsRef<Path>,
        signer_cert: impl AsRef<Path>,
        signer_key: impl AsRef<Path>,
    ) -> Self {
        Self {
            wwdr: wwdr.as_ref().to_path_buf(),
            signer: SignerFiles::Pem {
                certificate: signer_cert.as_ref().to_path_buf(),
                key: signer_key.as_ref().to_path_buf(),
            },
            passphrase: None,
        }
    }

    /// PKCS#12 container holding the signer certificate and key.
    pub fn pkcs12(wwdr: impl AsRef<Path>, p12: impl AsRef<Path>) -> Self {
        Self {
            wwdr: wwdr.as_ref().to_path_buf(),
            signer: SignerFiles::Pkcs12(p12.as_ref().to_path_buf()),
            passphrase: None,
        }
    }

    /// Passphrase of the private key or password of the PKCS#12 container.
    ///
    /// The passphrase is stored securely and will be zeroized when dropped.
    pub fn passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.passphrase = Some(SecretString::new(passphrase.into()));
        self
    }

    /// Read the files and build the identity.
    ///
    /// Fails with [`Error::FileNotFound`] if a file does not exist and with
    /// [`Error::InvalidCredential`] if the credentials cannot be used.
    pub fn load(&self) -> Result<SigningIdentity> {
        let wwdr = read_file(&self.wwdr)?;
        match &self.signer {
            SignerFiles::Pem { certificate, key } => {
                let certificate = read_file(certificate)?;
                let key = read_file(key)?;
                SigningIdentity::from_pem(&wwdr, &certificate, &key, self.passphrase.clone())
            }
            SignerFiles::Pkcs12(p12) => {
                let p12 = read_file(p12)?;
                SigningIdentity::from_p12(&wwdr, &p12, self.passphrase.clone())
            }
        }
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => Error::FileNotFound(path.to_path_buf()),
        _ => Error::Io(e),
    })
}

/// Load a model directory and an identity, then build a pass.
///
/// Both loads run in parallel; the first failure is returned.
pub fn create_pass(
    model_dir: impl AsRef<Path>,
    identity: &IdentitySource,
    overrides: Option<Overrides>,
) -> Result<Pass> {
    let model_dir = model_dir.as_ref();
    let (model, identity) = rayon::join(
        || PartitionedBundle::from_dir(model_dir),
        || identity.load(),
    );

    let model = model?;
    let identity = identity?;
    debug!(model = %model_dir.display(), "loaded model and signing identity");

    Pass::new(model, identity, overrides)
}
