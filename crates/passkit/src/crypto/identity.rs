//! Signing identity: WWDR certificate, signer certificate and private key

use crate::{Error, Result};
use openssl::nid::Nid;
use openssl::pkcs12::Pkcs12;
use openssl::pkey::{PKey, Private};
use openssl::x509::X509;
use secrecy::{ExposeSecret, SecretString, SecretVec};
use std::fmt;

/// Private key material, kept encrypted (or opaque) until signing.
enum KeyMaterial {
    /// PEM key, optionally protected by a passphrase
    Pem {
        pem: SecretVec<u8>,
        passphrase: Option<SecretString>,
    },
    /// PKCS#12 container holding the signer key
    Pkcs12 {
        der: SecretVec<u8>,
        password: SecretString,
    },
}

/// Everything needed to sign a pass manifest.
///
/// The private key is only decrypted inside [`SigningIdentity::private_key`],
/// and the decrypted key is dropped by the caller once the signature is
/// produced. Passphrases are held in [`SecretString`] and zeroized on drop.
pub struct SigningIdentity {
    wwdr: X509,
    certificate: X509,
    key: KeyMaterial,
}

impl SigningIdentity {
    /// Build an identity from PEM (or DER) certificates and a PEM private key.
    ///
    /// The key is decrypted once to check that it matches the signer
    /// certificate, then discarded.
    pub fn from_pem(
        wwdr: &[u8],
        signer_cert: &[u8],
        signer_key: &[u8],
        passphrase: Option<SecretString>,
    ) -> Result<Self> {
        let wwdr = load_certificate(wwdr, "WWDR")?;
        let certificate = load_certificate(signer_cert, "signer")?;

        let identity = Self {
            wwdr,
            certificate,
            key: KeyMaterial::Pem {
                pem: SecretVec::new(signer_key.to_vec()),
                passphrase,
            },
        };
        identity.private_key()?;
        Ok(identity)
    }

    /// Build an identity from a PKCS#12 container holding the signer
    /// certificate and key. A missing password means the empty password.
    pub fn from_p12(wwdr: &[u8], p12: &[u8], password: Option<SecretString>) -> Result<Self> {
        let wwdr = load_certificate(wwdr, "WWDR")?;
        let password = password.unwrap_or_else(|| SecretString::new(String::new()));

        let parsed = parse_p12(p12, &password)?;
        let certificate = parsed
            .cert
            .ok_or_else(|| Error::InvalidCredential("No certificate in PKCS#12".into()))?;

        let identity = Self {
            wwdr,
            certificate,
            key: KeyMaterial::Pkcs12 {
                der: SecretVec::new(p12.to_vec()),
                password,
            },
        };
        identity.private_key()?;
        Ok(identity)
    }

    /// Apple Worldwide Developer Relations intermediate certificate.
    pub fn wwdr(&self) -> &X509 {
        &self.wwdr
    }

    /// Pass type certificate the signature is made with.
    pub fn certificate(&self) -> &X509 {
        &self.certificate
    }

    /// Team identifier from the certificate subject (OU).
    pub fn team_identifier(&self) -> Option<String> {
        subject_entry(&self.certificate, Nid::ORGANIZATIONALUNITNAME)
    }

    /// Pass type identifier from the certificate subject (UID).
    pub fn pass_type_identifier(&self) -> Option<String> {
        subject_entry(&self.certificate, Nid::USERID)
    }

    /// Decrypt the private key and check it against the certificate.
    pub(crate) fn private_key(&self) -> Result<PKey<Private>> {
        let private_key = match &self.key {
            KeyMaterial::Pem { pem, passphrase } => {
                let pem = pem.expose_secret();
                let loaded = match passphrase {
                    Some(pass) => {
                        PKey::private_key_from_pem_passphrase(pem, pass.expose_secret().as_bytes())
                    }
                    None => PKey::private_key_from_pem(pem).or_else(|_| PKey::private_key_from_der(pem)),
                };
                loaded.map_err(|e| {
                    Error::InvalidCredential(format!("Failed to load private key: {}", e))
                })?
            }
            KeyMaterial::Pkcs12 { der, password } => parse_p12(der.expose_secret(), password)?
                .pkey
                .ok_or_else(|| Error::InvalidCredential("No private key in PKCS#12".into()))?,
        };

        validate_key_pair(&self.certificate, &private_key)?;
        Ok(private_key)
    }
}

impl fmt::Debug for SigningIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = match self.key {
            KeyMaterial::Pem { .. } => "pem",
            KeyMaterial::Pkcs12 { .. } => "pkcs12",
        };
        f.debug_struct("SigningIdentity")
            .field("certificate", &subject_entry(&self.certificate, Nid::COMMONNAME))
            .field("wwdr", &subject_entry(&self.wwdr, Nid::COMMONNAME))
            .field("key", &key)
            .finish()
    }
}

fn load_certificate(data: &[u8], what: &str) -> Result<X509> {
    X509::from_pem(data)
        .or_else(|_| X509::from_der(data))
        .map_err(|e| Error::InvalidCredential(format!("Failed to load {} certificate: {}", what, e)))
}

fn parse_p12(data: &[u8], password: &SecretString) -> Result<openssl::pkcs12::ParsedPkcs12_2> {
    Pkcs12::from_der(data)
        .map_err(|e| Error::InvalidCredential(format!("Invalid PKCS#12: {}", e)))?
        .parse2(password.expose_secret())
        .map_err(|e| Error::InvalidCredential(format!("Failed to parse PKCS#12: {}", e)))
}

fn subject_entry(cert: &X509, nid: Nid) -> Option<String> {
    cert.subject_name()
        .entries_by_nid(nid)
        .next()
        .and_then(|entry| entry.data().to_string().ok())
}

/// Validate that the private key matches the certificate's public key
fn validate_key_pair(cert: &X509, private_key: &PKey<Private>) -> Result<()> {
    let cert_public_key = cert.public_key().map_err(|e| {
        Error::InvalidCredential(format!(
            "Failed to extract public key from certificate: {}",
            e
        ))
    })?;

    if !private_key.public_eq(&cert_public_key) {
        return Err(Error::InvalidCredential(
            "Private key does not match certificate public key".into(),
        ));
    }

    Ok(())
}
