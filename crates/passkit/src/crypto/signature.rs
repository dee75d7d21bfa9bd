//! Detached PKCS#7 signatures over the pass manifest
//!
//! The signature is a DER `SignedData` without encapsulated content. It
//! carries the signer certificate and the WWDR certificate so a device can
//! rebuild the chain up to the Apple root it already trusts.

use super::SigningIdentity;
use crate::{Error, Result};
use openssl::pkcs7::{Pkcs7, Pkcs7Flags};
use openssl::stack::Stack;
use openssl::x509::store::{X509Store, X509StoreBuilder};
use openssl::x509::verify::X509VerifyFlags;
use openssl::x509::X509;

/// Name of the signature inside the archive.
pub const SIGNATURE_FILE: &str = "signature";

/// Sign `data` (the serialized manifest) with `identity`.
///
/// The private key is decrypted here and dropped on return.
pub fn sign(data: &[u8], identity: &SigningIdentity) -> Result<Vec<u8>> {
    let private_key = identity.private_key()?;

    let mut chain = Stack::new()
        .map_err(|e| Error::Signing(format!("Failed to allocate certificate stack: {}", e)))?;
    chain
        .push(identity.wwdr().clone())
        .map_err(|e| Error::Signing(format!("Failed to add WWDR certificate: {}", e)))?;

    let flags = Pkcs7Flags::DETACHED | Pkcs7Flags::BINARY;
    let pkcs7 = Pkcs7::sign(identity.certificate(), &private_key, &chain, data, flags)
        .map_err(|e| Error::Signing(format!("Failed to build PKCS#7 signature: {}", e)))?;

    pkcs7
        .to_der()
        .map_err(|e| Error::Signing(format!("Failed to encode PKCS#7 signature: {}", e)))
}

/// Certificates a signature is checked against.
pub struct TrustStore {
    store: X509Store,
}

impl TrustStore {
    /// Trust the given certificates as anchors.
    ///
    /// Intermediates are accepted as anchors too, so trusting just the WWDR
    /// certificate is enough to verify a pass without the Apple root.
    pub fn new(anchors: impl IntoIterator<Item = X509>) -> Result<Self> {
        let mut builder = X509StoreBuilder::new()
            .map_err(|e| Error::Signing(format!("Failed to create trust store: {}", e)))?;
        for cert in anchors {
            builder
                .add_cert(cert)
                .map_err(|e| Error::InvalidCredential(format!("Failed to add trust anchor: {}", e)))?;
        }
        builder
            .set_flags(X509VerifyFlags::PARTIAL_CHAIN)
            .map_err(|e| Error::Signing(format!("Failed to configure trust store: {}", e)))?;
        Ok(Self {
            store: builder.build(),
        })
    }

    /// Parse PEM or DER certificates and trust them.
    pub fn from_certificates<'a>(certs: impl IntoIterator<Item = &'a [u8]>) -> Result<Self> {
        let anchors = certs
            .into_iter()
            .map(|data| {
                X509::from_pem(data)
                    .or_else(|_| X509::from_der(data))
                    .map_err(|e| Error::InvalidCredential(format!("Failed to load trust anchor: {}", e)))
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(anchors)
    }

    /// Trust the WWDR certificate of `identity`.
    pub fn for_identity(identity: &SigningIdentity) -> Result<Self> {
        Self::new([identity.wwdr().clone()])
    }
}

/// Check `signature` against the exact `data` bytes and `trust`.
///
/// Returns the signer certificates on success.
pub fn verify(signature: &[u8], data: &[u8], trust: &TrustStore) -> Result<Vec<X509>> {
    let pkcs7 = Pkcs7::from_der(signature)
        .map_err(|e| Error::Signing(format!("Invalid PKCS#7 signature: {}", e)))?;

    let extra = Stack::new()
        .map_err(|e| Error::Signing(format!("Failed to allocate certificate stack: {}", e)))?;
    let signers = pkcs7
        .signers(&extra, Pkcs7Flags::empty())
        .map_err(|e| Error::Signing(format!("Signature has no signer: {}", e)))?;

    let mut output = Vec::new();
    pkcs7
        .verify(&extra, &trust.store, Some(data), Some(&mut output), Pkcs7Flags::BINARY)
        .map_err(|e| Error::Signing(format!("Signature verification failed: {}", e)))?;

    Ok(signers.into_iter().collect())
}
