//! Shared fixtures: throwaway certificates and pass models.

#![allow(dead_code)]

use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::hash::MessageDigest;
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::x509::extension::BasicConstraints;
use openssl::x509::{X509Builder, X509NameBuilder, X509};
use passkit::{PartitionedBundle, SigningIdentity, TrustStore};
use serde_json::Value;

pub struct Credentials {
    pub wwdr: X509,
    pub signer_cert: X509,
    pub signer_key: PKey<Private>,
}

impl Credentials {
    pub fn generate() -> Self {
        let ca_key = generate_key();
        let wwdr = build_cert(&ca_key, "Test WWDR Intermediate", None, 1);
        let signer_key = generate_key();
        let signer_cert = build_cert(
            &signer_key,
            "Pass Type ID: pass.com.example.integration",
            Some((&wwdr, &ca_key)),
            2,
        );
        Self {
            wwdr,
            signer_cert,
            signer_key,
        }
    }

    pub fn identity(&self) -> SigningIdentity {
        SigningIdentity::from_pem(
            &self.wwdr.to_pem().unwrap(),
            &self.signer_cert.to_pem().unwrap(),
            &self.signer_key.private_key_to_pem_pkcs8().unwrap(),
            None,
        )
        .unwrap()
    }

    pub fn trust(&self) -> TrustStore {
        TrustStore::new([self.wwdr.clone()]).unwrap()
    }
}

fn generate_key() -> PKey<Private> {
    PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap()
}

fn build_cert(
    key: &PKey<Private>,
    common_name: &str,
    issuer: Option<(&X509, &PKey<Private>)>,
    serial: u32,
) -> X509 {
    let mut name_builder = X509NameBuilder::new().unwrap();
    name_builder.append_entry_by_text("CN", common_name).unwrap();
    let name = name_builder.build();

    let mut builder = X509Builder::new().unwrap();
    builder.set_version(2).unwrap();
    let serial = BigNum::from_u32(serial).unwrap();
    builder.set_serial_number(&serial.to_asn1_integer().unwrap()).unwrap();
    builder.set_subject_name(&name).unwrap();
    builder.set_pubkey(key).unwrap();
    builder.set_not_before(&Asn1Time::days_from_now(0).unwrap()).unwrap();
    builder.set_not_after(&Asn1Time::days_from_now(30).unwrap()).unwrap();

    match issuer {
        Some((issuer_cert, issuer_key)) => {
            builder.set_issuer_name(issuer_cert.subject_name()).unwrap();
            builder.sign(issuer_key, MessageDigest::sha256()).unwrap();
        }
        None => {
            builder.set_issuer_name(&name).unwrap();
            let ca = BasicConstraints::new().critical().ca().build().unwrap();
            builder.append_extension(ca).unwrap();
            builder.sign(key, MessageDigest::sha256()).unwrap();
        }
    }
    builder.build()
}

/// Model with `pass.json`, an icon and any extra files.
pub fn model(pass_json: Value, extra: &[(&str, &[u8])]) -> PartitionedBundle {
    let mut files = vec![
        ("pass.json".to_string(), serde_json::to_vec(&pass_json).unwrap()),
        ("icon.png".to_string(), b"\x89PNG icon".to_vec()),
    ];
    files.extend(extra.iter().map(|(path, data)| (path.to_string(), data.to_vec())));
    PartitionedBundle::from_buffers(files).unwrap()
}
