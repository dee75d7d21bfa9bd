//! End-to-end generation tests: build a pass from a model, generate the
//! archive and check it the way a device would.

mod common;

use common::{model, Credentials};
use passkit::pkpass::{read_pkpass, verify_pkpass};
use passkit::schema::{Nfc, Overrides, TransitType};
use passkit::{create_pass, DigestAlgorithm, Error, IdentitySource, Pass, Translations};
use serde_json::{json, Value};
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

fn pass_json_of(archive: &[u8]) -> Value {
    let contents = read_pkpass(archive).unwrap();
    serde_json::from_slice(&contents.files["pass.json"]).unwrap()
}

/// Copy `archive`, replacing the bytes of one entry.
fn replace_entry(archive: &[u8], name: &str, data: &[u8]) -> Vec<u8> {
    let mut reader = ZipArchive::new(Cursor::new(archive)).unwrap();
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for i in 0..reader.len() {
        let mut file = reader.by_index(i).unwrap();
        let entry = file.name().to_string();
        let mut bytes = Vec::new();
        std::io::Read::read_to_end(&mut file, &mut bytes).unwrap();
        writer.start_file(entry.as_str(), SimpleFileOptions::default()).unwrap();
        if entry == name {
            writer.write_all(data).unwrap();
        } else {
            writer.write_all(&bytes).unwrap();
        }
    }
    writer.finish().unwrap().into_inner()
}

#[test]
fn store_card_generates_and_verifies() {
    let creds = Credentials::generate();
    let pass = Pass::new(
        model(json!({ "storeCard": {}, "description": "Card" }), &[]),
        creds.identity(),
        None,
    )
    .unwrap();

    let archive = pass.generate().unwrap();
    let verified = verify_pkpass(&archive, &creds.trust()).unwrap();

    assert_eq!(
        verified.contents.entry_order,
        vec!["signature", "manifest.json", "icon.png", "pass.json"]
    );
    assert_eq!(verified.manifest.algorithm(), DigestAlgorithm::Sha1);
    assert_eq!(verified.manifest.len(), 2);
    assert_eq!(verified.signers.len(), 1);
}

#[test]
fn boarding_pass_needs_transit_type() {
    let creds = Credentials::generate();
    let mut pass = Pass::new(model(json!({ "boardingPass": {} }), &[]), creds.identity(), None)
        .unwrap();
    assert!(matches!(pass.generate(), Err(Error::TransitTypeRequired)));

    pass.set_transit_type(TransitType::Air).unwrap();
    let archive = pass.generate().unwrap();
    assert_eq!(pass_json_of(&archive)["boardingPass"]["transitType"], "PKTransitTypeAir");
}

#[test]
fn barcode_message_expands_to_every_format() {
    let creds = Credentials::generate();
    let mut pass = Pass::new(model(json!({ "eventTicket": {} }), &[]), creds.identity(), None)
        .unwrap();
    pass.barcodes(Some("12345".into()));
    assert!(matches!(
        pass.barcode(Some("PKBarcodeFormatCode128")),
        Err(Error::UnsupportedBarcodeFormat(_))
    ));
    pass.barcode(Some("PKBarcodeFormatQR")).unwrap();

    let rendered = pass_json_of(&pass.generate().unwrap());
    assert_eq!(rendered["barcodes"].as_array().unwrap().len(), 4);
    assert_eq!(rendered["barcode"]["format"], "PKBarcodeFormatQR");
    assert_eq!(rendered["barcode"]["message"], "12345");
}

#[test]
fn staged_strings_follow_template_strings() {
    let creds = Credentials::generate();
    let template_strings: &[u8] = b"\"TITLE\" = \"Titolo\";";
    let mut pass = Pass::new(
        model(
            json!({ "generic": {} }),
            &[
                ("it.lproj/pass.strings", template_strings),
                ("it.lproj/logo.png", &b"it logo"[..]),
            ],
        ),
        creds.identity(),
        None,
    )
    .unwrap();

    let mut it = Translations::new();
    it.insert("GREETING".into(), "Ciao \"mondo\"".into());
    pass.localize("it", Some(it));

    let archive = pass.generate().unwrap();
    let verified = verify_pkpass(&archive, &creds.trust()).unwrap();
    let strings = String::from_utf8(verified.contents.files["it.lproj/pass.strings"].clone())
        .unwrap();
    assert_eq!(
        strings,
        "\"TITLE\" = \"Titolo\";\n\"GREETING\" = \"Ciao \\\"mondo\\\"\";\n"
    );
    assert_eq!(verified.contents.files["it.lproj/logo.png"], b"it logo");
    assert!(verified.manifest.get("it.lproj/pass.strings").is_some());
}

#[test]
fn personalization_requires_nfc() {
    let creds = Credentials::generate();
    let descriptor = serde_json::to_vec(&json!({
        "requiredPersonalizationFields": ["PKPassPersonalizationFieldName"],
        "description": "Join the club"
    }))
    .unwrap();
    let extra: &[(&str, &[u8])] = &[
        ("personalization.json", descriptor.as_slice()),
        ("personalizationLogo.png", &b"logo"[..]),
        ("personalizationLogo@2x.png", &b"logo2x"[..]),
        ("en.lproj/personalizationLogo.png", &b"en logo"[..]),
    ];

    let plain = Pass::new(model(json!({ "storeCard": {} }), extra), creds.identity(), None)
        .unwrap();
    let contents = read_pkpass(&plain.generate().unwrap()).unwrap();
    assert!(!contents.files.keys().any(|p| p.contains("personalization")));
    assert!(contents.files.contains_key("icon.png"));

    let mut nfc = Pass::new(model(json!({ "storeCard": {} }), extra), creds.identity(), None)
        .unwrap();
    nfc.nfc(Some(Nfc::new("member-42")));
    let archive = nfc.generate().unwrap();
    let verified = verify_pkpass(&archive, &creds.trust()).unwrap();
    assert!(verified.contents.files.contains_key("personalization.json"));
    assert!(verified.contents.files.contains_key("personalizationLogo@2x.png"));
    assert!(verified.contents.files.contains_key("en.lproj/personalizationLogo.png"));
}

#[test]
fn tampered_archive_fails_verification() {
    let creds = Credentials::generate();
    let pass = Pass::new(model(json!({ "coupon": {} }), &[]), creds.identity(), None).unwrap();
    let archive = pass.generate().unwrap();

    let tampered_file = replace_entry(&archive, "pass.json", br#"{"coupon":{},"voided":true}"#);
    assert!(matches!(
        verify_pkpass(&tampered_file, &creds.trust()),
        Err(Error::ManifestMismatch(_))
    ));

    let tampered_manifest = replace_entry(&archive, "manifest.json", b"{}");
    assert!(verify_pkpass(&tampered_manifest, &creds.trust()).is_err());

    let other = Credentials::generate();
    assert!(matches!(
        verify_pkpass(&archive, &other.trust()),
        Err(Error::Signing(_))
    ));
}

#[test]
fn overrides_and_setters_reach_pass_json() {
    let creds = Credentials::generate();
    let overrides = Overrides::from_json(&json!({
        "serialNumber": "SN-2",
        "backgroundColor": "rgb(10, 20, 30)",
        "foregroundColor": "not a color"
    }))
    .unwrap();
    let mut pass = Pass::new(
        model(
            json!({ "generic": {}, "serialNumber": "SN-1", "formatVersion": 1 }),
            &[],
        ),
        creds.identity(),
        Some(overrides),
    )
    .unwrap();
    pass.void();

    let rendered = pass_json_of(&pass.generate().unwrap());
    assert_eq!(rendered["serialNumber"], "SN-2");
    assert_eq!(rendered["backgroundColor"], "rgb(10, 20, 30)");
    assert!(rendered.get("foregroundColor").is_none());
    assert_eq!(rendered["voided"], true);
    assert_eq!(rendered["formatVersion"], 1);
}

#[test]
fn sha256_manifest() {
    let creds = Credentials::generate();
    let mut pass = Pass::new(model(json!({ "generic": {} }), &[]), creds.identity(), None)
        .unwrap();
    pass.digest_algorithm(DigestAlgorithm::Sha256).compression_level(9);

    let verified = verify_pkpass(&pass.generate().unwrap(), &creds.trust()).unwrap();
    assert_eq!(verified.manifest.algorithm(), DigestAlgorithm::Sha256);
    assert!(verified.manifest.iter().all(|(_, digest)| digest.len() == 64));
}

#[test]
fn model_directory_round_trip() {
    let creds = Credentials::generate();
    let temp_dir = tempfile::TempDir::new().unwrap();
    let root = temp_dir.path();

    std::fs::write(root.join("wwdr.pem"), creds.wwdr.to_pem().unwrap()).unwrap();
    std::fs::write(root.join("signer.pem"), creds.signer_cert.to_pem().unwrap()).unwrap();
    std::fs::write(
        root.join("signer.key"),
        creds.signer_key.private_key_to_pem_pkcs8().unwrap(),
    )
    .unwrap();

    let model_dir = root.join("ticket.pass");
    std::fs::create_dir_all(model_dir.join("fr.lproj")).unwrap();
    std::fs::write(
        model_dir.join("pass.json"),
        br#"{"eventTicket":{"primaryFields":[{"key":"event","value":"Show"}]}}"#,
    )
    .unwrap();
    std::fs::write(model_dir.join("icon.png"), b"icon").unwrap();
    std::fs::write(model_dir.join(".DS_Store"), b"junk").unwrap();
    std::fs::write(model_dir.join("fr.lproj/pass.strings"), b"\"event\" = \"Spectacle\";\n")
        .unwrap();

    let source = IdentitySource::new(
        root.join("wwdr.pem"),
        root.join("signer.pem"),
        root.join("signer.key"),
    );
    let pass = create_pass(root.join("ticket"), &source, None).unwrap();

    let verified = verify_pkpass(&pass.generate().unwrap(), &creds.trust()).unwrap();
    let mut paths: Vec<_> = verified.contents.files.keys().cloned().collect();
    paths.sort();
    assert_eq!(paths, vec!["fr.lproj/pass.strings", "icon.png", "pass.json"]);
    assert_eq!(verified.contents.files["icon.png"], b"icon");
    assert_eq!(
        pass_json_of(&pass.generate().unwrap())["eventTicket"]["primaryFields"][0]["value"],
        "Show"
    );
}
