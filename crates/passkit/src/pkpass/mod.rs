//! Pass generation pipeline and `.pkpass` container handling.
//!
//! Generating a pass runs a fixed sequence of [`Stage`]s over a private copy
//! of the model:
//!
//! | Stage | Effect |
//! |-------|--------|
//! | [`Stage::PatchMetadata`] | render the final `pass.json` from props, style and fields |
//! | [`Stage::MergeLocalizations`] | flatten `<lang>.lproj` folders and staged translations |
//! | [`Stage::PrunePersonalization`] | drop personalization files the pass may not carry |
//! | [`Stage::ComputeManifest`] | digest every file into `manifest.json` |
//! | [`Stage::Sign`] | detached PKCS#7 signature over the manifest |
//! | [`Stage::Archive`] | write signature, manifest and files into a ZIP |
//!
//! Every stage runs on every generation, in that order. Nothing is cached
//! between generations.

pub mod archive;
pub mod verify;

pub use archive::{create_pkpass, write_pkpass, CompressionLevel};
pub use verify::{read_pkpass, verify_pkpass, PkpassContents, VerifiedPass};

use crate::bundle::manifest::{DigestAlgorithm, ManifestBuilder};
use crate::bundle::{personalization, Bundle, LocalizationBundle, LocalizationMerger, PASS_JSON};
use crate::crypto::{self, SigningIdentity};
use crate::pass::{overlay, FieldCollection, PassStyle};
use crate::Result;
use serde_json::{Map, Value};
use std::fmt;
use std::io::{Seek, Write};
use tracing::{debug, info, warn};

/// One step of pass generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    PatchMetadata,
    MergeLocalizations,
    PrunePersonalization,
    ComputeManifest,
    Sign,
    Archive,
}

impl Stage {
    /// Execution order.
    pub const ORDER: [Stage; 6] = [
        Stage::PatchMetadata,
        Stage::MergeLocalizations,
        Stage::PrunePersonalization,
        Stage::ComputeManifest,
        Stage::Sign,
        Stage::Archive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::PatchMetadata => "patch-metadata",
            Stage::MergeLocalizations => "merge-localizations",
            Stage::PrunePersonalization => "prune-personalization",
            Stage::ComputeManifest => "compute-manifest",
            Stage::Sign => "sign",
            Stage::Archive => "archive",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the final `pass.json` is rendered from.
pub(crate) struct Metadata<'a> {
    pub template: &'a Map<String, Value>,
    pub props: &'a Map<String, Value>,
    pub style: &'a PassStyle,
    pub fields: &'a FieldCollection,
}

/// Borrowed inputs of one generation.
pub(crate) struct Inputs<'a> {
    pub metadata: Metadata<'a>,
    pub bundle: &'a Bundle,
    pub localization: &'a LocalizationBundle,
    pub translations: &'a LocalizationMerger,
    pub identity: &'a SigningIdentity,
    pub digest_algorithm: DigestAlgorithm,
    pub compression_level: CompressionLevel,
}

/// One generation: a private copy of the model worked on stage by stage.
///
/// Each stage's output is handed to the next as a value, so a stage cannot
/// run before the ones it depends on.
pub(crate) struct Generation<'a> {
    inputs: Inputs<'a>,
    files: Bundle,
    completed: Vec<Stage>,
}

impl<'a> Generation<'a> {
    pub(crate) fn new(inputs: Inputs<'a>) -> Self {
        let files = inputs.bundle.clone();
        Self {
            inputs,
            files,
            completed: Vec::with_capacity(Stage::ORDER.len()),
        }
    }

    /// Stages entered so far, in execution order.
    pub(crate) fn completed(&self) -> &[Stage] {
        &self.completed
    }

    /// Run every stage and return `sink` holding the archive.
    pub(crate) fn run<W: Write + Seek>(&mut self, sink: W) -> Result<W> {
        self.enter(Stage::PatchMetadata);
        self.patch_metadata()?;

        self.enter(Stage::MergeLocalizations);
        self.inputs
            .translations
            .merge_into(self.inputs.localization, &mut self.files)?;

        self.enter(Stage::PrunePersonalization);
        let has_nfc = self.inputs.metadata.props.contains_key("nfc");
        personalization::prune(&mut self.files, has_nfc);

        self.enter(Stage::ComputeManifest);
        let manifest = ManifestBuilder::new(self.inputs.digest_algorithm)
            .scan(&self.files)
            .build()
            .to_json()?;

        self.enter(Stage::Sign);
        let signature = crypto::sign(&manifest, self.inputs.identity)?;

        self.enter(Stage::Archive);
        let sink = write_pkpass(
            sink,
            &signature,
            &manifest,
            &self.files,
            self.inputs.compression_level,
        )?;

        info!(
            files = self.files.len(),
            algorithm = %self.inputs.digest_algorithm,
            compression = self.inputs.compression_level.level(),
            "generated pass"
        );
        Ok(sink)
    }

    fn enter(&mut self, stage: Stage) {
        debug!(stage = %stage, "running generation stage");
        self.completed.push(stage);
    }

    fn patch_metadata(&mut self) -> Result<()> {
        let Metadata {
            template,
            props,
            style,
            fields,
        } = self.inputs.metadata;

        check_identifier(props, "teamIdentifier", self.inputs.identity.team_identifier());
        check_identifier(
            props,
            "passTypeIdentifier",
            self.inputs.identity.pass_type_identifier(),
        );

        let pass_json = overlay::render_pass_json(template, props, style, fields)?;
        self.files.insert(PASS_JSON.to_string(), pass_json);
        Ok(())
    }
}

/// Warn when pass.json names a different identifier than the certificate.
fn check_identifier(props: &Map<String, Value>, key: &str, from_certificate: Option<String>) {
    let (Some(declared), Some(expected)) = (props.get(key).and_then(Value::as_str), from_certificate)
    else {
        return;
    };
    if declared != expected {
        warn!(key, declared, certificate = %expected, "pass.json identifier differs from signer certificate");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::identity::tests::TestCredentials;
    use crate::pass::PassCategory;
    use crate::Error;
    use serde_json::json;
    use std::io::Cursor;

    struct Model {
        template: Map<String, Value>,
        props: Map<String, Value>,
        style: PassStyle,
        fields: FieldCollection,
        bundle: Bundle,
        localization: LocalizationBundle,
        translations: LocalizationMerger,
    }

    impl Model {
        fn new(pass_json: Value) -> Self {
            let template = pass_json.as_object().cloned().unwrap();
            let category = PassCategory::detect(&template).unwrap();
            let mut bundle = Bundle::new();
            bundle.insert(PASS_JSON.to_string(), serde_json::to_vec(&pass_json).unwrap());
            bundle.insert("icon.png".to_string(), b"PNG".to_vec());
            Self {
                props: overlay::template_props(&template),
                style: PassStyle::from_template(category, &Map::new()),
                fields: FieldCollection::new(),
                template,
                bundle,
                localization: LocalizationBundle::new(),
                translations: LocalizationMerger::new(),
            }
        }

        fn inputs<'a>(&'a self, identity: &'a SigningIdentity) -> Inputs<'a> {
            Inputs {
                metadata: Metadata {
                    template: &self.template,
                    props: &self.props,
                    style: &self.style,
                    fields: &self.fields,
                },
                bundle: &self.bundle,
                localization: &self.localization,
                translations: &self.translations,
                identity,
                digest_algorithm: DigestAlgorithm::default(),
                compression_level: CompressionLevel::default(),
            }
        }
    }

    #[test]
    fn test_stage_order() {
        let names: Vec<_> = Stage::ORDER.iter().map(Stage::as_str).collect();
        assert_eq!(
            names,
            vec![
                "patch-metadata",
                "merge-localizations",
                "prune-personalization",
                "compute-manifest",
                "sign",
                "archive"
            ]
        );
    }

    #[test]
    fn test_generation_runs_every_stage_in_order() {
        let identity = TestCredentials::generate().identity();
        let model = Model::new(json!({ "storeCard": {} }));

        let mut generation = Generation::new(model.inputs(&identity));
        let archive = generation.run(Cursor::new(Vec::new())).unwrap().into_inner();

        assert_eq!(generation.completed(), Stage::ORDER);
        let contents = read_pkpass(&archive).unwrap();
        assert_eq!(contents.entry_order[..2], ["signature", "manifest.json"]);
    }

    #[test]
    fn test_generation_stops_at_failing_stage() {
        let identity = TestCredentials::generate().identity();
        let model = Model::new(json!({ "boardingPass": {} }));

        let mut generation = Generation::new(model.inputs(&identity));
        let result = generation.run(Cursor::new(Vec::new()));

        assert!(matches!(result, Err(Error::TransitTypeRequired)));
        assert_eq!(generation.completed(), [Stage::PatchMetadata]);
    }
}
