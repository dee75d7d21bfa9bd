//! Pass builder API
//!
//! [`Pass`] owns a model, its merged properties, its fields and its staged
//! translations. Setters mutate that state; [`Pass::generate`] runs the
//! generation pipeline on a private copy, so a pass can be generated any
//! number of times.

use crate::bundle::{
    DigestAlgorithm, LocalizationMerger, PartitionedBundle, Translations, PASS_JSON,
};
use crate::crypto::SigningIdentity;
use crate::pass::{overlay, FieldCollection, PassCategory, PassStyle};
use crate::pkpass::{CompressionLevel, Generation, Inputs, Metadata};
use crate::schema::{self, Barcode, BarcodeFormat, Beacon, Location, Nfc, Overrides, TransitType};
use crate::{Error, Result};
use chrono::{DateTime, FixedOffset, SecondsFormat};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::io::{Cursor, Seek, Write};
use tracing::{debug, warn};

/// Value accepted by [`Pass::barcodes`].
#[derive(Debug, Clone, PartialEq)]
pub enum Barcodes {
    /// Explicit entries; invalid ones are dropped.
    List(Vec<Barcode>),
    /// A message to encode in every supported format.
    Message(String),
}

impl From<Vec<Barcode>> for Barcodes {
    fn from(list: Vec<Barcode>) -> Self {
        Barcodes::List(list)
    }
}

impl From<&str> for Barcodes {
    fn from(message: &str) -> Self {
        Barcodes::Message(message.to_string())
    }
}

impl From<String> for Barcodes {
    fn from(message: String) -> Self {
        Barcodes::Message(message)
    }
}

/// A pass being assembled.
///
/// # Example
///
/// ```no_run
/// use passkit::{Barcodes, IdentitySource, PartitionedBundle, Pass};
/// use passkit::schema::TransitType;
///
/// let model = PartitionedBundle::from_dir("models/boarding")?;
/// let identity = IdentitySource::new("wwdr.pem", "signer.pem", "signer.key").load()?;
///
/// let mut pass = Pass::new(model, identity, None)?;
/// pass.set_transit_type(TransitType::Air)?;
/// pass.barcodes(Some(Barcodes::from("TICKET-0042")));
/// pass.barcode(Some("PKBarcodeFormatQR"))?;
///
/// std::fs::write("boarding.pkpass", pass.generate()?)?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct Pass {
    model: PartitionedBundle,
    template: Map<String, Value>,
    props: Map<String, Value>,
    style: PassStyle,
    fields: FieldCollection,
    translations: LocalizationMerger,
    identity: SigningIdentity,
    digest_algorithm: DigestAlgorithm,
    compression_level: CompressionLevel,
}

impl Pass {
    /// Build a pass from a model, a signing identity and optional overrides.
    ///
    /// Template properties are validated and merged with `overrides`, which
    /// win. Fails with [`Error::MissingCategory`] when `pass.json` declares
    /// no style and with [`Error::Construction`] / [`Error::Json`] when it is
    /// not a JSON object.
    pub fn new(
        model: PartitionedBundle,
        identity: SigningIdentity,
        overrides: Option<Overrides>,
    ) -> Result<Self> {
        let pass_json = model
            .bundle()
            .get(PASS_JSON)
            .ok_or_else(|| Error::Construction(format!("model has no {PASS_JSON}")))?;
        let template = overlay::parse_pass_json(pass_json)?;
        let category = PassCategory::detect(&template)?;

        let empty = Map::new();
        let content = match template.get(category.key()) {
            Some(Value::Object(content)) => content,
            _ => &empty,
        };
        let style = PassStyle::from_template(category, content);
        let fields = FieldCollection::from_template(content);

        let mut props = overlay::template_props(&template);
        if let Some(overrides) = overrides {
            overlay::apply_overrides(&mut props, overrides);
        }

        debug!(
            category = %category,
            fields = fields.len(),
            languages = model.localization().len(),
            "loaded pass model"
        );

        Ok(Self {
            model,
            template,
            props,
            style,
            fields,
            translations: LocalizationMerger::new(),
            identity,
            digest_algorithm: DigestAlgorithm::default(),
            compression_level: CompressionLevel::default(),
        })
    }

    /// Stage translations for `lang`, replacing earlier ones.
    ///
    /// `None` stages an empty table: previously staged strings are dropped,
    /// the template's own `pass.strings` stays.
    pub fn localize(&mut self, lang: &str, translations: Option<Translations>) -> &mut Self {
        if lang.trim().is_empty() {
            warn!("ignoring translations for an empty language code");
            return self;
        }
        self.translations.stage(lang, translations.unwrap_or_default());
        self
    }

    /// Set or clear `expirationDate`.
    pub fn expiration(&mut self, date: Option<DateTime<FixedOffset>>) -> &mut Self {
        self.set_date("expirationDate", date)
    }

    /// Mark the pass as voided.
    pub fn void(&mut self) -> &mut Self {
        self.props.insert("voided".to_string(), Value::Bool(true));
        self
    }

    /// Set or clear `relevantDate`.
    pub fn relevant_date(&mut self, date: Option<DateTime<FixedOffset>>) -> &mut Self {
        self.set_date("relevantDate", date)
    }

    /// Set or clear `beacons`. Invalid entries are dropped.
    pub fn beacons(&mut self, beacons: Option<Vec<Beacon>>) -> &mut Self {
        match beacons {
            Some(beacons) => self.set_list("beacons", beacons),
            None => self.clear("beacons"),
        }
    }

    /// Set or clear `locations`. Invalid entries are dropped.
    pub fn locations(&mut self, locations: Option<Vec<Location>>) -> &mut Self {
        match locations {
            Some(locations) => self.set_list("locations", locations),
            None => self.clear("locations"),
        }
    }

    /// Set or clear `barcodes`.
    ///
    /// A [`Barcodes::Message`] expands to one entry per format. Clearing
    /// also clears the single `barcode` key, which must be one of them.
    pub fn barcodes(&mut self, barcodes: Option<Barcodes>) -> &mut Self {
        match barcodes {
            Some(Barcodes::Message(message)) if message.is_empty() => {
                warn!("ignoring empty barcode message");
                self
            }
            Some(Barcodes::Message(message)) => {
                self.set_list("barcodes", Barcode::all_formats(&message))
            }
            Some(Barcodes::List(list)) => self.set_list("barcodes", list),
            None => {
                self.clear("barcode");
                self.clear("barcodes")
            }
        }
    }

    /// Pick the single `barcode` shown by old devices from `barcodes`.
    ///
    /// `format` is a format name, matched case-insensitively either in full
    /// (`"PKBarcodeFormatQR"`) or in short form (`"qr"`). `None` clears the
    /// key.
    ///
    /// # Errors
    ///
    /// - [`Error::UnsupportedBarcodeFormat`] for Code 128, which old devices
    ///   cannot render
    /// - [`Error::BarcodeNotFound`] for an unknown format name, or when no
    ///   barcode of that format is set
    pub fn barcode(&mut self, format: Option<&str>) -> Result<&mut Self> {
        let Some(name) = format else {
            return Ok(self.clear("barcode"));
        };

        let format = BarcodeFormat::from_name(name)
            .ok_or_else(|| Error::BarcodeNotFound(name.to_string()))?;
        if !format.is_legacy_compatible() {
            return Err(Error::UnsupportedBarcodeFormat(format.to_string()));
        }

        let selected = self
            .props
            .get("barcodes")
            .and_then(Value::as_array)
            .and_then(|barcodes| {
                barcodes.iter().find(|barcode| {
                    schema::parse::<Barcode>(barcode).is_some_and(|b| b.format == format)
                })
            })
            .cloned()
            .ok_or_else(|| Error::BarcodeNotFound(format.to_string()))?;

        self.props.insert("barcode".to_string(), selected);
        Ok(self)
    }

    /// Set or clear the NFC payload. An invalid payload is dropped.
    pub fn nfc(&mut self, nfc: Option<Nfc>) -> &mut Self {
        match nfc {
            Some(nfc) => {
                let filtered = schema::filter_checked(vec![nfc]);
                match filtered.accepted.into_iter().next() {
                    Some(nfc) => self.set_value("nfc", &nfc),
                    None => {
                        warn!("dropping invalid nfc payload");
                        self
                    }
                }
            }
            None => self.clear("nfc"),
        }
    }

    /// Transit type of a boarding pass.
    pub fn transit_type(&self) -> Option<TransitType> {
        self.style.transit_type()
    }

    /// Set the transit type. Fails for passes that are not boarding passes.
    pub fn set_transit_type(&mut self, transit_type: TransitType) -> Result<&mut Self> {
        self.style.set_transit_type(transit_type)?;
        Ok(self)
    }

    pub fn style(&self) -> PassStyle {
        self.style
    }

    /// Snapshot of the merged top-level properties.
    pub fn props(&self) -> Map<String, Value> {
        self.props.clone()
    }

    pub fn fields(&self) -> &FieldCollection {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut FieldCollection {
        &mut self.fields
    }

    /// Staged translations.
    pub fn translations(&self) -> &LocalizationMerger {
        &self.translations
    }

    /// Languages the generated pass will have folders for, at most.
    pub fn languages(&self) -> BTreeSet<String> {
        self.model
            .languages()
            .chain(self.translations.languages())
            .map(str::to_string)
            .collect()
    }

    /// Digest used for manifest entries (SHA-1 by default).
    pub fn digest_algorithm(&mut self, algorithm: DigestAlgorithm) -> &mut Self {
        self.digest_algorithm = algorithm;
        self
    }

    /// Set ZIP compression level for the archive (0-9).
    ///
    /// 0 = stored, 9 = maximum compression. Default is 6.
    pub fn compression_level(&mut self, level: u32) -> &mut Self {
        self.compression_level = CompressionLevel::new(level);
        self
    }

    /// Generate the signed `.pkpass` archive.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransitTypeRequired`] for a boarding pass without a
    /// transit type, [`Error::PathCollision`] when a localized file clashes
    /// with a root file, and signing or archive errors.
    pub fn generate(&self) -> Result<Vec<u8>> {
        Ok(self.write_to(Cursor::new(Vec::new()))?.into_inner())
    }

    /// Generate the signed `.pkpass` archive into `sink`.
    pub fn write_to<W: Write + Seek>(&self, sink: W) -> Result<W> {
        let inputs = Inputs {
            metadata: Metadata {
                template: &self.template,
                props: &self.props,
                style: &self.style,
                fields: &self.fields,
            },
            bundle: self.model.bundle(),
            localization: self.model.localization(),
            translations: &self.translations,
            identity: &self.identity,
            digest_algorithm: self.digest_algorithm,
            compression_level: self.compression_level,
        };
        Generation::new(inputs).run(sink)
    }

    fn set_date(&mut self, key: &str, date: Option<DateTime<FixedOffset>>) -> &mut Self {
        match date {
            Some(date) => {
                let formatted = date.to_rfc3339_opts(SecondsFormat::Secs, false);
                self.props.insert(key.to_string(), Value::String(formatted));
                self
            }
            None => self.clear(key),
        }
    }

    fn set_list<T: schema::Shape + Serialize>(&mut self, key: &str, items: Vec<T>) -> &mut Self {
        let filtered = schema::filter_checked(items);
        if filtered.rejected > 0 {
            warn!(key = %key, shape = T::NAME, rejected = filtered.rejected, "dropping invalid entries");
        }
        if filtered.accepted.is_empty() {
            return self.clear(key);
        }
        self.set_value(key, &filtered.accepted)
    }

    fn set_value<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> &mut Self {
        match serde_json::to_value(value) {
            Ok(value) => {
                self.props.insert(key.to_string(), value);
            }
            Err(e) => warn!(key = %key, error = %e, "dropping value that cannot be serialized"),
        }
        self
    }

    fn clear(&mut self, key: &str) -> &mut Self {
        self.props.remove(key);
        self
    }
}
