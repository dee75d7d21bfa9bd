//! Error types for pass assembly and signing.
//!
//! This module defines the [`enum@Error`] enum covering every fatal failure
//! of building, signing and archiving a pass. Schema validation problems on
//! individual template values are not errors: those values are dropped and
//! logged, see [`crate::schema`].
//!
//! # See Also
//!
//! - [`crate::Result`] - Convenience type alias using this error

use std::path::PathBuf;
use thiserror::Error;

/// Error type for pass operations.
///
/// # Examples
///
/// ```no_run
/// use passkit::{Error, Pass, PartitionedBundle, SigningIdentity};
///
/// # fn run(model: PartitionedBundle, identity: SigningIdentity) -> passkit::Result<()> {
/// let pass = Pass::new(model, identity, None)?;
/// match pass.generate() {
///     Ok(bytes) => println!("{} bytes", bytes.len()),
///     Err(Error::TransitTypeRequired) => eprintln!("set a transit type first"),
///     Err(Error::InvalidCredential(msg)) => eprintln!("bad credentials: {msg}"),
///     Err(e) => eprintln!("other error: {e}"),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Error)]
pub enum Error {
    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The model directory does not exist.
    #[error("Model not found: {}", .0.display())]
    ModelNotFound(PathBuf),

    /// A credential or model file does not exist.
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// The template or constructor options cannot produce a pass.
    ///
    /// Covers a model without `pass.json` or icon, an overrides value that is
    /// not a JSON object, and a `pass.json` that is not a JSON object.
    #[error("Cannot build pass: {0}")]
    Construction(String),

    /// `pass.json` declares none of the known pass styles.
    #[error("pass.json declares no pass style (expected one of boardingPass, coupon, eventTicket, generic, storeCard)")]
    MissingCategory,

    /// JSON parsing or serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A field with this key already exists in one of the field slots.
    #[error("Field key already in use: {0}")]
    DuplicateKey(String),

    /// A boarding pass reached generation without a transit type.
    #[error("Boarding passes require a transit type")]
    TransitTypeRequired,

    /// The value is not one of the known transit types.
    #[error("Invalid transit type: {0}")]
    InvalidTransitType(String),

    /// The barcode format cannot be used for the single `barcode` key.
    #[error("Barcode format not supported for the legacy barcode key: {0}")]
    UnsupportedBarcodeFormat(String),

    /// No barcode of the requested format has been set.
    #[error("No barcode with format {0} available")]
    BarcodeNotFound(String),

    /// Certificate, private key or passphrase is malformed or wrong.
    #[error("Invalid credential: {0}")]
    InvalidCredential(String),

    /// Signature creation or verification failed.
    #[error("Signing failed: {0}")]
    Signing(String),

    /// A flattened localization path clashes with a root bundle path.
    #[error("Bundle path collision: {0}")]
    PathCollision(String),

    /// Archive content does not match its manifest.
    #[error("Manifest mismatch: {0}")]
    ManifestMismatch(String),

    /// ZIP archive operation failed.
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}
