pub mod builder;
pub mod bundle;
pub mod crypto;
pub mod error;
pub mod loader;
pub mod pass;
pub mod pkpass;
pub mod schema;

pub use builder::{Barcodes, Pass};
pub use bundle::{
    DigestAlgorithm, LocalizationMerger, Manifest, ManifestBuilder, PartitionedBundle, Translations,
};
pub use crypto::{SigningIdentity, TrustStore};
pub use error::Error;
pub use loader::{create_pass, IdentitySource};
pub use pass::{FieldCollection, FieldSlot, PassCategory, PassStyle};
pub use pkpass::{verify_pkpass, CompressionLevel, Stage};

pub type Result<T> = std::result::Result<T, Error>;
