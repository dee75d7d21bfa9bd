pub mod identity;
pub mod signature;

pub use identity::SigningIdentity;
pub use signature::{sign, verify, TrustStore, SIGNATURE_FILE};
