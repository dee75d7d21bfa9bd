//! Pass metadata: style, field slots and the property overlay that turns a
//! template's pass.json into the final one.

pub mod category;
pub mod fields;
pub mod overlay;

pub use category::{PassCategory, PassStyle};
pub use fields::{FieldCollection, FieldSlot};
