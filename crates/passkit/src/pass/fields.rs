//! Field slots of a pass.
//!
//! The five field lists of a pass share one key space: a key used in
//! `primaryFields` cannot appear again in `backFields`. [`FieldCollection`]
//! enforces that on every insertion.

use crate::schema::{self, Field};
use crate::{Error, Result};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;
use tracing::warn;

/// One of the five field lists of a pass style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldSlot {
    Primary,
    Secondary,
    Auxiliary,
    Back,
    Header,
}

impl FieldSlot {
    pub const ALL: [FieldSlot; 5] = [
        FieldSlot::Primary,
        FieldSlot::Secondary,
        FieldSlot::Auxiliary,
        FieldSlot::Back,
        FieldSlot::Header,
    ];

    /// The pass.json key of this slot.
    pub fn key(&self) -> &'static str {
        match self {
            FieldSlot::Primary => "primaryFields",
            FieldSlot::Secondary => "secondaryFields",
            FieldSlot::Auxiliary => "auxiliaryFields",
            FieldSlot::Back => "backFields",
            FieldSlot::Header => "headerFields",
        }
    }

    fn index(&self) -> usize {
        match self {
            FieldSlot::Primary => 0,
            FieldSlot::Secondary => 1,
            FieldSlot::Auxiliary => 2,
            FieldSlot::Back => 3,
            FieldSlot::Header => 4,
        }
    }
}

impl fmt::Display for FieldSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Ordered fields of the five slots with pass-wide unique keys.
///
/// Not internally synchronized; it is owned by one [`crate::Pass`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldCollection {
    slots: [Vec<Field>; 5],
    keys: HashSet<String>,
}

impl FieldCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the field lists of a template's style object.
    ///
    /// Entries that are not valid fields, and entries repeating a key seen
    /// earlier, are dropped and logged.
    pub fn from_template(content: &Map<String, Value>) -> Self {
        let mut collection = Self::new();

        for slot in FieldSlot::ALL {
            let Some(entries) = content.get(slot.key()) else {
                continue;
            };
            let Some(entries) = entries.as_array() else {
                warn!(slot = %slot, "ignoring field list that is not an array");
                continue;
            };

            let mut rejected = 0usize;
            for entry in entries {
                let Some(field) = schema::parse::<Field>(entry) else {
                    rejected += 1;
                    continue;
                };
                if let Err(Error::DuplicateKey(key)) = collection.insert(slot, field) {
                    warn!(slot = %slot, key = %key, "dropping template field with duplicate key");
                }
            }
            if rejected > 0 {
                warn!(slot = %slot, rejected, "dropping invalid template fields");
            }
        }

        collection
    }

    /// Append `field` to `slot`.
    ///
    /// Fails with [`Error::DuplicateKey`] if any slot already holds the key;
    /// the collection is unchanged in that case.
    pub fn insert(&mut self, slot: FieldSlot, field: Field) -> Result<()> {
        if self.keys.contains(&field.key) {
            return Err(Error::DuplicateKey(field.key));
        }
        self.keys.insert(field.key.clone());
        self.slots[slot.index()].push(field);
        Ok(())
    }

    /// Append several fields to `slot`, all or nothing.
    pub fn extend(&mut self, slot: FieldSlot, fields: impl IntoIterator<Item = Field>) -> Result<()> {
        let fields: Vec<Field> = fields.into_iter().collect();

        let mut batch = HashSet::with_capacity(fields.len());
        for field in &fields {
            if self.keys.contains(&field.key) || !batch.insert(field.key.as_str()) {
                return Err(Error::DuplicateKey(field.key.clone()));
            }
        }

        for field in fields {
            self.keys.insert(field.key.clone());
            self.slots[slot.index()].push(field);
        }
        Ok(())
    }

    /// Remove the field with `key` from whichever slot holds it.
    pub fn remove(&mut self, key: &str) -> Option<Field> {
        if !self.keys.remove(key) {
            return None;
        }
        for slot in self.slots.iter_mut() {
            if let Some(position) = slot.iter().position(|f| f.key == key) {
                return Some(slot.remove(position));
            }
        }
        None
    }

    /// Remove every field of `slot`, returning them in order.
    pub fn clear_slot(&mut self, slot: FieldSlot) -> Vec<Field> {
        let removed = std::mem::take(&mut self.slots[slot.index()]);
        for field in &removed {
            self.keys.remove(&field.key);
        }
        removed
    }

    pub fn get(&self, slot: FieldSlot) -> &[Field] {
        &self.slots[slot.index()]
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    /// Slot currently holding `key`.
    pub fn slot_of(&self, key: &str) -> Option<FieldSlot> {
        FieldSlot::ALL
            .into_iter()
            .find(|slot| self.get(*slot).iter().any(|f| f.key == key))
    }

    /// Total number of fields across all slots.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Every field with its slot, slot by slot in [`FieldSlot::ALL`] order.
    pub fn iter(&self) -> impl Iterator<Item = (FieldSlot, &Field)> {
        FieldSlot::ALL
            .into_iter()
            .flat_map(move |slot| self.get(slot).iter().map(move |f| (slot, f)))
    }

    /// Replace the five field lists of a style object with this collection.
    pub fn write_into(&self, content: &mut Map<String, Value>) -> Result<()> {
        for slot in FieldSlot::ALL {
            content.insert(slot.key().to_string(), serde_json::to_value(self.get(slot))?);
        }
        Ok(())
    }
}
