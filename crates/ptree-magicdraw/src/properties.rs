//! Instance slot flattening.
//!
//! Product attributes are stored on an instance specification owned by the
//! product's package or class. Each slot of that instance names its attribute
//! through its defining feature and holds one or more value elements.

use indexmap::IndexMap;
use log::{trace, warn};

use crate::{
    error::ExtractError,
    gateway::{ElementKind, ElementRecord},
    session::BuildSession,
};

/// Attribute names read from instance slots.
pub mod keys {
    pub const PRODUCT_KEY: &str = "product key";
    pub const SHORT_NAME: &str = "short name";
    pub const WBS: &str = "WBS";
    pub const MANAGER: &str = "manager";
    pub const OWNER: &str = "product owner";
    pub const PACKAGES: &str = "packages";
    pub const HYPERLINK_TEXT: &str = "hyperlinkText";
    pub const TEAM: &str = "team";
    pub const DOCUMENTS: &str = "documents";

    /// Attributes that are always present and never empty.
    pub const DEFAULTED: [&str; 6] = [WBS, MANAGER, OWNER, PACKAGES, HYPERLINK_TEXT, TEAM];
}

/// Insertion-ordered attribute map of one product.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyMap {
    values: IndexMap<String, Vec<String>>,
}

impl PropertyMap {
    /// Creates a map holding only the defaulted attributes, each `[""]`.
    pub fn with_defaults() -> Self {
        let mut map = Self::default();
        map.fill_defaults();
        map
    }

    /// Sets an attribute, replacing any previous values.
    pub fn insert(&mut self, key: impl Into<String>, values: Vec<String>) {
        self.values.insert(key.into(), values);
    }

    /// Values of an attribute; empty for unknown keys.
    pub fn values(&self, key: &str) -> &[String] {
        self.values.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    /// First value of an attribute; empty for unknown keys.
    pub fn first(&self, key: &str) -> &str {
        self.values(key).first().map(String::as_str).unwrap_or_default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.values
            .iter()
            .map(|(key, values)| (key.as_str(), values.as_slice()))
    }

    /// Gives every defaulted attribute that is missing or empty the value `[""]`.
    fn fill_defaults(&mut self) {
        for key in keys::DEFAULTED {
            let values = self.values.entry(key.to_string()).or_default();
            if values.is_empty() {
                values.push(String::new());
            }
        }
    }
}

/// Reads the attributes of an instance specification.
///
/// Literal string and boolean values are taken as is; instance values are
/// resolved to the referenced instance's name. Unexpected children and value
/// shapes are logged and skipped.
///
/// # Errors
///
/// Only fetch failures are returned.
pub fn resolve_properties(
    session: &mut BuildSession<'_>,
    instance_id: &str,
) -> Result<PropertyMap, ExtractError> {
    let instance = session.fetch(instance_id)?;
    let mut map = PropertyMap::default();

    for slot_id in instance.children() {
        let slot = session.fetch(slot_id)?;
        if slot.kind() != &ElementKind::Slot {
            warn!(element_id = slot_id.as_str(), kind = slot.kind().as_type(); "Expected a slot, skipping");
            continue;
        }
        let Some(feature_id) = slot.reference("definingFeature") else {
            warn!(element_id = slot_id.as_str(); "Slot has no defining feature, skipping");
            continue;
        };
        let feature = session.fetch(feature_id)?;

        let mut values = Vec::with_capacity(slot.children().len());
        for value_id in slot.children() {
            let value = session.fetch(value_id)?;
            match value.kind() {
                ElementKind::LiteralString | ElementKind::LiteralBoolean => {
                    match value.literal("value") {
                        Some(literal) => values.push(literal),
                        None => {
                            warn!(element_id = value_id.as_str(); "Literal without value, skipping")
                        }
                    }
                }
                ElementKind::InstanceValue => match value.reference("instance") {
                    Some(referenced) => {
                        let referenced = session.fetch(referenced)?;
                        values.push(referenced.name().to_string());
                    }
                    None => {
                        warn!(element_id = value_id.as_str(); "Instance value without instance, skipping")
                    }
                },
                other => {
                    warn!(element_id = value_id.as_str(), kind = other.as_type(); "Unmapped property value type")
                }
            }
        }

        trace!(property = feature.name(), count = values.len(); "Resolved property");
        map.insert(feature.name(), values);
    }

    map.fill_defaults();
    Ok(map)
}

/// Reads the attributes of the first instance specification owned by `element`.
///
/// Returns `None` when the element owns no instance specification.
pub(crate) fn owned_properties(
    session: &mut BuildSession<'_>,
    element: &ElementRecord,
) -> Result<Option<PropertyMap>, ExtractError> {
    for child_id in element.children() {
        let child = session.fetch(child_id)?;
        if child.kind() == &ElementKind::InstanceSpecification {
            return resolve_properties(session, child_id).map(Some);
        }
    }
    Ok(None)
}
