//! Depends-on / used-in classification of associations.
//!
//! A product class is linked to other products through associations. The
//! visited class reaches them through its typed elements: association ends
//! whose type is the class. For each such end this module finds the class at
//! the other side (the *counterpart*) and decides which way the relation
//! points from the aggregation and ownership of the two ends.
//!
//! Counterparts owning a diagram are modeling artifacts and never produce a
//! relation.

use log::{debug, trace, warn};

use ptree_core::{
    product::{ProductBuilder, RelationRecord},
    text::{sanitize_id, sanitize_tex, split_numeric_prefix},
};

use crate::{
    error::ExtractError,
    gateway::ElementRecord,
    properties::{keys, owned_properties},
    session::BuildSession,
};

/// Direction of a relation as seen from the visited product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationKind {
    /// The visited product depends on the counterpart.
    DependsOn,
    /// The visited product is used in the counterpart.
    UsedIn,
}

/// A relation ready to be recorded on a product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedRelation {
    kind: RelationKind,
    record: RelationRecord,
}

impl ClassifiedRelation {
    pub fn new(kind: RelationKind, record: RelationRecord) -> Self {
        Self { kind, record }
    }

    pub fn kind(&self) -> RelationKind {
        self.kind
    }

    pub fn record(&self) -> &RelationRecord {
        &self.record
    }
}

/// Records a relation on a product under construction.
///
/// Returns `false` when a relation with the same key was already recorded in
/// that direction.
pub fn apply_relation(builder: &mut ProductBuilder, relation: ClassifiedRelation) -> bool {
    match relation.kind {
        RelationKind::DependsOn => builder.add_depends_on(relation.record),
        RelationKind::UsedIn => builder.add_used_in(relation.record),
    }
}

fn is_composite(element: &ElementRecord) -> bool {
    element.text("aggregation") == Some("composite")
}

/// Classifies the association behind one typed element.
///
/// Returns `None` when the typed element belongs to no association, when the
/// counterpart cannot be identified or carries no product key, and when the
/// counterpart owns a diagram.
///
/// # Errors
///
/// Only fetch failures are returned.
pub fn resolve_relation(
    session: &mut BuildSession<'_>,
    typed_element_id: &str,
) -> Result<Option<ClassifiedRelation>, ExtractError> {
    let typed = session.fetch(typed_element_id)?;
    let Some(association_id) = typed.reference("association") else {
        trace!(element_id = typed_element_id; "Typed element has no association");
        return Ok(None);
    };
    let association = session.fetch(association_id)?;

    let member_ends = association.references("memberEnd");
    let opposite = match member_ends.iter().find(|end| **end != typed.id()) {
        Some(end) => Some(session.fetch(end)?),
        None => None,
    };

    let counterpart_id = opposite
        .as_ref()
        .and_then(|end| end.reference("type"))
        .or_else(|| typed.reference("owner"));
    let Some(counterpart_id) = counterpart_id else {
        warn!(element_id = typed_element_id; "Cannot identify the counterpart of an association end");
        return Ok(None);
    };
    let counterpart = session.fetch(counterpart_id)?;
    if !counterpart.references("ownedDiagram").is_empty() {
        debug!(counterpart = counterpart.name(); "Counterpart owns a diagram, relation excluded");
        return Ok(None);
    }

    let kind = classify(&typed, association_id, &member_ends, opposite.as_deref(), &association);

    let Some(record) = counterpart_record(session, &counterpart)? else {
        return Ok(None);
    };
    trace!(counterpart = record.key(), kind:? = kind; "Classified relation");
    Ok(Some(ClassifiedRelation::new(kind, record)))
}

/// Applies the three ownership rules, in priority order.
fn classify(
    typed: &ElementRecord,
    association_id: &str,
    member_ends: &[&str],
    opposite: Option<&ElementRecord>,
    association: &ElementRecord,
) -> RelationKind {
    // 1. The association owns the typed end and the other side is the whole.
    let owned_by_association = typed.reference("owner") == Some(association_id)
        || typed.reference("namespace") == Some(association_id);
    if owned_by_association && opposite.is_some_and(is_composite) {
        return if is_composite(typed) {
            RelationKind::DependsOn
        } else {
            RelationKind::UsedIn
        };
    }

    // 2. The owned member end is composite.
    if opposite.is_some_and(is_composite) {
        return RelationKind::DependsOn;
    }

    // 3. The typed element is the target end and a top-level member.
    let is_target_end = member_ends.get(1) == Some(&typed.id());
    let is_member = association.references("member").contains(&typed.id());
    if is_target_end && is_member {
        RelationKind::DependsOn
    } else {
        RelationKind::UsedIn
    }
}

/// Builds, or reads back from the session, the relation record of a class.
fn counterpart_record(
    session: &mut BuildSession<'_>,
    counterpart: &ElementRecord,
) -> Result<Option<RelationRecord>, ExtractError> {
    if let Some(record) = session.cached_counterpart(counterpart.id()) {
        return Ok(Some(record.clone()));
    }

    let properties = owned_properties(session, counterpart)?.unwrap_or_default();
    let key = sanitize_id(properties.first(keys::PRODUCT_KEY));
    if key.is_empty() {
        warn!(counterpart = counterpart.name(); "Related class has no product key, relation skipped");
        return Ok(None);
    }

    let (_, name) = split_numeric_prefix(counterpart.name());
    let record = RelationRecord::new(
        sanitize_tex(name),
        key,
        sanitize_tex(properties.first(keys::SHORT_NAME)),
    );
    session.cache_counterpart(counterpart.id(), record.clone());
    Ok(Some(record))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::gateway::{ElementGateway, ElementKind, InMemoryGateway};

    /// Adds a counterpart class `id` carrying product key `key`.
    fn counterpart(gateway: &mut InMemoryGateway, id: &str, name: &str, key: &str) {
        let inst = format!("{id}-inst");
        let slot = format!("{id}-slot");
        let value = format!("{id}-value");
        gateway.insert(ElementRecord::new(id, ElementKind::Class, name).with_children([inst.as_str()]));
        gateway.insert(
            ElementRecord::new(inst.as_str(), ElementKind::InstanceSpecification, "")
                .with_children([slot.as_str()]),
        );
        gateway.insert(
            ElementRecord::new(slot.as_str(), ElementKind::Slot, "")
                .with_children([value.as_str()])
                .with_field("definingFeature", json!({ "@id": "f-key" })),
        );
        gateway.insert(
            ElementRecord::new(value.as_str(), ElementKind::LiteralString, "")
                .with_field("value", json!(key)),
        );
        gateway.insert(ElementRecord::new("f-key", ElementKind::Property, "product key"));
    }

    /// Association `assoc` between end `typed` (typed by the visited class)
    /// and end `other` (typed by `target`).
    fn association(
        gateway: &mut InMemoryGateway,
        typed_fields: &[(&str, serde_json::Value)],
        other_aggregation: &str,
        ends: [&str; 2],
        members: &[&str],
        target: &str,
    ) {
        let mut typed = ElementRecord::new("typed", ElementKind::Property, "")
            .with_field("association", json!({ "@id": "assoc" }))
            .with_field("type", json!({ "@id": "visited" }));
        for (field, value) in typed_fields {
            typed = typed.with_field(*field, value.clone());
        }
        gateway.insert(typed);
        gateway.insert(
            ElementRecord::new("other", ElementKind::Property, "")
                .with_field("aggregation", json!(other_aggregation))
                .with_field("type", json!({ "@id": target })),
        );
        let links = |ids: &[&str]| json!(ids.iter().map(|id| json!({ "@id": id })).collect::<Vec<_>>());
        gateway.insert(
            ElementRecord::new("assoc", ElementKind::Association, "")
                .with_field("memberEnd", links(&ends[..]))
                .with_field("member", links(members)),
        );
    }

    fn resolve(gateway: &InMemoryGateway) -> Option<ClassifiedRelation> {
        let mut session = BuildSession::new(gateway);
        resolve_relation(&mut session, "typed").unwrap()
    }

    #[test]
    fn test_association_owned_end_with_composite_whole_is_used_in() {
        let mut gateway = InMemoryGateway::new();
        counterpart(&mut gateway, "whole", "01. Science Pipelines", "Sci Pipe");
        association(
            &mut gateway,
            &[("owner", json!({ "@id": "assoc" }))],
            "composite",
            ["typed", "other"],
            &[],
            "whole",
        );

        let relation = resolve(&gateway).unwrap();
        assert_eq!(relation.kind(), RelationKind::UsedIn);
        assert_eq!(relation.record().key(), "SciPipe");
        assert_eq!(relation.record().name(), "Science Pipelines");
    }

    #[test]
    fn test_association_owned_composite_end_depends_on() {
        let mut gateway = InMemoryGateway::new();
        counterpart(&mut gateway, "part", "Part", "part");
        association(
            &mut gateway,
            &[
                ("namespace", json!({ "@id": "assoc" })),
                ("aggregation", json!("composite")),
            ],
            "composite",
            ["typed", "other"],
            &[],
            "part",
        );

        assert_eq!(resolve(&gateway).unwrap().kind(), RelationKind::DependsOn);
    }

    #[test]
    fn test_composite_owned_member_depends_on() {
        let mut gateway = InMemoryGateway::new();
        counterpart(&mut gateway, "part", "Part", "part");
        association(
            &mut gateway,
            &[("owner", json!({ "@id": "someclass" }))],
            "composite",
            ["typed", "other"],
            &[],
            "part",
        );

        assert_eq!(resolve(&gateway).unwrap().kind(), RelationKind::DependsOn);
    }

    #[test]
    fn test_fallback_target_member_depends_on() {
        let mut gateway = InMemoryGateway::new();
        counterpart(&mut gateway, "peer", "Peer", "peer");
        association(&mut gateway, &[], "none", ["other", "typed"], &["typed", "other"], "peer");

        assert_eq!(resolve(&gateway).unwrap().kind(), RelationKind::DependsOn);
    }

    #[test]
    fn test_fallback_otherwise_used_in() {
        let mut gateway = InMemoryGateway::new();
        counterpart(&mut gateway, "peer", "Peer", "peer");
        // second end but not a top-level member
        association(&mut gateway, &[], "none", ["other", "typed"], &["other"], "peer");

        assert_eq!(resolve(&gateway).unwrap().kind(), RelationKind::UsedIn);
    }

    #[test]
    fn test_counterpart_owning_a_diagram_is_excluded() {
        for aggregation in ["composite", "shared", "none"] {
            let mut gateway = InMemoryGateway::new();
            counterpart(&mut gateway, "view", "View", "view");
            let view = gateway.fetch("view").unwrap().with_field(
                "ownedDiagram",
                json!([{ "@id": "diagram" }]),
            );
            gateway.insert(view);
            association(&mut gateway, &[], aggregation, ["typed", "other"], &["typed"], "view");

            assert_eq!(resolve(&gateway), None, "{aggregation}");
        }
    }

    #[test]
    fn test_no_association_and_no_counterpart() {
        let gateway = InMemoryGateway::new().with(ElementRecord::new("typed", ElementKind::Property, ""));
        assert_eq!(resolve(&gateway), None);

        let gateway = InMemoryGateway::new()
            .with(
                ElementRecord::new("typed", ElementKind::Property, "")
                    .with_field("association", json!({ "@id": "assoc" })),
            )
            .with(ElementRecord::new("assoc", ElementKind::Association, ""));
        assert_eq!(resolve(&gateway), None);
    }

    #[test]
    fn test_counterpart_without_product_key_is_skipped() {
        let mut gateway = InMemoryGateway::new();
        gateway.insert(ElementRecord::new("bare", ElementKind::Class, "Bare"));
        association(&mut gateway, &[], "none", ["typed", "other"], &[], "bare");

        assert_eq!(resolve(&gateway), None);
    }

    #[test]
    fn test_counterpart_records_are_memoized() {
        let mut gateway = InMemoryGateway::new();
        counterpart(&mut gateway, "peer", "Peer", "peer");
        association(&mut gateway, &[], "none", ["typed", "other"], &[], "peer");
        let mut session = BuildSession::new(&gateway);

        resolve_relation(&mut session, "typed").unwrap();
        assert_eq!(session.cached_counterpart("peer").unwrap().key(), "peer");
        let fetches = gateway.fetch_count();
        resolve_relation(&mut session, "typed").unwrap();
        assert_eq!(gateway.fetch_count(), fetches);
    }

    #[test]
    fn test_apply_relation_is_order_independent() {
        let a = ClassifiedRelation::new(RelationKind::DependsOn, RelationRecord::new("Afw", "afw", "AFW"));
        let b = ClassifiedRelation::new(RelationKind::UsedIn, RelationRecord::new("Butler", "butler", "B"));
        let c = ClassifiedRelation::new(RelationKind::DependsOn, RelationRecord::new("Afw again", "afw", "AFW"));

        let mut forward = ptree_core::product::Product::builder("p");
        for relation in [a.clone(), b.clone(), c.clone()] {
            apply_relation(&mut forward, relation);
        }
        let mut reversed = ptree_core::product::Product::builder("p");
        for relation in [c, b, a] {
            apply_relation(&mut reversed, relation);
        }

        let keys = |p: &ptree_core::product::Product| {
            let mut depends: Vec<_> = p.depends_on().map(|r| r.key().to_string()).collect();
            let mut used: Vec<_> = p.used_in().map(|r| r.key().to_string()).collect();
            depends.sort();
            used.sort();
            (depends, used)
        };
        assert_eq!(keys(&forward.build()), keys(&reversed.build()));
    }
}
