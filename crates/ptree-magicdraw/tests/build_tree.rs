use std::{collections::BTreeSet, time::Duration};

use proptest::prelude::*;
use serde_json::{Value, json};

use ptree_magicdraw::{
    BuildSession, CancellationFlag, ElementKind, ElementRecord, ExtractError, InMemoryGateway,
    RetryPolicy, TreeBuilder,
};

fn link(id: &str) -> Value {
    json!({ "@id": id })
}

fn links(ids: &[&str]) -> Value {
    Value::Array(ids.iter().map(|id| link(id)).collect())
}

/// Test model builder over an [`InMemoryGateway`].
struct Model {
    gateway: InMemoryGateway,
}

impl Model {
    fn new() -> Self {
        let gateway = InMemoryGateway::new()
            .with(ElementRecord::new("f-key", ElementKind::Property, "product key"))
            .with(ElementRecord::new("f-short", ElementKind::Property, "short name"))
            .with(ElementRecord::new("f-pkgs", ElementKind::Property, "packages"));
        Self { gateway }
    }

    /// Adds an instance specification `{owner}-inst` with string slots.
    fn instance(&mut self, owner: &str, slots: &[(&str, Vec<&str>)]) -> String {
        let inst = format!("{owner}-inst");
        let mut slot_ids = Vec::new();
        for (feature, values) in slots {
            let slot = format!("{inst}-{feature}");
            let mut value_ids = Vec::new();
            for (i, value) in values.iter().enumerate() {
                let value_id = format!("{slot}-{i}");
                self.gateway.insert(
                    ElementRecord::new(value_id.as_str(), ElementKind::LiteralString, "")
                        .with_field("value", json!(value)),
                );
                value_ids.push(value_id);
            }
            self.gateway.insert(
                ElementRecord::new(slot.as_str(), ElementKind::Slot, "")
                    .with_children(value_ids)
                    .with_field("definingFeature", link(feature)),
            );
            slot_ids.push(slot);
        }
        self.gateway.insert(
            ElementRecord::new(inst.as_str(), ElementKind::InstanceSpecification, "")
                .with_children(slot_ids),
        );
        inst
    }

    fn element(&mut self, record: ElementRecord) {
        self.gateway.insert(record);
    }
}

/// ```text
/// DM (package "Data Management", short name "DM")
/// ├── 02. Middleware (class MW)
/// ├── 01. Science (package Sci)
/// │   └── Afw (class afw) -- used in MW, traces DMS-REQ-0001
/// └── Butler (class butler) -- traces DMS-REQ-0001
/// ```
///
/// `DM` lists the classes before the package to check that packages are
/// visited first.
fn sample_model() -> Model {
    let mut model = Model::new();

    let dm_inst = model.instance("dm", &[("f-key", vec!["DM"]), ("f-short", vec!["DM"])]);
    model.element(ElementRecord::new("comment", ElementKind::Comment, "").with_field(
        "body",
        json!("<html><body><p>Top of the <b>tree</b></p></body></html>"),
    ));
    model.element(ElementRecord::new("diagram", ElementKind::Diagram, "Overview"));
    model.element(ElementRecord::new("odd", ElementKind::Unrecognized("uml:Activity".into()), ""));
    model.element(
        ElementRecord::new("dm", ElementKind::Package, "Data Management").with_children([
            dm_inst.as_str(),
            "mw",
            "butler",
            "sci",
            "comment",
            "diagram",
            "odd",
        ]),
    );

    let mw_inst = model.instance("mw", &[("f-key", vec!["MW"]), ("f-short", vec!["Middleware"])]);
    model.element(ElementRecord::new("mw", ElementKind::Class, "02. Middleware").with_children([mw_inst]));

    let sci_inst = model.instance("sci", &[("f-key", vec!["Sci"])]);
    model.element(
        ElementRecord::new("sci", ElementKind::Package, "01. Science").with_children([sci_inst.as_str(), "afw"]),
    );

    let afw_inst = model.instance(
        "afw",
        &[("f-key", vec!["a_f.w"]), ("f-pkgs", vec!["afw", "geom"])],
    );
    model.element(
        ElementRecord::new("afw", ElementKind::Class, "Afw")
            .with_children([afw_inst])
            .with_field("_typedElementOfType", links(&["afw-end"]))
            .with_field("_directedRelationshipOfSource", links(&["trace-afw", "dep-afw"])),
    );
    // the association owns the afw end; Middleware is the composite whole
    model.element(
        ElementRecord::new("afw-end", ElementKind::Property, "")
            .with_field("association", link("assoc"))
            .with_field("owner", link("assoc"))
            .with_field("type", link("afw")),
    );
    model.element(
        ElementRecord::new("mw-end", ElementKind::Property, "")
            .with_field("aggregation", json!("composite"))
            .with_field("type", link("mw")),
    );
    model.element(
        ElementRecord::new("assoc", ElementKind::Association, "")
            .with_field("memberEnd", links(&["afw-end", "mw-end"])),
    );

    model.element(
        ElementRecord::new("trace-afw", ElementKind::Abstraction, "").with_field("supplier", links(&["req"])),
    );
    model.element(ElementRecord::new("dep-afw", ElementKind::Dependency, ""));
    model.element(ElementRecord::new("req", ElementKind::Class, "DMS-REQ-0001 Process_images"));

    let butler_inst = model.instance("butler", &[("f-key", vec!["butler"])]);
    model.element(
        ElementRecord::new("butler", ElementKind::Class, "Butler")
            .with_children([butler_inst])
            .with_field("_directedRelationshipOfSource", links(&["trace-butler"])),
    );
    model.element(
        ElementRecord::new("trace-butler", ElementKind::Abstraction, "").with_field("target", link("req")),
    );

    model
}

#[test]
fn test_builds_ordered_tree() {
    let model = sample_model();
    let mut session = BuildSession::new(&model.gateway);

    let tree = TreeBuilder::new(&mut session).build("dm").unwrap();

    let order: Vec<_> = tree.iter_depth_first().map(|p| p.id().to_string()).collect();
    assert_eq!(order, vec!["DM", "Sci", "afw", "MW", "butler"]);
    assert_eq!(session.products_processed(), 5);

    let root = tree.root().unwrap();
    assert_eq!(root.name(), "DM");
    assert!(root.comments().contains("\\textbf{tree}"));
    assert_eq!(root.element_id(), "dm");

    let sci = tree.get("Sci").unwrap();
    assert_eq!(sci.name(), "Science");
    assert_eq!(sci.index(), Some(1));
    assert_eq!(sci.parent_id(), "DM");
    assert_eq!(sci.wbs(), [""]);

    let afw = tree.get("afw").unwrap();
    assert_eq!(afw.packages(), ["afw", "geom"]);
    assert_eq!(tree.get("MW").unwrap().index(), Some(2));
}

#[test]
fn test_class_relations_and_requirements() {
    let model = sample_model();
    let mut session = BuildSession::new(&model.gateway);

    let tree = TreeBuilder::new(&mut session).build("dm").unwrap();

    let afw = tree.get("afw").unwrap();
    let used_in: Vec<_> = afw.used_in().map(|r| r.key()).collect();
    assert_eq!(used_in, vec!["MW"]);
    assert_eq!(afw.depends_on().len(), 0);
    assert_eq!(afw.requirements().len(), 1);
    assert_eq!(afw.requirements()[0].id(), "DMS-REQ-0001");
    assert_eq!(afw.requirements()[0].name(), "Process\\_images");

    let butler = tree.get("butler").unwrap();
    assert_eq!(butler.requirements()[0].id(), "DMS-REQ-0001");
}

#[test]
fn test_reset_session_starts_over() {
    let model = sample_model();
    let mut session = BuildSession::new(&model.gateway);
    TreeBuilder::new(&mut session).build("dm").unwrap();
    let first = model.gateway.fetch_count();
    assert_eq!(session.cached_requirement("req").unwrap().id(), "DMS-REQ-0001");

    session.reset();
    TreeBuilder::new(&mut session).build("dm").unwrap();

    // a reset session fetches everything again, the same number of times
    assert_eq!(model.gateway.fetch_count(), 2 * first);
}

#[test]
fn test_missing_product_key_is_fatal() {
    let mut model = sample_model();
    model.element(ElementRecord::new("butler", ElementKind::Class, "Butler"));
    let mut session = BuildSession::new(&model.gateway);

    let err = TreeBuilder::new(&mut session).build("dm").unwrap_err();
    assert!(matches!(
        err,
        ExtractError::MissingProductKey { ref element_id, .. } if element_id == "butler"
    ));
}

#[test]
fn test_duplicate_product_key_is_fatal() {
    let mut model = sample_model();
    // "M W" sanitizes to the key of the Middleware class
    let inst = model.instance("butler2", &[("f-key", vec!["M W"])]);
    model.element(ElementRecord::new("butler", ElementKind::Class, "Butler").with_children([inst]));
    let mut session = BuildSession::new(&model.gateway);

    let err = TreeBuilder::new(&mut session).build("dm").unwrap_err();
    assert!(matches!(err, ExtractError::Tree(_)));
}

#[test]
fn test_unexpected_top_element_is_fatal() {
    let model = sample_model();
    let mut session = BuildSession::new(&model.gateway);

    let err = TreeBuilder::new(&mut session).build("comment").unwrap_err();
    assert!(matches!(err, ExtractError::UnexpectedElement { ref kind, .. } if kind == "uml:Comment"));
}

#[test]
fn test_cancellation_returns_no_tree() {
    let model = sample_model();
    let cancel = CancellationFlag::new();
    cancel.cancel();
    let mut session = BuildSession::new(&model.gateway).with_cancellation(cancel);

    let err = TreeBuilder::new(&mut session).build("dm").unwrap_err();
    assert!(matches!(err, ExtractError::Cancelled));
}

#[test]
fn test_rate_limited_fetches_are_retried() {
    let model = sample_model();
    model.gateway.throttle("afw", 2);
    let mut session = BuildSession::new(&model.gateway)
        .with_retry_policy(RetryPolicy::new().with_backoff(Duration::ZERO));

    let tree = TreeBuilder::new(&mut session).build("dm").unwrap();
    assert!(tree.contains("afw"));
}

#[test]
fn test_rate_limit_bound_is_reported() {
    let model = sample_model();
    model.gateway.throttle("sci", 10);
    let mut session = BuildSession::new(&model.gateway).with_retry_policy(
        RetryPolicy::new()
            .with_backoff(Duration::ZERO)
            .with_max_retries(Some(3)),
    );

    let err = TreeBuilder::new(&mut session).build("dm").unwrap_err();
    assert!(matches!(
        err,
        ExtractError::RateLimitExhausted { ref element_id, attempts: 4 } if element_id == "sci"
    ));
}

/// Shape of one association between `hub` and a counterpart class.
struct End {
    counterpart: &'static str,
    hub_owned: bool,
    hub_composite: bool,
    other_composite: bool,
    hub_second: bool,
}

impl End {
    fn add(&self, model: &mut Model, i: usize) {
        let assoc = format!("assoc-{i}");
        let hub_end = format!("hub-end-{i}");
        let other_end = format!("c-end-{i}");

        let owner = if self.hub_owned { assoc.as_str() } else { "hub" };
        let mut hub = ElementRecord::new(hub_end.as_str(), ElementKind::Property, "")
            .with_field("association", link(&assoc))
            .with_field("type", link("hub"))
            .with_field("owner", link(owner));
        if self.hub_composite {
            hub = hub.with_field("aggregation", json!("composite"));
        }
        let mut other = ElementRecord::new(other_end.as_str(), ElementKind::Property, "")
            .with_field("association", link(&assoc))
            .with_field("type", link(self.counterpart));
        if self.other_composite {
            other = other.with_field("aggregation", json!("composite"));
        }
        model.element(hub);
        model.element(other);

        let ends = if self.hub_second {
            [other_end.as_str(), hub_end.as_str()]
        } else {
            [hub_end.as_str(), other_end.as_str()]
        };
        let mut record =
            ElementRecord::new(assoc.as_str(), ElementKind::Association, "").with_field("memberEnd", links(&ends));
        if self.hub_second {
            record = record.with_field("member", links(&[hub_end.as_str()]));
        }
        model.element(record);
    }
}

/// Association ends typed by the `hub` class, one per relation shape.
const HUB_ENDS: [&str; 6] = ["hub-end-0", "hub-end-1", "hub-end-2", "hub-end-3", "hub-end-4", "hub-end-5"];

/// ```text
/// TOP (package)
/// └── Hub (class HUB)
/// ```
///
/// `Hub` reaches `C0`..`C4` through six associations:
/// - 0: association-owned end, composite whole on the other side: used in `C0`
/// - 1: association-owned composite end, composite other side: depends on `C1`
/// - 2: composite other end only: depends on `C2`
/// - 3: hub end is the second member end and a member: depends on `C3`
/// - 4: plain association: used in `C4`
/// - 5: plain association to `C0` again: used in `C0`, recorded once
fn hub_model(typed_order: &[&str]) -> Model {
    let mut model = Model::new();

    let top_inst = model.instance("top", &[("f-key", vec!["TOP"])]);
    model.element(ElementRecord::new("top", ElementKind::Package, "Top").with_children([top_inst.as_str(), "hub"]));

    let hub_inst = model.instance("hub", &[("f-key", vec!["HUB"])]);
    model.element(
        ElementRecord::new("hub", ElementKind::Class, "Hub")
            .with_children([hub_inst])
            .with_field("_typedElementOfType", links(typed_order)),
    );

    for i in 0..5 {
        let class = format!("c{i}");
        let key = format!("C{i}");
        let inst = model.instance(&class, &[("f-key", vec![key.as_str()])]);
        model.element(ElementRecord::new(class.as_str(), ElementKind::Class, format!("Class {i}")).with_children([inst]));
    }

    let shapes = [
        End { counterpart: "c0", hub_owned: true, hub_composite: false, other_composite: true, hub_second: false },
        End { counterpart: "c1", hub_owned: true, hub_composite: true, other_composite: true, hub_second: false },
        End { counterpart: "c2", hub_owned: false, hub_composite: false, other_composite: true, hub_second: false },
        End { counterpart: "c3", hub_owned: false, hub_composite: false, other_composite: false, hub_second: true },
        End { counterpart: "c4", hub_owned: false, hub_composite: false, other_composite: false, hub_second: false },
        End { counterpart: "c0", hub_owned: false, hub_composite: false, other_composite: false, hub_second: false },
    ];
    for (i, shape) in shapes.iter().enumerate() {
        shape.add(&mut model, i);
    }

    model
}

fn hub_relations(typed_order: &[&str]) -> (BTreeSet<String>, BTreeSet<String>) {
    let model = hub_model(typed_order);
    let mut session = BuildSession::new(&model.gateway);
    let tree = TreeBuilder::new(&mut session).build("top").unwrap();

    let hub = tree.get("HUB").unwrap();
    let depends_on = hub.depends_on().map(|r| r.key().to_string()).collect();
    let used_in = hub.used_in().map(|r| r.key().to_string()).collect();
    (depends_on, used_in)
}

#[test]
fn test_hub_relations_by_ownership() {
    let (depends_on, used_in) = hub_relations(&HUB_ENDS);

    assert_eq!(depends_on, BTreeSet::from(["C1".to_string(), "C2".to_string(), "C3".to_string()]));
    assert_eq!(used_in, BTreeSet::from(["C0".to_string(), "C4".to_string()]));
}

proptest! {
    #[test]
    fn relations_do_not_depend_on_end_order(order in Just(HUB_ENDS.to_vec()).prop_shuffle()) {
        let expected = hub_relations(&HUB_ENDS);
        let (depends_on, used_in) = hub_relations(&order);

        prop_assert_eq!(depends_on, expected.0);
        prop_assert_eq!(used_in, expected.1);
    }
}
