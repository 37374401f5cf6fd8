//! Product records.
//!
//! A [`Product`] is one node of the product tree: a deliverable or an
//! organizational grouping. Products are assembled with a [`ProductBuilder`]
//! during a single traversal and are not mutated once inserted in a tree.

use std::fmt;

use indexmap::IndexSet;
use serde::Serialize;

/// A lightweight cross-link to another product.
///
/// Relation records are not tree edges. Two records are the same relation
/// when their keys match, whatever their display names.
#[derive(Debug, Clone, Eq, Serialize)]
pub struct RelationRecord {
    name: String,
    key: String,
    short_name: String,
}

impl RelationRecord {
    pub fn new(
        name: impl Into<String>,
        key: impl Into<String>,
        short_name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
            short_name: short_name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn short_name(&self) -> &str {
        &self.short_name
    }
}

impl PartialEq for RelationRecord {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl std::hash::Hash for RelationRecord {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

/// A traced requirement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Requirement {
    id: String,
    name: String,
}

impl Requirement {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// One node of the product tree.
#[derive(Debug, Clone, Serialize)]
pub struct Product {
    id: String,
    name: String,
    short_name: String,
    parent_id: String,
    wbs: Vec<String>,
    team: Vec<String>,
    manager: Vec<String>,
    owner: Vec<String>,
    packages: Vec<String>,
    hyperlink_text: Vec<String>,
    documents: Vec<String>,
    comments: String,
    depends_on: IndexSet<RelationRecord>,
    used_in: IndexSet<RelationRecord>,
    requirements: Vec<Requirement>,
    element_id: String,
    index: Option<u32>,
}

impl Product {
    /// Start building a product with the given tree key.
    pub fn builder(id: impl Into<String>) -> ProductBuilder {
        ProductBuilder::new(id)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn short_name(&self) -> &str {
        &self.short_name
    }

    /// The parent's tree key; empty only for the root.
    pub fn parent_id(&self) -> &str {
        &self.parent_id
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_empty()
    }

    pub fn wbs(&self) -> &[String] {
        &self.wbs
    }

    pub fn team(&self) -> &[String] {
        &self.team
    }

    pub fn manager(&self) -> &[String] {
        &self.manager
    }

    pub fn owner(&self) -> &[String] {
        &self.owner
    }

    pub fn packages(&self) -> &[String] {
        &self.packages
    }

    pub fn hyperlink_text(&self) -> &[String] {
        &self.hyperlink_text
    }

    pub fn documents(&self) -> &[String] {
        &self.documents
    }

    /// Comment text, already converted to LaTeX markup.
    pub fn comments(&self) -> &str {
        &self.comments
    }

    pub fn depends_on(&self) -> impl ExactSizeIterator<Item = &RelationRecord> {
        self.depends_on.iter()
    }

    pub fn used_in(&self) -> impl ExactSizeIterator<Item = &RelationRecord> {
        self.used_in.iter()
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    /// Id of the element this product was read from, for traceability.
    pub fn element_id(&self) -> &str {
        &self.element_id
    }

    /// Explicit sibling ordering key from a numeric name prefix.
    pub fn index(&self) -> Option<u32> {
        self.index
    }

    /// Return a copy attached to a different parent.
    ///
    /// Only used to hang an independently built tree's root below a
    /// synthesized super-root.
    pub fn with_parent(&self, parent_id: impl Into<String>) -> Product {
        Product {
            parent_id: parent_id.into(),
            ..self.clone()
        }
    }
}

impl fmt::Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// Builder for [`Product`] records.
///
/// Relation and requirement setters keep set semantics: a relation whose key
/// is already present is ignored, and requirements are deduplicated by id
/// and sorted by id when the product is built.
#[derive(Debug, Clone)]
pub struct ProductBuilder {
    product: Product,
}

impl ProductBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            product: Product {
                id: id.into(),
                name: String::new(),
                short_name: String::new(),
                parent_id: String::new(),
                wbs: Vec::new(),
                team: Vec::new(),
                manager: Vec::new(),
                owner: Vec::new(),
                packages: Vec::new(),
                hyperlink_text: Vec::new(),
                documents: Vec::new(),
                comments: String::new(),
                depends_on: IndexSet::new(),
                used_in: IndexSet::new(),
                requirements: Vec::new(),
                element_id: String::new(),
                index: None,
            },
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.product.name = name.into();
        self
    }

    pub fn with_short_name(mut self, short_name: impl Into<String>) -> Self {
        self.product.short_name = short_name.into();
        self
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.product.parent_id = parent_id.into();
        self
    }

    pub fn with_wbs(mut self, wbs: Vec<String>) -> Self {
        self.product.wbs = wbs;
        self
    }

    pub fn with_team(mut self, team: Vec<String>) -> Self {
        self.product.team = team;
        self
    }

    pub fn with_manager(mut self, manager: Vec<String>) -> Self {
        self.product.manager = manager;
        self
    }

    pub fn with_owner(mut self, owner: Vec<String>) -> Self {
        self.product.owner = owner;
        self
    }

    pub fn with_packages(mut self, packages: Vec<String>) -> Self {
        self.product.packages = packages;
        self
    }

    pub fn with_hyperlink_text(mut self, hyperlink_text: Vec<String>) -> Self {
        self.product.hyperlink_text = hyperlink_text;
        self
    }

    pub fn with_documents(mut self, documents: Vec<String>) -> Self {
        self.product.documents = documents;
        self
    }

    pub fn with_comments(mut self, comments: impl Into<String>) -> Self {
        self.product.comments = comments.into();
        self
    }

    pub fn with_element_id(mut self, element_id: impl Into<String>) -> Self {
        self.product.element_id = element_id.into();
        self
    }

    pub fn with_index(mut self, index: Option<u32>) -> Self {
        self.product.index = index;
        self
    }

    /// Record a depends-on relation. Returns `false` if the key was already present.
    pub fn add_depends_on(&mut self, relation: RelationRecord) -> bool {
        self.product.depends_on.insert(relation)
    }

    /// Record a used-in relation. Returns `false` if the key was already present.
    pub fn add_used_in(&mut self, relation: RelationRecord) -> bool {
        self.product.used_in.insert(relation)
    }

    pub fn add_requirement(&mut self, requirement: Requirement) {
        if !self
            .product
            .requirements
            .iter()
            .any(|r| r.id == requirement.id)
        {
            self.product.requirements.push(requirement);
        }
    }

    /// The name set so far.
    pub fn name(&self) -> &str {
        &self.product.name
    }

    pub fn build(mut self) -> Product {
        if self.product.requirements.len() > 1 {
            self.product
                .requirements
                .sort_by(|a, b| a.id.cmp(&b.id));
        }
        self.product
    }
}
