//! Recursive product tree construction.

use log::{debug, info, warn};

use ptree_core::{
    product::{Product, Requirement},
    text::{html_to_latex, sanitize_id, sanitize_tex, split_numeric_prefix},
    tree::ProductTree,
};

use crate::{
    error::ExtractError,
    gateway::{ElementKind, ElementRecord},
    properties::{PropertyMap, keys, resolve_properties},
    relations::{ClassifiedRelation, apply_relation, resolve_relation},
    session::BuildSession,
};

/// Builds a [`ProductTree`] by walking packages and classes depth first.
///
/// Each visited package or class becomes one product. Its attributes come
/// from the instance specification it owns, its comments from the comment
/// elements it owns. Classes additionally collect requirement traces and
/// depends-on / used-in relations. Sub-packages are visited before classes,
/// each group in source order.
pub struct TreeBuilder<'s, 'g> {
    session: &'s mut BuildSession<'g>,
    tree: ProductTree,
}

/// What a single element contributes before it is turned into a product.
#[derive(Default)]
struct Visit {
    packages: Vec<String>,
    classes: Vec<String>,
    properties: Option<PropertyMap>,
    comments: String,
    requirements: Vec<Requirement>,
    relations: Vec<ClassifiedRelation>,
}

impl<'s, 'g> TreeBuilder<'s, 'g> {
    pub fn new(session: &'s mut BuildSession<'g>) -> Self {
        Self {
            session,
            tree: ProductTree::new(),
        }
    }

    /// Builds the tree rooted at `root_element_id`.
    ///
    /// # Errors
    ///
    /// - [`ExtractError::UnexpectedElement`] if the root is not a package or class.
    /// - [`ExtractError::MissingProductKey`] if a visited element has no product key.
    /// - [`ExtractError::Tree`] if a product cannot be inserted.
    /// - [`ExtractError::Cancelled`] and gateway errors from fetching.
    ///
    /// No partial tree is returned on error.
    pub fn build(mut self, root_element_id: &str) -> Result<ProductTree, ExtractError> {
        let root = self.session.fetch(root_element_id)?;
        if !matches!(root.kind(), ElementKind::Package | ElementKind::Class) {
            return Err(ExtractError::UnexpectedElement {
                element_id: root_element_id.to_string(),
                kind: root.kind().to_string(),
            });
        }

        self.visit(root_element_id, "")?;
        info!(
            root = root_element_id,
            products = self.tree.len(),
            depth = self.tree.depth();
            "Product tree built"
        );
        Ok(self.tree)
    }

    fn visit(&mut self, element_id: &str, parent_key: &str) -> Result<(), ExtractError> {
        let element = self.session.fetch(element_id)?;
        let (index, raw_name) = split_numeric_prefix(element.name());
        let name = sanitize_tex(raw_name);
        info!(
            name = name.as_str(),
            element_id,
            kind = element.kind().as_type(),
            parent = parent_key;
            "Looking into element"
        );

        let mut visit = self.scan_children(&element)?;
        if element.kind() == &ElementKind::Class {
            visit.requirements = self.requirements(&element)?;
            visit.relations = self.relations(&element)?;
        }

        let properties = visit
            .properties
            .take()
            .unwrap_or_else(PropertyMap::with_defaults);
        let raw_key = properties.first(keys::PRODUCT_KEY);
        let key = sanitize_id(raw_key);
        if key.is_empty() {
            return Err(ExtractError::MissingProductKey {
                element_id: element_id.to_string(),
                name,
            });
        }

        let short_name = sanitize_tex(properties.first(keys::SHORT_NAME));
        // The source root carries no meaningful name.
        let display_name = if parent_key.is_empty() && !short_name.is_empty() {
            short_name.clone()
        } else {
            name
        };

        let mut builder = Product::builder(key.as_str())
            .with_name(display_name)
            .with_short_name(short_name)
            .with_parent(parent_key)
            .with_wbs(properties.values(keys::WBS).to_vec())
            .with_team(properties.values(keys::TEAM).to_vec())
            .with_manager(properties.values(keys::MANAGER).to_vec())
            .with_owner(properties.values(keys::OWNER).to_vec())
            .with_packages(properties.values(keys::PACKAGES).to_vec())
            .with_hyperlink_text(properties.values(keys::HYPERLINK_TEXT).to_vec())
            .with_documents(properties.values(keys::DOCUMENTS).to_vec())
            .with_comments(html_to_latex(&visit.comments))
            .with_element_id(element_id)
            .with_index(index);
        for requirement in visit.requirements {
            builder.add_requirement(requirement);
        }
        for relation in visit.relations {
            if relation.record().key() == key {
                continue;
            }
            apply_relation(&mut builder, relation);
        }

        self.tree.insert(builder.build())?;
        let processed = self.session.record_product();
        debug!(key = key.as_str(), processed; "Product inserted");

        for package in &visit.packages {
            self.visit(package, &key)?;
        }
        for class in &visit.classes {
            self.visit(class, &key)?;
        }
        Ok(())
    }

    fn scan_children(&mut self, element: &ElementRecord) -> Result<Visit, ExtractError> {
        let mut visit = Visit::default();
        for child_id in element.children() {
            let child = self.session.fetch(child_id)?;
            match child.kind() {
                ElementKind::Package => visit.packages.push(child_id.clone()),
                ElementKind::Class => visit.classes.push(child_id.clone()),
                ElementKind::InstanceSpecification => {
                    visit.properties = Some(resolve_properties(self.session, child_id)?);
                }
                ElementKind::Comment => {
                    visit.comments.push_str(child.text("body").unwrap_or_default());
                }
                ElementKind::Dependency
                | ElementKind::Association
                | ElementKind::Abstraction
                | ElementKind::Diagram
                | ElementKind::Property => {}
                ElementKind::Slot
                | ElementKind::LiteralString
                | ElementKind::LiteralBoolean
                | ElementKind::InstanceValue
                | ElementKind::Unrecognized(_) => {
                    warn!(
                        element_id = child_id.as_str(),
                        kind = child.kind().as_type(),
                        parent = element.id();
                        "Unmapped element type, skipping"
                    );
                }
            }
        }
        Ok(visit)
    }

    /// Requirements traced from a class through abstraction relationships.
    fn requirements(&mut self, class: &ElementRecord) -> Result<Vec<Requirement>, ExtractError> {
        let mut requirements = Vec::new();
        for relationship_id in class.references("_directedRelationshipOfSource") {
            let relationship = self.session.fetch(relationship_id)?;
            if relationship.kind() != &ElementKind::Abstraction {
                continue;
            }
            let supplier_id = relationship
                .references("supplier")
                .first()
                .copied()
                .or_else(|| relationship.references("target").first().copied());
            let Some(supplier_id) = supplier_id else {
                warn!(element_id = relationship_id; "Abstraction without supplier, skipping");
                continue;
            };

            if let Some(requirement) = self.session.cached_requirement(supplier_id) {
                requirements.push(requirement.clone());
                continue;
            }
            let supplier = self.session.fetch(supplier_id)?;
            let requirement = requirement_of(&supplier);
            self.session
                .cache_requirement(supplier_id, requirement.clone());
            requirements.push(requirement);
        }
        Ok(requirements)
    }

    /// Relations discovered through the elements typed by a class.
    fn relations(&mut self, class: &ElementRecord) -> Result<Vec<ClassifiedRelation>, ExtractError> {
        let mut relations = Vec::new();
        for typed_id in class.references("_typedElementOfType") {
            if let Some(relation) = resolve_relation(self.session, typed_id)? {
                relations.push(relation);
            }
        }
        Ok(relations)
    }
}

/// Reads a requirement from its supplier element.
///
/// The id is the `Id` field when present, otherwise the first word of the
/// element name.
fn requirement_of(supplier: &ElementRecord) -> Requirement {
    let name = supplier.name().trim();
    match supplier.text("Id").filter(|id| !id.is_empty()) {
        Some(id) => Requirement::new(id, sanitize_tex(name)),
        None => {
            let (id, rest) = name.split_once(char::is_whitespace).unwrap_or((name, ""));
            Requirement::new(id, sanitize_tex(rest.trim()))
        }
    }
}
