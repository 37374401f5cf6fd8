//! Element gateway: fetch-by-id over the remote element graph.
//!
//! The REST endpoint answers every element request with a two-element JSON
//! array:
//!
//! ```text
//! [
//!   { "ldp:contains": [ { "@id": "<child>" }, ... ], ... },
//!   { "@type": "uml:Class", "kerml:name": "...", "kerml:esiData": { ... } }
//! ]
//! ```
//!
//! The first entry carries the containment links, the second the element
//! itself. [`ElementRecord::from_envelope`] decodes this shape.

use std::{collections::HashMap, fmt, time::Duration};

use log::{debug, trace};
use reqwest::{StatusCode, blocking::Client, header};
use serde_json::{Map, Value};
use thiserror::Error;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Errors raised by an [`ElementGateway`].
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The server signalled throttling. By convention this is an HTTP 401.
    #[error("rate limited while fetching element `{element_id}`")]
    RateLimited { element_id: String },

    #[error("fetching element `{element_id}` failed with HTTP status {status}")]
    Status { element_id: String, status: u16 },

    #[error("element `{0}` not found")]
    NotFound(String),

    #[error("malformed response for element `{element_id}`: {reason}")]
    Malformed { element_id: String, reason: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl GatewayError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, GatewayError::RateLimited { .. })
    }
}

/// Kind of a remote element, from its `@type` tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Package,
    Class,
    InstanceSpecification,
    Slot,
    Property,
    Comment,
    Dependency,
    Association,
    Abstraction,
    Diagram,
    LiteralString,
    LiteralBoolean,
    InstanceValue,
    /// Any tag not listed above, kept verbatim for diagnostics.
    Unrecognized(String),
}

impl ElementKind {
    pub fn from_type(tag: &str) -> Self {
        match tag {
            "uml:Package" => ElementKind::Package,
            "uml:Class" => ElementKind::Class,
            "uml:InstanceSpecification" => ElementKind::InstanceSpecification,
            "uml:Slot" => ElementKind::Slot,
            "uml:Property" => ElementKind::Property,
            "uml:Comment" => ElementKind::Comment,
            "uml:Dependency" => ElementKind::Dependency,
            "uml:Association" => ElementKind::Association,
            "uml:Abstraction" => ElementKind::Abstraction,
            "uml:Diagram" => ElementKind::Diagram,
            "uml:LiteralString" => ElementKind::LiteralString,
            "uml:LiteralBoolean" => ElementKind::LiteralBoolean,
            "uml:InstanceValue" => ElementKind::InstanceValue,
            other => ElementKind::Unrecognized(other.to_string()),
        }
    }

    /// The `@type` tag of this kind.
    pub fn as_type(&self) -> &str {
        match self {
            ElementKind::Package => "uml:Package",
            ElementKind::Class => "uml:Class",
            ElementKind::InstanceSpecification => "uml:InstanceSpecification",
            ElementKind::Slot => "uml:Slot",
            ElementKind::Property => "uml:Property",
            ElementKind::Comment => "uml:Comment",
            ElementKind::Dependency => "uml:Dependency",
            ElementKind::Association => "uml:Association",
            ElementKind::Abstraction => "uml:Abstraction",
            ElementKind::Diagram => "uml:Diagram",
            ElementKind::LiteralString => "uml:LiteralString",
            ElementKind::LiteralBoolean => "uml:LiteralBoolean",
            ElementKind::InstanceValue => "uml:InstanceValue",
            ElementKind::Unrecognized(tag) => tag,
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_type())
    }
}

/// One element of the remote graph.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementRecord {
    id: String,
    kind: ElementKind,
    name: String,
    children: Vec<String>,
    esi_data: Map<String, Value>,
}

impl ElementRecord {
    pub fn new(id: impl Into<String>, kind: ElementKind, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            name: name.into(),
            children: Vec::new(),
            esi_data: Map::new(),
        }
    }

    pub fn with_children<I, S>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.children = children.into_iter().map(Into::into).collect();
        self
    }

    /// Sets one `kerml:esiData` field.
    pub fn with_field(mut self, field: impl Into<String>, value: Value) -> Self {
        self.esi_data.insert(field.into(), value);
        self
    }

    /// Decodes the two-element response envelope of element `id`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Malformed`] if the response is not a two-entry
    /// array or the element entry has no `@type`.
    pub fn from_envelope(id: &str, envelope: Value) -> Result<Self, GatewayError> {
        let malformed = |reason: &str| GatewayError::Malformed {
            element_id: id.to_string(),
            reason: reason.to_string(),
        };

        let Value::Array(mut entries) = envelope else {
            return Err(malformed("response is not an array"));
        };
        if entries.len() < 2 {
            return Err(malformed("expected a containment entry and an element entry"));
        }
        let element = entries.swap_remove(1);
        let containment = entries.swap_remove(0);

        let children = containment
            .get("ldp:contains")
            .map(id_list)
            .unwrap_or_default();

        let kind = element
            .get("@type")
            .and_then(Value::as_str)
            .map(ElementKind::from_type)
            .ok_or_else(|| malformed("element entry has no `@type`"))?;
        let name = element
            .get("kerml:name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let esi_data = match element.get("kerml:esiData") {
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        };

        Ok(Self {
            id: id.to_string(),
            kind,
            name,
            children,
            esi_data,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> &ElementKind {
        &self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ids of the contained elements, in source order.
    pub fn children(&self) -> &[String] {
        &self.children
    }

    /// Id of a single-reference field such as `owner` or `association`.
    pub fn reference(&self, field: &str) -> Option<&str> {
        match self.esi_data.get(field)? {
            Value::Object(link) => link.get("@id").and_then(Value::as_str),
            _ => None,
        }
    }

    /// Ids of a multi-reference field such as `memberEnd`.
    ///
    /// A single reference is returned as a one-entry list; a missing or
    /// null field is an empty list.
    pub fn references(&self, field: &str) -> Vec<&str> {
        match self.esi_data.get(field) {
            Some(Value::Array(links)) => links
                .iter()
                .filter_map(|link| link.get("@id").and_then(Value::as_str))
                .collect(),
            Some(Value::Object(link)) => link.get("@id").and_then(Value::as_str).into_iter().collect(),
            _ => Vec::new(),
        }
    }

    /// A string-valued field such as a comment `body`.
    pub fn text(&self, field: &str) -> Option<&str> {
        self.esi_data.get(field).and_then(Value::as_str)
    }

    /// A literal value rendered as text; booleans and numbers are stringified.
    pub fn literal(&self, field: &str) -> Option<String> {
        match self.esi_data.get(field)? {
            Value::String(s) => Some(s.clone()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

fn id_list(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|links| {
            links
                .iter()
                .filter_map(|link| link.get("@id").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Get-by-id access to the remote element graph.
pub trait ElementGateway {
    /// Fetches one element.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::RateLimited`] when the server throttles; callers
    /// retry those through a [`RetryPolicy`](crate::RetryPolicy). Every other
    /// error is final.
    fn fetch(&self, element_id: &str) -> Result<ElementRecord, GatewayError>;
}

/// Gateway over the TWCloud REST API.
///
/// Requests go to `{base_url}/resources/{resource}/elements/{element}` with a
/// pre-shared Basic authorization token.
pub struct HttpGateway {
    client: Client,
    base_url: String,
    resource: String,
    token: String,
}

impl HttpGateway {
    /// Creates a gateway for one resource (project) of the server.
    ///
    /// `token` is the base64 `user:password` string sent as Basic credentials.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Transport`] if the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        resource: impl Into<String>,
        token: impl Into<String>,
    ) -> Result<Self, GatewayError> {
        Ok(Self {
            client: Self::client(DEFAULT_TIMEOUT)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            resource: resource.into(),
            token: token.into(),
        })
    }

    /// Replaces the per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Transport`] if the HTTP client cannot be built.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, GatewayError> {
        self.client = Self::client(timeout)?;
        Ok(self)
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    fn client(timeout: Duration) -> Result<Client, GatewayError> {
        Ok(Client::builder().timeout(timeout).build()?)
    }

    fn element_url(&self, element_id: &str) -> String {
        format!(
            "{}/resources/{}/elements/{}",
            self.base_url, self.resource, element_id
        )
    }
}

impl ElementGateway for HttpGateway {
    fn fetch(&self, element_id: &str) -> Result<ElementRecord, GatewayError> {
        let url = self.element_url(element_id);
        trace!(url = url.as_str(); "Fetching element");

        let response = self
            .client
            .get(&url)
            .header(header::ACCEPT, "application/json")
            .header(header::AUTHORIZATION, format!("Basic {}", self.token))
            .send()?;

        match response.status() {
            StatusCode::UNAUTHORIZED => Err(GatewayError::RateLimited {
                element_id: element_id.to_string(),
            }),
            status if !status.is_success() => Err(GatewayError::Status {
                element_id: element_id.to_string(),
                status: status.as_u16(),
            }),
            _ => {
                let envelope: Value = response.json()?;
                ElementRecord::from_envelope(element_id, envelope)
            }
        }
    }
}

/// Map-backed gateway for fixtures and tests.
///
/// Ids can be scripted to answer with rate limiting a number of times
/// before succeeding.
#[derive(Debug, Default)]
pub struct InMemoryGateway {
    elements: HashMap<String, ElementRecord>,
    throttled: std::cell::RefCell<HashMap<String, u32>>,
    fetches: std::cell::Cell<usize>,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, record: ElementRecord) {
        self.elements.insert(record.id().to_string(), record);
    }

    pub fn with(mut self, record: ElementRecord) -> Self {
        self.insert(record);
        self
    }

    /// Decodes and stores a raw response envelope.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Malformed`] if the envelope cannot be decoded.
    pub fn insert_envelope(&mut self, id: &str, envelope: Value) -> Result<(), GatewayError> {
        let record = ElementRecord::from_envelope(id, envelope)?;
        self.insert(record);
        Ok(())
    }

    /// Makes the next `times` fetches of `id` answer as rate limited.
    pub fn throttle(&self, id: &str, times: u32) {
        self.throttled.borrow_mut().insert(id.to_string(), times);
    }

    /// Number of fetches served, including throttled ones.
    pub fn fetch_count(&self) -> usize {
        self.fetches.get()
    }
}

impl ElementGateway for InMemoryGateway {
    fn fetch(&self, element_id: &str) -> Result<ElementRecord, GatewayError> {
        self.fetches.set(self.fetches.get() + 1);

        if let Some(remaining) = self.throttled.borrow_mut().get_mut(element_id)
            && *remaining > 0
        {
            *remaining -= 1;
            debug!(element_id; "Throttling scripted fetch");
            return Err(GatewayError::RateLimited {
                element_id: element_id.to_string(),
            });
        }

        self.elements
            .get(element_id)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(element_id.to_string()))
    }
}
