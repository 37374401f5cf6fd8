//! Configuration types for product tree extraction and rendering.
//!
//! All types implement [`serde::Deserialize`]; every field has a default so
//! partial configuration files are accepted.
//!
//! # Overview
//!
//! - [`AppConfig`] - Top-level configuration combining the sections below.
//! - [`GatewayConfig`] - Element REST API endpoint and rate-limit back-off.
//! - [`LayoutConfig`] - Node sizes and gaps used by the layout engine.
//! - [`GithubConfig`] - Where package metadata is looked up.
//! - [`SubsystemConfig`] - Per-document YAML description of what to extract.
//!
//! # Example
//!
//! ```
//! # use ptree::config::AppConfig;
//! let config = AppConfig::default();
//! assert_eq!(config.layout().leaf_width(), 3.7);
//! assert_eq!(config.github().organizations(), ["lsst", "lsst-dm", "testpackaging"]);
//! ```

use std::{fs, path::Path, time::Duration};

use serde::Deserialize;

use ptree_core::geometry::Length;
use ptree_magicdraw::RetryPolicy;

use crate::error::PtreeError;

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Element gateway section.
    #[serde(default)]
    gateway: GatewayConfig,

    /// Layout section.
    #[serde(default)]
    layout: LayoutConfig,

    /// GitHub section.
    #[serde(default)]
    github: GithubConfig,
}

impl AppConfig {
    pub fn new(gateway: GatewayConfig, layout: LayoutConfig, github: GithubConfig) -> Self {
        Self {
            gateway,
            layout,
            github,
        }
    }

    /// Returns the gateway configuration.
    pub fn gateway(&self) -> &GatewayConfig {
        &self.gateway
    }

    /// Returns the layout configuration.
    pub fn layout(&self) -> &LayoutConfig {
        &self.layout
    }

    /// Returns the GitHub configuration.
    pub fn github(&self) -> &GithubConfig {
        &self.github
    }

    /// Replaces the GitHub section, e.g. to add a token from the command line.
    pub fn with_github(mut self, github: GithubConfig) -> Self {
        self.github = github;
        self
    }
}

/// Element REST API settings.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "GatewayConfig::default_base_url")]
    base_url: String,

    /// Project resource holding the model, unless a subsystem names its own.
    #[serde(default)]
    resource: Option<String>,

    #[serde(default = "GatewayConfig::default_timeout_secs")]
    timeout_secs: u64,

    /// Retries after a rate-limited request; unbounded when unset.
    #[serde(default)]
    max_retries: Option<u32>,

    #[serde(default = "GatewayConfig::default_backoff_secs")]
    backoff_secs: u64,

    #[serde(default)]
    jitter_secs: u64,
}

impl GatewayConfig {
    fn default_base_url() -> String {
        "https://twcloud.lsst.org:8111/osmc".to_string()
    }

    fn default_timeout_secs() -> u64 {
        60
    }

    fn default_backoff_secs() -> u64 {
        600
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn resource(&self) -> Option<&str> {
        self.resource.as_deref()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Builds the rate-limit retry policy from the configured values.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new()
            .with_max_retries(self.max_retries)
            .with_backoff(Duration::from_secs(self.backoff_secs))
            .with_jitter(Duration::from_secs(self.jitter_secs))
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: Self::default_base_url(),
            resource: None,
            timeout_secs: Self::default_timeout_secs(),
            max_retries: None,
            backoff_secs: Self::default_backoff_secs(),
            jitter_secs: 0,
        }
    }
}

/// Node sizes and gaps used by the layout engine.
///
/// Lengths in centimetres unless the field name says otherwise.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Height of a node's text block, in points.
    text_height_pt: f32,
    leaf_height: f32,
    leaf_width: f32,
    big_gap: f32,
    /// Inner separation of a node box, in points.
    sep_pt: f32,
    /// Vertical gap between stacked nodes, in points.
    gap_pt: f32,
    /// Horizontal shift of a first child from its parent, in millimetres.
    child_shift_mm: f32,
    /// Vertical lift of a root above its middle child, in millimetres.
    root_lift_mm: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            text_height_pt: 35.0,
            leaf_height: 1.56,
            leaf_width: 3.7,
            big_gap: 1.5,
            sep_pt: 2.0,
            gap_pt: 4.0,
            child_shift_mm: 15.0,
            root_lift_mm: 15.0,
        }
    }
}

impl LayoutConfig {
    pub fn text_height(&self) -> Length {
        Length::pt(self.text_height_pt)
    }

    pub fn leaf_height(&self) -> f32 {
        self.leaf_height
    }

    pub fn leaf_width(&self) -> f32 {
        self.leaf_width
    }

    pub fn big_gap(&self) -> f32 {
        self.big_gap
    }

    pub fn sep(&self) -> Length {
        Length::pt(self.sep_pt)
    }

    pub fn gap(&self) -> Length {
        Length::pt(self.gap_pt)
    }

    pub fn child_shift(&self) -> Length {
        Length::mm(self.child_shift_mm)
    }

    pub fn root_lift(&self) -> Length {
        Length::mm(self.root_lift_mm)
    }

    /// Horizontal pitch of one tree level: a node plus the big gap.
    pub fn column_pitch(&self) -> f32 {
        self.leaf_width + self.big_gap
    }

    /// Vertical space taken by one stacked leaf, in points.
    pub fn block_pt(&self) -> f32 {
        self.text_height_pt + self.gap_pt + self.sep_pt
    }

    /// Column separation of the compact landscape variant.
    pub fn compact_gap(&self) -> f32 {
        self.big_gap * self.leaf_width / self.column_pitch()
    }
}

/// Where package metadata is looked up.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GithubConfig {
    api_url: String,
    raw_url: String,
    /// Organizations searched, in order, for bare package names.
    organizations: Vec<String>,
    /// Personal access token; team lookups are skipped without one.
    token: Option<String>,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.github.com".to_string(),
            raw_url: "https://raw.githubusercontent.com".to_string(),
            organizations: vec!["lsst".to_string(), "lsst-dm".to_string(), "testpackaging".to_string()],
            token: None,
        }
    }
}

impl GithubConfig {
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn raw_url(&self) -> &str {
        &self.raw_url
    }

    pub fn organizations(&self) -> &[String] {
        &self.organizations
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }
}

/// A subtree written to its own snapshot and diagram files.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SubtreeEntry {
    /// Element id of the subtree root.
    id: String,
    /// Base name of the files written for it.
    filename: String,
}

impl SubtreeEntry {
    pub fn new(id: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            filename: filename.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }
}

/// The synthesized super-root joining all subtrees.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FullTreeEntry {
    key: String,
    name: String,
}

impl FullTreeEntry {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Per-document description of what to extract, read from YAML.
///
/// ```yaml
/// subsystem: DM
/// document: LDM-294
/// resource: 9c1ca7d4-b4e0-4e5c-a4b8-c4e7ad3b4a8c
/// subtrees:
///   - id: 18_0_2_6ba015e_1509564271370_958459_166054
///     filename: dm_main
/// full_tree:
///   key: DMAll
///   name: Data Management
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct SubsystemConfig {
    subsystem: String,
    document: String,
    /// Project resource holding the model; overrides the gateway default.
    #[serde(default)]
    resource: Option<String>,
    #[serde(default)]
    subtrees: Vec<SubtreeEntry>,
    #[serde(default)]
    full_tree: Option<FullTreeEntry>,
}

impl SubsystemConfig {
    /// Parses a subsystem description.
    ///
    /// # Errors
    ///
    /// Returns [`PtreeError::Config`] if the YAML is malformed or a required
    /// field is missing.
    pub fn from_yaml_str(source: &str) -> Result<Self, PtreeError> {
        serde_yaml::from_str(source)
            .map_err(|err| PtreeError::Config(format!("invalid subsystem description: {err}")))
    }

    /// Reads and parses a subsystem description file.
    ///
    /// # Errors
    ///
    /// Returns [`PtreeError::Io`] if the file cannot be read, or
    /// [`PtreeError::Config`] if it cannot be parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PtreeError> {
        let source = fs::read_to_string(path)?;
        Self::from_yaml_str(&source)
    }

    pub fn subsystem(&self) -> &str {
        &self.subsystem
    }

    pub fn document(&self) -> &str {
        &self.document
    }

    pub fn resource(&self) -> Option<&str> {
        self.resource.as_deref()
    }

    pub fn subtrees(&self) -> &[SubtreeEntry] {
        &self.subtrees
    }

    pub fn full_tree(&self) -> Option<&FullTreeEntry> {
        self.full_tree.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use float_cmp::assert_approx_eq;

    use super::*;

    #[test]
    fn test_layout_defaults() {
        let layout = LayoutConfig::default();
        assert_approx_eq!(f32, layout.column_pitch(), 5.2);
        assert_approx_eq!(f32, layout.block_pt(), 41.0);
        assert_approx_eq!(f32, layout.compact_gap(), 1.5 * 3.7 / 5.2);
        assert_eq!(layout.root_lift(), Length::mm(15.0));
    }

    #[test]
    fn test_github_defaults_search_three_organizations() {
        let github = GithubConfig::default();
        assert_eq!(github.organizations(), ["lsst", "lsst-dm", "testpackaging"]);
        assert!(github.token().is_none());
    }

    #[test]
    fn test_partial_gateway_section_keeps_defaults() {
        let config: AppConfig = serde_json::from_str(r#"{"gateway": {"max_retries": 3}}"#).unwrap();
        let retry = config.gateway().retry_policy();
        assert_eq!(retry.max_retries(), Some(3));
        assert_eq!(retry.backoff(), Duration::from_secs(600));
        assert_eq!(config.gateway().timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_subsystem_yaml() {
        let source = r#"
subsystem: DM
document: LDM-294
resource: dm-resource
subtrees:
  - id: "18_0_2_main"
    filename: dm_main
  - id: "18_0_2_dev"
    filename: dm_dev
full_tree:
  key: DMAll
  name: Data Management
"#;
        let config = SubsystemConfig::from_yaml_str(source).unwrap();
        assert_eq!(config.subsystem(), "DM");
        assert_eq!(config.resource(), Some("dm-resource"));
        assert_eq!(config.subtrees().len(), 2);
        assert_eq!(config.subtrees()[1], SubtreeEntry::new("18_0_2_dev", "dm_dev"));
        assert_eq!(config.full_tree().unwrap().key(), "DMAll");
    }

    #[test]
    fn test_subsystem_yaml_requires_document() {
        let err = SubsystemConfig::from_yaml_str("subsystem: DM\n").unwrap_err();
        assert!(matches!(err, PtreeError::Config(_)));
    }
}
