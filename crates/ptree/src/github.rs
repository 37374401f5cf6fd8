//! Package metadata from GitHub.
//!
//! Products list the git packages that implement them. Each package is
//! looked up once per run through a [`PackageCache`]: its repository
//! description, the head of its README, the packages its EUPS table depends
//! on and, when a token is configured, the teams with access to it.

use std::{collections::HashMap, sync::LazyLock};

use indexmap::IndexSet;
use log::{debug, info, warn};
use regex::Regex;
use reqwest::{
    StatusCode,
    blocking::{Client, RequestBuilder, Response},
};
use serde::Deserialize;
use thiserror::Error;

use crate::config::GithubConfig;

/// README lines kept when no section marker is found.
const README_HEAD_LINES: usize = 15;

/// Markdown headings the README head stops at, in priority order.
const README_STOP_HEADINGS: [&str; 2] = ["## Installation", "## Usage"];

static TABLE_DEPENDENCY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"setup(?:Required|Optional)\(\s*([A-Za-z0-9_\-]+)").expect("table pattern is valid")
});

#[derive(Debug, Error)]
pub enum GithubError {
    #[error("request to {url} failed with status {status}")]
    Status { url: String, status: u16 },

    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

/// What is known about one git package.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageInfo {
    organization: String,
    repository: String,
    description: String,
    readme_head: String,
    dependency_names: Vec<String>,
    teams: Vec<String>,
}

impl PackageInfo {
    pub fn new(organization: impl Into<String>, repository: impl Into<String>) -> Self {
        Self {
            organization: organization.into(),
            repository: repository.into(),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_readme_head(mut self, readme_head: impl Into<String>) -> Self {
        self.readme_head = readme_head.into();
        self
    }

    pub fn with_dependency_names(mut self, dependency_names: Vec<String>) -> Self {
        self.dependency_names = dependency_names;
        self
    }

    pub fn with_teams(mut self, teams: Vec<String>) -> Self {
        self.teams = teams;
        self
    }

    pub fn organization(&self) -> &str {
        &self.organization
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn readme_head(&self) -> &str {
        &self.readme_head
    }

    pub fn dependency_names(&self) -> &[String] {
        &self.dependency_names
    }

    pub fn teams(&self) -> &[String] {
        &self.teams
    }
}

/// Anything that can describe a package by name.
pub trait PackageInfoSource {
    /// Looks up `name`, either `org/repo` or a bare repository name.
    ///
    /// Returns `Ok(None)` when no repository matches.
    fn fetch_package_info(&self, name: &str) -> Result<Option<PackageInfo>, GithubError>;
}

#[derive(Debug, Deserialize)]
struct RepositoryResponse {
    #[serde(default)]
    description: Option<String>,
    default_branch: String,
}

#[derive(Debug, Deserialize)]
struct TeamResponse {
    name: String,
}

/// [`PackageInfoSource`] over the GitHub REST API and raw file host.
pub struct GithubClient {
    client: Client,
    config: GithubConfig,
}

impl GithubClient {
    /// # Errors
    ///
    /// Returns [`GithubError::Transport`] if the HTTP client cannot be built.
    pub fn new(config: GithubConfig) -> Result<Self, GithubError> {
        let client = Client::builder()
            .user_agent(concat!("ptree/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &GithubConfig {
        &self.config
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match self.config.token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Sends a GET request; a 404 is `None`, other failures are errors.
    fn get(&self, url: &str) -> Result<Option<Response>, GithubError> {
        debug!(url; "GitHub request");
        let response = self.authorized(self.client.get(url)).send()?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(response)),
            status => Err(GithubError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            }),
        }
    }

    fn repository(&self, org: &str, repo: &str) -> Result<Option<RepositoryResponse>, GithubError> {
        let url = format!("{}/repos/{org}/{repo}", self.config.api_url());
        match self.get(&url)? {
            Some(response) => Ok(Some(response.json()?)),
            None => Ok(None),
        }
    }

    fn raw_file(&self, org: &str, repo: &str, branch: &str, path: &str) -> Result<Option<String>, GithubError> {
        let url = format!("{}/{org}/{repo}/{branch}/{path}", self.config.raw_url());
        match self.get(&url)? {
            Some(response) => Ok(Some(response.text()?)),
            None => Ok(None),
        }
    }

    fn readme(&self, org: &str, repo: &str, branch: &str) -> Result<String, GithubError> {
        if let Some(text) = self.raw_file(org, repo, branch, "README.md")? {
            return Ok(readme_head(&text, true));
        }
        if let Some(text) = self.raw_file(org, repo, branch, "README.txt")? {
            return Ok(readme_head(&text, false));
        }
        debug!(org, repo; "No README found");
        Ok(String::new())
    }

    /// Teams with access to the repository. Needs a token; failures only
    /// cost the enrichment.
    fn teams(&self, org: &str, repo: &str) -> Vec<String> {
        if self.config.token().is_none() {
            return Vec::new();
        }
        let url = format!("{}/repos/{org}/{repo}/teams", self.config.api_url());
        let teams: Result<Vec<TeamResponse>, GithubError> = match self.get(&url) {
            Ok(Some(response)) => response.json().map_err(GithubError::from),
            Ok(None) => Ok(Vec::new()),
            Err(err) => Err(err),
        };
        match teams {
            Ok(teams) => teams.into_iter().map(|team| team.name).collect(),
            Err(err) => {
                warn!(org, repo, err:err; "Could not list repository teams");
                Vec::new()
            }
        }
    }
}

impl PackageInfoSource for GithubClient {
    fn fetch_package_info(&self, name: &str) -> Result<Option<PackageInfo>, GithubError> {
        let candidates: Vec<(&str, &str)> = match name.split_once('/') {
            Some((org, repo)) => vec![(org, repo)],
            None => self
                .config
                .organizations()
                .iter()
                .map(|org| (org.as_str(), name))
                .collect(),
        };

        for (org, repo) in candidates {
            let Some(repository) = self.repository(org, repo)? else {
                debug!(org, repo; "Repository not found");
                continue;
            };
            let branch = repository.default_branch.as_str();
            let readme = self.readme(org, repo, branch)?;
            let dependencies = self
                .raw_file(org, repo, branch, &format!("ups/{repo}.table"))?
                .map(|table| parse_table_dependencies(&table))
                .unwrap_or_default();
            info!(org, repo, dependencies = dependencies.len(); "Package found");

            return Ok(Some(
                PackageInfo::new(org, repo)
                    .with_description(repository.description.unwrap_or_default())
                    .with_readme_head(readme)
                    .with_dependency_names(dependencies)
                    .with_teams(self.teams(org, repo)),
            ));
        }
        Ok(None)
    }
}

/// The head of a README.
///
/// For markdown, the text before the installation or usage section when
/// there is one. Otherwise the first lines of the file.
pub fn readme_head(text: &str, markdown: bool) -> String {
    if markdown {
        for heading in README_STOP_HEADINGS {
            if let Some((head, _)) = text.split_once(heading) {
                return head.trim_end().to_string();
            }
        }
    }
    text.lines()
        .take(README_HEAD_LINES)
        .collect::<Vec<_>>()
        .join("\n")
        .trim_end()
        .to_string()
}

/// Package names from the `setupRequired(...)` and `setupOptional(...)`
/// lines of an EUPS table file, in order, without repeats.
pub fn parse_table_dependencies(table: &str) -> Vec<String> {
    let names: IndexSet<&str> = table
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('#'))
        .flat_map(|line| TABLE_DEPENDENCY.captures_iter(line))
        .filter_map(|captures| captures.get(1))
        .map(|name| name.as_str())
        .collect();
    names.into_iter().map(str::to_string).collect()
}

/// Memoized package lookups.
///
/// One cache is shared by every tree of a run, so each package is fetched
/// once. Failed lookups are logged and remembered as unknown.
pub struct PackageCache<S> {
    source: S,
    entries: HashMap<String, Option<PackageInfo>>,
}

impl<S: PackageInfoSource> PackageCache<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            entries: HashMap::new(),
        }
    }

    /// Looks a package up, fetching it on first use.
    pub fn get(&mut self, name: &str) -> Option<&PackageInfo> {
        if !self.entries.contains_key(name) {
            let info = match self.source.fetch_package_info(name) {
                Ok(info) => {
                    if info.is_none() {
                        warn!(package = name; "Package not found in any organization");
                    }
                    info
                }
                Err(err) => {
                    warn!(package = name, err:err; "Package lookup failed");
                    None
                }
            };
            self.entries.insert(name.to_string(), info);
        }
        self.entries.get(name).and_then(Option::as_ref)
    }

    /// A package already looked up, without fetching.
    pub fn cached(&self, name: &str) -> Option<&PackageInfo> {
        self.entries.get(name).and_then(Option::as_ref)
    }

    /// Number of packages looked up so far, found or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}
