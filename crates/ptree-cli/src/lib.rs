//! Ptree CLI library
//!
//! This module contains the command logic of the product tree tool.

pub mod error_adapter;

mod args;
mod config;

pub use args::{Args, Command, DiagramArgs, GenerateArgs, GitArgs, GithubArgs};
pub use error_adapter::ErrorAdapter;

use std::{
    cell::RefCell,
    fs,
    path::{Path, PathBuf},
};

use base64::{Engine as _, engine::general_purpose::STANDARD};
use log::{info, warn};

use ptree::{
    DocumentBuilder, PtreeError,
    config::{AppConfig, SubsystemConfig},
    github::PackageCache,
    layout::LayoutMode,
};
use ptree_core::tree::ProductTree;
use ptree_magicdraw::CancellationFlag;

/// Run the ptree CLI application
///
/// # Errors
///
/// Returns `PtreeError` for:
/// - File I/O errors
/// - Configuration loading errors
/// - Extraction errors
/// - Snapshot and export errors
pub fn run(args: &Args) -> Result<(), PtreeError> {
    let app_config = config::load_config(args.config.as_ref())?;

    match &args.command {
        Command::Generate(generate_args) => generate(app_config, generate_args),
        Command::Diagram(diagram_args) => diagram(app_config, diagram_args),
        Command::Git(git_args) => git(app_config, git_args),
    }
}

/// Extract or reload every subtree of a subsystem and write its snapshots,
/// diagrams and git sections.
fn generate(app_config: AppConfig, args: &GenerateArgs) -> Result<(), PtreeError> {
    let subsystem = SubsystemConfig::load(&args.subsystem)?;
    info!(
        subsystem = subsystem.subsystem(),
        document = subsystem.document(),
        subtrees = subsystem.subtrees().len();
        "Generating product tree document"
    );
    fs::create_dir_all(&args.output_dir)?;
    let builder = DocumentBuilder::new(with_github_token(app_config, &args.github)?);

    let trees = if args.csv_only {
        subsystem
            .subtrees()
            .iter()
            .map(|entry| builder.load_snapshot(snapshot_path(&args.output_dir, entry.filename())))
            .collect::<Result<Vec<_>, _>>()?
    } else {
        let token = basic_token(args.username.as_deref(), args.password.as_deref())?;
        let gateway = builder.http_gateway(Some(&subsystem), &token)?;
        let trees = builder.extract_subsystem(&gateway, &subsystem, &CancellationFlag::new())?;
        for (entry, tree) in subsystem.subtrees().iter().zip(&trees) {
            builder.write_snapshot(tree, snapshot_path(&args.output_dir, entry.filename()))?;
        }
        trees
    };

    if let Some(key) = &args.partial {
        let Some(tree) = trees.iter().find(|tree| tree.contains(key)) else {
            return Err(PtreeError::Config(format!("product `{key}` is in none of the subtrees")));
        };
        let path = snapshot_path(&args.output_dir, key);
        builder.write_snapshot(&tree.subtree(key)?, &path)?;
        info!(key = key.as_str(), file_name:? = path; "Partial snapshot written");
        return Ok(());
    }

    for (entry, tree) in subsystem.subtrees().iter().zip(&trees) {
        let diagrams = builder.layout(tree, args.mode, args.compact);
        builder.write_diagrams(tree, &diagrams, &args.output_dir, entry.filename(), subsystem.document())?;
    }

    if let Some(full_tree) = subsystem.full_tree() {
        let parts: Vec<&ProductTree> = trees.iter().collect();
        let merged = builder.full_tree(full_tree, &parts)?;
        builder.write_snapshot(&merged, snapshot_path(&args.output_dir, full_tree.key()))?;
        let diagrams = builder.layout(&merged, LayoutMode::FullTree, args.compact);
        builder.write_diagrams(&merged, &diagrams, &args.output_dir, full_tree.key(), subsystem.document())?;
    }

    let cache = RefCell::new(PackageCache::new(builder.github_client()?));
    for (entry, tree) in subsystem.subtrees().iter().zip(&trees) {
        let path = args.output_dir.join(format!("{}_git.tex", entry.filename()));
        builder.write_git_section(tree, &cache, path)?;
    }

    info!(output_dir:? = args.output_dir; "Document generated");
    Ok(())
}

/// Draw a snapshot, optionally cut at a depth.
fn diagram(app_config: AppConfig, args: &DiagramArgs) -> Result<(), PtreeError> {
    let builder = DocumentBuilder::new(app_config);
    let mut tree = builder.load_snapshot(&args.file)?;
    if let Some(depth) = args.depth {
        tree = tree.slice(depth);
    }

    let name = file_stem(&args.file);
    fs::create_dir_all(&args.output_dir)?;
    let diagrams = builder.layout(&tree, args.mode, args.compact);
    let written = builder.write_diagrams(&tree, &diagrams, &args.output_dir, &name, &name)?;
    info!(diagrams = written.len(), output_dir:? = args.output_dir; "Diagrams written");
    Ok(())
}

/// Write one git section per snapshot; package lookups are shared.
fn git(app_config: AppConfig, args: &GitArgs) -> Result<(), PtreeError> {
    let builder = DocumentBuilder::new(with_github_token(app_config, &args.github)?);
    let cache = RefCell::new(PackageCache::new(builder.github_client()?));
    fs::create_dir_all(&args.output_dir)?;

    for file in &args.file {
        let tree = builder.load_snapshot(file)?;
        let path = args.output_dir.join(format!("{}_git.tex", file_stem(file)));
        builder.write_git_section(&tree, &cache, path)?;
        if args.graphs {
            builder.write_dependency_graphs(&tree, &cache, args.output_dir.join("dot"))?;
        }
    }
    info!(packages = cache.borrow().len(); "Git sections written");
    Ok(())
}

/// The Basic credentials of the element API.
fn basic_token(username: Option<&str>, password: Option<&str>) -> Result<String, PtreeError> {
    match (username, password) {
        (Some(username), Some(password)) => Ok(STANDARD.encode(format!("{username}:{password}"))),
        _ => Err(PtreeError::Config(
            "MagicDraw credentials missing, set MD_USER and MD_PASSWORD".to_string(),
        )),
    }
}

/// Applies a GitHub token given on the command line or in a token file.
fn with_github_token(app_config: AppConfig, args: &GithubArgs) -> Result<AppConfig, PtreeError> {
    let token = match (&args.github_token, &args.token_path) {
        (Some(token), _) => token.clone(),
        (None, Some(path)) => fs::read_to_string(path)?.trim().to_string(),
        (None, None) => return Ok(app_config),
    };
    if token.is_empty() {
        warn!("Empty GitHub token ignored");
        return Ok(app_config);
    }
    let github = app_config.github().clone().with_token(Some(token));
    Ok(app_config.with_github(github))
}

fn snapshot_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.csv"))
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "tree".to_string())
}
