use crate::config::ProjectConfig;
use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use puck_common::{
    walk_component, write_json, ComponentData, Data, FileSystem, LocalizedBlock, RootData, Visitor,
    ZoneKey,
};
use std::io;
use std::path::{Path, PathBuf};

#[derive(Subcommand, Debug)]
pub enum PagesCommand {
    /// List pages in the pages directory
    List,

    /// Create an empty page
    New(NewPageArgs),

    /// Delete a page
    Delete {
        /// Page slug
        slug: String,
    },
}

#[derive(Args, Debug)]
pub struct NewPageArgs {
    /// Page slug (lowercase letters, digits and dashes)
    pub slug: String,

    /// Page title, defaults to the slug
    #[arg(short, long)]
    pub title: Option<String>,
}

pub fn pages(command: PagesCommand, fs: &dyn FileSystem, cwd: &Path) -> Result<()> {
    let project = ProjectConfig::load(fs, cwd)?;

    match command {
        PagesCommand::List => list(&project, fs, cwd),
        PagesCommand::New(args) => {
            let path = create_page(&project, fs, cwd, &args.slug, args.title.as_deref())?;
            println!("  {} Created {}", "✓".green(), path.display());
            Ok(())
        }
        PagesCommand::Delete { slug } => {
            let path = delete_page(&project, fs, cwd, &slug)?;
            println!("  {} Deleted {}", "✓".green(), path.display());
            Ok(())
        }
    }
}

fn list(project: &ProjectConfig, fs: &dyn FileSystem, cwd: &Path) -> Result<()> {
    let slugs = page_slugs(project, fs, cwd)?;
    if slugs.is_empty() {
        println!("No pages in {}/", project.pages_dir);
        return Ok(());
    }
    let config = project.load_components(fs, cwd)?;

    println!("📄 {} pages", slugs.len().to_string().bright_white());
    for slug in slugs {
        let path = project.page_path(cwd, &slug);
        let data = Data::from_json(&fs.read_to_string(&path)?, &config)
            .with_context(|| format!("Invalid page data in {}", path.display()))?;
        let title = data
            .root
            .props
            .get("title")
            .and_then(|title| title.as_str())
            .unwrap_or_default()
            .to_string();

        let mut count = CountComponents::default();
        count.visit_data(&data);
        println!("  {:<24} {:<32} {} components", slug.bright_white(), title, count.0);
    }
    Ok(())
}

/// Counts every component in the tree, nested ones included
#[derive(Default)]
struct CountComponents(usize);

impl Visitor for CountComponents {
    fn visit_component(&mut self, _zone: &ZoneKey, _index: usize, item: &ComponentData) {
        self.0 += 1;
        walk_component(self, item);
    }
}

/// Slugs of every page file, sorted
pub fn page_slugs(project: &ProjectConfig, fs: &dyn FileSystem, cwd: &Path) -> Result<Vec<String>> {
    let files = match fs.list(&project.pages_dir(cwd)) {
        Ok(files) => files,
        Err(err) if err.kind() == io::ErrorKind::NotFound => Vec::new(),
        Err(err) => return Err(err.into()),
    };

    Ok(files
        .iter()
        .filter(|path| path.extension().map_or(false, |ext| ext == "json"))
        .filter_map(|path| path.file_stem())
        .map(|stem| stem.to_string_lossy().to_string())
        .collect())
}

pub fn create_page(
    project: &ProjectConfig,
    fs: &dyn FileSystem,
    cwd: &Path,
    slug: &str,
    title: Option<&str>,
) -> Result<PathBuf> {
    let path = project.checked_page_path(cwd, slug)?;
    if fs.exists(&path) {
        bail!("Page {slug} already exists");
    }

    write_json(fs, &path, &empty_page(project, title.unwrap_or(slug)))?;
    Ok(path)
}

pub fn delete_page(project: &ProjectConfig, fs: &dyn FileSystem, cwd: &Path, slug: &str) -> Result<PathBuf> {
    let path = project.checked_page_path(cwd, slug)?;
    fs.remove(&path)
        .with_context(|| format!("Cannot delete page {slug}"))?;
    Ok(path)
}

/// A page with no content and a header and footer per language
pub fn empty_page(project: &ProjectConfig, title: &str) -> Data {
    let blocks = || {
        project
            .languages
            .iter()
            .map(LocalizedBlock::new)
            .collect::<Vec<_>>()
    };

    Data {
        root: RootData::default()
            .with_prop("title", title)
            .with_prop("createdAt", chrono::Utc::now().to_rfc3339()),
        header: Some(blocks()),
        footer: Some(blocks()),
        ..Data::default()
    }
}
