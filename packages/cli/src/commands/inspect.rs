use crate::config::ProjectConfig;
use anyhow::{bail, Context, Result};
use clap::{Args, ValueEnum};
use colored::Colorize;
use puck_common::{Data, FileSystem};
use puck_editor::{EditorStore, Permissions, PermissionsTarget, StoreOptions};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Page slug
    pub page: String,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = Format::Text)]
    pub format: Format,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Text,
    Json,
}

/// Everything `inspect` reports about a page
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageReport {
    pub components: usize,
    pub types: BTreeMap<String, usize>,
    pub zones: BTreeMap<String, Vec<String>>,
    pub permissions: BTreeMap<String, Permissions>,
    pub diagnostics: Vec<String>,
}

pub fn inspect(args: InspectArgs, fs: &dyn FileSystem, cwd: &Path) -> Result<()> {
    let project = ProjectConfig::load(fs, cwd)?;
    let config = project.load_components(fs, cwd)?;

    let page_path = project.checked_page_path(cwd, &args.page)?;
    let source = fs
        .read_to_string(&page_path)
        .with_context(|| format!("Page {} not found", args.page))?;
    let data = Data::from_json(&source, &config)
        .with_context(|| format!("Invalid page data in {}", page_path.display()))?;

    let store = EditorStore::new(config, data, StoreOptions::new().without_auto_resolve());
    let report = build_report(&store);
    store.close();

    match args.format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        Format::Text => print_report(&args.page, &report),
    }

    if !report.diagnostics.is_empty() {
        bail!("{} integrity problems in page {}", report.diagnostics.len(), args.page);
    }
    Ok(())
}

pub fn build_report(store: &EditorStore) -> PageReport {
    let snapshot = store.snapshot();
    let index = &snapshot.index;

    let mut types = BTreeMap::new();
    for entry in index.nodes.values() {
        *types.entry(entry.data.component_type.clone()).or_insert(0) += 1;
    }

    let zones = index
        .zones
        .iter()
        .map(|(key, ids)| (key.to_string(), ids.clone()))
        .collect();

    let mut permissions: BTreeMap<String, Permissions> = index
        .nodes
        .keys()
        .map(|id| (id.clone(), store.get_permissions(PermissionsTarget::Id(id))))
        .collect();
    permissions.insert("root".to_string(), store.get_permissions(PermissionsTarget::Root));

    PageReport {
        components: index.len(),
        types,
        zones,
        permissions,
        diagnostics: index.diagnostics.iter().map(ToString::to_string).collect(),
    }
}

fn print_report(page: &str, report: &PageReport) {
    println!("🔍 {} {}", "Inspecting".green().bold(), page);
    println!("   Components: {}", report.components);
    println!();

    println!("{}", "Types".bright_white().bold());
    for (component_type, count) in &report.types {
        println!("  {:<24} {}", component_type, count);
    }
    println!();

    println!("{}", "Zones".bright_white().bold());
    for (zone, ids) in &report.zones {
        println!("  {:<32} {}", zone, ids.join(", "));
    }
    println!();

    println!("{}", "Permissions".bright_white().bold());
    for (id, permissions) in &report.permissions {
        let flag = |allowed: bool, name: &str| {
            if allowed {
                name.green().to_string()
            } else {
                name.red().strikethrough().to_string()
            }
        };
        println!(
            "  {:<32} {} {} {} {} {}",
            id,
            flag(permissions.drag, "drag"),
            flag(permissions.edit, "edit"),
            flag(permissions.duplicate, "duplicate"),
            flag(permissions.delete, "delete"),
            flag(permissions.insert, "insert"),
        );
    }

    if report.diagnostics.is_empty() {
        println!();
        println!("   {} No issues found!", "✓".green());
    } else {
        println!();
        println!("{}", "Diagnostics".red().bold());
        for diagnostic in &report.diagnostics {
            println!("  {} {}", "✗".red(), diagnostic);
        }
    }
}
