use crate::config::ProjectConfig;
use crate::script::{self, Step};
use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use puck_common::{Data, FileSystem};
use puck_editor::{EditorStore, FileSink, ResolveTrigger, SequentialIds, StoreOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

#[derive(Args, Debug)]
pub struct ApplyArgs {
    /// Page slug
    pub page: String,

    /// JSON script of edit steps
    pub script: PathBuf,

    /// Replay the script without writing the page
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScriptSummary {
    pub applied: usize,
    pub rejected: usize,
}

pub async fn apply(args: ApplyArgs, fs: Arc<dyn FileSystem>, cwd: &Path) -> Result<()> {
    let project = ProjectConfig::load(fs.as_ref(), cwd)?;
    let config = project.load_components(fs.as_ref(), cwd)?;

    let page_path = project.checked_page_path(cwd, &args.page)?;
    let source = fs
        .read_to_string(&page_path)
        .with_context(|| format!("Page {} not found", args.page))?;
    let data = Data::from_json(&source, &config)
        .with_context(|| format!("Invalid page data in {}", page_path.display()))?;

    let script_path = cwd.join(&args.script);
    let steps = script::parse(&fs.read_to_string(&script_path)?)
        .with_context(|| format!("Invalid script {}", script_path.display()))?;

    println!("✏️  {} {}", "Applying".green().bold(), args.script.display());
    println!("   Page: {}", page_path.display());
    println!();

    let options = StoreOptions::new()
        .with_ids(SequentialIds::new(&args.page))
        .with_history_window(project.history_window())
        .with_publish_sink(Arc::new(FileSink::new(Arc::clone(&fs), &page_path)));
    let store = EditorStore::new(config, data, options);

    let resolved = store.resolve_all_data(ResolveTrigger::Load).await;
    info!(resolved, "Page loaded");

    let summary = run_script(&store, steps);

    println!();
    println!(
        "   {} applied, {} rejected",
        summary.applied.to_string().green(),
        summary.rejected.to_string().yellow()
    );

    if args.dry_run {
        println!("   {} Dry run, page not written", "ℹ".blue());
    } else {
        store.publish().await?;
        println!("✨ {} {}", "Published".green().bold(), page_path.display());
    }

    store.close();
    Ok(())
}

/// Replay steps against a store, reporting each one
pub fn run_script(store: &EditorStore, steps: Vec<Step>) -> ScriptSummary {
    let mut summary = ScriptSummary::default();

    for (n, step) in steps.into_iter().enumerate() {
        let name = step.describe();
        let applied = match step {
            Step::Action(action) => store.dispatch(action),
            Step::Undo => store.back(),
            Step::Redo => store.forward(),
            Step::RefreshPermissions(target) => {
                store.refresh_permissions(target.into());
                true
            }
        };

        if applied {
            summary.applied += 1;
            println!("  {} {:>3} {}", "✓".green(), n + 1, name);
        } else {
            summary.rejected += 1;
            println!("  {} {:>3} {} (no change)", "✗".yellow(), n + 1, name);
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use puck_common::{read_json, MockFileSystem};
    use puck_editor::Config;

    fn project(fs: &MockFileSystem) {
        fs.add_file(
            "/site/components.json",
            r#"{
                "components": {
                    "Heading": {
                        "defaultProps": { "title": "Hello World" },
                        "fields": {
                            "title": { "type": "text" },
                            "anchor": { "type": "text" }
                        }
                    }
                }
            }"#,
        );
        fs.add_file("/site/pages/home.json", r#"{ "root": { "props": {} }, "content": [] }"#);
        fs.add_file(
            "/site/script.json",
            r#"[
                { "action": { "type": "insert", "componentType": "Heading", "destinationIndex": 0, "destinationZone": "root:default-zone" } },
                { "action": { "type": "insert", "componentType": "Missing", "destinationIndex": 0, "destinationZone": "root:default-zone" } },
                "undo",
                "redo",
                { "refreshPermissions": {} }
            ]"#,
        );
    }

    fn args(dry_run: bool) -> ApplyArgs {
        ApplyArgs {
            page: "home".to_string(),
            script: PathBuf::from("script.json"),
            dry_run,
        }
    }

    #[tokio::test]
    async fn test_apply_publishes_page() {
        let fs = Arc::new(MockFileSystem::new());
        project(&fs);

        apply(args(false), fs.clone(), Path::new("/site")).await.unwrap();

        let data: Data = read_json(fs.as_ref(), Path::new("/site/pages/home.json")).unwrap();
        assert_eq!(data.content.len(), 1);
        assert_eq!(data.content[0].props["anchor"], "hello-world");
        assert!(data.content[0].id().unwrap().starts_with("Heading-"));
    }

    #[tokio::test]
    async fn test_reapplying_script_keeps_ids_unique() {
        let fs = Arc::new(MockFileSystem::new());
        project(&fs);
        fs.add_file(
            "/site/twice.json",
            r#"[
                { "action": { "type": "insert", "componentType": "Heading", "destinationIndex": 0, "destinationZone": "root:default-zone" } },
                { "action": { "type": "duplicate", "sourceIndex": 0, "sourceZone": "root:default-zone" } }
            ]"#,
        );
        let twice = || ApplyArgs {
            script: PathBuf::from("twice.json"),
            ..args(false)
        };

        apply(twice(), fs.clone(), Path::new("/site")).await.unwrap();
        apply(twice(), fs.clone(), Path::new("/site")).await.unwrap();

        let data: Data = read_json(fs.as_ref(), Path::new("/site/pages/home.json")).unwrap();
        let mut ids: Vec<&str> = data.content.iter().filter_map(|item| item.id()).collect();
        assert_eq!(ids.len(), 4);
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 4);
    }

    #[tokio::test]
    async fn test_dry_run_leaves_page_alone() {
        let fs = Arc::new(MockFileSystem::new());
        project(&fs);

        apply(args(true), fs.clone(), Path::new("/site")).await.unwrap();

        let data: Data = read_json(fs.as_ref(), Path::new("/site/pages/home.json")).unwrap();
        assert!(data.content.is_empty());
    }

    #[test]
    fn test_run_script_counts_rejections() {
        let store = EditorStore::new(Config::new(), Data::default(), StoreOptions::new().with_runtime(None));
        let steps = script::parse(r#"["undo", "redo", { "refreshPermissions": { "root": true } }]"#).unwrap();

        let summary = run_script(&store, steps);

        assert_eq!(summary, ScriptSummary { applied: 1, rejected: 2 });
    }
}
