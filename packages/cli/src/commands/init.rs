use crate::commands::pages::create_page;
use crate::config::{ProjectConfig, DEFAULT_CONFIG_NAME};
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use puck_common::{write_json, FileSystem};
use std::path::Path;

#[derive(Debug, Args)]
pub struct InitArgs {
    /// Pages directory
    #[arg(short, long, default_value = "pages")]
    pub pages_dir: String,

    /// Force overwrite existing config
    #[arg(short, long)]
    pub force: bool,
}

const STARTER_COMPONENTS: &str = r#"{
  "root": {
    "fields": {
      "title": { "type": "text" }
    }
  },
  "components": {
    "Heading": {
      "defaultProps": { "title": "Heading", "level": 2 },
      "fields": {
        "title": { "type": "text" },
        "anchor": { "type": "text" },
        "level": { "type": "number", "min": 1, "max": 6 }
      }
    },
    "Text": {
      "defaultProps": { "text": "" },
      "fields": {
        "text": { "type": "textarea" }
      }
    },
    "Banner": {
      "defaultProps": { "title": "Banner", "locked": false },
      "fields": {
        "title": { "type": "text" },
        "locked": {
          "type": "radio",
          "options": [
            { "label": "Locked", "value": true },
            { "label": "Unlocked", "value": false }
          ]
        }
      }
    },
    "Columns": {
      "fields": {
        "left": { "type": "slot" },
        "right": { "type": "slot", "disallow": ["Columns"] }
      }
    }
  }
}
"#;

pub fn init(args: InitArgs, fs: &dyn FileSystem, cwd: &Path) -> Result<()> {
    let config_path = cwd.join(DEFAULT_CONFIG_NAME);

    // Check if config already exists
    if fs.exists(&config_path) && !args.force {
        println!(
            "{} {} already exists",
            "⚠️".yellow(),
            DEFAULT_CONFIG_NAME.bright_white()
        );
        println!("Use --force to overwrite");
        return Ok(());
    }

    println!("{}", "📝 Initializing Puck project...".bright_blue().bold());

    let project = ProjectConfig {
        pages_dir: args.pages_dir.clone(),
        ..ProjectConfig::default()
    };
    write_json(fs, &config_path, &project)?;
    println!("  {} Created {}", "✓".green(), DEFAULT_CONFIG_NAME);

    let components_path = cwd.join(&project.components);
    if !fs.exists(&components_path) || args.force {
        fs.write(&components_path, STARTER_COMPONENTS)?;
        println!("  {} Created {}", "✓".green(), project.components);
    }

    if !fs.exists(&project.page_path(cwd, "home")) {
        create_page(&project, fs, cwd, "home", Some("Home"))?;
        println!("  {} Created {}/home.json", "✓".green(), project.pages_dir);
    }

    println!();
    println!("{}", "✅ Project initialized!".green().bold());
    println!();
    println!("Next steps:");
    println!("  1. Edit {}", project.components);
    println!("  2. Run: puck apply home script.json");
    println!("  3. Run: puck inspect home");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use puck_common::MockFileSystem;

    #[test]
    fn test_init_writes_starter_project() {
        let fs = MockFileSystem::new();
        let cwd = Path::new("/site");

        init(
            InitArgs {
                pages_dir: "content".to_string(),
                force: false,
            },
            &fs,
            cwd,
        )
        .unwrap();

        let project = ProjectConfig::load(&fs, cwd).unwrap();
        assert_eq!(project.pages_dir, "content");
        assert!(fs.exists(Path::new("/site/content/home.json")));

        let config = project.load_components(&fs, cwd).unwrap();
        assert!(config.component("Heading").unwrap().resolve_data.is_some());
        assert!(config.component("Banner").unwrap().resolve_permissions.is_some());
        assert!(!config.accepts("Columns", "right", "Columns"));
    }

    #[test]
    fn test_init_keeps_existing_config_without_force() {
        let fs = MockFileSystem::new();
        fs.add_file("/site/puck.config.json", r#"{ "pagesDir": "mine" }"#);

        init(
            InitArgs {
                pages_dir: "pages".to_string(),
                force: false,
            },
            &fs,
            Path::new("/site"),
        )
        .unwrap();

        let project = ProjectConfig::load(&fs, Path::new("/site")).unwrap();
        assert_eq!(project.pages_dir, "mine");
        assert!(!fs.exists(Path::new("/site/components.json")));
    }
}
