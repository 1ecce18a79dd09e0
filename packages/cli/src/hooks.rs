//! Resolver hooks the demo host attaches to loaded component configs

use puck_common::{ComponentData, Props};
use puck_editor::{
    sync_permissions, sync_resolve_data, ComponentConfig, Config, PartialPermissions,
    PermissionsParams, ResolveDataOutput, ResolveDataParams,
};
use serde_json::Value;

/// Attach hooks based on the fields each component declares:
/// `title` + `anchor` get a slug resolver, `locked` gets lock permissions.
pub fn install(config: &mut Config) {
    for component in config.components.values_mut() {
        install_into(component);
    }
    install_into(&mut config.root);
}

fn install_into(component: &mut ComponentConfig) {
    let fields = &component.fields;
    if fields.contains_key("title") && fields.contains_key("anchor") && component.resolve_data.is_none() {
        *component = std::mem::take(component).with_resolve_data(sync_resolve_data(slug));
    }
    if component.fields.contains_key("locked") && component.resolve_permissions.is_none() {
        *component = std::mem::take(component).with_resolve_permissions(sync_permissions(lock));
    }
}

/// `anchor` follows `title` and cannot be edited by hand
fn slug(data: &ComponentData, _params: &ResolveDataParams) -> ResolveDataOutput {
    let title = data.props.get("title").and_then(Value::as_str).unwrap_or_default();
    let mut props = Props::new();
    props.insert("anchor".to_string(), Value::from(slugify(title)));
    ResolveDataOutput::props(props).with_read_only("anchor", true)
}

fn lock(data: &ComponentData, _params: &PermissionsParams) -> PartialPermissions {
    let locked = data.props.get("locked").and_then(Value::as_bool).unwrap_or(false);
    if locked {
        PartialPermissions {
            drag: Some(false),
            delete: Some(false),
            edit: Some(false),
            ..PartialPermissions::default()
        }
    } else {
        PartialPermissions::default()
    }
}

pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_string()
}
