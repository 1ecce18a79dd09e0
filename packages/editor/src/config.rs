//! # Component Config
//!
//! The host describes every component type the page may contain, plus the
//! root. The static half of a config (labels, default props, fields,
//! permissions) loads from JSON. Resolver hooks are attached in code.
//!
//! ```text
//! {
//!   "components": {
//!     "Columns": {
//!       "fields": { "left": { "type": "slot", "allow": ["Text"] } }
//!     }
//!   },
//!   "root": { "fields": { "title": { "type": "text" } } },
//!   "permissions": { "delete": false }
//! }
//! ```

use crate::errors::EditorError;
use crate::permissions::{PartialPermissions, Permissions, ResolvePermissions};
use crate::resolver::ResolveData;
use puck_common::{Props, SlotFields, ROOT_ID};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldOption {
    pub label: String,
    pub value: Value,
}

/// Field kinds understood by the editor. Only `slot` changes how the data
/// model behaves; the rest are carried for hosts that render forms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FieldKind {
    Text,
    Textarea,
    Number {
        min: Option<f64>,
        max: Option<f64>,
    },
    Select {
        #[serde(default)]
        options: Vec<FieldOption>,
    },
    Radio {
        #[serde(default)]
        options: Vec<FieldOption>,
    },
    #[serde(rename_all = "camelCase")]
    Array {
        #[serde(default)]
        array_fields: BTreeMap<String, Field>,
    },
    #[serde(rename_all = "camelCase")]
    Object {
        #[serde(default)]
        object_fields: BTreeMap<String, Field>,
    },
    /// A prop holding child components
    Slot {
        allow: Option<Vec<String>>,
        #[serde(default)]
        disallow: Vec<String>,
    },
    External,
    Custom,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    #[serde(flatten)]
    pub kind: FieldKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Field {
    pub fn new(kind: FieldKind) -> Self {
        Self { kind, label: None }
    }

    pub fn slot() -> Self {
        Self::new(FieldKind::Slot {
            allow: None,
            disallow: Vec::new(),
        })
    }

    pub fn is_slot(&self) -> bool {
        matches!(self.kind, FieldKind::Slot { .. })
    }

    /// Whether a component type may be placed in this field.
    /// Non-slot fields hold no components, so they refuse nothing.
    pub fn accepts(&self, component_type: &str) -> bool {
        match &self.kind {
            FieldKind::Slot { allow, disallow } => {
                let allowed = allow
                    .as_ref()
                    .map_or(true, |allow| allow.iter().any(|t| t == component_type));
                allowed && !disallow.iter().any(|t| t == component_type)
            }
            _ => true,
        }
    }
}

/// Config for one component type (or the root)
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(default)]
    pub default_props: Props,

    #[serde(default)]
    pub fields: BTreeMap<String, Field>,

    #[serde(default)]
    pub permissions: PartialPermissions,

    #[serde(skip)]
    pub resolve_data: Option<Arc<dyn ResolveData>>,

    #[serde(skip)]
    pub resolve_permissions: Option<Arc<dyn ResolvePermissions>>,
}

impl ComponentConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_default_prop(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.default_props.insert(name.into(), value.into());
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, field: Field) -> Self {
        self.fields.insert(name.into(), field);
        self
    }

    pub fn with_permissions(mut self, permissions: PartialPermissions) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn with_resolve_data(mut self, hook: impl ResolveData + 'static) -> Self {
        self.resolve_data = Some(Arc::new(hook));
        self
    }

    pub fn with_resolve_permissions(mut self, hook: impl ResolvePermissions + 'static) -> Self {
        self.resolve_permissions = Some(Arc::new(hook));
        self
    }

    pub fn slot_fields(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|(_, field)| field.is_slot())
            .map(|(name, _)| name.clone())
            .collect()
    }
}

impl fmt::Debug for ComponentConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentConfig")
            .field("label", &self.label)
            .field("default_props", &self.default_props)
            .field("fields", &self.fields)
            .field("permissions", &self.permissions)
            .field("resolve_data", &self.resolve_data.is_some())
            .field("resolve_permissions", &self.resolve_permissions.is_some())
            .finish()
    }
}

/// Everything the editor knows about the host's components
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub components: BTreeMap<String, ComponentConfig>,

    #[serde(default)]
    pub root: ComponentConfig,

    /// Global permission overrides
    #[serde(default)]
    pub permissions: PartialPermissions,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(source: &str) -> Result<Self, EditorError> {
        Ok(serde_json::from_str(source)?)
    }

    pub fn with_component(mut self, name: impl Into<String>, component: ComponentConfig) -> Self {
        self.components.insert(name.into(), component);
        self
    }

    pub fn with_root(mut self, root: ComponentConfig) -> Self {
        self.root = root;
        self
    }

    pub fn with_permissions(mut self, permissions: PartialPermissions) -> Self {
        self.permissions = permissions;
        self
    }

    /// Config for a component type. `"root"` addresses the root config.
    pub fn component(&self, component_type: &str) -> Option<&ComponentConfig> {
        if component_type == ROOT_ID {
            return Some(&self.root);
        }
        self.components.get(component_type)
    }

    pub fn component_mut(&mut self, component_type: &str) -> Option<&mut ComponentConfig> {
        if component_type == ROOT_ID {
            return Some(&mut self.root);
        }
        self.components.get_mut(component_type)
    }

    /// Whether `component_type` names a component that can be placed on a page
    pub fn is_known(&self, component_type: &str) -> bool {
        component_type != ROOT_ID && self.components.contains_key(component_type)
    }

    pub fn global_permissions(&self) -> Permissions {
        Permissions::default().apply(&self.permissions)
    }

    /// Whether a zone owned by `parent_type` accepts `component_type`.
    /// Legacy zones are not declared as fields and accept anything.
    pub fn accepts(&self, parent_type: &str, zone: &str, component_type: &str) -> bool {
        self.component(parent_type)
            .and_then(|parent| parent.fields.get(zone))
            .map_or(true, |field| field.accepts(component_type))
    }
}

impl SlotFields for Config {
    fn slot_fields(&self, component_type: Option<&str>) -> Vec<String> {
        self.component(component_type.unwrap_or(ROOT_ID))
            .map(ComponentConfig::slot_fields)
            .unwrap_or_default()
    }
}
