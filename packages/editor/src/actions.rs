//! # Actions
//!
//! The closed set of state transitions the editor accepts. Actions address
//! components by zone and position, the way a drag-and-drop surface sees
//! them, and serialize as `{ "type": "<name>", ... }` with camelCase fields.
//!
//! `setData` and `setUi` take either a patch or an updater computed from
//! the current state. Updaters exist only in-process and cannot be
//! serialized.

use crate::state::{AppState, UiPatch};
use puck_common::{ComponentData, Data, LocalizedBlock, RootData, ZoneKey};
use serde::{ser, Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Action {
    /// Create a component from its config defaults
    #[serde(rename_all = "camelCase")]
    Insert {
        component_type: String,
        destination_index: usize,
        destination_zone: ZoneKey,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },

    /// Clone a component and its subtree right after itself
    #[serde(rename_all = "camelCase")]
    Duplicate {
        source_index: usize,
        source_zone: ZoneKey,
    },

    #[serde(rename_all = "camelCase")]
    Replace {
        destination_index: usize,
        destination_zone: ZoneKey,
        data: ComponentData,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ui: Option<UiPatch>,
    },

    #[serde(rename_all = "camelCase")]
    ReplaceRoot {
        root: RootData,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ui: Option<UiPatch>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        record_history: Option<bool>,
    },

    Remove {
        index: usize,
        zone: ZoneKey,
    },

    /// `destination_index` is the position the item ends up at
    #[serde(rename_all = "camelCase")]
    Move {
        source_index: usize,
        source_zone: ZoneKey,
        destination_index: usize,
        destination_zone: ZoneKey,
    },

    #[serde(rename_all = "camelCase")]
    Reorder {
        source_index: usize,
        destination_index: usize,
        destination_zone: ZoneKey,
    },

    SetData {
        data: Update<DataPatch>,
    },

    #[serde(rename_all = "camelCase")]
    SetUi {
        ui: Update<UiPatch>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        record_history: Option<bool>,
    },

    /// Make sure a zone exists, creating an empty legacy zone if needed
    RegisterZone {
        zone: ZoneKey,
    },
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Insert { .. } => "insert",
            Action::Duplicate { .. } => "duplicate",
            Action::Replace { .. } => "replace",
            Action::ReplaceRoot { .. } => "replaceRoot",
            Action::Remove { .. } => "remove",
            Action::Move { .. } => "move",
            Action::Reorder { .. } => "reorder",
            Action::SetData { .. } => "setData",
            Action::SetUi { .. } => "setUi",
            Action::RegisterZone { .. } => "registerZone",
        }
    }

    pub fn insert(component_type: impl Into<String>, destination_index: usize, destination_zone: ZoneKey) -> Self {
        Action::Insert {
            component_type: component_type.into(),
            destination_index,
            destination_zone,
            id: None,
        }
    }

    pub fn replace(destination_index: usize, destination_zone: ZoneKey, data: ComponentData) -> Self {
        Action::Replace {
            destination_index,
            destination_zone,
            data,
            ui: None,
        }
    }

    pub fn set_ui(patch: UiPatch) -> Self {
        Action::SetUi {
            ui: Update::Value(patch),
            record_history: None,
        }
    }
}

type Updater<T> = Arc<dyn Fn(&AppState) -> T + Send + Sync>;

/// A new value, or a function of the current state producing one
#[derive(Clone)]
pub enum Update<T> {
    Value(T),
    With(Updater<T>),
}

impl<T: Clone> Update<T> {
    pub fn with(updater: impl Fn(&AppState) -> T + Send + Sync + 'static) -> Self {
        Update::With(Arc::new(updater))
    }

    pub fn resolve(&self, state: &AppState) -> T {
        match self {
            Update::Value(value) => value.clone(),
            Update::With(updater) => updater(state),
        }
    }
}

impl<T> From<T> for Update<T> {
    fn from(value: T) -> Self {
        Update::Value(value)
    }
}

impl<T: fmt::Debug> fmt::Debug for Update<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Update::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Update::With(_) => f.write_str("With(<fn>)"),
        }
    }
}

impl<T: PartialEq> PartialEq for Update<T> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Update::Value(a), Update::Value(b)) => a == b,
            (Update::With(a), Update::With(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl<T: Serialize> Serialize for Update<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Update::Value(value) => value.serialize(serializer),
            Update::With(_) => Err(ser::Error::custom("updater functions cannot be serialized")),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Update<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        T::deserialize(deserializer).map(Update::Value)
    }
}

/// Partial page data: present top-level fields replace the current ones
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DataPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<RootData>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<Vec<ComponentData>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub zones: Option<BTreeMap<String, Vec<ComponentData>>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub header: Option<Vec<LocalizedBlock>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<Vec<LocalizedBlock>>,
}

impl DataPatch {
    pub fn apply_to(self, data: &mut Data) {
        if let Some(root) = self.root {
            data.root = root;
        }
        if let Some(content) = self.content {
            data.content = content;
        }
        if let Some(zones) = self.zones {
            data.zones = zones;
        }
        if let Some(header) = self.header {
            data.header = Some(header);
        }
        if let Some(footer) = self.footer {
            data.footer = Some(footer);
        }
    }
}

impl From<Data> for DataPatch {
    fn from(data: Data) -> Self {
        Self {
            root: Some(data.root),
            content: Some(data.content),
            zones: Some(data.zones),
            header: data.header,
            footer: data.footer,
        }
    }
}
