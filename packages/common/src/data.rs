//! # Page Data
//!
//! The page document the editor builds: a root node, the root zone's
//! `content`, legacy drop zones keyed by compound zone key, and optional
//! per-language header/footer blocks.
//!
//! ## Slots
//!
//! Components nest children through slot fields. On the wire a slot is just
//! a prop holding an array of components. After loading, a document is
//! *hydrated*: declared slot fields move out of `props` into the typed
//! `slots` map so the tree can be edited in place. Serializing merges them
//! back, so the JSON shape never changes.
//!
//! ```text
//! { "type": "Columns", "props": { "id": "c1", "left": [ {...} ] } }
//!                     ↓ hydrate
//! ComponentData { props: { id }, slots: { left: [ComponentData] } }
//! ```

use crate::error::CommonError;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Id used to address the root node
pub const ROOT_ID: &str = "root";

/// Name of the zone backed by `Data::content`
pub const DEFAULT_ZONE: &str = "default-zone";

/// Compound key of the root zone
pub const ROOT_ZONE: &str = "root:default-zone";

pub type Props = Map<String, Value>;
pub type ReadOnly = BTreeMap<String, bool>;
pub type Slots = BTreeMap<String, Vec<ComponentData>>;

/// Tells the data model which prop fields hold nested components.
pub trait SlotFields {
    /// Slot field names for a component type; `None` asks about the root.
    fn slot_fields(&self, component_type: Option<&str>) -> Vec<String>;
}

/// A document handled without any config has no slots.
pub struct NoSlots;

impl SlotFields for NoSlots {
    fn slot_fields(&self, _component_type: Option<&str>) -> Vec<String> {
        Vec::new()
    }
}

/// Address of a zone: `"<parentId>:<zoneName>"`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ZoneKey {
    parent_id: String,
    zone: String,
}

impl ZoneKey {
    pub fn new(parent_id: impl Into<String>, zone: impl Into<String>) -> Self {
        Self {
            parent_id: parent_id.into(),
            zone: zone.into(),
        }
    }

    /// The zone backed by `Data::content`
    pub fn root() -> Self {
        Self::new(ROOT_ID, DEFAULT_ZONE)
    }

    pub fn parse(key: &str) -> Result<Self, CommonError> {
        match key.split_once(':') {
            Some((parent, zone)) if !parent.is_empty() && !zone.is_empty() => {
                Ok(Self::new(parent, zone))
            }
            _ => Err(CommonError::InvalidZoneKey(key.to_string())),
        }
    }

    pub fn parent_id(&self) -> &str {
        &self.parent_id
    }

    pub fn zone(&self) -> &str {
        &self.zone
    }

    pub fn is_root(&self) -> bool {
        self.parent_id == ROOT_ID && self.zone == DEFAULT_ZONE
    }
}

impl fmt::Display for ZoneKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.parent_id, self.zone)
    }
}

impl FromStr for ZoneKey {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ZoneKey {
    type Error = CommonError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ZoneKey> for String {
    fn from(key: ZoneKey) -> Self {
        key.to_string()
    }
}

/// One component instance in the page tree
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct ComponentData {
    #[serde(rename = "type")]
    pub component_type: String,

    #[serde(default)]
    pub props: Props,

    /// Hydrated slot children; merged back into `props` when serialized
    #[serde(skip)]
    pub slots: Slots,

    #[serde(rename = "readOnly", default)]
    pub read_only: Option<ReadOnly>,
}

impl ComponentData {
    pub fn new(component_type: impl Into<String>, id: impl Into<String>) -> Self {
        let mut props = Props::new();
        props.insert("id".to_string(), Value::String(id.into()));
        Self {
            component_type: component_type.into(),
            props,
            slots: Slots::new(),
            read_only: None,
        }
    }

    pub fn with_prop(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.props.insert(name.into(), value.into());
        self
    }

    pub fn with_slot(mut self, name: impl Into<String>, children: Vec<ComponentData>) -> Self {
        self.slots.insert(name.into(), children);
        self
    }

    pub fn id(&self) -> Option<&str> {
        self.props.get("id").and_then(Value::as_str)
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.props.insert("id".to_string(), Value::String(id.into()));
    }

    pub fn slot(&self, name: &str) -> Option<&[ComponentData]> {
        self.slots.get(name).map(Vec::as_slice)
    }

    /// Props with slot children folded back in, as the wire format has them
    pub fn merged_props(&self) -> Props {
        merge_slots(&self.props, &self.slots)
    }

    /// Lift declared slot fields out of `props`, recursively.
    pub fn hydrate(&mut self, slots: &dyn SlotFields) {
        let fields = slots.slot_fields(Some(&self.component_type));
        hydrate_node(&mut self.props, &mut self.slots, &fields, slots);
    }
}

impl Serialize for ComponentData {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        WireNode {
            component_type: Some(&self.component_type),
            props: self.merged_props(),
            read_only: self.read_only.as_ref(),
        }
        .serialize(serializer)
    }
}

/// The page root. It has props and slots like a component but no type or id.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct RootData {
    #[serde(default)]
    pub props: Props,

    #[serde(skip)]
    pub slots: Slots,

    #[serde(rename = "readOnly", default)]
    pub read_only: Option<ReadOnly>,
}

impl RootData {
    pub fn with_prop(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.props.insert(name.into(), value.into());
        self
    }

    pub fn with_slot(mut self, name: impl Into<String>, children: Vec<ComponentData>) -> Self {
        self.slots.insert(name.into(), children);
        self
    }

    pub fn merged_props(&self) -> Props {
        merge_slots(&self.props, &self.slots)
    }

    pub fn hydrate(&mut self, slots: &dyn SlotFields) {
        let fields = slots.slot_fields(None);
        hydrate_node(&mut self.props, &mut self.slots, &fields, slots);
    }

    /// View the root as a component of type `"root"` so resolvers can treat
    /// it uniformly.
    pub fn to_component(&self) -> ComponentData {
        ComponentData {
            component_type: ROOT_ID.to_string(),
            props: self.props.clone(),
            slots: self.slots.clone(),
            read_only: self.read_only.clone(),
        }
    }

    pub fn from_component(component: ComponentData) -> Self {
        Self {
            props: component.props,
            slots: component.slots,
            read_only: component.read_only,
        }
    }
}

impl Serialize for RootData {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        WireNode {
            component_type: None,
            props: self.merged_props(),
            read_only: self.read_only.as_ref(),
        }
        .serialize(serializer)
    }
}

/// Header or footer content for one language
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalizedBlock {
    pub language: String,

    #[serde(default)]
    pub content: Vec<ComponentData>,
}

impl LocalizedBlock {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            content: Vec::new(),
        }
    }
}

/// The page document
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Data {
    #[serde(default)]
    pub root: RootData,

    #[serde(default)]
    pub content: Vec<ComponentData>,

    /// Legacy drop-zone content keyed by compound zone key
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub zones: BTreeMap<String, Vec<ComponentData>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<Vec<LocalizedBlock>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footer: Option<Vec<LocalizedBlock>>,
}

impl Data {
    /// Parse a document and hydrate its slots.
    pub fn from_json(source: &str, slots: &dyn SlotFields) -> Result<Self, CommonError> {
        let mut data: Data = serde_json::from_str(source)?;
        data.hydrate(slots);
        Ok(data)
    }

    pub fn to_json_pretty(&self) -> Result<String, CommonError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn hydrate(&mut self, slots: &dyn SlotFields) {
        self.root.hydrate(slots);
        for item in &mut self.content {
            item.hydrate(slots);
        }
        for items in self.zones.values_mut() {
            for item in items {
                item.hydrate(slots);
            }
        }
    }

    /// Contents of a zone, if it exists.
    pub fn zone(&self, key: &ZoneKey) -> Option<&Vec<ComponentData>> {
        if key.is_root() {
            return Some(&self.content);
        }
        if key.parent_id() == ROOT_ID {
            if let Some(children) = self.root.slots.get(key.zone()) {
                return Some(children);
            }
        }
        if let Some(children) = self.zones.get(&key.to_string()) {
            return Some(children);
        }
        self.find(key.parent_id())
            .and_then(|item| item.slots.get(key.zone()))
    }

    /// Mutable contents of an existing zone.
    pub fn zone_mut(&mut self, key: &ZoneKey) -> Option<&mut Vec<ComponentData>> {
        if key.is_root() {
            return Some(&mut self.content);
        }
        if key.parent_id() == ROOT_ID && self.root.slots.contains_key(key.zone()) {
            return self.root.slots.get_mut(key.zone());
        }
        let compound = key.to_string();
        if self.zones.contains_key(&compound) {
            return self.zones.get_mut(&compound);
        }
        self.find_mut(key.parent_id())
            .and_then(|item| item.slots.get_mut(key.zone()))
    }

    /// Like [`Data::zone_mut`], but creates an empty legacy zone when the
    /// parent exists and has no such zone yet.
    pub fn ensure_zone(&mut self, key: &ZoneKey) -> Option<&mut Vec<ComponentData>> {
        let exists = self.zone(key).is_some();
        let parent_exists = key.parent_id() == ROOT_ID || self.find(key.parent_id()).is_some();

        if exists {
            self.zone_mut(key)
        } else if parent_exists {
            Some(self.zones.entry(key.to_string()).or_default())
        } else {
            None
        }
    }

    /// Find a component anywhere in the tree.
    pub fn find(&self, id: &str) -> Option<&ComponentData> {
        if let Some(found) = find_in(&self.content, id) {
            return Some(found);
        }
        for children in self.root.slots.values() {
            if let Some(found) = find_in(children, id) {
                return Some(found);
            }
        }
        for children in self.zones.values() {
            if let Some(found) = find_in(children, id) {
                return Some(found);
            }
        }
        None
    }

    pub fn find_mut(&mut self, id: &str) -> Option<&mut ComponentData> {
        if let Some(found) = find_in_mut(&mut self.content, id) {
            return Some(found);
        }
        for children in self.root.slots.values_mut() {
            if let Some(found) = find_in_mut(children, id) {
                return Some(found);
            }
        }
        for children in self.zones.values_mut() {
            if let Some(found) = find_in_mut(children, id) {
                return Some(found);
            }
        }
        None
    }

    /// Zone and position of a component.
    pub fn locate(&self, id: &str) -> Option<(ZoneKey, usize)> {
        if let Some(hit) = locate_in(ZoneKey::root(), &self.content, id) {
            return Some(hit);
        }
        for (name, children) in &self.root.slots {
            if let Some(hit) = locate_in(ZoneKey::new(ROOT_ID, name.as_str()), children, id) {
                return Some(hit);
            }
        }
        for (key, children) in &self.zones {
            let Ok(key) = ZoneKey::parse(key) else {
                continue;
            };
            if let Some(hit) = locate_in(key, children, id) {
                return Some(hit);
            }
        }
        None
    }
}

#[derive(Serialize)]
struct WireNode<'a> {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    component_type: Option<&'a str>,

    props: Props,

    #[serde(rename = "readOnly", skip_serializing_if = "Option::is_none")]
    read_only: Option<&'a ReadOnly>,
}

fn merge_slots(props: &Props, slots: &Slots) -> Props {
    let mut merged = props.clone();
    for (name, children) in slots {
        let items = children
            .iter()
            .filter_map(|child| serde_json::to_value(child).ok())
            .collect();
        merged.insert(name.clone(), Value::Array(items));
    }
    merged
}

fn hydrate_node(props: &mut Props, node_slots: &mut Slots, fields: &[String], slots: &dyn SlotFields) {
    for field in fields {
        // Raw props win: they are what the latest writer handed us.
        let children = match props.remove(field) {
            Some(value) => parse_components(value),
            None => node_slots.remove(field).unwrap_or_default(),
        };
        node_slots.insert(field.clone(), children);
    }

    for children in node_slots.values_mut() {
        for child in children {
            child.hydrate(slots);
        }
    }
}

/// Entries that are not component objects are dropped.
fn parse_components(value: Value) -> Vec<ComponentData> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    }
}

fn find_in<'a>(items: &'a [ComponentData], id: &str) -> Option<&'a ComponentData> {
    for item in items {
        if item.id() == Some(id) {
            return Some(item);
        }
        for children in item.slots.values() {
            if let Some(found) = find_in(children, id) {
                return Some(found);
            }
        }
    }
    None
}

fn find_in_mut<'a>(items: &'a mut [ComponentData], id: &str) -> Option<&'a mut ComponentData> {
    for item in items.iter_mut() {
        if item.id() == Some(id) {
            return Some(item);
        }
        for children in item.slots.values_mut() {
            if let Some(found) = find_in_mut(children, id) {
                return Some(found);
            }
        }
    }
    None
}

fn locate_in(zone: ZoneKey, items: &[ComponentData], id: &str) -> Option<(ZoneKey, usize)> {
    for (index, item) in items.iter().enumerate() {
        if item.id() == Some(id) {
            return Some((zone, index));
        }
        let Some(item_id) = item.id() else {
            continue;
        };
        for (name, children) in &item.slots {
            if let Some(hit) = locate_in(ZoneKey::new(item_id, name.as_str()), children, id) {
                return Some(hit);
            }
        }
    }
    None
}
