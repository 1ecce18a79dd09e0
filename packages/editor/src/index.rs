//! # Document Index
//!
//! A flat view of the page tree, rebuilt after every applied action:
//! every identified component with its parent, zone and position, plus the
//! ordered ids of every zone.
//!
//! Traversal is depth-first: root slots, then the root zone in array order,
//! then the root's legacy zones, recursing into each component's slots and
//! legacy zones as it is visited. Malformed documents are indexed as far as
//! possible and the problems are reported as [`IndexDiagnostic`]s:
//!
//! - components of unknown type are skipped with their subtree
//! - components without an id are skipped with their subtree
//! - a repeated id keeps its first occurrence
//! - a legacy zone that leads back to one of its ancestors is a cycle
//! - a legacy zone whose parent is never reached is an orphan

use crate::config::Config;
use puck_common::{ComponentData, Data, ZoneKey, ROOT_ID};
use std::collections::{BTreeMap, HashMap, HashSet};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub struct NodeEntry {
    pub data: ComponentData,
    pub parent_id: String,
    pub zone: ZoneKey,
    /// Position in the zone's backing array
    pub index: usize,
    /// Zones from the root down to (not including) this node's own zone
    pub path: Vec<ZoneKey>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IndexDiagnostic {
    #[error("unknown component type {component_type:?} in {zone}")]
    UnknownComponent {
        component_type: String,
        id: Option<String>,
        zone: ZoneKey,
    },

    #[error("{component_type} at {zone}[{index}] has no id")]
    MissingId {
        component_type: String,
        zone: ZoneKey,
        index: usize,
    },

    #[error("duplicate id {id:?} in {zone}")]
    DuplicateId { id: String, zone: ZoneKey },

    #[error("{id:?} in {zone} is its own ancestor")]
    Cycle { id: String, zone: ZoneKey },

    #[error("zone {zone:?} has no parent in the document")]
    OrphanZone { zone: String },
}

#[derive(Debug, Clone, Default)]
pub struct DocumentIndex {
    pub nodes: HashMap<String, NodeEntry>,
    pub zones: BTreeMap<ZoneKey, Vec<String>>,
    pub diagnostics: Vec<IndexDiagnostic>,
}

impl DocumentIndex {
    pub fn build(data: &Data, config: &Config) -> Self {
        let mut builder = Builder::new(data, config);
        builder.visit_root();
        builder.finish()
    }

    pub fn get(&self, id: &str) -> Option<&NodeEntry> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn zone(&self, key: &ZoneKey) -> &[String] {
        self.zones.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// True when `ancestor` owns a zone on the path down to `id`
    pub fn is_descendant(&self, id: &str, ancestor: &str) -> bool {
        self.nodes
            .get(id)
            .map_or(false, |entry| entry.path.iter().any(|zone| zone.parent_id() == ancestor))
    }

    /// Ids of every indexed component of a type, in zone key order
    pub fn ids_of_type(&self, component_type: &str) -> Vec<String> {
        self.zones
            .values()
            .flatten()
            .filter(|id| {
                self.nodes
                    .get(id.as_str())
                    .map_or(false, |entry| entry.data.component_type == component_type)
            })
            .cloned()
            .collect()
    }
}

struct Builder<'a> {
    config: &'a Config,
    root_slots: Vec<(ZoneKey, &'a [ComponentData])>,
    content: &'a [ComponentData],
    /// Legacy zones grouped by parent id
    legacy: HashMap<&'a str, Vec<(ZoneKey, &'a [ComponentData])>>,
    unparsable: Vec<String>,
    visited_zones: HashSet<ZoneKey>,
    on_path: HashSet<String>,
    index: DocumentIndex,
}

impl<'a> Builder<'a> {
    fn new(data: &'a Data, config: &'a Config) -> Self {
        let mut legacy: HashMap<&'a str, Vec<(ZoneKey, &'a [ComponentData])>> = HashMap::new();
        let mut unparsable = Vec::new();
        for (key, items) in &data.zones {
            match ZoneKey::parse(key) {
                Ok(zone) => {
                    let parent = key.split(':').next().unwrap_or_default();
                    legacy.entry(parent).or_default().push((zone, items.as_slice()));
                }
                Err(_) => unparsable.push(key.clone()),
            }
        }

        let root_slots = data
            .root
            .slots
            .iter()
            .map(|(name, items)| (ZoneKey::new(ROOT_ID, name.as_str()), items.as_slice()))
            .collect();

        Self {
            config,
            root_slots,
            content: &data.content,
            legacy,
            unparsable,
            visited_zones: HashSet::new(),
            on_path: HashSet::new(),
            index: DocumentIndex::default(),
        }
    }

    fn visit_root(&mut self) {
        for (zone, items) in self.root_slots.clone() {
            self.visit_zone(zone, items, &[]);
        }
        self.visit_zone(ZoneKey::root(), self.content, &[]);
        self.visit_legacy_zones(ROOT_ID, &[]);
    }

    fn visit_legacy_zones(&mut self, parent_id: &str, path: &[ZoneKey]) {
        let Some(zones) = self.legacy.get(parent_id).cloned() else {
            return;
        };
        for (zone, items) in zones {
            // The root zone lives in `content`, never in `zones`
            if zone.is_root() {
                continue;
            }
            self.visit_zone(zone, items, path);
        }
    }

    fn visit_zone(&mut self, zone: ZoneKey, items: &'a [ComponentData], path: &[ZoneKey]) {
        if !self.visited_zones.insert(zone.clone()) {
            return;
        }
        self.index.zones.entry(zone.clone()).or_default();

        for (position, item) in items.iter().enumerate() {
            let Some(id) = item.id() else {
                self.index.diagnostics.push(IndexDiagnostic::MissingId {
                    component_type: item.component_type.clone(),
                    zone: zone.clone(),
                    index: position,
                });
                continue;
            };

            if !self.config.is_known(&item.component_type) {
                self.index.diagnostics.push(IndexDiagnostic::UnknownComponent {
                    component_type: item.component_type.clone(),
                    id: Some(id.to_string()),
                    zone: zone.clone(),
                });
                continue;
            }

            if self.on_path.contains(id) {
                self.index.diagnostics.push(IndexDiagnostic::Cycle {
                    id: id.to_string(),
                    zone: zone.clone(),
                });
                continue;
            }

            if self.index.nodes.contains_key(id) {
                self.index.diagnostics.push(IndexDiagnostic::DuplicateId {
                    id: id.to_string(),
                    zone: zone.clone(),
                });
                continue;
            }

            self.index.nodes.insert(
                id.to_string(),
                NodeEntry {
                    data: item.clone(),
                    parent_id: zone.parent_id().to_string(),
                    zone: zone.clone(),
                    index: position,
                    path: path.to_vec(),
                },
            );
            if let Some(ids) = self.index.zones.get_mut(&zone) {
                ids.push(id.to_string());
            }

            let mut child_path = path.to_vec();
            child_path.push(zone.clone());

            self.on_path.insert(id.to_string());
            for (name, children) in &item.slots {
                self.visit_zone(ZoneKey::new(id, name.as_str()), children, &child_path);
            }
            self.visit_legacy_zones(id, &child_path);
            self.on_path.remove(id);
        }
    }

    fn finish(mut self) -> DocumentIndex {
        let mut orphans: Vec<String> = self
            .legacy
            .values()
            .flatten()
            .filter(|(zone, _)| !self.visited_zones.contains(zone))
            .map(|(zone, _)| zone.to_string())
            .collect();
        orphans.extend(self.unparsable.drain(..));
        orphans.sort();

        for zone in orphans {
            self.index.diagnostics.push(IndexDiagnostic::OrphanZone { zone });
        }
        self.index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ComponentConfig, Field};
    use puck_common::RootData;

    fn config() -> Config {
        Config::new()
            .with_component("Heading", ComponentConfig::new())
            .with_component("Text", ComponentConfig::new())
            .with_component(
                "Columns",
                ComponentConfig::new().with_field("left", Field::slot()),
            )
            .with_root(ComponentConfig::new().with_field("hero", Field::slot()))
    }

    fn page() -> Data {
        Data {
            root: RootData::default()
                .with_prop("title", "Home")
                .with_slot("hero", vec![ComponentData::new("Heading", "hero-heading")]),
            content: vec![
                ComponentData::new("Heading", "h1"),
                ComponentData::new("Columns", "cols")
                    .with_slot("left", vec![ComponentData::new("Text", "t1")]),
            ],
            zones: [("h1:extra".to_string(), vec![ComponentData::new("Text", "t2")])]
                .into_iter()
                .collect(),
            ..Data::default()
        }
    }

    #[test]
    fn test_index_records_parents_and_positions() {
        let index = DocumentIndex::build(&page(), &config());

        assert!(index.diagnostics.is_empty());
        assert_eq!(index.len(), 5);

        let t1 = index.get("t1").unwrap();
        assert_eq!(t1.parent_id, "cols");
        assert_eq!(t1.zone, ZoneKey::new("cols", "left"));
        assert_eq!(t1.index, 0);
        assert_eq!(t1.path, vec![ZoneKey::root()]);

        assert_eq!(index.get("t2").unwrap().parent_id, "h1");
        assert_eq!(index.get("hero-heading").unwrap().zone, ZoneKey::new("root", "hero"));
        assert_eq!(index.zone(&ZoneKey::root()), ["h1", "cols"]);
        assert!(index.is_descendant("t1", "cols"));
        assert!(!index.is_descendant("cols", "t1"));
    }

    #[test]
    fn test_index_reports_malformed_content() {
        let mut data = page();
        data.content.push(ComponentData::new("Mystery", "m1"));
        data.content.push(ComponentData::new("Heading", "h1"));
        data.content.push(ComponentData {
            component_type: "Text".to_string(),
            ..ComponentData::default()
        });
        data.zones
            .insert("ghost:zone".to_string(), vec![ComponentData::new("Text", "t9")]);

        let index = DocumentIndex::build(&data, &config());

        assert!(!index.contains("m1"));
        assert!(!index.contains("t9"));
        // First occurrence wins
        assert_eq!(index.get("h1").unwrap().index, 0);
        assert_eq!(
            index.diagnostics,
            vec![
                IndexDiagnostic::UnknownComponent {
                    component_type: "Mystery".to_string(),
                    id: Some("m1".to_string()),
                    zone: ZoneKey::root(),
                },
                IndexDiagnostic::DuplicateId {
                    id: "h1".to_string(),
                    zone: ZoneKey::root(),
                },
                IndexDiagnostic::MissingId {
                    component_type: "Text".to_string(),
                    zone: ZoneKey::root(),
                    index: 4,
                },
                IndexDiagnostic::OrphanZone {
                    zone: "ghost:zone".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_index_detects_legacy_zone_cycles() {
        let data = Data {
            content: vec![ComponentData::new("Text", "a")],
            zones: [
                ("a:inner".to_string(), vec![ComponentData::new("Text", "b")]),
                ("b:inner".to_string(), vec![ComponentData::new("Text", "a")]),
            ]
            .into_iter()
            .collect(),
            ..Data::default()
        };

        let index = DocumentIndex::build(&data, &config());

        assert_eq!(index.len(), 2);
        assert_eq!(
            index.diagnostics,
            vec![IndexDiagnostic::Cycle {
                id: "a".to_string(),
                zone: ZoneKey::new("b", "inner"),
            }]
        );
    }

    #[test]
    fn test_ids_of_type_in_zone_key_order() {
        let index = DocumentIndex::build(&page(), &config());

        assert_eq!(index.ids_of_type("Text"), vec!["t1", "t2"]);
        assert_eq!(index.ids_of_type("Heading"), vec!["h1", "hero-heading"]);
    }
}
