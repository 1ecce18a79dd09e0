use crate::data::*;

/// Visitor pattern for traversing a page immutably
///
/// The default implementations walk the whole tree: root slots, the root
/// zone, legacy zones, then every component's slots. Override specific
/// visit_* methods to act on nodes.
pub trait Visitor: Sized {
    fn visit_data(&mut self, data: &Data) {
        walk_data(self, data);
    }

    fn visit_root(&mut self, root: &RootData) {
        walk_root(self, root);
    }

    fn visit_zone(&mut self, zone: &ZoneKey, items: &[ComponentData]) {
        walk_zone(self, zone, items);
    }

    fn visit_component(&mut self, _zone: &ZoneKey, _index: usize, item: &ComponentData) {
        walk_component(self, item);
    }

    fn visit_localized_block(&mut self, _block: &LocalizedBlock) {
        // Header/footer blocks are page data, not part of the editable tree
    }
}

/// Mutable visitor pattern for transforming a page
///
/// Legacy zones are visited by value, without their keys: a transform that
/// renames ids must rekey them itself.
pub trait VisitorMut: Sized {
    fn visit_data_mut(&mut self, data: &mut Data) {
        walk_data_mut(self, data);
    }

    fn visit_zone_mut(&mut self, items: &mut [ComponentData]) {
        walk_zone_mut(self, items);
    }

    fn visit_component_mut(&mut self, item: &mut ComponentData) {
        walk_component_mut(self, item);
    }
}

// Default walk implementations for immutable visitor

pub fn walk_data<V: Visitor>(visitor: &mut V, data: &Data) {
    visitor.visit_root(&data.root);
    visitor.visit_zone(&ZoneKey::root(), &data.content);

    for (key, items) in &data.zones {
        if let Ok(key) = ZoneKey::parse(key) {
            visitor.visit_zone(&key, items);
        }
    }

    for block in data.header.iter().chain(data.footer.iter()).flatten() {
        visitor.visit_localized_block(block);
    }
}

pub fn walk_root<V: Visitor>(visitor: &mut V, root: &RootData) {
    for (name, children) in &root.slots {
        visitor.visit_zone(&ZoneKey::new(ROOT_ID, name.as_str()), children);
    }
}

pub fn walk_zone<V: Visitor>(visitor: &mut V, zone: &ZoneKey, items: &[ComponentData]) {
    for (index, item) in items.iter().enumerate() {
        visitor.visit_component(zone, index, item);
    }
}

pub fn walk_component<V: Visitor>(visitor: &mut V, item: &ComponentData) {
    // Children of an item without an id cannot be addressed by zone key
    let Some(id) = item.id() else {
        return;
    };
    for (name, children) in &item.slots {
        visitor.visit_zone(&ZoneKey::new(id, name.as_str()), children);
    }
}

// Default walk implementations for mutable visitor

pub fn walk_data_mut<V: VisitorMut>(visitor: &mut V, data: &mut Data) {
    for children in data.root.slots.values_mut() {
        visitor.visit_zone_mut(children);
    }
    visitor.visit_zone_mut(&mut data.content);
    for items in data.zones.values_mut() {
        visitor.visit_zone_mut(items);
    }
}

pub fn walk_zone_mut<V: VisitorMut>(visitor: &mut V, items: &mut [ComponentData]) {
    for item in items {
        visitor.visit_component_mut(item);
    }
}

pub fn walk_component_mut<V: VisitorMut>(visitor: &mut V, item: &mut ComponentData) {
    for children in item.slots.values_mut() {
        visitor.visit_zone_mut(children);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nested() -> Data {
        let inner = ComponentData::new("Text", "t1");
        let columns = ComponentData::new("Columns", "cols").with_slot("left", vec![inner]);
        Data {
            content: vec![ComponentData::new("Heading", "h1"), columns],
            zones: [("h1:extra".to_string(), vec![ComponentData::new("Text", "t2")])]
                .into_iter()
                .collect(),
            ..Data::default()
        }
    }

    #[derive(Default)]
    struct CollectIds(Vec<(String, String)>);

    impl Visitor for CollectIds {
        fn visit_component(&mut self, zone: &ZoneKey, _index: usize, item: &ComponentData) {
            self.0.push((zone.to_string(), item.id().unwrap_or_default().to_string()));
            walk_component(self, item);
        }
    }

    #[test]
    fn test_visitor_walks_depth_first() {
        let mut collect = CollectIds::default();
        collect.visit_data(&nested());

        assert_eq!(
            collect.0,
            vec![
                ("root:default-zone".to_string(), "h1".to_string()),
                ("root:default-zone".to_string(), "cols".to_string()),
                ("cols:left".to_string(), "t1".to_string()),
                ("h1:extra".to_string(), "t2".to_string()),
            ]
        );
    }

    struct Uppercase;

    impl VisitorMut for Uppercase {
        fn visit_component_mut(&mut self, item: &mut ComponentData) {
            item.component_type = item.component_type.to_uppercase();
            walk_component_mut(self, item);
        }
    }

    #[test]
    fn test_visitor_mut_reaches_every_component() {
        let mut data = nested();
        Uppercase.visit_data_mut(&mut data);

        assert_eq!(data.find("t1").unwrap().component_type, "TEXT");
        assert_eq!(data.find("t2").unwrap().component_type, "TEXT");
        assert_eq!(data.find("cols").unwrap().component_type, "COLUMNS");
    }
}
