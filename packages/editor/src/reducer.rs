//! # Reducer
//!
//! Pure state transitions: `(state, action) -> state`. Data is shared
//! copy-on-write, so the input state is never touched and untouched
//! subtrees stay shared with it.
//!
//! Actions that cannot apply (unknown zone, index out of range, unknown
//! component type, an id collision, moving an item into its own subtree)
//! leave the state unchanged and report a [`Rejection`]. Destination
//! indexes past the end of a zone clamp to an append.
//!
//! Inserts and replaces also report which components need their data
//! resolved; running resolvers is the store's job.

use crate::actions::Action;
use crate::config::Config;
use crate::id_generator::IdGenerator;
use crate::resolver::ResolveTrigger;
use crate::state::{AppState, ItemSelector, UiPatch};
use puck_common::{
    walk_component, walk_component_mut, ComponentData, Data, RootData, Visitor, VisitorMut, ZoneKey, ROOT_ID,
};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("unknown component type {0:?}")]
    UnknownComponent(String),

    #[error("zone {0} does not exist")]
    ZoneNotFound(ZoneKey),

    #[error("no item at {zone}[{index}]")]
    IndexOutOfBounds { zone: ZoneKey, index: usize },

    #[error("id {0:?} is already in use")]
    DuplicateId(String),

    #[error("no free id for a {0} component")]
    NoFreeId(String),

    #[error("replacement data has no id")]
    MissingId,

    #[error("{component_type} is not allowed in {zone}")]
    NotAllowed { component_type: String, zone: ZoneKey },

    #[error("cannot move {id:?} into its own subtree")]
    IntoOwnSubtree { id: String },
}

/// A component whose data should be resolved after an action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveRequest {
    /// Component id, or `"root"`
    pub id: String,
    pub trigger: ResolveTrigger,
}

#[derive(Debug, Clone)]
pub struct Reduction {
    pub state: AppState,
    pub rejected: Option<Rejection>,
    pub resolve: Vec<ResolveRequest>,
}

impl Reduction {
    pub fn applied(&self) -> bool {
        self.rejected.is_none()
    }
}

pub struct ReduceContext<'a> {
    pub config: &'a Config,
    pub ids: &'a mut dyn IdGenerator,
}

type Outcome = Result<Vec<ResolveRequest>, Rejection>;

pub fn reduce(state: &AppState, action: &Action, cx: &mut ReduceContext<'_>) -> Reduction {
    let mut next = state.clone();

    let outcome = match action {
        Action::Insert {
            component_type,
            destination_index,
            destination_zone,
            id,
        } => insert(
            &mut next,
            cx,
            component_type,
            *destination_index,
            destination_zone,
            id.as_deref(),
        ),
        Action::Duplicate {
            source_index,
            source_zone,
        } => duplicate(&mut next, cx, *source_index, source_zone),
        Action::Replace {
            destination_index,
            destination_zone,
            data,
            ui,
        } => replace(&mut next, cx.config, *destination_index, destination_zone, data, ui.as_ref()),
        Action::ReplaceRoot { root, ui, .. } => replace_root(&mut next, cx.config, root, ui.as_ref()),
        Action::Remove { index, zone } => remove(&mut next, *index, zone),
        Action::Move {
            source_index,
            source_zone,
            destination_index,
            destination_zone,
        } => move_item(
            &mut next,
            cx.config,
            *source_index,
            source_zone,
            *destination_index,
            destination_zone,
        ),
        Action::Reorder {
            source_index,
            destination_index,
            destination_zone,
        } => move_item(
            &mut next,
            cx.config,
            *source_index,
            destination_zone,
            *destination_index,
            destination_zone,
        ),
        Action::SetData { data } => {
            let patch = data.resolve(state);
            let page = Arc::make_mut(&mut next.data);
            patch.apply_to(page);
            page.hydrate(cx.config);
            Ok(Vec::new())
        }
        Action::SetUi { ui, .. } => {
            ui.resolve(state).apply_to(&mut next.ui);
            Ok(Vec::new())
        }
        Action::RegisterZone { zone } => register_zone(&mut next, zone),
    };

    match outcome {
        Ok(resolve) => {
            debug!(action = action.name(), "Action reduced");
            Reduction {
                state: next,
                rejected: None,
                resolve,
            }
        }
        Err(rejection) => {
            warn!(action = action.name(), reason = %rejection, "Action rejected");
            Reduction {
                state: state.clone(),
                rejected: Some(rejection),
                resolve: Vec::new(),
            }
        }
    }
}

fn insert(
    next: &mut AppState,
    cx: &mut ReduceContext<'_>,
    component_type: &str,
    index: usize,
    zone: &ZoneKey,
    id: Option<&str>,
) -> Outcome {
    let component = cx
        .config
        .component(component_type)
        .filter(|_| cx.config.is_known(component_type))
        .ok_or_else(|| Rejection::UnknownComponent(component_type.to_string()))?;

    check_allowed(&next.data, cx.config, zone, component_type)?;

    let mut regenerate = RegenerateIds::new(IdAllocator::new(&mut *cx.ids, &next.data));
    let id = match id {
        Some(id) if regenerate.ids.claim(id) => id.to_string(),
        Some(id) => return Err(Rejection::DuplicateId(id.to_string())),
        None => regenerate
            .ids
            .next(component_type)
            .ok_or_else(|| Rejection::NoFreeId(component_type.to_string()))?,
    };

    let mut item = ComponentData {
        component_type: component_type.to_string(),
        props: component.default_props.clone(),
        ..ComponentData::default()
    };
    item.set_id(id.clone());
    item.hydrate(cx.config);
    // Components in default slot content need ids of their own
    for children in item.slots.values_mut() {
        regenerate.visit_zone_mut(children);
    }
    regenerate.finish()?;

    let data = Arc::make_mut(&mut next.data);
    let items = data
        .ensure_zone(zone)
        .ok_or_else(|| Rejection::ZoneNotFound(zone.clone()))?;
    let at = index.min(items.len());
    items.insert(at, item);

    Ok(vec![ResolveRequest {
        id,
        trigger: ResolveTrigger::Insert,
    }])
}

fn duplicate(next: &mut AppState, cx: &mut ReduceContext<'_>, index: usize, zone: &ZoneKey) -> Outcome {
    let mut clone = item_at(&next.data, zone, index)?.clone();

    let mut regenerate = RegenerateIds::new(IdAllocator::new(&mut *cx.ids, &next.data));
    regenerate.visit_component_mut(&mut clone);

    let data = Arc::make_mut(&mut next.data);
    copy_owned_zones(data, &mut regenerate);
    regenerate.finish()?;

    let items = data
        .zone_mut(zone)
        .ok_or_else(|| Rejection::ZoneNotFound(zone.clone()))?;
    items.insert(index + 1, clone);

    next.ui.item_selector = Some(ItemSelector::new(index + 1, zone.clone()));
    Ok(Vec::new())
}

fn replace(
    next: &mut AppState,
    config: &Config,
    index: usize,
    zone: &ZoneKey,
    replacement: &ComponentData,
    ui: Option<&UiPatch>,
) -> Outcome {
    let mut item = replacement.clone();
    item.hydrate(config);
    let new_id = item.id().ok_or(Rejection::MissingId)?.to_string();

    let old_id = item_at(&next.data, zone, index)?.id().map(str::to_string);
    let renamed = old_id.as_deref() != Some(new_id.as_str());
    if renamed && next.data.find(&new_id).is_some() {
        return Err(Rejection::DuplicateId(new_id));
    }

    let data = Arc::make_mut(&mut next.data);
    if let Some(slot) = data.zone_mut(zone).and_then(|items| items.get_mut(index)) {
        *slot = item;
    }
    if let Some(old_id) = old_id.filter(|_| renamed) {
        rekey_owned_zones(data, &old_id, &new_id);
    }

    if let Some(ui) = ui {
        ui.apply_to(&mut next.ui);
    }

    Ok(vec![ResolveRequest {
        id: new_id,
        trigger: ResolveTrigger::Replace,
    }])
}

fn replace_root(next: &mut AppState, config: &Config, root: &RootData, ui: Option<&UiPatch>) -> Outcome {
    let mut root = root.clone();
    root.hydrate(config);
    Arc::make_mut(&mut next.data).root = root;

    if let Some(ui) = ui {
        ui.apply_to(&mut next.ui);
    }

    Ok(vec![ResolveRequest {
        id: ROOT_ID.to_string(),
        trigger: ResolveTrigger::Replace,
    }])
}

fn remove(next: &mut AppState, index: usize, zone: &ZoneKey) -> Outcome {
    let removed_ids: HashSet<String> = {
        let item = item_at(&next.data, zone, index)?;
        owned_ids(&next.data, item).into_iter().collect()
    };
    let selected = next.selected_id().map(str::to_string);

    let data = Arc::make_mut(&mut next.data);
    if let Some(items) = data.zone_mut(zone) {
        items.remove(index);
    }
    data.zones.retain(|key, _| {
        ZoneKey::parse(key).map_or(true, |key| !removed_ids.contains(key.parent_id()))
    });

    match selected {
        Some(id) if removed_ids.contains(&id) => next.ui.item_selector = None,
        Some(id) => reselect(next, &id),
        None => {}
    }

    Ok(Vec::new())
}

fn move_item(
    next: &mut AppState,
    config: &Config,
    source_index: usize,
    source_zone: &ZoneKey,
    destination_index: usize,
    destination_zone: &ZoneKey,
) -> Outcome {
    let (moving_id, component_type, owned) = {
        let item = item_at(&next.data, source_zone, source_index)?;
        (
            item.id().map(str::to_string),
            item.component_type.clone(),
            owned_ids(&next.data, item),
        )
    };

    if let Some(id) = &moving_id {
        if owned.iter().any(|owned| owned == destination_zone.parent_id()) {
            return Err(Rejection::IntoOwnSubtree { id: id.clone() });
        }
    }
    if next.data.zone(destination_zone).is_none()
        && destination_zone.parent_id() != ROOT_ID
        && next.data.find(destination_zone.parent_id()).is_none()
    {
        return Err(Rejection::ZoneNotFound(destination_zone.clone()));
    }
    if source_zone != destination_zone {
        check_allowed(&next.data, config, destination_zone, &component_type)?;
    }

    let selected = next.selected_id().map(str::to_string);

    let data = Arc::make_mut(&mut next.data);
    let item = data
        .zone_mut(source_zone)
        .ok_or_else(|| Rejection::ZoneNotFound(source_zone.clone()))?
        .remove(source_index);
    let items = data
        .ensure_zone(destination_zone)
        .ok_or_else(|| Rejection::ZoneNotFound(destination_zone.clone()))?;
    let at = destination_index.min(items.len());
    items.insert(at, item);

    if let Some(id) = selected {
        reselect(next, &id);
    }

    Ok(Vec::new())
}

fn register_zone(next: &mut AppState, zone: &ZoneKey) -> Outcome {
    if next.data.zone(zone).is_some() {
        return Ok(Vec::new());
    }
    Arc::make_mut(&mut next.data)
        .ensure_zone(zone)
        .map(|_| Vec::new())
        .ok_or_else(|| Rejection::ZoneNotFound(zone.clone()))
}

fn item_at<'a>(data: &'a Data, zone: &ZoneKey, index: usize) -> Result<&'a ComponentData, Rejection> {
    data.zone(zone)
        .ok_or_else(|| Rejection::ZoneNotFound(zone.clone()))?
        .get(index)
        .ok_or_else(|| Rejection::IndexOutOfBounds {
            zone: zone.clone(),
            index,
        })
}

fn check_allowed(data: &Data, config: &Config, zone: &ZoneKey, component_type: &str) -> Result<(), Rejection> {
    let parent_type = if zone.parent_id() == ROOT_ID {
        ROOT_ID
    } else {
        match data.find(zone.parent_id()) {
            Some(parent) => parent.component_type.as_str(),
            None => return Ok(()),
        }
    };

    if config.accepts(parent_type, zone.zone(), component_type) {
        Ok(())
    } else {
        Err(Rejection::NotAllowed {
            component_type: component_type.to_string(),
            zone: zone.clone(),
        })
    }
}

/// Point the selection at wherever `id` lives now
fn reselect(state: &mut AppState, id: &str) {
    state.ui.item_selector = state
        .data
        .locate(id)
        .map(|(zone, index)| ItemSelector::new(index, zone));
}

/// Ids of an item and everything below it, through slots and legacy zones
fn owned_ids(data: &Data, item: &ComponentData) -> Vec<String> {
    let mut owned = Vec::new();
    let mut pending = vec![item];
    let mut seen = HashSet::new();

    while let Some(node) = pending.pop() {
        let Some(id) = node.id() else {
            continue;
        };
        if !seen.insert(id.to_string()) {
            continue;
        }
        owned.push(id.to_string());
        pending.extend(node.slots.values().flatten());
        for (key, items) in &data.zones {
            if ZoneKey::parse(key).map_or(false, |key| key.parent_id() == id) {
                pending.extend(items.iter());
            }
        }
    }
    owned
}

fn rekey_owned_zones(data: &mut Data, old_id: &str, new_id: &str) {
    let owned: Vec<String> = data
        .zones
        .keys()
        .filter(|key| ZoneKey::parse(key).map_or(false, |key| key.parent_id() == old_id))
        .cloned()
        .collect();

    for key in owned {
        if let (Some(items), Ok(zone)) = (data.zones.remove(&key), ZoneKey::parse(&key)) {
            data.zones
                .insert(ZoneKey::new(new_id, zone.zone()).to_string(), items);
        }
    }
}

/// Give cloned components' legacy zones to the clones, re-identifying
/// their contents too.
fn copy_owned_zones(data: &mut Data, regenerate: &mut RegenerateIds<'_>) {
    let mut pending = std::mem::take(&mut regenerate.renamed);
    while let Some((old_id, new_id)) = pending.pop() {
        let owned: Vec<(String, Vec<ComponentData>)> = data
            .zones
            .iter()
            .filter_map(|(key, items)| {
                let key = ZoneKey::parse(key).ok()?;
                (key.parent_id() == old_id).then(|| (key.zone().to_string(), items.clone()))
            })
            .collect();

        for (zone, mut items) in owned {
            regenerate.visit_zone_mut(&mut items);
            pending.append(&mut regenerate.renamed);
            debug!(from = %old_id, to = %new_id, zone = %zone, "Copying legacy zone");
            data.zones
                .insert(ZoneKey::new(new_id.as_str(), zone).to_string(), items);
        }
    }
}

/// Generators restart their sequences with every session, so a loaded
/// page may already hold the ids they hand out.
const MAX_ID_ATTEMPTS: usize = 64;

/// Draws ids from a generator, skipping any the document already uses
struct IdAllocator<'a> {
    ids: &'a mut dyn IdGenerator,
    taken: HashSet<String>,
}

impl<'a> IdAllocator<'a> {
    fn new(ids: &'a mut dyn IdGenerator, data: &Data) -> Self {
        let mut collect = CollectIds::default();
        collect.visit_data(data);
        Self {
            ids,
            taken: collect.ids,
        }
    }

    /// Reserve a caller-chosen id
    fn claim(&mut self, id: &str) -> bool {
        id != ROOT_ID && self.taken.insert(id.to_string())
    }

    fn next(&mut self, component_type: &str) -> Option<String> {
        for _ in 0..MAX_ID_ATTEMPTS {
            let id = self.ids.next_id(component_type);
            if self.claim(&id) {
                return Some(id);
            }
            debug!(id = %id, "Skipping id already in use");
        }
        None
    }
}

#[derive(Default)]
struct CollectIds {
    ids: HashSet<String>,
}

impl Visitor for CollectIds {
    fn visit_component(&mut self, _zone: &ZoneKey, _index: usize, item: &ComponentData) {
        if let Some(id) = item.id() {
            self.ids.insert(id.to_string());
        }
        walk_component(self, item);
    }
}

/// Assigns fresh ids to every component it visits
struct RegenerateIds<'a> {
    ids: IdAllocator<'a>,
    renamed: Vec<(String, String)>,
    exhausted: Option<String>,
}

impl<'a> RegenerateIds<'a> {
    fn new(ids: IdAllocator<'a>) -> Self {
        Self {
            ids,
            renamed: Vec::new(),
            exhausted: None,
        }
    }

    fn finish(self) -> Result<(), Rejection> {
        match self.exhausted {
            Some(component_type) => Err(Rejection::NoFreeId(component_type)),
            None => Ok(()),
        }
    }
}

impl VisitorMut for RegenerateIds<'_> {
    fn visit_component_mut(&mut self, item: &mut ComponentData) {
        match self.ids.next(&item.component_type) {
            Some(fresh) => {
                if let Some(old) = item.id() {
                    self.renamed.push((old.to_string(), fresh.clone()));
                }
                item.set_id(fresh);
            }
            None => self.exhausted = Some(item.component_type.clone()),
        }
        walk_component_mut(self, item);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{DataPatch, Update};
    use crate::config::{ComponentConfig, Field, FieldKind};
    use crate::id_generator::SequentialIds;
    use serde_json::json;

    fn config() -> Config {
        Config::new()
            .with_component(
                "Heading",
                ComponentConfig::new().with_default_prop("text", "Heading"),
            )
            .with_component("Text", ComponentConfig::new())
            .with_component(
                "Columns",
                ComponentConfig::new()
                    .with_field("left", Field::slot())
                    .with_field(
                        "right",
                        Field::new(FieldKind::Slot {
                            allow: Some(vec!["Text".to_string()]),
                            disallow: Vec::new(),
                        }),
                    ),
            )
    }

    fn state(content: Vec<ComponentData>) -> AppState {
        AppState::new(Data {
            content,
            ..Data::default()
        })
    }

    fn abc() -> AppState {
        state(vec![
            ComponentData::new("Text", "a"),
            ComponentData::new("Text", "b"),
            ComponentData::new("Text", "c"),
        ])
    }

    fn run(state: &AppState, action: Action) -> Reduction {
        let config = config();
        let mut ids = SequentialIds::new("test");
        reduce(state, &action, &mut ReduceContext { config: &config, ids: &mut ids })
    }

    fn ids(items: &[ComponentData]) -> Vec<&str> {
        items.iter().filter_map(ComponentData::id).collect()
    }

    #[test]
    fn test_insert_uses_defaults_and_requests_resolution() {
        let reduction = run(&state(Vec::new()), Action::insert("Heading", 0, ZoneKey::root()));

        assert!(reduction.applied());
        let item = &reduction.state.data.content[0];
        assert_eq!(item.props["text"], "Heading");
        assert!(item.id().unwrap().starts_with("Heading-"));
        assert_eq!(
            reduction.resolve,
            vec![ResolveRequest {
                id: item.id().unwrap().to_string(),
                trigger: ResolveTrigger::Insert,
            }]
        );
    }

    #[test]
    fn test_generated_ids_skip_ids_already_in_the_page() {
        // A page saved by an earlier session with the same id sequence
        let taken = SequentialIds::new("test").next_id("Text");
        let initial = state(vec![ComponentData::new("Text", taken.as_str())]);

        let inserted = run(&initial, Action::insert("Text", 1, ZoneKey::root()));
        assert!(inserted.applied());
        assert_ne!(inserted.state.data.content[1].id(), Some(taken.as_str()));

        let duplicated = run(
            &initial,
            Action::Duplicate {
                source_index: 0,
                source_zone: ZoneKey::root(),
            },
        );
        assert!(duplicated.applied());
        let content = &duplicated.state.data.content;
        assert_eq!(content[0].id(), Some(taken.as_str()));
        assert_ne!(content[1].id(), Some(taken.as_str()));
    }

    #[test]
    fn test_generator_without_free_ids_is_rejected() {
        struct Constant;
        impl IdGenerator for Constant {
            fn next_id(&mut self, _component_type: &str) -> String {
                "same".to_string()
            }
        }

        let config = config();
        let initial = state(vec![ComponentData::new("Text", "same")]);
        let mut cx = ReduceContext {
            config: &config,
            ids: &mut Constant,
        };

        let inserted = reduce(&initial, &Action::insert("Text", 0, ZoneKey::root()), &mut cx);
        assert_eq!(inserted.rejected, Some(Rejection::NoFreeId("Text".to_string())));

        let duplicated = reduce(
            &initial,
            &Action::Duplicate {
                source_index: 0,
                source_zone: ZoneKey::root(),
            },
            &mut cx,
        );
        assert_eq!(duplicated.rejected, Some(Rejection::NoFreeId("Text".to_string())));
        assert_eq!(duplicated.state.data.content.len(), 1);
    }

    #[test]
    fn test_insert_clamps_destination_index() {
        let reduction = run(
            &abc(),
            Action::Insert {
                component_type: "Text".to_string(),
                destination_index: 99,
                destination_zone: ZoneKey::root(),
                id: Some("d".to_string()),
            },
        );

        assert_eq!(ids(&reduction.state.data.content), ["a", "b", "c", "d"]);
    }

    #[test]
    fn test_insert_rejections() {
        let initial = abc();

        let unknown = run(&initial, Action::insert("Mystery", 0, ZoneKey::root()));
        assert_eq!(unknown.rejected, Some(Rejection::UnknownComponent("Mystery".to_string())));
        assert!(Arc::ptr_eq(&unknown.state.data, &initial.data));

        let missing_zone = run(&initial, Action::insert("Text", 0, ZoneKey::new("ghost", "zone")));
        assert!(matches!(missing_zone.rejected, Some(Rejection::ZoneNotFound(_))));

        let duplicate = run(
            &initial,
            Action::Insert {
                component_type: "Text".to_string(),
                destination_index: 0,
                destination_zone: ZoneKey::root(),
                id: Some("a".to_string()),
            },
        );
        assert_eq!(duplicate.rejected, Some(Rejection::DuplicateId("a".to_string())));
    }

    #[test]
    fn test_insert_respects_slot_allow_list() {
        let initial = state(vec![ComponentData::new("Columns", "cols")
            .with_slot("left", Vec::new())
            .with_slot("right", Vec::new())]);

        let refused = run(&initial, Action::insert("Heading", 0, ZoneKey::new("cols", "right")));
        assert!(matches!(refused.rejected, Some(Rejection::NotAllowed { .. })));

        let accepted = run(&initial, Action::insert("Text", 0, ZoneKey::new("cols", "right")));
        assert!(accepted.applied());
        assert_eq!(accepted.state.data.find("cols").unwrap().slot("right").unwrap().len(), 1);
    }

    #[test]
    fn test_insert_creates_implicit_legacy_zone() {
        let reduction = run(&abc(), Action::insert("Text", 0, ZoneKey::new("a", "extra")));

        assert!(reduction.applied());
        assert_eq!(reduction.state.data.zones["a:extra"].len(), 1);
    }

    #[test]
    fn test_reorder_moves_to_final_position() {
        let reduction = run(
            &abc(),
            Action::Reorder {
                source_index: 0,
                destination_index: 2,
                destination_zone: ZoneKey::root(),
            },
        );

        assert_eq!(ids(&reduction.state.data.content), ["b", "c", "a"]);
    }

    #[test]
    fn test_move_between_zones() {
        let initial = state(vec![
            ComponentData::new("Text", "a"),
            ComponentData::new("Columns", "cols")
                .with_slot("left", vec![ComponentData::new("Text", "t1")])
                .with_slot("right", Vec::new()),
        ]);

        let reduction = run(
            &initial,
            Action::Move {
                source_index: 0,
                source_zone: ZoneKey::root(),
                destination_index: 1,
                destination_zone: ZoneKey::new("cols", "left"),
            },
        );

        let data = &reduction.state.data;
        assert_eq!(ids(&data.content), ["cols"]);
        assert_eq!(ids(data.find("cols").unwrap().slot("left").unwrap()), ["t1", "a"]);
    }

    #[test]
    fn test_move_into_own_subtree_is_rejected() {
        let initial = state(vec![ComponentData::new("Columns", "cols")
            .with_slot(
                "left",
                vec![ComponentData::new("Columns", "inner").with_slot("left", Vec::new())],
            )
            .with_slot("right", Vec::new())]);

        for zone in [ZoneKey::new("cols", "right"), ZoneKey::new("inner", "left")] {
            let reduction = run(
                &initial,
                Action::Move {
                    source_index: 0,
                    source_zone: ZoneKey::root(),
                    destination_index: 0,
                    destination_zone: zone,
                },
            );
            assert_eq!(
                reduction.rejected,
                Some(Rejection::IntoOwnSubtree { id: "cols".to_string() })
            );
        }
    }

    #[test]
    fn test_move_out_of_bounds_is_a_no_op() {
        let initial = abc();
        let reduction = run(
            &initial,
            Action::Move {
                source_index: 7,
                source_zone: ZoneKey::root(),
                destination_index: 0,
                destination_zone: ZoneKey::root(),
            },
        );

        assert!(matches!(reduction.rejected, Some(Rejection::IndexOutOfBounds { index: 7, .. })));
        assert_eq!(reduction.state, initial);
    }

    #[test]
    fn test_selection_follows_moved_item() {
        let mut initial = abc();
        initial.ui.item_selector = Some(ItemSelector::new(0, ZoneKey::root()));

        let reduction = run(
            &initial,
            Action::Reorder {
                source_index: 0,
                destination_index: 2,
                destination_zone: ZoneKey::root(),
            },
        );

        assert_eq!(reduction.state.ui.item_selector, Some(ItemSelector::new(2, ZoneKey::root())));
        assert_eq!(reduction.state.selected_id(), Some("a"));
    }

    #[test]
    fn test_duplicate_reids_subtree_and_selects_clone() {
        let initial = AppState::new(Data {
            content: vec![ComponentData::new("Columns", "cols")
                .with_slot("left", vec![ComponentData::new("Text", "t1")])
                .with_slot("right", Vec::new())],
            zones: [("t1:extra".to_string(), vec![ComponentData::new("Text", "t2")])]
                .into_iter()
                .collect(),
            ..Data::default()
        });

        let reduction = run(
            &initial,
            Action::Duplicate {
                source_index: 0,
                source_zone: ZoneKey::root(),
            },
        );

        let data = &reduction.state.data;
        assert_eq!(data.content.len(), 2);
        let clone = &data.content[1];
        assert_ne!(clone.id(), Some("cols"));
        let cloned_child = &clone.slot("left").unwrap()[0];
        assert_ne!(cloned_child.id(), Some("t1"));
        assert_eq!(data.zones.len(), 2);
        let cloned_zone = format!("{}:extra", cloned_child.id().unwrap());
        assert_ne!(data.zones[&cloned_zone][0].id(), Some("t2"));
        assert_eq!(reduction.state.ui.item_selector, Some(ItemSelector::new(1, ZoneKey::root())));
    }

    #[test]
    fn test_replace_rekeys_legacy_zones() {
        let initial = AppState::new(Data {
            content: vec![ComponentData::new("Text", "a")],
            zones: [("a:extra".to_string(), vec![ComponentData::new("Text", "b")])]
                .into_iter()
                .collect(),
            ..Data::default()
        });

        let reduction = run(
            &initial,
            Action::replace(0, ZoneKey::root(), ComponentData::new("Text", "renamed")),
        );

        let data = &reduction.state.data;
        assert!(data.zones.contains_key("renamed:extra"));
        assert!(!data.zones.contains_key("a:extra"));
        assert_eq!(reduction.resolve[0].id, "renamed");
        assert_eq!(reduction.resolve[0].trigger, ResolveTrigger::Replace);
    }

    #[test]
    fn test_replace_into_existing_id_is_rejected() {
        let reduction = run(&abc(), Action::replace(0, ZoneKey::root(), ComponentData::new("Text", "b")));
        assert_eq!(reduction.rejected, Some(Rejection::DuplicateId("b".to_string())));
    }

    #[test]
    fn test_replace_hydrates_slot_props() {
        let initial = state(vec![ComponentData::new("Columns", "cols")
            .with_slot("left", Vec::new())
            .with_slot("right", Vec::new())]);
        let data: ComponentData = serde_json::from_value(json!({
            "type": "Columns",
            "props": { "id": "cols", "left": [ { "type": "Text", "props": { "id": "t1" } } ] }
        }))
        .unwrap();

        let reduction = run(&initial, Action::replace(0, ZoneKey::root(), data));

        let cols = reduction.state.data.find("cols").unwrap();
        assert_eq!(ids(cols.slot("left").unwrap()), ["t1"]);
        assert!(!cols.props.contains_key("left"));
    }

    #[test]
    fn test_remove_drops_owned_zones_and_selection() {
        let mut initial = AppState::new(Data {
            content: vec![ComponentData::new("Text", "a"), ComponentData::new("Text", "b")],
            zones: [
                ("a:extra".to_string(), vec![ComponentData::new("Text", "c")]),
                ("c:extra".to_string(), vec![ComponentData::new("Text", "d")]),
            ]
            .into_iter()
            .collect(),
            ..Data::default()
        });
        initial.ui.item_selector = Some(ItemSelector::new(0, ZoneKey::new("a", "extra")));

        let reduction = run(&initial, Action::Remove { index: 0, zone: ZoneKey::root() });

        let data = &reduction.state.data;
        assert_eq!(ids(&data.content), ["b"]);
        assert!(data.zones.is_empty());
        assert_eq!(reduction.state.ui.item_selector, None);
    }

    #[test]
    fn test_remove_keeps_selection_on_surviving_item() {
        let mut initial = abc();
        initial.ui.item_selector = Some(ItemSelector::new(2, ZoneKey::root()));

        let reduction = run(&initial, Action::Remove { index: 0, zone: ZoneKey::root() });

        assert_eq!(reduction.state.ui.item_selector, Some(ItemSelector::new(1, ZoneKey::root())));
    }

    #[test]
    fn test_set_data_and_set_ui() {
        let initial = abc();

        let reduction = run(
            &initial,
            Action::SetData {
                data: Update::with(|state: &AppState| DataPatch {
                    content: Some(state.data.content[1..].to_vec()),
                    ..DataPatch::default()
                }),
            },
        );
        assert_eq!(ids(&reduction.state.data.content), ["b", "c"]);

        let reduction = run(
            &initial,
            Action::set_ui(UiPatch {
                left_side_bar_visible: Some(false),
                ..UiPatch::default()
            }),
        );
        assert!(!reduction.state.ui.left_side_bar_visible);
        assert!(Arc::ptr_eq(&reduction.state.data, &initial.data));
    }

    #[test]
    fn test_register_zone() {
        let reduction = run(&abc(), Action::RegisterZone { zone: ZoneKey::new("b", "extra") });
        assert!(reduction.state.data.zones["b:extra"].is_empty());

        let rejected = run(&abc(), Action::RegisterZone { zone: ZoneKey::new("ghost", "extra") });
        assert!(!rejected.applied());
    }

    #[test]
    fn test_input_state_is_never_modified() {
        let initial = abc();
        let reduction = run(&initial, Action::Remove { index: 0, zone: ZoneKey::root() });

        assert_eq!(ids(&initial.data.content), ["a", "b", "c"]);
        assert_eq!(ids(&reduction.state.data.content), ["b", "c"]);
    }
}
