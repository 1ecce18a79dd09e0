//! # Data Resolution
//!
//! Components may declare a `resolve_data` hook that derives props (and
//! read-only flags) from the props the user entered, possibly
//! asynchronously. [`DataResolver`] runs those hooks:
//!
//! - an unchanged input returns the cached output without calling the hook
//! - returned props are shallow-merged over the input props; returned
//!   read-only flags replace the old ones
//! - slot children are resolved recursively, parent first
//! - every call, cache hits included, claims a new generation for its
//!   component when it is made, so when resolutions overlap only the
//!   newest one's output counts
//! - [`rebase_resolved`] carries a finished resolution over to the
//!   component as it is at commit time
//! - a per-component loading counter is held for the duration of each
//!   call and released on every exit path
//!
//! Committing resolved data back into the document is the store's job.

use crate::config::Config;
use crate::errors::{ResolveError, ResolverError};
use futures::future::{self, BoxFuture};
use futures::FutureExt;
use parking_lot::Mutex;
use puck_common::{ComponentData, Props, ReadOnly, ROOT_ID};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

/// Which props differ from the last resolved input
pub type Changed = BTreeMap<String, bool>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResolveTrigger {
    Insert,
    Replace,
    Load,
    /// Resolve even if the input is unchanged
    Force,
}

#[derive(Debug, Clone)]
pub struct ResolveDataParams {
    pub changed: Changed,
    /// The input of the previous resolution
    pub last_data: Option<ComponentData>,
    pub trigger: ResolveTrigger,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolveDataOutput {
    pub props: Option<Props>,
    pub read_only: Option<ReadOnly>,
}

impl ResolveDataOutput {
    pub fn props(props: Props) -> Self {
        Self {
            props: Some(props),
            read_only: None,
        }
    }

    pub fn with_read_only(mut self, field: impl Into<String>, read_only: bool) -> Self {
        self.read_only
            .get_or_insert_with(ReadOnly::new)
            .insert(field.into(), read_only);
        self
    }
}

pub trait ResolveData: Send + Sync {
    fn resolve(
        &self,
        data: ComponentData,
        params: ResolveDataParams,
    ) -> BoxFuture<'static, Result<ResolveDataOutput, ResolverError>>;
}

/// Adapts a synchronous closure into a [`ResolveData`] hook
pub struct SyncResolveData<F>(F);

pub fn sync_resolve_data<F>(hook: F) -> SyncResolveData<F>
where
    F: Fn(&ComponentData, &ResolveDataParams) -> ResolveDataOutput + Send + Sync,
{
    SyncResolveData(hook)
}

impl<F> ResolveData for SyncResolveData<F>
where
    F: Fn(&ComponentData, &ResolveDataParams) -> ResolveDataOutput + Send + Sync,
{
    fn resolve(
        &self,
        data: ComponentData,
        params: ResolveDataParams,
    ) -> BoxFuture<'static, Result<ResolveDataOutput, ResolverError>> {
        future::ready(Ok((self.0)(&data, &params))).boxed()
    }
}

/// Adapts an async closure into a [`ResolveData`] hook
pub struct AsyncResolveData<F>(F);

pub fn async_resolve_data<F, Fut>(hook: F) -> AsyncResolveData<F>
where
    F: Fn(ComponentData, ResolveDataParams) -> Fut + Send + Sync,
    Fut: Future<Output = Result<ResolveDataOutput, ResolverError>> + Send + 'static,
{
    AsyncResolveData(hook)
}

impl<F, Fut> ResolveData for AsyncResolveData<F>
where
    F: Fn(ComponentData, ResolveDataParams) -> Fut + Send + Sync,
    Fut: Future<Output = Result<ResolveDataOutput, ResolverError>> + Send + 'static,
{
    fn resolve(
        &self,
        data: ComponentData,
        params: ResolveDataParams,
    ) -> BoxFuture<'static, Result<ResolveDataOutput, ResolverError>> {
        (self.0)(data, params).boxed()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedNode {
    pub node: ComponentData,
    /// Whether `node` differs from the input
    pub did_change: bool,
}

impl ResolvedNode {
    fn unchanged(node: ComponentData) -> Self {
        Self {
            node,
            did_change: false,
        }
    }
}

/// Called with a component id and its new loading count
pub type LoadingListener = Arc<dyn Fn(&str, u32) + Send + Sync>;

#[derive(Debug, Default)]
struct ItemState {
    generation: u64,
    loading: u32,
    last_input: Option<ComponentData>,
    last_output: Option<ComponentData>,
}

#[derive(Default)]
pub struct DataResolver {
    items: Mutex<HashMap<String, ItemState>>,
    listener: Option<LoadingListener>,
}

impl DataResolver {
    pub fn new(listener: Option<LoadingListener>) -> Self {
        Self {
            items: Mutex::new(HashMap::new()),
            listener,
        }
    }

    pub fn loading_count(&self, id: &str) -> u32 {
        self.items.lock().get(id).map_or(0, |state| state.loading)
    }

    /// Ids with at least one resolution running
    pub fn loading_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .items
            .lock()
            .iter()
            .filter(|(_, state)| state.loading > 0)
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Forget components that are no longer in the document. Components
    /// with a resolution running are kept until it finishes.
    pub fn retain(&self, live: impl Fn(&str) -> bool) {
        self.items
            .lock()
            .retain(|id, state| state.loading > 0 || live(id));
    }

    /// Resolve a component and its slot children.
    ///
    /// The generation is claimed and the loading counter raised before this
    /// returns, so the order of calls decides which result is newest.
    pub fn resolve(
        self: &Arc<Self>,
        config: Arc<Config>,
        item: ComponentData,
        trigger: ResolveTrigger,
    ) -> BoxFuture<'static, Result<ResolvedNode, ResolveError>> {
        let Some(hook) = config
            .component(&item.component_type)
            .and_then(|component| component.resolve_data.clone())
        else {
            return self.resolve_children(config, item, trigger);
        };

        let id = if item.component_type == ROOT_ID {
            ROOT_ID.to_string()
        } else {
            match item.id() {
                Some(id) => id.to_string(),
                None => {
                    warn!(component_type = %item.component_type, "Cannot resolve a component without an id");
                    return future::ready(Ok(ResolvedNode::unchanged(item))).boxed();
                }
            }
        };

        let (generation, params, loading) = {
            let mut items = self.items.lock();
            let state = items.entry(id.clone()).or_default();

            // Cache hits count as the newest resolution too, so anything
            // still running for this component lands stale.
            state.generation += 1;

            if trigger != ResolveTrigger::Force {
                if let (Some(input), Some(output)) = (&state.last_input, &state.last_output) {
                    if *input == item {
                        let did_change = *output != item;
                        return future::ready(Ok(ResolvedNode {
                            node: output.clone(),
                            did_change,
                        }))
                        .boxed();
                    }
                }
            }

            state.loading += 1;
            let params = ResolveDataParams {
                changed: changed_props(state.last_input.as_ref(), &item),
                last_data: state.last_input.clone(),
                trigger,
            };
            (state.generation, params, state.loading)
        };
        self.notify(&id, loading);
        let guard = LoadingGuard {
            resolver: Arc::clone(self),
            id: id.clone(),
        };

        let pending = hook.resolve(item.clone(), params);
        let resolver = Arc::clone(self);
        async move {
            let _guard = guard;
            let output = pending.await.map_err(|source| ResolveError::Resolver {
                component_type: item.component_type.clone(),
                id: id.clone(),
                source,
            })?;

            let mut node = item.clone();
            if let Some(props) = output.props {
                for (name, value) in props {
                    node.props.insert(name, value);
                }
            }
            if let Some(read_only) = output.read_only.filter(|flags| !flags.is_empty()) {
                node.read_only = Some(read_only);
            }
            if let Some(original) = item.id() {
                node.set_id(original);
            } else {
                node.props.remove("id");
            }
            node.hydrate(config.as_ref());

            let node = resolver.resolve_slots(config, node, trigger).await;

            {
                let mut items = resolver.items.lock();
                let state = items.entry(id.clone()).or_default();
                if state.generation != generation {
                    debug!(id = %id, generation, "Discarding stale resolution");
                    return Ok(ResolvedNode::unchanged(item));
                }
                state.last_input = Some(item.clone());
                state.last_output = Some(node.clone());
            }

            let did_change = node != item;
            debug!(id = %id, did_change, "Resolved component data");
            Ok(ResolvedNode { node, did_change })
        }
        .boxed()
    }

    /// Components without a hook still get their children resolved
    fn resolve_children(
        self: &Arc<Self>,
        config: Arc<Config>,
        item: ComponentData,
        trigger: ResolveTrigger,
    ) -> BoxFuture<'static, Result<ResolvedNode, ResolveError>> {
        if item.slots.values().all(Vec::is_empty) {
            return future::ready(Ok(ResolvedNode::unchanged(item))).boxed();
        }
        let resolver = Arc::clone(self);
        async move {
            let node = resolver.resolve_slots(config, item.clone(), trigger).await;
            let did_change = node != item;
            Ok(ResolvedNode { node, did_change })
        }
        .boxed()
    }

    fn resolve_slots(
        self: &Arc<Self>,
        config: Arc<Config>,
        mut node: ComponentData,
        trigger: ResolveTrigger,
    ) -> BoxFuture<'static, ComponentData> {
        let resolver = Arc::clone(self);
        async move {
            for children in node.slots.values_mut() {
                for child in children.iter_mut() {
                    let pending = resolver.resolve(Arc::clone(&config), child.clone(), trigger);
                    match pending.await {
                        Ok(resolved) => *child = resolved.node,
                        Err(err) => warn!(error = %err, "Keeping unresolved slot child"),
                    }
                }
            }
            node
        }
        .boxed()
    }

    fn notify(&self, id: &str, loading: u32) {
        if let Some(listener) = &self.listener {
            listener(id, loading);
        }
    }
}

/// Releases one loading count when dropped
struct LoadingGuard {
    resolver: Arc<DataResolver>,
    id: String,
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        let loading = {
            let mut items = self.resolver.items.lock();
            match items.get_mut(&self.id) {
                Some(state) => {
                    state.loading = state.loading.saturating_sub(1);
                    state.loading
                }
                None => 0,
            }
        };
        self.resolver.notify(&self.id, loading);
    }
}

/// Per-prop change flags between two versions of a component.
/// Without a previous version every prop counts as changed.
pub fn changed_props(previous: Option<&ComponentData>, next: &ComponentData) -> Changed {
    let next_props = next.merged_props();
    let Some(previous) = previous else {
        return next_props.keys().map(|name| (name.clone(), true)).collect();
    };
    let previous_props = previous.merged_props();

    next_props
        .keys()
        .chain(previous_props.keys())
        .map(|name| (name.clone(), next_props.get(name) != previous_props.get(name)))
        .collect()
}

/// Carry a finished resolution over to `live`, the component as it is at
/// commit time. `base` is the component as it was when the resolution
/// started.
///
/// If nothing changed in between, `resolved` applies as is. Otherwise the
/// resolved props and read-only flags apply only while `live` still has
/// the props of `base`, since they were derived from those. Slot children
/// always come from `live`; children resolved along with the parent are
/// carried over by id the same way.
pub fn rebase_resolved(live: &ComponentData, base: &ComponentData, resolved: &ComponentData) -> ComponentData {
    if live == base {
        return resolved.clone();
    }

    let mut node = live.clone();
    if live.component_type == base.component_type && live.props == base.props && live.read_only == base.read_only {
        node.props = resolved.props.clone();
        node.read_only = resolved.read_only.clone();
    } else {
        debug!(id = ?live.id(), "Component edited during resolution; keeping its props");
    }

    for (name, children) in node.slots.iter_mut() {
        let (Some(before), Some(after)) = (base.slots.get(name), resolved.slots.get(name)) else {
            continue;
        };
        for child in children.iter_mut() {
            let Some(id) = child.id().map(str::to_string) else {
                continue;
            };
            let by_id = |items: &[ComponentData]| items.iter().find(|item| item.id() == Some(id.as_str())).cloned();
            if let (Some(before), Some(after)) = (by_id(before), by_id(after)) {
                *child = rebase_resolved(child, &before, &after);
            }
        }
    }

    node
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ComponentConfig, Field};
    use serde_json::{json, Value};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::oneshot;

    type Gates = Arc<Mutex<VecDeque<oneshot::Receiver<()>>>>;

    fn slug_config(calls: Arc<AtomicUsize>) -> Arc<Config> {
        Arc::new(
            Config::new()
                .with_component(
                    "Heading",
                    ComponentConfig::new().with_resolve_data(sync_resolve_data(move |data, _params| {
                        calls.fetch_add(1, Ordering::SeqCst);
                        let title = data.props.get("title").and_then(Value::as_str).unwrap_or_default();
                        let mut props = Props::new();
                        props.insert("anchor".to_string(), json!(title.to_lowercase().replace(' ', "-")));
                        ResolveDataOutput::props(props).with_read_only("anchor", true)
                    })),
                )
                .with_component("Section", ComponentConfig::new().with_field("body", Field::slot())),
        )
    }

    /// Each resolution waits on the next queued gate, if there is one
    fn gated_config(gates: Gates) -> Arc<Config> {
        Arc::new(Config::new().with_component(
            "Heading",
            ComponentConfig::new().with_resolve_data(async_resolve_data(move |data: ComponentData, _params| {
                let gate = gates.lock().pop_front();
                async move {
                    if let Some(gate) = gate {
                        let _ = gate.await;
                    }
                    let title = data.props.get("title").and_then(Value::as_str).unwrap_or_default();
                    let mut props = Props::new();
                    props.insert("anchor".to_string(), json!(title.to_lowercase()));
                    Ok::<_, ResolverError>(ResolveDataOutput::props(props))
                }
            })),
        ))
    }

    #[tokio::test]
    async fn test_resolve_merges_props_and_read_only() {
        let resolver = Arc::new(DataResolver::default());
        let config = slug_config(Arc::new(AtomicUsize::new(0)));
        let item = ComponentData::new("Heading", "h1").with_prop("title", "Hello World");

        let resolved = resolver.resolve(config, item, ResolveTrigger::Insert).await.unwrap();

        assert!(resolved.did_change);
        assert_eq!(resolved.node.props["anchor"], "hello-world");
        assert_eq!(resolved.node.props["title"], "Hello World");
        assert_eq!(resolved.node.read_only.unwrap()["anchor"], true);
    }

    #[tokio::test]
    async fn test_unchanged_input_uses_cache() {
        let calls = Arc::new(AtomicUsize::new(0));
        let resolver = Arc::new(DataResolver::default());
        let config = slug_config(calls.clone());
        let item = ComponentData::new("Heading", "h1").with_prop("title", "One");

        let first = resolver.resolve(config.clone(), item.clone(), ResolveTrigger::Insert).await.unwrap();
        let second = resolver.resolve(config.clone(), item.clone(), ResolveTrigger::Replace).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        resolver.resolve(config, item, ResolveTrigger::Force).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_resolving_resolved_output_is_idempotent() {
        let resolver = Arc::new(DataResolver::default());
        let config = slug_config(Arc::new(AtomicUsize::new(0)));
        let item = ComponentData::new("Heading", "h1").with_prop("title", "One");

        let first = resolver.resolve(config.clone(), item, ResolveTrigger::Insert).await.unwrap();
        let again = resolver.resolve(config, first.node.clone(), ResolveTrigger::Replace).await.unwrap();

        assert!(!again.did_change);
        assert_eq!(again.node, first.node);
    }

    #[tokio::test]
    async fn test_slot_children_are_resolved() {
        let resolver = Arc::new(DataResolver::default());
        let config = slug_config(Arc::new(AtomicUsize::new(0)));
        let section = ComponentData::new("Section", "s1").with_slot(
            "body",
            vec![ComponentData::new("Heading", "h1").with_prop("title", "Nested Title")],
        );

        let resolved = resolver.resolve(config, section, ResolveTrigger::Load).await.unwrap();

        assert!(resolved.did_change);
        assert_eq!(resolved.node.slot("body").unwrap()[0].props["anchor"], "nested-title");
    }

    #[tokio::test]
    async fn test_failure_releases_loading() {
        let config = Arc::new(Config::new().with_component(
            "Broken",
            ComponentConfig::new().with_resolve_data(async_resolve_data(|_data, _params| async {
                Err::<ResolveDataOutput, _>(ResolverError::new("boom"))
            })),
        ));
        let resolver = Arc::new(DataResolver::default());

        let pending = resolver.resolve(config, ComponentData::new("Broken", "b1"), ResolveTrigger::Insert);
        assert_eq!(resolver.loading_count("b1"), 1);

        let err = pending.await.unwrap_err();
        assert!(err.to_string().contains("boom"));
        assert_eq!(resolver.loading_count("b1"), 0);
        assert!(resolver.loading_ids().is_empty());
    }

    #[tokio::test]
    async fn test_dropped_resolution_releases_loading() {
        let resolver = Arc::new(DataResolver::default());
        let config = slug_config(Arc::new(AtomicUsize::new(0)));

        let pending = resolver.resolve(config, ComponentData::new("Heading", "h1"), ResolveTrigger::Insert);
        assert_eq!(resolver.loading_ids(), vec!["h1".to_string()]);
        drop(pending);

        assert_eq!(resolver.loading_count("h1"), 0);
    }

    #[tokio::test]
    async fn test_cache_hit_supersedes_running_resolution() {
        let gates = Gates::default();
        let config = gated_config(gates.clone());
        let resolver = Arc::new(DataResolver::default());
        let one = ComponentData::new("Heading", "h1").with_prop("title", "One");

        resolver.resolve(config.clone(), one.clone(), ResolveTrigger::Insert).await.unwrap();

        let (release, gate) = oneshot::channel();
        gates.lock().push_back(gate);
        let running = resolver.resolve(config.clone(), one.clone().with_prop("title", "Two"), ResolveTrigger::Replace);
        let cached = resolver.resolve(config, one, ResolveTrigger::Replace).await.unwrap();
        assert_eq!(cached.node.props["anchor"], "one");

        release.send(()).unwrap();
        let late = running.await.unwrap();

        assert!(!late.did_change);
        assert_eq!(late.node.props["title"], "Two");
        assert!(late.node.props.get("anchor").is_none());
        assert_eq!(resolver.loading_count("h1"), 0);
    }

    #[test]
    fn test_rebase_applies_resolution_to_untouched_component() {
        let base = ComponentData::new("Heading", "h1").with_prop("title", "One");
        let resolved = base.clone().with_prop("anchor", "one");

        assert_eq!(rebase_resolved(&base, &base, &resolved), resolved);
    }

    #[test]
    fn test_rebase_keeps_props_edited_during_resolution() {
        let base = ComponentData::new("Heading", "h1").with_prop("title", "One");
        let resolved = base.clone().with_prop("anchor", "one");
        let live = base.clone().with_prop("title", "Three");

        assert_eq!(rebase_resolved(&live, &base, &resolved), live);
    }

    #[test]
    fn test_rebase_keeps_children_inserted_during_resolution() {
        let base = ComponentData::new("Section", "s1")
            .with_prop("title", "Intro")
            .with_slot("body", vec![ComponentData::new("Heading", "h1").with_prop("title", "A")]);
        let resolved = ComponentData::new("Section", "s1")
            .with_prop("title", "Intro")
            .with_prop("anchor", "intro")
            .with_slot(
                "body",
                vec![ComponentData::new("Heading", "h1").with_prop("title", "A").with_prop("anchor", "a")],
            );
        let live = ComponentData::new("Section", "s1").with_prop("title", "Intro").with_slot(
            "body",
            vec![
                ComponentData::new("Heading", "h2"),
                ComponentData::new("Heading", "h1").with_prop("title", "A"),
            ],
        );

        let rebased = rebase_resolved(&live, &base, &resolved);

        assert_eq!(rebased.props["anchor"], "intro");
        let body = rebased.slot("body").unwrap();
        assert_eq!(body.len(), 2);
        assert_eq!(body[0], ComponentData::new("Heading", "h2"));
        assert_eq!(body[1].props["anchor"], "a");
    }

    #[test]
    fn test_changed_props() {
        let before = ComponentData::new("Heading", "h1").with_prop("title", "a").with_prop("level", 1);
        let after = before.clone().with_prop("title", "b");

        let changed = changed_props(Some(&before), &after);
        assert_eq!(changed["title"], true);
        assert_eq!(changed["level"], false);
        assert_eq!(changed["id"], false);

        let fresh = changed_props(None, &after);
        assert!(fresh.values().all(|changed| *changed));
    }
}
