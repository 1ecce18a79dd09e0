//! # Editor Store
//!
//! The single owner of editor state. Hosts dispatch actions and read
//! immutable snapshots; everything else (the document index, history,
//! data resolution, permissions) hangs off the store.
//!
//! ## Flow
//!
//! ```text
//! dispatch(action)
//!   → reduce                       (pure, copy-on-write)
//!   → rebuild index                (when data changed)
//!   → record history               (push, coalesce, or amend)
//!   → publish snapshot             (watch channel, revision + 1)
//!   → on_action(action, next, prev)
//!   → resolve inserted/replaced components in the background
//! ```
//!
//! Snapshots are derived completely before they are published, so a
//! subscriber never sees data and index from different revisions.
//!
//! Resolved data is committed as a `replace` located by id at commit time,
//! rebased onto any edits made to the component while it was resolving.
//! Commits amend the present history entry and never trigger another
//! resolution.

use crate::actions::Action;
use crate::config::Config;
use crate::errors::EditorError;
use crate::history::{Clock, EditKey, History, HistoryEntry, SystemClock, DEFAULT_MAX_ENTRIES, DEFAULT_WINDOW};
use crate::id_generator::{IdGenerator, UuidGenerator};
use crate::index::{DocumentIndex, IndexDiagnostic};
use crate::permissions::{Listener, Permissions, PermissionsResolver, RefreshQuery};
use crate::publish::PublishSink;
use crate::reducer::{reduce, ReduceContext, ResolveRequest};
use crate::resolver::{
    changed_props, rebase_resolved, DataResolver, LoadingListener, ResolveTrigger, ResolvedNode,
};
use crate::state::{AppState, ItemSelector, UiState};
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use puck_common::{ComponentData, Data, RootData, ROOT_ID};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Called after every applied action with `(action, next, previous)`
pub type ActionObserver = Arc<dyn Fn(&Action, &AppState, &AppState) + Send + Sync>;

pub struct StoreOptions {
    pub history_window: Duration,
    pub max_history: usize,
    /// Resolve inserted and replaced components automatically
    pub auto_resolve: bool,
    pub clock: Arc<dyn Clock>,
    pub ids: Box<dyn IdGenerator>,
    /// Runtime background work is spawned on; `None` disables it
    pub runtime: Option<Handle>,
    pub ui: UiState,
    pub publish_sink: Option<Arc<dyn PublishSink>>,
    pub on_action: Option<ActionObserver>,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            history_window: DEFAULT_WINDOW,
            max_history: DEFAULT_MAX_ENTRIES,
            auto_resolve: true,
            clock: Arc::new(SystemClock::default()),
            ids: Box::new(UuidGenerator),
            runtime: Handle::try_current().ok(),
            ui: UiState::default(),
            publish_sink: None,
            on_action: None,
        }
    }
}

impl StoreOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_ids(mut self, ids: impl IdGenerator + 'static) -> Self {
        self.ids = Box::new(ids);
        self
    }

    pub fn with_history_window(mut self, window: Duration) -> Self {
        self.history_window = window;
        self
    }

    pub fn with_max_history(mut self, max_history: usize) -> Self {
        self.max_history = max_history;
        self
    }

    pub fn with_runtime(mut self, runtime: Option<Handle>) -> Self {
        self.runtime = runtime;
        self
    }

    pub fn with_ui(mut self, ui: UiState) -> Self {
        self.ui = ui;
        self
    }

    pub fn with_publish_sink(mut self, sink: Arc<dyn PublishSink>) -> Self {
        self.publish_sink = Some(sink);
        self
    }

    pub fn on_action(mut self, observer: impl Fn(&Action, &AppState, &AppState) + Send + Sync + 'static) -> Self {
        self.on_action = Some(Arc::new(observer));
        self
    }

    pub fn without_auto_resolve(mut self) -> Self {
        self.auto_resolve = false;
        self
    }
}

/// Everything a host renders from, as of one revision
#[derive(Debug, Clone)]
pub struct StoreSnapshot {
    pub state: AppState,
    pub index: Arc<DocumentIndex>,
    /// Bumped by every applied action and history step
    pub revision: u64,
    /// Bumped whenever resolved permissions may have changed
    pub permissions_revision: u64,
    /// Running data resolutions per component id
    pub loading: BTreeMap<String, u32>,
}

/// What [`EditorStore::get_permissions`] asks about
#[derive(Debug, Clone, Copy)]
pub enum PermissionsTarget<'a> {
    Item(&'a ComponentData),
    Id(&'a str),
    /// Static permissions of a component type; hooks are not consulted
    Type(&'a str),
    Root,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Host,
    Resolver,
}

enum Recording {
    Skip,
    Push,
    Debounced(EditKey),
}

struct StoreCore {
    state: AppState,
    index: Arc<DocumentIndex>,
    history: History,
    ids: Box<dyn IdGenerator>,
    revision: u64,
}

struct StoreInner {
    config: Arc<Config>,
    core: Mutex<StoreCore>,
    snapshots: watch::Sender<Arc<StoreSnapshot>>,
    data_resolver: Arc<DataResolver>,
    permissions: Arc<PermissionsResolver>,
    tasks: Mutex<JoinSet<()>>,
    runtime: Option<Handle>,
    auto_resolve: bool,
    clock: Arc<dyn Clock>,
    publish_sink: Option<Arc<dyn PublishSink>>,
    on_action: Option<ActionObserver>,
    closed: AtomicBool,
}

#[derive(Clone)]
pub struct EditorStore {
    inner: Arc<StoreInner>,
}

impl EditorStore {
    pub fn new(config: impl Into<Arc<Config>>, data: Data, options: StoreOptions) -> Self {
        let config = config.into();
        let mut data = data;
        data.hydrate(config.as_ref());

        let state = AppState {
            data: Arc::new(data),
            ui: options.ui,
        };
        let index = DocumentIndex::build(&state.data, &config);
        report_new_diagnostics(&[], &index.diagnostics);
        let index = Arc::new(index);

        let history = History::with_options(
            HistoryEntry::capture(&state),
            options.history_window,
            options.max_history,
        );
        let (snapshots, _) = watch::channel(Arc::new(StoreSnapshot {
            state: state.clone(),
            index: Arc::clone(&index),
            revision: 0,
            permissions_revision: 0,
            loading: BTreeMap::new(),
        }));

        info!(components = index.len(), "Editor store ready");

        let inner = Arc::new_cyclic(|weak: &Weak<StoreInner>| {
            let on_permissions: Listener = {
                let weak = weak.clone();
                Arc::new(move || {
                    if let Some(inner) = weak.upgrade() {
                        inner.permissions_changed();
                    }
                })
            };
            let on_loading: LoadingListener = {
                let weak = weak.clone();
                Arc::new(move |id: &str, count: u32| {
                    if let Some(inner) = weak.upgrade() {
                        inner.loading_changed(id, count);
                    }
                })
            };

            StoreInner {
                config,
                core: Mutex::new(StoreCore {
                    state,
                    index,
                    history,
                    ids: options.ids,
                    revision: 0,
                }),
                snapshots,
                data_resolver: Arc::new(DataResolver::new(Some(on_loading))),
                permissions: Arc::new(PermissionsResolver::new(Some(on_permissions))),
                tasks: Mutex::new(JoinSet::new()),
                runtime: options.runtime,
                auto_resolve: options.auto_resolve,
                clock: options.clock,
                publish_sink: options.publish_sink,
                on_action: options.on_action,
                closed: AtomicBool::new(false),
            }
        });

        Self { inner }
    }

    pub fn config(&self) -> &Arc<Config> {
        &self.inner.config
    }

    /// Apply an action. Returns false if it was rejected or the store is
    /// closed; the state is unchanged in both cases.
    pub fn dispatch(&self, action: Action) -> bool {
        self.inner.dispatch_with(Origin::Host, move |_| Some(action))
    }

    pub fn snapshot(&self) -> Arc<StoreSnapshot> {
        let current = self.inner.snapshots.borrow();
        Arc::clone(&*current)
    }

    pub fn state(&self) -> AppState {
        self.snapshot().state.clone()
    }

    /// Receives every published snapshot
    pub fn subscribe(&self) -> watch::Receiver<Arc<StoreSnapshot>> {
        self.inner.snapshots.subscribe()
    }

    pub fn get_item_by_id(&self, id: &str) -> Option<ComponentData> {
        self.snapshot().index.get(id).map(|entry| entry.data.clone())
    }

    pub fn get_selector_for_id(&self, id: &str) -> Option<ItemSelector> {
        self.snapshot()
            .index
            .get(id)
            .map(|entry| ItemSelector::new(entry.index, entry.zone.clone()))
    }

    pub fn selected_item(&self) -> Option<ComponentData> {
        let snapshot = self.snapshot();
        let selector = snapshot.state.ui.item_selector.as_ref()?;
        snapshot
            .state
            .data
            .zone(&selector.zone)?
            .get(selector.index)
            .cloned()
    }

    pub fn loading_count(&self, id: &str) -> u32 {
        self.inner.data_resolver.loading_count(id)
    }

    pub fn back(&self) -> bool {
        self.inner.travel(History::back)
    }

    pub fn forward(&self) -> bool {
        self.inner.travel(History::forward)
    }

    pub fn has_past(&self) -> bool {
        self.inner.core.lock().history.has_past()
    }

    pub fn has_future(&self) -> bool {
        self.inner.core.lock().history.has_future()
    }

    pub fn get_permissions(&self, target: PermissionsTarget<'_>) -> Permissions {
        let config = &self.inner.config;
        match target {
            PermissionsTarget::Item(item) => self.inner.permissions_for(item),
            PermissionsTarget::Id(id) => match self.get_item_by_id(id) {
                Some(item) => self.inner.permissions_for(&item),
                None => config.global_permissions(),
            },
            PermissionsTarget::Type(component_type) => PermissionsResolver::base(
                config,
                &ComponentData {
                    component_type: component_type.to_string(),
                    ..ComponentData::default()
                },
            ),
            PermissionsTarget::Root => {
                let root = self.snapshot().state.data.root.to_component();
                self.inner.permissions_for(&root)
            }
        }
    }

    /// Throw away cached permissions and resolve them again
    pub fn refresh_permissions(&self, query: RefreshQuery) {
        self.inner.permissions.invalidate(&query);

        let snapshot = self.snapshot();
        let root = || snapshot.state.data.root.to_component();
        let targets: Vec<ComponentData> = match &query {
            RefreshQuery::Item(id) if id == ROOT_ID => vec![root()],
            RefreshQuery::Item(id) => snapshot.index.get(id).map(|entry| entry.data.clone()).into_iter().collect(),
            RefreshQuery::Type(component_type) => snapshot
                .index
                .ids_of_type(component_type)
                .iter()
                .filter_map(|id| snapshot.index.get(id))
                .map(|entry| entry.data.clone())
                .collect(),
            RefreshQuery::Root => vec![root()],
            RefreshQuery::All => std::iter::once(root())
                .chain(snapshot.index.nodes.values().map(|entry| entry.data.clone()))
                .collect(),
        };

        debug!(targets = targets.len(), "Refreshing permissions");
        for item in &targets {
            self.inner.permissions_for(item);
        }
        self.inner.permissions_changed();
    }

    /// Resolve one component and commit the result if it changed. The
    /// resolution is ordered against others for the same component when
    /// this is called, not when the future is first polled.
    pub fn resolve_component_data(
        &self,
        item: ComponentData,
        trigger: ResolveTrigger,
    ) -> BoxFuture<'static, Result<ResolvedNode, EditorError>> {
        self.inner.resolve_and_commit(item, trigger)
    }

    /// Resolve the root and every component; returns how many changed
    pub async fn resolve_all_data(&self, trigger: ResolveTrigger) -> usize {
        let snapshot = self.snapshot();
        let data = &snapshot.state.data;

        // Slot children resolve with their parents
        let mut items = vec![data.root.to_component()];
        items.extend(data.content.iter().cloned());
        items.extend(data.zones.values().flatten().cloned());

        let pending: Vec<_> = items
            .into_iter()
            .map(|item| self.inner.resolve_and_commit(item, trigger))
            .collect();

        let mut changed = 0;
        for result in futures::future::join_all(pending).await {
            match result {
                Ok(resolved) if resolved.did_change => changed += 1,
                Ok(_) => {}
                Err(err) => warn!(error = %err, "Resolution failed"),
            }
        }

        info!(changed, ?trigger, "Resolved all component data");
        changed
    }

    /// Hand the current page to the publish sink
    pub async fn publish(&self) -> Result<(), EditorError> {
        if self.is_closed() {
            return Err(EditorError::StoreClosed);
        }
        let sink = self
            .inner
            .publish_sink
            .clone()
            .ok_or(EditorError::NoPublishSink)?;

        let data = self.snapshot().state.data.as_ref().clone();
        sink.publish(data).await?;
        Ok(())
    }

    /// Stop accepting actions and cancel background work
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.tasks.lock().abort_all();
        info!("Editor store closed");
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }
}

impl StoreInner {
    fn dispatch_with(
        self: &Arc<Self>,
        origin: Origin,
        build: impl FnOnce(&AppState) -> Option<Action>,
    ) -> bool {
        if self.closed.load(Ordering::Acquire) {
            warn!("Ignoring action on a closed store");
            return false;
        }

        let (action, previous, next, requests, index) = {
            let mut guard = self.core.lock();
            let core = &mut *guard;

            let Some(action) = build(&core.state) else {
                return false;
            };
            let reduction = reduce(
                &core.state,
                &action,
                &mut ReduceContext {
                    config: self.config.as_ref(),
                    ids: core.ids.as_mut(),
                },
            );
            if !reduction.applied() {
                return false;
            }

            let previous = std::mem::replace(&mut core.state, reduction.state);
            let data_changed = !Arc::ptr_eq(&previous.data, &core.state.data);
            if data_changed {
                let index = DocumentIndex::build(&core.state.data, &self.config);
                report_new_diagnostics(&core.index.diagnostics, &index.diagnostics);
                core.index = Arc::new(index);
            }

            match origin {
                Origin::Resolver => core.history.amend(HistoryEntry::capture(&core.state)),
                Origin::Host => match recording(&action, &previous, &core.state) {
                    Recording::Skip => {}
                    Recording::Push => {
                        core.history
                            .record(HistoryEntry::capture(&core.state), None, self.clock.now());
                    }
                    Recording::Debounced(key) => {
                        core.history
                            .record(HistoryEntry::capture(&core.state), Some(key), self.clock.now());
                    }
                },
            }

            core.revision += 1;
            self.publish_core(core);
            debug!(action = action.name(), revision = core.revision, ?origin, "Action applied");

            (
                action,
                previous,
                core.state.clone(),
                reduction.resolve,
                data_changed.then(|| Arc::clone(&core.index)),
            )
        };

        if let Some(observer) = &self.on_action {
            observer(&action, &next, &previous);
        }
        if let Some(index) = index {
            self.prune(&index);
        }
        if origin == Origin::Host && self.auto_resolve {
            for request in requests {
                self.spawn_resolution(request);
            }
        }
        true
    }

    fn travel(&self, step: impl FnOnce(&mut History) -> Option<&HistoryEntry>) -> bool {
        if self.closed.load(Ordering::Acquire) {
            return false;
        }

        let index = {
            let mut guard = self.core.lock();
            let core = &mut *guard;
            let Some(entry) = step(&mut core.history).cloned() else {
                return false;
            };

            core.state.data = entry.data;
            entry.ui.apply_to(&mut core.state.ui);
            let index = DocumentIndex::build(&core.state.data, &self.config);
            report_new_diagnostics(&core.index.diagnostics, &index.diagnostics);
            core.index = Arc::new(index);
            core.revision += 1;
            self.publish_core(core);
            debug!(revision = core.revision, "History step applied");
            Arc::clone(&core.index)
        };

        self.prune(&index);
        true
    }

    fn publish_core(&self, core: &StoreCore) {
        self.snapshots.send_modify(|snapshot| {
            let snapshot = Arc::make_mut(snapshot);
            snapshot.state = core.state.clone();
            snapshot.index = Arc::clone(&core.index);
            snapshot.revision = core.revision;
        });
    }

    fn permissions_changed(&self) {
        self.snapshots
            .send_modify(|snapshot| Arc::make_mut(snapshot).permissions_revision += 1);
    }

    fn loading_changed(&self, id: &str, count: u32) {
        self.snapshots.send_modify(|snapshot| {
            let snapshot = Arc::make_mut(snapshot);
            if count == 0 {
                snapshot.loading.remove(id);
            } else {
                snapshot.loading.insert(id.to_string(), count);
            }
        });
    }

    fn prune(&self, index: &DocumentIndex) {
        let live = |id: &str| id == ROOT_ID || index.contains(id);
        self.data_resolver.retain(live);
        self.permissions.retain(live);
    }

    fn permissions_for(self: &Arc<Self>, item: &ComponentData) -> Permissions {
        let _runtime = self.runtime.as_ref().map(Handle::enter);
        let inner = Arc::clone(self);
        self.permissions
            .get(&self.config, item, move |task| inner.spawn(task))
    }

    fn spawn(&self, task: BoxFuture<'static, ()>) -> bool {
        let Some(handle) = &self.runtime else {
            return false;
        };
        let mut tasks = self.tasks.lock();
        while tasks.try_join_next().is_some() {}
        tasks.spawn_on(task, handle);
        true
    }

    fn spawn_resolution(self: &Arc<Self>, request: ResolveRequest) {
        let item = {
            let core = self.core.lock();
            if request.id == ROOT_ID {
                Some(core.state.data.root.to_component())
            } else {
                core.state.data.find(&request.id).cloned()
            }
        };
        let Some(item) = item else {
            return;
        };

        let pending = self.resolve_and_commit(item, request.trigger);
        let mut task = async move {
            if let Err(err) = pending.await {
                warn!(error = %err, "Background resolution failed");
            }
        }
        .boxed();

        // Synchronous resolvers finish here and commit before dispatch returns
        let finished = {
            let _runtime = self.runtime.as_ref().map(Handle::enter);
            (&mut task).now_or_never().is_some()
        };
        if !finished && !self.spawn(task) {
            warn!(id = %request.id, "No runtime to resolve component data on");
        }
    }

    fn resolve_and_commit(
        self: &Arc<Self>,
        item: ComponentData,
        trigger: ResolveTrigger,
    ) -> BoxFuture<'static, Result<ResolvedNode, EditorError>> {
        let base = self.live_component(&item);
        let pending = self.data_resolver.resolve(Arc::clone(&self.config), item, trigger);
        let store = Arc::downgrade(self);
        async move {
            let resolved = pending.await?;
            if resolved.did_change {
                if let Some(store) = store.upgrade() {
                    store.commit_resolved(base, resolved.node.clone());
                }
            }
            Ok(resolved)
        }
        .boxed()
    }

    /// The document's current version of a component, if it is there
    fn live_component(&self, item: &ComponentData) -> Option<ComponentData> {
        let core = self.core.lock();
        if item.component_type == ROOT_ID {
            return Some(core.state.data.root.to_component());
        }
        item.id().and_then(|id| core.state.data.find(id)).cloned()
    }

    /// Commit resolved data on top of whatever the component became while
    /// it was being resolved. `base` is the component as it was when the
    /// resolution started.
    fn commit_resolved(self: &Arc<Self>, base: Option<ComponentData>, node: ComponentData) -> bool {
        self.dispatch_with(Origin::Resolver, move |state| {
            if node.component_type == ROOT_ID {
                let live = state.data.root.to_component();
                let rebased = rebase_resolved(&live, base.as_ref().unwrap_or(&live), &node);
                if rebased == live {
                    return None;
                }
                return Some(Action::ReplaceRoot {
                    root: RootData::from_component(rebased),
                    ui: None,
                    record_history: Some(false),
                });
            }

            let Some((zone, index)) = node.id().and_then(|id| state.data.locate(id)) else {
                debug!(id = ?node.id(), "Resolved component is no longer in the document");
                return None;
            };
            let live = state.data.zone(&zone)?.get(index)?;
            let rebased = rebase_resolved(live, base.as_ref().unwrap_or(live), &node);
            if rebased == *live {
                debug!(id = ?node.id(), "Resolution has nothing left to commit");
                return None;
            }
            Some(Action::Replace {
                destination_index: index,
                destination_zone: zone,
                data: rebased,
                ui: None,
            })
        })
    }
}

fn recording(action: &Action, previous: &AppState, next: &AppState) -> Recording {
    let data_changed = !Arc::ptr_eq(&previous.data, &next.data) && previous.data != next.data;

    match action {
        Action::SetUi {
            record_history: Some(true),
            ..
        } => Recording::Push,
        Action::SetUi { .. } | Action::RegisterZone { .. } => Recording::Skip,
        Action::ReplaceRoot {
            record_history: Some(false),
            ..
        } => Recording::Skip,
        _ if !data_changed => Recording::Skip,
        Action::ReplaceRoot {
            record_history: Some(true),
            ..
        } => Recording::Push,
        Action::ReplaceRoot { root, .. } => Recording::Debounced(EditKey::new(
            ROOT_ID,
            changed_fields(&previous.data.root.to_component(), &root.to_component()),
        )),
        Action::Replace {
            destination_index,
            destination_zone,
            data,
            ..
        } => {
            let current = previous
                .data
                .zone(destination_zone)
                .and_then(|items| items.get(*destination_index));
            match (current, data.id()) {
                (Some(current), Some(id)) if current.id() == Some(id) => {
                    Recording::Debounced(EditKey::new(id, changed_fields(current, data)))
                }
                _ => Recording::Push,
            }
        }
        _ => Recording::Push,
    }
}

fn changed_fields(previous: &ComponentData, next: &ComponentData) -> Vec<String> {
    changed_props(Some(previous), next)
        .into_iter()
        .filter(|(_, changed)| *changed)
        .map(|(name, _)| name)
        .collect()
}

fn report_new_diagnostics(previous: &[IndexDiagnostic], current: &[IndexDiagnostic]) {
    for diagnostic in current.iter().filter(|d| !previous.contains(d)) {
        warn!(%diagnostic, "Document integrity problem");
    }
}
