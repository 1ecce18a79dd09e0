//! # Permissions
//!
//! What the user may do with a component: drag, edit, duplicate, delete,
//! insert into. Resolution layers, later wins:
//!
//! 1. all allowed
//! 2. the config's global overrides
//! 3. the component config's overrides
//! 4. the component's `resolve_permissions` hook, if any
//!
//! Hook results are cached per component, keyed by a hash of the component
//! data and the static permissions it was computed from. A hook whose
//! future completes immediately is answered synchronously. Otherwise the
//! future runs in the background, callers get the last known value (or the
//! static one), and the listener fires once the result lands so hosts can
//! query again.
//!
//! Every resolution bumps a per-component generation; a result that comes
//! back for an older generation is dropped.

use crate::config::Config;
use crate::errors::ResolverError;
use crate::resolver::{changed_props, Changed};
use futures::future::{self, BoxFuture};
use futures::FutureExt;
use parking_lot::Mutex;
use puck_common::{ComponentData, ROOT_ID};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Permissions {
    pub drag: bool,
    pub edit: bool,
    pub duplicate: bool,
    pub delete: bool,
    pub insert: bool,
}

impl Default for Permissions {
    fn default() -> Self {
        Self {
            drag: true,
            edit: true,
            duplicate: true,
            delete: true,
            insert: true,
        }
    }
}

impl Permissions {
    /// Overlay the fields a partial set specifies
    pub fn apply(self, partial: &PartialPermissions) -> Self {
        Self {
            drag: partial.drag.unwrap_or(self.drag),
            edit: partial.edit.unwrap_or(self.edit),
            duplicate: partial.duplicate.unwrap_or(self.duplicate),
            delete: partial.delete.unwrap_or(self.delete),
            insert: partial.insert.unwrap_or(self.insert),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PartialPermissions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drag: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edit: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicate: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insert: Option<bool>,
}

impl PartialPermissions {
    /// Every field set to `allowed`
    pub fn all(allowed: bool) -> Self {
        Self {
            drag: Some(allowed),
            edit: Some(allowed),
            duplicate: Some(allowed),
            delete: Some(allowed),
            insert: Some(allowed),
        }
    }
}

/// What a permissions hook gets besides the component itself
#[derive(Debug, Clone)]
pub struct PermissionsParams {
    /// Static permissions for the component (global + component overrides)
    pub permissions: Permissions,
    pub last_data: Option<ComponentData>,
    pub last_permissions: Option<Permissions>,
    pub changed: Changed,
}

pub trait ResolvePermissions: Send + Sync {
    fn resolve(
        &self,
        data: ComponentData,
        params: PermissionsParams,
    ) -> BoxFuture<'static, Result<PartialPermissions, ResolverError>>;
}

/// Adapts a synchronous closure into a [`ResolvePermissions`] hook
pub struct SyncPermissions<F>(F);

pub fn sync_permissions<F>(hook: F) -> SyncPermissions<F>
where
    F: Fn(&ComponentData, &PermissionsParams) -> PartialPermissions + Send + Sync,
{
    SyncPermissions(hook)
}

impl<F> ResolvePermissions for SyncPermissions<F>
where
    F: Fn(&ComponentData, &PermissionsParams) -> PartialPermissions + Send + Sync,
{
    fn resolve(
        &self,
        data: ComponentData,
        params: PermissionsParams,
    ) -> BoxFuture<'static, Result<PartialPermissions, ResolverError>> {
        future::ready(Ok((self.0)(&data, &params))).boxed()
    }
}

/// Adapts an async closure into a [`ResolvePermissions`] hook
pub struct AsyncPermissions<F>(F);

pub fn async_permissions<F, Fut>(hook: F) -> AsyncPermissions<F>
where
    F: Fn(ComponentData, PermissionsParams) -> Fut + Send + Sync,
    Fut: Future<Output = Result<PartialPermissions, ResolverError>> + Send + 'static,
{
    AsyncPermissions(hook)
}

impl<F, Fut> ResolvePermissions for AsyncPermissions<F>
where
    F: Fn(ComponentData, PermissionsParams) -> Fut + Send + Sync,
    Fut: Future<Output = Result<PartialPermissions, ResolverError>> + Send + 'static,
{
    fn resolve(
        &self,
        data: ComponentData,
        params: PermissionsParams,
    ) -> BoxFuture<'static, Result<PartialPermissions, ResolverError>> {
        (self.0)(data, params).boxed()
    }
}

/// Which cached permissions to throw away
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshQuery {
    Item(String),
    Type(String),
    Root,
    All,
}

pub type Listener = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone, Default)]
struct CacheEntry {
    component_type: String,
    /// Input hash `resolved` was computed for; `None` once invalidated
    key: Option<u32>,
    resolved: Option<Permissions>,
    last_data: Option<ComponentData>,
    generation: u64,
    in_flight: Option<u32>,
    failed: Option<u32>,
}

pub struct PermissionsResolver {
    cache: Mutex<HashMap<String, CacheEntry>>,
    listener: Option<Listener>,
}

impl Default for PermissionsResolver {
    fn default() -> Self {
        Self::new(None)
    }
}

impl PermissionsResolver {
    /// `listener` fires whenever a background resolution lands
    pub fn new(listener: Option<Listener>) -> Self {
        Self {
            cache: Mutex::new(HashMap::new()),
            listener,
        }
    }

    /// Static permissions for a component: defaults, global, component
    pub fn base(config: &Config, item: &ComponentData) -> Permissions {
        let global = config.global_permissions();
        match config.component(&item.component_type) {
            Some(component) => global.apply(&component.permissions),
            None => global,
        }
    }

    /// Effective permissions for `item`.
    ///
    /// `spawn` runs a pending hook future in the background and returns
    /// false if it cannot.
    pub fn get(
        self: &Arc<Self>,
        config: &Config,
        item: &ComponentData,
        spawn: impl FnOnce(BoxFuture<'static, ()>) -> bool,
    ) -> Permissions {
        let base = Self::base(config, item);
        let Some(hook) = config
            .component(&item.component_type)
            .and_then(|component| component.resolve_permissions.clone())
        else {
            return base;
        };

        let cache_id = cache_id(item);
        let key = input_key(item, &base);

        let (generation, params, fallback) = {
            let mut cache = self.cache.lock();
            let entry = cache.entry(cache_id.clone()).or_default();
            entry.component_type = item.component_type.clone();

            let fallback = entry.resolved.unwrap_or(base);
            if entry.key == Some(key) || entry.in_flight == Some(key) || entry.failed == Some(key) {
                return fallback;
            }

            entry.generation += 1;
            entry.in_flight = Some(key);
            let params = PermissionsParams {
                permissions: base,
                last_data: entry.last_data.clone(),
                last_permissions: entry.resolved,
                changed: changed_props(entry.last_data.as_ref(), item),
            };
            (entry.generation, params, fallback)
        };

        let mut pending = hook.resolve(item.clone(), params);
        if let Some(result) = (&mut pending).now_or_never() {
            return self.settle(&cache_id, generation, key, item, base, result);
        }

        debug!(id = %cache_id, "Permissions resolving in background");
        let resolver = Arc::clone(self);
        let item = item.clone();
        let id = cache_id.clone();
        let task = async move {
            let result = pending.await;
            let current = resolver.is_current(&id, generation);
            resolver.settle(&id, generation, key, &item, base, result);
            if current {
                if let Some(listener) = &resolver.listener {
                    listener();
                }
            }
        }
        .boxed();

        if !spawn(task) {
            warn!(id = %cache_id, "No runtime to resolve permissions on");
            if let Some(entry) = self.cache.lock().get_mut(&cache_id) {
                entry.in_flight = None;
            }
        }
        fallback
    }

    fn is_current(&self, id: &str, generation: u64) -> bool {
        self.cache
            .lock()
            .get(id)
            .map_or(false, |entry| entry.generation == generation)
    }

    fn settle(
        &self,
        id: &str,
        generation: u64,
        key: u32,
        item: &ComponentData,
        base: Permissions,
        result: Result<PartialPermissions, ResolverError>,
    ) -> Permissions {
        let mut cache = self.cache.lock();
        let entry = cache.entry(id.to_string()).or_default();

        if entry.generation != generation {
            debug!(id, generation, "Discarding stale permissions");
            return entry.resolved.unwrap_or(base);
        }
        entry.in_flight = None;

        match result {
            Ok(partial) => {
                let permissions = base.apply(&partial);
                entry.key = Some(key);
                entry.failed = None;
                entry.resolved = Some(permissions);
                entry.last_data = Some(item.clone());
                permissions
            }
            Err(err) => {
                warn!(id, error = %err, "resolvePermissions failed");
                entry.failed = Some(key);
                entry.resolved.unwrap_or(base)
            }
        }
    }

    /// Drop cached results so the next lookup resolves again.
    /// Results still in flight for invalidated entries are discarded.
    pub fn invalidate(&self, query: &RefreshQuery) {
        let mut cache = self.cache.lock();
        for (id, entry) in cache.iter_mut() {
            let matches = match query {
                RefreshQuery::Item(target) => id == target,
                RefreshQuery::Type(component_type) => entry.component_type == *component_type,
                RefreshQuery::Root => id == ROOT_ID,
                RefreshQuery::All => true,
            };
            if matches {
                entry.key = None;
                entry.failed = None;
                entry.in_flight = None;
                entry.generation += 1;
            }
        }
    }

    /// Forget components that are no longer in the document
    pub fn retain(&self, live: impl Fn(&str) -> bool) {
        self.cache.lock().retain(|id, _| live(id));
    }

    pub fn cached(&self, id: &str) -> Option<Permissions> {
        self.cache.lock().get(id).and_then(|entry| entry.resolved)
    }
}

fn cache_id(item: &ComponentData) -> String {
    if item.component_type == ROOT_ID {
        return ROOT_ID.to_string();
    }
    item.id().unwrap_or_default().to_string()
}

fn input_key(item: &ComponentData, base: &Permissions) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    if let Ok(bytes) = serde_json::to_vec(item) {
        hasher.update(&bytes);
    }
    hasher.update(&[
        base.drag as u8,
        base.edit as u8,
        base.duplicate as u8,
        base.delete as u8,
        base.insert as u8,
    ]);
    hasher.finalize()
}
