//! # Puck Editor
//!
//! State core for a visual page editor.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ common: page data, zones, visitors          │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ editor: EditorStore                         │
//! │  - Reduce actions over copy-on-write data   │
//! │  - Index every component by id              │
//! │  - Debounced undo/redo history              │
//! │  - Async data and permission resolution     │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ host: renders snapshots, publishes pages    │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **Data is source of truth**: the index and permissions are derived views
//! 2. **Reducers are pure**: an action never modifies the state it was given
//! 3. **Rejections are silent**: an invalid action leaves the state untouched
//! 4. **Newest wins**: a stale resolution never overwrites a newer one
//!
//! ## Usage
//!
//! ```rust,ignore
//! use puck_editor::{Action, Config, EditorStore, StoreOptions};
//! use puck_common::{Data, ZoneKey};
//!
//! let store = EditorStore::new(config, Data::default(), StoreOptions::new());
//!
//! store.dispatch(Action::insert("Heading", 0, ZoneKey::root()));
//! let snapshot = store.snapshot();
//!
//! store.back();
//! store.publish().await?;
//! ```

mod actions;
mod config;
mod errors;
mod history;
mod id_generator;
mod index;
mod permissions;
mod publish;
mod reducer;
mod resolver;
mod state;
mod store;

pub use actions::{Action, DataPatch, Update};
pub use config::{ComponentConfig, Config, Field, FieldKind, FieldOption};
pub use errors::{EditorError, PublishError, ResolveError, ResolverError};
pub use history::{
    Clock, EditKey, History, HistoryEntry, ManualClock, Recorded, SystemClock, DEFAULT_MAX_ENTRIES,
    DEFAULT_WINDOW,
};
pub use id_generator::{document_seed, IdGenerator, SequentialIds, UuidGenerator};
pub use index::{DocumentIndex, IndexDiagnostic, NodeEntry};
pub use permissions::{
    async_permissions, sync_permissions, AsyncPermissions, Listener, PartialPermissions,
    Permissions, PermissionsParams, PermissionsResolver, RefreshQuery, ResolvePermissions,
    SyncPermissions,
};
pub use publish::{FileSink, MemorySink, PublishSink};
pub use reducer::{reduce, ReduceContext, Reduction, Rejection, ResolveRequest};
pub use resolver::{
    async_resolve_data, changed_props, rebase_resolved, sync_resolve_data, AsyncResolveData, Changed,
    DataResolver, LoadingListener, ResolveData, ResolveDataOutput, ResolveDataParams,
    ResolveTrigger, ResolvedNode, SyncResolveData,
};
pub use state::{
    AppState, ComponentListState, FieldState, ItemSelector, PreviewMode, UiPatch, UiState,
    ViewportState,
};
pub use store::{ActionObserver, EditorStore, PermissionsTarget, StoreOptions, StoreSnapshot};

// Re-export common types for convenience
pub use puck_common::{ComponentData, Data, RootData, ZoneKey, DEFAULT_ZONE, ROOT_ID, ROOT_ZONE};
