//! Editor application state: the page data plus UI state

use puck_common::{Data, ZoneKey};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Selection handle: the zone and position of the selected component
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSelector {
    pub index: usize,
    pub zone: ZoneKey,
}

impl ItemSelector {
    pub fn new(index: usize, zone: ZoneKey) -> Self {
        Self { index, zone }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PreviewMode {
    #[default]
    Edit,
    Interactive,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ComponentListState {
    #[serde(default)]
    pub expanded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FieldState {
    #[serde(default)]
    pub focus: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ViewportState {
    #[serde(default)]
    pub width: Option<f64>,
    #[serde(default)]
    pub height: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UiState {
    pub left_side_bar_visible: bool,
    pub right_side_bar_visible: bool,
    pub left_side_bar_width: Option<f64>,
    pub right_side_bar_width: Option<f64>,
    pub item_selector: Option<ItemSelector>,
    pub is_dragging: bool,
    pub component_list: BTreeMap<String, ComponentListState>,
    pub preview_mode: PreviewMode,
    pub field: FieldState,
    pub viewport: ViewportState,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            left_side_bar_visible: true,
            right_side_bar_visible: true,
            left_side_bar_width: None,
            right_side_bar_width: None,
            item_selector: None,
            is_dragging: false,
            component_list: BTreeMap::new(),
            preview_mode: PreviewMode::Edit,
            field: FieldState::default(),
            viewport: ViewportState::default(),
        }
    }
}

/// Partial UI update. Absent fields are left alone; `null` clears the
/// nullable ones.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UiPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub left_side_bar_visible: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub right_side_bar_visible: Option<bool>,

    #[serde(deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub left_side_bar_width: Option<Option<f64>>,

    #[serde(deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub right_side_bar_width: Option<Option<f64>>,

    #[serde(deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub item_selector: Option<Option<ItemSelector>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_dragging: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub component_list: Option<BTreeMap<String, ComponentListState>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_mode: Option<PreviewMode>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<FieldState>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewport: Option<ViewportState>,
}

impl UiPatch {
    /// A patch that only sets the selection
    pub fn select(selector: Option<ItemSelector>) -> Self {
        Self {
            item_selector: Some(selector),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply_to(&self, ui: &mut UiState) {
        if let Some(visible) = self.left_side_bar_visible {
            ui.left_side_bar_visible = visible;
        }
        if let Some(visible) = self.right_side_bar_visible {
            ui.right_side_bar_visible = visible;
        }
        if let Some(width) = self.left_side_bar_width {
            ui.left_side_bar_width = width;
        }
        if let Some(width) = self.right_side_bar_width {
            ui.right_side_bar_width = width;
        }
        if let Some(selector) = &self.item_selector {
            ui.item_selector = selector.clone();
        }
        if let Some(dragging) = self.is_dragging {
            ui.is_dragging = dragging;
        }
        if let Some(list) = &self.component_list {
            ui.component_list = list.clone();
        }
        if let Some(mode) = self.preview_mode {
            ui.preview_mode = mode;
        }
        if let Some(field) = &self.field {
            ui.field = field.clone();
        }
        if let Some(viewport) = &self.viewport {
            ui.viewport = viewport.clone();
        }
    }
}

/// Distinguishes an absent field from an explicit `null`
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Everything the editor renders from. Data is shared copy-on-write, so
/// cloning a state (for history or a snapshot) is cheap.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppState {
    pub data: Arc<Data>,
    pub ui: UiState,
}

impl AppState {
    pub fn new(data: Data) -> Self {
        Self {
            data: Arc::new(data),
            ui: UiState::default(),
        }
    }

    pub fn with_ui(mut self, ui: UiState) -> Self {
        self.ui = ui;
        self
    }

    /// Id of the component the selector points at, if any
    pub fn selected_id(&self) -> Option<&str> {
        let selector = self.ui.item_selector.as_ref()?;
        self.data
            .zone(&selector.zone)?
            .get(selector.index)?
            .id()
    }
}
