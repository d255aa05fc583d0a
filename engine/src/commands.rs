use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::engine::MockupEngine;
use crate::error::{EngineError, Result};
use crate::objects::{DesignLayer, LayerTransform};
use crate::types::{AssetHandle, LayerId, ReorderDirection, ViewId};
use crate::views::{BackgroundState, ViewSnapshot};

/// Synchronous page-shell actions, as `{"action": "...", "params": {...}}`.
/// View switches and variant changes wait on a background load and go through the async API instead.
#[derive(Deserialize, Debug)]
#[serde(tag = "action", content = "params", rename_all = "snake_case")]
pub enum Command {
    AddText {
        #[serde(default)]
        text: Option<String>,
    },
    AddImage { handle: AssetHandle },
    AddFromUpload { handle: AssetHandle },
    UpdateTransform { id: LayerId, transform: LayerTransform },
    UpdateText { id: LayerId, text: String },
    SelectAt { x: f64, y: f64 },
    Select { id: LayerId },
    ClearSelection,
    DeleteSelected,
    Key { key: String },
    ReorderSelected { direction: ReorderDirection },
    FlipSelected,
    RemoveUpload { handle: AssetHandle },
    ZoomIn,
    ZoomOut,
    SetZoom { level: f64 },
    GetState,
    GetThumbnails,
    ExportSnapshots,
    RestoreSnapshots { snapshots: Vec<ViewSnapshot> },
}

/// What the page needs to redraw its controls.
#[derive(Serialize, Debug)]
pub struct EngineStatus<'a> {
    pub view: Option<&'a ViewId>,
    pub views: Vec<&'a ViewId>,
    pub switching: bool,
    pub zoom: f64,
    pub selected: Option<LayerId>,
    pub background: Option<&'a BackgroundState>,
    pub layers: &'a [DesignLayer],
}

impl MockupEngine {
    pub fn status(&self) -> EngineStatus<'_> {
        let active = self.current.map(|idx| &self.views[idx]);
        EngineStatus {
            view: self.current_view(),
            views: self.views.iter().map(|v| v.view()).collect(),
            switching: self.switch_pending,
            zoom: self.zoom_level(),
            selected: self.selected(),
            background: active.map(|v| v.background()),
            layers: active.map(|v| v.store().layers()).unwrap_or(&[]),
        }
    }

    pub fn execute_command(&mut self, cmd_json: &str) -> String {
        let result = serde_json::from_str::<Command>(cmd_json)
            .map_err(|e| EngineError::Config(format!("Invalid command: {}", e)))
            .and_then(|cmd| self.run(cmd));
        match result {
            Ok(value) => value.to_string(),
            Err(e) => json!({ "error": e.to_string() }).to_string(),
        }
    }

    pub fn run(&mut self, cmd: Command) -> Result<Value> {
        log::debug!("command {:?}", cmd);
        let value = match cmd {
            Command::AddText { text } => json!({ "id": self.add_text_layer(text.as_deref())? }),
            Command::AddImage { handle } => json!({ "id": self.add_image_layer(&handle)? }),
            Command::AddFromUpload { handle } => json!({ "id": self.add_layer_from_upload(&handle)? }),
            Command::UpdateTransform { id, transform } => json!({ "transform": self.update_transform(id, transform)? }),
            Command::UpdateText { id, text } => json!({ "updated": self.update_text(id, &text)? }),
            Command::SelectAt { x, y } => json!({ "selected": self.select_at(x, y) }),
            Command::Select { id } => json!({ "selected": self.select(id).then_some(id) }),
            Command::ClearSelection => {
                self.clear_selection();
                json!({ "selected": null })
            }
            Command::DeleteSelected => json!({ "removed": self.delete_selected()? }),
            Command::Key { key } => json!({ "removed": self.handle_key(&key)? }),
            Command::ReorderSelected { direction } => json!({ "moved": self.reorder_selected(direction)? }),
            Command::FlipSelected => json!({ "flip_x": self.flip_selected()? }),
            Command::RemoveUpload { handle } => json!({ "removed": self.remove_upload(&handle)? }),
            Command::ZoomIn => json!({ "zoom": self.zoom_in() }),
            Command::ZoomOut => json!({ "zoom": self.zoom_out() }),
            Command::SetZoom { level } => json!({ "zoom": self.set_zoom(level) }),
            Command::GetState => serde_json::to_value(self.status())?,
            Command::GetThumbnails => serde_json::to_value(self.thumbnails()?)?,
            Command::ExportSnapshots => serde_json::to_value(self.export_all_view_snapshots()?)?,
            Command::RestoreSnapshots { snapshots } => {
                self.restore_view_snapshots(snapshots)?;
                json!({ "restored": true })
            }
        };
        Ok(value)
    }
}
