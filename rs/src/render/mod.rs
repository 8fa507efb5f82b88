use crate::core::types::{Coordinate, ResolutionResult, ResourceCategory};
use log::warn;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;

pub const LOCATION_STATUS_ID: &str = "location-status";
pub const RADIUS_LABEL_ID: &str = "radius-label";
pub const USER_ICON: &str = "user.png";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct MarkerHandle(pub u64);

/// The map and page operations the widget relies on.
pub trait MapSurface {
    fn place_marker(&mut self, at: Coordinate, icon: &str, popup: &str) -> MarkerHandle;
    fn remove_marker(&mut self, handle: MarkerHandle);
    fn set_view(&mut self, center: Coordinate, zoom: u8);
    fn replace_list(&mut self, element_id: &str, items: &[String]);
    fn set_text(&mut self, element_id: &str, text: &str);
}

/// Owns every marker the widget has placed, grouped by category.
#[derive(Default)]
pub struct Presenter {
    markers: FxHashMap<ResourceCategory, Vec<MarkerHandle>>,
    user_marker: Option<MarkerHandle>,
}

impl Presenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn marker_count(&self, category: ResourceCategory) -> usize {
        self.markers.get(&category).map_or(0, |m| m.len())
    }

    fn clear_markers(&mut self, surface: &mut dyn MapSurface, category: ResourceCategory) {
        if let Some(handles) = self.markers.remove(&category) {
            for handle in handles {
                surface.remove_marker(handle);
            }
        }
    }

    /// Replaces the category's markers, list and nearest line. The nearest
    /// line shows the raw `name` tag (or `Unknown`), without the category
    /// suffix that list entries and popups carry.
    pub fn render(&mut self, surface: &mut dyn MapSurface, result: &ResolutionResult) {
        let category = result.category;
        let info = category.info();
        self.clear_markers(surface, category);

        let mut handles = Vec::with_capacity(result.sorted_resources.len());
        let mut items = Vec::with_capacity(result.sorted_resources.len());
        for resource in &result.sorted_resources {
            let popup = format!(
                "{}<br>Distance: {:.2} km",
                resource.display_name, resource.distance_km
            );
            handles.push(surface.place_marker(resource.raw.coordinate, info.icon, &popup));
            items.push(format!(
                "{} - {:.2} km",
                resource.display_name, resource.distance_km
            ));
        }
        self.markers.insert(category, handles);
        surface.replace_list(info.list_element_id, &items);

        let summary = match &result.nearest {
            Some(nearest) => format!(
                "Nearest {}: {}, Distance: {:.2} km",
                category.label(),
                nearest.raw.name().unwrap_or("Unknown"),
                nearest.distance_km
            ),
            None => format!("No {}s found.", category.label()),
        };
        surface.set_text(info.nearest_element_id, &summary);
    }

    pub fn render_failure(&mut self, surface: &mut dyn MapSurface, category: ResourceCategory) {
        let info = category.info();
        self.clear_markers(surface, category);
        surface.replace_list(info.list_element_id, &[]);
        surface.set_text(
            info.nearest_element_id,
            &format!("Unable to retrieve {}s data.", category.label()),
        );
    }

    pub fn render_location_required(&mut self, surface: &mut dyn MapSurface) {
        for category in ResourceCategory::ALL {
            surface.set_text(
                category.info().nearest_element_id,
                "Unable to find nearest resources.",
            );
        }
    }

    pub fn show_origin(&mut self, surface: &mut dyn MapSurface, origin: Coordinate, zoom: u8) {
        surface.set_view(origin, zoom);
        if let Some(handle) = self.user_marker.take() {
            surface.remove_marker(handle);
        }
        self.user_marker = Some(surface.place_marker(origin, USER_ICON, "You are here!"));
        surface.set_text(
            LOCATION_STATUS_ID,
            &format!("Latitude: {}, Longitude: {}", origin.lat, origin.lon),
        );
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "op", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum RenderOp {
    Place {
        handle: MarkerHandle,
        lat: f64,
        lon: f64,
        icon: String,
        popup: String,
    },
    Remove {
        handle: MarkerHandle,
    },
    SetView {
        lat: f64,
        lon: f64,
        zoom: u8,
    },
    List {
        element_id: String,
        items: Vec<String>,
    },
    Text {
        element_id: String,
        text: String,
    },
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct RenderPatch {
    pub ops: Vec<RenderOp>,
}

impl RenderPatch {
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"ops":[]}"#.to_string())
    }
}

/// Records surface operations so the JS side can replay them on the real map.
#[derive(Default)]
pub struct PatchSurface {
    next_handle: u64,
    live: FxHashSet<MarkerHandle>,
    pending: Vec<RenderOp>,
}

impl PatchSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live_markers(&self) -> usize {
        self.live.len()
    }

    pub fn take_patch(&mut self) -> RenderPatch {
        RenderPatch {
            ops: std::mem::take(&mut self.pending),
        }
    }
}

impl MapSurface for PatchSurface {
    fn place_marker(&mut self, at: Coordinate, icon: &str, popup: &str) -> MarkerHandle {
        self.next_handle += 1;
        let handle = MarkerHandle(self.next_handle);
        self.live.insert(handle);
        self.pending.push(RenderOp::Place {
            handle,
            lat: at.lat,
            lon: at.lon,
            icon: icon.to_string(),
            popup: popup.to_string(),
        });
        handle
    }

    fn remove_marker(&mut self, handle: MarkerHandle) {
        if !self.live.remove(&handle) {
            warn!("Ignoring removal of unknown marker {:?}", handle);
            return;
        }
        self.pending.push(RenderOp::Remove { handle });
    }

    fn set_view(&mut self, center: Coordinate, zoom: u8) {
        self.pending.push(RenderOp::SetView {
            lat: center.lat,
            lon: center.lon,
            zoom,
        });
    }

    fn replace_list(&mut self, element_id: &str, items: &[String]) {
        self.pending.push(RenderOp::List {
            element_id: element_id.to_string(),
            items: items.to_vec(),
        });
    }

    fn set_text(&mut self, element_id: &str, text: &str) {
        self.pending.push(RenderOp::Text {
            element_id: element_id.to_string(),
            text: text.to_string(),
        });
    }
}
