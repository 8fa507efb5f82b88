use crate::contacts::{ContactStore, SosDispatcher, SosOutcome};
use crate::core::errors::{Result, WidgetError};
use crate::core::types::{
    Coordinate, EmergencyContact, Origin, ResolutionResult, ResourceCategory, WidgetOptions,
};
use crate::parser::GeodataSource;
use crate::render::{
    MapSurface, PatchSurface, Presenter, RenderPatch, LOCATION_STATUS_ID, RADIUS_LABEL_ID,
};
use crate::resolve::resolve;
use crate::spatial::external_map_url;
use log::{debug, info, warn};
use rustc_hash::FxHashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// One in-flight category fetch. Only the ticket with the latest generation
/// for its category may render.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FetchTicket {
    pub category: ResourceCategory,
    pub generation: u64,
    pub origin: Coordinate,
    pub radius_m: u32,
}

#[derive(Debug, Clone)]
pub struct CategoryUpdate {
    pub category: ResourceCategory,
    pub patch: RenderPatch,
    pub error: Option<String>,
}

pub struct AppState {
    options: WidgetOptions,
    origin: Origin,
    radius_m: u32,
    generations: FxHashMap<ResourceCategory, u64>,
    presenter: Presenter,
    surface: PatchSurface,
    contacts: ContactStore,
    contacts_path: Option<PathBuf>,
}

impl AppState {
    pub fn new(options: WidgetOptions) -> Result<Self> {
        options.validate()?;
        let contacts_path = options.contacts_path.as_ref().map(PathBuf::from);
        let contacts = match &contacts_path {
            Some(path) => ContactStore::load_from(path).unwrap_or_else(|e| {
                warn!(
                    "Failed to load contacts from {}, starting empty: {}",
                    path.display(),
                    e
                );
                ContactStore::new()
            }),
            None => ContactStore::new(),
        };
        let radius_m = options.clamp_radius(options.default_radius_m);

        Ok(AppState {
            options,
            origin: Origin::Unset,
            radius_m,
            generations: FxHashMap::default(),
            presenter: Presenter::new(),
            surface: PatchSurface::new(),
            contacts,
            contacts_path,
        })
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn radius_m(&self) -> u32 {
        self.radius_m
    }

    pub fn presenter(&self) -> &Presenter {
        &self.presenter
    }

    pub fn take_patch(&mut self) -> RenderPatch {
        self.surface.take_patch()
    }

    pub fn set_location(&mut self, coordinate: Coordinate) -> RenderPatch {
        info!("Location updated to {}", coordinate);
        self.origin = Origin::Known(coordinate);
        self.presenter
            .show_origin(&mut self.surface, coordinate, self.options.zoom);
        self.take_patch()
    }

    pub fn location_failed(&mut self, reason: &str) -> RenderPatch {
        warn!("Error getting location: {}", reason);
        self.surface
            .set_text(LOCATION_STATUS_ID, "Unable to retrieve your location.");
        self.take_patch()
    }

    pub fn set_radius(&mut self, meters: u32) -> RenderPatch {
        self.radius_m = self.options.clamp_radius(meters);
        self.surface.set_text(
            RADIUS_LABEL_ID,
            &format!("Radius: {} meters", self.radius_m),
        );
        self.take_patch()
    }

    /// Issues a fresh ticket per category, superseding anything in flight.
    pub fn begin_refresh(&mut self) -> Result<Vec<FetchTicket>> {
        let Some(origin) = self.origin.coordinate() else {
            self.presenter.render_location_required(&mut self.surface);
            return Err(WidgetError::LocationUnavailable);
        };

        let radius_m = self.radius_m;
        let tickets = ResourceCategory::ALL
            .into_iter()
            .map(|category| {
                let generation = self.generations.entry(category).or_insert(0);
                *generation += 1;
                FetchTicket {
                    category,
                    generation: *generation,
                    origin,
                    radius_m,
                }
            })
            .collect();
        Ok(tickets)
    }

    pub fn is_current(&self, ticket: &FetchTicket) -> bool {
        self.generations.get(&ticket.category) == Some(&ticket.generation)
    }

    /// Renders a finished fetch. Returns `None` when the ticket was superseded.
    pub fn complete(
        &mut self,
        ticket: &FetchTicket,
        outcome: Result<ResolutionResult>,
    ) -> Option<RenderPatch> {
        if !self.is_current(ticket) {
            debug!(
                "Dropping stale {} result (generation {})",
                ticket.category, ticket.generation
            );
            return None;
        }

        match outcome {
            Ok(result) => self.presenter.render(&mut self.surface, &result),
            Err(e) => {
                warn!("Error fetching {}s data: {}", ticket.category, e);
                self.presenter
                    .render_failure(&mut self.surface, ticket.category);
            }
        }
        Some(self.take_patch())
    }

    pub fn external_map_url(&self) -> Option<String> {
        self.origin.coordinate().map(external_map_url)
    }

    pub fn contacts(&self) -> &[EmergencyContact] {
        self.contacts.contacts()
    }

    pub fn add_contact(&mut self, name: &str, phone: &str) -> bool {
        let added = self.contacts.add(name, phone);
        if added {
            self.persist_contacts();
        }
        added
    }

    pub fn delete_contact(&mut self, index: usize) -> bool {
        let removed = self.contacts.delete(index).is_some();
        if removed {
            self.persist_contacts();
        }
        removed
    }

    pub fn send_sos(&self, dispatcher: &dyn SosDispatcher) -> SosOutcome {
        self.contacts.send_sos(self.origin, dispatcher)
    }

    fn persist_contacts(&self) {
        if let Some(path) = &self.contacts_path {
            if let Err(e) = self.contacts.save_to(path) {
                warn!("Failed to save contacts to {}: {}", path.display(), e);
            }
        }
    }
}

/// Starts one independent fetch per category. Each completion is rendered and
/// handed to `sink` as soon as it arrives; stale completions are dropped.
pub fn spawn_refresh(
    runtime: &Handle,
    state: Arc<Mutex<AppState>>,
    source: Arc<dyn GeodataSource>,
    sink: Arc<dyn Fn(CategoryUpdate) + Send + Sync>,
) -> Result<Vec<JoinHandle<()>>> {
    let tickets = state
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .begin_refresh()?;

    let handles = tickets
        .into_iter()
        .map(|ticket| {
            let state = state.clone();
            let source = source.clone();
            let sink = sink.clone();
            runtime.spawn(async move {
                let outcome = resolve(
                    source.as_ref(),
                    ticket.category,
                    ticket.origin,
                    ticket.radius_m,
                )
                .await;
                let error = outcome.as_ref().err().map(|e| e.to_string());

                let patch = state
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .complete(&ticket, outcome);

                if let Some(patch) = patch {
                    sink(CategoryUpdate {
                        category: ticket.category,
                        patch,
                        error,
                    });
                }
            })
        })
        .collect();

    Ok(handles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::RawResource;
    use crate::render::RenderOp;
    use crate::resolve::resolve_raw;
    use async_trait::async_trait;
    use std::collections::HashMap;

    const LONDON: Coordinate = Coordinate {
        lat: 51.50,
        lon: -0.10,
    };

    fn nodes(count: usize) -> Vec<RawResource> {
        (0..count)
            .map(|i| RawResource {
                id: i as i64,
                coordinate: Coordinate {
                    lat: 51.50 + 0.001 * (i as f64 + 1.0),
                    lon: -0.10,
                },
                tags: HashMap::new(),
            })
            .collect()
    }

    struct CannedSource;

    #[async_trait]
    impl GeodataSource for CannedSource {
        async fn fetch_category(
            &self,
            category: ResourceCategory,
            _origin: Coordinate,
            _radius_m: u32,
        ) -> Result<Vec<RawResource>> {
            match category {
                ResourceCategory::Hotel => Err(WidgetError::fetch(category, "HTTP 504")),
                ResourceCategory::BusStation => Ok(Vec::new()),
                _ => Ok(nodes(2)),
            }
        }
    }

    fn text_for(patch: &RenderPatch, id: &str) -> Option<String> {
        patch.ops.iter().find_map(|op| match op {
            RenderOp::Text { element_id, text } if element_id == id => Some(text.clone()),
            _ => None,
        })
    }

    #[test]
    fn starts_unset_with_default_radius() {
        let state = AppState::new(WidgetOptions::default()).unwrap();
        assert_eq!(state.origin(), Origin::Unset);
        assert_eq!(state.radius_m(), 10_000);
        assert!(state.external_map_url().is_none());
    }

    #[test]
    fn refresh_without_location_short_circuits() {
        let mut state = AppState::new(WidgetOptions::default()).unwrap();
        assert!(matches!(
            state.begin_refresh(),
            Err(WidgetError::LocationUnavailable)
        ));
        let patch = state.take_patch();
        assert_eq!(
            text_for(&patch, "nearest-hotel").as_deref(),
            Some("Unable to find nearest resources.")
        );
    }

    #[test]
    fn location_updates_status_and_view() {
        let mut state = AppState::new(WidgetOptions::default()).unwrap();
        let patch = state.set_location(LONDON);
        assert_eq!(state.origin(), Origin::Known(LONDON));
        assert!(patch
            .ops
            .iter()
            .any(|op| matches!(op, RenderOp::SetView { zoom: 13, .. })));
        assert_eq!(
            text_for(&patch, LOCATION_STATUS_ID).as_deref(),
            Some("Latitude: 51.5, Longitude: -0.1")
        );
        assert_eq!(
            state.external_map_url().as_deref(),
            Some("https://www.google.com/maps?q=51.5,-0.1")
        );
    }

    #[test]
    fn location_failure_keeps_previous_origin() {
        let mut state = AppState::new(WidgetOptions::default()).unwrap();
        state.set_location(LONDON);
        let patch = state.location_failed("denied");
        assert_eq!(state.origin(), Origin::Known(LONDON));
        assert_eq!(
            text_for(&patch, LOCATION_STATUS_ID).as_deref(),
            Some("Unable to retrieve your location.")
        );
    }

    #[test]
    fn radius_label_reflects_clamped_value() {
        let mut state = AppState::new(WidgetOptions::default()).unwrap();
        let patch = state.set_radius(75_000);
        assert_eq!(state.radius_m(), 50_000);
        assert_eq!(
            text_for(&patch, RADIUS_LABEL_ID).as_deref(),
            Some("Radius: 50000 meters")
        );
    }

    #[test]
    fn superseded_ticket_is_discarded() {
        let mut state = AppState::new(WidgetOptions::default()).unwrap();
        state.set_location(LONDON);

        let old = state.begin_refresh().unwrap();
        state.set_radius(2_000);
        let new = state.begin_refresh().unwrap();
        assert_eq!(new[0].radius_m, 2_000);

        let stale = resolve_raw(old[0].category, LONDON, nodes(4));
        assert!(state.complete(&old[0], Ok(stale)).is_none());
        assert_eq!(state.presenter().marker_count(old[0].category), 0);

        let fresh = resolve_raw(new[0].category, LONDON, nodes(1));
        assert!(state.complete(&new[0], Ok(fresh)).is_some());
        assert_eq!(state.presenter().marker_count(new[0].category), 1);
    }

    #[tokio::test]
    async fn categories_render_independently() {
        let state = Arc::new(Mutex::new(AppState::new(WidgetOptions::default()).unwrap()));
        state.lock().unwrap().set_location(LONDON);

        let updates: Arc<Mutex<Vec<CategoryUpdate>>> = Arc::new(Mutex::new(Vec::new()));
        let collected = updates.clone();
        let sink: Arc<dyn Fn(CategoryUpdate) + Send + Sync> =
            Arc::new(move |update| collected.lock().unwrap().push(update));

        let handles = spawn_refresh(
            &Handle::current(),
            state.clone(),
            Arc::new(CannedSource),
            sink,
        )
        .unwrap();
        for handle in handles {
            handle.await.unwrap();
        }

        let updates = updates.lock().unwrap();
        assert_eq!(updates.len(), 5);

        let hotel = updates
            .iter()
            .find(|u| u.category == ResourceCategory::Hotel)
            .unwrap();
        assert!(hotel.error.is_some());
        assert_eq!(
            text_for(&hotel.patch, "nearest-hotel").as_deref(),
            Some("Unable to retrieve hotels data.")
        );

        let bus = updates
            .iter()
            .find(|u| u.category == ResourceCategory::BusStation)
            .unwrap();
        assert_eq!(
            text_for(&bus.patch, "nearest-bus-station").as_deref(),
            Some("No bus stations found.")
        );

        let state = state.lock().unwrap();
        assert_eq!(state.presenter().marker_count(ResourceCategory::Police), 2);
        assert_eq!(state.presenter().marker_count(ResourceCategory::Hotel), 0);
    }

    #[test]
    fn contacts_persist_between_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let options = WidgetOptions {
            contacts_path: Some(dir.path().join("contacts.bin").display().to_string()),
            ..WidgetOptions::default()
        };

        let mut state = AppState::new(options.clone()).unwrap();
        assert!(state.add_contact("Ann", "555"));
        assert!(!state.add_contact("", "555"));
        assert!(state.add_contact("Bob", "777"));
        assert!(state.delete_contact(0));
        assert!(!state.delete_contact(3));

        let reopened = AppState::new(options).unwrap();
        assert_eq!(reopened.contacts().len(), 1);
        assert_eq!(reopened.contacts()[0].name, "Bob");
    }

    #[test]
    fn unreadable_contacts_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("contacts.bin");
        std::fs::write(&path, b"\xff\xff\xff\xffgarbage").unwrap();
        let options = WidgetOptions {
            contacts_path: Some(path.display().to_string()),
            ..WidgetOptions::default()
        };

        let mut state = AppState::new(options.clone()).unwrap();
        assert!(state.contacts().is_empty());

        assert!(state.add_contact("Ann", "555"));
        let reopened = AppState::new(options).unwrap();
        assert_eq!(reopened.contacts().len(), 1);
    }
}
