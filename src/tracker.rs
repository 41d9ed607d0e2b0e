//! Application context tying the store, rendered list, map markers and
//! persistence together.

use chrono::Utc;
use std::time::{Duration, Instant};

use crate::form::{FormState, ValidationError, WorkoutForm};
use crate::geolocation::GeolocationError;
use crate::markers::{MapSurface, MarkerRegistry};
use crate::persistence::{KeyValueStore, WorkoutRepository};
use crate::render::WorkoutList;
use crate::schedule::Banner;
use crate::settings::Settings;
use crate::store::{StoreError, WorkoutStore};
use crate::workout::{Coords, IdGenerator, MarkerId, Workout, WorkoutId};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackerConfig {
    pub zoom: u8,
    pub banner: Duration,
    pub form_transition: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

impl From<&Settings> for TrackerConfig {
    fn from(s: &Settings) -> Self {
        Self {
            zoom: s.zoom_level,
            banner: s.banner_duration(),
            form_transition: s.form_transition(),
        }
    }
}

/// Outcome of a form submission that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    Created(WorkoutId),
    Updated(WorkoutId),
    /// Nothing was stored: the form was hidden, the edited workout is gone
    /// or the new record could not be added.
    Ignored,
}

pub struct Tracker<M, S> {
    config: TrackerConfig,
    store: WorkoutStore,
    repo: WorkoutRepository<S>,
    markers: MarkerRegistry,
    list: WorkoutList,
    form: WorkoutForm,
    banner: Banner,
    map: Option<M>,
    home: Option<Coords>,
    ids: IdGenerator,
    alert: Option<String>,
    confirming_delete_all: bool,
}

impl<M: MapSurface, S: KeyValueStore> Tracker<M, S> {
    /// Build the context and restore saved workouts into the list. The map
    /// is attached later, once a location is known.
    pub fn new(repo: WorkoutRepository<S>, config: TrackerConfig) -> Self {
        let mut tracker = Self {
            config,
            store: WorkoutStore::new(),
            repo,
            markers: MarkerRegistry::default(),
            list: WorkoutList::default(),
            form: WorkoutForm::default(),
            banner: Banner::default(),
            map: None,
            home: None,
            ids: IdGenerator::default(),
            alert: None,
            confirming_delete_all: false,
        };
        tracker.load_saved();
        tracker
    }

    fn load_saved(&mut self) {
        for workout in self.repo.load() {
            self.ids.observe(&workout.id);
            if let Err(e) = self.store.add(workout) {
                log::warn!("Skipping saved workout: {e}");
            }
        }
        self.list.render_all(self.store.all());
        log::info!("Restored {} workouts", self.store.len());
    }

    fn persist(&mut self) {
        self.repo.save(self.store.all());
    }

    fn place_all_markers(&mut self) {
        let Some(map) = self.map.as_mut() else {
            return;
        };
        for workout in self.store.iter_mut() {
            workout.marker_id = Some(self.markers.place(map, workout));
        }
        self.list.render_all(self.store.all());
    }

    /// The map became available: centre it and pin every stored workout.
    pub fn attach_map(&mut self, mut map: M, center: Coords) {
        map.set_view(center, self.config.zoom, false);
        self.map = Some(map);
        self.home = Some(center);
        self.place_all_markers();
    }

    pub fn location_failed(&mut self, err: &GeolocationError) {
        log::error!("Geolocation failed: {err}");
        self.alert = Some(format!("Could not get your position, the map is unavailable. {err}"));
    }

    pub fn alert(&self) -> Option<&str> {
        self.alert.as_deref()
    }

    pub fn dismiss_alert(&mut self) {
        self.alert = None;
    }

    /// Start a new workout at the clicked coordinate.
    pub fn map_clicked(&mut self, coords: Coords) {
        if self.map.is_none() {
            return;
        }
        self.form.open_at(coords);
    }

    /// Open the form pre-filled with an existing workout.
    pub fn begin_edit(&mut self, id: &WorkoutId) {
        match self.store.find_by_id(id) {
            Some(workout) => self.form.open_for_edit(workout),
            None => log::debug!("Edit of unknown workout {id} ignored"),
        }
    }

    /// Validate the form and create or update a workout.
    ///
    /// Invalid input shows the error banner and leaves everything as is.
    pub fn submit(&mut self, now: Instant) -> Result<Submission, ValidationError> {
        let state = self.form.state().clone();
        if state == FormState::Idle {
            return Ok(Submission::Ignored);
        }
        let values = match self.form.read() {
            Ok(values) => values,
            Err(e) => {
                self.banner.show(e.to_string(), now, self.config.banner);
                return Err(e);
            }
        };

        let outcome = match state {
            FormState::Idle => Submission::Ignored,
            FormState::Creating { coords } => {
                let created = Utc::now();
                let mut id = self.ids.next_id(created);
                while self.store.find_by_id(&id).is_some() {
                    id = self.ids.next_id(created);
                }
                let workout = Workout::build(
                    values.kind,
                    id.clone(),
                    created,
                    coords,
                    values.distance,
                    values.duration,
                    values.extra,
                );
                if let Err(e) = self.create(workout) {
                    log::error!("Could not store new workout: {e}");
                    self.banner.show(e.to_string(), now, self.config.banner);
                    return Ok(Submission::Ignored);
                }
                log::info!("Created {} workout {id}", values.kind.as_str());
                Submission::Created(id)
            }
            FormState::Editing { target } => {
                let Some(existing) = self.store.find_by_id(&target) else {
                    log::debug!("Edited workout {target} no longer exists");
                    self.form.reset();
                    return Ok(Submission::Ignored);
                };
                let edited = existing.rebuilt(values.distance, values.duration, values.extra);
                if let Err(e) = self.store.replace(&target, edited) {
                    log::warn!("{e}");
                }
                self.persist();
                self.list.render_all(self.store.all());
                log::info!("Updated workout {target}");
                Submission::Updated(target)
            }
        };
        self.form.hide(now, self.config.form_transition);
        Ok(outcome)
    }

    fn create(&mut self, workout: Workout) -> Result<(), StoreError> {
        let id = workout.id.clone();
        self.store.add(workout)?;
        if let (Some(map), Some(stored)) = (self.map.as_mut(), self.store.find_by_id_mut(&id)) {
            stored.marker_id = Some(self.markers.place(map, stored));
        }
        if let Some(stored) = self.store.find_by_id(&id) {
            self.list.render_list_item(stored);
        }
        self.persist();
        Ok(())
    }

    /// Remove a workout, its list entry and the marker with `marker_id`,
    /// falling back to the registry when the caller has no marker id.
    pub fn delete(&mut self, workout_id: &WorkoutId, marker_id: Option<MarkerId>) {
        let marker_id = marker_id.or_else(|| self.markers.marker_for(workout_id));
        let removed = self.store.remove_by_id(workout_id);
        self.list.remove_item(workout_id);
        if let (Some(marker), Some(map)) = (marker_id, self.map.as_mut()) {
            self.markers.remove_by_marker_id(map, marker);
        }
        if self.form.edit_target() == Some(workout_id) {
            self.form.reset();
        }
        match removed {
            Some(_) => {
                self.persist();
                log::info!("Deleted workout {workout_id}");
            }
            None => log::debug!("Delete of unknown workout {workout_id} ignored"),
        }
    }

    pub fn request_delete_all(&mut self) {
        self.confirming_delete_all = true;
    }

    pub fn is_confirming_delete_all(&self) -> bool {
        self.confirming_delete_all
    }

    /// Answer the delete-all prompt. Confirming wipes saved data and reloads.
    pub fn resolve_delete_all(&mut self, confirmed: bool) {
        self.confirming_delete_all = false;
        if !confirmed {
            return;
        }
        let count = self.store.len();
        self.store.clear();
        self.repo.clear();
        self.reload();
        log::info!("Deleted all {count} workouts");
    }

    /// Rebuild every view from persisted state, as on startup.
    pub fn reload(&mut self) {
        match self.map.as_mut() {
            Some(map) => self.markers.clear(map),
            None => self.markers.forget_all(),
        }
        self.store.clear();
        self.list.clear_list();
        self.form.reset();
        self.banner.dismiss();
        self.load_saved();
        self.place_all_markers();
        if let (Some(map), Some(home)) = (self.map.as_mut(), self.home) {
            map.set_view(home, self.config.zoom, false);
        }
    }

    /// Pan the map to a workout.
    pub fn focus(&mut self, id: &WorkoutId) {
        let Some(workout) = self.store.find_by_id(id) else {
            return;
        };
        if let Some(map) = self.map.as_mut() {
            map.set_view(workout.coords, self.config.zoom, true);
        }
    }

    /// A marker was clicked: pan to the workout it belongs to.
    pub fn marker_clicked(&mut self, marker_id: MarkerId) {
        match self.markers.workout_for(marker_id).cloned() {
            Some(id) => self.focus(&id),
            None => log::debug!("Click on unknown marker {marker_id} ignored"),
        }
    }

    /// Run deferred actions that are due.
    pub fn tick(&mut self, now: Instant) {
        self.banner.tick(now);
        self.form.tick(now);
    }

    /// Time until the next deferred action, for scheduling a repaint.
    pub fn next_deadline(&self, now: Instant) -> Option<Duration> {
        match (self.banner.remaining(now), self.form.closing_remaining(now)) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    pub fn banner_message(&self) -> Option<&str> {
        self.banner.message()
    }

    pub fn store(&self) -> &WorkoutStore {
        &self.store
    }

    pub fn workouts(&self) -> &[Workout] {
        self.store.all()
    }

    pub fn list(&self) -> &WorkoutList {
        &self.list
    }

    pub fn form(&self) -> &WorkoutForm {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut WorkoutForm {
        &mut self.form
    }

    #[cfg(test)]
    pub fn markers(&self) -> &MarkerRegistry {
        &self.markers
    }

    pub fn map(&self) -> Option<&M> {
        self.map.as_ref()
    }

    pub fn map_mut(&mut self) -> Option<&mut M> {
        self.map.as_mut()
    }

    pub fn repo(&self) -> &WorkoutRepository<S> {
        &self.repo
    }

    pub fn show_error(&mut self, message: impl Into<String>, now: Instant) {
        self.banner.show(message, now, self.config.banner);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::INVALID_INPUT_MESSAGE;
    use crate::markers::RecordingMap;
    use crate::persistence::{DEFAULT_KEY, MemoryStore};
    use crate::workout::WorkoutType;

    type TestTracker = Tracker<RecordingMap, MemoryStore>;

    fn tracker_with(storage: MemoryStore) -> TestTracker {
        let mut t = Tracker::new(
            WorkoutRepository::new(storage, DEFAULT_KEY),
            TrackerConfig::default(),
        );
        t.attach_map(RecordingMap::default(), Coords::new(38.7, -9.1));
        t
    }

    fn tracker() -> TestTracker {
        tracker_with(MemoryStore::default())
    }

    fn fill(t: &mut TestTracker, kind: WorkoutType, distance: &str, duration: &str, extra: &str) {
        let form = t.form_mut();
        form.set_kind(kind);
        form.distance = distance.into();
        form.duration = duration.into();
        match kind {
            WorkoutType::Running => form.cadence = extra.into(),
            WorkoutType::Cycling => form.elevation = extra.into(),
        }
    }

    fn saved(t: &TestTracker) -> serde_json::Value {
        let blob = t.repo().storage().get(DEFAULT_KEY).unwrap().unwrap();
        serde_json::from_str(&blob).unwrap()
    }

    fn create(t: &mut TestTracker, kind: WorkoutType, d: &str, dur: &str, extra: &str) -> WorkoutId {
        t.map_clicked(Coords::new(38.71, -9.13));
        fill(t, kind, d, dur, extra);
        match t.submit(Instant::now()).unwrap() {
            Submission::Created(id) => id,
            other => panic!("unexpected submission: {other:?}"),
        }
    }

    #[test]
    fn creating_running_workout_updates_every_view() {
        let mut t = tracker();
        let id = create(&mut t, WorkoutType::Running, "5", "30", "150");

        let w = t.store().find_by_id(&id).unwrap();
        assert_eq!(w.workout_type(), WorkoutType::Running);
        assert_eq!(w.metric(), 6.0);
        assert_eq!(w.coords, Coords::new(38.71, -9.13));

        let items = t.list().items();
        assert_eq!(items.len(), 1);
        assert!(items[0].details.iter().any(|d| d.to_string() == "⚡️ 6.0 min/km"));
        assert_eq!(items[0].marker_id, w.marker_id);

        let marker = w.marker_id.unwrap();
        assert_eq!(t.markers().workout_for(marker), Some(&id));
        assert_eq!(t.map().unwrap().markers.len(), 1);

        assert_eq!(saved(&t)[0]["pace"], 6.0);
        assert!(!t.form().is_visible());
    }

    #[test]
    fn creating_cycling_workout_shows_speed() {
        let mut t = tracker();
        let id = create(&mut t, WorkoutType::Cycling, "20", "60", "200");
        assert_eq!(t.store().find_by_id(&id).unwrap().metric(), 20.0);
        assert!(
            t.list().items()[0]
                .details
                .iter()
                .any(|d| d.to_string() == "⚡️ 20.0 km/h")
        );
        assert_eq!(t.map().unwrap().markers[0].1.class, "cycling-popup");
    }

    #[test]
    fn invalid_input_shows_banner_and_mutates_nothing() {
        let mut t = tracker();
        let now = Instant::now();
        t.map_clicked(Coords::new(0.0, 0.0));
        fill(&mut t, WorkoutType::Running, "0", "30", "150");

        assert_eq!(t.submit(now), Err(ValidationError));
        assert!(t.store().is_empty());
        assert!(t.list().items().is_empty());
        assert!(t.repo().storage().get(DEFAULT_KEY).unwrap().is_none());
        assert!(t.form().is_visible());
        assert_eq!(t.banner_message(), Some(INVALID_INPUT_MESSAGE));

        t.tick(now + Duration::from_secs(3));
        assert_eq!(t.banner_message(), None);
    }

    #[test]
    fn editing_recomputes_metric_in_place() {
        let mut t = tracker();
        let first = create(&mut t, WorkoutType::Running, "5", "30", "150");
        let second = create(&mut t, WorkoutType::Cycling, "20", "60", "200");
        let marker = t.store().find_by_id(&first).unwrap().marker_id;

        t.begin_edit(&first);
        assert!(t.form().type_locked());
        assert_eq!(t.form().distance, "5");
        t.form_mut().distance = "10".into();
        assert_eq!(
            t.submit(Instant::now()).unwrap(),
            Submission::Updated(first.clone())
        );

        let w = t.store().find_by_id(&first).unwrap();
        assert_eq!(w.metric(), 3.0);
        assert_eq!(w.marker_id, marker);
        assert_eq!(t.store().position(&first), Some(0));
        assert_eq!(t.store().position(&second), Some(1));

        let items = t.list().items();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].workout_id, first);
        assert!(items[0].details.iter().any(|d| d.to_string() == "⚡️ 3.0 min/km"));

        let blob = saved(&t);
        assert_eq!(blob[0]["distance"], 10.0);
        assert_eq!(blob[0]["pace"], 3.0);
    }

    #[test]
    fn invalid_edit_keeps_original_values() {
        let mut t = tracker();
        let id = create(&mut t, WorkoutType::Running, "5", "30", "150");
        t.begin_edit(&id);
        t.form_mut().distance = "-1".into();
        assert!(t.submit(Instant::now()).is_err());
        assert_eq!(t.store().find_by_id(&id).unwrap().distance, 5.0);
        assert_eq!(t.form().edit_target(), Some(&id));
    }

    #[test]
    fn delete_removes_record_item_and_marker() {
        let mut t = tracker();
        let keep = create(&mut t, WorkoutType::Running, "5", "30", "150");
        let gone = create(&mut t, WorkoutType::Running, "6", "30", "150");
        let item = t.list().item(&gone).unwrap().clone();

        t.delete(&item.workout_id, item.marker_id);

        assert!(t.store().find_by_id(&gone).is_none());
        assert!(t.list().item(&gone).is_none());
        assert_eq!(t.map().unwrap().markers.len(), 1);
        assert_eq!(saved(&t).as_array().unwrap().len(), 1);
        assert!(t.store().find_by_id(&keep).is_some());
    }

    #[test]
    fn deleting_unknown_id_is_a_no_op() {
        let mut t = tracker();
        create(&mut t, WorkoutType::Running, "5", "30", "150");
        let before = t.workouts().to_vec();
        t.delete(&WorkoutId::new("missing"), Some(MarkerId(4242)));
        assert_eq!(t.workouts(), before.as_slice());
        assert_eq!(t.map().unwrap().markers.len(), 1);
    }

    #[test]
    fn delete_all_requires_confirmation() {
        let mut t = tracker();
        create(&mut t, WorkoutType::Running, "5", "30", "150");
        create(&mut t, WorkoutType::Cycling, "20", "60", "200");

        t.request_delete_all();
        assert!(t.is_confirming_delete_all());
        t.resolve_delete_all(false);
        assert_eq!(t.store().len(), 2);

        t.request_delete_all();
        t.resolve_delete_all(true);
        assert!(t.store().is_empty());
        assert!(t.list().items().is_empty());
        assert!(t.map().unwrap().markers.is_empty());
        assert!(t.repo().storage().get(DEFAULT_KEY).unwrap().is_none());
        assert!(!t.form().is_visible());
        let (center, _, animate) = *t.map().unwrap().views.last().unwrap();
        assert_eq!(center, Coords::new(38.7, -9.1));
        assert!(!animate);
    }

    #[test]
    fn startup_restores_list_and_places_markers_once_map_is_ready() {
        let mut first = tracker();
        create(&mut first, WorkoutType::Running, "5", "30", "150");
        create(&mut first, WorkoutType::Cycling, "20", "60", "200");
        let storage = first.repo().storage().clone();

        let mut t: TestTracker = Tracker::new(
            WorkoutRepository::new(storage, DEFAULT_KEY),
            TrackerConfig::default(),
        );
        assert_eq!(t.list().items().len(), 2);
        assert!(t.list().items().iter().all(|i| i.marker_id.is_none()));

        t.attach_map(RecordingMap::default(), Coords::new(0.0, 0.0));
        assert_eq!(t.map().unwrap().markers.len(), 2);
        assert!(t.list().items().iter().all(|i| i.marker_id.is_some()));

        let next = create(&mut t, WorkoutType::Running, "1", "5", "170");
        assert_eq!(t.store().len(), 3);
        assert_eq!(t.store().position(&next), Some(2));
    }

    #[test]
    fn map_clicks_are_ignored_without_a_map() {
        let mut t: TestTracker = Tracker::new(
            WorkoutRepository::new(MemoryStore::default(), DEFAULT_KEY),
            TrackerConfig::default(),
        );
        t.location_failed(&GeolocationError::Denied("blocked".into()));
        assert!(t.alert().is_some());
        t.map_clicked(Coords::new(1.0, 1.0));
        assert!(!t.form().is_visible());
        assert_eq!(t.submit(Instant::now()), Ok(Submission::Ignored));
    }

    #[test]
    fn focus_pans_with_animation() {
        let mut t = tracker();
        let id = create(&mut t, WorkoutType::Running, "5", "30", "150");
        t.focus(&id);
        let (center, zoom, animate) = *t.map().unwrap().views.last().unwrap();
        assert_eq!(center, Coords::new(38.71, -9.13));
        assert_eq!(zoom, 13);
        assert!(animate);
        assert_eq!(t.store().len(), 1);
    }

    fn stored_blob(records: serde_json::Value) -> MemoryStore {
        let mut storage = MemoryStore::default();
        storage.set(DEFAULT_KEY, &records.to_string()).unwrap();
        storage
    }

    fn running_record(id: &str) -> serde_json::Value {
        serde_json::json!({"id": id, "date": "2024-06-10T12:00:00Z", "coords": [0.0, 0.0],
            "distance": 5, "duration": 30, "type": "running", "cadence": 150})
    }

    #[test]
    fn oversized_saved_id_does_not_break_creation() {
        let storage = stored_blob(serde_json::json!([running_record("18446744073709551615")]));
        let mut t = tracker_with(storage);
        assert_eq!(t.store().len(), 1);

        let id = create(&mut t, WorkoutType::Running, "5", "30", "150");
        assert_eq!(id.as_str().len(), 10);
        assert_eq!(t.store().len(), 2);
    }

    #[test]
    fn generated_id_skips_ids_already_stored() {
        let storage = stored_blob(serde_json::json!([
            running_record("0000000000"),
            running_record("9999999999"),
        ]));
        let mut t = tracker_with(storage);

        let id = create(&mut t, WorkoutType::Running, "5", "30", "150");
        assert_ne!(id.as_str(), "0000000000");
        assert_ne!(id.as_str(), "9999999999");
        assert_eq!(t.store().len(), 3);
        assert!(t.list().item(&id).is_some());
        assert_eq!(saved(&t).as_array().unwrap().len(), 3);
        assert!(!t.form().is_visible());
    }

    #[test]
    fn clicking_a_marker_pans_to_its_workout() {
        let mut t = tracker();
        let id = create(&mut t, WorkoutType::Cycling, "20", "60", "200");
        let marker = t.store().find_by_id(&id).unwrap().marker_id.unwrap();
        t.marker_clicked(marker);
        let (center, _, animate) = *t.map().unwrap().views.last().unwrap();
        assert_eq!(center, Coords::new(38.71, -9.13));
        assert!(animate);

        let views = t.map().unwrap().views.len();
        t.marker_clicked(MarkerId(1));
        assert_eq!(t.map().unwrap().views.len(), views);
    }

    #[test]
    fn delete_without_marker_id_uses_registry() {
        let mut t = tracker();
        let id = create(&mut t, WorkoutType::Running, "5", "30", "150");
        t.delete(&id, None);
        assert!(t.map().unwrap().markers.is_empty());
        assert!(t.markers().marker_for(&id).is_none());
    }

    #[test]
    fn deleting_workout_under_edit_closes_form() {
        let mut t = tracker();
        let id = create(&mut t, WorkoutType::Running, "5", "30", "150");
        t.begin_edit(&id);
        let marker = t.store().find_by_id(&id).unwrap().marker_id;
        t.delete(&id, marker);
        assert!(!t.form().is_visible());
    }
}
