use crate::render::{marker_class, popup_content};
use crate::workout::{Coords, MarkerId, Workout, WorkoutId};

/// What the map needs to draw a marker.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerSpec {
    pub coords: Coords,
    pub popup: String,
    /// Styling class, `"running-popup"` or `"cycling-popup"`.
    pub class: &'static str,
}

/// Surface markers are drawn on. Marker ids are only known after placement.
pub trait MapSurface {
    fn add_marker(&mut self, marker: MarkerSpec) -> MarkerId;
    /// Returns `false` when no marker with `id` is attached.
    fn remove_marker(&mut self, id: MarkerId) -> bool;
    fn set_view(&mut self, center: Coords, zoom: u8, animate: bool);
}

#[derive(Debug, Clone, PartialEq)]
struct Placement {
    workout: WorkoutId,
    marker: MarkerId,
}

/// Which marker belongs to which workout.
#[derive(Debug, Default)]
pub struct MarkerRegistry {
    placements: Vec<Placement>,
}

impl MarkerRegistry {
    pub fn place<M: MapSurface>(&mut self, map: &mut M, workout: &Workout) -> MarkerId {
        let marker = map.add_marker(MarkerSpec {
            coords: workout.coords,
            popup: popup_content(workout),
            class: marker_class(workout.workout_type()),
        });
        self.placements.push(Placement {
            workout: workout.id.clone(),
            marker,
        });
        marker
    }

    /// Detach the marker with its own `marker_id` and return the workout it
    /// belonged to. Unknown ids are ignored.
    pub fn remove_by_marker_id<M: MapSurface>(
        &mut self,
        map: &mut M,
        marker_id: MarkerId,
    ) -> Option<WorkoutId> {
        let idx = self.placements.iter().position(|p| p.marker == marker_id)?;
        let placement = self.placements.remove(idx);
        if !map.remove_marker(marker_id) {
            log::debug!("Marker {marker_id} was already detached");
        }
        Some(placement.workout)
    }

    pub fn marker_for(&self, workout_id: &WorkoutId) -> Option<MarkerId> {
        self.placements
            .iter()
            .find(|p| &p.workout == workout_id)
            .map(|p| p.marker)
    }

    pub fn workout_for(&self, marker_id: MarkerId) -> Option<&WorkoutId> {
        self.placements
            .iter()
            .find(|p| p.marker == marker_id)
            .map(|p| &p.workout)
    }

    pub fn clear<M: MapSurface>(&mut self, map: &mut M) {
        for p in self.placements.drain(..) {
            map.remove_marker(p.marker);
        }
    }

    /// Forget every placement without touching a map.
    pub fn forget_all(&mut self) {
        self.placements.clear();
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.placements.len()
    }
}

/// Map surface that only records what it was asked to do.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingMap {
    pub markers: Vec<(MarkerId, MarkerSpec)>,
    pub views: Vec<(Coords, u8, bool)>,
    next_id: u64,
}

#[cfg(test)]
impl MapSurface for RecordingMap {
    fn add_marker(&mut self, marker: MarkerSpec) -> MarkerId {
        self.next_id += 1;
        let id = MarkerId(100 + self.next_id);
        self.markers.push((id, marker));
        id
    }

    fn remove_marker(&mut self, id: MarkerId) -> bool {
        let before = self.markers.len();
        self.markers.retain(|(m, _)| *m != id);
        before != self.markers.len()
    }

    fn set_view(&mut self, center: Coords, zoom: u8, animate: bool) {
        self.views.push((center, zoom, animate));
    }
}
