use crate::workout::{Workout, WorkoutId};

#[derive(Debug, PartialEq)]
pub enum StoreError {
    DuplicateId(WorkoutId),
    NotFound(WorkoutId),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::DuplicateId(id) => write!(f, "workout {id} already exists"),
            StoreError::NotFound(id) => write!(f, "workout {id} not found"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Ordered in-memory collection of workouts; insertion order is the
/// rendering order.
#[derive(Debug, Default)]
pub struct WorkoutStore {
    workouts: Vec<Workout>,
}

impl WorkoutStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, workout: Workout) -> Result<(), StoreError> {
        if self.position(&workout.id).is_some() {
            return Err(StoreError::DuplicateId(workout.id));
        }
        self.workouts.push(workout);
        Ok(())
    }

    pub fn find_by_id(&self, id: &WorkoutId) -> Option<&Workout> {
        self.workouts.iter().find(|w| &w.id == id)
    }

    pub fn find_by_id_mut(&mut self, id: &WorkoutId) -> Option<&mut Workout> {
        self.workouts.iter_mut().find(|w| &w.id == id)
    }

    pub fn position(&self, id: &WorkoutId) -> Option<usize> {
        self.workouts.iter().position(|w| &w.id == id)
    }

    /// Remove the workout with `id`; absent ids are ignored.
    pub fn remove_by_id(&mut self, id: &WorkoutId) -> Option<Workout> {
        let idx = self.position(id)?;
        Some(self.workouts.remove(idx))
    }

    /// Swap in `workout` at the slot of `id`, returning the previous record.
    ///
    /// The stored record always keeps `id`, whatever `workout.id` says.
    pub fn replace(&mut self, id: &WorkoutId, mut workout: Workout) -> Result<Workout, StoreError> {
        let idx = self
            .position(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        workout.id = id.clone();
        Ok(std::mem::replace(&mut self.workouts[idx], workout))
    }

    pub fn clear(&mut self) {
        self.workouts.clear();
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Workout> {
        self.workouts.iter_mut()
    }

    pub fn all(&self) -> &[Workout] {
        &self.workouts
    }

    pub fn len(&self) -> usize {
        self.workouts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workouts.is_empty()
    }
}
