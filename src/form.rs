//! Workout form state machine and input validation.

use std::time::{Duration, Instant};

use crate::schedule::Deferred;
use crate::workout::{Coords, Workout, WorkoutId, WorkoutType};

pub const INVALID_INPUT_MESSAGE: &str = "Inputs have to be positive numbers!";

/// Rejection of a submission; carries no per-field detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationError;

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(INVALID_INPUT_MESSAGE)
    }
}

impl std::error::Error for ValidationError {}

/// Accept only when every value is finite and strictly positive.
pub fn validate(values: &[f64]) -> Result<(), ValidationError> {
    if values.iter().all(|v| v.is_finite() && *v > 0.0) {
        Ok(())
    } else {
        Err(ValidationError)
    }
}

/// Numeric value of a text field. Empty input reads as zero, anything
/// unparseable as NaN; both fail [`validate`].
pub fn parse_input(text: &str) -> f64 {
    let text = text.trim();
    if text.is_empty() {
        return 0.0;
    }
    text.parse().unwrap_or(f64::NAN)
}

#[derive(Debug, Clone, PartialEq)]
pub enum FormState {
    /// Form hidden.
    Idle,
    /// New workout at the clicked coordinate.
    Creating { coords: Coords },
    /// Pre-filled with an existing workout; the target id is the hidden field.
    Editing { target: WorkoutId },
}

/// Validated contents of the form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FormValues {
    pub kind: WorkoutType,
    pub distance: f64,
    pub duration: f64,
    /// Cadence for running, elevation gain for cycling.
    pub extra: f64,
}

#[derive(Debug)]
pub struct WorkoutForm {
    state: FormState,
    kind: WorkoutType,
    pub distance: String,
    pub duration: String,
    pub cadence: String,
    pub elevation: String,
    type_locked: bool,
    focus_distance: bool,
    closing: Deferred,
}

impl Default for WorkoutForm {
    fn default() -> Self {
        Self {
            state: FormState::Idle,
            kind: WorkoutType::Running,
            distance: String::new(),
            duration: String::new(),
            cadence: String::new(),
            elevation: String::new(),
            type_locked: false,
            focus_distance: false,
            closing: Deferred::default(),
        }
    }
}

impl WorkoutForm {
    pub fn state(&self) -> &FormState {
        &self.state
    }

    pub fn is_visible(&self) -> bool {
        self.state != FormState::Idle
    }

    pub fn edit_target(&self) -> Option<&WorkoutId> {
        match &self.state {
            FormState::Editing { target } => Some(target),
            _ => None,
        }
    }

    pub fn kind(&self) -> WorkoutType {
        self.kind
    }

    pub fn type_locked(&self) -> bool {
        self.type_locked
    }

    /// Change the selected type; ignored while editing.
    pub fn set_kind(&mut self, kind: WorkoutType) -> bool {
        if self.type_locked {
            return false;
        }
        self.kind = kind;
        true
    }

    pub fn shows_cadence(&self) -> bool {
        self.kind == WorkoutType::Running
    }

    pub fn shows_elevation(&self) -> bool {
        self.kind == WorkoutType::Cycling
    }

    fn clear_fields(&mut self) {
        self.distance.clear();
        self.duration.clear();
        self.cadence.clear();
        self.elevation.clear();
        self.type_locked = false;
    }

    pub fn open_at(&mut self, coords: Coords) {
        self.clear_fields();
        self.state = FormState::Creating { coords };
        self.focus_distance = true;
        self.closing.cancel();
    }

    pub fn open_for_edit(&mut self, workout: &Workout) {
        self.clear_fields();
        self.kind = workout.workout_type();
        self.type_locked = true;
        self.distance = workout.distance.to_string();
        self.duration = workout.duration.to_string();
        if let Some(cadence) = workout.cadence() {
            self.cadence = cadence.to_string();
        }
        if let Some(elevation) = workout.elevation_gain() {
            self.elevation = elevation.to_string();
        }
        self.state = FormState::Editing {
            target: workout.id.clone(),
        };
        self.focus_distance = true;
        self.closing.cancel();
    }

    /// Parse and validate distance, duration and the field matching the type.
    pub fn read(&self) -> Result<FormValues, ValidationError> {
        let distance = parse_input(&self.distance);
        let duration = parse_input(&self.duration);
        let extra = match self.kind {
            WorkoutType::Running => parse_input(&self.cadence),
            WorkoutType::Cycling => parse_input(&self.elevation),
        };
        validate(&[distance, duration, extra])?;
        Ok(FormValues {
            kind: self.kind,
            distance,
            duration,
            extra,
        })
    }

    /// Reset the fields and hide the form, starting the closing transition.
    pub fn hide(&mut self, now: Instant, transition: Duration) {
        self.clear_fields();
        self.state = FormState::Idle;
        self.focus_distance = false;
        self.closing.schedule(now, transition);
    }

    /// Hide immediately, without a transition.
    pub fn reset(&mut self) {
        self.clear_fields();
        self.state = FormState::Idle;
        self.focus_distance = false;
        self.closing.cancel();
    }

    /// Returns `true` once after the form was opened.
    pub fn take_focus_request(&mut self) -> bool {
        std::mem::take(&mut self.focus_distance)
    }

    pub fn closing_remaining(&self, now: Instant) -> Option<Duration> {
        self.closing.remaining(now)
    }

    pub fn tick(&mut self, now: Instant) {
        self.closing.fire(now);
    }
}
