//! Workout records and their derived metrics.

use chrono::{DateTime, Datelike, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

const MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Number of trailing timestamp digits kept in a [`WorkoutId`].
const ID_DIGITS: u64 = 10_000_000_000;

/// Identifier of a workout, derived from its creation time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkoutId(String);

impl WorkoutId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn numeric(&self) -> Option<u64> {
        self.0.parse().ok().filter(|v| *v < ID_DIGITS)
    }
}

impl fmt::Display for WorkoutId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier handed out by the map surface when a marker is placed.
///
/// Lives in a different identifier space than [`WorkoutId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MarkerId(pub u64);

impl fmt::Display for MarkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hands out time derived ids, bumping duplicates created within the same
/// millisecond.
#[derive(Debug, Default)]
pub struct IdGenerator {
    last: Option<u64>,
}

impl IdGenerator {
    pub fn next_id(&mut self, created: DateTime<Utc>) -> WorkoutId {
        let mut candidate = created.timestamp_millis().unsigned_abs() % ID_DIGITS;
        if let Some(last) = self.last {
            if candidate <= last {
                candidate = (last + 1) % ID_DIGITS;
            }
        }
        self.last = Some(candidate);
        WorkoutId(format!("{candidate:010}"))
    }

    /// Account for an id handed out earlier, e.g. one loaded from disk.
    /// Ids outside the ten digit range were not generated here and are ignored.
    pub fn observe(&mut self, id: &WorkoutId) {
        let Some(value) = id.numeric() else {
            return;
        };
        if self.last.map_or(true, |last| value > last) {
            self.last = Some(value);
        }
    }
}

/// Latest instant not after `now` whose trailing millisecond digits match
/// `id`. Returns `None` for ids that were not generated from a timestamp.
pub fn date_from_id(id: &WorkoutId, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let digits = id.numeric()? as i64;
    let now_ms = now.timestamp_millis();
    let back = (now_ms - digits).rem_euclid(ID_DIGITS as i64);
    DateTime::from_timestamp_millis(now_ms - back)
}

/// Geographic position of a workout.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Coords {
    pub lat: f64,
    pub lng: f64,
}

impl Coords {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

impl From<[f64; 2]> for Coords {
    fn from([lat, lng]: [f64; 2]) -> Self {
        Self { lat, lng }
    }
}

impl From<Coords> for [f64; 2] {
    fn from(c: Coords) -> Self {
        [c.lat, c.lng]
    }
}

/// Discriminant of a [`WorkoutKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkoutType {
    Running,
    Cycling,
}

pub const ALL_WORKOUT_TYPES: [WorkoutType; 2] = [WorkoutType::Running, WorkoutType::Cycling];

impl WorkoutType {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkoutType::Running => "running",
            WorkoutType::Cycling => "cycling",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            WorkoutType::Running => "Running",
            WorkoutType::Cycling => "Cycling",
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            WorkoutType::Running => "🏃‍♂️",
            WorkoutType::Cycling => "🚴‍♀️",
        }
    }

    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "running" => Some(WorkoutType::Running),
            "cycling" => Some(WorkoutType::Cycling),
            _ => None,
        }
    }
}

/// Variant specific fields together with the metric derived from them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WorkoutKind {
    /// `pace` is minutes per kilometre.
    Running { cadence: f64, pace: f64 },
    /// `speed` is kilometres per hour.
    #[serde(rename_all = "camelCase")]
    Cycling { elevation_gain: f64, speed: f64 },
}

impl WorkoutKind {
    pub fn workout_type(&self) -> WorkoutType {
        match self {
            WorkoutKind::Running { .. } => WorkoutType::Running,
            WorkoutKind::Cycling { .. } => WorkoutType::Cycling,
        }
    }
}

pub fn calc_pace(distance: f64, duration: f64) -> f64 {
    duration / distance
}

pub fn calc_speed(distance: f64, duration: f64) -> f64 {
    distance / (duration / 60.0)
}

/// Human readable title such as "Running on April 14".
pub fn describe(kind: WorkoutType, day: NaiveDate) -> String {
    format!(
        "{} on {} {}",
        kind.label(),
        MONTHS[day.month0() as usize],
        day.day()
    )
}

/// Persisted form; loading goes through a tolerant reader that rebuilds
/// each record from its type tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Workout {
    pub id: WorkoutId,
    pub date: DateTime<Utc>,
    pub coords: Coords,
    pub distance: f64,
    pub duration: f64,
    pub description: String,
    #[serde(flatten)]
    pub kind: WorkoutKind,
    #[serde(skip)]
    pub marker_id: Option<MarkerId>,
}

impl Workout {
    pub fn running(
        id: WorkoutId,
        date: DateTime<Utc>,
        coords: Coords,
        distance: f64,
        duration: f64,
        cadence: f64,
    ) -> Self {
        let kind = WorkoutKind::Running {
            cadence,
            pace: calc_pace(distance, duration),
        };
        Self::with_kind(id, date, coords, distance, duration, kind)
    }

    pub fn cycling(
        id: WorkoutId,
        date: DateTime<Utc>,
        coords: Coords,
        distance: f64,
        duration: f64,
        elevation_gain: f64,
    ) -> Self {
        let kind = WorkoutKind::Cycling {
            elevation_gain,
            speed: calc_speed(distance, duration),
        };
        Self::with_kind(id, date, coords, distance, duration, kind)
    }

    /// Build the variant matching `kind`; `extra` is cadence for running and
    /// elevation gain for cycling.
    pub fn build(
        kind: WorkoutType,
        id: WorkoutId,
        date: DateTime<Utc>,
        coords: Coords,
        distance: f64,
        duration: f64,
        extra: f64,
    ) -> Self {
        match kind {
            WorkoutType::Running => Self::running(id, date, coords, distance, duration, extra),
            WorkoutType::Cycling => Self::cycling(id, date, coords, distance, duration, extra),
        }
    }

    fn with_kind(
        id: WorkoutId,
        date: DateTime<Utc>,
        coords: Coords,
        distance: f64,
        duration: f64,
        kind: WorkoutKind,
    ) -> Self {
        let description = describe(kind.workout_type(), date.with_timezone(&Local).date_naive());
        Self {
            id,
            date,
            coords,
            distance,
            duration,
            description,
            kind,
            marker_id: None,
        }
    }

    pub fn workout_type(&self) -> WorkoutType {
        self.kind.workout_type()
    }

    /// Pace for running, speed for cycling.
    pub fn metric(&self) -> f64 {
        match self.kind {
            WorkoutKind::Running { pace, .. } => pace,
            WorkoutKind::Cycling { speed, .. } => speed,
        }
    }

    pub fn cadence(&self) -> Option<f64> {
        match self.kind {
            WorkoutKind::Running { cadence, .. } => Some(cadence),
            WorkoutKind::Cycling { .. } => None,
        }
    }

    pub fn elevation_gain(&self) -> Option<f64> {
        match self.kind {
            WorkoutKind::Cycling { elevation_gain, .. } => Some(elevation_gain),
            WorkoutKind::Running { .. } => None,
        }
    }

    /// Rebuild this workout from edited values, keeping identity, creation
    /// time, position and marker.
    pub fn rebuilt(&self, distance: f64, duration: f64, extra: f64) -> Self {
        let mut next = Self::build(
            self.workout_type(),
            self.id.clone(),
            self.date,
            self.coords,
            distance,
            duration,
            extra,
        );
        next.marker_id = self.marker_id;
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn running_pace_is_duration_over_distance() {
        let cases = [(5.0, 30.0), (10.0, 30.0), (0.3, 7.0), (42.195, 181.5)];
        for (distance, duration) in cases {
            let w = Workout::running(
                WorkoutId::new("1"),
                date(),
                Coords::new(0.0, 0.0),
                distance,
                duration,
                150.0,
            );
            assert_eq!(w.metric(), duration / distance);
            assert_eq!(w.cadence(), Some(150.0));
            assert_eq!(w.elevation_gain(), None);
        }
    }

    #[test]
    fn cycling_speed_is_distance_per_hour() {
        let w = Workout::cycling(
            WorkoutId::new("2"),
            date(),
            Coords::new(0.0, 0.0),
            20.0,
            60.0,
            200.0,
        );
        assert_eq!(w.metric(), 20.0);
        assert_eq!(w.elevation_gain(), Some(200.0));

        let w = Workout::cycling(
            WorkoutId::new("3"),
            date(),
            Coords::new(0.0, 0.0),
            27.0,
            95.0,
            10.0,
        );
        assert_eq!(w.metric(), 27.0 / (95.0 / 60.0));
    }

    #[test]
    fn description_uses_month_name_and_day() {
        let day = NaiveDate::from_ymd_opt(2024, 4, 14).unwrap();
        assert_eq!(describe(WorkoutType::Running, day), "Running on April 14");
        let day = NaiveDate::from_ymd_opt(2023, 12, 1).unwrap();
        assert_eq!(describe(WorkoutType::Cycling, day), "Cycling on December 1");
    }

    #[test]
    fn rebuilt_keeps_identity_and_recomputes_metric() {
        let mut w = Workout::running(
            WorkoutId::new("42"),
            date(),
            Coords::new(51.5, -0.1),
            5.0,
            30.0,
            150.0,
        );
        w.marker_id = Some(MarkerId(7));
        let edited = w.rebuilt(10.0, 30.0, 160.0);
        assert_eq!(edited.id, w.id);
        assert_eq!(edited.date, w.date);
        assert_eq!(edited.coords, w.coords);
        assert_eq!(edited.marker_id, Some(MarkerId(7)));
        assert_eq!(edited.metric(), 3.0);
        assert_eq!(edited.cadence(), Some(160.0));
    }

    #[test]
    fn ids_are_ten_digits_and_unique_within_a_millisecond() {
        let mut ids = IdGenerator::default();
        let a = ids.next_id(date());
        let b = ids.next_id(date());
        assert_eq!(a.as_str().len(), 10);
        assert_ne!(a, b);
        assert!(b > a);
    }

    #[test]
    fn observed_ids_are_never_reissued() {
        let mut ids = IdGenerator::default();
        let loaded = WorkoutId::new("9999999990");
        ids.observe(&loaded);
        ids.observe(&WorkoutId::new("not-a-number"));
        assert_eq!(ids.next_id(date()).as_str(), "9999999991");
    }

    #[test]
    fn out_of_range_ids_are_ignored_and_generation_wraps() {
        let mut ids = IdGenerator::default();
        ids.observe(&WorkoutId::new("18446744073709551615"));
        ids.observe(&WorkoutId::new("10000000000"));
        assert_eq!(ids.last, None);

        ids.observe(&WorkoutId::new("9999999999"));
        assert_eq!(ids.next_id(date()).as_str(), "0000000000");
    }

    #[test]
    fn date_is_recovered_from_id_digits() {
        let now = Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap();
        let created = now - chrono::Duration::days(3);
        let id = IdGenerator::default().next_id(created);
        assert_eq!(date_from_id(&id, now), Some(created));
        assert_eq!(date_from_id(&WorkoutId::new("abc"), now), None);
        assert_eq!(date_from_id(&WorkoutId::new("18446744073709551615"), now), None);
    }

    #[test]
    fn serializes_with_type_tag_and_coordinate_pair() {
        let w = Workout::cycling(
            WorkoutId::new("0000000001"),
            date(),
            Coords::new(1.5, 2.5),
            20.0,
            60.0,
            200.0,
        );
        let value = serde_json::to_value(&w).unwrap();
        assert_eq!(value["type"], "cycling");
        assert_eq!(value["coords"], serde_json::json!([1.5, 2.5]));
        assert_eq!(value["elevationGain"], 200.0);
        assert_eq!(value["speed"], 20.0);
        assert!(value.get("marker_id").is_none());
    }
}
