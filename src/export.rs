use crate::workout::Workout;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

pub fn write_json<T: Serialize + ?Sized, P: AsRef<Path>>(
    value: &T,
    path: P,
) -> std::io::Result<()> {
    let file = std::fs::File::create(path)?;
    serde_json::to_writer_pretty(file, value)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
}

/// Flat CSV row; the fields of the other workout type stay empty.
#[derive(Serialize)]
struct Row<'a> {
    id: &'a str,
    date: String,
    #[serde(rename = "type")]
    kind: &'static str,
    description: &'a str,
    lat: f64,
    lng: f64,
    distance_km: f64,
    duration_min: f64,
    cadence_spm: Option<f64>,
    elevation_gain_m: Option<f64>,
    pace_min_per_km: Option<f64>,
    speed_km_per_h: Option<f64>,
}

impl<'a> From<&'a Workout> for Row<'a> {
    fn from(w: &'a Workout) -> Self {
        let running = w.cadence().is_some();
        Row {
            id: w.id.as_str(),
            date: w.date.to_rfc3339(),
            kind: w.workout_type().as_str(),
            description: &w.description,
            lat: w.coords.lat,
            lng: w.coords.lng,
            distance_km: w.distance,
            duration_min: w.duration,
            cadence_spm: w.cadence(),
            elevation_gain_m: w.elevation_gain(),
            pace_min_per_km: running.then(|| w.metric()),
            speed_km_per_h: (!running).then(|| w.metric()),
        }
    }
}

pub fn write_workouts_csv(writer: impl Write, workouts: &[Workout]) -> csv::Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for w in workouts {
        wtr.serialize(Row::from(w))?;
    }
    wtr.flush().map_err(Into::into)
}

pub fn save_workouts_csv<P: AsRef<Path>>(path: P, workouts: &[Workout]) -> csv::Result<()> {
    write_workouts_csv(std::fs::File::create(path)?, workouts)
}

pub fn save_workouts_json<P: AsRef<Path>>(path: P, workouts: &[Workout]) -> std::io::Result<()> {
    write_json(workouts, path)
}
