//! Projection of workouts into list entries and marker popups.

use crate::workout::{MarkerId, Workout, WorkoutId, WorkoutKind, WorkoutType};

/// One value row of a list entry, e.g. `⏱ 30 min`.
#[derive(Debug, Clone, PartialEq)]
pub struct Detail {
    pub icon: &'static str,
    pub value: String,
    pub unit: &'static str,
}

impl std::fmt::Display for Detail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.icon, self.value, self.unit)
    }
}

/// Rendered list entry. Edit and delete affordances are keyed by both ids.
#[derive(Debug, Clone, PartialEq)]
pub struct ListItem {
    pub workout_id: WorkoutId,
    pub marker_id: Option<MarkerId>,
    pub kind: WorkoutType,
    pub title: String,
    pub details: Vec<Detail>,
}

pub fn marker_class(kind: WorkoutType) -> &'static str {
    match kind {
        WorkoutType::Running => "running-popup",
        WorkoutType::Cycling => "cycling-popup",
    }
}

pub fn popup_content(workout: &Workout) -> String {
    format!("{} {}", workout.workout_type().icon(), workout.description)
}

pub fn list_item(workout: &Workout) -> ListItem {
    let mut details = vec![
        Detail {
            icon: workout.workout_type().icon(),
            value: workout.distance.to_string(),
            unit: "km",
        },
        Detail {
            icon: "⏱",
            value: workout.duration.to_string(),
            unit: "min",
        },
    ];
    match workout.kind {
        WorkoutKind::Running { cadence, pace } => {
            details.push(Detail {
                icon: "⚡️",
                value: format!("{pace:.1}"),
                unit: "min/km",
            });
            details.push(Detail {
                icon: "🦶🏼",
                value: cadence.to_string(),
                unit: "spm",
            });
        }
        WorkoutKind::Cycling {
            elevation_gain,
            speed,
        } => {
            details.push(Detail {
                icon: "⚡️",
                value: format!("{speed:.1}"),
                unit: "km/h",
            });
            details.push(Detail {
                icon: "⛰",
                value: elevation_gain.to_string(),
                unit: "m",
            });
        }
    }
    ListItem {
        workout_id: workout.id.clone(),
        marker_id: workout.marker_id,
        kind: workout.workout_type(),
        title: workout.description.clone(),
        details,
    }
}

/// The rendered workout list, kept apart from the store it mirrors.
#[derive(Debug, Default)]
pub struct WorkoutList {
    items: Vec<ListItem>,
}

impl WorkoutList {
    pub fn render_list_item(&mut self, workout: &Workout) {
        self.items.push(list_item(workout));
    }

    /// Full re-render in store order.
    pub fn render_all(&mut self, workouts: &[Workout]) {
        self.clear_list();
        for w in workouts {
            self.render_list_item(w);
        }
    }

    pub fn clear_list(&mut self) {
        self.items.clear();
    }

    pub fn remove_item(&mut self, workout_id: &WorkoutId) {
        self.items.retain(|i| &i.workout_id != workout_id);
    }

    pub fn items(&self) -> &[ListItem] {
        &self.items
    }

    #[cfg(test)]
    pub fn item(&self, workout_id: &WorkoutId) -> Option<&ListItem> {
        self.items.iter().find(|i| &i.workout_id == workout_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workout::Coords;
    use chrono::{TimeZone, Utc};

    fn date() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 20, 12, 0, 0).unwrap()
    }

    #[test]
    fn running_item_shows_pace_with_one_decimal() {
        let mut w = Workout::running(
            WorkoutId::new("1"),
            date(),
            Coords::new(0.0, 0.0),
            5.0,
            30.0,
            150.0,
        );
        w.marker_id = Some(MarkerId(12));
        let item = list_item(&w);
        let rows: Vec<String> = item.details.iter().map(|d| d.to_string()).collect();
        assert_eq!(rows[0], "🏃‍♂️ 5 km");
        assert_eq!(rows[1], "⏱ 30 min");
        assert_eq!(rows[2], "⚡️ 6.0 min/km");
        assert_eq!(rows[3], "🦶🏼 150 spm");
        assert_eq!(item.marker_id, Some(MarkerId(12)));
        assert_eq!(item.title, w.description);
    }

    #[test]
    fn cycling_item_shows_speed_and_elevation() {
        let w = Workout::cycling(
            WorkoutId::new("2"),
            date(),
            Coords::new(0.0, 0.0),
            20.0,
            60.0,
            200.0,
        );
        let item = list_item(&w);
        assert_eq!(item.details[2].to_string(), "⚡️ 20.0 km/h");
        assert_eq!(item.details[3].to_string(), "⛰ 200 m");
        assert_eq!(popup_content(&w), format!("🚴‍♀️ {}", w.description));
        assert_eq!(marker_class(WorkoutType::Cycling), "cycling-popup");
    }

    #[test]
    fn render_all_replaces_previous_items() {
        let a = Workout::running(WorkoutId::new("a"), date(), Coords::new(0.0, 0.0), 1.0, 5.0, 1.0);
        let b = Workout::running(WorkoutId::new("b"), date(), Coords::new(0.0, 0.0), 2.0, 5.0, 1.0);
        let mut list = WorkoutList::default();
        list.render_list_item(&a);
        list.render_all(&[a.clone(), b.clone()]);
        let ids: Vec<&str> = list.items().iter().map(|i| i.workout_id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);

        list.remove_item(&WorkoutId::new("a"));
        assert!(list.item(&WorkoutId::new("a")).is_none());
        list.clear_list();
        assert!(list.items().is_empty());
    }
}
