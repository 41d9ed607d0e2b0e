//! Map surface drawn with `egui_plot`: longitude on x, latitude on y.

use eframe::egui;
use egui_plot::{MarkerShape, Plot, PlotBounds, PlotPoint, Points, Text};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use crate::markers::{MapSurface, MarkerSpec};
use crate::settings::Settings;
use crate::workout::{Coords, MarkerId};

const RUNNING_COLOR: egui::Color32 = egui::Color32::from_rgb(0x00, 0xc4, 0x6a);
const CYCLING_COLOR: egui::Color32 = egui::Color32::from_rgb(0xff, 0xb5, 0x45);

pub fn class_color(class: &str) -> egui::Color32 {
    match class {
        "cycling-popup" => CYCLING_COLOR,
        _ => RUNNING_COLOR,
    }
}

#[derive(Debug, Clone, Copy)]
struct Pan {
    from: Coords,
    to: Coords,
    started: Instant,
    duration: Duration,
}

impl Pan {
    fn progress(&self, now: Instant) -> f64 {
        if self.duration.is_zero() {
            return 1.0;
        }
        (now.saturating_duration_since(self.started).as_secs_f64() / self.duration.as_secs_f64())
            .clamp(0.0, 1.0)
    }

    fn position(&self, now: Instant) -> Coords {
        let t = ease_in_out(self.progress(now));
        Coords::new(
            self.from.lat + (self.to.lat - self.from.lat) * t,
            self.from.lng + (self.to.lng - self.from.lng) * t,
        )
    }
}

fn ease_in_out(t: f64) -> f64 {
    t * t * (3.0 - 2.0 * t)
}

/// Width and height in degrees of the area visible at `zoom`.
fn span(zoom: u8) -> f64 {
    720.0 / 2f64.powi(zoom as i32)
}

/// What a click on the map hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MapClick {
    Empty(Coords),
    Marker(MarkerId),
}

/// Marker closest to `pointer` within `radius`, in plot units.
fn marker_at(
    pointer: PlotPoint,
    markers: &BTreeMap<MarkerId, MarkerSpec>,
    radius: f64,
) -> Option<MarkerId> {
    markers
        .iter()
        .map(|(id, spec)| {
            let d = (spec.coords.lng - pointer.x).powi(2) + (spec.coords.lat - pointer.y).powi(2);
            (*id, d)
        })
        .filter(|(_, d)| *d <= radius * radius)
        .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(id, _)| id)
}

fn bounds_around(center: Coords, zoom: u8) -> PlotBounds {
    let half = span(zoom) / 2.0;
    PlotBounds::from_min_max(
        [center.lng - half, center.lat - half],
        [center.lng + half, center.lat + half],
    )
}

pub struct PlotMap {
    tile_url: String,
    attribution: String,
    markers: BTreeMap<MarkerId, MarkerSpec>,
    next_id: u64,
    center: Coords,
    zoom: u8,
    visible_center: Option<Coords>,
    pan: Option<Pan>,
    pan_duration: Duration,
    reset_bounds: bool,
}

impl PlotMap {
    pub fn new(settings: &Settings) -> Self {
        Self {
            tile_url: settings.tile_url.clone(),
            attribution: settings.attribution.clone(),
            markers: BTreeMap::new(),
            next_id: 0,
            center: Coords::new(0.0, 0.0),
            zoom: settings.zoom_level,
            visible_center: None,
            pan: None,
            pan_duration: settings.pan_duration(),
            reset_bounds: true,
        }
    }

    pub fn tile_url(&self) -> &str {
        &self.tile_url
    }

    #[cfg(test)]
    pub fn center(&self) -> Coords {
        self.center
    }

    #[cfg(test)]
    pub fn is_panning(&self) -> bool {
        self.pan.is_some()
    }

    #[cfg(test)]
    pub fn marker(&self, id: MarkerId) -> Option<&MarkerSpec> {
        self.markers.get(&id)
    }

    #[cfg(test)]
    pub fn marker_count(&self) -> usize {
        self.markers.len()
    }

    /// Draw the map and report a click on it, if any.
    pub fn show(&mut self, ui: &mut egui::Ui) -> Option<MapClick> {
        let now = Instant::now();
        let target = match self.pan {
            Some(pan) => Some(pan.position(now)),
            None if self.reset_bounds => Some(self.center),
            None => None,
        };
        let zoom = self.zoom;
        let markers = &self.markers;

        let response = Plot::new("workout_map")
            .data_aspect(1.0)
            .allow_double_click_reset(false)
            .show(ui, |plot_ui| {
                if let Some(center) = target {
                    plot_ui.set_plot_bounds(bounds_around(center, zoom));
                }
                for spec in markers.values() {
                    let color = class_color(spec.class);
                    let at = [spec.coords.lng, spec.coords.lat];
                    plot_ui.points(
                        Points::new(vec![at])
                            .shape(MarkerShape::Circle)
                            .radius(6.0)
                            .color(color),
                    );
                    plot_ui.text(
                        Text::new(
                            PlotPoint::new(at[0], at[1]),
                            egui::RichText::new(&spec.popup)
                                .color(egui::Color32::BLACK)
                                .background_color(color),
                        )
                        .anchor(egui::Align2::CENTER_BOTTOM),
                    );
                }
                let bounds = plot_ui.plot_bounds();
                let visible = bounds.center();
                let pointer = plot_ui.pointer_coordinate().map(|p| {
                    match marker_at(p, markers, bounds.width() * 0.01) {
                        Some(id) => MapClick::Marker(id),
                        None => MapClick::Empty(Coords::new(p.y, p.x)),
                    }
                });
                (pointer, Coords::new(visible.y, visible.x))
            });

        let (pointer, visible) = response.inner;
        self.visible_center = Some(visible);
        self.reset_bounds = false;
        if let Some(pan) = self.pan {
            if pan.progress(now) >= 1.0 {
                self.pan = None;
            } else {
                ui.ctx().request_repaint();
            }
        }

        let rect = response.response.rect;
        ui.painter().text(
            rect.right_bottom() - egui::vec2(4.0, 4.0),
            egui::Align2::RIGHT_BOTTOM,
            &self.attribution,
            egui::FontId::proportional(10.0),
            egui::Color32::GRAY,
        );

        if response.response.clicked() {
            pointer
        } else {
            None
        }
    }
}

impl MapSurface for PlotMap {
    fn add_marker(&mut self, marker: MarkerSpec) -> MarkerId {
        self.next_id += 1;
        let id = MarkerId(self.next_id);
        self.markers.insert(id, marker);
        id
    }

    fn remove_marker(&mut self, id: MarkerId) -> bool {
        self.markers.remove(&id).is_some()
    }

    fn set_view(&mut self, center: Coords, zoom: u8, animate: bool) {
        if animate && !self.pan_duration.is_zero() {
            self.pan = Some(Pan {
                from: self.visible_center.unwrap_or(self.center),
                to: center,
                started: Instant::now(),
                duration: self.pan_duration,
            });
        } else {
            self.pan = None;
            self.reset_bounds = true;
        }
        self.center = center;
        self.zoom = zoom;
    }
}
