//! Map based workout log: click the map, describe the workout, keep the list.

use eframe::{App, Frame, NativeOptions, egui};
use rfd::FileDialog;
use std::sync::mpsc::{Receiver, TryRecvError};
use std::time::Instant;

use log::info;

mod export;
mod form;
mod geolocation;
mod map;
mod markers;
mod persistence;
mod render;
mod schedule;
mod settings;
mod store;
mod tracker;
mod workout;

use export::{save_workouts_csv, save_workouts_json};
use geolocation::{GeolocationError, spawn_locate};
use map::{MapClick, PlotMap, class_color};
use persistence::{FileStore, WorkoutRepository};
use render::{ListItem, marker_class};
use settings::Settings;
use tracker::{Tracker, TrackerConfig};
use workout::{ALL_WORKOUT_TYPES, Coords, MarkerId, WorkoutId};

/// What the user clicked in the workout list this frame.
enum ListAction {
    Focus(WorkoutId),
    Edit(WorkoutId),
    Delete(WorkoutId, Option<MarkerId>),
}

struct MaptyApp {
    settings: Settings,
    tracker: Tracker<PlotMap, FileStore>,
    location: Option<Receiver<Result<Coords, GeolocationError>>>,
}

impl Default for MaptyApp {
    fn default() -> Self {
        let settings = Settings::load();
        let storage = FileStore::new(settings.data_dir()).with_quota(settings.storage_quota);
        let repo = WorkoutRepository::new(storage, settings.storage_key.clone());
        let tracker = Tracker::new(repo, TrackerConfig::from(&settings));
        let location = Some(spawn_locate(&settings));
        Self {
            settings,
            tracker,
            location,
        }
    }
}

impl MaptyApp {
    fn poll_location(&mut self) {
        let Some(rx) = &self.location else {
            return;
        };
        match rx.try_recv() {
            Ok(Ok(coords)) => {
                info!("Map centred on {}, {}", coords.lat, coords.lng);
                self.tracker
                    .attach_map(PlotMap::new(&self.settings), coords);
                self.location = None;
            }
            Ok(Err(err)) => {
                self.tracker.location_failed(&err);
                self.location = None;
            }
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => {
                self.tracker.location_failed(&GeolocationError::Unavailable(
                    "lookup stopped unexpectedly".into(),
                ));
                self.location = None;
            }
        }
    }

    fn export(&mut self, csv: bool) {
        let (name, ext) = if csv { ("CSV", "csv") } else { ("JSON", "json") };
        let Some(path) = FileDialog::new().add_filter(name, &[ext]).save_file() else {
            return;
        };
        let workouts = self.tracker.workouts();
        let result = if csv {
            save_workouts_csv(&path, workouts).map_err(|e| e.to_string())
        } else {
            save_workouts_json(&path, workouts).map_err(|e| e.to_string())
        };
        match result {
            Ok(()) => info!("Exported {} workouts to {}", workouts.len(), path.display()),
            Err(err) => {
                log::error!("Failed to export workouts: {err}");
                self.tracker
                    .show_error(format!("Export failed: {err}"), Instant::now());
            }
        }
    }

    fn form_ui(&mut self, ui: &mut egui::Ui, now: Instant) {
        let form = self.tracker.form_mut();
        let mut submit = false;
        egui::Frame::group(ui.style()).show(ui, |ui| {
            egui::Grid::new("workout_form").num_columns(2).show(ui, |ui| {
                ui.label("Type");
                ui.add_enabled_ui(!form.type_locked(), |ui| {
                    let mut kind = form.kind();
                    egui::ComboBox::from_id_source("workout_type")
                        .selected_text(kind.label())
                        .show_ui(ui, |ui| {
                            for k in ALL_WORKOUT_TYPES {
                                ui.selectable_value(&mut kind, k, k.label());
                            }
                        });
                    form.set_kind(kind);
                });
                ui.end_row();

                ui.label("Distance");
                let distance = ui.add(
                    egui::TextEdit::singleline(&mut form.distance).hint_text("km"),
                );
                if form.take_focus_request() {
                    distance.request_focus();
                }
                submit |= distance.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
                ui.end_row();

                ui.label("Duration");
                let r = ui.add(egui::TextEdit::singleline(&mut form.duration).hint_text("min"));
                submit |= r.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
                ui.end_row();

                if form.shows_cadence() {
                    ui.label("Cadence");
                    let r = ui.add(
                        egui::TextEdit::singleline(&mut form.cadence).hint_text("step/min"),
                    );
                    submit |= r.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
                    ui.end_row();
                }
                if form.shows_elevation() {
                    ui.label("Elev Gain");
                    let r = ui.add(
                        egui::TextEdit::singleline(&mut form.elevation).hint_text("meters"),
                    );
                    submit |= r.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
                    ui.end_row();
                }
            });
            submit |= ui.button("OK").clicked();
        });
        if submit {
            let _ = self.tracker.submit(now);
        }
    }

    fn list_item_ui(ui: &mut egui::Ui, item: &ListItem) -> Option<ListAction> {
        let mut action = None;
        let color = class_color(marker_class(item.kind));
        egui::Frame::group(ui.style())
            .stroke(egui::Stroke::new(2.0, color))
            .show(ui, |ui| {
                ui.horizontal(|ui| {
                    let title = ui.add(
                        egui::Label::new(egui::RichText::new(&item.title).strong())
                            .sense(egui::Sense::click()),
                    );
                    if title.clicked() {
                        action = Some(ListAction::Focus(item.workout_id.clone()));
                    }
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        if ui.small_button("X").on_hover_text("Delete").clicked() {
                            action = Some(ListAction::Delete(
                                item.workout_id.clone(),
                                item.marker_id,
                            ));
                        }
                        if ui.small_button("E").on_hover_text("Edit").clicked() {
                            action = Some(ListAction::Edit(item.workout_id.clone()));
                        }
                    });
                });
                ui.horizontal_wrapped(|ui| {
                    for detail in &item.details {
                        let r = ui.add(
                            egui::Label::new(detail.to_string()).sense(egui::Sense::click()),
                        );
                        if r.clicked() && action.is_none() {
                            action = Some(ListAction::Focus(item.workout_id.clone()));
                        }
                    }
                });
            });
        action
    }

    fn workouts_panel(&mut self, ui: &mut egui::Ui, now: Instant) {
        ui.heading("mapty");
        ui.separator();

        if self.tracker.form().is_visible() {
            self.form_ui(ui, now);
        } else if let Some(left) = self.tracker.form().closing_remaining(now) {
            // Collapse the empty form slot over the transition.
            let total = self.settings.form_transition().as_secs_f32().max(f32::EPSILON);
            let height = 60.0 * (left.as_secs_f32() / total).clamp(0.0, 1.0);
            ui.allocate_space(egui::vec2(ui.available_width(), height));
        } else if self.tracker.map().is_some() && self.tracker.workouts().is_empty() {
            ui.label("Click on the map to log a workout.");
        }

        let mut action = None;
        egui::ScrollArea::vertical().show(ui, |ui| {
            for item in self.tracker.list().items() {
                if let Some(a) = Self::list_item_ui(ui, item) {
                    action = Some(a);
                }
            }
        });
        match action {
            Some(ListAction::Focus(id)) => self.tracker.focus(&id),
            Some(ListAction::Edit(id)) => self.tracker.begin_edit(&id),
            Some(ListAction::Delete(id, marker)) => self.tracker.delete(&id, marker),
            None => {}
        }

        ui.separator();
        if let Some(map) = self.tracker.map() {
            ui.small(format!("Tiles: {}", map.tile_url()));
        }
        if ui
            .add_enabled(
                !self.tracker.store().is_empty(),
                egui::Button::new("Delete all workouts"),
            )
            .clicked()
        {
            self.tracker.request_delete_all();
        }
    }
}

impl App for MaptyApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut Frame) {
        let now = Instant::now();
        self.poll_location();
        self.tracker.tick(now);

        egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.menu_button("File", |ui| {
                    if ui.button("Export JSON").clicked() {
                        self.export(false);
                        ui.close_menu();
                    }
                    if ui.button("Export CSV").clicked() {
                        self.export(true);
                        ui.close_menu();
                    }
                    ui.separator();
                    if ui.button("Quit").clicked() {
                        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                    }
                });
            });
        });

        egui::SidePanel::left("workouts")
            .resizable(true)
            .default_width(320.0)
            .show(ctx, |ui| self.workouts_panel(ui, now));

        egui::CentralPanel::default().show(ctx, |ui| {
            match self.tracker.map_mut().and_then(|map| map.show(ui)) {
                Some(MapClick::Empty(coords)) => self.tracker.map_clicked(coords),
                Some(MapClick::Marker(marker)) => self.tracker.marker_clicked(marker),
                None => {}
            }
            if self.tracker.map().is_none() {
                ui.centered_and_justified(|ui| {
                    if self.tracker.alert().is_some() {
                        ui.label("Map unavailable");
                    } else {
                        ui.spinner();
                    }
                });
            }
        });

        if self.tracker.is_confirming_delete_all() {
            let mut answer = None;
            egui::Window::new("Delete all workouts?")
                .collapsible(false)
                .resizable(false)
                .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
                .show(ctx, |ui| {
                    ui.label("Are you sure you want to delete every workout?");
                    ui.horizontal(|ui| {
                        if ui.button("Delete").clicked() {
                            answer = Some(true);
                        }
                        if ui.button("Cancel").clicked() {
                            answer = Some(false);
                        }
                    });
                });
            if let Some(confirmed) = answer {
                self.tracker.resolve_delete_all(confirmed);
            }
        }

        if let Some(alert) = self.tracker.alert().map(str::to_owned) {
            let mut dismissed = false;
            egui::Window::new("Geolocation")
                .collapsible(false)
                .resizable(false)
                .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
                .show(ctx, |ui| {
                    ui.label(alert);
                    dismissed = ui.button("OK").clicked();
                });
            if dismissed {
                self.tracker.dismiss_alert();
            }
        }

        if let Some(message) = self.tracker.banner_message() {
            egui::Area::new(egui::Id::new("error_banner"))
                .anchor(egui::Align2::CENTER_TOP, [0.0, 30.0])
                .show(ctx, |ui| {
                    egui::Frame::popup(ui.style())
                        .fill(egui::Color32::from_rgb(0xc0, 0x39, 0x2b))
                        .show(ui, |ui| {
                            ui.colored_label(egui::Color32::WHITE, message);
                        });
                });
        }

        if let Some(wait) = self.tracker.next_deadline(now) {
            ctx.request_repaint_after(wait);
        }
        if self.location.is_some() {
            ctx.request_repaint_after(std::time::Duration::from_millis(100));
        }
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.settings.save();
    }
}

fn main() -> eframe::Result<()> {
    env_logger::init();
    let options = NativeOptions::default();
    eframe::run_native(
        "Mapty",
        options,
        Box::new(|_cc| Box::new(MaptyApp::default())),
    )
}
