pub mod settings;

use settings::{
    format_hex_color, TransformMode, ViewSettings, MAX_LIGHT_INTENSITY, MAX_SLIDER_SCALE,
    MIN_MODEL_SCALE, SCALE_STEP,
};

/// What the panel knows about the model pipeline this frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModelStatus<'a> {
    /// A resource handle exists (or is about to); enables the settings.
    pub has_model: bool,
    pub loading: bool,
    pub file_name: Option<&'a str>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PanelActions {
    pub open_file: bool,
    pub mode_changed: bool,
}

pub struct ControlPanel {
    status: Option<String>,
}

impl Default for ControlPanel {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlPanel {
    pub fn new() -> Self {
        Self { status: None }
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = Some(status.into());
    }

    pub fn clear_status(&mut self) {
        self.status = None;
    }

    #[cfg(test)]
    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn show(
        &mut self,
        ctx: &egui::Context,
        settings: &mut ViewSettings,
        model: ModelStatus<'_>,
    ) -> PanelActions {
        let mut actions = PanelActions::default();

        if !settings.show_controls {
            egui::Area::new(egui::Id::new("show_controls"))
                .anchor(egui::Align2::LEFT_TOP, [16.0, 16.0])
                .show(ctx, |ui| {
                    if ui.button("Show controls").clicked() {
                        settings.show_controls = true;
                    }
                });
            return actions;
        }

        egui::Window::new("Model viewer")
            .anchor(egui::Align2::LEFT_TOP, [16.0, 16.0])
            .resizable(false)
            .collapsible(false)
            .default_width(240.0)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    if ui.button("Upload model").clicked() {
                        actions.open_file = true;
                    }
                    if ui.button("Hide controls").clicked() {
                        settings.show_controls = false;
                    }
                });
                ui.label(egui::RichText::new("Accepts .glb and .gltf, or drop a file").small());

                if model.loading {
                    ui.horizontal(|ui| {
                        ui.add(egui::Spinner::new());
                        ui.label("Loading...");
                    });
                } else if let Some(name) = model.file_name {
                    ui.label(format!("Showing {}", name));
                }
                if let Some(status) = &self.status {
                    let color = ui.visuals().error_fg_color;
                    ui.colored_label(color, status);
                }

                if model.has_model {
                    ui.separator();
                    actions.mode_changed = model_settings(ui, settings);
                }
            });

        actions
    }
}

/// Settings shown once a model exists. Returns whether the transform mode changed.
fn model_settings(ui: &mut egui::Ui, settings: &mut ViewSettings) -> bool {
    let mode_before = settings.transform_mode;

    ui.horizontal(|ui| {
        ui.label("Background");
        ui.color_edit_button_srgb(&mut settings.background);
        ui.monospace(format_hex_color(settings.background));
    });

    ui.label(format!("Light intensity: {:.1}", settings.light_intensity));
    ui.add(
        egui::Slider::new(&mut settings.light_intensity, 0.0..=MAX_LIGHT_INTENSITY)
            .step_by(0.1)
            .show_value(false),
    );

    ui.label(format!("Model scale: {:.1}", settings.scale));
    ui.horizontal(|ui| {
        if ui.button("-").clicked() {
            settings.adjust_scale(-SCALE_STEP);
        }
        let mut scale = settings.scale;
        let response = ui.add(
            egui::Slider::new(&mut scale, MIN_MODEL_SCALE..=MAX_SLIDER_SCALE)
                .step_by(SCALE_STEP as f64)
                .clamping(egui::SliderClamping::Edits)
                .show_value(false),
        );
        if response.changed() {
            settings.set_scale(scale);
        }
        if ui.button("+").clicked() {
            settings.adjust_scale(SCALE_STEP);
        }
    });

    ui.checkbox(&mut settings.auto_rotate, "Auto-rotate");

    ui.label("Transform");
    ui.horizontal(|ui| {
        for mode in TransformMode::BUTTONS {
            if ui
                .selectable_label(settings.transform_mode == mode, mode.label())
                .clicked()
            {
                settings.press_mode(mode);
            }
        }
    });

    if ui.button("Reset model settings").clicked() {
        settings.reset();
    }
    ui.label(egui::RichText::new("W/E/R: transform   Esc: none   Home: reset   F: frame").small());

    settings.transform_mode != mode_before
}
