mod input;
mod timing;

use crate::assets::{GltfLoader, ResourceHandle, SelectedFile, UploadController};
use crate::config::{ViewerConfig, CONFIG_FILE_NAME};
use crate::render::axes::paint_axis_helper;
use crate::render::gizmo::GIZMO_SIZE;
use crate::render::{
    FrameScene, GizmoEvent, LightRig, OrbitController, PointerSample, Projector, SceneRenderer,
    TransformGizmo,
};
use crate::scene::{ModelPresenter, Transform};
use crate::ui::settings::{TransformMode, ViewSettings};
use crate::ui::{ControlPanel, ModelStatus};
use glam::Vec3;
use input::Shortcut;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use timing::FrameTiming;

const APP_TITLE: &str = "modelview";

pub struct ViewerApp {
    config: ViewerConfig,
    upload: UploadController,
    loader: GltfLoader,
    presenter: ModelPresenter,
    settings: ViewSettings,
    camera: OrbitController,
    gizmo: TransformGizmo,
    /// Gizmo-controlled group the presented model sits under.
    group: Transform,
    renderer: SceneRenderer,
    panel: ControlPanel,
    timing: FrameTiming,
    /// Handle whose load failed; not retried until another file is selected.
    failed_handle: Option<ResourceHandle>,
    file_name: Option<String>,
}

impl ViewerApp {
    pub fn new(config: ViewerConfig) -> Self {
        let now = Instant::now();
        let settings = ViewSettings::with_defaults(
            config.lighting.default_intensity,
            config.view.background_rgb(),
            config.view.default_scale,
        );
        Self {
            upload: UploadController::new(Duration::from_millis(config.view.swap_delay_ms)),
            loader: GltfLoader::new(),
            presenter: ModelPresenter::new(),
            settings,
            camera: OrbitController::new(&config.surface, config.orbit.clone()),
            gizmo: TransformGizmo::new(GIZMO_SIZE),
            group: Transform::IDENTITY,
            renderer: SceneRenderer::new(config.contact_shadow.clone()),
            panel: ControlPanel::new(),
            timing: FrameTiming::new(APP_TITLE.to_string(), now),
            failed_handle: None,
            file_name: None,
            config,
        }
    }

    /// File-selection event from the picker or a drop. `None` is a no-op.
    fn select(&mut self, file: Option<SelectedFile>, now: Instant) {
        let Some(file) = file else {
            return;
        };
        let name = file.name.clone();
        self.presenter.unmount();
        self.group = Transform::IDENTITY;
        self.renderer.invalidate_shadows();
        if self.upload.select_file(Some(file), &mut self.loader, now) {
            self.failed_handle = None;
            self.file_name = Some(name);
            self.panel.clear_status();
        }
    }

    fn select_path(&mut self, path: PathBuf, now: Instant) {
        match SelectedFile::read(path) {
            Ok(file) => self.select(Some(file), now),
            Err(err) => {
                log::warn!("{}", err);
                self.panel.set_status(err.to_string());
            }
        }
    }

    fn pick_file(&mut self, now: Instant) {
        let path = rfd::FileDialog::new()
            .add_filter("glTF", &["glb", "gltf"])
            .pick_file();
        if let Some(path) = path {
            self.select_path(path, now);
        }
    }

    fn handle_dropped_files(&mut self, ctx: &egui::Context, now: Instant) {
        let dropped = ctx.input(|i| i.raw.dropped_files.last().cloned());
        let Some(dropped) = dropped else {
            return;
        };
        if let Some(bytes) = dropped.bytes {
            let name = if dropped.name.is_empty() {
                "dropped model".to_string()
            } else {
                dropped.name
            };
            self.select(Some(SelectedFile::from_bytes(name, bytes)), now);
        } else if let Some(path) = dropped.path {
            self.select_path(path, now);
        }
    }

    /// Completes a due swap and brings the presenter in line with the
    /// visible handle.
    fn advance(&mut self, now: Instant) {
        if let Some(handle) = self.upload.poll(now) {
            log::debug!("Swap complete; presenting {}", handle);
        }

        let visible = self
            .upload
            .current()
            .filter(|_| self.upload.is_visible())
            .cloned();
        let Some(handle) = visible else {
            if self.presenter.unmount().is_some() {
                self.renderer.invalidate_shadows();
            }
            return;
        };
        if self.presenter.handle() == Some(&handle) || self.failed_handle.as_ref() == Some(&handle)
        {
            return;
        }

        match self
            .presenter
            .mount(&handle, &mut self.loader, self.upload.registry())
        {
            Ok(()) => {
                self.panel.clear_status();
                if let Some(copy) = self.presenter.scene() {
                    log::info!(
                        "Presenting {} ({} meshes)",
                        handle,
                        copy.graph().mesh_count()
                    );
                }
            }
            Err(err) => {
                log::warn!("Failed to load model {}: {}", handle, err);
                self.panel.set_status(format!("Failed to load model: {}", err));
                self.failed_handle = Some(handle);
            }
        }
    }

    /// Settings stay enabled across a pending swap so the panel does not flicker.
    fn model_status(&self) -> ModelStatus<'_> {
        ModelStatus {
            has_model: self.upload.current().is_some() || self.upload.is_swap_pending(),
            loading: self.upload.is_swap_pending(),
            file_name: self.file_name.as_deref(),
        }
    }

    fn on_gizmo_event(&mut self, event: GizmoEvent) {
        if event == GizmoEvent::DragStarted {
            self.settings.begin_gizmo_drag();
        }
    }

    fn apply_shortcuts(&mut self, shortcuts: Vec<Shortcut>) {
        for shortcut in shortcuts {
            if input::apply_shortcut(&mut self.settings, shortcut) {
                continue;
            }
            if shortcut == Shortcut::FrameModel {
                self.frame_model();
            }
        }
    }

    fn frame_model(&mut self) {
        let Some(copy) = self.presenter.scene() else {
            return;
        };
        let Some((min, max)) = copy.graph().bounds() else {
            return;
        };
        let model = self.group.matrix() * self.presenter.model_matrix();
        let mut world_min = Vec3::splat(f32::INFINITY);
        let mut world_max = Vec3::splat(f32::NEG_INFINITY);
        for i in 0..8 {
            let corner = Vec3::new(
                if i & 1 == 0 { min.x } else { max.x },
                if i & 2 == 0 { min.y } else { max.y },
                if i & 4 == 0 { min.z } else { max.z },
            );
            let p = model.transform_point3(corner);
            world_min = world_min.min(p);
            world_max = world_max.max(p);
        }
        self.camera.frame_bounds(world_min, world_max);
    }

    fn clamp_pixels_per_point(&self, ctx: &egui::Context) {
        let Some(native) = ctx.native_pixels_per_point() else {
            return;
        };
        let surface = &self.config.surface;
        let target = native.clamp(surface.dpr_min, surface.dpr_max);
        if (ctx.pixels_per_point() - target).abs() > 1e-3 {
            ctx.set_pixels_per_point(target);
        }
    }

    /// Draws the 3D viewport. Returns whether something is still animating.
    fn viewport(&mut self, ui: &mut egui::Ui, dt: f32) -> bool {
        let rect = ui.max_rect();
        let response = ui.allocate_rect(rect, egui::Sense::click_and_drag());

        let mode = if self.presenter.is_mounted() {
            self.settings.transform_mode
        } else {
            TransformMode::None
        };
        let projector = Projector::new(&self.camera, rect);
        let pointer = ui.input(|i| PointerSample {
            pos: i.pointer.interact_pos(),
            pressed: i.pointer.primary_pressed() && response.hovered(),
            down: i.pointer.primary_down(),
        });
        let event = self
            .gizmo
            .interact(mode, &projector, &mut self.group, pointer);
        self.on_gizmo_event(event);
        if self.gizmo.is_dragging() {
            ui.ctx().set_cursor_icon(egui::CursorIcon::Grabbing);
        } else if self.gizmo.hovered().is_some() {
            ui.ctx().set_cursor_icon(egui::CursorIcon::Grab);
        }

        if !event.captures_pointer() {
            for gesture in input::collect_gestures(ui, &response) {
                input::apply_gesture(&mut self.camera, gesture, rect.height());
            }
        }
        let camera_moving = self.camera.update();

        self.presenter.set_scale(self.settings.scale);
        let auto_rotate = self.settings.effective_auto_rotate();
        self.presenter.update(dt, auto_rotate);

        let projector = Projector::new(&self.camera, rect);
        let lights = LightRig::new(&self.settings, &self.config.lighting);
        let painter = ui.painter_at(rect);
        let model = self.group.matrix() * self.presenter.model_matrix();
        let scene = match (self.presenter.handle(), self.presenter.scene()) {
            (Some(handle), Some(copy)) => Some(FrameScene {
                handle,
                graph: copy.graph(),
                model,
            }),
            _ => None,
        };

        let render_start = Instant::now();
        let stats = self.renderer.paint(
            &painter,
            &projector,
            &lights,
            self.settings.background,
            scene,
        );
        log::trace!(
            "Drew {} faces ({} culled, {} shadow cells)",
            stats.triangles,
            stats.culled,
            stats.shadow_cells
        );
        self.timing
            .record_render(render_start.elapsed().as_secs_f32() * 1000.0, stats.triangles);

        self.gizmo.paint(&painter, mode, &projector, &self.group);
        paint_axis_helper(&painter, rect, projector.view());

        camera_moving || self.gizmo.is_dragging() || (auto_rotate && self.presenter.is_mounted())
    }
}

impl eframe::App for ViewerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();
        if let Some(title) = self.timing.update(now) {
            ctx.send_viewport_cmd(egui::ViewportCommand::Title(title));
        }
        self.clamp_pixels_per_point(ctx);

        self.handle_dropped_files(ctx, now);
        self.advance(now);
        self.apply_shortcuts(input::read_shortcuts(ctx));

        // Built from disjoint fields (same as `model_status`) so `self.panel`
        // and `self.settings` can be borrowed mutably below.
        let status = ModelStatus {
            has_model: self.upload.current().is_some() || self.upload.is_swap_pending(),
            loading: self.upload.is_swap_pending(),
            file_name: self.file_name.as_deref(),
        };
        let actions = self.panel.show(ctx, &mut self.settings, status);
        if actions.mode_changed {
            log::debug!("Transform mode: {:?}", self.settings.transform_mode);
        }
        if actions.open_file {
            self.pick_file(now);
        }

        let dt = self.timing.frame_dt;
        let animating = egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| self.viewport(ui, dt))
            .inner;

        if animating {
            ctx.request_repaint();
        } else if let Some(wait) = self.upload.time_until_swap(Instant::now()) {
            ctx.request_repaint_after(wait);
        }
    }
}

impl Drop for ViewerApp {
    fn drop(&mut self) {
        self.presenter.unmount();
        self.upload.teardown(&mut self.loader);
        log::info!("Viewer closed");
    }
}

pub fn run() -> eframe::Result {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let config = ViewerConfig::load_or_default(Path::new(CONFIG_FILE_NAME));
    log::info!("Starting {}", APP_TITLE);

    let [width, height] = config.surface.window_size;
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(APP_TITLE)
            .with_inner_size([width, height])
            .with_drag_and_drop(true),
        ..Default::default()
    };
    let result = eframe::run_native(
        APP_TITLE,
        options,
        Box::new(move |cc| {
            cc.egui_ctx.options_mut(|o| o.zoom_with_keyboard = false);
            Ok(Box::new(ViewerApp::new(config)))
        }),
    );
    log::info!("Goodbye");
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::fixtures::triangle_glb;

    fn app() -> ViewerApp {
        ViewerApp::new(ViewerConfig::default())
    }

    fn glb(name: &str) -> Option<SelectedFile> {
        Some(SelectedFile::from_bytes(name, triangle_glb(1, 1)))
    }

    #[test]
    fn uploading_twice_replaces_handle_and_copy() {
        let mut app = app();
        let t0 = Instant::now();
        let delay = Duration::from_millis(100);

        app.select(glb("model.glb"), t0);
        app.advance(t0);
        assert!(!app.presenter.is_mounted());
        app.advance(t0 + delay);
        let first = app.presenter.handle().cloned().expect("first mounted");
        assert!(app.loader.is_cached(&first));
        app.presenter.scene().expect("copy").graph().root.traverse(
            glam::Mat4::IDENTITY,
            &mut |node, _| {
                if let Some(mesh) = &node.mesh {
                    assert!(mesh.cast_shadow && mesh.receive_shadow);
                }
            },
        );

        let t1 = t0 + delay * 3;
        app.select(glb("model2.glb"), t1);
        assert!(!app.presenter.is_mounted());
        assert!(!app.upload.registry().is_live(&first));
        assert!(!app.loader.is_cached(&first));

        app.advance(t1 + delay);
        let second = app.presenter.handle().cloned().expect("second mounted");
        assert_ne!(first, second);
        assert_eq!(app.upload.registry().live_count(), 1);
        assert_eq!(app.file_name.as_deref(), Some("model2.glb"));
    }

    #[test]
    fn failed_load_reports_status_and_is_not_retried() {
        let mut app = app();
        let t0 = Instant::now();
        app.select(Some(SelectedFile::from_bytes("broken.glb", b"nope".to_vec())), t0);
        app.advance(t0 + Duration::from_millis(100));
        assert!(!app.presenter.is_mounted());
        assert!(app.panel.status().is_some());
        let failed = app.failed_handle.clone().expect("failure recorded");
        assert!(app.upload.registry().is_live(&failed));

        app.advance(t0 + Duration::from_millis(200));
        assert_eq!(app.failed_handle.as_ref(), Some(&failed));

        app.select(glb("model.glb"), t0 + Duration::from_millis(300));
        assert!(app.panel.status().is_none());
        app.advance(t0 + Duration::from_millis(400));
        assert!(app.presenter.is_mounted());
    }

    #[test]
    fn new_upload_starts_from_identity_group() {
        let mut app = app();
        let t0 = Instant::now();
        app.select(glb("a.glb"), t0);
        app.advance(t0 + Duration::from_millis(100));
        app.group.translation = Vec3::new(4.0, 0.0, 0.0);
        app.group.scale = Vec3::splat(2.0);

        let t1 = t0 + Duration::from_millis(200);
        app.select(glb("b.glb"), t1);
        app.advance(t1 + Duration::from_millis(100));
        assert!(app.presenter.is_mounted());
        assert_eq!(app.group, Transform::IDENTITY);
    }

    #[test]
    fn settings_stay_enabled_during_swap() {
        let mut app = app();
        assert!(!app.model_status().has_model);
        let t0 = Instant::now();
        app.select(glb("a.glb"), t0);
        let pending = app.model_status();
        assert!(pending.has_model && pending.loading);

        app.advance(t0 + Duration::from_millis(100));
        app.select(glb("b.glb"), t0 + Duration::from_millis(200));
        assert!(app.upload.current().is_none());
        assert!(app.model_status().has_model);
    }

    #[test]
    fn selecting_nothing_keeps_current_model() {
        let mut app = app();
        let t0 = Instant::now();
        app.select(glb("model.glb"), t0);
        app.advance(t0 + Duration::from_millis(100));
        app.select(None, t0 + Duration::from_millis(200));
        assert!(app.presenter.is_mounted());
    }

    #[test]
    fn gizmo_drag_start_turns_auto_rotate_off() {
        let mut app = app();
        app.settings.auto_rotate = true;
        app.settings.press_mode(TransformMode::Rotate);
        assert!(!app.settings.effective_auto_rotate());
        app.on_gizmo_event(GizmoEvent::Hovered);
        assert!(app.settings.auto_rotate);
        app.on_gizmo_event(GizmoEvent::DragStarted);
        assert!(!app.settings.auto_rotate);
    }

    #[test]
    fn frame_shortcut_targets_model_bounds() {
        let mut app = app();
        let t0 = Instant::now();
        app.select(glb("model.glb"), t0);
        app.advance(t0 + Duration::from_millis(100));
        app.group.translation = Vec3::new(4.0, 0.0, 0.0);
        app.apply_shortcuts(vec![Shortcut::FrameModel, Shortcut::Mode(TransformMode::Scale)]);
        assert!(app.camera.target.x > 3.0);
        assert_eq!(app.settings.transform_mode, TransformMode::Scale);
    }
}
