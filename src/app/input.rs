use crate::render::OrbitController;
use crate::ui::settings::{TransformMode, ViewSettings};
use egui::{Key, PointerButton, Response};
use glam::Vec2;

/// Wheel pixels per zoom step.
const WHEEL_STEP_PX: f32 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OrbitGesture {
    /// Pointer or one-finger drag, in pixels.
    Rotate(Vec2),
    /// Secondary/middle drag or two-finger drag, in pixels.
    Pan(Vec2),
    /// Wheel steps, positive zooms in.
    Zoom(f32),
    /// Pinch ratio, above 1 zooms in.
    Pinch(f32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shortcut {
    Mode(TransformMode),
    ClearMode,
    Reset,
    FrameModel,
}

/// Orbit gestures over the viewport this frame. A multi-touch gesture
/// replaces the single-pointer ones so two fingers never rotate.
pub fn collect_gestures(ui: &egui::Ui, response: &Response) -> Vec<OrbitGesture> {
    let mut gestures = Vec::new();
    if let Some(touch) = ui.input(|i| i.multi_touch()) {
        if response.hovered() || response.dragged() {
            if touch.zoom_delta != 1.0 {
                gestures.push(OrbitGesture::Pinch(touch.zoom_delta));
            }
            if touch.translation_delta != egui::Vec2::ZERO {
                gestures.push(OrbitGesture::Pan(to_glam(touch.translation_delta)));
            }
        }
        return gestures;
    }

    if response.dragged_by(PointerButton::Primary) {
        gestures.push(OrbitGesture::Rotate(to_glam(response.drag_delta())));
    }
    if response.dragged_by(PointerButton::Secondary) || response.dragged_by(PointerButton::Middle)
    {
        gestures.push(OrbitGesture::Pan(to_glam(response.drag_delta())));
    }
    if response.hovered() {
        let (scroll, zoom) = ui.input(|i| (i.smooth_scroll_delta.y, i.zoom_delta()));
        if scroll != 0.0 {
            gestures.push(OrbitGesture::Zoom(scroll / WHEEL_STEP_PX));
        }
        if zoom != 1.0 {
            gestures.push(OrbitGesture::Pinch(zoom));
        }
    }
    gestures.retain(|g| match g {
        OrbitGesture::Rotate(d) | OrbitGesture::Pan(d) => *d != Vec2::ZERO,
        _ => true,
    });
    gestures
}

pub fn apply_gesture(camera: &mut OrbitController, gesture: OrbitGesture, viewport_height: f32) {
    match gesture {
        OrbitGesture::Rotate(delta) => camera.rotate_drag(delta, viewport_height),
        OrbitGesture::Pan(delta) => camera.pan_drag(delta, viewport_height),
        OrbitGesture::Zoom(steps) => camera.zoom(steps),
        OrbitGesture::Pinch(ratio) => camera.pinch(ratio),
    }
}

pub fn shortcut_for_key(key: Key) -> Option<Shortcut> {
    match key {
        Key::W => Some(Shortcut::Mode(TransformMode::Translate)),
        Key::E => Some(Shortcut::Mode(TransformMode::Rotate)),
        Key::R => Some(Shortcut::Mode(TransformMode::Scale)),
        Key::Escape => Some(Shortcut::ClearMode),
        Key::Home => Some(Shortcut::Reset),
        Key::F => Some(Shortcut::FrameModel),
        _ => None,
    }
}

/// Shortcuts pressed this frame, unless a text field has keyboard focus.
pub fn read_shortcuts(ctx: &egui::Context) -> Vec<Shortcut> {
    if ctx.wants_keyboard_input() {
        return Vec::new();
    }
    ctx.input(|i| {
        i.events
            .iter()
            .filter_map(|event| match event {
                egui::Event::Key {
                    key,
                    pressed: true,
                    repeat: false,
                    modifiers,
                    ..
                } if modifiers.is_none() => shortcut_for_key(*key),
                _ => None,
            })
            .collect()
    })
}

/// Applies a settings shortcut. Returns `false` for shortcuts the caller
/// has to handle itself.
pub fn apply_shortcut(settings: &mut ViewSettings, shortcut: Shortcut) -> bool {
    match shortcut {
        Shortcut::Mode(mode) => settings.press_mode(mode),
        Shortcut::ClearMode => settings.transform_mode = TransformMode::None,
        Shortcut::Reset => settings.reset(),
        Shortcut::FrameModel => return false,
    }
    true
}

fn to_glam(v: egui::Vec2) -> Vec2 {
    Vec2::new(v.x, v.y)
}
