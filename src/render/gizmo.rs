use super::Projector;
use crate::scene::Transform;
use crate::ui::settings::TransformMode;
use egui::{Color32, Painter, Pos2, Stroke};
use glam::{Quat, Vec2, Vec3};

/// Gizmo size relative to the default handle length.
pub const GIZMO_SIZE: f32 = 0.7;

const PICK_RADIUS_PX: f32 = 8.0;
const UNIFORM_RADIUS_PX: f32 = 9.0;
const RING_SEGMENTS: usize = 48;
const MIN_SCALE: f32 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GizmoAxis {
    X,
    Y,
    Z,
}

impl GizmoAxis {
    pub const ALL: [GizmoAxis; 3] = [GizmoAxis::X, GizmoAxis::Y, GizmoAxis::Z];

    pub fn unit(self) -> Vec3 {
        match self {
            GizmoAxis::X => Vec3::X,
            GizmoAxis::Y => Vec3::Y,
            GizmoAxis::Z => Vec3::Z,
        }
    }

    pub fn color(self) -> Color32 {
        match self {
            GizmoAxis::X => Color32::from_rgb(230, 60, 60),
            GizmoAxis::Y => Color32::from_rgb(80, 200, 80),
            GizmoAxis::Z => Color32::from_rgb(70, 110, 240),
        }
    }

    fn index(self) -> usize {
        match self {
            GizmoAxis::X => 0,
            GizmoAxis::Y => 1,
            GizmoAxis::Z => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GizmoHandle {
    /// Arrow for translate, box-tipped line for scale.
    Axis(GizmoAxis),
    Ring(GizmoAxis),
    Uniform,
}

impl GizmoHandle {
    fn color(self) -> Color32 {
        match self {
            GizmoHandle::Axis(axis) | GizmoHandle::Ring(axis) => axis.color(),
            GizmoHandle::Uniform => Color32::from_gray(200),
        }
    }
}

/// Pointer state over the viewport for one frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct PointerSample {
    pub pos: Option<Pos2>,
    pub pressed: bool,
    pub down: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GizmoEvent {
    Idle,
    Hovered,
    DragStarted,
    Dragging,
    DragEnded,
}

impl GizmoEvent {
    /// Whether the gizmo owns the pointer this frame.
    pub fn captures_pointer(self) -> bool {
        matches!(self, GizmoEvent::DragStarted | GizmoEvent::Dragging)
    }
}

#[derive(Debug, Clone, Copy)]
struct ActiveDrag {
    handle: GizmoHandle,
    mode: TransformMode,
    last: Pos2,
}

struct HandleShape {
    handle: GizmoHandle,
    points: Vec<Pos2>,
}

/// Screen-space transform gizmo acting on the model group.
pub struct TransformGizmo {
    size: f32,
    hovered: Option<GizmoHandle>,
    active: Option<ActiveDrag>,
}

impl Default for TransformGizmo {
    fn default() -> Self {
        Self::new(GIZMO_SIZE)
    }
}

impl TransformGizmo {
    pub fn new(size: f32) -> Self {
        Self {
            size,
            hovered: None,
            active: None,
        }
    }

    pub fn is_dragging(&self) -> bool {
        self.active.is_some()
    }

    pub fn hovered(&self) -> Option<GizmoHandle> {
        self.hovered
    }

    /// Feeds one frame of pointer input; drags write straight into `transform`.
    pub fn interact(
        &mut self,
        mode: TransformMode,
        projector: &Projector,
        transform: &mut Transform,
        pointer: PointerSample,
    ) -> GizmoEvent {
        if !mode.is_active() {
            self.hovered = None;
            return match self.active.take() {
                Some(_) => GizmoEvent::DragEnded,
                None => GizmoEvent::Idle,
            };
        }

        if let Some(mut drag) = self.active {
            if !pointer.down {
                self.active = None;
                return GizmoEvent::DragEnded;
            }
            if let Some(pos) = pointer.pos {
                self.apply_drag(drag, projector, transform, pos);
                drag.last = pos;
                self.active = Some(drag);
            }
            return GizmoEvent::Dragging;
        }

        let shapes = self.layout(mode, projector, transform);
        self.hovered = pointer.pos.and_then(|pos| pick(&shapes, pos));
        match (self.hovered, pointer.pos) {
            (Some(handle), Some(pos)) if pointer.pressed => {
                log::debug!("Gizmo drag started on {:?}", handle);
                self.active = Some(ActiveDrag {
                    handle,
                    mode,
                    last: pos,
                });
                GizmoEvent::DragStarted
            }
            (Some(_), _) => GizmoEvent::Hovered,
            _ => GizmoEvent::Idle,
        }
    }

    pub fn paint(
        &self,
        painter: &Painter,
        mode: TransformMode,
        projector: &Projector,
        transform: &Transform,
    ) {
        let highlighted = self.active.map(|drag| drag.handle).or(self.hovered);
        for shape in self.layout(mode, projector, transform) {
            let color = if highlighted == Some(shape.handle) {
                Color32::from_rgb(255, 220, 40)
            } else {
                shape.handle.color()
            };
            match shape.handle {
                GizmoHandle::Uniform => {
                    if let Some(center) = shape.points.first() {
                        painter.rect_filled(
                            egui::Rect::from_center_size(*center, egui::Vec2::splat(10.0)),
                            1.0,
                            color,
                        );
                    }
                }
                GizmoHandle::Ring(_) => {
                    painter.add(egui::Shape::closed_line(shape.points, Stroke::new(2.0, color)));
                }
                GizmoHandle::Axis(_) => {
                    let [start, tip] = [shape.points[0], shape.points[1]];
                    painter.line_segment([start, tip], Stroke::new(2.5, color));
                    match mode {
                        TransformMode::Scale => {
                            painter.rect_filled(
                                egui::Rect::from_center_size(tip, egui::Vec2::splat(8.0)),
                                0.0,
                                color,
                            );
                        }
                        _ => {
                            painter.circle_filled(tip, 4.5, color);
                        }
                    }
                }
            }
        }
    }

    /// World length of an axis handle at `origin`; keeps the on-screen size
    /// roughly constant while zooming.
    fn world_length(&self, projector: &Projector, origin: Vec3) -> f32 {
        let distance = (projector.eye() - origin).length();
        let fov_factor = (1.9 * (projector.fov_y() * 0.5).tan()).min(7.0);
        (distance * fov_factor / 7.0 * self.size).max(1e-4)
    }

    fn layout(
        &self,
        mode: TransformMode,
        projector: &Projector,
        transform: &Transform,
    ) -> Vec<HandleShape> {
        let origin = transform.translation;
        let Some(origin_s) = projector.project(origin) else {
            return Vec::new();
        };
        let length = self.world_length(projector, origin);
        let mut shapes = Vec::new();
        match mode {
            TransformMode::None => {}
            TransformMode::Translate | TransformMode::Scale => {
                for axis in GizmoAxis::ALL {
                    if let Some(tip) = projector.project(origin + axis.unit() * length) {
                        shapes.push(HandleShape {
                            handle: GizmoHandle::Axis(axis),
                            points: vec![origin_s, tip],
                        });
                    }
                }
                if mode == TransformMode::Scale {
                    shapes.push(HandleShape {
                        handle: GizmoHandle::Uniform,
                        points: vec![origin_s],
                    });
                }
            }
            TransformMode::Rotate => {
                for axis in GizmoAxis::ALL {
                    let normal = axis.unit();
                    let u = normal.any_orthonormal_vector();
                    let v = normal.cross(u);
                    let points: Option<Vec<Pos2>> = (0..RING_SEGMENTS)
                        .map(|i| {
                            let t = i as f32 / RING_SEGMENTS as f32 * std::f32::consts::TAU;
                            projector.project(origin + (u * t.cos() + v * t.sin()) * length)
                        })
                        .collect();
                    if let Some(points) = points {
                        shapes.push(HandleShape {
                            handle: GizmoHandle::Ring(axis),
                            points,
                        });
                    }
                }
            }
        }
        shapes
    }

    fn apply_drag(
        &self,
        drag: ActiveDrag,
        projector: &Projector,
        transform: &mut Transform,
        to: Pos2,
    ) {
        let from = drag.last;
        let origin = transform.translation;
        let Some(origin_s) = projector.project(origin) else {
            return;
        };
        let length = self.world_length(projector, origin);
        let moved = to2(to) - to2(from);

        match drag.handle {
            GizmoHandle::Axis(axis) => {
                let Some(tip) = projector.project(origin + axis.unit() * length) else {
                    return;
                };
                let screen_axis = to2(tip) - to2(origin_s);
                let len_sq = screen_axis.length_squared();
                if len_sq < 1.0 {
                    return;
                }
                let along = moved.dot(screen_axis) / len_sq;
                if drag.mode == TransformMode::Scale {
                    let factor = (1.0 + along).clamp(0.5, 2.0);
                    let i = axis.index();
                    transform.scale[i] = (transform.scale[i] * factor).max(MIN_SCALE);
                } else {
                    transform.translation += axis.unit() * along * length;
                }
            }
            GizmoHandle::Uniform => {
                let factor = (1.0 + (moved.x - moved.y) / 100.0).clamp(0.5, 2.0);
                transform.scale = (transform.scale * factor).max(Vec3::splat(MIN_SCALE));
            }
            GizmoHandle::Ring(axis) => {
                let a0 = to2(from) - to2(origin_s);
                let a1 = to2(to) - to2(origin_s);
                if a0.length_squared() < 1.0 || a1.length_squared() < 1.0 {
                    return;
                }
                // Screen y points down, so a positive screen angle is clockwise.
                let screen_delta = a0.perp_dot(a1).atan2(a0.dot(a1));
                let facing = axis.unit().dot(projector.eye() - origin) >= 0.0;
                let angle = if facing { -screen_delta } else { screen_delta };
                transform.rotation =
                    (Quat::from_axis_angle(axis.unit(), angle) * transform.rotation).normalize();
            }
        }
    }
}

fn to2(pos: Pos2) -> Vec2 {
    Vec2::new(pos.x, pos.y)
}

fn pick(shapes: &[HandleShape], pos: Pos2) -> Option<GizmoHandle> {
    let p = to2(pos);
    let mut best: Option<(GizmoHandle, f32)> = None;
    for shape in shapes {
        let distance = match shape.handle {
            GizmoHandle::Uniform => {
                let d = shape.points.first().map(|c| (to2(*c) - p).length());
                match d {
                    Some(d) if d <= UNIFORM_RADIUS_PX => return Some(GizmoHandle::Uniform),
                    _ => continue,
                }
            }
            GizmoHandle::Ring(_) => polyline_distance(&shape.points, p, true),
            GizmoHandle::Axis(_) => polyline_distance(&shape.points, p, false),
        };
        if distance <= PICK_RADIUS_PX && best.map(|(_, d)| distance < d).unwrap_or(true) {
            best = Some((shape.handle, distance));
        }
    }
    best.map(|(handle, _)| handle)
}

fn polyline_distance(points: &[Pos2], p: Vec2, closed: bool) -> f32 {
    let mut best = f32::INFINITY;
    let n = points.len();
    let segments = if closed { n } else { n.saturating_sub(1) };
    for i in 0..segments {
        let a = to2(points[i]);
        let b = to2(points[(i + 1) % n]);
        best = best.min(segment_distance(a, b, p));
    }
    best
}

fn segment_distance(a: Vec2, b: Vec2, p: Vec2) -> f32 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    let t = if len_sq > 0.0 {
        ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0)
    } else {
        0.0
    };
    (a + ab * t - p).length()
}
