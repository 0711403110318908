//! Orientation widget in the bottom-right corner of the viewport.

use super::gizmo::GizmoAxis;
use egui::{Align2, FontId, Painter, Pos2, Rect, Stroke};
use glam::Mat4;

pub const AXIS_HELPER_MARGIN: f32 = 80.0;
const AXIS_LENGTH_PX: f32 = 36.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisLine {
    pub axis: GizmoAxis,
    pub end: Pos2,
    /// View-space z of the axis tip; more negative is farther away.
    pub depth: f32,
}

/// Axis lines around `center`, ordered back to front.
pub fn axis_lines(view: Mat4, center: Pos2) -> Vec<AxisLine> {
    let mut lines: Vec<AxisLine> = GizmoAxis::ALL
        .iter()
        .map(|axis| {
            let dir = view.transform_vector3(axis.unit());
            AxisLine {
                axis: *axis,
                end: Pos2::new(
                    center.x + dir.x * AXIS_LENGTH_PX,
                    center.y - dir.y * AXIS_LENGTH_PX,
                ),
                depth: dir.z,
            }
        })
        .collect();
    lines.sort_by(|a, b| a.depth.total_cmp(&b.depth));
    lines
}

pub fn paint_axis_helper(painter: &Painter, viewport: Rect, view: Mat4) {
    let center = viewport.right_bottom() - egui::vec2(AXIS_HELPER_MARGIN, AXIS_HELPER_MARGIN);
    for line in axis_lines(view, center) {
        let color = line.axis.color();
        painter.line_segment([center, line.end], Stroke::new(2.0, color));
        painter.text(
            line.end,
            Align2::CENTER_CENTER,
            match line.axis {
                GizmoAxis::X => "X",
                GizmoAxis::Y => "Y",
                GizmoAxis::Z => "Z",
            },
            FontId::proportional(12.0),
            color,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn front_view_shows_x_right_and_y_up() {
        let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y);
        let center = Pos2::new(100.0, 100.0);
        let lines = axis_lines(view, center);
        let find = |axis| lines.iter().find(|l| l.axis == axis).expect("axis");

        let x = find(GizmoAxis::X);
        assert!(x.end.x > center.x && (x.end.y - center.y).abs() < 1e-4);
        let y = find(GizmoAxis::Y);
        assert!(y.end.y < center.y);
        // Z points at the viewer, so it is drawn last.
        assert_eq!(lines.last().map(|l| l.axis), Some(GizmoAxis::Z));
    }
}
