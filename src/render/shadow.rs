//! CPU shadow terms for the viewport.
//!
//! `ShadowMap` is a perspective depth map rendered from the spot light.
//! `ContactShadow` is the soft ground shadow: casters are rasterized top-down
//! onto a grid over the ground plane, darker the closer they are, then blurred.

use crate::config::ContactShadowConfig;
use glam::{Mat4, Vec2, Vec3, Vec4Swizzles};

const SHADOW_NEAR: f32 = 0.5;
const SHADOW_FAR: f32 = 500.0;
const DEPTH_BIAS: f32 = 0.01;

pub struct ShadowMap {
    view_proj: Mat4,
    size: usize,
    depth: Vec<f32>,
}

impl ShadowMap {
    /// Renders `casters` from `light` looking at `target` through a cone of
    /// half-angle `angle`.
    pub fn build<I>(light: Vec3, target: Vec3, angle: f32, size: usize, casters: I) -> Self
    where
        I: IntoIterator<Item = [Vec3; 3]>,
    {
        let size = size.max(1);
        let direction = (target - light).normalize_or_zero();
        let up = if direction.y.abs() > 0.999 { Vec3::Z } else { Vec3::Y };
        let fov = (angle * 2.0).clamp(0.01, 3.0);
        let view_proj = Mat4::perspective_rh_gl(fov, 1.0, SHADOW_NEAR, SHADOW_FAR)
            * Mat4::look_at_rh(light, target, up);
        let mut map = Self {
            view_proj,
            size,
            depth: vec![f32::INFINITY; size * size],
        };
        for triangle in casters {
            map.rasterize(triangle);
        }
        map
    }

    /// Fraction of the light reaching `point`, 0 (fully shadowed) to 1.
    pub fn visibility(&self, point: Vec3) -> f32 {
        let Some((px, py, depth)) = self.to_texel(point) else {
            return 1.0;
        };
        let bias = depth * DEPTH_BIAS;
        let (cx, cy) = (px.floor() as i64, py.floor() as i64);
        let mut lit = 0;
        let mut taken = 0;
        for dy in -1..=1 {
            for dx in -1..=1 {
                let (x, y) = (cx + dx, cy + dy);
                if x < 0 || y < 0 || x >= self.size as i64 || y >= self.size as i64 {
                    continue;
                }
                taken += 1;
                if depth - bias <= self.depth[y as usize * self.size + x as usize] {
                    lit += 1;
                }
            }
        }
        if taken == 0 {
            1.0
        } else {
            lit as f32 / taken as f32
        }
    }

    /// Texel coordinates plus view depth of `point`, `None` outside the frustum.
    fn to_texel(&self, point: Vec3) -> Option<(f32, f32, f32)> {
        let clip = self.view_proj * point.extend(1.0);
        if clip.w <= SHADOW_NEAR {
            return None;
        }
        let ndc = clip.xy() / clip.w;
        if ndc.x.abs() > 1.0 || ndc.y.abs() > 1.0 {
            return None;
        }
        let size = self.size as f32;
        Some((
            (ndc.x * 0.5 + 0.5) * size,
            (1.0 - (ndc.y * 0.5 + 0.5)) * size,
            clip.w,
        ))
    }

    fn rasterize(&mut self, triangle: [Vec3; 3]) {
        let mut screen = [Vec2::ZERO; 3];
        let mut inv_w = [0.0f32; 3];
        for (i, p) in triangle.iter().enumerate() {
            let clip = self.view_proj * p.extend(1.0);
            if clip.w <= SHADOW_NEAR {
                return;
            }
            let ndc = clip.xy() / clip.w;
            let size = self.size as f32;
            screen[i] = Vec2::new(
                (ndc.x * 0.5 + 0.5) * size,
                (1.0 - (ndc.y * 0.5 + 0.5)) * size,
            );
            inv_w[i] = 1.0 / clip.w;
        }
        let size = self.size;
        let depth = &mut self.depth;
        for_each_covered_cell(screen, size, |x, y, bary| {
            let w = 1.0 / (bary[0] * inv_w[0] + bary[1] * inv_w[1] + bary[2] * inv_w[2]);
            let slot = &mut depth[y * size + x];
            if w < *slot {
                *slot = w;
            }
        });
    }
}

/// Soft ground shadow under the model.
pub struct ContactShadow {
    height: f32,
    half_extent: f32,
    resolution: usize,
    opacity: f32,
    alpha: Vec<f32>,
}

impl ContactShadow {
    pub fn build<I>(config: &ContactShadowConfig, casters: I) -> Self
    where
        I: IntoIterator<Item = [Vec3; 3]>,
    {
        let resolution = config.resolution.max(1);
        let half_extent = config.scale.max(1e-3) * 0.5;
        let far = config.far.max(1e-3);
        let mut darkness = vec![0.0f32; resolution * resolution];
        let cell = config.scale.max(1e-3) / resolution as f32;

        for triangle in casters {
            let heights = triangle.map(|p| p.y - config.height);
            if heights.iter().all(|h| *h < 0.0) || heights.iter().all(|h| *h > far) {
                continue;
            }
            let grid = triangle.map(|p| {
                Vec2::new((p.x + half_extent) / cell, (p.z + half_extent) / cell)
            });
            for_each_covered_cell(grid, resolution, |x, y, bary| {
                let h = bary[0] * heights[0] + bary[1] * heights[1] + bary[2] * heights[2];
                if !(0.0..=far).contains(&h) {
                    return;
                }
                let value = 1.0 - h / far;
                let slot = &mut darkness[y * resolution + x];
                if value > *slot {
                    *slot = value;
                }
            });
        }

        let radius = ((config.blur * 2.0 * resolution as f32 / 256.0).round() as usize).max(1);
        box_blur(&mut darkness, resolution, radius);
        box_blur(&mut darkness, resolution, radius);

        Self {
            height: config.height,
            half_extent,
            resolution,
            opacity: config.opacity.clamp(0.0, 1.0),
            alpha: darkness,
        }
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    /// Shadow opacity at ground position `(x, z)`.
    #[cfg(test)]
    pub fn alpha_at(&self, x: f32, z: f32) -> f32 {
        let cell = self.half_extent * 2.0 / self.resolution as f32;
        let gx = ((x + self.half_extent) / cell).floor();
        let gz = ((z + self.half_extent) / cell).floor();
        if gx < 0.0 || gz < 0.0 || gx >= self.resolution as f32 || gz >= self.resolution as f32 {
            return 0.0;
        }
        self.alpha[gz as usize * self.resolution + gx as usize] * self.opacity
    }

    /// Coarse ground cells for drawing: `(min_xz, max_xz, alpha)`, skipping
    /// cells too faint to see.
    pub fn cells(&self, display: usize) -> Vec<(Vec2, Vec2, f32)> {
        let display = display.clamp(1, self.resolution);
        let block = self.resolution / display;
        let cell = self.half_extent * 2.0 / self.resolution as f32 * block as f32;
        let mut out = Vec::new();
        for gz in 0..display {
            for gx in 0..display {
                let mut sum = 0.0;
                for by in 0..block {
                    let row = (gz * block + by) * self.resolution;
                    for bx in 0..block {
                        sum += self.alpha[row + gx * block + bx];
                    }
                }
                let alpha = sum / (block * block) as f32 * self.opacity;
                if alpha < 0.004 {
                    continue;
                }
                let min = Vec2::new(
                    -self.half_extent + gx as f32 * cell,
                    -self.half_extent + gz as f32 * cell,
                );
                out.push((min, min + Vec2::splat(cell), alpha));
            }
        }
        out
    }
}

/// Calls `visit(x, y, barycentric)` for every cell centre of a `size`×`size`
/// grid covered by the 2D triangle `points`.
fn for_each_covered_cell<F>(points: [Vec2; 3], size: usize, mut visit: F)
where
    F: FnMut(usize, usize, [f32; 3]),
{
    let [a, b, c] = points;
    let area = (b - a).perp_dot(c - a);
    if area.abs() < 1e-9 {
        return;
    }
    let min = a.min(b).min(c).floor().max(Vec2::ZERO);
    let max = a.max(b).max(c).ceil().min(Vec2::splat(size as f32));
    if min.x >= max.x || min.y >= max.y {
        return;
    }
    for y in min.y as usize..max.y as usize {
        for x in min.x as usize..max.x as usize {
            let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
            let w0 = (c - b).perp_dot(p - b) / area;
            let w1 = (a - c).perp_dot(p - c) / area;
            let w2 = 1.0 - w0 - w1;
            if w0 >= 0.0 && w1 >= 0.0 && w2 >= 0.0 {
                visit(x, y, [w0, w1, w2]);
            }
        }
    }
}

fn box_blur(values: &mut [f32], size: usize, radius: usize) {
    let mut scratch = vec![0.0f32; values.len()];
    for y in 0..size {
        for x in 0..size {
            let lo = x.saturating_sub(radius);
            let hi = (x + radius).min(size - 1);
            let row = &values[y * size..(y + 1) * size];
            scratch[y * size + x] = row[lo..=hi].iter().sum::<f32>() / (2 * radius + 1) as f32;
        }
    }
    for y in 0..size {
        let lo = y.saturating_sub(radius);
        let hi = (y + radius).min(size - 1);
        for x in 0..size {
            let sum: f32 = (lo..=hi).map(|yy| scratch[yy * size + x]).sum();
            values[y * size + x] = sum / (2 * radius + 1) as f32;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad(center: Vec3, half: f32) -> [[Vec3; 3]; 2] {
        let a = center + Vec3::new(-half, 0.0, -half);
        let b = center + Vec3::new(half, 0.0, -half);
        let c = center + Vec3::new(half, 0.0, half);
        let d = center + Vec3::new(-half, 0.0, half);
        [[a, b, c], [a, c, d]]
    }

    #[test]
    fn occluder_between_light_and_point_casts_shadow() {
        let light = Vec3::new(10.0, 10.0, 10.0);
        let occluder = quad(Vec3::new(5.0, 5.0, 5.0), 1.0);
        let map = ShadowMap::build(light, Vec3::ZERO, 0.15, 128, occluder);
        assert!(map.visibility(Vec3::ZERO) < 0.5);
        assert_eq!(map.visibility(Vec3::new(10.0, -10.0, 0.0)), 1.0);

        let empty = ShadowMap::build(light, Vec3::ZERO, 0.15, 128, std::iter::empty());
        assert_eq!(empty.visibility(Vec3::ZERO), 1.0);
    }

    #[test]
    fn lit_surface_does_not_shadow_itself() {
        let light = Vec3::new(10.0, 10.0, 10.0);
        let floor = quad(Vec3::ZERO, 2.0);
        let map = ShadowMap::build(light, Vec3::ZERO, 0.15, 128, floor);
        assert!(map.visibility(Vec3::new(0.2, 0.0, -0.3)) > 0.9);
    }

    #[test]
    fn contact_shadow_darkens_under_close_casters_only() {
        let config = ContactShadowConfig::default();
        let near = quad(Vec3::new(0.0, -0.8, 0.0), 0.5);
        let shadow = ContactShadow::build(&config, near);
        let center = shadow.alpha_at(0.0, 0.0);
        assert!(center > 0.2 && center <= config.opacity);
        assert_eq!(shadow.alpha_at(4.0, 4.0), 0.0);

        let above_far = quad(Vec3::new(0.0, 1.5, 0.0), 0.5);
        let below = quad(Vec3::new(0.0, -1.5, 0.0), 0.5);
        let shadow = ContactShadow::build(&config, above_far.into_iter().chain(below));
        assert_eq!(shadow.alpha_at(0.0, 0.0), 0.0);
        assert!(shadow.cells(64).is_empty());
    }

    #[test]
    fn closer_casters_are_darker_and_blur_spreads() {
        let config = ContactShadowConfig::default();
        let low = ContactShadow::build(&config, quad(Vec3::new(0.0, -0.9, 0.0), 0.5));
        let high = ContactShadow::build(&config, quad(Vec3::new(0.0, 0.5, 0.0), 0.5));
        assert!(low.alpha_at(0.0, 0.0) > high.alpha_at(0.0, 0.0));
        assert!(low.alpha_at(0.55, 0.0) > 0.0);
        assert!(!low.cells(64).is_empty());
    }
}
