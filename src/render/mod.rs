pub mod axes;
pub mod camera;
pub mod gizmo;
pub mod shadow;

pub use camera::OrbitController;
pub use gizmo::{GizmoEvent, PointerSample, TransformGizmo};

use crate::assets::ResourceHandle;
use crate::config::{ContactShadowConfig, EnvironmentPreset, LightingConfig};
use crate::scene::{Material, MeshNode, SceneGraph};
use crate::ui::settings::ViewSettings;
use egui::{Color32, Painter, Pos2, Rect, Rgba};
use glam::{Mat4, Vec3, Vec4Swizzles};
use shadow::{ContactShadow, ShadowMap};

const NEAR_PLANE: f32 = 0.1;
const SHADOW_MAP_SIZE: usize = 512;
const CONTACT_DISPLAY_CELLS: usize = 64;
const ENVIRONMENT_STRENGTH: f32 = 0.6;

/// World to screen mapping for one frame of the viewport.
#[derive(Debug, Clone, Copy)]
pub struct Projector {
    rect: Rect,
    view: Mat4,
    view_proj: Mat4,
    eye: Vec3,
    fov_y: f32,
}

impl Projector {
    pub fn new(camera: &OrbitController, rect: Rect) -> Self {
        let aspect = rect.width() / rect.height().max(1.0);
        let view = camera.view_matrix();
        Self {
            rect,
            view,
            view_proj: camera.projection_matrix(aspect) * view,
            eye: camera.position(),
            fov_y: camera.fov_y,
        }
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }

    pub fn view(&self) -> Mat4 {
        self.view
    }

    pub fn eye(&self) -> Vec3 {
        self.eye
    }

    pub fn fov_y(&self) -> f32 {
        self.fov_y
    }

    pub fn project(&self, point: Vec3) -> Option<Pos2> {
        self.project_with_depth(point).map(|(pos, _)| pos)
    }

    /// Screen position and view depth; `None` for points behind the near plane.
    pub fn project_with_depth(&self, point: Vec3) -> Option<(Pos2, f32)> {
        let clip = self.view_proj * point.extend(1.0);
        if clip.w < NEAR_PLANE {
            return None;
        }
        let ndc = clip.xy() / clip.w;
        let center = self.rect.center();
        Some((
            Pos2::new(
                center.x + ndc.x * self.rect.width() * 0.5,
                center.y - ndc.y * self.rect.height() * 0.5,
            ),
            clip.w,
        ))
    }
}

/// Ambient + spot key light + environment, derived from the view settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightRig {
    pub ambient: f32,
    pub spot_intensity: f32,
    pub spot_position: Vec3,
    pub spot_target: Vec3,
    pub spot_angle: f32,
    pub spot_penumbra: f32,
    pub environment: EnvironmentPreset,
}

impl LightRig {
    pub fn new(settings: &ViewSettings, lighting: &LightingConfig) -> Self {
        Self {
            ambient: settings.ambient_intensity(),
            spot_intensity: settings.spot_intensity(),
            spot_position: Vec3::from_array(lighting.spot_position),
            spot_target: Vec3::ZERO,
            spot_angle: lighting.spot_angle,
            spot_penumbra: lighting.spot_penumbra.clamp(0.0, 1.0),
            environment: lighting.environment,
        }
    }

    /// Spot cone attenuation at `point`: 1 on the axis, fading to 0 at the
    /// cone edge across the penumbra.
    pub fn spot_cone(&self, point: Vec3) -> f32 {
        let axis = (self.spot_target - self.spot_position).normalize_or_zero();
        let to_point = (point - self.spot_position).normalize_or_zero();
        let cos_outer = self.spot_angle.cos();
        let cos_inner = (self.spot_angle * (1.0 - self.spot_penumbra)).cos();
        smoothstep(cos_outer, cos_inner, axis.dot(to_point))
    }

    /// Environment irradiance for a surface facing `normal`.
    pub fn environment_light(&self, normal: Vec3) -> Vec3 {
        let (sky, ground) = match self.environment {
            EnvironmentPreset::City => (Vec3::new(0.85, 0.88, 0.95), Vec3::new(0.36, 0.34, 0.32)),
            EnvironmentPreset::Studio => (Vec3::splat(0.95), Vec3::splat(0.55)),
            EnvironmentPreset::Sunset => (Vec3::new(1.0, 0.72, 0.5), Vec3::new(0.3, 0.22, 0.28)),
        };
        ground.lerp(sky, normal.y * 0.5 + 0.5) * ENVIRONMENT_STRENGTH
    }

    /// Flat-shaded colour of a face. `visibility` is the spot shadow term.
    pub fn shade(&self, material: &Material, normal: Vec3, point: Vec3, visibility: f32) -> Color32 {
        let base = Vec3::new(
            material.base_color[0],
            material.base_color[1],
            material.base_color[2],
        );
        let diffuse = base * (1.0 - material.metallic.clamp(0.0, 1.0) * 0.5);
        let to_light = (self.spot_position - point).normalize_or_zero();
        let lambert = normal.dot(to_light).max(0.0);
        let spot = self.spot_intensity * self.spot_cone(point) * lambert * visibility;
        let light = self.environment_light(normal) + Vec3::splat(self.ambient + spot);
        let rgb = (diffuse * light + Vec3::from_array(material.emissive)).min(Vec3::ONE);
        Color32::from(Rgba::from_rgba_unmultiplied(
            rgb.x,
            rgb.y,
            rgb.z,
            material.base_color[3].clamp(0.0, 1.0),
        ))
    }
}

fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    if edge1 <= edge0 {
        return if x >= edge0 { 1.0 } else { 0.0 };
    }
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// The mounted model as seen by the renderer this frame.
pub struct FrameScene<'a> {
    pub handle: &'a ResourceHandle,
    pub graph: &'a SceneGraph,
    /// Group transform times the presenter's rotation and scale.
    pub model: Mat4,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RenderStats {
    pub triangles: usize,
    pub culled: usize,
    pub shadow_cells: usize,
}

struct ShadowCache {
    handle: ResourceHandle,
    model: Mat4,
    spot: ShadowMap,
    contact: ContactShadow,
}

struct Face {
    depth: f32,
    points: [Pos2; 3],
    color: Color32,
}

/// Software renderer drawing the scene into an egui painter.
pub struct SceneRenderer {
    contact_config: ContactShadowConfig,
    shadows: Option<ShadowCache>,
}

impl SceneRenderer {
    pub fn new(contact_config: ContactShadowConfig) -> Self {
        Self {
            contact_config,
            shadows: None,
        }
    }

    pub fn paint(
        &mut self,
        painter: &Painter,
        projector: &Projector,
        lights: &LightRig,
        background: [u8; 3],
        scene: Option<FrameScene<'_>>,
    ) -> RenderStats {
        painter.rect_filled(
            projector.rect(),
            0.0,
            Color32::from_rgb(background[0], background[1], background[2]),
        );

        let Some(scene) = scene else {
            self.shadows = None;
            return RenderStats::default();
        };

        let meshes = collect_meshes(scene.graph, scene.model);
        self.refresh_shadows(&scene, &meshes, lights);
        let Some(shadows) = self.shadows.as_ref() else {
            return RenderStats::default();
        };

        let mut stats = RenderStats::default();
        let mut ground = egui::Mesh::default();
        let height = shadows.contact.height();
        for (min, max, alpha) in shadows.contact.cells(CONTACT_DISPLAY_CELLS) {
            let corners = [
                Vec3::new(min.x, height, min.y),
                Vec3::new(max.x, height, min.y),
                Vec3::new(max.x, height, max.y),
                Vec3::new(min.x, height, max.y),
            ];
            let projected: Option<Vec<Pos2>> =
                corners.iter().map(|c| projector.project(*c)).collect();
            let Some(projected) = projected else {
                continue;
            };
            let color = Color32::from_black_alpha((alpha * 255.0).round() as u8);
            let base = ground.vertices.len() as u32;
            for pos in projected {
                ground.colored_vertex(pos, color);
            }
            ground.add_triangle(base, base + 1, base + 2);
            ground.add_triangle(base, base + 2, base + 3);
            stats.shadow_cells += 1;
        }
        painter.add(egui::Shape::mesh(ground));

        let (faces, culled) = shade_faces(&meshes, projector, lights, Some(&shadows.spot));
        stats.triangles = faces.len();
        stats.culled = culled;
        let mut mesh = egui::Mesh::default();
        for face in faces {
            let base = mesh.vertices.len() as u32;
            for pos in face.points {
                mesh.colored_vertex(pos, face.color);
            }
            mesh.add_triangle(base, base + 1, base + 2);
        }
        painter.add(egui::Shape::mesh(mesh));
        stats
    }

    /// Drops cached shadow maps; the next frame rebuilds them.
    pub fn invalidate_shadows(&mut self) {
        self.shadows = None;
    }

    fn refresh_shadows(
        &mut self,
        scene: &FrameScene<'_>,
        meshes: &[(Mat4, MeshNode)],
        lights: &LightRig,
    ) {
        if let Some(cache) = &self.shadows {
            if cache.handle == *scene.handle && cache.model == scene.model {
                return;
            }
        }
        let spot = ShadowMap::build(
            lights.spot_position,
            lights.spot_target,
            lights.spot_angle,
            SHADOW_MAP_SIZE,
            caster_triangles(meshes),
        );
        let contact = ContactShadow::build(&self.contact_config, caster_triangles(meshes));
        self.shadows = Some(ShadowCache {
            handle: scene.handle.clone(),
            model: scene.model,
            spot,
            contact,
        });
    }
}

/// Every mesh of `graph` with its world matrix under `model`.
fn collect_meshes(graph: &SceneGraph, model: Mat4) -> Vec<(Mat4, MeshNode)> {
    let mut meshes = Vec::new();
    graph.root.traverse(model, &mut |node, world| {
        if let Some(mesh) = &node.mesh {
            meshes.push((world, mesh.clone()));
        }
    });
    meshes
}

fn world_triangles<'a>(
    world: &'a Mat4,
    mesh: &'a MeshNode,
) -> impl Iterator<Item = (usize, [Vec3; 3])> + 'a {
    let positions = &mesh.geometry.positions;
    mesh.geometry
        .indices
        .chunks_exact(3)
        .enumerate()
        .filter_map(move |(i, tri)| {
            let a = positions.get(tri[0] as usize)?;
            let b = positions.get(tri[1] as usize)?;
            let c = positions.get(tri[2] as usize)?;
            Some((
                i * 3,
                [
                    world.transform_point3(*a),
                    world.transform_point3(*b),
                    world.transform_point3(*c),
                ],
            ))
        })
}

fn caster_triangles(meshes: &[(Mat4, MeshNode)]) -> impl Iterator<Item = [Vec3; 3]> + '_ {
    meshes
        .iter()
        .filter(|(_, mesh)| mesh.cast_shadow)
        .flat_map(|(world, mesh)| world_triangles(world, mesh).map(|(_, tri)| tri))
}

/// Lit, projected faces sorted back to front, plus the number culled.
fn shade_faces(
    meshes: &[(Mat4, MeshNode)],
    projector: &Projector,
    lights: &LightRig,
    spot_shadow: Option<&ShadowMap>,
) -> (Vec<Face>, usize) {
    let fallback = Material::default();
    let eye = projector.eye();
    let mut faces = Vec::new();
    let mut culled = 0;

    for (world, mesh) in meshes {
        let mirrored = world.determinant() < 0.0;
        for (first_index, [a, b, c]) in world_triangles(world, mesh) {
            let material = mesh
                .materials
                .get(mesh.geometry.material_slot_at(first_index))
                .map(|m| m.as_ref())
                .unwrap_or(&fallback);

            let mut normal = (b - a).cross(c - a).normalize_or_zero();
            if mirrored {
                normal = -normal;
            }
            if normal == Vec3::ZERO {
                continue;
            }
            let centroid = (a + b + c) / 3.0;
            if normal.dot(eye - centroid) < 0.0 {
                if material.double_sided {
                    normal = -normal;
                } else {
                    culled += 1;
                    continue;
                }
            }

            let (Some(pa), Some(pb), Some(pc)) = (
                projector.project(a),
                projector.project(b),
                projector.project(c),
            ) else {
                culled += 1;
                continue;
            };
            let visibility = match spot_shadow {
                Some(map) if mesh.receive_shadow => map.visibility(centroid),
                _ => 1.0,
            };
            faces.push(Face {
                depth: (centroid - eye).length(),
                points: [pa, pb, pc],
                color: lights.shade(material, normal, centroid, visibility),
            });
        }
    }

    faces.sort_by(|x, y| y.depth.total_cmp(&x.depth));
    (faces, culled)
}
