pub mod copy;
pub mod presenter;

use glam::{Mat4, Quat, Vec3};
use std::sync::Arc;

pub use copy::{DisposeReport, SceneCopy};
pub use presenter::ModelPresenter;

/// Local transform of a scene node, composed as `T * R * S`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn from_parts(translation: [f32; 3], rotation_xyzw: [f32; 4], scale: [f32; 3]) -> Self {
        Self {
            translation: Vec3::from_array(translation),
            rotation: Quat::from_array(rotation_xyzw).normalize(),
            scale: Vec3::from_array(scale),
        }
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

/// Index range of a geometry drawn with one material slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeometryGroup {
    pub start: usize,
    pub count: usize,
    pub material_index: usize,
}

/// Triangle list geometry. Indices always address `positions`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Geometry {
    pub positions: Vec<Vec3>,
    pub indices: Vec<u32>,
    pub groups: Vec<GeometryGroup>,
}

impl Geometry {
    #[cfg(test)]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Material slot used by the triangle starting at `first_index`.
    pub fn material_slot_at(&self, first_index: usize) -> usize {
        self.groups
            .iter()
            .find(|group| first_index >= group.start && first_index < group.start + group.count)
            .map(|group| group.material_index)
            .unwrap_or(0)
    }

    pub fn byte_size(&self) -> usize {
        self.positions.len() * std::mem::size_of::<Vec3>()
            + self.indices.len() * std::mem::size_of::<u32>()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    pub base_color: [f32; 4],
    pub metallic: f32,
    pub roughness: f32,
    pub emissive: [f32; 3],
    pub double_sided: bool,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            base_color: [1.0, 1.0, 1.0, 1.0],
            metallic: 1.0,
            roughness: 1.0,
            emissive: [0.0, 0.0, 0.0],
            double_sided: false,
        }
    }
}

/// A mesh either draws with one material or with one material per geometry group.
#[derive(Debug, Clone)]
pub enum Materials {
    Single(Arc<Material>),
    Multi(Vec<Arc<Material>>),
}

impl Materials {
    pub fn get(&self, slot: usize) -> Option<&Arc<Material>> {
        match self {
            Materials::Single(material) => Some(material),
            Materials::Multi(materials) => materials.get(slot).or_else(|| materials.first()),
        }
    }

    #[cfg(test)]
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Material>> {
        let slice: &[Arc<Material>] = match self {
            Materials::Single(material) => std::slice::from_ref(material),
            Materials::Multi(materials) => materials,
        };
        slice.iter()
    }

    pub fn len(&self) -> usize {
        match self {
            Materials::Single(_) => 1,
            Materials::Multi(materials) => materials.len(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MeshNode {
    pub geometry: Arc<Geometry>,
    pub materials: Materials,
    pub cast_shadow: bool,
    pub receive_shadow: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Node {
    pub name: String,
    pub transform: Transform,
    pub mesh: Option<MeshNode>,
    pub children: Vec<Node>,
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Depth-first walk handing each node its world matrix relative to `parent`.
    pub fn traverse<F>(&self, parent: Mat4, visit: &mut F)
    where
        F: FnMut(&Node, Mat4),
    {
        let world = parent * self.transform.matrix();
        visit(self, world);
        for child in &self.children {
            child.traverse(world, visit);
        }
    }

    pub fn traverse_mut<F>(&mut self, visit: &mut F)
    where
        F: FnMut(&mut Node),
    {
        visit(self);
        for child in &mut self.children {
            child.traverse_mut(visit);
        }
    }
}

/// Renderer-independent scene graph, as produced by the asset loader.
#[derive(Debug, Clone, Default)]
pub struct SceneGraph {
    pub name: String,
    pub root: Node,
}

impl SceneGraph {
    pub fn mesh_count(&self) -> usize {
        let mut count = 0;
        self.root.traverse(Mat4::IDENTITY, &mut |node, _| {
            if node.mesh.is_some() {
                count += 1;
            }
        });
        count
    }

    /// World-space bounds of all mesh vertices, or `None` for an empty graph.
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);
        let mut any = false;
        self.root.traverse(Mat4::IDENTITY, &mut |node, world| {
            if let Some(mesh) = &node.mesh {
                for position in &mesh.geometry.positions {
                    let p = world.transform_point3(*position);
                    min = min.min(p);
                    max = max.max(p);
                    any = true;
                }
            }
        });
        any.then_some((min, max))
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn triangle_geometry() -> Geometry {
        Geometry {
            positions: vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(0.0, 1.0, 0.0),
            ],
            indices: vec![0, 1, 2],
            groups: vec![GeometryGroup {
                start: 0,
                count: 3,
                material_index: 0,
            }],
        }
    }

    /// Two nodes sharing one geometry plus a multi-material child.
    pub fn sample_graph() -> SceneGraph {
        let shared = Arc::new(triangle_geometry());
        let red = Arc::new(Material {
            name: "red".to_string(),
            base_color: [1.0, 0.0, 0.0, 1.0],
            ..Material::default()
        });
        let blue = Arc::new(Material {
            name: "blue".to_string(),
            base_color: [0.0, 0.0, 1.0, 1.0],
            ..Material::default()
        });

        let mut left = Node::new("left");
        left.transform.translation = Vec3::new(-1.0, 0.0, 0.0);
        left.mesh = Some(MeshNode {
            geometry: Arc::clone(&shared),
            materials: Materials::Single(Arc::clone(&red)),
            cast_shadow: false,
            receive_shadow: false,
        });

        let mut right = Node::new("right");
        right.transform.translation = Vec3::new(1.0, 0.0, 0.0);
        right.mesh = Some(MeshNode {
            geometry: shared,
            materials: Materials::Single(Arc::clone(&red)),
            cast_shadow: false,
            receive_shadow: false,
        });

        let mut multi_geometry = triangle_geometry();
        multi_geometry.positions.push(Vec3::new(1.0, 1.0, 0.0));
        multi_geometry.indices.extend_from_slice(&[1, 3, 2]);
        multi_geometry.groups = vec![
            GeometryGroup {
                start: 0,
                count: 3,
                material_index: 0,
            },
            GeometryGroup {
                start: 3,
                count: 3,
                material_index: 1,
            },
        ];
        let mut quad = Node::new("quad");
        quad.transform.translation = Vec3::new(0.0, 2.0, 0.0);
        quad.mesh = Some(MeshNode {
            geometry: Arc::new(multi_geometry),
            materials: Materials::Multi(vec![red, blue]),
            cast_shadow: false,
            receive_shadow: false,
        });
        right.children.push(quad);

        let mut root = Node::new("root");
        root.children.push(left);
        root.children.push(right);
        SceneGraph {
            name: "sample".to_string(),
            root,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::sample_graph;
    use super::*;

    #[test]
    fn transform_matrix_applies_scale_then_rotation_then_translation() {
        let transform = Transform {
            translation: Vec3::new(1.0, 2.0, 3.0),
            rotation: Quat::from_rotation_y(std::f32::consts::FRAC_PI_2),
            scale: Vec3::splat(2.0),
        };
        let p = transform.matrix().transform_point3(Vec3::X);
        assert!((p - Vec3::new(1.0, 2.0, 1.0)).length() < 1e-5);
    }

    #[test]
    fn bounds_follow_node_hierarchy() {
        let graph = sample_graph();
        let (min, max) = graph.bounds().expect("bounds");
        assert!((min - Vec3::new(-1.0, 0.0, 0.0)).length() < 1e-6);
        assert!((max - Vec3::new(2.0, 3.0, 0.0)).length() < 1e-6);
        assert_eq!(graph.mesh_count(), 3);
    }

    #[test]
    fn multi_material_slot_lookup_uses_groups() {
        let graph = sample_graph();
        let quad = &graph.root.children[1].children[0];
        let mesh = quad.mesh.as_ref().expect("mesh");
        assert_eq!(mesh.geometry.material_slot_at(0), 0);
        assert_eq!(mesh.geometry.material_slot_at(3), 1);
        assert_eq!(mesh.materials.get(1).map(|m| m.name.as_str()), Some("blue"));
        assert_eq!(mesh.materials.len(), 2);
    }

    #[test]
    fn empty_graph_has_no_bounds() {
        assert!(SceneGraph::default().bounds().is_none());
    }
}
