//! Owned deep copies of loader scene graphs.
//!
//! The loader keeps one parsed graph per resource handle and hands out shared
//! references to it. Anything the viewer mutates (shadow flags, materials,
//! transforms) lives on a `SceneCopy` so the cached original is never touched
//! and can be evicted or reused independently.

use super::{Geometry, Materials, MeshNode, Node, SceneGraph};
use std::collections::HashMap;
use std::sync::Arc;

/// What a disposal pass released.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DisposeReport {
    pub geometries: usize,
    pub materials: usize,
    pub bytes: usize,
}

pub struct SceneCopy {
    graph: SceneGraph,
    disposed: bool,
}

impl SceneCopy {
    /// Deep-copies `source` and marks every mesh as shadow casting and receiving.
    ///
    /// Geometry shared between nodes of the source stays shared inside the copy,
    /// but no buffer is ever shared with the source. Materials are cloned per mesh.
    pub fn from_shared(source: &SceneGraph) -> Self {
        let mut geometry_map: HashMap<*const Geometry, Arc<Geometry>> = HashMap::new();
        let root = copy_node(&source.root, &mut geometry_map);
        let graph = SceneGraph {
            name: source.name.clone(),
            root,
        };
        log::debug!(
            "Scene copy '{}' created: {} meshes, {} unique geometries",
            graph.name,
            graph.mesh_count(),
            geometry_map.len()
        );
        Self {
            graph,
            disposed: false,
        }
    }

    pub fn graph(&self) -> &SceneGraph {
        &self.graph
    }

    #[cfg(test)]
    pub fn graph_mut(&mut self) -> &mut SceneGraph {
        &mut self.graph
    }

    #[cfg(test)]
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Releases every geometry buffer and material held by the copy.
    ///
    /// A second call is a no-op and reports nothing.
    pub fn dispose(&mut self) -> DisposeReport {
        if self.disposed {
            return DisposeReport::default();
        }
        self.disposed = true;

        let mut report = DisposeReport::default();
        let mut seen_geometry: Vec<*const Geometry> = Vec::new();
        let mut root = std::mem::take(&mut self.graph.root);
        root.traverse_mut(&mut |node| {
            let Some(mesh) = node.mesh.take() else {
                return;
            };
            let key = Arc::as_ptr(&mesh.geometry);
            if !seen_geometry.contains(&key) {
                seen_geometry.push(key);
                report.geometries += 1;
                report.bytes += mesh.geometry.byte_size();
            }
            report.materials += mesh.materials.len();
            drop(mesh);
        });
        drop(root);

        log::debug!(
            "Scene copy '{}' disposed: {} geometries ({} bytes), {} materials",
            self.graph.name,
            report.geometries,
            report.bytes,
            report.materials
        );
        report
    }
}

impl Drop for SceneCopy {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn copy_node(source: &Node, geometry_map: &mut HashMap<*const Geometry, Arc<Geometry>>) -> Node {
    let mesh = source.mesh.as_ref().map(|mesh| {
        let geometry = geometry_map
            .entry(Arc::as_ptr(&mesh.geometry))
            .or_insert_with(|| Arc::new(Geometry::clone(&mesh.geometry)))
            .clone();
        let materials = match &mesh.materials {
            Materials::Single(material) => Materials::Single(Arc::new((**material).clone())),
            Materials::Multi(list) => {
                Materials::Multi(list.iter().map(|m| Arc::new((**m).clone())).collect())
            }
        };
        MeshNode {
            geometry,
            materials,
            cast_shadow: true,
            receive_shadow: true,
        }
    });

    Node {
        name: source.name.clone(),
        transform: source.transform,
        mesh,
        children: source
            .children
            .iter()
            .map(|child| copy_node(child, geometry_map))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::fixtures::sample_graph;
    use crate::scene::Material;
    use glam::Mat4;

    fn meshes(graph: &SceneGraph) -> Vec<MeshNode> {
        let mut out = Vec::new();
        graph.root.traverse(Mat4::IDENTITY, &mut |node, _| {
            if let Some(mesh) = &node.mesh {
                out.push(mesh.clone());
            }
        });
        out
    }

    #[test]
    fn copy_shares_no_buffers_with_source() {
        let source = sample_graph();
        let copy = SceneCopy::from_shared(&source);

        for (original, copied) in meshes(&source).iter().zip(meshes(copy.graph()).iter()) {
            assert!(!Arc::ptr_eq(&original.geometry, &copied.geometry));
            assert_eq!(*original.geometry, *copied.geometry);
            for (a, b) in original.materials.iter().zip(copied.materials.iter()) {
                assert!(!Arc::ptr_eq(a, b));
                assert_eq!(**a, **b);
            }
        }
    }

    #[test]
    fn copy_enables_shadows_on_every_mesh() {
        let source = sample_graph();
        let copy = SceneCopy::from_shared(&source);
        let copied = meshes(copy.graph());
        assert_eq!(copied.len(), 3);
        assert!(copied.iter().all(|m| m.cast_shadow && m.receive_shadow));
        assert!(meshes(&source).iter().all(|m| !m.cast_shadow && !m.receive_shadow));
    }

    #[test]
    fn shared_geometry_stays_shared_inside_copy() {
        let source = sample_graph();
        let copy = SceneCopy::from_shared(&source);
        let copied = meshes(copy.graph());
        assert!(Arc::ptr_eq(&copied[0].geometry, &copied[1].geometry));
        let left_material = copied[0].materials.iter().next().expect("material");
        let right_material = copied[1].materials.iter().next().expect("material");
        assert!(!Arc::ptr_eq(left_material, right_material));
    }

    #[test]
    fn material_edits_do_not_leak_into_source() {
        let source = sample_graph();
        let mut copy = SceneCopy::from_shared(&source);
        copy.graph_mut().root.traverse_mut(&mut |node| {
            if let Some(mesh) = &mut node.mesh {
                if let Materials::Single(material) = &mut mesh.materials {
                    Arc::make_mut(material).base_color = [0.0, 1.0, 0.0, 1.0];
                }
            }
        });
        let left = source.root.children[0].mesh.as_ref().unwrap();
        let Materials::Single(material) = &left.materials else {
            panic!("expected single material");
        };
        assert_eq!(material.base_color, [1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn dispose_releases_single_and_multi_materials_once() {
        let source = sample_graph();
        let mut copy = SceneCopy::from_shared(&source);
        let weak_geometry = Arc::downgrade(&meshes(copy.graph())[0].geometry);

        let report = copy.dispose();
        assert_eq!(report.geometries, 2);
        assert_eq!(report.materials, 4);
        assert!(report.bytes > 0);
        assert!(weak_geometry.upgrade().is_none());
        assert!(copy.is_disposed());
        assert_eq!(copy.dispose(), DisposeReport::default());
    }

    #[test]
    fn dispose_leaves_source_intact() {
        let source = sample_graph();
        let mut copy = SceneCopy::from_shared(&source);
        copy.dispose();
        let source_meshes = meshes(&source);
        assert_eq!(source_meshes.len(), 3);
        assert_eq!(source_meshes[0].geometry.triangle_count(), 1);
        let material = source_meshes[0].materials.iter().next().expect("material");
        assert_eq!(material.name, "red");
        assert_ne!(**material, Material::default());
    }
}
