pub mod handle;
pub mod upload;

pub use handle::{ObjectUrlRegistry, ResourceHandle, SelectedFile};
pub use upload::UploadController;

use crate::scene::{
    Geometry, GeometryGroup, Material, Materials, MeshNode, Node, SceneGraph, Transform,
};
use glam::Vec3;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("no live resource for handle {0}")]
    UnknownHandle(ResourceHandle),
    #[error("failed to parse glTF '{name}': {source}")]
    ParseGltf {
        name: String,
        #[source]
        source: gltf::Error,
    },
    #[error("glTF '{name}' contains no scene")]
    NoScene { name: String },
    #[error("glTF '{name}' contains no triangle geometry")]
    EmptyGeometry { name: String },
}

/// Loader service the viewer talks to. Parsed graphs are cached per handle and
/// handed out shared; callers must copy before mutating.
pub trait AssetLoader {
    fn load(
        &mut self,
        handle: &ResourceHandle,
        registry: &ObjectUrlRegistry,
    ) -> Result<Arc<SceneGraph>, AssetError>;

    /// Drops the cache entry for `handle`. Returns whether anything was cached.
    fn evict(&mut self, handle: &ResourceHandle) -> bool;
}

#[derive(Default)]
pub struct GltfLoader {
    cache: HashMap<ResourceHandle, Arc<SceneGraph>>,
}

impl GltfLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }

    #[cfg(test)]
    pub fn is_cached(&self, handle: &ResourceHandle) -> bool {
        self.cache.contains_key(handle)
    }
}

impl AssetLoader for GltfLoader {
    fn load(
        &mut self,
        handle: &ResourceHandle,
        registry: &ObjectUrlRegistry,
    ) -> Result<Arc<SceneGraph>, AssetError> {
        if let Some(graph) = self.cache.get(handle) {
            return Ok(Arc::clone(graph));
        }
        let file = registry
            .resolve(handle)
            .ok_or_else(|| AssetError::UnknownHandle(handle.clone()))?;
        let graph = Arc::new(parse_gltf(file)?);
        log::info!(
            "Loaded '{}' for {}: {} meshes",
            graph.name,
            handle,
            graph.mesh_count()
        );
        self.cache.insert(handle.clone(), Arc::clone(&graph));
        Ok(graph)
    }

    fn evict(&mut self, handle: &ResourceHandle) -> bool {
        let evicted = self.cache.remove(handle).is_some();
        if evicted {
            log::debug!(
                "Evicted loader cache entry for {} ({} cached)",
                handle,
                self.cached_count()
            );
        }
        evicted
    }
}

fn parse_gltf(file: &SelectedFile) -> Result<SceneGraph, AssetError> {
    let imported = match gltf::import_slice(&file.bytes[..]) {
        Ok(imported) => imported,
        Err(err) => match &file.origin {
            // Embedded import cannot follow relative URIs; retry from disk.
            Some(path) if matches!(err, gltf::Error::ExternalReferenceInSliceImport) => {
                gltf::import(path).map_err(|source| AssetError::ParseGltf {
                    name: file.name.clone(),
                    source,
                })?
            }
            _ => {
                return Err(AssetError::ParseGltf {
                    name: file.name.clone(),
                    source: err,
                })
            }
        },
    };
    let (document, buffers, _images) = imported;

    let scene = document
        .default_scene()
        .or_else(|| document.scenes().next())
        .ok_or_else(|| AssetError::NoScene {
            name: file.name.clone(),
        })?;

    let mut builder = GraphBuilder {
        buffers: &buffers,
        geometries: HashMap::new(),
        materials: HashMap::new(),
    };
    let mut root = Node::new(scene.name().unwrap_or("Scene"));
    for node in scene.nodes() {
        root.children.push(builder.node(&node));
    }

    let graph = SceneGraph {
        name: file.name.clone(),
        root,
    };
    if graph.mesh_count() == 0 {
        return Err(AssetError::EmptyGeometry {
            name: file.name.clone(),
        });
    }
    Ok(graph)
}

struct GraphBuilder<'a> {
    buffers: &'a [gltf::buffer::Data],
    geometries: HashMap<usize, Option<(Arc<Geometry>, Vec<Option<usize>>)>>,
    materials: HashMap<Option<usize>, Arc<Material>>,
}

impl GraphBuilder<'_> {
    fn node(&mut self, node: &gltf::Node) -> Node {
        let (translation, rotation, scale) = node.transform().decomposed();
        let name = node
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("node_{}", node.index()));
        let mesh = node.mesh().and_then(|mesh| self.mesh(&mesh));

        Node {
            name,
            transform: Transform::from_parts(translation, rotation, scale),
            mesh,
            children: node.children().map(|child| self.node(&child)).collect(),
        }
    }

    /// Nodes pointing at the same glTF mesh share one geometry.
    fn mesh(&mut self, mesh: &gltf::Mesh) -> Option<MeshNode> {
        if !self.geometries.contains_key(&mesh.index()) {
            let built = self.build_geometry(mesh);
            self.geometries.insert(mesh.index(), built);
        }
        let (geometry, material_indices) = self.geometries.get(&mesh.index())?.clone()?;

        let document_materials: Vec<gltf::Material> =
            mesh.primitives().map(|primitive| primitive.material()).collect();
        let mut resolved: Vec<Arc<Material>> = material_indices
            .iter()
            .map(|index| {
                let source = document_materials
                    .iter()
                    .find(|material| material.index() == *index);
                self.material(*index, source)
            })
            .collect();

        let materials = if resolved.len() == 1 {
            Materials::Single(resolved.remove(0))
        } else {
            Materials::Multi(resolved)
        };
        Some(MeshNode {
            geometry,
            materials,
            cast_shadow: false,
            receive_shadow: false,
        })
    }

    fn build_geometry(&self, mesh: &gltf::Mesh) -> Option<(Arc<Geometry>, Vec<Option<usize>>)> {
        let mut geometry = Geometry::default();
        let mut material_indices = Vec::new();

        for primitive in mesh.primitives() {
            if primitive.mode() != gltf::mesh::Mode::Triangles {
                log::debug!(
                    "Skipping non-triangle primitive {} of mesh {}",
                    primitive.index(),
                    mesh.index()
                );
                continue;
            }
            let reader = primitive
                .reader(|buffer| self.buffers.get(buffer.index()).map(|data| data.0.as_slice()));
            let Some(positions) = reader.read_positions() else {
                continue;
            };
            let base = geometry.positions.len() as u32;
            geometry.positions.extend(positions.map(Vec3::from_array));
            let vertex_count = geometry.positions.len() as u32 - base;

            let start = geometry.indices.len();
            match reader.read_indices() {
                Some(indices) => {
                    let indices: Vec<u32> = indices.into_u32().collect();
                    let mut dropped = 0;
                    for triangle in indices.chunks_exact(3) {
                        if triangle.iter().all(|i| *i < vertex_count) {
                            geometry.indices.extend(triangle.iter().map(|i| base + i));
                        } else {
                            dropped += 1;
                        }
                    }
                    if dropped > 0 {
                        log::warn!(
                            "Dropped {} triangles with out-of-range indices in primitive {} of mesh {}",
                            dropped,
                            primitive.index(),
                            mesh.index()
                        );
                    }
                }
                None => geometry.indices.extend(base..base + vertex_count),
            }
            let count = (geometry.indices.len() - start) / 3 * 3;
            geometry.indices.truncate(start + count);
            if count == 0 {
                continue;
            }

            geometry.groups.push(GeometryGroup {
                start,
                count,
                material_index: material_indices.len(),
            });
            material_indices.push(primitive.material().index());
        }

        if geometry.indices.is_empty() {
            return None;
        }
        Some((Arc::new(geometry), material_indices))
    }

    fn material(&mut self, index: Option<usize>, source: Option<&gltf::Material>) -> Arc<Material> {
        if let Some(material) = self.materials.get(&index) {
            return Arc::clone(material);
        }
        let material = match source {
            Some(source) => {
                let pbr = source.pbr_metallic_roughness();
                Material {
                    name: source
                        .name()
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("material_{}", index.unwrap_or(0))),
                    base_color: pbr.base_color_factor(),
                    metallic: pbr.metallic_factor(),
                    roughness: pbr.roughness_factor(),
                    emissive: source.emissive_factor(),
                    double_sided: source.double_sided(),
                }
            }
            None => Material::default(),
        };
        let material = Arc::new(material);
        self.materials.insert(index, Arc::clone(&material));
        material
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::{indexed_glb, triangle_glb};
    use super::*;

    fn registry_with(bytes: Vec<u8>) -> (ObjectUrlRegistry, ResourceHandle) {
        let mut registry = ObjectUrlRegistry::new();
        let handle = registry.create(SelectedFile::from_bytes("model.glb", bytes));
        (registry, handle)
    }

    #[test]
    fn loads_single_primitive_as_single_material() {
        let (registry, handle) = registry_with(triangle_glb(1, 1));
        let mut loader = GltfLoader::new();
        let graph = loader.load(&handle, &registry).expect("load glb");
        assert_eq!(graph.mesh_count(), 1);
        let mesh = graph.root.children[0].mesh.as_ref().expect("mesh");
        assert_eq!(mesh.geometry.triangle_count(), 1);
        match &mesh.materials {
            Materials::Single(material) => {
                assert_eq!(material.name, "mat0");
                assert_eq!(material.base_color, [1.0, 0.5, 0.25, 1.0]);
            }
            Materials::Multi(_) => panic!("expected single material"),
        }
    }

    #[test]
    fn merges_multiple_primitives_into_groups() {
        let (registry, handle) = registry_with(triangle_glb(2, 1));
        let mut loader = GltfLoader::new();
        let graph = loader.load(&handle, &registry).expect("load glb");
        let mesh = graph.root.children[0].mesh.as_ref().expect("mesh");
        assert_eq!(mesh.geometry.groups.len(), 2);
        assert_eq!(mesh.geometry.positions.len(), 6);
        assert_eq!(mesh.geometry.indices, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(mesh.materials.len(), 2);
        assert_eq!(mesh.materials.get(1).map(|m| m.name.as_str()), Some("mat1"));
    }

    #[test]
    fn out_of_range_index_drops_only_its_triangle() {
        let (registry, handle) = registry_with(indexed_glb(&[0, 9, 1, 0, 1, 2], 1, 1));
        let mut loader = GltfLoader::new();
        let graph = loader.load(&handle, &registry).expect("load glb");
        let mesh = graph.root.children[0].mesh.as_ref().expect("mesh");
        assert_eq!(mesh.geometry.indices, vec![0, 1, 2]);
        assert_eq!(mesh.geometry.groups[0].count, 3);
    }

    #[test]
    fn instanced_mesh_shares_geometry_in_cache() {
        let (registry, handle) = registry_with(triangle_glb(1, 2));
        let mut loader = GltfLoader::new();
        let graph = loader.load(&handle, &registry).expect("load glb");
        let a = graph.root.children[0].mesh.as_ref().expect("mesh a");
        let b = graph.root.children[1].mesh.as_ref().expect("mesh b");
        assert!(Arc::ptr_eq(&a.geometry, &b.geometry));
        let (min, max) = graph.bounds().expect("bounds");
        assert_eq!(min, Vec3::ZERO);
        assert_eq!(max, Vec3::new(3.0, 1.0, 0.0));
    }

    #[test]
    fn load_is_cached_until_evicted() {
        let (registry, handle) = registry_with(triangle_glb(1, 1));
        let mut loader = GltfLoader::new();
        let first = loader.load(&handle, &registry).expect("first load");
        let second = loader.load(&handle, &registry).expect("second load");
        assert!(Arc::ptr_eq(&first, &second));
        assert!(loader.evict(&handle));
        assert!(!loader.evict(&handle));
        let third = loader.load(&handle, &registry).expect("reload");
        assert!(!Arc::ptr_eq(&first, &third));
    }

    #[test]
    fn revoked_handle_cannot_load() {
        let (mut registry, handle) = registry_with(triangle_glb(1, 1));
        registry.revoke(&handle);
        let mut loader = GltfLoader::new();
        assert!(matches!(
            loader.load(&handle, &registry),
            Err(AssetError::UnknownHandle(_))
        ));
    }

    #[test]
    fn garbage_bytes_fail_to_parse() {
        let (registry, handle) = registry_with(b"not a model".to_vec());
        let mut loader = GltfLoader::new();
        let err = loader.load(&handle, &registry).expect_err("garbage");
        assert!(matches!(err, AssetError::ParseGltf { .. }));
        assert!(!loader.is_cached(&handle));
        assert_eq!(loader.cached_count(), 0);
    }
}
