use super::{DisposeReport, SceneCopy};
use crate::assets::{AssetError, AssetLoader, ObjectUrlRegistry, ResourceHandle};
use glam::{Mat4, Quat, Vec3};

/// Angular rate of the turntable animation, radians per second.
pub const AUTO_ROTATE_RATE: f32 = 0.5;

/// Presents the model behind one resource handle.
///
/// Owns the scene copy for the mounted handle plus the per-frame rotation and
/// uniform scale applied on top of it.
pub struct ModelPresenter {
    mounted: Option<(ResourceHandle, SceneCopy)>,
    rotation_y: f32,
    scale: f32,
}

impl Default for ModelPresenter {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelPresenter {
    pub fn new() -> Self {
        Self {
            mounted: None,
            rotation_y: 0.0,
            scale: 1.0,
        }
    }

    pub fn handle(&self) -> Option<&ResourceHandle> {
        self.mounted.as_ref().map(|(handle, _)| handle)
    }

    pub fn scene(&self) -> Option<&SceneCopy> {
        self.mounted.as_ref().map(|(_, copy)| copy)
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.is_some()
    }

    /// Mounts `handle`, replacing whatever was mounted before. Mounting the
    /// handle that is already mounted does nothing.
    pub fn mount(
        &mut self,
        handle: &ResourceHandle,
        loader: &mut dyn AssetLoader,
        registry: &ObjectUrlRegistry,
    ) -> Result<(), AssetError> {
        if self.handle() == Some(handle) {
            return Ok(());
        }
        self.unmount();

        let shared = loader.load(handle, registry)?;
        let copy = SceneCopy::from_shared(&shared);
        self.rotation_y = 0.0;
        self.mounted = Some((handle.clone(), copy));
        Ok(())
    }

    /// Tears down the mounted copy, releasing its buffers.
    pub fn unmount(&mut self) -> Option<DisposeReport> {
        let (handle, mut copy) = self.mounted.take()?;
        let report = copy.dispose();
        log::info!(
            "Unmounted {}: released {} geometries, {} materials",
            handle,
            report.geometries,
            report.materials
        );
        Some(report)
    }

    /// Per-frame update, called once per rendered frame with the frame delta.
    pub fn update(&mut self, dt: f32, auto_rotate: bool) {
        if auto_rotate && self.mounted.is_some() {
            self.rotation_y = (self.rotation_y + dt * AUTO_ROTATE_RATE) % std::f32::consts::TAU;
        }
    }

    pub fn set_scale(&mut self, scale: f32) {
        self.scale = scale;
    }

    #[cfg(test)]
    pub fn rotation_y(&self) -> f32 {
        self.rotation_y
    }

    /// Model matrix of the presented copy, below the gizmo-controlled group.
    pub fn model_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(
            Vec3::splat(self.scale),
            Quat::from_rotation_y(self.rotation_y),
            Vec3::ZERO,
        )
    }
}

impl Drop for ModelPresenter {
    fn drop(&mut self) {
        self.unmount();
    }
}
