//! Resource handle lifetime for the model currently on screen.
//!
//! Selecting a file hides the model, releases the previous handle (registry
//! revoke plus loader eviction) and only issues the new handle once the swap
//! delay has elapsed, so the presenter always remounts from scratch.

use super::{AssetLoader, ObjectUrlRegistry, ResourceHandle, SelectedFile};
use std::time::{Duration, Instant};

pub const DEFAULT_SWAP_DELAY: Duration = Duration::from_millis(100);

struct PendingSwap {
    file: SelectedFile,
    ready_at: Instant,
}

pub struct UploadController {
    registry: ObjectUrlRegistry,
    current: Option<ResourceHandle>,
    pending: Option<PendingSwap>,
    visible: bool,
    swap_delay: Duration,
}

impl UploadController {
    pub fn new(swap_delay: Duration) -> Self {
        Self {
            registry: ObjectUrlRegistry::new(),
            current: None,
            pending: None,
            visible: true,
            swap_delay,
        }
    }

    pub fn registry(&self) -> &ObjectUrlRegistry {
        &self.registry
    }

    pub fn current(&self) -> Option<&ResourceHandle> {
        self.current.as_ref()
    }

    /// Whether the presenter should be mounted this frame.
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_swap_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Handles a file-selection event. Returns `false` when no file was selected.
    pub fn select_file(
        &mut self,
        file: Option<SelectedFile>,
        loader: &mut dyn AssetLoader,
        now: Instant,
    ) -> bool {
        let Some(file) = file else {
            return false;
        };

        self.release_current(loader);
        if let Some(superseded) = self.pending.take() {
            log::debug!("Discarding pending selection '{}'", superseded.file.name);
        }

        log::info!(
            "Selected '{}'; swapping in after {:?}",
            file.name,
            self.swap_delay
        );
        self.visible = false;
        self.pending = Some(PendingSwap {
            file,
            ready_at: now + self.swap_delay,
        });
        true
    }

    /// Issues the pending handle once its delay has elapsed.
    pub fn poll(&mut self, now: Instant) -> Option<&ResourceHandle> {
        let ready = self
            .pending
            .as_ref()
            .map(|pending| now >= pending.ready_at)
            .unwrap_or(false);
        if !ready {
            return None;
        }
        let pending = self.pending.take()?;
        let handle = self.registry.create(pending.file);
        self.current = Some(handle);
        self.visible = true;
        self.current.as_ref()
    }

    /// Time left until the pending swap completes.
    pub fn time_until_swap(&self, now: Instant) -> Option<Duration> {
        self.pending
            .as_ref()
            .map(|pending| pending.ready_at.saturating_duration_since(now))
    }

    /// Releases everything; used when the view goes away.
    pub fn teardown(&mut self, loader: &mut dyn AssetLoader) {
        self.release_current(loader);
        self.pending = None;
        self.visible = false;
        log::debug!(
            "Upload controller torn down; {} handles revoked this session",
            self.registry.revoked_total()
        );
    }

    fn release_current(&mut self, loader: &mut dyn AssetLoader) {
        if let Some(previous) = self.current.take() {
            self.registry.revoke(&previous);
            loader.evict(&previous);
        }
    }
}
