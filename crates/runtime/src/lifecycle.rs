use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared "still mounted" flag.
///
/// Async completions hold a clone and check it before writing into scene
/// state; after `unmount` every late write becomes a no-op.
#[derive(Debug, Clone)]
pub struct MountGuard {
    mounted: Arc<AtomicBool>,
}

impl Default for MountGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl MountGuard {
    pub fn new() -> Self {
        Self {
            mounted: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::Acquire)
    }

    /// Returns `true` if this call performed the transition.
    pub fn unmount(&self) -> bool {
        self.mounted.swap(false, Ordering::AcqRel)
    }
}

#[cfg(test)]
mod tests {
    use super::MountGuard;

    #[test]
    fn clones_observe_unmount() {
        let guard = MountGuard::new();
        let late = guard.clone();
        assert!(late.is_mounted());
        assert!(guard.unmount());
        assert!(!late.is_mounted());
        assert!(!guard.unmount());
    }
}
