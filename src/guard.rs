use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// At-most-one in-flight send per conversation surface.
#[derive(Debug, Clone, Default)]
pub struct SendGuard {
    busy: Arc<AtomicBool>,
}

impl SendGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the surface, or `None` while another send holds it.
    #[must_use]
    pub fn try_acquire(&self) -> Option<SendPermit> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SendPermit {
                busy: Arc::clone(&self.busy),
            })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Held for the duration of one send; releases the guard on drop.
#[derive(Debug)]
pub struct SendPermit {
    busy: Arc<AtomicBool>,
}

impl Drop for SendPermit {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::SendGuard;

    #[test]
    fn second_acquire_is_refused_while_permit_lives() {
        let guard = SendGuard::new();
        let permit = guard.try_acquire().expect("first send should be admitted");
        assert!(guard.is_busy());
        assert!(guard.try_acquire().is_none());
        assert!(guard.clone().try_acquire().is_none());

        drop(permit);
        assert!(!guard.is_busy());
        assert!(guard.try_acquire().is_some());
    }
}
