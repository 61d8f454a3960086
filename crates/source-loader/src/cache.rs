//! Per-export snapshot cache.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use tokio::sync::OnceCell;

use crate::document::Bitmap;

type Slot = Arc<OnceCell<Option<Bitmap>>>;

/// Memoizes rendered pages by page number.
///
/// Each page gets one slot; the first caller runs the render and every
/// concurrent caller for the same page awaits that same computation.
/// Failures are cached as `None` as well, so a broken page is attempted
/// once per export.
#[derive(Debug, Default)]
pub struct SnapshotCache {
    slots: Mutex<HashMap<u32, Slot>>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached bitmap for `page`, rendering it with `render` if
    /// this is the first request.
    pub async fn get_or_render<F, Fut>(&self, page: u32, render: F) -> Option<Bitmap>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Option<Bitmap>>,
    {
        let slot = self.slot(page);
        slot.get_or_init(render).await.clone()
    }

    /// Number of pages with a completed entry (rendered or failed).
    pub fn completed(&self) -> usize {
        self.lock().values().filter(|slot| slot.initialized()).count()
    }

    fn slot(&self, page: u32) -> Slot {
        self.lock().entry(page).or_default().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<u32, Slot>> {
        // A panic while holding the map cannot leave it inconsistent.
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
