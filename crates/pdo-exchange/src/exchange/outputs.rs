// crates/pdo-exchange/src/exchange/outputs.rs
use core::ops::Range;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct OutputImage {
    bytes: Vec<u8>,
    dirty: bool,
}

/// Output image staged by callers and written by the exchange thread at the
/// start of a cycle.
///
/// The lock is held only to copy bytes, so a cycle always writes an image
/// that contains either all or none of a caller's update.
#[derive(Debug, Default)]
pub(crate) struct OutputStage {
    image: Mutex<OutputImage>,
}

impl OutputStage {
    fn lock(&self) -> MutexGuard<'_, OutputImage> {
        self.image.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Resizes the image for a new layout. Existing bytes are kept where they fit.
    pub(crate) fn resize(&self, len: usize) {
        let mut image = self.lock();
        image.bytes.resize(len, 0);
        image.dirty = true;
    }

    /// Forces the next cycle to write the whole image.
    pub(crate) fn mark_dirty(&self) {
        self.lock().dirty = true;
    }

    /// Copies each `(range, bytes)` pair into the image under one lock.
    ///
    /// The image only becomes pending if a byte actually changed.
    pub(crate) fn stage<'a>(&self, updates: impl IntoIterator<Item = (Range<usize>, &'a [u8])>) {
        let mut image = self.lock();
        let mut changed = false;
        for (range, bytes) in updates {
            match image.bytes.get_mut(range) {
                Some(target) if target.len() == bytes.len() && target != bytes => {
                    target.copy_from_slice(bytes);
                    changed = true;
                }
                _ => {}
            }
        }
        image.dirty |= changed;
    }

    /// Copies the image into `buffer` if it changed since the last call.
    pub(crate) fn take_pending(&self, buffer: &mut Vec<u8>) -> bool {
        let mut image = self.lock();
        if !image.dirty {
            return false;
        }
        buffer.clear();
        buffer.extend_from_slice(&image.bytes);
        image.dirty = false;
        true
    }

    pub(crate) fn snapshot(&self) -> Vec<u8> {
        self.lock().bytes.clone()
    }
}
