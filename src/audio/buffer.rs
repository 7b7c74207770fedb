use parking_lot::Mutex;
use ringbuf::{traits::*, HeapRb};
use std::sync::Arc;

/// Sliding window over the most recent rendered samples.
///
/// The render thread pushes, readers copy the window out. Old samples are
/// overwritten once the window is full.
pub struct SampleWindow {
    buffer: Arc<Mutex<HeapRb<f32>>>,
}

impl SampleWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: Arc::new(Mutex::new(HeapRb::new(capacity))),
        }
    }

    pub fn push(&self, samples: &[f32]) {
        self.buffer.lock().push_slice_overwrite(samples);
    }

    /// Copy of the window, oldest first, zero-padded at the front until the
    /// window has filled once
    pub fn snapshot(&self) -> Vec<f32> {
        let buffer = self.buffer.lock();
        let capacity = buffer.capacity().get();
        let mut samples = vec![0.0; capacity - buffer.occupied_len()];
        samples.extend(buffer.iter().copied());
        samples
    }

    pub fn len(&self) -> usize {
        self.buffer.lock().occupied_len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.lock().is_empty()
    }

    pub fn clear(&self) {
        self.buffer.lock().clear();
    }

    pub fn capacity(&self) -> usize {
        self.buffer.lock().capacity().get()
    }
}

impl Clone for SampleWindow {
    fn clone(&self) -> Self {
        Self {
            buffer: Arc::clone(&self.buffer),
        }
    }
}
