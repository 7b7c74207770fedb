use std::sync::Arc;

/// Looping playback head over a decoded clip
#[derive(Clone, Debug)]
pub struct LoopSource {
    clip: Arc<[f32]>,
    position: usize,
}

impl LoopSource {
    /// Start `offset_frames` into the clip, wrapped to its length
    pub fn new(clip: Arc<[f32]>, offset_frames: u64) -> Self {
        let position = if clip.is_empty() {
            0
        } else {
            (offset_frames % clip.len() as u64) as usize
        };
        Self { clip, position }
    }

    pub fn next_sample(&mut self) -> f32 {
        if self.clip.is_empty() {
            return 0.0;
        }
        let sample = self.clip[self.position];
        self.position = (self.position + 1) % self.clip.len();
        sample
    }
}
