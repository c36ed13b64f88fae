/// Centered framing: the input is zero-padded by `frame_length / 2` on both
/// sides, then cut into `frame_length` windows every `hop_length` samples.
/// Any non-empty input yields at least one frame.
#[derive(Clone, Debug)]
pub struct CenteredFrames {
    padded: Vec<f32>,
    frame_length: usize,
    hop_length: usize,
}

impl CenteredFrames {
    pub fn new(samples: &[f32], frame_length: usize, hop_length: usize) -> Self {
        let frame_length = frame_length.max(1);
        let pad = frame_length / 2;
        let mut padded = vec![0.0f32; samples.len() + 2 * pad];
        padded[pad..pad + samples.len()].copy_from_slice(samples);
        Self {
            padded,
            frame_length,
            hop_length: hop_length.max(1),
        }
    }

    pub fn count(&self) -> usize {
        if self.padded.len() < self.frame_length {
            return 0;
        }
        1 + (self.padded.len() - self.frame_length) / self.hop_length
    }

    pub fn iter(&self) -> impl Iterator<Item = &[f32]> {
        self.padded
            .windows(self.frame_length)
            .step_by(self.hop_length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_sample_yields_one_frame() {
        let frames = CenteredFrames::new(&[0.5], 2048, 512);
        assert_eq!(frames.count(), 1);
        let first = frames.iter().next().unwrap();
        assert_eq!(first.len(), 2048);
        assert_eq!(first[1024], 0.5);
    }

    #[test]
    fn frame_count_matches_iterator() {
        for len in [1usize, 511, 512, 513, 2048, 16_000, 32_000] {
            let samples = vec![0.1f32; len];
            let frames = CenteredFrames::new(&samples, 2048, 512);
            assert_eq!(frames.count(), frames.iter().count(), "len={len}");
            assert_eq!(frames.count(), 1 + len / 512, "len={len}");
        }
    }
}
