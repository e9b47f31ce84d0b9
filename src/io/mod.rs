// Purpose - block views handed to engines, format conversions

pub mod converter;

/// One block of planar stereo input. Either channel may be absent
/// (nothing patched in); absent channels read as silence.
#[derive(Debug, Default, Clone, Copy)]
pub struct AudioInput<'a> {
    pub left: Option<&'a [f32]>,
    pub right: Option<&'a [f32]>,
}

impl<'a> AudioInput<'a> {
    pub fn stereo(left: &'a [f32], right: &'a [f32]) -> Self {
        Self {
            left: Some(left),
            right: Some(right),
        }
    }

    /// Same signal on both channels.
    pub fn mono(samples: &'a [f32]) -> Self {
        Self::stereo(samples, samples)
    }

    /// No input connected.
    pub fn silent() -> Self {
        Self::default()
    }

    /// `(left, right)` at frame `i`, zero where missing or short.
    #[inline]
    pub fn frame(&self, i: usize) -> (f32, f32) {
        let read = |ch: Option<&[f32]>| ch.and_then(|s| s.get(i)).copied().unwrap_or(0.0);
        (read(self.left), read(self.right))
    }

    /// Sub-block `[start, end)`. Channels shorter than `start` become absent.
    pub fn slice(&self, start: usize, end: usize) -> AudioInput<'a> {
        let cut = |ch: Option<&'a [f32]>| {
            ch.and_then(|s| {
                let end = end.min(s.len());
                (start < end).then(|| &s[start..end])
            })
        };
        AudioInput {
            left: cut(self.left),
            right: cut(self.right),
        }
    }
}

/// One block of planar stereo output. Engines fill `frames()` samples.
#[derive(Debug)]
pub struct AudioOutput<'a> {
    pub left: &'a mut [f32],
    pub right: &'a mut [f32],
}

impl<'a> AudioOutput<'a> {
    pub fn new(left: &'a mut [f32], right: &'a mut [f32]) -> Self {
        Self { left, right }
    }

    /// Frames both channels can hold.
    #[inline]
    pub fn frames(&self) -> usize {
        self.left.len().min(self.right.len())
    }

    #[inline]
    pub fn write(&mut self, i: usize, left: f32, right: f32) {
        self.left[i] = left;
        self.right[i] = right;
    }

    pub fn silence(&mut self) {
        self.left.fill(0.0);
        self.right.fill(0.0);
    }

    /// Reborrow frames `[start, end)`.
    pub fn slice_mut(&mut self, start: usize, end: usize) -> AudioOutput<'_> {
        AudioOutput {
            left: &mut self.left[start..end],
            right: &mut self.right[start..end],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_channels_read_silence() {
        let left = [0.5, 0.25];
        let input = AudioInput {
            left: Some(&left),
            right: None,
        };
        assert_eq!(input.frame(0), (0.5, 0.0));
        assert_eq!(input.frame(5), (0.0, 0.0));
        assert_eq!(AudioInput::silent().frame(0), (0.0, 0.0));
    }

    #[test]
    fn test_slice_input() {
        let data = [1.0, 2.0, 3.0, 4.0];
        let input = AudioInput::mono(&data).slice(1, 3);
        assert_eq!(input.left, Some(&data[1..3]));
        assert!(AudioInput::mono(&data).slice(6, 8).left.is_none());
    }

    #[test]
    fn test_output_slice_writes_through() {
        let mut l = [0.0; 4];
        let mut r = [0.0; 4];
        let mut out = AudioOutput::new(&mut l, &mut r);
        out.slice_mut(2, 4).write(0, 1.0, -1.0);
        assert_eq!(l[2], 1.0);
        assert_eq!(r[2], -1.0);
    }
}
