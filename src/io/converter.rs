//! Interleaved ↔ planar conversion for device callbacks.
//!
//! Audio devices hand out `[L R L R ...]` frames; engines work on separate
//! channel slices. Mono devices duplicate onto both channels; devices with
//! more than two channels only use the first two.

/// Split interleaved `data` with `channels` per frame into `left`/`right`.
/// Returns the number of frames written.
pub fn deinterleave(data: &[f32], channels: usize, left: &mut [f32], right: &mut [f32]) -> usize {
    if channels == 0 {
        return 0;
    }
    let frames = (data.len() / channels).min(left.len()).min(right.len());
    for (i, frame) in data.chunks_exact(channels).take(frames).enumerate() {
        left[i] = frame[0];
        right[i] = if channels > 1 { frame[1] } else { frame[0] };
    }
    frames
}

/// Write planar `left`/`right` into interleaved `data`. Mono devices get the
/// average; extra channels are silenced.
pub fn interleave(left: &[f32], right: &[f32], channels: usize, data: &mut [f32]) -> usize {
    if channels == 0 {
        return 0;
    }
    let frames = (data.len() / channels).min(left.len()).min(right.len());
    for (i, frame) in data.chunks_exact_mut(channels).take(frames).enumerate() {
        match frame {
            [mono] => *mono = (left[i] + right[i]) * 0.5,
            [l, r, rest @ ..] => {
                *l = left[i];
                *r = right[i];
                rest.fill(0.0);
            }
            [] => {}
        }
    }
    frames
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stereo_round_trip() {
        let data = [1.0, -1.0, 0.5, -0.5];
        let mut l = [0.0; 2];
        let mut r = [0.0; 2];
        assert_eq!(deinterleave(&data, 2, &mut l, &mut r), 2);
        assert_eq!(l, [1.0, 0.5]);
        assert_eq!(r, [-1.0, -0.5]);

        let mut out = [0.0; 4];
        interleave(&l, &r, 2, &mut out);
        assert_eq!(out, data);
    }

    #[test]
    fn test_mono_device() {
        let data = [0.25, 0.75];
        let mut l = [0.0; 2];
        let mut r = [0.0; 2];
        deinterleave(&data, 1, &mut l, &mut r);
        assert_eq!(l, r);

        let mut out = [0.0; 2];
        interleave(&[1.0, 0.0], &[0.0, 0.0], 1, &mut out);
        assert_eq!(out, [0.5, 0.0]);
    }

    #[test]
    fn test_extra_channels_silenced() {
        let mut out = [9.0; 8];
        interleave(&[1.0, 2.0], &[3.0, 4.0], 4, &mut out);
        assert_eq!(out, [1.0, 3.0, 0.0, 0.0, 2.0, 4.0, 0.0, 0.0]);
    }
}
