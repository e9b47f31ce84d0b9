//! Fixed-capacity ring storage with fractional, interpolated reads.

/*
Circular Buffers
================

Every unit in this crate stores audio in a ring: a fixed block of memory
that is written sample by sample and wraps back to the start when it reaches
the end. Nothing ever grows; memory is claimed once at construction.

Vocabulary
----------

  capacity      Number of samples the ring can hold. Never changes.

  length        The part of the ring that holds meaningful audio. For a
                continuously recording unit this is the whole capacity; for a
                looper it is the recorded high-water mark.

  head          A fractional position into the ring. Playback heads advance by
                a signed rate every sample, so they can run backwards.

  frac          The fractional part of a head position, used to blend two
                neighbouring samples.


Linear Interpolation
--------------------

A head sitting between two samples reads a weighted blend of both:

    floor = ⌊position⌋ mod length
    next  = (floor + 1) mod length
    frac  = position − ⌊position⌋

    out   = buffer[floor] × (1 − frac) + buffer[next] × frac

    buffer  ─┬────┬────┬────┬─
             │ a  │ b  │ c  │
             └────┴────┴────┴─
                    ↑
                 position = 1.25  →  out = b × 0.75 + c × 0.25


Negative Positions
------------------

A reversed head happily walks below zero. Rust's `%` keeps the sign of the
dividend, so the wrap is done twice:

    wrapped = ((x % n) + n) % n

which lands in [0, n) for any finite x.


Sub-Windows
-----------

Loops and splices play a region [start, start + length) of a bigger ring.
`read_region` interpolates inside that region, so the sample after the last
one is the region's first sample, not whatever follows it in memory.
*/

use crate::error::EngineError;

/// Wrap `x` into `[0, n)`. Returns 0 for a non-positive `n`.
#[inline]
pub fn wrap(x: f64, n: f64) -> f64 {
    if n <= 0.0 {
        return 0.0;
    }
    let w = ((x % n) + n) % n;
    // (tiny negative x) + n can round up to exactly n
    if w >= n {
        0.0
    } else {
        w
    }
}

/// Integer flavour of [`wrap`].
#[inline]
pub fn wrap_index(i: isize, n: usize) -> usize {
    if n == 0 {
        return 0;
    }
    let n = n as isize;
    (((i % n) + n) % n) as usize
}

/// A ring of `f32` samples with interpolated reads.
#[derive(Debug, Clone)]
pub struct CircularBuffer {
    data: Vec<f32>,
}

impl CircularBuffer {
    /// Allocate a zeroed ring, reporting allocation failure instead of
    /// aborting. Large reels (minutes of audio) go through here.
    pub fn try_new(capacity: usize, what: &'static str) -> Result<Self, EngineError> {
        let capacity = capacity.max(1);
        let mut data = Vec::new();
        data.try_reserve_exact(capacity)
            .map_err(|_| EngineError::Allocation {
                what,
                samples: capacity,
            })?;
        data.resize(capacity, 0.0);
        Ok(Self { data })
    }

    /// Allocate a zeroed ring. Panics only if the allocator does.
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0.0; capacity.max(1)],
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Store `sample` at `position mod capacity`.
    #[inline]
    pub fn write(&mut self, position: usize, sample: f32) {
        let len = self.data.len();
        self.data[position % len] = sample;
    }

    /// Read the raw sample at `position mod capacity`.
    #[inline]
    pub fn read(&self, position: usize) -> f32 {
        self.data[position % self.data.len()]
    }

    /// Linear-interpolated read over the first `length` samples.
    ///
    /// `length` is clamped to the capacity; a zero length is silence.
    #[inline]
    pub fn read_interpolated(&self, position: f64, length: usize) -> f32 {
        self.read_region(0, length, position)
    }

    /// Linear-interpolated read inside `[start, start + length)`, with
    /// `offset` measured from `start` and wrapped into the region.
    #[inline]
    pub fn read_region(&self, start: usize, length: usize, offset: f64) -> f32 {
        let capacity = self.data.len();
        let length = length.min(capacity);
        if length == 0 || !offset.is_finite() {
            return 0.0;
        }

        let pos = wrap(offset, length as f64);
        let floor = (pos.floor() as usize) % length;
        let frac = (pos - floor as f64) as f32;
        let next = (floor + 1) % length;

        let a = self.data[(start + floor) % capacity];
        let b = self.data[(start + next) % capacity];
        a * (1.0 - frac) + b * frac
    }

    /// Copy `samples` into the ring starting at index 0. The rest is zeroed.
    pub fn load(&mut self, samples: &[f32]) -> Result<(), EngineError> {
        if samples.len() > self.data.len() {
            return Err(EngineError::BufferTooLong {
                len: samples.len(),
                capacity: self.data.len(),
            });
        }
        self.data[..samples.len()].copy_from_slice(samples);
        self.data[samples.len()..].fill(0.0);
        Ok(())
    }

    /// Copy the `len` samples that end just before `end` (ring order) into
    /// `dest[..len]`. Used for freeze snapshots.
    pub fn copy_recent(&self, end: usize, len: usize, dest: &mut [f32]) {
        let capacity = self.data.len();
        let len = len.min(capacity).min(dest.len());
        let start = wrap_index(end as isize - len as isize, capacity);
        for (i, slot) in dest[..len].iter_mut().enumerate() {
            *slot = self.data[(start + i) % capacity];
        }
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn clear(&mut self) {
        self.data.fill(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(len: usize) -> CircularBuffer {
        let mut buffer = CircularBuffer::new(len);
        for i in 0..len {
            buffer.write(i, i as f32 * 0.5 - 1.0);
        }
        buffer
    }

    #[test]
    fn test_integer_read_is_exact() {
        let buffer = ramp(16);
        for k in 0..40 {
            let got = buffer.read_interpolated(k as f64, 16);
            assert_eq!(got, buffer.read(k % 16));
        }
    }

    #[test]
    fn test_half_position_is_midpoint() {
        let buffer = ramp(16);
        for k in 0..16usize {
            let a = buffer.read(k);
            let b = buffer.read((k + 1) % 16);
            let got = buffer.read_interpolated(k as f64 + 0.5, 16);
            assert_eq!(got, (a + b) * 0.5);
        }
    }

    #[test]
    fn test_negative_positions_wrap() {
        let buffer = ramp(8);
        assert_eq!(buffer.read_interpolated(-1.0, 8), buffer.read(7));
        assert_eq!(
            buffer.read_interpolated(-0.5, 8),
            (buffer.read(7) + buffer.read(0)) * 0.5
        );
    }

    #[test]
    fn test_zero_length_is_silence() {
        let buffer = ramp(8);
        assert_eq!(buffer.read_interpolated(3.25, 0), 0.0);
        assert_eq!(buffer.read_region(2, 0, 1.0), 0.0);
    }

    #[test]
    fn test_region_wraps_to_region_start() {
        let buffer = ramp(16);
        // region [4, 8): sample after index 7 is index 4
        let got = buffer.read_region(4, 4, 3.5);
        assert_eq!(got, (buffer.read(7) + buffer.read(4)) * 0.5);
    }

    #[test]
    fn test_wrap_helpers() {
        assert_eq!(wrap(-0.25, 4.0), 3.75);
        assert_eq!(wrap(9.0, 4.0), 1.0);
        assert_eq!(wrap(1.0, 0.0), 0.0);
        assert_eq!(wrap_index(-1, 5), 4);
        assert_eq!(wrap_index(12, 5), 2);
    }

    #[test]
    fn test_load_rejects_oversized_input() {
        let mut buffer = CircularBuffer::new(4);
        assert!(buffer.load(&[0.0; 5]).is_err());
        buffer.load(&[1.0, 2.0]).unwrap();
        assert_eq!(buffer.as_slice(), &[1.0, 2.0, 0.0, 0.0]);
    }

    #[test]
    fn test_copy_recent_handles_wrap() {
        let buffer = ramp(8);
        let mut dest = [0.0; 3];
        buffer.copy_recent(1, 3, &mut dest);
        assert_eq!(dest, [buffer.read(6), buffer.read(7), buffer.read(0)]);
    }
}
