//! Splice markers over the reel.

/*
Splices
=======

Markers are sample offsets into the reel. Marker 0 always exists, so the
reel is always covered: splice k runs from marker k to marker k+1, and the
last splice runs to the end of the recording.

    reel   |■■■■■■■■■■■■■|■■■■■■■|■■■■■■■■■■■■■■■■■■■■|
           0             m1      m2                    recorded
           └─ splice 0 ──┘└─ 1 ──┘└───── splice 2 ─────┘

At most `MAX_SPLICES` markers exist. Placing one more evicts the oldest
non-zero marker, which merges its two neighbouring splices. Storage is
reserved up front so marking during playback never allocates.
*/

use crate::error::EngineError;

pub const MAX_SPLICES: usize = 300;

/// Result of placing a marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placed {
    /// Splice the new marker starts.
    pub splice: usize,
    /// Marker removed to make room, if the set was full.
    pub evicted: Option<usize>,
}

impl Placed {
    /// Where splice `k` from before the insert ended up. An evicted marker
    /// folds its splice into the one before it.
    pub fn follow(&self, k: usize) -> usize {
        match self.evicted {
            Some(e) if k >= e => k - 1,
            _ => k,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SpliceSet {
    /// Ascending, `markers[0] == 0`.
    markers: Vec<usize>,
    /// Insertion stamp for each marker, parallel to `markers`.
    stamps: Vec<u64>,
    next_stamp: u64,
}

impl Default for SpliceSet {
    fn default() -> Self {
        Self::new()
    }
}

impl SpliceSet {
    pub fn new() -> Self {
        let mut markers = Vec::with_capacity(MAX_SPLICES);
        let mut stamps = Vec::with_capacity(MAX_SPLICES);
        markers.push(0);
        stamps.push(0);
        Self {
            markers,
            stamps,
            next_stamp: 1,
        }
    }

    /// Build from loaded markers. They must be strictly ascending and inside
    /// `recorded`; a missing leading 0 is added.
    pub fn from_markers(markers: &[usize], recorded: usize) -> Result<Self, EngineError> {
        if markers.len() > MAX_SPLICES {
            return Err(EngineError::InvalidMarkers(format!(
                "{} markers, at most {MAX_SPLICES}",
                markers.len()
            )));
        }
        if let Some(pair) = markers.windows(2).find(|w| w[0] >= w[1]) {
            return Err(EngineError::InvalidMarkers(format!(
                "{} is not before {}",
                pair[0], pair[1]
            )));
        }
        if let Some(&last) = markers.last() {
            if last > 0 && last >= recorded {
                return Err(EngineError::InvalidMarkers(format!(
                    "{last} is past the recording end {recorded}"
                )));
            }
        }

        let mut set = Self::new();
        for &marker in markers.iter().filter(|&&m| m > 0) {
            set.insert(marker);
        }
        Ok(set)
    }

    /// Number of splices.
    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn markers(&self) -> &[usize] {
        &self.markers
    }

    /// `(start, end)` of splice `k` within a recording of `recorded`
    /// samples. Out-of-range `k` clamps to the last splice.
    pub fn bounds(&self, k: usize, recorded: usize) -> (usize, usize) {
        let k = k.min(self.markers.len() - 1);
        let start = self.markers[k].min(recorded);
        let end = self
            .markers
            .get(k + 1)
            .copied()
            .unwrap_or(recorded)
            .min(recorded);
        (start, end.max(start))
    }

    /// Index of the splice containing `position`.
    pub fn splice_at(&self, position: usize) -> usize {
        match self.markers.binary_search(&position) {
            Ok(k) => k,
            Err(k) => k.saturating_sub(1),
        }
    }

    /// Place a marker. A marker that already exists is left alone.
    pub fn insert(&mut self, position: usize) -> Placed {
        let mut evicted = None;
        let k = match self.markers.binary_search(&position) {
            Ok(k) => {
                return Placed { splice: k, evicted };
            }
            Err(_) if self.markers.len() >= MAX_SPLICES => {
                evicted = self.evict_oldest();
                match self.markers.binary_search(&position) {
                    Ok(k) | Err(k) => k,
                }
            }
            Err(k) => k,
        };
        self.markers.insert(k, position);
        self.stamps.insert(k, self.next_stamp);
        self.next_stamp += 1;
        Placed { splice: k, evicted }
    }

    /// Drop the oldest non-zero marker and return its index.
    fn evict_oldest(&mut self) -> Option<usize> {
        let k = self
            .stamps
            .iter()
            .enumerate()
            .skip(1)
            .min_by_key(|(_, stamp)| **stamp)
            .map(|(k, _)| k)?;
        self.markers.remove(k);
        self.stamps.remove(k);
        Some(k)
    }

    /// Delete the marker that ends splice `k`, joining it with the next one.
    /// Returns false when `k` is the last splice.
    pub fn merge_with_next(&mut self, k: usize) -> bool {
        if k + 1 >= self.markers.len() {
            return false;
        }
        self.markers.remove(k + 1);
        self.stamps.remove(k + 1);
        true
    }

    pub fn clear(&mut self) {
        self.markers.truncate(1);
        self.stamps.truncate(1);
        self.next_stamp = 1;
    }
}
