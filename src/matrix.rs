//! Energy matrix: the time x frequency intensity grid that segment
//! detection scans.
//!
//! Values are normalized u8 intensities (0-255). The matrix is frame-major:
//! all frequency bins of frame 0, then frame 1, and so on. Once built it is
//! never mutated in place; band restriction and threshold zeroing produce a
//! new matrix.

/// 2-D intensity grid indexed `[frame, bin]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnergyMatrix {
    data: Vec<u8>,
    num_frames: usize,
    num_bins: usize,
}

impl EnergyMatrix {
    /// Wrap frame-major data. Panics in debug builds if the dimensions do
    /// not match the buffer length.
    pub fn from_raw(data: Vec<u8>, num_frames: usize, num_bins: usize) -> Self {
        debug_assert_eq!(data.len(), num_frames * num_bins);
        Self {
            data,
            num_frames,
            num_bins,
        }
    }

    /// All-zero matrix with the given dimensions.
    pub fn zeros(num_frames: usize, num_bins: usize) -> Self {
        Self {
            data: vec![0; num_frames * num_bins],
            num_frames,
            num_bins,
        }
    }

    pub fn num_frames(&self) -> usize {
        self.num_frames
    }

    pub fn num_bins(&self) -> usize {
        self.num_bins
    }

    pub fn get(&self, frame: usize, bin: usize) -> u8 {
        self.data[frame * self.num_bins + bin]
    }

    pub fn set(&mut self, frame: usize, bin: usize, value: u8) {
        self.data[frame * self.num_bins + bin] = value;
    }

    /// One frame's bins as a slice.
    pub fn frame(&self, frame: usize) -> &[u8] {
        let start = frame * self.num_bins;
        &self.data[start..start + self.num_bins]
    }

    /// Raw frame-major bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Copy of the matrix restricted to the bin range `lo..hi`
    /// (inclusive-exclusive). The range is clamped to the available bins.
    pub fn band(&self, lo: usize, hi: usize) -> EnergyMatrix {
        let lo = lo.min(self.num_bins);
        let hi = hi.clamp(lo, self.num_bins);
        let width = hi - lo;
        let mut data = Vec::with_capacity(self.num_frames * width);
        for frame in 0..self.num_frames {
            data.extend_from_slice(&self.frame(frame)[lo..hi]);
        }
        EnergyMatrix::from_raw(data, self.num_frames, width)
    }

    /// Maximum intensity across all bins of one frame.
    pub fn max_over_bins(&self, frame: usize) -> u8 {
        self.frame(frame).iter().copied().max().unwrap_or(0)
    }

    /// Nearest-rank percentile (0-100) over all cells.
    ///
    /// u8 intensities permit an exact histogram walk instead of sorting the
    /// whole buffer. Returns 0 for an empty matrix.
    pub fn percentile(&self, pct: f64) -> u8 {
        if self.data.is_empty() {
            return 0;
        }
        let mut histogram = [0usize; 256];
        for &v in &self.data {
            histogram[v as usize] += 1;
        }
        let rank = ((pct / 100.0) * self.data.len() as f64).ceil() as usize;
        let rank = rank.clamp(1, self.data.len());
        let mut seen = 0;
        for (value, &count) in histogram.iter().enumerate() {
            seen += count;
            if seen >= rank {
                return value as u8;
            }
        }
        255
    }

    /// Copy with every value at or below `threshold` replaced by zero.
    pub fn zero_below(&self, threshold: u8) -> EnergyMatrix {
        let data = self
            .data
            .iter()
            .map(|&v| if v <= threshold { 0 } else { v })
            .collect();
        EnergyMatrix::from_raw(data, self.num_frames, self.num_bins)
    }
}
