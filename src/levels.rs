//! Chunked preview store for the display spectrogram.
//!
//! Mirrors the display matrix as a series of temporally downsampled levels
//! (factors 1, 3, 9, ...), each split into fixed-size frame chunks and
//! gzip-compressed independently, so a viewer can fetch a coarse overview
//! or a zoomed-in region without decompressing the whole recording.

use crate::defaults;
use crate::error::{ChitterError, Result};
use crate::matrix::EnergyMatrix;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// File name of the level store inside a session directory.
pub const LEVELS_NAME: &str = "spectrogram.levels";

const LEVELS_MAGIC: &[u8; 8] = b"CHITLVL1";

/// One downsampled mirror of the display matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Level {
    /// Temporal downsampling factor (a power of the downsample base).
    pub factor: usize,
    pub matrix: EnergyMatrix,
}

/// Downsampling factors for a matrix with `num_frames` frames: 1, then
/// each next power of the base while the downsampled frame count stays at
/// or above the minimum.
pub fn level_factors(num_frames: usize) -> Vec<usize> {
    let mut factors = vec![1];
    let mut factor = defaults::DOWNSAMPLE_BASE;
    while num_frames / factor >= defaults::DOWNSAMPLE_MIN_FRAMES {
        factors.push(factor);
        factor *= defaults::DOWNSAMPLE_BASE;
    }
    factors
}

/// Max-pool `factor` consecutive frames into one. The trailing partial
/// window, if any, pools whatever frames remain.
pub fn downsample(matrix: &EnergyMatrix, factor: usize) -> EnergyMatrix {
    if factor <= 1 {
        return matrix.clone();
    }
    let num_bins = matrix.num_bins();
    let out_frames = matrix.num_frames().div_ceil(factor);
    let mut out = EnergyMatrix::zeros(out_frames, num_bins);
    for out_frame in 0..out_frames {
        let start = out_frame * factor;
        let end = (start + factor).min(matrix.num_frames());
        for bin in 0..num_bins {
            let mut max = 0u8;
            for frame in start..end {
                max = max.max(matrix.get(frame, bin));
            }
            out.set(out_frame, bin, max);
        }
    }
    out
}

/// Write the level store for a display matrix.
pub fn write_levels(display: &EnergyMatrix, path: &Path) -> Result<()> {
    let factors = level_factors(display.num_frames());
    let mut out = BufWriter::new(File::create(path)?);
    out.write_all(LEVELS_MAGIC)?;
    out.write_all(&(display.num_bins() as u32).to_le_bytes())?;
    out.write_all(&(factors.len() as u32).to_le_bytes())?;

    for factor in factors {
        let level = downsample(display, factor);
        out.write_all(&(factor as u32).to_le_bytes())?;
        out.write_all(&(level.num_frames() as u64).to_le_bytes())?;

        let chunks: Vec<&[u8]> = level
            .as_bytes()
            .chunks(defaults::LEVEL_CHUNK_FRAMES * level.num_bins())
            .collect();
        out.write_all(&(chunks.len() as u32).to_le_bytes())?;
        for chunk in chunks {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(chunk)?;
            let compressed = encoder.finish()?;
            out.write_all(&(compressed.len() as u32).to_le_bytes())?;
            out.write_all(&compressed)?;
        }
    }
    out.flush()?;
    Ok(())
}

/// Read every level back from a store written by [`write_levels`].
pub fn read_levels(path: &Path) -> Result<Vec<Level>> {
    let corrupt = |message: &str| ChitterError::CorruptBlob {
        path: path.to_path_buf(),
        message: message.to_string(),
    };

    let mut file = BufReader::new(File::open(path)?);
    let mut magic = [0u8; 8];
    file.read_exact(&mut magic)?;
    if &magic != LEVELS_MAGIC {
        return Err(corrupt("bad magic"));
    }
    let mut buf4 = [0u8; 4];
    let mut buf8 = [0u8; 8];
    file.read_exact(&mut buf4)?;
    let num_bins = u32::from_le_bytes(buf4) as usize;
    file.read_exact(&mut buf4)?;
    let num_levels = u32::from_le_bytes(buf4) as usize;

    let mut levels = Vec::with_capacity(num_levels);
    for _ in 0..num_levels {
        file.read_exact(&mut buf4)?;
        let factor = u32::from_le_bytes(buf4) as usize;
        file.read_exact(&mut buf8)?;
        let num_frames = u64::from_le_bytes(buf8) as usize;
        file.read_exact(&mut buf4)?;
        let num_chunks = u32::from_le_bytes(buf4) as usize;

        let mut data = Vec::with_capacity(num_frames * num_bins);
        for _ in 0..num_chunks {
            file.read_exact(&mut buf4)?;
            let compressed_len = u32::from_le_bytes(buf4) as usize;
            let mut compressed = vec![0u8; compressed_len];
            file.read_exact(&mut compressed)?;
            let mut decoder = GzDecoder::new(&compressed[..]);
            decoder.read_to_end(&mut data)?;
        }
        if data.len() != num_frames * num_bins {
            return Err(corrupt("level size mismatch"));
        }
        levels.push(Level {
            factor,
            matrix: EnergyMatrix::from_raw(data, num_frames, num_bins),
        });
    }
    Ok(levels)
}
