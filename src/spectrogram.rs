//! Spectrogram computation and the on-disk spectrogram blob.
//!
//! One blob per session: the per-channel power spectrograms, the summed
//! 8-bit display matrix the GUI and detection consume, and the time and
//! frequency axes. The blob is immutable once written; any change to the
//! audio source or transcode parameters invalidates it and everything
//! downstream.

use crate::config::{AudioDescriptor, AudioSourceKind};
use crate::defaults;
use crate::error::{ChitterError, Result};
use crate::matrix::EnergyMatrix;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use realfft::RealFftPlanner;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// File name of the spectrogram blob inside a session directory.
pub const BLOB_NAME: &str = "spectrograms.bin";

const BLOB_MAGIC: &[u8; 8] = b"CHITSPG1";

/// Computed spectrograms for one session.
#[derive(Debug, Clone)]
pub struct SpectrogramBlob {
    /// Per-channel power spectrograms, frame-major, `num_frames * num_bins`
    /// values each.
    pub channels: Vec<Vec<f32>>,
    pub num_frames: usize,
    pub num_bins: usize,
    /// Bin center frequencies in Hz.
    pub freqs: Vec<f64>,
    /// Frame center times in seconds.
    pub times: Vec<f64>,
    /// Summed, normalized, thresholded display matrix.
    pub display: EnergyMatrix,
}

impl SpectrogramBlob {
    /// Spectrogram frame rate in Hz, the reciprocal of the time axis step.
    pub fn frame_rate_hz(&self) -> f64 {
        if self.times.len() < 2 {
            return 0.0;
        }
        1.0 / (self.times[1] - self.times[0])
    }
}

/// Build the spectrogram blob for a session directory.
///
/// Reads the raw audio named by the descriptor, computes a Hann-windowed
/// power STFT per channel (NFFT 512, hop 256), sums the channels, scales the
/// sum to u8 against an auto-detected maximum, and zeroes everything at or
/// below the display percentile within `freq_band`.
pub fn build_spectrogram(
    session_dir: &Path,
    audio: &AudioDescriptor,
    freq_band: (usize, usize),
) -> Result<SpectrogramBlob> {
    let audio_path = session_dir.join(&audio.source);
    let channel_samples = read_audio(&audio_path, audio)?;

    let hop = defaults::SPECTROGRAM_NFFT - defaults::SPECTROGRAM_NOVERLAP;
    let num_bins = defaults::SPECTROGRAM_NFFT / 2 + 1;

    let mut channels: Vec<Vec<f32>> = Vec::with_capacity(channel_samples.len());
    let mut num_frames = 0;
    for samples in &channel_samples {
        let (spectrogram, frames) = power_stft(samples);
        num_frames = frames;
        channels.push(spectrogram);
    }

    let sr = audio.sample_rate_hz;
    let freqs: Vec<f64> = (0..num_bins)
        .map(|k| k as f64 * sr / defaults::SPECTROGRAM_NFFT as f64)
        .collect();
    let times: Vec<f64> = (0..num_frames)
        .map(|i| (i * hop + defaults::SPECTROGRAM_NFFT / 2) as f64 / sr)
        .collect();
    let frame_rate = sr / hop as f64;

    // Sum channels into the display matrix.
    let mut summed = vec![0.0f32; num_frames * num_bins];
    for channel in &channels {
        for (acc, &v) in summed.iter_mut().zip(channel.iter()) {
            *acc += v;
        }
    }

    let maxval = auto_detect_maxval(&summed, num_frames, num_bins, frame_rate);
    let scaled: Vec<u8> = summed
        .iter()
        .map(|&v| {
            if maxval <= 0.0 {
                0
            } else {
                ((v / maxval) * 255.0).floor().clamp(0.0, 255.0) as u8
            }
        })
        .collect();
    let display = EnergyMatrix::from_raw(scaled, num_frames, num_bins);

    let threshold = display
        .band(freq_band.0, freq_band.1)
        .percentile(defaults::DISPLAY_THRESHOLD_PERCENTILE);
    let display = display.zero_below(threshold);

    Ok(SpectrogramBlob {
        channels,
        num_frames,
        num_bins,
        freqs,
        times,
        display,
    })
}

/// Read raw audio as per-channel f32 samples, cropped to the descriptor's
/// declared duration.
fn read_audio(path: &Path, audio: &AudioDescriptor) -> Result<Vec<Vec<f32>>> {
    let mut channels = match &audio.source_kind {
        AudioSourceKind::MultiChannelRaw { channels } => read_raw_audio(path, *channels)?,
        AudioSourceKind::SingleFileWav => read_wav_audio(path)?,
    };
    let max_samples = (audio.duration_sec * audio.sample_rate_hz) as usize;
    for samples in &mut channels {
        samples.truncate(max_samples);
    }
    Ok(channels)
}

/// Headerless interleaved little-endian i16 container.
fn read_raw_audio(path: &Path, num_channels: usize) -> Result<Vec<Vec<f32>>> {
    let bytes = std::fs::read(path)?;
    let frames = bytes.len() / (2 * num_channels);
    let mut channels = vec![Vec::with_capacity(frames); num_channels];
    for frame in bytes.chunks_exact(2 * num_channels) {
        for (ch, sample) in frame.chunks_exact(2).enumerate() {
            let v = i16::from_le_bytes([sample[0], sample[1]]);
            channels[ch].push(v as f32);
        }
    }
    Ok(channels)
}

fn read_wav_audio(path: &Path) -> Result<Vec<Vec<f32>>> {
    let mut reader = hound::WavReader::open(path).map_err(|e| ChitterError::AudioRead {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let num_channels = reader.spec().channels as usize;
    let mut channels = vec![Vec::new(); num_channels];
    for (i, sample) in reader.samples::<i16>().enumerate() {
        let sample = sample.map_err(|e| ChitterError::AudioRead {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        channels[i % num_channels].push(sample as f32);
    }
    Ok(channels)
}

/// Hann-windowed power STFT, NFFT 512, hop 256. Returns a frame-major
/// `num_frames * num_bins` buffer.
fn power_stft(samples: &[f32]) -> (Vec<f32>, usize) {
    let nfft = defaults::SPECTROGRAM_NFFT;
    let hop = nfft - defaults::SPECTROGRAM_NOVERLAP;
    let num_bins = nfft / 2 + 1;

    if samples.len() < nfft {
        return (Vec::new(), 0);
    }
    let num_frames = (samples.len() - nfft) / hop + 1;

    let window: Vec<f32> = (0..nfft)
        .map(|n| {
            let phase = 2.0 * std::f32::consts::PI * n as f32 / (nfft as f32 - 1.0);
            0.5 * (1.0 - phase.cos())
        })
        .collect();

    let mut planner = RealFftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(nfft);
    let mut input = fft.make_input_vec();
    let mut output = fft.make_output_vec();

    let mut result = Vec::with_capacity(num_frames * num_bins);
    for frame in 0..num_frames {
        let start = frame * hop;
        for (i, slot) in input.iter_mut().enumerate() {
            *slot = samples[start + i] * window[i];
        }
        // Input is windowed and finite, process cannot fail here.
        if fft.process(&mut input, &mut output).is_err() {
            result.extend(std::iter::repeat_n(0.0, num_bins));
            continue;
        }
        result.extend(output.iter().map(|c| c.norm_sqr()));
    }
    (result, num_frames)
}

/// Median of per-window maxima over 15-second windows.
///
/// Scaling against this estimate instead of the global maximum keeps one
/// loud transient from washing out the rest of the display. Recordings
/// shorter than one window fall back to the global maximum.
fn auto_detect_maxval(summed: &[f32], num_frames: usize, num_bins: usize, frame_rate: f64) -> f32 {
    let chunk_frames = (defaults::DISPLAY_MAXVAL_CHUNK_SEC * frame_rate) as usize;
    let mut chunk_maxvals: Vec<f32> = Vec::new();
    if chunk_frames > 0 {
        let mut i = 0;
        while i + chunk_frames < num_frames {
            let chunk = &summed[i * num_bins..(i + chunk_frames) * num_bins];
            let max = chunk.iter().copied().fold(0.0f32, f32::max);
            chunk_maxvals.push(max);
            i += chunk_frames;
        }
    }
    if chunk_maxvals.is_empty() {
        return summed.iter().copied().fold(0.0f32, f32::max);
    }
    chunk_maxvals.sort_by(|a, b| a.total_cmp(b));
    chunk_maxvals[chunk_maxvals.len() / 2]
}

impl SpectrogramBlob {
    /// Write the blob: plain header, gzip-compressed body.
    pub fn write(&self, path: &Path) -> Result<()> {
        let mut out = BufWriter::new(File::create(path)?);
        out.write_all(BLOB_MAGIC)?;
        out.write_all(&(self.channels.len() as u32).to_le_bytes())?;
        out.write_all(&(self.num_bins as u32).to_le_bytes())?;
        out.write_all(&(self.num_frames as u64).to_le_bytes())?;

        let mut encoder = GzEncoder::new(out, Compression::default());
        for f in &self.freqs {
            encoder.write_all(&f.to_le_bytes())?;
        }
        for t in &self.times {
            encoder.write_all(&t.to_le_bytes())?;
        }
        for channel in &self.channels {
            for v in channel {
                encoder.write_all(&v.to_le_bytes())?;
            }
        }
        encoder.write_all(self.display.as_bytes())?;
        let mut out = encoder.finish()?;
        out.flush()?;
        Ok(())
    }

    /// Read a blob written by [`SpectrogramBlob::write`].
    pub fn read(path: &Path) -> Result<Self> {
        let corrupt = |message: &str| ChitterError::CorruptBlob {
            path: path.to_path_buf(),
            message: message.to_string(),
        };

        let mut file = BufReader::new(File::open(path)?);
        let mut magic = [0u8; 8];
        file.read_exact(&mut magic)?;
        if &magic != BLOB_MAGIC {
            return Err(corrupt("bad magic"));
        }
        let mut buf4 = [0u8; 4];
        file.read_exact(&mut buf4)?;
        let num_channels = u32::from_le_bytes(buf4) as usize;
        file.read_exact(&mut buf4)?;
        let num_bins = u32::from_le_bytes(buf4) as usize;
        let mut buf8 = [0u8; 8];
        file.read_exact(&mut buf8)?;
        let num_frames = u64::from_le_bytes(buf8) as usize;

        let mut decoder = GzDecoder::new(file);
        let mut freqs = vec![0.0f64; num_bins];
        for f in &mut freqs {
            decoder.read_exact(&mut buf8)?;
            *f = f64::from_le_bytes(buf8);
        }
        let mut times = vec![0.0f64; num_frames];
        for t in &mut times {
            decoder.read_exact(&mut buf8)?;
            *t = f64::from_le_bytes(buf8);
        }
        let mut channels = Vec::with_capacity(num_channels);
        for _ in 0..num_channels {
            let mut channel = vec![0.0f32; num_frames * num_bins];
            for v in &mut channel {
                decoder.read_exact(&mut buf4)?;
                *v = f32::from_le_bytes(buf4);
            }
            channels.push(channel);
        }
        let mut display_bytes = vec![0u8; num_frames * num_bins];
        decoder.read_exact(&mut display_bytes)?;

        Ok(SpectrogramBlob {
            channels,
            num_frames,
            num_bins,
            freqs,
            times,
            display: EnergyMatrix::from_raw(display_bytes, num_frames, num_bins),
        })
    }
}
