use crate::models::audio_models::CaptureFormat;
use crate::processing::wav_format;

/// Pure-math conversion from driver buffers to take PCM.
///
/// Devices deliver interleaved f32 at whatever layout they negotiated; takes
/// are stored in the configured [`CaptureFormat`]. All operations work on
/// plain slices with no platform dependencies.
#[derive(Debug, Clone)]
pub struct InputConverter {
    pub format: CaptureFormat,
    carry: ResampleCarry,
}

/// Resampler position carried from one driver buffer to the next.
#[derive(Debug, Clone, Default)]
struct ResampleCarry {
    source_rate: u32,
    channels: usize,
    /// Source position of the next output frame, relative to the start of
    /// the next buffer. Negative values fall between `previous` and it.
    position: f64,
    previous: Vec<f32>,
}

impl InputConverter {
    pub fn new(format: CaptureFormat) -> Self {
        Self {
            format,
            carry: ResampleCarry::default(),
        }
    }

    /// Remix, resample and quantize one driver buffer.
    ///
    /// Consecutive calls form one continuous signal: the resampler picks up
    /// where the previous buffer ended.
    ///
    /// Returns the f32 samples in the target layout (for metering) and the
    /// little-endian PCM16 bytes.
    pub fn convert(
        &mut self,
        samples: &[f32],
        source_rate: u32,
        source_channels: u16,
    ) -> (Vec<f32>, Vec<u8>) {
        let target_channels = self.format.channels as usize;
        let remixed = remix(samples, source_channels.max(1) as usize, target_channels);
        let resampled = self.resample_continuous(&remixed, source_rate, target_channels);
        let pcm = Self::convert_to_int16_pcm(&resampled);
        (resampled, pcm)
    }

    /// Streaming linear resampler over consecutive interleaved buffers.
    ///
    /// Keeps the fractional read position and the last source frame, so
    /// buffer boundaries neither drop output frames nor break interpolation.
    /// A change of source rate or layout starts a fresh stream.
    pub fn resample_continuous(
        &mut self,
        samples: &[f32],
        source_rate: u32,
        channels: usize,
    ) -> Vec<f32> {
        let target_rate = self.format.sample_rate;
        if source_rate == target_rate || source_rate == 0 || target_rate == 0 || channels == 0 {
            self.carry = ResampleCarry::default();
            return samples.to_vec();
        }
        if self.carry.source_rate != source_rate || self.carry.channels != channels {
            self.carry = ResampleCarry {
                source_rate,
                channels,
                ..ResampleCarry::default()
            };
        }

        let frame_count = samples.len() / channels;
        if frame_count == 0 {
            return Vec::new();
        }

        let carry = &mut self.carry;
        let step = source_rate as f64 / target_rate as f64;
        let mut position = carry.position;
        if position < 0.0 && carry.previous.len() != channels {
            position = 0.0;
        }
        let last = (frame_count - 1) as f64;

        let capacity = ((frame_count as f64 / step) as usize + 1) * channels;
        let mut output = Vec::with_capacity(capacity);
        while position <= last {
            let floor = position.floor();
            let fraction = (position - floor) as f32;
            let index = floor as isize;
            for ch in 0..channels {
                let a = if index < 0 {
                    carry.previous[ch]
                } else {
                    samples[index as usize * channels + ch]
                };
                let b = if fraction > 0.0 {
                    samples[(index + 1) as usize * channels + ch]
                } else {
                    a
                };
                output.push(a + (b - a) * fraction);
            }
            position += step;
        }

        carry.position = position - frame_count as f64;
        carry.previous.clear();
        carry
            .previous
            .extend_from_slice(&samples[(frame_count - 1) * channels..frame_count * channels]);
        output
    }

    /// Linear interpolation resampling of a single, self-contained buffer.
    ///
    /// Returns input unchanged if rates match.
    pub fn resample_interleaved(
        &self,
        samples: &[f32],
        source_rate: u32,
        channels: usize,
    ) -> Vec<f32> {
        let target_rate = self.format.sample_rate;
        if source_rate == target_rate || source_rate == 0 || samples.is_empty() || channels == 0 {
            return samples.to_vec();
        }

        let frame_count = samples.len() / channels;
        let ratio = target_rate as f64 / source_rate as f64;
        let output_frames = (frame_count as u64 * target_rate as u64 / source_rate as u64) as usize;
        if output_frames == 0 {
            return Vec::new();
        }

        let mut output = vec![0.0f32; output_frames * channels];
        for i in 0..output_frames {
            let source_index = i as f64 / ratio;
            let index = source_index as usize;
            let fraction = (source_index - index as f64) as f32;

            for ch in 0..channels {
                if index + 1 < frame_count {
                    output[i * channels + ch] = samples[index * channels + ch] * (1.0 - fraction)
                        + samples[(index + 1) * channels + ch] * fraction;
                } else if index < frame_count {
                    output[i * channels + ch] = samples[index * channels + ch];
                }
            }
        }
        output
    }

    /// Convert f32 samples `[-1.0, 1.0]` to 16-bit PCM (little-endian bytes).
    ///
    /// Clamps out-of-range values. Output length = `samples.len() * 2` bytes.
    pub fn convert_to_int16_pcm(samples: &[f32]) -> Vec<u8> {
        let mut data = Vec::with_capacity(samples.len() * 2);
        for &sample in samples {
            let clamped = sample.clamp(-1.0, 1.0);
            let int16_value = (clamped * i16::MAX as f32) as i16;
            data.extend_from_slice(&int16_value.to_le_bytes());
        }
        data
    }

    /// RMS level of samples (0.0–1.0 for normalized audio).
    pub fn rms_level(samples: &[f32]) -> f32 {
        if samples.is_empty() {
            return 0.0;
        }
        let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
        (sum_sq / samples.len() as f32).sqrt()
    }

    /// Peak absolute level of samples.
    pub fn peak_level(samples: &[f32]) -> f32 {
        samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max)
    }
}

/// Map interleaved audio from `from` channels to `to` channels.
///
/// Mono targets average all inputs, mono sources are duplicated, and wider
/// sources keep their first `to` channels.
pub fn remix(samples: &[f32], from: usize, to: usize) -> Vec<f32> {
    if from == to || from == 0 || to == 0 {
        return samples.to_vec();
    }
    if to == 1 {
        return wav_format::downmix_to_mono(samples, from);
    }

    let frame_count = samples.len() / from;
    let mut output = Vec::with_capacity(frame_count * to);
    for frame in samples.chunks_exact(from) {
        for ch in 0..to {
            output.push(frame[ch.min(from - 1)]);
        }
    }
    output
}
