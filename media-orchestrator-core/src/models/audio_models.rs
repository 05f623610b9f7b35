use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// PCM layout of recorded takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureFormat {
    /// Sample rate in Hz (default: 44100).
    pub sample_rate: u32,
    /// Channel count (default: 1, mono).
    pub channels: u16,
    /// Bits per sample (default: 16, signed little-endian).
    pub bits_per_sample: u16,
}

impl CaptureFormat {
    pub fn byte_rate(&self) -> u32 {
        self.sample_rate * self.channels as u32 * self.bits_per_sample as u32 / 8
    }

    pub fn block_align(&self) -> u16 {
        self.channels * self.bits_per_sample / 8
    }

    /// Playback duration of `payload_bytes` of PCM in this format.
    pub fn duration_of(&self, payload_bytes: u64) -> Duration {
        let byte_rate = self.byte_rate();
        if byte_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(payload_bytes as f64 / byte_rate as f64)
    }
}

impl Default for CaptureFormat {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            channels: 1,
            bits_per_sample: 16,
        }
    }
}

/// One raw chunk published by the capture stream.
///
/// `pcm` is already in the configured [`CaptureFormat`], so retained frames
/// concatenate directly into a WAV payload. Cloning is cheap.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    /// Position in the stream's delivery order, starting at 0 per `open()`.
    pub sequence: u64,
    /// Time since the stream was opened.
    pub timestamp: Duration,
    pub pcm: Arc<[u8]>,
    pub rms: f32,
    pub peak: f32,
}

impl AudioFrame {
    pub fn byte_len(&self) -> usize {
        self.pcm.len()
    }
}

/// Where a piece of media comes from. Equality is the source identity used
/// for video handle reuse.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MediaSource {
    Url(String),
    File(PathBuf),
}

impl MediaSource {
    /// `http://` and `https://` strings become [`MediaSource::Url`]; anything
    /// else (including `file://`) is treated as a local path.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        let lower = trimmed.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            Self::Url(trimmed.to_string())
        } else if let Some(path) = trimmed.strip_prefix("file://") {
            Self::File(PathBuf::from(path))
        } else {
            Self::File(PathBuf::from(trimmed))
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Url(_))
    }

    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Self::File(path) => Some(path),
            Self::Url(_) => None,
        }
    }
}

impl From<&str> for MediaSource {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

impl From<PathBuf> for MediaSource {
    fn from(path: PathBuf) -> Self {
        Self::File(path)
    }
}

impl fmt::Display for MediaSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url(url) => f.write_str(url),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// A capture device as reported by a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureDeviceInfo {
    pub id: String,
    pub name: String,
    pub is_default: bool,
}

/// Counters for the keep-alive capture path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureDiagnostics {
    /// Driver callbacks turned into frames.
    pub frames_delivered: u64,
    pub samples_delivered: u64,
    /// Frames appended to a take.
    pub frames_retained: u64,
    /// Frames dropped because no take was active.
    pub frames_discarded: u64,
    /// Frames the retention task missed because it fell behind the channel.
    pub frames_lagged: u64,
    pub takes_completed: u64,
    pub bytes_written: u64,
}
