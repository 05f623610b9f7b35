use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::models::audio_models::CaptureFormat;
use crate::models::error::MediaError;
use crate::processing::wav_format;

/// Result of flushing one take to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenTake {
    pub file_size: u64,
    pub payload_bytes: u64,
    /// SHA-256 hex digest of the complete file.
    pub checksum: String,
}

/// One-shot WAV writer for an assembled take.
///
/// ## File Format
/// ```text
/// [44-byte WAV header]
/// [raw 16-bit PCM payload...]
/// ```
pub struct TakeWriter {
    file_path: PathBuf,
    format: CaptureFormat,
}

impl TakeWriter {
    pub fn new(file_path: PathBuf, format: CaptureFormat) -> Self {
        Self { file_path, format }
    }

    /// `recording_<take>_<epoch-millis>.wav`
    pub fn file_name(take: u64, epoch_millis: i64) -> String {
        format!("recording_{}_{}.wav", take, epoch_millis)
    }

    /// Write the header and `payload`, creating the parent directory if needed.
    pub fn write(&self, payload: &[u8]) -> Result<WrittenTake, MediaError> {
        let data_size = u32::try_from(payload.len()).map_err(|_| {
            MediaError::Storage(format!("take too large for wav: {} bytes", payload.len()))
        })?;

        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| MediaError::Storage(format!("failed to create directory: {}", e)))?;
        }

        let file = File::create(&self.file_path)
            .map_err(|e| MediaError::Storage(format!("failed to create file: {}", e)))?;
        let mut out = BufWriter::new(file);

        let header = wav_format::generate_wav_header(&self.format, data_size);
        let mut hasher = Sha256::new();
        hasher.update(header);
        hasher.update(payload);

        out.write_all(&header)
            .map_err(|e| MediaError::Storage(format!("write failed: {}", e)))?;
        out.write_all(payload)
            .map_err(|e| MediaError::Storage(format!("write failed: {}", e)))?;
        out.flush()
            .map_err(|e| MediaError::Storage(format!("flush failed: {}", e)))?;

        Ok(WrittenTake {
            file_size: (wav_format::WAV_HEADER_SIZE + payload.len()) as u64,
            payload_bytes: payload.len() as u64,
            checksum: hex_encode(&hasher.finalize()),
        })
    }

    /// Path of the output file.
    pub fn file_path(&self) -> &Path {
        &self.file_path
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
