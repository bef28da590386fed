//! Scratch WAV file owned by a single transcoding call.
//!
//! The file lives as long as the `ScratchWav` guard. Dropping the guard, on
//! the success path or while unwinding an error, removes it from disk.

use std::io::BufWriter;
use std::path::Path;

use tempfile::NamedTempFile;

use lectern_core::error::LecternError;

/// Guard over a transient WAV file.
#[derive(Debug)]
pub struct ScratchWav {
    file: NamedTempFile,
}

impl ScratchWav {
    /// Create an empty scratch file inside `dir`.
    pub fn create_in(dir: &Path) -> Result<Self, LecternError> {
        let file = tempfile::Builder::new()
            .prefix("lectern-")
            .suffix(".wav")
            .tempfile_in(dir)?;
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Write mono f32 samples as PCM16 WAV.
    pub fn write_samples(&mut self, samples: &[f32], sample_rate: u32) -> Result<(), LecternError> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let wav_err = |e: hound::Error| LecternError::Audio(format!("failed to write WAV: {}", e));

        let mut writer =
            hound::WavWriter::new(BufWriter::new(self.file.as_file_mut()), spec).map_err(wav_err)?;
        for sample in samples {
            let clamped = sample.clamp(-1.0, 1.0);
            writer
                .write_sample((clamped * i16::MAX as f32) as i16)
                .map_err(wav_err)?;
        }
        writer.finalize().map_err(wav_err)?;
        Ok(())
    }

    /// Read the whole file back.
    pub fn read_bytes(&self) -> Result<Vec<u8>, LecternError> {
        Ok(std::fs::read(self.file.path())?)
    }

    /// Remove the file now, reporting removal errors instead of ignoring them.
    pub fn close(self) -> Result<(), LecternError> {
        self.file.close()?;
        Ok(())
    }
}
