//! Lectern Audio crate - in-process transcoding of inbound audio for transcription.
//!
//! Voice notes and uploaded audio files arrive in whatever container the chat
//! platform produced. The transcription service is fed a uniform format:
//! 16 kHz mono PCM16 WAV. This crate decodes the payload (`decode`, with
//! `ogg_opus` for voice notes), resamples it, and writes the result into a
//! scratch file (`scratch`) whose lifetime is bound to the returned guard.

pub mod decode;
pub mod ogg_opus;
pub mod scratch;

use std::path::{Path, PathBuf};

use lectern_core::error::LecternError;
use lectern_core::types::AudioFormat;

pub use decode::{decode, downmix, resample, DecodedAudio};
pub use ogg_opus::{decode_ogg_opus, is_ogg_opus};
pub use scratch::ScratchWav;

/// Sample rate expected by the transcription service.
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// Decodes compressed audio into a scratch WAV file.
#[derive(Debug, Clone)]
pub struct Transcoder {
    scratch_dir: PathBuf,
}

impl Transcoder {
    /// Create a transcoder writing scratch files into `scratch_dir`.
    pub fn new(scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
        }
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// Decode `bytes` and write 16 kHz mono WAV into a fresh scratch file.
    ///
    /// The scratch file is acquired before decoding starts, so every failure
    /// after that point drops the guard and removes the file.
    pub fn transcode(&self, bytes: &[u8], format: AudioFormat) -> Result<ScratchWav, LecternError> {
        let mut scratch = ScratchWav::create_in(&self.scratch_dir)?;

        let decoded = decode(bytes, format)?;
        let mono = downmix(&decoded.samples, decoded.channels);
        let samples = resample(&mono, decoded.sample_rate, TARGET_SAMPLE_RATE);

        scratch.write_samples(&samples, TARGET_SAMPLE_RATE)?;

        tracing::debug!(
            format = ?format,
            input_bytes = bytes.len(),
            source_rate = decoded.sample_rate,
            channels = decoded.channels,
            output_samples = samples.len(),
            path = %scratch.path().display(),
            "Audio transcoded to WAV"
        );

        Ok(scratch)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Cursor;

    /// Encode a sine tone as PCM16 WAV bytes.
    pub(crate) fn sine_wav(sample_rate: u32, channels: u16, secs: f32) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut buf = Vec::new();
        {
            let mut writer = hound::WavWriter::new(Cursor::new(&mut buf), spec).unwrap();
            let frames = (sample_rate as f32 * secs) as usize;
            for i in 0..frames {
                let t = i as f32 / sample_rate as f32;
                let value = (t * 440.0 * std::f32::consts::TAU).sin() * 0.5;
                for _ in 0..channels {
                    writer.write_sample((value * i16::MAX as f32) as i16).unwrap();
                }
            }
            writer.finalize().unwrap();
        }
        buf
    }

    /// Encoder delay written into the fixture's OpusHead.
    pub(crate) const OPUS_PRE_SKIP: u16 = 312;

    /// Encode a sine tone as an Ogg/Opus stream of 20 ms frames, the way
    /// chat clients record voice notes.
    pub(crate) fn ogg_opus_tone(channels: u8, secs: f32) -> Vec<u8> {
        use ogg::writing::{PacketWriteEndInfo, PacketWriter};

        const SERIAL: u32 = 0x1ec7;
        const FRAME: usize = 960;

        let mut head = b"OpusHead".to_vec();
        head.push(1);
        head.push(channels);
        head.extend_from_slice(&OPUS_PRE_SKIP.to_le_bytes());
        head.extend_from_slice(&48_000u32.to_le_bytes());
        head.extend_from_slice(&0i16.to_le_bytes());
        head.push(0);

        let vendor = b"lectern-tests";
        let mut tags = b"OpusTags".to_vec();
        tags.extend_from_slice(&(vendor.len() as u32).to_le_bytes());
        tags.extend_from_slice(vendor);
        tags.extend_from_slice(&0u32.to_le_bytes());

        let layout = if channels == 2 {
            opus::Channels::Stereo
        } else {
            opus::Channels::Mono
        };
        let mut encoder = opus::Encoder::new(48_000, layout, opus::Application::Voip).unwrap();

        let frames = (48_000.0 * secs) as usize / FRAME;
        let mut writer = PacketWriter::new(Vec::new());
        writer
            .write_packet(head, SERIAL, PacketWriteEndInfo::EndPage, 0)
            .unwrap();
        writer
            .write_packet(tags, SERIAL, PacketWriteEndInfo::EndPage, 0)
            .unwrap();
        for frame in 0..frames {
            let mut pcm = Vec::with_capacity(FRAME * channels as usize);
            for i in 0..FRAME {
                let t = (frame * FRAME + i) as f32 / 48_000.0;
                let value = (t * 440.0 * std::f32::consts::TAU).sin() * 0.5;
                for _ in 0..channels {
                    pcm.push((value * i16::MAX as f32) as i16);
                }
            }
            let packet = encoder.encode_vec(&pcm, 4_000).unwrap();
            let end = if frame + 1 == frames {
                PacketWriteEndInfo::EndStream
            } else {
                PacketWriteEndInfo::NormalPacket
            };
            let granule = ((frame + 1) * FRAME) as u64;
            writer.write_packet(packet, SERIAL, end, granule).unwrap();
        }
        writer.into_inner()
    }

    fn file_count(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[test]
    fn test_transcode_produces_16k_mono_wav() {
        let dir = tempfile::tempdir().unwrap();
        let transcoder = Transcoder::new(dir.path());
        let input = sine_wav(44_100, 2, 0.5);

        let scratch = transcoder.transcode(&input, AudioFormat::Wav).unwrap();
        let reader = hound::WavReader::open(scratch.path()).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, TARGET_SAMPLE_RATE);
        assert_eq!(spec.bits_per_sample, 16);
        let len = reader.len() as i64;
        assert!((len - 8_000).abs() <= 2, "unexpected sample count {}", len);
    }

    #[test]
    fn test_scratch_removed_after_drop() {
        let dir = tempfile::tempdir().unwrap();
        let transcoder = Transcoder::new(dir.path());
        let input = sine_wav(16_000, 1, 0.25);

        let scratch = transcoder.transcode(&input, AudioFormat::Ogg).unwrap();
        assert_eq!(file_count(dir.path()), 1);
        drop(scratch);
        assert_eq!(file_count(dir.path()), 0);
    }

    #[test]
    fn test_scratch_removed_when_decoding_fails() {
        let dir = tempfile::tempdir().unwrap();
        let transcoder = Transcoder::new(dir.path());

        let result = transcoder.transcode(b"definitely not audio", AudioFormat::Ogg);
        assert!(matches!(result, Err(LecternError::Audio(_))));
        assert_eq!(file_count(dir.path()), 0);
    }

    #[test]
    fn test_transcode_ogg_opus_voice_note() {
        let dir = tempfile::tempdir().unwrap();
        let transcoder = Transcoder::new(dir.path());
        let input = ogg_opus_tone(1, 0.5);

        let scratch = transcoder.transcode(&input, AudioFormat::Ogg).unwrap();
        let reader = hound::WavReader::open(scratch.path()).unwrap();
        assert_eq!(reader.spec().sample_rate, TARGET_SAMPLE_RATE);
        assert_eq!(reader.spec().channels, 1);
        let len = reader.len() as i64;
        let expected = (25 * 960 - OPUS_PRE_SKIP as i64) / 3;
        assert!((len - expected).abs() <= 2, "unexpected sample count {}", len);

        drop(reader);
        drop(scratch);
        assert_eq!(file_count(dir.path()), 0);
    }

    #[test]
    fn test_missing_scratch_dir_is_io_error() {
        let transcoder = Transcoder::new("/nonexistent/lectern/scratch");
        let input = sine_wav(16_000, 1, 0.1);
        let result = transcoder.transcode(&input, AudioFormat::Mp3);
        assert!(matches!(result, Err(LecternError::Io(_))));
    }
}
