//! Container/codec decoding via symphonia, plus mono downmix and resampling.

use std::io::Cursor;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use lectern_core::error::LecternError;
use lectern_core::types::AudioFormat;

use crate::ogg_opus::{decode_ogg_opus, is_ogg_opus};

/// Interleaved f32 samples decoded from a payload.
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: usize,
}

fn audio_err(context: &str, err: SymphoniaError) -> LecternError {
    LecternError::Audio(format!("{}: {}", context, err))
}

/// Decode the first audio track of `bytes`.
///
/// `format` is only a probe hint; the container is detected from content.
/// Ogg/Opus goes through libopus, everything else through symphonia.
pub fn decode(bytes: &[u8], format: AudioFormat) -> Result<DecodedAudio, LecternError> {
    if bytes.is_empty() {
        return Err(LecternError::Audio("audio payload is empty".to_string()));
    }
    if is_ogg_opus(bytes) {
        return decode_ogg_opus(bytes);
    }

    let source = MediaSourceStream::new(Box::new(Cursor::new(bytes.to_vec())), Default::default());
    let mut hint = Hint::new();
    hint.with_extension(format.extension());

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            source,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| audio_err("unrecognized audio container", e))?;
    let mut reader = probed.format;

    let track = reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| LecternError::Audio("no decodable audio track".to_string()))?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate;
    let mut channels = track.codec_params.channels.map(|c| c.count());

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| audio_err("unsupported audio codec", e))?;

    let mut samples = Vec::new();
    loop {
        let packet = match reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(audio_err("failed to read audio packet", e)),
        };
        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(buffer) => {
                let spec = *buffer.spec();
                sample_rate.get_or_insert(spec.rate);
                channels.get_or_insert(spec.channels.count());
                let mut interleaved = SampleBuffer::<f32>::new(buffer.capacity() as u64, spec);
                interleaved.copy_interleaved_ref(buffer);
                samples.extend_from_slice(interleaved.samples());
            }
            // Corrupt frames are skipped, as players do.
            Err(SymphoniaError::DecodeError(msg)) => {
                tracing::debug!(error = %msg, "Skipping undecodable audio packet");
            }
            Err(e) => return Err(audio_err("audio decoding failed", e)),
        }
    }

    let sample_rate = sample_rate
        .ok_or_else(|| LecternError::Audio("audio track has no sample rate".to_string()))?;
    let channels = channels.unwrap_or(1).max(1);

    if samples.is_empty() {
        return Err(LecternError::Audio("audio contains no samples".to_string()));
    }

    Ok(DecodedAudio {
        samples,
        sample_rate,
        channels,
    })
}

/// Average interleaved channels into a single mono channel.
pub fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

/// Simple linear resampling from one sample rate to another.
///
/// Linear interpolation is sufficient for speech headed to a transcription
/// model.
pub fn resample(input: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || input.is_empty() || from_rate == 0 || to_rate == 0 {
        return input.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (input.len() as f64 / ratio).ceil() as usize;
    let mut output = Vec::with_capacity(output_len);

    for i in 0..output_len {
        let src_idx = i as f64 * ratio;
        let idx0 = (src_idx.floor() as usize).min(input.len() - 1);
        let idx1 = (idx0 + 1).min(input.len() - 1);
        let frac = (src_idx - idx0 as f64) as f32;

        output.push(input[idx0] * (1.0 - frac) + input[idx1] * frac);
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{ogg_opus_tone, sine_wav};

    #[test]
    fn test_decode_wav_reports_source_format() {
        let bytes = sine_wav(22_050, 2, 0.5);
        let decoded = decode(&bytes, AudioFormat::Wav).unwrap();
        assert_eq!(decoded.sample_rate, 22_050);
        assert_eq!(decoded.channels, 2);
        assert_eq!(decoded.samples.len(), 11_025 * 2);
    }

    #[test]
    fn test_decode_ignores_wrong_hint() {
        let bytes = sine_wav(16_000, 1, 0.1);
        let decoded = decode(&bytes, AudioFormat::Mp3).unwrap();
        assert_eq!(decoded.sample_rate, 16_000);
    }

    #[test]
    fn test_decode_dispatches_ogg_opus() {
        let decoded = decode(&ogg_opus_tone(1, 0.2), AudioFormat::Ogg).unwrap();
        assert_eq!(decoded.sample_rate, 48_000);
        assert_eq!(decoded.channels, 1);
    }

    #[test]
    fn test_decode_empty_payload() {
        let err = decode(&[], AudioFormat::Ogg).unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn test_decode_garbage() {
        let result = decode(&[0x13; 512], AudioFormat::Unknown);
        assert!(matches!(result, Err(LecternError::Audio(_))));
    }

    #[test]
    fn test_downmix_stereo() {
        let mono = downmix(&[1.0, 0.0, 0.5, 0.5, -1.0, 1.0], 2);
        assert_eq!(mono, vec![0.5, 0.5, 0.0]);
    }

    #[test]
    fn test_downmix_mono_passthrough() {
        assert_eq!(downmix(&[0.1, 0.2], 1), vec![0.1, 0.2]);
    }

    #[test]
    fn test_resample_same_rate_is_identity() {
        let input = vec![0.1, 0.2, 0.3];
        assert_eq!(resample(&input, 16_000, 16_000), input);
    }

    #[test]
    fn test_resample_downsample_length() {
        let input = vec![0.0f32; 48_000];
        assert_eq!(resample(&input, 48_000, 16_000).len(), 16_000);
    }

    #[test]
    fn test_resample_upsample_interpolates() {
        let out = resample(&[0.0, 1.0], 8_000, 16_000);
        assert_eq!(out.len(), 4);
        assert!((out[1] - 0.5).abs() < 1e-6);
    }
}
