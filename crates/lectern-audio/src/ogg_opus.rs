//! Ogg/Opus voice notes: demuxed with `ogg`, decoded with libopus.

use std::io::Cursor;

use ogg::reading::PacketReader;
use opus::{Channels, Decoder};

use lectern_core::error::LecternError;

use crate::decode::DecodedAudio;

const OPUS_HEAD: &[u8] = b"OpusHead";
const OPUS_TAGS: &[u8] = b"OpusTags";

/// Opus always decodes at 48 kHz.
pub const OPUS_SAMPLE_RATE: u32 = 48_000;

/// 120 ms at 48 kHz, the longest Opus packet.
const MAX_FRAME_SAMPLES: usize = 5_760;

/// Fields of the identification header that decoding depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OpusHead {
    channels: usize,
    pre_skip: usize,
}

fn opus_err(context: &str, err: impl std::fmt::Display) -> LecternError {
    LecternError::Audio(format!("{}: {}", context, err))
}

/// True when the first Ogg page carries an Opus identification header.
pub fn is_ogg_opus(bytes: &[u8]) -> bool {
    if !bytes.starts_with(b"OggS") {
        return false;
    }
    // 27-byte page header, then the segment table.
    let Some(&segments) = bytes.get(26) else {
        return false;
    };
    bytes
        .get(27 + segments as usize..)
        .is_some_and(|payload| payload.starts_with(OPUS_HEAD))
}

fn parse_head(packet: &[u8]) -> Result<OpusHead, LecternError> {
    if packet.len() < 19 || !packet.starts_with(OPUS_HEAD) {
        return Err(LecternError::Audio("malformed OpusHead packet".to_string()));
    }
    let channels = packet[9] as usize;
    let pre_skip = u16::from_le_bytes([packet[10], packet[11]]) as usize;
    let mapping_family = packet[18];
    if mapping_family != 0 || !(1..=2).contains(&channels) {
        return Err(LecternError::Audio(format!(
            "unsupported Opus channel layout: {} channels, mapping family {}",
            channels, mapping_family
        )));
    }
    Ok(OpusHead { channels, pre_skip })
}

/// Decode an Ogg/Opus stream into interleaved 48 kHz samples.
///
/// Only the logical stream that carries the identification header is
/// decoded. Corrupt packets are skipped.
pub fn decode_ogg_opus(bytes: &[u8]) -> Result<DecodedAudio, LecternError> {
    let mut reader = PacketReader::new(Cursor::new(bytes));
    let mut next = || {
        reader
            .read_packet()
            .map_err(|e| opus_err("failed to read Ogg page", e))
    };

    let head_packet =
        next()?.ok_or_else(|| LecternError::Audio("Ogg stream is empty".to_string()))?;
    let head = parse_head(&head_packet.data)?;
    let serial = head_packet.stream_serial();

    let channels = if head.channels == 2 {
        Channels::Stereo
    } else {
        Channels::Mono
    };
    let mut decoder = Decoder::new(OPUS_SAMPLE_RATE, channels)
        .map_err(|e| opus_err("failed to create Opus decoder", e))?;

    let mut pcm = vec![0f32; MAX_FRAME_SAMPLES * head.channels];
    let mut samples = Vec::new();
    let mut packets = 0usize;
    while let Some(packet) = next()? {
        if packet.stream_serial() != serial || packet.data.starts_with(OPUS_TAGS) {
            continue;
        }
        packets += 1;
        match decoder.decode_float(&packet.data, &mut pcm, false) {
            Ok(frames) => samples.extend_from_slice(&pcm[..frames * head.channels]),
            Err(e) => tracing::debug!(error = %e, "Skipping undecodable Opus packet"),
        }
    }

    let skip = (head.pre_skip * head.channels).min(samples.len());
    samples.drain(..skip);
    if samples.is_empty() {
        return Err(LecternError::Audio("audio contains no samples".to_string()));
    }

    tracing::trace!(
        packets,
        channels = head.channels,
        pre_skip = head.pre_skip,
        "Ogg/Opus stream decoded"
    );

    Ok(DecodedAudio {
        samples,
        sample_rate: OPUS_SAMPLE_RATE,
        channels: head.channels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{ogg_opus_tone, sine_wav, OPUS_PRE_SKIP};

    #[test]
    fn test_detects_ogg_opus() {
        assert!(is_ogg_opus(&ogg_opus_tone(1, 0.1)));
        assert!(!is_ogg_opus(&sine_wav(16_000, 1, 0.1)));
        assert!(!is_ogg_opus(b"OggS"));
        assert!(!is_ogg_opus(&[]));
    }

    #[test]
    fn test_decode_mono_voice_note() {
        let decoded = decode_ogg_opus(&ogg_opus_tone(1, 0.5)).unwrap();
        assert_eq!(decoded.sample_rate, OPUS_SAMPLE_RATE);
        assert_eq!(decoded.channels, 1);
        // 25 frames of 20 ms, minus the encoder delay.
        assert_eq!(decoded.samples.len(), 25 * 960 - OPUS_PRE_SKIP as usize);
        assert!(decoded.samples.iter().any(|s| s.abs() > 0.05));
    }

    #[test]
    fn test_decode_stereo_voice_note() {
        let decoded = decode_ogg_opus(&ogg_opus_tone(2, 0.2)).unwrap();
        assert_eq!(decoded.channels, 2);
        assert_eq!(decoded.samples.len(), (10 * 960 - OPUS_PRE_SKIP as usize) * 2);
    }

    #[test]
    fn test_malformed_head_is_rejected() {
        let err = parse_head(b"OpusHead\x01").unwrap_err();
        assert!(err.to_string().contains("malformed"));

        let mut head = b"OpusHead".to_vec();
        head.extend_from_slice(&[1, 6, 0, 0, 0x80, 0xBB, 0, 0, 0, 0, 1]);
        let err = parse_head(&head).unwrap_err();
        assert!(err.to_string().contains("channel layout"));
    }

    #[test]
    fn test_truncated_stream_is_an_error() {
        let bytes = ogg_opus_tone(1, 0.1);
        let result = decode_ogg_opus(&bytes[..40]);
        assert!(matches!(result, Err(LecternError::Audio(_))));
    }
}
