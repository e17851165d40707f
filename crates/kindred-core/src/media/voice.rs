//! Voice note helpers. Speech is not synthesised; voice notes carry their
//! text and a silent WAV of fixed length.

use rand::seq::IndexedRandom;

pub const SAMPLE_RATE: u32 = 22_050;
pub const PLACEHOLDER_SECS: f64 = 2.0;

const RANDOM_TEXTS: &[&str] = &[
    "Hey! Just wanted to say hi!",
    "Missing you right now...",
    "Call me when you get this!",
    "Thinking about you!",
    "Hope you're having a good day!",
    "Can't wait to talk to you!",
    "Just heard something funny and thought of you!",
    "Talk soon, take care!",
];

/// A short line for an unprompted voice note.
pub fn random_text() -> String {
    RANDOM_TEXTS
        .choose(&mut rand::rng())
        .copied()
        .unwrap_or(RANDOM_TEXTS[0])
        .to_string()
}

/// A mono 16-bit PCM WAV file of `secs` seconds of silence.
pub fn silent_wav(secs: f64, sample_rate: u32) -> Vec<u8> {
    const CHANNELS: u16 = 1;
    const BITS: u16 = 16;

    let frames = (secs.max(0.0) * f64::from(sample_rate)).round() as u32;
    let block_align = CHANNELS * BITS / 8;
    let data_len = frames * u32::from(block_align);
    let byte_rate = sample_rate * u32::from(block_align);

    let mut wav = Vec::with_capacity(44 + data_len as usize);
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + data_len).to_le_bytes());
    wav.extend_from_slice(b"WAVE");
    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes()); // PCM
    wav.extend_from_slice(&CHANNELS.to_le_bytes());
    wav.extend_from_slice(&sample_rate.to_le_bytes());
    wav.extend_from_slice(&byte_rate.to_le_bytes());
    wav.extend_from_slice(&block_align.to_le_bytes());
    wav.extend_from_slice(&BITS.to_le_bytes());
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_len.to_le_bytes());
    wav.resize(44 + data_len as usize, 0);
    wav
}

/// Duration in seconds of a WAV produced by [`silent_wav`].
pub fn wav_duration(wav: &[u8]) -> Option<f64> {
    if wav.len() < 44 || &wav[..4] != b"RIFF" || &wav[8..12] != b"WAVE" {
        return None;
    }
    let byte_rate = u32::from_le_bytes(wav[28..32].try_into().ok()?);
    let data_len = u32::from_le_bytes(wav[40..44].try_into().ok()?);
    if byte_rate == 0 {
        return None;
    }
    Some(f64::from(data_len) / f64::from(byte_rate))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silent_wav_header() {
        let wav = silent_wav(PLACEHOLDER_SECS, SAMPLE_RATE);
        assert_eq!(&wav[..4], b"RIFF");
        assert_eq!(&wav[8..16], b"WAVEfmt ");
        // 2 s * 22050 Hz * 2 bytes
        assert_eq!(wav.len(), 44 + 88_200);
        assert_eq!(u16::from_le_bytes([wav[22], wav[23]]), 1);
        assert_eq!(u32::from_le_bytes(wav[24..28].try_into().unwrap()), 22_050);
        assert!(wav[44..].iter().all(|b| *b == 0));
        assert_eq!(wav_duration(&wav), Some(2.0));
    }

    #[test]
    fn test_random_text_is_from_list() {
        let text = random_text();
        assert!(RANDOM_TEXTS.contains(&text.as_str()));
    }

    #[test]
    fn test_wav_duration_rejects_garbage() {
        assert_eq!(wav_duration(b"not a wav"), None);
    }
}
