// src/audio.rs
//! Container sniffing for synthesized narration. Providers return either a
//! complete file or raw PCM; raw PCM is wrapped in a WAV header before upload.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioContainer {
    Wav,
    Mp3,
}

impl AudioContainer {
    pub fn extension(self) -> &'static str {
        match self {
            AudioContainer::Wav => "wav",
            AudioContainer::Mp3 => "mp3",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            AudioContainer::Wav => "audio/wav",
            AudioContainer::Mp3 => "audio/mpeg",
        }
    }
}

/// Identify a known container from the leading bytes
pub fn detect_container(bytes: &[u8]) -> Option<AudioContainer> {
    if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE" {
        return Some(AudioContainer::Wav);
    }
    if bytes.starts_with(b"ID3") {
        return Some(AudioContainer::Mp3);
    }
    // Bare MPEG frame sync
    if bytes.len() >= 2 && bytes[0] == 0xFF && (bytes[1] & 0xE0) == 0xE0 {
        return Some(AudioContainer::Mp3);
    }
    None
}

/// Layout of headerless PCM returned by the speech provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl Default for PcmFormat {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            channels: 1,
            bits_per_sample: 16,
        }
    }
}

impl PcmFormat {
    fn block_align(&self) -> u16 {
        self.channels * (self.bits_per_sample / 8)
    }

    fn byte_rate(&self) -> u32 {
        self.sample_rate * u32::from(self.block_align())
    }
}

pub const WAV_HEADER_LEN: usize = 44;

/// Prefix raw PCM samples with a canonical 44-byte RIFF/WAVE header
pub fn wrap_pcm_in_wav(pcm: &[u8], format: PcmFormat) -> Vec<u8> {
    let data_len = pcm.len() as u32;
    let mut out = Vec::with_capacity(WAV_HEADER_LEN + pcm.len());

    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");

    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM
    out.extend_from_slice(&format.channels.to_le_bytes());
    out.extend_from_slice(&format.sample_rate.to_le_bytes());
    out.extend_from_slice(&format.byte_rate().to_le_bytes());
    out.extend_from_slice(&format.block_align().to_le_bytes());
    out.extend_from_slice(&format.bits_per_sample.to_le_bytes());

    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    out.extend_from_slice(pcm);
    out
}

/// Return upload-ready bytes and their container
pub fn normalize_audio(bytes: Vec<u8>, format: PcmFormat) -> (Vec<u8>, AudioContainer) {
    match detect_container(&bytes) {
        Some(container) => (bytes, container),
        None => {
            tracing::debug!(bytes = bytes.len(), "no container signature, wrapping as PCM WAV");
            (wrap_pcm_in_wav(&bytes, format), AudioContainer::Wav)
        }
    }
}
