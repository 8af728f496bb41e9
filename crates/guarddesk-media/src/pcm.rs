//! 16-bit PCM helpers: incremental decoding and WAV framing.

/// Incremental decoder for little-endian 16-bit PCM arriving in arbitrary chunks.
///
/// A chunk with an odd byte count leaves its last byte pending; it is joined
/// with the first byte of the next chunk so no sample is lost or misaligned.
#[derive(Debug, Default)]
pub struct PcmDecoder {
    pending: Option<u8>,
    total_samples: u64,
}

impl PcmDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a chunk into samples normalized to -1.0..1.0.
    pub fn decode(&mut self, chunk: &[u8]) -> Vec<f32> {
        let mut out = Vec::with_capacity(chunk.len() / 2 + 1);
        let mut rest = chunk;

        if let Some(low) = self.pending.take() {
            match rest.split_first() {
                Some((&high, tail)) => {
                    out.push(i16_to_f32(i16::from_le_bytes([low, high])));
                    rest = tail;
                }
                None => {
                    self.pending = Some(low);
                    return out;
                }
            }
        }

        let mut pairs = rest.chunks_exact(2);
        out.extend(
            pairs
                .by_ref()
                .map(|pair| i16_to_f32(i16::from_le_bytes([pair[0], pair[1]]))),
        );
        if let [odd] = pairs.remainder() {
            self.pending = Some(*odd);
        }

        self.total_samples += out.len() as u64;
        out
    }

    /// Whether a trailing byte is waiting for its partner.
    pub fn has_pending_byte(&self) -> bool {
        self.pending.is_some()
    }

    pub fn total_samples(&self) -> u64 {
        self.total_samples
    }
}

pub fn i16_to_f32(sample: i16) -> f32 {
    sample as f32 / 32768.0
}

pub fn f32_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * 32767.0).round() as i16
}

/// Wrap raw 16-bit PCM in a WAV container.
pub fn pcm_to_wav(pcm: &[i16], sample_rate: u32, channels: u16, bits_per_sample: u16) -> Vec<u8> {
    let data_len = pcm.len() * 2; // 2 bytes per i16 sample
    let byte_rate = sample_rate * channels as u32 * bits_per_sample as u32 / 8;
    let block_align = channels * bits_per_sample / 8;
    let file_size = 36 + data_len as u32;

    let mut wav = Vec::with_capacity(44 + data_len);

    // RIFF header
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&file_size.to_le_bytes());
    wav.extend_from_slice(b"WAVE");

    // fmt chunk
    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes()); // chunk size
    wav.extend_from_slice(&1u16.to_le_bytes()); // PCM format
    wav.extend_from_slice(&channels.to_le_bytes());
    wav.extend_from_slice(&sample_rate.to_le_bytes());
    wav.extend_from_slice(&byte_rate.to_le_bytes());
    wav.extend_from_slice(&block_align.to_le_bytes());
    wav.extend_from_slice(&bits_per_sample.to_le_bytes());

    // data chunk
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&(data_len as u32).to_le_bytes());
    for &sample in pcm {
        wav.extend_from_slice(&sample.to_le_bytes());
    }

    wav
}

/// Sample rate and data payload of a 16-bit PCM WAV file.
pub fn wav_data(bytes: &[u8]) -> Option<(u32, &[u8])> {
    if bytes.len() < 12 || &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        return None;
    }

    let mut sample_rate = None;
    let mut pos = 12;
    while pos + 8 <= bytes.len() {
        let id = &bytes[pos..pos + 4];
        let size = u32::from_le_bytes(bytes[pos + 4..pos + 8].try_into().ok()?) as usize;
        let body_start = pos + 8;
        let body_end = body_start.saturating_add(size).min(bytes.len());
        match id {
            b"fmt " if body_end >= body_start + 8 => {
                sample_rate = Some(u32::from_le_bytes(
                    bytes[body_start + 4..body_start + 8].try_into().ok()?,
                ));
            }
            b"data" => return Some((sample_rate?, &bytes[body_start..body_end])),
            _ => {}
        }
        // Chunks are word-aligned.
        pos = body_start + size + (size & 1);
    }
    None
}

/// Decode a 16-bit PCM WAV file into normalized samples.
pub fn wav_samples(bytes: &[u8]) -> Option<Vec<f32>> {
    let (_, data) = wav_data(bytes)?;
    Some(PcmDecoder::new().decode(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    #[test]
    fn test_wav_written_then_read_back() {
        let half_second = vec![i16::MAX / 2; 12_000];
        let wav = pcm_to_wav(&half_second, 24_000, 1, 16);

        let (rate, data) = wav_data(&wav).expect("valid wav");
        assert_eq!(rate, 24_000);
        assert_eq!(data.len(), 24_000);
        let samples = wav_samples(&wav).unwrap();
        assert_eq!(samples.len(), 12_000);
        assert!((samples[0] - 0.5).abs() < 0.001);
        assert!(wav_data(b"not a wav file at all").is_none());
    }

    #[test]
    fn test_odd_chunks_carry_trailing_byte() {
        let samples: Vec<i16> = vec![0, 1000, -1000, i16::MAX, i16::MIN, 12345, -2];
        let bytes = encode(&samples);
        assert_eq!(bytes.len(), 14);

        // Three chunks with odd lengths: 5 + 3 + 6.
        let mut decoder = PcmDecoder::new();
        let mut out = decoder.decode(&bytes[0..5]);
        assert!(decoder.has_pending_byte());
        out.extend(decoder.decode(&bytes[5..8]));
        assert!(!decoder.has_pending_byte());
        out.extend(decoder.decode(&bytes[8..14]));

        let expected: Vec<f32> = samples.iter().map(|&s| i16_to_f32(s)).collect();
        assert_eq!(out, expected);
        assert_eq!(decoder.total_samples(), 7);
    }

    #[test]
    fn test_single_byte_chunks() {
        let bytes = encode(&[-32768, 16384]);
        let mut decoder = PcmDecoder::new();
        let out: Vec<f32> = bytes.iter().flat_map(|b| decoder.decode(&[*b])).collect();
        assert_eq!(out, vec![-1.0, 0.5]);
    }

    #[test]
    fn test_empty_chunk_keeps_pending() {
        let mut decoder = PcmDecoder::new();
        assert!(decoder.decode(&[0x10]).is_empty());
        assert!(decoder.decode(&[]).is_empty());
        assert!(decoder.has_pending_byte());
        assert_eq!(decoder.decode(&[0x00]), vec![i16_to_f32(0x0010)]);
    }

    #[test]
    fn test_wav_samples_roundtrip() {
        let wav = pcm_to_wav(&[16384, -16384], 24000, 1, 16);
        let (rate, data) = wav_data(&wav).unwrap();
        assert_eq!(rate, 24000);
        assert_eq!(data.len(), 4);
        assert_eq!(wav_samples(&wav).unwrap(), vec![0.5, -0.5]);
        assert!(wav_samples(b"not a wav file").is_none());
    }

    #[test]
    fn test_f32_to_i16_clamps() {
        assert_eq!(f32_to_i16(2.0), i16::MAX);
        assert_eq!(f32_to_i16(-2.0), -i16::MAX);
        assert_eq!(f32_to_i16(0.0), 0);
    }
}
