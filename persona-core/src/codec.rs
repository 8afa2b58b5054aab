//! G.711 mu-law companding, byte-exact with the ITU-T reference algorithm.

use persona_protocol::{Frame, FRAME_BYTES, MULAW_SILENCE};

const BIAS: i32 = 0x84; // 132
const CLIP: i32 = 32635;

/// Decode a single mu-law byte to a 16-bit linear PCM sample.
pub fn decode(byte: u8) -> i16 {
    let inverted = !byte;
    let sign = inverted & 0x80;
    let exponent = ((inverted >> 4) & 0x07) as i32;
    let mantissa = (inverted & 0x0F) as i32;

    let magnitude = (((mantissa << 3) + BIAS) << exponent) - BIAS;
    if sign != 0 {
        -(magnitude as i16)
    } else {
        magnitude as i16
    }
}

/// Encode a 16-bit linear PCM sample to a mu-law byte.
pub fn encode(sample: i16) -> u8 {
    let sample = sample as i32;
    let sign: i32 = if sample < 0 { 0x80 } else { 0x00 };
    let magnitude = (sample.unsigned_abs() as i32 + BIAS).min(CLIP);

    let mut exponent = 0i32;
    for e in (0..=7).rev() {
        if magnitude >= (BIAS << e) {
            exponent = e;
            break;
        }
    }
    let mantissa = (((magnitude >> exponent) - BIAS) >> 3).clamp(0, 15);
    (!(sign | (exponent << 4) | mantissa) & 0xFF) as u8
}

/// Decode a 160-byte telephony frame to 160 linear PCM samples at 8kHz.
pub fn decode_frame(frame: &Frame) -> Vec<i16> {
    frame.as_bytes().iter().map(|&b| decode(b)).collect()
}

/// Encode up to 160 linear PCM samples at 8kHz into a telephony frame.
/// Any remaining bytes are padded with mu-law silence, per the TTS output
/// contract.
pub fn encode_frame(samples: &[i16]) -> Frame {
    let mut bytes = [MULAW_SILENCE; FRAME_BYTES];
    for (slot, &s) in bytes.iter_mut().zip(samples.iter()) {
        *slot = encode(s);
    }
    Frame(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_byte_decodes_near_zero() {
        assert_eq!(decode(MULAW_SILENCE), 0);
    }

    #[test]
    fn encode_decode_round_trip_within_companding_error() {
        // G.711 is a lossy logarithmic encoding; the worst-case error
        // grows with the exponent. A generous but bounded tolerance
        // catches regressions without becoming a round-trip-equality
        // test for a lossy codec.
        let samples: Vec<i16> = (-32768..32767).step_by(97).collect();
        for s in samples {
            let byte = encode(s);
            let back = decode(byte);
            let err = (s as i32 - back as i32).abs();
            let tolerance = (s.unsigned_abs() as i32 / 32).max(34);
            assert!(
                err <= tolerance,
                "sample {s} round-tripped to {back}, error {err} exceeds tolerance {tolerance}"
            );
        }
    }

    #[test]
    fn decode_encode_is_idempotent_on_valid_bytes() {
        // 0x7F and 0xFF both decode to linear zero (the standard mu-law
        // positive-zero/negative-zero aliasing); encoding zero always
        // produces the canonical 0xFF, so 0x7F is the one code with no
        // way back.
        for byte in 0u8..=255 {
            if byte == 0x7F {
                continue;
            }
            let decoded = decode(byte);
            let re_encoded = encode(decoded);
            assert_eq!(byte, re_encoded, "byte {byte:#x} did not round-trip");
        }
    }

    #[test]
    fn encode_frame_pads_with_silence() {
        let samples = vec![0i16; 10];
        let frame = encode_frame(&samples);
        assert_eq!(frame.as_bytes().len(), FRAME_BYTES);
        assert!(frame.as_bytes()[10..].iter().all(|&b| b == MULAW_SILENCE));
    }

    #[test]
    fn decode_frame_produces_160_samples() {
        let frame = Frame::silence();
        let pcm = decode_frame(&frame);
        assert_eq!(pcm.len(), FRAME_BYTES);
    }
}
