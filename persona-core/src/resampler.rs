//! Polyphase rational resampling between the 8kHz telephony line rate and
//! the 16kHz rate the speech models expect.

fn gcd(a: u32, b: u32) -> u32 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

/// Resample `input` from `orig_rate` to `target_rate`. Passes through
/// unchanged when the rates already match, otherwise applies a
/// windowed-sinc polyphase filter sized from `gcd(orig_rate, target_rate)`.
pub fn resample(input: &[i16], orig_rate: u32, target_rate: u32) -> Vec<i16> {
    if orig_rate == target_rate || input.is_empty() {
        return input.to_vec();
    }

    let g = gcd(orig_rate, target_rate);
    let up = (target_rate / g) as usize;
    let down = (orig_rate / g) as usize;

    let input_f: Vec<f64> = input.iter().map(|&s| s as f64).collect();
    let out_len = (input_f.len() * up) / down;
    if out_len == 0 {
        return Vec::new();
    }

    let cutoff = 1.0 / (up.max(down) as f64);
    let half_taps = 16 * up.max(down);
    let filter = windowed_sinc_lowpass(cutoff, half_taps, up as f64);
    let filter_center = (filter.len() / 2) as i64;

    let mut output = Vec::with_capacity(out_len);
    for n in 0..out_len {
        // n is an output index; map it onto the upsampled-by-`up` timeline.
        let t = (n * down) as i64;
        let mut acc = 0.0f64;
        for (k, &h) in filter.iter().enumerate() {
            let tap_pos = t - (k as i64 - filter_center);
            if tap_pos.rem_euclid(up as i64) != 0 {
                continue; // polyphase: only zero-stuffed positions contribute
            }
            let src_index = tap_pos / up as i64;
            if src_index < 0 || src_index as usize >= input_f.len() {
                continue;
            }
            acc += h * input_f[src_index as usize];
        }
        output.push(acc.clamp(i16::MIN as f64, i16::MAX as f64).round() as i16);
    }
    output
}

fn windowed_sinc_lowpass(cutoff: f64, half_taps: usize, gain: f64) -> Vec<f64> {
    let n = half_taps * 2 + 1;
    let m = (n - 1) as f64;
    (0..n)
        .map(|i| {
            let x = i as f64 - m / 2.0;
            let sinc = if x == 0.0 {
                2.0 * cutoff
            } else {
                (2.0 * std::f64::consts::PI * cutoff * x).sin() / (std::f64::consts::PI * x)
            };
            let window = 0.54 - 0.46 * (2.0 * std::f64::consts::PI * i as f64 / m).cos();
            sinc * window * gain
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passthrough_when_rates_match() {
        let input = vec![1, 2, 3, -4, 5];
        assert_eq!(resample(&input, 16000, 16000), input);
    }

    #[test]
    fn upsample_doubles_sample_count() {
        let input = vec![0i16; 160]; // 20ms @ 8kHz
        let out = resample(&input, 8000, 16000);
        assert_eq!(out.len(), 320);
    }

    #[test]
    fn downsample_halves_sample_count() {
        let input = vec![0i16; 320]; // 20ms @ 16kHz
        let out = resample(&input, 16000, 8000);
        assert_eq!(out.len(), 160);
    }

    #[test]
    fn silence_resamples_to_silence() {
        let input = vec![0i16; 800];
        let out = resample(&input, 8000, 16000);
        assert!(out.iter().all(|&s| s.abs() < 5));
    }

    #[test]
    fn approximately_preserves_energy_of_a_tone() {
        let sr = 8000.0;
        let freq = 440.0;
        let input: Vec<i16> = (0..1600)
            .map(|i| {
                let t = i as f64 / sr;
                (8000.0 * (2.0 * std::f64::consts::PI * freq * t).sin()) as i16
            })
            .collect();
        let out = resample(&input, 8000, 16000);

        let rms = |s: &[i16]| -> f64 {
            (s.iter().map(|&x| (x as f64).powi(2)).sum::<f64>() / s.len() as f64).sqrt()
        };
        let ratio = rms(&out) / rms(&input);
        // Coarse sanity bound: the filter's passband gain should keep the
        // resampled tone's energy in the same ballpark as the input.
        assert!(
            (0.5..1.5).contains(&ratio),
            "rms ratio {ratio} outside expected band"
        );
    }
}
