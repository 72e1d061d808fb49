//! Optional passes applied to a spectrogram before rasterization. Each
//! returns a new value; the input is left untouched.

use crate::error::{Result, SonoscopeError};
use crate::types::Spectrogram;

const KERNEL: [[f32; 3]; 3] = [[1.0, 2.0, 1.0], [2.0, 4.0, 2.0], [1.0, 2.0, 1.0]];

/// Blend each cell with a 3x3 weighted blur:
/// `v * (1 - weight) + blur * weight`.
///
/// The kernel is renormalized by the in-bounds weights at edges. Non-finite
/// neighbours are left out of the blur; a non-finite centre stays as it is.
pub fn smooth(spectrogram: &Spectrogram, weight: f32) -> Result<Spectrogram> {
    if !(weight > 0.0 && weight <= 1.0) {
        return Err(SonoscopeError::InvalidParams(format!(
            "smoothing weight must be in (0, 1], got {weight}"
        )));
    }
    let bins = spectrogram.n_freq_bins();
    let frames = spectrogram.n_time_frames();
    let src = spectrogram.data();
    let mut out = Vec::with_capacity(src.len());

    for bin in 0..bins {
        for frame in 0..frames {
            let v = src[bin * frames + frame];
            if !v.is_finite() {
                out.push(v);
                continue;
            }
            let mut sum = 0.0f32;
            let mut norm = 0.0f32;
            for (dy, row) in KERNEL.iter().enumerate() {
                let b = bin as isize + dy as isize - 1;
                if b < 0 || b >= bins as isize {
                    continue;
                }
                for (dx, &k) in row.iter().enumerate() {
                    let f = frame as isize + dx as isize - 1;
                    if f < 0 || f >= frames as isize {
                        continue;
                    }
                    let n = src[b as usize * frames + f as usize];
                    if n.is_finite() {
                        sum += n * k;
                        norm += k;
                    }
                }
            }
            let blur = sum / norm;
            out.push(v * (1.0 - weight) + blur * weight);
        }
    }

    Spectrogram::new(
        out,
        bins,
        frames,
        spectrogram.sample_rate(),
        spectrogram.n_fft(),
        spectrogram.hop_length(),
    )
}

/// Double the time resolution by interpolating a frame between each pair.
/// The result has `2 * n` frames and half the hop; the final inserted frame
/// repeats the last source frame.
pub fn oversample_time(spectrogram: &Spectrogram) -> Result<Spectrogram> {
    let bins = spectrogram.n_freq_bins();
    let frames = spectrogram.n_time_frames();
    let out_frames = frames * 2;
    let src = spectrogram.data();
    let mut out = Vec::with_capacity(bins * out_frames);

    for bin in 0..bins {
        let row = &src[bin * frames..(bin + 1) * frames];
        for j in 0..out_frames {
            let i = j / 2;
            if j % 2 == 0 || i + 1 >= frames {
                out.push(row[i]);
            } else {
                out.push(0.5 * (row[i] + row[i + 1]));
            }
        }
    }

    Spectrogram::new(
        out,
        bins,
        out_frames,
        spectrogram.sample_rate(),
        spectrogram.n_fft(),
        (spectrogram.hop_length() / 2).max(1),
    )
}

/// Bilinear sample at fractional `(bin, frame)`. Coordinates are clamped to
/// the matrix and non-finite cells count as 0.
pub fn bilinear(spectrogram: &Spectrogram, bin: f64, frame: f64) -> f32 {
    let max_bin = (spectrogram.n_freq_bins() - 1) as f64;
    let max_frame = (spectrogram.n_time_frames() - 1) as f64;
    let bin = if bin.is_finite() { bin.clamp(0.0, max_bin) } else { 0.0 };
    let frame = if frame.is_finite() { frame.clamp(0.0, max_frame) } else { 0.0 };

    let (b0, f0) = (bin.floor(), frame.floor());
    let (tb, tf) = ((bin - b0) as f32, (frame - f0) as f32);
    let (b0, f0) = (b0 as isize, f0 as isize);
    let b1 = (b0 + 1).min(max_bin as isize);
    let f1 = (f0 + 1).min(max_frame as isize);

    let at = |b: isize, f: isize| {
        let v = spectrogram.value(b, f);
        if v.is_finite() {
            v
        } else {
            0.0
        }
    };
    let top = at(b0, f0) * (1.0 - tf) + at(b0, f1) * tf;
    let bottom = at(b1, f0) * (1.0 - tf) + at(b1, f1) * tf;
    let v = top * (1.0 - tb) + bottom * tb;
    if v.is_finite() {
        v
    } else {
        0.0
    }
}
