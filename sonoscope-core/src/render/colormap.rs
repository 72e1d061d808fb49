//! Scalar to RGB mapping with brightness, contrast and gamma adjustment.
//!
//! All channels are `f32` in `[0, 1]`; [`to_rgb8`] converts for pixel buffers.

use serde::{Deserialize, Serialize};

pub type Rgb = [f32; 3];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Colormap {
    #[default]
    Viridis,
    Magma,
    Grayscale,
}

impl Colormap {
    /// Evaluate the curve at `t`, clamped to `[0, 1]`.
    pub fn apply(self, t: f32) -> Rgb {
        match self {
            Colormap::Viridis => viridis(t),
            Colormap::Magma => magma(t),
            Colormap::Grayscale => grayscale(t),
        }
    }
}

/// Viridis control points at t = 0, 0.2, 0.4, 0.6, 0.8, 1.0.
const VIRIDIS_STOPS: [Rgb; 6] = [
    [0.267004, 0.004874, 0.329415],
    [0.004874, 0.324426, 0.361816],
    [0.329415, 0.677123, 0.656353],
    [0.206453, 0.986078, 0.129171],
    [0.993248, 0.852007, 0.270896],
    [0.995955, 0.695717, 0.285637],
];

/// Five-segment piecewise-linear viridis approximation.
pub fn viridis(t: f32) -> Rgb {
    let t = clamp01(t);
    let segment = ((t / 0.2) as usize).min(4);
    let u = (t - segment as f32 * 0.2) / 0.2;
    let (a, b) = (VIRIDIS_STOPS[segment], VIRIDIS_STOPS[segment + 1]);
    [
        a[0] + u * (b[0] - a[0]),
        a[1] + u * (b[1] - a[1]),
        a[2] + u * (b[2] - a[2]),
    ]
}

/// Closed-form magma approximation.
pub fn magma(t: f32) -> Rgb {
    let t = clamp01(t);
    [
        (0.5 + t * 1.2).min(1.0),
        (t * 0.8).min(1.0),
        (0.2 + t * 0.6).min(1.0),
    ]
}

pub fn grayscale(t: f32) -> Rgb {
    let t = clamp01(t);
    [t, t, t]
}

fn clamp01(v: f32) -> f32 {
    if v.is_nan() {
        return 0.0;
    }
    v.clamp(0.0, 1.0)
}

pub fn apply_brightness(color: Rgb, brightness: f32) -> Rgb {
    color.map(|c| clamp01(c * brightness))
}

/// Classic 8-bit contrast curve pivoting on 0.5. A mid-grey input is a fixed
/// point for every `contrast`.
pub fn apply_contrast(color: Rgb, contrast: f32) -> Rgb {
    let c = contrast * 255.0;
    let factor = ((259.0 * (c + 255.0)) / (255.0 * (259.0 - c))).clamp(-1e6, 1e6);
    color.map(|v| clamp01(factor * (v - 0.5) + 0.5))
}

/// `v^(1/gamma)`. Non-positive or non-finite gamma leaves the color unchanged.
pub fn apply_gamma(color: Rgb, gamma: f32) -> Rgb {
    if !(gamma > 0.0) || !gamma.is_finite() {
        return color;
    }
    let inv = 1.0 / gamma;
    color.map(|v| clamp01(v).powf(inv))
}

/// Normalize `value` into `[min, max]`, look it up in `colormap`, then apply
/// brightness, contrast and gamma (each skipped at its 1.0 default).
pub fn value_to_color(
    value: f32,
    min: f32,
    max: f32,
    colormap: Colormap,
    brightness: f32,
    contrast: f32,
    gamma: f32,
) -> Rgb {
    let range = max - min;
    let range = if range == 0.0 { 1.0 } else { range };
    let mut rgb = colormap.apply(clamp01((value - min) / range));

    if brightness != 1.0 {
        rgb = apply_brightness(rgb, brightness);
    }
    if contrast != 1.0 {
        rgb = apply_contrast(rgb, contrast);
    }
    if gamma != 1.0 {
        rgb = apply_gamma(rgb, gamma);
    }
    rgb
}

pub fn to_rgb8(rgb: Rgb) -> [u8; 3] {
    rgb.map(|c| (clamp01(c) * 255.0).floor() as u8)
}

/// `#rrggbb` for canvas and SVG style strings.
pub fn to_hex(rgb: Rgb) -> String {
    let [r, g, b] = to_rgb8(rgb);
    format!("#{:02x}{:02x}{:02x}", r, g, b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Rgb, b: Rgb) -> bool {
        a.iter().zip(b.iter()).all(|(x, y)| (x - y).abs() < 1e-6)
    }

    #[test]
    fn defaults_are_plain_colormap_lookup() {
        for colormap in [Colormap::Viridis, Colormap::Magma, Colormap::Grayscale] {
            for v in [-100.0f32, -80.0, -55.5, -40.0, -3.0, 0.0, 12.0] {
                let expected = colormap.apply(((v + 80.0) / 80.0).clamp(0.0, 1.0));
                let got = value_to_color(v, -80.0, 0.0, colormap, 1.0, 1.0, 1.0);
                assert!(close(got, expected), "{colormap:?} at {v}");
            }
        }
    }

    #[test]
    fn zero_range_does_not_divide_by_zero() {
        let rgb = value_to_color(3.0, 3.0, 3.0, Colormap::Grayscale, 1.0, 1.0, 1.0);
        assert!(close(rgb, [0.0, 0.0, 0.0]));
    }

    #[test]
    fn viridis_hits_control_points() {
        assert!(close(viridis(0.0), VIRIDIS_STOPS[0]));
        assert!(close(viridis(0.4), VIRIDIS_STOPS[2]));
        assert!(close(viridis(1.0), VIRIDIS_STOPS[5]));
        assert!(close(viridis(2.0), VIRIDIS_STOPS[5]));
    }

    #[test]
    fn contrast_fixes_midpoint() {
        for contrast in [-2.0f32, -0.5, 0.0, 0.25, 0.9, 1.0, 259.0 / 255.0, 1.5, 10.0] {
            assert_eq!(apply_contrast([0.5; 3], contrast), [0.5; 3], "contrast {contrast}");
        }
    }

    #[test]
    fn contrast_spreads_away_from_midpoint() {
        let [lo, ..] = apply_contrast([0.4; 3], 0.2);
        let [hi, ..] = apply_contrast([0.6; 3], 0.2);
        assert!(lo < 0.4 && hi > 0.6);
    }

    #[test]
    fn gamma_is_monotonic_at_half() {
        let at = |g: f32| apply_gamma([0.5; 3], g)[0];
        assert!(at(2.0) > at(1.0));
        assert!(at(3.0) > at(2.0));
        assert!(at(0.5) < at(1.0));
        assert!(at(0.25) < at(0.5));
    }

    #[test]
    fn brightness_clamps() {
        assert_eq!(apply_brightness([0.6, 0.2, 1.0], 2.0), [1.0, 0.4, 1.0]);
    }

    #[test]
    fn hex_and_bytes() {
        assert_eq!(to_rgb8([1.0, 0.0, 0.5]), [255, 0, 127]);
        assert_eq!(to_hex([1.0, 1.0, 1.0]), "#ffffff");
    }
}
