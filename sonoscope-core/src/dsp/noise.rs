//! Spectral subtraction against a per-bin noise profile.

/// Noise profile taken from a stretch of background-only spectrum frames.
#[derive(Clone, Debug, Default)]
pub struct SpectralSubtraction {
    profile: Vec<f32>,
}

impl SpectralSubtraction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn profile(&self) -> &[f32] {
        &self.profile
    }

    /// Average the time-major `frames` (`n_bins` values each) into the noise
    /// profile. A trailing partial frame is ignored; an empty input leaves
    /// the previous profile in place.
    pub fn estimate_noise(&mut self, frames: &[f32], n_bins: usize) {
        if n_bins == 0 || frames.len() < n_bins {
            return;
        }
        let n_frames = frames.len() / n_bins;
        let mut profile = vec![0.0f32; n_bins];
        for frame in frames.chunks_exact(n_bins) {
            for (p, &v) in profile.iter_mut().zip(frame) {
                *p += v;
            }
        }
        for p in profile.iter_mut() {
            *p /= n_frames as f32;
        }
        log::debug!("Noise profile estimated from {} frames", n_frames);
        self.profile = profile;
    }

    /// Subtract `alpha * noise` from every frame of a time-major magnitude
    /// spectrum, flooring each bin at `beta * noise`.
    ///
    /// Without a profile, or when the length is not a whole number of
    /// profile-sized frames, the spectrum is returned unchanged.
    pub fn reduce_noise(&self, spectrum: &[f32], alpha: f32, beta: f32) -> Vec<f32> {
        let n_bins = self.profile.len();
        if n_bins == 0 || spectrum.len() % n_bins != 0 {
            return spectrum.to_vec();
        }
        spectrum
            .chunks_exact(n_bins)
            .flat_map(|frame| {
                frame.iter().zip(&self.profile).map(|(&signal, &noise)| {
                    let subtracted = signal - alpha * noise;
                    subtracted.max(beta * noise)
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subtracts_and_floors() {
        let mut reducer = SpectralSubtraction::new();
        reducer.estimate_noise(&[0.1, 0.1, 0.1, 0.1], 4);

        let reduced = reducer.reduce_noise(&[0.5, 0.3, 0.1, 0.05], 1.0, 0.1);
        let expected = [0.4, 0.2, 0.01, 0.01];
        for (r, e) in reduced.iter().zip(expected) {
            assert!((r - e).abs() < 1e-6, "{r} vs {e}");
        }
    }

    #[test]
    fn profile_is_the_mean_frame() {
        let mut reducer = SpectralSubtraction::new();
        reducer.estimate_noise(&[0.0, 1.0, 0.2, 3.0, 9.0], 2);
        assert_eq!(reducer.profile(), &[0.1, 2.0]);
    }

    #[test]
    fn applies_to_every_frame() {
        let mut reducer = SpectralSubtraction::new();
        reducer.estimate_noise(&[1.0, 2.0], 2);
        let out = reducer.reduce_noise(&[5.0, 5.0, 3.0, 3.0], 1.0, 0.0);
        assert_eq!(out, vec![4.0, 3.0, 2.0, 1.0]);
    }

    #[test]
    fn mismatched_input_passes_through() {
        let mut reducer = SpectralSubtraction::new();
        assert_eq!(reducer.reduce_noise(&[1.0, 2.0], 1.0, 0.1), vec![1.0, 2.0]);
        reducer.estimate_noise(&[1.0, 1.0, 1.0], 3);
        assert_eq!(reducer.reduce_noise(&[1.0, 2.0], 1.0, 0.1), vec![1.0, 2.0]);
        reducer.estimate_noise(&[], 3);
        assert_eq!(reducer.profile().len(), 3);
    }
}
