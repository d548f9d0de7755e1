use ndarray::Zip;

use crate::errors::ShapeMismatchError;
use crate::volume::{Mask, Volume};

/// Welford's online algorithm state for computing mean and variance
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
}

impl RunningStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// Update the state with a new value
    pub fn update(&mut self, value: f64) {
        self.count += 1;
        let n = self.count as f64;
        let delta = value - self.mean;
        self.mean += delta / n;
        let delta2 = value - self.mean;
        self.m2 += delta * delta2;
    }

    /// Mean of the values seen so far, undefined when there are none
    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then_some(self.mean)
    }

    /// Population standard deviation (divides by N), undefined when there are no values
    pub fn std(&self) -> Option<f64> {
        (self.count > 0).then(|| (self.m2 / self.count as f64).sqrt())
    }

    pub fn finish(&self) -> Option<IntensityStats> {
        Some(IntensityStats {
            mean: self.mean()?,
            stdev: self.std()?,
        })
    }
}

impl Extend<f64> for RunningStats {
    fn extend<I: IntoIterator<Item = f64>>(&mut self, iter: I) {
        iter.into_iter().for_each(|value| self.update(value));
    }
}

/// Mean and population standard deviation of the intensities inside a region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntensityStats {
    pub mean: f64,
    pub stdev: f64,
}

/// Statistics of one region. `intensity` is `None` when the region is empty
/// or no intensity volume was available.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaskedStatistics {
    pub count: usize,
    pub volume_mm3: f64,
    pub intensity: Option<IntensityStats>,
}

/// Computes voxel count, physical volume and, when an intensity volume is given,
/// the mean and population standard deviation of the intensities under the mask.
///
/// Count and volume derive from the mask alone. A volume on a different grid is
/// rejected rather than sampled.
pub fn compute(
    mask: &Mask,
    intensity: Option<&Volume>,
) -> Result<MaskedStatistics, ShapeMismatchError> {
    let intensity = match intensity {
        Some(volume) => intensity_stats(mask, volume)?,
        None => None,
    };
    Ok(MaskedStatistics {
        count: mask.count(),
        volume_mm3: mask.volume_mm3(),
        intensity,
    })
}

/// Mean and population standard deviation of `volume` under `mask`.
pub fn intensity_stats(
    mask: &Mask,
    volume: &Volume,
) -> Result<Option<IntensityStats>, ShapeMismatchError> {
    volume.ensure_shape(mask.shape())?;
    let mut state = RunningStats::new();
    Zip::from(mask.data())
        .and(volume.data())
        .for_each(|&selected, &value| {
            if selected {
                state.update(value);
            }
        });
    Ok(state.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::{LabelMap, Spacing};
    use ndarray::Array3;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use rstest::rstest;

    const TOLERANCE: f64 = 1e-9;

    fn unit_spacing() -> Spacing {
        Spacing::new(1.0, 1.0, 1.0).unwrap()
    }

    #[test]
    fn test_running_stats_population() {
        let mut state = RunningStats::new();
        state.extend((1..=5).map(f64::from));

        // Population variance of 1..=5 is 2.0
        assert_eq!(state.count(), 5);
        assert!((state.mean().unwrap() - 3.0).abs() < TOLERANCE);
        assert!((state.std().unwrap() - 2.0_f64.sqrt()).abs() < TOLERANCE);
    }

    #[test]
    fn test_running_stats_empty() {
        let state = RunningStats::new();
        assert_eq!(state.mean(), None);
        assert_eq!(state.std(), None);
        assert_eq!(state.finish(), None);
    }

    #[test]
    fn test_running_stats_single_value() {
        let mut state = RunningStats::new();
        state.update(7.5);
        assert_eq!(
            state.finish(),
            Some(IntensityStats {
                mean: 7.5,
                stdev: 0.0
            })
        );
    }

    #[test]
    fn test_compute_empty_mask() {
        let mask = Mask::new(Array3::from_elem((3, 3, 3), false), unit_spacing());
        let volume = Volume::new(Array3::from_elem((3, 3, 3), 10.0), unit_spacing());

        let stats = compute(&mask, Some(&volume)).unwrap();
        assert_eq!(stats.count, 0);
        assert_eq!(stats.volume_mm3, 0.0);
        assert_eq!(stats.intensity, None);
    }

    #[test]
    fn test_compute_without_intensity_volume() {
        let mut data = Array3::<i64>::zeros((4, 4, 4));
        data.slice_mut(ndarray::s![0..2, .., ..]).fill(1);
        let labels = LabelMap::new(data, Spacing::new(1.0, 2.0, 0.5).unwrap());

        let stats = compute(&labels.mask(1), None).unwrap();
        assert_eq!(stats.count, 32);
        assert_eq!(stats.volume_mm3, 32.0);
        assert_eq!(stats.intensity, None);
    }

    #[test]
    fn test_compute_masked_mean_and_std() {
        let mut labels = Array3::<i64>::zeros((2, 2, 2));
        labels[[0, 0, 0]] = 1;
        labels[[0, 0, 1]] = 1;
        labels[[1, 1, 1]] = 2;
        let labels = LabelMap::new(labels, unit_spacing());
        let intensities = Array3::from_shape_vec(
            (2, 2, 2),
            vec![2.0, 4.0, 100.0, 100.0, 100.0, 100.0, 100.0, 9.0],
        )
        .unwrap();
        let volume = Volume::new(intensities, unit_spacing());

        let stats = compute(&labels.mask(1), Some(&volume)).unwrap();
        assert_eq!(stats.count, 2);
        let intensity = stats.intensity.unwrap();
        assert!((intensity.mean - 3.0).abs() < TOLERANCE);
        // Population convention: sqrt(((2-3)^2 + (4-3)^2) / 2) = 1
        assert!((intensity.stdev - 1.0).abs() < TOLERANCE);

        let stats = compute(&labels.mask(2), Some(&volume)).unwrap();
        assert_eq!(
            stats.intensity,
            Some(IntensityStats {
                mean: 9.0,
                stdev: 0.0
            })
        );
    }

    #[test]
    fn test_compute_shape_mismatch() {
        let mask = Mask::new(Array3::from_elem((3, 3, 3), true), unit_spacing());
        let volume = Volume::new(Array3::zeros((3, 3, 4)), unit_spacing());
        let result = compute(&mask, Some(&volume));
        assert_eq!(
            result,
            Err(ShapeMismatchError {
                expected: (3, 3, 3),
                found: (3, 3, 4),
            })
        );
    }

    #[rstest]
    #[case(1.0, 1.0, 1.0)]
    #[case(0.9375, 0.9375, 1.5)]
    #[case(0.1, 0.2, 0.3)]
    #[case(3.3, 1.7, 2.9)]
    fn test_volume_is_count_times_spacing(#[case] x: f64, #[case] y: f64, #[case] z: f64) {
        let mut rng = StdRng::seed_from_u64(7);
        let data = Array3::from_shape_fn((6, 5, 4), |_| rng.gen_bool(0.3));
        let spacing = Spacing::new(x, y, z).unwrap();
        let mask = Mask::new(data, spacing);

        let stats = compute(&mask, None).unwrap();
        assert_eq!(stats.volume_mm3, stats.count as f64 * (x * y * z));
    }

    #[test]
    fn test_matches_two_pass() {
        let mut rng = StdRng::seed_from_u64(11);
        let mask = Mask::new(
            Array3::from_shape_fn((10, 10, 10), |_| rng.gen_bool(0.5)),
            unit_spacing(),
        );
        let volume = Volume::new(
            Array3::from_shape_fn((10, 10, 10), |_| rng.gen_range(-500.0..1500.0)),
            unit_spacing(),
        );

        let values = mask
            .data()
            .iter()
            .zip(volume.data().iter())
            .filter(|(&selected, _)| selected)
            .map(|(_, &v)| v)
            .collect::<Vec<_>>();
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let std = (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();

        let intensity = compute(&mask, Some(&volume)).unwrap().intensity.unwrap();
        assert!((intensity.mean - mean).abs() < 1e-6);
        assert!((intensity.stdev - std).abs() < 1e-6);
    }
}
