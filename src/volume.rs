use ndarray::Array3;

use crate::errors::ShapeMismatchError;

/// Voxel grid dimensions along the three image axes.
pub type Shape = (usize, usize, usize);

/// Physical size of one voxel along each axis, usually in millimeters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spacing {
    x: f64,
    y: f64,
    z: f64,
}

impl Spacing {
    /// Builds a spacing triple, rejecting components that are not finite and strictly positive.
    pub fn new(x: f64, y: f64, z: f64) -> Option<Self> {
        let valid = |v: f64| v.is_finite() && v > 0.0;
        if valid(x) && valid(y) && valid(z) {
            Some(Spacing { x, y, z })
        } else {
            None
        }
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }

    pub fn z(&self) -> f64 {
        self.z
    }

    /// Physical volume of a single voxel
    pub fn voxel_volume(&self) -> f64 {
        self.x * self.y * self.z
    }
}

/// An intensity volume as read from disk. The array is never mutated after load.
#[derive(Debug, Clone)]
pub struct Volume {
    data: Array3<f64>,
    spacing: Spacing,
}

impl Volume {
    pub fn new(data: Array3<f64>, spacing: Spacing) -> Self {
        Self { data, spacing }
    }

    pub fn data(&self) -> &Array3<f64> {
        &self.data
    }

    pub fn spacing(&self) -> Spacing {
        self.spacing
    }

    pub fn shape(&self) -> Shape {
        self.data.dim()
    }

    /// Fail unless this volume lies on a grid of the expected shape.
    pub fn ensure_shape(&self, expected: Shape) -> Result<(), ShapeMismatchError> {
        ensure_shape(expected, self.shape())
    }
}

/// Integer label codes over a voxel grid. Zero is background.
#[derive(Debug, Clone)]
pub struct LabelMap {
    data: Array3<i64>,
    spacing: Spacing,
}

impl LabelMap {
    pub fn new(data: Array3<i64>, spacing: Spacing) -> Self {
        Self { data, spacing }
    }

    pub fn data(&self) -> &Array3<i64> {
        &self.data
    }

    pub fn spacing(&self) -> Spacing {
        self.spacing
    }

    pub fn shape(&self) -> Shape {
        self.data.dim()
    }

    /// Selects the voxels carrying `label`.
    pub fn mask(&self, label: i64) -> Mask {
        Mask::new(self.data.mapv(|v| v == label), self.spacing)
    }
}

/// A boolean region over a voxel grid, with the spacing of the grid it was drawn from.
#[derive(Debug, Clone)]
pub struct Mask {
    data: Array3<bool>,
    spacing: Spacing,
}

impl Mask {
    pub fn new(data: Array3<bool>, spacing: Spacing) -> Self {
        Self { data, spacing }
    }

    pub fn data(&self) -> &Array3<bool> {
        &self.data
    }

    pub fn spacing(&self) -> Spacing {
        self.spacing
    }

    pub fn shape(&self) -> Shape {
        self.data.dim()
    }

    /// Number of selected voxels
    pub fn count(&self) -> usize {
        self.data.iter().filter(|&&selected| selected).count()
    }

    /// Physical volume of the selected voxels: `count * (x * y * z)`
    pub fn volume_mm3(&self) -> f64 {
        self.count() as f64 * self.spacing.voxel_volume()
    }
}

pub(crate) fn ensure_shape(expected: Shape, found: Shape) -> Result<(), ShapeMismatchError> {
    if expected == found {
        Ok(())
    } else {
        Err(ShapeMismatchError { expected, found })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(1.0, 1.0, 1.0, true)]
    #[case(0.5, 0.9375, 3.0, true)]
    #[case(0.0, 1.0, 1.0, false)]
    #[case(1.0, -1.0, 1.0, false)]
    #[case(1.0, 1.0, f64::NAN, false)]
    #[case(f64::INFINITY, 1.0, 1.0, false)]
    fn test_spacing_validation(#[case] x: f64, #[case] y: f64, #[case] z: f64, #[case] ok: bool) {
        let spacing = Spacing::new(x, y, z);
        assert_eq!(spacing.is_some(), ok);
        if let Some(spacing) = spacing {
            assert_eq!((spacing.x(), spacing.y(), spacing.z()), (x, y, z));
            assert_eq!(spacing.voxel_volume(), x * y * z);
        }
    }

    #[test]
    fn test_mask_count_and_volume() {
        let spacing = Spacing::new(0.5, 2.0, 3.0).unwrap();
        let mut data = Array3::<i64>::zeros((3, 4, 5));
        data[[0, 0, 0]] = 2;
        data[[1, 2, 3]] = 2;
        data[[2, 3, 4]] = 7;
        let labels = LabelMap::new(data, spacing);

        let mask = labels.mask(2);
        assert_eq!(mask.shape(), (3, 4, 5));
        assert_eq!(mask.count(), 2);
        assert_eq!(mask.volume_mm3(), 2.0 * (0.5 * 2.0 * 3.0));

        let empty = labels.mask(5);
        assert_eq!(empty.count(), 0);
        assert_eq!(empty.volume_mm3(), 0.0);
    }

    #[test]
    fn test_ensure_shape() {
        let spacing = Spacing::new(1.0, 1.0, 1.0).unwrap();
        let volume = Volume::new(Array3::zeros((2, 3, 4)), spacing);
        assert!(volume.ensure_shape((2, 3, 4)).is_ok());
        assert_eq!(
            volume.ensure_shape((2, 3, 5)),
            Err(ShapeMismatchError {
                expected: (2, 3, 5),
                found: (2, 3, 4),
            })
        );
    }
}
