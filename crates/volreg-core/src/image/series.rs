//! Ordered series of volumes sharing one affine.

use ndarray::{Array3, Array4, Axis, Zip};

use super::Volume;
use crate::error::{ImageError, Result};
use crate::spatial::Affine;

/// A functional run: `N >= 1` volumes of identical shape plus their common
/// voxel-to-world affine.
///
/// The series is immutable once built; derived series (smoothed, trimmed,
/// realigned) are new values.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeSeries {
    volumes: Vec<Volume>,
    affine: Affine,
}

impl VolumeSeries {
    /// Create a series, rejecting empty input and mismatched shapes.
    pub fn new(volumes: Vec<Volume>, affine: Affine) -> Result<Self> {
        let first = volumes.first().ok_or(ImageError::EmptySeries)?;
        let expected = first.shape();
        if let Some(bad) = volumes.iter().find(|v| v.shape() != expected) {
            return Err(ImageError::ShapeMismatch {
                expected,
                actual: bad.shape(),
            });
        }
        Ok(Self { volumes, affine })
    }

    /// Build from a 4D array indexed `[x, y, z, t]`.
    pub fn from_array4(data: &Array4<f32>, affine: Affine) -> Result<Self> {
        let volumes = data
            .axis_iter(Axis(3))
            .map(|view| Volume::new(view.to_owned()))
            .collect();
        Self::new(volumes, affine)
    }

    /// Stack into a 4D array indexed `[x, y, z, t]`.
    pub fn to_array4(&self) -> Array4<f32> {
        let [nx, ny, nz] = self.shape();
        let mut out = Array4::zeros((nx, ny, nz, self.len()));
        for (t, volume) in self.volumes.iter().enumerate() {
            out.index_axis_mut(Axis(3), t).assign(volume.data());
        }
        out
    }

    /// Number of volumes.
    pub fn len(&self) -> usize {
        self.volumes.len()
    }

    /// Always false for a constructed series; present for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.volumes.is_empty()
    }

    /// Shape shared by every volume.
    pub fn shape(&self) -> [usize; 3] {
        self.volumes[0].shape()
    }

    /// The shared voxel-to-world affine.
    pub fn affine(&self) -> &Affine {
        &self.affine
    }

    /// Volume at `index`.
    pub fn volume(&self, index: usize) -> Result<&Volume> {
        self.volumes.get(index).ok_or(ImageError::IndexOutOfRange {
            index,
            len: self.volumes.len(),
        })
    }

    /// All volumes in acquisition order.
    pub fn volumes(&self) -> &[Volume] {
        &self.volumes
    }

    /// Iterate over volumes in acquisition order.
    pub fn iter(&self) -> std::slice::Iter<'_, Volume> {
        self.volumes.iter()
    }

    /// Consume the series and return its volumes.
    pub fn into_volumes(self) -> Vec<Volume> {
        self.volumes
    }

    /// New series without the first `count` volumes.
    ///
    /// Dropping every volume is an error rather than an empty series.
    pub fn drop_leading(&self, count: usize) -> Result<Self> {
        if count == 0 {
            return Ok(self.clone());
        }
        if count >= self.len() {
            return Err(ImageError::invalid_parameter(format!(
                "cannot drop {} leading volumes from a series of {}",
                count,
                self.len()
            )));
        }
        Self::new(self.volumes[count..].to_vec(), self.affine)
    }

    /// Voxel-wise mean over all volumes.
    ///
    /// NaN samples (volumes that could not be realigned) are skipped; a voxel
    /// that is NaN in every volume stays NaN.
    pub fn mean_volume(&self) -> Volume {
        let [nx, ny, nz] = self.shape();
        let mut sum = Array3::<f64>::zeros((nx, ny, nz));
        let mut count = Array3::<u32>::zeros((nx, ny, nz));
        for volume in &self.volumes {
            Zip::from(&mut sum)
                .and(&mut count)
                .and(volume.data())
                .for_each(|s, c, &v| {
                    if !v.is_nan() {
                        *s += v as f64;
                        *c += 1;
                    }
                });
        }
        Volume::new(Zip::from(&sum).and(&count).map_collect(|&s, &c| {
            if c == 0 {
                f32::NAN
            } else {
                (s / c as f64) as f32
            }
        }))
    }

    /// Same geometry, new volumes.
    pub fn with_volumes(&self, volumes: Vec<Volume>) -> Result<Self> {
        let series = Self::new(volumes, self.affine)?;
        if series.shape() != self.shape() {
            return Err(ImageError::ShapeMismatch {
                expected: self.shape(),
                actual: series.shape(),
            });
        }
        Ok(series)
    }
}

impl<'a> IntoIterator for &'a VolumeSeries {
    type Item = &'a Volume;
    type IntoIter = std::slice::Iter<'a, Volume>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(n: usize) -> VolumeSeries {
        let volumes = (0..n).map(|t| Volume::filled([3, 4, 5], t as f32)).collect();
        VolumeSeries::new(volumes, Affine::identity()).unwrap()
    }

    #[test]
    fn test_empty_series_rejected() {
        let err = VolumeSeries::new(Vec::new(), Affine::identity()).unwrap_err();
        assert_eq!(err, ImageError::EmptySeries);
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let volumes = vec![Volume::zeros([3, 3, 3]), Volume::zeros([3, 3, 2])];
        let err = VolumeSeries::new(volumes, Affine::identity()).unwrap_err();
        assert!(matches!(err, ImageError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_array4_roundtrip() {
        let s = series(3);
        let array = s.to_array4();
        assert_eq!(array.dim(), (3, 4, 5, 3));
        assert_eq!(array[[1, 2, 3, 2]], 2.0);
        let back = VolumeSeries::from_array4(&array, *s.affine()).unwrap();
        assert_eq!(back, s);
    }

    #[test]
    fn test_drop_leading() {
        let s = series(5);
        let trimmed = s.drop_leading(2).unwrap();
        assert_eq!(trimmed.len(), 3);
        assert_eq!(trimmed.volume(0).unwrap().get([0, 0, 0]), Some(2.0));
        assert_eq!(s.drop_leading(0).unwrap(), s);
        assert!(s.drop_leading(5).is_err());
    }

    #[test]
    fn test_mean_volume_skips_nan() {
        let volumes = vec![
            Volume::filled([2, 2, 2], 1.0),
            Volume::filled([2, 2, 2], f32::NAN),
            Volume::filled([2, 2, 2], 3.0),
        ];
        let s = VolumeSeries::new(volumes, Affine::identity()).unwrap();
        let mean = s.mean_volume();
        assert_eq!(mean.get([1, 1, 1]), Some(2.0));

        let all_nan =
            VolumeSeries::new(vec![Volume::filled([1, 1, 1], f32::NAN)], Affine::identity())
                .unwrap();
        assert!(all_nan.mean_volume().has_nan());
    }

    #[test]
    fn test_volume_index_out_of_range() {
        let s = series(2);
        assert_eq!(
            s.volume(2).unwrap_err(),
            ImageError::IndexOutOfRange { index: 2, len: 2 }
        );
    }
}
