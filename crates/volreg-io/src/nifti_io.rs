use anyhow::{bail, Context, Result};
use ndarray::{Array3, Ix4};
use nifti::writer::WriterOptions;
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, ReaderOptions};
use std::path::Path;
use tracing::debug;
use volreg_core::{Affine, Volume, VolumeSeries};

/// NIfTI `xyzt_units`: millimetres and seconds.
const UNITS_MM_SEC: u8 = 2 | 8;
/// NIfTI `sform_code` for scanner-anatomical coordinates.
const SFORM_SCANNER: i16 = 1;

/// Voxel-to-world affine from a NIfTI header.
///
/// Uses the sform when present, then the qform, then plain `pixdim` scaling.
pub fn header_affine(header: &NiftiHeader) -> Affine {
    let rows = if header.sform_code > 0 {
        [header.srow_x, header.srow_y, header.srow_z].map(|r| r.map(f64::from))
    } else if header.qform_code > 0 {
        qform_rows(header)
    } else {
        let p = header.pixdim.map(f64::from);
        [
            [p[1], 0.0, 0.0, 0.0],
            [0.0, p[2], 0.0, 0.0],
            [0.0, 0.0, p[3], 0.0],
        ]
    };
    Affine::from_rows(rows)
}

fn qform_rows(header: &NiftiHeader) -> [[f64; 4]; 3] {
    let b = f64::from(header.quatern_b);
    let c = f64::from(header.quatern_c);
    let d = f64::from(header.quatern_d);
    let a = (1.0 - (b * b + c * c + d * d).min(1.0)).sqrt();

    let qfac = if header.pixdim[0] < 0.0 { -1.0 } else { 1.0 };
    let dx = f64::from(header.pixdim[1]);
    let dy = f64::from(header.pixdim[2]);
    let dz = f64::from(header.pixdim[3]) * qfac;

    let r = [
        [a * a + b * b - c * c - d * d, 2.0 * (b * c - a * d), 2.0 * (b * d + a * c)],
        [2.0 * (b * c + a * d), a * a + c * c - b * b - d * d, 2.0 * (c * d - a * b)],
        [2.0 * (b * d - a * c), 2.0 * (c * d + a * b), a * a + d * d - c * c - b * b],
    ];
    let offset = [header.quatern_x, header.quatern_y, header.quatern_z].map(f64::from);

    [0, 1, 2].map(|i| [r[i][0] * dx, r[i][1] * dy, r[i][2] * dz, offset[i]])
}

/// Header describing `affine` for writing.
fn output_header(affine: &Affine) -> NiftiHeader {
    let rows = affine.rows().map(|r| r.map(|v| v as f32));
    let spacing = affine.spacing();
    let mut pixdim = [1.0f32; 8];
    for axis in 0..3 {
        pixdim[axis + 1] = spacing[axis] as f32;
    }
    NiftiHeader {
        pixdim,
        sform_code: SFORM_SCANNER,
        srow_x: rows[0],
        srow_y: rows[1],
        srow_z: rows[2],
        xyzt_units: UNITS_MM_SEC,
        ..NiftiHeader::default()
    }
}

/// Read a 4D NIfTI file (`.nii` or `.nii.gz`) as a volume series.
///
/// Fails if the file is missing, corrupt, not four-dimensional, or carries an
/// affine whose linear part cannot be inverted.
pub fn read_nifti_series<P: AsRef<Path>>(path: P) -> Result<VolumeSeries> {
    let path = path.as_ref();
    let obj = ReaderOptions::new()
        .read_file(path)
        .with_context(|| format!("Failed to read NIfTI file {}", path.display()))?;
    let affine = header_affine(obj.header());
    affine
        .validate()
        .with_context(|| format!("Unusable affine in {}", path.display()))?;

    let data = obj
        .into_volume()
        .into_ndarray::<f32>()
        .context("Failed to convert volume to ndarray")?;
    if data.ndim() != 4 {
        bail!(
            "Expected 4D NIfTI file, found {} dimensions in {}",
            data.ndim(),
            path.display()
        );
    }
    let data = data.into_dimensionality::<Ix4>()?;
    debug!(path = %path.display(), shape = ?data.shape(), "Read NIfTI series");

    VolumeSeries::from_array4(&data, affine)
        .with_context(|| format!("Invalid series in {}", path.display()))
}

/// Write a series as a 4D NIfTI file; compression follows the extension.
pub fn write_nifti_series<P: AsRef<Path>>(path: P, series: &VolumeSeries) -> Result<()> {
    let path = path.as_ref();
    let header = output_header(series.affine());
    WriterOptions::new(path)
        .reference_header(&header)
        .write_nifti(&series.to_array4())
        .with_context(|| format!("Failed to write NIfTI file {}", path.display()))?;
    debug!(path = %path.display(), volumes = series.len(), "Wrote NIfTI series");
    Ok(())
}

/// Write a single volume as a 3D NIfTI file.
pub fn write_nifti_volume<P: AsRef<Path>>(path: P, volume: &Volume, affine: &Affine) -> Result<()> {
    let path = path.as_ref();
    let header = output_header(affine);
    let data: &Array3<f32> = volume.data();
    WriterOptions::new(path)
        .reference_header(&header)
        .write_nifti(data)
        .with_context(|| format!("Failed to write NIfTI file {}", path.display()))?;
    Ok(())
}
