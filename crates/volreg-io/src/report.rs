//! Motion-parameter reporting: text tables and trajectory plots.
//!
//! The text table holds the raw estimates (voxels and radians), one row per
//! volume and six whitespace-separated columns in scientific notation. Plots
//! take a [`DisplayTrajectory`], i.e. millimetres and degrees.

use anyhow::{anyhow, bail, Context, Result};
use plotters::prelude::*;
use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};
use tracing::info;
use volreg_core::RigidParams;
use volreg_registration::{DisplayTrajectory, ParameterTrajectory};

const AXIS_LABELS: [&str; 3] = ["x", "y", "z"];
const AXIS_COLORS: [RGBColor; 3] = [BLUE, GREEN, RED];

/// File name without `.nii` / `.nii.gz`.
pub fn series_stem(input: &Path) -> Option<&str> {
    let name = input.file_name()?.to_str()?;
    let stem = name
        .strip_suffix(".nii.gz")
        .or_else(|| name.strip_suffix(".nii"))
        .unwrap_or(name);
    Some(stem)
}

/// `<input dir>/rp_<stem>.txt`.
pub fn default_params_path(input: &Path) -> Result<PathBuf> {
    let stem = series_stem(input)
        .ok_or_else(|| anyhow!("Input path {} has no file name", input.display()))?;
    Ok(input.with_file_name(format!("rp_{stem}.txt")))
}

/// Format the raw trajectory as text.
pub fn format_parameter_table(trajectory: &ParameterTrajectory) -> String {
    trajectory
        .iter()
        .map(|row| {
            let mut line = row
                .as_array()
                .iter()
                .map(|v| format!("{v:.18e}"))
                .collect::<Vec<_>>()
                .join(" ");
            line.push('\n');
            line
        })
        .collect()
}

/// Parse a table written by [`format_parameter_table`].
///
/// Blank lines and lines starting with `#` are skipped.
pub fn parse_parameter_table(text: &str) -> Result<ParameterTrajectory> {
    text.lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .map(|(lineno, line)| {
            let values = line
                .split_whitespace()
                .map(|tok| {
                    tok.parse::<f64>()
                        .with_context(|| format!("line {lineno}: invalid number '{tok}'"))
                })
                .collect::<Result<Vec<_>>>()?;
            if values.len() != RigidParams::LEN {
                bail!(
                    "line {lineno}: expected {} columns, found {}",
                    RigidParams::LEN,
                    values.len()
                );
            }
            Ok(RigidParams::from_slice(&values)?)
        })
        .collect()
}

/// Write the raw trajectory to `path`.
pub fn write_parameter_table<P: AsRef<Path>>(
    path: P,
    trajectory: &ParameterTrajectory,
) -> Result<()> {
    let path = path.as_ref();
    fs::write(path, format_parameter_table(trajectory))
        .with_context(|| format!("Failed to write parameter table {}", path.display()))?;
    info!(path = %path.display(), rows = trajectory.len(), "Saved motion parameters");
    Ok(())
}

/// Read a raw trajectory from `path`.
pub fn read_parameter_table<P: AsRef<Path>>(path: P) -> Result<ParameterTrajectory> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read parameter table {}", path.display()))?;
    parse_parameter_table(&text)
        .with_context(|| format!("Malformed parameter table {}", path.display()))
}

fn draw_err<E: std::fmt::Display>(err: E) -> anyhow::Error {
    anyhow!("plotting failed: {err}")
}

/// Finite value range of a set of series, padded so flat lines stay visible.
fn value_range(series: &[Vec<f64>]) -> Range<f64> {
    let (lo, hi) = series
        .iter()
        .flatten()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if lo > hi {
        return -1.0..1.0;
    }
    let pad = ((hi - lo) * 0.1).max(0.1);
    (lo - pad)..(hi + pad)
}

/// Consecutive runs of finite points; a NaN row breaks the line.
fn finite_segments(values: &[f64]) -> Vec<Vec<(f64, f64)>> {
    let mut segments = vec![Vec::new()];
    for (i, &v) in values.iter().enumerate() {
        if v.is_finite() {
            if let Some(last) = segments.last_mut() {
                last.push((i as f64, v));
            }
        } else if segments.last().is_some_and(|s| !s.is_empty()) {
            segments.push(Vec::new());
        }
    }
    segments.retain(|s| !s.is_empty());
    segments
}

fn draw_panel<DB: DrawingBackend>(
    area: &DrawingArea<DB, plotters::coord::Shift>,
    caption: &str,
    unit: &str,
    series: &[Vec<f64>; 3],
    volumes: usize,
) -> Result<()> {
    let x_max = volumes.saturating_sub(1).max(1) as f64;
    let mut chart = ChartBuilder::on(area)
        .caption(caption, ("sans-serif", 20))
        .margin(10)
        .x_label_area_size(35)
        .y_label_area_size(60)
        .build_cartesian_2d(0.0..x_max, value_range(series))
        .map_err(draw_err)?;

    chart
        .configure_mesh()
        .x_desc("volume")
        .y_desc(unit)
        .draw()
        .map_err(draw_err)?;

    for ((values, label), color) in series.iter().zip(AXIS_LABELS).zip(AXIS_COLORS) {
        for (k, segment) in finite_segments(values).into_iter().enumerate() {
            let drawn = chart
                .draw_series(LineSeries::new(segment, color.stroke_width(2)))
                .map_err(draw_err)?;
            if k == 0 {
                drawn
                    .label(label)
                    .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
            }
        }
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(draw_err)?;
    Ok(())
}

/// Render translations (mm) and rotations (degrees) as a two-panel PNG.
pub fn render_trajectory_plot<P: AsRef<Path>>(
    path: P,
    trajectory: &DisplayTrajectory,
    title: &str,
) -> Result<()> {
    let path = path.as_ref();
    let root = BitMapBackend::new(path, (1000, 700)).into_drawing_area();
    root.fill(&WHITE).map_err(draw_err)?;
    let root = root.titled(title, ("sans-serif", 24)).map_err(draw_err)?;
    let panels = root.split_evenly((2, 1));

    draw_panel(
        &panels[0],
        "Translation",
        "mm",
        &trajectory.translations_mm(),
        trajectory.len(),
    )?;
    draw_panel(
        &panels[1],
        "Rotation",
        "degrees",
        &trajectory.rotations_deg(),
        trajectory.len(),
    )?;

    root.present()
        .map_err(draw_err)
        .with_context(|| format!("Failed to write plot {}", path.display()))?;
    info!(path = %path.display(), "Saved motion plot");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use volreg_core::Spacing;

    fn trajectory() -> ParameterTrajectory {
        ParameterTrajectory::from_rows(vec![
            RigidParams::zeros(),
            RigidParams::new([0.25, -1.5, 3.0e-4, 0.01, -0.002, 1.0e-7]),
            RigidParams::nan(),
        ])
    }

    #[test]
    fn test_paths() {
        let input = Path::new("/data/bold.nii.gz");
        assert_eq!(series_stem(input), Some("bold"));
        assert_eq!(
            default_params_path(input).unwrap(),
            PathBuf::from("/data/rp_bold.txt")
        );
        assert_eq!(series_stem(Path::new("run1.nii")), Some("run1"));
    }

    #[test]
    fn test_format_is_scientific() {
        let text = format_parameter_table(&trajectory());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1].split_whitespace().count(), 6);
        assert!(lines[1].split_whitespace().all(|tok| tok.contains('e')));
        assert!(text.ends_with('\n'));
        assert_eq!(format_parameter_table(&ParameterTrajectory::from_rows(Vec::new())), "");
    }

    #[test]
    fn test_table_roundtrip() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("rp_bold.txt");
        let raw = trajectory();
        write_parameter_table(&path, &raw)?;
        let back = read_parameter_table(&path)?;

        assert_eq!(back.len(), 3);
        for (a, b) in back.iter().zip(raw.iter()).take(2) {
            assert!(a.max_abs_diff(b) < 1e-12);
        }
        assert!(back.row(2).map_or(false, |p| p.is_nan()));
        Ok(())
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_parameter_table("1 2 3\n").is_err());
        assert!(parse_parameter_table("1 2 3 4 5 x\n").is_err());
        let parsed = parse_parameter_table("# header\n\n0 0 0 0 0 0\n").unwrap();
        assert_eq!(parsed.len(), 1);
    }

    #[test]
    fn test_finite_segments() {
        let segments = finite_segments(&[1.0, 2.0, f64::NAN, 3.0, f64::NAN]);
        assert_eq!(segments, vec![vec![(0.0, 1.0), (1.0, 2.0)], vec![(3.0, 3.0)]]);
        assert_eq!(value_range(&[vec![f64::NAN]]), -1.0..1.0);
    }

    #[test]
    #[ignore = "requires system fonts"]
    fn test_render_plot() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("motion.png");
        let display = trajectory().to_display_units(&Spacing::uniform(3.0));
        render_trajectory_plot(&path, &display, "bold")?;
        assert!(path.exists());
        Ok(())
    }
}
