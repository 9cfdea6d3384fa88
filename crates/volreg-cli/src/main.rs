use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use volreg_core::{Interpolation, Spacing};
use volreg_io::{
    default_params_path, read_nifti_series, read_parameter_table, render_trajectory_plot,
    write_parameter_table, SeriesAssembler,
};
use volreg_registration::{
    ConsoleProgressCallback, FailurePolicy, ProgressTracker, RealignConfig, RealignOptions,
    Realigner, WarmStart,
};

mod progress;

use progress::ProgressBarCallback;

/// Voxel size used when a saved table is plotted without its image.
const DEFAULT_PLOT_VOXEL_MM: f64 = 3.0;

#[derive(Parser)]
#[command(name = "volreg")]
#[command(about = "Rigid-body motion realignment for fMRI series")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Realign every volume of a 4D NIfTI series to a reference volume
    Realign(RealignArgs),

    /// Plot a saved motion-parameter table
    Plot {
        /// Parameter table written by `realign`
        params: PathBuf,

        /// Output PNG
        output: PathBuf,

        /// Voxel size (mm) used to convert translations
        #[arg(long, default_value_t = DEFAULT_PLOT_VOXEL_MM)]
        voxel_size_mm: f64,

        /// Plot title (defaults to the table's file name)
        #[arg(long)]
        title: Option<String>,
    },
}

#[derive(Args, Debug)]
struct RealignArgs {
    /// 4D NIfTI series (.nii or .nii.gz)
    input: PathBuf,

    /// Reference volume (first, middle)
    #[arg(long)]
    reference: Option<String>,

    /// Gaussian FWHM (mm) of the estimation copy; 0 disables smoothing
    #[arg(long)]
    fwhm: Option<f64>,

    /// Prefix of the output file names
    #[arg(long)]
    prefix: Option<String>,

    /// Leading volumes to discard before realignment
    #[arg(long)]
    drop: Option<usize>,

    /// What to do when a volume cannot be realigned
    #[arg(long, value_enum)]
    policy: Option<PolicyArg>,

    /// Initial guess for each volume
    #[arg(long, value_enum)]
    warm_start: Option<WarmStartArg>,

    /// Pass the reference volume through without estimation
    #[arg(long)]
    fast_reference: bool,

    /// Resampling interpolation
    #[arg(long, value_enum)]
    interpolation: Option<InterpolationArg>,

    /// Optimizer iteration cap per volume
    #[arg(long)]
    max_iterations: Option<usize>,

    /// Also write the resampled series
    #[arg(long)]
    save_realigned: bool,

    /// Also write the mean of the realigned series
    #[arg(long)]
    save_mean: bool,

    /// Parameter table path (default: <dir>/rp_<stem>.txt)
    #[arg(long)]
    params: Option<PathBuf>,

    /// Write a motion plot to this PNG
    #[arg(long)]
    plot: Option<PathBuf>,

    /// Uniform voxel size (mm) for the plot; defaults to the image affine
    #[arg(long)]
    voxel_size_mm: Option<f64>,

    /// JSON options file; command-line flags take precedence
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log progress lines instead of drawing a progress bar
    #[arg(long)]
    no_progress: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PolicyArg {
    FailFast,
    BestEffort,
}

impl From<PolicyArg> for FailurePolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::FailFast => FailurePolicy::FailFast,
            PolicyArg::BestEffort => FailurePolicy::BestEffort,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum WarmStartArg {
    NegatePrevious,
    Zero,
}

impl From<WarmStartArg> for WarmStart {
    fn from(arg: WarmStartArg) -> Self {
        match arg {
            WarmStartArg::NegatePrevious => WarmStart::NegatePrevious,
            WarmStartArg::Zero => WarmStart::Zero,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum InterpolationArg {
    Linear,
    Nearest,
}

impl From<InterpolationArg> for Interpolation {
    fn from(arg: InterpolationArg) -> Self {
        match arg {
            InterpolationArg::Linear => Interpolation::Linear,
            InterpolationArg::Nearest => Interpolation::Nearest,
        }
    }
}

impl RealignArgs {
    /// Flags that were given, as an overlay on the file configuration.
    fn options(&self) -> RealignOptions {
        RealignOptions {
            reference_mode: self.reference.clone(),
            smoothing_fwhm_mm: self.fwhm,
            output_prefix: self.prefix.clone(),
            drop_leading_volumes: self.drop,
            failure_policy: self.policy.map(Into::into),
            warm_start: self.warm_start.map(Into::into),
            reference_fast_path: self.fast_reference.then_some(true),
            interpolation: self.interpolation.map(Into::into),
            max_iterations: self.max_iterations,
            ..Default::default()
        }
    }

    /// Defaults, then the JSON file, then the flags.
    fn config(&self) -> Result<RealignConfig> {
        let base = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config {}", path.display()))?;
                RealignOptions::from_json(&text)
                    .and_then(RealignOptions::into_config)
                    .with_context(|| format!("Invalid config {}", path.display()))?
            }
            None => RealignConfig::default(),
        };
        Ok(self.options().apply_to(base)?)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Realign(args) => realign(&args)?,
        Commands::Plot {
            params,
            output,
            voxel_size_mm,
            title,
        } => plot(&params, &output, voxel_size_mm, title.as_deref())?,
    }

    Ok(())
}

fn realign(args: &RealignArgs) -> Result<()> {
    let config = args.config()?;
    info!("Loading series: {}", args.input.display());
    let series = read_nifti_series(&args.input)?;
    info!(
        "Loaded {} volumes of shape {:?}",
        series.len(),
        series.shape()
    );

    let prefix = config.output_prefix.clone();
    let bar = (!args.no_progress).then(|| Arc::new(ProgressBarCallback::new()));
    let tracker = match &bar {
        Some(bar) => ProgressTracker::new().with_callback(bar.clone()),
        None => ProgressTracker::new().with_callback(Arc::new(ConsoleProgressCallback::default())),
    };
    let mut realigner = Realigner::from_config(config)?.with_progress(tracker);

    let output = match realigner.run(&series) {
        Ok(output) => output,
        Err(e) => {
            if let Some(bar) = &bar {
                bar.abandon();
            }
            return Err(e).context("Realignment failed");
        }
    };
    if !output.is_complete() {
        warn!(
            "{} of {} volumes could not be realigned",
            output.failures.len(),
            output.trajectory.len()
        );
    }

    let assembler = SeriesAssembler::new(&args.input, prefix);
    let kept = series.drop_leading(output.dropped_volumes)?;
    assembler.persist_original(&kept)?;
    if args.save_realigned {
        assembler.persist_realigned(&output)?;
    }
    if args.save_mean {
        assembler.persist_mean(&output)?;
    }

    let params_path = match &args.params {
        Some(path) => path.clone(),
        None => default_params_path(&args.input)?,
    };
    write_parameter_table(&params_path, &output.trajectory)?;

    let voxel_size = args
        .voxel_size_mm
        .map(Spacing::uniform)
        .unwrap_or_else(|| output.affine.spacing());
    let display = output.trajectory.to_display_units(&voxel_size);
    let (max_mm, max_deg) = display.max_abs();
    info!(
        "Largest displacement: {:.3} mm, largest rotation: {:.3} deg",
        max_mm, max_deg
    );

    if let Some(plot_path) = &args.plot {
        let title = volreg_io::report::series_stem(&args.input).unwrap_or("motion");
        render_trajectory_plot(plot_path, &display, title)?;
    }

    Ok(())
}

fn plot(params: &Path, output: &Path, voxel_size_mm: f64, title: Option<&str>) -> Result<()> {
    let trajectory = read_parameter_table(params)?;
    let display = trajectory.to_display_units(&Spacing::uniform(voxel_size_mm));
    let default_title = params
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("motion");
    render_trajectory_plot(output, &display, title.unwrap_or(default_title))
}
