//! NIfTI series I/O, output assembly and motion-parameter reports.

pub mod nifti_io;
pub mod assemble;
pub mod report;

pub use nifti_io::{read_nifti_series, write_nifti_series, write_nifti_volume};
pub use assemble::{output_path, SeriesAssembler};
pub use report::{
    default_params_path, read_parameter_table, render_trajectory_plot, write_parameter_table,
};
