use super::ExportError;
use std::io::Write;
use std::path::Path;

use crate::models::{Curve, StepTest};

/// Write the sampled curve as `x,y` rows (suitable for plotting)
pub fn write_curve_csv<W: Write>(curve: &Curve, writer: W) -> Result<(), ExportError> {
    let mut csv_writer = ::csv::Writer::from_writer(writer);
    csv_writer.write_record(["x", "y"])?;
    for point in curve.samples() {
        csv_writer.serialize((point.x, point.y))?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Export the sampled curve to a CSV file
pub fn export_curve_csv<P: AsRef<Path>>(curve: &Curve, output_path: P) -> Result<(), ExportError> {
    let file = std::fs::File::create(output_path)?;
    write_curve_csv(curve, file)
}

/// Export measured samples in the same layout the CSV importer reads
pub fn export_step_test_csv<P: AsRef<Path>>(
    test: &StepTest,
    output_path: P,
) -> Result<(), ExportError> {
    let mut csv_writer = ::csv::Writer::from_path(output_path)?;
    for sample in test.samples() {
        csv_writer.serialize(sample)?;
    }
    csv_writer.flush()?;
    Ok(())
}
