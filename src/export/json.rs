use super::ExportError;
use std::io::Write;
use std::path::Path;

/// Write any serializable value as pretty JSON followed by a newline
pub fn write_json<T, W>(data: &T, mut writer: W) -> Result<(), ExportError>
where
    T: serde::Serialize,
    W: Write,
{
    serde_json::to_writer_pretty(&mut writer, data)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

/// Export any serializable data structure to a JSON file
pub fn export_json<T, P>(data: &T, output_path: P) -> Result<(), ExportError>
where
    T: serde::Serialize,
    P: AsRef<Path>,
{
    let file = std::fs::File::create(output_path)?;
    write_json(data, std::io::BufWriter::new(file))
}
