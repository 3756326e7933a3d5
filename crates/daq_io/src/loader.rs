use crate::parser::parse_table;
use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

/// Loads a waveform table from disk.
pub fn load_table<P: AsRef<Path>>(path: P) -> Result<Vec<u32>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to open waveform table {}", path.display()))?;
    parse_table(&text).with_context(|| format!("Invalid waveform table {}", path.display()))
}

/// Writes `samples` as a waveform table with a one-line comment header.
pub fn write_table<P: AsRef<Path>>(path: P, header: &str, samples: &[u32]) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)
        .with_context(|| format!("Failed to create waveform table {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    for line in header.lines() {
        writeln!(writer, "# {line}")?;
    }
    for sample in samples {
        writeln!(writer, "{sample}")?;
    }
    writer.flush()?;
    Ok(())
}
