use crate::melt::aggregate::Table;
use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Writes a table as comma-delimited UTF-8 CSV, header row first
pub struct CsvTableWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl CsvTableWriter<File> {
    /// Create a writer that truncates or creates the file at `path`
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path)
            .with_context(|| format!("Failed to create output file: {}", path.display()))?;
        Ok(CsvTableWriter::new(file))
    }
}

impl<W: Write> CsvTableWriter<W> {
    pub fn new(writer: W) -> Self {
        CsvTableWriter {
            writer: csv::Writer::from_writer(writer),
        }
    }

    pub fn write_table(&mut self, table: &Table) -> Result<()> {
        self.writer
            .write_record(&table.headers)
            .context("Failed to write header row")?;
        for row in &table.rows {
            self.writer
                .write_record(row)
                .context("Failed to write row")?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush().context("Failed to flush writer")
    }
}

/// Writes one JSON object per table row, keyed by the headers
pub struct JsonLinesWriter<W: Write> {
    writer: W,
}

impl JsonLinesWriter<File> {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path)
            .with_context(|| format!("Failed to create output file: {}", path.display()))?;
        Ok(JsonLinesWriter::new(file))
    }
}

impl<W: Write> JsonLinesWriter<W> {
    pub fn new(writer: W) -> Self {
        JsonLinesWriter { writer }
    }

    pub fn write_table(&mut self, table: &Table) -> Result<()> {
        for row in &table.rows {
            let object: Map<String, Value> = table
                .headers
                .iter()
                .zip(row)
                .map(|(header, cell)| (header.clone(), Value::String(cell.clone())))
                .collect();

            let json = serde_json::to_string(&object)
                .context("Failed to serialize row")?;
            writeln!(self.writer, "{}", json)
                .context("Failed to write row")?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush().context("Failed to flush writer")
    }
}
