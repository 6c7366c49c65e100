//! # biosample-melt - BioSample XML to CSV
//!
//! Flattens per-record BioSample XML documents into one table: a row per
//! record, a column per metadata field seen in any record.
//!
//! ## Modules
//!
//! - **melt**: walk one document into a flat field mapping, aggregate many
//!   mappings into a table, write it as CSV or JSON lines
//! - **source**: record key files and document sources (HTTP, directory)
//! - **harvest**: the batch driver that skips and logs failing records
//!
//! ## Quick Start
//!
//! ```rust
//! use biosample_melt::melt::{aggregate, BioSampleMelter, MeltConfig, RecordKey, RecordSet};
//!
//! # fn main() -> anyhow::Result<()> {
//! let xml = br#"<BioSample access="public">
//!     <Attributes>
//!         <Attribute harmonized_name="age">45</Attribute>
//!     </Attributes>
//! </BioSample>"#;
//!
//! let config = MeltConfig::default();
//! let melter = BioSampleMelter::new(config.clone());
//! let fields = melter.melt(xml)?;
//! assert_eq!(fields["age"], "45");
//!
//! let mut records = RecordSet::new();
//! records.insert(RecordKey::new("SAMN00000001"), fields);
//! let table = aggregate(&config.key_column, records.iter());
//! assert_eq!(table.headers[0], "biosample_id");
//! # Ok(())
//! # }
//! ```

use anyhow::Result;
use std::path::Path;

pub mod error;
pub mod harvest;
pub mod melt;
pub mod source;

// Re-export commonly used types for convenience
pub use error::{FailureKind, FetchError, ParseError, RecordError};
pub use harvest::{harvest, Harvest, RecordFailure};
pub use melt::{aggregate, BioSampleMelter, CsvTableWriter, FlatMapping, MeltConfig, RecordKey, RecordSet, Table};
pub use source::{read_record_keys, DirectorySource, DocumentSource, HttpSource, HttpSourceConfig};

/// Main entry point: melt every key in `keys_path` into a CSV file
///
/// Returns the batch outcome so callers can report skipped records.
pub fn melt_to_csv<S, P, Q>(keys_path: P, source: &S, output: Q, config: MeltConfig) -> Result<Harvest>
where
    S: DocumentSource + ?Sized,
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let keys = read_record_keys(keys_path)?;
    let key_column = config.key_column.clone();
    let melter = BioSampleMelter::new(config);

    let outcome = harvest(&keys, source, &melter);
    let table = aggregate(&key_column, outcome.records.iter());

    let mut writer = CsvTableWriter::create(output)?;
    writer.write_table(&table)?;
    writer.flush()?;

    Ok(outcome)
}
