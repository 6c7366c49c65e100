//! BioSample melting - flatten record XML into one table row per record
//!
//! `BioSampleMelter` walks one document into a `FlatMapping`, delegating the
//! irregular `<Owner>` sub-tree to `FieldFlattener`. `aggregate` then lines
//! the mappings of many records up into a rectangular `Table`.

pub mod types;
pub mod flatten;
pub mod owner;
pub mod extractor;
pub mod aggregate;
pub mod writer;

pub use types::{FlatMapping, MeltConfig, Record, RecordKey, RecordSet};
pub use flatten::FieldFlattener;
pub use extractor::{BioSampleMelter, RecordExtractor, XmlEvent};
pub use aggregate::{aggregate, Table};
pub use writer::{CsvTableWriter, JsonLinesWriter};
