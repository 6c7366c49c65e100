//! Batch driver: fetch and melt every record key, skipping failures

use crate::error::RecordError;
use crate::melt::{BioSampleMelter, RecordKey, RecordSet};
use crate::source::DocumentSource;
use tracing::{debug, info, warn};

/// A record that was left out of the table, and why
#[derive(Debug)]
pub struct RecordFailure {
    pub key: RecordKey,
    pub error: RecordError,
}

/// Outcome of one batch
#[derive(Debug, Default)]
pub struct Harvest {
    pub records: RecordSet,
    pub failures: Vec<RecordFailure>,
}

/// Fetch and melt `keys` in order, one record at a time
///
/// A failing record is logged and recorded in `failures`; it never stops the
/// remaining keys from being processed.
pub fn harvest<'a, I, S>(keys: I, source: &S, melter: &BioSampleMelter) -> Harvest
where
    I: IntoIterator<Item = &'a RecordKey>,
    S: DocumentSource + ?Sized,
{
    let mut outcome = Harvest::default();

    for key in keys {
        match melt_one(key, source, melter) {
            Ok(fields) => {
                debug!(%key, fields = fields.len(), "record extracted");
                outcome.records.insert(key.clone(), fields);
            }
            Err(error) => {
                warn!(%key, kind = %error.kind(), "skipping record: {}", error);
                outcome.failures.push(RecordFailure {
                    key: key.clone(),
                    error,
                });
            }
        }
    }

    info!(
        extracted = outcome.records.len(),
        skipped = outcome.failures.len(),
        "harvest finished"
    );
    outcome
}

fn melt_one<S>(
    key: &RecordKey,
    source: &S,
    melter: &BioSampleMelter,
) -> Result<crate::melt::FlatMapping, RecordError>
where
    S: DocumentSource + ?Sized,
{
    let document = source.fetch(key)?;
    melter.melt(&document)
}
