use indexmap::IndexMap;

/// Field name to value for one record, in first-written order
///
/// Writing an existing key replaces its value but keeps its position.
pub type FlatMapping = IndexMap<String, String>;

/// Externally supplied identifier of a record (a BioSample accession)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordKey(pub String);

impl RecordKey {
    pub fn new(key: impl Into<String>) -> Self {
        RecordKey(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RecordKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One successfully extracted record
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub key: RecordKey,
    pub fields: FlatMapping,
}

impl Record {
    pub fn new(key: RecordKey, fields: FlatMapping) -> Self {
        Record { key, fields }
    }
}

/// Extracted records keyed by record key, in first-seen key order
///
/// Inserting a key twice keeps the first position and the latest mapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordSet {
    records: IndexMap<RecordKey, FlatMapping>,
}

impl RecordSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: RecordKey, fields: FlatMapping) {
        self.records.insert(key, fields);
    }

    pub fn get(&self, key: &RecordKey) -> Option<&FlatMapping> {
        self.records.get(key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RecordKey, &FlatMapping)> {
        self.records.iter()
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
            .into_iter()
            .map(|(key, fields)| Record::new(key, fields))
            .collect()
    }
}

impl FromIterator<Record> for RecordSet {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        let mut set = RecordSet::new();
        for record in iter {
            set.insert(record.key, record.fields);
        }
        set
    }
}

/// Configuration for the melting process
#[derive(Debug, Clone)]
pub struct MeltConfig {
    /// Name of the leading column holding the record key
    pub key_column: String,

    /// Store the root element's `accession` attribute under `accession`
    pub include_accession: bool,

    /// Replace `&` with `and` in owner text and attribute values
    pub legacy_ampersands: bool,

    /// Joins repeated scalar siblings inside the owner sub-tree
    pub list_separator: String,
}

impl Default for MeltConfig {
    fn default() -> Self {
        MeltConfig {
            key_column: String::from("biosample_id"),
            include_accession: false,
            legacy_ampersands: false,
            list_separator: String::from("; "),
        }
    }
}
