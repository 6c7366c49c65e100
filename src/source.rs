//! Record keys and the documents behind them
//!
//! Keys come from a line-delimited text file. Documents come from a
//! `DocumentSource`: the public BioSample mirror over HTTP, or a local
//! directory holding one `<key>.xml` file per record.

use crate::error::FetchError;
use crate::melt::types::RecordKey;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Placeholder replaced by the record key in URL templates
pub const KEY_PLACEHOLDER: &str = "{accession}";

pub const DEFAULT_URL_TEMPLATE: &str =
    "https://serratus-biosamples.s3.us-east-1.amazonaws.com/biosamples_split/{accession}.xml";

pub const DEFAULT_HOST_HEADER: &str = "serratus-biosamples.s3.amazonaws.com";

/// Produces the raw XML document for a record key
pub trait DocumentSource {
    fn fetch(&self, key: &RecordKey) -> Result<Vec<u8>, FetchError>;
}

/// Settings for fetching documents over HTTP
#[derive(Debug, Clone)]
pub struct HttpSourceConfig {
    /// URL with `{accession}` where the record key goes
    pub url_template: String,

    /// Value sent as the `Host` header, if any
    pub host_header: Option<String>,

    /// Overall per-request timeout
    pub timeout_secs: u64,
}

impl Default for HttpSourceConfig {
    fn default() -> Self {
        HttpSourceConfig {
            url_template: String::from(DEFAULT_URL_TEMPLATE),
            host_header: Some(String::from(DEFAULT_HOST_HEADER)),
            timeout_secs: 30,
        }
    }
}

/// Fetches one document per GET request; anything but 200 is a failure
pub struct HttpSource {
    agent: ureq::Agent,
    config: HttpSourceConfig,
}

impl HttpSource {
    pub fn new(config: HttpSourceConfig) -> Self {
        let agent_config = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_secs)))
            .build();

        HttpSource {
            agent: ureq::Agent::new_with_config(agent_config),
            config,
        }
    }

    pub fn url_for(&self, key: &RecordKey) -> String {
        self.config.url_template.replace(KEY_PLACEHOLDER, key.as_str())
    }
}

impl DocumentSource for HttpSource {
    fn fetch(&self, key: &RecordKey) -> Result<Vec<u8>, FetchError> {
        let url = self.url_for(key);
        debug!(%key, %url, "fetching document");

        let mut request = self.agent.get(&url);
        if let Some(host) = &self.config.host_header {
            request = request.header("Host", host.as_str());
        }

        let mut response = match request.call() {
            Ok(response) => response,
            Err(ureq::Error::StatusCode(status)) => {
                return Err(FetchError::Status { status, url });
            }
            Err(err) => {
                return Err(FetchError::Transport {
                    url,
                    message: err.to_string(),
                });
            }
        };

        let status = response.status().as_u16();
        if status != 200 {
            return Err(FetchError::Status { status, url });
        }

        response
            .body_mut()
            .read_to_vec()
            .map_err(|err| FetchError::Transport {
                url,
                message: err.to_string(),
            })
    }
}

/// Reads `<dir>/<key>.xml` for each record
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        DirectorySource {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, key: &RecordKey) -> PathBuf {
        self.root.join(format!("{}.xml", key.as_str()))
    }
}

impl DocumentSource for DirectorySource {
    fn fetch(&self, key: &RecordKey) -> Result<Vec<u8>, FetchError> {
        let path = self.path_for(key);
        if !path.is_file() {
            return Err(FetchError::NotFound {
                path: path.display().to_string(),
            });
        }
        Ok(std::fs::read(&path)?)
    }
}

/// Read record keys, one per line, skipping blank lines
pub fn read_record_keys<P: AsRef<Path>>(path: P) -> Result<Vec<RecordKey>> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open key file: {}", path.display()))?;
    parse_record_keys(BufReader::new(file))
}

pub fn parse_record_keys<R: BufRead>(reader: R) -> Result<Vec<RecordKey>> {
    let mut keys = Vec::new();
    for line in reader.lines() {
        let line = line.context("Failed to read line")?;
        let key = line.trim();
        if !key.is_empty() {
            keys.push(RecordKey::new(key));
        }
    }
    Ok(keys)
}
