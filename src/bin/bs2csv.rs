//! bs2csv: Flatten BioSample XML records into one CSV table
//!
//! Usage:
//!   # Fetch every accession listed in ids.txt, write biosample_metadata.csv
//!   bs2csv ids.txt
//!
//!   # Choose the output file
//!   bs2csv ids.txt -o metadata.csv
//!
//!   # Read <accession>.xml files from a local mirror instead of HTTP
//!   bs2csv ids.txt --source-dir ./biosamples_split
//!
//!   # One JSON object per record instead of CSV
//!   bs2csv ids.txt --format jsonl -o metadata.jsonl

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::Result;
use biosample_melt::melt::{aggregate, BioSampleMelter, CsvTableWriter, JsonLinesWriter, MeltConfig};
use biosample_melt::source::{
    read_record_keys, DirectorySource, DocumentSource, HttpSource, HttpSourceConfig,
    DEFAULT_HOST_HEADER, DEFAULT_URL_TEMPLATE,
};
use biosample_melt::{harvest, Table};
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Csv,
    Jsonl,
}

#[derive(Parser, Debug)]
#[command(name = "bs2csv")]
#[command(about = "Flatten BioSample XML metadata into a CSV table", long_about = None)]
struct Args {
    /// Text file with one BioSample accession per line
    #[arg(value_name = "FILE")]
    input: String,

    /// Output file
    #[arg(long, short = 'o', default_value = "biosample_metadata.csv")]
    output: String,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Csv)]
    format: OutputFormat,

    /// Read <accession>.xml from this directory instead of fetching over HTTP
    #[arg(long, value_name = "DIR")]
    source_dir: Option<String>,

    /// URL template, `{accession}` is replaced by each key
    #[arg(long, default_value = DEFAULT_URL_TEMPLATE)]
    url_template: String,

    /// Host header sent with each request (empty to omit)
    #[arg(long, default_value = DEFAULT_HOST_HEADER)]
    host_header: String,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout: u64,

    /// Name of the leading key column (default: "biosample_id")
    #[arg(long)]
    key_column: Option<String>,

    /// Also store each record's own accession attribute as a column
    #[arg(long)]
    include_accession: bool,

    /// Replace "&" with "and" in owner fields, as older exports did
    #[arg(long)]
    legacy_ampersands: bool,

    /// Log every record, not only the skipped ones
    #[arg(long, short = 'v')]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    // Build config
    let mut config = MeltConfig::default();
    if let Some(column) = args.key_column.clone() {
        config.key_column = column;
    }
    config.include_accession = args.include_accession;
    config.legacy_ampersands = args.legacy_ampersands;

    let source: Box<dyn DocumentSource> = if let Some(dir) = &args.source_dir {
        Box::new(DirectorySource::new(dir))
    } else {
        let host_header = Some(args.host_header.clone()).filter(|host| !host.is_empty());
        Box::new(HttpSource::new(HttpSourceConfig {
            url_template: args.url_template.clone(),
            host_header,
            timeout_secs: args.timeout,
        }))
    };

    let keys = read_record_keys(&args.input)?;
    let key_column = config.key_column.clone();
    let melter = BioSampleMelter::new(config);

    // Skipped records are reported by the harvest itself
    let outcome = harvest(&keys, source.as_ref(), &melter);
    let table = aggregate(&key_column, outcome.records.iter());
    write_table(&table, &args.output, args.format)?;

    eprintln!(
        "✓ Wrote {} records ({} columns) to {}, skipped {}",
        table.rows.len(),
        table.headers.len(),
        args.output,
        outcome.failures.len()
    );

    Ok(())
}

fn write_table(table: &Table, output: &str, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Csv => {
            let mut writer = CsvTableWriter::create(output)?;
            writer.write_table(table)?;
            writer.flush()
        }
        OutputFormat::Jsonl => {
            let mut writer = JsonLinesWriter::create(output)?;
            writer.write_table(table)?;
            writer.flush()
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
