use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result, bail};
use arrow::util::pretty::pretty_format_batches;
use cadastral_etl::quality::{
    CriticalColumnsReport, OutlierSummary, QualityReport, RangeValidation, check_schema_drift,
    validate_configured_ranges, validate_critical_columns,
};
use cadastral_etl::schema::{role_of, unify_batches};
use cadastral_etl::utils::logging::{create_bytes_progress_bar, create_spinner, finish_progress_bar};
use cadastral_etl::{
    CsvOptions, EtlPipeline, ParquetSink, PipelineConfig, detect_outliers, inspect,
    load_chunked, load_sample, read_parquet, validate_data_quality, write_csv,
};
use clap::{Parser, Subcommand};
use log::{info, warn};

#[global_allocator]
static ALLOC: snmalloc_rs::SnMalloc = snmalloc_rs::SnMalloc;

/// Clean, standardize and validate cadastral transaction files
#[derive(Parser, Debug)]
#[command(name = "cadastral-etl")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Pipeline configuration (JSON); built-in defaults when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Field delimiter of the input file
    #[arg(short, long, global = true, default_value_t = ',')]
    delimiter: char,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Report size, columns and estimated row count of a file
    Inspect {
        input: PathBuf,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Load the first rows of a file, optionally cleaned
    Sample {
        input: PathBuf,
        /// Number of rows to read
        #[arg(short = 'n', long)]
        rows: Option<usize>,
        /// Run the pipeline on the sample
        #[arg(long)]
        clean: bool,
        /// Write the sample as CSV instead of printing it
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Clean and standardize a whole file into Parquet, chunk by chunk
    Clean {
        input: PathBuf,
        output: PathBuf,
        /// Rows per chunk (overrides the configuration)
        #[arg(long)]
        chunk_size: Option<usize>,
        /// Process chunks on all cores
        #[arg(long)]
        parallel: bool,
    },
    /// Quality report of a cleaned Parquet file or of a cleaned CSV sample
    Report {
        input: PathBuf,
        /// Report on the raw CSV sample without cleaning it
        #[arg(long)]
        raw: bool,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Write the built-in configuration as JSON
    DefaultConfig { output: PathBuf },
}

fn delimiter_byte(delimiter: char) -> Result<u8> {
    u8::try_from(delimiter)
        .ok()
        .filter(u8::is_ascii)
        .with_context(|| format!("delimiter '{delimiter}' is not a single ASCII character"))
}

fn is_parquet(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("parquet"))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let delimiter = delimiter_byte(cli.delimiter)?;
    let config = PipelineConfig::load_or_default(cli.config.as_deref())
        .context("Failed to load pipeline configuration")?;

    match cli.command {
        Commands::Inspect { input, json } => run_inspect(&input, delimiter, &config, json),
        Commands::Sample {
            input,
            rows,
            clean,
            output,
        } => run_sample(&input, delimiter, config, rows, clean, output.as_deref()),
        Commands::Clean {
            input,
            output,
            chunk_size,
            parallel,
        } => run_clean(&input, &output, delimiter, config, chunk_size, parallel),
        Commands::Report { input, raw, json } => run_report(&input, delimiter, config, raw, json),
        Commands::DefaultConfig { output } => {
            PipelineConfig::default()
                .to_json_file(&output)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            info!("Wrote default configuration to {}", output.display());
            Ok(())
        }
    }
}

fn run_inspect(input: &Path, delimiter: u8, config: &PipelineConfig, json: bool) -> Result<()> {
    let info = inspect(input, delimiter)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("File:      {}", info.file_path.display());
    println!("Size:      {} bytes ({:.2} GB)", info.file_size_bytes, info.file_size_gb);
    println!("Rows:      ~{}", info.estimated_rows);
    println!("Columns:   {}", info.num_columns);
    for column in &info.columns {
        println!("  {column:<32} {}", role_of(config, column));
    }
    Ok(())
}

fn run_sample(
    input: &Path,
    delimiter: u8,
    config: PipelineConfig,
    rows: Option<usize>,
    clean: bool,
    output: Option<&Path>,
) -> Result<()> {
    let rows = rows.unwrap_or(config.sample_size);
    let options = CsvOptions::raw_text().with_delimiter(delimiter);
    let mut batch = load_sample(input, rows, &options)?;

    if clean {
        let pipeline = EtlPipeline::new(config)?;
        let (out, report) = pipeline.run(batch)?;
        info!("Cleaning report:\n{report}");
        batch = out;
    }

    match output {
        Some(path) => {
            write_csv(path, &[batch], delimiter)?;
        }
        None => println!("{}", pretty_format_batches(&[batch.slice(0, batch.num_rows().min(20))])?),
    }
    Ok(())
}

fn run_clean(
    input: &Path,
    output: &Path,
    delimiter: u8,
    mut config: PipelineConfig,
    chunk_size: Option<usize>,
    parallel: bool,
) -> Result<()> {
    let start = Instant::now();
    if let Some(chunk_size) = chunk_size {
        config.chunk_size = chunk_size;
    }
    let chunk_size = config.chunk_size;
    let pipeline = EtlPipeline::new(config)?;

    let total_bytes = std::fs::metadata(input)
        .with_context(|| format!("Failed to read {}", input.display()))?
        .len();
    let pb = create_bytes_progress_bar(total_bytes, Some("cleaning"));

    let options = CsvOptions::raw_text().with_delimiter(delimiter);
    let mut reader = load_chunked(input, chunk_size, &options)?;
    let chunks = std::iter::from_fn(|| {
        let next = reader.next();
        pb.set_position(reader.byte_position());
        next
    });

    let mut sink: Option<ParquetSink> = None;
    let summary = pipeline.process_chunks(chunks, parallel, |batch| {
        if sink.is_none() {
            sink = Some(ParquetSink::create(output, batch.schema())?);
        }
        if let Some(sink) = sink.as_mut() {
            sink.write(&batch)?;
        }
        Ok(())
    })?;
    finish_progress_bar(&pb, Some("done"));

    match sink {
        Some(sink) => {
            sink.close()?;
        }
        None => warn!("No rows survived cleaning; {} was not written", output.display()),
    }

    info!("Cleaning report:\n{}", summary.report);
    info!(
        "Wrote {} rows from {} chunks ({} cross-chunk duplicates removed) in {:?}",
        summary.rows_written,
        summary.chunks,
        summary.cross_chunk_duplicates,
        start.elapsed()
    );
    Ok(())
}

#[derive(Debug, serde::Serialize)]
struct FullReport {
    quality: QualityReport,
    outliers: Option<OutlierSummary>,
    ranges: Vec<RangeValidation>,
    critical: CriticalColumnsReport,
    missing_columns: Vec<String>,
    unexpected_columns: Vec<String>,
}

fn run_report(input: &Path, delimiter: u8, config: PipelineConfig, raw: bool, json: bool) -> Result<()> {
    let spinner = create_spinner(Some("loading"));
    let input_batch = if is_parquet(input) {
        let batches = read_parquet(input)?;
        if batches.is_empty() {
            bail!("{} contains no record batches", input.display());
        }
        unify_batches(&batches)?
    } else {
        let options = CsvOptions::raw_text().with_delimiter(delimiter);
        load_sample(input, config.sample_size, &options)?
    };
    let drift = check_schema_drift(&input_batch, &config.expected_columns);

    let batch = if raw || is_parquet(input) {
        input_batch
    } else {
        spinner.set_message("cleaning");
        EtlPipeline::new(config.clone())?.run(input_batch)?.0
    };
    finish_progress_bar(&spinner, None);

    let names = &config.names;
    let quality = validate_data_quality(&batch, &names.identifier)?;
    let outlier_column = [&names.adjusted_value, &names.monetary]
        .into_iter()
        .find(|c| batch.column_by_name(c).is_some());
    let outliers = outlier_column
        .map(|column| {
            detect_outliers(&batch, column, config.outliers.method, config.outliers.threshold)
                .map(|(_, summary)| summary)
        })
        .transpose()?;
    let ranges = validate_configured_ranges(&batch, &config.valid_ranges)?;
    let critical = validate_critical_columns(&batch, &config.critical_columns);

    let report = FullReport {
        quality,
        outliers,
        ranges,
        critical,
        missing_columns: drift.missing,
        unexpected_columns: drift.unexpected,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{}", report.quality.render());
    if let Some(outliers) = &report.outliers {
        println!(
            "Outliers in {} ({} {}): {} ({:.2}%)",
            outliers.column,
            outliers.method,
            outliers.threshold,
            outliers.outlier_count,
            outliers.outlier_pct
        );
    }
    for range in &report.ranges {
        println!(
            "Range {}: {} below, {} above [{:?}, {:?}]",
            range.column,
            range.below_min_count,
            range.above_max_count,
            range.expected_min,
            range.expected_max
        );
    }
    println!(
        "Critical columns valid: {}",
        if report.critical.valid { "yes" } else { "no" }
    );
    for status in report.critical.columns.iter().filter(|s| !s.is_valid()) {
        println!(
            "  {}: present={}, nulls={}",
            status.column, status.present, status.null_count
        );
    }
    if !report.missing_columns.is_empty() {
        println!("Missing columns: {}", report.missing_columns.join(", "));
    }
    if !report.unexpected_columns.is_empty() {
        println!("Unexpected columns: {}", report.unexpected_columns.join(", "));
    }
    Ok(())
}
