use arrow::array::{StringArray, UInt32Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use clap::Parser;
use indicatif::ProgressBar;
use parquet::arrow::arrow_writer::ArrowWriter;
use parquet::errors::ParquetError;
use parquet::file::properties::WriterProperties;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, Level};

use snafu::{Report, ResultExt, Snafu, Whatever};

use volume_preprocessing::file::default_bar;
use volume_preprocessing::manifest::{get_manifest_with_progress, ManifestEntry};

const DEFAULT_OUTPUT_FILENAME: &str = "manifest.csv";
const COLUMNS: [&str; 6] = ["split", "name", "image", "annotation", "width", "height"];

#[derive(Debug, Snafu)]
enum Error {
    #[snafu(display("Invalid source path: {}", path.display()))]
    InvalidSourcePath { path: PathBuf },

    #[snafu(display("No image pairs found in source path: {}", path.display()))]
    NoSources { path: PathBuf },

    #[snafu(display("Error creating manifest: {:?}", source))]
    CreateManifest {
        #[snafu(source(from(std::io::Error, Box::new)))]
        source: Box<std::io::Error>,
    },

    #[snafu(display("Error writing CSV manifest: {:?}", source))]
    Csv {
        #[snafu(source(from(csv::Error, Box::new)))]
        source: Box<csv::Error>,
    },

    #[snafu(display("Invalid output path: {}", path.display()))]
    InvalidOutputPath { path: PathBuf },

    #[snafu(display("Arrow error: {:?}", source))]
    Arrow {
        #[snafu(source(from(ArrowError, Box::new)))]
        source: Box<ArrowError>,
    },

    #[snafu(display("Parquet error: {:?}", source))]
    Parquet {
        #[snafu(source(from(ParquetError, Box::new)))]
        source: Box<ParquetError>,
    },

    #[snafu(display("Invalid output extension for {}, supported extensions: {}", path.display(), supported.join(", ")))]
    InvalidOutputExtension {
        path: PathBuf,
        supported: Vec<&'static str>,
    },
}

#[derive(Debug, Clone, Copy)]
enum ManifestFormat {
    Csv,
    Parquet,
}

impl ManifestFormat {
    fn from_extension(path: &Path) -> Result<Self, Error> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("csv") => Ok(ManifestFormat::Csv),
            Some("parquet") => Ok(ManifestFormat::Parquet),
            _ => Err(Error::InvalidOutputExtension {
                path: path.to_path_buf(),
                supported: vec!["csv", "parquet"],
            }),
        }
    }
}

#[derive(Parser, Debug)]
#[command(author = "Scott Chase Waggener", version = env!("CARGO_PKG_VERSION"), about = "Create a manifest of converted image/annotation pairs", long_about = None)]
struct Args {
    #[arg(help = "Output root of a volume-preprocess run")]
    source: PathBuf,

    #[arg(help = format!("Output filepath, extension determines format: .csv or .parquet (default: <source>/{DEFAULT_OUTPUT_FILENAME})"))]
    output: Option<PathBuf>,
}

fn main() {
    let args = Args::parse();

    tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_max_level(Level::ERROR)
            .finish(),
    )
    .whatever_context("Could not set up global logging subscriber")
    .unwrap_or_else(|e: Whatever| {
        eprintln!("[ERROR] {}", Report::from_error(e));
    });

    run(args).unwrap_or_else(|e| {
        error!("{}", Report::from_error(e));
        std::process::exit(-1);
    });
}

/// Row values of an entry, with paths relative to the manifest source.
fn record(entry: &ManifestEntry, source: &Path) -> [String; 6] {
    [
        entry.split().to_string(),
        entry.name().to_string(),
        ManifestEntry::relative_path(entry.image(), source)
            .display()
            .to_string(),
        ManifestEntry::relative_path(entry.annotation(), source)
            .display()
            .to_string(),
        entry.width().to_string(),
        entry.height().to_string(),
    ]
}

fn write_manifest_csv(
    entries: &[ManifestEntry],
    source: &Path,
    dest: &Path,
    pb: &ProgressBar,
) -> Result<(), Error> {
    let mut writer = csv::Writer::from_path(dest).context(CsvSnafu)?;
    writer.write_record(COLUMNS).context(CsvSnafu)?;
    for entry in entries {
        writer.write_record(record(entry, source)).context(CsvSnafu)?;
        pb.inc(1);
    }
    writer.flush().context(CreateManifestSnafu)?;
    Ok(())
}

fn write_manifest_parquet(
    entries: &[ManifestEntry],
    source: &Path,
    dest: &Path,
    pb: &ProgressBar,
) -> Result<(), Error> {
    let column = |i: usize| -> StringArray {
        StringArray::from(
            entries
                .iter()
                .map(|e| record(e, source)[i].clone())
                .collect::<Vec<_>>(),
        )
    };
    let width_array = UInt32Array::from(entries.iter().map(|e| e.width()).collect::<Vec<_>>());
    let height_array = UInt32Array::from(entries.iter().map(|e| e.height()).collect::<Vec<_>>());

    let schema = Schema::new(vec![
        Field::new(COLUMNS[0], DataType::Utf8, false),
        Field::new(COLUMNS[1], DataType::Utf8, false),
        Field::new(COLUMNS[2], DataType::Utf8, false),
        Field::new(COLUMNS[3], DataType::Utf8, false),
        Field::new(COLUMNS[4], DataType::UInt32, false),
        Field::new(COLUMNS[5], DataType::UInt32, false),
    ]);

    let batch = RecordBatch::try_new(
        Arc::new(schema),
        vec![
            Arc::new(column(0)),
            Arc::new(column(1)),
            Arc::new(column(2)),
            Arc::new(column(3)),
            Arc::new(width_array),
            Arc::new(height_array),
        ],
    )
    .context(ArrowSnafu)?;

    let file = File::create(dest).context(CreateManifestSnafu)?;
    let props = WriterProperties::builder().build();
    let mut writer =
        ArrowWriter::try_new(file, batch.schema(), Some(props)).context(ParquetSnafu)?;

    writer.write(&batch).context(ParquetSnafu)?;
    writer.close().context(ParquetSnafu)?;
    pb.inc(entries.len() as u64);

    Ok(())
}

fn run(args: Args) -> Result<(), Error> {
    let source = if args.source.is_dir() {
        Ok(args.source)
    } else {
        Err(Error::InvalidSourcePath {
            path: args.source.to_path_buf(),
        })
    }?;
    let dest = match args.output {
        Some(output) if output.is_dir() => Err(Error::InvalidOutputPath { path: output }),
        Some(output) => Ok(output),
        None => Ok(source.join(DEFAULT_OUTPUT_FILENAME)),
    }?;

    let format = ManifestFormat::from_extension(&dest)?;

    let entries = get_manifest_with_progress(&source).context(CreateManifestSnafu)?;
    if entries.is_empty() {
        return Err(Error::NoSources {
            path: source.to_path_buf(),
        });
    }
    tracing::info!("Number of entries found: {}", entries.len());

    let pb = default_bar(entries.len() as u64);
    pb.set_message("Writing manifest");

    match format {
        ManifestFormat::Csv => write_manifest_csv(&entries, &source, &dest, &pb),
        ManifestFormat::Parquet => write_manifest_parquet(&entries, &source, &dest, &pb),
    }
}
