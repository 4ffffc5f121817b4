use std::path::PathBuf;

use clap::Parser;
use snafu::{ensure, Report, ResultExt, Snafu, Whatever};
use tracing::{error, info, Level};

use volume_preprocessing::convert::{Converter, ConverterConfig};
use volume_preprocessing::errors::ConvertError;
use volume_preprocessing::label_map::{LabelMap, LabelMapError};
use volume_preprocessing::report::RunReport;
use volume_preprocessing::save::{OutputFormat, SupportedCompressor};
use volume_preprocessing::split::{DEFAULT_SEED, DEFAULT_TRAIN_RATIO};
use volume_preprocessing::subject::{
    SubjectLayout, DEFAULT_IMAGE_TEMPLATE, DEFAULT_LABEL_TEMPLATE,
};
use volume_preprocessing::transform::{
    DisplayNormalization, IntensityWindow, NormalizationPolicy, Orientation, SliceAxis,
    SliceSelection, DEFAULT_NUM_CLASSES,
};

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("Invalid arguments: {}", message))]
    InvalidArgs { message: String },

    #[snafu(display("Could not read label map: {}", source))]
    ReadLabelMap {
        #[snafu(source(from(LabelMapError, Box::new)))]
        source: Box<LabelMapError>,
    },

    #[snafu(display("Could not configure thread pool: {}", source))]
    ThreadPool {
        #[snafu(source(from(rayon::ThreadPoolBuildError, Box::new)))]
        source: Box<rayon::ThreadPoolBuildError>,
    },

    #[snafu(display("Conversion failed: {}", source))]
    Convert {
        #[snafu(source(from(ConvertError, Box::new)))]
        source: Box<ConvertError>,
    },

    #[snafu(display("{} of {} subjects were skipped", skipped, total))]
    SubjectsSkipped { skipped: usize, total: usize },
}

#[derive(Parser, Debug)]
#[command(author = "Scott Chase Waggener", version = env!("CARGO_PKG_VERSION"), about = "Convert paired 3-D intensity and label volumes into 2-D slice images for segmentation training", long_about = None)]
struct Args {
    #[arg(help = "Input root holding one directory per subject")]
    source: PathBuf,

    #[arg(help = "Output root for the train/validation image and annotation directories")]
    output: PathBuf,

    #[arg(
        help = "Volume axis along which slices are taken",
        long = "axis",
        short = 'a',
        value_parser = clap::value_parser!(SliceAxis),
        default_value_t = SliceAxis::default(),
    )]
    axis: SliceAxis,

    #[arg(
        help = "Take the slice at this index instead of the central slice",
        long = "index",
        short = 'i',
        conflicts_with = "stride"
    )]
    index: Option<usize>,

    #[arg(
        help = "Take every n-th slice along the axis, one output pair per slice",
        long = "stride"
    )]
    stride: Option<usize>,

    #[arg(
        help = "First slice taken when using --stride (default: 0)",
        long = "start",
        requires = "stride"
    )]
    start: Option<usize>,

    #[arg(
        help = "Orientation correction applied to every slice",
        long = "orientation",
        short = 'o',
        value_parser = clap::value_parser!(Orientation),
        default_value_t = Orientation::default(),
    )]
    orientation: Orientation,

    #[arg(
        help = "Range used to rescale intensities to 8 bits",
        long = "normalization",
        short = 'n',
        value_parser = clap::value_parser!(DisplayNormalization),
        default_value_t = DisplayNormalization::default(),
    )]
    normalization: DisplayNormalization,

    #[arg(
        help = "Lower bound of the fixed intensity window",
        long = "window-min",
        allow_hyphen_values = true
    )]
    window_min: Option<f32>,

    #[arg(
        help = "Upper bound of the fixed intensity window",
        long = "window-max",
        allow_hyphen_values = true
    )]
    window_max: Option<f32>,

    #[arg(
        help = "Number of label classes. Labels must lie in 0..num-classes or equal 255",
        long = "num-classes",
        short = 'c',
        default_value_t = DEFAULT_NUM_CLASSES
    )]
    num_classes: u8,

    #[arg(
        help = "Fraction of subjects placed in the training split",
        long = "ratio",
        short = 'r',
        default_value_t = DEFAULT_TRAIN_RATIO
    )]
    ratio: f64,

    #[arg(
        help = "Seed of the subject shuffle",
        long = "seed",
        short = 's',
        default_value_t = DEFAULT_SEED
    )]
    seed: u64,

    #[arg(
        help = "Intensity volume path inside a subject directory, {id} is replaced by the subject",
        long = "image-template",
        default_value = DEFAULT_IMAGE_TEMPLATE
    )]
    image_template: String,

    #[arg(
        help = "Label volume path inside a subject directory, {id} is replaced by the subject",
        long = "label-template",
        default_value = DEFAULT_LABEL_TEMPLATE
    )]
    label_template: String,

    #[arg(
        help = "Output image format",
        long = "format",
        short = 'f',
        value_parser = clap::value_parser!(OutputFormat),
        default_value_t = OutputFormat::default(),
    )]
    format: OutputFormat,

    #[arg(
        help = "Compression type for TIFF output",
        long = "compressor",
        short = 'z',
        value_parser = clap::value_parser!(SupportedCompressor),
        default_value_t = SupportedCompressor::default(),
    )]
    compressor: SupportedCompressor,

    #[arg(
        help = "JSON label map written for both splits (default: {\"scale\": 1})",
        long = "label-map"
    )]
    label_map: Option<PathBuf>,

    #[arg(
        help = "Number of worker threads (default: available parallelism)",
        long = "threads",
        short = 't'
    )]
    threads: Option<usize>,

    #[arg(
        help = "Exit with an error if any subject was skipped",
        long = "strict",
        default_value_t = false
    )]
    strict: bool,

    #[arg(
        help = "Remove image and annotation files left in the output root by an earlier run",
        long = "overwrite",
        default_value_t = false
    )]
    overwrite: bool,

    #[arg(
        help = "Print debug logging",
        long = "verbose",
        short = 'v',
        default_value_t = false
    )]
    verbose: bool,
}

impl Args {
    fn selection(&self) -> SliceSelection {
        match (self.index, self.stride) {
            (Some(index), _) => SliceSelection::Index(index),
            (None, Some(step)) => SliceSelection::Strided {
                start: self.start.unwrap_or(0),
                step,
            },
            (None, None) => SliceSelection::Central,
        }
    }

    fn normalization(&self) -> Result<NormalizationPolicy, Error> {
        match (self.normalization, self.window_min, self.window_max) {
            (DisplayNormalization::Volume, None, None) => Ok(NormalizationPolicy::Volume),
            (DisplayNormalization::Slice, None, None) => Ok(NormalizationPolicy::Slice),
            (DisplayNormalization::Fixed, Some(min), Some(max)) => {
                Ok(NormalizationPolicy::Fixed(IntensityWindow::new(min, max)))
            }
            (DisplayNormalization::Fixed, _, _) => InvalidArgsSnafu {
                message: "fixed normalization requires --window-min and --window-max",
            }
            .fail(),
            (policy, _, _) => InvalidArgsSnafu {
                message: format!(
                    "--window-min and --window-max only apply to fixed normalization, not {policy}"
                ),
            }
            .fail(),
        }
    }

    fn config(&self) -> Result<ConverterConfig, Error> {
        let label_map = match &self.label_map {
            Some(path) => LabelMap::from_file(path).context(ReadLabelMapSnafu)?,
            None => LabelMap::default(),
        };
        Ok(ConverterConfig {
            subject_layout: SubjectLayout::new(&self.image_template, &self.label_template),
            axis: self.axis,
            selection: self.selection(),
            orientation: self.orientation,
            normalization: self.normalization()?,
            num_classes: self.num_classes,
            train_ratio: self.ratio,
            seed: self.seed,
            format: self.format,
            compressor: self.compressor,
            label_map,
            overwrite: self.overwrite,
        })
    }
}

fn main() {
    let args = Args::parse();

    let level = if args.verbose { Level::DEBUG } else { Level::WARN };
    tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_max_level(level)
            .finish(),
    )
    .whatever_context("Could not set up global logging subscriber")
    .unwrap_or_else(|e: Whatever| {
        eprintln!("[ERROR] {}", Report::from_error(e));
    });

    if let Some(threads) = args.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context(ThreadPoolSnafu)
            .unwrap_or_else(|e| {
                error!("{}", Report::from_error(e));
                std::process::exit(-1);
            });
    }

    match run(args) {
        Ok(report) => print!("{}", report),
        Err(e) => {
            error!("{}", Report::from_error(e));
            std::process::exit(-1);
        }
    }
}

fn run(args: Args) -> Result<RunReport, Error> {
    let config = args.config()?;
    info!(
        "Slicing along {} ({}), orientation {}, normalization {}",
        config.axis, config.selection, config.orientation, config.normalization
    );
    let converter = Converter::new(config).context(ConvertSnafu)?;
    let report = converter
        .run(&args.source, &args.output)
        .context(ConvertSnafu)?;

    if args.strict {
        ensure!(
            report.is_complete(),
            SubjectsSkippedSnafu {
                skipped: report.num_skipped(),
                total: report.num_processed() + report.num_skipped(),
            }
        );
    }
    Ok(report)
}
