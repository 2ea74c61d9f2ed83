//! BAG command-line tool.
//!
//! Creates sample datasets and inspects existing ones through the public
//! `bag` API.

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use bag::BagConfig;

#[derive(Parser, Debug)]
#[command(name = "bag-tool")]
#[command(about = "Create and inspect Bathymetric Attributed Grid datasets")]
struct Args {
    /// Log level
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a dataset holding a synthetic sloped seafloor
    Create {
        /// Dataset directory to create
        path: PathBuf,

        /// Number of grid rows
        #[arg(long, default_value_t = 100)]
        rows: u32,

        /// Number of grid columns
        #[arg(long, default_value_t = 100)]
        columns: u32,

        /// Node spacing in metres, used for both axes
        #[arg(long, default_value_t = 10.0)]
        resolution: f64,

        /// South-west corner easting
        #[arg(long, default_value_t = 0.0)]
        origin_x: f64,

        /// South-west corner northing
        #[arg(long, default_value_t = 0.0)]
        origin_y: f64,

        /// Horizontal reference system (WKT or authority code)
        #[arg(long, default_value = "")]
        horizontal_crs: String,

        /// Vertical reference system (WKT or authority code)
        #[arg(long, default_value = "")]
        vertical_crs: String,

        /// Chunk edge for 2-D layers (default: BAG_CHUNK_SIZE or 100)
        #[arg(long)]
        chunk_size: Option<u64>,

        /// Deflate level 0-9 (default: BAG_COMPRESSION_LEVEL or 5)
        #[arg(long)]
        compression_level: Option<u8>,
    },

    /// Print the descriptor and layer catalog of a dataset as JSON
    Info {
        /// Dataset directory
        path: PathBuf,
    },

    /// Print the values of a layer over an inclusive bounding box
    Read {
        /// Dataset directory
        path: PathBuf,

        /// Layer name, e.g. Elevation or Uncertainty
        #[arg(long, default_value = "Elevation")]
        layer: String,

        #[arg(long, default_value_t = 0)]
        row_start: u32,

        #[arg(long, default_value_t = 0)]
        col_start: u32,

        #[arg(long, default_value_t = 4)]
        row_end: u32,

        #[arg(long, default_value_t = 4)]
        col_end: u32,
    },

    /// Add the variable resolution extension to a dataset
    VrCreate {
        /// Dataset directory
        path: PathBuf,

        /// Chunk length for the growable VR arrays (default: BAG_VR_CHUNK_SIZE)
        #[arg(long)]
        chunk_size: Option<u64>,

        /// Deflate level 0-9
        #[arg(long, default_value_t = 5)]
        compression_level: u8,

        /// Also create the VR node layer
        #[arg(long)]
        with_node: bool,
    },

    /// Annotate the elevation layer with a NOAA NBS georeferenced metadata layer
    GeorefSample {
        /// Dataset directory
        path: PathBuf,

        /// Source survey identifier stored in the records
        #[arg(long, default_value = "H00000")]
        survey_id: String,

        /// Source institution stored in the records
        #[arg(long, default_value = "NOAA")]
        institution: String,
    },
}

fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Initialize tracing
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let config = BagConfig::from_env();
    if let Err(e) = config.validate() {
        anyhow::bail!("Invalid configuration: {}", e);
    }
    info!(
        chunk_size = config.chunk_size,
        compression_level = config.compression_level,
        vr_chunk_size = config.vr_chunk_size,
        "Loaded configuration"
    );

    match args.command {
        Command::Create {
            path,
            rows,
            columns,
            resolution,
            origin_x,
            origin_y,
            horizontal_crs,
            vertical_crs,
            chunk_size,
            compression_level,
        } => {
            let config = BagConfig {
                chunk_size: chunk_size.unwrap_or(config.chunk_size),
                compression_level: compression_level.unwrap_or(config.compression_level),
                ..config
            };
            let grid = commands::GridArgs {
                rows,
                columns,
                resolution,
                origin: (origin_x, origin_y),
                horizontal_crs,
                vertical_crs,
            };
            commands::create(&path, &grid, config)
        }
        Command::Info { path } => commands::info(&path),
        Command::Read {
            path,
            layer,
            row_start,
            col_start,
            row_end,
            col_end,
        } => commands::read(&path, &layer, (row_start, col_start), (row_end, col_end)),
        Command::VrCreate {
            path,
            chunk_size,
            compression_level,
            with_node,
        } => commands::vr_create(
            &path,
            chunk_size.unwrap_or(config.vr_chunk_size),
            compression_level,
            with_node,
        ),
        Command::GeorefSample {
            path,
            survey_id,
            institution,
        } => commands::georef_sample(&path, &survey_id, &institution, config),
    }
}
