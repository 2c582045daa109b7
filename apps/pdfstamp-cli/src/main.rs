//! Batch CLI for stamping an image onto PDF files.

use anyhow::{bail, Context, Result};
use clap::Parser;
use pdfstamp_core::{
    bundle_outputs, process_batch, BatchDownload, ImageAsset, InputDocument, PageSelection,
    PlacementConfig, PositionPreset, ProcessingResult, SizeMode,
};
use std::fs;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "pdfstamp", about = "Stamp an image onto pages of PDF files")]
struct Args {
    /// PDF files to process
    #[arg(required = true)]
    pdfs: Vec<PathBuf>,

    /// Image to stamp (PNG or JPEG)
    #[arg(short, long)]
    image: PathBuf,

    /// Position preset: top-left, top-right, bottom-left, bottom-right,
    /// center, custom (unknown values fall back to bottom-right)
    #[arg(long, default_value = "bottom-right")]
    position: String,

    /// Scale factor relative to the image's DPI-normalized size
    #[arg(long, conflicts_with_all = ["width", "height"])]
    scale: Option<f64>,

    /// Fixed render width in points
    #[arg(long)]
    width: Option<f64>,

    /// Fixed render height in points
    #[arg(long)]
    height: Option<f64>,

    /// Horizontal margin in points
    #[arg(long, default_value_t = 20.0)]
    margin_x: f64,

    /// Vertical margin in points
    #[arg(long, default_value_t = 20.0)]
    margin_y: f64,

    /// X origin for the custom position
    #[arg(long, default_value_t = 50.0)]
    custom_x: f64,

    /// Y origin for the custom position
    #[arg(long, default_value_t = 50.0)]
    custom_y: f64,

    /// Pages to stamp: all, first, or last
    #[arg(long, default_value = "all")]
    pages: String,

    /// Directory the output (PDF or ZIP) is written to
    #[arg(short, long, default_value = ".")]
    out_dir: PathBuf,

    /// Write each stamped PDF separately instead of bundling into a ZIP
    #[arg(long)]
    individual: bool,
}

impl Args {
    fn placement_config(&self) -> Result<PlacementConfig> {
        let size = match self.scale {
            Some(factor) => {
                if factor <= 0.0 {
                    bail!("--scale must be positive");
                }
                SizeMode::Scale { factor }
            }
            None => SizeMode::Fixed {
                width: self.width,
                height: self.height,
            },
        };
        let pages = PageSelection::parse(&self.pages)
            .with_context(|| format!("Invalid --pages value: {}", self.pages))?;

        Ok(PlacementConfig {
            size,
            position: PositionPreset::parse_lenient(&self.position),
            margin_x: self.margin_x,
            margin_y: self.margin_y,
            custom_x: self.custom_x,
            custom_y: self.custom_y,
            pages,
        })
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = args.placement_config()?;

    let image_bytes = fs::read(&args.image)
        .with_context(|| format!("Failed to read image {}", args.image.display()))?;
    let image = ImageAsset::load(&image_bytes)
        .with_context(|| format!("Failed to decode {}", args.image.display()))?;

    let documents: Vec<InputDocument> = args
        .pdfs
        .iter()
        .map(|path| {
            let bytes = fs::read(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            Ok(InputDocument { name, bytes })
        })
        .collect::<Result<_>>()?;

    let outcomes = process_batch(&documents, &image, &config);

    for outcome in &outcomes {
        if let ProcessingResult::Failed { message } = &outcome.result {
            eprintln!("✗ {}: {}", outcome.source_name, message);
        }
    }

    fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("Failed to create {}", args.out_dir.display()))?;

    if args.individual {
        let mut written = 0usize;
        for outcome in &outcomes {
            if let ProcessingResult::Stamped {
                output_name, bytes, ..
            } = &outcome.result
            {
                let path = args.out_dir.join(output_name);
                fs::write(&path, bytes)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                info!(path = %path.display(), "output written");
                written += 1;
            }
        }
        if written == 0 {
            bail!("No documents were processed successfully");
        }
        return Ok(());
    }

    match bundle_outputs(&outcomes)? {
        BatchDownload::Single { name, bytes } | BatchDownload::Archive { name, bytes } => {
            let path = args.out_dir.join(&name);
            fs::write(&path, &bytes)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(path = %path.display(), size = bytes.len(), "output written");
            Ok(())
        }
        BatchDownload::Empty => bail!("No documents were processed successfully"),
    }
}
