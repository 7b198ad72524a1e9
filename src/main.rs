use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use rfcapture::dom::{DocumentSnapshot, SourceDocument};
use rfcapture::resource::data_url;
use rfcapture::{ImageFormat, Options, Surface};
use std::io::Write;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Svg,
    Png,
    Jpeg,
    Pixels,
}

#[derive(Parser)]
#[command(name = "rfcapture", about = "Render a recorded DOM snapshot as an image")]
struct Cli {
    /// Snapshot JSON file (use - for stdin)
    snapshot: String,

    /// Output format
    #[arg(long, value_enum, default_value = "svg")]
    format: Format,

    /// Write the encoded image here instead of printing a data URI
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output width in px (default: the node's box width)
    #[arg(long)]
    width: Option<u32>,

    /// Output height in px (default: the node's box height)
    #[arg(long)]
    height: Option<u32>,

    /// Canvas scale factor
    #[arg(long, default_value_t = 1.0)]
    scale: f32,

    /// Background color filled before drawing
    #[arg(long)]
    bgcolor: Option<String>,

    /// JPEG quality between 0 and 1
    #[arg(long, default_value_t = 1.0)]
    quality: f32,

    /// Data URI used for resources that cannot be fetched
    #[arg(long)]
    placeholder: Option<String>,

    /// Append a timestamp to every fetched URL
    #[arg(long)]
    cache_bust: bool,

    /// Send credentials with resource requests
    #[arg(long)]
    credentials: bool,

    /// Per-resource fetch timeout in milliseconds
    #[arg(long, default_value_t = 30000)]
    timeout_ms: u64,
}

impl Cli {
    fn options(&self) -> Options {
        Options {
            width: self.width,
            height: self.height,
            bgcolor: self.bgcolor.clone(),
            quality: self.quality,
            scale: self.scale,
            image_placeholder: self.placeholder.clone(),
            cache_bust: self.cache_bust,
            use_credentials: self.credentials,
            http_timeout_ms: self.timeout_ms,
            ..Default::default()
        }
    }
}

fn read_snapshot(path: &str) -> anyhow::Result<DocumentSnapshot> {
    let json = if path == "-" {
        let mut buf = String::new();
        std::io::Read::read_to_string(&mut std::io::stdin(), &mut buf).context("Failed to read stdin")?;
        buf
    } else {
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path))?
    };
    Ok(DocumentSnapshot::from_json(&json)?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let doc = read_snapshot(&cli.snapshot)?;
    let options = cli.options();
    let capturer = rfcapture::new_capturer()?;

    let (data_uri, bytes) = match cli.format {
        Format::Svg => {
            let uri = capturer.to_svg(&doc, doc.root(), &options).await?;
            let bytes = data_url::decode(&uri)?.bytes;
            (Some(uri), bytes)
        }
        Format::Png | Format::Jpeg => {
            let (format, quality) = if cli.format == Format::Png {
                (ImageFormat::Png, 1.0)
            } else {
                (ImageFormat::Jpeg, options.quality)
            };
            let canvas = capturer.to_canvas(&doc, doc.root(), &options).await?;
            let uri = canvas.to_data_url(format, quality)?;
            let bytes = canvas.to_blob(format, quality)?.bytes;
            (Some(uri), bytes)
        }
        Format::Pixels => (None, capturer.to_pixel_data(&doc, doc.root(), &options).await?),
    };

    match (&cli.output, data_uri) {
        (Some(path), _) => {
            std::fs::write(path, &bytes).with_context(|| format!("Failed to write {}", path.display()))?;
            log::info!("wrote {} bytes to {}", bytes.len(), path.display());
        }
        (None, Some(uri)) => {
            let mut out = std::io::stdout().lock();
            writeln!(out, "{}", uri)?;
        }
        (None, None) => bail!("--format pixels needs --output"),
    }
    Ok(())
}
