// mp-export: copy a rendered Markdown preview to the clipboard in a form the
// WeChat official-account editor accepts.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use mp_export::{ExportConfig, ExportPipeline};

#[derive(Parser)]
#[command(name = "mp-export")]
#[command(about = "Export a rendered preview as self-contained, inline-styled HTML", long_about = None)]
struct Cli {
    /// Rendered preview HTML
    preview: PathBuf,

    /// Markdown the preview was rendered from; supplies formula sources
    #[arg(short, long)]
    markdown: Option<PathBuf>,

    /// Config JSON (missing keys take their defaults)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Stylesheet applied to the preview (theme, KaTeX, MathJax); repeatable
    #[arg(short, long = "stylesheet")]
    stylesheets: Vec<PathBuf>,

    /// Print the HTML instead of writing the clipboard
    #[arg(long)]
    stdout: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ExportConfig::load(path)?,
        None => ExportConfig::default(),
    };

    let html = tokio::fs::read_to_string(&cli.preview)
        .await
        .with_context(|| format!("Failed to read preview {}", cli.preview.display()))?;
    let markdown = match &cli.markdown {
        Some(path) => Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read markdown {}", path.display()))?,
        ),
        None => None,
    };
    let mut stylesheets = Vec::with_capacity(cli.stylesheets.len());
    for path in &cli.stylesheets {
        stylesheets.push(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read stylesheet {}", path.display()))?,
        );
    }

    let pipeline = ExportPipeline::builder(config)
        .stylesheets(stylesheets)
        .build()?;

    if cli.stdout {
        let prepared = pipeline.prepare_html(&html, markdown.as_deref()).await?;
        println!("{}", prepared.html);
        log::info!("{}", prepared.report.summary_line());
    } else {
        let report = pipeline.copy_html(&html, markdown.as_deref()).await?;
        log::info!("{}", report.summary_line());
    }

    Ok(())
}
