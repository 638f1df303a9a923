use anyhow::{Context, Result};
use clap::Parser;
use docx_from_html::{html_to_docx, DocumentOptions};
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Input HTML file (full document or fragment).
    #[arg(long)]
    html_file: PathBuf,

    /// Output .docx path.
    #[arg(long)]
    out: PathBuf,

    /// JSON document options (page size, margins, fonts, tables, ...).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Document title metadata; overrides the config file.
    #[arg(long)]
    title: Option<String>,
}

fn load_options(args: &Args) -> Result<DocumentOptions> {
    let mut options = match &args.config {
        Some(path) => DocumentOptions::from_json_file(path)
            .with_context(|| format!("load config {}", path.display()))?,
        None => DocumentOptions::default(),
    };
    if let Some(title) = &args.title {
        options.title = Some(title.clone());
    }
    Ok(options)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "docx_from_html=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let options = load_options(&args)?;
    let html = std::fs::read_to_string(&args.html_file)
        .with_context(|| format!("open {}", args.html_file.display()))?;

    let converted = html_to_docx(&html, options)
        .await
        .with_context(|| format!("convert {}", args.html_file.display()))?;
    for diag in &converted.diagnostics {
        tracing::warn!(stage = %diag.stage, source = %diag.source, "{}", diag.message);
    }

    if let Some(parent) = args.out.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create {}", parent.display()))?;
    }
    std::fs::write(&args.out, &converted.bytes)
        .with_context(|| format!("write {}", args.out.display()))?;
    tracing::info!(out = %args.out.display(), bytes = converted.bytes.len(), "docx written");
    Ok(())
}
