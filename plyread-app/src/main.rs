//! plyread
//!
//! Inspects PLY files: prints the header schema, previews rows of each
//! element, and summarizes vertex bounds.

mod app;

use clap::Parser;
use std::path::PathBuf;

/// plyread - PLY file inspector
#[derive(Parser, Debug)]
#[command(name = "plyread")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to PLY file to read
    file: PathBuf,

    /// Only show this element
    #[arg(short, long)]
    element: Option<String>,

    /// Rows to preview per element
    #[arg(short, long, default_value_t = 3)]
    rows: usize,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn main() {
    let args = Args::parse();

    let app = app::AppBuilder::new()
        .with_logging(app::LoggingConfig {
            level: args.log_level,
        })
        .with_element(args.element)
        .with_preview_rows(args.rows);

    if let Err(e) = app.run(&args.file) {
        eprintln!("Application error: {}", e);
        std::process::exit(1);
    }
}
