//! Report building and the run entry point with builder pattern.

use plyread_data::{Cell, PlyError, PlyReader, Property, bounding_box, load_vertices};
use std::fmt::Write;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

/// Errors surfaced by the command-line application.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("PLY error: {0}")]
    Ply(#[from] PlyError),

    #[error("Element {0:?} not found")]
    UnknownElement(String),

    #[error("Report formatting error: {0}")]
    Format(#[from] std::fmt::Error),
}

/// Logging configuration.
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

/// Builder for configuring and running the inspector.
pub struct AppBuilder {
    logging: LoggingConfig,
    element: Option<String>,
    preview_rows: usize,
}

impl AppBuilder {
    pub fn new() -> Self {
        Self {
            logging: LoggingConfig::default(),
            element: None,
            preview_rows: 3,
        }
    }

    /// Configure logging.
    pub fn with_logging(mut self, config: LoggingConfig) -> Self {
        self.logging = config;
        self
    }

    /// Restrict the report to one element.
    pub fn with_element(mut self, element: Option<String>) -> Self {
        self.element = element;
        self
    }

    pub fn with_preview_rows(mut self, rows: usize) -> Self {
        self.preview_rows = rows;
        self
    }

    /// Read `path` and print its report to stdout.
    pub fn run(self, path: &Path) -> Result<(), AppError> {
        self.init_logging();

        let ply = PlyReader::open(path)?;
        let report = self.report(&ply)?;
        print!("{report}");
        Ok(())
    }

    fn report(&self, ply: &PlyReader) -> Result<String, AppError> {
        let header = ply.header();
        let mut out = String::new();

        writeln!(
            out,
            "format: {} {}",
            header.format(),
            header.version().unwrap_or("")
        )?;
        for comment in header.comments() {
            writeln!(out, "comment: {comment}")?;
        }

        let selected: Vec<usize> = match &self.element {
            Some(name) => vec![
                ply.find_element(name)
                    .ok_or_else(|| AppError::UnknownElement(name.clone()))?,
            ],
            None => (0..ply.elements().len()).collect(),
        };
        debug!("Reporting {} of {} elements", selected.len(), ply.elements().len());

        for element in selected {
            self.report_element(ply, element, &mut out)?;
        }

        match load_vertices(ply) {
            Ok(vertices) => {
                writeln!(out, "vertices: {}", vertices.len())?;
                if let Some((min, max)) = bounding_box(&vertices) {
                    writeln!(out, "bounds: {min} .. {max}")?;
                }
            }
            Err(e) => info!("No vertex summary: {}", e),
        }

        Ok(out)
    }

    fn report_element(&self, ply: &PlyReader, element: usize, out: &mut String) -> Result<(), AppError> {
        let el = &ply.elements()[element];
        writeln!(out, "element {} ({} rows)", el.name(), el.declared_count())?;
        for property in el.properties() {
            writeln!(out, "  {}", describe(property))?;
        }

        let rows = el.declared_count().min(self.preview_rows);
        for row in 0..rows {
            let cells = (0..el.properties().len())
                .map(|p| render_cell(ply, element, row, p))
                .collect::<Result<Vec<_>, _>>()?;
            writeln!(out, "  [{row}] {}", cells.join(" "))?;
        }
        if el.declared_count() > rows {
            writeln!(out, "  ... {} more", el.declared_count() - rows)?;
        }
        Ok(())
    }
}

impl AppBuilder {
    fn init_logging(&self) {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&self.logging.level)),
            )
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}

impl Default for AppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn describe(property: &Property) -> String {
    match property.list_count_type {
        Some(count) => format!("list {} {} {}", count, property.element_type, property.name),
        None => format!("{} {}", property.element_type, property.name),
    }
}

fn render_cell(ply: &PlyReader, element: usize, row: usize, property: usize) -> Result<String, PlyError> {
    let rendered = match ply.cell(element, row, property)? {
        Cell::Value(_) => ply.get_value(element, row, property)?.to_string(),
        Cell::Index(_) => ply.get_index(element, row, property)?.to_string(),
        Cell::Byte(_) => ply.get_byte(element, row, property)?.to_string(),
        Cell::ValueList(_) => format!("{:?}", ply.get_value_list(element, row, property)?),
        Cell::IndexList(_) => format!("{:?}", ply.get_index_list(element, row, property)?),
        Cell::ByteList(_) => format!("{:?}", ply.get_byte_list(element, row, property)?),
    };
    Ok(rendered)
}
