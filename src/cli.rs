use clap::{Parser, ValueEnum};

/// Database connectivity check service.
#[derive(Parser, Debug)]
#[command(version)]
pub struct Args {
    /// Log output format
    #[arg(long, value_enum, default_value_t = TracingFormat::default())]
    pub tracing: TracingFormat,

    /// Run a single connectivity check, print the result as JSON and exit
    /// (status 0 when connected, 1 otherwise) instead of serving HTTP.
    #[arg(long)]
    pub once: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum TracingFormat {
    /// Human-readable, colored output
    Pretty,
    /// One JSON object per line
    Json,
}

impl Default for TracingFormat {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            TracingFormat::Pretty
        } else {
            TracingFormat::Json
        }
    }
}
