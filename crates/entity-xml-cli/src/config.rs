//! Command line configuration.
//!
//! Every option can also be given through an `ENTITY_XML_*` environment
//! variable, as listed in `--help`.

use std::path::{Path, PathBuf};

use clap::Parser;
use entity_xml::MapperOptions;

const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Converts a JSON document to XML.
#[derive(Debug, Clone, Parser)]
#[command(name = "entity-xml")]
#[command(about = "Convert JSON documents to XML")]
pub struct CliConfig {
    /// Input JSON file. Reads standard input when absent or `-`.
    pub input: Option<PathBuf>,

    /// Output file. Writes to standard output when absent.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Indent nested elements by two spaces.
    #[arg(long, env = "ENTITY_XML_PRETTY")]
    pub pretty: bool,

    /// Omit the `<?xml ...?>` declaration line.
    #[arg(long)]
    pub no_declaration: bool,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, env = "ENTITY_XML_LOG_LEVEL", default_value = "warn")]
    pub log_level: String,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            input: None,
            output: None,
            pretty: false,
            no_declaration: false,
            log_level: "warn".to_string(),
        }
    }
}

impl CliConfig {
    /// Rendering options selected on the command line.
    pub fn mapper_options(&self) -> MapperOptions {
        MapperOptions {
            pretty: self.pretty,
            declaration: !self.no_declaration,
        }
    }

    /// The input file, or `None` for standard input.
    pub fn input_path(&self) -> Option<&Path> {
        self.input
            .as_deref()
            .filter(|path| path.as_os_str() != "-")
    }

    /// Validates the configuration and returns errors if any.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if !LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            errors.push(format!(
                "Unknown log level '{}', expected one of {}",
                self.log_level,
                LOG_LEVELS.join(", ")
            ));
        }

        if let (Some(input), Some(output)) = (self.input_path(), self.output.as_deref())
            && input == output
        {
            errors.push("Output file cannot be the input file".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
