//! entity-xml
//!
//! Converts JSON documents to XML: objects become elements named after their
//! keys, arrays become repeated sibling elements, under a `<root>` element.

mod config;

use std::io::{Read, Write};

use anyhow::Context;
use clap::Parser;
use entity_xml::MapperOptions;
use tracing::{debug, info};

use crate::config::CliConfig;

/// Initializes logging to standard error; `RUST_LOG` takes precedence.
fn init_logging(level: &str) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("entity_xml={}", level.to_lowercase())));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn read_input(config: &CliConfig) -> anyhow::Result<String> {
    match config.input_path() {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read input file {}", path.display())),
        None => {
            let mut input = String::new();
            std::io::stdin()
                .read_to_string(&mut input)
                .context("Failed to read standard input")?;
            Ok(input)
        }
    }
}

/// Maps a JSON document to XML text.
fn convert(json: &str, options: &MapperOptions) -> anyhow::Result<String> {
    let value: serde_json::Value =
        serde_json::from_str(json).context("Input is not a valid JSON document")?;
    let doc = entity_xml::to_xml_document(&value).context("Failed to map document to XML")?;
    Ok(options.render(&doc)?)
}

fn write_output(config: &CliConfig, xml: &str) -> anyhow::Result<()> {
    match &config.output {
        Some(path) => std::fs::write(path, xml)
            .with_context(|| format!("Failed to write output file {}", path.display())),
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(xml.as_bytes())?;
            stdout.flush()?;
            Ok(())
        }
    }
}

fn main() -> anyhow::Result<()> {
    let config = CliConfig::parse();
    init_logging(&config.log_level);

    if let Err(errors) = config.validate() {
        for error in &errors {
            eprintln!("Configuration error: {}", error);
        }
        std::process::exit(2);
    }

    let options = config.mapper_options();
    debug!(
        input = ?config.input_path(),
        output = ?config.output,
        pretty = options.pretty,
        declaration = options.declaration,
        "Converting document"
    );

    let json = read_input(&config)?;
    let xml = convert(&json, &options)?;
    write_output(&config, &xml)?;

    info!(bytes = xml.len(), "Wrote XML document");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_convert_object() -> anyhow::Result<()> {
        let xml = convert(
            r#"{"name":"John","tags":["a","b"]}"#,
            &MapperOptions::default(),
        )?;
        assert_eq!(
            xml,
            "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<root><name>John</name><tags>a</tags><tags>b</tags></root>\n"
        );
        Ok(())
    }

    #[test]
    fn test_convert_rejects_invalid_json() {
        let err = convert("{not json", &MapperOptions::default()).unwrap_err();
        assert!(err.to_string().contains("not a valid JSON"));
    }

    #[test]
    fn test_convert_reports_invalid_names() {
        let err = convert(r#"{"1st": "x"}"#, &MapperOptions::default()).unwrap_err();
        assert!(format!("{:#}", err).contains("invalid XML name"));
    }

    #[test]
    fn test_file_round_trip() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let input = dir.path().join("in.json");
        let output = dir.path().join("out.xml");
        std::fs::write(&input, r#"{"a": 1}"#)?;

        let config = CliConfig {
            input: Some(input),
            output: Some(output.clone()),
            no_declaration: true,
            ..Default::default()
        };
        let xml = convert(&read_input(&config)?, &config.mapper_options())?;
        write_output(&config, &xml)?;

        assert_eq!(std::fs::read_to_string(&output)?, "<root><a>1</a></root>\n");
        Ok(())
    }

    #[test]
    fn test_missing_input_file() {
        let config = CliConfig {
            input: Some(PathBuf::from("/nonexistent/input.json")),
            ..Default::default()
        };
        let err = read_input(&config).unwrap_err();
        assert!(err.to_string().contains("Failed to read input file"));
    }
}
