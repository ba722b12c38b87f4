//! Serialization formats for imported and exported state

use crate::core::error::PipesError;
use anyhow::{Context, Result};
use serde_json::Value;
use std::fmt;
use std::io::{BufRead, Read, Write};
use std::path::Path;
use std::str::FromStr;

/// Supported data formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Yaml,
    Json,
    Ndjson,
}

impl Format {
    pub fn name(&self) -> &'static str {
        match self {
            Format::Yaml => "yaml",
            Format::Json => "json",
            Format::Ndjson => "ndjson",
        }
    }

    /// Guess the format from a file extension
    pub fn guess(path: &Path) -> Option<Format> {
        let extension = path.extension()?.to_str()?;
        extension.parse().ok()
    }

    /// Pick the explicit format, else guess from the file, else YAML
    pub fn resolve(explicit: Option<&str>, file: Option<&Path>) -> Result<Format, PipesError> {
        if let Some(name) = explicit {
            return name.parse();
        }
        Ok(file.and_then(Format::guess).unwrap_or(Format::Yaml))
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Format {
    type Err = PipesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "yaml" | "yml" => Ok(Format::Yaml),
            "json" => Ok(Format::Json),
            "ndjson" => Ok(Format::Ndjson),
            _ => Err(PipesError::config(format!("unsupported format: {}", s))),
        }
    }
}

/// Parse a YAML document; empty input yields `null`
pub fn from_yaml_str(content: &str) -> Result<Value, serde_yaml::Error> {
    if content.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_yaml::from_str(content)
}

/// Read a whole document in the given format
pub fn deserialize<R: Read>(mut reader: R, format: Format) -> Result<Value> {
    match format {
        Format::Yaml => {
            let mut content = String::new();
            reader.read_to_string(&mut content).context("Failed to read YAML input")?;
            from_yaml_str(&content).map_err(|e| PipesError::config(format!("invalid yaml: {}", e)).into())
        }
        Format::Json => {
            let mut content = String::new();
            reader.read_to_string(&mut content).context("Failed to read JSON input")?;
            if content.trim().is_empty() {
                return Ok(Value::Null);
            }
            serde_json::from_str(&content).map_err(|e| PipesError::config(format!("invalid json: {}", e)).into())
        }
        Format::Ndjson => {
            let reader = std::io::BufReader::new(reader);
            let docs = NdjsonReader::new(reader).collect::<Result<Vec<_>>>()?;
            Ok(Value::Array(docs))
        }
    }
}

/// Write a whole document in the given format
pub fn serialize<W: Write>(mut writer: W, value: &Value, format: Format) -> Result<()> {
    match format {
        Format::Yaml => serde_yaml::to_writer(&mut writer, value).context("Failed to write YAML")?,
        Format::Json => {
            serde_json::to_writer(&mut writer, value).context("Failed to write JSON")?;
            writeln!(writer)?;
        }
        Format::Ndjson => {
            let Value::Array(docs) = value else {
                return Err(PipesError::config(format!(
                    "cannot write ndjson: not a list ({})",
                    crate::core::path::type_name(value)
                ))
                .into());
            };
            for doc in docs {
                write_ndjson_line(&mut writer, doc)?;
            }
        }
    }
    writer.flush()?;
    Ok(())
}

/// Write documents as they come, materializing them only when the format needs it
pub fn serialize_stream<W, I>(mut writer: W, docs: I, format: Format) -> Result<usize>
where
    W: Write,
    I: Iterator<Item = Result<Value>>,
{
    if format != Format::Ndjson {
        let docs = docs.collect::<Result<Vec<_>>>()?;
        let count = docs.len();
        serialize(writer, &Value::Array(docs), format)?;
        return Ok(count);
    }

    let mut count = 0;
    for doc in docs {
        write_ndjson_line(&mut writer, &doc?)?;
        count += 1;
    }
    writer.flush()?;
    Ok(count)
}

fn write_ndjson_line<W: Write>(writer: &mut W, doc: &Value) -> Result<()> {
    serde_json::to_writer(&mut *writer, doc).context("Failed to write ndjson line")?;
    writeln!(writer)?;
    Ok(())
}

/// Lazy reader of line-delimited JSON documents
///
/// Blank lines are skipped. A malformed line is reported with its line number.
pub struct NdjsonReader<R> {
    lines: std::io::Lines<R>,
    line_no: usize,
}

impl<R: BufRead> NdjsonReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
        }
    }
}

impl<R: BufRead> Iterator for NdjsonReader<R> {
    type Item = Result<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e).context("Failed to read ndjson input")),
            };
            self.line_no += 1;
            if line.trim().is_empty() {
                continue;
            }
            return Some(serde_json::from_str(&line).map_err(|e| {
                PipesError::config(format!("invalid ndjson at line {}: {}", self.line_no, e)).into()
            }));
        }
    }
}
