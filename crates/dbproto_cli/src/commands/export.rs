//! The `export` command: dump a table to CSV or XML.
//!
//! CSV columns are the sorted union of every field name seen across
//! the table; records missing a field leave the cell empty.

use clap::ValueEnum;
use dbproto_core::{Row, Scalar, Server};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Output format for `export`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    /// Comma-separated values with a header row.
    Csv,
    /// A `<records>` document with one `<record>` element per row.
    Xml,
}

/// Exports every record of a table to `file`.
pub fn run(
    server: &Server,
    database: &str,
    table: &str,
    file: &Path,
    format: ExportFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let table = server.database(database)?.table(table)?;
    let rows = table.select_all()?;

    match format {
        ExportFormat::Csv => write_csv(&rows, file)?,
        ExportFormat::Xml => write_xml(&rows, file)?,
    }
    println!("Exported {} records to {}", rows.len(), file.display());
    Ok(())
}

/// Sorted union of field names across all rows.
fn headers(rows: &[Row]) -> Vec<String> {
    let mut set = BTreeSet::new();
    for row in rows {
        for field in row.keys() {
            set.insert(field.clone());
        }
    }
    set.into_iter().collect()
}

fn write_csv(rows: &[Row], path: &Path) -> std::io::Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    let headers = headers(rows);

    let header_line: Vec<String> = headers.iter().map(|h| csv_escape(h)).collect();
    writeln!(out, "{}", header_line.join(","))?;

    for row in rows {
        let cells: Vec<String> = headers
            .iter()
            .map(|field| {
                row.get(field)
                    .map(|value| csv_escape(&value.to_string()))
                    .unwrap_or_default()
            })
            .collect();
        writeln!(out, "{}", cells.join(","))?;
    }
    out.flush()
}

/// RFC 4180 quoting: wrap fields containing commas, quotes, or
/// newlines, doubling embedded quotes.
fn csv_escape(field: &str) -> String {
    if field.contains(['"', ',', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn write_xml(rows: &[Row], path: &Path) -> std::io::Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    writeln!(out, r#"<?xml version="1.0" encoding="UTF-8"?>"#)?;
    writeln!(out, "<records>")?;
    for row in rows {
        writeln!(out, "  <record>")?;
        let mut fields: Vec<(&String, &Scalar)> = row.iter().collect();
        fields.sort_by_key(|(name, _)| name.clone());
        for (name, value) in fields {
            writeln!(
                out,
                r#"    <field name="{}">{}</field>"#,
                xml_escape(name),
                xml_escape(&value.to_string())
            )?;
        }
        writeln!(out, "  </record>")?;
    }
    writeln!(out, "</records>")?;
    out.flush()
}

fn xml_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
