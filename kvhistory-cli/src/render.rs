//! Output rendering for fetched history

use clap::ValueEnum;
use kvhistory_core::VersionRecord;
use std::io::{self, Write};

/// Output format of the `kvhistory` command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Aligned columns
    #[default]
    Table,
    /// Pretty-printed JSON array
    Json,
}

const HEADER: [&str; 5] = ["Revision", "Version", "CreateRevision", "ModRevision", "Value"];
const PADDING: usize = 2;

/// Write `records` to `out` in `format`
pub fn render<W: Write>(out: &mut W, records: &[VersionRecord], format: OutputFormat) -> io::Result<()> {
    match format {
        OutputFormat::Table => render_table(out, records),
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, records)?;
            writeln!(out)
        }
    }
}

fn render_table<W: Write>(out: &mut W, records: &[VersionRecord]) -> io::Result<()> {
    let rows: Vec<[String; 5]> = records
        .iter()
        .map(|r| {
            [
                r.revision.to_string(),
                r.version.to_string(),
                r.create_revision.to_string(),
                r.mod_revision.to_string(),
                r.value.clone(),
            ]
        })
        .collect();

    // The last column is never padded
    let mut widths = [0usize; 4];
    for (i, width) in widths.iter_mut().enumerate() {
        *width = rows
            .iter()
            .map(|row| row[i].chars().count())
            .chain(std::iter::once(HEADER[i].len()))
            .max()
            .unwrap_or(0);
    }

    let header = HEADER.map(str::to_string);
    for row in std::iter::once(&header).chain(rows.iter()) {
        let mut line = String::new();
        for (cell, width) in row.iter().zip(widths.iter()) {
            line.push_str(cell);
            let pad = width - cell.chars().count() + PADDING;
            line.extend(std::iter::repeat(' ').take(pad));
        }
        line.push_str(&row[4]);
        writeln!(out, "{}", line)?;
    }
    Ok(())
}
