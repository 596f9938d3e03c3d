use anyhow::{bail, Context, Result};
use std::collections::BTreeSet;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use xref_core::{normalize, ByteOffsets, GraphOutput, OffsetKind};

/// Read analyzer graph output on stdin, normalize every offset to the
/// canonical per-file byte space, and write the result to stdout.
pub fn handle_normalize(offset_type: &str, dir: Option<&Path>) -> Result<()> {
    let kind = match offset_type {
        "byte" => OffsetKind::Byte,
        "char" => OffsetKind::Char,
        "unspecified" | "" => OffsetKind::Unspecified,
        other => bail!(
            "unknown offset type '{}'; expected byte, char, or unspecified",
            other
        ),
    };

    let mut output: GraphOutput =
        serde_json::from_reader(io::stdin().lock()).context("failed to decode graph data on stdin")?;

    let mut offsets = ByteOffsets::new();
    if let Some(dir) = dir {
        for file in files_of(&output) {
            let path = dir.join(&file);
            match fs::read_to_string(&path) {
                Ok(content) => offsets.record(&file, &content),
                // Conversion for this file will fail loudly if needed.
                Err(e) => tracing::debug!("cannot read {}: {}", path.display(), e),
            }
        }
    }

    normalize(&mut output, kind, &offsets)?;

    let data = serde_json::to_vec_pretty(&output)?;
    io::stdout().write_all(&data)?;
    Ok(())
}

fn files_of(output: &GraphOutput) -> BTreeSet<String> {
    output
        .defs
        .iter()
        .map(|d| d.file.clone())
        .chain(output.refs.iter().map(|r| r.file.clone()))
        .collect()
}
