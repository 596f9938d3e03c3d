use crate::error::{Error, Result};
use crate::graph::{Def, Ref};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// What kind of offsets an analyzer reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OffsetKind {
    /// Offsets are byte offsets already.
    Byte,
    /// Offsets count characters and must be converted.
    Char,
    /// The analyzer did not say; treated as byte offsets and validated.
    Unspecified,
}

/// A half-open byte range `[start, end)`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ByteRange {
    pub start: u32,
    pub end: u32,
}

impl ByteRange {
    pub fn overlaps(&self, other: &ByteRange) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Per-file character-index to byte-offset tables.
///
/// For each recorded file, `table[i]` is the byte offset of the `i`-th
/// character; one trailing entry holds the total byte length, so an
/// exclusive end offset one past the last character still converts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ByteOffsets(HashMap<String, Vec<u32>>);

impl ByteOffsets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, file: &str, content: &str) {
        let mut table: Vec<u32> = content.char_indices().map(|(b, _)| b as u32).collect();
        table.push(content.len() as u32);
        self.0.insert(file.to_string(), table);
    }

    pub fn has_file(&self, file: &str) -> bool {
        self.0.contains_key(file)
    }

    /// Total byte length of a recorded file.
    pub fn byte_len(&self, file: &str) -> Option<u32> {
        self.0.get(file).and_then(|t| t.last().copied())
    }

    /// Convert a character offset to a byte offset.
    pub fn to_byte(&self, file: &str, char_offset: u32) -> Result<u32> {
        let table = self.0.get(file).ok_or_else(|| Error::MissingOffsets {
            file: file.to_string(),
        })?;
        table
            .get(char_offset as usize)
            .copied()
            .ok_or_else(|| Error::OffsetOutOfRange {
                file: file.to_string(),
                offset: char_offset,
                len: table.len().saturating_sub(1) as u32,
            })
    }

    fn check_byte(&self, file: &str, offset: u32) -> Result<()> {
        match self.byte_len(file) {
            Some(len) if offset > len => Err(Error::OffsetOutOfRange {
                file: file.to_string(),
                offset,
                len,
            }),
            // Unrecorded files cannot be validated.
            _ => Ok(()),
        }
    }
}

/// Sorted byte ranges per file, accumulated during normalization and used
/// to validate references at index-build time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileByteRanges(HashMap<String, Vec<ByteRange>>);

impl FileByteRanges {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, file: &str, range: ByteRange) {
        let ranges = self.0.entry(file.to_string()).or_default();
        match ranges.binary_search(&range) {
            Ok(_) => {} // already recorded
            Err(pos) => ranges.insert(pos, range),
        }
    }

    pub fn ranges(&self, file: &str) -> Option<&[ByteRange]> {
        self.0.get(file).map(|v| v.as_slice())
    }

    pub fn file_count(&self) -> usize {
        self.0.len()
    }
}

/// The def/ref payload produced by analyzing one or more source units.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphOutput {
    #[serde(default)]
    pub defs: Vec<Def>,
    #[serde(default)]
    pub refs: Vec<Ref>,
}

/// Normalize analyzer output to a single canonical byte-offset space per
/// file. Character offsets are converted through the recorded tables; byte
/// offsets are validated against recorded file lengths. Returns the byte
/// ranges seen per file.
pub fn normalize(
    out: &mut GraphOutput,
    kind: OffsetKind,
    offsets: &ByteOffsets,
) -> Result<FileByteRanges> {
    let mut ranges = FileByteRanges::new();

    for def in &mut out.defs {
        let (start, end) = convert(kind, offsets, &def.file, def.def_start, def.def_end)?;
        def.def_start = start;
        def.def_end = end;
        ranges.insert(&def.file, ByteRange { start, end });
    }
    for r in &mut out.refs {
        let (start, end) = convert(kind, offsets, &r.file, r.start, r.end)?;
        r.start = start;
        r.end = end;
        ranges.insert(&r.file, ByteRange { start, end });
    }

    Ok(ranges)
}

fn convert(
    kind: OffsetKind,
    offsets: &ByteOffsets,
    file: &str,
    start: u32,
    end: u32,
) -> Result<(u32, u32)> {
    match kind {
        OffsetKind::Char => Ok((offsets.to_byte(file, start)?, offsets.to_byte(file, end)?)),
        OffsetKind::Byte | OffsetKind::Unspecified => {
            offsets.check_byte(file, start)?;
            offsets.check_byte(file, end)?;
            Ok((start, end))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ref_at(file: &str, start: u32, end: u32) -> Ref {
        Ref {
            file: file.to_string(),
            start,
            end,
            ..Ref::default()
        }
    }

    #[test]
    fn test_char_to_byte_multibyte() {
        let mut offsets = ByteOffsets::new();
        // 'é' is two bytes; characters after it shift right by one byte.
        offsets.record("src/a.rs", "héllo");

        assert_eq!(offsets.to_byte("src/a.rs", 0).unwrap(), 0);
        assert_eq!(offsets.to_byte("src/a.rs", 1).unwrap(), 1);
        assert_eq!(offsets.to_byte("src/a.rs", 2).unwrap(), 3);
        // Exclusive end one past the last character.
        assert_eq!(offsets.to_byte("src/a.rs", 5).unwrap(), 6);
        assert!(offsets.to_byte("src/a.rs", 6).is_err());
    }

    #[test]
    fn test_missing_offsets_for_char_kind() {
        let offsets = ByteOffsets::new();
        let mut out = GraphOutput {
            refs: vec![ref_at("src/a.rs", 0, 4)],
            ..GraphOutput::default()
        };
        let err = normalize(&mut out, OffsetKind::Char, &offsets).unwrap_err();
        assert!(matches!(err, Error::MissingOffsets { .. }));
    }

    #[test]
    fn test_normalize_converts_char_offsets() {
        let mut offsets = ByteOffsets::new();
        offsets.record("src/a.rs", "héllo wörld");

        let mut out = GraphOutput {
            refs: vec![ref_at("src/a.rs", 6, 11)],
            ..GraphOutput::default()
        };
        let ranges = normalize(&mut out, OffsetKind::Char, &offsets).unwrap();

        assert_eq!(out.refs[0].start, 7);
        assert_eq!(out.refs[0].end, 13);
        assert_eq!(
            ranges.ranges("src/a.rs").unwrap(),
            &[ByteRange { start: 7, end: 13 }]
        );
    }

    #[test]
    fn test_byte_offsets_validated_against_file_len() {
        let mut offsets = ByteOffsets::new();
        offsets.record("src/a.rs", "fn main() {}");

        let mut out = GraphOutput {
            refs: vec![ref_at("src/a.rs", 3, 40)],
            ..GraphOutput::default()
        };
        let err = normalize(&mut out, OffsetKind::Unspecified, &offsets).unwrap_err();
        assert!(matches!(err, Error::OffsetOutOfRange { offset: 40, .. }));
    }

    #[test]
    fn test_unrecorded_file_passes_byte_validation() {
        let offsets = ByteOffsets::new();
        let mut out = GraphOutput {
            refs: vec![ref_at("src/unknown.rs", 3, 40)],
            ..GraphOutput::default()
        };
        assert!(normalize(&mut out, OffsetKind::Byte, &offsets).is_ok());
    }

    #[test]
    fn test_ranges_sorted_and_deduped() {
        let mut fbr = FileByteRanges::new();
        fbr.insert("a.rs", ByteRange { start: 20, end: 24 });
        fbr.insert("a.rs", ByteRange { start: 5, end: 9 });
        fbr.insert("a.rs", ByteRange { start: 20, end: 24 });

        assert_eq!(
            fbr.ranges("a.rs").unwrap(),
            &[
                ByteRange { start: 5, end: 9 },
                ByteRange { start: 20, end: 24 }
            ]
        );
    }

    #[test]
    fn test_overlap() {
        let a = ByteRange { start: 0, end: 10 };
        let b = ByteRange { start: 9, end: 12 };
        let c = ByteRange { start: 10, end: 12 };
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
    }
}
