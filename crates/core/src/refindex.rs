//! Cross-reference index: def key -> all references to it.
//!
//! Reference volume dominates memory, so buckets are keyed by a 64-bit
//! xxh3 of the target tuple instead of the full key string; lookups
//! re-check the exact target against each ref, which makes a hash
//! collision a non-event. A def-key set is kept separately for integrity
//! checks.

use crate::byterange::{ByteOffsets, ByteRange, FileByteRanges};
use crate::error::{Error, Result};
use crate::graph::{Def, DefKey, Ref, UnitKey};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use xxhash_rust::xxh3::xxh3_64;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
struct TargetKey {
    repo: String,
    unit_type: String,
    unit: String,
    path: String,
}

impl TargetKey {
    fn of_def(def: &Def) -> Self {
        Self {
            repo: def.key.repo.clone(),
            unit_type: def.key.unit_type.clone(),
            unit: def.key.unit.clone(),
            path: def.key.path.clone(),
        }
    }

    fn of_ref(r: &Ref) -> Self {
        Self {
            repo: r.def_repo.clone(),
            unit_type: r.def_unit_type.clone(),
            unit: r.def_unit.clone(),
            path: r.def_path.clone(),
        }
    }

    fn of_key(key: &DefKey) -> Self {
        Self {
            repo: key.repo.clone(),
            unit_type: key.unit_type.clone(),
            unit: key.unit.clone(),
            path: key.path.clone(),
        }
    }

    fn bucket_key(&self) -> u64 {
        let mut buf = Vec::with_capacity(
            self.repo.len() + self.unit_type.len() + self.unit.len() + self.path.len() + 3,
        );
        for (i, part) in [&self.repo, &self.unit_type, &self.unit, &self.path]
            .iter()
            .enumerate()
        {
            if i > 0 {
                buf.push(0);
            }
            buf.extend_from_slice(part.as_bytes());
        }
        xxh3_64(&buf)
    }
}

/// The cross-reference index. Not safe for concurrent writers; readers
/// must honor the `ready` gate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefIndex {
    defs: HashSet<TargetKey>,
    /// Which unit each def belongs to, for selective replacement.
    def_units: HashMap<UnitKey, Vec<TargetKey>>,
    buckets: HashMap<u64, Vec<Ref>>,
    ready: bool,
}

impl RefIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn def_count(&self) -> usize {
        self.defs.len()
    }

    pub fn ref_count(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    /// Construct the index from scratch. Input refs must carry normalized
    /// byte ranges. On failure the index stays not-ready.
    pub fn build(
        &mut self,
        defs: &[Def],
        refs: &[Ref],
        ranges: &FileByteRanges,
        offsets: &ByteOffsets,
    ) -> Result<()> {
        self.ready = false;
        let mut next = RefIndex::new();
        next.insert(defs, refs, ranges, offsets)?;
        next.ready = true;
        *self = next;
        Ok(())
    }

    /// Replace the defs and refs of every source unit present in the
    /// input, leaving other units untouched. Idempotent under identical
    /// input; on failure the pre-update state is kept intact and ready.
    pub fn update(
        &mut self,
        defs: &[Def],
        refs: &[Ref],
        ranges: &FileByteRanges,
        offsets: &ByteOffsets,
    ) -> Result<()> {
        let mut touched: BTreeSet<UnitKey> = BTreeSet::new();
        for def in defs {
            touched.insert(UnitKey {
                unit_type: def.key.unit_type.clone(),
                unit: def.key.unit.clone(),
            });
        }
        for r in refs {
            touched.insert(r.unit_key());
        }

        // Validate into a candidate and swap only on success.
        let mut next = self.clone();
        for unit in &touched {
            next.evict_unit(unit);
        }
        next.insert(defs, refs, ranges, offsets)?;
        next.ready = true;
        *self = next;
        Ok(())
    }

    /// All references to a def, ascending by (repo, file, start). A def
    /// with no references yields an empty vec, not an error.
    pub fn references_to(&self, key: &DefKey) -> Result<Vec<Ref>> {
        if !self.ready {
            return Err(Error::NotReady);
        }
        let target = TargetKey::of_key(key);
        let refs = match self.buckets.get(&target.bucket_key()) {
            Some(bucket) => bucket
                .iter()
                .filter(|r| r.points_to(key))
                .cloned()
                .collect(),
            None => Vec::new(),
        };
        Ok(refs)
    }

    fn evict_unit(&mut self, unit: &UnitKey) {
        if let Some(targets) = self.def_units.remove(unit) {
            for target in targets {
                self.defs.remove(&target);
            }
        }
        for bucket in self.buckets.values_mut() {
            bucket.retain(|r| r.unit_type != unit.unit_type || r.unit != unit.unit);
        }
        self.buckets.retain(|_, bucket| !bucket.is_empty());
    }

    fn insert(
        &mut self,
        defs: &[Def],
        refs: &[Ref],
        ranges: &FileByteRanges,
        offsets: &ByteOffsets,
    ) -> Result<()> {
        for def in defs {
            let target = TargetKey::of_def(def);
            let unit = UnitKey {
                unit_type: def.key.unit_type.clone(),
                unit: def.key.unit.clone(),
            };
            if self.defs.insert(target.clone()) {
                self.def_units.entry(unit).or_default().push(target);
            }
        }

        for r in refs {
            let target = TargetKey::of_ref(r);
            if !self.defs.contains(&target) {
                return Err(Error::UnknownDef {
                    key: format!("{}/{}/{}/{}", r.def_repo, r.def_unit_type, r.def_unit, r.def_path),
                });
            }
            check_bounds(r, ranges, offsets)?;
        }
        check_unit_overlaps(refs)?;

        for r in refs {
            let target = TargetKey::of_ref(r);
            self.buckets
                .entry(target.bucket_key())
                .or_default()
                .push(r.clone());
        }
        for bucket in self.buckets.values_mut() {
            bucket.sort_by(|a, b| {
                (&a.repo, &a.file, a.start).cmp(&(&b.repo, &b.file, b.start))
            });
            bucket.dedup();
        }
        Ok(())
    }
}

fn check_bounds(r: &Ref, ranges: &FileByteRanges, offsets: &ByteOffsets) -> Result<()> {
    if r.end < r.start {
        return Err(Error::OffsetOutOfRange {
            file: r.file.clone(),
            offset: r.end,
            len: r.start,
        });
    }
    if let Some(len) = offsets.byte_len(&r.file) {
        if r.end > len {
            return Err(Error::OffsetOutOfRange {
                file: r.file.clone(),
                offset: r.end,
                len,
            });
        }
    }
    // A recorded range set for the file pins refs to canonical ranges.
    if let Some(known) = ranges.ranges(&r.file) {
        let range = ByteRange {
            start: r.start,
            end: r.end,
        };
        if !known.contains(&range) {
            return Err(Error::OffsetOutOfRange {
                file: r.file.clone(),
                offset: r.start,
                len: r.end,
            });
        }
    }
    Ok(())
}

/// Two refs from the same source unit must not overlap in one file.
/// Units touched by an update were already evicted, so the incoming batch
/// is the whole population for each checked unit.
fn check_unit_overlaps(refs: &[Ref]) -> Result<()> {
    let mut per_unit_file: HashMap<(UnitKey, &str), Vec<&Ref>> = HashMap::new();
    for r in refs {
        per_unit_file
            .entry((r.unit_key(), r.file.as_str()))
            .or_default()
            .push(r);
    }

    for ((unit, file), mut group) in per_unit_file {
        group.sort_by_key(|r| (r.start, r.end));
        for pair in group.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            // Identical duplicate ranges collapse at insert time.
            if a.start == b.start && a.end == b.end {
                continue;
            }
            if b.start < a.end {
                return Err(Error::OverlappingRefs {
                    unit: unit.to_string(),
                    file: file.to_string(),
                    first_start: a.start,
                    first_end: a.end,
                    second_start: b.start,
                    second_end: b.end,
                });
            }
        }
    }
    Ok(())
}
