use anyhow::Result;
use std::path::{Path, PathBuf};
use xref_core::RefIndex;

/// Sled-backed cache of built reference indexes, keyed by commit, so
/// repeated lookups against the same commit skip the rebuild.
pub struct IndexCache {
    db: sled::Db,
    db_path: PathBuf,
}

impl IndexCache {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db_path = path.as_ref().to_path_buf();
        let config = sled::Config::new()
            .path(&db_path)
            .cache_capacity(64 * 1024 * 1024)
            .flush_every_ms(Some(1000));

        let db = config.open()?;
        Ok(Self { db, db_path })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn save(&self, commit: &str, index: &RefIndex) -> Result<()> {
        let serialized = bincode::serialize(index)?;
        self.db.insert(commit, serialized)?;
        self.db.flush()?;
        Ok(())
    }

    pub fn load(&self, commit: &str) -> Result<Option<RefIndex>> {
        if let Some(data) = self.db.get(commit)? {
            let index = bincode::deserialize(&data)?;
            Ok(Some(index))
        } else {
            Ok(None)
        }
    }

    pub fn invalidate(&self, commit: &str) -> Result<()> {
        self.db.remove(commit)?;
        self.db.flush()?;
        Ok(())
    }

    /// Commits with a cached index.
    pub fn cached_commits(&self) -> Result<Vec<String>> {
        let mut commits = Vec::new();
        for key in self.db.iter().keys().flatten() {
            if let Ok(commit) = String::from_utf8(key.to_vec()) {
                commits.push(commit);
            }
        }
        Ok(commits)
    }
}
