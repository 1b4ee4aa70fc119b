#![forbid(unsafe_code)]

//! On-disk capability cache.
//!
//! One entry per target identity: `<identity>.json` holds the structured
//! report and `<identity>.txt` a human readable summary. The cache is written
//! once at the end of probing and read at most once at the start of a run.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::report::FeatureReport;
use crate::ForgeResult;

#[derive(Debug, Clone)]
pub struct ReportCache {
    dir: PathBuf,
}

impl ReportCache {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self { dir: dir.as_ref().to_path_buf() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File name safe form of a target identity.
    pub fn entry_name(identity: &str) -> String {
        identity
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
            .collect()
    }

    fn json_path(&self, identity: &str) -> PathBuf {
        self.dir.join(format!("{}.json", Self::entry_name(identity)))
    }

    fn text_path(&self, identity: &str) -> PathBuf {
        self.dir.join(format!("{}.txt", Self::entry_name(identity)))
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.json_path(identity).is_file()
    }

    /// Cached report for `identity`. Unreadable or undecodable entries are
    /// treated as a miss.
    pub fn load(&self, identity: &str) -> Option<FeatureReport> {
        let path = self.json_path(identity);
        if !path.is_file() {
            debug!(path = %path.display(), "no cached feature report");
            return None;
        }
        let data = match fs::read_to_string(&path) {
            Ok(data) => data,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read cached feature report");
                return None;
            }
        };
        match serde_json::from_str::<FeatureReport>(&data) {
            Ok(report) => Some(report),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "discarding undecodable cached feature report");
                None
            }
        }
    }

    /// Write both forms of the report, keyed by its target identity.
    pub fn store(&self, report: &FeatureReport) -> ForgeResult<()> {
        fs::create_dir_all(&self.dir)?;
        let json = serde_json::to_string_pretty(report)?;
        fs::write(self.json_path(report.target()), json)?;
        fs::write(self.text_path(report.target()), report.to_string())?;
        debug!(target_identity = report.target(), dir = %self.dir.display(), "feature report cached");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_name_is_file_safe() {
        assert_eq!(ReportCache::entry_name("127.0.0.1:4433"), "127.0.0.1_4433");
        assert_eq!(ReportCache::entry_name("a/b c"), "a_b_c");
    }
}
