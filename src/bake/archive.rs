//! Snapshot archive (de)serialization — the only persisted state in the
//! system (`SPEC_FULL.md` §6).

use serde::{Deserialize, Serialize};

use crate::bake::recorder::Snapshot;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveMetadata {
    pub sim_start: f64,
    pub sim_end: f64,
    pub total_days: f64,
    pub tracer: String,
}

/// The on-disk snapshot archive format (§6). `version` is bumped whenever
/// the on-disk shape changes; readers should reject unknown versions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotArchive {
    pub version: u32,
    pub timestamp: String,
    pub metadata: ArchiveMetadata,
    pub snapshots: Vec<Snapshot>,
}

pub const ARCHIVE_VERSION: u32 = 1;

impl SnapshotArchive {
    pub fn new(metadata: ArchiveMetadata, snapshots: Vec<Snapshot>, timestamp: impl Into<String>) -> Self {
        SnapshotArchive {
            version: ARCHIVE_VERSION,
            timestamp: timestamp.into(),
            metadata,
            snapshots,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineStats;

    #[test]
    fn round_trips_through_json() {
        let archive = SnapshotArchive::new(
            ArchiveMetadata {
                sim_start: 0.0,
                sim_end: 30.0,
                total_days: 30.0,
                tracer: "Cs-137".to_string(),
            },
            vec![Snapshot {
                day: 0.0,
                particle_count: 0,
                stats: EngineStats::new(),
                particles: Vec::new(),
            }],
            "2026-07-27T00:00:00Z",
        );
        let text = archive.to_json().unwrap();
        let parsed = SnapshotArchive::from_json(&text).unwrap();
        assert_eq!(parsed.version, ARCHIVE_VERSION);
        assert_eq!(parsed.snapshots.len(), 1);
        assert_eq!(parsed.metadata.tracer, "Cs-137");
    }

    #[test]
    fn malformed_json_is_rejected() {
        assert!(SnapshotArchive::from_json("not json").is_err());
    }
}
