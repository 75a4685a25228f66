//! 리뷰 결과 스냅샷(타임스탬프 JSON) 기록기.
//! 쓰기 전용이며, 다시 읽어 상태를 복원하는 용도가 아니다.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use serde::Serialize;

use crate::application::ports::SnapshotWriter;
use crate::domain::review::ReviewResult;

#[derive(Serialize)]
struct SnapshotEnvelope<'a> {
    created_at: String,
    filename: &'a str,
    data: &'a ReviewResult,
}

pub struct JsonSnapshotWriter {
    base_dir: PathBuf,
}

impl JsonSnapshotWriter {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn snapshot_path(&self, filename: &str) -> PathBuf {
        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        self.base_dir.join(format!("{filename}_{timestamp}.json"))
    }
}

impl SnapshotWriter for JsonSnapshotWriter {
    fn persist(&self, filename: &str, result: &ReviewResult) -> Result<PathBuf> {
        fs::create_dir_all(&self.base_dir).with_context(|| {
            format!(
                "failed to create snapshot directory {}",
                self.base_dir.display()
            )
        })?;

        let envelope = SnapshotEnvelope {
            created_at: Local::now().to_rfc3339(),
            filename,
            data: result,
        };

        let path = self.snapshot_path(filename);
        let json = serde_json::to_string_pretty(&envelope)
            .context("failed to serialize review snapshot")?;
        write_snapshot(&path, &json)?;
        Ok(path)
    }
}

fn write_snapshot(path: &Path, json: &str) -> Result<()> {
    fs::write(path, json)
        .with_context(|| format!("failed to write snapshot to {}", path.display()))
}
