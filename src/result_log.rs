//! # result_log
//!
//! Append-only record of every cycle, one text file each:
//!
//! ```text
//! trades/
//! └── 2026-10-19/
//!     ├── cycle_14-03-07-112.txt
//!     └── cycle_14-03-17-415.txt
//! ```
//!
//! Each file holds `key: value` lines for the top-level fields of the cycle
//! JSON (nested values as compact JSON) plus `recorded_at`. Files are never
//! overwritten: a name already taken within the same millisecond gets a
//! `_1`, `_2`, … suffix. Write failures are logged and swallowed; the log
//! never stops a cycle.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::models::CycleResult;

#[derive(Debug, Clone)]
pub struct ResultLog {
    root: PathBuf,
}

impl ResultLog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Write one cycle. Returns the file path, or `None` if the write failed.
    pub async fn record(&self, result: &CycleResult) -> Option<PathBuf> {
        let now = Utc::now();
        let dir = self.root.join(now.format("%Y-%m-%d").to_string());
        let stem = format!("cycle_{}", now.format("%H-%M-%S-%3f"));
        let body = render(result, now);

        let written = async {
            tokio::fs::create_dir_all(&dir).await?;
            write_new(&dir, &stem, body.as_bytes()).await
        };

        match written.await {
            Ok(path) => {
                debug!(path = %path.display(), kind = result.kind(), "cycle recorded");
                Some(path)
            }
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "⚠️  Could not write cycle result");
                None
            }
        }
    }
}

/// Create `{stem}.txt`, or the first free `{stem}_{n}.txt`, and fill it.
async fn write_new(dir: &Path, stem: &str, body: &[u8]) -> std::io::Result<PathBuf> {
    let mut seq = 0u32;
    loop {
        let name = if seq == 0 { format!("{stem}.txt") } else { format!("{stem}_{seq}.txt") };
        let path = dir.join(name);
        let opened = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await;

        match opened {
            Ok(mut file) => {
                file.write_all(body).await?;
                file.flush().await?;
                return Ok(path);
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => seq += 1,
            Err(e) => return Err(e),
        }
    }
}

fn render(result: &CycleResult, recorded_at: DateTime<Utc>) -> String {
    let mut out = String::new();
    if let Ok(Value::Object(fields)) = serde_json::to_value(result) {
        for (key, value) in fields {
            let text = match value {
                Value::String(s) => s,
                other => other.to_string(),
            };
            out.push_str(&format!("{key}: {text}\n"));
        }
    }
    out.push_str(&format!("recorded_at: {}\n", recorded_at.to_rfc3339()));
    out
}
