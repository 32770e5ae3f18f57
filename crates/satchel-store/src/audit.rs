//! Audit trail
//!
//! Every vault mutation is recorded twice: a bounded in-memory ring
//! buffer (last 1000 entries) for quick inspection, and optionally an
//! append-only file. Newlines in details are flattened so a crafted
//! username cannot forge log lines.

use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Mutex;

/// Ring-buffer capacity.
pub const RING_CAPACITY: usize = 1000;

pub struct AuditLog {
    ring: Mutex<VecDeque<String>>,
    file: Option<Mutex<File>>,
}

impl AuditLog {
    /// In-memory only, or with an append-only file when `path` is set.
    pub fn new(path: Option<&Path>) -> io::Result<Self> {
        let file = match path {
            Some(p) => Some(Mutex::new(
                OpenOptions::new().create(true).append(true).open(p)?,
            )),
            None => None,
        };
        Ok(Self {
            ring: Mutex::new(VecDeque::with_capacity(RING_CAPACITY)),
            file,
        })
    }

    /// Record one operation. `detail` is sanitized before writing.
    pub fn record(&self, operation: &str, detail: &str, ok: bool) {
        let line = format!(
            "{} op={} ok={} {}",
            chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
            operation,
            ok,
            sanitize(detail)
        );

        {
            let mut ring = self.ring.lock().unwrap_or_else(|e| e.into_inner());
            if ring.len() == RING_CAPACITY {
                ring.pop_front();
            }
            ring.push_back(line.clone());
        }

        if let Some(file) = &self.file {
            let mut file = file.lock().unwrap_or_else(|e| e.into_inner());
            if let Err(e) = writeln!(file, "{line}") {
                log::warn!("audit file write failed: {e}");
            }
        }
    }

    /// The most recent `max` entries, oldest first. `0` means all.
    pub fn recent(&self, max: usize) -> Vec<String> {
        let ring = self.ring.lock().unwrap_or_else(|e| e.into_inner());
        let take = if max == 0 { ring.len() } else { max.min(ring.len()) };
        ring.iter().skip(ring.len() - take).cloned().collect()
    }
}

fn sanitize(detail: &str) -> String {
    detail.replace(['\n', '\r'], " ")
}
