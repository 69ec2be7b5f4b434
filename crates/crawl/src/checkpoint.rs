// ABOUTME: Checkpoint store recording completed targets for safe resume.
// ABOUTME: Reads permissively (missing or corrupt means fresh) and rewrites atomically after every target.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::CrawlError;

#[derive(Debug, Default, Serialize, Deserialize)]
struct CheckpointFile {
    #[serde(default)]
    completed_queries: Vec<String>,
}

/// The ordered set of completed targets, mirrored to a JSON file.
#[derive(Debug)]
pub struct Checkpoint {
    path: PathBuf,
    completed: Vec<String>,
    index: HashSet<String>,
}

impl Checkpoint {
    /// Loads `path`, starting empty when it is missing or unreadable.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let completed = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<CheckpointFile>(&raw) {
                Ok(file) => {
                    info!(path = %path.display(), completed = file.completed_queries.len(), "resumed checkpoint");
                    file.completed_queries
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "checkpoint unreadable, starting fresh");
                    Vec::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "checkpoint unreadable, starting fresh");
                Vec::new()
            }
        };

        let mut index = HashSet::new();
        let completed = completed.into_iter().filter(|q| index.insert(q.clone())).collect();
        Self {
            path,
            completed,
            index,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn completed(&self) -> &[String] {
        &self.completed
    }

    pub fn is_done(&self, target: &str) -> bool {
        self.index.contains(target)
    }

    /// Targets not yet completed, in input order.
    pub fn remaining<'a>(&self, targets: &'a [String]) -> Vec<&'a String> {
        targets.iter().filter(|t| !self.is_done(t)).collect()
    }

    /// Records a completed target and persists the full set immediately.
    pub fn mark_done(&mut self, target: &str) -> Result<(), CrawlError> {
        if self.index.insert(target.to_string()) {
            self.completed.push(target.to_string());
        }
        self.save()
    }

    /// Writes the full set to a temporary file and renames it over the checkpoint.
    pub fn save(&self) -> Result<(), CrawlError> {
        let io_err = |source| CrawlError::Checkpoint {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let file = CheckpointFile {
            completed_queries: self.completed.clone(),
        };
        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| io_err(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(io_err)?;
        Ok(())
    }
}
