//! Output table manifest
//!
//! Sidecar JSON file next to the CSV describing columns, primary key and
//! whether the table should be loaded incrementally.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TableManifest {
    pub columns: Vec<String>,
    pub primary_key: Vec<String>,
    pub incremental: bool,
}

impl TableManifest {
    /// `<table>.csv` → `<table>.csv.manifest`
    pub fn path_for(table_path: &Path) -> PathBuf {
        let mut name = table_path.as_os_str().to_os_string();
        name.push(".manifest");
        PathBuf::from(name)
    }

    pub fn write(&self, table_path: &Path) -> Result<PathBuf> {
        let path = Self::path_for(table_path);
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| crate::error::ExtractorError::Output(e.to_string()))?;
        fs::write(&path, content)?;
        log::info!("Manifest written to {}", path.display());
        Ok(path)
    }
}
