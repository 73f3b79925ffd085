// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// On-disk layout for files the configuration leaves unset.
//
//   $VALID8_DATA_DIR            (or $XDG_DATA_HOME/valid8, ~/.local/share/valid8)
//   ├── audit.db                verification attempts
//   ├── templates/              reference watermark images
//   └── seed.json               optional institution and certificate seed

use std::path::{Path, PathBuf};

use valid8_core::error::Result;

const AUDIT_DB: &str = "audit.db";
const TEMPLATES: &str = "templates";
const SEED: &str = "seed.json";

/// Resolved default locations under one data root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    /// Layout rooted at the directory named by the environment.
    pub fn from_env() -> Self {
        Self::at(root_from(|key| std::env::var(key).ok()))
    }

    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn audit_db(&self) -> PathBuf {
        self.root.join(AUDIT_DB)
    }

    pub fn templates(&self) -> PathBuf {
        self.root.join(TEMPLATES)
    }

    /// The seed file, when one has been placed in the data root.
    pub fn seed(&self) -> Option<PathBuf> {
        let path = self.root.join(SEED);
        path.is_file().then_some(path)
    }
}

/// Create the parent directory of `path` so a database can be opened there.
pub fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn root_from(var: impl Fn(&str) -> Option<String>) -> PathBuf {
    if let Some(dir) = var("VALID8_DATA_DIR").filter(|v| !v.is_empty()) {
        return PathBuf::from(dir);
    }
    let base = var("XDG_DATA_HOME")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .or_else(|| var("HOME").map(|home| PathBuf::from(home).join(".local").join("share")))
        .unwrap_or_else(std::env::temp_dir);
    base.join("valid8")
}
