//! Generated project files
//!
//! A project is an ordered list of `{path, content}` pairs exactly as the model
//! produced them. Path uniqueness is assumed, not enforced.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectFile {
    pub path: String,
    pub content: String,
}

impl ProjectFile {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectStructure {
    files: Vec<ProjectFile>,
}

impl ProjectStructure {
    pub fn new(files: Vec<ProjectFile>) -> Self {
        Self { files }
    }

    pub fn files(&self) -> &[ProjectFile] {
        &self.files
    }

    pub fn into_files(self) -> Vec<ProjectFile> {
        self.files
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn get(&self, path: &str) -> Option<&ProjectFile> {
        self.files.iter().find(|f| f.path == path)
    }

    /// Swap in a new body for the first file at `path`. Returns false when no file matches.
    pub fn replace_content(&mut self, path: &str, content: impl Into<String>) -> bool {
        match self.files.iter_mut().find(|f| f.path == path) {
            Some(file) => {
                file.content = content.into();
                true
            }
            None => false,
        }
    }

    /// Sorted path listing for display.
    pub fn tree(&self) -> String {
        let mut paths: Vec<&str> = self.files.iter().map(|f| f.path.as_str()).collect();
        paths.sort_unstable();
        paths.join("\n")
    }

    /// Write every file below `root`, creating parent directories as needed.
    ///
    /// Paths that are absolute or climb out of `root` are rejected before anything
    /// is written.
    pub fn write_to(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let targets = self
            .files
            .iter()
            .map(|file| Ok((safe_join(root, &file.path)?, file)))
            .collect::<Result<Vec<_>>>()?;

        let mut written = Vec::with_capacity(targets.len());
        for (target, file) in targets {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            fs::write(&target, &file.content)
                .with_context(|| format!("Failed to write {}", target.display()))?;
            tracing::debug!(path = %target.display(), "wrote project file");
            written.push(target);
        }
        Ok(written)
    }
}

impl From<Vec<ProjectFile>> for ProjectStructure {
    fn from(files: Vec<ProjectFile>) -> Self {
        Self::new(files)
    }
}

fn safe_join(root: &Path, relative: &str) -> Result<PathBuf> {
    let relative = Path::new(relative);
    if relative.as_os_str().is_empty() {
        anyhow::bail!("Generated file has an empty path");
    }
    let mut joined = root.to_path_buf();
    for component in relative.components() {
        match component {
            Component::Normal(part) => joined.push(part),
            Component::CurDir => {}
            _ => anyhow::bail!(
                "Refusing to write outside the output directory: {}",
                relative.display()
            ),
        }
    }
    Ok(joined)
}
