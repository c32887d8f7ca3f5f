use std::fmt;
use std::fs::{self, Metadata};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::{DateTime, Utc};

use super::entry::DirEntry;
use super::error::FsError;

const EDITABLE_MIME_TYPES: &[&str] = &["text/plain", "application/x-sh"];

/// A client supplied, slash separated path relative to a node root.
///
/// The absolute path and the metadata are resolved lazily, once per
/// instance, and never invalidated. Build a fresh value per request; an
/// instance held across a concurrent mutation may report stale metadata.
#[derive(Debug)]
pub struct LogicalPath {
    root: PathBuf,
    /// Normalized segments, `..` already folded.
    segments: Vec<String>,
    /// Set when `..` climbs above the root or a segment is unusable.
    escapes: bool,
    logical: String,
    abs: OnceLock<PathBuf>,
    meta: OnceLock<Metadata>,
}

impl LogicalPath {
    /// `root` should already be canonical (node managers canonicalize it
    /// once at startup). Leading slashes are stripped and an empty path
    /// names the root itself.
    pub fn new(root: impl Into<PathBuf>, logical: &str) -> Self {
        let logical = logical.trim_start_matches('/');
        let mut segments: Vec<String> = Vec::new();
        let mut escapes = false;
        for segment in logical.split('/') {
            match segment {
                "" | "." => {}
                ".." => escapes |= segments.pop().is_none(),
                s if s.contains('\\') || s.contains('\0') => escapes = true,
                s => segments.push(s.to_string()),
            }
        }
        Self {
            root: root.into(),
            segments,
            escapes,
            logical: logical.to_string(),
            abs: OnceLock::new(),
            meta: OnceLock::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The path as the client sent it, without leading slashes.
    pub fn logical(&self) -> &str {
        &self.logical
    }

    pub fn is_root(&self) -> bool {
        !self.escapes && self.segments.is_empty()
    }

    /// Absolute location of the path below the root.
    ///
    /// `..` segments are folded lexically and may never climb above the
    /// root. Symlinks are then resolved on the deepest existing ancestor,
    /// which must still live under the root. Either escape is reported as
    /// `PathNotFound`.
    pub fn absolute_path(&self) -> Result<&Path, FsError> {
        if let Some(abs) = self.abs.get() {
            return Ok(abs);
        }
        let resolved = self.resolve()?;
        Ok(self.abs.get_or_init(|| resolved))
    }

    fn resolve(&self) -> Result<PathBuf, FsError> {
        if self.escapes {
            return Err(FsError::path_not_found(&self.logical));
        }
        let mut abs = self.root.clone();
        abs.extend(&self.segments);

        let canonical_root = self
            .root
            .canonicalize()
            .unwrap_or_else(|_| self.root.clone());
        let mut ancestor = abs.as_path();
        loop {
            if let Ok(canonical) = ancestor.canonicalize() {
                if !canonical.starts_with(&canonical_root) {
                    tracing::debug!(
                        path = %self.logical,
                        target = %canonical.display(),
                        "logical path escapes node root"
                    );
                    return Err(FsError::path_not_found(&self.logical));
                }
                break;
            }
            match ancestor.parent() {
                Some(parent) if parent.starts_with(&self.root) => ancestor = parent,
                _ => break,
            }
        }

        Ok(abs)
    }

    pub fn exists(&self) -> bool {
        self.metadata().is_ok()
    }

    pub fn metadata(&self) -> Result<&Metadata, FsError> {
        if let Some(meta) = self.meta.get() {
            return Ok(meta);
        }
        let abs = self.absolute_path()?;
        let meta = fs::metadata(abs).map_err(|e| FsError::from_io(&self.logical, e))?;
        Ok(self.meta.get_or_init(|| meta))
    }

    pub fn is_dir(&self) -> Result<bool, FsError> {
        Ok(self.metadata()?.is_dir())
    }

    /// True when the path exists and is not a directory.
    pub fn is_file(&self) -> bool {
        self.metadata().map(|m| !m.is_dir()).unwrap_or(false)
    }

    pub fn size(&self) -> Result<u64, FsError> {
        Ok(self.metadata()?.len())
    }

    pub fn modified(&self) -> Result<DateTime<Utc>, FsError> {
        let modified = self
            .metadata()?
            .modified()
            .map_err(|e| FsError::from_io(&self.logical, e))?;
        Ok(DateTime::<Utc>::from(modified))
    }

    /// Final component of the path, or the root directory's own name.
    pub fn name(&self) -> String {
        match self.segments.last() {
            Some(name) => name.clone(),
            None => self
                .root
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "/".to_string()),
        }
    }

    /// Plain text and shell scripts may be edited in place.
    pub fn editable(&self) -> bool {
        if !self.is_file() {
            return false;
        }
        let Ok(abs) = self.absolute_path() else {
            return false;
        };
        mime_guess::from_path(abs)
            .first()
            .map(|mime| EDITABLE_MIME_TYPES.contains(&mime.essence_str()))
            .unwrap_or(false)
    }

    pub fn entry(&self) -> Result<DirEntry, FsError> {
        let meta = self.metadata()?;
        Ok(DirEntry {
            name: self.name(),
            size: meta.len(),
            is_dir: meta.is_dir(),
            modified: self.modified()?,
            editable: self.editable(),
            parent: None,
        })
    }

    /// Logical path of a direct child.
    pub fn child(&self, name: &str) -> LogicalPath {
        let logical = if self.logical.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", self.logical.trim_end_matches('/'), name)
        };
        LogicalPath::new(self.root.clone(), &logical)
    }

    /// Direct children of a directory, directories first then by name.
    /// A non-directory lists as itself.
    pub fn list(&self, show_hidden: bool) -> Result<Vec<DirEntry>, FsError> {
        if !self.is_dir()? {
            return Ok(vec![self.entry()?]);
        }

        let abs = self.absolute_path()?;
        let read_dir = fs::read_dir(abs).map_err(|e| FsError::from_io(&self.logical, e))?;
        let mut entries = Vec::new();
        for item in read_dir {
            let item = item.map_err(|e| FsError::from_io(&self.logical, e))?;
            let name = item.file_name().to_string_lossy().into_owned();
            if !show_hidden && name.starts_with('.') {
                continue;
            }
            match self.child(&name).entry() {
                Ok(entry) => entries.push(entry),
                // dangling symlinks and entries removed mid-listing
                Err(e) => tracing::debug!(name = %name, error = %e, "skipping entry"),
            }
        }

        entries.sort_by(|a, b| b.is_dir.cmp(&a.is_dir).then_with(|| a.name.cmp(&b.name)));
        Ok(entries)
    }

    /// Create the directory and any missing ancestors.
    pub fn mkdir(&self) -> Result<(), FsError> {
        let abs = self.absolute_path()?;
        if abs.exists() {
            return Err(FsError::AlreadyExists(self.logical.clone()));
        }
        fs::create_dir_all(abs).map_err(|e| FsError::from_io(&self.logical, e))
    }

    pub fn ensure_parent_exists(&self) -> Result<(), FsError> {
        let abs = self.absolute_path()?;
        match abs.parent() {
            Some(parent) if !self.is_root() => {
                fs::create_dir_all(parent).map_err(|e| FsError::from_io(&self.logical, e))
            }
            _ => Ok(()),
        }
    }

    /// Rename within the same parent directory. Returns the new path.
    ///
    /// The destination must not exist. Only the atomicity of the
    /// underlying `rename(2)` is guaranteed: of two racing renames of the
    /// same path, the loser observes `PathNotFound`.
    pub fn rename(&self, new_name: &str) -> Result<LogicalPath, FsError> {
        if new_name.is_empty()
            || new_name == "."
            || new_name == ".."
            || new_name.contains('/')
            || new_name.contains('\\')
        {
            return Err(FsError::invalid_path(new_name));
        }
        if self.is_root() {
            return Err(FsError::invalid_path("cannot rename the node root"));
        }

        let abs = self.absolute_path()?;
        fs::symlink_metadata(abs).map_err(|e| FsError::from_io(&self.logical, e))?;

        let parent = abs
            .parent()
            .ok_or_else(|| FsError::invalid_path(&self.logical))?;
        let dest = parent.join(new_name);
        if fs::symlink_metadata(&dest).is_ok() {
            return Err(FsError::AlreadyExists(new_name.to_string()));
        }
        fs::rename(abs, &dest).map_err(|e| FsError::from_io(&self.logical, e))?;

        let mut renamed = self.segments[..self.segments.len() - 1].to_vec();
        renamed.push(new_name.to_string());
        Ok(LogicalPath::new(self.root.clone(), &renamed.join("/")))
    }

    /// Remove the path. A non-empty directory is only removed when
    /// `recursive` is set; otherwise `NotEmpty` is returned and nothing
    /// is touched.
    pub fn delete(&self, recursive: bool) -> Result<(), FsError> {
        if self.is_root() {
            return Err(FsError::invalid_path("cannot delete the node root"));
        }
        let abs = self.absolute_path()?;
        let meta = fs::symlink_metadata(abs).map_err(|e| FsError::from_io(&self.logical, e))?;

        if !meta.is_dir() {
            return fs::remove_file(abs).map_err(|e| FsError::from_io(&self.logical, e));
        }
        if recursive {
            return fs::remove_dir_all(abs).map_err(|e| FsError::from_io(&self.logical, e));
        }

        let mut children = fs::read_dir(abs).map_err(|e| FsError::from_io(&self.logical, e))?;
        if children.next().is_some() {
            return Err(FsError::NotEmpty(self.logical.clone()));
        }
        fs::remove_dir(abs).map_err(|e| FsError::from_io(&self.logical, e))
    }

    /// Whole file content as text. Invalid UTF-8 is replaced.
    pub fn read_text(&self) -> Result<String, FsError> {
        if self.is_dir()? {
            return Err(FsError::NotAFile(self.logical.clone()));
        }
        let bytes = fs::read(self.absolute_path()?).map_err(|e| FsError::from_io(&self.logical, e))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

impl fmt::Display for LogicalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.segments.join("/"))
    }
}
