//! Identity resolution for local documents
//!
//! Walks the configured roots and derives a stable logical ID, title and
//! parent relationship for every qualifying markdown file. The logical ID
//! is the root-relative path, so it survives title changes; directories
//! whose README/INDEX file exists collapse into the directory's own ID.

use ignore::WalkBuilder;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::config::Config;
use crate::error::SyncError;
use crate::logging::*;
use crate::types::ROOT_ID;

/// A discovered local file with its resolved identity
#[derive(Debug, Clone, PartialEq)]
pub struct ScannedFile {
	pub id: String,
	pub path: PathBuf,
	pub title: String,
	pub parent: String,
	pub is_index: bool,
}

/// Scans roots and resolves document identities
pub struct Scanner {
	exclude: Vec<Regex>,
	cutoff: Option<SystemTime>,
	use_document_title: bool,
	title_override: String,
}

impl Scanner {
	pub fn new(config: &Config) -> Result<Self, SyncError> {
		let mut exclude = Vec::new();
		for pattern in &config.exclude_patterns {
			let re = Regex::new(pattern).map_err(|e| SyncError::InvalidConfig {
				message: format!("invalid exclude pattern '{}': {}", pattern, e),
			})?;
			exclude.push(re);
		}

		let cutoff = if config.since_minutes > 0 {
			SystemTime::now().checked_sub(Duration::from_secs(config.since_minutes * 60))
		} else {
			None
		};

		Ok(Scanner {
			exclude,
			cutoff,
			use_document_title: config.use_document_title,
			title_override: config.title.clone(),
		})
	}

	/// Walk one root and resolve every qualifying markdown file.
	/// An unreadable root is fatal; excluded or too-old files are normal
	/// skips.
	pub fn scan(&self, root: &str) -> Result<Vec<ScannedFile>, SyncError> {
		let root_path = PathBuf::from(root);
		let meta = std::fs::metadata(&root_path).map_err(|e| SyncError::Discovery {
			root: root.to_string(),
			source: Box::new(e),
		})?;

		if meta.is_file() {
			// Single-file invocation; the title override applies here only
			return Ok(vec![self.resolve_single(&root_path)]);
		}

		let mut files = Vec::new();
		let walker = WalkBuilder::new(&root_path).standard_filters(false).build();
		for entry in walker {
			let entry = entry.map_err(|e| SyncError::Discovery {
				root: root.to_string(),
				source: Box::new(e),
			})?;
			let path = entry.path();

			if !path.is_file() || !is_markdown(path) {
				continue;
			}
			if self.is_excluded(path) {
				debug!(path = %path.display(), "excluded by pattern");
				continue;
			}
			if let Some(cutoff) = self.cutoff {
				let mtime = entry.metadata().ok().and_then(|m| m.modified().ok());
				if mtime.is_none() {
					warn!(path = %path.display(), "modification time unavailable, keeping file");
				}
				if skip_by_recency(cutoff, mtime) {
					debug!(path = %path.display(), "skipped by recency window");
					continue;
				}
			}

			files.push(self.resolve(&root_path, path));
		}

		Ok(files)
	}

	/// Resolve identity for one file below a directory root
	fn resolve(&self, root: &Path, path: &Path) -> ScannedFile {
		let is_index = is_index_file(path);
		let relative = relative_id(root, path);
		let id = if is_index { parent_of(&relative) } else { relative };
		let parent = parent_of(&id);

		// Title order: in-content heading (when enabled, always for index
		// files) > filename without extension > directory name for index
		let mut title = if is_index {
			base_name(&id)
		} else {
			file_stem(path)
		};
		if self.use_document_title || is_index {
			if let Some(doc_title) = document_title(path) {
				title = doc_title;
			}
		}
		if title.is_empty() {
			// Root index file without a heading
			title = file_stem(path);
		}

		ScannedFile { id, path: path.to_path_buf(), title, parent, is_index }
	}

	fn resolve_single(&self, path: &Path) -> ScannedFile {
		let id = format!("/{}", path.file_name().unwrap_or_default().to_string_lossy());

		let mut title = String::new();
		if !self.title_override.is_empty() {
			title = self.title_override.clone();
		}
		if title.is_empty() && self.use_document_title {
			title = document_title(path).unwrap_or_default();
		}
		if title.is_empty() {
			title = file_stem(path);
		}

		ScannedFile {
			id,
			path: path.to_path_buf(),
			title,
			parent: ROOT_ID.to_string(),
			is_index: false,
		}
	}

	fn is_excluded(&self, path: &Path) -> bool {
		let text = path.to_string_lossy();
		self.exclude.iter().any(|re| re.is_match(&text))
	}
}

/// Identity of an ancestor directory, materialized when no index file
/// claims the directory's ID
pub fn ancestor_entry(root: &Path, id: &str) -> ScannedFile {
	let path = root.join(id.trim_start_matches('/'));
	ScannedFile {
		id: id.to_string(),
		path,
		title: base_name(id),
		parent: parent_of(id),
		is_index: false,
	}
}

/// Root-relative path of a file with a leading slash, forward-slashed
fn relative_id(root: &Path, path: &Path) -> String {
	let rel = path.strip_prefix(root).unwrap_or(path);
	let mut id = String::from("/");
	let parts: Vec<String> =
		rel.components().map(|c| c.as_os_str().to_string_lossy().into_owned()).collect();
	id.push_str(&parts.join("/"));
	id
}

/// Path-parent of a logical ID; "/" for top-level IDs, "" for the root
pub fn parent_of(id: &str) -> String {
	if id == ROOT_ID || id.is_empty() {
		return String::new();
	}
	match id.rfind('/') {
		Some(0) => ROOT_ID.to_string(),
		Some(pos) => id[..pos].to_string(),
		None => ROOT_ID.to_string(),
	}
}

/// Last path component of a logical ID
fn base_name(id: &str) -> String {
	if id == ROOT_ID {
		return ROOT_ID.to_string();
	}
	id.rsplit('/').next().unwrap_or(id).to_string()
}

fn file_stem(path: &Path) -> String {
	path.file_stem().unwrap_or_default().to_string_lossy().into_owned()
}

/// A file is skipped only when its modification time is known and older
/// than the cutoff; an unknown mtime keeps the file in the run
fn skip_by_recency(cutoff: SystemTime, mtime: Option<SystemTime>) -> bool {
	match mtime {
		Some(mtime) => mtime < cutoff,
		None => false,
	}
}

fn is_markdown(path: &Path) -> bool {
	path.extension().map(|e| e.eq_ignore_ascii_case("md")).unwrap_or(false)
}

/// README.md / INDEX.md (case-insensitive) stand in for their directory
pub fn is_index_file(path: &Path) -> bool {
	match path.file_name() {
		Some(name) => {
			let upper = name.to_string_lossy().to_uppercase();
			upper == "README.MD" || upper == "INDEX.MD"
		}
		None => false,
	}
}

/// True when the directory contains an index file and therefore must not
/// be entered as its own separate listing
pub fn has_index_file(dir: &Path) -> bool {
	let entries = match std::fs::read_dir(dir) {
		Ok(entries) => entries,
		Err(_) => return false,
	};
	for entry in entries.flatten() {
		if is_index_file(&entry.path()) {
			return true;
		}
	}
	false
}

/// First level-1 heading of the document, if any
pub fn document_title(path: &Path) -> Option<String> {
	let text = std::fs::read_to_string(path).ok()?;
	let re = Regex::new(r"(?m)^#\s+(.+)").ok()?;
	re.captures(&text).map(|c| c[1].trim().to_string())
}


// vim: ts=4
