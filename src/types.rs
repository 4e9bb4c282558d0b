//! Core data types for the reconciliation engine

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Logical ID of the tree root, parent sentinel for top-level documents
pub const ROOT_ID: &str = "/";

/// Fingerprint sentinel for directory (index-only) entries.
/// Never compared against file content, so it can never trigger an update.
pub const DIRECTORY_FINGERPRINT: &str = "DIRECTORY";

/// Per-document action/state machine.
///
/// `New` is the hydrated-but-unclassified state. The diff engine moves a
/// document to `Create`, `Update`, `Delete` or directly to `Synced`
/// (no-op). The scheduler moves dispatched documents to one of the
/// terminal states `Synced`, `Errored` or `Deleted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DocStatus {
	#[default]
	New,
	Create,
	Update,
	Delete,
	Synced,
	Errored,
	Deleted,
}

impl DocStatus {
	/// Terminal states for a run: nothing more will happen to the document
	pub fn is_terminal(&self) -> bool {
		matches!(self, DocStatus::Synced | DocStatus::Errored | DocStatus::Deleted)
	}
}

impl fmt::Display for DocStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			DocStatus::New => "NEW",
			DocStatus::Create => "CREATE",
			DocStatus::Update => "UPDATE",
			DocStatus::Delete => "DELETE",
			DocStatus::Synced => "SYNCED",
			DocStatus::Errored => "ERRORED",
			DocStatus::Deleted => "DELETED",
		};
		f.write_str(s)
	}
}

/// The unit of reconciliation: one local document tracked against the
/// remote store. Persisted per logical ID in the state store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Document {
	/// Stable logical ID: root-relative path, independent of title.
	/// Index files collapse into their directory's ID.
	#[serde(rename = "id")]
	pub id: String,

	/// Current filesystem location; changes across runs, not identity
	#[serde(rename = "pth")]
	pub path: PathBuf,

	/// Resolved display title
	#[serde(rename = "ttl")]
	pub title: String,

	/// Logical ID of the containing directory ("/" for top-level)
	#[serde(rename = "par")]
	pub parent: String,

	/// Remote identifier, empty until first successful creation
	#[serde(rename = "rid")]
	pub remote_id: String,

	/// Remote identifier of the parent document
	#[serde(rename = "rpd")]
	pub remote_parent_id: String,

	/// Content hash at last successful sync (DIRECTORY for directories)
	#[serde(rename = "fp")]
	pub fingerprint: String,

	/// Current run state
	#[serde(rename = "st")]
	pub status: DocStatus,

	/// Human-facing URL returned by the remote store
	#[serde(rename = "lnk")]
	pub link: String,

	/// Remote revision counter from the last successful create/update
	#[serde(rename = "rev")]
	pub revision: i64,
}

impl Document {
	/// True for directory (index-only) entries
	pub fn is_directory(&self) -> bool {
		self.fingerprint == DIRECTORY_FINGERPRINT || self.path.is_dir()
	}

	/// True for top-level documents that need no parent resolution
	pub fn is_top_level(&self) -> bool {
		self.parent == ROOT_ID || self.parent.is_empty() || self.parent == "."
	}
}

impl fmt::Display for Document {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"ID: {}, Title: {}, Parent: {}, Path: {}",
			self.id,
			self.title,
			self.parent,
			self.path.display()
		)
	}
}

/// Classification counts returned by the diff phase, so callers can
/// short-circuit or ask for confirmation before any remote mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlanCounts {
	pub creates: usize,
	pub updates: usize,
	pub deletes: usize,
}

impl PlanCounts {
	pub fn is_empty(&self) -> bool {
		self.creates == 0 && self.updates == 0 && self.deletes == 0
	}
}

impl fmt::Display for PlanCounts {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"{} to add, {} to change, {} to delete",
			self.creates, self.updates, self.deletes
		)
	}
}

/// One failed document with its root cause (or errored ancestor)
#[derive(Debug, Clone)]
pub struct DocFailure {
	pub id: String,
	pub title: String,
	pub message: String,
}

impl fmt::Display for DocFailure {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} ({}): {}", self.id, self.title, self.message)
	}
}

/// Outcome of a sync run. Per-document failures are accumulated here;
/// only structural errors abort the run itself.
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
	pub synced: usize,
	pub deleted: usize,
	pub failures: Vec<DocFailure>,
}

impl SyncReport {
	pub fn is_clean(&self) -> bool {
		self.failures.is_empty()
	}
}


// vim: ts=4
