//! Diff engine: classify every discovered document into an action
//!
//! Compares the scanned tree (and content fingerprints) against the
//! state store and filesystem presence. Output is the populated working
//! set plus CREATE/UPDATE/DELETE counts; documents already in sync are
//! marked terminal immediately and never dispatched.

use std::collections::BTreeMap;
use std::io;
use std::path::Path;

use crate::error::SyncError;
use crate::logging::*;
use crate::scan::{self, ScannedFile, Scanner};
use crate::store::DocStore;
use crate::types::{DocStatus, Document, PlanCounts, DIRECTORY_FINGERPRINT, ROOT_ID};

/// Content fingerprint of a file; DIRECTORY sentinel for directories
pub fn fingerprint(path: &Path) -> io::Result<String> {
	if path.is_dir() {
		return Ok(DIRECTORY_FINGERPRINT.to_string());
	}
	let bytes = std::fs::read(path)?;
	Ok(fingerprint_bytes(&bytes))
}

pub fn fingerprint_bytes(bytes: &[u8]) -> String {
	hex::encode(blake3::hash(bytes).as_bytes())
}

/// Scan all roots, classify every document and detect tombstones.
/// Populates `working` (keyed by logical ID) and returns the plan counts.
pub fn diff_roots(
	store: &DocStore,
	scanner: &Scanner,
	roots: &[String],
	force: bool,
	working: &mut BTreeMap<String, Document>,
) -> Result<PlanCounts, SyncError> {
	for root in roots {
		let root_path = Path::new(root);
		let files = scanner.scan(root)?;
		for file in files {
			// Ancestors are resolved (create-if-absent) before the
			// document itself; this seeds the dependency order.
			resolve_ancestors(store, root_path, &file.parent, working)?;
			let doc = classify(store, &file, force)?;
			working.insert(doc.id.clone(), doc);
		}
	}

	detect_tombstones(store, working)?;

	let mut counts = PlanCounts::default();
	for doc in working.values() {
		match doc.status {
			DocStatus::Create => counts.creates += 1,
			DocStatus::Update => counts.updates += 1,
			DocStatus::Delete => counts.deletes += 1,
			_ => {}
		}
	}
	Ok(counts)
}

/// Hydrate a scanned file from the store and classify its action
fn classify(store: &DocStore, file: &ScannedFile, force: bool) -> Result<Document, SyncError> {
	let mut doc = hydrate(store, &file.id)?;
	doc.path = file.path.clone();
	doc.title = file.title.clone();
	doc.parent = file.parent.clone();

	if doc.remote_id.is_empty() {
		doc.status = DocStatus::Create;
		return Ok(doc);
	}

	let current = fingerprint(&doc.path)?;
	// Directory fingerprints are a sentinel and never trigger updates
	if current != DIRECTORY_FINGERPRINT {
		if doc.fingerprint.is_empty() {
			// Created remotely but the upload was never confirmed
			doc.status = DocStatus::Update;
		} else if force {
			doc.status = DocStatus::Update;
		} else if doc.fingerprint != current {
			debug!(id = %doc.id, "fingerprint changed ({} - {})", current, doc.fingerprint);
			doc.status = DocStatus::Update;
		}
	}

	if doc.status != DocStatus::Update {
		// Already in sync: terminal for the run, excluded from dispatch.
		// Its known remote ID still unblocks children.
		doc.status = DocStatus::Synced;
	}
	Ok(doc)
}

/// Walk the parent chain upward, materializing directory documents for
/// ancestors nobody claims yet. A directory containing an index file is
/// skipped: the index entry owns that ID.
fn resolve_ancestors(
	store: &DocStore,
	root: &Path,
	parent: &str,
	working: &mut BTreeMap<String, Document>,
) -> Result<(), SyncError> {
	let mut id = parent.to_string();
	let mut chain = Vec::new();
	while id != ROOT_ID && !id.is_empty() {
		chain.push(id.clone());
		id = scan::parent_of(&id);
	}

	// Top-down so a parent directory lands in the working set before its
	// children directories
	for id in chain.into_iter().rev() {
		if working.contains_key(&id) {
			continue;
		}
		let entry = scan::ancestor_entry(root, &id);
		if scan::has_index_file(&entry.path) {
			// The index file provides this ID when the walk reaches it
			continue;
		}

		let mut doc = hydrate(store, &id)?;
		doc.path = entry.path;
		doc.title = entry.title;
		doc.parent = entry.parent;
		doc.fingerprint = DIRECTORY_FINGERPRINT.to_string();
		doc.status = if doc.remote_id.is_empty() { DocStatus::Create } else { DocStatus::Synced };
		working.insert(id, doc);
	}
	Ok(())
}

/// Deletion detection is a set difference between stored records and the
/// IDs seen this run: any stored record whose path no longer exists on
/// disk becomes a tombstone.
fn detect_tombstones(
	store: &DocStore,
	working: &mut BTreeMap<String, Document>,
) -> Result<(), SyncError> {
	let mut tombstones = Vec::new();
	store.for_each(|doc| {
		if !working.contains_key(&doc.id) && !doc.path.exists() {
			tombstones.push(doc);
		}
	})?;

	for mut doc in tombstones {
		debug!(id = %doc.id, "path gone, scheduling remote delete");
		doc.status = DocStatus::Delete;
		working.insert(doc.id.clone(), doc);
	}
	Ok(())
}

/// Carry forward remote identity and last-synced fingerprint, if any.
/// A record without a remote ID is treated as never synced.
fn hydrate(store: &DocStore, id: &str) -> Result<Document, SyncError> {
	match store.get(id)? {
		Some(stored) if !stored.remote_id.is_empty() => Ok(Document {
			status: DocStatus::New,
			..stored
		}),
		_ => Ok(Document { id: id.to_string(), ..Document::default() }),
	}
}


// vim: ts=4
