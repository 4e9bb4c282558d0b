//! Embedded state store
//!
//! Persistent mapping from logical document ID to its last-known sync
//! record. The store is the sole source of truth for remote IDs across
//! runs: losing it makes the next diff classify everything as CREATE,
//! which is degraded but safe.

use redb::{ReadableDatabase, ReadableTable, TableDefinition};

use crate::error::StoreError;
use crate::types::Document;

/// Table definition for document records
/// Key: logical document ID (String)
/// Value: serialized Document (JSON bytes)
const DOCUMENTS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("documents");

/// State store backed by a redb database, opened once per run.
/// All mutations are atomic per key; closing happens on drop, on every
/// exit path.
pub struct DocStore {
	db: redb::Database,
}

impl DocStore {
	/// Open or create the state database
	pub fn open(db_path: &std::path::Path) -> Result<Self, StoreError> {
		let db = redb::Database::create(db_path).map_err(|e| StoreError::OpenFailed {
			path: db_path.display().to_string(),
			source: Box::new(e),
		})?;
		// Ensure the table exists so first-run reads see an empty table
		{
			let write_txn = db.begin_write().map_err(write_err)?;
			let _ = write_txn.open_table(DOCUMENTS_TABLE).map_err(write_err)?;
			write_txn.commit().map_err(write_err)?;
		}
		Ok(DocStore { db })
	}

	/// Look up a stored record by logical ID
	pub fn get(&self, id: &str) -> Result<Option<Document>, StoreError> {
		let read_txn = self.db.begin_read().map_err(read_err)?;
		let table = read_txn.open_table(DOCUMENTS_TABLE).map_err(read_err)?;

		match table.get(id).map_err(read_err)? {
			Some(entry) => {
				let bytes = entry.value().to_vec();
				let doc = serde_json::from_slice::<Document>(&bytes).map_err(|e| {
					StoreError::Corrupted { id: id.to_string(), message: e.to_string() }
				})?;
				Ok(Some(doc))
			}
			None => Ok(None),
		}
	}

	/// Store or replace the record for a document, keyed by its ID
	pub fn put(&self, doc: &Document) -> Result<(), StoreError> {
		let bytes = serde_json::to_vec(doc)
			.map_err(|e| StoreError::WriteFailed { source: Box::new(e) })?;

		let write_txn = self.db.begin_write().map_err(write_err)?;
		{
			let mut table = write_txn.open_table(DOCUMENTS_TABLE).map_err(write_err)?;
			table.insert(doc.id.as_str(), bytes.as_slice()).map_err(write_err)?;
		}
		write_txn.commit().map_err(write_err)?;

		Ok(())
	}

	/// Remove a record (tombstone purge after successful remote deletion)
	pub fn delete(&self, id: &str) -> Result<(), StoreError> {
		let write_txn = self.db.begin_write().map_err(write_err)?;
		{
			let mut table = write_txn.open_table(DOCUMENTS_TABLE).map_err(write_err)?;
			table.remove(id).map_err(write_err)?;
		}
		write_txn.commit().map_err(write_err)?;

		Ok(())
	}

	/// Visit every stored record. Corrupted records abort the walk.
	pub fn for_each<F>(&self, mut f: F) -> Result<(), StoreError>
	where
		F: FnMut(Document),
	{
		let read_txn = self.db.begin_read().map_err(read_err)?;
		let table = read_txn.open_table(DOCUMENTS_TABLE).map_err(read_err)?;
		let mut iter = table.iter().map_err(read_err)?;

		loop {
			match iter.next() {
				Some(Ok((key, entry))) => {
					let id = key.value().to_string();
					let bytes = entry.value().to_vec();
					let doc = serde_json::from_slice::<Document>(&bytes)
						.map_err(|e| StoreError::Corrupted { id, message: e.to_string() })?;
					f(doc);
				}
				Some(Err(e)) => return Err(read_err(e)),
				None => break,
			}
		}

		Ok(())
	}

	/// Number of stored records
	pub fn len(&self) -> Result<usize, StoreError> {
		let mut count = 0;
		self.for_each(|_| count += 1)?;
		Ok(count)
	}
}

fn read_err<E: std::error::Error + Send + Sync + 'static>(e: E) -> StoreError {
	StoreError::ReadFailed { source: Box::new(e) }
}

fn write_err<E: std::error::Error + Send + Sync + 'static>(e: E) -> StoreError {
	StoreError::WriteFailed { source: Box::new(e) }
}


// vim: ts=4
