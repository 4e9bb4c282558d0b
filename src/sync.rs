//! Sync reconciliation engine
//!
//! `Syncer` owns the run: discovery + diff (`prepare`), then the
//! dependency-ordered scheduler (`sync`). A coordinator evaluates
//! readiness in polling rounds and dispatches documents onto a queue
//! consumed by a fixed pool of workers; a child is never dispatched
//! before its parent's remote identity is known, and failure cascades to
//! descendants without touching the network.

use futures::future;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};

use crate::config::Config;
use crate::diff::{self, fingerprint_bytes};
use crate::error::{RenderError, SyncError};
use crate::gateway::{Auth, ContentGateway, HttpGateway};
use crate::logging::*;
use crate::render;
use crate::scan::Scanner;
use crate::store::DocStore;
use crate::types::{DocFailure, DocStatus, Document, PlanCounts, SyncReport, ROOT_ID};

/// Shared run state accessible to the coordinator and every worker
struct Shared {
	config: Config,
	container_id: String,
	store: Arc<DocStore>,
	gateway: Arc<dyn ContentGateway>,
	working: Arc<Mutex<BTreeMap<String, Document>>>,
	report: Arc<Mutex<SyncReport>>,
	structural: Arc<Mutex<Option<SyncError>>>,
}

/// One sync run against one state store and one remote container
pub struct Syncer {
	config: Config,
	store: Arc<DocStore>,
	gateway: Arc<dyn ContentGateway>,
	working: Arc<Mutex<BTreeMap<String, Document>>>,
}

impl Syncer {
	/// Build a syncer with the HTTP gateway derived from the configuration
	pub fn new(config: Config) -> Result<Self, SyncError> {
		let auth = if !config.access_token.is_empty() {
			Auth::Bearer { token: config.access_token.clone() }
		} else {
			Auth::Basic {
				username: config.username.clone(),
				password: config.password.clone(),
			}
		};
		let gateway: Arc<dyn ContentGateway> =
			Arc::new(HttpGateway::new(&config.endpoint, auth));
		Self::with_gateway(config, gateway)
	}

	/// Build a syncer against an arbitrary gateway implementation
	pub fn with_gateway(
		config: Config,
		gateway: Arc<dyn ContentGateway>,
	) -> Result<Self, SyncError> {
		let store = Arc::new(DocStore::open(&config.local_store)?);
		Ok(Syncer {
			config,
			store,
			gateway,
			working: Arc::new(Mutex::new(BTreeMap::new())),
		})
	}

	/// Discovery + diff. Mutates no remote state; returns the plan counts
	/// so callers can short-circuit or ask for confirmation.
	pub async fn prepare(&self) -> Result<PlanCounts, SyncError> {
		let scanner = Scanner::new(&self.config)?;
		let mut working = self.working.lock().await;
		working.clear();
		diff::diff_roots(
			&self.store,
			&scanner,
			&self.config.roots,
			self.config.force,
			&mut working,
		)
	}

	/// Execute the scheduler over the working set populated by `prepare`.
	/// Structural errors (store/container) are returned; per-document
	/// failures are logged and accumulated in the report.
	pub async fn sync(&self) -> Result<SyncReport, SyncError> {
		let container_id = self.gateway.resolve_container(&self.config.space).await?;
		debug!(space = %self.config.space, container_id = %container_id, "container resolved");

		let shared = Arc::new(Shared {
			config: self.config.clone(),
			container_id,
			store: self.store.clone(),
			gateway: self.gateway.clone(),
			working: self.working.clone(),
			report: Arc::new(Mutex::new(SyncReport::default())),
			structural: Arc::new(Mutex::new(None)),
		});

		let (tx, rx) = mpsc::unbounded_channel::<String>();
		let rx = Arc::new(Mutex::new(rx));

		let mut workers = Vec::new();
		for worker_id in 0..self.config.parallelism {
			let shared = shared.clone();
			let rx = rx.clone();
			workers.push(tokio::spawn(worker_loop(worker_id, shared, rx)));
		}

		self.coordinate(&shared, tx).await;

		// Queue closed above; wait for in-flight documents to settle
		future::join_all(workers).await;

		if let Some(err) = shared.structural.lock().await.take() {
			return Err(err);
		}

		let report = shared.report.lock().await.clone();
		for failure in &report.failures {
			error!(id = %failure.id, "sync failed: {}", failure.message);
		}
		Ok(report)
	}

	/// Readiness rounds: dispatch documents whose dependency is satisfied,
	/// cascade errors downward, poll until every document is terminal.
	async fn coordinate(&self, shared: &Arc<Shared>, tx: mpsc::UnboundedSender<String>) {
		let mut dispatched: BTreeSet<String> = BTreeSet::new();

		loop {
			if shared.structural.lock().await.is_some() {
				break;
			}

			let mut all_terminal = true;
			{
				let mut working = shared.working.lock().await;
				let snapshot: Vec<(String, DocStatus, String)> = working
					.values()
					.map(|d| (d.id.clone(), d.status, d.parent.clone()))
					.collect();

				for (id, status, parent) in snapshot {
					if status.is_terminal() {
						continue;
					}
					all_terminal = false;
					if dispatched.contains(&id) {
						continue;
					}

					// Tombstones carry their remote identity already and
					// wait on nobody
					if status == DocStatus::Delete {
						dispatched.insert(id.clone());
						let _ = tx.send(id);
						continue;
					}

					let doc = match working.get(&id) {
						Some(doc) => doc.clone(),
						None => continue,
					};

					if doc.is_top_level() {
						dispatched.insert(id.clone());
						let _ = tx.send(id);
						continue;
					}

					match working.get(&parent).map(|p| (p.status, p.remote_id.clone())) {
						Some((DocStatus::Synced, remote_parent)) => {
							if let Some(doc) = working.get_mut(&id) {
								doc.remote_parent_id = remote_parent;
							}
							dispatched.insert(id.clone());
							let _ = tx.send(id);
						}
						Some((DocStatus::Errored, _)) => {
							// Derived failure: never dispatched, attributed
							// to the ancestor
							error!(id = %id, parent = %parent, "cannot sync (parent errored)");
							if let Some(doc) = working.get_mut(&id) {
								doc.status = DocStatus::Errored;
								let record = doc.clone();
								shared.report.lock().await.failures.push(DocFailure {
									id: record.id.clone(),
									title: record.title.clone(),
									message: format!("parent {} errored", parent),
								});
								if let Err(e) = shared.store.put(&record) {
									*shared.structural.lock().await = Some(e.into());
								}
							}
						}
						// Parent still pending: re-evaluate next round.
						// An unknown parent means no dependency is tracked.
						Some(_) => {}
						None => {
							dispatched.insert(id.clone());
							let _ = tx.send(id);
						}
					}
				}
			}

			if all_terminal {
				break;
			}
			tokio::time::sleep(Duration::from_millis(shared.config.poll_interval_ms)).await;
		}

		drop(tx);
	}
}

async fn worker_loop(
	worker_id: usize,
	shared: Arc<Shared>,
	rx: Arc<Mutex<mpsc::UnboundedReceiver<String>>>,
) {
	loop {
		let id = {
			let mut rx = rx.lock().await;
			match rx.recv().await {
				Some(id) => id,
				None => break,
			}
		};

		let mut doc = {
			let working = shared.working.lock().await;
			match working.get(&id) {
				Some(doc) => doc.clone(),
				None => continue,
			}
		};

		trace!(worker = worker_id, id = %doc.id, status = %doc.status, "processing");
		match process_document(&shared, &mut doc).await {
			Ok(()) => {
				let deleted = doc.status == DocStatus::Deleted;
				println!(
					"{}: {}",
					doc.id,
					if deleted { "deleted".to_string() } else { full_link(&shared, &doc) }
				);

				let persist = if deleted {
					shared.store.delete(&doc.id)
				} else {
					shared.store.put(&doc)
				};

				{
					let mut report = shared.report.lock().await;
					if deleted {
						report.deleted += 1;
					} else {
						report.synced += 1;
					}
				}
				shared.working.lock().await.insert(doc.id.clone(), doc);

				if let Err(e) = persist {
					*shared.structural.lock().await = Some(e.into());
					break;
				}
			}
			Err(message) => {
				warn!(id = %doc.id, title = %doc.title, "upload failed: {}", message);
				// Keep any remote identity the failed attempt did assign;
				// losing it would duplicate the page on the next run
				doc.status = DocStatus::Errored;
				shared.report.lock().await.failures.push(DocFailure {
					id: doc.id.clone(),
					title: doc.title.clone(),
					message,
				});
				let persist = shared.store.put(&doc);
				shared.working.lock().await.insert(doc.id.clone(), doc);
				if let Err(e) = persist {
					*shared.structural.lock().await = Some(e.into());
					break;
				}
			}
		}
	}
}

fn full_link(shared: &Shared, doc: &Document) -> String {
	if doc.link.is_empty() {
		return String::new();
	}
	format!("{}{}", shared.config.endpoint.trim_end_matches('/'), doc.link)
}

/// Map of local source paths to remote URLs for every document whose
/// remote identity is already known; drives cross-document link rewriting
async fn link_map(shared: &Shared) -> BTreeMap<String, String> {
	let working = shared.working.lock().await;
	working
		.values()
		.filter(|d| !d.remote_id.is_empty() && !d.link.is_empty())
		.map(|d| (d.path.to_string_lossy().into_owned(), full_link(shared, d)))
		.collect()
}

/// Perform the remote call for one dispatched document. Mutates the
/// document in place so a remote identity assigned before a later
/// failure is preserved; the error side is a per-document failure
/// message.
async fn process_document(shared: &Arc<Shared>, doc: &mut Document) -> Result<(), String> {
	if doc.status == DocStatus::Delete {
		debug!(id = %doc.id, "deleting remote document");
		if !doc.remote_id.is_empty() {
			shared.gateway.delete_document(&doc.remote_id).await.map_err(|e| e.to_string())?;
		}
		doc.status = DocStatus::Deleted;
		return Ok(());
	}

	// Render the body; directories list their children instead
	let (markup, attachments, new_fingerprint) = if doc.is_directory() {
		(render::directory_markup(), Vec::new(), doc.fingerprint.clone())
	} else {
		let raw = std::fs::read_to_string(&doc.path).map_err(|e| {
			RenderError::ReadFailed { path: doc.path.display().to_string(), source: e }.to_string()
		})?;
		let links = link_map(shared).await;
		let rendered = render::render(&doc.path, &raw, &links, shared.config.hard_wraps)
			.map_err(|e| e.to_string())?;
		let fp = fingerprint_bytes(raw.as_bytes());
		(rendered.markup, rendered.attachments, fp)
	};

	// Top-level documents nest under the configured parent page, if any
	if doc.is_top_level() && doc.remote_parent_id.is_empty() {
		doc.remote_parent_id = shared.config.parent.clone();
	}
	let parent_id = if doc.remote_parent_id.is_empty() {
		None
	} else {
		Some(doc.remote_parent_id.as_str())
	};
	let root_level = doc.id == ROOT_ID && shared.config.parent.is_empty();

	match doc.status {
		DocStatus::Create => {
			debug!(id = %doc.id, title = %doc.title, "creating remote document");
			let remote = shared
				.gateway
				.create_document(&shared.container_id, parent_id, &doc.title, &markup, root_level)
				.await
				.map_err(|e| e.to_string())?;
			doc.remote_id = remote.id;
			doc.link = remote.link;
			doc.revision = remote.revision;
		}
		DocStatus::Update => {
			debug!(id = %doc.id, title = %doc.title, "updating remote document");
			let remote = shared
				.gateway
				.update_document(&doc.remote_id, &doc.title, &markup, doc.revision)
				.await
				.map_err(|e| e.to_string())?;
			doc.link = remote.link;
			doc.revision = remote.revision;
		}
		_ => return Ok(()),
	}

	// The tree root becomes the container homepage unless the run nests
	// under an explicit parent page
	if doc.id == ROOT_ID && shared.config.parent.is_empty() {
		shared
			.gateway
			.set_container_homepage(&shared.config.space, &doc.remote_id)
			.await
			.map_err(|e| e.to_string())?;
	}

	// The fingerprint only advances once the whole upload is confirmed,
	// so a partially synced document is re-planned on the next run
	doc.fingerprint = new_fingerprint;
	doc.status = DocStatus::Synced;

	for attachment in &attachments {
		if let Err(e) = shared.gateway.upload_attachment(&doc.remote_id, attachment).await {
			// The document itself synced; record the attachment failure
			// without rolling its status back
			shared.report.lock().await.failures.push(DocFailure {
				id: doc.id.clone(),
				title: doc.title.clone(),
				message: format!("attachment {}: {}", attachment.display(), e),
			});
		}
	}

	Ok(())
}

// vim: ts=4
