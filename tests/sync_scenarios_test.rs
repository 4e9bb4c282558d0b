use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use confsync::config::Config;
use confsync::error::GatewayError;
use confsync::gateway::{ContentGateway, RemoteDocument};
use confsync::store::DocStore;
use confsync::sync::Syncer;
use confsync::types::{DocStatus, Document};

/// In-memory gateway recording every remote call in order
#[derive(Default)]
struct MockGateway {
	next_id: AtomicUsize,
	fail_titles: Vec<String>,
	fail_homepage: bool,
	calls: Mutex<Vec<String>>,
}

impl MockGateway {
	fn failing(titles: &[&str]) -> Self {
		MockGateway {
			fail_titles: titles.iter().map(|t| t.to_string()).collect(),
			..MockGateway::default()
		}
	}

	fn calls(&self) -> Vec<String> {
		self.calls.lock().unwrap().clone()
	}

	fn record(&self, call: String) {
		self.calls.lock().unwrap().push(call);
	}
}

#[async_trait]
impl ContentGateway for MockGateway {
	async fn resolve_container(&self, key: &str) -> Result<String, GatewayError> {
		self.record(format!("resolve {}", key));
		Ok("space-1".to_string())
	}

	async fn create_document(
		&self,
		_container_id: &str,
		parent_id: Option<&str>,
		title: &str,
		_body: &str,
		_root_level: bool,
	) -> Result<RemoteDocument, GatewayError> {
		if self.fail_titles.iter().any(|t| t == title) {
			return Err(GatewayError::Api { status: 500, message: "boom".to_string() });
		}
		let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
		self.record(format!("create {} parent={}", title, parent_id.unwrap_or("-")));
		Ok(RemoteDocument {
			id: format!("p{}", n),
			link: format!("/pages/p{}", n),
			revision: 1,
		})
	}

	async fn update_document(
		&self,
		remote_id: &str,
		title: &str,
		_body: &str,
		expected_revision: i64,
	) -> Result<RemoteDocument, GatewayError> {
		if self.fail_titles.iter().any(|t| t == title) {
			return Err(GatewayError::Api { status: 500, message: "boom".to_string() });
		}
		self.record(format!("update {}", remote_id));
		Ok(RemoteDocument {
			id: remote_id.to_string(),
			link: format!("/pages/{}", remote_id),
			revision: expected_revision + 1,
		})
	}

	async fn delete_document(&self, remote_id: &str) -> Result<(), GatewayError> {
		self.record(format!("delete {}", remote_id));
		Ok(())
	}

	async fn upload_attachment(&self, remote_id: &str, path: &Path) -> Result<(), GatewayError> {
		let name = path.file_name().unwrap_or_default().to_string_lossy().into_owned();
		self.record(format!("attach {} {}", remote_id, name));
		Ok(())
	}

	async fn set_container_homepage(
		&self,
		key: &str,
		remote_id: &str,
	) -> Result<(), GatewayError> {
		if self.fail_homepage {
			return Err(GatewayError::Api { status: 500, message: "boom".to_string() });
		}
		self.record(format!("homepage {} {}", key, remote_id));
		Ok(())
	}
}

fn write_md(dir: &TempDir, rel: &str, content: &str) -> PathBuf {
	let path = dir.path().join(rel);
	if let Some(parent) = path.parent() {
		fs::create_dir_all(parent).unwrap();
	}
	fs::write(&path, content).unwrap();
	path
}

fn test_config(tree: &TempDir, state: &TempDir) -> Config {
	Config {
		endpoint: "https://wiki.example.com".to_string(),
		space: "DOCS".to_string(),
		username: "user".to_string(),
		password: "secret".to_string(),
		local_store: state.path().join("state.db"),
		poll_interval_ms: 10,
		roots: vec![tree.path().to_string_lossy().into_owned()],
		..Config::default()
	}
}

fn stored_docs(state: &TempDir) -> BTreeMap<String, Document> {
	let store = DocStore::open(&state.path().join("state.db")).unwrap();
	let mut docs = BTreeMap::new();
	store
		.for_each(|doc| {
			docs.insert(doc.id.clone(), doc);
		})
		.unwrap();
	docs
}

fn position(calls: &[String], prefix: &str) -> usize {
	calls
		.iter()
		.position(|c| c.starts_with(prefix))
		.unwrap_or_else(|| panic!("no call starting with {:?} in {:?}", prefix, calls))
}

#[tokio::test]
async fn test_three_file_tree_first_run_creates_everything() {
	let tree = TempDir::new().unwrap();
	write_md(&tree, "index.md", "# Home\n\nwelcome\n");
	write_md(&tree, "guide/index.md", "# Guide\n\nintro\n");
	write_md(&tree, "guide/page.md", "# Page\n\nbody\n");
	let state = TempDir::new().unwrap();

	let gateway = Arc::new(MockGateway::default());
	{
		let syncer = Syncer::with_gateway(test_config(&tree, &state), gateway.clone()).unwrap();
		let plan = syncer.prepare().await.unwrap();
		assert_eq!(plan.creates, 3);
		assert_eq!(plan.updates, 0);
		assert_eq!(plan.deletes, 0);

		let report = syncer.sync().await.unwrap();
		assert_eq!(report.synced, 3);
		assert!(report.is_clean());
	}

	let docs = stored_docs(&state);
	assert_eq!(docs.len(), 3);
	for doc in docs.values() {
		assert!(!doc.remote_id.is_empty());
		assert_eq!(doc.status, DocStatus::Synced);
	}

	// Parents are created strictly before their children
	let calls = gateway.calls();
	let home = position(&calls, "create Home");
	let guide = position(&calls, "create Guide");
	let page = position(&calls, "create page");
	assert!(home < guide);
	assert!(guide < page);

	// The child pages point at their parents' remote IDs
	let root_id = docs.get("/").unwrap().remote_id.clone();
	let guide_id = docs.get("/guide").unwrap().remote_id.clone();
	assert!(calls[guide].ends_with(&format!("parent={}", root_id)));
	assert!(calls[page].ends_with(&format!("parent={}", guide_id)));
}

#[tokio::test]
async fn test_second_run_is_idempotent() {
	let tree = TempDir::new().unwrap();
	write_md(&tree, "index.md", "# Home\n");
	write_md(&tree, "guide/index.md", "# Guide\n");
	write_md(&tree, "guide/page.md", "# Page\n");
	let state = TempDir::new().unwrap();

	let gateway = Arc::new(MockGateway::default());
	{
		let syncer = Syncer::with_gateway(test_config(&tree, &state), gateway.clone()).unwrap();
		syncer.prepare().await.unwrap();
		syncer.sync().await.unwrap();
	}
	let calls_after_first = gateway.calls().len();

	{
		let syncer = Syncer::with_gateway(test_config(&tree, &state), gateway.clone()).unwrap();
		let plan = syncer.prepare().await.unwrap();
		assert!(plan.is_empty());
		let report = syncer.sync().await.unwrap();
		assert_eq!(report.synced, 0);
		assert_eq!(report.deleted, 0);
	}

	// Only the container lookup hit the remote on the second run
	assert_eq!(gateway.calls().len(), calls_after_first + 1);
}

#[tokio::test]
async fn test_edit_triggers_single_update() {
	let tree = TempDir::new().unwrap();
	write_md(&tree, "index.md", "# Home\n");
	write_md(&tree, "guide/index.md", "# Guide\n");
	write_md(&tree, "guide/page.md", "# Page\n\nv1\n");
	let state = TempDir::new().unwrap();

	let gateway = Arc::new(MockGateway::default());
	{
		let syncer = Syncer::with_gateway(test_config(&tree, &state), gateway.clone()).unwrap();
		syncer.prepare().await.unwrap();
		syncer.sync().await.unwrap();
	}
	let page_remote = stored_docs(&state).get("/guide/page.md").unwrap().remote_id.clone();

	write_md(&tree, "guide/page.md", "# Page\n\nv2\n");
	{
		let syncer = Syncer::with_gateway(test_config(&tree, &state), gateway.clone()).unwrap();
		let plan = syncer.prepare().await.unwrap();
		assert_eq!(plan.creates, 0);
		assert_eq!(plan.updates, 1);
		assert_eq!(plan.deletes, 0);

		let report = syncer.sync().await.unwrap();
		assert_eq!(report.synced, 1);
	}

	let calls = gateway.calls();
	assert!(calls.contains(&format!("update {}", page_remote)));

	// The remote identity never changed across the edit
	let docs = stored_docs(&state);
	assert_eq!(docs.get("/guide/page.md").unwrap().remote_id, page_remote);
}

#[tokio::test]
async fn test_failure_cascades_without_remote_calls() {
	let tree = TempDir::new().unwrap();
	write_md(&tree, "broken/page.md", "# Inside\n");
	write_md(&tree, "ok.md", "# Fine\n");
	let state = TempDir::new().unwrap();

	// The directory document "broken" fails; its child must never be tried
	let gateway = Arc::new(MockGateway::failing(&["broken"]));
	{
		let syncer = Syncer::with_gateway(test_config(&tree, &state), gateway.clone()).unwrap();
		syncer.prepare().await.unwrap();
		let report = syncer.sync().await.unwrap();

		assert_eq!(report.failures.len(), 2);
		assert!(report.failures.iter().any(|f| f.id == "/broken"));
		assert!(report.failures.iter().any(|f| f.id == "/broken/page.md"));
		assert_eq!(report.synced, 1);
	}

	let calls = gateway.calls();
	assert!(!calls.iter().any(|c| c.starts_with("create page")));
	assert!(calls.iter().any(|c| c.starts_with("create ok")));

	let docs = stored_docs(&state);
	assert_eq!(docs.get("/broken").unwrap().status, DocStatus::Errored);
	assert_eq!(docs.get("/broken/page.md").unwrap().status, DocStatus::Errored);
	// No fingerprint advances for errored documents
	assert!(docs.get("/broken/page.md").unwrap().fingerprint.is_empty());
}

#[tokio::test]
async fn test_errored_document_retried_next_run() {
	let tree = TempDir::new().unwrap();
	write_md(&tree, "flaky.md", "# Flaky\n");
	let state = TempDir::new().unwrap();

	{
		let gateway = Arc::new(MockGateway::failing(&["Flaky"]));
		let config = Config {
			use_document_title: true,
			..test_config(&tree, &state)
		};
		let syncer = Syncer::with_gateway(config, gateway).unwrap();
		syncer.prepare().await.unwrap();
		let report = syncer.sync().await.unwrap();
		assert_eq!(report.failures.len(), 1);
	}

	// The remote recovered; the same document is planned again
	let gateway = Arc::new(MockGateway::default());
	let config = Config {
		use_document_title: true,
		..test_config(&tree, &state)
	};
	let syncer = Syncer::with_gateway(config, gateway.clone()).unwrap();
	let plan = syncer.prepare().await.unwrap();
	assert_eq!(plan.creates, 1);
	let report = syncer.sync().await.unwrap();
	assert_eq!(report.synced, 1);
	assert!(report.is_clean());
}

#[tokio::test]
async fn test_deleted_file_removed_remotely_and_purged() {
	let tree = TempDir::new().unwrap();
	write_md(&tree, "keep.md", "# Keep\n");
	let gone = write_md(&tree, "gone.md", "# Gone\n");
	let state = TempDir::new().unwrap();

	let gateway = Arc::new(MockGateway::default());
	{
		let syncer = Syncer::with_gateway(test_config(&tree, &state), gateway.clone()).unwrap();
		syncer.prepare().await.unwrap();
		syncer.sync().await.unwrap();
	}
	let gone_remote = stored_docs(&state).get("/gone.md").unwrap().remote_id.clone();

	fs::remove_file(&gone).unwrap();
	{
		let syncer = Syncer::with_gateway(test_config(&tree, &state), gateway.clone()).unwrap();
		let plan = syncer.prepare().await.unwrap();
		assert_eq!(plan.deletes, 1);
		assert_eq!(plan.creates, 0);

		let report = syncer.sync().await.unwrap();
		assert_eq!(report.deleted, 1);
	}

	assert!(gateway.calls().contains(&format!("delete {}", gone_remote)));
	let docs = stored_docs(&state);
	assert!(!docs.contains_key("/gone.md"));
	assert!(docs.contains_key("/keep.md"));
}

#[tokio::test]
async fn test_force_reuploads_unchanged_tree() {
	let tree = TempDir::new().unwrap();
	write_md(&tree, "page.md", "# Page\n");
	let state = TempDir::new().unwrap();

	let gateway = Arc::new(MockGateway::default());
	{
		let syncer = Syncer::with_gateway(test_config(&tree, &state), gateway.clone()).unwrap();
		syncer.prepare().await.unwrap();
		syncer.sync().await.unwrap();
	}

	let config = Config { force: true, ..test_config(&tree, &state) };
	let syncer = Syncer::with_gateway(config, gateway.clone()).unwrap();
	let plan = syncer.prepare().await.unwrap();
	assert_eq!(plan.updates, 1);
	let report = syncer.sync().await.unwrap();
	assert_eq!(report.synced, 1);
}

#[tokio::test]
async fn test_title_change_keeps_identity() {
	let tree = TempDir::new().unwrap();
	write_md(&tree, "page.md", "# Old Title\n");
	let state = TempDir::new().unwrap();

	let gateway = Arc::new(MockGateway::default());
	let config = Config {
		use_document_title: true,
		..test_config(&tree, &state)
	};
	{
		let syncer = Syncer::with_gateway(config.clone(), gateway.clone()).unwrap();
		syncer.prepare().await.unwrap();
		syncer.sync().await.unwrap();
	}
	let remote_id = stored_docs(&state).get("/page.md").unwrap().remote_id.clone();

	write_md(&tree, "page.md", "# New Title\n");
	{
		let syncer = Syncer::with_gateway(config, gateway.clone()).unwrap();
		let plan = syncer.prepare().await.unwrap();
		// Same logical ID, so this is an update rather than create+delete
		assert_eq!(plan.updates, 1);
		assert_eq!(plan.creates, 0);
		assert_eq!(plan.deletes, 0);
		syncer.sync().await.unwrap();
	}

	let docs = stored_docs(&state);
	assert_eq!(docs.len(), 1);
	assert_eq!(docs.get("/page.md").unwrap().remote_id, remote_id);
	assert!(gateway.calls().contains(&format!("update {}", remote_id)));
}

#[tokio::test]
async fn test_root_index_becomes_homepage() {
	let tree = TempDir::new().unwrap();
	write_md(&tree, "index.md", "# Home\n");
	let state = TempDir::new().unwrap();

	let gateway = Arc::new(MockGateway::default());
	let syncer = Syncer::with_gateway(test_config(&tree, &state), gateway.clone()).unwrap();
	syncer.prepare().await.unwrap();
	syncer.sync().await.unwrap();
	drop(syncer);

	let root_remote = stored_docs(&state).get("/").unwrap().remote_id.clone();
	assert!(gateway.calls().contains(&format!("homepage DOCS {}", root_remote)));
}

#[tokio::test]
async fn test_homepage_failure_keeps_remote_identity() {
	let tree = TempDir::new().unwrap();
	write_md(&tree, "index.md", "# Home\n");
	let state = TempDir::new().unwrap();

	{
		let gateway =
			Arc::new(MockGateway { fail_homepage: true, ..MockGateway::default() });
		let syncer = Syncer::with_gateway(test_config(&tree, &state), gateway).unwrap();
		syncer.prepare().await.unwrap();
		let report = syncer.sync().await.unwrap();
		assert_eq!(report.failures.len(), 1);
	}

	// The page was created before the homepage call failed; its remote ID
	// must survive so the next run repairs instead of duplicating
	let partial = stored_docs(&state).remove("/").unwrap();
	assert_eq!(partial.status, DocStatus::Errored);
	assert!(!partial.remote_id.is_empty());
	assert!(partial.fingerprint.is_empty());
	let remote_id = partial.remote_id;

	let gateway = Arc::new(MockGateway::default());
	let syncer = Syncer::with_gateway(test_config(&tree, &state), gateway.clone()).unwrap();
	let plan = syncer.prepare().await.unwrap();
	assert_eq!(plan.creates, 0);
	assert_eq!(plan.updates, 1);
	let report = syncer.sync().await.unwrap();
	assert!(report.is_clean());
	drop(syncer);

	let calls = gateway.calls();
	assert!(calls.contains(&format!("update {}", remote_id)));
	assert!(calls.contains(&format!("homepage DOCS {}", remote_id)));
	assert!(!calls.iter().any(|c| c.starts_with("create ")));

	let repaired = stored_docs(&state).remove("/").unwrap();
	assert_eq!(repaired.status, DocStatus::Synced);
	assert!(!repaired.fingerprint.is_empty());
}

#[tokio::test]
async fn test_explicit_parent_skips_homepage() {
	let tree = TempDir::new().unwrap();
	write_md(&tree, "index.md", "# Home\n");
	let state = TempDir::new().unwrap();

	let gateway = Arc::new(MockGateway::default());
	let config = Config {
		parent: "777".to_string(),
		..test_config(&tree, &state)
	};
	let syncer = Syncer::with_gateway(config, gateway.clone()).unwrap();
	syncer.prepare().await.unwrap();
	syncer.sync().await.unwrap();

	let calls = gateway.calls();
	assert!(!calls.iter().any(|c| c.starts_with("homepage")));
	assert!(calls.contains(&"create Home parent=777".to_string()));
}

#[tokio::test]
async fn test_local_image_uploaded_as_attachment() {
	let tree = TempDir::new().unwrap();
	write_md(&tree, "page.md", "# Page\n\n![diagram](diagram.png)\n");
	fs::write(tree.path().join("diagram.png"), b"\x89PNG").unwrap();
	let state = TempDir::new().unwrap();

	let gateway = Arc::new(MockGateway::default());
	let syncer = Syncer::with_gateway(test_config(&tree, &state), gateway.clone()).unwrap();
	syncer.prepare().await.unwrap();
	let report = syncer.sync().await.unwrap();
	assert!(report.is_clean());
	drop(syncer);

	let page_remote = stored_docs(&state).get("/page.md").unwrap().remote_id.clone();
	assert!(gateway.calls().contains(&format!("attach {} diagram.png", page_remote)));
}

// vim: ts=4
