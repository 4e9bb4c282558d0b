//! Remote content gateway
//!
//! The reconciliation engine talks to the remote hierarchical store only
//! through the `ContentGateway` trait. `HttpGateway` implements it
//! against a Confluence-compatible REST API (v2 pages/spaces endpoints,
//! v1 attachment and space-settings endpoints). Errors are classified by
//! HTTP status and surfaced verbatim; the engine never retries them.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::path::Path;

use crate::error::GatewayError;
use crate::logging::*;

/// Remote identity assigned to a document after create/update
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RemoteDocument {
	pub id: String,
	pub link: String,
	pub revision: i64,
}

/// Operations the scheduler needs from the remote store
#[async_trait]
pub trait ContentGateway: Send + Sync {
	/// Map a named space/workspace key to its internal ID (once per run)
	async fn resolve_container(&self, key: &str) -> Result<String, GatewayError>;

	async fn create_document(
		&self,
		container_id: &str,
		parent_id: Option<&str>,
		title: &str,
		body: &str,
		root_level: bool,
	) -> Result<RemoteDocument, GatewayError>;

	async fn update_document(
		&self,
		remote_id: &str,
		title: &str,
		body: &str,
		expected_revision: i64,
	) -> Result<RemoteDocument, GatewayError>;

	async fn delete_document(&self, remote_id: &str) -> Result<(), GatewayError>;

	async fn upload_attachment(&self, remote_id: &str, path: &Path) -> Result<(), GatewayError>;

	/// Make a document the container's homepage
	async fn set_container_homepage(
		&self,
		key: &str,
		remote_id: &str,
	) -> Result<(), GatewayError>;
}

/// Authentication for the HTTP gateway
#[derive(Debug, Clone)]
pub enum Auth {
	Basic { username: String, password: String },
	Bearer { token: String },
}

/// reqwest-backed gateway against a Confluence-compatible endpoint
pub struct HttpGateway {
	http: reqwest::Client,
	endpoint: String,
	auth: Auth,
}

#[derive(Debug, Deserialize)]
struct PageResponse {
	id: serde_json::Value,
	#[serde(default)]
	version: Option<VersionInfo>,
	#[serde(rename = "_links", default)]
	links: Option<LinksInfo>,
}

#[derive(Debug, Deserialize)]
struct VersionInfo {
	number: i64,
}

#[derive(Debug, Deserialize, Default)]
struct LinksInfo {
	#[serde(default)]
	webui: String,
}

#[derive(Debug, Deserialize)]
struct SpaceListResponse {
	#[serde(default)]
	results: Vec<SpaceInfo>,
}

#[derive(Debug, Deserialize)]
struct SpaceInfo {
	id: serde_json::Value,
}

/// Numeric-or-string remote IDs normalized to a plain string
fn id_text(v: &serde_json::Value) -> String {
	match v {
		serde_json::Value::String(s) => s.clone(),
		other => other.to_string(),
	}
}

impl HttpGateway {
	pub fn new(endpoint: &str, auth: Auth) -> Self {
		HttpGateway {
			http: reqwest::Client::new(),
			endpoint: endpoint.trim_end_matches('/').to_string(),
			auth,
		}
	}

	fn apply_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
		match &self.auth {
			Auth::Basic { username, password } => req.basic_auth(username, Some(password)),
			Auth::Bearer { token } => req.bearer_auth(token),
		}
	}

	fn url(&self, path: &str) -> String {
		format!("{}{}", self.endpoint, path)
	}

	async fn check(resp: reqwest::Response) -> Result<reqwest::Response, GatewayError> {
		let status = resp.status();
		if status.is_success() {
			return Ok(resp);
		}
		let message = resp.text().await.unwrap_or_default();
		Err(GatewayError::from_status(status.as_u16(), message))
	}

	fn remote_document(page: PageResponse) -> RemoteDocument {
		RemoteDocument {
			id: id_text(&page.id),
			link: page.links.unwrap_or_default().webui,
			revision: page.version.map(|v| v.number).unwrap_or(1),
		}
	}
}

#[async_trait]
impl ContentGateway for HttpGateway {
	async fn resolve_container(&self, key: &str) -> Result<String, GatewayError> {
		let url = self.url("/api/v2/spaces");
		trace!("GET {} keys={}", url, key);
		let resp = self.apply_auth(self.http.get(&url).query(&[("keys", key)])).send().await?;
		let resp = Self::check(resp).await?;
		let spaces: SpaceListResponse = resp
			.json()
			.await
			.map_err(|e| GatewayError::InvalidResponse { message: e.to_string() })?;
		match spaces.results.first() {
			Some(space) => Ok(id_text(&space.id)),
			None => Err(GatewayError::NotFound { message: format!("space '{}' not found", key) }),
		}
	}

	async fn create_document(
		&self,
		container_id: &str,
		parent_id: Option<&str>,
		title: &str,
		body: &str,
		root_level: bool,
	) -> Result<RemoteDocument, GatewayError> {
		let mut payload = json!({
			"spaceId": container_id,
			"status": "current",
			"title": title,
			"body": {
				"representation": "storage",
				"value": body,
			},
		});
		if let Some(parent) = parent_id {
			payload["parentId"] = json!(parent);
		}

		let url = self.url("/api/v2/pages");
		trace!("POST {} title={}", url, title);
		let mut req = self.http.post(&url).json(&payload);
		if root_level {
			req = req.query(&[("root-level", "true")]);
		}
		let resp = self.apply_auth(req).send().await?;
		let resp = Self::check(resp).await?;
		let page: PageResponse = resp
			.json()
			.await
			.map_err(|e| GatewayError::InvalidResponse { message: e.to_string() })?;
		Ok(Self::remote_document(page))
	}

	async fn update_document(
		&self,
		remote_id: &str,
		title: &str,
		body: &str,
		expected_revision: i64,
	) -> Result<RemoteDocument, GatewayError> {
		let payload = json!({
			"id": remote_id,
			"status": "current",
			"title": title,
			"body": {
				"representation": "storage",
				"value": body,
			},
			"version": {
				"number": expected_revision + 1,
				"message": "sync from confsync",
			},
		});

		let url = self.url(&format!("/api/v2/pages/{}", remote_id));
		trace!("PUT {} title={}", url, title);
		let resp = self.apply_auth(self.http.put(&url).json(&payload)).send().await?;
		let resp = Self::check(resp).await?;
		let page: PageResponse = resp
			.json()
			.await
			.map_err(|e| GatewayError::InvalidResponse { message: e.to_string() })?;
		Ok(Self::remote_document(page))
	}

	async fn delete_document(&self, remote_id: &str) -> Result<(), GatewayError> {
		let url = self.url(&format!("/api/v2/pages/{}", remote_id));
		trace!("DELETE {}", url);
		let resp = self.apply_auth(self.http.delete(&url)).send().await?;
		Self::check(resp).await?;
		Ok(())
	}

	async fn upload_attachment(&self, remote_id: &str, path: &Path) -> Result<(), GatewayError> {
		let bytes = tokio::fs::read(path).await.map_err(|e| GatewayError::Transport {
			message: format!("cannot read attachment {}: {}", path.display(), e),
		})?;
		let filename = path
			.file_name()
			.map(|n| n.to_string_lossy().into_owned())
			.unwrap_or_else(|| "attachment".to_string());

		let part = reqwest::multipart::Part::bytes(bytes).file_name(filename);
		let form = reqwest::multipart::Form::new().part("file", part);

		// Create-or-update semantics on the v1 attachment endpoint
		let url = self.url(&format!("/rest/api/content/{}/child/attachment", remote_id));
		trace!("PUT {} ({})", url, path.display());
		let resp = self
			.apply_auth(
				self.http.put(&url).header("X-Atlassian-Token", "nocheck").multipart(form),
			)
			.send()
			.await?;
		Self::check(resp).await?;
		Ok(())
	}

	async fn set_container_homepage(
		&self,
		key: &str,
		remote_id: &str,
	) -> Result<(), GatewayError> {
		let payload = json!({
			"homepage": { "id": remote_id },
		});
		let url = self.url(&format!("/rest/api/space/{}", key));
		trace!("PUT {} homepage={}", url, remote_id);
		let resp = self.apply_auth(self.http.put(&url).json(&payload)).send().await?;
		Self::check(resp).await?;
		Ok(())
	}
}


// vim: ts=4
