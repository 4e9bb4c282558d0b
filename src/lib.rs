//! # ConfSync - Markdown to Confluence Tree Synchronizer
//!
//! ConfSync mirrors a tree of markdown files into a Confluence space,
//! preserving the directory hierarchy as a page hierarchy. An embedded
//! state database remembers what was uploaded, so subsequent runs only
//! touch documents that actually changed, and files deleted locally are
//! removed remotely.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use confsync::config::Config;
//! use confsync::sync::Syncer;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::load();
//!     config.space = "DOCS".into();
//!     config.roots = vec!["./docs".into()];
//!     config.validate()?;
//!
//!     let syncer = Syncer::new(config)?;
//!     let plan = syncer.prepare().await?;
//!     println!("{}", plan);
//!     let report = syncer.sync().await?;
//!     println!("{} synced, {} deleted", report.synced, report.deleted);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod diff;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod render;
pub mod scan;
pub mod store;
pub mod sync;
pub mod types;

// Re-export commonly used types and functions
pub use config::Config;
pub use error::{GatewayError, RenderError, StoreError, SyncError};
pub use gateway::{ContentGateway, HttpGateway, RemoteDocument};
pub use store::DocStore;
pub use sync::Syncer;
pub use types::{DocStatus, Document, PlanCounts, SyncReport};

// vim: ts=4
