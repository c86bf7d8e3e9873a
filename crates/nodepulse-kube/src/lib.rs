//! nodepulse-kube: snapshot sources for nodepulse
//!
//! Two implementations of [`nodepulse_core::SnapshotSource`]:
//!
//! - [`KubeSource`] lists nodes and pods from a live cluster
//! - [`MockSource`] generates a small, randomly drifting cluster
//!
//! # Example
//!
//! ```no_run
//! use nodepulse_core::SnapshotSource;
//! use nodepulse_kube::KubeSource;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Connect using the current kubeconfig context
//!     let source = KubeSource::connect(None).await?;
//!
//!     let snapshot = source.fetch().await?;
//!     for node in snapshot.nodes() {
//!         println!("{}: {} pods", node.name, node.pod_count());
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod mock;

pub use client::KubeSource;
pub use error::KubeError;
pub use mock::MockSource;
