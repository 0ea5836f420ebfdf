//! Rare Event Detection Client Library
//!
//! Provides a typed HTTP client for the rare event detection service. The
//! backend embeds images, compares them against a small captioned reference
//! set, captions images and generates new ones from text. This crate only
//! speaks its HTTP contract.
//!
//! # Example
//!
//! ```rust,no_run
//! use rare_client::{ImageFile, RareClient, ReferenceSet};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = RareClient::new("http://localhost:8000")?;
//!
//!     let health = client.health().await?;
//!     println!("running on {}", health.device);
//!
//!     // Upload the four captioned references
//!     let mut refs = ReferenceSet::new();
//!     for (slot, caption) in ["fire", "flood", "storm", "volcano"].iter().enumerate() {
//!         let image = ImageFile::from_path(format!("refs/{}.jpg", caption)).await?;
//!         refs.set(slot + 1, image, *caption)?;
//!     }
//!     client.upload_references(&refs).await?;
//!
//!     // Classify a new image
//!     let result = client.classify(&ImageFile::from_path("new.jpg").await?).await?;
//!     println!("{} ({})", result.label, result.confidence());
//!
//!     Ok(())
//! }
//! ```
//!
//! # Testing
//!
//! The `testing` module provides an in-process mock backend:
//!
//! ```rust,ignore
//! use rare_client::testing::{MockBackend, TestServer};
//!
//! let server = TestServer::mock(&MockBackend::new()).await?;
//! let health = server.client.health().await?;
//! ```

mod client;
mod error;
pub mod image;
pub mod references;
pub mod testing;
mod types;

pub use client::RareClient;
pub use error::{ErrorCategory, RareClientError, Result};
pub use image::{DataUri, ImageFile};
pub use references::{Reference, ReferenceSet, REFERENCE_SLOTS};
pub use types::*;
