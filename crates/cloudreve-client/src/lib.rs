//! # Cloudreve Client SDK
//!
//! A client SDK for the Cloudreve v3 REST API.
//!
//! ## Features
//!
//! - **Sessions**: cookie-based login kept per client, no global state
//! - **Browsing**: directory listings, user profiles, move and copy
//! - **Download**: resolves the signed download link and fetches the bytes
//! - **Upload**: session creation, then either presigned S3 part uploads
//!   with a `CompleteMultipartUpload` finalization or chunked posts to
//!   local storage; the session is released again if any step fails
//!
//! ## Example
//!
//! ```rust,ignore
//! use cloudreve_client::{CloudreveClient, ClientConfig, Credentials};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = CloudreveClient::new(ClientConfig::new("https://drive.example.com"))?;
//!     client.login(&Credentials::new("admin@cloudreve.org", "password")).await?;
//!
//!     let root = client.list_directory("/").await?;
//!     for object in &root.objects {
//!         println!("{} {}", object.name, object.size);
//!     }
//!
//!     client.upload("notes.txt", "/", &root.policy).await?;
//!     Ok(())
//! }
//! ```

mod client;
mod config;
mod error;
mod types;
mod upload;

pub use client::CloudreveClient;
pub use config::{ClientConfig, API_PREFIX};
pub use error::{ApiError, ClientError, Result};
pub use types::*;
pub use upload::{
    chunk_ranges, completion_document, ProgressCallback, UploadDestination, UploadProgress,
    UploadRequest, UploadSession,
};
