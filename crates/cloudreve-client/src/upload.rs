//! Upload orchestration
//!
//! An upload is three steps: reserve a session with the Cloudreve API, push
//! the bytes to wherever the directory's storage policy keeps them, then
//! finalize. For S3-compatible policies the bytes go straight to object
//! storage through presigned URLs and are finalized with a
//! `CompleteMultipartUpload` document plus a Cloudreve callback. For local
//! policies the bytes are posted to Cloudreve itself in chunks.
//!
//! If anything after the session is created fails, the session is deleted
//! before the error is returned.

use crate::{CloudreveClient, ClientError, Result, types::{Policy, PolicyKind}};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::IgnoredAny};
use std::io::SeekFrom;
use std::ops::Range;
use std::path::Path;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, info, instrument, warn};

/// Progress callback type
pub type ProgressCallback = Box<dyn Fn(UploadProgress) + Send + Sync>;

/// Upload progress information
#[derive(Clone, Debug)]
pub struct UploadProgress {
    /// Bytes uploaded so far
    pub bytes_uploaded: u64,
    /// Total bytes to upload
    pub total_bytes: u64,
    /// Chunk just finished, starting at 1
    pub current_chunk: u32,
    /// Total number of chunks
    pub total_chunks: u32,
}

impl UploadProgress {
    /// Get percentage complete
    pub fn percentage(&self) -> f64 {
        if self.total_bytes == 0 {
            return 100.0;
        }
        (self.bytes_uploaded as f64 / self.total_bytes as f64) * 100.0
    }
}

/// Body of the session-creation request
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct UploadRequest {
    /// Modification time of the source, milliseconds since the epoch
    pub last_modified: i64,
    /// May be empty
    pub mime_type: String,
    pub name: String,
    /// Remote directory relative to the drive root
    pub path: String,
    /// Storage policy ID, taken from a directory listing
    pub policy_id: String,
    /// Size in bytes
    pub size: u64,
}

impl UploadRequest {
    pub fn new(name: impl Into<String>, path: impl Into<String>, policy: &Policy, size: u64) -> Self {
        let name = name.into();
        let mime_type = mime_guess::from_path(&name)
            .first()
            .map(|m| m.essence_str().to_string())
            .unwrap_or_default();

        Self {
            last_modified: Utc::now().timestamp_millis(),
            mime_type,
            name,
            path: path.into(),
            policy_id: policy.id.clone(),
            size,
        }
    }

    /// Describe a local file for upload into `remote_dir`
    pub async fn from_file(src: impl AsRef<Path>, remote_dir: &str, policy: &Policy) -> Result<Self> {
        let src = src.as_ref();
        let metadata = tokio::fs::metadata(src).await?;
        if !metadata.is_file() {
            return Err(ClientError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{} is not a regular file", src.display()),
            )));
        }

        let name = src
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                ClientError::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("{} has no usable file name", src.display()),
                ))
            })?;

        let mut request = Self::new(name, remote_dir, policy, metadata.len());
        request.last_modified = DateTime::<Utc>::from(metadata.modified()?).timestamp_millis();
        Ok(request)
    }
}

/// Upload session handed back by the server
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadSession {
    #[serde(rename = "sessionID")]
    pub session_id: String,
    /// Zero means the whole file goes in one chunk
    #[serde(rename = "chunkSize")]
    pub chunk_size: u64,
    /// Expiry as a unix timestamp
    pub expires: i64,
    /// Presigned part URLs, object storage only
    #[serde(rename = "uploadURLs")]
    pub upload_urls: Vec<String>,
    #[serde(rename = "uploadID")]
    pub upload_id: String,
    /// Where the completion document goes, object storage only
    #[serde(rename = "completeURL")]
    pub complete_url: String,
}

/// Where the bytes of an upload are sent
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UploadDestination {
    /// S3-compatible storage reached through presigned URLs
    ObjectStorage {
        session_id: String,
        upload_urls: Vec<String>,
        complete_url: String,
    },
    /// Cloudreve's own disk, fed through the chunk endpoint
    Local { session_id: String },
}

impl UploadDestination {
    /// Pick the destination for a policy kind
    pub fn resolve(kind: &PolicyKind, session: &UploadSession) -> Result<Self> {
        match kind {
            PolicyKind::S3 => {
                if session.upload_urls.is_empty() {
                    return Err(ClientError::InvalidResponse("session has no upload URLs".to_string()));
                }
                if session.complete_url.is_empty() {
                    return Err(ClientError::InvalidResponse("session has no completion URL".to_string()));
                }
                Ok(Self::ObjectStorage {
                    session_id: session.session_id.clone(),
                    upload_urls: session.upload_urls.clone(),
                    complete_url: session.complete_url.clone(),
                })
            }
            PolicyKind::Local => Ok(Self::Local { session_id: session.session_id.clone() }),
            PolicyKind::Remote
            | PolicyKind::Oss
            | PolicyKind::Cos
            | PolicyKind::Qiniu
            | PolicyKind::Upyun
            | PolicyKind::Onedrive
            | PolicyKind::Unknown => Err(ClientError::UnsupportedPolicy(kind.as_str().to_string())),
        }
    }

    pub fn session_id(&self) -> &str {
        match self {
            Self::ObjectStorage { session_id, .. } | Self::Local { session_id } => session_id,
        }
    }
}

/// Split `total` bytes into chunks of at most `chunk_size`.
///
/// Always yields at least one range, so empty files still send one chunk.
pub fn chunk_ranges(total: u64, chunk_size: u64) -> Vec<Range<usize>> {
    let total = total as usize;
    if chunk_size == 0 || total <= chunk_size as usize {
        return vec![0..total];
    }

    let chunk_size = chunk_size as usize;
    (0..total)
        .step_by(chunk_size)
        .map(|start| start..(start + chunk_size).min(total))
        .collect()
}

#[derive(Debug, Serialize)]
#[serde(rename = "CompleteMultipartUpload")]
struct CompleteMultipartUpload<'a> {
    #[serde(rename = "Part")]
    parts: Vec<CompletedPart<'a>>,
}

#[derive(Debug, Serialize)]
struct CompletedPart<'a> {
    #[serde(rename = "PartNumber")]
    part_number: u32,
    #[serde(rename = "ETag")]
    etag: &'a str,
}

/// Build the S3 completion document for parts numbered from 1, in order
pub fn completion_document(etags: &[String]) -> Result<String> {
    let document = CompleteMultipartUpload {
        parts: etags
            .iter()
            .zip(1u32..)
            .map(|(etag, part_number)| CompletedPart { part_number, etag })
            .collect(),
    };

    quick_xml::se::to_string(&document).map_err(|e| ClientError::Xml(e.to_string()))
}

/// Where chunk bytes come from
enum Payload {
    Memory(Bytes),
    /// Read one chunk at a time so memory stays bounded by the chunk size
    File(tokio::fs::File),
}

impl Payload {
    async fn chunk(&mut self, range: Range<usize>) -> Result<Bytes> {
        match self {
            Payload::Memory(data) => Ok(data.slice(range)),
            Payload::File(file) => {
                let mut buf = vec![0u8; range.len()];
                file.seek(SeekFrom::Start(range.start as u64)).await?;
                file.read_exact(&mut buf).await?;
                Ok(Bytes::from(buf))
            }
        }
    }
}

impl CloudreveClient {
    /// Upload a local file into `remote_dir` under `policy`
    pub async fn upload(
        &self,
        src: impl AsRef<Path>,
        remote_dir: &str,
        policy: &Policy,
    ) -> Result<UploadSession> {
        self.upload_with_progress(src, remote_dir, policy, None).await
    }

    /// Upload a local file, reporting progress after each chunk
    pub async fn upload_with_progress(
        &self,
        src: impl AsRef<Path>,
        remote_dir: &str,
        policy: &Policy,
        progress: Option<ProgressCallback>,
    ) -> Result<UploadSession> {
        let src = src.as_ref();
        let request = UploadRequest::from_file(src, remote_dir, policy).await?;
        let file = tokio::fs::File::open(src).await?;

        // A file that shrinks mid-upload fails its short chunk read
        self.run_upload(&request, Payload::File(file), &policy.kind, progress).await
    }

    /// Run the full upload sequence for in-memory data
    pub async fn upload_bytes(
        &self,
        request: &UploadRequest,
        data: Bytes,
        kind: &PolicyKind,
        progress: Option<ProgressCallback>,
    ) -> Result<UploadSession> {
        if request.size != data.len() as u64 {
            return Err(ClientError::Config(format!(
                "request declares {} bytes but {} were given",
                request.size,
                data.len()
            )));
        }

        self.run_upload(request, Payload::Memory(data), kind, progress).await
    }

    #[instrument(skip(self, request, payload, progress), fields(name = %request.name, policy = kind.as_str()))]
    async fn run_upload(
        &self,
        request: &UploadRequest,
        mut payload: Payload,
        kind: &PolicyKind,
        progress: Option<ProgressCallback>,
    ) -> Result<UploadSession> {
        let session = self.create_upload_session(request).await?;

        match self
            .transfer(&session, kind, &mut payload, request.size, progress.as_ref())
            .await
        {
            Ok(()) => {
                info!(session_id = %session.session_id, "upload complete");
                Ok(session)
            }
            Err(err) => {
                warn!(session_id = %session.session_id, error = %err, "upload failed, releasing session");
                if let Err(cleanup) = self.delete_upload_session(&session.session_id).await {
                    warn!(session_id = %session.session_id, error = %cleanup, "could not release upload session");
                }
                Err(err)
            }
        }
    }

    async fn transfer(
        &self,
        session: &UploadSession,
        kind: &PolicyKind,
        payload: &mut Payload,
        total_bytes: u64,
        progress: Option<&ProgressCallback>,
    ) -> Result<()> {
        let destination = UploadDestination::resolve(kind, session)?;
        let ranges = chunk_ranges(total_bytes, session.chunk_size);
        let total_chunks = ranges.len() as u32;

        let report = |index: usize, range: &Range<usize>| {
            if let Some(cb) = progress {
                cb(UploadProgress {
                    bytes_uploaded: range.end as u64,
                    total_bytes,
                    current_chunk: index as u32 + 1,
                    total_chunks,
                });
            }
        };

        match destination {
            UploadDestination::ObjectStorage { session_id, upload_urls, complete_url } => {
                if upload_urls.len() != ranges.len() {
                    return Err(ClientError::InvalidResponse(format!(
                        "{} upload URLs for {} chunks",
                        upload_urls.len(),
                        ranges.len()
                    )));
                }

                let mut etags = Vec::with_capacity(ranges.len());
                for (index, (url, range)) in upload_urls.iter().zip(&ranges).enumerate() {
                    let chunk = payload.chunk(range.clone()).await?;
                    etags.push(self.put_part(url, chunk).await?);
                    report(index, range);
                }

                self.complete_object_upload(&complete_url, &etags).await?;
                self.confirm_object_upload(&session_id).await
            }
            UploadDestination::Local { session_id } => {
                for (index, range) in ranges.iter().enumerate() {
                    let chunk = payload.chunk(range.clone()).await?;
                    self.post_chunk(&session_id, index, chunk).await?;
                    report(index, range);
                }
                Ok(())
            }
        }
    }

    /// PUT one part to object storage and return its ETag
    async fn put_part(&self, url: &str, data: Bytes) -> Result<String> {
        debug!(bytes = data.len(), "uploading part");
        let response = self.send(self.http().put(url).body(data)).await?;

        let etag = response
            .headers()
            .get("ETag")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        // An S3 error body outranks a missing ETag
        let text = response.text().await?;
        if let Some(err) = ClientError::from_s3_xml(&text) {
            return Err(err);
        }

        etag.ok_or_else(|| ClientError::InvalidResponse("Missing ETag".to_string()))
    }

    async fn complete_object_upload(&self, complete_url: &str, etags: &[String]) -> Result<()> {
        let xml = completion_document(etags)?;
        debug!(parts = etags.len(), "completing multipart upload");

        let req = self
            .http()
            .post(complete_url)
            .header("Content-Type", "application/xml")
            .body(xml);
        let response = self.send(req).await?;

        // S3 can report failure inside a 200 reply
        let text = response.text().await?;
        match ClientError::from_s3_xml(&text) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn confirm_object_upload(&self, session_id: &str) -> Result<()> {
        let url = self.api_endpoint(["callback", "s3", session_id])?;
        self.call::<IgnoredAny>(self.http().get(url)).await?;
        Ok(())
    }

    async fn post_chunk(&self, session_id: &str, index: usize, data: Bytes) -> Result<()> {
        let index_segment = index.to_string();
        let url = self.api_endpoint(["file", "upload", session_id, index_segment.as_str()])?;
        debug!(index, bytes = data.len(), "uploading chunk");

        let req = self
            .http()
            .post(url)
            .header("Content-Type", "application/octet-stream")
            .body(data);
        self.call::<IgnoredAny>(req).await?;
        Ok(())
    }
}
