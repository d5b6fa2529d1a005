//! Main client implementation

use crate::{
    API_PREFIX, ApiError, ClientConfig, ClientError, Result,
    types::*,
    upload::{UploadRequest, UploadSession},
};
use bytes::Bytes;
use reqwest::{
    Client, RequestBuilder, Response, StatusCode,
    cookie::{CookieStore, Jar},
    header,
};
use serde::de::{DeserializeOwned, IgnoredAny};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument};
use url::Url;

/// Cloudreve API client.
///
/// Owns its HTTP client and cookie jar, so the session established by
/// [`login`](Self::login) is scoped to this value.
pub struct CloudreveClient {
    config: ClientConfig,
    http: Client,
    cookies: Arc<Jar>,
    base: Url,
}

impl CloudreveClient {
    /// Create a new client with the given configuration
    pub fn new(config: ClientConfig) -> Result<Self> {
        let base = Url::parse(config.base_url())
            .map_err(|e| ClientError::Config(format!("invalid endpoint {:?}: {}", config.endpoint, e)))?;

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::USER_AGENT,
            header::HeaderValue::from_str(&config.user_agent)
                .map_err(|e| ClientError::Config(format!("invalid user agent: {}", e)))?,
        );

        let cookies = Arc::new(Jar::default());
        let http = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .cookie_provider(Arc::clone(&cookies))
            .build()
            .map_err(ClientError::Http)?;

        Ok(Self { config, http, cookies, base })
    }

    /// Create with endpoint URL
    pub fn with_endpoint(endpoint: &str) -> Result<Self> {
        Self::new(ClientConfig::new(endpoint))
    }

    /// Get the configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Whether the cookie jar holds a cookie for the service host
    pub fn has_session(&self) -> bool {
        self.cookies.cookies(&self.base).is_some()
    }

    // ==================== Session ====================

    /// Log in and keep the session cookie for later calls
    #[instrument(skip(self, credentials), fields(user = %credentials.user_name))]
    pub async fn login(&self, credentials: &Credentials) -> Result<User> {
        let url = self.config.api_url("/user/session");
        let user: User = self.call(self.http.post(&url).json(credentials)).await?;
        info!(id = %user.id, nickname = %user.nickname, "logged in");
        Ok(user)
    }

    /// Fetch a user's public profile and one page of their shares
    #[instrument(skip(self))]
    pub async fn user_profile(&self, id: &str, page: u32) -> Result<UserProfile> {
        let url = self.api_endpoint(["user", "profile", id])?;
        let page = page.max(1).to_string();
        let query = [("type", "default"), ("page", page.as_str())];
        self.call(self.http.get(url).query(&query)).await
    }

    // ==================== Directory ====================

    /// List a remote directory, e.g. `/` or `/photos/2023`
    #[instrument(skip(self))]
    pub async fn list_directory(&self, path: &str) -> Result<DirectoryListing> {
        let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        if segments.is_empty() {
            // The root listing is `/directory/`
            segments.push("");
        }
        let url = self.api_endpoint(std::iter::once("directory").chain(segments))?;
        let listing: DirectoryListing = self.call(self.http.get(url)).await?;
        debug!(parent = %listing.parent, entries = listing.objects.len(), "listed directory");
        Ok(listing)
    }

    // ==================== Object Operations ====================

    /// Download a file's content
    #[instrument(skip(self, object), fields(id = %object.id, name = %object.name))]
    pub async fn download_bytes(&self, object: &Object) -> Result<Bytes> {
        let url = self.api_endpoint(["file", "download", object.id.as_str()])?;
        let link: String = self.call(self.http.put(url)).await?;

        let file_url = self
            .config
            .resolve_url(&link)
            .map_err(|e| ClientError::InvalidResponse(format!("bad download link {:?}: {}", link, e)))?;
        debug!("Fetching content from {}", file_url);
        let response = self.send(self.http.get(file_url)).await?;

        let is_json = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.starts_with("application/json"))
            .unwrap_or(false);

        let data = response.bytes().await?;

        // A refused link comes back as an envelope instead of file bytes
        if is_json {
            if let Ok(envelope) = serde_json::from_slice::<ApiResponse<serde_json::Value>>(&data) {
                check_envelope(envelope)?;
            }
        }

        Ok(data)
    }

    /// Download a file into `dst_dir`, replacing any file of the same name
    pub async fn download(&self, object: &Object, dst_dir: impl AsRef<Path>) -> Result<PathBuf> {
        // Only a bare file name may be joined onto dst_dir
        let name = Path::new(&object.name);
        if name.file_name() != Some(name.as_os_str()) {
            return Err(ClientError::InvalidResponse(format!(
                "refusing to write object with name {:?}",
                object.name
            )));
        }

        let data = self.download_bytes(object).await?;

        let dst_dir = dst_dir.as_ref();
        tokio::fs::create_dir_all(dst_dir).await?;
        let path = dst_dir.join(&object.name);
        tokio::fs::write(&path, &data).await?;

        info!(path = %path.display(), bytes = data.len(), "downloaded");
        Ok(path)
    }

    /// Move objects from `src_dir` into `dst`
    #[instrument(skip(self, src))]
    pub async fn move_objects(&self, src_dir: &str, src: &ObjectSelection, dst: &str) -> Result<()> {
        let body = ObjectTransfer { action: Some("move"), src_dir, src, dst };
        let url = self.config.api_url("/object");
        self.call::<IgnoredAny>(self.http.patch(&url).json(&body)).await?;
        Ok(())
    }

    /// Copy objects from `src_dir` into `dst`
    #[instrument(skip(self, src))]
    pub async fn copy_objects(&self, src_dir: &str, src: &ObjectSelection, dst: &str) -> Result<()> {
        let body = ObjectTransfer { action: None, src_dir, src, dst };
        let url = self.config.api_url("/object/copy");
        self.call::<IgnoredAny>(self.http.post(&url).json(&body)).await?;
        Ok(())
    }

    // ==================== Upload Sessions ====================

    /// Reserve an upload session for `request`
    #[instrument(skip(self, request), fields(name = %request.name, size = request.size))]
    pub async fn create_upload_session(&self, request: &UploadRequest) -> Result<UploadSession> {
        let url = self.config.api_url("/file/upload");
        let session: UploadSession = self.call(self.http.put(&url).json(request)).await?;
        debug!(
            session_id = %session.session_id,
            chunk_size = session.chunk_size,
            urls = session.upload_urls.len(),
            "created upload session"
        );
        Ok(session)
    }

    /// Release an upload session on the server
    #[instrument(skip(self))]
    pub async fn delete_upload_session(&self, session_id: &str) -> Result<()> {
        let url = self.api_endpoint(["file", "upload", session_id])?;
        self.call::<IgnoredAny>(self.http.delete(url)).await?;
        info!("deleted upload session");
        Ok(())
    }

    // ==================== Helper Methods ====================

    pub(crate) fn http(&self) -> &Client {
        &self.http
    }

    /// API URL with each segment percent-encoded, so remote names holding
    /// `#`, `?` or `%` stay part of the path
    pub(crate) fn api_endpoint<'a, I>(&self, segments: I) -> Result<Url>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::Config(format!("endpoint {} cannot be a base URL", self.base)))?
            .pop_if_empty()
            .extend(API_PREFIX.split('/').filter(|s| !s.is_empty()))
            .extend(segments);
        Ok(url)
    }

    /// Send a request, rejecting anything but 200 OK
    pub(crate) async fn send(&self, req: RequestBuilder) -> Result<Response> {
        let response = req.send().await?;

        let status = response.status();
        if status != StatusCode::OK {
            let url = response.url().to_string();
            debug!("{} returned {}", url, status);
            return Err(ClientError::Status { status: status.as_u16(), url });
        }

        Ok(response)
    }

    /// Send a request and unwrap the Cloudreve envelope into `T`
    pub(crate) async fn call<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T> {
        let response = self.send(req).await?;
        let body = response.bytes().await?;
        decode_envelope(&body)
    }
}

/// Decode an envelope, turning a non-zero code into [`ClientError::Api`]
pub(crate) fn decode_envelope<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    let envelope: ApiResponse<serde_json::Value> = serde_json::from_slice(body)?;
    let data = check_envelope(envelope)?;
    Ok(serde_json::from_value(data)?)
}

fn check_envelope(envelope: ApiResponse<serde_json::Value>) -> Result<serde_json::Value> {
    if envelope.code != 0 {
        let message = if envelope.msg.is_empty() {
            envelope.error.unwrap_or_default()
        } else {
            envelope.msg
        };
        return Err(ClientError::Api(ApiError {
            code: envelope.code,
            message,
            data: envelope.data,
        }));
    }

    debug!(msg = %envelope.msg, "envelope ok");
    Ok(envelope.data.unwrap_or(serde_json::Value::Null))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_envelope_success() {
        let body = br#"{"code":0,"data":"/api/v3/file/download/abc","msg":""}"#;
        let link: String = decode_envelope(body).unwrap();
        assert_eq!(link, "/api/v3/file/download/abc");
    }

    #[test]
    fn test_decode_envelope_null_data() {
        let body = br#"{"code":0,"data":null,"msg":"ok"}"#;
        decode_envelope::<IgnoredAny>(body).unwrap();
    }

    #[test]
    fn test_decode_envelope_api_error() {
        let body = br#"{"code":40020,"msg":"","error":"Wrong password or email address"}"#;
        let err = decode_envelope::<User>(body).unwrap_err();
        match err {
            ClientError::Api(api) => {
                assert_eq!(api.code, 40020);
                assert_eq!(api.message, "Wrong password or email address");
                assert!(api.data.is_none());
            }
            other => panic!("Expected Api error, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_envelope_bad_json() {
        let err = decode_envelope::<User>(b"<html>502</html>").unwrap_err();
        assert!(matches!(err, ClientError::Decode(_)));
    }

    #[test]
    fn test_new_rejects_bad_endpoint() {
        let err = CloudreveClient::with_endpoint("not a url").err().unwrap();
        assert!(matches!(err, ClientError::Config(_)));
    }

    #[test]
    fn test_api_endpoint_encodes_segments() {
        let client = CloudreveClient::with_endpoint("http://127.0.0.1:5212").unwrap();
        let url = client.api_endpoint(["directory", "C# notes", "50%?"]).unwrap();
        assert_eq!(url.path(), "/api/v3/directory/C%23%20notes/50%25%3F");
        assert!(url.query().is_none());
        assert!(url.fragment().is_none());
    }

    #[test]
    fn test_api_endpoint_keeps_base_path() {
        let client = CloudreveClient::with_endpoint("https://example.com/drive/").unwrap();
        let url = client.api_endpoint(["file", "upload", "abc"]).unwrap();
        assert_eq!(url.as_str(), "https://example.com/drive/api/v3/file/upload/abc");
    }

    #[test]
    fn test_fresh_client_has_no_session() {
        let client = CloudreveClient::with_endpoint("http://127.0.0.1:5212").unwrap();
        assert!(!client.has_session());
    }
}
