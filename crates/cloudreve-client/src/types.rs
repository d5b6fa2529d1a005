//! Wire types for the Cloudreve v3 API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Envelope every Cloudreve JSON response is wrapped in
#[derive(Clone, Debug, Deserialize)]
pub struct ApiResponse<T> {
    /// Zero on success
    pub code: i64,
    /// Payload; shape depends on the endpoint
    #[serde(default)]
    pub data: Option<T>,
    /// Human-readable message
    #[serde(default)]
    pub msg: String,
    /// Extra error detail some endpoints send
    #[serde(default)]
    pub error: Option<String>,
}

// ==================== Session ====================

/// Login request body
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(rename = "userName")]
    pub user_name: String,
    #[serde(rename = "Password")]
    pub password: String,
    #[serde(rename = "captchaCode", default)]
    pub captcha_code: String,
}

impl Credentials {
    pub fn new(user_name: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user_name: user_name.into(),
            password: password.into(),
            captcha_code: String::new(),
        }
    }

    /// Attach a captcha answer
    pub fn with_captcha(mut self, code: impl Into<String>) -> Self {
        self.captcha_code = code.into();
        self
    }
}

/// User group and its permissions
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Group {
    pub id: i64,
    pub name: String,
    #[serde(rename = "allowShare")]
    pub allow_share: bool,
    #[serde(rename = "allowRemoteDownload")]
    pub allow_remote_download: bool,
    #[serde(rename = "allowArchiveDownload")]
    pub allow_archive_download: bool,
    #[serde(rename = "shareDownload")]
    pub share_download: bool,
    pub compress: bool,
    pub webdav: bool,
    #[serde(rename = "sourceBatch")]
    pub source_batch: i64,
    #[serde(rename = "advanceDelete")]
    pub advance_delete: bool,
    #[serde(rename = "allowWebDAVProxy")]
    pub allow_webdav_proxy: bool,
}

/// The logged-in user, as returned by the session endpoint
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct User {
    pub id: String,
    pub user_name: String,
    pub nickname: String,
    pub status: i64,
    pub avatar: String,
    pub created_at: String,
    pub preferred_theme: String,
    pub anonymous: bool,
    pub group: Group,
    pub tags: Vec<String>,
}

// ==================== Profile ====================

/// Public profile header
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileUser {
    pub id: String,
    pub nick: String,
    pub group: String,
    pub date: String,
}

/// Shared file summary
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ShareSource {
    pub name: String,
    pub size: u64,
}

/// One share listed on a user profile
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ShareItem {
    pub key: String,
    pub is_dir: bool,
    pub password: String,
    pub create_date: DateTime<Utc>,
    pub downloads: i64,
    pub remain_downloads: i64,
    pub views: i64,
    pub expire: i64,
    pub preview: bool,
    pub source: ShareSource,
}

/// User profile with a page of public shares
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UserProfile {
    pub items: Vec<ShareItem>,
    pub total: u64,
    pub user: ProfileUser,
}

// ==================== Directory ====================

/// Storage backend kind behind a policy
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyKind {
    #[default]
    Local,
    Remote,
    S3,
    Oss,
    Cos,
    Qiniu,
    Upyun,
    Onedrive,
    #[serde(other)]
    Unknown,
}

impl PolicyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
            Self::S3 => "s3",
            Self::Oss => "oss",
            Self::Cos => "cos",
            Self::Qiniu => "qiniu",
            Self::Upyun => "upyun",
            Self::Onedrive => "onedrive",
            Self::Unknown => "unknown",
        }
    }
}

/// Storage policy governing where uploads in a directory land
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Policy {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: PolicyKind,
    /// Zero means unlimited
    pub max_size: u64,
    /// Allowed extensions; empty means any
    pub file_type: Vec<String>,
}

/// Whether a listing entry is a file or a directory
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    #[default]
    File,
    Dir,
    /// Any entry type this client does not know about
    #[serde(other)]
    Unknown,
}

/// A file or directory in a listing
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Object {
    pub id: String,
    pub name: String,
    /// Parent directory of this entry
    pub path: String,
    pub thumb: bool,
    /// Size in bytes; always 0 for directories
    pub size: u64,
    #[serde(rename = "type")]
    pub kind: ObjectKind,
    pub date: DateTime<Utc>,
    pub create_date: DateTime<Utc>,
    pub source_enabled: bool,
}

impl Object {
    pub fn is_dir(&self) -> bool {
        self.kind == ObjectKind::Dir
    }

    /// Full remote path of this entry
    pub fn full_path(&self) -> String {
        if self.path.ends_with('/') {
            format!("{}{}", self.path, self.name)
        } else {
            format!("{}/{}", self.path, self.name)
        }
    }
}

/// Result of listing a directory
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryListing {
    /// ID of the listed directory
    pub parent: String,
    pub objects: Vec<Object>,
    pub policy: Policy,
}

impl DirectoryListing {
    /// Find an entry by name
    pub fn find(&self, name: &str) -> Option<&Object> {
        self.objects.iter().find(|o| o.name == name)
    }

    pub fn files(&self) -> impl Iterator<Item = &Object> {
        self.objects.iter().filter(|o| !o.is_dir())
    }

    pub fn dirs(&self) -> impl Iterator<Item = &Object> {
        self.objects.iter().filter(|o| o.is_dir())
    }
}

// ==================== Object operations ====================

/// Source selection for move/copy
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ObjectSelection {
    /// Directory IDs
    pub dirs: Vec<String>,
    /// File IDs
    pub items: Vec<String>,
}

impl ObjectSelection {
    /// Split objects into file and directory IDs
    pub fn from_objects<'a>(objects: impl IntoIterator<Item = &'a Object>) -> Self {
        let mut selection = Self::default();
        for object in objects {
            if object.is_dir() {
                selection.dirs.push(object.id.clone());
            } else {
                selection.items.push(object.id.clone());
            }
        }
        selection
    }

    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty() && self.items.is_empty()
    }
}

/// Body for `PATCH /object` (move) and `POST /object/copy`
#[derive(Clone, Debug, Serialize)]
pub(crate) struct ObjectTransfer<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<&'static str>,
    pub src_dir: &'a str,
    pub src: &'a ObjectSelection,
    pub dst: &'a str,
}
