//! Subcommands and the session they run against

use crate::settings::Settings;
use anyhow::{Context, anyhow, bail};
use clap::Subcommand;
use cloudreve_client::{
    CloudreveClient, DirectoryListing, Object, ObjectSelection, ProgressCallback, UploadProgress,
    User,
};
use std::path::PathBuf;
use tracing::info;

/// Operations available both as subcommands and inside the shell
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Show the logged-in account
    Whoami,

    /// Show a user's profile and public shares
    Profile {
        /// User ID; defaults to the logged-in user
        id: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },

    /// List a remote directory
    Ls {
        #[arg(default_value = "/")]
        path: String,
    },

    /// Download a remote file
    Get {
        /// Remote file path, e.g. /docs/report.pdf
        remote: String,
        /// Local directory; defaults to the first configured path
        dst: Option<PathBuf>,
    },

    /// Upload a local file into a remote directory
    Put {
        src: PathBuf,
        #[arg(default_value = "/")]
        remote_dir: String,
    },

    /// Move remote files or directories into another directory
    Mv {
        #[arg(required = true)]
        sources: Vec<String>,
        /// Destination directory
        #[arg(short = 't', long = "to")]
        dst: String,
    },

    /// Copy remote files or directories into another directory
    Cp {
        #[arg(required = true)]
        sources: Vec<String>,
        /// Destination directory
        #[arg(short = 't', long = "to")]
        dst: String,
    },
}

/// A logged-in client plus the settings it was built from
pub struct Session {
    pub client: CloudreveClient,
    pub user: User,
    settings: Settings,
}

impl Session {
    /// Build a client from settings and log in
    pub async fn connect(settings: &Settings) -> anyhow::Result<Self> {
        let client = CloudreveClient::new(settings.client_config())?;
        let user = client
            .login(&settings.credentials())
            .await
            .with_context(|| format!("login to {} failed", settings.address))?;

        Ok(Self {
            client,
            user,
            settings: settings.clone(),
        })
    }

    /// Whether `settings` point at a different server or account
    pub fn is_stale(&self, settings: &Settings) -> bool {
        self.settings.connection_changed(settings)
    }

    /// Settings this session was connected with
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Pick up settings that do not need a new login, such as download paths
    pub fn refresh(&mut self, settings: Settings) {
        self.settings = settings;
    }

    /// Run one command, printing its result to stdout
    pub async fn run(&self, command: &Command) -> anyhow::Result<()> {
        match command {
            Command::Whoami => {
                println!("{} <{}> id={} group={}", self.user.nickname, self.user.user_name, self.user.id, self.user.group.name);
            }
            Command::Profile { id, page } => {
                let id = id.as_deref().unwrap_or(&self.user.id);
                let profile = self.client.user_profile(id, *page).await?;
                println!("{} ({}) joined {}", profile.user.nick, profile.user.group, profile.user.date);
                for item in &profile.items {
                    println!("{:<10} {:>10} {:>6} views  {}", item.key, format_size(item.source.size), item.views, item.source.name);
                }
                println!("{} shares", profile.total);
            }
            Command::Ls { path } => {
                let listing = self.client.list_directory(path).await?;
                print_listing(&listing);
            }
            Command::Get { remote, dst } => {
                let object = self.locate(remote).await?;
                if object.is_dir() {
                    bail!("{} is a directory", remote);
                }
                let dst = dst.clone().unwrap_or_else(|| self.settings.download_dir());
                let written = self.client.download(&object, &dst).await?;
                println!("{}", written.display());
            }
            Command::Put { src, remote_dir } => {
                let listing = self.client.list_directory(remote_dir).await?;
                let progress: ProgressCallback = Box::new(|p: UploadProgress| {
                    info!(
                        chunk = p.current_chunk,
                        chunks = p.total_chunks,
                        "{:.1}% uploaded",
                        p.percentage()
                    );
                });
                let session = self
                    .client
                    .upload_with_progress(src, remote_dir, &listing.policy, Some(progress))
                    .await?;
                println!("uploaded {} ({})", src.display(), session.session_id);
            }
            Command::Mv { sources, dst } => {
                let (src_dir, selection) = self.select(sources).await?;
                self.client.move_objects(&src_dir, &selection, dst).await?;
                println!("moved {} item(s) to {}", sources.len(), dst);
            }
            Command::Cp { sources, dst } => {
                let (src_dir, selection) = self.select(sources).await?;
                self.client.copy_objects(&src_dir, &selection, dst).await?;
                println!("copied {} item(s) to {}", sources.len(), dst);
            }
        }

        Ok(())
    }

    /// Find the listing entry for a remote path
    async fn locate(&self, remote: &str) -> anyhow::Result<Object> {
        let (dir, name) = split_remote(remote).ok_or_else(|| anyhow!("not a file path: {}", remote))?;
        let listing = self.client.list_directory(&dir).await?;
        listing
            .find(&name)
            .cloned()
            .ok_or_else(|| anyhow!("{} not found in {}", name, dir))
    }

    /// Resolve sources that must share one parent directory
    async fn select(&self, sources: &[String]) -> anyhow::Result<(String, ObjectSelection)> {
        let mut parent: Option<String> = None;
        let mut names = Vec::with_capacity(sources.len());
        for source in sources {
            let (dir, name) = split_remote(source).ok_or_else(|| anyhow!("not a path: {}", source))?;
            if parent.as_deref().is_some_and(|p| p != dir) {
                bail!("all sources must be in the same directory");
            }
            parent.get_or_insert(dir);
            names.push(name);
        }

        let src_dir = parent.ok_or_else(|| anyhow!("no sources given"))?;
        let listing = self.client.list_directory(&src_dir).await?;
        let objects = names
            .iter()
            .map(|name| listing.find(name).ok_or_else(|| anyhow!("{} not found in {}", name, src_dir)))
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok((src_dir, ObjectSelection::from_objects(objects)))
    }
}

/// Split `/a/b/c.txt` into (`/a/b`, `c.txt`); bare names live in `/`
pub fn split_remote(path: &str) -> Option<(String, String)> {
    let trimmed = path.trim().trim_end_matches('/');
    let trimmed = if trimmed.starts_with('/') { trimmed.to_string() } else { format!("/{}", trimmed) };

    let (dir, name) = trimmed.rsplit_once('/')?;
    if name.is_empty() {
        return None;
    }
    let dir = if dir.is_empty() { "/" } else { dir };
    Some((dir.to_string(), name.to_string()))
}

/// Human-readable byte count
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}

fn print_listing(listing: &DirectoryListing) {
    for object in &listing.objects {
        let size = if object.is_dir() { "-".to_string() } else { format_size(object.size) };
        let marker = if object.is_dir() { "/" } else { "" };
        println!(
            "{:>10}  {}  {}{}",
            size,
            object.date.format("%Y-%m-%d %H:%M"),
            object.name,
            marker
        );
    }
    println!("{} entries, policy {} ({})", listing.objects.len(), listing.policy.name, listing.policy.kind.as_str());
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("/docs/report.pdf", Some(("/docs", "report.pdf")))]
    #[case("/report.pdf", Some(("/", "report.pdf")))]
    #[case("report.pdf", Some(("/", "report.pdf")))]
    #[case("/a/b/", Some(("/a", "b")))]
    #[case("/", None)]
    fn test_split_remote(#[case] input: &str, #[case] expected: Option<(&str, &str)>) {
        let expected = expected.map(|(d, n)| (d.to_string(), n.to_string()));
        assert_eq!(split_remote(input), expected);
    }

    #[rstest]
    #[case(0, "0 B")]
    #[case(1023, "1023 B")]
    #[case(1536, "1.5 KB")]
    #[case(5 * 1024 * 1024, "5.0 MB")]
    fn test_format_size(#[case] bytes: u64, #[case] expected: &str) {
        assert_eq!(format_size(bytes), expected);
    }
}
