//! Basic usage: log in, browse, download, and upload from memory
//!
//! Run with: cargo run --example basic_usage -- https://drive.example.com user@example.com password

use bytes::Bytes;
use cloudreve_client::{CloudreveClient, ClientConfig, Credentials, UploadRequest};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let endpoint = args.next().unwrap_or_else(|| "http://localhost:5212".to_string());
    let user = args.next().unwrap_or_else(|| "admin@cloudreve.org".to_string());
    let password = args.next().unwrap_or_default();

    println!("🔌 Connecting to {}", endpoint);
    let client = CloudreveClient::new(ClientConfig::new(&endpoint))?;

    let me = client.login(&Credentials::new(&user, &password)).await?;
    println!("✅ Logged in as {} ({}), group {}", me.nickname, me.id, me.group.name);

    let root = client.list_directory("/").await?;
    println!("\n📁 / ({} entries, policy {} [{}])", root.objects.len(), root.policy.name, root.policy.kind.as_str());
    for object in &root.objects {
        let kind = if object.is_dir() { "dir " } else { "file" };
        println!("   {} {:>12}  {}", kind, object.size, object.name);
    }

    if let Some(first_file) = root.files().next() {
        let dst = std::env::temp_dir().join("cloudreve-demo");
        let path = client.download(first_file, &dst).await?;
        println!("\n⬇️  Downloaded {} to {}", first_file.name, path.display());
    }

    let greeting = Bytes::from_static(b"Hello from the Cloudreve Rust SDK!\n");
    let request = UploadRequest::new("hello-from-rust.txt", "/", &root.policy, greeting.len() as u64);
    let session = client.upload_bytes(&request, greeting, &root.policy.kind, None).await?;
    println!("\n⬆️  Uploaded hello-from-rust.txt (session {})", session.session_id);

    Ok(())
}
