//! Upload a local file using the CLI settings file for address and account
//!
//! Run with: cargo run --example upload_file -- config.yml ./video.mp4 /videos

use cloudreve_cli::{Session, Settings};
use cloudreve_client::{ProgressCallback, UploadProgress};
use std::path::PathBuf;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let config = PathBuf::from(args.next().unwrap_or_else(|| "config.yml".to_string()));
    let src = PathBuf::from(args.next().ok_or_else(|| anyhow::anyhow!("missing source file"))?);
    let remote_dir = args.next().unwrap_or_else(|| "/".to_string());

    let settings = Settings::load(&config)?;
    let session = Session::connect(&settings).await?;
    println!("✅ Logged in to {} as {}", settings.address, session.user.nickname);

    let listing = session.client.list_directory(&remote_dir).await?;
    println!("📦 Target policy: {} ({})", listing.policy.name, listing.policy.kind.as_str());

    let progress: ProgressCallback = Box::new(|p: UploadProgress| {
        println!(
            "   chunk {}/{}  {:>6.1}%",
            p.current_chunk,
            p.total_chunks,
            p.percentage()
        );
    });

    let upload = session
        .client
        .upload_with_progress(&src, &remote_dir, &listing.policy, Some(progress))
        .await;

    match upload {
        Ok(done) => println!("🎉 Uploaded {} (session {})", src.display(), done.session_id),
        Err(e) => {
            // The server-side session has already been released at this point
            eprintln!("❌ Upload failed: {}", e);
            std::process::exit(1);
        }
    }

    Ok(())
}
