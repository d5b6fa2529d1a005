//! Interactive shell that follows settings reloads

use crate::commands::{Command, Session};
use crate::settings::SettingsWatcher;
use clap::Parser;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(no_binary_name = true)]
struct ShellLine {
    #[command(subcommand)]
    command: Command,
}

/// Parse one shell line; blank lines yield `None`
pub fn parse_line(line: &str) -> Result<Option<Command>, clap::Error> {
    let words: Vec<&str> = line.split_whitespace().collect();
    if words.is_empty() {
        return Ok(None);
    }
    ShellLine::try_parse_from(words).map(|l| Some(l.command))
}

fn prompt() {
    print!("cloudreve> ");
    let _ = std::io::stdout().flush();
}

/// Read commands from stdin until EOF or `exit`.
///
/// Settings are re-read from the watcher before every command; a changed
/// address or account triggers a fresh login.
pub async fn run(watcher: &SettingsWatcher) -> anyhow::Result<()> {
    let mut session = Session::connect(&watcher.current()).await?;
    let mut generation = watcher.generation();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    prompt();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line == "exit" || line == "quit" {
            break;
        }

        let command = match parse_line(line) {
            Ok(Some(command)) => command,
            Ok(None) => {
                prompt();
                continue;
            }
            Err(e) => {
                eprintln!("{}", e);
                prompt();
                continue;
            }
        };

        let latest = watcher.generation();
        if latest != generation {
            let settings = watcher.current();
            if session.is_stale(&settings) {
                info!(address = %settings.address, "settings changed, logging in again");
                match Session::connect(&settings).await {
                    Ok(fresh) => session = fresh,
                    // Generation stays put so the next command retries
                    Err(e) => {
                        error!("reconnect failed: {:#}", e);
                        prompt();
                        continue;
                    }
                }
            } else {
                session.refresh(settings);
            }
            generation = latest;
        }

        if let Err(e) = session.run(&command).await {
            error!("{:#}", e);
        }
        prompt();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line() {
        assert_eq!(parse_line("   ").unwrap(), None);
        assert_eq!(
            parse_line("ls /docs").unwrap(),
            Some(Command::Ls { path: "/docs".to_string() })
        );
        assert_eq!(
            parse_line("mv /a.txt /b.txt --to /archive").unwrap(),
            Some(Command::Mv {
                sources: vec!["/a.txt".to_string(), "/b.txt".to_string()],
                dst: "/archive".to_string(),
            })
        );
        assert!(parse_line("rm -rf /").is_err());
    }
}
