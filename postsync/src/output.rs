//! Rendering command results as text or JSON on stdout

use std::str::FromStr;

use anyhow::Result;
use libpostsync::service::ConnectionStatus;
use libpostsync::types::join_platforms;
use libpostsync::{Post, PublishOutcome};
use serde_json::json;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("Invalid output format: '{}'", other)),
        }
    }
}

pub fn message(format: OutputFormat, text: &str) -> Result<()> {
    match format {
        OutputFormat::Text => println!("{}", text),
        OutputFormat::Json => println!("{}", json!({ "message": text })),
    }
    Ok(())
}

pub fn lines(format: OutputFormat, items: &[String]) -> Result<()> {
    match format {
        OutputFormat::Text => {
            for item in items {
                println!("{}", item);
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string(items)?),
    }
    Ok(())
}

pub fn status(format: OutputFormat, version: u32, connections: &[ConnectionStatus]) -> Result<()> {
    match format {
        OutputFormat::Text => {
            println!("schema version: {}", version);
            for status in connections {
                let state = match (status.connected, status.enabled) {
                    (true, true) => "connected",
                    (true, false) => "connected (disabled)",
                    (false, _) => "not connected",
                };
                println!("{:<8} {}", status.platform, state);
            }
        }
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "schema_version": version,
                "platforms": connections,
            }))?
        ),
    }
    Ok(())
}

pub fn outcome(format: OutputFormat, outcome: &PublishOutcome) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(outcome)?),
        OutputFormat::Text => match outcome {
            PublishOutcome::Delivered { platforms } => {
                println!("Published to {}", join_platforms(platforms.iter()))
            }
            PublishOutcome::AlreadyDelivered { platforms } => {
                println!("Already published to {}", join_platforms(platforms.iter()))
            }
            PublishOutcome::Partial { succeeded, failed } => {
                if !succeeded.is_empty() {
                    println!("Published to {}", join_platforms(succeeded.iter()));
                }
                for (platform, reason) in failed {
                    eprintln!("{}: {}", platform, reason);
                }
                println!("Failed: {}", join_platforms(failed.keys()));
            }
        },
    }
    Ok(())
}

pub fn posts(format: OutputFormat, posts: &[Post]) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(posts)?),
        OutputFormat::Text => {
            for post in posts {
                let target = if post.platforms.is_empty() {
                    String::new()
                } else {
                    format!(" -> {}", post.platforms)
                };
                println!(
                    "#{} [{}] {}{}",
                    post.id,
                    post.created_at.format("%Y-%m-%d %H:%M"),
                    post.status.as_str(),
                    target
                );
                if !post.content.is_empty() {
                    println!("  {}", post.content);
                }
                if !post.images.is_empty() {
                    println!("  images: {}", post.images.len());
                }
                if !post.tags.is_empty() {
                    println!("  tags: {}", post.tags);
                }
            }
        }
    }
    Ok(())
}
