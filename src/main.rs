use anyhow::{Context, Result};
use buc::{BuchatClient, FileType, UploadEvent};
use clap::{CommandFactory, Parser, Subcommand, ValueHint};
use futures::StreamExt;
use iocraft::prelude::*;
use std::{
    fs::File,
    io::{self, Read, Write},
    path::{Path, PathBuf},
};
use tokio::sync::watch;
use url::Url;

use crate::ui::{ConfigHeader, ErrorMessage, InputPrompt, ProgressBar, SuccessMessage};

mod config;
mod ui;

const DEFAULT_BUCHAT_BASE_URL: &str = "https://api.buchat.app";

#[derive(Parser)]
#[command(name = "buc")]
#[command(version)]
#[command(about = "A tool for uploading media to the Buchat platform")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a media file
    Upload {
        #[arg(value_hint = ValueHint::FilePath)]
        file: PathBuf,
        /// Media category reported to the gateway; derived from the content
        /// type when omitted
        #[arg(short, long, value_enum)]
        file_type: Option<FileType>,
        /// MIME type sent with the upload; sniffed from the file when omitted
        #[arg(short, long)]
        content_type: Option<String>,
    },
    /// Print a presigned download URL for a stored file
    Download { file_key: String },
    /// Print a thumbnail URL for a stored image
    Thumbnail {
        file_key: String,
        #[arg(long, default_value_t = 300)]
        width: u32,
        #[arg(long, default_value_t = 200)]
        height: u32,
    },
    /// Print the HLS manifest URL for a processed video
    Manifest {
        video_id: String,
        /// Fetch a single quality playlist instead of the master manifest
        #[arg(short, long)]
        quality: Option<String>,
    },
    /// Configure buc interactively
    Config,
    /// Store your API key in the OS keyring
    SetApiKey { api_key: String },
}

fn main() -> Result<()> {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap();
    let _rt_guard = rt.enter();
    clap_complete::CompleteEnv::with_factory(Cli::command).complete();
    let cli = Cli::parse();

    rt.block_on(async {
        match cli.command {
            Commands::Config => interactive_config(),
            Commands::SetApiKey { api_key } => config::set_api_key_keyring(api_key),
            requires_api_key => {
                let config = config::read_config()?;
                let client = BuchatClient::new(config.buchat_base_url, config.buchat_api_key);

                match requires_api_key {
                    Commands::Upload {
                        file,
                        file_type,
                        content_type,
                    } => upload_media(&client, file, file_type, content_type).await,
                    Commands::Download { file_key } => {
                        let url = client.download_url(&file_key).await?;
                        println!("{url}");
                        Ok(())
                    }
                    Commands::Thumbnail {
                        file_key,
                        width,
                        height,
                    } => {
                        let url = client.thumbnail_url(&file_key, width, height).await?;
                        println!("{url}");
                        Ok(())
                    }
                    Commands::Manifest { video_id, quality } => {
                        let url = match quality {
                            Some(quality) => client.video_playlist_url(&video_id, &quality).await?,
                            None => client.video_manifest_url(&video_id).await?,
                        };
                        println!("{url}");
                        Ok(())
                    }
                    Commands::Config | Commands::SetApiKey { .. } => {
                        unreachable!("handled before client construction")
                    }
                }
            }
        }
    })
}

async fn upload_media(
    client: &BuchatClient,
    file: PathBuf,
    file_type: Option<FileType>,
    content_type: Option<String>,
) -> Result<()> {
    let content_type = match content_type {
        Some(content_type) => content_type,
        None => detect_content_type(&file)?,
    };
    let file_type = file_type.unwrap_or_else(|| FileType::from_content_type(&content_type));

    let mut stream = client.upload_file(&file, &content_type, file_type)?;

    let (tx, rx) = watch::channel(0.0f32);

    let process_stream = async {
        let mut uploaded = None;
        while let Some(event) = stream.next().await {
            match event? {
                UploadEvent::Progress(progress) => {
                    let percent = if progress.total_bytes == 0 {
                        100.0
                    } else {
                        (progress.bytes_uploaded as f32 / progress.total_bytes as f32) * 100.0
                    };
                    let _ = tx.send(percent);
                }
                UploadEvent::Complete(result) => {
                    uploaded = Some(result);
                    break;
                }
            }
        }
        let uploaded = uploaded.context("Upload stream ended without a completion event")?;
        Ok::<_, anyhow::Error>(uploaded)
    };

    let title = format!("Uploading {}", file.display());
    let mut progress_bar = element!(ProgressBar(title: title, progress: Some(rx)));

    let uploaded = tokio::select! {
        result = process_stream => result?,
        _ = progress_bar.render_loop() => {
            unreachable!("render_loop should not terminate")
        }
    };

    element!(SuccessMessage(
        message: format!("Uploaded {} ({}): {}", file.display(), file_type, uploaded.file_url)
    ))
    .print();
    Ok(())
}

/// Sniff the MIME type from the file's leading bytes. The gateway needs a
/// content type for every upload and the CLI has no browser to supply one.
fn detect_content_type(path: &Path) -> Result<String> {
    let mut file =
        File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut head = [0u8; 8192];
    let read = file.read(&mut head)?;
    Ok(infer::get(&head[..read])
        .map(|kind| kind.mime_type().to_string())
        .unwrap_or_else(|| "application/octet-stream".to_string()))
}

fn read_input(prompt: &str, default: Option<&str>, description: Option<&str>) -> Result<String> {
    element! {
        InputPrompt(
            prompt: prompt.to_string(),
            default: default.map(|s| s.to_string()),
            description: description.map(|s| s.to_string())
        )
    }
    .print();

    print!("> ");
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim().to_string();

    if input.is_empty() {
        if let Some(def) = default {
            Ok(def.to_string())
        } else {
            Ok(input)
        }
    } else {
        Ok(input)
    }
}

fn interactive_config() -> Result<()> {
    element!(ConfigHeader()).print();

    let buchat_base_url = loop {
        let base_url_str = read_input(
            "Buchat Base URL",
            Some(DEFAULT_BUCHAT_BASE_URL),
            Some("The base URL of the Buchat API gateway"),
        )?;

        match Url::parse(&base_url_str) {
            Ok(url) => break url,
            Err(e) => {
                element!(ErrorMessage(message: format!("Invalid URL: {}", e))).print();
                println!();
            }
        }
    };

    let buchat_api_key = loop {
        let api_key = read_input(
            "API Key",
            None,
            Some("Your Buchat API key (stored securely in OS keyring)"),
        )?;

        if api_key.is_empty() {
            element!(ErrorMessage(message: "API key cannot be empty".to_string())).print();
            println!();
        } else {
            break api_key;
        }
    };

    config::set_api_key_keyring(buchat_api_key)?;

    config::write_config(config::ConfigFile {
        buchat_base_url: Some(buchat_base_url),
    })?;

    element!(SuccessMessage(message: "Configuration complete!".to_string())).print();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_png_content_type() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a])
            .unwrap();
        file.flush().unwrap();

        let content_type = detect_content_type(file.path()).unwrap();
        assert_eq!(content_type, "image/png");
        assert_eq!(
            FileType::from_content_type(&content_type),
            FileType::Image
        );
    }

    #[test]
    fn unknown_bytes_fall_back_to_octet_stream() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"plain text, nothing to sniff").unwrap();
        file.flush().unwrap();

        assert_eq!(
            detect_content_type(file.path()).unwrap(),
            "application/octet-stream"
        );
    }
}
