//! kura command line tool.
//!
//! Runs resource operations for one tenant against the configured store.
//!
//! ```bash
//! kura --tenant 7 mkdir /photos/
//! kura --tenant 7 put /photos/ a.jpg b.jpg
//! kura --tenant 7 ls /photos/
//! kura --tenant 7 get /photos/ -o photos.zip
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use kura_api::{Body, Config, Payload, Response, ResourceController, build_store};
use kura_vfs::{FileService, OpContext, TenantId, UploadFile};

/// Per-tenant file store over S3-compatible object storage.
#[derive(Parser, Debug)]
#[command(name = "kura")]
#[command(about = "Per-tenant file store over S3-compatible object storage")]
struct Args {
    /// Config file (default: ./kura.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Tenant to act as
    #[arg(short, long, env = "KURA_TENANT")]
    tenant: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show metadata of a file or directory
    Show { path: String },
    /// List a directory
    Ls {
        #[arg(default_value = "/")]
        path: String,
    },
    /// Create a directory
    Mkdir { path: String },
    /// Upload local files into a directory
    Put {
        dir: String,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Delete a file or directory
    Rm { path: String },
    /// Move a file or directory
    Mv { from: String, to: String },
    /// Search by path substring
    Find { query: String },
    /// Download a file, or a directory as zip
    Get {
        path: String,
        /// Output file; `-` for stdout (default: the remote name)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<ExitCode> {
    let config = Config::load(args.config.as_deref())?;
    let store = build_store(&config.store).await?;

    let tenant = TenantId::new(args.tenant);
    let service = FileService::new(store).with_span(tracing::info_span!("vfs", %tenant));
    let controller = ResourceController::new(service, config.upload_max_bytes());

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling");
            on_signal.cancel();
        }
    });
    let ctx = OpContext::with_cancel(tenant, cancel);

    let response = match &args.command {
        Command::Show { path } => controller.show(&ctx, Some(path.as_str())).await,
        Command::Ls { path } => controller.directory_show(&ctx, Some(path.as_str())).await,
        Command::Mkdir { path } => controller.directory_store(&ctx, Some(path.as_str())).await,
        Command::Put { dir, files } => {
            let (uploads, mapping) = read_uploads(files).await?;
            controller
                .store(&ctx, Some(dir.as_str()), Some(mapping.as_str()), uploads)
                .await
        }
        Command::Rm { path } => controller.delete(&ctx, Some(path.as_str())).await,
        Command::Mv { from, to } => {
            controller
                .move_resource(&ctx, Some(from.as_str()), Some(to.as_str()))
                .await
        }
        Command::Find { query } => controller.search(&ctx, Some(query.as_str())).await,
        Command::Get { path, .. } => controller.download(&ctx, Some(path.as_str())).await,
    };

    let output = match &args.command {
        Command::Get { output, .. } => output.as_deref(),
        _ => None,
    };
    emit(response, output).await
}

/// Read local files and map each into the target directory under its own name.
async fn read_uploads(files: &[PathBuf]) -> Result<(Vec<UploadFile>, String)> {
    let mut uploads = Vec::with_capacity(files.len());
    let mut mapping = serde_json::Map::new();
    for path in files {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("no usable file name in {}", path.display()))?
            .to_string();
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        mapping.insert(name.clone(), serde_json::Value::String(String::new()));
        uploads.push(UploadFile::from_bytes(name, data));
    }
    Ok((uploads, serde_json::Value::Object(mapping).to_string()))
}

/// Print or save a response. Non-success statuses exit non-zero.
async fn emit(response: Response, output: Option<&Path>) -> Result<ExitCode> {
    let status = response.status;
    match response.body {
        Body::Empty => {}
        Body::Json(json) if status.is_success() => {
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        Body::Json(json) => {
            let message = json["message"].as_str().unwrap_or("error");
            eprintln!("{status} {message}");
        }
        Body::Attachment { filename, payload } => {
            let target = output.map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from(&filename));
            write_payload(payload, &target).await?;
        }
    }

    Ok(if status.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn write_payload(payload: Payload, target: &Path) -> Result<()> {
    let mut out: Box<dyn tokio::io::AsyncWrite + Unpin + Send> = if target == Path::new("-") {
        Box::new(tokio::io::stdout())
    } else {
        let file = tokio::fs::File::create(target)
            .await
            .with_context(|| format!("creating {}", target.display()))?;
        Box::new(file)
    };

    match payload {
        Payload::Buffer(buf) => out.write_all(&buf).await?,
        Payload::Stream { mut body, size } => {
            let mut written: u64 = 0;
            while let Some(chunk) = body.next().await {
                let chunk = chunk?;
                written += chunk.len() as u64;
                out.write_all(&chunk).await?;
            }
            tracing::debug!(written, size, "download complete");
        }
    }
    out.flush().await?;
    Ok(())
}
