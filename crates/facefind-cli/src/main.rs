use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use facefind_api::BackendClient;
use facefind_core::selection::default_face;
use facefind_core::{render, DetectionStatus, Intake, RecognitionStatus};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod browse;
mod config;
mod controller;
mod text;

use config::Config;
use controller::Controller;

#[derive(Parser)]
#[command(name = "facefind", about = "Find reference faces similar to the faces in a photo")]
struct Cli {
    /// Backend base URL (overrides FACEFIND_BACKEND_URL)
    #[arg(long, global = true)]
    backend_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the backend's service information
    Status,
    /// Detect faces in a JPEG image and print them as JSON
    Detect {
        /// Image file
        image: PathBuf,
    },
    /// Look up reference faces similar to one face of a JPEG image
    Recognize {
        /// Image file
        image: PathBuf,
        /// Face index to use instead of the default (first female face)
        #[arg(short, long)]
        face: Option<usize>,
    },
    /// Write an HTML page with the detected faces and matches
    Report {
        /// Image file
        image: PathBuf,
        /// Output HTML file
        #[arg(short, long)]
        out: PathBuf,
        /// Face index to use instead of the default (first female face)
        #[arg(short, long)]
        face: Option<usize>,
    },
    /// Interactive session reading commands from stdin
    Browse,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env();
    if let Some(url) = cli.backend_url {
        config.backend_url = url;
    }
    tracing::debug!(?config, "configuration loaded");

    let client = BackendClient::new(&config.client_options())?;

    match cli.command {
        Commands::Status => {
            let status = client.status(&config.backend_url).await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Commands::Detect { image } => detect(&client, &config, &image).await?,
        Commands::Recognize { image, face } => {
            let mut controller = Controller::new(Arc::new(client), config.backend_url.clone());
            if !run_pipeline(&mut controller, &image, face).await? {
                return Ok(());
            }
            let session = controller.session();
            print!("{}", text::session_summary(session));
            if let Some(RecognitionStatus::Failed(reason)) = session.selected_recognition() {
                bail!("recognition failed: {reason}");
            }
        }
        Commands::Report { image, out, face } => {
            let mut controller = Controller::new(Arc::new(client), config.backend_url.clone());
            if !run_pipeline(&mut controller, &image, face).await? {
                return Ok(());
            }
            let html = render::report_html(controller.session(), config.crop_size);
            tokio::fs::write(&out, html)
                .await
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("wrote {}", out.display());
        }
        Commands::Browse => {
            let mut controller = Controller::new(Arc::new(client), config.backend_url.clone());
            browse::run(&mut controller, config.crop_size).await?;
        }
    }

    Ok(())
}

/// Open an image, wait for detection and the default recognition, then
/// optionally switch to another face. Returns `false` if the file was
/// ignored for its type.
async fn run_pipeline(
    controller: &mut Controller<BackendClient>,
    image: &Path,
    face: Option<usize>,
) -> Result<bool> {
    if !controller.open_path(image).await? {
        return Ok(false);
    }
    controller.settle().await;

    let detection = match controller.session().detection_status() {
        Some(DetectionStatus::Ready(detection)) => detection,
        Some(DetectionStatus::Failed(reason)) => bail!("detection failed: {reason}"),
        Some(DetectionStatus::Pending) | None => bail!("detection did not complete"),
    };

    if let Some(index) = face {
        let count = detection.faces().len();
        if index >= count {
            bail!("face {index} does not exist; {count} face(s) detected");
        }
        controller.select(index);
        controller.settle().await;
    }
    Ok(true)
}

async fn detect(client: &BackendClient, config: &Config, path: &Path) -> Result<()> {
    let Some(image) = controller::read_image(&Intake::default(), path, &config.backend_url).await?
    else {
        return Ok(());
    };
    let response = client.detect(&image).await?;

    let faces: Vec<serde_json::Value> = response
        .response
        .faces
        .iter()
        .enumerate()
        .map(|(index, face)| {
            serde_json::json!({
                "index": index,
                "sex": face.sex,
                "boundingBox": face.bounding_box,
                "score": face.score,
                "age": face.age,
                "keyPoints": face.key_points,
                "embeddingDimension": face.embedding.dimension(),
            })
        })
        .collect();

    let output = serde_json::json!({
        "image": {
            "fileName": image.file_name,
            "width": image.width,
            "height": image.height,
        },
        "request": response.request,
        "timings": {
            "hashTimeInNanoseconds": response.response.hash_time_in_nanoseconds,
            "decodeTimeInNanoseconds": response.response.decode_time_in_nanoseconds,
            "detectionTimeInNanoseconds": response.response.detection_time_in_nanoseconds,
        },
        "service": response.service,
        "faces": faces,
        "defaultFace": default_face(&response.response.faces),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
