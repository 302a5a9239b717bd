//! Run a batch of local images through the detection service.
//!
//! Usage: `flower-batch <image>...`. The bearer token is read from
//! `FLOWER_TOKEN`; set `FLOWER_ANNOTATE_DIR` to also write box overlays.

use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::{env, fs};

use pipeline::{
    Controller, HttpAnalysisClient, JsonFileHistory, PipelineConfig, PipelineEvent, SourceImage,
    TokioTimer,
};
use shared::TaskState;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let paths: Vec<PathBuf> = env::args_os().skip(1).map(PathBuf::from).collect();
    if paths.is_empty() {
        log::error!("No images given. Usage: flower-batch <image>...");
        return Err("no input images".into());
    }

    let config = PipelineConfig::load()?;
    let client = HttpAnalysisClient::from_config(&config)?;
    let history = JsonFileHistory::new(&config.history.path);
    let annotate_dir = env::var_os("FLOWER_ANNOTATE_DIR").map(PathBuf::from);

    let mut sources = Vec::with_capacity(paths.len());
    for path in &paths {
        let bytes = fs::read(path).map_err(|e| format!("{}: {e}", path.display()))?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        sources.push(SourceImage::new(name, bytes).with_url(path.display().to_string()));
    }

    let token = || env::var("FLOWER_TOKEN").ok();
    let (controller, handle, mut events) =
        Controller::new(config, client, history, token, TokioTimer);

    let driver = async move {
        handle.enqueue(sources)?;
        handle.start_batch()?;
        while let Some(event) = events.next().await {
            match event {
                PipelineEvent::TaskUpdated(view) if view.state == TaskState::Failed => {
                    println!(
                        "{}: failed: {}",
                        view.name,
                        view.error.as_deref().unwrap_or("unknown error")
                    );
                }
                PipelineEvent::TaskUpdated(view) if view.state == TaskState::Completed => {
                    if let (Some(result), Some(dir)) = (&view.result, &annotate_dir) {
                        write_overlay(dir, view.url.as_deref(), &view.name, result);
                    }
                }
                PipelineEvent::HistoryAppended(record) => {
                    let classes: Vec<_> = record
                        .result
                        .flowers
                        .iter()
                        .map(|f| {
                            format!("{} ({:.0}%)", f.final_class.class_name, f.final_class.confidence * 100.0)
                        })
                        .collect();
                    println!("{}: {}", record.source_name, classes.join(", "));
                }
                PipelineEvent::BatchFinished(summary) => {
                    println!(
                        "{} of {} image(s) analysed, {} failed",
                        summary.completed, summary.total, summary.failed
                    );
                    break;
                }
                _ => {}
            }
        }
        handle.shutdown()?;
        Ok::<(), pipeline::ControllerClosed>(())
    };

    let ((), outcome) = futures::join!(controller.run(), driver);
    outcome?;
    Ok(())
}

fn write_overlay(dir: &Path, source: Option<&str>, name: &str, result: &shared::AnalysisResult) {
    let Some(source) = source else {
        return;
    };
    let written = fs::read(source)
        .map_err(|e| e.to_string())
        .and_then(|bytes| pipeline::annotate::annotate(&bytes, result).map_err(|e| e.to_string()))
        .and_then(|overlay| {
            fs::create_dir_all(dir).map_err(|e| e.to_string())?;
            let target = dir.join(format!("{name}.boxes.png"));
            fs::write(&target, overlay.bytes).map_err(|e| e.to_string())?;
            Ok(target)
        });
    match written {
        Ok(target) => log::info!("Wrote overlay {}", target.display()),
        Err(e) => log::warn!("Could not write overlay for {name}: {e}"),
    }
}
