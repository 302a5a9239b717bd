use super::super::{LoadedImage, Model, Msg};
use super::adjustments::Adjustment;
use super::utils::{pick_image_files, rejected_message};
use gloo_file::{Blob, File as GlooFile, ObjectUrl};
use pipeline::annotate::annotate;
use pipeline::history::export_json;
use pipeline::{ControllerClosed, ControllerHandle, HistoryStore, PipelineEvent, SourceImage, TaskView};
use shared::{TaskId, TaskState};
use std::collections::HashMap;
use std::sync::Arc;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::spawn_local;
use web_sys::{ClipboardEvent, DragEvent, FileList, HtmlAnchorElement};
use yew::prelude::*;

/// Read the files in the background; their bytes are queued once loaded and
/// the files that could not be read are reported in one message.
pub fn handle_files_added(ctx: &Context<Model>, files: Vec<GlooFile>) -> bool {
    let link = ctx.link().clone();
    spawn_local(async move {
        let mut loaded = Vec::with_capacity(files.len());
        let mut unreadable = Vec::new();
        for file in files {
            let name = file.name();
            match gloo_file::futures::read_as_bytes(&file).await {
                Ok(bytes) => {
                    let preview = ObjectUrl::from(file);
                    let source = SourceImage::new(name, bytes).with_url(preview.to_string());
                    loaded.push(LoadedImage { preview, source });
                }
                Err(e) => {
                    log::warn!("Could not read {name}: {e}");
                    unreadable.push(format!("{name} ({e})"));
                }
            }
        }
        if let Some(message) = rejected_message("Could not read", &unreadable) {
            link.send_message(Msg::SetError(Some(message)));
        }
        if !loaded.is_empty() {
            link.send_message(Msg::FilesLoaded(loaded));
        }
    });
    false
}

pub fn handle_files_loaded(model: &mut Model, images: Vec<LoadedImage>) -> bool {
    let mut sources = Vec::with_capacity(images.len());
    for image in images {
        if let Some(url) = &image.source.url {
            model.sources.insert(url.clone(), image.source.bytes.clone());
        }
        model.previews.push(image.preview);
        sources.push(image.source);
    }
    log::info!("Queueing {} image(s)", sources.len());
    send_command(model, |handle| handle.enqueue(sources))
}

pub fn handle_select_task(model: &mut Model, id: TaskId) -> bool {
    if model.selected_task == Some(id) {
        return false;
    }
    model.selected_task = Some(id);
    true
}

pub fn handle_clear_all(model: &mut Model) -> bool {
    send_command(model, ControllerHandle::clear)
}

pub fn handle_adjust(model: &mut Model, adjustment: Adjustment, value: u16) -> bool {
    let params = adjustment.apply(model.params, value);
    if params == model.params {
        return false;
    }
    model.params = params;
    send_command(model, |handle| handle.set_params(params))
}

pub fn handle_start_batch(model: &mut Model) -> bool {
    model.summary = None;
    send_command(model, ControllerHandle::start_batch)
}

pub fn handle_pipeline_event(model: &mut Model, event: PipelineEvent) -> bool {
    match event {
        PipelineEvent::TaskUpdated(view) => {
            if model.selected_task.is_none() {
                model.selected_task = Some(view.id);
            }
            if view.state == TaskState::Completed && !model.overlays.contains_key(&view.id) {
                if let Some(overlay) = render_overlay(&model.sources, &view) {
                    model.overlays.insert(view.id, overlay);
                }
            }
            match model.tasks.iter_mut().find(|task| task.id == view.id) {
                Some(task) => *task = view,
                None => model.tasks.push(view),
            }
        }
        PipelineEvent::HistoryAppended(record) => model.history_records.insert(0, record),
        PipelineEvent::PollingStarted => model.polling = true,
        PipelineEvent::PollingStopped => model.polling = false,
        PipelineEvent::BatchFinished(summary) => {
            log::info!(
                "Batch {} finished: {} completed, {} failed",
                summary.batch,
                summary.completed,
                summary.failed
            );
            model.summary = Some(summary);
        }
        PipelineEvent::Cleared => {
            model.tasks.clear();
            model.previews.clear();
            model.sources.clear();
            model.overlays.clear();
            model.selected_task = None;
            model.summary = None;
            model.error = None;
        }
    }
    true
}

pub fn handle_remove_record(model: &mut Model, id: &str) -> bool {
    match model.history.remove(id) {
        Ok(removed) => {
            model.history_records.retain(|record| record.id != id);
            removed
        }
        Err(e) => {
            model.error = Some(format!("Could not update history: {e}"));
            true
        }
    }
}

pub fn handle_clear_history(model: &mut Model) -> bool {
    match model.history.clear() {
        Ok(()) => model.history_records.clear(),
        Err(e) => model.error = Some(format!("Could not clear history: {e}")),
    }
    true
}

pub fn handle_export_history(model: &mut Model) -> bool {
    let json = match export_json(&model.history_records, true) {
        Ok(json) => json,
        Err(e) => {
            model.error = Some(format!("Could not export history: {e}"));
            return true;
        }
    };

    let blob = Blob::new_with_options(json.as_str(), Some("application/json"));
    let url = ObjectUrl::from(blob);
    let date: String = js_sys::Date::new_0().to_iso_string().into();
    let file_name = format!("flower_history_{}.json", date.get(..10).unwrap_or("export"));

    let anchor = web_sys::window()
        .and_then(|window| window.document())
        .and_then(|document| document.create_element("a").ok())
        .and_then(|element| element.dyn_into::<HtmlAnchorElement>().ok());
    match anchor {
        Some(anchor) => {
            anchor.set_href(&url);
            anchor.set_download(&file_name);
            anchor.click();
            model.export_url = Some(url);
        }
        None => log::error!("Could not create a download link"),
    }
    false
}

/// Draw the detection boxes over the original upload, as a data URL.
fn render_overlay(sources: &HashMap<String, Arc<[u8]>>, view: &TaskView) -> Option<String> {
    let result = view.result.as_ref()?;
    let bytes = sources.get(view.url.as_deref()?)?;
    match annotate(bytes, result) {
        Ok(image) => Some(image.to_data_url()),
        Err(e) => {
            log::warn!("No overlay for {}: {e}", view.name);
            None
        }
    }
}

pub fn handle_drop(model: &mut Model, ctx: &Context<Model>, event: DragEvent) -> bool {
    event.prevent_default();
    model.is_dragging = false;
    if let Some(files) = event.data_transfer().and_then(|transfer| transfer.files()) {
        handle_pick_files(model, ctx, files);
    }
    true
}

/// Only pastes that carry files are taken over; plain text pastes pass through.
pub fn handle_paste(model: &mut Model, ctx: &Context<Model>, event: ClipboardEvent) -> bool {
    let Some(files) = event
        .clipboard_data()
        .and_then(|clipboard| clipboard.files())
        .filter(|files| files.length() > 0)
    else {
        return false;
    };
    event.prevent_default();
    handle_pick_files(model, ctx, files)
}

/// Queue the images among `files` and report the rest.
pub fn handle_pick_files(model: &mut Model, ctx: &Context<Model>, files: FileList) -> bool {
    let picked = pick_image_files(&files);
    model.error = rejected_message("Skipped non-image files", &picked.rejected);
    if picked.images.is_empty() && model.error.is_none() {
        model.error = Some("No image files selected.".into());
    }
    if !picked.images.is_empty() {
        log::info!("Reading {} image(s)", picked.images.len());
        ctx.link().send_message(Msg::FilesAdded(picked.images));
    }
    true
}

fn send_command<F>(model: &mut Model, command: F) -> bool
where
    F: FnOnce(&ControllerHandle) -> Result<(), ControllerClosed>,
{
    let outcome = match &model.handle {
        Some(handle) => command(handle),
        None => Err(ControllerClosed),
    };
    if let Err(e) = outcome {
        log::error!("{e}");
        model.error = Some(e.to_string());
    }
    true
}
