mod components;
mod services;

use futures::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use gloo_events::EventListener;
use gloo_file::{File as GlooFile, ObjectUrl};
use pipeline::config::PipelineConfig;
use pipeline::{BatchSummary, Controller, ControllerHandle, HistoryStore, PipelineEvent, SourceImage, TaskView};
use shared::{HistoryRecord, ProcessingParams, TaskId};
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::spawn_local;
use web_sys::{ClipboardEvent, DragEvent, FileList};
use yew::prelude::*;

use components::adjustments::Adjustment;
use components::{
    adjustments::render_adjustments, handlers, header::render_header, history::render_history,
    queue::render_queue, results::render_results,
    upload_section::{open_file_picker, render_upload_section},
    utils::render_error_message,
};
use services::{GlooAnalysisClient, GlooTimer, LocalHistory, LocalToken};

/// A file read into memory, with the object URL its preview is shown from.
pub struct LoadedImage {
    pub preview: ObjectUrl,
    pub source: SourceImage,
}

pub enum Msg {
    // File operations
    FilesAdded(Vec<GlooFile>),
    FilesLoaded(Vec<LoadedImage>),
    SelectTask(TaskId),
    ClearAll,

    // Batch operations
    Adjust(Adjustment, u16),
    StartBatch,
    Pipeline(PipelineEvent),

    // History
    ToggleHistory,
    RemoveRecord(String),
    ClearHistory,
    ExportHistory,

    // UI states
    SetError(Option<String>),
    SetDragging(bool),

    // Input events
    OpenFilePicker,
    PickFiles(FileList),
    HandleDrop(DragEvent),
    HandlePaste(ClipboardEvent),
}

pub struct Model {
    handle: Option<ControllerHandle>,
    history: LocalHistory,
    previews: Vec<ObjectUrl>,
    /// Original bytes by preview URL, kept to draw the detection overlay.
    sources: HashMap<String, Arc<[u8]>>,
    overlays: HashMap<TaskId, String>,
    tasks: Vec<TaskView>,
    selected_task: Option<TaskId>,
    params: ProcessingParams,
    polling: bool,
    summary: Option<BatchSummary>,
    history_records: Vec<HistoryRecord>,
    show_history: bool,
    export_url: Option<ObjectUrl>,
    error: Option<String>,
    is_dragging: bool,
    paste_listener: Option<EventListener>,
}

fn app_config() -> PipelineConfig {
    let mut config = PipelineConfig::default();
    let origin = web_sys::window().and_then(|window| window.location().origin().ok());
    match api_base_url(option_env!("FLOWER_API_URL"), origin) {
        Some(url) => config.api.base_url = url,
        None => log::warn!("No page origin; using {}", config.api.base_url),
    }
    log::info!("Detection service at {}", config.api.base_url);
    config
}

/// `FLOWER_API_URL` set when the bundle is built wins; otherwise the service
/// is expected under `/api` on the page's own origin.
fn api_base_url(build_time: Option<&str>, origin: Option<String>) -> Option<String> {
    match build_time.map(str::trim).filter(|url| !url.is_empty()) {
        Some(url) => Some(url.to_string()),
        None => origin.map(|origin| format!("{origin}/api")),
    }
}

/// Start the controller on the page's executor and forward its events to `link`.
fn spawn_pipeline(link: &yew::html::Scope<Model>) -> Result<ControllerHandle, String> {
    let config = app_config();
    let client = GlooAnalysisClient::from_config(&config).map_err(|e| e.to_string())?;
    let (controller, handle, mut events) =
        Controller::new(config, client, LocalHistory, LocalToken, GlooTimer);

    spawn_local(controller.run());
    let link = link.clone();
    spawn_local(async move {
        while let Some(event) = events.next().await {
            link.send_message(Msg::Pipeline(event));
        }
    });
    Ok(handle)
}

impl Component for Model {
    type Message = Msg;
    type Properties = ();

    fn create(ctx: &Context<Self>) -> Self {
        let (handle, error) = match spawn_pipeline(ctx.link()) {
            Ok(handle) => (Some(handle), None),
            Err(e) => {
                log::error!("Could not start the batch pipeline: {e}");
                (None, Some(format!("Could not start the batch pipeline: {e}")))
            }
        };

        let history = LocalHistory;
        let history_records = history.list().unwrap_or_else(|e| {
            log::warn!("Could not read history: {e}");
            Vec::new()
        });

        let link = ctx.link().clone();
        let paste_listener = web_sys::window().map(|window| {
            EventListener::new(&window, "paste", move |event| {
                if let Some(clipboard_event) = event.dyn_ref::<ClipboardEvent>() {
                    link.send_message(Msg::HandlePaste(clipboard_event.clone()));
                }
            })
        });

        Self {
            handle,
            history,
            previews: Vec::new(),
            sources: HashMap::new(),
            overlays: HashMap::new(),
            tasks: Vec::new(),
            selected_task: None,
            params: ProcessingParams::default(),
            polling: false,
            summary: None,
            history_records,
            show_history: false,
            export_url: None,
            error,
            is_dragging: false,
            paste_listener,
        }
    }

    fn update(&mut self, ctx: &Context<Self>, msg: Self::Message) -> bool {
        match msg {
            Msg::FilesAdded(files) => handlers::handle_files_added(ctx, files),
            Msg::FilesLoaded(images) => handlers::handle_files_loaded(self, images),
            Msg::SelectTask(id) => handlers::handle_select_task(self, id),
            Msg::ClearAll => handlers::handle_clear_all(self),

            Msg::Adjust(adjustment, value) => handlers::handle_adjust(self, adjustment, value),
            Msg::StartBatch => handlers::handle_start_batch(self),
            Msg::Pipeline(event) => handlers::handle_pipeline_event(self, event),

            Msg::ToggleHistory => {
                self.show_history = !self.show_history;
                true
            }
            Msg::RemoveRecord(id) => handlers::handle_remove_record(self, &id),
            Msg::ClearHistory => handlers::handle_clear_history(self),
            Msg::ExportHistory => handlers::handle_export_history(self),

            Msg::SetError(error) => {
                self.error = error;
                true
            }
            Msg::SetDragging(is_dragging) => {
                self.is_dragging = is_dragging;
                true
            }

            Msg::OpenFilePicker => {
                open_file_picker();
                false
            }
            Msg::PickFiles(files) => handlers::handle_pick_files(self, ctx, files),
            Msg::HandleDrop(event) => handlers::handle_drop(self, ctx, event),
            Msg::HandlePaste(event) => handlers::handle_paste(self, ctx, event),
        }
    }

    fn view(&self, ctx: &Context<Self>) -> Html {
        html! {
            <div class="container">
                { render_header(self, ctx) }

                <main class="main-content">
                    { render_upload_section(self, ctx) }
                    { render_error_message(self) }
                    { render_adjustments(self, ctx) }
                    { render_queue(self, ctx) }
                    { render_results(self) }
                    { render_history(self, ctx) }
                </main>

                <footer class="app-footer">
                    <p>{"Flower Recognition | Batch analysis"}</p>
                </footer>
            </div>
        }
    }
}

fn main() {
    wasm_logger::init(wasm_logger::Config::default());
    log::info!("App starting...");
    yew::Renderer::<Model>::new().render();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_time_api_url_overrides_the_page_origin() {
        assert_eq!(
            api_base_url(Some(" http://flowers.local:8000 "), Some("https://app.example".into())).as_deref(),
            Some("http://flowers.local:8000")
        );
        assert_eq!(
            api_base_url(Some(""), Some("https://app.example".into())).as_deref(),
            Some("https://app.example/api")
        );
        assert_eq!(api_base_url(None, Some("https://app.example".into())).as_deref(), Some("https://app.example/api"));
        assert_eq!(api_base_url(None, None), None);
    }
}
