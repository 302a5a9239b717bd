use super::super::{Model, Msg};
use super::utils::{guarded_click, upload_hint};
use shared::TaskState;
use wasm_bindgen::JsCast;
use web_sys::{DragEvent, HtmlElement, HtmlInputElement};
use yew::prelude::*;

const FILE_INPUT_ID: &str = "file-input";

pub fn render_upload_section(model: &Model, ctx: &Context<Model>) -> Html {
    let busy = model.tasks.iter().any(|task| task.state.is_in_flight());
    let waiting = model
        .tasks
        .iter()
        .filter(|task| task.state == TaskState::Queued)
        .count();
    let link = ctx.link();

    let on_pick = link.callback(|e: Event| {
        let input: HtmlInputElement = e.target_unchecked_into();
        let msg = match input.files() {
            Some(files) => Msg::PickFiles(files),
            None => Msg::SetError(Some("No files selected.".into())),
        };
        input.set_value("");
        msg
    });
    let on_drag_over = link.callback(|e: DragEvent| {
        e.prevent_default();
        Msg::SetDragging(true)
    });
    let on_drag_leave = link.callback(|e: DragEvent| {
        e.prevent_default();
        Msg::SetDragging(false)
    });

    html! {
        <div class={classes!("upload-section", busy.then_some("busy"))}>
            <input
                type="file"
                id={FILE_INPUT_ID}
                multiple=true
                accept="image/*"
                style="display: none;"
                onchange={on_pick}
            />
            <div
                id="drop-zone"
                class={classes!("upload-area", model.is_dragging.then_some("drag-over"))}
                ondragover={on_drag_over}
                ondragleave={on_drag_leave}
                ondrop={link.callback(Msg::HandleDrop)}
                onclick={Callback::from(|_| open_file_picker())}
            >
                <div class="upload-placeholder">
                    <i class={if busy { "fa-solid fa-layer-group" } else { "fa-solid fa-cloud-arrow-up" }}></i>
                    <p>{"Drop flower photos here, paste them, or click to browse"}</p>
                    <p class="queue-hint">{ upload_hint(busy, waiting) }</p>
                    <p class="file-types">{"JPG, PNG, WEBP, GIF or BMP"}</p>
                </div>
            </div>
            <button
                id="upload-button"
                class="analyze-btn"
                onclick={guarded_click(link, || Msg::OpenFilePicker)}
            >
                <i class="fa-solid fa-plus"></i>
                { if busy { " Add to next batch" } else { " Add Photos" } }
            </button>
        </div>
    }
}

pub fn open_file_picker() {
    let input = web_sys::window()
        .and_then(|window| window.document())
        .and_then(|document| document.get_element_by_id(FILE_INPUT_ID))
        .and_then(|element| element.dyn_into::<HtmlElement>().ok());
    match input {
        Some(input) => input.click(),
        None => log::error!("File input #{FILE_INPUT_ID} is missing"),
    }
}
