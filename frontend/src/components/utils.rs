use super::super::{Model, Msg};
use gloo_file::File as GlooFile;
use shared::TaskState;
use std::cell::Cell;
use std::rc::Rc;
use web_sys::FileList;
use yew::html::Scope;
use yew::prelude::*;

const CLICK_GUARD_MS: f64 = 400.0;

/// Button handler forwarding at most one message per [`CLICK_GUARD_MS`].
pub fn guarded_click<F>(link: &Scope<Model>, message: F) -> Callback<MouseEvent>
where
    F: Fn() -> Msg + 'static,
{
    let link = link.clone();
    let last = Rc::new(Cell::new(f64::NEG_INFINITY));
    Callback::from(move |_| {
        let now = js_sys::Date::now();
        if now - last.get() < CLICK_GUARD_MS {
            log::debug!("Ignoring repeated click");
            return;
        }
        last.set(now);
        link.send_message(message());
    })
}

/// Files picked, dropped or pasted, split into images and rejected names.
#[derive(Default)]
pub struct PickedFiles {
    pub images: Vec<GlooFile>,
    pub rejected: Vec<String>,
}

pub fn pick_image_files(file_list: &FileList) -> PickedFiles {
    let mut picked = PickedFiles::default();
    for file in (0..file_list.length()).filter_map(|i| file_list.item(i)) {
        if is_image_type(&file.type_()) {
            picked.images.push(GlooFile::from(file));
        } else {
            picked.rejected.push(file.name());
        }
    }
    picked
}

pub fn is_image_type(mime: &str) -> bool {
    mime.starts_with("image/")
}

/// One line naming every file that could not be queued.
pub fn rejected_message(reason: &str, names: &[String]) -> Option<String> {
    match names {
        [] => None,
        [name] => Some(format!("{reason}: {name}")),
        names => Some(format!("{reason} ({}): {}", names.len(), names.join(", "))),
    }
}

/// Where newly added photos go, given the queue they land in.
pub fn upload_hint(busy: bool, waiting: usize) -> String {
    match (busy, waiting) {
        (true, 0) => "A batch is running; new photos are added to the next batch".to_string(),
        (true, n) => format!("A batch is running; new photos join the {n} waiting for the next batch"),
        (false, 0) => "Photos are queued until you start the analysis".to_string(),
        (false, n) => format!("{n} photo(s) queued; add more or start the analysis"),
    }
}

pub fn percent(confidence: f64) -> String {
    format!("{:.1}%", confidence * 100.0)
}

/// Label and icon for a task's badge.
pub fn state_badge(state: TaskState) -> (&'static str, &'static str) {
    match state {
        TaskState::Queued => ("Queued", "fa-regular fa-clock"),
        TaskState::Submitting => ("Uploading", "fa-solid fa-arrow-up-from-bracket"),
        TaskState::Pending => ("Waiting", "fa-regular fa-hourglass"),
        TaskState::Polling => ("Processing", "fa-solid fa-spinner fa-spin"),
        TaskState::Completed => ("Done", "fa-solid fa-check"),
        TaskState::Failed => ("Failed", "fa-solid fa-triangle-exclamation"),
    }
}

pub fn render_error_message(model: &Model) -> Html {
    if let Some(error_msg) = &model.error {
        html! {
            <div class="error-message">
                <i class="fa-solid fa-circle-exclamation"></i>
                <p>{ error_msg }</p>
            </div>
        }
    } else {
        html! {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_files_are_reported_together() {
        assert_eq!(rejected_message("Skipped", &[]), None);
        assert_eq!(
            rejected_message("Skipped", &["notes.txt".to_string()]).as_deref(),
            Some("Skipped: notes.txt")
        );
        assert_eq!(
            rejected_message("Could not read", &["a.png".to_string(), "b.jpg".to_string()]).as_deref(),
            Some("Could not read (2): a.png, b.jpg")
        );
    }

    #[test]
    fn hint_mentions_the_next_batch_while_busy() {
        assert!(upload_hint(true, 0).contains("next batch"));
        assert!(upload_hint(true, 3).contains("3 waiting"));
        assert!(!upload_hint(false, 0).contains("next batch"));
        assert!(upload_hint(false, 2).starts_with("2 photo(s) queued"));
    }

    #[test]
    fn only_image_mime_types_are_accepted() {
        assert!(is_image_type("image/webp"));
        assert!(!is_image_type("application/pdf"));
        assert!(!is_image_type(""));
    }
}
