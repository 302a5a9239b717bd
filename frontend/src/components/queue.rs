use super::super::{Model, Msg};
use super::utils::{guarded_click, state_badge};
use pipeline::TaskView;
use shared::TaskState;
use yew::prelude::*;

pub fn render_queue(model: &Model, ctx: &Context<Model>) -> Html {
    if model.tasks.is_empty() {
        return html! {};
    }

    let link = ctx.link();
    let waiting = model
        .tasks
        .iter()
        .filter(|task| task.state == TaskState::Queued)
        .count();
    let busy = model.tasks.iter().any(|task| task.state.is_in_flight());
    let start = if busy {
        let link = link.clone();
        Callback::from(move |_: MouseEvent| {
            if confirm_restart(waiting) {
                link.send_message(Msg::StartBatch);
            }
        })
    } else {
        guarded_click(link, || Msg::StartBatch)
    };

    html! {
        <div id="preview-container">
            <h2>{ format!("Queue: {} image(s)", model.tasks.len()) }</h2>
            { render_batch_status(model, busy) }
            <div id="image-previews">
                { for model.tasks.iter().map(|task| render_queue_item(model, ctx, task)) }
            </div>
            <div class="button-container">
                <button
                    id="clear-all-btn"
                    class="analyze-btn"
                    style="background-color: var(--clear-color);"
                    onclick={guarded_click(link, || Msg::ClearAll)}
                >
                    <i class="fa-solid fa-trash"></i>{" Clear All"}
                </button>
                <button
                    class="analyze-btn"
                    style={if busy { "background-color: var(--danger-color);" } else { "background-color: var(--primary-color);" }}
                    disabled={waiting == 0}
                    onclick={start}
                >
                    <i class={if busy { "fa-solid fa-rotate-right" } else { "fa-solid fa-magnifying-glass" }}></i>
                    { format!(" {}", start_label(busy, waiting)) }
                </button>
            </div>
        </div>
    }
}

fn start_label(busy: bool, waiting: usize) -> String {
    if busy {
        format!("Restart with {waiting} queued")
    } else {
        format!("Analyze {waiting} queued")
    }
}

/// Starting a batch while one runs cancels the in-flight work, so the user
/// has to confirm it.
fn confirm_restart(waiting: usize) -> bool {
    let question = format!(
        "A batch is still running. Cancel it and restart with the {waiting} queued image(s)?"
    );
    match web_sys::window().map(|window| window.confirm_with_message(&question)) {
        Some(Ok(confirmed)) => confirmed,
        Some(Err(e)) => {
            log::warn!("Confirmation dialog failed: {e:?}");
            false
        }
        None => false,
    }
}

fn render_batch_status(model: &Model, busy: bool) -> Html {
    if busy {
        let note = if model.polling { " Waiting for results..." } else { " Uploading..." };
        return html! {
            <p class="batch-status"><i class="fa-solid fa-spinner fa-spin"></i>{ note }</p>
        };
    }
    match model.summary {
        Some(summary) if summary.failed == 0 => html! {
            <p class="batch-status success">
                { format!("All {} image(s) analysed.", summary.completed) }
            </p>
        },
        Some(summary) if summary.is_partial() => html! {
            <p class="batch-status warning">
                { format!("{} of {} image(s) analysed, {} failed.", summary.completed, summary.total, summary.failed) }
            </p>
        },
        Some(summary) => html! {
            <p class="batch-status error">
                { format!("All {} image(s) failed.", summary.failed) }
            </p>
        },
        None => html! {},
    }
}

fn render_queue_item(model: &Model, ctx: &Context<Model>, task: &TaskView) -> Html {
    let id = task.id;
    let is_selected = model.selected_task == Some(id);
    let (label, icon) = state_badge(task.state);
    let title = match (&task.error, &task.last_poll_error) {
        (Some(error), _) => format!("{}: {error}", task.name),
        (None, Some(error)) => format!("{}: retrying after {error}", task.name),
        (None, None) => task.name.clone(),
    };

    html! {
        <div
            class={classes!("preview-item", is_selected.then_some("selected"))}
            key={id.to_string()}
            onclick={ctx.link().callback(move |_| Msg::SelectTask(id))}
            {title}
        >
            {
                if let Some(url) = &task.url {
                    html! { <img src={url.clone()} alt={task.name.clone()} /> }
                } else {
                    html! { <div class="preview-placeholder">{"..."}</div> }
                }
            }
            <span class={classes!("state-badge", task.state.to_string())}>
                <i class={icon}></i>{ format!(" {label}") }
                {
                    if task.state == TaskState::Polling && task.poll_attempts > 0 {
                        html! { <small>{ format!(" ({})", task.poll_attempts) }</small> }
                    } else {
                        html! {}
                    }
                }
            </span>
        </div>
    }
}
