use super::super::{Model, Msg};
use yew::prelude::*;

pub fn render_header(model: &Model, ctx: &Context<Model>) -> Html {
    let label = if model.show_history { " Hide history" } else { " History" };
    html! {
        <header class="app-header">
            <h1><i class="fa-solid fa-seedling"></i> {" Flower Recognition"}</h1>
            <p class="subtitle">{"Queue photos, adjust them, and identify every flower in a batch"}</p>
            <button class="history-toggle" onclick={ctx.link().callback(|_| Msg::ToggleHistory)}>
                <i class="fa-solid fa-clock-rotate-left"></i>{ label }
                <span class="badge">{ model.history_records.len() }</span>
            </button>
        </header>
    }
}
