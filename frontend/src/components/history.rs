use super::super::{Model, Msg};
use super::utils::{guarded_click, percent};
use pipeline::HistoryStats;
use shared::HistoryRecord;
use yew::prelude::*;

pub fn render_history(model: &Model, ctx: &Context<Model>) -> Html {
    if !model.show_history {
        return html! {};
    }
    if model.history_records.is_empty() {
        return html! {
            <section class="history">
                <h2>{"History"}</h2>
                <p class="no-results-message">{"Nothing analysed yet."}</p>
            </section>
        };
    }

    html! {
        <section class="history">
            <h2>{ format!("History ({})", model.history_records.len()) }</h2>
            { render_statistics(&HistoryStats::from_records(&model.history_records)) }
            <table class="history-table">
                <thead>
                    <tr>
                        <th>{"Date"}</th>
                        <th>{"Image"}</th>
                        <th>{"Flowers"}</th>
                        <th>{"Classes"}</th>
                        <th></th>
                    </tr>
                </thead>
                <tbody>
                    { for model.history_records.iter().map(|record| render_record(ctx, record)) }
                </tbody>
            </table>
            <div class="button-container">
                <button class="analyze-btn" onclick={ctx.link().callback(|_| Msg::ExportHistory)}>
                    <i class="fa-solid fa-file-export"></i>{" Export JSON"}
                </button>
                <button
                    class="analyze-btn"
                    style="background-color: var(--danger-color);"
                    onclick={guarded_click(ctx.link(), || Msg::ClearHistory)}
                >
                    <i class="fa-solid fa-trash"></i>{" Clear History"}
                </button>
            </div>
        </section>
    }
}

fn render_record(ctx: &Context<Model>, record: &HistoryRecord) -> Html {
    let id = record.id.clone();
    let classes: Vec<String> = record
        .result
        .flowers
        .iter()
        .map(|flower| format!("{} ({})", flower.final_class.class_name, percent(flower.final_class.confidence)))
        .collect();

    html! {
        <tr key={record.id.clone()}>
            <td>{ record.date.format("%Y-%m-%d %H:%M").to_string() }</td>
            <td title={record.image_url.clone()}>{ &record.source_name }</td>
            <td>{ record.result.flowers.len() }</td>
            <td>{ classes.join(", ") }</td>
            <td>
                <button
                    class="remove-btn"
                    title="Remove this record"
                    onclick={ctx.link().callback(move |_| Msg::RemoveRecord(id.clone()))}
                >
                    <i class="fa-solid fa-times"></i>
                </button>
            </td>
        </tr>
    }
}

fn render_statistics(stats: &HistoryStats) -> Html {
    let average = stats
        .average_confidence
        .map(|value| format!("{value:.1}%"))
        .unwrap_or_else(|| "-".to_string());
    let largest_bucket = stats
        .confidence_distribution
        .iter()
        .map(|bucket| bucket.count)
        .max()
        .unwrap_or(0)
        .max(1);

    html! {
        <div class="history-stats">
            <div class="stat">
                <span class="stat-label">{"Detections"}</span>
                <span class="stat-value">{ stats.total_detections }</span>
            </div>
            <div class="stat">
                <span class="stat-label">{"Average confidence"}</span>
                <span class="stat-value">{ average }</span>
            </div>
            <div class="result-bars">
                { for stats.confidence_distribution.iter().map(|bucket| html! {
                    <div class="result-item">
                        <div class="result-label">{ bucket.range }</div>
                        <div class="result-bar-container">
                            <div class="result-bar" style={format!("width: {}%", bucket.count * 100 / largest_bucket)}></div>
                        </div>
                        <div class="result-value">{ bucket.count }</div>
                    </div>
                })}
            </div>
            <ul class="class-distribution">
                { for stats.class_distribution.iter().map(|class| html! {
                    <li>{ format!("{}: {}", class.name, class.value) }</li>
                })}
            </ul>
        </div>
    }
}
