use super::super::Model;
use super::utils::percent;
use pipeline::annotate::{detection_color, label_text};
use shared::{FlowerDetection, TaskState};
use yew::prelude::*;

pub fn render_results(model: &Model) -> Html {
    let Some(task) = model
        .selected_task
        .and_then(|id| model.tasks.iter().find(|task| task.id == id))
    else {
        return html! {};
    };

    match (task.state, &task.result, &task.error) {
        (TaskState::Completed, Some(result), _) => {
            let header = match result.flowers.len() {
                0 => "No flowers detected".to_string(),
                1 => "1 flower detected".to_string(),
                n => format!("{n} flowers detected"),
            };
            html! {
                <div class="results-container">
                    <div class="result-header">
                        <h2 title={format!("Analysis results for: {}", task.name)}>
                            <i class="fa-solid fa-seedling"></i>{ format!(" {header}") }
                            <span class="analyzed-filename-display">{ format!("({})", task.name) }</span>
                        </h2>
                        {
                            match result.processing_time {
                                Some(seconds) => html! { <p class="processing-time">{ format!("Processed in {seconds:.2}s") }</p> },
                                None => html! {},
                            }
                        }
                    </div>
                    {
                        match model.overlays.get(&task.id) {
                            Some(overlay) => html! {
                                <img class="detection-overlay" src={overlay.clone()} alt={format!("Detections in {}", task.name)} />
                            },
                            None => html! {},
                        }
                    }
                    <div class="detailed-results">
                        { for result.flowers.iter().enumerate().map(|(i, flower)| render_detection(i, result.flowers.len(), flower)) }
                    </div>
                </div>
            }
        }
        (TaskState::Failed, _, Some(error)) => html! {
            <div class="results-container failed">
                <h2><i class="fa-solid fa-triangle-exclamation"></i>{ format!(" {} could not be analysed", task.name) }</h2>
                <p>{ error }</p>
            </div>
        },
        _ => html! {
            <p class="no-results-message">{"No analysis result available for the selected image yet."}</p>
        },
    }
}

fn render_detection(index: usize, count: usize, flower: &FlowerDetection) -> Html {
    let class = &flower.final_class;
    let confidence = class.confidence * 100.0;
    let [r, g, b, _] = detection_color(index, count).0;

    html! {
        <div class="detection">
            {
                match &flower.crop_image {
                    Some(crop) => html! {
                        <img class="detection-crop" src={crop.to_data_url()} alt={format!("Flower {}", index + 1)} />
                    },
                    None => html! { <div class="detection-crop placeholder"><i class="fa-solid fa-image"></i></div> },
                }
            }
            <div class="detection-details">
                <h3>
                    <span class="detection-swatch" style={format!("background-color: rgb({r}, {g}, {b});")} title={label_text(class)}></span>
                    { format!(" #{} {}", index + 1, class.class_name) }
                </h3>
                <div class="confidence-meter">
                    <div class="meter-label">{"Confidence:"}</div>
                    <div class="meter">
                        <div class="meter-fill" style={format!("width: {confidence}%")}></div>
                    </div>
                    <div class="meter-value">{ percent(class.confidence) }</div>
                </div>
                {
                    match flower.bbox.confidence {
                        Some(detector) => html! { <p class="detector-confidence">{ format!("Detector: {}", percent(detector)) }</p> },
                        None => html! {},
                    }
                }
                <div class="result-bars">
                    { for flower.votes.iter().map(|vote| {
                        let label = vote.class_name.clone().unwrap_or_else(|| format!("class {}", vote.class_id));
                        html! {
                            <div class="result-item">
                                <div class="result-label">{ format!("{}: {label}", vote.model_name) }</div>
                                <div class="result-bar-container">
                                    <div class="result-bar" style={format!("width: {}%", vote.confidence * 100.0)}></div>
                                </div>
                                <div class="result-value">{ percent(vote.confidence) }</div>
                            </div>
                        }
                    })}
                </div>
                <p class="vote-count">{ format!("{} of {} model(s) agree", class.vote_count, flower.votes.len()) }</p>
            </div>
        </div>
    }
}
