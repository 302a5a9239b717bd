use super::super::{Model, Msg};
use shared::ProcessingParams;
use web_sys::HtmlInputElement;
use yew::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Adjustment {
    Brightness,
    Contrast,
    Grayscale,
}

impl Adjustment {
    const ALL: [Adjustment; 3] = [
        Adjustment::Brightness,
        Adjustment::Contrast,
        Adjustment::Grayscale,
    ];

    fn label(self) -> &'static str {
        match self {
            Adjustment::Brightness => "Brightness",
            Adjustment::Contrast => "Contrast",
            Adjustment::Grayscale => "Grayscale",
        }
    }

    fn max(self) -> u16 {
        match self {
            Adjustment::Brightness => ProcessingParams::MAX_BRIGHTNESS,
            Adjustment::Contrast => ProcessingParams::MAX_CONTRAST,
            Adjustment::Grayscale => ProcessingParams::MAX_GRAYSCALE,
        }
    }

    fn value(self, params: &ProcessingParams) -> u16 {
        match self {
            Adjustment::Brightness => params.brightness,
            Adjustment::Contrast => params.contrast,
            Adjustment::Grayscale => params.grayscale,
        }
    }

    /// `params` with this slider set to `value`, clamped to its range.
    pub fn apply(self, mut params: ProcessingParams, value: u16) -> ProcessingParams {
        let value = value.min(self.max());
        match self {
            Adjustment::Brightness => params.brightness = value,
            Adjustment::Contrast => params.contrast = value,
            Adjustment::Grayscale => params.grayscale = value,
        }
        params
    }
}

pub fn render_adjustments(model: &Model, ctx: &Context<Model>) -> Html {
    let link = ctx.link();
    let reset = {
        let defaults = ProcessingParams::default();
        link.batch_callback(move |_: MouseEvent| {
            Adjustment::ALL
                .into_iter()
                .map(|adjustment| Msg::Adjust(adjustment, adjustment.value(&defaults)))
                .collect::<Vec<_>>()
        })
    };

    html! {
        <div class="adjustments">
            <h3><i class="fa-solid fa-sliders"></i>{" Adjustments"}</h3>
            { for Adjustment::ALL.into_iter().map(|adjustment| render_slider(model, ctx, adjustment)) }
            <button
                class="reset-btn"
                onclick={reset}
                disabled={model.params.is_identity()}
            >
                {"Reset"}
            </button>
        </div>
    }
}

fn render_slider(model: &Model, ctx: &Context<Model>, adjustment: Adjustment) -> Html {
    let value = adjustment.value(&model.params);
    let oninput = ctx.link().callback(move |e: InputEvent| {
        let input: HtmlInputElement = e.target_unchecked_into();
        let value = input.value().parse().unwrap_or(value);
        Msg::Adjust(adjustment, value)
    });

    html! {
        <label class="slider">
            <span class="slider-label">{ adjustment.label() }</span>
            <input
                type="range"
                min="0"
                max={adjustment.max().to_string()}
                value={value.to_string()}
                {oninput}
            />
            <span class="slider-value">{ format!("{value}%") }</span>
        </label>
    }
}
