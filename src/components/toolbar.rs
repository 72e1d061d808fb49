use leptos::prelude::*;
use sonoscope_core::export::export_svg_with;
use sonoscope_core::render::colormap::Colormap;
use sonoscope_core::SonoscopeError;
use crate::audio::{file, microphone};
use crate::canvas::web_canvas::WebCanvas;
use crate::download;
use crate::session::{self, OVERLAY, RENDERER, STORE};
use crate::state::{AppState, Tool};

/// Resolution of the PNG export.
const EXPORT_DPI: f64 = 300.0;

fn colormap_from_str(s: &str) -> Colormap {
    match s {
        "magma" => Colormap::Magma,
        "grayscale" => Colormap::Grayscale,
        _ => Colormap::Viridis,
    }
}

fn export_png(state: AppState) {
    let png = RENDERER.with(|r| match r.borrow().as_ref() {
        Some(renderer) => renderer.export_png_with(EXPORT_DPI, WebCanvas::offscreen),
        None => Err(SonoscopeError::Export("nothing has been rendered yet".into())),
    });
    match png {
        Ok(bytes) => download::save_bytes(&bytes, "spectrogram.png", "image/png"),
        Err(e) => session::report(state, e),
    }
}

fn export_svg_file(state: AppState) {
    let svg = OVERLAY.with(|layer| {
        RENDERER.with(|r| match r.borrow().as_ref() {
            Some(renderer) => export_svg_with(renderer, &layer.borrow(), WebCanvas::offscreen),
            None => Err(SonoscopeError::Export("nothing has been rendered yet".into())),
        })
    });
    match svg {
        Ok(markup) => download::save_bytes(markup.as_bytes(), "spectrogram.svg", "image/svg+xml"),
        Err(e) => session::report(state, e),
    }
}

#[component]
fn ToolButton(tool: Tool, label: &'static str, title: &'static str) -> impl IntoView {
    let state = expect_context::<AppState>();
    view! {
        <button
            class=move || if state.tool.get() == tool { "tool-btn active" } else { "tool-btn" }
            on:click=move |_| state.tool.set(tool)
            title=title
        >{label}</button>
    }
}

#[component]
pub fn Toolbar() -> impl IntoView {
    let state = expect_context::<AppState>();

    let on_file = move |ev: web_sys::Event| {
        let input: web_sys::HtmlInputElement = event_target(&ev);
        let Some(picked) = input.files().and_then(|list| list.get(0)) else { return };
        wasm_bindgen_futures::spawn_local(async move {
            file::load_file(picked, state).await;
        });
    };

    let on_colormap_change = move |ev: web_sys::Event| {
        let cmap = colormap_from_str(&event_target_value(&ev));
        state.render_options.update(|o| o.colormap = cmap);
    };

    let on_fft_change = move |ev: web_sys::Event| {
        if let Ok(n) = event_target_value(&ev).parse::<usize>() {
            state.stft_params.update(|p| {
                p.n_fft = n;
                p.hop_length = n / 4;
            });
        }
    };

    view! {
        <div class="toolbar">
            <span class="toolbar-brand"><b>"sono"</b><i>"scope"</i></span>

            <label class="toolbar-file">
                "Open"
                <input type="file" accept="audio/*" style="display: none" on:change=on_file />
            </label>

            <button
                class=move || if state.mic_listening.get() { "toolbar-listen-btn active" } else { "toolbar-listen-btn" }
                on:click=move |_| {
                    let st = state;
                    wasm_bindgen_futures::spawn_local(async move {
                        microphone::toggle_listen(&st).await;
                    });
                }
                title="Toggle live microphone view"
            >"Listen"</button>

            <select on:change=on_fft_change title="FFT size (applies to the next analysis)">
                <option value="512">"512"</option>
                <option value="1024">"1024"</option>
                <option value="2048" selected>"2048"</option>
                <option value="4096">"4096"</option>
            </select>

            <select on:change=on_colormap_change title="Colormap">
                <option value="viridis" selected>"Viridis"</option>
                <option value="magma">"Magma"</option>
                <option value="grayscale">"Grayscale"</option>
            </select>

            <label title="Blend in a 3x3 blur">
                "Smooth"
                <input
                    type="range" min="0" max="1" step="0.1"
                    prop:value=move || state.render_options.with(|o| o.smoothing.to_string())
                    on:input=move |ev| {
                        if let Ok(v) = event_target_value(&ev).parse::<f32>() {
                            state.render_options.update(|o| o.smoothing = v);
                        }
                    }
                />
            </label>
            <label>
                <input
                    type="checkbox"
                    prop:checked=move || state.render_options.with(|o| o.oversample)
                    on:change=move |ev| {
                        let checked = event_target_checked(&ev);
                        state.render_options.update(|o| o.oversample = checked);
                    }
                />
                "2x time"
            </label>
            <label>
                <input
                    type="checkbox"
                    prop:checked=move || state.render_options.with(|o| o.show_axes)
                    on:change=move |ev| {
                        let checked = event_target_checked(&ev);
                        state.render_options.update(|o| o.show_axes = checked);
                    }
                />
                "Axes"
            </label>
            <label>
                <input
                    type="checkbox"
                    prop:checked=move || state.render_options.with(|o| o.show_colorbar)
                    on:change=move |ev| {
                        let checked = event_target_checked(&ev);
                        state.render_options.update(|o| o.show_colorbar = checked);
                    }
                />
                "Colorbar"
            </label>

            // Spacer
            <div style="flex: 1;"></div>

            <ToolButton tool=Tool::Select label="Select" title="Move annotations" />
            <ToolButton tool=Tool::Text label="Text" title="Click to place a label" />
            <ToolButton tool=Tool::Arrow label="Arrow" title="Drag to draw an arrow" />
            <ToolButton tool=Tool::Rectangle label="Box" title="Drag to draw a rectangle" />
            <input
                type="text"
                class="annotation-text"
                prop:value=move || state.annotation_text.get()
                on:input=move |ev| state.annotation_text.set(event_target_value(&ev))
            />
            <input
                type="color"
                prop:value=move || state.annotation_color.get()
                on:input=move |ev| state.annotation_color.set(event_target_value(&ev))
            />
            <button
                on:click=move |_| STORE.with(|s| s.borrow_mut().clear())
                title="Remove all annotations"
            >"Clear"</button>

            <button on:click=move |_| export_png(state) title="Save PNG at 300 dpi">"PNG"</button>
            <button on:click=move |_| export_svg_file(state) title="Save SVG with editable annotations">"SVG"</button>
        </div>
    }
}
