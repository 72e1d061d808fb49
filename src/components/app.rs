use leptos::prelude::*;
use crate::components::spectrogram::SpectrogramView;
use crate::components::toolbar::Toolbar;
use crate::session;
use crate::state::AppState;

#[component]
pub fn App() -> impl IntoView {
    let state = AppState::new();
    provide_context(state);
    session::connect_store(state);

    view! {
        <div class="app">
            <Toolbar />
            <MainArea />
        </div>
    }
}

#[component]
fn MainArea() -> impl IntoView {
    let state = expect_context::<AppState>();
    let has_data = move || state.spectrogram.with(|s| s.is_some());

    view! {
        <div class="main">
            <SpectrogramView />
            {move || (!has_data()).then(|| view! {
                <div class="empty-state">
                    "Open a WAV, FLAC, MP3 or OGG file, or start the microphone"
                </div>
            })}
            <div class=move || if state.busy.get() { "status-bar busy" } else { "status-bar" }>
                {move || state.status.get()}
            </div>
        </div>
    }
}
