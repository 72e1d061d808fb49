pub mod audio;
pub mod canvas;
pub mod components;
pub mod download;
pub mod session;
pub mod state;
pub mod worker;

use wasm_bindgen::prelude::*;

#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
    let _ = console_log::init_with_level(log::Level::Debug);

    // Worker scopes have no window; they only use `WorkerHost`.
    if web_sys::window().is_none() {
        return;
    }
    leptos::mount::mount_to_body(components::app::App);
}
