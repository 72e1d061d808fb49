pub mod web_canvas;
