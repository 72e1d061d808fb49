use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sonoscope_core::render::canvas::{Canvas2d, DisplaySize, ExportSurface, PreRendered, TextAlign, TextBaseline};
use sonoscope_core::{Result, SonoscopeError};
use wasm_bindgen::{Clamped, JsCast};
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, ImageData};

/// `Canvas2d` over a DOM `<canvas>`.
pub struct WebCanvas {
    canvas: HtmlCanvasElement,
    ctx: CanvasRenderingContext2d,
}

impl WebCanvas {
    pub fn new(canvas: HtmlCanvasElement) -> Result<Self> {
        let ctx = canvas
            .get_context("2d")
            .ok()
            .flatten()
            .and_then(|c| c.dyn_into::<CanvasRenderingContext2d>().ok())
            .ok_or_else(|| SonoscopeError::InvalidCanvas {
                width: canvas.width(),
                height: canvas.height(),
            })?;
        Ok(Self { canvas, ctx })
    }

    /// Detached canvas for exports. Zero sizes are rejected.
    pub fn offscreen(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(SonoscopeError::InvalidCanvas { width, height });
        }
        let canvas = web_sys::window()
            .and_then(|w| w.document())
            .and_then(|d| d.create_element("canvas").ok())
            .and_then(|e| e.dyn_into::<HtmlCanvasElement>().ok())
            .ok_or_else(|| SonoscopeError::Export("cannot create offscreen canvas".into()))?;
        canvas.set_width(width);
        canvas.set_height(height);
        Self::new(canvas)
    }

    pub fn element(&self) -> &HtmlCanvasElement {
        &self.canvas
    }
}

impl Canvas2d for WebCanvas {
    fn backing_size(&self) -> (u32, u32) {
        (self.canvas.width(), self.canvas.height())
    }

    fn set_backing_size(&mut self, width: u32, height: u32) {
        self.canvas.set_width(width);
        self.canvas.set_height(height);
    }

    fn display_size(&self) -> DisplaySize {
        let rect = self.canvas.get_bounding_client_rect();
        DisplaySize {
            rect_width: rect.width(),
            rect_height: rect.height(),
            offset_width: self.canvas.offset_width() as f64,
            offset_height: self.canvas.offset_height() as f64,
        }
    }

    fn device_pixel_ratio(&self) -> f64 {
        web_sys::window().map(|w| w.device_pixel_ratio()).unwrap_or(1.0)
    }

    fn reset_transform(&mut self) {
        if let Err(e) = self.ctx.reset_transform() {
            log::error!("resetTransform failed: {e:?}");
        }
    }

    fn scale(&mut self, sx: f64, sy: f64) {
        if let Err(e) = self.ctx.scale(sx, sy) {
            log::error!("scale failed: {e:?}");
        }
    }

    fn save(&mut self) {
        self.ctx.save();
    }

    fn restore(&mut self) {
        self.ctx.restore();
    }

    fn set_fill_style(&mut self, style: &str) {
        self.ctx.set_fill_style_str(style);
    }

    fn set_stroke_style(&mut self, style: &str) {
        self.ctx.set_stroke_style_str(style);
    }

    fn set_line_width(&mut self, width: f64) {
        self.ctx.set_line_width(width);
    }

    fn set_font(&mut self, font: &str) {
        self.ctx.set_font(font);
    }

    fn set_text_align(&mut self, align: TextAlign) {
        self.ctx.set_text_align(align.as_str());
    }

    fn set_text_baseline(&mut self, baseline: TextBaseline) {
        self.ctx.set_text_baseline(baseline.as_str());
    }

    fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64) {
        self.ctx.fill_rect(x, y, w, h);
    }

    fn stroke_rect(&mut self, x: f64, y: f64, w: f64, h: f64) {
        self.ctx.stroke_rect(x, y, w, h);
    }

    fn begin_path(&mut self) {
        self.ctx.begin_path();
    }

    fn move_to(&mut self, x: f64, y: f64) {
        self.ctx.move_to(x, y);
    }

    fn line_to(&mut self, x: f64, y: f64) {
        self.ctx.line_to(x, y);
    }

    fn stroke(&mut self) {
        self.ctx.stroke();
    }

    fn fill_text(&mut self, text: &str, x: f64, y: f64) {
        let _ = self.ctx.fill_text(text, x, y);
    }

    fn put_image_data(&mut self, image: &PreRendered, dx: u32, dy: u32) {
        let data = ImageData::new_with_u8_clamped_array_and_sh(
            Clamped(&image.pixels[..]),
            image.width,
            image.height,
        );
        match data {
            Ok(img) => {
                let _ = self.ctx.put_image_data(&img, dx as f64, dy as f64);
            }
            Err(e) => log::error!("Failed to create ImageData: {e:?}"),
        }
    }
}

impl ExportSurface for WebCanvas {
    fn encode_png(&self) -> Result<Vec<u8>> {
        let url = self
            .canvas
            .to_data_url_with_type("image/png")
            .map_err(|e| SonoscopeError::Export(format!("toDataURL failed: {e:?}")))?;
        let encoded = url
            .split_once(',')
            .map(|(_, data)| data)
            .ok_or_else(|| SonoscopeError::Export("malformed data URL".into()))?;
        STANDARD
            .decode(encoded)
            .map_err(|e| SonoscopeError::Export(format!("bad base64 from canvas: {e}")))
    }
}
