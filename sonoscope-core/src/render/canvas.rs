//! Drawing surface abstraction.
//!
//! [`Canvas2d`] mirrors the subset of `CanvasRenderingContext2D` the raster
//! renderer uses, so the same drawing code runs against a browser canvas or
//! the in-memory [`PixelCanvas`] used for tests and native PNG export.

use crate::error::{Result, SonoscopeError};
use image::{ImageFormat, RgbaImage};
use std::io::Cursor;

/// RGBA pixels, row-major, 4 bytes per pixel.
#[derive(Clone, Debug, PartialEq)]
pub struct PreRendered {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl PreRendered {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize * 4],
        }
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        if x >= self.width || y >= self.height {
            return;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        self.pixels[i..i + 4].copy_from_slice(&rgba);
    }
}

/// Layout box of the element hosting a surface, in CSS pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DisplaySize {
    /// `getBoundingClientRect()` extent.
    pub rect_width: f64,
    pub rect_height: f64,
    /// `offsetWidth`/`offsetHeight`.
    pub offset_width: f64,
    pub offset_height: f64,
}

impl DisplaySize {
    pub fn uniform(width: f64, height: f64) -> Self {
        Self {
            rect_width: width,
            rect_height: height,
            offset_width: width,
            offset_height: height,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

impl TextAlign {
    pub fn as_str(self) -> &'static str {
        match self {
            TextAlign::Left => "left",
            TextAlign::Center => "center",
            TextAlign::Right => "right",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TextBaseline {
    #[default]
    Alphabetic,
    Top,
    Middle,
}

impl TextBaseline {
    pub fn as_str(self) -> &'static str {
        match self {
            TextBaseline::Alphabetic => "alphabetic",
            TextBaseline::Top => "top",
            TextBaseline::Middle => "middle",
        }
    }
}

/// 2D drawing surface. Coordinates pass through the current transform except
/// for [`Canvas2d::put_image_data`], which addresses backing pixels directly.
pub trait Canvas2d {
    /// Backing store size in device pixels.
    fn backing_size(&self) -> (u32, u32);
    /// Resizing clears the surface.
    fn set_backing_size(&mut self, width: u32, height: u32);
    fn display_size(&self) -> DisplaySize;
    fn device_pixel_ratio(&self) -> f64 {
        1.0
    }

    fn reset_transform(&mut self);
    fn scale(&mut self, sx: f64, sy: f64);
    fn save(&mut self);
    fn restore(&mut self);

    fn set_fill_style(&mut self, style: &str);
    fn set_stroke_style(&mut self, style: &str);
    fn set_line_width(&mut self, width: f64);
    fn set_font(&mut self, font: &str);
    fn set_text_align(&mut self, align: TextAlign);
    fn set_text_baseline(&mut self, baseline: TextBaseline);

    fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64);
    fn stroke_rect(&mut self, x: f64, y: f64, w: f64, h: f64);
    fn begin_path(&mut self);
    fn move_to(&mut self, x: f64, y: f64);
    fn line_to(&mut self, x: f64, y: f64);
    fn stroke(&mut self);
    fn fill_text(&mut self, text: &str, x: f64, y: f64);
    fn put_image_data(&mut self, image: &PreRendered, dx: u32, dy: u32);
}

/// A surface that can serialize its pixels.
pub trait ExportSurface: Canvas2d {
    fn encode_png(&self) -> Result<Vec<u8>>;
}

/// Text drawn on a [`PixelCanvas`]. Glyphs are not rasterized; the call is
/// recorded with its device-space origin.
#[derive(Clone, Debug, PartialEq)]
pub struct TextOp {
    pub text: String,
    pub x: f64,
    pub y: f64,
    pub font: String,
    pub color: String,
    pub align: TextAlign,
    pub baseline: TextBaseline,
}

#[derive(Clone, Debug)]
struct DrawState {
    scale: (f64, f64),
    fill: [u8; 4],
    fill_style: String,
    stroke: [u8; 4],
    line_width: f64,
    font: String,
    align: TextAlign,
    baseline: TextBaseline,
}

impl Default for DrawState {
    fn default() -> Self {
        Self {
            scale: (1.0, 1.0),
            fill: [0, 0, 0, 255],
            fill_style: "#000000".into(),
            stroke: [0, 0, 0, 255],
            line_width: 1.0,
            font: "10px sans-serif".into(),
            align: TextAlign::Left,
            baseline: TextBaseline::Alphabetic,
        }
    }
}

/// In-memory RGBA canvas.
#[derive(Clone, Debug)]
pub struct PixelCanvas {
    image: PreRendered,
    display: DisplaySize,
    pixel_ratio: f64,
    state: DrawState,
    stack: Vec<DrawState>,
    path: Vec<((f64, f64), (f64, f64))>,
    cursor: Option<(f64, f64)>,
    texts: Vec<TextOp>,
}

impl PixelCanvas {
    /// A surface whose layout box matches its backing store. Zero-sized
    /// surfaces are rejected.
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(SonoscopeError::InvalidCanvas { width, height });
        }
        Ok(Self {
            image: PreRendered::new(width, height),
            display: DisplaySize::uniform(width as f64, height as f64),
            pixel_ratio: 1.0,
            state: DrawState::default(),
            stack: Vec::new(),
            path: Vec::new(),
            cursor: None,
            texts: Vec::new(),
        })
    }

    pub fn with_display(mut self, display: DisplaySize) -> Self {
        self.display = display;
        self
    }

    pub fn with_pixel_ratio(mut self, ratio: f64) -> Self {
        self.pixel_ratio = ratio;
        self
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.image.width || y >= self.image.height {
            return None;
        }
        let i = (y as usize * self.image.width as usize + x as usize) * 4;
        let p = &self.image.pixels[i..i + 4];
        Some([p[0], p[1], p[2], p[3]])
    }

    pub fn image(&self) -> &PreRendered {
        &self.image
    }

    pub fn texts(&self) -> &[TextOp] {
        &self.texts
    }

    fn to_device(&self, x: f64, y: f64) -> (f64, f64) {
        (x * self.state.scale.0, y * self.state.scale.1)
    }

    fn blend(&mut self, x: i64, y: i64, src: [u8; 4]) {
        if x < 0 || y < 0 || x >= self.image.width as i64 || y >= self.image.height as i64 {
            return;
        }
        let i = (y as usize * self.image.width as usize + x as usize) * 4;
        let dst = &mut self.image.pixels[i..i + 4];
        let a = src[3] as f32 / 255.0;
        if a >= 1.0 {
            dst.copy_from_slice(&src);
            return;
        }
        if a <= 0.0 {
            return;
        }
        let da = dst[3] as f32 / 255.0;
        let out_a = a + da * (1.0 - a);
        for c in 0..3 {
            let v = (src[c] as f32 * a + dst[c] as f32 * da * (1.0 - a)) / out_a;
            dst[c] = v.round().clamp(0.0, 255.0) as u8;
        }
        dst[3] = (out_a * 255.0).round() as u8;
    }

    /// Rasterize the current path as square-capped thick segments. Coverage is
    /// collected first so translucent strokes blend once per pixel.
    fn stroke_segments(&mut self, segments: &[((f64, f64), (f64, f64))]) {
        let (w, h) = (self.image.width as usize, self.image.height as usize);
        let mut mask = vec![false; w * h];
        let half = (self.state.line_width * self.state.scale.0.max(self.state.scale.1) / 2.0).max(0.5);
        for &((x0, y0), (x1, y1)) in segments {
            let (x0, y0) = self.to_device(x0, y0);
            let (x1, y1) = self.to_device(x1, y1);
            let len = ((x1 - x0).powi(2) + (y1 - y0).powi(2)).sqrt();
            let steps = (len * 2.0).ceil().max(1.0) as usize;
            for s in 0..=steps {
                let t = s as f64 / steps as f64;
                let (cx, cy) = (x0 + (x1 - x0) * t, y0 + (y1 - y0) * t);
                let (px0, px1) = ((cx - half).floor() as i64, (cx + half).ceil() as i64);
                let (py0, py1) = ((cy - half).floor() as i64, (cy + half).ceil() as i64);
                for py in py0.max(0)..py1.min(h as i64) {
                    for px in px0.max(0)..px1.min(w as i64) {
                        mask[py as usize * w + px as usize] = true;
                    }
                }
            }
        }
        let color = self.state.stroke;
        for (i, covered) in mask.into_iter().enumerate() {
            if covered {
                self.blend((i % w) as i64, (i / w) as i64, color);
            }
        }
    }
}

impl Canvas2d for PixelCanvas {
    fn backing_size(&self) -> (u32, u32) {
        (self.image.width, self.image.height)
    }

    fn set_backing_size(&mut self, width: u32, height: u32) {
        self.image = PreRendered::new(width, height);
        self.state = DrawState::default();
        self.stack.clear();
        self.texts.clear();
    }

    fn display_size(&self) -> DisplaySize {
        self.display
    }

    fn device_pixel_ratio(&self) -> f64 {
        self.pixel_ratio
    }

    fn reset_transform(&mut self) {
        self.state.scale = (1.0, 1.0);
    }

    fn scale(&mut self, sx: f64, sy: f64) {
        self.state.scale = (self.state.scale.0 * sx, self.state.scale.1 * sy);
    }

    fn save(&mut self) {
        self.stack.push(self.state.clone());
    }

    fn restore(&mut self) {
        if let Some(state) = self.stack.pop() {
            self.state = state;
        }
    }

    fn set_fill_style(&mut self, style: &str) {
        if let Some(rgba) = parse_css_color(style) {
            self.state.fill = rgba;
            self.state.fill_style = style.to_string();
        }
    }

    fn set_stroke_style(&mut self, style: &str) {
        if let Some(rgba) = parse_css_color(style) {
            self.state.stroke = rgba;
        }
    }

    fn set_line_width(&mut self, width: f64) {
        if width > 0.0 && width.is_finite() {
            self.state.line_width = width;
        }
    }

    fn set_font(&mut self, font: &str) {
        self.state.font = font.to_string();
    }

    fn set_text_align(&mut self, align: TextAlign) {
        self.state.align = align;
    }

    fn set_text_baseline(&mut self, baseline: TextBaseline) {
        self.state.baseline = baseline;
    }

    fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64) {
        let (x0, y0) = self.to_device(x, y);
        let (x1, y1) = self.to_device(x + w, y + h);
        let (x0, x1) = (x0.min(x1).round() as i64, x0.max(x1).round() as i64);
        let (y0, y1) = (y0.min(y1).round() as i64, y0.max(y1).round() as i64);
        let color = self.state.fill;
        if color[3] == 255 {
            // Opaque fills paint over earlier text.
            let (fx0, fx1, fy0, fy1) = (x0 as f64, x1 as f64, y0 as f64, y1 as f64);
            self.texts
                .retain(|t| !(t.x >= fx0 && t.x < fx1 && t.y >= fy0 && t.y < fy1));
        }
        for py in y0.max(0)..y1.min(self.image.height as i64) {
            for px in x0.max(0)..x1.min(self.image.width as i64) {
                self.blend(px, py, color);
            }
        }
    }

    fn stroke_rect(&mut self, x: f64, y: f64, w: f64, h: f64) {
        let corners = [(x, y), (x + w, y), (x + w, y + h), (x, y + h), (x, y)];
        let segments: Vec<_> = corners.windows(2).map(|c| (c[0], c[1])).collect();
        self.stroke_segments(&segments);
    }

    fn begin_path(&mut self) {
        self.path.clear();
        self.cursor = None;
    }

    fn move_to(&mut self, x: f64, y: f64) {
        self.cursor = Some((x, y));
    }

    fn line_to(&mut self, x: f64, y: f64) {
        if let Some(from) = self.cursor {
            self.path.push((from, (x, y)));
        }
        self.cursor = Some((x, y));
    }

    fn stroke(&mut self) {
        let segments = std::mem::take(&mut self.path);
        self.stroke_segments(&segments);
        self.path = segments;
    }

    fn fill_text(&mut self, text: &str, x: f64, y: f64) {
        let (x, y) = self.to_device(x, y);
        self.texts.push(TextOp {
            text: text.to_string(),
            x,
            y,
            font: self.state.font.clone(),
            color: self.state.fill_style.clone(),
            align: self.state.align,
            baseline: self.state.baseline,
        });
    }

    fn put_image_data(&mut self, image: &PreRendered, dx: u32, dy: u32) {
        for y in 0..image.height {
            let ty = dy + y;
            if ty >= self.image.height {
                break;
            }
            let cols = image.width.min(self.image.width.saturating_sub(dx)) as usize;
            if cols == 0 {
                break;
            }
            let src = y as usize * image.width as usize * 4;
            let dst = (ty as usize * self.image.width as usize + dx as usize) * 4;
            self.image.pixels[dst..dst + cols * 4]
                .copy_from_slice(&image.pixels[src..src + cols * 4]);
        }
    }
}

impl ExportSurface for PixelCanvas {
    fn encode_png(&self) -> Result<Vec<u8>> {
        encode_png(&self.image)
    }
}

pub fn encode_png(image: &PreRendered) -> Result<Vec<u8>> {
    let buffer = RgbaImage::from_raw(image.width, image.height, image.pixels.clone())
        .ok_or_else(|| SonoscopeError::Export("pixel buffer does not match its size".into()))?;
    let mut bytes = Vec::new();
    buffer.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

/// Parse the color forms annotations and the renderer use: `#rgb`,
/// `#rrggbb`, `#rrggbbaa`, `rgb()`/`rgba()` and a few keywords.
pub fn parse_css_color(style: &str) -> Option<[u8; 4]> {
    let s = style.trim().to_ascii_lowercase();
    if let Some(hex) = s.strip_prefix('#') {
        if !hex.is_ascii() {
            return None;
        }
        let digit = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok();
        let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        return match hex.len() {
            3 => Some([digit(0)? * 17, digit(1)? * 17, digit(2)? * 17, 255]),
            6 => Some([byte(0)?, byte(2)?, byte(4)?, 255]),
            8 => Some([byte(0)?, byte(2)?, byte(4)?, byte(6)?]),
            _ => None,
        };
    }
    if let Some(args) = s
        .strip_prefix("rgba(")
        .or_else(|| s.strip_prefix("rgb("))
        .and_then(|rest| rest.strip_suffix(')'))
    {
        let parts: Vec<&str> = args.split(',').map(str::trim).collect();
        if parts.len() != 3 && parts.len() != 4 {
            return None;
        }
        let channel = |p: &str| p.parse::<f64>().ok().map(|v| v.clamp(0.0, 255.0).round() as u8);
        let alpha = match parts.get(3) {
            Some(a) => (a.parse::<f64>().ok()?.clamp(0.0, 1.0) * 255.0).round() as u8,
            None => 255,
        };
        return Some([channel(parts[0])?, channel(parts[1])?, channel(parts[2])?, alpha]);
    }
    match s.as_str() {
        "black" => Some([0, 0, 0, 255]),
        "white" => Some([255, 255, 255, 255]),
        "red" => Some([255, 0, 0, 255]),
        "green" => Some([0, 128, 0, 255]),
        "blue" => Some([0, 0, 255, 255]),
        "yellow" => Some([255, 255, 0, 255]),
        "gray" | "grey" => Some([128, 128, 128, 255]),
        "transparent" | "none" => Some([0, 0, 0, 0]),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_sized_surface_is_rejected() {
        assert_eq!(
            PixelCanvas::new(0, 10).unwrap_err(),
            SonoscopeError::InvalidCanvas { width: 0, height: 10 }
        );
        assert!(PixelCanvas::new(10, 0).is_err());
    }

    #[test]
    fn colors_parse() {
        assert_eq!(parse_css_color("#fff"), Some([255, 255, 255, 255]));
        assert_eq!(parse_css_color("#FF8000"), Some([255, 128, 0, 255]));
        assert_eq!(parse_css_color("#ff800080"), Some([255, 128, 0, 128]));
        assert_eq!(parse_css_color("rgba(10, 20, 30, 0.5)"), Some([10, 20, 30, 128]));
        assert_eq!(parse_css_color("rgb(1,2,3)"), Some([1, 2, 3, 255]));
        assert_eq!(parse_css_color("none"), Some([0, 0, 0, 0]));
        assert_eq!(parse_css_color("#12"), None);
        assert_eq!(parse_css_color("chartreuse-ish"), None);
    }

    #[test]
    fn fill_rect_respects_scale() {
        let mut c = PixelCanvas::new(20, 20).unwrap();
        c.scale(2.0, 2.0);
        c.set_fill_style("#ff0000");
        c.fill_rect(1.0, 1.0, 3.0, 3.0);
        assert_eq!(c.pixel(2, 2), Some([255, 0, 0, 255]));
        assert_eq!(c.pixel(7, 7), Some([255, 0, 0, 255]));
        assert_eq!(c.pixel(8, 8), Some([0, 0, 0, 0]));
        assert_eq!(c.pixel(1, 1), Some([0, 0, 0, 0]));
    }

    #[test]
    fn save_restore_round_trips_state() {
        let mut c = PixelCanvas::new(4, 4).unwrap();
        c.set_fill_style("#00ff00");
        c.save();
        c.set_fill_style("#0000ff");
        c.scale(2.0, 2.0);
        c.restore();
        c.fill_rect(0.0, 0.0, 1.0, 1.0);
        assert_eq!(c.pixel(0, 0), Some([0, 255, 0, 255]));
        assert_eq!(c.pixel(1, 1), Some([0, 0, 0, 0]));
    }

    #[test]
    fn stroke_draws_along_the_path() {
        let mut c = PixelCanvas::new(20, 20).unwrap();
        c.set_stroke_style("#000000");
        c.set_line_width(2.0);
        c.begin_path();
        c.move_to(2.0, 10.0);
        c.line_to(18.0, 10.0);
        c.stroke();
        assert_eq!(c.pixel(10, 10), Some([0, 0, 0, 255]));
        assert_eq!(c.pixel(10, 3), Some([0, 0, 0, 0]));
    }

    #[test]
    fn put_image_data_ignores_transform_and_clips() {
        let mut c = PixelCanvas::new(4, 4).unwrap();
        c.scale(3.0, 3.0);
        let mut img = PreRendered::new(3, 3);
        img.set_pixel(0, 0, [9, 9, 9, 255]);
        img.set_pixel(2, 2, [7, 7, 7, 255]);
        c.put_image_data(&img, 2, 2);
        assert_eq!(c.pixel(2, 2), Some([9, 9, 9, 255]));
        assert_eq!(c.pixel(3, 3), Some([0, 0, 0, 0]));
    }

    #[test]
    fn text_is_recorded_in_device_space() {
        let mut c = PixelCanvas::new(10, 10).unwrap();
        c.scale(2.0, 2.0);
        c.set_fill_style("#333333");
        c.set_font("12px sans-serif");
        c.set_text_align(TextAlign::Center);
        c.fill_text("0.00s", 3.0, 4.0);
        let op = &c.texts()[0];
        assert_eq!((op.x, op.y), (6.0, 8.0));
        assert_eq!(op.color, "#333333");
        assert_eq!(op.align, TextAlign::Center);
    }

    #[test]
    fn png_export_has_signature() {
        let mut c = PixelCanvas::new(3, 2).unwrap();
        c.set_fill_style("white");
        c.fill_rect(0.0, 0.0, 3.0, 2.0);
        let png = c.encode_png().unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    }
}
