//! Canvas spectrogram renderer: heatmap, axes, colorbar and burned-in
//! annotations, plus high-DPI PNG export.

use super::canvas::{Canvas2d, DisplaySize, ExportSurface, PixelCanvas, PreRendered, TextAlign, TextBaseline};
use super::colormap::{to_rgb8, value_to_color};
use super::prepass::{bilinear, oversample_time, smooth};
use crate::annotation::{arrow_head, Annotation, AnnotationId, Shape};
use crate::error::{Result, SonoscopeError};
use crate::types::{RenderOptions, Spectrogram};
use std::collections::BTreeMap;
use std::sync::Arc;

const FALLBACK_SIZE: f64 = 100.0;
const AXIS_LEFT: f64 = 60.0;
const AXIS_BOTTOM: f64 = 40.0;
const COLORBAR_MARGIN: f64 = 80.0;
const TOP_MARGIN: f64 = 20.0;
const COLORBAR_GAP: f64 = 10.0;
const COLORBAR_WIDTH: f64 = 20.0;
const TICK_COUNT: usize = 5;
const TICK_LENGTH: f64 = 5.0;
/// Below this the data is treated as flat and drawn mid-grey.
const FLAT_RANGE: f32 = 1e-10;
const LABEL_FONT: &str = "12px sans-serif";
const AXIS_COLOR: &str = "#333333";
const BACKGROUND: &str = "#ffffff";

/// Plot rectangle in CSS pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlotArea {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RenderOutcome {
    Rendered {
        plot: PlotArea,
        /// Dynamic range actually used for normalization.
        range: (f32, f32),
    },
    /// Nothing to draw; the surface was cleared to the background.
    Empty,
}

/// Visible window in frame/bin coordinates of the spectrogram being drawn.
#[derive(Clone, Copy, Debug, PartialEq)]
struct View {
    frame0: f64,
    frame1: f64,
    bin0: f64,
    bin1: f64,
}

impl View {
    fn resolve(s: &Spectrogram, options: &RenderOptions) -> Self {
        let max_frame = (s.n_time_frames() - 1) as f64;
        let max_bin = (s.n_freq_bins() - 1) as f64;
        let frames_per_sec = s.sample_rate() as f64 / s.hop_length() as f64;
        let bins_per_hz = s.n_fft() as f64 / s.sample_rate() as f64;
        let bound = |v: Option<f64>, scale: f64, max: f64, default: f64| {
            v.filter(|v| v.is_finite())
                .map(|v| (v * scale).clamp(0.0, max))
                .unwrap_or(default)
        };
        let mut view = View {
            frame0: bound(options.time_min, frames_per_sec, max_frame, 0.0),
            frame1: bound(options.time_max, frames_per_sec, max_frame, max_frame),
            bin0: bound(options.freq_min, bins_per_hz, max_bin, 0.0),
            bin1: bound(options.freq_max, bins_per_hz, max_bin, max_bin),
        };
        if view.frame1 <= view.frame0 {
            view.frame0 = 0.0;
            view.frame1 = max_frame;
        }
        if view.bin1 <= view.bin0 {
            view.bin0 = 0.0;
            view.bin1 = max_bin;
        }
        view
    }
}

/// Pick the CSS size of a surface: bounding rect, then offset size, then a
/// fixed fallback.
pub fn resolve_display_size(display: DisplaySize) -> (f64, f64) {
    let valid = |w: f64, h: f64| w.is_finite() && h.is_finite() && w > 0.0 && h > 0.0;
    if valid(display.rect_width, display.rect_height) {
        (display.rect_width, display.rect_height)
    } else if valid(display.offset_width, display.offset_height) {
        (display.offset_width, display.offset_height)
    } else {
        (FALLBACK_SIZE, FALLBACK_SIZE)
    }
}

pub fn plot_area(width: f64, height: f64, options: &RenderOptions) -> PlotArea {
    let left = if options.show_axes { AXIS_LEFT } else { 0.0 };
    let bottom = if options.show_axes { AXIS_BOTTOM } else { 0.0 };
    let right = if options.show_colorbar { COLORBAR_MARGIN } else { 0.0 };
    let top = if options.show_axes || options.show_colorbar {
        TOP_MARGIN
    } else {
        0.0
    };
    PlotArea {
        x: left,
        y: top,
        width: (width - left - right).max(1.0),
        height: (height - top - bottom).max(1.0),
    }
}

/// Raster spectrogram renderer bound to one surface.
pub struct RasterRenderer<C: Canvas2d> {
    canvas: C,
    pixel_ratio: f64,
    logical_size: (f64, f64),
    annotations: BTreeMap<AnnotationId, Annotation>,
    last_frame: Option<(Arc<Spectrogram>, RenderOptions)>,
}

impl<C: Canvas2d> RasterRenderer<C> {
    pub fn new(canvas: C) -> Self {
        let pixel_ratio = sane_ratio(canvas.device_pixel_ratio());
        Self {
            canvas,
            pixel_ratio,
            logical_size: (FALLBACK_SIZE, FALLBACK_SIZE),
            annotations: BTreeMap::new(),
            last_frame: None,
        }
    }

    pub fn canvas(&self) -> &C {
        &self.canvas
    }

    pub fn canvas_mut(&mut self) -> &mut C {
        &mut self.canvas
    }

    pub fn pixel_ratio(&self) -> f64 {
        self.pixel_ratio
    }

    /// Re-read the device pixel ratio, e.g. after the window changed screens.
    pub fn refresh_pixel_ratio(&mut self) {
        self.pixel_ratio = sane_ratio(self.canvas.device_pixel_ratio());
    }

    pub fn logical_size(&self) -> (f64, f64) {
        self.logical_size
    }

    pub fn last_frame(&self) -> Option<&(Arc<Spectrogram>, RenderOptions)> {
        self.last_frame.as_ref()
    }

    pub fn add_annotation(&mut self, annotation: Annotation) {
        self.annotations.insert(annotation.id(), annotation);
    }

    pub fn remove_annotation(&mut self, id: AnnotationId) -> bool {
        self.annotations.remove(&id).is_some()
    }

    pub fn clear_annotations(&mut self) {
        self.annotations.clear();
    }

    /// Replace the local annotation copy wholesale.
    pub fn sync_annotations<'a>(&mut self, annotations: impl IntoIterator<Item = &'a Annotation>) {
        self.annotations = annotations
            .into_iter()
            .map(|a| (a.id(), a.clone()))
            .collect();
    }

    pub fn annotation_count(&self) -> usize {
        self.annotations.len()
    }

    /// Size the surface to its layout box and draw one frame.
    pub fn render(
        &mut self,
        spectrogram: Option<Arc<Spectrogram>>,
        options: &RenderOptions,
    ) -> RenderOutcome {
        let (width, height) = resolve_display_size(self.canvas.display_size());
        self.logical_size = (width, height);
        let k = self.pixel_ratio;
        let backing = (
            ((width * k).round() as u32).max(1),
            ((height * k).round() as u32).max(1),
        );
        if self.canvas.backing_size() != backing {
            self.canvas.reset_transform();
            self.canvas.set_backing_size(backing.0, backing.1);
            log::debug!("Resized canvas to {}x{} (ratio {})", backing.0, backing.1, k);
        }

        let outcome = paint(
            &mut self.canvas,
            (width, height),
            k,
            spectrogram.as_deref(),
            options,
            self.annotations.values(),
        );
        if let (Some(s), RenderOutcome::Rendered { .. }) = (spectrogram, outcome) {
            self.last_frame = Some((s, options.clone()));
        }
        outcome
    }

    /// Redraw the last frame, e.g. after the annotation copy changed.
    pub fn rerender(&mut self) -> RenderOutcome {
        match self.last_frame.clone() {
            Some((s, options)) => self.render(Some(s), &options),
            None => RenderOutcome::Empty,
        }
    }

    /// Render the last frame onto a fresh surface scaled by `dpi / 96` and
    /// encode it as PNG. `make_surface` receives the device pixel size.
    pub fn export_png_with<S, F>(&self, dpi: f64, make_surface: F) -> Result<Vec<u8>>
    where
        S: ExportSurface,
        F: FnOnce(u32, u32) -> Result<S>,
    {
        self.export_with(dpi, make_surface, true)
    }

    /// Like [`Self::export_png_with`] but without the annotation overlay, for
    /// exports that carry the annotations as vectors.
    pub fn export_plot_png_with<S, F>(&self, dpi: f64, make_surface: F) -> Result<Vec<u8>>
    where
        S: ExportSurface,
        F: FnOnce(u32, u32) -> Result<S>,
    {
        self.export_with(dpi, make_surface, false)
    }

    /// [`Self::export_png_with`] on an in-memory surface.
    pub fn export_png(&self, dpi: f64) -> Result<Vec<u8>> {
        self.export_png_with(dpi, PixelCanvas::new)
    }

    fn export_with<S, F>(&self, dpi: f64, make_surface: F, with_annotations: bool) -> Result<Vec<u8>>
    where
        S: ExportSurface,
        F: FnOnce(u32, u32) -> Result<S>,
    {
        if !(dpi > 0.0 && dpi.is_finite()) {
            return Err(SonoscopeError::InvalidParams(format!("dpi must be positive, got {dpi}")));
        }
        let (spectrogram, options) = self
            .last_frame
            .as_ref()
            .ok_or_else(|| SonoscopeError::Export("nothing has been rendered yet".into()))?;
        let k = dpi / 96.0;
        let (width, height) = self.logical_size;
        let mut surface = make_surface(
            ((width * k).round() as u32).max(1),
            ((height * k).round() as u32).max(1),
        )?;
        let annotations = self.annotations.values().filter(|_| with_annotations);
        paint(
            &mut surface,
            (width, height),
            k,
            Some(spectrogram.as_ref()),
            options,
            annotations,
        );
        log::info!("Exported PNG at {} dpi", dpi);
        surface.encode_png()
    }
}

fn sane_ratio(ratio: f64) -> f64 {
    if ratio.is_finite() && ratio > 0.0 {
        ratio
    } else {
        1.0
    }
}

/// Draw one complete frame at CSS size `logical` with `ratio` device pixels
/// per CSS pixel. The surface must already have the matching backing size.
pub fn paint<'a, C: Canvas2d + ?Sized>(
    canvas: &mut C,
    logical: (f64, f64),
    ratio: f64,
    spectrogram: Option<&Spectrogram>,
    options: &RenderOptions,
    annotations: impl IntoIterator<Item = &'a Annotation>,
) -> RenderOutcome {
    let (width, height) = logical;
    canvas.reset_transform();
    canvas.scale(ratio, ratio);
    canvas.set_fill_style(BACKGROUND);
    canvas.fill_rect(0.0, 0.0, width, height);

    let Some(original) = spectrogram else {
        log::warn!("No spectrogram to render");
        return RenderOutcome::Empty;
    };

    let plot = plot_area(width, height, options);
    let range = original
        .finite_range()
        .unwrap_or((options.db_min, options.db_max));

    // Resolved on the original so the raster and the axis labels share one window.
    let view = View::resolve(original, options);
    let display = prepare(original, options);
    let frame_scale = display.n_time_frames() as f64 / original.n_time_frames() as f64;
    let image = rasterize(&display, options, range, plot, ratio, view, frame_scale);
    canvas.put_image_data(
        &image,
        (plot.x * ratio).round() as u32,
        (plot.y * ratio).round() as u32,
    );

    if options.show_axes {
        draw_axes(canvas, original, view, plot);
    }
    if options.show_colorbar {
        draw_colorbar(canvas, options, plot, ratio);
    }
    for annotation in annotations {
        draw_annotation(canvas, annotation);
    }

    RenderOutcome::Rendered { plot, range }
}

/// Apply the enabled pre-passes; a failing pass is skipped.
fn prepare(original: &Spectrogram, options: &RenderOptions) -> Spectrogram {
    let mut current = original.clone();
    if options.smoothing > 0.0 {
        match smooth(&current, options.smoothing.min(1.0)) {
            Ok(s) => current = s,
            Err(e) => log::warn!("Smoothing skipped: {e}"),
        }
    }
    if options.oversample {
        match oversample_time(&current) {
            Ok(s) => current = s,
            Err(e) => log::warn!("Oversampling skipped: {e}"),
        }
    }
    current
}

/// `view` is in frames of the original spectrogram; `frame_scale` maps those
/// onto `s` (2 after oversampling, so the window ends at frame `2(n-1)`).
fn rasterize(
    s: &Spectrogram,
    options: &RenderOptions,
    (min, max): (f32, f32),
    plot: PlotArea,
    ratio: f64,
    view: View,
    frame_scale: f64,
) -> PreRendered {
    let pw = ((plot.width * ratio).round() as u32).max(1);
    let ph = ((plot.height * ratio).round() as u32).max(1);
    let range = max - min;
    let flat = range <= FLAT_RANGE;
    let step = |n: u32| if n > 1 { 1.0 / (n - 1) as f64 } else { 0.0 };
    let (sx, sy) = (step(pw), step(ph));

    let mut image = PreRendered::new(pw, ph);
    for py in 0..ph {
        // Row 0 is the highest frequency.
        let bin = view.bin1 - py as f64 * sy * (view.bin1 - view.bin0);
        for px in 0..pw {
            let frame =
                (view.frame0 + px as f64 * sx * (view.frame1 - view.frame0)) * frame_scale;
            let normalized = if flat {
                0.5
            } else {
                (bilinear(s, bin, frame) - min) / range
            };
            let rgb = value_to_color(
                normalized,
                0.0,
                1.0,
                options.colormap,
                options.brightness,
                options.contrast,
                options.gamma,
            );
            let [r, g, b] = to_rgb8(rgb);
            image.set_pixel(px, py, [r, g, b, 255]);
        }
    }
    image
}

fn draw_axes<C: Canvas2d + ?Sized>(
    canvas: &mut C,
    original: &Spectrogram,
    view: View,
    plot: PlotArea,
) {
    let (t0, t1) = (original.time_of(view.frame0), original.time_of(view.frame1));
    let (f0, f1) = (original.frequency_of(view.bin0), original.frequency_of(view.bin1));
    let bottom = plot.y + plot.height;

    canvas.save();
    canvas.set_stroke_style(AXIS_COLOR);
    canvas.set_fill_style(AXIS_COLOR);
    canvas.set_line_width(1.0);
    canvas.set_font(LABEL_FONT);

    canvas.begin_path();
    canvas.move_to(plot.x, plot.y);
    canvas.line_to(plot.x, bottom);
    canvas.line_to(plot.x + plot.width, bottom);
    canvas.stroke();

    canvas.set_text_align(TextAlign::Center);
    canvas.set_text_baseline(TextBaseline::Top);
    for i in 0..TICK_COUNT {
        let t = i as f64 / (TICK_COUNT - 1) as f64;
        let x = plot.x + t * plot.width;
        canvas.begin_path();
        canvas.move_to(x, bottom);
        canvas.line_to(x, bottom + TICK_LENGTH);
        canvas.stroke();
        canvas.fill_text(&format!("{:.2}s", t0 + t * (t1 - t0)), x, bottom + TICK_LENGTH + 2.0);
    }

    canvas.set_text_align(TextAlign::Right);
    canvas.set_text_baseline(TextBaseline::Middle);
    for i in 0..TICK_COUNT {
        let t = i as f64 / (TICK_COUNT - 1) as f64;
        let y = bottom - t * plot.height;
        canvas.begin_path();
        canvas.move_to(plot.x - TICK_LENGTH, y);
        canvas.line_to(plot.x, y);
        canvas.stroke();
        canvas.fill_text(&format!("{:.0}Hz", f0 + t * (f1 - f0)), plot.x - TICK_LENGTH - 2.0, y);
    }
    canvas.restore();
}

fn draw_colorbar<C: Canvas2d + ?Sized>(
    canvas: &mut C,
    options: &RenderOptions,
    plot: PlotArea,
    ratio: f64,
) {
    let x = plot.x + plot.width + COLORBAR_GAP;
    let w = ((COLORBAR_WIDTH * ratio).round() as u32).max(1);
    let h = ((plot.height * ratio).round() as u32).max(1);
    let mut bar = PreRendered::new(w, h);
    for py in 0..h {
        let t = if h > 1 { 1.0 - py as f32 / (h - 1) as f32 } else { 1.0 };
        let rgb = value_to_color(
            t,
            0.0,
            1.0,
            options.colormap,
            options.brightness,
            options.contrast,
            options.gamma,
        );
        let [r, g, b] = to_rgb8(rgb);
        for px in 0..w {
            bar.set_pixel(px, py, [r, g, b, 255]);
        }
    }
    canvas.put_image_data(&bar, (x * ratio).round() as u32, (plot.y * ratio).round() as u32);

    canvas.save();
    canvas.set_stroke_style(AXIS_COLOR);
    canvas.set_line_width(1.0);
    canvas.stroke_rect(x, plot.y, COLORBAR_WIDTH, plot.height);
    canvas.set_fill_style(AXIS_COLOR);
    canvas.set_font(LABEL_FONT);
    canvas.set_text_align(TextAlign::Left);
    canvas.set_text_baseline(TextBaseline::Middle);
    let label_x = x + COLORBAR_WIDTH + 4.0;
    canvas.fill_text(&format!("{:.0}dB", options.db_max), label_x, plot.y);
    canvas.fill_text(&format!("{:.0}dB", options.db_min), label_x, plot.y + plot.height);
    canvas.restore();
}

fn draw_annotation<C: Canvas2d + ?Sized>(canvas: &mut C, annotation: &Annotation) {
    let p = annotation.position();
    canvas.save();
    match annotation.shape() {
        Shape::Text { text, color, font } => {
            canvas.set_fill_style(color);
            canvas.set_font(&font.css());
            canvas.set_text_align(TextAlign::Left);
            canvas.set_text_baseline(TextBaseline::Top);
            canvas.fill_text(text, p.x, p.y);
        }
        Shape::Arrow { end, color, width } => {
            canvas.set_stroke_style(color);
            canvas.set_line_width(*width);
            let [a, b] = arrow_head(p, *end);
            canvas.begin_path();
            canvas.move_to(p.x, p.y);
            canvas.line_to(end.x, end.y);
            canvas.move_to(a.x, a.y);
            canvas.line_to(end.x, end.y);
            canvas.line_to(b.x, b.y);
            canvas.stroke();
        }
        Shape::Rectangle {
            width,
            height,
            color,
            fill_color,
            line_width,
        } => {
            if let Some(fill) = fill_color {
                canvas.set_fill_style(fill);
                canvas.fill_rect(p.x, p.y, *width, *height);
            }
            canvas.set_stroke_style(color);
            canvas.set_line_width(*line_width);
            canvas.stroke_rect(p.x, p.y, *width, *height);
        }
    }
    canvas.restore();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::Point;
    use crate::render::colormap::Colormap;

    fn ramp(bins: usize, frames: usize) -> Arc<Spectrogram> {
        let data = (0..bins * frames)
            .map(|i| -80.0 + 80.0 * (i / frames) as f32 / (bins - 1) as f32)
            .collect();
        Arc::new(Spectrogram::new(data, bins, frames, 8000, 256, 128).unwrap())
    }

    fn renderer(w: u32, h: u32) -> RasterRenderer<PixelCanvas> {
        RasterRenderer::new(PixelCanvas::new(w, h).unwrap())
    }

    #[test]
    fn display_size_falls_back() {
        assert_eq!(resolve_display_size(DisplaySize::uniform(300.0, 200.0)), (300.0, 200.0));
        let offset_only = DisplaySize {
            rect_width: 0.0,
            rect_height: 0.0,
            offset_width: 320.0,
            offset_height: 240.0,
        };
        assert_eq!(resolve_display_size(offset_only), (320.0, 240.0));
        assert_eq!(resolve_display_size(DisplaySize::default()), (100.0, 100.0));
    }

    #[test]
    fn margins_follow_options() {
        let all = plot_area(400.0, 300.0, &RenderOptions::default());
        assert_eq!(all, PlotArea { x: 60.0, y: 20.0, width: 260.0, height: 240.0 });

        let bare = RenderOptions {
            show_axes: false,
            show_colorbar: false,
            ..RenderOptions::default()
        };
        assert_eq!(plot_area(400.0, 300.0, &bare), PlotArea { x: 0.0, y: 0.0, width: 400.0, height: 300.0 });
        assert_eq!(plot_area(50.0, 30.0, &RenderOptions::default()).width, 1.0);
    }

    #[test]
    fn missing_spectrogram_leaves_white_surface() {
        let mut r = renderer(50, 40);
        assert_eq!(r.render(None, &RenderOptions::default()), RenderOutcome::Empty);
        assert_eq!(r.canvas().pixel(25, 20), Some([255, 255, 255, 255]));
        assert!(r.last_frame().is_none());
    }

    #[test]
    fn high_frequencies_are_drawn_at_the_top() {
        let mut r = renderer(64, 64);
        let options = RenderOptions {
            show_axes: false,
            show_colorbar: false,
            colormap: Colormap::Grayscale,
            ..RenderOptions::default()
        };
        let outcome = r.render(Some(ramp(16, 8)), &options);
        assert_eq!(outcome, RenderOutcome::Rendered {
            plot: PlotArea { x: 0.0, y: 0.0, width: 64.0, height: 64.0 },
            range: (-80.0, 0.0),
        });
        assert_eq!(r.canvas().pixel(10, 0), Some([255, 255, 255, 255]));
        assert_eq!(r.canvas().pixel(10, 63), Some([0, 0, 0, 255]));
    }

    #[test]
    fn flat_data_renders_mid_grey() {
        let mut r = renderer(32, 32);
        let options = RenderOptions {
            show_axes: false,
            show_colorbar: false,
            colormap: Colormap::Grayscale,
            ..RenderOptions::default()
        };
        let flat = Arc::new(Spectrogram::new(vec![-42.0; 12], 3, 4, 8000, 256, 128).unwrap());
        r.render(Some(flat), &options);
        assert_eq!(r.canvas().pixel(16, 16), Some([127, 127, 127, 255]));
    }

    #[test]
    fn axes_label_five_ticks_each() {
        let mut r = renderer(400, 300);
        r.render(Some(ramp(129, 11)), &RenderOptions::default());
        let texts: Vec<&str> = r.canvas().texts().iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts.iter().filter(|t| t.ends_with('s')).count(), 5);
        assert_eq!(texts.iter().filter(|t| t.ends_with("Hz")).count(), 5);
        assert!(texts.contains(&"0.00s"));
        // 10 frames of 128 samples at 8 kHz.
        assert!(texts.contains(&"0.16s"));
        assert!(texts.contains(&"0Hz"));
        assert!(texts.contains(&"4000Hz"));
        assert!(texts.contains(&"0dB"));
        assert!(texts.contains(&"-80dB"));
    }

    #[test]
    fn backing_store_scales_with_pixel_ratio() {
        let canvas = PixelCanvas::new(10, 10)
            .unwrap()
            .with_display(DisplaySize::uniform(200.0, 100.0))
            .with_pixel_ratio(2.0);
        let mut r = RasterRenderer::new(canvas);
        r.render(Some(ramp(4, 4)), &RenderOptions::default());
        assert_eq!(r.canvas().backing_size(), (400, 200));
        assert_eq!(r.logical_size(), (200.0, 100.0));
    }

    #[test]
    fn annotations_are_burned_in() {
        let mut r = renderer(100, 100);
        let options = RenderOptions {
            show_axes: false,
            show_colorbar: false,
            ..RenderOptions::default()
        };
        let rect = Annotation::rectangle(Point::new(10.0, 10.0), 30.0, 30.0, "#ff0000", None);
        r.add_annotation(rect.clone());
        r.add_annotation(Annotation::text(Point::new(50.0, 50.0), "note", "#00ff00"));
        r.render(Some(ramp(4, 4)), &options);
        assert_eq!(r.canvas().pixel(10, 25), Some([255, 0, 0, 255]));
        assert_eq!(r.canvas().texts()[0].text, "note");

        assert!(r.remove_annotation(rect.id()));
        r.rerender();
        assert_ne!(r.canvas().pixel(10, 25), Some([255, 0, 0, 255]));
        r.clear_annotations();
        assert_eq!(r.annotation_count(), 0);
    }

    #[test]
    fn export_scales_by_dpi() {
        let mut r = renderer(120, 80);
        assert!(r.export_png(192.0).is_err());
        r.render(Some(ramp(8, 8)), &RenderOptions::default());

        let mut size = None;
        let png = r
            .export_png_with(192.0, |w, h| {
                size = Some((w, h));
                PixelCanvas::new(w, h)
            })
            .unwrap();
        assert_eq!(size, Some((240, 160)));
        assert_eq!(&png[1..4], b"PNG");
        assert!(r.export_png(0.0).is_err());
    }

    #[test]
    fn display_bounds_select_a_window() {
        let s = ramp(129, 11);
        let options = RenderOptions {
            time_min: Some(0.032),
            time_max: Some(0.096),
            freq_min: Some(1000.0),
            freq_max: Some(9999.0),
            ..RenderOptions::default()
        };
        let view = View::resolve(&s, &options);
        assert!((view.frame0 - 2.0).abs() < 1e-9);
        assert!((view.frame1 - 6.0).abs() < 1e-9);
        assert!((view.bin0 - 32.0).abs() < 1e-9);
        assert_eq!(view.bin1, 128.0);

        let inverted = RenderOptions {
            time_min: Some(0.1),
            time_max: Some(0.05),
            ..RenderOptions::default()
        };
        let view = View::resolve(&s, &inverted);
        assert_eq!((view.frame0, view.frame1), (0.0, 10.0));
    }

    #[test]
    fn oversampling_keeps_the_time_window() {
        // Linear in time, so interpolated frames reproduce the same image.
        let (bins, frames) = (4, 5);
        let data = (0..bins * frames)
            .map(|i| -80.0 + 20.0 * (i % frames) as f32)
            .collect();
        let s = Spectrogram::new(data, bins, frames, 8000, 256, 128).unwrap();
        let options = RenderOptions {
            colormap: Colormap::Grayscale,
            ..RenderOptions::default()
        };
        let plot = PlotArea { x: 0.0, y: 0.0, width: 41.0, height: 4.0 };
        let range = s.finite_range().unwrap();
        let view = View::resolve(&s, &options);

        let plain = rasterize(&s, &options, range, plot, 1.0, view, 1.0);
        let doubled = oversample_time(&s).unwrap();
        let over = rasterize(&doubled, &options, range, plot, 1.0, view, 2.0);

        for (a, b) in plain.pixels.iter().zip(&over.pixels) {
            assert!(a.abs_diff(*b) <= 1, "{a} vs {b}");
        }
        // Last column is the last real frame, not past it.
        assert_eq!(over.pixels[40 * 4], 255);
    }
}
