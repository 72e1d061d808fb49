//! Combined exports: the raster spectrogram plus the vector overlay.

use crate::annotation::vector::VectorLayer;
use crate::error::{Result, SonoscopeError};
use crate::render::canvas::{Canvas2d, ExportSurface, PixelCanvas};
use crate::render::raster::RasterRenderer;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// SVG document with `png` embedded as a base64 `<image>` under the
/// annotation groups of `layer`.
pub fn compose_svg(png: &[u8], width: f64, height: f64, layer: &VectorLayer) -> Result<String> {
    if !(width > 0.0 && height > 0.0) {
        return Err(SonoscopeError::Export(format!(
            "export size must be positive, got {width}x{height}"
        )));
    }
    Ok(format!(
        concat!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" ",
            "xmlns:xlink=\"http://www.w3.org/1999/xlink\" ",
            "width=\"{w}\" height=\"{h}\" viewBox=\"0 0 {w} {h}\">",
            "<image href=\"data:image/png;base64,{data}\" x=\"0\" y=\"0\" width=\"{w}\" height=\"{h}\"/>",
            "<g class=\"annotations\">{groups}</g>",
            "</svg>"
        ),
        w = width,
        h = height,
        data = STANDARD.encode(png),
        groups = layer.inner_markup(),
    ))
}

/// The renderer's last frame at its CSS size, without the raster copy of the
/// annotations, wrapped with the overlay. `make_surface` builds the
/// offscreen surface the plot is painted on.
pub fn export_svg_with<C, S, F>(
    renderer: &RasterRenderer<C>,
    layer: &VectorLayer,
    make_surface: F,
) -> Result<String>
where
    C: Canvas2d,
    S: ExportSurface,
    F: FnOnce(u32, u32) -> Result<S>,
{
    let png = renderer.export_plot_png_with(96.0, make_surface)?;
    let (width, height) = renderer.logical_size();
    compose_svg(&png, width, height, layer)
}

/// [`export_svg_with`] on an in-memory surface.
pub fn export_svg<C: Canvas2d>(renderer: &RasterRenderer<C>, layer: &VectorLayer) -> Result<String> {
    export_svg_with(renderer, layer, PixelCanvas::new)
}
