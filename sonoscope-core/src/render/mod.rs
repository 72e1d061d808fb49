pub mod canvas;
pub mod colormap;
pub mod prepass;
pub mod raster;
