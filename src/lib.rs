pub mod app;
pub mod assets;
pub mod gpu;
pub mod hit_regions;
pub mod input;
pub mod logging;
pub mod overlay;
pub mod render;
pub mod settings;
pub mod shaper;
pub mod target;
pub mod tracker;
pub mod ui;
