//! Mareld engine demo viewer.
//!
//! Renders a small lit scene over a three-band simulated ocean, with a
//! depth-aware fog pass in the post-processing chain.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p mareld-viewer
//! ```
//!
//! Expects `shaders/` (compiled SPIR-V) and `assets/` next to the
//! working directory. Move with WASD/QE, look with the arrow keys.
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: log filter (e.g. info, debug, mareld_render=trace)

mod app;
mod effects;

use mareld_app::{run_app, AppConfig};

use crate::app::OceanViewer;

const WIDTH: u32 = 1280;
const HEIGHT: u32 = 720;

fn main() -> anyhow::Result<()> {
    run_app::<OceanViewer>(
        AppConfig::new("Mareld - Ocean Demo")
            .with_size(WIDTH, HEIGHT)
            .with_vsync(true),
    )
}
