//! Three coloured point lights orbiting a textured sphere, lit with
//! stencil-masked light volumes
//!
//! Run with:
//!   cargo run --example deferred_lights
//!
//! Controls:
//!   WASD     - Move camera
//!   Escape   - Exit
//!
//! Set `RUST_LOG=debug` to see the pass order and per-resize reallocation.

use deferred_light_volumes::{window, DemoConfig};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = DemoConfig::default();
    log::info!("Starting {} ({}x{})", config.title, config.width, config.height);

    if let Err(e) = window::run(config) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}
