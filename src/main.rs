//! modelview - glTF/GLB model viewer
//!
//! Pick or drop a `.glb` / `.gltf` file to inspect it with an orbit camera,
//! adjustable lighting, background and scale, auto-rotate, and move / rotate /
//! scale gizmos.

mod app;
mod assets;
mod config;
mod render;
mod scene;
mod ui;

fn main() -> eframe::Result {
    app::run()
}
