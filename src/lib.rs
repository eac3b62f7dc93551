//! banana-grove
//!
//! A small cross-platform scene viewer built on wgpu and winit. It loads
//! the four banana-grove glTF models asynchronously, lights them with a
//! hemisphere/directional rig plus an HDR panorama backdrop, plays each
//! model's animation clip and exposes per-model playback speed through a
//! small control panel.
//!
//! High-level modules
//! - `camera`: camera types, orbit controller and uniforms for view/projection
//! - `context`: central GPU and window context that owns device/queue/pipelines
//! - `data_structures`: scene data models (meshes, transforms, textures)
//! - `flow`: the event loop and per-frame tick
//! - `gui`: the animation-speed control panel
//! - `pipelines`: definitions for the render pipelines (model, shadow, sky)
//! - `resources`: helpers to load models/textures and drive animations
//! - `scene`: the scene state the frame tick reads
//!

pub mod camera;
pub mod context;
pub mod data_structures;
pub mod flow;
pub mod gui;
pub mod pipelines;
pub mod resources;
pub mod scene;

// Re-exports commonly used types for convenience in downstream code.
pub use cgmath::*;
pub use wgpu::*;
pub use winit::dpi::PhysicalPosition;
pub use winit::event::DeviceEvent;
pub use winit::event::WindowEvent;
