//! Render pipeline definitions: the lit model pass, the shadow depth pass,
//! the sky backdrop and the lighting rig resources they share.

pub mod basic;
pub mod light;
pub mod shadow;
pub mod sky;

/// All pipelines of one frame, created once at startup.
pub struct Pipelines {
    pub model: wgpu::RenderPipeline,
    pub shadow: wgpu::RenderPipeline,
    pub sky: wgpu::RenderPipeline,
}
