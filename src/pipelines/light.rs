//! The static lighting rig: hemisphere ambient, one shadow-casting
//! directional light, and the fog constants.
//!
//! Everything here is configuration fixed at construction time; the only
//! runtime mutation is the ambient tint once the environment panorama has
//! been averaged.

use cgmath::{EuclideanSpace, Matrix4, Point3, Vector3};
use wgpu::util::DeviceExt;

use crate::{camera::OPENGL_TO_WGPU_MATRIX, data_structures::texture::Texture};

/// Orthographic box the directional light renders shadows through, sized to
/// cover the floor plane.
#[derive(Clone, Copy, Debug)]
pub struct ShadowFrustum {
    pub near: f32,
    pub far: f32,
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
}

impl Default for ShadowFrustum {
    fn default() -> Self {
        Self {
            near: 1.0,
            far: 300.0,
            left: -80.0,
            right: 80.0,
            top: 80.0,
            bottom: -80.0,
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightUniform {
    pub shadow_view_proj: [[f32; 4]; 4],
    pub position: [f32; 3],
    // Due to uniforms requiring 16 byte (4 float) spacing, we need to use padding fields
    pub _padding: u32,
    pub color: [f32; 3],
    pub _padding2: u32,
    pub sky_colour: [f32; 3],
    pub _padding3: u32,
    pub ground_colour: [f32; 3],
    pub _padding4: u32,
    pub ambient: [f32; 3],
    pub _padding5: u32,
    pub fog_colour: [f32; 3],
    pub fog_near: f32,
    pub fog_far: f32,
    pub _padding6: [f32; 3],
}

impl LightUniform {
    /// The grove's fixed rig: warm hemisphere sky over dark ground, a white
    /// sun high behind the scene, and light blue distance fog.
    pub fn new() -> Self {
        let position = Vector3::new(0.0, 200.0, 100.0);
        Self {
            shadow_view_proj: shadow_view_proj(position, &ShadowFrustum::default()).into(),
            position: position.into(),
            _padding: 0,
            color: [1.0, 1.0, 1.0],
            _padding2: 0,
            sky_colour: [1.0, 0.956, 0.772],
            _padding3: 0,
            ground_colour: [0.267, 0.267, 0.267],
            _padding4: 0,
            ambient: [1.0, 1.0, 1.0],
            _padding5: 0,
            fog_colour: [0.565, 0.804, 1.0],
            fog_near: -5.0,
            fog_far: 250.0,
            _padding6: [0.0; 3],
        }
    }
}

impl Default for LightUniform {
    fn default() -> Self {
        Self::new()
    }
}

/// View-projection matrix of the shadow pass: the light looks at the origin
/// through an orthographic box.
pub fn shadow_view_proj(position: Vector3<f32>, frustum: &ShadowFrustum) -> Matrix4<f32> {
    let view = Matrix4::look_at_rh(
        Point3::from_vec(position),
        Point3::new(0.0, 0.0, 0.0),
        Vector3::unit_y(),
    );
    let proj = OPENGL_TO_WGPU_MATRIX
        * cgmath::ortho(
            frustum.left,
            frustum.right,
            frustum.bottom,
            frustum.top,
            frustum.near,
            frustum.far,
        );
    proj * view
}

pub fn mk_buffer(device: &wgpu::Device, light_uniform: LightUniform) -> wgpu::Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("Light Buffer"),
        contents: bytemuck::cast_slice(&[light_uniform]),
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    })
}

pub fn mk_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
        label: Some("light_bind_group_layout"),
    })
}

pub fn mk_bind_group(
    device: &wgpu::Device,
    bind_group_layout: &wgpu::BindGroupLayout,
    light_buffer: &wgpu::Buffer,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        layout: bind_group_layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: light_buffer.as_entire_binding(),
        }],
        label: Some("light_bind_group"),
    })
}

/// Layout of the shadow-map group sampled by the main pass (group 3).
pub fn mk_shadow_map_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    sample_type: wgpu::TextureSampleType::Depth,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison),
                count: None,
            },
        ],
        label: Some("shadow_map_bind_group_layout"),
    })
}

pub struct LightResources {
    pub uniform: LightUniform,
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    pub bind_group_layout: wgpu::BindGroupLayout,
    pub shadow_map: Texture,
    pub shadow_map_bind_group: wgpu::BindGroup,
    pub shadow_map_layout: wgpu::BindGroupLayout,
}

impl LightResources {
    pub fn new(device: &wgpu::Device) -> Self {
        let uniform = LightUniform::new();
        let buffer = mk_buffer(device, uniform);
        let bind_group_layout = mk_bind_group_layout(device);
        let bind_group = mk_bind_group(device, &bind_group_layout, &buffer);

        let shadow_map = Texture::create_shadow_map(device, "shadow map");
        let shadow_map_layout = mk_shadow_map_layout(device);
        let shadow_sampler = shadow_map
            .sampler
            .as_ref()
            .expect("shadow map always has a comparison sampler");
        let shadow_map_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &shadow_map_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&shadow_map.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(shadow_sampler),
                },
            ],
            label: Some("shadow_map_bind_group"),
        });

        Self {
            uniform,
            buffer,
            bind_group,
            bind_group_layout,
            shadow_map,
            shadow_map_bind_group,
            shadow_map_layout,
        }
    }

    /// Fold the environment's average colour into the hemisphere term and
    /// re-upload the uniform.
    pub fn set_ambient(&mut self, queue: &wgpu::Queue, tint: [f32; 3]) {
        self.uniform.ambient = tint;
        self.upload(queue);
    }

    pub fn upload(&self, queue: &wgpu::Queue) {
        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&[self.uniform]));
    }
}
