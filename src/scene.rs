//! The scene's shared state: model slots, speed scalars, floor and
//! environment.
//!
//! Everything the frame tick reads lives in [`SceneState`] and is passed by
//! reference; loaders fill the slots as their assets arrive and the tick
//! tolerates any subset still being empty.

use instant::Duration;
use wgpu::util::DeviceExt;

use crate::{
    data_structures::{
        instance::Instance,
        model::{Material, Mesh, Model, ModelVertex},
        scene_graph::{ModelNode, SceneNode},
        texture::Texture,
    },
    pipelines::sky::Environment,
    resources::{LoadedModel, animation::AnimationMixer, texture::diffuse_normal_layout},
};

/// A playback-speed factor, clamped to [0, 5] in 0.1 steps.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpeedScalar(f32);

impl SpeedScalar {
    pub const MIN: f32 = 0.0;
    pub const MAX: f32 = 5.0;
    pub const STEP: f32 = 0.1;

    pub fn new(value: f32) -> Self {
        let mut scalar = Self(1.0);
        scalar.set(value);
        scalar
    }

    /// Clamp and quantize regardless of what the caller asks for.
    pub fn set(&mut self, value: f32) {
        let clamped = value.clamp(Self::MIN, Self::MAX);
        self.0 = (clamped / Self::STEP).round() * Self::STEP;
    }

    pub fn get(&self) -> f32 {
        self.0
    }
}

impl Default for SpeedScalar {
    fn default() -> Self {
        Self(1.0)
    }
}

/// The three operator-adjustable speeds. Written by the control panel, read
/// by the frame tick.
#[derive(Clone, Copy, Debug, Default)]
pub struct SpeedControls {
    pub banana: SpeedScalar,
    pub bird_banana: SpeedScalar,
    pub flying_bird: SpeedScalar,
}

/// One loaded model: its scene subtree and the mixer driving it.
pub struct ModelSlot {
    pub node: Box<dyn SceneNode>,
    pub mixer: AnimationMixer,
}

impl ModelSlot {
    /// Wire up a freshly loaded model: apply the uniform scale, enable
    /// shadows on the whole subtree and start the selected clip.
    pub fn new(model: LoadedModel, target_clip: Option<&str>, scale: f32) -> Self {
        let LoadedModel {
            mut root,
            clip_names,
        } = model;
        root.set_local_transform(Instance::from_scale(scale));
        root.set_shadow_casting(true);
        root.update_world_transform_all();

        let mut mixer = AnimationMixer::new(clip_names);
        mixer.play(target_clip);

        Self { node: root, mixer }
    }

    /// Advance playback by `seconds` (already scaled by the speed scalar)
    /// and refresh the subtree's transforms.
    pub fn advance(&mut self, seconds: f32) {
        self.mixer.advance(seconds);
        self.mixer.apply(self.node.as_mut());
        self.node.update_world_transform_all();
    }
}

/// The four model slots. Each is independently optional: a slot stays empty
/// until its load resolves, or forever if it never does.
#[derive(Default)]
pub struct ModelSlots {
    pub banana_scene: Option<ModelSlot>,
    pub banana: Option<ModelSlot>,
    pub bird_banana: Option<ModelSlot>,
    pub flying_bird: Option<ModelSlot>,
}

#[derive(Default)]
pub struct SceneState {
    pub models: ModelSlots,
    pub speeds: SpeedControls,
    pub floor: Option<ModelNode>,
    pub environment: Option<Environment>,
}

impl SceneState {
    /// Advance every mixer that exists by the elapsed time, scaled by its
    /// speed scalar. Empty slots are skipped; the background scene has no
    /// slider and runs at unit speed.
    pub fn advance(&mut self, dt: Duration) {
        let elapsed = dt.as_secs_f32();
        if let Some(slot) = &mut self.models.banana_scene {
            slot.advance(elapsed);
        }
        if let Some(slot) = &mut self.models.banana {
            slot.advance(elapsed * self.speeds.banana.get());
        }
        if let Some(slot) = &mut self.models.bird_banana {
            slot.advance(elapsed * self.speeds.bird_banana.get());
        }
        if let Some(slot) = &mut self.models.flying_bird {
            slot.advance(elapsed * self.speeds.flying_bird.get());
        }
    }

    /// All populated slots, for the render passes.
    pub fn slots(&self) -> impl Iterator<Item = &ModelSlot> {
        [
            self.models.banana_scene.as_ref(),
            self.models.banana.as_ref(),
            self.models.bird_banana.as_ref(),
            self.models.flying_bird.as_ref(),
        ]
        .into_iter()
        .flatten()
    }

    pub fn slots_mut(&mut self) -> impl Iterator<Item = &mut ModelSlot> {
        [
            self.models.banana_scene.as_mut(),
            self.models.banana.as_mut(),
            self.models.bird_banana.as_mut(),
            self.models.flying_bird.as_mut(),
        ]
        .into_iter()
        .flatten()
    }
}

const FLOOR_SIZE: f32 = 700.0;
const FLOOR_COLOUR: [u8; 4] = [144, 205, 255, 255];

/// The light blue ground plane. Receives shadows but casts none.
pub fn mk_floor(device: &wgpu::Device, queue: &wgpu::Queue) -> ModelNode {
    let half = FLOOR_SIZE / 2.0;
    let vertices = [
        floor_vertex([-half, 0.0, -half], [0.0, 0.0]),
        floor_vertex([half, 0.0, -half], [1.0, 0.0]),
        floor_vertex([half, 0.0, half], [1.0, 1.0]),
        floor_vertex([-half, 0.0, half], [0.0, 1.0]),
    ];
    // counter-clockwise seen from above
    let indices: [u32; 6] = [0, 2, 1, 0, 3, 2];

    let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("Floor Vertex Buffer"),
        contents: bytemuck::cast_slice(&vertices),
        usage: wgpu::BufferUsages::VERTEX,
    });
    let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("Floor Index Buffer"),
        contents: bytemuck::cast_slice(&indices),
        usage: wgpu::BufferUsages::INDEX,
    });

    let layout = diffuse_normal_layout(device);
    let material = Material::new(
        device,
        "floor",
        Texture::create_single_colour(1, 1, FLOOR_COLOUR, true, device, queue),
        Texture::create_default_normal_map(2, 2, device, queue),
        &layout,
    );

    let model = Model {
        meshes: vec![Mesh {
            name: "floor".to_string(),
            vertex_buffer,
            index_buffer,
            num_elements: indices.len() as u32,
            material: 0,
        }],
        materials: vec![material],
    };

    let mut floor = ModelNode::from_model(device, model, Vec::new());
    // sits just below the models to avoid z-fighting with their bases
    floor.set_local_transform(Instance::from(cgmath::Vector3::new(0.0, -0.01, 0.0)));
    floor.update_world_transforms(&Instance::default());
    floor.write_to_buffers(queue);
    floor
}

fn floor_vertex(position: [f32; 3], tex_coords: [f32; 2]) -> ModelVertex {
    ModelVertex {
        position,
        tex_coords,
        normal: [0.0, 1.0, 0.0],
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_structures::scene_graph::ContainerNode;
    use crate::resources::animation::{ModelAnimation, merge};

    #[test]
    fn speed_scalar_clamps_to_range() {
        let mut speed = SpeedScalar::default();
        speed.set(7.3);
        assert_eq!(speed.get(), 5.0);
        speed.set(-1.0);
        assert_eq!(speed.get(), 0.0);
    }

    #[test]
    fn speed_scalar_quantizes_to_steps() {
        let mut speed = SpeedScalar::default();
        speed.set(1.234);
        assert!((speed.get() - 1.2).abs() < 1e-6);
        speed.set(0.05);
        assert!((speed.get() - 0.1).abs() < 1e-6);
    }

    #[test]
    fn speed_scalar_defaults_to_one() {
        assert_eq!(SpeedScalar::default().get(), 1.0);
    }

    #[test]
    fn empty_scene_ticks_without_models() {
        let mut scene = SceneState::default();
        scene.advance(Duration::from_millis(16));
        scene.advance(Duration::from_millis(20));
        assert!(scene.slots().next().is_none());
    }

    fn dummy_model(clip_names: Vec<String>) -> LoadedModel {
        LoadedModel {
            root: Box::new(ContainerNode::new(Vec::new())),
            clip_names,
        }
    }

    #[test]
    fn slot_plays_the_requested_clip() {
        let model = dummy_model(vec!["Idle".to_string(), "Banana_Schwanken_Y".to_string()]);
        let slot = ModelSlot::new(model, Some("Banana_Schwanken_Y"), 5.0);
        assert_eq!(slot.mixer.active_clip(), Some("Banana_Schwanken_Y"));
    }

    #[test]
    fn slot_applies_the_uniform_scale() {
        let model = dummy_model(Vec::new());
        let slot = ModelSlot::new(model, None, 5.0);
        assert_eq!(slot.node.local_transform().scale.x, 5.0);
    }

    #[test]
    fn speeds_scale_the_mixer_clock() {
        let mut scene = SceneState::default();
        scene.models.banana = Some(ModelSlot::new(
            dummy_model(vec!["Sway".to_string()]),
            Some("Sway"),
            5.0,
        ));
        scene.speeds.banana.set(2.0);
        scene.advance(Duration::from_millis(16));
        scene.advance(Duration::from_millis(20));
        let slot = scene.models.banana.as_ref().unwrap();
        assert!((slot.mixer.time() - 0.072).abs() < 1e-4);
    }

    #[test]
    fn advancing_a_slot_moves_the_animated_child() {
        let track = merge(vec![crate::resources::animation::AnimationClip {
            name: "Slide".to_string(),
            keyframes: crate::resources::animation::Keyframes::Translation(vec![
                cgmath::Vector3::new(0.0, 0.0, 0.0),
                cgmath::Vector3::new(4.0, 0.0, 0.0),
            ]),
            timestamps: vec![0.0, 2.0],
        }]);
        let animated: Vec<ModelAnimation> = track;
        let mut root = ContainerNode::new(Vec::new());
        root.add_child(Box::new(ContainerNode::new(animated)));

        let mut slot = ModelSlot::new(
            LoadedModel {
                root: Box::new(root),
                clip_names: vec!["Slide".to_string()],
            },
            Some("Slide"),
            1.0,
        );
        slot.advance(1.0);
        let child = &slot.node.get_children()[0];
        assert!((child.local_transform().position.x - 2.0).abs() < 1e-4);
    }
}
