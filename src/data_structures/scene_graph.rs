//! Scene graph and hierarchical scene organization.
//!
//! Provides traits and structures for building a scene graph: a hierarchical
//! representation of the objects in the scene, including per-node animation
//! tracks and the draw calls for the main and shadow passes.

use std::collections::HashMap;

use wgpu::{Device, util::DeviceExt};

use crate::{
    data_structures::{
        instance::Instance,
        model::{self, DrawModel},
    },
    resources::animation::{AnimationClip, ModelAnimation, merge},
};

/// A node in the scene graph.
///
/// Every node owns a local transform, the world transform derived from it,
/// its children, and the animation tracks that target it. [`ModelNode`]s
/// additionally carry GPU meshes; [`ContainerNode`]s only group children.
///
/// `Send` so finished loads can travel from the loader task to the event
/// loop.
pub trait SceneNode: Send {
    fn local_transform(&self) -> &Instance;

    fn set_local_transform(&mut self, instance: Instance);

    fn world_transform(&self) -> &Instance;

    fn add_child(&mut self, child: Box<dyn SceneNode>);

    fn get_children(&self) -> &Vec<Box<dyn SceneNode>>;

    fn get_children_mut(&mut self) -> &mut Vec<Box<dyn SceneNode>>;

    /// Recompute this node's world transform from `parent` and propagate to
    /// the children.
    fn update_world_transforms(&mut self, parent: &Instance);

    /// Set the local transform from the animation track named `clip`
    /// sampled at `time`, then recurse. Nodes without a matching track keep
    /// their transform.
    fn animate(&mut self, clip: &str, time: f32);

    fn animations(&self) -> &Vec<ModelAnimation>;

    /// Whether this subtree is drawn into the shadow map.
    fn set_shadow_casting(&mut self, cast: bool);

    /// Upload the current world transforms to the GPU.
    fn write_to_buffers(&mut self, queue: &wgpu::Queue);

    fn draw<'a, 'pass>(
        &'a self,
        camera_bind_group: &'a wgpu::BindGroup,
        light_bind_group: &'a wgpu::BindGroup,
        render_pass: &'pass mut wgpu::RenderPass<'a>,
    ) where
        'a: 'pass;

    /// Depth-only draw into the shadow map. Skips subtrees that don't cast.
    fn draw_shadow<'a, 'pass>(&'a self, render_pass: &'pass mut wgpu::RenderPass<'a>)
    where
        'a: 'pass;
}

impl dyn SceneNode {
    /// Recompute world transforms for a whole tree rooted at this node.
    pub fn update_world_transform_all(&mut self) {
        self.update_world_transforms(&Instance::default());
    }
}

/// Convert one glTF node (and its children) into scene nodes.
///
/// Nodes with a mesh become [`ModelNode`]s, the rest become
/// [`ContainerNode`]s. The per-node animation channels in `anims` are merged
/// into full tracks and attached to the node they target.
pub fn to_scene_node(
    node: gltf::scene::Node,
    buf: &Vec<Vec<u8>>,
    device: &wgpu::Device,
    mats: &Vec<model::Material>,
    anims: &HashMap<usize, Vec<AnimationClip>>,
) -> Box<dyn SceneNode> {
    let animations = merge(anims.get(&node.index()).cloned().unwrap_or_default());
    let mut scene_node: Box<dyn SceneNode> = match node.mesh() {
        Some(mesh) => {
            let mut meshes = Vec::new();
            let primitives = mesh.primitives();

            primitives.for_each(|primitive| {
                let reader = primitive.reader(|buffer| {
                    buf.get(buffer.index()).map(|data| data.as_slice())
                });

                let mut vertices = Vec::new();
                if let Some(vertex_attribute) = reader.read_positions() {
                    vertex_attribute.for_each(|vertex| {
                        vertices.push(model::ModelVertex {
                            position: vertex,
                            ..Default::default()
                        })
                    });
                }
                if let Some(normal_attribute) = reader.read_normals() {
                    let mut normal_index = 0;
                    normal_attribute.for_each(|normal| {
                        vertices[normal_index].normal = normal;

                        normal_index += 1;
                    });
                }
                if let Some(tex_coord_attribute) = reader.read_tex_coords(0).map(|v| v.into_f32()) {
                    let mut tex_coord_index = 0;
                    tex_coord_attribute.for_each(|tex_coord| {
                        vertices[tex_coord_index].tex_coords = tex_coord;

                        tex_coord_index += 1;
                    });
                }
                if let Some(tangent_attribute) = reader.read_tangents() {
                    let mut tangent_index = 0;
                    tangent_attribute.for_each(|tangent| {
                        // GLTF represents tangents as vec4 where the 4th elem can be used to calculate the bitangent
                        let tangent: cgmath::Vector4<f32> = tangent.into();
                        vertices[tangent_index].tangent = tangent.truncate().into();
                        let normal: cgmath::Vector3<f32> = vertices[tangent_index].normal.into();
                        let bitangent = normal.cross(tangent.truncate()) * tangent[3];
                        vertices[tangent_index].bitangent = bitangent.into();

                        tangent_index += 1;
                    });
                };

                let mut indices = Vec::new();
                if let Some(indices_raw) = reader.read_indices() {
                    indices.append(&mut indices_raw.into_u32().collect::<Vec<u32>>());
                }
                let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(&format!("{:?} Vertex Buffer", mesh.name())),
                    contents: bytemuck::cast_slice(&vertices),
                    usage: wgpu::BufferUsages::VERTEX,
                });

                let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(&format!("{:?} Index Buffer", mesh.name())),
                    contents: bytemuck::cast_slice(&indices),
                    usage: wgpu::BufferUsages::INDEX,
                });
                let mat_idx = primitive.material().index().unwrap_or(0);

                meshes.push(model::Mesh {
                    name: mesh.name().unwrap_or("unknown_mesh").to_string(),
                    vertex_buffer,
                    index_buffer,
                    num_elements: indices.len() as u32,
                    material: mat_idx,
                });
            });
            let model = model::Model {
                meshes,
                materials: mats.clone(),
            };
            Box::new(ModelNode::from_model(device, model, animations))
        }
        None => Box::new(ContainerNode::new(animations)),
    };
    let decomp_pos = node.transform().decomposed();
    let instance = Instance {
        position: decomp_pos.0.into(),
        rotation: decomp_pos.1.into(),
        scale: decomp_pos.2.into(),
    };
    scene_node.set_local_transform(instance);
    for child in node.children() {
        let child_node = to_scene_node(child, buf, device, mats, anims);
        scene_node.add_child(child_node);
    }

    scene_node
}

fn animate_node(
    animations: &[ModelAnimation],
    clip: &str,
    time: f32,
) -> Option<Instance> {
    animations
        .iter()
        .find(|anim| anim.name == clip)
        .and_then(|anim| anim.sample(time))
}

/// A scene node without geometry; groups children and carries transforms.
pub struct ContainerNode {
    pub children: Vec<Box<dyn SceneNode>>,
    local: Instance,
    world: Instance,
    animations: Vec<ModelAnimation>,
}

impl ContainerNode {
    pub fn new(animations: Vec<ModelAnimation>) -> Self {
        Self {
            children: vec![],
            local: Instance::default(),
            world: Instance::default(),
            animations,
        }
    }
}

impl SceneNode for ContainerNode {
    fn local_transform(&self) -> &Instance {
        &self.local
    }

    fn set_local_transform(&mut self, instance: Instance) {
        self.local = instance;
    }

    fn world_transform(&self) -> &Instance {
        &self.world
    }

    fn add_child(&mut self, child: Box<dyn SceneNode>) {
        self.children.push(child);
    }

    fn get_children(&self) -> &Vec<Box<dyn SceneNode>> {
        &self.children
    }

    fn get_children_mut(&mut self) -> &mut Vec<Box<dyn SceneNode>> {
        &mut self.children
    }

    fn update_world_transforms(&mut self, parent: &Instance) {
        self.world = parent * &self.local;
        for child in self.children.iter_mut() {
            child.update_world_transforms(&self.world);
        }
    }

    fn animate(&mut self, clip: &str, time: f32) {
        if let Some(instance) = animate_node(&self.animations, clip, time) {
            self.local = instance;
        }
        for child in self.children.iter_mut() {
            child.animate(clip, time);
        }
    }

    fn animations(&self) -> &Vec<ModelAnimation> {
        &self.animations
    }

    fn set_shadow_casting(&mut self, cast: bool) {
        for child in self.children.iter_mut() {
            child.set_shadow_casting(cast);
        }
    }

    fn write_to_buffers(&mut self, queue: &wgpu::Queue) {
        for child in self.children.iter_mut() {
            child.write_to_buffers(queue);
        }
    }

    fn draw<'a, 'pass>(
        &'a self,
        camera_bind_group: &'a wgpu::BindGroup,
        light_bind_group: &'a wgpu::BindGroup,
        render_pass: &'pass mut wgpu::RenderPass<'a>,
    ) where
        'a: 'pass,
    {
        for child in &self.children {
            child.draw(camera_bind_group, light_bind_group, render_pass);
        }
    }

    fn draw_shadow<'a, 'pass>(&'a self, render_pass: &'pass mut wgpu::RenderPass<'a>)
    where
        'a: 'pass,
    {
        for child in &self.children {
            child.draw_shadow(render_pass);
        }
    }
}

/// A scene node with GPU meshes attached.
pub struct ModelNode {
    children: Vec<Box<dyn SceneNode>>,
    instance_buffer: wgpu::Buffer,
    local: Instance,
    world: Instance,
    animations: Vec<ModelAnimation>,
    model: model::Model,
    cast_shadows: bool,
}

impl ModelNode {
    pub fn from_model(
        device: &Device,
        model: model::Model,
        animations: Vec<ModelAnimation>,
    ) -> Self {
        let world = Instance::default();
        let instance_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Instance Buffer"),
            contents: bytemuck::cast_slice(&[world.to_raw()]),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        });

        Self {
            children: vec![],
            instance_buffer,
            local: Instance::default(),
            world,
            animations,
            model,
            cast_shadows: false,
        }
    }
}

impl SceneNode for ModelNode {
    fn local_transform(&self) -> &Instance {
        &self.local
    }

    fn set_local_transform(&mut self, instance: Instance) {
        self.local = instance;
    }

    fn world_transform(&self) -> &Instance {
        &self.world
    }

    fn add_child(&mut self, child: Box<dyn SceneNode>) {
        self.children.push(child);
    }

    fn get_children(&self) -> &Vec<Box<dyn SceneNode>> {
        &self.children
    }

    fn get_children_mut(&mut self) -> &mut Vec<Box<dyn SceneNode>> {
        &mut self.children
    }

    fn update_world_transforms(&mut self, parent: &Instance) {
        self.world = parent * &self.local;
        for child in self.children.iter_mut() {
            child.update_world_transforms(&self.world);
        }
    }

    fn animate(&mut self, clip: &str, time: f32) {
        if let Some(instance) = animate_node(&self.animations, clip, time) {
            self.local = instance;
        }
        for child in self.children.iter_mut() {
            child.animate(clip, time);
        }
    }

    fn animations(&self) -> &Vec<ModelAnimation> {
        &self.animations
    }

    fn set_shadow_casting(&mut self, cast: bool) {
        self.cast_shadows = cast;
        for child in self.children.iter_mut() {
            child.set_shadow_casting(cast);
        }
    }

    fn write_to_buffers(&mut self, queue: &wgpu::Queue) {
        queue.write_buffer(
            &self.instance_buffer,
            0,
            bytemuck::cast_slice(&[self.world.to_raw()]),
        );
        for child in self.children.iter_mut() {
            child.write_to_buffers(queue);
        }
    }

    fn draw<'a, 'pass>(
        &'a self,
        camera_bind_group: &'a wgpu::BindGroup,
        light_bind_group: &'a wgpu::BindGroup,
        render_pass: &'pass mut wgpu::RenderPass<'a>,
    ) where
        'a: 'pass,
    {
        render_pass.set_vertex_buffer(1, self.instance_buffer.slice(..));
        render_pass.draw_model_instanced(
            &self.model,
            0..1,
            camera_bind_group,
            light_bind_group,
        );
        for child in &self.children {
            child.draw(camera_bind_group, light_bind_group, render_pass);
        }
    }

    fn draw_shadow<'a, 'pass>(&'a self, render_pass: &'pass mut wgpu::RenderPass<'a>)
    where
        'a: 'pass,
    {
        if self.cast_shadows {
            render_pass.set_vertex_buffer(1, self.instance_buffer.slice(..));
            render_pass.draw_model_depth(&self.model, 0..1);
        }
        for child in &self.children {
            child.draw_shadow(render_pass);
        }
    }
}
