//! Loading of external assets: glTF models and the environment panorama.

use std::{
    collections::HashMap,
    convert::identity,
    io::{BufReader, Cursor},
};

use crate::{
    data_structures::{
        model,
        scene_graph::{ContainerNode, SceneNode, to_scene_node},
        texture::Texture,
    },
    resources::{
        animation::{AnimationClip, Keyframes},
        texture::{diffuse_normal_layout, load_binary, load_texture},
    },
};

pub mod animation;
pub mod texture;

/// A fully loaded model asset: the scene subtree plus the names of the
/// animation clips it came with, in document order.
pub struct LoadedModel {
    pub root: Box<dyn SceneNode>,
    pub clip_names: Vec<String>,
}

/// The decoded environment panorama, still CPU-side.
///
/// `pixels` is tightly packed `Rgb32F` data; `average` is the mean colour
/// used as the scene's ambient tint.
pub struct EnvironmentData {
    pub pixels: Vec<f32>,
    pub width: u32,
    pub height: u32,
    pub average: [f32; 3],
}

pub async fn load_model_gltf(
    file_name: &str,
    device: &wgpu::Device,
    queue: &wgpu::Queue,
) -> anyhow::Result<LoadedModel> {
    let gltf_text = load_binary(file_name).await?;
    let gltf_cursor = Cursor::new(gltf_text);
    let gltf_reader = BufReader::new(gltf_cursor);
    let gltf = gltf::Gltf::from_reader(gltf_reader)?;

    // Load buffers
    let mut buffer_data = Vec::new();
    for buffer in gltf.buffers() {
        match buffer.source() {
            gltf::buffer::Source::Bin => {
                if let Some(blob) = gltf.blob.as_deref() {
                    buffer_data.push(blob.into());
                };
            }
            gltf::buffer::Source::Uri(uri) => {
                let bin = load_binary(uri).await?;
                buffer_data.push(bin);
            }
        }
    }

    // Load animations
    let mut clip_names: Vec<String> = Vec::new();
    let mut animations: HashMap<usize, Vec<AnimationClip>> = HashMap::new();
    for animation in gltf.animations() {
        let name = animation.name().unwrap_or("Default").to_string();
        if !clip_names.contains(&name) {
            clip_names.push(name.clone());
        }
        for channel in animation.channels() {
            let reader = channel.reader(|buffer| Some(&buffer_data[buffer.index()]));
            let timestamps = if let Some(inputs) = reader.read_inputs() {
                match inputs {
                    gltf::accessor::Iter::Standard(times) => times.collect(),
                    gltf::accessor::Iter::Sparse(_) => Vec::new(),
                }
            } else {
                log::warn!("no keyframe timestamps in channel {}", channel.index());
                Vec::new()
            };
            let keyframes = if let Some(outputs) = reader.read_outputs() {
                match outputs {
                    gltf::animation::util::ReadOutputs::Translations(translation) => {
                        Keyframes::Translation(translation.map(|tr| tr.into()).collect())
                    }
                    gltf::animation::util::ReadOutputs::Rotations(rotation) => {
                        Keyframes::Rotation(rotation.into_f32().map(|quat| quat.into()).collect())
                    }
                    gltf::animation::util::ReadOutputs::Scales(scales) => {
                        Keyframes::Scale(scales.map(|sc| sc.into()).collect())
                    }
                    gltf::animation::util::ReadOutputs::MorphTargetWeights(_) => Keyframes::Other,
                }
            } else {
                log::warn!("no keyframes in channel {}", channel.index());
                Keyframes::Other
            };
            let clip = AnimationClip {
                name: name.clone(),
                keyframes,
                timestamps,
            };
            animations
                .entry(channel.target().node().index())
                .and_modify(|v| v.push(clip.clone()))
                .or_insert(vec![clip]);
        }
    }
    log::debug!("{} animations: {:?}", file_name, clip_names);

    // Load materials
    let layout = diffuse_normal_layout(device);
    let mut materials = Vec::new();
    for material in gltf.materials() {
        let pbr = material.pbr_metallic_roughness();
        let diffuse_texture = match pbr.base_color_texture().map(|tex| tex.texture().source().source()) {
            Some(gltf::image::Source::View { view, mime_type }) => Texture::from_bytes(
                device,
                queue,
                &buffer_data[view.buffer().index()],
                file_name,
                mime_type.split('/').last(),
                false,
            )?,
            Some(gltf::image::Source::Uri { uri, mime_type }) => {
                load_texture(
                    uri,
                    false,
                    device,
                    queue,
                    mime_type.map(|mt| mt.split('/').last().map_or("jpg", identity)),
                )
                .await?
            }
            // untextured material, bake the base colour factor into a 1x1 texture
            None => {
                let factor = pbr.base_color_factor();
                let rgba = factor.map(|c| (c.clamp(0.0, 1.0) * 255.0) as u8);
                Texture::create_single_colour(1, 1, rgba, true, device, queue)
            }
        };
        let normal_texture = if let Some(texture) = material.normal_texture() {
            match &texture.texture().source().source() {
                gltf::image::Source::View { view, mime_type: _ } => Texture::from_bytes(
                    device,
                    queue,
                    &buffer_data[view.buffer().index()],
                    file_name,
                    None,
                    true,
                )?,
                gltf::image::Source::Uri { uri, mime_type: _ } => {
                    load_texture(uri, true, device, queue, None).await?
                }
            }
        } else {
            Texture::create_default_normal_map(2, 2, device, queue)
        };
        let name = material.name().unwrap_or(file_name);
        materials.push(model::Material::new(
            device,
            name,
            diffuse_texture,
            normal_texture,
            &layout,
        ));
    }
    if materials.is_empty() {
        // a model with no materials at all still needs one to draw with
        materials.push(model::Material::new(
            device,
            "default",
            Texture::create_single_colour(1, 1, [255, 255, 255, 255], true, device, queue),
            Texture::create_default_normal_map(2, 2, device, queue),
            &layout,
        ));
    }

    // The subtree is always wrapped in one container so the per-model scale
    // lives outside any node an animation may overwrite.
    let mut root: Box<dyn SceneNode> = Box::new(ContainerNode::new(Vec::new()));
    for scene in gltf.scenes() {
        for node in scene.nodes() {
            let model = to_scene_node(node, &buffer_data, device, &materials, &animations);
            root.add_child(model);
        }
    }

    Ok(LoadedModel { root, clip_names })
}

/// Decode the `.hdr` panorama and average it down to an ambient tint.
pub async fn load_environment(file_name: &str) -> anyhow::Result<EnvironmentData> {
    let bytes = load_binary(file_name).await?;
    let img = image::load_from_memory_with_format(&bytes, image::ImageFormat::Hdr)?;
    let rgb = img.to_rgb32f();
    let (width, height) = rgb.dimensions();

    let mut sums = [0.0f64; 3];
    for pixel in rgb.pixels() {
        sums[0] += pixel.0[0] as f64;
        sums[1] += pixel.0[1] as f64;
        sums[2] += pixel.0[2] as f64;
    }
    let count = (width as f64 * height as f64).max(1.0);
    let average = [
        (sums[0] / count) as f32,
        (sums[1] / count) as f32,
        (sums[2] / count) as f32,
    ];

    Ok(EnvironmentData {
        pixels: rgb.into_raw(),
        width,
        height,
        average,
    })
}
