//! Animation clips, keyframe merging and playback.
//!
//! glTF stores animations as independent channels (translation, rotation,
//! scale) per target node. This module merges those channels into
//! [`ModelAnimation`] tracks, selects which clip to play and advances a
//! per-model clock through an [`AnimationMixer`].

use cgmath::VectorSpace;

use crate::data_structures::{instance::Instance, scene_graph::SceneNode};

#[derive(Clone, Debug)]
pub enum Keyframes {
    Translation(Vec<cgmath::Vector3<f32>>),
    Rotation(Vec<cgmath::Quaternion<f32>>),
    Scale(Vec<cgmath::Vector3<f32>>),
    Other,
}

/// An animation clip: a named animation channel with keyframes and timing.
#[derive(Clone, Debug)]
pub struct AnimationClip {
    pub name: String,
    pub keyframes: Keyframes,
    pub timestamps: Vec<f32>,
}

/// A merged animation track: one full transform per timestamp.
#[derive(Clone, Debug, Default)]
pub struct ModelAnimation {
    pub name: String,
    pub instances: Vec<Instance>,
    pub timestamps: Vec<f32>,
}

impl ModelAnimation {
    /// Duration is the last timestamp of the track.
    pub fn duration(&self) -> f32 {
        self.timestamps.last().copied().unwrap_or(0.0)
    }

    /// Sample the track at `time`, wrapping at the clip duration.
    ///
    /// Interpolates linearly between the surrounding keyframes (slerp for
    /// rotations). Returns `None` for an empty track.
    pub fn sample(&self, time: f32) -> Option<Instance> {
        if self.instances.is_empty() || self.timestamps.is_empty() {
            return None;
        }
        let duration = self.duration();
        let t = if duration > 0.0 { time % duration } else { 0.0 };

        let next = self.timestamps.partition_point(|&ts| ts <= t);
        if next == 0 {
            return self.instances.first().cloned();
        }
        if next >= self.timestamps.len() || next >= self.instances.len() {
            return self.instances.last().cloned();
        }
        let prev = next - 1;
        let span = self.timestamps[next] - self.timestamps[prev];
        let alpha = if span > 0.0 {
            (t - self.timestamps[prev]) / span
        } else {
            0.0
        };
        let from = &self.instances[prev];
        let to = &self.instances[next];
        Some(Instance {
            position: from.position.lerp(to.position, alpha),
            rotation: from.rotation.slerp(to.rotation, alpha),
            scale: from.scale.lerp(to.scale, alpha),
        })
    }
}

/// Pick the clip to play from the ordered clip-name list of an asset.
///
/// An exact match on `target` wins; otherwise the first available clip is
/// used; an empty list plays nothing. A `target` of `None` always takes the
/// first clip.
pub fn select_clip<'a, S: AsRef<str>>(clips: &'a [S], target: Option<&str>) -> Option<&'a str> {
    let first = clips.first().map(AsRef::as_ref);
    match target {
        Some(name) => clips
            .iter()
            .map(AsRef::as_ref)
            .find(|clip| *clip == name)
            .or(first),
        None => first,
    }
}

/// Advances the playback clock of one loaded model.
///
/// The mixer owns the model's clip-name list and zero-or-one active clip.
/// [`advance`](Self::advance) moves the clock and [`apply`](Self::apply)
/// writes the sampled transforms into the scene subtree the mixer is bound
/// to.
#[derive(Clone, Debug, Default)]
pub struct AnimationMixer {
    clips: Vec<String>,
    active: Option<String>,
    time: f32,
}

impl AnimationMixer {
    pub fn new(clips: Vec<String>) -> Self {
        Self {
            clips,
            active: None,
            time: 0.0,
        }
    }

    /// The asset's clip names in document order.
    pub fn clip_names(&self) -> &[String] {
        &self.clips
    }

    /// Start playing the clip selected by [`select_clip`] and reset the
    /// clock. Returns the name of the clip now playing, if any.
    pub fn play(&mut self, target: Option<&str>) -> Option<&str> {
        self.active = select_clip(&self.clips, target).map(str::to_string);
        self.time = 0.0;
        self.active.as_deref()
    }

    pub fn active_clip(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// Playback clock in seconds since [`play`](Self::play).
    pub fn time(&self) -> f32 {
        self.time
    }

    /// Move the clock forward. The caller scales `seconds` by the model's
    /// speed scalar before calling.
    pub fn advance(&mut self, seconds: f32) {
        self.time += seconds;
    }

    /// Write the transforms for the current clock into `node`'s subtree.
    /// Idle mixers leave the subtree untouched.
    pub fn apply(&self, node: &mut dyn SceneNode) {
        if let Some(name) = &self.active {
            node.animate(name, self.time);
        }
    }
}

/**
 * Merges keyframes with the same name to have all transformations in one place.
 *
 * GLTF:
 * AnimationClip {
 *      name: anim1
 *      keyframes: Scale(
 *          [[data]]
 *      )
 * }
 * AnimationClip {
 *      name: anim1
 *      keyframes: Rotation(
 *          [[data]]
 *      )
 * }
 * ...
 *
 * to
 *
 * ModelAnimation {
 *      name: anim1
 *      keyframes: [
 *          rot: []
 *          tr: []
 *          sc: []
 *      ]
 * }
 */
pub fn merge(clips: Vec<AnimationClip>) -> Vec<ModelAnimation> {
    let Some(first) = clips.first() else {
        return Vec::new();
    };
    let mut state = MergeState {
        current_clip: first.name.clone(),
        ..Default::default()
    };
    for clip in clips.iter() {
        if clip.name != state.current_clip {
            let animation = save_current_anim(&mut state, clip);
            state.animations.push(animation);
            state.reset(clip);
        }
        match &clip.keyframes {
            Keyframes::Translation(translations) => {
                translations.iter().for_each(|&tr| state.trans.push(tr))
            }
            Keyframes::Rotation(rotations) => {
                rotations.iter().for_each(|&rot| state.rots.push(rot));
            }
            Keyframes::Scale(scalations) => {
                scalations.iter().for_each(|&sc| state.scals.push(sc));
            }
            Keyframes::Other => (),
        }
        // in case some tracks have fewer steps than others we want to have the largest set of timestamps for smooth animations
        if clip.timestamps.len() > state.timestamps.len() {
            state.timestamps = clip.timestamps.clone();
        }
    }
    if let Some(clip) = clips.last() {
        let animation = save_current_anim(&mut state, clip);
        state.animations.push(animation);
        state.reset(clip);
    }
    state.animations
}

/**
 * Intermediate state when converting between `AnimationClip` and `ModelAnimation`
 */
#[derive(Default)]
struct MergeState {
    animations: Vec<ModelAnimation>,
    trans: Vec<cgmath::Vector3<f32>>,
    rots: Vec<cgmath::Quaternion<f32>>,
    scals: Vec<cgmath::Vector3<f32>>,
    timestamps: Vec<f32>,
    current_clip: String,
}

impl MergeState {
    fn reset(&mut self, clip: &AnimationClip) {
        self.timestamps = vec![];
        self.trans = vec![];
        self.rots = vec![];
        self.scals = vec![];
        self.current_clip = clip.name.clone();
    }
}

fn save_current_anim(state: &mut MergeState, clip: &AnimationClip) -> ModelAnimation {
    let t_len = state.trans.len();
    let r_len = state.rots.len();
    let s_len = state.scals.len();
    let max_len = t_len.max(r_len.max(s_len));
    if t_len != r_len || r_len != s_len {
        log::warn!(
            "animation track len() doesn't match and will be padded with defaults. previous animation: {}, current: {}",
            state.current_clip,
            clip.name
        );
        // Use first frame as default (this is important as child nodes have offsets)
        let default_tr = state
            .trans
            .first()
            .cloned()
            .unwrap_or(cgmath::Vector3::new(0.0, 0.0, 0.0));
        let default_rot = state
            .rots
            .first()
            .cloned()
            .unwrap_or(cgmath::Quaternion::new(1.0, 0.0, 0.0, 0.0));
        let default_sc = state
            .scals
            .first()
            .cloned()
            .unwrap_or(cgmath::Vector3::new(1.0, 1.0, 1.0));
        state.trans.extend((t_len..max_len).map(|_| default_tr));
        state.rots.extend((r_len..max_len).map(|_| default_rot));
        state.scals.extend((s_len..max_len).map(|_| default_sc));
    }
    // now assume they're all the same length
    let mut instances = Vec::with_capacity(max_len);
    for i in 0..max_len {
        let instance = Instance {
            position: state.trans[i],
            rotation: state.rots[i],
            scale: state.scals[i],
        };
        instances.push(instance);
    }
    ModelAnimation {
        name: clip.name.clone(),
        instances,
        timestamps: state.timestamps.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{Quaternion, Vector3};

    fn clip(name: &str, keyframes: Keyframes, timestamps: Vec<f32>) -> AnimationClip {
        AnimationClip {
            name: name.to_string(),
            keyframes,
            timestamps,
        }
    }

    #[test]
    fn merges_channels_of_one_clip_into_one_track() {
        let clips = vec![
            clip(
                "Sway",
                Keyframes::Translation(vec![
                    Vector3::new(0.0, 0.0, 0.0),
                    Vector3::new(1.0, 0.0, 0.0),
                ]),
                vec![0.0, 1.0],
            ),
            clip(
                "Sway",
                Keyframes::Rotation(vec![
                    Quaternion::new(1.0, 0.0, 0.0, 0.0),
                    Quaternion::new(1.0, 0.0, 0.0, 0.0),
                ]),
                vec![0.0, 1.0],
            ),
            clip(
                "Sway",
                Keyframes::Scale(vec![
                    Vector3::new(1.0, 1.0, 1.0),
                    Vector3::new(2.0, 2.0, 2.0),
                ]),
                vec![0.0, 1.0],
            ),
        ];
        let merged = merge(clips);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].name, "Sway");
        assert_eq!(merged[0].instances.len(), 2);
        assert_eq!(merged[0].timestamps, vec![0.0, 1.0]);
        assert_eq!(merged[0].instances[1].position.x, 1.0);
        assert_eq!(merged[0].instances[1].scale.x, 2.0);
    }

    #[test]
    fn keeps_clips_with_different_names_separate() {
        let clips = vec![
            clip(
                "Idle",
                Keyframes::Translation(vec![Vector3::new(0.0, 0.0, 0.0)]),
                vec![0.0],
            ),
            clip(
                "Fly",
                Keyframes::Translation(vec![Vector3::new(0.0, 1.0, 0.0)]),
                vec![0.0],
            ),
        ];
        let merged = merge(clips);
        let names: Vec<_> = merged.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["Idle", "Fly"]);
    }

    #[test]
    fn merge_of_nothing_is_nothing() {
        assert!(merge(Vec::new()).is_empty());
    }

    #[test]
    fn pads_missing_tracks_from_the_first_frame() {
        let clips = vec![
            clip(
                "Sway",
                Keyframes::Translation(vec![
                    Vector3::new(3.0, 0.0, 0.0),
                    Vector3::new(4.0, 0.0, 0.0),
                ]),
                vec![0.0, 1.0],
            ),
            clip(
                "Sway",
                Keyframes::Rotation(vec![Quaternion::new(1.0, 0.0, 0.0, 0.0)]),
                vec![0.0],
            ),
        ];
        let merged = merge(clips);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].instances.len(), 2);
        // rotation track was shorter and is padded with its first frame
        assert_eq!(
            merged[0].instances[1].rotation,
            Quaternion::new(1.0, 0.0, 0.0, 0.0)
        );
        // scale track was absent entirely and falls back to identity
        assert_eq!(merged[0].instances[0].scale, Vector3::new(1.0, 1.0, 1.0));
    }

    #[test]
    fn exact_name_match_wins() {
        let clips = ["Idle".to_string(), "Banana_Schwanken_Y".to_string()];
        assert_eq!(
            select_clip(&clips, Some("Banana_Schwanken_Y")),
            Some("Banana_Schwanken_Y")
        );
    }

    #[test]
    fn falls_back_to_first_clip_when_target_is_absent() {
        let clips = ["Flap".to_string()];
        assert_eq!(select_clip(&clips, Some("Vogel_Fliegen")), Some("Flap"));
    }

    #[test]
    fn no_clips_means_nothing_to_play() {
        let clips: [String; 0] = [];
        assert_eq!(select_clip(&clips, Some("Vogel_Fliegen")), None);
        assert_eq!(select_clip(&clips, None), None);
    }

    #[test]
    fn no_target_takes_the_first_clip() {
        let clips = ["A".to_string(), "B".to_string()];
        assert_eq!(select_clip(&clips, None), Some("A"));
    }

    #[test]
    fn mixer_clock_accumulates_scaled_deltas() {
        let mut mixer = AnimationMixer::new(vec!["Sway".to_string()]);
        mixer.play(Some("Sway"));
        mixer.advance(0.016 * 2.0);
        mixer.advance(0.020 * 2.0);
        assert!((mixer.time() - 0.072).abs() < 1e-6);
    }

    #[test]
    fn mixer_without_clips_stays_idle() {
        let mut mixer = AnimationMixer::new(Vec::new());
        assert_eq!(mixer.play(Some("Anything")), None);
        assert_eq!(mixer.active_clip(), None);
    }

    #[test]
    fn sampling_interpolates_between_keyframes() {
        let anim = ModelAnimation {
            name: "Sway".to_string(),
            instances: vec![
                Instance {
                    position: Vector3::new(0.0, 0.0, 0.0),
                    ..Default::default()
                },
                Instance {
                    position: Vector3::new(2.0, 0.0, 0.0),
                    ..Default::default()
                },
            ],
            timestamps: vec![0.0, 1.0],
        };
        let mid = anim.sample(0.5).unwrap();
        assert!((mid.position.x - 1.0).abs() < 1e-6);
    }

    #[test]
    fn sampling_wraps_at_clip_duration() {
        let anim = ModelAnimation {
            name: "Sway".to_string(),
            instances: vec![
                Instance {
                    position: Vector3::new(0.0, 0.0, 0.0),
                    ..Default::default()
                },
                Instance {
                    position: Vector3::new(2.0, 0.0, 0.0),
                    ..Default::default()
                },
            ],
            timestamps: vec![0.0, 2.0],
        };
        let wrapped = anim.sample(3.0).unwrap();
        let plain = anim.sample(1.0).unwrap();
        assert!((wrapped.position.x - plain.position.x).abs() < 1e-6);
    }

    #[test]
    fn sampling_an_empty_track_yields_nothing() {
        let anim = ModelAnimation::default();
        assert!(anim.sample(1.0).is_none());
    }
}
