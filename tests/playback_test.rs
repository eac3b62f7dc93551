//! Playback behavior tests: slot absence, speed scaling and clip selection
//! through the public API, without touching the GPU.

use instant::Duration;

use banana_grove::data_structures::scene_graph::{ContainerNode, SceneNode};
use banana_grove::resources::LoadedModel;
use banana_grove::resources::animation::{AnimationClip, Keyframes, merge, select_clip};
use banana_grove::scene::{ModelSlot, SceneState};

fn empty_model(clip_names: &[&str]) -> LoadedModel {
    LoadedModel {
        root: Box::new(ContainerNode::new(Vec::new())),
        clip_names: clip_names.iter().map(|name| name.to_string()).collect(),
    }
}

#[test]
fn ticks_complete_while_no_model_has_loaded() {
    let mut scene = SceneState::default();
    for _ in 0..100 {
        scene.advance(Duration::from_millis(16));
    }
    assert!(scene.models.banana_scene.is_none());
    assert!(scene.models.banana.is_none());
    assert!(scene.models.bird_banana.is_none());
    assert!(scene.models.flying_bird.is_none());
}

#[test]
fn ticks_complete_with_any_subset_of_slots() {
    let mut scene = SceneState::default();
    scene.models.flying_bird = Some(ModelSlot::new(
        empty_model(&["Vogel_Fliegen"]),
        Some("Vogel_Fliegen"),
        5.0,
    ));
    scene.advance(Duration::from_millis(16));
    assert_eq!(scene.slots().count(), 1);
}

#[test]
fn two_ticks_at_double_speed_advance_the_clock_to_72ms() {
    let mut scene = SceneState::default();
    scene.models.banana = Some(ModelSlot::new(
        empty_model(&["Banana_Schwanken_Y"]),
        Some("Banana_Schwanken_Y"),
        5.0,
    ));
    scene.speeds.banana.set(2.0);

    scene.advance(Duration::from_micros(16_000));
    scene.advance(Duration::from_micros(20_000));

    let slot = scene.models.banana.as_ref().unwrap();
    assert!((slot.mixer.time() - 0.072).abs() < 1e-5);
}

#[test]
fn default_speed_is_unit_until_changed() {
    let mut scene = SceneState::default();
    scene.models.bird_banana = Some(ModelSlot::new(
        empty_model(&["Vogel_Banane_Schwingen"]),
        Some("Vogel_Banane_Schwingen"),
        5.0,
    ));

    scene.advance(Duration::from_micros(16_000));
    let slot = scene.models.bird_banana.as_ref().unwrap();
    assert!((slot.mixer.time() - 0.016).abs() < 1e-6);
}

#[test]
fn requested_speeds_are_clamped_and_quantized() {
    let mut scene = SceneState::default();
    scene.speeds.flying_bird.set(17.0);
    assert_eq!(scene.speeds.flying_bird.get(), 5.0);
    scene.speeds.flying_bird.set(-3.0);
    assert_eq!(scene.speeds.flying_bird.get(), 0.0);
    scene.speeds.flying_bird.set(2.34);
    assert!((scene.speeds.flying_bird.get() - 2.3).abs() < 1e-6);
}

#[test]
fn banana_model_plays_its_named_clip() {
    let slot = ModelSlot::new(
        empty_model(&["Idle", "Banana_Schwanken_Y"]),
        Some("Banana_Schwanken_Y"),
        5.0,
    );
    assert_eq!(slot.mixer.active_clip(), Some("Banana_Schwanken_Y"));
}

#[test]
fn missing_clip_name_falls_back_to_the_first_clip() {
    let slot = ModelSlot::new(empty_model(&["Flap"]), Some("Vogel_Fliegen"), 5.0);
    assert_eq!(slot.mixer.active_clip(), Some("Flap"));
}

#[test]
fn animation_free_model_stays_static() {
    let mut slot = ModelSlot::new(empty_model(&[]), Some("Vogel_Fliegen"), 5.0);
    assert_eq!(slot.mixer.active_clip(), None);
    slot.advance(1.0);
    // the only transform on the subtree is the uniform scale
    assert_eq!(slot.node.local_transform().scale.x, 5.0);
}

#[test]
fn selection_is_a_pure_function_of_names() {
    let clips = ["Idle".to_string(), "Banana_Schwanken_Y".to_string()];
    assert_eq!(
        select_clip(&clips, Some("Banana_Schwanken_Y")),
        Some("Banana_Schwanken_Y")
    );
    assert_eq!(select_clip(&clips, Some("Absent")), Some("Idle"));
    let none: [String; 0] = [];
    assert_eq!(select_clip(&none, Some("Absent")), None);
}

#[test]
fn unresolved_environment_leaves_the_scene_untouched() {
    let mut scene = SceneState::default();
    for _ in 0..10 {
        scene.advance(Duration::from_millis(16));
    }
    assert!(scene.environment.is_none());
}

#[test]
fn playback_moves_animated_nodes_by_scaled_time() {
    // one child node sliding 4 units over 2 seconds
    let tracks = merge(vec![AnimationClip {
        name: "Slide".to_string(),
        keyframes: Keyframes::Translation(vec![
            cgmath::Vector3::new(0.0, 0.0, 0.0),
            cgmath::Vector3::new(4.0, 0.0, 0.0),
        ]),
        timestamps: vec![0.0, 2.0],
    }]);
    let mut root = ContainerNode::new(Vec::new());
    root.add_child(Box::new(ContainerNode::new(tracks)));

    let mut scene = SceneState::default();
    scene.models.banana = Some(ModelSlot::new(
        LoadedModel {
            root: Box::new(root),
            clip_names: vec!["Slide".to_string()],
        },
        Some("Slide"),
        1.0,
    ));
    scene.speeds.banana.set(2.0);

    // 0.5 s of wall clock at speed 2.0 is one second of playback
    scene.advance(Duration::from_millis(500));

    let slot = scene.models.banana.as_ref().unwrap();
    let child = &slot.node.get_children()[0];
    assert!((child.local_transform().position.x - 2.0).abs() < 1e-4);
}
