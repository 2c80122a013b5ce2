//! Cross-module scenarios: scene bookkeeping, packing, host culling and the
//! frame sequencing types. None of these need a GPU.

use glam::{Quat, Vec3};

use ringframe_renderer::compute::culling::clear_instance_counts;
use ringframe_renderer::compute::transform::expand_on_host;
use ringframe_renderer::{
    FrameCursor, RebuildReason, RecordStage, SlotRefresh, StageTracker, SwapchainHealth,
    cull_on_host, upload,
};
use ringframe_rhi::vk;
use ringframe_scene::{Camera, DirtyKind, Mesh, SceneState, Transform};

const EPSILON: f32 = 1e-5;

fn approx_eq(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

/// Group "a" (cube) and group "b" (octahedron), both empty.
fn two_group_scene(ring_size: usize) -> SceneState {
    let mut scene = SceneState::new(ring_size, 16);
    let cube = scene.add_mesh(Mesh::cube("cube", 0.5).unwrap());
    let oct = scene.add_mesh(Mesh::octahedron("oct", 0.5).unwrap());
    scene.add_group("a", cube).unwrap();
    scene.add_group("b", oct).unwrap();
    scene
}

fn cull(scene: &SceneState, camera: &Camera) -> (ringframe_renderer::HostCullOutput, Vec<u32>) {
    let uniforms = upload::frame_uniforms(camera, scene.total_instance_count(), scene.total_model_count());
    let records = upload::pack_cull_records(scene);
    let mut draws = upload::pack_draw_commands(&scene.draw_layout());
    let output = cull_on_host(&uniforms, &records, &mut draws);
    let per_group = draws.iter().map(|d| d.instance_count).collect();
    (output, per_group)
}

#[test]
fn test_three_visible_in_first_group_none_in_second() {
    let mut scene = two_group_scene(4);
    let a = scene.group_id("a").unwrap();
    for x in [-1.0, 0.0, 1.0] {
        scene
            .add_instance(a, Transform::from_position(Vec3::new(x, 0.0, 0.0)))
            .unwrap();
    }

    let (output, per_group) = cull(&scene, &Camera::new());

    assert_eq!(output.counters.visible_instances, 3);
    assert_eq!(output.counters.draw_count, 1);
    assert_eq!(per_group, vec![3, 0]);

    let mut visible = output.visible[..3].to_vec();
    visible.sort_unstable();
    assert_eq!(visible, vec![0, 1, 2]);
}

#[test]
fn test_visible_total_matches_frustum_test() {
    let mut scene = two_group_scene(2);
    let a = scene.group_id("a").unwrap();
    let b = scene.group_id("b").unwrap();
    for i in 0..64 {
        let angle = i as f32 * 0.37;
        let position = Vec3::new(angle.cos() * 12.0, (i % 5) as f32 - 2.0, angle.sin() * 12.0);
        let group = if i % 3 == 0 { b } else { a };
        scene
            .add_instance(group, Transform::from_position(position).with_scale(Vec3::splat(1.5)))
            .unwrap();
    }

    let camera = Camera::new();
    let frustum = camera.frustum();
    let expected = scene
        .instances()
        .filter(|(_, instance)| frustum.intersects_sphere(&instance.world_bounds()))
        .count() as u32;

    let (output, per_group) = cull(&scene, &camera);
    assert_eq!(output.counters.visible_instances, expected);
    assert_eq!(per_group.iter().sum::<u32>(), expected);
    assert!(expected > 0 && expected < 64);
}

#[test]
fn test_visible_entries_stay_in_group_ranges() {
    let mut scene = two_group_scene(2);
    let a = scene.group_id("a").unwrap();
    let b = scene.group_id("b").unwrap();
    for i in 0..5 {
        let z = -(i as f32) * 2.0;
        scene.add_instance(a, Transform::from_position(Vec3::new(0.0, 0.0, z))).unwrap();
        scene.add_instance(b, Transform::from_position(Vec3::new(1.0, 0.0, z))).unwrap();
    }

    let (output, per_group) = cull(&scene, &Camera::new());
    let layout = scene.draw_layout();
    assert_eq!(per_group, vec![5, 5]);

    for (group, range) in layout.iter().enumerate() {
        let first = range.first_instance as usize;
        for &instance in &output.visible[first..first + per_group[group] as usize] {
            let instance = instance as usize;
            assert!(instance >= first && instance < first + range.instance_count as usize);
        }
    }
}

#[test]
fn test_removal_shrinks_following_ranges() {
    let mut scene = two_group_scene(2);
    let a = scene.group_id("a").unwrap();
    let b = scene.group_id("b").unwrap();
    let mut keys = Vec::new();
    for i in 0..3 {
        keys.push(scene.add_instance(a, Transform::from_position(Vec3::new(i as f32, 0.0, 0.0))).unwrap());
    }
    scene.add_instance(b, Transform::IDENTITY).unwrap();
    assert_eq!(scene.draw_layout()[1].first_instance, 3);

    scene.remove_instance(keys[1]).unwrap();
    let layout = scene.draw_layout();
    assert_eq!(layout[0].instance_count, 2);
    assert_eq!(layout[1].first_instance, 2);

    let (output, per_group) = cull(&scene, &Camera::new());
    assert_eq!(output.counters.visible_instances, 3);
    assert_eq!(per_group, vec![2, 1]);
}

#[test]
fn test_culling_twice_gives_same_total() {
    let mut scene = two_group_scene(3);
    let a = scene.group_id("a").unwrap();
    for i in 0..32 {
        let x = (i as f32 - 16.0) * 2.5;
        scene.add_instance(a, Transform::from_position(Vec3::new(x, 0.0, -6.0))).unwrap();
    }

    let camera = Camera::new();
    let uniforms = upload::frame_uniforms(&camera, scene.total_instance_count(), scene.total_model_count());
    let records = upload::pack_cull_records(&scene);
    let mut draws = upload::pack_draw_commands(&scene.draw_layout());

    let first = cull_on_host(&uniforms, &records, &mut draws);
    clear_instance_counts(&mut draws);
    let second = cull_on_host(&uniforms, &records, &mut draws);
    assert_eq!(first.counters, second.counters);
}

#[test]
fn test_transform_change_reaches_every_slot_once() {
    const RING: usize = 3;
    let mut scene = two_group_scene(RING);
    let a = scene.group_id("a").unwrap();
    scene.add_instance(a, Transform::IDENTITY).unwrap();

    // Drain the initial topology refresh.
    let mut cursor = FrameCursor::new(RING);
    for _ in 0..RING {
        SlotRefresh::plan(&mut scene, cursor.slot());
        cursor.advance();
    }
    assert!(!scene.dirty_state(DirtyKind::Transforms).is_dirty());

    scene
        .set_instance_transform("a", 0, Vec3::new(0.0, 2.0, 0.0), Quat::IDENTITY)
        .unwrap();

    let mut refreshed = Vec::new();
    for _ in 0..RING * 2 {
        let refresh = SlotRefresh::plan(&mut scene, cursor.slot());
        if refresh.transforms {
            assert!(refresh.culling_data);
            assert!(!refresh.draw_commands);
            refreshed.push(cursor.slot());
        }
        cursor.advance();
    }

    refreshed.sort_unstable();
    assert_eq!(refreshed, vec![0, 1, 2]);
    assert!(!scene.dirty_state(DirtyKind::Transforms).is_dirty());
}

#[test]
fn test_packed_transform_expands_to_scale_and_position() {
    let mut scene = two_group_scene(2);
    let a = scene.group_id("a").unwrap();
    let transform = Transform::from_position(Vec3::new(4.0, -2.0, 7.0))
        .with_rotation(Quat::from_rotation_y(0.8))
        .with_scale(Vec3::new(2.0, 3.0, 0.5));
    scene.add_instance(a, transform).unwrap();

    let records = upload::pack_instances(&scene);
    let m = expand_on_host(&records[0]);

    assert!(approx_eq(m.x_axis.truncate().length(), 2.0));
    assert!(approx_eq(m.y_axis.truncate().length(), 3.0));
    assert!(approx_eq(m.z_axis.truncate().length(), 0.5));
    assert_eq!(m.w_axis.truncate(), Vec3::new(4.0, -2.0, 7.0));
}

#[test]
fn test_resize_skips_one_frame_then_renders() {
    let mut health = SwapchainHealth::new(vk::Extent2D { width: 1280, height: 720 });
    let mut cursor = FrameCursor::new(2);

    // Frame 0 renders normally.
    assert_eq!(health.take_pending(), None);
    cursor.advance();

    health.request_resize(1920, 1080);

    // Frame 1 rebuilds and returns without presenting; the cursor still moves.
    let pending = health.take_pending();
    assert_eq!(
        pending,
        Some((vk::Extent2D { width: 1920, height: 1080 }, RebuildReason::Resized))
    );
    cursor.advance();

    // Frame 2 renders at the new size.
    assert_eq!(health.take_pending(), None);
    assert_eq!(health.extent().width, 1920);
    assert_eq!(cursor.slot(), 0);
}

#[test]
fn test_recording_order_rejects_postprocess_before_transition() {
    let mut tracker = StageTracker::default();
    for stage in [
        RecordStage::Begin,
        RecordStage::ClearTransients,
        RecordStage::CullingDispatch,
        RecordStage::OffscreenPass,
    ] {
        tracker.advance(stage).unwrap();
    }
    assert!(tracker.advance(RecordStage::PostprocessPass).is_err());
    assert_eq!(tracker.current(), RecordStage::OffscreenPass);
}
