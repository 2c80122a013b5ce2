//! ringframe demo
//!
//! A grid of cubes and octahedra drawn through the GPU-driven pipeline. The
//! octahedra are moved by a fixed-rate "physics" tick through the scene's
//! `(group name, instance index)` interface.
//!
//! Controls:
//! - Arrow keys / A, D: orbit; W, S or mouse wheel: zoom
//! - 1..9: select a postprocess effect
//! - R: reload the selected effect's shader from disk
//! - Space: pause the physics tick

use std::time::Duration;

use anyhow::{Context, Result};
use glam::{Quat, Vec3};
use tracing::{debug, error, info, warn};
use winit::application::ApplicationHandler;
use winit::event::{MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::PhysicalKey;
use winit::window::WindowId;

use ringframe_core::{FrameClock, PipelineConfig};
use ringframe_platform::{InputState, KeyCode, Window};
use ringframe_renderer::{NoOverlay, Renderer};
use ringframe_scene::{Camera, Mesh, OrbitController, SceneState, Transform};

const GRID_SIZE: i32 = 24;
const GRID_SPACING: f32 = 3.0;
const PHYSICS_STEP: f32 = 1.0 / 60.0;
const STATS_INTERVAL: u64 = 240;
const EXTRA_EFFECTS: [&str; 2] = ["grayscale", "vignette"];

const DIGIT_KEYS: [KeyCode; 9] = [
    KeyCode::Digit1,
    KeyCode::Digit2,
    KeyCode::Digit3,
    KeyCode::Digit4,
    KeyCode::Digit5,
    KeyCode::Digit6,
    KeyCode::Digit7,
    KeyCode::Digit8,
    KeyCode::Digit9,
];

/// Octahedra bobbing above their grid cell.
struct Physics {
    rest: Vec<Vec3>,
    time: f32,
    accumulator: f32,
    paused: bool,
}

impl Physics {
    fn step(&mut self, scene: &mut SceneState, delta: f32) -> Result<()> {
        if self.paused {
            return Ok(());
        }
        self.accumulator += delta.min(0.25);
        while self.accumulator >= PHYSICS_STEP {
            self.accumulator -= PHYSICS_STEP;
            self.time += PHYSICS_STEP;

            for (index, rest) in self.rest.iter().enumerate() {
                let phase = self.time * 2.0 + index as f32 * 0.3;
                let position = *rest + Vec3::Y * phase.sin() * 0.75;
                let rotation = Quat::from_rotation_y(phase * 0.5);
                scene.set_instance_transform("gems", index, position, rotation)?;
            }
        }
        Ok(())
    }
}

fn build_scene(config: &PipelineConfig) -> Result<(SceneState, Physics)> {
    let mut scene = SceneState::new(config.frames_in_flight, config.max_draw_groups);
    let cube = scene.add_mesh(Mesh::cube("cube", 0.6)?);
    let octahedron = scene.add_mesh(Mesh::octahedron("octahedron", 0.8)?);
    let cubes = scene.add_group("cubes", cube)?;
    let gems = scene.add_group("gems", octahedron)?;

    let half = GRID_SIZE as f32 * GRID_SPACING * 0.5;
    let mut rest = Vec::new();
    for z in 0..GRID_SIZE {
        for x in 0..GRID_SIZE {
            let position = Vec3::new(
                x as f32 * GRID_SPACING - half,
                0.0,
                z as f32 * GRID_SPACING - half,
            );
            if (x + z) % 2 == 0 {
                scene.add_instance(cubes, Transform::from_position(position))?;
            } else {
                let lifted = position + Vec3::Y * 1.5;
                scene.add_instance(gems, Transform::from_position(lifted))?;
                rest.push(lifted);
            }
        }
    }

    info!(
        "Demo scene: {} instances in {} groups",
        scene.total_instance_count(),
        scene.total_model_count()
    );
    let physics = Physics {
        rest,
        time: 0.0,
        accumulator: 0.0,
        paused: false,
    };
    Ok((scene, physics))
}

struct App {
    config: PipelineConfig,
    window: Option<Window>,
    renderer: Option<Renderer>,
    scene: SceneState,
    physics: Physics,
    camera: Camera,
    orbit: OrbitController,
    input: InputState,
    clock: FrameClock,
}

impl App {
    fn new(config: PipelineConfig) -> Result<Self> {
        let (scene, physics) = build_scene(&config)?;
        let mut camera = Camera::new();
        camera.set_perspective(60f32.to_radians(), 16.0 / 9.0, 0.1, 500.0);

        Ok(Self {
            config,
            window: None,
            renderer: None,
            scene,
            physics,
            camera,
            orbit: OrbitController::new(Vec3::ZERO, 60.0),
            input: InputState::new(),
            clock: FrameClock::new(),
        })
    }

    fn handle_input(&mut self, delta: f32) {
        let yaw = self.input.axis(KeyCode::ArrowLeft, KeyCode::ArrowRight)
            + self.input.axis(KeyCode::KeyA, KeyCode::KeyD);
        let pitch = self.input.axis(KeyCode::ArrowDown, KeyCode::ArrowUp);
        self.orbit.rotate(yaw * delta * 1.5, pitch * delta);

        let zoom = self.input.axis(KeyCode::KeyS, KeyCode::KeyW) * delta * 30.0
            + self.input.scroll() * 2.0;
        self.orbit.zoom(zoom);

        if self.input.was_pressed(KeyCode::Space) {
            self.physics.paused = !self.physics.paused;
            info!("Physics {}", if self.physics.paused { "paused" } else { "resumed" });
        }

        let Some(renderer) = self.renderer.as_mut() else {
            return;
        };

        if let Some(index) = DIGIT_KEYS.iter().position(|&key| self.input.was_pressed(key)) {
            match renderer.effect_names().get(index) {
                Some(name) => {
                    if let Err(e) = renderer.select_effect(name) {
                        warn!("{}", e);
                    }
                }
                None => debug!("No effect bound to key {}", index + 1),
            }
        }

        if self.input.was_pressed(KeyCode::KeyR)
            && let Some(name) = renderer.selected_effect().map(str::to_string)
            && let Err(e) = renderer.reload_effect(&name)
        {
            warn!("Reload of '{}' failed: {}", name, e);
        }
    }

    fn frame(&mut self, event_loop: &ActiveEventLoop) {
        let delta = self.clock.tick().as_secs_f32();
        self.handle_input(delta);
        self.input.begin_frame();

        if let Err(e) = self.physics.step(&mut self.scene, delta) {
            error!("Physics step failed: {}", e);
            event_loop.exit();
            return;
        }

        let (Some(window), Some(renderer)) = (self.window.as_ref(), self.renderer.as_mut()) else {
            return;
        };
        if window.is_minimized() {
            return;
        }

        self.camera.set_aspect(renderer.aspect_ratio());
        self.orbit.apply(&mut self.camera);

        match renderer.render_frame(&mut self.scene, &self.camera, &mut NoOverlay) {
            Ok(outcome) if !outcome.presented() => debug!("Frame skipped: {:?}", outcome),
            Ok(_) => {}
            Err(e) if e.is_device_fatal() => {
                error!("Device lost: {}", e);
                event_loop.exit();
                return;
            }
            Err(e) => error!("Render error: {}", e),
        }

        if self.clock.frame_count().is_multiple_of(STATS_INTERVAL) {
            let stats = renderer.stats();
            info!(
                "frame {}: {:.1} fps, {} visible, {} draws",
                stats.frame_number,
                self.clock.average_fps(),
                stats.visible_instances,
                stats.draw_count
            );
            window.set_title(&format!("ringframe - {:.0} fps", self.clock.average_fps()));
        }

        if let Some(target) = self.config.target_frame_rate
            && let Some(delay) = self.clock.pacing_delay(target)
        {
            std::thread::sleep(delay);
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window = match Window::new(event_loop, 1280, 720, "ringframe") {
            Ok(window) => window,
            Err(e) => {
                error!("Failed to create window: {}", e);
                event_loop.exit();
                return;
            }
        };

        match Renderer::new(&window, self.config.clone(), &self.scene) {
            Ok(mut renderer) => {
                for effect in EXTRA_EFFECTS {
                    if let Err(e) = renderer.register_effect(effect) {
                        warn!("Effect '{}' unavailable: {}", effect, e);
                    }
                }
                info!("Initialization complete, entering main loop");
                self.renderer = Some(renderer);
                self.window = Some(window);
            }
            Err(e) => {
                error!("Failed to create renderer: {}", e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested, shutting down");
                // Renderer first; it waits for the device before tearing down.
                self.renderer = None;
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let Some(window) = self.window.as_mut() {
                    window.resize(size);
                }
                if let Some(renderer) = self.renderer.as_mut() {
                    renderer.resize(size.width, size.height);
                }
            }
            WindowEvent::RedrawRequested => self.frame(event_loop),
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(key) = event.physical_key {
                    if event.state.is_pressed() {
                        self.input.on_key_pressed(key);
                    } else {
                        self.input.on_key_released(key);
                    }
                }
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let lines = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(p) => p.y as f32 / 40.0,
                };
                self.input.on_scroll(lines);
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
    }
}

fn main() -> Result<()> {
    ringframe_core::init_logging();
    info!("Starting ringframe");

    let config = PipelineConfig::new()
        .with_target_frame_rate(Some(144))
        .with_fence_timeout(Some(Duration::from_secs(5)));
    config.validate().context("invalid pipeline configuration")?;

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config)?;
    event_loop.run_app(&mut app)?;

    Ok(())
}
