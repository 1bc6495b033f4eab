//! Keyboard camera control.

use glam::Vec3;
use mareld_render::Transform;
use std::collections::HashSet;
use winit::event::{ElementState, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

/// WASD + QE movement and arrow-key look, applied to a viewer transform.
pub struct KeyboardController {
    pressed: HashSet<KeyCode>,
    pub move_speed: f32,
    pub look_speed: f32,
}

impl Default for KeyboardController {
    fn default() -> Self {
        Self {
            pressed: HashSet::new(),
            move_speed: 3.0,
            look_speed: 1.5,
        }
    }
}

impl KeyboardController {
    /// Create with default speeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Track key state. Returns true when the event was a key event.
    pub fn on_event(&mut self, event: &WindowEvent) -> bool {
        if let WindowEvent::KeyboardInput { event, .. } = event {
            if let PhysicalKey::Code(code) = event.physical_key {
                match event.state {
                    ElementState::Pressed => {
                        self.pressed.insert(code);
                    }
                    ElementState::Released => {
                        self.pressed.remove(&code);
                    }
                }
                return true;
            }
        }
        false
    }

    /// Whether a key is currently held.
    pub fn is_pressed(&self, code: KeyCode) -> bool {
        self.pressed.contains(&code)
    }

    /// Rotate with the arrow keys and translate in the facing XZ plane
    /// with WASD, vertically with Q/E.
    pub fn move_in_plane_xz(&self, dt: f32, transform: &mut Transform) {
        let mut rotate = Vec3::ZERO;
        if self.is_pressed(KeyCode::ArrowRight) {
            rotate.y += 1.0;
        }
        if self.is_pressed(KeyCode::ArrowLeft) {
            rotate.y -= 1.0;
        }
        if self.is_pressed(KeyCode::ArrowUp) {
            rotate.x += 1.0;
        }
        if self.is_pressed(KeyCode::ArrowDown) {
            rotate.x -= 1.0;
        }

        if rotate.length_squared() > f32::EPSILON {
            transform.rotation += self.look_speed * dt * rotate.normalize();
        }
        // Keep pitch out of gimbal territory and yaw bounded.
        transform.rotation.x = transform.rotation.x.clamp(-1.5, 1.5);
        transform.rotation.y %= std::f32::consts::TAU;

        let yaw = transform.rotation.y;
        let forward = Vec3::new(yaw.sin(), 0.0, yaw.cos());
        let right = Vec3::new(forward.z, 0.0, -forward.x);
        let up = Vec3::NEG_Y;

        let mut movement = Vec3::ZERO;
        if self.is_pressed(KeyCode::KeyW) {
            movement += forward;
        }
        if self.is_pressed(KeyCode::KeyS) {
            movement -= forward;
        }
        if self.is_pressed(KeyCode::KeyD) {
            movement += right;
        }
        if self.is_pressed(KeyCode::KeyA) {
            movement -= right;
        }
        if self.is_pressed(KeyCode::KeyE) {
            movement += up;
        }
        if self.is_pressed(KeyCode::KeyQ) {
            movement -= up;
        }

        if movement.length_squared() > f32::EPSILON {
            transform.translation += self.move_speed * dt * movement.normalize();
        }
    }
}
