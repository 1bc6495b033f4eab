//! Camera and view management.

use glam::{Mat3, Mat4, Vec3, Vec4};

/// Camera holding explicit view and projection matrices.
///
/// Matrices are set by the application each frame from the controlled
/// viewer transform; the renderer only reads them into the global UBO.
#[derive(Debug, Clone)]
pub struct Camera {
    projection: Mat4,
    view: Mat4,
    inverse_view: Mat4,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            projection: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
            inverse_view: Mat4::IDENTITY,
        }
    }
}

impl Camera {
    /// Set a right-handed perspective projection with depth in [0, 1].
    pub fn set_perspective(&mut self, fov_y: f32, aspect: f32, near: f32, far: f32) {
        self.projection = Mat4::perspective_rh(fov_y, aspect, near, far);
    }

    /// Set the view from a position and Tait-Bryan YXZ rotation, the
    /// convention the keyboard controller produces.
    pub fn set_view_yxz(&mut self, position: Vec3, rotation: Vec3) {
        let rot = Mat3::from_rotation_y(rotation.y)
            * Mat3::from_rotation_x(rotation.x)
            * Mat3::from_rotation_z(rotation.z);

        // Columns of rot are the camera basis vectors in world space.
        let u = rot.col(0);
        let v = rot.col(1);
        let w = rot.col(2);

        self.view = Mat4::from_cols(
            Vec4::new(u.x, v.x, w.x, 0.0),
            Vec4::new(u.y, v.y, w.y, 0.0),
            Vec4::new(u.z, v.z, w.z, 0.0),
            Vec4::new(-u.dot(position), -v.dot(position), -w.dot(position), 1.0),
        );

        self.inverse_view = Mat4::from_cols(
            Vec4::new(u.x, u.y, u.z, 0.0),
            Vec4::new(v.x, v.y, v.z, 0.0),
            Vec4::new(w.x, w.y, w.z, 0.0),
            position.extend(1.0),
        );
    }

    /// Set the view to look from `position` toward `target`.
    pub fn set_view_target(&mut self, position: Vec3, target: Vec3, up: Vec3) {
        self.view = Mat4::look_at_rh(position, target, up);
        self.inverse_view = self.view.inverse();
    }

    /// Projection matrix.
    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    /// View matrix.
    pub fn view(&self) -> Mat4 {
        self.view
    }

    /// Inverse view matrix (camera-to-world).
    pub fn inverse_view(&self) -> Mat4 {
        self.inverse_view
    }

    /// Camera position in world space.
    pub fn position(&self) -> Vec3 {
        self.inverse_view.col(3).truncate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn view_and_inverse_compose_to_identity() {
        let mut camera = Camera::default();
        camera.set_view_yxz(Vec3::new(1.0, -2.0, 3.0), Vec3::new(0.3, 1.2, -0.4));

        let product = camera.view() * camera.inverse_view();
        for col in 0..4 {
            for row in 0..4 {
                let expected = if col == row { 1.0 } else { 0.0 };
                assert_relative_eq!(product.col(col)[row], expected, epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn identity_rotation_views_down_negative_translation() {
        let mut camera = Camera::default();
        let pos = Vec3::new(0.0, 1.0, 5.0);
        camera.set_view_yxz(pos, Vec3::ZERO);

        // A point at the camera position maps to the view-space origin.
        let mapped = camera.view() * pos.extend(1.0);
        assert_relative_eq!(mapped.x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(mapped.y, 0.0, epsilon = 1e-6);
        assert_relative_eq!(mapped.z, 0.0, epsilon = 1e-6);

        assert_relative_eq!(camera.position().x, pos.x);
        assert_relative_eq!(camera.position().z, pos.z);
    }
}
