// crates/vireo-core/src/transform.rs
//
// Entity transform used by the video batch renderer.

use glam::{Mat4, Quat, Vec3};

/// Translation / rotation / scale of a scene entity.
///
/// Rotation is Euler angles in radians, applied XYZ.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation:    Vec3,
    pub scale:       Vec3,
}

impl Transform {
    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Default::default()
        }
    }

    /// Compose the model matrix.
    pub fn matrix(&self) -> Mat4 {
        let rotation = Quat::from_euler(
            glam::EulerRot::XYZ,
            self.rotation.x,
            self.rotation.y,
            self.rotation.z,
        );
        Mat4::from_scale_rotation_translation(self.scale, rotation, self.translation)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation:    Vec3::ZERO,
            scale:       Vec3::ONE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    #[test]
    fn default_transform_is_identity() {
        assert_eq!(Transform::default().matrix(), Mat4::IDENTITY);
    }

    #[test]
    fn translation_moves_quad_corner() {
        let t = Transform::from_translation(Vec3::new(2.0, 3.0, 0.0));
        let corner = t.matrix() * Vec4::new(-0.5, -0.5, 0.0, 1.0);
        assert_eq!(corner, Vec4::new(1.5, 2.5, 0.0, 1.0));
    }

    #[test]
    fn scale_widens_quad() {
        let t = Transform {
            scale: Vec3::new(4.0, 2.0, 1.0),
            ..Default::default()
        };
        let corner = t.matrix() * Vec4::new(0.5, 0.5, 0.0, 1.0);
        assert_eq!(corner, Vec4::new(2.0, 1.0, 0.0, 1.0));
    }
}
