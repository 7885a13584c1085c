use nalgebra::{Matrix4, Vector2, Vector3};

/// A unit quad in the XY plane; every drawn object is this quad scaled and
/// moved into place by its model matrix.
pub const QUAD_VERTICES: [[f32; 3]; 4] = [
    [0.0, 0.0, 0.0],
    [1.0, 0.0, 0.0],
    [0.0, 1.0, 0.0],
    [1.0, 1.0, 0.0],
];
pub const QUAD_INDICES: [u32; 6] = [0, 1, 2, 2, 1, 3];

/// Uniform block at set 0, binding 0.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CameraUniform {
    pub proj: Matrix4<f32>,
    pub view: Matrix4<f32>,
}

/// Uniform block at set 1, binding 1.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ModelUniform {
    pub model: Matrix4<f32>,
}

impl Default for ModelUniform {
    fn default() -> Self {
        ModelUniform {
            model: Matrix4::identity(),
        }
    }
}

impl CameraUniform {
    /// Pixel coordinates with the origin in the top-left corner.
    pub fn orthographic(width: u32, height: u32) -> CameraUniform {
        CameraUniform {
            proj: Matrix4::new_orthographic(0.0, width as f32, 0.0, height as f32, -1.0, 1.0),
            view: Matrix4::identity(),
        }
    }
}

impl ModelUniform {
    pub fn new(position: Vector2<f32>, size: Vector2<f32>) -> ModelUniform {
        let translation = Matrix4::new_translation(&Vector3::new(position.x, position.y, 0.0));
        let scale = Matrix4::new_nonuniform_scaling(&Vector3::new(size.x, size.y, 0.0));
        ModelUniform {
            model: translation * scale,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Point3, Vector4};

    #[test]
    fn model_maps_unit_quad_onto_rect() {
        let model = ModelUniform::new(Vector2::new(4.0, 208.0), Vector2::new(8.0, 64.0)).model;

        let origin = model.transform_point(&Point3::new(0.0, 0.0, 0.0));
        let corner = model.transform_point(&Point3::new(1.0, 1.0, 0.0));
        assert_relative_eq!(origin, Point3::new(4.0, 208.0, 0.0));
        assert_relative_eq!(corner, Point3::new(12.0, 272.0, 0.0));
    }

    #[test]
    fn camera_maps_screen_to_clip_space() {
        let camera = CameraUniform::orthographic(640, 480);
        let clip = |x: f32, y: f32| camera.proj * camera.view * Vector4::new(x, y, 0.0, 1.0);

        assert_relative_eq!(clip(0.0, 0.0), Vector4::new(-1.0, -1.0, 0.0, 1.0));
        assert_relative_eq!(clip(640.0, 480.0), Vector4::new(1.0, 1.0, 0.0, 1.0));
        assert_relative_eq!(clip(320.0, 240.0), Vector4::new(0.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn uniform_layouts_match_shader_blocks() {
        assert_eq!(std::mem::size_of::<CameraUniform>(), 128);
        assert_eq!(std::mem::size_of::<ModelUniform>(), 64);
    }
}
