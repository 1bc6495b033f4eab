//! Flat scene registry and the global uniform block.

use ash::vk;
use glam::{Mat3, Mat4, Vec3, Vec4};
use std::sync::Arc;

use crate::mesh::GpuMesh;

/// Maximum point lights the global UBO carries.
pub const MAX_LIGHTS: usize = 10;

/// Translation, scale, and Tait-Bryan YXZ rotation.
#[derive(Debug, Clone, Copy)]
pub struct Transform {
    pub translation: Vec3,
    pub scale: Vec3,
    pub rotation: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            scale: Vec3::ONE,
            rotation: Vec3::ZERO,
        }
    }
}

impl Transform {
    /// Model matrix: translate * rotate(YXZ) * scale.
    pub fn matrix(&self) -> Mat4 {
        let rotation = Mat4::from_rotation_y(self.rotation.y)
            * Mat4::from_rotation_x(self.rotation.x)
            * Mat4::from_rotation_z(self.rotation.z);
        Mat4::from_translation(self.translation) * rotation * Mat4::from_scale(self.scale)
    }

    /// Inverse-transpose rotation/scale block for transforming normals.
    pub fn normal_matrix(&self) -> Mat3 {
        let rotation = Mat3::from_rotation_y(self.rotation.y)
            * Mat3::from_rotation_x(self.rotation.x)
            * Mat3::from_rotation_z(self.rotation.z);
        let inv_scale = Mat3::from_diagonal(Vec3::ONE / self.scale);
        rotation * inv_scale
    }
}

/// Point light attached to a game object.
#[derive(Debug, Clone, Copy)]
pub struct PointLightComponent {
    pub intensity: f32,
    pub radius: f32,
    pub color: Vec3,
}

/// One scene entry: a transform plus optional mesh, texture, light, or
/// water-surface tag. Systems iterate the registry and pick what they
/// draw.
pub struct GameObject {
    id: u32,
    pub transform: Transform,
    pub mesh: Option<Arc<GpuMesh>>,
    /// Material descriptor set (combined image sampler) for textured
    /// meshes.
    pub texture_set: Option<vk::DescriptorSet>,
    pub point_light: Option<PointLightComponent>,
    /// Drawn by the water system instead of the mesh system.
    pub water: bool,
}

impl GameObject {
    /// Stable scene-local identifier.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Helper for a bare point light.
    pub fn point_light(intensity: f32, radius: f32, color: Vec3) -> GameObjectBuilder {
        GameObjectBuilder::default().light(intensity, radius, color)
    }
}

/// Builder for scene entries.
#[derive(Default)]
pub struct GameObjectBuilder {
    transform: Transform,
    mesh: Option<Arc<GpuMesh>>,
    texture_set: Option<vk::DescriptorSet>,
    point_light: Option<PointLightComponent>,
    water: bool,
}

impl GameObjectBuilder {
    pub fn transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn mesh(mut self, mesh: Arc<GpuMesh>) -> Self {
        self.mesh = Some(mesh);
        self
    }

    pub fn texture_set(mut self, set: vk::DescriptorSet) -> Self {
        self.texture_set = Some(set);
        self
    }

    pub fn light(mut self, intensity: f32, radius: f32, color: Vec3) -> Self {
        self.point_light = Some(PointLightComponent {
            intensity,
            radius,
            color,
        });
        self
    }

    pub fn water(mut self) -> Self {
        self.water = true;
        self
    }
}

/// Flat registry of game objects.
#[derive(Default)]
pub struct Scene {
    objects: Vec<GameObject>,
    next_id: u32,
}

impl Scene {
    /// Create an empty scene.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an object, returning its id.
    pub fn spawn(&mut self, builder: GameObjectBuilder) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        self.objects.push(GameObject {
            id,
            transform: builder.transform,
            mesh: builder.mesh,
            texture_set: builder.texture_set,
            point_light: builder.point_light,
            water: builder.water,
        });
        id
    }

    /// Iterate all objects.
    pub fn iter(&self) -> impl Iterator<Item = &GameObject> {
        self.objects.iter()
    }

    /// Iterate all objects mutably.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut GameObject> {
        self.objects.iter_mut()
    }

    /// Number of objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether the scene is empty.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

/// One light slot of the global UBO.
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PointLight {
    /// World position; w ignored.
    pub position: [f32; 4],
    /// Color; w is intensity.
    pub color: [f32; 4],
}

/// Global per-frame uniform block, written once per frame slot.
///
/// Layout must match the shader's global uniform block (std140).
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GlobalUbo {
    pub projection: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub inverse_view: [[f32; 4]; 4],
    pub sun_direction: [f32; 4],
    /// RGB color; w is ambient intensity.
    pub ambient_light_color: [f32; 4],
    pub point_lights: [PointLight; MAX_LIGHTS],
    pub num_lights: u32,
    pub _padding: [u32; 3],
}

impl Default for GlobalUbo {
    fn default() -> Self {
        Self {
            projection: Mat4::IDENTITY.to_cols_array_2d(),
            view: Mat4::IDENTITY.to_cols_array_2d(),
            inverse_view: Mat4::IDENTITY.to_cols_array_2d(),
            sun_direction: [0.0, -1.0, 0.0, 1.0],
            ambient_light_color: [1.0, 1.0, 1.0, 0.02],
            point_lights: [PointLight {
                position: [0.0; 4],
                color: [0.0; 4],
            }; MAX_LIGHTS],
            num_lights: 0,
            _padding: [0; 3],
        }
    }
}

impl GlobalUbo {
    /// Size in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Fill the camera matrices.
    pub fn set_camera(&mut self, camera: &crate::Camera) {
        self.projection = camera.projection().to_cols_array_2d();
        self.view = camera.view().to_cols_array_2d();
        self.inverse_view = camera.inverse_view().to_cols_array_2d();
    }

    /// Fill the light array from the scene, rotating nothing: slots are
    /// assigned in registry order, excess lights are dropped.
    pub fn set_lights(&mut self, scene: &Scene) {
        let mut count = 0;
        for object in scene.iter() {
            let Some(light) = object.point_light else {
                continue;
            };
            if count >= MAX_LIGHTS {
                tracing::warn!("Scene has more than {} point lights; extra dropped", MAX_LIGHTS);
                break;
            }
            let p = object.transform.translation;
            self.point_lights[count] = PointLight {
                position: [p.x, p.y, p.z, 1.0],
                color: [light.color.x, light.color.y, light.color.z, light.intensity],
            };
            count += 1;
        }
        self.num_lights = count as u32;
    }
}

/// Push constants of the mesh pipelines.
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MeshPush {
    pub model: [[f32; 4]; 4],
    pub normal: [[f32; 4]; 4],
}

impl MeshPush {
    /// Build from a transform; the normal matrix is padded to 4x4 for
    /// std430 alignment.
    pub fn from_transform(transform: &Transform) -> Self {
        let normal3 = transform.normal_matrix();
        Self {
            model: transform.matrix().to_cols_array_2d(),
            normal: Mat4::from_mat3(normal3).to_cols_array_2d(),
        }
    }
}

/// Push constants of the point light billboard pipeline.
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightPush {
    pub position: Vec4,
    pub color: Vec4,
    pub radius: f32,
    pub _padding: [f32; 3],
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn ubo_layout_matches_shader_block() {
        assert_eq!(std::mem::offset_of!(GlobalUbo, projection), 0);
        assert_eq!(std::mem::offset_of!(GlobalUbo, view), 64);
        assert_eq!(std::mem::offset_of!(GlobalUbo, inverse_view), 128);
        assert_eq!(std::mem::offset_of!(GlobalUbo, sun_direction), 192);
        assert_eq!(std::mem::offset_of!(GlobalUbo, ambient_light_color), 208);
        assert_eq!(std::mem::offset_of!(GlobalUbo, point_lights), 224);
        assert_eq!(std::mem::offset_of!(GlobalUbo, num_lights), 224 + 32 * MAX_LIGHTS);
        assert_eq!(GlobalUbo::SIZE, 224 + 32 * MAX_LIGHTS + 16);
    }

    #[test]
    fn lights_fill_in_registry_order_and_cap() {
        let mut scene = Scene::new();
        for i in 0..MAX_LIGHTS + 2 {
            let mut builder = GameObject::point_light(0.5, 0.1, Vec3::ONE);
            builder = builder.transform(Transform {
                translation: Vec3::new(i as f32, 0.0, 0.0),
                ..Default::default()
            });
            scene.spawn(builder);
        }

        let mut ubo = GlobalUbo::default();
        ubo.set_lights(&scene);
        assert_eq!(ubo.num_lights as usize, MAX_LIGHTS);
        assert_relative_eq!(ubo.point_lights[3].position[0], 3.0);
        assert_relative_eq!(ubo.point_lights[0].color[3], 0.5);
    }

    #[test]
    fn spawn_assigns_unique_ids() {
        let mut scene = Scene::new();
        let a = scene.spawn(GameObjectBuilder::default());
        let b = scene.spawn(GameObjectBuilder::default());
        assert_ne!(a, b);
        assert_eq!(scene.len(), 2);
    }

    #[test]
    fn two_element_scene_yields_one_mesh_draw_and_one_light_draw() {
        // The draw systems iterate the registry: textured non-water
        // meshes get one draw each, lights one billboard each.
        let mut scene = Scene::new();
        scene.spawn(
            GameObjectBuilder::default()
                .mesh(Arc::new(crate::mesh::null_mesh()))
                .texture_set(vk::DescriptorSet::null()),
        );
        scene.spawn(GameObject::point_light(1.0, 0.1, Vec3::ONE));

        let mesh_draws = scene
            .iter()
            .filter(|o| !o.water && o.mesh.is_some() && o.texture_set.is_some())
            .count();
        let light_draws = scene.iter().filter(|o| o.point_light.is_some()).count();
        let water_draws = scene
            .iter()
            .filter(|o| o.water && o.mesh.is_some())
            .count();

        assert_eq!(mesh_draws, 1);
        assert_eq!(light_draws, 1);
        assert_eq!(water_draws, 0);
    }

    #[test]
    fn transform_normal_matrix_undoes_nonuniform_scale() {
        let t = Transform {
            scale: Vec3::new(2.0, 1.0, 0.5),
            ..Default::default()
        };
        let n = t.normal_matrix();
        // Normal of a plane with x-normal keeps direction under the
        // inverse-scale transform.
        let transformed = n * Vec3::X;
        assert_relative_eq!(transformed.x, 0.5);
        assert_relative_eq!(transformed.y, 0.0);
        assert_relative_eq!(transformed.z, 0.0);
    }
}
