//! Demo application: scene setup and per-frame recording.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use ash::vk;
use glam::Vec3;

use mareld_app::{Engine, KeyboardController, MareldApp};
use mareld_assets::{load_float_table, load_rgba8, MeshData};
use mareld_gpu::descriptors::{
    write_combined_image_sampler, write_uniform_buffer, DescriptorPool,
};
use mareld_gpu::memory::GpuBuffer;
use mareld_gpu::texture::Texture;
use mareld_ocean::OceanGenerator;
use mareld_render::renderer::FrameHandles;
use mareld_render::scene::GameObjectBuilder;
use mareld_render::systems::{
    MeshRenderSystem, PointLightSystem, SunRenderSystem, WaterRenderSystem,
};
use mareld_render::{Camera, FrameContext, GlobalUbo, GpuMesh, RenderSystem, Scene, Transform};
use winit::event::WindowEvent;

use crate::effects::DepthFogEffect;

use gpu_allocator::MemoryLocation;

const FOG_DENSITY: f32 = 0.12;

/// The demo scene: a textured buoy over a three-band ocean, ringed by
/// point lights, with depth fog in the post chain.
pub struct OceanViewer {
    scene: Scene,
    camera: Camera,
    viewer_transform: Transform,
    controller: KeyboardController,

    global_pool: DescriptorPool,
    ubo_buffers: Vec<GpuBuffer>,
    global_sets: Vec<vk::DescriptorSet>,

    material_pool: DescriptorPool,
    textures: Vec<Texture>,
    meshes: Vec<Arc<GpuMesh>>,

    mesh_system: MeshRenderSystem,
    light_system: PointLightSystem,
    water_system: WaterRenderSystem,
    sun_system: SunRenderSystem,
}

impl OceanViewer {
    fn shader_dir() -> PathBuf {
        PathBuf::from("shaders")
    }

    fn asset_dir() -> PathBuf {
        PathBuf::from("assets")
    }

    fn create_global_sets(
        engine: &Engine,
        frames: usize,
    ) -> anyhow::Result<(DescriptorPool, Vec<GpuBuffer>, Vec<vk::DescriptorSet>)> {
        let device = engine.gpu.device();

        let pool_sizes = [vk::DescriptorPoolSize::default()
            .ty(vk::DescriptorType::UNIFORM_BUFFER)
            .descriptor_count(frames as u32)];
        let pool = unsafe { DescriptorPool::new(device, frames as u32, &pool_sizes)? };

        let mut buffers = Vec::with_capacity(frames);
        let mut sets = Vec::with_capacity(frames);
        for frame in 0..frames {
            let buffer = engine.gpu.allocator().lock().create_buffer(
                GlobalUbo::SIZE as u64,
                vk::BufferUsageFlags::UNIFORM_BUFFER,
                MemoryLocation::CpuToGpu,
                &format!("global_ubo_{frame}"),
            )?;

            let set = unsafe { pool.allocate(device, &[engine.layouts.global])?[0] };
            unsafe {
                write_uniform_buffer(device, set, 0, buffer.buffer, 0, GlobalUbo::SIZE as u64);
            }

            buffers.push(buffer);
            sets.push(set);
        }

        Ok((pool, buffers, sets))
    }

    fn load_texture(
        engine: &Engine,
        pool: &DescriptorPool,
        path: &Path,
    ) -> anyhow::Result<(Texture, vk::DescriptorSet)> {
        let image = load_rgba8(path)?;
        let texture = Texture::sampled_with_data(
            &engine.gpu,
            engine.renderer.command_pool(),
            image.width,
            image.height,
            vk::Format::R8G8B8A8_SRGB,
            &image.pixels,
            &path.display().to_string(),
        )?;

        let device = engine.gpu.device();
        let set = unsafe { pool.allocate(device, &[engine.layouts.material])?[0] };
        unsafe {
            write_combined_image_sampler(
                device,
                set,
                0,
                texture.sampler(),
                texture.view(),
                texture.layout(),
            );
        }

        Ok((texture, set))
    }
}

impl MareldApp for OceanViewer {
    fn init(engine: &mut Engine) -> anyhow::Result<Self> {
        let shader_dir = Self::shader_dir();
        let asset_dir = Self::asset_dir();
        let frames = engine.renderer.frames_in_flight();

        let (global_pool, ubo_buffers, global_sets) = Self::create_global_sets(engine, frames)?;

        // Materials.
        let material_sizes = [vk::DescriptorPoolSize::default()
            .ty(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .descriptor_count(2)];
        let material_pool =
            unsafe { DescriptorPool::new(engine.gpu.device(), 2, &material_sizes)? };

        let mut textures = Vec::new();
        let mut meshes = Vec::new();
        let mut scene = Scene::new();

        // The buoy, bobbing above the surface.
        let buoy_data = MeshData::load_obj(asset_dir.join("models/buoy.obj"))
            .context("loading buoy mesh")?;
        let buoy_mesh = Arc::new(GpuMesh::upload(&engine.gpu, &buoy_data, "buoy")?);
        let (buoy_texture, buoy_set) =
            Self::load_texture(engine, &material_pool, &asset_dir.join("textures/buoy.png"))?;
        textures.push(buoy_texture);
        meshes.push(buoy_mesh.clone());

        scene.spawn(
            GameObjectBuilder::default()
                .transform(Transform {
                    translation: Vec3::new(0.0, -0.4, 2.5),
                    scale: Vec3::splat(0.4),
                    ..Default::default()
                })
                .mesh(buoy_mesh)
                .texture_set(buoy_set),
        );

        // The ocean surface grid.
        let water_mesh = Arc::new(GpuMesh::upload(
            &engine.gpu,
            &MeshData::plane(60.0, 255),
            "water_grid",
        )?);
        meshes.push(water_mesh.clone());
        scene.spawn(
            GameObjectBuilder::default()
                .transform(Transform {
                    translation: Vec3::new(0.0, 0.3, 0.0),
                    ..Default::default()
                })
                .mesh(water_mesh)
                .water(),
        );

        // A ring of point lights.
        let light_count = 6;
        for i in 0..light_count {
            let angle = i as f32 * std::f32::consts::TAU / light_count as f32;
            scene.spawn(
                GameObjectBuilder::default()
                    .transform(Transform {
                        translation: Vec3::new(angle.cos() * 3.0, -1.2, angle.sin() * 3.0 + 2.5),
                        ..Default::default()
                    })
                    .light(0.6, 0.1, Vec3::ONE),
            );
        }

        // The ocean simulation, fed by the precomputed noise table.
        let noise = load_float_table(asset_dir.join("tables/noise.csv"))?;
        anyhow::ensure!(
            noise.len() == OceanGenerator::noise_len(),
            "noise table holds {} floats, expected {}",
            noise.len(),
            OceanGenerator::noise_len()
        );

        let generator = OceanGenerator::new(
            &engine.gpu,
            engine.renderer.command_pool(),
            &shader_dir,
            &noise,
            frames,
        )?;

        let color_format = engine.renderer.color_format();
        let depth_format = engine.renderer.depth_format();

        let mesh_system = MeshRenderSystem::new(
            &engine.gpu,
            &engine.layouts,
            &shader_dir,
            color_format,
            depth_format,
        )?;
        let light_system = PointLightSystem::new(
            &engine.gpu,
            &engine.layouts,
            &shader_dir,
            color_format,
            depth_format,
        )?;
        let water_system = WaterRenderSystem::new(
            &engine.gpu,
            &engine.layouts,
            &shader_dir,
            color_format,
            depth_format,
            &generator,
            frames,
        )?;
        let sun_system = SunRenderSystem::new(
            &engine.gpu,
            &engine.layouts,
            &shader_dir,
            color_format,
            depth_format,
        )?;

        engine.renderer.add_pre_effect(Box::new(generator));
        engine.renderer.add_post_effect(Box::new(DepthFogEffect::new(
            &engine.gpu,
            &engine.layouts,
            &shader_dir,
            FOG_DENSITY,
        )?));

        let mut camera = Camera::default();
        camera.set_view_target(
            Vec3::new(-1.0, -2.0, -2.5),
            Vec3::new(0.0, 0.0, 2.5),
            Vec3::NEG_Y,
        );

        let viewer_transform = Transform {
            translation: Vec3::new(0.0, -1.5, -2.5),
            ..Default::default()
        };

        tracing::info!("Scene ready: {} objects", scene.len());

        Ok(Self {
            scene,
            camera,
            viewer_transform,
            controller: KeyboardController::new(),
            global_pool,
            ubo_buffers,
            global_sets,
            material_pool,
            textures,
            meshes,
            mesh_system,
            light_system,
            water_system,
            sun_system,
        })
    }

    fn on_event(&mut self, event: &WindowEvent) -> bool {
        self.controller.on_event(event)
    }

    fn update(&mut self, engine: &Engine, dt: f32) {
        self.controller
            .move_in_plane_xz(dt, &mut self.viewer_transform);
        self.camera.set_view_yxz(
            self.viewer_transform.translation,
            self.viewer_transform.rotation,
        );
        self.camera
            .set_perspective(80f32.to_radians(), engine.aspect_ratio(), 0.1, 100.0);
    }

    fn prepare_frame(&mut self, _engine: &Engine, frame: &FrameHandles, _dt: f32) {
        let mut ubo = GlobalUbo::default();
        ubo.set_camera(&self.camera);
        PointLightSystem::update(&self.scene, &mut ubo);

        if let Err(e) = self.ubo_buffers[frame.frame_index].write(std::slice::from_ref(&ubo)) {
            tracing::error!("Failed to write global UBO: {e}");
        }
    }

    fn camera(&self) -> &Camera {
        &self.camera
    }

    fn scene(&self) -> &Scene {
        &self.scene
    }

    fn global_set(&self, frame_index: usize) -> vk::DescriptorSet {
        self.global_sets[frame_index]
    }

    fn render_main(&self, device: &ash::Device, ctx: &FrameContext<'_>) {
        // Opaque geometry first, then the water surface, then the
        // blended passes.
        self.mesh_system.render(device, ctx);
        self.water_system.render(device, ctx);
        self.sun_system.render(device, ctx);
        self.light_system.render(device, ctx);
    }

    fn cleanup(&mut self, engine: &Engine) {
        // Drop scene references so the meshes are uniquely held.
        self.scene = Scene::new();

        unsafe {
            self.mesh_system.destroy(&engine.gpu);
            self.light_system.destroy(&engine.gpu);
            self.water_system.destroy(&engine.gpu);
            self.sun_system.destroy(&engine.gpu);

            for mesh in &mut self.meshes {
                match Arc::get_mut(mesh) {
                    Some(mesh) => mesh.destroy(&engine.gpu),
                    None => tracing::warn!("Mesh still shared at cleanup; leaking"),
                }
            }
            self.meshes.clear();

            for texture in &mut self.textures {
                texture.destroy(&engine.gpu);
            }
            self.textures.clear();

            let device = engine.gpu.device();
            self.material_pool.destroy(device);
            self.global_pool.destroy(device);

            let mut allocator = engine.gpu.allocator().lock();
            for buffer in &mut self.ubo_buffers {
                let _ = allocator.free_buffer(buffer);
            }
            self.ubo_buffers.clear();
        }
    }
}
