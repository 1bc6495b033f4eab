//! GPU integration tests for the wave band dispatch graph.
//!
//! These need a Vulkan 1.3 device plus the compiled ocean shaders;
//! point `MARELD_SHADER_DIR` at the SPIR-V directory before running.

use ash::vk;
use mareld_gpu::command::CommandPool;
use mareld_gpu::GpuContextBuilder;
use mareld_ocean::{BandParams, OceanGenerator, WaveBand, RESOLUTION};
use std::path::PathBuf;

fn shader_dir() -> PathBuf {
    std::env::var_os("MARELD_SHADER_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("shaders"))
}

fn flat_noise() -> Vec<f32> {
    vec![0.5; (RESOLUTION * RESOLUTION * 2) as usize]
}

#[test]
#[ignore = "Requires GPU hardware"]
fn band_records_and_executes_one_frame() {
    let gpu = GpuContextBuilder::new()
        .app_name("mareld-ocean-test")
        .validation(true)
        .build()
        .unwrap();
    let pool = unsafe {
        CommandPool::new(
            gpu.device(),
            gpu.graphics_queue_family(),
            vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
        )
        .unwrap()
    };

    let params = BandParams::cascade()[0];
    let mut band = WaveBand::new(&gpu, &pool, &shader_dir(), params, &flat_noise(), 2).unwrap();

    let device = gpu.device();
    unsafe {
        let cmd = pool.allocate(device, 1).unwrap()[0];
        mareld_gpu::command::begin_one_time(device, cmd).unwrap();
        band.record(device, cmd, 0, 0.016, 0.016, true).unwrap();
        device.end_command_buffer(cmd).unwrap();

        mareld_gpu::command::submit(
            device,
            gpu.graphics_queue(),
            cmd,
            &[],
            &[],
            &[],
            vk::Fence::null(),
        )
        .unwrap();
        device.queue_wait_idle(gpu.graphics_queue()).unwrap();

        band.destroy(&gpu);
        pool.destroy(device);
    }
}

#[test]
#[ignore = "Requires GPU hardware"]
fn generator_alternates_frame_slots_without_validation_errors() {
    // Five frames across two slots: with validation layers on, any
    // missing barrier or layout mismatch in the graph fails the test.
    let gpu = GpuContextBuilder::new()
        .app_name("mareld-ocean-test")
        .validation(true)
        .build()
        .unwrap();
    let pool = unsafe {
        CommandPool::new(
            gpu.device(),
            gpu.graphics_queue_family(),
            vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
        )
        .unwrap()
    };

    let frames_in_flight = 2;
    let mut generator = OceanGenerator::new(
        &gpu,
        &pool,
        &shader_dir(),
        &flat_noise(),
        frames_in_flight,
    )
    .unwrap();

    let device = gpu.device();
    unsafe {
        for frame in 0..5usize {
            let slot = frame % frames_in_flight;
            let cmd = pool.allocate(device, 1).unwrap()[0];
            mareld_gpu::command::begin_one_time(device, cmd).unwrap();
            generator.record(device, cmd, slot, 0.016).unwrap();
            device.end_command_buffer(cmd).unwrap();

            mareld_gpu::command::submit(
                device,
                gpu.graphics_queue(),
                cmd,
                &[],
                &[],
                &[],
                vk::Fence::null(),
            )
            .unwrap();
            device.queue_wait_idle(gpu.graphics_queue()).unwrap();
            device.free_command_buffers(pool.handle(), &[cmd]);
        }

        generator.destroy(&gpu);
        pool.destroy(device);
    }
}
