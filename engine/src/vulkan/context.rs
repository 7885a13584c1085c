use log::*;
use std::mem::{size_of, size_of_val};
use vulkanalia::prelude::v1_0::*;
use vulkanalia::vk::Handle;
use vulkanalia::vk::KhrSwapchainExtension;
use winit::window::Window;

use super::buffer::BufferPool;
use super::command_buffer::{DrawList, VulkanCommandBuffers, VulkanCommandPool};
use super::descriptor::VulkanDescriptors;
use super::device::VulkanDevice;
use super::error::{RenderError, RenderResult, VkResultExt};
use super::framebuffer::VulkanFramebuffers;
use super::instance::VulkanInstance;
use super::pipeline::VulkanPipeline;
use super::render_pass::VulkanRenderPass;
use super::swapchain::VulkanSwapchain;
use super::sync::{Acquire, FrameDriver, FrameStatus, FrameSync, SyncObjects};
use crate::scene::{CameraUniform, ModelUniform, QUAD_INDICES, QUAD_VERTICES};

/// Everything that depends on the swapchain and is rebuilt with it.
/// Fields drop top to bottom.
struct Presentation {
    sync: SyncObjects,
    command_buffers: VulkanCommandBuffers,
    framebuffers: VulkanFramebuffers,
    pipeline: VulkanPipeline,
    render_pass: VulkanRenderPass,
    swapchain: VulkanSwapchain,
}

impl Presentation {
    unsafe fn new(
        instance: &VulkanInstance,
        device: &VulkanDevice,
        resources: &Resources,
        window_size: (u32, u32),
        old_swapchain: vk::SwapchainKHR,
    ) -> RenderResult<Presentation> {
        let vk_device = &device.vk_device;

        let swapchain = VulkanSwapchain::new(instance, device, window_size, old_swapchain)?;
        let render_pass = VulkanRenderPass::new(vk_device, swapchain.format)?;
        let pipeline = VulkanPipeline::new(
            vk_device,
            render_pass.render_pass,
            swapchain.extent,
            &resources.descriptors.layouts(),
        )?;
        let framebuffers = VulkanFramebuffers::new(
            vk_device,
            render_pass.render_pass,
            &swapchain.image_views,
            swapchain.extent,
        )?;

        let draws = DrawList {
            vertex_buffer: resources.geometry.buffer(0),
            index_buffer: resources.geometry.buffer(1),
            index_count: QUAD_INDICES.len() as u32,
            camera_set: resources.descriptors.camera_set,
            object_sets: &resources.descriptors.model_sets,
        };
        let command_buffers = VulkanCommandBuffers::record(
            vk_device,
            &resources.command_pool,
            render_pass.render_pass,
            &framebuffers.framebuffers,
            swapchain.extent,
            pipeline.pipeline,
            pipeline.pipeline_layout,
            &draws,
        )?;

        let sync = SyncObjects::new(vk_device, swapchain.image_count())?;

        Ok(Presentation {
            sync,
            command_buffers,
            framebuffers,
            pipeline,
            render_pass,
            swapchain,
        })
    }
}

/// Buffers and descriptors that outlive swapchain recreation.
struct Resources {
    descriptors: VulkanDescriptors,
    geometry: BufferPool,
    camera: BufferPool,
    models: BufferPool,
    command_pool: VulkanCommandPool,
}

impl Resources {
    unsafe fn new(device: &VulkanDevice, object_count: u32) -> RenderResult<Resources> {
        let command_pool = VulkanCommandPool::new(&device.vk_device, device.indices.graphics)?;

        let geometry = BufferPool::new(
            device,
            "geometry",
            &[
                (size_of_val(&QUAD_VERTICES) as u64, vk::BufferUsageFlags::VERTEX_BUFFER),
                (size_of_val(&QUAD_INDICES) as u64, vk::BufferUsageFlags::INDEX_BUFFER),
            ],
        )?;
        geometry.write(0, &QUAD_VERTICES, &command_pool, device.graphics_queue)?;
        geometry.write(1, &QUAD_INDICES, &command_pool, device.graphics_queue)?;

        let camera = BufferPool::new(
            device,
            "camera",
            &[(size_of::<CameraUniform>() as u64, vk::BufferUsageFlags::UNIFORM_BUFFER)],
        )?;

        let model_entry = (
            size_of::<ModelUniform>() as u64,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
        );
        let models = BufferPool::new(device, "model", &vec![model_entry; object_count as usize])?;

        let descriptors = VulkanDescriptors::new(&device.vk_device, object_count)?;
        descriptors.bind_buffers(
            (camera.buffer(0), camera.size(0)),
            &(0..models.pair_count())
                .map(|i| (models.buffer(i), models.size(i)))
                .collect::<Vec<_>>(),
        );

        Ok(Resources {
            descriptors,
            geometry,
            camera,
            models,
            command_pool,
        })
    }
}

/// Owns every GPU object the renderer uses. Dropping it waits for the device
/// to go idle and then tears everything down in field order.
pub struct RenderContext {
    frame_sync: FrameSync<vk::Fence>,
    presentation: Presentation,
    resources: Resources,
    device: VulkanDevice,
    instance: VulkanInstance,
    camera: CameraUniform,
    models: Vec<ModelUniform>,
}

impl RenderContext {
    pub unsafe fn new(
        window: &Window,
        title: &str,
        object_count: u32,
    ) -> RenderResult<RenderContext> {
        let instance = VulkanInstance::new(window, title)?;
        let device = VulkanDevice::new(&instance)?;
        let resources = Resources::new(&device, object_count)?;

        let size = window.inner_size();
        let presentation = Presentation::new(
            &instance,
            &device,
            &resources,
            (size.width, size.height),
            vk::SwapchainKHR::null(),
        )?;
        let frame_sync = FrameSync::new(
            presentation.sync.in_flight.clone(),
            presentation.swapchain.image_count(),
        );

        let extent = presentation.swapchain.extent;
        info!("Renderer ready ({} objects).", object_count);

        Ok(RenderContext {
            frame_sync,
            presentation,
            resources,
            device,
            instance,
            camera: CameraUniform::orthographic(extent.width, extent.height),
            models: vec![ModelUniform::default(); object_count as usize],
        })
    }

    pub fn extent(&self) -> (u32, u32) {
        let extent = self.presentation.swapchain.extent;
        (extent.width, extent.height)
    }

    /// Sets the model matrices for the next frame, in draw order. Extra
    /// entries are ignored; missing ones keep their previous value.
    pub fn set_models(&mut self, models: &[ModelUniform]) {
        for (slot, model) in self.models.iter_mut().zip(models) {
            *slot = *model;
        }
    }

    pub unsafe fn render(&mut self) -> RenderResult<FrameStatus> {
        let RenderContext {
            frame_sync,
            presentation,
            resources,
            device,
            camera,
            models,
            ..
        } = self;

        let mut driver = VulkanFrameDriver {
            device,
            presentation,
            resources,
            camera,
            models,
        };
        frame_sync.draw(&mut driver)
    }

    /// Rebuilds everything that depends on the swapchain for the current
    /// window size.
    pub unsafe fn recreate(&mut self, window_size: (u32, u32)) -> RenderResult<()> {
        self.device
            .vk_device
            .device_wait_idle()
            .syncing("wait for device idle")?;

        let presentation = Presentation::new(
            &self.instance,
            &self.device,
            &self.resources,
            window_size,
            self.presentation.swapchain.swapchain,
        )?;
        self.presentation = presentation;
        self.frame_sync = FrameSync::new(
            self.presentation.sync.in_flight.clone(),
            self.presentation.swapchain.image_count(),
        );

        let (width, height) = self.extent();
        self.camera = CameraUniform::orthographic(width, height);
        info!("Recreated swapchain at {}x{}.", width, height);
        Ok(())
    }
}

impl Drop for RenderContext {
    fn drop(&mut self) {
        if let Err(code) = unsafe { self.device.vk_device.device_wait_idle() } {
            warn!("Device did not go idle before teardown: {}", code);
        }
        info!("Destroying renderer.");
    }
}

struct VulkanFrameDriver<'a> {
    device: &'a VulkanDevice,
    presentation: &'a Presentation,
    resources: &'a Resources,
    camera: &'a CameraUniform,
    models: &'a [ModelUniform],
}

impl FrameDriver for VulkanFrameDriver<'_> {
    type Fence = vk::Fence;

    fn wait_for_fence(&mut self, fence: vk::Fence) -> RenderResult<()> {
        unsafe {
            self.device
                .vk_device
                .wait_for_fences(&[fence], true, u64::MAX)
                .syncing("wait for in-flight fence")?;
        }
        Ok(())
    }

    fn reset_fence(&mut self, fence: vk::Fence) -> RenderResult<()> {
        unsafe {
            self.device
                .vk_device
                .reset_fences(&[fence])
                .syncing("reset in-flight fence")
        }
    }

    fn acquire_next_image(&mut self, slot: usize) -> RenderResult<Acquire> {
        let result = unsafe {
            self.device.vk_device.acquire_next_image_khr(
                self.presentation.swapchain.swapchain,
                u64::MAX,
                self.presentation.sync.image_available[slot],
                vk::Fence::null(),
            )
        };

        match result {
            Ok((image, _)) => Ok(Acquire::Image(image as usize)),
            Err(vk::ErrorCode::OUT_OF_DATE_KHR) => Ok(Acquire::OutOfDate),
            Err(code) => Err(RenderError::Synchronization {
                what: "acquire swapchain image",
                code,
            }),
        }
    }

    fn upload_uniforms(&mut self) -> RenderResult<()> {
        let queue = self.device.graphics_queue;
        let pool = &self.resources.command_pool;
        unsafe {
            self.resources
                .camera
                .write(0, std::slice::from_ref(self.camera), pool, queue)?;
            for (i, model) in self.models.iter().enumerate() {
                self.resources
                    .models
                    .write(i, std::slice::from_ref(model), pool, queue)?;
            }
        }
        Ok(())
    }

    fn submit(&mut self, slot: usize, image: usize, fence: vk::Fence) -> RenderResult<()> {
        let sync = &self.presentation.sync;
        let wait_semaphores = &[sync.image_available[slot]];
        let wait_stages = &[vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = &[self.presentation.command_buffers.command_buffers[image]];
        let signal_semaphores = &[sync.render_finished[slot]];
        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(wait_semaphores)
            .wait_dst_stage_mask(wait_stages)
            .command_buffers(command_buffers)
            .signal_semaphores(signal_semaphores);

        unsafe {
            self.device
                .vk_device
                .queue_submit(self.device.graphics_queue, &[submit_info], fence)
                .submitting("draw command buffer")
        }
    }

    fn present(&mut self, slot: usize, image: usize) -> RenderResult<FrameStatus> {
        let wait_semaphores = &[self.presentation.sync.render_finished[slot]];
        let swapchains = &[self.presentation.swapchain.swapchain];
        let image_indices = &[image as u32];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(wait_semaphores)
            .swapchains(swapchains)
            .image_indices(image_indices);

        let result = unsafe {
            self.device
                .vk_device
                .queue_present_khr(self.device.present_queue, &present_info)
        };

        match result {
            Ok(vk::SuccessCode::SUBOPTIMAL_KHR) => Ok(FrameStatus::Suboptimal),
            Ok(_) => Ok(FrameStatus::Presented),
            Err(vk::ErrorCode::OUT_OF_DATE_KHR) => Ok(FrameStatus::OutOfDate),
            Err(code) => Err(RenderError::Submit {
                what: "presentation",
                code,
            }),
        }
    }
}
