use log::*;
use std::rc::Rc;
use vulkanalia::prelude::v1_0::*;
use vulkanalia::vk::Handle;

use super::constants;
use super::error::{RenderResult, VkResultExt};

pub struct VulkanCommandPool {
    pub command_pool: vk::CommandPool,
    device: Rc<Device>,
}

impl VulkanCommandPool {
    pub unsafe fn new(device: &Rc<Device>, queue_family: u32) -> RenderResult<VulkanCommandPool> {
        let info = vk::CommandPoolCreateInfo::builder()
            .flags(vk::CommandPoolCreateFlags::empty())
            .queue_family_index(queue_family);

        let command_pool = device
            .create_command_pool(&info, None)
            .creating("command pool")?;
        debug!("Created command pool.");

        Ok(VulkanCommandPool {
            command_pool,
            device: device.clone(),
        })
    }

    /// Records a throwaway command buffer, submits it and waits for the queue
    /// to drain before freeing it again.
    pub unsafe fn submit_one_shot(
        &self,
        queue: vk::Queue,
        record: impl FnOnce(vk::CommandBuffer),
    ) -> RenderResult<()> {
        let info = vk::CommandBufferAllocateInfo::builder()
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_pool(self.command_pool)
            .command_buffer_count(1);

        let command_buffer = self
            .device
            .allocate_command_buffers(&info)
            .creating("one-shot command buffer")?[0];

        let result = self.run_one_shot(queue, command_buffer, record);
        self.device
            .free_command_buffers(self.command_pool, &[command_buffer]);
        result
    }

    unsafe fn run_one_shot(
        &self,
        queue: vk::Queue,
        command_buffer: vk::CommandBuffer,
        record: impl FnOnce(vk::CommandBuffer),
    ) -> RenderResult<()> {
        let info = vk::CommandBufferBeginInfo::builder()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        self.device
            .begin_command_buffer(command_buffer, &info)
            .creating("one-shot command buffer recording")?;

        record(command_buffer);

        self.device
            .end_command_buffer(command_buffer)
            .creating("one-shot command buffer recording")?;

        let command_buffers = &[command_buffer];
        let info = vk::SubmitInfo::builder().command_buffers(command_buffers);
        self.device
            .queue_submit(queue, &[info], vk::Fence::null())
            .submitting("one-shot command buffer")?;
        self.device
            .queue_wait_idle(queue)
            .syncing("wait for transfer queue")
    }
}

impl Drop for VulkanCommandPool {
    fn drop(&mut self) {
        unsafe { self.device.destroy_command_pool(self.command_pool, None) };
    }
}

/// What a prerecorded frame draws: shared geometry, the camera set and one
/// descriptor set per object, drawn in order.
pub struct DrawList<'a> {
    pub vertex_buffer: vk::Buffer,
    pub index_buffer: vk::Buffer,
    pub index_count: u32,
    pub camera_set: vk::DescriptorSet,
    pub object_sets: &'a [vk::DescriptorSet],
}

/// The per-image command buffers. Recorded once per swapchain; uniforms are
/// the only thing that changes between frames.
pub struct VulkanCommandBuffers {
    pub command_buffers: Vec<vk::CommandBuffer>,
    command_pool: vk::CommandPool,
    device: Rc<Device>,
}

impl VulkanCommandBuffers {
    #[allow(clippy::too_many_arguments)]
    pub unsafe fn record(
        device: &Rc<Device>,
        command_pool: &VulkanCommandPool,
        render_pass: vk::RenderPass,
        framebuffers: &[vk::Framebuffer],
        extent: vk::Extent2D,
        pipeline: vk::Pipeline,
        pipeline_layout: vk::PipelineLayout,
        draws: &DrawList,
    ) -> RenderResult<VulkanCommandBuffers> {
        let allocate_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(command_pool.command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(framebuffers.len() as u32);

        let buffers = VulkanCommandBuffers {
            command_buffers: device
                .allocate_command_buffers(&allocate_info)
                .creating("command buffers")?,
            command_pool: command_pool.command_pool,
            device: device.clone(),
        };

        for (command_buffer, framebuffer) in buffers.command_buffers.iter().zip(framebuffers) {
            let info = vk::CommandBufferBeginInfo::builder();
            device
                .begin_command_buffer(*command_buffer, &info)
                .creating("command buffer recording")?;

            let render_area = vk::Rect2D::builder()
                .offset(vk::Offset2D::default())
                .extent(extent);

            let color_clear_value = vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: constants::CLEAR_COLOR,
                },
            };

            let clear_values = &[color_clear_value];
            let info = vk::RenderPassBeginInfo::builder()
                .render_pass(render_pass)
                .framebuffer(*framebuffer)
                .render_area(render_area)
                .clear_values(clear_values);

            device.cmd_begin_render_pass(*command_buffer, &info, vk::SubpassContents::INLINE);
            device.cmd_bind_pipeline(*command_buffer, vk::PipelineBindPoint::GRAPHICS, pipeline);

            for object_set in draws.object_sets {
                device.cmd_bind_vertex_buffers(*command_buffer, 0, &[draws.vertex_buffer], &[0]);
                device.cmd_bind_index_buffer(
                    *command_buffer,
                    draws.index_buffer,
                    0,
                    vk::IndexType::UINT32,
                );
                device.cmd_bind_descriptor_sets(
                    *command_buffer,
                    vk::PipelineBindPoint::GRAPHICS,
                    pipeline_layout,
                    0,
                    &[draws.camera_set, *object_set],
                    &[],
                );
                device.cmd_draw_indexed(*command_buffer, draws.index_count, 1, 0, 0, 0);
            }

            device.cmd_end_render_pass(*command_buffer);
            device
                .end_command_buffer(*command_buffer)
                .creating("command buffer recording")?;
        }

        debug!("Recorded {} command buffers.", buffers.command_buffers.len());
        Ok(buffers)
    }
}

impl Drop for VulkanCommandBuffers {
    fn drop(&mut self) {
        if !self.command_buffers.is_empty() {
            unsafe {
                self.device
                    .free_command_buffers(self.command_pool, &self.command_buffers)
            };
        }
    }
}
