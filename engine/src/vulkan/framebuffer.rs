use std::rc::Rc;
use vulkanalia::prelude::v1_0::*;

use super::error::{RenderResult, VkResultExt};

/// One framebuffer per swapchain image view.
pub struct VulkanFramebuffers {
    pub framebuffers: Vec<vk::Framebuffer>,
    device: Rc<Device>,
}

impl VulkanFramebuffers {
    pub unsafe fn new(
        device: &Rc<Device>,
        render_pass: vk::RenderPass,
        image_views: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> RenderResult<VulkanFramebuffers> {
        let mut framebuffers = VulkanFramebuffers {
            framebuffers: Vec::with_capacity(image_views.len()),
            device: device.clone(),
        };

        for view in image_views {
            let attachments = &[*view];
            let create_info = vk::FramebufferCreateInfo::builder()
                .render_pass(render_pass)
                .attachments(attachments)
                .width(extent.width)
                .height(extent.height)
                .layers(1);

            framebuffers.framebuffers.push(
                device
                    .create_framebuffer(&create_info, None)
                    .creating("framebuffer")?,
            );
        }

        Ok(framebuffers)
    }
}

impl Drop for VulkanFramebuffers {
    fn drop(&mut self) {
        self.framebuffers
            .iter()
            .for_each(|f| unsafe { self.device.destroy_framebuffer(*f, None) });
    }
}
