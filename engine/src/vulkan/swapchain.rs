use log::*;
use std::rc::Rc;
use vulkanalia::prelude::v1_0::*;
use vulkanalia::vk::{KhrSurfaceExtension, KhrSwapchainExtension};

use super::device::VulkanDevice;
use super::error::{RenderError, RenderResult, VkResultExt};
use super::image;
use super::instance::VulkanInstance;

/// What the surface offers a given physical device.
#[derive(Clone, Debug)]
pub struct SurfaceSupport {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SurfaceSupport {
    pub unsafe fn query(
        instance: &VulkanInstance,
        physical_device: vk::PhysicalDevice,
    ) -> RenderResult<SurfaceSupport> {
        let vk_instance = &instance.vk_instance;
        Ok(SurfaceSupport {
            capabilities: vk_instance
                .get_physical_device_surface_capabilities_khr(physical_device, instance.surface)
                .querying("surface capabilities")?,
            formats: vk_instance
                .get_physical_device_surface_formats_khr(physical_device, instance.surface)
                .querying("surface formats")?,
            present_modes: vk_instance
                .get_physical_device_surface_present_modes_khr(physical_device, instance.surface)
                .querying("surface present modes")?,
        })
    }
}

pub fn choose_surface_format(
    formats: &[vk::SurfaceFormatKHR],
) -> RenderResult<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .copied()
        .find(|f| {
            f.format == vk::Format::B8G8R8A8_SRGB
                && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .or_else(|| formats.first().copied())
        .ok_or(RenderError::NoSurfaceFormat)
}

pub fn choose_present_mode(present_modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    present_modes
        .iter()
        .copied()
        .find(|m| *m == vk::PresentModeKHR::MAILBOX)
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

/// The surface's own extent wins; a width of `u32::MAX` means the window
/// decides, within the surface limits.
pub fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    window_size: (u32, u32),
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }

    let min = capabilities.min_image_extent;
    let max = capabilities.max_image_extent;
    vk::Extent2D::builder()
        .width(window_size.0.min(max.width).max(min.width))
        .height(window_size.1.min(max.height).max(min.height))
        .build()
}

/// One more than the minimum, unless the surface caps it (zero means no cap).
pub fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let count = capabilities.min_image_count + 1;
    if capabilities.max_image_count != 0 && count > capabilities.max_image_count {
        capabilities.max_image_count
    } else {
        count
    }
}

pub struct VulkanSwapchain {
    pub swapchain: vk::SwapchainKHR,
    pub format: vk::Format,
    pub extent: vk::Extent2D,
    pub images: Vec<vk::Image>,
    pub image_views: Vec<vk::ImageView>,
    device: Rc<Device>,
}

impl VulkanSwapchain {
    /// Builds a swapchain for the current surface state. `old_swapchain` is
    /// the chain being replaced, or null on first creation.
    pub unsafe fn new(
        instance: &VulkanInstance,
        device: &VulkanDevice,
        window_size: (u32, u32),
        old_swapchain: vk::SwapchainKHR,
    ) -> RenderResult<VulkanSwapchain> {
        let support = SurfaceSupport::query(instance, device.physical_device)?;

        let surface_format = choose_surface_format(&support.formats)?;
        let present_mode = choose_present_mode(&support.present_modes);
        let extent = choose_extent(&support.capabilities, window_size);
        let image_count = choose_image_count(&support.capabilities);

        let mut queue_family_indices = vec![];
        let image_sharing_mode = if device.is_shared_queue() {
            vk::SharingMode::EXCLUSIVE
        } else {
            queue_family_indices.push(device.indices.graphics);
            queue_family_indices.push(device.indices.present);
            vk::SharingMode::CONCURRENT
        };

        let info = vk::SwapchainCreateInfoKHR::builder()
            .surface(instance.surface)
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(image_sharing_mode)
            .queue_family_indices(&queue_family_indices)
            .pre_transform(support.capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);

        let mut swapchain = VulkanSwapchain {
            swapchain: device
                .vk_device
                .create_swapchain_khr(&info, None)
                .creating("swapchain")?,
            format: surface_format.format,
            extent,
            images: vec![],
            image_views: vec![],
            device: device.vk_device.clone(),
        };

        swapchain.images = device
            .vk_device
            .get_swapchain_images_khr(swapchain.swapchain)
            .querying("swapchain images")?;

        for image in swapchain.images.clone() {
            let view = image::create_image_view(
                &device.vk_device,
                image,
                swapchain.format,
                vk::ImageAspectFlags::COLOR,
            )?;
            swapchain.image_views.push(view);
        }

        info!(
            "Created swapchain ({}x{}, {} images, {:?}).",
            extent.width,
            extent.height,
            swapchain.images.len(),
            present_mode
        );

        Ok(swapchain)
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }
}

impl Drop for VulkanSwapchain {
    fn drop(&mut self) {
        unsafe {
            self.image_views
                .iter()
                .for_each(|v| self.device.destroy_image_view(*v, None));
            self.device.destroy_swapchain_khr(self.swapchain, None);
        }
        debug!("Destroyed swapchain.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space,
        }
    }

    fn capabilities(current: (u32, u32), min_count: u32, max_count: u32) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: current.0,
                height: current.1,
            },
            min_image_extent: vk::Extent2D {
                width: 100,
                height: 100,
            },
            max_image_extent: vk::Extent2D {
                width: 1920,
                height: 1080,
            },
            min_image_count: min_count,
            max_image_count: max_count,
            ..Default::default()
        }
    }

    #[test]
    fn prefers_srgb_bgra_format() {
        let formats = [
            format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        assert_eq!(choose_surface_format(&formats).unwrap(), formats[1]);

        let fallback = [
            format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT),
        ];
        assert_eq!(choose_surface_format(&fallback).unwrap(), fallback[0]);
    }

    #[test]
    fn no_formats_is_an_error() {
        assert!(matches!(
            choose_surface_format(&[]),
            Err(RenderError::NoSurfaceFormat)
        ));
    }

    #[test]
    fn prefers_mailbox_then_fifo() {
        assert_eq!(
            choose_present_mode(&[vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX]),
            vk::PresentModeKHR::MAILBOX
        );
        assert_eq!(
            choose_present_mode(&[vk::PresentModeKHR::IMMEDIATE]),
            vk::PresentModeKHR::FIFO
        );
    }

    #[test]
    fn extent_uses_surface_or_clamps_window() {
        let fixed = capabilities((640, 480), 2, 0);
        assert_eq!(choose_extent(&fixed, (800, 600)), fixed.current_extent);

        let free = capabilities((u32::MAX, u32::MAX), 2, 0);
        let extent = choose_extent(&free, (640, 480));
        assert_eq!((extent.width, extent.height), (640, 480));

        let extent = choose_extent(&free, (4000, 20));
        assert_eq!((extent.width, extent.height), (1920, 100));
    }

    #[test]
    fn image_count_respects_cap() {
        assert_eq!(choose_image_count(&capabilities((1, 1), 2, 0)), 3);
        assert_eq!(choose_image_count(&capabilities((1, 1), 2, 8)), 3);
        assert_eq!(choose_image_count(&capabilities((1, 1), 3, 3)), 3);
    }
}
