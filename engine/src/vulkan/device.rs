use log::*;
use std::collections::HashSet;
use std::rc::Rc;
use thiserror::Error;
use vulkanalia::prelude::v1_0::*;
use vulkanalia::vk::KhrSurfaceExtension;

use super::constants;
use super::error::{RenderError, RenderResult, VkResultExt};
use super::instance::VulkanInstance;
use super::swapchain::SurfaceSupport;

/// The logical device, its queues and what we learned about the physical
/// device it was created from.
///
/// Every other GPU wrapper holds a clone of `vk_device` and must be dropped
/// before this one.
pub struct VulkanDevice {
    pub vk_device: Rc<Device>,
    pub physical_device: vk::PhysicalDevice,
    pub graphics_queue: vk::Queue,
    pub present_queue: vk::Queue,
    pub indices: QueueFamilyIndices,
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Missing {0}.")]
pub struct SuitabilityError(pub &'static str);

impl VulkanDevice {
    pub unsafe fn new(instance: &VulkanInstance) -> RenderResult<VulkanDevice> {
        let (physical_device, indices) = VulkanDevice::pick_physical_device(instance)?;

        let mut unique_indices = HashSet::new();
        unique_indices.insert(indices.graphics);
        unique_indices.insert(indices.present);

        let queue_priorities = &[1.0];
        let queue_infos = unique_indices
            .iter()
            .map(|i| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(*i)
                    .queue_priorities(queue_priorities)
            })
            .collect::<Vec<_>>();

        let layers = if constants::VALIDATION_ENABLED {
            vec![constants::VALIDATION_LAYER.as_ptr()]
        } else {
            vec![]
        };

        let mut extensions = constants::DEVICE_EXTENSIONS
            .iter()
            .map(|n| n.as_ptr())
            .collect::<Vec<_>>();

        if instance.portability {
            extensions.push(vk::KHR_PORTABILITY_SUBSET_EXTENSION.name.as_ptr());
        }

        let features = vk::PhysicalDeviceFeatures::builder();

        let info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_layer_names(&layers)
            .enabled_extension_names(&extensions)
            .enabled_features(&features);

        let device = instance
            .vk_instance
            .create_device(physical_device, &info, None)
            .creating("logical device")?;
        debug!("Created logical device.");

        let graphics_queue = device.get_device_queue(indices.graphics, 0);
        let present_queue = device.get_device_queue(indices.present, 0);
        let memory_properties = instance
            .vk_instance
            .get_physical_device_memory_properties(physical_device);

        Ok(VulkanDevice {
            vk_device: Rc::new(device),
            physical_device,
            graphics_queue,
            present_queue,
            indices,
            memory_properties,
        })
    }

    unsafe fn pick_physical_device(
        instance: &VulkanInstance,
    ) -> RenderResult<(vk::PhysicalDevice, QueueFamilyIndices)> {
        let mut candidates = Vec::new();
        for physical_device in instance
            .vk_instance
            .enumerate_physical_devices()
            .querying("physical devices")?
        {
            let properties = instance
                .vk_instance
                .get_physical_device_properties(physical_device);
            let support = DeviceSupport::query(instance, physical_device);
            candidates.push((physical_device, properties.device_name.to_string(), support));
        }

        select_device(candidates).ok_or(RenderError::DeviceSelection)
    }

    pub fn is_shared_queue(&self) -> bool {
        self.indices.graphics == self.indices.present
    }
}

impl Drop for VulkanDevice {
    fn drop(&mut self) {
        unsafe { self.vk_device.destroy_device(None) };
        debug!("Destroyed logical device.");
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics: u32,
    pub present: u32,
}

/// Everything device selection looks at, gathered up front so that the
/// decision itself does not touch the driver.
#[derive(Clone, Debug, Default)]
pub struct DeviceSupport {
    pub graphics: Option<u32>,
    pub present: Option<u32>,
    pub extensions: HashSet<vk::ExtensionName>,
    pub format_count: usize,
    pub present_mode_count: usize,
}

impl DeviceSupport {
    unsafe fn query(
        instance: &VulkanInstance,
        physical_device: vk::PhysicalDevice,
    ) -> RenderResult<DeviceSupport> {
        let families = instance
            .vk_instance
            .get_physical_device_queue_family_properties(physical_device);

        let mut present_support = Vec::with_capacity(families.len());
        for index in 0..families.len() as u32 {
            present_support.push(
                instance
                    .vk_instance
                    .get_physical_device_surface_support_khr(
                        physical_device,
                        index,
                        instance.surface,
                    )
                    .querying("surface support")?,
            );
        }
        let (graphics, present) = find_queue_families(&families, &present_support);

        let extensions = instance
            .vk_instance
            .enumerate_device_extension_properties(physical_device, None)
            .querying("device extensions")?
            .iter()
            .map(|e| e.extension_name)
            .collect::<HashSet<_>>();

        let surface = SurfaceSupport::query(instance, physical_device)?;

        Ok(DeviceSupport {
            graphics,
            present,
            extensions,
            format_count: surface.formats.len(),
            present_mode_count: surface.present_modes.len(),
        })
    }

    pub fn check(&self) -> Result<QueueFamilyIndices, SuitabilityError> {
        let graphics = self
            .graphics
            .ok_or(SuitabilityError("graphics queue family"))?;
        let present = self
            .present
            .ok_or(SuitabilityError("present queue family"))?;

        if !constants::DEVICE_EXTENSIONS
            .iter()
            .all(|e| self.extensions.contains(e))
        {
            return Err(SuitabilityError("required device extensions"));
        }

        if self.format_count == 0 || self.present_mode_count == 0 {
            return Err(SuitabilityError("swapchain support"));
        }

        Ok(QueueFamilyIndices { graphics, present })
    }
}

/// Walks the queue families in order and stops at the first point where both
/// a graphics and a present family have been seen.
pub fn find_queue_families(
    families: &[vk::QueueFamilyProperties],
    present_support: &[bool],
) -> (Option<u32>, Option<u32>) {
    let mut graphics = None;
    let mut present = None;

    for (index, family) in families.iter().enumerate() {
        if family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
            graphics = Some(index as u32);
        }
        if present_support.get(index).copied().unwrap_or(false) {
            present = Some(index as u32);
        }
        if graphics.is_some() && present.is_some() {
            break;
        }
    }

    (graphics, present)
}

/// Picks the first candidate that passes every suitability check. A
/// candidate whose support could not be queried is skipped like any other
/// unsuitable one.
pub fn select_device<T>(
    candidates: impl IntoIterator<Item = (T, String, RenderResult<DeviceSupport>)>,
) -> Option<(T, QueueFamilyIndices)> {
    for (device, name, support) in candidates {
        let support = match support {
            Ok(support) => support,
            Err(error) => {
                warn!("Skipping physical device (`{}`): {}", name, error);
                continue;
            }
        };
        match support.check() {
            Ok(indices) => {
                info!("Selected physical device (`{}`).", name);
                return Some((device, indices));
            }
            Err(error) => warn!("Skipping physical device (`{}`): {}", name, error),
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: 1,
            ..Default::default()
        }
    }

    fn capable() -> DeviceSupport {
        DeviceSupport {
            graphics: Some(0),
            present: Some(0),
            extensions: constants::DEVICE_EXTENSIONS.iter().copied().collect(),
            format_count: 2,
            present_mode_count: 1,
        }
    }

    #[test]
    fn queue_families_stop_at_first_complete_pair() {
        let families = [
            family(vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE),
            family(vk::QueueFlags::GRAPHICS),
        ];
        assert_eq!(
            find_queue_families(&families, &[false, true, true]),
            (Some(1), Some(1))
        );
        assert_eq!(
            find_queue_families(&families, &[true, false, false]),
            (Some(1), Some(0))
        );
        assert_eq!(
            find_queue_families(&families[..1], &[true]),
            (None, Some(0))
        );
    }

    #[test]
    fn check_reports_each_missing_capability() {
        assert_eq!(
            capable().check(),
            Ok(QueueFamilyIndices {
                graphics: 0,
                present: 0
            })
        );

        let no_graphics = DeviceSupport {
            graphics: None,
            ..capable()
        };
        assert_eq!(
            no_graphics.check(),
            Err(SuitabilityError("graphics queue family"))
        );

        let no_present = DeviceSupport {
            present: None,
            ..capable()
        };
        assert_eq!(
            no_present.check(),
            Err(SuitabilityError("present queue family"))
        );

        let no_swapchain_ext = DeviceSupport {
            extensions: HashSet::new(),
            ..capable()
        };
        assert_eq!(
            no_swapchain_ext.check(),
            Err(SuitabilityError("required device extensions"))
        );

        let no_modes = DeviceSupport {
            present_mode_count: 0,
            ..capable()
        };
        assert!(no_modes.check().is_err());
    }

    #[test]
    fn selection_skips_unsuitable_devices() {
        let candidates = vec![
            (
                "integrated",
                "integrated".to_string(),
                Ok(DeviceSupport {
                    format_count: 0,
                    ..capable()
                }),
            ),
            (
                "discrete",
                "discrete".to_string(),
                Ok(DeviceSupport {
                    graphics: Some(2),
                    present: Some(3),
                    ..capable()
                }),
            ),
            ("other", "other".to_string(), Ok(capable())),
        ];

        let (device, indices) = select_device(candidates).unwrap();
        assert_eq!(device, "discrete");
        assert_eq!(indices.graphics, 2);
        assert_eq!(indices.present, 3);
    }

    #[test]
    fn selection_fails_when_nothing_qualifies() {
        let none: Vec<((), String, RenderResult<DeviceSupport>)> = vec![(
            (),
            "software".to_string(),
            Ok(DeviceSupport::default()),
        )];
        assert!(select_device(none).is_none());
    }

    #[test]
    fn selection_skips_devices_that_fail_to_report_support() {
        let candidates = vec![
            (
                "lost",
                "lost".to_string(),
                Err(RenderError::Query {
                    what: "surface formats",
                    code: vk::ErrorCode::SURFACE_LOST_KHR,
                }),
            ),
            ("working", "working".to_string(), Ok(capable())),
        ];

        let (device, _) = select_device(candidates).unwrap();
        assert_eq!(device, "working");
    }
}
