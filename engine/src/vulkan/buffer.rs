use log::*;
use std::mem::size_of_val;
use std::ptr::copy_nonoverlapping as memcpy;
use std::rc::Rc;
use vulkanalia::prelude::v1_0::*;
use vulkanalia::vk::Handle;

use super::command_buffer::VulkanCommandPool;
use super::device::VulkanDevice;
use super::error::{RenderError, RenderResult, VkResultExt};

/// Returns the last memory type allowed by `type_bits` whose properties
/// include every flag in `required`.
pub fn find_memory_type(
    properties: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    required: vk::MemoryPropertyFlags,
) -> RenderResult<u32> {
    (0..properties.memory_type_count)
        .rev()
        .find(|i| {
            let memory_type = properties.memory_types[*i as usize];
            type_bits & (1 << i) != 0 && memory_type.property_flags.contains(required)
        })
        .ok_or(RenderError::MemoryTypeNotFound(required))
}

pub fn align_up(value: u64, alignment: u64) -> u64 {
    if alignment <= 1 {
        value
    } else {
        value.div_ceil(alignment) * alignment
    }
}

/// Lays buffers out back to back in one allocation, each starting on its own
/// alignment. Returns the offsets and the total allocation size.
pub fn pool_layout(requirements: &[(u64, u64)]) -> (Vec<u64>, u64) {
    let mut offsets = Vec::with_capacity(requirements.len());
    let mut total = 0;
    for (size, alignment) in requirements {
        let offset = align_up(total, *alignment);
        offsets.push(offset);
        total = offset + size;
    }
    (offsets, total)
}

/// A set of buffer pairs sharing one host-visible staging allocation and one
/// device-local allocation. Data reaches the device buffer by writing the
/// staging buffer and then copying it over on the graphics queue.
pub struct BufferPool {
    sizes: Vec<u64>,
    staging: Vec<vk::Buffer>,
    staging_offsets: Vec<u64>,
    device_local: Vec<vk::Buffer>,
    staging_memory: vk::DeviceMemory,
    device_memory: vk::DeviceMemory,
    device: Rc<Device>,
}

impl BufferPool {
    /// Creates one pair per `(size, usage)` entry. `usage` is added to the
    /// device-local side on top of `TRANSFER_DST`.
    pub unsafe fn new(
        device: &VulkanDevice,
        what: &'static str,
        buffers: &[(u64, vk::BufferUsageFlags)],
    ) -> RenderResult<BufferPool> {
        let mut pool = BufferPool {
            sizes: buffers.iter().map(|(size, _)| *size).collect(),
            staging: Vec::with_capacity(buffers.len()),
            staging_offsets: vec![],
            device_local: Vec::with_capacity(buffers.len()),
            staging_memory: vk::DeviceMemory::null(),
            device_memory: vk::DeviceMemory::null(),
            device: device.vk_device.clone(),
        };

        for (size, usage) in buffers {
            let staging = pool.create_buffer(*size, vk::BufferUsageFlags::TRANSFER_SRC)?;
            pool.staging.push(staging);
            let device_local =
                pool.create_buffer(*size, vk::BufferUsageFlags::TRANSFER_DST | *usage)?;
            pool.device_local.push(device_local);
        }

        let (staging_memory, staging_offsets) = pool.allocate_and_bind(
            device,
            &pool.staging,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;
        pool.staging_memory = staging_memory;
        pool.staging_offsets = staging_offsets;

        let (device_memory, _) = pool.allocate_and_bind(
            device,
            &pool.device_local,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;
        pool.device_memory = device_memory;

        debug!("Created {} buffer pool ({} pairs).", what, buffers.len());
        Ok(pool)
    }

    unsafe fn create_buffer(
        &self,
        size: u64,
        usage: vk::BufferUsageFlags,
    ) -> RenderResult<vk::Buffer> {
        let info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        self.device.create_buffer(&info, None).creating("buffer")
    }

    unsafe fn allocate_and_bind(
        &self,
        device: &VulkanDevice,
        buffers: &[vk::Buffer],
        properties: vk::MemoryPropertyFlags,
    ) -> RenderResult<(vk::DeviceMemory, Vec<u64>)> {
        let requirements = buffers
            .iter()
            .map(|b| self.device.get_buffer_memory_requirements(*b))
            .collect::<Vec<_>>();

        let type_bits = requirements
            .iter()
            .fold(u32::MAX, |bits, r| bits & r.memory_type_bits);
        let (offsets, total) = pool_layout(
            &requirements
                .iter()
                .map(|r| (r.size, r.alignment))
                .collect::<Vec<_>>(),
        );

        let info = vk::MemoryAllocateInfo::builder()
            .allocation_size(total)
            .memory_type_index(find_memory_type(
                &device.memory_properties,
                type_bits,
                properties,
            )?);

        let memory = self
            .device
            .allocate_memory(&info, None)
            .creating("buffer memory")?;

        for (buffer, offset) in buffers.iter().zip(&offsets) {
            if let Err(code) = self.device.bind_buffer_memory(*buffer, memory, *offset) {
                self.device.free_memory(memory, None);
                return Err(RenderError::ResourceCreation {
                    what: "buffer memory binding",
                    code,
                });
            }
        }

        Ok((memory, offsets))
    }

    /// The device-local buffer of pair `index`.
    pub fn buffer(&self, index: usize) -> vk::Buffer {
        self.device_local[index]
    }

    pub fn size(&self, index: usize) -> u64 {
        self.sizes[index]
    }

    pub fn pair_count(&self) -> usize {
        self.sizes.len()
    }

    /// Writes `data` into the staging side of pair `index`.
    pub unsafe fn upload<T: Copy>(&self, index: usize, data: &[T]) -> RenderResult<()> {
        let len = size_of_val(data) as u64;
        let capacity = self.sizes[index];
        if len > capacity {
            return Err(RenderError::PayloadTooLarge { len, capacity });
        }

        let memory = self
            .device
            .map_memory(
                self.staging_memory,
                self.staging_offsets[index],
                capacity,
                vk::MemoryMapFlags::empty(),
            )
            .creating("staging memory mapping")?;

        memcpy(data.as_ptr(), memory.cast(), data.len());

        self.device.unmap_memory(self.staging_memory);
        Ok(())
    }

    /// Copies pair `index` from staging to device-local memory and blocks
    /// until the copy has finished.
    pub unsafe fn copy_to_device(
        &self,
        index: usize,
        command_pool: &VulkanCommandPool,
        queue: vk::Queue,
    ) -> RenderResult<()> {
        let region = vk::BufferCopy::builder().size(self.sizes[index]);
        let (source, destination) = (self.staging[index], self.device_local[index]);

        command_pool.submit_one_shot(queue, |command_buffer| {
            self.device
                .cmd_copy_buffer(command_buffer, source, destination, &[region]);
        })
    }

    pub unsafe fn write<T: Copy>(
        &self,
        index: usize,
        data: &[T],
        command_pool: &VulkanCommandPool,
        queue: vk::Queue,
    ) -> RenderResult<()> {
        self.upload(index, data)?;
        self.copy_to_device(index, command_pool, queue)
    }
}

impl Drop for BufferPool {
    fn drop(&mut self) {
        unsafe {
            self.staging
                .iter()
                .chain(&self.device_local)
                .for_each(|b| self.device.destroy_buffer(*b, None));
            self.device.free_memory(self.staging_memory, None);
            self.device.free_memory(self.device_memory, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_properties(types: &[vk::MemoryPropertyFlags]) -> vk::PhysicalDeviceMemoryProperties {
        let mut properties = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: types.len() as u32,
            ..Default::default()
        };
        for (i, flags) in types.iter().enumerate() {
            properties.memory_types[i].property_flags = *flags;
        }
        properties
    }

    #[test]
    fn memory_type_is_last_match() {
        let host = vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT;
        let properties = memory_properties(&[
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            host,
            host | vk::MemoryPropertyFlags::HOST_CACHED,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        ]);

        assert_eq!(find_memory_type(&properties, u32::MAX, host).unwrap(), 2);
        assert_eq!(
            find_memory_type(&properties, u32::MAX, vk::MemoryPropertyFlags::DEVICE_LOCAL).unwrap(),
            3
        );
    }

    #[test]
    fn memory_type_honours_type_bits() {
        let properties = memory_properties(&[
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        ]);
        assert_eq!(
            find_memory_type(&properties, 0b01, vk::MemoryPropertyFlags::DEVICE_LOCAL).unwrap(),
            0
        );
        assert!(matches!(
            find_memory_type(&properties, 0b00, vk::MemoryPropertyFlags::DEVICE_LOCAL),
            Err(RenderError::MemoryTypeNotFound(_))
        ));
        assert!(find_memory_type(&properties, u32::MAX, vk::MemoryPropertyFlags::HOST_VISIBLE)
            .is_err());
    }

    #[test]
    fn pool_offsets_are_aligned_and_fit() {
        let requirements = [(48, 16), (64, 256), (12, 4), (128, 64)];
        let (offsets, total) = pool_layout(&requirements);

        assert_eq!(offsets, vec![0, 256, 320, 384]);
        assert_eq!(total, 512);
        for (window, (offset, (size, alignment))) in
            offsets.windows(2).zip(offsets.iter().zip(&requirements))
        {
            assert!(window[0] < window[1]);
            assert_eq!(offset % alignment, 0);
            assert!(offset + size <= window[1]);
        }
        assert!(offsets[3] + requirements[3].0 <= total);
    }

    #[test]
    fn pool_offsets_never_overlap() {
        const ALIGNMENTS: [u64; 4] = [1, 4, 16, 256];

        for seed in 0..64u64 {
            let requirements = (0..1 + seed % 8)
                .map(|i| {
                    let size = (seed * 37 + i * 101) % 300 + 1;
                    let alignment = ALIGNMENTS[((seed + i * 3) % 4) as usize];
                    (size, alignment)
                })
                .collect::<Vec<_>>();
            let (offsets, total) = pool_layout(&requirements);

            assert_eq!(offsets.len(), requirements.len());
            for (i, (offset, (size, alignment))) in offsets.iter().zip(&requirements).enumerate() {
                assert_eq!(offset % alignment, 0, "{:?}", requirements);
                let end = offset + size;
                match offsets.get(i + 1) {
                    Some(next) => assert!(end <= *next, "{:?}", requirements),
                    None => assert_eq!(end, total, "{:?}", requirements),
                }
            }
        }
    }

    #[test]
    fn empty_pool_has_no_size() {
        assert_eq!(pool_layout(&[]), (vec![], 0));
        assert_eq!(align_up(13, 0), 13);
        assert_eq!(align_up(13, 8), 16);
        assert_eq!(align_up(16, 8), 16);
    }
}
