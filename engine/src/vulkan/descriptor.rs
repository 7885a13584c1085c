use log::*;
use std::rc::Rc;
use vulkanalia::prelude::v1_0::*;
use vulkanalia::vk::Handle;

use super::error::{RenderResult, VkResultExt};

pub const CAMERA_BINDING: u32 = 0;
pub const MODEL_BINDING: u32 = 1;

/// Set 0 holds the camera, set 1 one model matrix per drawn object. Both are
/// uniform buffers read by the vertex stage.
pub struct VulkanDescriptors {
    pub camera_layout: vk::DescriptorSetLayout,
    pub model_layout: vk::DescriptorSetLayout,
    pub camera_set: vk::DescriptorSet,
    pub model_sets: Vec<vk::DescriptorSet>,
    camera_pool: vk::DescriptorPool,
    model_pool: vk::DescriptorPool,
    device: Rc<Device>,
}

impl VulkanDescriptors {
    pub unsafe fn new(device: &Rc<Device>, object_count: u32) -> RenderResult<VulkanDescriptors> {
        let mut descriptors = VulkanDescriptors {
            camera_layout: vk::DescriptorSetLayout::null(),
            model_layout: vk::DescriptorSetLayout::null(),
            camera_set: vk::DescriptorSet::null(),
            model_sets: vec![],
            camera_pool: vk::DescriptorPool::null(),
            model_pool: vk::DescriptorPool::null(),
            device: device.clone(),
        };

        descriptors.camera_layout = create_layout(device, CAMERA_BINDING)?;
        descriptors.model_layout = create_layout(device, MODEL_BINDING)?;
        descriptors.camera_pool = create_pool(device, 1)?;
        descriptors.model_pool = create_pool(device, object_count)?;

        descriptors.camera_set = allocate_sets(
            device,
            descriptors.camera_pool,
            descriptors.camera_layout,
            1,
        )?[0];
        descriptors.model_sets = allocate_sets(
            device,
            descriptors.model_pool,
            descriptors.model_layout,
            object_count,
        )?;

        debug!("Created descriptor sets for {} objects.", object_count);
        Ok(descriptors)
    }

    pub fn layouts(&self) -> [vk::DescriptorSetLayout; 2] {
        [self.camera_layout, self.model_layout]
    }

    /// Points the camera set and each model set at their buffers.
    pub unsafe fn bind_buffers(
        &self,
        camera: (vk::Buffer, u64),
        models: &[(vk::Buffer, u64)],
    ) {
        let mut writes = Vec::with_capacity(models.len() + 1);
        let camera_info = [buffer_info(camera)];
        writes.push(write(self.camera_set, CAMERA_BINDING, &camera_info));

        let model_infos = models.iter().map(|m| [buffer_info(*m)]).collect::<Vec<_>>();
        for (set, info) in self.model_sets.iter().zip(&model_infos) {
            writes.push(write(*set, MODEL_BINDING, info));
        }

        self.device
            .update_descriptor_sets(&writes, &[] as &[vk::CopyDescriptorSet]);
    }
}

impl Drop for VulkanDescriptors {
    fn drop(&mut self) {
        unsafe {
            // Destroying a pool frees the sets allocated from it.
            self.device.destroy_descriptor_pool(self.model_pool, None);
            self.device.destroy_descriptor_pool(self.camera_pool, None);
            self.device
                .destroy_descriptor_set_layout(self.model_layout, None);
            self.device
                .destroy_descriptor_set_layout(self.camera_layout, None);
        }
    }
}

unsafe fn create_layout(device: &Device, binding: u32) -> RenderResult<vk::DescriptorSetLayout> {
    let binding = vk::DescriptorSetLayoutBinding::builder()
        .binding(binding)
        .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
        .descriptor_count(1)
        .stage_flags(vk::ShaderStageFlags::VERTEX);

    let bindings = &[binding];
    let info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(bindings);

    device
        .create_descriptor_set_layout(&info, None)
        .creating("descriptor set layout")
}

unsafe fn create_pool(device: &Device, set_count: u32) -> RenderResult<vk::DescriptorPool> {
    let size = vk::DescriptorPoolSize::builder()
        .type_(vk::DescriptorType::UNIFORM_BUFFER)
        .descriptor_count(set_count);

    let pool_sizes = &[size];
    let info = vk::DescriptorPoolCreateInfo::builder()
        .pool_sizes(pool_sizes)
        .max_sets(set_count);

    device
        .create_descriptor_pool(&info, None)
        .creating("descriptor pool")
}

unsafe fn allocate_sets(
    device: &Device,
    pool: vk::DescriptorPool,
    layout: vk::DescriptorSetLayout,
    count: u32,
) -> RenderResult<Vec<vk::DescriptorSet>> {
    let layouts = vec![layout; count as usize];
    let info = vk::DescriptorSetAllocateInfo::builder()
        .descriptor_pool(pool)
        .set_layouts(&layouts);

    device
        .allocate_descriptor_sets(&info)
        .creating("descriptor sets")
}

fn buffer_info((buffer, range): (vk::Buffer, u64)) -> vk::DescriptorBufferInfo {
    vk::DescriptorBufferInfo::builder()
        .buffer(buffer)
        .offset(0)
        .range(range)
        .build()
}

fn write(
    set: vk::DescriptorSet,
    binding: u32,
    info: &[vk::DescriptorBufferInfo],
) -> vk::WriteDescriptorSet {
    vk::WriteDescriptorSet::builder()
        .dst_set(set)
        .dst_binding(binding)
        .dst_array_element(0)
        .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
        .buffer_info(info)
        .build()
}
