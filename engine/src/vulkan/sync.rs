use log::*;
use std::rc::Rc;
use vulkanalia::prelude::v1_0::*;

use super::error::{RenderResult, VkResultExt};

/// Per-slot semaphores and fences. Fences start signaled so the first wait
/// on every slot returns immediately.
pub struct SyncObjects {
    pub image_available: Vec<vk::Semaphore>,
    pub render_finished: Vec<vk::Semaphore>,
    pub in_flight: Vec<vk::Fence>,
    device: Rc<Device>,
}

impl SyncObjects {
    pub unsafe fn new(device: &Rc<Device>, slot_count: usize) -> RenderResult<SyncObjects> {
        let mut sync = SyncObjects {
            image_available: Vec::with_capacity(slot_count),
            render_finished: Vec::with_capacity(slot_count),
            in_flight: Vec::with_capacity(slot_count),
            device: device.clone(),
        };

        let semaphore_info = vk::SemaphoreCreateInfo::builder();
        let fence_info = vk::FenceCreateInfo::builder().flags(vk::FenceCreateFlags::SIGNALED);

        for _ in 0..slot_count {
            sync.image_available.push(
                device
                    .create_semaphore(&semaphore_info, None)
                    .syncing("create image-available semaphore")?,
            );
            sync.render_finished.push(
                device
                    .create_semaphore(&semaphore_info, None)
                    .syncing("create render-finished semaphore")?,
            );
            sync.in_flight.push(
                device
                    .create_fence(&fence_info, None)
                    .syncing("create in-flight fence")?,
            );
        }

        debug!("Created sync objects for {} frame slots.", slot_count);
        Ok(sync)
    }
}

impl Drop for SyncObjects {
    fn drop(&mut self) {
        unsafe {
            self.in_flight
                .iter()
                .for_each(|f| self.device.destroy_fence(*f, None));
            self.render_finished
                .iter()
                .chain(&self.image_available)
                .for_each(|s| self.device.destroy_semaphore(*s, None));
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Acquire {
    Image(usize),
    OutOfDate,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FrameStatus {
    Presented,
    /// Presented, but the swapchain no longer matches the surface exactly.
    Suboptimal,
    /// Nothing was drawn; the swapchain must be rebuilt first.
    OutOfDate,
}

impl FrameStatus {
    pub fn needs_recreate(self) -> bool {
        self != FrameStatus::Presented
    }
}

/// The GPU operations one frame is made of. Waits block without a timeout.
pub trait FrameDriver {
    type Fence: Copy + PartialEq;

    fn wait_for_fence(&mut self, fence: Self::Fence) -> RenderResult<()>;
    fn reset_fence(&mut self, fence: Self::Fence) -> RenderResult<()>;
    fn acquire_next_image(&mut self, slot: usize) -> RenderResult<Acquire>;
    fn upload_uniforms(&mut self) -> RenderResult<()>;
    fn submit(&mut self, slot: usize, image: usize, fence: Self::Fence) -> RenderResult<()>;
    fn present(&mut self, slot: usize, image: usize) -> RenderResult<FrameStatus>;
}

/// Tracks which slot is next and which slot's fence last used each image.
#[derive(Debug)]
pub struct FrameSync<F> {
    slot_fences: Vec<F>,
    image_fences: Vec<Option<F>>,
    slot: usize,
}

impl<F: Copy + PartialEq> FrameSync<F> {
    pub fn new(slot_fences: Vec<F>, image_count: usize) -> FrameSync<F> {
        FrameSync {
            slot_fences,
            image_fences: vec![None; image_count],
            slot: 0,
        }
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn draw<D: FrameDriver<Fence = F>>(&mut self, driver: &mut D) -> RenderResult<FrameStatus> {
        let fence = self.slot_fences[self.slot];
        driver.wait_for_fence(fence)?;

        let image = match driver.acquire_next_image(self.slot)? {
            Acquire::Image(image) => image,
            Acquire::OutOfDate => return Ok(FrameStatus::OutOfDate),
        };

        if let Some(image_fence) = self.image_fences[image] {
            if image_fence != fence {
                driver.wait_for_fence(image_fence)?;
            }
        }
        self.image_fences[image] = Some(fence);

        driver.upload_uniforms()?;

        driver.reset_fence(fence)?;
        driver.submit(self.slot, image, fence)?;
        let status = driver.present(self.slot, image)?;

        self.slot = (self.slot + 1) % self.slot_fences.len();
        Ok(status)
    }
}
