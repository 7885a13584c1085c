use log::*;
use winit::window::Window;

use crate::scene::ModelUniform;
use crate::vulkan::{RenderContext, RenderResult};

/// The window-facing side of rendering: decides when the swapchain has to be
/// rebuilt and skips frames while there is nothing to draw into.
pub struct Renderer {
    context: RenderContext,
    resized: bool,
}

impl Renderer {
    pub unsafe fn create(window: &Window, title: &str, object_count: u32) -> RenderResult<Self> {
        let context = RenderContext::new(window, title, object_count)?;
        Ok(Self {
            context,
            resized: false,
        })
    }

    pub fn request_resize(&mut self) {
        self.resized = true;
    }

    pub fn extent(&self) -> (u32, u32) {
        self.context.extent()
    }

    pub fn set_models(&mut self, models: &[ModelUniform]) {
        self.context.set_models(models);
    }

    /// Renders one frame. Returns the new extent whenever the swapchain was
    /// rebuilt along the way.
    pub unsafe fn render(&mut self, window: &Window) -> RenderResult<Option<(u32, u32)>> {
        let size = window.inner_size();
        if size.width == 0 || size.height == 0 {
            trace!("Window minimized; skipping frame.");
            return Ok(None);
        }
        let size = (size.width, size.height);

        let mut recreated = false;
        if self.resized {
            self.resized = false;
            self.context.recreate(size)?;
            recreated = true;
        }

        let status = self.context.render()?;
        if status.needs_recreate() {
            debug!("Swapchain reported {:?}.", status);
            self.context.recreate(size)?;
            recreated = true;
        }

        Ok(recreated.then(|| self.context.extent()))
    }
}
