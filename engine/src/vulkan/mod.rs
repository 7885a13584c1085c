mod buffer;
mod command_buffer;
mod constants;
mod context;
mod descriptor;
mod device;
mod error;
mod framebuffer;
mod image;
mod instance;
mod pipeline;
mod render_pass;
mod swapchain;
mod sync;

pub use context::RenderContext;
pub use error::{RenderError, RenderResult};
