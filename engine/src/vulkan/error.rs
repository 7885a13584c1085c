use std::io;
use std::path::PathBuf;

use thiserror::Error;
use vulkanalia::vk;

/// Errors raised by the rendering core. Every variant names the step that
/// failed; none of them is recoverable except through swapchain recreation.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Failed to load the Vulkan library: {0}")]
    Loader(String),

    #[error("Validation layer requested but not supported.")]
    ValidationUnavailable,

    #[error("Failed to find a suitable physical device.")]
    DeviceSelection,

    #[error("Failed to create window surface: {0}")]
    SurfaceCreation(vk::ErrorCode),

    #[error("Surface reports no formats.")]
    NoSurfaceFormat,

    #[error("Failed to find a memory type with {0:?}.")]
    MemoryTypeNotFound(vk::MemoryPropertyFlags),

    #[error("Failed to query {what}: {code}")]
    Query {
        what: &'static str,
        code: vk::ErrorCode,
    },

    #[error("Failed to create {what}: {code}")]
    ResourceCreation {
        what: &'static str,
        code: vk::ErrorCode,
    },

    #[error("Failed to {what}: {code}")]
    Synchronization {
        what: &'static str,
        code: vk::ErrorCode,
    },

    #[error("Failed to submit {what}: {code}")]
    Submit {
        what: &'static str,
        code: vk::ErrorCode,
    },

    #[error("Payload of {len} bytes does not fit a {capacity} byte buffer.")]
    PayloadTooLarge { len: u64, capacity: u64 },

    #[error("Failed to read shader `{path}`: {source}")]
    ShaderLoad {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Shader `{0}` is not valid SPIR-V.")]
    ShaderBytecode(PathBuf),
}

pub type RenderResult<T> = Result<T, RenderError>;

/// Attaches the failing step to a raw Vulkan result.
pub(crate) trait VkResultExt<T> {
    fn querying(self, what: &'static str) -> RenderResult<T>;
    fn creating(self, what: &'static str) -> RenderResult<T>;
    fn syncing(self, what: &'static str) -> RenderResult<T>;
    fn submitting(self, what: &'static str) -> RenderResult<T>;
}

impl<T> VkResultExt<T> for Result<T, vk::ErrorCode> {
    fn querying(self, what: &'static str) -> RenderResult<T> {
        self.map_err(|code| RenderError::Query { what, code })
    }

    fn creating(self, what: &'static str) -> RenderResult<T> {
        self.map_err(|code| RenderError::ResourceCreation { what, code })
    }

    fn syncing(self, what: &'static str) -> RenderResult<T> {
        self.map_err(|code| RenderError::Synchronization { what, code })
    }

    fn submitting(self, what: &'static str) -> RenderResult<T> {
        self.map_err(|code| RenderError::Submit { what, code })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_failing_step() {
        let result: Result<(), vk::ErrorCode> = Err(vk::ErrorCode::OUT_OF_DEVICE_MEMORY);
        let error = result.creating("staging buffer").unwrap_err();
        assert!(error.to_string().starts_with("Failed to create staging buffer"));

        let result: Result<(), vk::ErrorCode> = Err(vk::ErrorCode::DEVICE_LOST);
        let error = result.submitting("draw command buffer").unwrap_err();
        assert!(matches!(error, RenderError::Submit { what: "draw command buffer", .. }));
    }
}
