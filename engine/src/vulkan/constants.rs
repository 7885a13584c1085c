use vulkanalia::{vk, Version};

pub const PORTABILITY_MACOS_VERSION: Version = Version::new(1, 3, 216);
pub const VALIDATION_ENABLED: bool = cfg!(debug_assertions);
pub const VALIDATION_LAYER: vk::ExtensionName =
    vk::ExtensionName::from_bytes(b"VK_LAYER_KHRONOS_validation");
pub const DEVICE_EXTENSIONS: &[vk::ExtensionName] = &[vk::KHR_SWAPCHAIN_EXTENSION.name];

/// File every validation message is appended to while validation is enabled.
pub const VALIDATION_LOG_PATH: &str = "debug.txt";

pub const VERTEX_SHADER_PATH: &str = "shaders/vert.spv";
pub const FRAGMENT_SHADER_PATH: &str = "shaders/frag.spv";

pub const CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];
