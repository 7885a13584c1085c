use log::*;
use std::collections::HashSet;
use std::ffi::CStr;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::os::raw::c_void;
use std::path::Path;
use std::ptr;
use std::sync::Mutex;
use vulkanalia::loader::{LibloadingLoader, LIBRARY};
use vulkanalia::prelude::v1_0::*;
use vulkanalia::vk::ExtDebugUtilsExtension;
use vulkanalia::vk::Handle;
use vulkanalia::vk::KhrSurfaceExtension;
use vulkanalia::window as vk_window;
use winit::window::Window;

use super::constants;
use super::error::{RenderError, RenderResult, VkResultExt};

/// Owns the Vulkan instance together with everything that only depends on it:
/// the debug messenger, the window surface and the validation log sink.
///
/// Dropping it destroys the surface, then the messenger, then the instance.
/// It must therefore outlive the logical device.
pub struct VulkanInstance {
    pub vk_instance: Instance,
    pub surface: vk::SurfaceKHR,
    /// Whether the macOS portability extensions were enabled; the device
    /// then needs the portability subset too.
    pub portability: bool,
    messenger: vk::DebugUtilsMessengerEXT,
    validation_log: Option<Box<ValidationLog>>,
    // The loaded library has to stay alive as long as the instance commands.
    _entry: Entry,
}

impl VulkanInstance {
    pub unsafe fn new(window: &Window, title: &str) -> RenderResult<VulkanInstance> {
        let loader =
            LibloadingLoader::new(LIBRARY).map_err(|e| RenderError::Loader(e.to_string()))?;
        let entry = Entry::new(loader).map_err(|e| RenderError::Loader(e.to_string()))?;

        // Application Info
        let application_name = format!("{}\0", title);
        let application_info = vk::ApplicationInfo::builder()
            .application_name(application_name.as_bytes())
            .application_version(vk::make_version(1, 0, 0))
            .engine_name(b"Pong Engine\0")
            .engine_version(vk::make_version(1, 0, 0))
            .api_version(vk::make_version(1, 0, 0));

        // Layers
        let available_layers = entry
            .enumerate_instance_layer_properties()
            .querying("instance layers")?
            .iter()
            .map(|l| l.layer_name)
            .collect::<HashSet<_>>();

        if constants::VALIDATION_ENABLED && !available_layers.contains(&constants::VALIDATION_LAYER)
        {
            return Err(RenderError::ValidationUnavailable);
        }

        let layers = if constants::VALIDATION_ENABLED {
            vec![constants::VALIDATION_LAYER.as_ptr()]
        } else {
            Vec::new()
        };

        // Extensions
        let mut extensions = vk_window::get_required_instance_extensions(window)
            .iter()
            .map(|e| e.as_ptr())
            .collect::<Vec<_>>();

        // Required by Vulkan SDK on macOS since 1.3.216.
        let flags = if cfg!(target_os = "macos")
            && entry.version().querying("loader version")? >= constants::PORTABILITY_MACOS_VERSION
        {
            info!("Enabling extensions for macOS portability.");
            extensions.push(
                vk::KHR_GET_PHYSICAL_DEVICE_PROPERTIES2_EXTENSION
                    .name
                    .as_ptr(),
            );
            extensions.push(vk::KHR_PORTABILITY_ENUMERATION_EXTENSION.name.as_ptr());
            vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR
        } else {
            vk::InstanceCreateFlags::empty()
        };

        if constants::VALIDATION_ENABLED {
            extensions.push(vk::EXT_DEBUG_UTILS_EXTENSION.name.as_ptr());
        }

        // Validation sink
        let validation_log = if constants::VALIDATION_ENABLED {
            match ValidationLog::open(constants::VALIDATION_LOG_PATH) {
                Ok(log) => {
                    info!("Validation messages go to `{}`.", constants::VALIDATION_LOG_PATH);
                    Some(Box::new(log))
                }
                Err(error) => {
                    warn!(
                        "Could not open `{}` ({}); validation messages are only logged.",
                        constants::VALIDATION_LOG_PATH,
                        error
                    );
                    None
                }
            }
        } else {
            None
        };

        let user_data = validation_log
            .as_deref()
            .map_or(ptr::null_mut(), |log| log as *const ValidationLog as *mut c_void);

        // Create
        let mut debug_info = vk::DebugUtilsMessengerCreateInfoEXT {
            user_data,
            ..vk::DebugUtilsMessengerCreateInfoEXT::builder()
                .message_severity(
                    vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                        | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                        | vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE,
                )
                .message_type(
                    vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                        | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                        | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
                )
                .user_callback(Some(debug_callback))
                .build()
        };

        let mut info = vk::InstanceCreateInfo::builder()
            .application_info(&application_info)
            .enabled_layer_names(&layers)
            .enabled_extension_names(&extensions)
            .flags(flags);

        if constants::VALIDATION_ENABLED {
            info = info.push_next(&mut debug_info);
        }

        let vk_instance = entry.create_instance(&info, None).creating("instance")?;
        debug!("Created instance.");

        let mut instance = VulkanInstance {
            vk_instance,
            surface: vk::SurfaceKHR::null(),
            portability: flags.contains(vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR),
            messenger: vk::DebugUtilsMessengerEXT::null(),
            validation_log,
            _entry: entry,
        };

        // Messenger
        if constants::VALIDATION_ENABLED {
            instance.messenger = instance
                .vk_instance
                .create_debug_utils_messenger_ext(&debug_info, None)
                .creating("debug messenger")?;
        }

        // Surface
        instance.surface = vk_window::create_surface(&instance.vk_instance, window, window)
            .map_err(RenderError::SurfaceCreation)?;
        debug!("Created window surface.");

        Ok(instance)
    }
}

impl Drop for VulkanInstance {
    fn drop(&mut self) {
        unsafe {
            self.vk_instance.destroy_surface_khr(self.surface, None);
            if !self.messenger.is_null() {
                self.vk_instance
                    .destroy_debug_utils_messenger_ext(self.messenger, None);
            }
            self.vk_instance.destroy_instance(None);
        }
        if let Some(log) = &self.validation_log {
            log.flush();
        }
        debug!("Destroyed instance.");
    }
}

/// Append-only sink for validation layer messages.
pub struct ValidationLog {
    file: Mutex<BufWriter<File>>,
}

impl ValidationLog {
    pub fn open(path: impl AsRef<Path>) -> io::Result<ValidationLog> {
        let mut file = BufWriter::new(File::create(path)?);
        writeln!(file, "Opened validation log")?;
        Ok(ValidationLog {
            file: Mutex::new(file),
        })
    }

    pub fn append(&self, id_name: &str, message: &str) {
        if let Ok(mut file) = self.file.lock() {
            // A failed write must never turn into a hard error.
            let _ = writeln!(file, "Validation Layer\n{}\n{}\n", id_name, message);
        }
    }

    fn flush(&self) {
        if let Ok(mut file) = self.file.lock() {
            let _ = file.flush();
        }
    }
}

extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    type_: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    user_data: *mut c_void,
) -> vk::Bool32 {
    let data = unsafe { *data };
    let message = unsafe { cstr_lossy(data.message) };
    let id_name = unsafe { cstr_lossy(data.message_id_name) };

    if !user_data.is_null() {
        let log = unsafe { &*(user_data as *const ValidationLog) };
        log.append(&id_name, &message);
    }

    if severity >= vk::DebugUtilsMessageSeverityFlagsEXT::ERROR {
        error!("({:?}) {}", type_, message);
    } else if severity >= vk::DebugUtilsMessageSeverityFlagsEXT::WARNING {
        warn!("({:?}) {}", type_, message);
    } else if severity >= vk::DebugUtilsMessageSeverityFlagsEXT::INFO {
        debug!("({:?}) {}", type_, message);
    } else {
        trace!("({:?}) {}", type_, message);
    }

    vk::FALSE
}

unsafe fn cstr_lossy(ptr: *const std::os::raw::c_char) -> String {
    if ptr.is_null() {
        String::new()
    } else {
        CStr::from_ptr(ptr).to_string_lossy().into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn validation_log_appends_messages() {
        let path = std::env::temp_dir().join(format!("pong-validation-{}.txt", std::process::id()));
        let log = ValidationLog::open(&path).unwrap();
        log.append("VUID-vkCmdDraw-None-02699", "descriptor set not bound");
        log.append("Loader Message", "second message");
        log.flush();

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("Opened validation log"));
        assert!(contents.contains("VUID-vkCmdDraw-None-02699\ndescriptor set not bound"));
        assert!(contents.contains("Loader Message\nsecond message"));
        let _ = fs::remove_file(path);
    }
}
