//! Vulkan instance and validation messenger.
//!
//! ```no_run
//! use vista_rhi::instance::Instance;
//!
//! // Surface extensions normally come from the window.
//! let surface_exts = [ash::khr::surface::NAME.as_ptr()];
//! let instance = Instance::new(cfg!(debug_assertions), &surface_exts)?;
//! assert_eq!(instance.has_validation(), instance.has_validation());
//! # Ok::<(), vista_rhi::RhiError>(())
//! ```

use std::borrow::Cow;
use std::ffi::{CStr, c_char, c_void};

use ash::{Entry, vk};
use tracing::{debug, error, info, warn};

use crate::error::{RhiError, RhiResult};

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Owns the loader entry, the `VkInstance` and, when validation is on, the
/// debug-utils messenger that forwards validation output to `tracing`.
pub struct Instance {
    entry: Entry,
    instance: ash::Instance,
    debug: Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
}

impl Instance {
    /// Creates a Vulkan 1.3 instance with `required_extensions` enabled.
    ///
    /// Validation is enabled only if requested and the layer is installed;
    /// a missing layer is logged, not treated as an error.
    pub fn new(enable_validation: bool, required_extensions: &[*const c_char]) -> RhiResult<Self> {
        let entry = unsafe { Entry::load()? };

        let validation = enable_validation && Self::has_layer(&entry, VALIDATION_LAYER)?;
        if enable_validation && !validation {
            warn!("Validation layer requested but not installed; continuing without it");
        }

        let app_info = vk::ApplicationInfo::default()
            .application_name(c"vista")
            .application_version(vk::make_api_version(0, 0, 1, 0))
            .engine_name(c"vista")
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(vk::API_VERSION_1_3);

        let mut extensions = required_extensions.to_vec();
        let mut layers = Vec::new();
        if validation {
            extensions.push(ash::ext::debug_utils::NAME.as_ptr());
            layers.push(VALIDATION_LAYER.as_ptr());
        }

        let create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layers);

        let instance = unsafe { entry.create_instance(&create_info, None)? };
        info!(
            "Vulkan instance created ({} extension(s), validation {})",
            extensions.len(),
            if validation { "on" } else { "off" }
        );

        let debug = if validation {
            let loader = ash::ext::debug_utils::Instance::new(&entry, &instance);
            match Self::create_messenger(&loader) {
                Ok(messenger) => Some((loader, messenger)),
                Err(e) => {
                    unsafe { instance.destroy_instance(None) };
                    return Err(e);
                }
            }
        } else {
            None
        };

        Ok(Self {
            entry,
            instance,
            debug,
        })
    }

    #[inline]
    pub fn handle(&self) -> &ash::Instance {
        &self.instance
    }

    #[inline]
    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    #[inline]
    pub fn has_validation(&self) -> bool {
        self.debug.is_some()
    }

    fn has_layer(entry: &Entry, name: &CStr) -> RhiResult<bool> {
        let layers = unsafe { entry.enumerate_instance_layer_properties()? };
        Ok(layers
            .iter()
            .any(|layer| layer.layer_name_as_c_str().is_ok_and(|n| n == name)))
    }

    fn create_messenger(
        loader: &ash::ext::debug_utils::Instance,
    ) -> RhiResult<vk::DebugUtilsMessengerEXT> {
        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(forward_to_tracing));

        let messenger = unsafe { loader.create_debug_utils_messenger(&create_info, None)? };
        debug!("Debug messenger installed");
        Ok(messenger)
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        unsafe {
            if let Some((loader, messenger)) = self.debug.take() {
                loader.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
        info!("Vulkan instance destroyed");
    }
}

/// Maps a message type to the tag used in log lines.
fn message_kind(kind: vk::DebugUtilsMessageTypeFlagsEXT) -> &'static str {
    if kind.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
        "validation"
    } else if kind.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
        "performance"
    } else {
        "general"
    }
}

/// Debug-utils callback.
///
/// # Safety
///
/// Called by the loader with a valid (or null) callback-data pointer.
unsafe extern "system" fn forward_to_tracing(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    kind: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user_data: *mut c_void,
) -> vk::Bool32 {
    if data.is_null() {
        return vk::FALSE;
    }

    let data = unsafe { &*data };
    let message = if data.p_message.is_null() {
        Cow::Borrowed("(no message)")
    } else {
        unsafe { CStr::from_ptr(data.p_message).to_string_lossy() }
    };
    let kind = message_kind(kind);

    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        error!(target: "vista::vulkan", "[{}] {}", kind, message);
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        warn!(target: "vista::vulkan", "[{}] {}", kind, message);
    } else {
        debug!(target: "vista::vulkan", "[{}] {}", kind, message);
    }

    vk::FALSE
}
