//! Instance creation against the installed Vulkan loader.
//!
//! Skips when no loader or driver is present.

use vista_rhi::instance::Instance;
use vista_rhi::vk;
use vista_rhi::RhiError;

fn try_instance(validation: bool) -> Option<Instance> {
    match Instance::new(validation, &[]) {
        Ok(instance) => Some(instance),
        Err(RhiError::LoadingError(e)) => {
            eprintln!("Skipping: Vulkan loader unavailable ({})", e);
            None
        }
        Err(RhiError::VulkanError(e)) => {
            eprintln!("Skipping: instance creation failed ({:?})", e);
            None
        }
        Err(e) => panic!("unexpected instance error: {}", e),
    }
}

#[test]
fn test_headless_instance_enumerates_devices() {
    let Some(instance) = try_instance(false) else {
        return;
    };
    assert!(!instance.has_validation());

    let devices = unsafe { instance.handle().enumerate_physical_devices() }
        .unwrap_or_default();
    for device in devices {
        let properties = unsafe { instance.handle().get_physical_device_properties(device) };
        assert!(properties.api_version >= vk::API_VERSION_1_0);
    }
}

#[test]
fn test_validation_request_never_fails_on_missing_layer() {
    // A missing validation layer is logged and ignored, not an error.
    let _ = try_instance(true);
}
