//! GPU selection.
//!
//! A device qualifies when it has a graphics queue, a queue that can present
//! to the window surface, the swapchain extension, a usable swapchain for the
//! surface, and sampler anisotropy. Among qualifying devices the highest
//! score wins; discrete GPUs dominate the score.

use std::ffi::CStr;

use ash::vk;
use tracing::{debug, info, warn};

use crate::device::DEVICE_EXTENSIONS;
use crate::error::{RhiError, RhiResult};

/// Queue families used by the renderer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics_family: Option<u32>,
    pub present_family: Option<u32>,
}

impl QueueFamilyIndices {
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.graphics_family.is_some() && self.present_family.is_some()
    }

    /// Distinct families, graphics first. One queue is created per entry.
    pub fn unique_families(&self) -> Vec<u32> {
        let mut families = Vec::with_capacity(2);
        for family in [self.graphics_family, self.present_family].into_iter().flatten() {
            if !families.contains(&family) {
                families.push(family);
            }
        }
        families
    }

    /// True when graphics and present live in different families.
    pub fn is_split(&self) -> bool {
        self.graphics_family != self.present_family
    }
}

/// Everything needed to create the logical device for a chosen GPU.
#[derive(Clone)]
pub struct PhysicalDeviceInfo {
    pub device: vk::PhysicalDevice,
    pub properties: vk::PhysicalDeviceProperties,
    pub features: vk::PhysicalDeviceFeatures,
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    pub queue_families: QueueFamilyIndices,
}

impl PhysicalDeviceInfo {
    pub fn device_name(&self) -> &str {
        self.properties
            .device_name_as_c_str()
            .ok()
            .and_then(|name| name.to_str().ok())
            .unwrap_or("Unknown Device")
    }

    pub fn device_type_name(&self) -> &'static str {
        match self.properties.device_type {
            vk::PhysicalDeviceType::DISCRETE_GPU => "Discrete GPU",
            vk::PhysicalDeviceType::INTEGRATED_GPU => "Integrated GPU",
            vk::PhysicalDeviceType::VIRTUAL_GPU => "Virtual GPU",
            vk::PhysicalDeviceType::CPU => "CPU",
            _ => "Other",
        }
    }

    /// Sum of all device-local heaps, in bytes.
    pub fn device_local_memory(&self) -> u64 {
        self.memory_properties
            .memory_heaps
            .iter()
            .take(self.memory_properties.memory_heap_count as usize)
            .filter(|heap| heap.flags.contains(vk::MemoryHeapFlags::DEVICE_LOCAL))
            .map(|heap| heap.size)
            .sum()
    }

    #[inline]
    pub fn max_sampler_anisotropy(&self) -> f32 {
        self.properties.limits.max_sampler_anisotropy
    }
}

impl std::fmt::Debug for PhysicalDeviceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhysicalDeviceInfo")
            .field("name", &self.device_name())
            .field("type", &self.device_type_name())
            .field("queue_families", &self.queue_families)
            .finish()
    }
}

/// Picks the best GPU that can render to `surface`.
///
/// # Errors
///
/// [`RhiError::NoSuitableGpu`] when nothing qualifies. The viewer has no
/// fallback path, so callers treat this as fatal.
pub fn select_physical_device(
    instance: &ash::Instance,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> RhiResult<PhysicalDeviceInfo> {
    let devices = unsafe { instance.enumerate_physical_devices()? };
    info!("Found {} GPU(s)", devices.len());

    let best = devices
        .into_iter()
        .filter_map(|device| check_device(instance, device, surface, surface_loader))
        .map(|info| {
            let score = rate_device(&info);
            debug!("GPU '{}' ({}) scored {}", info.device_name(), info.device_type_name(), score);
            (info, score)
        })
        .max_by_key(|(_, score)| *score);

    match best {
        Some((info, score)) => {
            info!(
                "Selected GPU '{}' ({}), score {}",
                info.device_name(),
                info.device_type_name(),
                score
            );
            Ok(info)
        }
        None => {
            warn!("No GPU satisfies the renderer's requirements");
            Err(RhiError::NoSuitableGpu)
        }
    }
}

fn check_device(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> Option<PhysicalDeviceInfo> {
    let properties = unsafe { instance.get_physical_device_properties(device) };
    let features = unsafe { instance.get_physical_device_features(device) };
    let memory_properties = unsafe { instance.get_physical_device_memory_properties(device) };
    let name = properties
        .device_name_as_c_str()
        .ok()
        .and_then(|n| n.to_str().ok())
        .unwrap_or("Unknown")
        .to_owned();

    let queue_families = find_queue_families(instance, device, surface, surface_loader);
    if !queue_families.is_complete() {
        debug!("GPU '{}' skipped: no graphics/present queue", name);
        return None;
    }

    let extensions = unsafe {
        instance
            .enumerate_device_extension_properties(device)
            .unwrap_or_default()
    };
    let available: Vec<&CStr> = extensions
        .iter()
        .filter_map(|ext| ext.extension_name_as_c_str().ok())
        .collect();
    if let Some(missing) = missing_extensions(&available, DEVICE_EXTENSIONS).first() {
        debug!("GPU '{}' skipped: missing {:?}", name, missing);
        return None;
    }

    let has_formats = unsafe {
        surface_loader
            .get_physical_device_surface_formats(device, surface)
            .map(|f| !f.is_empty())
            .unwrap_or(false)
    };
    let has_modes = unsafe {
        surface_loader
            .get_physical_device_surface_present_modes(device, surface)
            .map(|m| !m.is_empty())
            .unwrap_or(false)
    };
    if !(has_formats && has_modes) {
        debug!("GPU '{}' skipped: surface has no formats or present modes", name);
        return None;
    }

    if features.sampler_anisotropy == vk::FALSE {
        debug!("GPU '{}' skipped: no sampler anisotropy", name);
        return None;
    }

    Some(PhysicalDeviceInfo {
        device,
        properties,
        features,
        memory_properties,
        queue_families,
    })
}

/// Names in `required` that are absent from `available`.
pub fn missing_extensions<'a>(available: &[&CStr], required: &[&'a CStr]) -> Vec<&'a CStr> {
    required
        .iter()
        .copied()
        .filter(|req| !available.contains(req))
        .collect()
}

fn find_queue_families(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> QueueFamilyIndices {
    let families = unsafe { instance.get_physical_device_queue_family_properties(device) };
    let mut indices = QueueFamilyIndices::default();

    for (i, family) in families.iter().enumerate() {
        let i = i as u32;
        if family.queue_count == 0 {
            continue;
        }

        let graphics = family.queue_flags.contains(vk::QueueFlags::GRAPHICS);
        let present = unsafe {
            surface_loader
                .get_physical_device_surface_support(device, i, surface)
                .unwrap_or(false)
        };

        // A family that does both avoids concurrent sharing on the swapchain.
        if graphics && present {
            return QueueFamilyIndices {
                graphics_family: Some(i),
                present_family: Some(i),
            };
        }
        if graphics && indices.graphics_family.is_none() {
            indices.graphics_family = Some(i);
        }
        if present && indices.present_family.is_none() {
            indices.present_family = Some(i);
        }
    }

    indices
}

fn rate_device(info: &PhysicalDeviceInfo) -> u64 {
    let type_score: u64 = match info.properties.device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 100_000,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 10_000,
        vk::PhysicalDeviceType::VIRTUAL_GPU => 1_000,
        vk::PhysicalDeviceType::CPU => 10,
        _ => 1,
    };
    let vram_mb = (info.device_local_memory() / (1024 * 1024)).min(32_000);

    type_score + vram_mb + u64::from(info.properties.limits.max_image_dimension2_d)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incomplete_without_present() {
        let indices = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: None,
        };
        assert!(!indices.is_complete());
        assert_eq!(indices.unique_families(), vec![0]);
    }

    #[test]
    fn test_unique_families_dedups_shared_family() {
        let shared = QueueFamilyIndices {
            graphics_family: Some(2),
            present_family: Some(2),
        };
        assert!(shared.is_complete());
        assert!(!shared.is_split());
        assert_eq!(shared.unique_families(), vec![2]);

        let split = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: Some(1),
        };
        assert!(split.is_split());
        assert_eq!(split.unique_families(), vec![0, 1]);
    }

    #[test]
    fn test_missing_extensions() {
        let available = [ash::khr::swapchain::NAME];
        assert!(missing_extensions(&available, DEVICE_EXTENSIONS).is_empty());
        assert_eq!(
            missing_extensions(&[], DEVICE_EXTENSIONS),
            vec![ash::khr::swapchain::NAME]
        );
    }

    #[test]
    fn test_discrete_outranks_integrated() {
        let mut discrete = PhysicalDeviceInfo {
            device: vk::PhysicalDevice::null(),
            properties: vk::PhysicalDeviceProperties::default(),
            features: vk::PhysicalDeviceFeatures::default(),
            memory_properties: vk::PhysicalDeviceMemoryProperties::default(),
            queue_families: QueueFamilyIndices::default(),
        };
        let mut integrated = discrete.clone();
        discrete.properties.device_type = vk::PhysicalDeviceType::DISCRETE_GPU;
        integrated.properties.device_type = vk::PhysicalDeviceType::INTEGRATED_GPU;
        integrated.properties.limits.max_image_dimension2_d = 16384;

        assert!(rate_device(&discrete) > rate_device(&integrated));
    }
}
