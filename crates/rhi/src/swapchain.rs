//! Swapchain creation and recreation.
//!
//! Lifecycle: `Uninitialized -> Created -> Created (recreate) -> Destroyed`.
//! Images and views are always replaced together; individual images are
//! never patched. Framebuffers and the depth attachment live with the
//! renderer and are rebuilt whenever [`Swapchain::recreate`] succeeds.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info, warn};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::instance::Instance;

/// Swapchain surface support details.
///
/// Queried fresh on every create, since a resize can change the surface
/// capabilities.
#[derive(Debug, Clone)]
pub struct SwapchainSupportDetails {
    /// Surface capabilities (image count limits, current extent, transforms).
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    /// Supported format and color space pairs.
    pub formats: Vec<vk::SurfaceFormatKHR>,
    /// Supported present modes.
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapchainSupportDetails {
    /// Queries support details for `physical_device` against `surface`.
    ///
    /// # Arguments
    ///
    /// * `physical_device` - The GPU to query
    /// * `surface` - The window surface
    /// * `surface_loader` - The surface extension loader
    ///
    /// # Errors
    ///
    /// Returns an error if any of the three surface queries fails.
    pub fn query(
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        surface_loader: &ash::khr::surface::Instance,
    ) -> RhiResult<Self> {
        let capabilities = unsafe {
            surface_loader.get_physical_device_surface_capabilities(physical_device, surface)?
        };
        let formats = unsafe {
            surface_loader.get_physical_device_surface_formats(physical_device, surface)?
        };
        let present_modes = unsafe {
            surface_loader.get_physical_device_surface_present_modes(physical_device, surface)?
        };

        Ok(Self {
            capabilities,
            formats,
            present_modes,
        })
    }

    /// True when at least one format and one present mode are offered.
    #[inline]
    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}

/// Lifecycle state of a [`Swapchain`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SwapchainState {
    /// No usable images, either before the first create or after a
    /// recreate that failed halfway.
    Uninitialized,
    /// Images and views exist and can be acquired.
    Created,
    /// Released for good; recreation is refused.
    Destroyed,
}

impl SwapchainState {
    /// Only a created swapchain can acquire and present.
    #[inline]
    pub fn is_usable(self) -> bool {
        self == SwapchainState::Created
    }
}

/// Owned `VkSwapchainKHR` plus its images and image views.
///
/// The surface is borrowed by handle and must outlive the swapchain; the
/// renderer guarantees this through field order.
///
/// # Thread Safety
///
/// Acquire and present must be externally synchronized with the queue they
/// are submitted to. The viewer drives both from the main thread.
pub struct Swapchain {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// `VK_KHR_swapchain` device functions.
    swapchain_loader: ash::khr::swapchain::Device,
    /// `VK_KHR_surface` instance functions, for support queries.
    surface_loader: ash::khr::surface::Instance,
    /// Target surface (not owned).
    surface: vk::SurfaceKHR,
    /// Swapchain handle, null while uninitialized.
    swapchain: vk::SwapchainKHR,
    /// Images owned by the swapchain.
    images: Vec<vk::Image>,
    /// One color view per image, owned by us.
    image_views: Vec<vk::ImageView>,
    /// Chosen surface format.
    format: vk::Format,
    /// Current image extent.
    extent: vk::Extent2D,
    /// Chosen present mode.
    present_mode: vk::PresentModeKHR,
    /// Lifecycle state.
    state: SwapchainState,
}

impl Swapchain {
    /// Creates a swapchain for `surface`.
    ///
    /// # Arguments
    ///
    /// * `instance` - Instance the surface belongs to
    /// * `device` - The logical device
    /// * `surface` - Window surface to present to
    /// * `width`, `height` - Framebuffer size, used when the surface leaves
    ///   the extent to the application
    ///
    /// # Errors
    ///
    /// Returns an error if support queries fail, the surface offers no
    /// formats or present modes, or swapchain or view creation fails.
    pub fn new(
        instance: &Instance,
        device: Arc<Device>,
        surface: vk::SurfaceKHR,
        width: u32,
        height: u32,
    ) -> RhiResult<Self> {
        let mut swapchain = Self {
            swapchain_loader: ash::khr::swapchain::Device::new(instance.handle(), device.handle()),
            surface_loader: ash::khr::surface::Instance::new(instance.entry(), instance.handle()),
            device,
            surface,
            swapchain: vk::SwapchainKHR::null(),
            images: Vec::new(),
            image_views: Vec::new(),
            format: vk::Format::UNDEFINED,
            extent: vk::Extent2D::default(),
            present_mode: vk::PresentModeKHR::FIFO,
            state: SwapchainState::Uninitialized,
        };
        swapchain.create(width, height)?;
        Ok(swapchain)
    }

    fn create(&mut self, width: u32, height: u32) -> RhiResult<()> {
        let support = SwapchainSupportDetails::query(
            self.device.physical_device(),
            self.surface,
            &self.surface_loader,
        )?;
        if !support.is_adequate() {
            return Err(RhiError::SwapchainError(
                "Inadequate swapchain support (no formats or present modes)".to_string(),
            ));
        }

        let surface_format = choose_surface_format(&support.formats);
        let present_mode = choose_present_mode(&support.present_modes);
        let extent = choose_extent(&support.capabilities, width, height);
        let image_count = determine_image_count(&support.capabilities);

        let families = self.device.queue_families();
        let present_family = families.present_family.ok_or_else(|| {
            RhiError::SwapchainError("Device has no present queue family".to_string())
        })?;
        let (sharing_mode, family_indices) =
            choose_sharing(self.device.graphics_family(), present_family);

        info!(
            "Creating swapchain: {}x{}, {:?}, {:?}, {} images",
            extent.width, extent.height, surface_format.format, present_mode, image_count
        );

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(self.surface)
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(sharing_mode)
            .queue_family_indices(&family_indices)
            .pre_transform(support.capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(vk::SwapchainKHR::null());

        let swapchain = unsafe { self.swapchain_loader.create_swapchain(&create_info, None)? };
        self.swapchain = swapchain;

        self.images = unsafe { self.swapchain_loader.get_swapchain_images(swapchain)? };
        self.image_views = create_image_views(&self.device, &self.images, surface_format.format)?;
        self.format = surface_format.format;
        self.extent = extent;
        self.present_mode = present_mode;
        self.state = SwapchainState::Created;

        debug!("Swapchain created with {} images", self.images.len());
        Ok(())
    }

    /// Waits for the GPU, tears everything down and builds it again.
    ///
    /// The caller must have waited for a non-zero framebuffer size. Safe to
    /// call repeatedly: each call replaces whatever exists. On failure the
    /// state is `Uninitialized` and a later call may retry.
    pub fn recreate(&mut self, width: u32, height: u32) -> RhiResult<()> {
        if self.state == SwapchainState::Destroyed {
            return Err(RhiError::SwapchainError(
                "Cannot recreate a destroyed swapchain".to_string(),
            ));
        }
        if width == 0 || height == 0 {
            return Err(RhiError::SwapchainError(format!(
                "Cannot recreate swapchain at {}x{}",
                width, height
            )));
        }

        self.device.wait_idle()?;
        info!("Recreating swapchain for {}x{}", width, height);

        self.release();
        self.state = SwapchainState::Uninitialized;
        self.create(width, height)
    }

    /// Releases the images and the swapchain. Idempotent.
    ///
    /// Also run by `Drop`; explicit calls are only needed to release the
    /// swapchain before its owner goes away.
    pub fn destroy(&mut self) {
        if self.state == SwapchainState::Destroyed {
            return;
        }
        self.release();
        self.state = SwapchainState::Destroyed;
    }

    fn release(&mut self) {
        for view in std::mem::take(&mut self.image_views) {
            unsafe {
                self.device.handle().destroy_image_view(view, None);
            }
        }
        self.images.clear();

        let swapchain = std::mem::replace(&mut self.swapchain, vk::SwapchainKHR::null());
        if swapchain != vk::SwapchainKHR::null() {
            unsafe {
                self.swapchain_loader.destroy_swapchain(swapchain, None);
            }
        }
    }

    /// Acquires the next image, signaling `semaphore` when it is ready.
    ///
    /// # Returns
    ///
    /// `Ok((index, suboptimal))`. `Err(ERROR_OUT_OF_DATE_KHR)` means the
    /// swapchain must be recreated before rendering; it is also returned
    /// when the swapchain is not in the `Created` state.
    pub fn acquire_next_image(&self, semaphore: vk::Semaphore) -> Result<(u32, bool), vk::Result> {
        // A released swapchain has nothing to acquire; ask for a rebuild.
        if !self.state.is_usable() {
            return Err(vk::Result::ERROR_OUT_OF_DATE_KHR);
        }
        unsafe {
            self.swapchain_loader.acquire_next_image(
                self.swapchain,
                u64::MAX,
                semaphore,
                vk::Fence::null(),
            )
        }
    }

    /// Queues `image_index` for presentation after `wait_semaphore`.
    ///
    /// # Arguments
    ///
    /// * `queue` - A queue from a present-capable family
    /// * `image_index` - Index returned by [`acquire_next_image`](Self::acquire_next_image)
    /// * `wait_semaphore` - Signaled when rendering to the image has finished
    ///
    /// # Returns
    ///
    /// `Ok(true)` when the swapchain is suboptimal. Out-of-date is reported
    /// as an error and handled by the caller.
    pub fn present(
        &self,
        queue: vk::Queue,
        image_index: u32,
        wait_semaphore: vk::Semaphore,
    ) -> Result<bool, vk::Result> {
        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let wait_semaphores = [wait_semaphore];

        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        unsafe { self.swapchain_loader.queue_present(queue, &present_info) }
    }

    /// Current lifecycle state.
    #[inline]
    pub fn state(&self) -> SwapchainState {
        self.state
    }

    /// Color format of the swapchain images.
    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    /// Image extent; framebuffers and the depth attachment must match it.
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Present mode chosen at the last create.
    #[inline]
    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    /// Number of images the implementation actually created.
    #[inline]
    pub fn image_count(&self) -> u32 {
        self.images.len() as u32
    }

    /// Views in image index order.
    #[inline]
    pub fn image_views(&self) -> &[vk::ImageView] {
        &self.image_views
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        self.destroy();
        debug!("Swapchain destroyed");
    }
}

/// `B8G8R8A8_SRGB` with the sRGB non-linear color space, else the first format.
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    let preferred = formats.iter().find(|f| {
        f.format == vk::Format::B8G8R8A8_SRGB && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
    });

    match preferred {
        Some(&format) => format,
        None => {
            let first = formats.first().copied().unwrap_or_default();
            warn!("Preferred surface format unavailable, using {:?}", first.format);
            first
        }
    }
}

/// `MAILBOX` when offered, otherwise `FIFO`, which is always available.
pub fn choose_present_mode(present_modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    if present_modes.contains(&vk::PresentModeKHR::MAILBOX) {
        vk::PresentModeKHR::MAILBOX
    } else {
        vk::PresentModeKHR::FIFO
    }
}

/// The surface's current extent, or the framebuffer size clamped to the
/// surface limits when the surface reports the `u32::MAX` sentinel.
pub fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    width: u32,
    height: u32,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }

    vk::Extent2D {
        width: width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    }
}

/// One more than the minimum, capped by the maximum (0 means no maximum).
pub fn determine_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let preferred = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 {
        preferred.min(capabilities.max_image_count)
    } else {
        preferred
    }
}

/// Concurrent sharing between distinct graphics and present families,
/// exclusive otherwise.
pub fn choose_sharing(graphics_family: u32, present_family: u32) -> (vk::SharingMode, Vec<u32>) {
    if graphics_family != present_family {
        (
            vk::SharingMode::CONCURRENT,
            vec![graphics_family, present_family],
        )
    } else {
        (vk::SharingMode::EXCLUSIVE, Vec::new())
    }
}

fn create_image_views(
    device: &Device,
    images: &[vk::Image],
    format: vk::Format,
) -> RhiResult<Vec<vk::ImageView>> {
    let mut image_views = Vec::with_capacity(images.len());

    for (i, &image) in images.iter().enumerate() {
        let create_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .components(vk::ComponentMapping::default())
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(vk::ImageAspectFlags::COLOR)
                    .level_count(1)
                    .layer_count(1),
            );

        match unsafe { device.handle().create_image_view(&create_info, None) } {
            Ok(view) => image_views.push(view),
            Err(e) => {
                for view in image_views {
                    unsafe { device.handle().destroy_image_view(view, None) };
                }
                return Err(RhiError::SwapchainError(format!(
                    "Failed to create image view {}: {:?}",
                    i, e
                )));
            }
        }
    }

    Ok(image_views)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surface_format(format: vk::Format) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }
    }

    #[test]
    fn test_choose_surface_format_prefers_srgb() {
        let formats = vec![
            surface_format(vk::Format::R8G8B8A8_UNORM),
            surface_format(vk::Format::B8G8R8A8_SRGB),
        ];
        assert_eq!(
            choose_surface_format(&formats).format,
            vk::Format::B8G8R8A8_SRGB
        );
    }

    #[test]
    fn test_choose_surface_format_falls_back_to_first() {
        let formats = vec![
            surface_format(vk::Format::R8G8B8A8_UNORM),
            surface_format(vk::Format::B8G8R8A8_UNORM),
        ];
        assert_eq!(
            choose_surface_format(&formats).format,
            vk::Format::R8G8B8A8_UNORM
        );
    }

    #[test]
    fn test_choose_present_mode() {
        let modes = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX];
        assert_eq!(choose_present_mode(&modes), vk::PresentModeKHR::MAILBOX);

        let modes = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::IMMEDIATE];
        assert_eq!(choose_present_mode(&modes), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn test_choose_extent_uses_current() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: 1920,
                height: 1080,
            },
            ..Default::default()
        };
        let extent = choose_extent(&capabilities, 800, 600);
        assert_eq!((extent.width, extent.height), (1920, 1080));
    }

    #[test]
    fn test_choose_extent_clamps_framebuffer_size() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D {
                width: 100,
                height: 100,
            },
            max_image_extent: vk::Extent2D {
                width: 2000,
                height: 2000,
            },
            ..Default::default()
        };

        let extent = choose_extent(&capabilities, 3000, 50);
        assert_eq!((extent.width, extent.height), (2000, 100));

        let extent = choose_extent(&capabilities, 800, 600);
        assert_eq!((extent.width, extent.height), (800, 600));
    }

    #[test]
    fn test_determine_image_count() {
        let capped = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 2,
            ..Default::default()
        };
        assert_eq!(determine_image_count(&capped), 2);

        let unbounded = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 0,
            ..Default::default()
        };
        assert_eq!(determine_image_count(&unbounded), 3);
    }

    #[test]
    fn test_choose_sharing() {
        let (mode, families) = choose_sharing(0, 0);
        assert_eq!(mode, vk::SharingMode::EXCLUSIVE);
        assert!(families.is_empty());

        let (mode, families) = choose_sharing(0, 2);
        assert_eq!(mode, vk::SharingMode::CONCURRENT);
        assert_eq!(families, vec![0, 2]);
    }

    #[test]
    fn test_state_usable() {
        assert!(SwapchainState::Created.is_usable());
        assert!(!SwapchainState::Uninitialized.is_usable());
        assert!(!SwapchainState::Destroyed.is_usable());
    }

    #[test]
    fn test_support_details_adequate() {
        let details = SwapchainSupportDetails {
            capabilities: vk::SurfaceCapabilitiesKHR::default(),
            formats: vec![],
            present_modes: vec![vk::PresentModeKHR::FIFO],
        };
        assert!(!details.is_adequate());
    }
}
