//! The depth attachment shared by every framebuffer.
//!
//! Its extent always equals the swapchain extent. A swapchain rebuild at an
//! unchanged size (suboptimal or out-of-date without a resize) keeps the
//! existing buffer. Format selection is left to [`Device::find_depth_format`].

use std::sync::Arc;

use ash::vk;
use tracing::info;

use vista_rhi::device::Device;
use vista_rhi::image::{Image, ImageDesc};
use vista_rhi::{RhiError, RhiResult};

pub struct DepthBuffer {
    image: Image,
}

impl DepthBuffer {
    pub fn new(device: Arc<Device>, extent: vk::Extent2D, format: vk::Format) -> RhiResult<Self> {
        if extent.width == 0 || extent.height == 0 {
            return Err(RhiError::InvalidHandle(
                "Depth buffer dimensions must be greater than 0".to_string(),
            ));
        }

        let image = Image::new(device, &ImageDesc::depth(extent, format))?;
        info!(
            "Created depth buffer: {}x{} ({:?})",
            extent.width, extent.height, format
        );
        Ok(Self { image })
    }

    /// True when this buffer can be reused for a swapchain of `extent`.
    #[inline]
    pub fn matches(&self, extent: vk::Extent2D) -> bool {
        plan_depth_rebuild(self.extent(), extent) == DepthRebuild::Keep
    }

    #[inline]
    pub fn image_view(&self) -> vk::ImageView {
        self.image.view()
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.image.format()
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.image.extent()
    }
}

/// What a swapchain rebuild means for the depth attachment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DepthRebuild {
    /// The current buffer already has the swapchain's extent.
    Keep,
    /// A new buffer of this extent is needed.
    Recreate(vk::Extent2D),
}

/// Decides whether a depth buffer of `current` extent survives a swapchain
/// rebuilt at `swapchain`.
pub fn plan_depth_rebuild(current: vk::Extent2D, swapchain: vk::Extent2D) -> DepthRebuild {
    if current == swapchain {
        DepthRebuild::Keep
    } else {
        DepthRebuild::Recreate(swapchain)
    }
}
