//! One framebuffer per swapchain image, sharing the depth view.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::RhiResult;

/// Owned `VkFramebuffer`.
pub struct Framebuffer {
    device: Arc<Device>,
    framebuffer: vk::Framebuffer,
}

impl Framebuffer {
    /// Creates a single-layer framebuffer.
    ///
    /// # Errors
    ///
    /// Returns an error if `vkCreateFramebuffer` fails.
    pub fn new(
        device: Arc<Device>,
        render_pass: vk::RenderPass,
        attachments: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> RhiResult<Self> {
        let create_info = vk::FramebufferCreateInfo::default()
            .render_pass(render_pass)
            .attachments(attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);

        let framebuffer = unsafe { device.handle().create_framebuffer(&create_info, None)? };
        Ok(Self {
            device,
            framebuffer,
        })
    }

    #[inline]
    pub fn handle(&self) -> vk::Framebuffer {
        self.framebuffer
    }
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_framebuffer(self.framebuffer, None);
        }
    }
}

/// Framebuffers indexed by swapchain image. Rebuilt as a whole on resize.
pub struct FramebufferSet {
    framebuffers: Vec<Framebuffer>,
    extent: vk::Extent2D,
}

impl FramebufferSet {
    /// Builds `[color_view, depth_view]` framebuffers for every color view.
    pub fn new(
        device: &Arc<Device>,
        render_pass: vk::RenderPass,
        color_views: &[vk::ImageView],
        depth_view: vk::ImageView,
        extent: vk::Extent2D,
    ) -> RhiResult<Self> {
        let framebuffers = color_views
            .iter()
            .map(|&view| {
                Framebuffer::new(device.clone(), render_pass, &[view, depth_view], extent)
            })
            .collect::<RhiResult<Vec<_>>>()?;

        debug!(
            "Created {} framebuffers ({}x{})",
            framebuffers.len(),
            extent.width,
            extent.height
        );
        Ok(Self {
            framebuffers,
            extent,
        })
    }

    /// Framebuffer for the acquired swapchain image.
    pub fn get(&self, image_index: u32) -> Option<vk::Framebuffer> {
        self.framebuffers
            .get(image_index as usize)
            .map(Framebuffer::handle)
    }

    pub fn len(&self) -> usize {
        self.framebuffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.framebuffers.is_empty()
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }
}
