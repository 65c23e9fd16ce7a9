//! Forward render pass with one color and one depth attachment.
//!
//! The color attachment is presented straight after the pass; depth is
//! cleared every frame. A single external dependency orders this frame's
//! color and depth writes after earlier work on the same attachments.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::RhiResult;

/// Color attachment settings.
///
/// # Default Values
///
/// - `load_op`: `CLEAR`
/// - `store_op`: `STORE`
/// - `final_layout`: `PRESENT_SRC_KHR`
/// - `clear_color`: opaque black
#[derive(Clone, Copy, Debug)]
pub struct ColorAttachment {
    pub format: vk::Format,
    pub load_op: vk::AttachmentLoadOp,
    pub store_op: vk::AttachmentStoreOp,
    pub final_layout: vk::ImageLayout,
    pub clear_color: [f32; 4],
}

impl ColorAttachment {
    #[inline]
    pub fn new(format: vk::Format) -> Self {
        Self {
            format,
            load_op: vk::AttachmentLoadOp::CLEAR,
            store_op: vk::AttachmentStoreOp::STORE,
            final_layout: vk::ImageLayout::PRESENT_SRC_KHR,
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }

    #[inline]
    pub fn with_clear_color(mut self, color: [f32; 4]) -> Self {
        self.clear_color = color;
        self
    }

    pub fn description(&self) -> vk::AttachmentDescription {
        vk::AttachmentDescription::default()
            .format(self.format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(self.load_op)
            .store_op(self.store_op)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(self.final_layout)
    }

    pub fn clear_value(&self) -> vk::ClearValue {
        vk::ClearValue {
            color: vk::ClearColorValue {
                float32: self.clear_color,
            },
        }
    }
}

/// Depth attachment settings. Cleared to 1.0, the far plane.
#[derive(Clone, Copy, Debug)]
pub struct DepthAttachment {
    pub format: vk::Format,
    pub load_op: vk::AttachmentLoadOp,
    pub store_op: vk::AttachmentStoreOp,
    pub clear_depth: f32,
}

impl DepthAttachment {
    #[inline]
    pub fn new(format: vk::Format) -> Self {
        Self {
            format,
            load_op: vk::AttachmentLoadOp::CLEAR,
            store_op: vk::AttachmentStoreOp::STORE,
            clear_depth: 1.0,
        }
    }

    pub fn description(&self) -> vk::AttachmentDescription {
        vk::AttachmentDescription::default()
            .format(self.format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(self.load_op)
            .store_op(self.store_op)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
    }

    pub fn clear_value(&self) -> vk::ClearValue {
        vk::ClearValue {
            depth_stencil: vk::ClearDepthStencilValue {
                depth: self.clear_depth,
                stencil: 0,
            },
        }
    }
}

/// The external-to-subpass-0 dependency covering color output and both
/// fragment test stages.
pub fn external_dependency() -> vk::SubpassDependency {
    let stages = vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
        | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS
        | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS;
    vk::SubpassDependency::default()
        .src_subpass(vk::SUBPASS_EXTERNAL)
        .dst_subpass(0)
        .src_stage_mask(stages)
        .src_access_mask(vk::AccessFlags::NONE)
        .dst_stage_mask(stages)
        .dst_access_mask(
            vk::AccessFlags::COLOR_ATTACHMENT_WRITE
                | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
        )
}

pub struct RenderPass {
    device: Arc<Device>,
    render_pass: vk::RenderPass,
    clear_values: [vk::ClearValue; 2],
    color_format: vk::Format,
    depth_format: vk::Format,
}

impl RenderPass {
    pub fn new(
        device: Arc<Device>,
        color: ColorAttachment,
        depth: DepthAttachment,
    ) -> RhiResult<Self> {
        let attachments = [color.description(), depth.description()];

        let color_refs = [vk::AttachmentReference {
            attachment: 0,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        }];
        let depth_ref = vk::AttachmentReference {
            attachment: 1,
            layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        };

        let subpasses = [vk::SubpassDescription::default()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_refs)
            .depth_stencil_attachment(&depth_ref)];
        let dependencies = [external_dependency()];

        let create_info = vk::RenderPassCreateInfo::default()
            .attachments(&attachments)
            .subpasses(&subpasses)
            .dependencies(&dependencies);

        let render_pass = unsafe { device.handle().create_render_pass(&create_info, None)? };

        debug!(
            "Created render pass: color {:?}, depth {:?}",
            color.format, depth.format
        );

        Ok(Self {
            device,
            render_pass,
            clear_values: [color.clear_value(), depth.clear_value()],
            color_format: color.format,
            depth_format: depth.format,
        })
    }

    /// Begin info over the full `extent` of `framebuffer`, with this pass's
    /// clear values.
    pub fn begin_info(
        &self,
        framebuffer: vk::Framebuffer,
        extent: vk::Extent2D,
    ) -> vk::RenderPassBeginInfo<'_> {
        vk::RenderPassBeginInfo::default()
            .render_pass(self.render_pass)
            .framebuffer(framebuffer)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            })
            .clear_values(&self.clear_values)
    }

    #[inline]
    pub fn handle(&self) -> vk::RenderPass {
        self.render_pass
    }

    #[inline]
    pub fn color_format(&self) -> vk::Format {
        self.color_format
    }

    #[inline]
    pub fn depth_format(&self) -> vk::Format {
        self.depth_format
    }
}

impl Drop for RenderPass {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_render_pass(self.render_pass, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_attachment_presents() {
        let desc = ColorAttachment::new(vk::Format::B8G8R8A8_SRGB).description();
        assert_eq!(desc.load_op, vk::AttachmentLoadOp::CLEAR);
        assert_eq!(desc.store_op, vk::AttachmentStoreOp::STORE);
        assert_eq!(desc.initial_layout, vk::ImageLayout::UNDEFINED);
        assert_eq!(desc.final_layout, vk::ImageLayout::PRESENT_SRC_KHR);
    }

    #[test]
    fn test_depth_attachment_layout() {
        let depth = DepthAttachment::new(vk::Format::D32_SFLOAT);
        let desc = depth.description();
        assert_eq!(desc.final_layout, vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);
        let clear = depth.clear_value();
        assert_eq!(unsafe { clear.depth_stencil.depth }, 1.0);
    }

    #[test]
    fn test_clear_color() {
        let color = ColorAttachment::new(vk::Format::B8G8R8A8_SRGB).with_clear_color([0.1, 0.2, 0.3, 1.0]);
        let clear = color.clear_value();
        assert_eq!(unsafe { clear.color.float32 }, [0.1, 0.2, 0.3, 1.0]);
    }

    #[test]
    fn test_external_dependency() {
        let dep = external_dependency();
        assert_eq!(dep.src_subpass, vk::SUBPASS_EXTERNAL);
        assert_eq!(dep.dst_subpass, 0);
        assert!(dep.dst_stage_mask.contains(vk::PipelineStageFlags::LATE_FRAGMENT_TESTS));
        assert!(
            dep.dst_access_mask
                .contains(vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE)
        );
        assert_eq!(dep.src_access_mask, vk::AccessFlags::NONE);
    }
}
