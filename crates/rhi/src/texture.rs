//! Sampled 2D textures uploaded from RGBA8 pixels.

use ash::vk;
use tracing::debug;

use crate::buffer::{Buffer, BufferUsage};
use crate::error::{RhiError, RhiResult};
use crate::image::{Image, ImageDesc};
use crate::upload::Uploader;

/// Color encoding of a texture's pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ColorSpace {
    /// Color data (albedo, emissive): sampled with sRGB decoding.
    #[default]
    Srgb,
    /// Non-color data (normals, metallic-roughness).
    Linear,
}

impl ColorSpace {
    pub fn rgba8_format(self) -> vk::Format {
        match self {
            ColorSpace::Srgb => vk::Format::R8G8B8A8_SRGB,
            ColorSpace::Linear => vk::Format::R8G8B8A8_UNORM,
        }
    }
}

/// An image in `SHADER_READ_ONLY_OPTIMAL` plus the sampler it is read with.
///
/// The sampler is borrowed from a [`SamplerCache`](crate::sampler::SamplerCache)
/// which owns and destroys it.
pub struct Texture {
    image: Image,
    sampler: vk::Sampler,
}

impl Texture {
    /// Uploads tightly packed RGBA8 pixels through a staging buffer.
    pub fn from_rgba8(
        uploader: &Uploader,
        pixels: &[u8],
        width: u32,
        height: u32,
        color_space: ColorSpace,
        sampler: vk::Sampler,
    ) -> RhiResult<Self> {
        let expected = rgba8_len(width, height);
        if pixels.len() != expected {
            return Err(RhiError::InvalidHandle(format!(
                "texture {}x{} expects {} bytes, got {}",
                width,
                height,
                expected,
                pixels.len()
            )));
        }

        let device = uploader.device().clone();
        let extent = vk::Extent2D { width, height };
        let staging = Buffer::new_with_data(device.clone(), BufferUsage::Staging, pixels)?;
        let image = Image::new(
            device,
            &ImageDesc::sampled(extent, color_space.rgba8_format()),
        )?;

        let mut recorded = Ok(());
        uploader.submit_once(|cmd| {
            recorded = image
                .transition_layout(
                    cmd,
                    vk::ImageLayout::UNDEFINED,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                )
                .and_then(|()| {
                    cmd.copy_buffer_to_image(staging.handle(), image.handle(), extent);
                    image.transition_layout(
                        cmd,
                        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                    )
                });
        })?;
        recorded?;

        debug!("Uploaded {}x{} {:?} texture", width, height, color_space);
        Ok(Self { image, sampler })
    }

    /// A 1x1 texture of a single color.
    pub fn solid(
        uploader: &Uploader,
        rgba: [u8; 4],
        color_space: ColorSpace,
        sampler: vk::Sampler,
    ) -> RhiResult<Self> {
        Self::from_rgba8(uploader, &rgba, 1, 1, color_space, sampler)
    }

    pub fn descriptor_info(&self) -> vk::DescriptorImageInfo {
        vk::DescriptorImageInfo {
            sampler: self.sampler,
            image_view: self.image.view(),
            image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        }
    }

    #[inline]
    pub fn image(&self) -> &Image {
        &self.image
    }

    #[inline]
    pub fn sampler(&self) -> vk::Sampler {
        self.sampler
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.image.extent()
    }
}

/// Byte length of a tightly packed RGBA8 image.
pub fn rgba8_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * 4
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_space_formats() {
        assert_eq!(ColorSpace::Srgb.rgba8_format(), vk::Format::R8G8B8A8_SRGB);
        assert_eq!(ColorSpace::Linear.rgba8_format(), vk::Format::R8G8B8A8_UNORM);
        assert_eq!(ColorSpace::default(), ColorSpace::Srgb);
    }

    #[test]
    fn test_rgba8_len() {
        assert_eq!(rgba8_len(1, 1), 4);
        assert_eq!(rgba8_len(256, 128), 256 * 128 * 4);
    }
}
