//! Per-frame uniform block and one host-visible buffer per frame slot.
//!
//! The layout matches the shaders' set 0 binding 0 block (std140):
//!
//! | offset | field           |
//! |--------|-----------------|
//! | 0      | model           |
//! | 64     | view            |
//! | 128    | projection      |
//! | 192    | normal matrix   |
//! | 256    | light position  |
//! | 272    | camera position |

use std::sync::Arc;

use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec4};

use vista_rhi::buffer::{Buffer, BufferUsage};
use vista_rhi::device::Device;
use vista_rhi::{RhiError, RhiResult};
use vista_scene::{FpsCamera, PointLight, normal_matrix};

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct FrameUniforms {
    pub model: Mat4,
    pub view: Mat4,
    pub projection: Mat4,
    pub normal: Mat4,
    /// xyz position, w = 0.
    pub light_position: Vec4,
    /// xyz position, w = 0.
    pub camera_position: Vec4,
}

impl FrameUniforms {
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Uniforms for a scene whose transforms are baked into the vertices.
    pub fn new(camera: &FpsCamera, light: &PointLight) -> Self {
        Self::with_model(Mat4::IDENTITY, camera, light)
    }

    pub fn with_model(model: Mat4, camera: &FpsCamera, light: &PointLight) -> Self {
        Self {
            model,
            view: camera.view_matrix(),
            projection: camera.projection_matrix(),
            normal: normal_matrix(model),
            light_position: light.shader_position(),
            camera_position: camera.position().extend(0.0),
        }
    }
}

/// One uniform buffer per frame slot, so writing slot N never races the GPU
/// reading slot N-1.
pub struct UniformRing {
    buffers: Vec<Buffer>,
}

impl UniformRing {
    pub fn new(device: &Arc<Device>, slots: usize) -> RhiResult<Self> {
        let buffers = (0..slots)
            .map(|_| {
                Buffer::new(
                    device.clone(),
                    BufferUsage::Uniform,
                    FrameUniforms::SIZE as vk::DeviceSize,
                )
            })
            .collect::<RhiResult<Vec<_>>>()?;
        Ok(Self { buffers })
    }

    /// Writes the uniforms of `slot`. The slot's fence must have signaled.
    pub fn write(&self, slot: usize, uniforms: &FrameUniforms) -> RhiResult<()> {
        self.buffer(slot)?.write_pod(uniforms)
    }

    pub fn descriptor_info(&self, slot: usize) -> RhiResult<vk::DescriptorBufferInfo> {
        Ok(self.buffer(slot)?.descriptor_info())
    }

    fn buffer(&self, slot: usize) -> RhiResult<&Buffer> {
        self.buffers.get(slot).ok_or(RhiError::BindingOutOfRange {
            index: slot,
            count: self.buffers.len(),
        })
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use vista_scene::Projection;

    #[test]
    fn test_frame_uniforms_size() {
        // 4 Mat4 (4 * 64) + 2 Vec4 (2 * 16)
        assert_eq!(FrameUniforms::SIZE, 288);
        assert_eq!(std::mem::align_of::<FrameUniforms>(), 16);
    }

    #[test]
    fn test_field_offsets() {
        assert_eq!(std::mem::offset_of!(FrameUniforms, normal), 192);
        assert_eq!(std::mem::offset_of!(FrameUniforms, light_position), 256);
        assert_eq!(std::mem::offset_of!(FrameUniforms, camera_position), 272);
    }

    #[test]
    fn test_uniforms_from_camera() {
        let camera = FpsCamera::new(Vec3::new(1.0, 2.0, 3.0), -90.0, 0.0, Projection::default());
        let light = PointLight::new(Vec3::new(4.0, 5.0, 6.0));
        let uniforms = FrameUniforms::new(&camera, &light);

        assert_eq!(uniforms.model, Mat4::IDENTITY);
        assert_eq!(uniforms.normal, Mat4::IDENTITY);
        assert_eq!(uniforms.view, camera.view_matrix());
        assert_eq!(uniforms.projection, camera.projection_matrix());
        assert_eq!(uniforms.light_position, Vec4::new(4.0, 5.0, 6.0, 0.0));
        assert_eq!(uniforms.camera_position, Vec4::new(1.0, 2.0, 3.0, 0.0));
    }

    #[test]
    fn test_uniforms_are_pod() {
        let uniforms = FrameUniforms::default();
        assert_eq!(bytemuck::bytes_of(&uniforms).len(), FrameUniforms::SIZE);
    }
}
