//! The one vertex layout every mesh is flattened into.
//!
//! Shader inputs: location 0 position, 1 normal, 2 texture coordinate,
//! 3 tangent (xyz plus handedness in w), all from binding 0.

use std::mem::{offset_of, size_of};

use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3, Vec4};

/// Interleaved vertex, 48 bytes.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    /// Object-space position.
    pub position: Vec3,
    /// Unit normal.
    pub normal: Vec3,
    /// Texture coordinate set 0.
    pub tex_coord: Vec2,
    /// Tangent with bitangent sign in `w`.
    pub tangent: Vec4,
}

impl Vertex {
    #[inline]
    pub const fn new(position: Vec3, normal: Vec3, tex_coord: Vec2, tangent: Vec4) -> Self {
        Self {
            position,
            normal,
            tex_coord,
            tangent,
        }
    }

    /// Per-vertex binding 0 with a stride of one [`Vertex`].
    pub fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription {
            binding: 0,
            stride: size_of::<Self>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }
    }

    pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 4] {
        let attribute = |location, format, offset: usize| vk::VertexInputAttributeDescription {
            binding: 0,
            location,
            format,
            offset: offset as u32,
        };
        [
            attribute(0, vk::Format::R32G32B32_SFLOAT, offset_of!(Self, position)),
            attribute(1, vk::Format::R32G32B32_SFLOAT, offset_of!(Self, normal)),
            attribute(2, vk::Format::R32G32_SFLOAT, offset_of!(Self, tex_coord)),
            attribute(3, vk::Format::R32G32B32A32_SFLOAT, offset_of!(Self, tangent)),
        ]
    }
}
