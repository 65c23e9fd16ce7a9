//! Scene upload: global geometry buffers, textures, material sets and draws.
//!
//! Everything is uploaded once through blocking staging copies. Draw records
//! carry a material table index which selects the descriptor set bound at
//! [`MATERIAL_SET`] for that draw.

use std::sync::Arc;

use ash::vk;
use tracing::{info, warn};

use vista_resources::{
    DefaultTexturePolicy, MaterialTable, Primitive, ResolvedMaterial, SceneData, SlotKind,
    TextureRef,
};
use vista_rhi::buffer::{Buffer, BufferUsage};
use vista_rhi::command::CommandBuffer;
use vista_rhi::descriptor::BindingSet;
use vista_rhi::device::Device;
use vista_rhi::sampler::{SamplerCache, SamplerKey};
use vista_rhi::texture::{ColorSpace, Texture};
use vista_rhi::upload::Uploader;
use vista_rhi::{RhiError, RhiResult};

use crate::texture_arena::{TextureArena, TextureKey};

/// Descriptor set number of the per-material textures.
pub const MATERIAL_SET: u32 = 1;

/// One indexed draw into the global buffers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrawRecord {
    pub first_index: u32,
    pub index_count: u32,
    /// Index into the material table and the material binding set.
    pub material: usize,
}

/// Maps primitives onto material table entries.
///
/// A primitive whose material cannot be resolved (no table default) is
/// skipped with a warning rather than drawn with an invalid set.
pub fn build_draw_records(primitives: &[Primitive], table: &MaterialTable) -> Vec<DrawRecord> {
    primitives
        .iter()
        .filter_map(|p| match table.index_for(p.material) {
            Some(material) => Some(DrawRecord {
                first_index: p.first_index,
                index_count: p.index_count,
                material,
            }),
            None => {
                warn!(
                    "Primitive at index {} has no usable material, skipping",
                    p.first_index
                );
                None
            }
        })
        .collect()
}

/// Texture keys of one material, indexed by [`SlotKind::binding`].
pub type MaterialTextures = [TextureKey; 3];

/// Resolves every material slot to an arena key.
pub fn material_texture_keys(
    materials: &[ResolvedMaterial],
    scene_textures: &[TextureKey],
    placeholders: &MaterialTextures,
) -> Vec<MaterialTextures> {
    materials
        .iter()
        .map(|material| {
            let mut keys = *placeholders;
            for (kind, texture) in material.slots() {
                let slot = kind.binding() as usize;
                keys[slot] = match texture {
                    TextureRef::Scene(index) => scene_textures
                        .get(index)
                        .copied()
                        .unwrap_or(placeholders[slot]),
                    TextureRef::Placeholder(_) => placeholders[slot],
                };
            }
            keys
        })
        .collect()
}

/// One descriptor set per material with albedo, normal and
/// metallic-roughness samplers at bindings 0, 1 and 2.
pub struct MaterialBindings {
    set: BindingSet,
}

impl MaterialBindings {
    /// Sized by the material count; an empty scene still gets one set of
    /// placeholders so the pipeline layout stays valid.
    pub fn new(
        device: Arc<Device>,
        materials: &[MaterialTextures],
        placeholders: &MaterialTextures,
        arena: &TextureArena,
    ) -> RhiResult<Self> {
        let mut set = BindingSet::new(device);
        for kind in SlotKind::ALL {
            set.add_binding(
                vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                vk::ShaderStageFlags::FRAGMENT,
                kind.binding(),
                1,
            );
        }

        let instances = materials.len().max(1);
        set.finalize(instances as u32)?;

        for index in 0..instances {
            let keys = materials.get(index).unwrap_or(placeholders);
            for kind in SlotKind::ALL {
                let key = keys[kind.binding() as usize];
                let info = arena.descriptor_info(key).ok_or_else(|| {
                    RhiError::InvalidHandle(format!("material {} {:?} texture", index, kind))
                })?;
                set.write_image(kind.binding(), index, info)?;
            }
        }

        Ok(Self { set })
    }

    pub fn layout(&self) -> vk::DescriptorSetLayout {
        self.set.layout()
    }

    pub fn set(&self, material: usize) -> Option<vk::DescriptorSet> {
        self.set.set(material)
    }

    pub fn len(&self) -> usize {
        self.set.instance_count()
    }

    pub fn is_empty(&self) -> bool {
        self.set.instance_count() == 0
    }
}

/// GPU-resident scene.
///
/// Field order is teardown order: descriptor sets, buffers, textures, then
/// the samplers the textures borrow.
pub struct GpuScene {
    materials: MaterialBindings,
    draws: Vec<DrawRecord>,
    vertex_buffer: Option<Buffer>,
    index_buffer: Option<Buffer>,
    textures: TextureArena,
    placeholders: MaterialTextures,
    _samplers: SamplerCache,
}

impl GpuScene {
    pub fn upload(
        uploader: &Uploader,
        scene: &SceneData,
        policy: DefaultTexturePolicy,
    ) -> RhiResult<Self> {
        let device = uploader.device().clone();
        let mut samplers = SamplerCache::new(device.clone());
        let mut textures = TextureArena::new();

        let mut scene_textures = Vec::with_capacity(scene.textures.len());
        for source in &scene.textures {
            let sampler = samplers.get_or_create(source.sampler)?;
            let texture = Texture::from_rgba8(
                uploader,
                &source.image.pixels,
                source.image.width,
                source.image.height,
                source.color_space,
                sampler,
            )?;
            scene_textures.push(textures.insert(texture));
        }

        let default_sampler = samplers.get_or_create(SamplerKey::default())?;
        let mut placeholders = [TextureKey::default(); 3];
        for kind in SlotKind::ALL {
            let color_space = if kind.is_linear() {
                ColorSpace::Linear
            } else {
                ColorSpace::Srgb
            };
            let texture =
                Texture::solid(uploader, kind.placeholder_rgba(), color_space, default_sampler)?;
            placeholders[kind.binding() as usize] = textures.insert(texture);
        }

        let table = MaterialTable::build(
            &scene.materials,
            scene.textures.len(),
            policy,
            scene.needs_default_material(),
        );
        let keys = material_texture_keys(table.materials(), &scene_textures, &placeholders);
        let materials = MaterialBindings::new(device.clone(), &keys, &placeholders, &textures)?;
        let draws = build_draw_records(&scene.primitives, &table);

        let vertex_buffer = upload_or_none(
            &device,
            uploader,
            BufferUsage::Vertex,
            bytemuck::cast_slice(&scene.vertices),
        )?;
        let index_buffer = upload_or_none(
            &device,
            uploader,
            BufferUsage::Index,
            bytemuck::cast_slice(&scene.indices),
        )?;

        info!(
            "Scene uploaded: {} vertices, {} indices, {} draws, {} materials, {} textures",
            scene.vertices.len(),
            scene.indices.len(),
            draws.len(),
            materials.len(),
            textures.len()
        );

        Ok(Self {
            materials,
            draws,
            vertex_buffer,
            index_buffer,
            textures,
            placeholders,
            _samplers: samplers,
        })
    }

    /// Records every draw. Set 0 must already be bound.
    pub fn record_draws(&self, cmd: &CommandBuffer, layout: vk::PipelineLayout) {
        let (Some(vertices), Some(indices)) = (&self.vertex_buffer, &self.index_buffer) else {
            return;
        };
        cmd.bind_vertex_buffers(0, &[vertices.handle()], &[0]);
        cmd.bind_index_buffer(indices.handle(), 0, vk::IndexType::UINT32);

        for draw in &self.draws {
            let Some(set) = self.materials.set(draw.material) else {
                continue;
            };
            cmd.bind_descriptor_sets(layout, MATERIAL_SET, &[set]);
            cmd.draw_indexed(draw.index_count, 1, draw.first_index, 0, 0);
        }
    }

    /// Texture for the frame set's sampled binding: the white albedo placeholder.
    pub fn global_texture(&self) -> RhiResult<vk::DescriptorImageInfo> {
        let key = self.placeholders[SlotKind::Albedo.binding() as usize];
        self.textures
            .descriptor_info(key)
            .ok_or_else(|| RhiError::InvalidHandle("placeholder texture".to_string()))
    }

    pub fn material_layout(&self) -> vk::DescriptorSetLayout {
        self.materials.layout()
    }

    pub fn draws(&self) -> &[DrawRecord] {
        &self.draws
    }

    pub fn material_count(&self) -> usize {
        self.materials.len()
    }
}

fn upload_or_none(
    device: &Arc<Device>,
    uploader: &Uploader,
    usage: BufferUsage,
    bytes: &[u8],
) -> RhiResult<Option<Buffer>> {
    if bytes.is_empty() {
        return Ok(None);
    }
    Buffer::device_local_with_data(device.clone(), uploader, usage, bytes).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;
    use vista_resources::MaterialSlots;

    fn primitive(first_index: u32, index_count: u32, material: Option<usize>) -> Primitive {
        Primitive {
            first_index,
            index_count,
            material,
        }
    }

    #[test]
    fn test_three_primitives_two_materials() {
        let slots = [MaterialSlots::default(), MaterialSlots::default()];
        let table = MaterialTable::build(&slots, 0, DefaultTexturePolicy::Placeholder, false);
        let primitives = [
            primitive(0, 100, Some(0)),
            primitive(100, 200, Some(1)),
            primitive(300, 200, Some(0)),
        ];

        let draws = build_draw_records(&primitives, &table);
        assert_eq!(draws.len(), 3);
        assert_eq!(
            draws.iter().map(|d| d.first_index).collect::<Vec<_>>(),
            vec![0, 100, 300]
        );
        assert_eq!(
            draws.iter().map(|d| d.index_count).sum::<u32>(),
            500
        );
        assert!(draws.iter().all(|d| d.material < 2));
    }

    #[test]
    fn test_missing_material_uses_default() {
        let slots = [MaterialSlots::default()];
        let table = MaterialTable::build(&slots, 0, DefaultTexturePolicy::Placeholder, true);
        let draws = build_draw_records(&[primitive(0, 3, None)], &table);
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].material, 1);
    }

    #[test]
    fn test_unresolvable_material_is_skipped() {
        let table = MaterialTable::build(&[], 0, DefaultTexturePolicy::Placeholder, false);
        let draws = build_draw_records(&[primitive(0, 3, None), primitive(3, 3, Some(4))], &table);
        assert!(draws.is_empty());
    }

    #[test]
    fn test_material_texture_keys() {
        let mut arena: SlotMap<TextureKey, ()> = SlotMap::with_key();
        let scene: Vec<TextureKey> = (0..2).map(|_| arena.insert(())).collect();
        let placeholders = [arena.insert(()), arena.insert(()), arena.insert(())];

        let slots = [MaterialSlots {
            albedo: Some(1),
            normal: None,
            metallic_roughness: Some(0),
        }];
        let table = MaterialTable::build(&slots, 2, DefaultTexturePolicy::Placeholder, false);
        let keys = material_texture_keys(table.materials(), &scene, &placeholders);

        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0][SlotKind::Albedo.binding() as usize], scene[1]);
        assert_eq!(keys[0][SlotKind::Normal.binding() as usize], placeholders[1]);
        assert_eq!(
            keys[0][SlotKind::MetallicRoughness.binding() as usize],
            scene[0]
        );
    }

    #[test]
    fn test_last_loaded_policy_keys() {
        let mut arena: SlotMap<TextureKey, ()> = SlotMap::with_key();
        let scene: Vec<TextureKey> = (0..3).map(|_| arena.insert(())).collect();
        let placeholders = [arena.insert(()), arena.insert(()), arena.insert(())];

        let table = MaterialTable::build(
            &[MaterialSlots::default()],
            3,
            DefaultTexturePolicy::LastLoaded,
            false,
        );
        let keys = material_texture_keys(table.materials(), &scene, &placeholders);
        assert!(keys[0].iter().all(|&k| k == scene[2]));
    }
}
