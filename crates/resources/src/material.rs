//! Material texture slots and how empty slots are filled.
//!
//! A glTF material may leave any of its three texture slots empty. What an
//! empty slot samples is decided by [`DefaultTexturePolicy`]:
//!
//! - [`DefaultTexturePolicy::Placeholder`] binds a neutral 1x1 texture per
//!   slot kind (white albedo, flat normal, fully rough and non-metallic).
//! - [`DefaultTexturePolicy::LastLoaded`] binds the scene's last texture,
//!   which is what older viewers did. Kept for side-by-side comparison.

use tracing::warn;

/// The three texture slots a material binds, in binding order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SlotKind {
    Albedo,
    Normal,
    MetallicRoughness,
}

impl SlotKind {
    pub const ALL: [SlotKind; 3] = [SlotKind::Albedo, SlotKind::Normal, SlotKind::MetallicRoughness];

    /// Descriptor binding within the material set.
    pub fn binding(self) -> u32 {
        match self {
            SlotKind::Albedo => 0,
            SlotKind::Normal => 1,
            SlotKind::MetallicRoughness => 2,
        }
    }

    /// RGBA8 pixel of the placeholder texture for this slot.
    pub fn placeholder_rgba(self) -> [u8; 4] {
        match self {
            SlotKind::Albedo => [255, 255, 255, 255],
            SlotKind::Normal => [128, 128, 255, 255],
            SlotKind::MetallicRoughness => [0, 255, 0, 255],
        }
    }

    /// Whether the slot holds non-color data.
    pub fn is_linear(self) -> bool {
        !matches!(self, SlotKind::Albedo)
    }
}

/// Scene texture indices referenced by one glTF material.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MaterialSlots {
    pub albedo: Option<usize>,
    pub normal: Option<usize>,
    pub metallic_roughness: Option<usize>,
}

impl MaterialSlots {
    pub fn get(&self, kind: SlotKind) -> Option<usize> {
        match kind {
            SlotKind::Albedo => self.albedo,
            SlotKind::Normal => self.normal,
            SlotKind::MetallicRoughness => self.metallic_roughness,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DefaultTexturePolicy {
    #[default]
    Placeholder,
    LastLoaded,
}

/// What a material slot samples once defaults are applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextureRef {
    /// Index into the scene's texture list.
    Scene(usize),
    Placeholder(SlotKind),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResolvedMaterial {
    pub albedo: TextureRef,
    pub normal: TextureRef,
    pub metallic_roughness: TextureRef,
}

impl ResolvedMaterial {
    /// Every slot on its placeholder.
    pub fn placeholder() -> Self {
        Self {
            albedo: TextureRef::Placeholder(SlotKind::Albedo),
            normal: TextureRef::Placeholder(SlotKind::Normal),
            metallic_roughness: TextureRef::Placeholder(SlotKind::MetallicRoughness),
        }
    }

    pub fn get(&self, kind: SlotKind) -> TextureRef {
        match kind {
            SlotKind::Albedo => self.albedo,
            SlotKind::Normal => self.normal,
            SlotKind::MetallicRoughness => self.metallic_roughness,
        }
    }

    /// Slots in binding order.
    pub fn slots(&self) -> [(SlotKind, TextureRef); 3] {
        SlotKind::ALL.map(|kind| (kind, self.get(kind)))
    }
}

/// Fills empty or dangling slots according to `policy`.
pub fn resolve_material(
    slots: &MaterialSlots,
    texture_count: usize,
    policy: DefaultTexturePolicy,
) -> ResolvedMaterial {
    let resolve = |kind: SlotKind| match slots.get(kind) {
        Some(index) if index < texture_count => TextureRef::Scene(index),
        other => {
            if let Some(index) = other {
                warn!(
                    "{:?} texture {} out of range ({} textures), using default",
                    kind, index, texture_count
                );
            }
            default_ref(kind, texture_count, policy)
        }
    };

    ResolvedMaterial {
        albedo: resolve(SlotKind::Albedo),
        normal: resolve(SlotKind::Normal),
        metallic_roughness: resolve(SlotKind::MetallicRoughness),
    }
}

fn default_ref(kind: SlotKind, texture_count: usize, policy: DefaultTexturePolicy) -> TextureRef {
    match policy {
        DefaultTexturePolicy::LastLoaded if texture_count > 0 => {
            TextureRef::Scene(texture_count - 1)
        }
        _ => TextureRef::Placeholder(kind),
    }
}

/// Resolved materials plus an optional trailing default material for
/// primitives that reference none.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MaterialTable {
    materials: Vec<ResolvedMaterial>,
    default_index: Option<usize>,
}

impl MaterialTable {
    /// Resolves every material. The default material is appended only when
    /// `needs_default` is set.
    pub fn build(
        slots: &[MaterialSlots],
        texture_count: usize,
        policy: DefaultTexturePolicy,
        needs_default: bool,
    ) -> Self {
        let mut materials: Vec<_> = slots
            .iter()
            .map(|s| resolve_material(s, texture_count, policy))
            .collect();

        let default_index = needs_default.then(|| {
            materials.push(resolve_material(
                &MaterialSlots::default(),
                texture_count,
                policy,
            ));
            materials.len() - 1
        });

        Self {
            materials,
            default_index,
        }
    }

    /// Table index for a primitive's glTF material.
    ///
    /// `None` (or a dangling index) maps to the default material, which is
    /// `None` itself if the table was built without one.
    pub fn index_for(&self, material: Option<usize>) -> Option<usize> {
        match material {
            Some(index) if Some(index) != self.default_index && index < self.materials.len() => {
                Some(index)
            }
            _ => self.default_index,
        }
    }

    pub fn materials(&self) -> &[ResolvedMaterial] {
        &self.materials
    }

    pub fn default_index(&self) -> Option<usize> {
        self.default_index
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_material_round_trips() {
        let slots = MaterialSlots {
            albedo: Some(0),
            normal: Some(1),
            metallic_roughness: Some(2),
        };
        let resolved = resolve_material(&slots, 3, DefaultTexturePolicy::Placeholder);
        assert_eq!(resolved.albedo, TextureRef::Scene(0));
        assert_eq!(resolved.normal, TextureRef::Scene(1));
        assert_eq!(resolved.metallic_roughness, TextureRef::Scene(2));
    }

    #[test]
    fn test_empty_slots_use_placeholders() {
        let slots = MaterialSlots {
            albedo: Some(4),
            ..Default::default()
        };
        let resolved = resolve_material(&slots, 5, DefaultTexturePolicy::Placeholder);
        assert_eq!(resolved.albedo, TextureRef::Scene(4));
        assert_eq!(resolved.normal, TextureRef::Placeholder(SlotKind::Normal));
        assert_eq!(
            resolved.metallic_roughness,
            TextureRef::Placeholder(SlotKind::MetallicRoughness)
        );
    }

    #[test]
    fn test_last_loaded_policy() {
        let resolved = resolve_material(
            &MaterialSlots::default(),
            7,
            DefaultTexturePolicy::LastLoaded,
        );
        assert_eq!(resolved.albedo, TextureRef::Scene(6));
        assert_eq!(resolved.normal, TextureRef::Scene(6));

        // Nothing loaded: fall back to placeholders.
        let resolved = resolve_material(
            &MaterialSlots::default(),
            0,
            DefaultTexturePolicy::LastLoaded,
        );
        assert_eq!(resolved, ResolvedMaterial::placeholder());
    }

    #[test]
    fn test_dangling_index_uses_default() {
        let slots = MaterialSlots {
            normal: Some(10),
            ..Default::default()
        };
        let resolved = resolve_material(&slots, 2, DefaultTexturePolicy::Placeholder);
        assert_eq!(resolved.normal, TextureRef::Placeholder(SlotKind::Normal));
    }

    #[test]
    fn test_default_material_only_when_needed() {
        let slots = [MaterialSlots::default(); 2];

        let table = MaterialTable::build(&slots, 0, DefaultTexturePolicy::Placeholder, false);
        assert_eq!(table.len(), 2);
        assert_eq!(table.default_index(), None);
        assert_eq!(table.index_for(Some(1)), Some(1));
        assert_eq!(table.index_for(None), None);

        let table = MaterialTable::build(&slots, 0, DefaultTexturePolicy::Placeholder, true);
        assert_eq!(table.len(), 3);
        assert_eq!(table.index_for(None), Some(2));
        assert_eq!(table.index_for(Some(9)), Some(2));
    }

    #[test]
    fn test_slot_bindings_and_placeholders() {
        let bindings: Vec<u32> = SlotKind::ALL.iter().map(|k| k.binding()).collect();
        assert_eq!(bindings, vec![0, 1, 2]);
        assert_eq!(SlotKind::Albedo.placeholder_rgba(), [255, 255, 255, 255]);
        assert_eq!(SlotKind::Normal.placeholder_rgba(), [128, 128, 255, 255]);
        assert!(!SlotKind::Albedo.is_linear());
        assert!(SlotKind::Normal.is_linear());
    }
}
