//! Stable handles to uploaded textures.
//!
//! Materials refer to textures by [`TextureKey`], never by reference, so the
//! arena can grow without invalidating anything that points into it.

use ash::vk;
use slotmap::{SlotMap, new_key_type};

use vista_rhi::texture::Texture;

new_key_type! {
    /// Handle to a texture in a [`TextureArena`].
    pub struct TextureKey;
}

#[derive(Default)]
pub struct TextureArena {
    textures: SlotMap<TextureKey, Texture>,
}

impl TextureArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, texture: Texture) -> TextureKey {
        self.textures.insert(texture)
    }

    /// Descriptor info for `key`, resolved at bind time.
    pub fn descriptor_info(&self, key: TextureKey) -> Option<vk::DescriptorImageInfo> {
        self.textures.get(key).map(Texture::descriptor_info)
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }
}
