//! Scene assets.
//!
//! Imports a glTF file into the flat tables the renderer uploads:
//! - one vertex list and one rebased index list for the whole scene
//! - a primitive per draw range with its material index
//! - material texture slots and a default-texture policy
//! - decoded textures tagged with color space and sampler key

pub mod error;
pub mod import;
pub mod material;

pub use error::{ResourceError, ResourceResult};
pub use import::{first_out_of_range, rebase_indices, sampler_key, DecodedImage, IndexWidth, Primitive, SceneData, TextureSource};
pub use material::{
    resolve_material, DefaultTexturePolicy, MaterialSlots, MaterialTable, ResolvedMaterial, SlotKind,
    TextureRef,
};
