//! glTF import into flat, GPU-ready tables.
//!
//! Every primitive's vertices are appended to one global vertex list and its
//! indices are rebased by the vertex count at the time it was appended, so a
//! single vertex/index buffer pair serves the whole scene. Node transforms
//! are baked into the vertices; the scene is drawn with an identity model
//! matrix.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use glam::{Mat3, Mat4, Quat, Vec2, Vec3, Vec4};
use gltf::accessor::DataType;
use gltf::mesh::Mode;
use gltf::texture::{MagFilter, WrappingMode};
use tracing::{debug, info, warn};
use vista_rhi::sampler::SamplerKey;
use vista_rhi::texture::ColorSpace;
use vista_rhi::vertex::Vertex;
use vista_rhi::vk;
use vista_scene::{Transform, compose, normal_matrix};

use crate::error::{ResourceError, ResourceResult};
use crate::material::MaterialSlots;

/// Index component widths the importer accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndexWidth {
    U8,
    U16,
    U32,
}

impl IndexWidth {
    pub fn from_data_type(data_type: DataType) -> Option<Self> {
        match data_type {
            DataType::U8 => Some(IndexWidth::U8),
            DataType::U16 => Some(IndexWidth::U16),
            DataType::U32 => Some(IndexWidth::U32),
            _ => None,
        }
    }
}

/// Offsets primitive-local indices into the global vertex list.
///
/// Returns `None` if any rebased index would overflow `u32`.
pub fn rebase_indices(raw: impl IntoIterator<Item = u32>, vertex_offset: u32) -> Option<Vec<u32>> {
    raw.into_iter().map(|i| i.checked_add(vertex_offset)).collect()
}

/// First index that does not address one of `vertex_count` vertices.
pub fn first_out_of_range(indices: &[u32], vertex_count: usize) -> Option<u32> {
    indices.iter().copied().find(|&i| i as usize >= vertex_count)
}

/// A contiguous index range drawn with one material.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Primitive {
    pub first_index: u32,
    pub index_count: u32,
    /// glTF material index, `None` when the primitive has none.
    pub material: Option<usize>,
}

/// Decoded RGBA8 pixels of one glTF image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedImage {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl DecodedImage {
    /// 1x1 white, substituted for images that fail to load.
    pub fn fallback() -> Self {
        Self {
            pixels: vec![255; 4],
            width: 1,
            height: 1,
        }
    }
}

/// One glTF texture ready for upload.
#[derive(Clone, Debug)]
pub struct TextureSource {
    pub image: DecodedImage,
    pub color_space: ColorSpace,
    pub sampler: SamplerKey,
}

/// CPU-side scene: flat geometry, draw ranges, materials and textures.
#[derive(Clone, Debug, Default)]
pub struct SceneData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub primitives: Vec<Primitive>,
    pub materials: Vec<MaterialSlots>,
    pub textures: Vec<TextureSource>,
}

impl SceneData {
    /// Imports a `.gltf`/`.glb` file with its buffers and images.
    ///
    /// # Errors
    ///
    /// Missing file, unparsable document or buffers, or no scene. Broken
    /// images and unsupported primitives are logged and replaced or skipped.
    pub fn load(path: &Path) -> ResourceResult<Self> {
        if !path.exists() {
            return Err(ResourceError::FileNotFound(path.to_path_buf()));
        }
        let load_error = |e: gltf::Error| ResourceError::GltfLoad {
            path: path.to_path_buf(),
            message: e.to_string(),
        };

        let gltf = gltf::Gltf::open(path).map_err(load_error)?;
        let base = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let gltf::Gltf { document, blob } = gltf;
        let buffers = gltf::import_buffers(&document, Some(base.as_path()), blob).map_err(load_error)?;
        let images: Vec<Option<DecodedImage>> = document
            .images()
            .map(|image| decode_image(&image, &base, &buffers))
            .collect();

        if document.scenes().next().is_none() {
            return Err(ResourceError::NoScene(path.to_path_buf()));
        }

        let scene = Self::from_gltf(&document, &buffers, &images);
        info!(
            "Loaded {:?}: {} vertices, {} indices, {} primitives, {} materials, {} textures",
            path,
            scene.vertices.len(),
            scene.indices.len(),
            scene.primitives.len(),
            scene.materials.len(),
            scene.textures.len()
        );
        Ok(scene)
    }

    /// Builds the scene from an already parsed document.
    ///
    /// `images` is indexed by glTF image; `None` entries (and images past the
    /// end) become 1x1 white textures.
    pub fn from_gltf(
        document: &gltf::Document,
        buffers: &[gltf::buffer::Data],
        images: &[Option<DecodedImage>],
    ) -> Self {
        let mut scene = SceneData {
            materials: document.materials().map(|m| material_slots(&m)).collect(),
            ..Default::default()
        };

        let roots = document
            .default_scene()
            .or_else(|| document.scenes().next());
        if let Some(root) = roots {
            for node in root.nodes() {
                scene.visit_node(&node, Mat4::IDENTITY, buffers);
            }
        }

        let normal_maps: HashSet<usize> = scene.materials.iter().filter_map(|m| m.normal).collect();
        scene.textures = document
            .textures()
            .map(|texture| {
                let image = images
                    .get(texture.source().index())
                    .cloned()
                    .flatten()
                    .unwrap_or_else(|| {
                        warn!("Texture {} has no image data, using white", texture.index());
                        DecodedImage::fallback()
                    });
                let color_space = if normal_maps.contains(&texture.index()) {
                    ColorSpace::Linear
                } else {
                    ColorSpace::Srgb
                };
                TextureSource {
                    image,
                    color_space,
                    sampler: sampler_key(&texture.sampler()),
                }
            })
            .collect();

        scene
    }

    /// True when some primitive has no usable material and needs a default.
    pub fn needs_default_material(&self) -> bool {
        self.primitives
            .iter()
            .any(|p| p.material.map_or(true, |m| m >= self.materials.len()))
    }

    fn visit_node(&mut self, node: &gltf::Node, parent_world: Mat4, buffers: &[gltf::buffer::Data]) {
        let world = compose(parent_world, node_transform(node).local_matrix());

        match node.mesh() {
            Some(mesh) => {
                for primitive in mesh.primitives() {
                    self.append_primitive(&primitive, world, buffers);
                }
            }
            None => warn!(
                "Node {} ({}) has no mesh",
                node.index(),
                node.name().unwrap_or("unnamed")
            ),
        }

        for child in node.children() {
            self.visit_node(&child, world, buffers);
        }
    }

    fn append_primitive(
        &mut self,
        primitive: &gltf::Primitive,
        world: Mat4,
        buffers: &[gltf::buffer::Data],
    ) {
        if primitive.mode() != Mode::Triangles {
            warn!("Skipping primitive with mode {:?}", primitive.mode());
            return;
        }
        let Some(index_accessor) = primitive.indices() else {
            warn!("Skipping primitive without indices");
            return;
        };
        if IndexWidth::from_data_type(index_accessor.data_type()).is_none() {
            warn!(
                "Skipping primitive with unsupported index type {:?}",
                index_accessor.data_type()
            );
            return;
        }

        let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|d| &d.0[..]));
        let Some(positions) = reader.read_positions() else {
            warn!("{}, skipping", ResourceError::MissingAttribute("POSITION"));
            return;
        };
        let Some(raw_indices) = reader.read_indices() else {
            warn!("Skipping primitive with unreadable indices");
            return;
        };

        let positions: Vec<Vec3> = positions.map(Vec3::from).collect();
        let count = positions.len();
        let raw_indices: Vec<u32> = raw_indices.into_u32().collect();
        if let Some(bad) = first_out_of_range(&raw_indices, count) {
            warn!(
                "Skipping primitive: index {} out of range for {} vertices",
                bad, count
            );
            return;
        }
        let Some(rebased) = u32::try_from(self.vertices.len())
            .ok()
            .and_then(|offset| rebase_indices(raw_indices, offset))
        else {
            warn!("Skipping primitive: scene exceeds the 32-bit index range");
            return;
        };

        let normals: Vec<Vec3> = reader
            .read_normals()
            .map(|it| it.map(Vec3::from).collect())
            .unwrap_or_else(|| vec![Vec3::ZERO; count]);
        let tex_coords: Vec<Vec2> = reader
            .read_tex_coords(0)
            .map(|it| it.into_f32().map(Vec2::from).collect())
            .unwrap_or_else(|| vec![Vec2::ZERO; count]);
        let tangents: Vec<Vec4> = reader
            .read_tangents()
            .map(|it| it.map(Vec4::from).collect())
            .unwrap_or_else(|| vec![Vec4::ZERO; count]);

        let normal_xform = normal_matrix(world);
        let linear = Mat3::from_mat4(world);

        self.vertices.extend((0..count).map(|i| {
            let normal = normals.get(i).copied().unwrap_or(Vec3::ZERO);
            let tangent = tangents.get(i).copied().unwrap_or(Vec4::ZERO);
            Vertex::new(
                world.transform_point3(positions[i]),
                normal_xform.transform_vector3(normal).normalize_or_zero(),
                tex_coords.get(i).copied().unwrap_or(Vec2::ZERO),
                (linear * tangent.truncate())
                    .normalize_or_zero()
                    .extend(tangent.w),
            )
        }));

        let first_index = self.indices.len() as u32;
        let index_count = rebased.len() as u32;
        self.indices.extend(rebased);

        debug!(
            "Primitive: {} vertices, {} indices, material {:?}",
            count,
            index_count,
            primitive.material().index()
        );
        self.primitives.push(Primitive {
            first_index,
            index_count,
            material: primitive.material().index(),
        });
    }
}

/// A node's local TRS, from either of glTF's two encodings.
fn node_transform(node: &gltf::Node) -> Transform {
    match node.transform() {
        gltf::scene::Transform::Matrix { matrix } => {
            Transform::from_matrix(Mat4::from_cols_array_2d(&matrix))
        }
        gltf::scene::Transform::Decomposed {
            translation,
            rotation,
            scale,
        } => Transform::new()
            .with_position(Vec3::from(translation))
            .with_rotation(Quat::from_array(rotation))
            .with_scale(Vec3::from(scale)),
    }
}

fn material_slots(material: &gltf::Material) -> MaterialSlots {
    let pbr = material.pbr_metallic_roughness();
    MaterialSlots {
        albedo: pbr.base_color_texture().map(|t| t.texture().index()),
        normal: material.normal_texture().map(|t| t.texture().index()),
        metallic_roughness: pbr.metallic_roughness_texture().map(|t| t.texture().index()),
    }
}

/// Sampler key for a glTF sampler: the mag filter and the S wrap mode decide.
pub fn sampler_key(sampler: &gltf::texture::Sampler) -> SamplerKey {
    let filter = match sampler.mag_filter() {
        Some(MagFilter::Nearest) => vk::Filter::NEAREST,
        _ => vk::Filter::LINEAR,
    };
    SamplerKey::new(filter, address_mode(sampler.wrap_s()))
}

fn address_mode(mode: WrappingMode) -> vk::SamplerAddressMode {
    match mode {
        WrappingMode::Repeat => vk::SamplerAddressMode::REPEAT,
        WrappingMode::ClampToEdge => vk::SamplerAddressMode::CLAMP_TO_EDGE,
        WrappingMode::MirroredRepeat => vk::SamplerAddressMode::MIRRORED_REPEAT,
    }
}

fn decode_image(
    image: &gltf::Image,
    base: &Path,
    buffers: &[gltf::buffer::Data],
) -> Option<DecodedImage> {
    let decoded = match image.source() {
        gltf::image::Source::Uri { uri, .. } => {
            if uri.starts_with("data:") {
                return decode_embedded(image, base, buffers);
            }
            let path: PathBuf = base.join(uri);
            image::open(&path).map_err(|e| (path.display().to_string(), e))
        }
        gltf::image::Source::View { view, .. } => {
            let bytes = buffers
                .get(view.buffer().index())
                .and_then(|d| d.0.get(view.offset()..view.offset() + view.length()))?;
            image::load_from_memory(bytes).map_err(|e| (format!("buffer view {}", view.index()), e))
        }
    };

    match decoded {
        Ok(dynamic) => {
            let rgba = dynamic.to_rgba8();
            let (width, height) = rgba.dimensions();
            Some(DecodedImage {
                pixels: rgba.into_raw(),
                width,
                height,
            })
        }
        Err((source, e)) => {
            warn!("Failed to decode image {} ({}): {}", image.index(), source, e);
            None
        }
    }
}

/// Base64 `data:` URIs, decoded by gltf itself.
fn decode_embedded(
    image: &gltf::Image,
    base: &Path,
    buffers: &[gltf::buffer::Data],
) -> Option<DecodedImage> {
    match gltf::image::Data::from_source(image.source(), Some(base), buffers) {
        Ok(data) => {
            let decoded = rgba8_from(data);
            if decoded.is_none() {
                warn!("Image {}: unsupported embedded pixel format", image.index());
            }
            decoded
        }
        Err(e) => {
            warn!("Failed to decode embedded image {}: {}", image.index(), e);
            None
        }
    }
}

/// Expands 8-bit gltf pixel data to RGBA8. Wider formats are not handled.
fn rgba8_from(data: gltf::image::Data) -> Option<DecodedImage> {
    use gltf::image::Format;

    let pixels = match data.format {
        Format::R8G8B8A8 => data.pixels,
        Format::R8G8B8 => data
            .pixels
            .chunks_exact(3)
            .flat_map(|p| [p[0], p[1], p[2], 255])
            .collect(),
        Format::R8G8 => data
            .pixels
            .chunks_exact(2)
            .flat_map(|p| [p[0], p[1], 0, 255])
            .collect(),
        Format::R8 => data.pixels.iter().flat_map(|&l| [l, l, l, 255]).collect(),
        _ => return None,
    };
    Some(DecodedImage {
        pixels,
        width: data.width,
        height: data.height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rebase_indices() {
        assert_eq!(rebase_indices([0, 1, 2], 0), Some(vec![0, 1, 2]));
        assert_eq!(
            rebase_indices([0, 1, 2, 2, 1, 3], 100),
            Some(vec![100, 101, 102, 102, 101, 103])
        );
        assert_eq!(rebase_indices(std::iter::empty(), 5), Some(vec![]));
    }

    #[test]
    fn test_rebase_indices_overflow() {
        assert_eq!(rebase_indices([0, 1], u32::MAX), None);
        assert_eq!(rebase_indices([0], u32::MAX), Some(vec![u32::MAX]));
    }

    #[test]
    fn test_first_out_of_range() {
        assert_eq!(first_out_of_range(&[0, 1, 2], 3), None);
        assert_eq!(first_out_of_range(&[0, 1, 7, 9], 3), Some(7));
        assert_eq!(first_out_of_range(&[0], 0), Some(0));
        assert_eq!(first_out_of_range(&[], 0), None);
    }

    #[test]
    fn test_index_widths() {
        assert_eq!(IndexWidth::from_data_type(DataType::U8), Some(IndexWidth::U8));
        assert_eq!(IndexWidth::from_data_type(DataType::U16), Some(IndexWidth::U16));
        assert_eq!(IndexWidth::from_data_type(DataType::U32), Some(IndexWidth::U32));
        assert_eq!(IndexWidth::from_data_type(DataType::F32), None);
        assert_eq!(IndexWidth::from_data_type(DataType::I16), None);
    }

    #[test]
    fn test_needs_default_material() {
        let mut scene = SceneData {
            materials: vec![MaterialSlots::default()],
            ..Default::default()
        };
        scene.primitives.push(Primitive {
            first_index: 0,
            index_count: 3,
            material: Some(0),
        });
        assert!(!scene.needs_default_material());

        scene.primitives.push(Primitive {
            first_index: 3,
            index_count: 3,
            material: None,
        });
        assert!(scene.needs_default_material());
    }

    #[test]
    fn test_fallback_image() {
        let image = DecodedImage::fallback();
        assert_eq!(image.pixels.len(), 4);
        assert_eq!((image.width, image.height), (1, 1));
    }
}
