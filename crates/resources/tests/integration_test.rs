//! Integration tests for glTF scene import.

use std::fs;
use std::path::{Path, PathBuf};

use glam::Vec3;
use vista_resources::{MaterialSlots, Primitive, ResourceError, SceneData};
use vista_rhi::texture::ColorSpace;
use vista_rhi::vk;

/// Two nodes share one triangle mesh (the child is offset by +10 on X under a
/// parent at z=5), a third node draws lines and a fourth has no mesh.
const SCENE_JSON: &str = r#"{
  "asset": { "version": "2.0" },
  "scene": 0,
  "scenes": [ { "nodes": [0, 2, 3] } ],
  "nodes": [
    { "mesh": 0, "translation": [0.0, 0.0, 5.0], "children": [1] },
    { "mesh": 0, "translation": [10.0, 0.0, 0.0] },
    { "mesh": 1 },
    { "name": "empty" }
  ],
  "meshes": [
    { "primitives": [ { "attributes": { "POSITION": 0 }, "indices": 1, "material": 0 } ] },
    { "primitives": [ { "attributes": { "POSITION": 0 }, "indices": 1, "mode": 1 } ] }
  ],
  "materials": [
    {
      "pbrMetallicRoughness": { "baseColorTexture": { "index": 1 } },
      "normalTexture": { "index": 0 }
    }
  ],
  "textures": [ { "source": 0, "sampler": 0 }, { "source": 0 } ],
  "samplers": [ { "magFilter": 9728, "wrapS": 33071 } ],
  "images": [ { "uri": "missing.png" } ],
  "buffers": [ { "uri": "scene.bin", "byteLength": 42 } ],
  "bufferViews": [
    { "buffer": 0, "byteOffset": 0, "byteLength": 36 },
    { "buffer": 0, "byteOffset": 36, "byteLength": 6 }
  ],
  "accessors": [
    { "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
      "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0] },
    { "bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR" }
  ]
}"#;

fn scene_bin() -> Vec<u8> {
    scene_bin_with_indices([0, 1, 2])
}

fn scene_bin_with_indices(indices: [u16; 3]) -> Vec<u8> {
    let positions: [f32; 9] = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
    let mut bytes: Vec<u8> = positions.iter().flat_map(|f| f.to_le_bytes()).collect();
    bytes.extend(indices.iter().flat_map(|i| i.to_le_bytes()));
    bytes
}

fn check_scene(scene: &SceneData) {
    assert_eq!(scene.vertices.len(), 6);
    assert_eq!(scene.indices, vec![0, 1, 2, 3, 4, 5]);
    assert_eq!(
        scene.primitives,
        vec![
            Primitive {
                first_index: 0,
                index_count: 3,
                material: Some(0),
            },
            Primitive {
                first_index: 3,
                index_count: 3,
                material: Some(0),
            },
        ]
    );

    // Parent transform applies to the first instance, parent then child to the second.
    assert!(scene.vertices[1].position.abs_diff_eq(Vec3::new(1.0, 0.0, 5.0), 1e-6));
    assert!(scene.vertices[3].position.abs_diff_eq(Vec3::new(10.0, 0.0, 5.0), 1e-6));
    assert!(scene.vertices[5].position.abs_diff_eq(Vec3::new(10.0, 1.0, 5.0), 1e-6));

    assert_eq!(
        scene.materials,
        vec![MaterialSlots {
            albedo: Some(1),
            normal: Some(0),
            metallic_roughness: None,
        }]
    );
    assert!(!scene.needs_default_material());

    assert_eq!(scene.textures.len(), 2);
    let normal = &scene.textures[0];
    assert_eq!(normal.color_space, ColorSpace::Linear);
    assert_eq!(normal.sampler.filter, vk::Filter::NEAREST);
    assert_eq!(normal.sampler.address_mode, vk::SamplerAddressMode::CLAMP_TO_EDGE);
    let albedo = &scene.textures[1];
    assert_eq!(albedo.color_space, ColorSpace::Srgb);
    assert_eq!(albedo.sampler, Default::default());

    // Image is missing on disk, so both textures fall back to 1x1 white.
    assert_eq!(albedo.image.pixels, vec![255; 4]);
}

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("vista-resources-{}-{}", name, std::process::id()));
    fs::create_dir_all(&dir).expect("create scratch dir");
    dir
}

#[test]
fn test_from_gltf_flattens_and_rebases() {
    let gltf = gltf::Gltf::from_slice(SCENE_JSON.as_bytes()).expect("parse glTF");
    let buffers = vec![gltf::buffer::Data(scene_bin())];
    let scene = SceneData::from_gltf(&gltf.document, &buffers, &[None]);
    check_scene(&scene);
}

#[test]
fn test_matrix_node_transform_matches_trs() {
    let json = SCENE_JSON.replace(
        r#""translation": [0.0, 0.0, 5.0], "children""#,
        r#""matrix": [1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 5.0, 1.0], "children""#,
    );
    let gltf = gltf::Gltf::from_slice(json.as_bytes()).expect("parse glTF");
    let buffers = vec![gltf::buffer::Data(scene_bin())];
    let scene = SceneData::from_gltf(&gltf.document, &buffers, &[None]);
    check_scene(&scene);
}

#[test]
fn test_out_of_range_index_skips_primitive() {
    let gltf = gltf::Gltf::from_slice(SCENE_JSON.as_bytes()).expect("parse glTF");
    let buffers = vec![gltf::buffer::Data(scene_bin_with_indices([0, 1, 7]))];
    let scene = SceneData::from_gltf(&gltf.document, &buffers, &[None]);

    assert!(scene.primitives.is_empty());
    assert!(scene.indices.is_empty());
    assert!(scene.vertices.is_empty());
    // Materials and textures do not depend on geometry.
    assert_eq!(scene.materials.len(), 1);
    assert_eq!(scene.textures.len(), 2);
}

/// Same mesh twice; the second instance's primitive is valid, the first is not.
#[test]
fn test_bad_primitive_does_not_shift_later_ones() {
    let json = SCENE_JSON
        .replace(r#""buffers": [ { "uri": "scene.bin", "byteLength": 42 } ]"#,
                 r#""buffers": [ { "uri": "scene.bin", "byteLength": 48 } ]"#)
        .replace(r#"{ "bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR" }"#,
                 r#"{ "bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR" },
    { "bufferView": 2, "componentType": 5123, "count": 3, "type": "SCALAR" }"#)
        .replace(r#"{ "buffer": 0, "byteOffset": 36, "byteLength": 6 }"#,
                 r#"{ "buffer": 0, "byteOffset": 36, "byteLength": 6 },
    { "buffer": 0, "byteOffset": 42, "byteLength": 6 }"#)
        .replace(r#"{ "mesh": 0, "translation": [10.0, 0.0, 0.0] }"#,
                 r#"{ "mesh": 2, "translation": [10.0, 0.0, 0.0] }"#)
        .replace(r#"{ "primitives": [ { "attributes": { "POSITION": 0 }, "indices": 1, "mode": 1 } ] }"#,
                 r#"{ "primitives": [ { "attributes": { "POSITION": 0 }, "indices": 1, "mode": 1 } ] },
    { "primitives": [ { "attributes": { "POSITION": 0 }, "indices": 2, "material": 0 } ] }"#);
    let gltf = gltf::Gltf::from_slice(json.as_bytes()).expect("parse glTF");

    let mut bin = scene_bin_with_indices([0, 1, 7]);
    bin.extend([2u16, 1, 0].iter().flat_map(|i| i.to_le_bytes()));
    let scene = SceneData::from_gltf(&gltf.document, &[gltf::buffer::Data(bin)], &[None]);

    assert_eq!(scene.vertices.len(), 3);
    assert_eq!(scene.indices, vec![2, 1, 0]);
    assert_eq!(
        scene.primitives,
        vec![Primitive {
            first_index: 0,
            index_count: 3,
            material: Some(0),
        }]
    );
    let max = scene.vertices.len() as u32;
    assert!(scene.indices.iter().all(|&i| i < max));
}

fn base64(bytes: &[u8]) -> String {
    const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
    let mut out = String::new();
    for chunk in bytes.chunks(3) {
        let b = [chunk[0], *chunk.get(1).unwrap_or(&0), *chunk.get(2).unwrap_or(&0)];
        let n = (u32::from(b[0]) << 16) | (u32::from(b[1]) << 8) | u32::from(b[2]);
        for i in 0..4 {
            if i <= chunk.len() {
                out.push(ALPHABET[((n >> (18 - 6 * i)) & 63) as usize] as char);
            } else {
                out.push('=');
            }
        }
    }
    out
}

#[test]
fn test_load_embedded_data_uri_image() {
    let pixels = image::RgbaImage::from_raw(2, 1, vec![10, 20, 30, 255, 200, 100, 50, 128])
        .expect("2x1 image");
    let mut png = std::io::Cursor::new(Vec::new());
    pixels
        .write_to(&mut png, image::ImageFormat::Png)
        .expect("encode png");
    let uri = format!("data:image/png;base64,{}", base64(png.get_ref()));

    let json = SCENE_JSON.replace(
        r#""images": [ { "uri": "missing.png" } ]"#,
        &format!(r#""images": [ {{ "uri": "{}" }} ]"#, uri),
    );
    let dir = scratch_dir("embedded");
    let path = dir.join("scene.gltf");
    fs::write(&path, json).expect("write gltf");
    fs::write(dir.join("scene.bin"), scene_bin()).expect("write bin");

    let scene = SceneData::load(&path).expect("load scene");
    for texture in &scene.textures {
        assert_eq!((texture.image.width, texture.image.height), (2, 1));
        assert_eq!(texture.image.pixels, vec![10, 20, 30, 255, 200, 100, 50, 128]);
    }

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn test_base64_helper() {
    assert_eq!(base64(b"Man"), "TWFu");
    assert_eq!(base64(b"Ma"), "TWE=");
    assert_eq!(base64(b"M"), "TQ==");
}

#[test]
fn test_load_from_disk() {
    let dir = scratch_dir("load");
    let path = dir.join("scene.gltf");
    fs::write(&path, SCENE_JSON).expect("write gltf");
    fs::write(dir.join("scene.bin"), scene_bin()).expect("write bin");

    let scene = SceneData::load(&path).expect("load scene");
    check_scene(&scene);

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn test_load_missing_file() {
    let result = SceneData::load(Path::new("does/not/exist.gltf"));
    assert!(matches!(result, Err(ResourceError::FileNotFound(_))));
}

#[test]
fn test_load_invalid_document() {
    let dir = scratch_dir("invalid");
    let path = dir.join("broken.gltf");
    fs::write(&path, "{ not json").expect("write gltf");

    let result = SceneData::load(&path);
    assert!(matches!(result, Err(ResourceError::GltfLoad { .. })));

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn test_load_sample_asset() {
    let path = Path::new("../../assets/models/scene.gltf");
    if !path.exists() {
        println!("Skipping test: model file not found at {:?}", path);
        return;
    }

    let scene = SceneData::load(path).expect("Failed to load glTF scene");
    assert!(!scene.primitives.is_empty());
    let max = scene.vertices.len() as u32;
    assert!(scene.indices.iter().all(|&i| i < max));
    for primitive in &scene.primitives {
        assert!((primitive.first_index + primitive.index_count) as usize <= scene.indices.len());
    }
}
