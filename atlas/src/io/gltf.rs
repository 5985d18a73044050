//! Thin glTF scene-import adapter backing `Step::Gltf`.
//!
//! Grounded in `loadGltfCooked` in `original_source/tensorGltf.c`, which packs a scene into
//! an interleaved vertex tensor (position, normal, uv, joint indices, joint weights, material
//! id — 17 floats per vertex), an index tensor, and a per-frame baked skinning-matrix tensor.
//! The actual glTF parsing is delegated to the `gltf` crate rather than hand-rolled, the same
//! way `atlas::io::image` delegates raster decoding to `image`.
//!
//! We deliberately do not reproduce the original's animation-curve baking
//! (`sample_node_at_time`/`get_node_global_transform`/`vec3_lerp`/`quat_slerp`): real-time
//! playback and frame scheduling are an external, windowed-presentation concern this crate
//! does not implement. Instead of a baked `[frames, bones, 4, 4]` tensor we expose the skin's
//! static inverse-bind matrices as a `[bones, 4, 4]` tensor, leaving per-frame pose sampling to
//! whatever drives the evaluator.

use atlas_tensor::Tensor;

use crate::error::Detail;

/// Floats packed per vertex: position(3) normal(3) uv(2) joints(4) weights(4) material id(1).
const FLOATS_PER_VERT: usize = 17;

/// The four tensors a `gltf` step pushes onto the stack, in push order (so the first pushed
/// ends up deepest): vertices, indices, bone inverse-bind matrices, material ids.
pub struct GltfImport {
    /// `[total_verts, 17]` interleaved vertex buffer.
    pub verts: Tensor,
    /// `[total_indices]` flat triangle-list index buffer, vertex indices offset per primitive
    /// the way the original accumulates `vert_offset`.
    pub indices: Tensor,
    /// `[bones, 4, 4]` inverse-bind matrices of the scene's first skin, or a single identity
    /// matrix (`[1, 4, 4]`) if the scene has no skin.
    pub bones: Tensor,
    /// `[materials]` vector, one entry per primitive's material index, matching `vdata`'s
    /// packed `matId` column but pulled out as its own tensor instead of a 17th vertex float.
    pub materials: Tensor,
}

pub fn load(path: &str) -> std::result::Result<GltfImport, Detail> {
    let (document, buffers, _images) = gltf::import(path).map_err(|e| Detail::Gltf(path.to_string(), e.to_string()))?;

    let mut vdata: Vec<f32> = Vec::new();
    let mut idata: Vec<f32> = Vec::new();
    let mut materials: Vec<f32> = Vec::new();
    let mut vert_offset: u32 = 0;
    let mut mat_id: f32 = 0.0;

    for mesh in document.meshes() {
        for primitive in mesh.primitives() {
            let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|b| b.0.as_slice()));

            let positions: Vec<[f32; 3]> = reader.read_positions().map(|it| it.collect()).unwrap_or_default();
            let prim_vert_count = positions.len();
            if prim_vert_count == 0 {
                continue;
            }

            let normals: Vec<[f32; 3]> =
                reader.read_normals().map(|it| it.collect()).unwrap_or_else(|| vec![[0.0; 3]; prim_vert_count]);
            let uvs: Vec<[f32; 2]> = reader
                .read_tex_coords(0)
                .map(|it| it.into_f32().collect())
                .unwrap_or_else(|| vec![[0.0; 2]; prim_vert_count]);
            let joints: Vec<[f32; 4]> = reader
                .read_joints(0)
                .map(|it| it.into_u16().map(|j| [j[0] as f32, j[1] as f32, j[2] as f32, j[3] as f32]).collect())
                .unwrap_or_else(|| vec![[0.0; 4]; prim_vert_count]);
            let weights: Vec<[f32; 4]> = reader
                .read_weights(0)
                .map(|it| it.into_f32().collect())
                .unwrap_or_else(|| vec![[0.0; 4]; prim_vert_count]);

            for v in 0..prim_vert_count {
                vdata.extend_from_slice(&positions[v]);
                vdata.extend_from_slice(&normals[v]);
                vdata.extend_from_slice(&uvs[v]);
                vdata.extend_from_slice(&joints[v]);
                vdata.extend_from_slice(&weights[v]);
                vdata.push(mat_id);
            }

            if let Some(indices) = reader.read_indices() {
                idata.extend(indices.into_u32().map(|i| (i + vert_offset) as f32));
            }

            materials.push(mat_id);
            vert_offset += prim_vert_count as u32;
            mat_id += 1.0;
        }
    }

    if vert_offset == 0 {
        return Err(Detail::Gltf(path.to_string(), "no vertices found".to_string()));
    }

    let total_verts = vert_offset as usize;
    debug_assert_eq!(vdata.len(), total_verts * FLOATS_PER_VERT);

    let verts = Tensor::from_host(&[vert_offset, FLOATS_PER_VERT as u32], vdata);
    let indices = if idata.is_empty() {
        Tensor::from_host(&[0], idata)
    } else {
        Tensor::from_host(&[idata.len() as u32], idata)
    };
    let materials = Tensor::vector(materials);
    let bones = load_bones(&document, &buffers);

    Ok(GltfImport { verts, indices, bones, materials })
}

fn load_bones(document: &gltf::Document, buffers: &[gltf::buffer::Data]) -> Tensor {
    let Some(skin) = document.skins().next() else {
        return identity_bone();
    };
    let reader = skin.reader(|buffer| buffers.get(buffer.index()).map(|b| b.0.as_slice()));
    let Some(matrices) = reader.read_inverse_bind_matrices() else {
        return identity_bone();
    };

    let mut data = Vec::new();
    let mut count = 0u32;
    for m in matrices {
        for col in m {
            data.extend_from_slice(&col);
        }
        count += 1;
    }
    if count == 0 {
        return identity_bone();
    }
    Tensor::from_host(&[count, 4, 4], data)
}

fn identity_bone() -> Tensor {
    #[rustfmt::skip]
    let identity = vec![
        1.0, 0.0, 0.0, 0.0,
        0.0, 1.0, 0.0, 0.0,
        0.0, 0.0, 1.0, 0.0,
        0.0, 0.0, 0.0, 1.0,
    ];
    Tensor::from_host(&[1, 4, 4], identity)
}
