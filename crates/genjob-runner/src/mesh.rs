//! Local post-processing of downloaded meshes.
//!
//! [`GlbProcessor`] works directly on binary glTF containers: it rescales the
//! geometry into a unit cube centred at the origin and pulls the first
//! material's embedded textures out as PNG files.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use glam::Vec3;
use image::ImageFormat;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

const GLB_MAGIC: &[u8; 4] = b"glTF";
const GLB_VERSION: u32 = 2;
const CHUNK_JSON: u32 = 0x4E4F_534A;
const CHUNK_BIN: u32 = 0x004E_4942;
const COMPONENT_FLOAT: u64 = 5126;
const MODE_TRIANGLES: u64 = 4;
const PNG_MAGIC: &[u8; 8] = b"\x89PNG\r\n\x1a\n";

/// Errors from mesh post-processing.
#[derive(Debug, Error)]
pub enum MeshError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed GLB: {0}")]
    Malformed(String),

    #[error("invalid glTF JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("mesh has no position data")]
    NoGeometry,

    #[error("mesh has no {0} texture")]
    MissingTexture(TextureSlot),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

/// Texture channel of a mesh's first material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureSlot {
    BaseColor,
    MetallicRoughness,
    Normal,
}

impl TextureSlot {
    fn pointer(&self) -> &'static str {
        match self {
            Self::BaseColor => "/materials/0/pbrMetallicRoughness/baseColorTexture/index",
            Self::MetallicRoughness => {
                "/materials/0/pbrMetallicRoughness/metallicRoughnessTexture/index"
            }
            Self::Normal => "/materials/0/normalTexture/index",
        }
    }
}

impl fmt::Display for TextureSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::BaseColor => "base color",
            Self::MetallicRoughness => "metallic-roughness",
            Self::Normal => "normal",
        })
    }
}

/// Mesh post-processing used by the mesh pipelines.
///
/// Implementations are blocking; callers run them off the async runtime.
pub trait MeshProcessor: Send + Sync {
    /// Write a normalized copy of `src` to `dst`.
    fn normalize(&self, src: &Path, dst: &Path) -> Result<(), MeshError>;

    /// Extract each requested texture of `mesh` into its target PNG file.
    fn extract_textures(
        &self,
        mesh: &Path,
        targets: &[(TextureSlot, PathBuf)],
    ) -> Result<(), MeshError>;
}

/// [`MeshProcessor`] for binary glTF (`.glb`) files.
#[derive(Debug, Clone, Copy, Default)]
pub struct GlbProcessor;

impl MeshProcessor for GlbProcessor {
    fn normalize(&self, src: &Path, dst: &Path) -> Result<(), MeshError> {
        let mut glb = Glb::parse(&std::fs::read(src)?)?;
        glb.warn_non_triangles();
        glb.fit_unit_cube()?;
        std::fs::write(dst, glb.to_bytes()?)?;
        debug!(src = %src.display(), dst = %dst.display(), "Mesh normalized");
        Ok(())
    }

    fn extract_textures(
        &self,
        mesh: &Path,
        targets: &[(TextureSlot, PathBuf)],
    ) -> Result<(), MeshError> {
        let glb = Glb::parse(&std::fs::read(mesh)?)?;
        let base_dir = mesh.parent().unwrap_or_else(|| Path::new("."));

        for (slot, target) in targets {
            let data = glb.texture_image(*slot, base_dir)?;
            if data.starts_with(PNG_MAGIC) {
                std::fs::write(target, &data)?;
            } else {
                image::load_from_memory(&data)?.save_with_format(target, ImageFormat::Png)?;
            }
            debug!(slot = %slot, target = %target.display(), "Texture extracted");
        }
        Ok(())
    }
}

/// Location of a float VEC3 accessor inside the binary chunk.
#[derive(Debug, Clone, Copy)]
struct Vec3View {
    offset: usize,
    stride: usize,
    count: usize,
}

/// A parsed GLB container.
struct Glb {
    json: Value,
    bin: Vec<u8>,
}

impl Glb {
    fn parse(bytes: &[u8]) -> Result<Self, MeshError> {
        if bytes.len() < 12 || &bytes[0..4] != GLB_MAGIC {
            return Err(malformed("missing glTF header"));
        }
        let version = read_u32(bytes, 4)?;
        if version != GLB_VERSION {
            return Err(malformed(format!("unsupported version {}", version)));
        }
        let length = (read_u32(bytes, 8)? as usize).min(bytes.len());

        let mut json = None;
        let mut bin = Vec::new();
        let mut offset = 12;
        while offset + 8 <= length {
            let chunk_len = read_u32(bytes, offset)? as usize;
            let chunk_type = read_u32(bytes, offset + 4)?;
            let data = bytes
                .get(offset + 8..offset + 8 + chunk_len)
                .ok_or_else(|| malformed("chunk exceeds file length"))?;
            match chunk_type {
                CHUNK_JSON => json = Some(serde_json::from_slice(data)?),
                CHUNK_BIN if bin.is_empty() => bin = data.to_vec(),
                _ => {}
            }
            offset += 8 + chunk_len;
        }

        let json = json.ok_or_else(|| malformed("missing JSON chunk"))?;
        Ok(Self { json, bin })
    }

    fn to_bytes(&self) -> Result<Vec<u8>, MeshError> {
        let mut json = serde_json::to_vec(&self.json)?;
        pad(&mut json, b' ');
        let mut bin = self.bin.clone();
        pad(&mut bin, 0);

        let mut total = 12 + 8 + json.len();
        if !bin.is_empty() {
            total += 8 + bin.len();
        }

        let mut out = Vec::with_capacity(total);
        out.extend_from_slice(GLB_MAGIC);
        out.extend_from_slice(&GLB_VERSION.to_le_bytes());
        out.extend_from_slice(&(total as u32).to_le_bytes());
        out.extend_from_slice(&(json.len() as u32).to_le_bytes());
        out.extend_from_slice(&CHUNK_JSON.to_le_bytes());
        out.extend_from_slice(&json);
        if !bin.is_empty() {
            out.extend_from_slice(&(bin.len() as u32).to_le_bytes());
            out.extend_from_slice(&CHUNK_BIN.to_le_bytes());
            out.extend_from_slice(&bin);
        }
        Ok(out)
    }

    fn primitives(&self) -> impl Iterator<Item = &Value> {
        self.json["meshes"]
            .as_array()
            .into_iter()
            .flatten()
            .flat_map(|mesh| mesh["primitives"].as_array().into_iter().flatten())
    }

    fn warn_non_triangles(&self) {
        for primitive in self.primitives() {
            let mode = primitive["mode"].as_u64().unwrap_or(MODE_TRIANGLES);
            if mode != MODE_TRIANGLES {
                warn!(mode, "Mesh primitive is not a triangle list");
            }
        }
    }

    fn position_accessors(&self) -> BTreeSet<usize> {
        self.primitives()
            .filter_map(|p| p["attributes"]["POSITION"].as_u64())
            .map(|index| index as usize)
            .collect()
    }

    fn vec3_view(&self, accessor: usize) -> Result<Vec3View, MeshError> {
        let acc = &self.json["accessors"][accessor];
        if acc["componentType"].as_u64() != Some(COMPONENT_FLOAT) || acc["type"] != "VEC3" {
            return Err(malformed(format!("accessor {} is not a float VEC3", accessor)));
        }
        let view_index = acc["bufferView"]
            .as_u64()
            .ok_or_else(|| malformed(format!("accessor {} has no buffer view", accessor)))?;
        let view = &self.json["bufferViews"][view_index as usize];
        if view["buffer"].as_u64().unwrap_or(0) != 0 {
            return Err(malformed("external buffers are not supported"));
        }

        let exceeds = || malformed(format!("accessor {} exceeds binary chunk", accessor));
        let field = |value: &Value, default: u64| {
            usize::try_from(value.as_u64().unwrap_or(default)).map_err(|_| exceeds())
        };
        let count = field(&acc["count"], 0)?;
        let offset = field(&view["byteOffset"], 0)?
            .checked_add(field(&acc["byteOffset"], 0)?)
            .ok_or_else(exceeds)?;
        let stride = field(&view["byteStride"], 12)?;

        if count > 0 {
            let end = stride
                .checked_mul(count - 1)
                .and_then(|span| span.checked_add(offset))
                .and_then(|last| last.checked_add(12))
                .ok_or_else(exceeds)?;
            if end > self.bin.len() {
                return Err(exceeds());
            }
        }
        Ok(Vec3View {
            offset,
            stride,
            count,
        })
    }

    fn read_vec3(&self, view: Vec3View, index: usize) -> Result<Vec3, MeshError> {
        let base = view.offset + index * view.stride;
        Ok(Vec3::new(
            read_f32(&self.bin, base)?,
            read_f32(&self.bin, base + 4)?,
            read_f32(&self.bin, base + 8)?,
        ))
    }

    fn write_vec3(&mut self, view: Vec3View, index: usize, value: Vec3) {
        let base = view.offset + index * view.stride;
        for (i, component) in value.to_array().into_iter().enumerate() {
            let at = base + i * 4;
            self.bin[at..at + 4].copy_from_slice(&component.to_le_bytes());
        }
    }

    /// Rescale all positions so their combined bounds fit a unit cube
    /// centred at the origin.
    fn fit_unit_cube(&mut self) -> Result<(), MeshError> {
        let views = self
            .position_accessors()
            .into_iter()
            .map(|accessor| Ok((accessor, self.vec3_view(accessor)?)))
            .collect::<Result<Vec<_>, MeshError>>()?;

        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);
        for (_, view) in &views {
            for i in 0..view.count {
                let p = self.read_vec3(*view, i)?;
                min = min.min(p);
                max = max.max(p);
            }
        }
        if !min.is_finite() || !max.is_finite() {
            return Err(MeshError::NoGeometry);
        }

        let center = (min + max) * 0.5;
        let size = (max - min).max_element();
        let scale = if size > f32::EPSILON { 1.0 / size } else { 1.0 };

        for (accessor, view) in views {
            let mut acc_min = Vec3::splat(f32::INFINITY);
            let mut acc_max = Vec3::splat(f32::NEG_INFINITY);
            for i in 0..view.count {
                let p = (self.read_vec3(view, i)? - center) * scale;
                self.write_vec3(view, i, p);
                acc_min = acc_min.min(p);
                acc_max = acc_max.max(p);
            }
            if view.count > 0 {
                let acc = &mut self.json["accessors"][accessor];
                acc["min"] = json!(acc_min.to_array());
                acc["max"] = json!(acc_max.to_array());
            }
        }

        debug!(scale, center = ?center, "Rescaled mesh to unit cube");
        Ok(())
    }

    fn texture_image(&self, slot: TextureSlot, base_dir: &Path) -> Result<Vec<u8>, MeshError> {
        let texture = self
            .json
            .pointer(slot.pointer())
            .and_then(Value::as_u64)
            .ok_or(MeshError::MissingTexture(slot))?;
        let source = self.json["textures"][texture as usize]["source"]
            .as_u64()
            .ok_or(MeshError::MissingTexture(slot))?;
        let image = &self.json["images"][source as usize];

        if let Some(view_index) = image["bufferView"].as_u64() {
            let view = &self.json["bufferViews"][view_index as usize];
            let start = view["byteOffset"].as_u64().unwrap_or(0) as usize;
            let len = view["byteLength"].as_u64().unwrap_or(0) as usize;
            return self
                .bin
                .get(start..start + len)
                .map(<[u8]>::to_vec)
                .ok_or_else(|| malformed(format!("image {} exceeds binary chunk", source)));
        }

        match image["uri"].as_str() {
            Some(uri) if !uri.starts_with("data:") => Ok(std::fs::read(base_dir.join(uri))?),
            _ => Err(MeshError::MissingTexture(slot)),
        }
    }
}

fn malformed(message: impl Into<String>) -> MeshError {
    MeshError::Malformed(message.into())
}

fn read_u32(bytes: &[u8], offset: usize) -> Result<u32, MeshError> {
    bytes
        .get(offset..offset + 4)
        .and_then(|s| s.try_into().ok())
        .map(u32::from_le_bytes)
        .ok_or_else(|| malformed("unexpected end of data"))
}

fn read_f32(bytes: &[u8], offset: usize) -> Result<f32, MeshError> {
    read_u32(bytes, offset).map(f32::from_bits)
}

fn pad(data: &mut Vec<u8>, fill: u8) {
    while data.len() % 4 != 0 {
        data.push(fill);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use std::io::Cursor;

    pub(crate) fn png_bytes(color: [u8; 4]) -> Vec<u8> {
        let image = RgbaImage::from_pixel(2, 2, Rgba(color));
        let mut out = Cursor::new(Vec::new());
        image.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    /// A single triangle with one embedded base colour image.
    pub(crate) fn triangle_glb() -> Vec<u8> {
        let positions: [f32; 9] = [0.0, 0.0, 0.0, 2.0, 0.0, 0.0, 0.0, 4.0, 0.0];
        let mut bin: Vec<u8> = positions.iter().flat_map(|f| f.to_le_bytes()).collect();
        let png = png_bytes([200, 10, 10, 255]);
        let png_offset = bin.len();
        bin.extend_from_slice(&png);

        let json = json!({
            "asset": {"version": "2.0"},
            "buffers": [{"byteLength": bin.len()}],
            "bufferViews": [
                {"buffer": 0, "byteOffset": 0, "byteLength": 36},
                {"buffer": 0, "byteOffset": png_offset, "byteLength": png.len()}
            ],
            "accessors": [{
                "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
                "min": [0.0, 0.0, 0.0], "max": [2.0, 4.0, 0.0]
            }],
            "meshes": [{"primitives": [{"attributes": {"POSITION": 0}, "material": 0}]}],
            "materials": [{"pbrMetallicRoughness": {"baseColorTexture": {"index": 0}}}],
            "textures": [{"source": 0}],
            "images": [{"bufferView": 1, "mimeType": "image/png"}]
        });
        Glb { json, bin }.to_bytes().unwrap()
    }

    #[test]
    fn test_normalize_fits_unit_cube() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("mesh_orig.glb");
        let dst = dir.path().join("mesh.glb");
        std::fs::write(&src, triangle_glb()).unwrap();

        GlbProcessor.normalize(&src, &dst).unwrap();

        let glb = Glb::parse(&std::fs::read(&dst).unwrap()).unwrap();
        let view = glb.vec3_view(0).unwrap();
        let points: Vec<Vec3> = (0..3).map(|i| glb.read_vec3(view, i).unwrap()).collect();
        assert_eq!(points[0], Vec3::new(-0.25, -0.5, 0.0));
        assert_eq!(points[1], Vec3::new(0.25, -0.5, 0.0));
        assert_eq!(points[2], Vec3::new(-0.25, 0.5, 0.0));
        assert_eq!(glb.json["accessors"][0]["max"], json!([0.25, 0.5, 0.0]));
    }

    #[test]
    fn test_huge_accessor_is_malformed() {
        let mut glb = Glb::parse(&triangle_glb()).unwrap();
        glb.json["accessors"][0]["count"] = json!(u64::MAX);
        glb.json["bufferViews"][0]["byteStride"] = json!(u64::MAX / 2);

        assert!(matches!(glb.vec3_view(0), Err(MeshError::Malformed(_))));

        glb.json["accessors"][0]["count"] = json!(1_000_000);
        glb.json["bufferViews"][0]["byteStride"] = json!(12);
        assert!(matches!(glb.vec3_view(0), Err(MeshError::Malformed(_))));
    }

    #[test]
    fn test_extract_base_color() {
        let dir = tempfile::tempdir().unwrap();
        let mesh = dir.path().join("mesh.glb");
        let albedo = dir.path().join("albedo.png");
        std::fs::write(&mesh, triangle_glb()).unwrap();

        GlbProcessor
            .extract_textures(&mesh, &[(TextureSlot::BaseColor, albedo.clone())])
            .unwrap();

        let image = image::open(&albedo).unwrap().to_rgba8();
        assert_eq!(image.get_pixel(0, 0), &Rgba([200, 10, 10, 255]));
    }

    #[test]
    fn test_missing_texture_slot() {
        let dir = tempfile::tempdir().unwrap();
        let mesh = dir.path().join("mesh.glb");
        std::fs::write(&mesh, triangle_glb()).unwrap();

        let err = GlbProcessor
            .extract_textures(&mesh, &[(TextureSlot::Normal, dir.path().join("n.png"))])
            .unwrap_err();
        assert!(matches!(err, MeshError::MissingTexture(TextureSlot::Normal)));
    }

    #[test]
    fn test_rejects_non_glb() {
        assert!(matches!(
            Glb::parse(b"not a mesh at all"),
            Err(MeshError::Malformed(_))
        ));
    }
}
