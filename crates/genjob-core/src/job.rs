//! Job kinds and the user parameters each kind carries.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::error::CoreError;

/// The closed set of generation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    TextToMesh,
    ImageToMesh,
    TextToMaterial,
    SceneTexturing,
}

impl JobKind {
    /// All kinds, in presentation order.
    pub const ALL: [JobKind; 4] = [
        JobKind::TextToMesh,
        JobKind::ImageToMesh,
        JobKind::TextToMaterial,
        JobKind::SceneTexturing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TextToMesh => "text_to_mesh",
            Self::ImageToMesh => "image_to_mesh",
            Self::TextToMaterial => "text_to_material",
            Self::SceneTexturing => "scene_texturing",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Prompt settings shared by every generation kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationSettings {
    /// What to generate.
    pub prompt: String,

    /// What to steer away from. Empty means none.
    #[serde(default)]
    pub negative_prompt: String,

    /// Seed for reproducible results. Zero lets the remote pick one.
    #[serde(default)]
    pub seed: u32,
}

impl GenerationSettings {
    /// Create settings with only a prompt.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            negative_prompt: String::new(),
            seed: 0,
        }
    }

    /// Builder method to set the negative prompt.
    pub fn with_negative_prompt(mut self, negative_prompt: impl Into<String>) -> Self {
        self.negative_prompt = negative_prompt.into();
        self
    }

    /// Builder method to set the seed.
    pub fn with_seed(mut self, seed: u32) -> Self {
        self.seed = seed;
        self
    }
}

/// Binary image uploaded alongside a request.
#[derive(Clone, PartialEq)]
pub struct ReferenceImage {
    /// File name reported to the remote.
    pub file_name: String,

    /// Encoded image bytes.
    pub data: Vec<u8>,
}

impl ReferenceImage {
    pub fn new(file_name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            data,
        }
    }

    /// Read an image from disk, keeping its file name.
    pub fn from_path(path: &Path) -> Result<Self, CoreError> {
        let data = std::fs::read(path).map_err(|e| {
            CoreError::InvalidInput(format!("cannot read image '{}': {}", path.display(), e))
        })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image.png".to_string());
        Ok(Self { file_name, data })
    }
}

impl fmt::Debug for ReferenceImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReferenceImage")
            .field("file_name", &self.file_name)
            .field("len", &self.data.len())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextToMeshParams {
    pub settings: GenerationSettings,
    /// Upper bound on the generated face count.
    pub face_limit: Option<u32>,
    /// Request PBR textures (metallic-roughness and normals) as well as albedo.
    pub pbr: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageToMeshParams {
    pub settings: GenerationSettings,
    pub image: ReferenceImage,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextToMaterialParams {
    pub settings: GenerationSettings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneTexturingParams {
    pub settings: GenerationSettings,
}

/// A user-triggered generation request, one variant per kind.
#[derive(Debug, Clone, PartialEq)]
pub enum JobRequest {
    TextToMesh(TextToMeshParams),
    ImageToMesh(ImageToMeshParams),
    TextToMaterial(TextToMaterialParams),
    SceneTexturing(SceneTexturingParams),
}

impl JobRequest {
    /// The kind of job this request produces.
    pub fn kind(&self) -> JobKind {
        match self {
            Self::TextToMesh(_) => JobKind::TextToMesh,
            Self::ImageToMesh(_) => JobKind::ImageToMesh,
            Self::TextToMaterial(_) => JobKind::TextToMaterial,
            Self::SceneTexturing(_) => JobKind::SceneTexturing,
        }
    }

    /// Prompt settings of the request.
    pub fn settings(&self) -> &GenerationSettings {
        match self {
            Self::TextToMesh(p) => &p.settings,
            Self::ImageToMesh(p) => &p.settings,
            Self::TextToMaterial(p) => &p.settings,
            Self::SceneTexturing(p) => &p.settings,
        }
    }

    /// Reject requests the remote would refuse anyway.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.settings().prompt.trim().is_empty() && !matches!(self, Self::ImageToMesh(_)) {
            return Err(CoreError::InvalidInput("prompt must not be empty".to_string()));
        }
        if let Self::ImageToMesh(p) = self {
            if p.image.data.is_empty() {
                return Err(CoreError::InvalidInput(
                    "reference image must not be empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_kind() {
        let request = JobRequest::TextToMaterial(TextToMaterialParams {
            settings: GenerationSettings::new("rusty metal"),
        });
        assert_eq!(request.kind(), JobKind::TextToMaterial);
        assert_eq!(request.settings().prompt, "rusty metal");
    }

    #[test]
    fn test_empty_prompt_rejected() {
        let request = JobRequest::TextToMesh(TextToMeshParams {
            settings: GenerationSettings::new("   "),
            face_limit: None,
            pbr: false,
        });
        assert!(matches!(request.validate(), Err(CoreError::InvalidInput(_))));
    }

    #[test]
    fn test_image_request_allows_empty_prompt() {
        let request = JobRequest::ImageToMesh(ImageToMeshParams {
            settings: GenerationSettings::new(""),
            image: ReferenceImage::new("ref.png", vec![1, 2, 3]),
        });
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_settings_builder() {
        let settings = GenerationSettings::new("a red chair")
            .with_negative_prompt("blurry")
            .with_seed(42);
        assert_eq!(settings.seed, 42);
        assert_eq!(settings.negative_prompt, "blurry");
    }
}
