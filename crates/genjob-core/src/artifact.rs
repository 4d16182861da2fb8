//! Artifact descriptors produced by completed jobs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::ArtifactId;
use crate::job::{GenerationSettings, JobKind};

/// What kind of asset an artifact holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// A mesh plus its textures.
    Mesh,
    /// A set of material texture channels.
    Material,
    /// Textures projected onto existing scene objects.
    Texturing,
}

impl From<JobKind> for ArtifactKind {
    fn from(kind: JobKind) -> Self {
        match kind {
            JobKind::TextToMesh | JobKind::ImageToMesh => Self::Mesh,
            JobKind::TextToMaterial => Self::Material,
            JobKind::SceneTexturing => Self::Texturing,
        }
    }
}

/// Role a file plays within an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileRole {
    Mesh,
    Albedo,
    Normal,
    Displacement,
    Metallic,
    Roughness,
    MetallicRoughness,
    AmbientOcclusion,
    /// Albedo projected into the UV space of the named scene object.
    Projected(String),
}

/// A file belonging to an artifact, relative to the artifact directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactFile {
    pub role: FileRole,
    pub file_name: String,
}

impl ArtifactFile {
    pub fn new(role: FileRole, file_name: impl Into<String>) -> Self {
        Self {
            role,
            file_name: file_name.into(),
        }
    }
}

/// Descriptor of a job's final output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub id: ArtifactId,
    pub kind: ArtifactKind,
    pub created_at: DateTime<Utc>,
    pub settings: GenerationSettings,
    #[serde(default)]
    pub face_limit: Option<u32>,
    #[serde(default)]
    pub pbr: bool,
    #[serde(default)]
    pub favorite: bool,
    pub files: Vec<ArtifactFile>,
}

impl Artifact {
    /// Create a new artifact with a fresh id and no files.
    pub fn new(kind: ArtifactKind, settings: GenerationSettings) -> Self {
        Self {
            id: ArtifactId::generate(),
            kind,
            created_at: Utc::now(),
            settings,
            face_limit: None,
            pbr: false,
            favorite: false,
            files: Vec::new(),
        }
    }

    /// Builder method to add a file.
    pub fn with_file(mut self, role: FileRole, file_name: impl Into<String>) -> Self {
        self.files.push(ArtifactFile::new(role, file_name));
        self
    }

    /// Builder method to record mesh options.
    pub fn with_mesh_options(mut self, face_limit: Option<u32>, pbr: bool) -> Self {
        self.face_limit = face_limit;
        self.pbr = pbr;
        self
    }

    /// Find the file playing a role.
    pub fn file(&self, role: &FileRole) -> Option<&ArtifactFile> {
        self.files.iter().find(|f| &f.role == role)
    }
}
