//! Kind-specific submissions against the remote API.

use serde_json::{json, Map, Value};

use genjob_client::{FormPart, Submission, SubmissionBody};
use genjob_core::{GenerationSettings, ReferenceImage, RemoteTaskId};

const TEXT_TO_3D: &str = "text-to-3d";
const IMAGE_TO_3D: &str = "image-to-3d";
const MATERIAL: &str = "material";
const TEXTURING: &str = "texturing";

/// One unit of remote work and the parameters it is submitted with.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskRequest {
    /// First stage of a text-to-mesh generation.
    TextToMeshPreview {
        settings: GenerationSettings,
        face_limit: Option<u32>,
        pbr: bool,
    },
    /// Refinement of a finished mesh preview.
    TextToMeshOptimize { preview_id: RemoteTaskId },
    /// Single-stage mesh generation from a reference image.
    ImageToMesh {
        settings: GenerationSettings,
        image: ReferenceImage,
    },
    /// First stage of a material generation.
    MaterialPreview { settings: GenerationSettings },
    /// Refinement of a finished material preview.
    MaterialOptimize { preview_id: RemoteTaskId },
    /// Texture generation conditioned on scene depth and normals.
    Texturing {
        settings: GenerationSettings,
        depth: ReferenceImage,
        normal: ReferenceImage,
    },
}

impl TaskRequest {
    /// Endpoint the task is submitted to and polled under.
    pub fn endpoint(&self) -> &'static str {
        match self {
            Self::TextToMeshPreview { .. } | Self::TextToMeshOptimize { .. } => TEXT_TO_3D,
            Self::ImageToMesh { .. } => IMAGE_TO_3D,
            Self::MaterialPreview { .. } | Self::MaterialOptimize { .. } => MATERIAL,
            Self::Texturing { .. } => TEXTURING,
        }
    }

    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::TextToMeshPreview { .. } => "text_to_mesh_preview",
            Self::TextToMeshOptimize { .. } => "text_to_mesh_optimize",
            Self::ImageToMesh { .. } => "image_to_mesh",
            Self::MaterialPreview { .. } => "material_preview",
            Self::MaterialOptimize { .. } => "material_optimize",
            Self::Texturing { .. } => "texturing",
        }
    }

    /// Build the POST that starts this task.
    pub fn submission(&self) -> Submission {
        let endpoint = self.endpoint();
        match self {
            Self::TextToMeshPreview {
                settings,
                face_limit,
                pbr,
            } => {
                let mut body = prompt_body(settings);
                if let Some(limit) = face_limit {
                    body.insert("faceLimit".to_string(), json!(limit));
                }
                if *pbr {
                    body.insert("pbr".to_string(), json!(true));
                }
                Submission::new(endpoint, SubmissionBody::Json(Value::Object(body)))
            }
            Self::MaterialPreview { settings } => Submission::new(
                endpoint,
                SubmissionBody::Json(Value::Object(prompt_body(settings))),
            ),
            Self::TextToMeshOptimize { preview_id } | Self::MaterialOptimize { preview_id } => {
                Submission::new(
                    format!("{}/{}/optimize", endpoint, preview_id),
                    SubmissionBody::Empty,
                )
            }
            Self::ImageToMesh { settings, image } => {
                let files = [FormPart::png("image", &image.file_name, image.data.clone())];
                Submission::new(endpoint, SubmissionBody::Form(form_parts(settings, files)))
            }
            Self::Texturing {
                settings,
                depth,
                normal,
            } => {
                let files = [
                    FormPart::png("depth", &depth.file_name, depth.data.clone()),
                    FormPart::png("normal", &normal.file_name, normal.data.clone()),
                ];
                Submission::new(endpoint, SubmissionBody::Form(form_parts(settings, files)))
            }
        }
    }
}

/// JSON body shared by the preview endpoints. Seed zero and an empty
/// negative prompt are left out so the remote applies its defaults.
fn prompt_body(settings: &GenerationSettings) -> Map<String, Value> {
    let mut body = Map::new();
    body.insert("prompt".to_string(), json!(settings.prompt));
    if settings.seed > 0 {
        body.insert("seed".to_string(), json!(settings.seed));
    }
    if !settings.negative_prompt.is_empty() {
        body.insert("negativePrompt".to_string(), json!(settings.negative_prompt));
    }
    body
}

fn form_parts<const N: usize>(
    settings: &GenerationSettings,
    files: [FormPart; N],
) -> Vec<FormPart> {
    let mut parts = vec![FormPart::text("prompt", &settings.prompt)];
    parts.extend(files);
    if settings.seed > 0 {
        parts.push(FormPart::text("seed", settings.seed.to_string()));
    }
    if !settings.negative_prompt.is_empty() {
        parts.push(FormPart::text("negativePrompt", &settings.negative_prompt));
    }
    parts
}
