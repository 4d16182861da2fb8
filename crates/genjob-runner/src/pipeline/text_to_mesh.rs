//! Text to mesh: preview, optimize, download, normalize, extract textures.

use genjob_core::{Artifact, ArtifactKind, FileRole, TextToMeshParams};

use super::{process_mesh, RAW_MESH_FILE};
use crate::error::JobError;
use crate::job::{Job, JobContext};
use crate::mesh::TextureSlot;
use crate::remote_task::TaskRequest;

const MESH_FILE: &str = "mesh.glb";
const ALBEDO_FILE: &str = "albedo.png";
const METALLIC_ROUGHNESS_FILE: &str = "metallic_roughness.png";
const NORMALS_FILE: &str = "normals.png";

pub(crate) async fn run(
    job: &Job,
    ctx: &JobContext,
    params: &TextToMeshParams,
) -> Result<Artifact, JobError> {
    let preview = job
        .run_remote(
            ctx,
            "preview",
            TaskRequest::TextToMeshPreview {
                settings: params.settings.clone(),
                face_limit: params.face_limit,
                pbr: params.pbr,
            },
        )
        .await?;
    job.advance(0.33);

    let optimized = job
        .run_remote(
            ctx,
            "optimize",
            TaskRequest::TextToMeshOptimize {
                preview_id: preview.remote_id,
            },
        )
        .await?;
    job.advance(0.66);

    let urls = optimized.payload.result_urls();
    job.download(ctx, urls.glb.as_deref(), "glb", RAW_MESH_FILE)
        .await?;

    let mut textures = vec![(TextureSlot::BaseColor, ALBEDO_FILE)];
    if params.pbr {
        textures.push((TextureSlot::MetallicRoughness, METALLIC_ROUGHNESS_FILE));
        textures.push((TextureSlot::Normal, NORMALS_FILE));
    }
    process_mesh(job, ctx, MESH_FILE, &textures).await?;

    let mut artifact = Artifact::new(ArtifactKind::Mesh, params.settings.clone())
        .with_mesh_options(params.face_limit, params.pbr)
        .with_file(FileRole::Mesh, MESH_FILE)
        .with_file(FileRole::Albedo, ALBEDO_FILE);
    if params.pbr {
        artifact = artifact
            .with_file(FileRole::MetallicRoughness, METALLIC_ROUGHNESS_FILE)
            .with_file(FileRole::Normal, NORMALS_FILE);
    }
    Ok(artifact)
}
