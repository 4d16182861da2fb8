//! Image to mesh: a single remote stage, then the same mesh post-processing
//! as text to mesh.

use genjob_core::{Artifact, ArtifactKind, FileRole, ImageToMeshParams};

use super::{process_mesh, RAW_MESH_FILE};
use crate::error::JobError;
use crate::job::{Job, JobContext};
use crate::mesh::TextureSlot;
use crate::remote_task::TaskRequest;

const MESH_FILE: &str = "model.glb";
const ALBEDO_FILE: &str = "albedo.png";

pub(crate) async fn run(
    job: &Job,
    ctx: &JobContext,
    params: &ImageToMeshParams,
) -> Result<Artifact, JobError> {
    let generated = job
        .run_remote(
            ctx,
            "generate",
            TaskRequest::ImageToMesh {
                settings: params.settings.clone(),
                image: params.image.clone(),
            },
        )
        .await?;
    job.advance(0.5);

    let urls = generated.payload.result_urls();
    job.download(ctx, urls.glb.as_deref(), "glb", RAW_MESH_FILE)
        .await?;
    process_mesh(job, ctx, MESH_FILE, &[(TextureSlot::BaseColor, ALBEDO_FILE)]).await?;

    Ok(Artifact::new(ArtifactKind::Mesh, params.settings.clone())
        .with_file(FileRole::Mesh, MESH_FILE)
        .with_file(FileRole::Albedo, ALBEDO_FILE))
}
