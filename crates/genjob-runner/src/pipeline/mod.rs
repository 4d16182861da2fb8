//! Per-kind generation pipelines.
//!
//! Each pipeline drives its remote stages strictly in sequence, reports
//! progress at fixed checkpoints and returns the artifact descriptor for the
//! files it left in the job's staging directory.

pub(crate) mod image_to_mesh;
pub(crate) mod scene_texturing;
pub(crate) mod text_to_material;
pub(crate) mod text_to_mesh;

use std::path::PathBuf;

use tracing::info;

use crate::error::JobError;
use crate::job::{Job, JobContext};
use crate::mesh::TextureSlot;

/// Downloaded mesh before normalization.
pub(crate) const RAW_MESH_FILE: &str = "mesh_orig.glb";

/// Run blocking work off the async runtime.
pub(crate) async fn blocking<T, F>(work: F) -> Result<T, JobError>
where
    F: FnOnce() -> Result<T, JobError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| JobError::Background(e.to_string()))?
}

/// Normalize the raw mesh into `mesh_file` and extract `textures` from it.
pub(crate) async fn process_mesh(
    job: &Job,
    ctx: &JobContext,
    mesh_file: &str,
    textures: &[(TextureSlot, &str)],
) -> Result<(), JobError> {
    job.ensure_active()?;
    let processor = ctx.mesh.clone();
    let raw = job.staging().file(RAW_MESH_FILE);
    let mesh = job.staging().file(mesh_file);
    let targets: Vec<(TextureSlot, PathBuf)> = textures
        .iter()
        .map(|(slot, name)| (*slot, job.staging().file(name)))
        .collect();

    blocking(move || {
        processor.normalize(&raw, &mesh)?;
        processor.extract_textures(&mesh, &targets)?;
        Ok(())
    })
    .await?;

    info!(job_id = %job.id(), mesh = mesh_file, textures = textures.len(), "Mesh processed");
    Ok(())
}
