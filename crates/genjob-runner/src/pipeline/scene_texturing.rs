//! Scene texturing: capture the selection, texture it remotely, then project
//! the generated albedo onto every selected object.

use std::collections::HashSet;
use std::path::PathBuf;

use image::ImageFormat;
use tracing::{debug, info};

use genjob_core::{Artifact, ArtifactKind, FileRole, ReferenceImage, SceneTexturingParams};

use super::blocking;
use crate::capture::{capture_scene, SceneMesh};
use crate::error::JobError;
use crate::job::{Job, JobContext};
use crate::projection::project_albedo;
use crate::remote_task::TaskRequest;

const ALBEDO_FILE: &str = "albedo.png";

/// A selected object and the file its projected texture goes to.
struct Target {
    mesh: SceneMesh,
    file_name: String,
    path: PathBuf,
}

pub(crate) async fn run(
    job: &Job,
    ctx: &JobContext,
    params: &SceneTexturingParams,
) -> Result<Artifact, JobError> {
    let host = ctx.scene.clone().ok_or(JobError::MissingSceneHost)?;
    job.ensure_active()?;

    let capture = {
        let host = host.clone();
        let size = ctx.capture_size;
        let dir = job.staging().path().to_path_buf();
        blocking(move || Ok(capture_scene(host.as_ref(), size, &dir)?)).await?
    };
    let depth = ReferenceImage::new("depth.png", tokio::fs::read(&capture.depth_path).await?);
    let normal = ReferenceImage::new("normal.png", tokio::fs::read(&capture.normal_path).await?);

    let textured = job
        .run_remote(
            ctx,
            "texturing",
            TaskRequest::Texturing {
                settings: params.settings.clone(),
                depth,
                normal,
            },
        )
        .await?;
    job.advance(0.5);

    let albedo_path = job
        .download(
            ctx,
            textured.payload.result_urls().albedo.as_deref(),
            "albedo",
            ALBEDO_FILE,
        )
        .await?;

    job.ensure_active()?;
    let targets = targets(job, capture.objects);
    let camera = capture.camera;
    let band = capture.band;
    let texture_size = ctx.texture_size;
    let targets = blocking(move || {
        let albedo = image::open(&albedo_path)?.to_rgba8();
        for target in &targets {
            project_albedo(&albedo, &camera, band, &target.mesh, texture_size)
                .save_with_format(&target.path, ImageFormat::Png)?;
            debug!(object = %target.mesh.name, file = %target.file_name, "Projected albedo");
        }
        Ok(targets)
    })
    .await?;

    job.ensure_active()?;
    let applied: Vec<(String, PathBuf)> = targets
        .iter()
        .map(|t| (t.mesh.name.clone(), t.path.clone()))
        .collect();
    blocking(move || {
        for (object, path) in &applied {
            host.apply_texture(object, path)?;
        }
        Ok(())
    })
    .await?;
    info!(job_id = %job.id(), objects = targets.len(), "Applied projected textures");

    let mut artifact = Artifact::new(ArtifactKind::Texturing, params.settings.clone())
        .with_file(FileRole::Albedo, ALBEDO_FILE);
    for target in targets {
        artifact = artifact.with_file(FileRole::Projected(target.mesh.name), target.file_name);
    }
    Ok(artifact)
}

/// Assign each object a unique `projected_<name>.png` in the staging
/// directory.
fn targets(job: &Job, objects: Vec<SceneMesh>) -> Vec<Target> {
    let mut taken = HashSet::new();
    objects
        .into_iter()
        .map(|mesh| {
            let stem = sanitize(&mesh.name);
            let mut file_name = format!("projected_{}.png", stem);
            let mut n = 1;
            while !taken.insert(file_name.clone()) {
                file_name = format!("projected_{}_{}.png", stem, n);
                n += 1;
            }
            let path = job.staging().file(&file_name);
            Target {
                mesh,
                file_name,
                path,
            }
        })
        .collect()
}

/// Object names may contain path separators and other characters that are
/// not portable in file names.
fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "object".to_string()
    } else {
        cleaned
    }
}
