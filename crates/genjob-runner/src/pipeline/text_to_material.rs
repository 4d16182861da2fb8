//! Text to material: preview, optimize, then one download per texture channel.

use genjob_core::{Artifact, ArtifactKind, FileRole, TaskUrls, TextToMaterialParams};

use crate::error::JobError;
use crate::job::{Job, JobContext};
use crate::remote_task::TaskRequest;

/// A material texture channel.
struct Channel {
    name: &'static str,
    file_name: &'static str,
    role: FileRole,
    url: fn(&TaskUrls) -> Option<&str>,
}

/// Channels in download order.
fn channels() -> [Channel; 6] {
    [
        Channel {
            name: "albedo",
            file_name: "albedo.png",
            role: FileRole::Albedo,
            url: |u| u.albedo.as_deref(),
        },
        Channel {
            name: "normals",
            file_name: "normals.png",
            role: FileRole::Normal,
            url: |u| u.normals.as_deref(),
        },
        Channel {
            name: "displacement",
            file_name: "displacement.png",
            role: FileRole::Displacement,
            url: |u| u.displacement.as_deref(),
        },
        Channel {
            name: "metallic",
            file_name: "metallic.png",
            role: FileRole::Metallic,
            url: |u| u.metallic.as_deref(),
        },
        Channel {
            name: "roughness",
            file_name: "roughness.png",
            role: FileRole::Roughness,
            url: |u| u.roughness.as_deref(),
        },
        Channel {
            name: "ambient occlusion",
            file_name: "ao.png",
            role: FileRole::AmbientOcclusion,
            url: |u| u.ambient_occlusion.as_deref(),
        },
    ]
}

/// Progress after the preview and optimize stages.
const PREVIEW_DONE: f32 = 0.33;
const OPTIMIZE_DONE: f32 = 0.66;

/// Progress step per downloaded channel. The last download is followed by
/// completion, so it has no checkpoint of its own.
const CHANNEL_STEP: f32 = 0.055;

pub(crate) async fn run(
    job: &Job,
    ctx: &JobContext,
    params: &TextToMaterialParams,
) -> Result<Artifact, JobError> {
    let preview = job
        .run_remote(
            ctx,
            "preview",
            TaskRequest::MaterialPreview {
                settings: params.settings.clone(),
            },
        )
        .await?;
    job.advance(PREVIEW_DONE);

    let optimized = job
        .run_remote(
            ctx,
            "optimize",
            TaskRequest::MaterialOptimize {
                preview_id: preview.remote_id,
            },
        )
        .await?;
    job.advance(OPTIMIZE_DONE);

    let urls = optimized.payload.result_urls();
    let channels = channels();
    let last = channels.len() - 1;
    let mut artifact = Artifact::new(ArtifactKind::Material, params.settings.clone());
    for (index, channel) in channels.into_iter().enumerate() {
        job.download(ctx, (channel.url)(urls), channel.name, channel.file_name)
            .await?;
        if index < last {
            job.advance(OPTIMIZE_DONE + CHANNEL_STEP * (index + 1) as f32);
        }
        artifact = artifact.with_file(channel.role, channel.file_name);
    }
    Ok(artifact)
}
