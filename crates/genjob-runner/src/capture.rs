//! Scene capture for texturing: the host boundary, layer isolation and
//! square letterboxed depth/normal images.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use glam::{Mat4, Vec2, Vec3};
use image::{imageops, ImageFormat, Rgb, RgbImage};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Lowest layer the host reserves for user content.
pub const FIRST_USER_LAYER: u32 = 8;

/// Number of layers the host supports.
pub const LAYER_COUNT: u32 = 32;

const DEPTH_BACKGROUND: Rgb<u8> = Rgb([0, 0, 0]);
const NORMAL_BACKGROUND: Rgb<u8> = Rgb([128, 128, 255]);

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no objects selected")]
    NoSelection,

    #[error("no active scene view")]
    NoCamera,

    #[error("no unused layers available")]
    NoFreeLayer,

    #[error("render failed: {0}")]
    Render(String),

    #[error("scene host error: {0}")]
    Host(String),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Which buffer a capture render produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderPass {
    /// Grayscale scene depth.
    Depth,
    /// World-space normals encoded as RGB.
    Normals,
}

/// The view camera at capture time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneCamera {
    /// World-to-view matrix.
    pub view: Mat4,
    /// View-to-clip matrix.
    pub projection: Mat4,
    /// Camera position in world space.
    pub position: Vec3,
    /// Viewport width over height.
    pub aspect: f32,
}

impl SceneCamera {
    /// World-to-clip matrix.
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }
}

/// Mesh data of a selected scene object.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneMesh {
    /// Object name, unique within the selection.
    pub name: String,
    pub positions: Vec<Vec3>,
    /// Per-vertex normals. May be empty, in which case face normals are used.
    pub normals: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    /// Triangle list indices.
    pub indices: Vec<u32>,
    pub local_to_world: Mat4,
}

/// Editor or engine hosting the scene being textured.
///
/// Images use the `image` crate convention: row 0 is the top of the view.
pub trait SceneHost: Send + Sync {
    /// The active view camera, if any.
    fn camera(&self) -> Option<SceneCamera>;

    /// Mesh data of the currently selected objects.
    fn selected_objects(&self) -> Vec<SceneMesh>;

    /// Layers currently assigned to any object in the scene.
    fn used_layers(&self) -> HashSet<u32>;

    /// Move the selection (and its children) onto `layer`.
    fn isolate_selection(&self, layer: u32) -> Result<(), CaptureError>;

    /// Undo [`SceneHost::isolate_selection`].
    fn restore_layers(&self);

    /// Render only `layer` from the view camera.
    fn render(
        &self,
        pass: RenderPass,
        layer: u32,
        width: u32,
        height: u32,
    ) -> Result<RgbImage, CaptureError>;

    /// Assign a generated texture to an object's material.
    ///
    /// `texture` lives in the job's staging directory, which is removed when
    /// the job finishes; hosts load or copy it here.
    fn apply_texture(&self, object: &str, texture: &Path) -> Result<(), CaptureError>;
}

/// Placement of the rendered view inside the square capture, normalised to
/// the capture size with a bottom-left origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureBand {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl CaptureBand {
    /// Band covering the whole square.
    pub const FULL: CaptureBand = CaptureBand {
        x: 0.0,
        y: 0.0,
        width: 1.0,
        height: 1.0,
    };

    /// Band of a `width` x `height` render placed by [`letterbox`].
    fn for_render(size: u32, width: u32, height: u32) -> Self {
        let side = size.max(1) as f32;
        Self {
            x: centred_offset(size, width) as f32 / side,
            y: centred_offset(size, height) as f32 / side,
            width: width as f32 / side,
            height: height as f32 / side,
        }
    }
}

/// Everything a texturing job needs from the scene.
#[derive(Debug, Clone)]
pub struct SceneCapture {
    pub camera: SceneCamera,
    pub objects: Vec<SceneMesh>,
    pub band: CaptureBand,
    pub depth_path: PathBuf,
    pub normal_path: PathBuf,
}

/// Lowest user layer not currently in use.
pub fn find_unused_layer(used: &HashSet<u32>) -> Option<u32> {
    (FIRST_USER_LAYER..LAYER_COUNT).find(|layer| !used.contains(layer))
}

/// Render size fitting the view's aspect ratio inside a `size` square.
pub fn render_size(size: u32, aspect: f32) -> (u32, u32) {
    let size = size.max(1);
    if !aspect.is_finite() || aspect <= 0.0 {
        return (size, size);
    }
    if aspect >= 1.0 {
        let height = ((size as f32 / aspect).round() as u32).clamp(1, size);
        (size, height)
    } else {
        let width = ((size as f32 * aspect).round() as u32).clamp(1, size);
        (width, size)
    }
}

/// Center `image` on a `size` square filled with `background`.
pub fn letterbox(image: &RgbImage, size: u32, background: Rgb<u8>) -> RgbImage {
    let mut square = RgbImage::from_pixel(size, size, background);
    let x = i64::from(centred_offset(size, image.width()));
    let y = i64::from(centred_offset(size, image.height()));
    imageops::replace(&mut square, image, x, y);
    square
}

fn centred_offset(size: u32, len: u32) -> u32 {
    size.saturating_sub(len) / 2
}

/// Render the selection's depth and normals into `dir` as square PNGs.
///
/// The selection is moved to a free layer for the renders and always
/// restored afterwards.
pub fn capture_scene(
    host: &dyn SceneHost,
    size: u32,
    dir: &Path,
) -> Result<SceneCapture, CaptureError> {
    let objects = host.selected_objects();
    if objects.is_empty() {
        warn!("No objects selected for texturing");
        return Err(CaptureError::NoSelection);
    }
    let camera = host.camera().ok_or(CaptureError::NoCamera)?;
    let layer = find_unused_layer(&host.used_layers()).ok_or(CaptureError::NoFreeLayer)?;
    let (width, height) = render_size(size, camera.aspect);

    host.isolate_selection(layer)?;
    let renders = render_passes(host, layer, width, height);
    host.restore_layers();
    let (depth, normals) = renders?;

    let depth_path = dir.join("depth.png");
    let normal_path = dir.join("normal.png");
    letterbox(&depth, size, DEPTH_BACKGROUND).save_with_format(&depth_path, ImageFormat::Png)?;
    letterbox(&normals, size, NORMAL_BACKGROUND)
        .save_with_format(&normal_path, ImageFormat::Png)?;

    let band = CaptureBand::for_render(size, width, height);
    info!(objects = objects.len(), layer, width, height, "Captured scene depth and normals");
    debug!(band = ?band, "Capture band");

    Ok(SceneCapture {
        camera,
        objects,
        band,
        depth_path,
        normal_path,
    })
}

fn render_passes(
    host: &dyn SceneHost,
    layer: u32,
    width: u32,
    height: u32,
) -> Result<(RgbImage, RgbImage), CaptureError> {
    let depth = host.render(RenderPass::Depth, layer, width, height)?;
    let normals = host.render(RenderPass::Normals, layer, width, height)?;
    Ok((depth, normals))
}
