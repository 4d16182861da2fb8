//! genjob CLI - Generate meshes and materials from the command line.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use genjob_client::{ApiClient, ApiConfig};
use genjob_core::{
    ArtifactId, ArtifactKind, GenerationSettings, ImageToMeshParams, JobRequest, JobStatus,
    ReferenceImage, TextToMaterialParams, TextToMeshParams,
};
use genjob_runner::{FsArtifactStore, JobContext, JobController, RunnerConfig};

mod output;
mod settings;

use settings::Settings;

type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// genjob - AI 3D asset generation
#[derive(Parser)]
#[command(name = "genjob")]
#[command(about = "Generate meshes and materials with a remote AI service", long_about = None)]
struct Cli {
    /// API key (overrides the saved key)
    #[arg(long, env = "GENJOB_API_KEY", hide_env_values = true, global = true)]
    api_key: Option<String>,

    /// API base url (overrides the saved url)
    #[arg(long, env = "GENJOB_BASE_URL", global = true)]
    base_url: Option<String>,

    /// Directory for settings and the artifact library
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Emit JSON lines instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a textured mesh from a prompt
    #[command(name = "text-to-mesh")]
    TextToMesh {
        prompt: String,

        #[command(flatten)]
        options: PromptOptions,

        /// Maximum number of faces
        #[arg(long)]
        face_limit: Option<u32>,

        /// Also generate metallic-roughness and normal maps
        #[arg(long)]
        pbr: bool,
    },

    /// Generate a textured mesh from a reference image
    #[command(name = "image-to-mesh")]
    ImageToMesh {
        /// Reference image file
        image: PathBuf,

        /// Optional prompt guiding the generation
        #[arg(long, default_value = "")]
        prompt: String,

        #[command(flatten)]
        options: PromptOptions,
    },

    /// Generate a set of material textures from a prompt
    #[command(name = "text-to-material")]
    TextToMaterial {
        prompt: String,

        #[command(flatten)]
        options: PromptOptions,
    },

    /// Show the remaining credit balance
    Credits,

    /// Manage generated artifacts
    #[command(subcommand)]
    Library(LibraryCommand),

    /// Show or change saved settings
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(clap::Args)]
struct PromptOptions {
    /// What the result should not look like
    #[arg(long)]
    negative: Option<String>,

    /// Seed for reproducible results
    #[arg(long)]
    seed: Option<u32>,
}

impl PromptOptions {
    fn apply(self, mut settings: GenerationSettings) -> GenerationSettings {
        if let Some(negative) = self.negative {
            settings = settings.with_negative_prompt(negative);
        }
        if let Some(seed) = self.seed {
            settings = settings.with_seed(seed);
        }
        settings
    }
}

#[derive(Subcommand)]
enum LibraryCommand {
    /// List stored artifacts, newest first
    List {
        #[arg(long, value_enum)]
        kind: Option<KindArg>,
    },

    /// Delete an artifact and its files
    Delete { id: String },

    /// Mark an artifact as a favorite
    Favorite {
        id: String,

        /// Remove the favorite mark instead
        #[arg(long)]
        off: bool,
    },
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Print the effective settings
    Show,

    /// Save the given --api-key and --base-url for later invocations
    Set,
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Mesh,
    Material,
    Texturing,
}

impl From<KindArg> for ArtifactKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Mesh => Self::Mesh,
            KindArg::Material => Self::Material,
            KindArg::Texturing => Self::Texturing,
        }
    }
}

#[tokio::main]
async fn main() -> CliResult {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays clean for --json
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("genjob=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if cli.json {
        output::enable_json_mode();
    }

    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => settings::default_data_dir()
            .ok_or("no data directory on this platform; pass --data-dir")?,
    };
    let saved = Settings::load(&data_dir)?;
    debug!(data_dir = %data_dir.display(), "Loaded settings");
    let api = saved.api_config(cli.api_key.clone(), cli.base_url.clone());

    match cli.command {
        Commands::TextToMesh {
            prompt,
            options,
            face_limit,
            pbr,
        } => {
            let request = JobRequest::TextToMesh(TextToMeshParams {
                settings: options.apply(GenerationSettings::new(prompt)),
                face_limit,
                pbr,
            });
            generate(api, &data_dir, request).await?;
        }
        Commands::ImageToMesh {
            image,
            prompt,
            options,
        } => {
            let request = JobRequest::ImageToMesh(ImageToMeshParams {
                settings: options.apply(GenerationSettings::new(prompt)),
                image: ReferenceImage::from_path(&image)?,
            });
            generate(api, &data_dir, request).await?;
        }
        Commands::TextToMaterial { prompt, options } => {
            let request = JobRequest::TextToMaterial(TextToMaterialParams {
                settings: options.apply(GenerationSettings::new(prompt)),
            });
            generate(api, &data_dir, request).await?;
        }
        Commands::Credits => {
            credits(api).await?;
        }
        Commands::Library(command) => {
            library(&data_dir, command).await?;
        }
        Commands::Config(command) => {
            config(&data_dir, saved, command, cli.api_key, cli.base_url)?;
        }
    }

    Ok(())
}

/// Run one job to completion, reporting progress and persisting its artifact.
async fn generate(api: ApiConfig, data_dir: &Path, request: JobRequest) -> CliResult {
    let client = Arc::new(ApiClient::new(api)?);
    let store = Arc::new(FsArtifactStore::new(library_dir(data_dir)));
    let config = RunnerConfig::default();
    let ctx = JobContext::new(client, &config).with_store(store.clone());
    let controller = JobController::new(ctx, &config);

    let job = controller.create(request).await?;
    output::job_created(job.id(), job.kind());
    let mut events = job.subscribe();
    let mut run = controller.spawn(job.clone());

    let status = loop {
        tokio::select! {
            Some(event) = events.recv() => output::job_event(&event),
            _ = tokio::signal::ctrl_c() => {
                warn!(job_id = %job.id(), "Interrupted, cancelling job");
                job.cancel().await;
            }
            finished = &mut run => break finished?,
        }
    };
    while let Ok(event) = events.try_recv() {
        output::job_event(&event);
    }

    match (status, job.artifact()) {
        (JobStatus::Completed, Some(artifact)) => {
            let location = store.artifact_dir(&artifact.id);
            output::job_completed(job.id(), &artifact, &location.display().to_string());
            Ok(())
        }
        _ => {
            let error = job.error().unwrap_or_else(|| "unknown error".to_string());
            output::job_failed(job.id(), &error);
            Err(error.into())
        }
    }
}

async fn credits(api: ApiConfig) -> CliResult {
    let client = ApiClient::new(api)?;
    let billing = client.billing().await?;

    if output::is_json_mode() {
        println!("{}", serde_json::to_string(&billing)?);
    } else {
        println!("Subscription: {}", billing.subscription);
        println!("Credits:      {}", billing.credits);
    }
    Ok(())
}

async fn library(data_dir: &Path, command: LibraryCommand) -> CliResult {
    let store = FsArtifactStore::new(library_dir(data_dir));

    match command {
        LibraryCommand::List { kind } => {
            let artifacts = match kind {
                Some(kind) => store.list_by_kind(kind.into()).await?,
                None => store.list().await?,
            };
            output::artifacts(&artifacts);
        }
        LibraryCommand::Delete { id } => {
            let id = resolve_artifact(&store, &id).await?;
            store.delete(&id).await?;
            println!("Deleted {}", id);
        }
        LibraryCommand::Favorite { id, off } => {
            let id = resolve_artifact(&store, &id).await?;
            let artifact = store.set_favorite(&id, !off).await?;
            let state = if artifact.favorite { "marked" } else { "unmarked" };
            println!("{} {} as favorite", id, state);
        }
    }
    Ok(())
}

/// Accept a full artifact id or an unambiguous prefix of one.
async fn resolve_artifact(store: &FsArtifactStore, id: &str) -> CliResult<ArtifactId> {
    let matches: Vec<ArtifactId> = store
        .list()
        .await?
        .into_iter()
        .map(|artifact| artifact.id)
        .filter(|candidate| candidate.as_str().starts_with(id))
        .collect();

    match matches.as_slice() {
        [single] => Ok(single.clone()),
        [] => Err(format!("no artifact matches '{}'", id).into()),
        _ => Err(format!("'{}' matches {} artifacts", id, matches.len()).into()),
    }
}

fn config(
    data_dir: &Path,
    mut saved: Settings,
    command: ConfigCommand,
    api_key: Option<String>,
    base_url: Option<String>,
) -> CliResult {
    match command {
        ConfigCommand::Show => {
            let api = saved.api_config(None, None);
            let key = saved.api_key.as_deref().map(settings::mask);
            println!("Data dir:  {}", data_dir.display());
            println!("Base url:  {}", api.base_url);
            println!("API key:   {}", key.as_deref().unwrap_or("(not set)"));
        }
        ConfigCommand::Set => {
            if api_key.is_none() && base_url.is_none() {
                return Err("nothing to set; pass --api-key or --base-url".into());
            }
            if api_key.is_some() {
                saved.api_key = api_key;
            }
            if base_url.is_some() {
                saved.base_url = base_url;
            }
            saved.save(data_dir)?;
            println!("Settings saved to {}", data_dir.display());
        }
    }
    Ok(())
}

fn library_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("library")
}
