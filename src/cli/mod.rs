use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::{DEFAULT_MAX_UPLOAD_MIB, DEFAULT_TIMEOUT_SECS, Settings};
use crate::entities::analysis::AnalysisResponse;
use crate::error::PharmGuardError;
use crate::input::{DrugSelection, InputCollector, VariantFile};
use crate::render::json::{JsonViewer, to_pretty};
use crate::render::markdown::{Surface, dashboard_markdown, json_panel_markdown};
use crate::sources::pharmguard::AnalysisClient;
use crate::state::{AppState, Tab, ViewMode};
use crate::transform::analysis::AnalysisView;

pub mod health;
pub mod session;

#[derive(Parser, Debug)]
#[command(
    name = "pharmguard",
    version,
    about = "Pharmacogenomic analysis client: upload a VCF and a drug list, review per-drug risk"
)]
pub struct Cli {
    /// Print the normalized analyses as JSON instead of markdown
    #[arg(long, global = true)]
    pub json: bool,

    /// Analysis backend base URL
    #[arg(long, global = true, env = "PHARMGUARD_API_BASE")]
    pub api_base: Option<String>,

    /// Client-side upload ceiling in MiB (0 disables the check)
    #[arg(long, global = true, env = "PHARMGUARD_MAX_UPLOAD_MIB", default_value_t = DEFAULT_MAX_UPLOAD_MIB)]
    pub max_upload_mib: u64,

    /// Skip the client-side upload size check
    #[arg(long, global = true)]
    pub no_size_limit: bool,

    /// Request timeout in seconds (0 waits indefinitely)
    #[arg(long, global = true, env = "PHARMGUARD_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout_secs: u64,

    /// Default directory for JSON downloads
    #[arg(long, global = true, env = "PHARMGUARD_DOWNLOAD_DIR")]
    pub download_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn settings(&self) -> Settings {
        Settings::new(
            self.api_base.as_deref(),
            self.max_upload_mib,
            self.no_size_limit,
            self.timeout_secs,
        )
        .with_download_dir(self.download_dir.clone())
    }
}

/// Which drug, view and tab to show.
#[derive(Args, Debug, Clone, Default)]
pub struct DisplayArgs {
    /// Drug to show (name or 1-based position); defaults to the first analysis
    #[arg(long)]
    pub select: Option<String>,

    /// Genomic (tabbed panels) or clinical summary view
    #[arg(long, value_enum, default_value_t = ViewMode::Genomic)]
    pub view: ViewMode,

    /// Genomic-view panel to show
    #[arg(long, value_enum, default_value_t = Tab::Profile)]
    pub tab: Tab,
}

impl DisplayArgs {
    fn apply(&self, state: &mut AppState) {
        if let Some(select) = self.select.as_deref() {
            state.select(select);
        }
        state.set_view(self.view);
        state.switch_tab(self.tab);
    }
}

/// What to do with the raw JSON after rendering.
#[derive(Args, Debug, Clone, Default)]
pub struct ExportArgs {
    /// Append the raw JSON panel to the output
    #[arg(long)]
    pub show_json: bool,

    /// Copy the raw JSON to the system clipboard
    #[arg(long)]
    pub copy: bool,

    /// Save the raw JSON as pharmguard-analysis-<millis>.json (default: Downloads directory)
    #[arg(long, num_args = 0..=1, value_name = "DIR")]
    pub download: Option<Option<PathBuf>>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Upload a VCF file and analyze it against a drug list
    Analyze {
        /// VCF file to upload
        vcf: PathBuf,

        /// Comma-separated drug names (e.g. CODEINE,WARFARIN)
        #[arg(long)]
        drugs: Option<String>,

        /// Add a single drug (repeatable)
        #[arg(long = "drug")]
        drug: Vec<String>,

        #[command(flatten)]
        display: DisplayArgs,

        #[command(flatten)]
        export: ExportArgs,
    },

    /// Re-display a previously exported analysis response
    Render {
        /// Response JSON file (as written by --download)
        response: PathBuf,

        #[command(flatten)]
        display: DisplayArgs,

        #[command(flatten)]
        export: ExportArgs,
    },

    /// Interactive session: collect inputs, submit, and switch views
    Session {
        /// VCF file to preload
        vcf: Option<PathBuf>,

        /// Comma-separated drug names to preload
        #[arg(long)]
        drugs: Option<String>,
    },

    /// Check that the analysis backend and the download directory are usable
    Health,
}

/// JSON output mode: the normalized view-models plus the selection.
#[derive(Debug, Serialize)]
struct DashboardJson {
    total_analyses: usize,
    selected: usize,
    view: ViewMode,
    tab: Tab,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_error: Option<String>,
    analyses: Vec<AnalysisView>,
}

pub(crate) fn render_state(
    state: &AppState,
    json_output: bool,
    surface: Surface,
) -> Result<String, PharmGuardError> {
    if !json_output {
        return dashboard_markdown(state, surface);
    }
    to_pretty(&DashboardJson {
        total_analyses: state
            .response()
            .map(AnalysisResponse::total_analyses)
            .unwrap_or_default(),
        selected: state.selected_index(),
        view: state.view,
        tab: state.tab,
        last_error: state.last_error().map(str::to_string),
        analyses: state.views(),
    })
}

/// Validates the collected input and, when it passes, sends exactly one request.
///
/// Validation failures never reach the network. Transport and backend failures
/// are recorded on `state` without discarding the response it already holds.
pub(crate) async fn submit(
    client: &AnalysisClient,
    settings: &Settings,
    input: &InputCollector,
    state: &mut AppState,
) -> Result<(), PharmGuardError> {
    let request = input.validate(settings)?;
    if !state.begin_submit() {
        return Err(PharmGuardError::InvalidArgument(
            "An analysis is already in progress".into(),
        ));
    }

    let result = client.analyze(&request).await;
    state.end_submit();

    match result {
        Ok(response) => {
            debug!(analyses = response.total_analyses(), "Analysis complete");
            state.replace_response(response);
            Ok(())
        }
        Err(err) => {
            warn!(error = %err, "Analysis failed");
            state.record_failure(&err);
            Err(err)
        }
    }
}

pub(crate) fn resolve_download_dir(settings: &Settings, dir: Option<&Path>) -> PathBuf {
    dir.map(Path::to_path_buf)
        .or_else(|| settings.download_dir.clone())
        .unwrap_or_else(crate::utils::download::default_download_dir)
}

async fn export(
    viewer: Option<JsonViewer>,
    export: &ExportArgs,
    settings: &Settings,
    json_output: bool,
    out: &mut String,
) -> Result<(), PharmGuardError> {
    let Some(viewer) = viewer else {
        return Ok(());
    };

    if export.show_json && !json_output {
        out.push('\n');
        out.push_str(&json_panel_markdown(&viewer)?);
    }
    if export.copy {
        viewer.copy()?;
        if !json_output {
            out.push_str("\nJSON copied to clipboard.\n");
        }
    }
    if let Some(dir) = &export.download {
        let dir = resolve_download_dir(settings, dir.as_deref());
        let path = viewer.download(&dir).await?;
        if !json_output {
            out.push_str(&format!("\nSaved JSON to {}\n", path.display()));
        }
    }
    Ok(())
}

async fn analyze(
    settings: Settings,
    vcf: &Path,
    drugs: Option<&str>,
    drug: &[String],
    display: &DisplayArgs,
    export_args: &ExportArgs,
    json_output: bool,
) -> Result<String, PharmGuardError> {
    let mut input = InputCollector {
        variant_file: Some(VariantFile::from_path(vcf).await?),
        drugs: drugs.map(DrugSelection::from_delimited).unwrap_or_default(),
    };
    for name in drug {
        input.drugs.add(name);
    }

    let client = AnalysisClient::new(&settings)?;
    let mut state = AppState::default();
    submit(&client, &settings, &input, &mut state).await?;

    display.apply(&mut state);
    let mut out = render_state(&state, json_output, Surface::Command)?;
    export(state.viewer(), export_args, &settings, json_output, &mut out).await?;
    Ok(out)
}

async fn render_file(
    settings: Settings,
    path: &Path,
    display: &DisplayArgs,
    export_args: &ExportArgs,
    json_output: bool,
) -> Result<String, PharmGuardError> {
    let bytes = tokio::fs::read(path).await?;
    let mut state = AppState::with_response(AnalysisResponse::from_slice(&bytes)?);
    display.apply(&mut state);

    let mut out = render_state(&state, json_output, Surface::Command)?;
    export(state.viewer(), export_args, &settings, json_output, &mut out).await?;
    Ok(out)
}

pub async fn run(cli: Cli) -> anyhow::Result<String> {
    let settings = cli.settings();
    let json_output = cli.json;

    match cli.command {
        Commands::Analyze {
            vcf,
            drugs,
            drug,
            display,
            export,
        } => Ok(analyze(
            settings,
            &vcf,
            drugs.as_deref(),
            &drug,
            &display,
            &export,
            json_output,
        )
        .await?),
        Commands::Render {
            response,
            display,
            export,
        } => Ok(render_file(settings, &response, &display, &export, json_output).await?),
        Commands::Session { vcf, drugs } => {
            session::run(settings, vcf.as_deref(), drugs.as_deref(), json_output).await?;
            Ok(String::new())
        }
        Commands::Health => {
            let report = health::check(&settings).await?;
            if json_output {
                Ok(to_pretty(&report)?)
            } else {
                Ok(report.to_markdown())
            }
        }
    }
}
