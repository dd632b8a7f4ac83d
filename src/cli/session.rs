//! Interactive session: one `InputCollector` and one `AppState` driven by typed commands.

use std::path::Path;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info};

use crate::config::Settings;
use crate::error::PharmGuardError;
use crate::input::{InputCollector, ValidationField, VariantFile, matches_known, suggestions};
use crate::render::markdown::{Surface, json_panel_markdown};
use crate::sources::pharmguard::AnalysisClient;
use crate::state::{AppState, Tab, ViewMode};

const PROMPT: &str = "pharmguard> ";
const MAX_COMMAND_LEN: usize = 4096;

const HELP: &str = "\
Commands:
  file <path>            Choose the VCF file to upload
  drug <name>...         Add drugs (free text, uppercased)
  toggle <name>          Add or remove a suggested drug
  drugs [a,b,...]        Add comma-separated drugs, or list the selection
  remove <name>          Remove one drug
  undo                   Remove the most recently added drug
  clear                  Remove every drug
  suggest [query]        List suggested drugs matching a query
  status                 Show the collected file and drugs
  run                    Validate and submit the analysis
  select <drug|N>        Show another drug's results
  view genomic|clinical  Switch between tabbed panels and the clinical summary
  tab <name>             profile, recommendation, explanation or all
  show                   Re-render the dashboard
  json                   Show the raw JSON
  refresh                Show the held results' JSON again after an error
  copy                   Copy the raw JSON to the clipboard
  download [dir]         Save the raw JSON to a file
  help                   Show this help
  quit                   Leave the session";

/// Result of one typed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Output(String),
    Quit,
}

pub struct Session {
    settings: Settings,
    client: AnalysisClient,
    input: InputCollector,
    state: AppState,
    json_output: bool,
}

impl Session {
    pub fn new(settings: Settings, json_output: bool) -> Result<Self, PharmGuardError> {
        Ok(Self {
            client: AnalysisClient::new(&settings)?,
            settings,
            input: InputCollector::default(),
            state: AppState::default(),
            json_output,
        })
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn input(&self) -> &InputCollector {
        &self.input
    }

    /// Runs one command line. Errors are reported as output; only `quit` ends the session.
    pub async fn handle_line(&mut self, line: &str) -> Step {
        match self.dispatch(line).await {
            Ok(step) => step,
            Err(err) => Step::Output(format!("Error: {err}")),
        }
    }

    async fn dispatch(&mut self, line: &str) -> Result<Step, PharmGuardError> {
        if line.len() > MAX_COMMAND_LEN {
            return Err(PharmGuardError::InvalidArgument("command is too long".into()));
        }
        let Some(args) = shlex::split(line) else {
            return Err(PharmGuardError::InvalidArgument(format!(
                "Invalid command syntax: {line}"
            )));
        };
        let Some((cmd, rest)) = args.split_first() else {
            return Ok(Step::Output(String::new()));
        };
        debug!(command = %cmd, args = rest.len(), "Session command");

        let out = match cmd.to_ascii_lowercase().as_str() {
            "quit" | "exit" => return Ok(Step::Quit),
            "help" | "?" => HELP.to_string(),
            "file" => self.choose_file(rest).await?,
            "drug" | "add" => {
                let mut notes = Vec::new();
                for name in rest {
                    if !self.input.drugs.add(name) {
                        notes.push(format!("{} is already selected", name.trim().to_uppercase()));
                    } else if matches_known(name).is_none() {
                        notes.push(format!("{} is not a suggested drug", name.trim().to_uppercase()));
                    }
                }
                with_notes(notes, self.drug_status())
            }
            "toggle" => {
                let name = required(rest, "toggle <name>")?;
                self.input.drugs.toggle(name);
                self.drug_status()
            }
            "drugs" => {
                if !rest.is_empty() {
                    self.input.drugs.extend_delimited(&rest.join(","));
                }
                self.drug_status()
            }
            "remove" => {
                let name = required(rest, "remove <name>")?;
                if !self.input.drugs.remove(name) {
                    return Err(PharmGuardError::InvalidArgument(format!(
                        "{} is not selected",
                        name.trim().to_uppercase()
                    )));
                }
                self.drug_status()
            }
            "undo" => match self.input.drugs.remove_last() {
                Some(name) => with_notes(vec![format!("Removed {name}")], self.drug_status()),
                None => "No drugs to remove.".to_string(),
            },
            "clear" => {
                self.input.drugs.clear();
                self.drug_status()
            }
            "suggest" => self.suggest(rest.first().map(String::as_str).unwrap_or_default()),
            "status" => format!("{}\n{}", self.file_status(), self.drug_status()),
            "run" | "analyze" => self.run_analysis().await?,
            "select" => {
                self.require_response()?;
                let value = required(rest, "select <drug|N>")?;
                self.state.select(value);
                self.render()?
            }
            "view" => {
                let mode: ViewMode = required(rest, "view genomic|clinical")?.parse()?;
                self.state.set_view(mode);
                self.render_if_loaded(format!("View: {mode}"))?
            }
            "tab" => {
                let tab: Tab = required(rest, "tab <name>")?.parse()?;
                self.state.switch_tab(tab);
                self.render_if_loaded(format!("Tab: {tab}"))?
            }
            "show" => self.render()?,
            "json" => self.json_panel()?,
            "refresh" => {
                if !self.state.refresh_viewer() {
                    return Err(PharmGuardError::InvalidArgument(
                        "No analysis results yet. Use run first.".into(),
                    ));
                }
                self.json_panel()?
            }
            "copy" => {
                self.require_viewer()?.copy()?;
                "JSON copied to clipboard.".to_string()
            }
            "download" => {
                let viewer = self.require_viewer()?;
                let dir = super::resolve_download_dir(
                    &self.settings,
                    rest.first().map(|d| Path::new(d.as_str())),
                );
                let path = viewer.download(&dir).await?;
                format!("Saved JSON to {}", path.display())
            }
            other => {
                return Err(PharmGuardError::InvalidArgument(format!(
                    "Unknown command '{other}'. Type help for the command list."
                )));
            }
        };
        Ok(Step::Output(out))
    }

    async fn choose_file(&mut self, rest: &[String]) -> Result<String, PharmGuardError> {
        let path = required(rest, "file <path>")?;
        let file = VariantFile::from_path(Path::new(path)).await?;
        self.input.set_variant_file(file);

        let mut out = self.file_status();
        if let Err(errors) = self.input.validate(&self.settings) {
            if let Some(msg) = errors.for_field(ValidationField::VariantFile) {
                out.push_str(&format!("\nWarning: {msg}"));
            }
        }
        Ok(out)
    }

    async fn run_analysis(&mut self) -> Result<String, PharmGuardError> {
        match super::submit(&self.client, &self.settings, &self.input, &mut self.state).await {
            Ok(()) => {
                info!(analyses = self.state.views().len(), "Session analysis complete");
                self.render()
            }
            Err(err @ PharmGuardError::Validation(_)) => Err(err),
            // The dashboard keeps the previous results and shows the failure as a banner.
            Err(_) if self.state.response().is_some() => self.render(),
            Err(err) => Err(err),
        }
    }

    fn suggest(&self, query: &str) -> String {
        let matches = suggestions(query);
        if matches.is_empty() {
            return format!("No suggestions match '{query}'. Any drug name can still be added.");
        }
        matches
            .into_iter()
            .map(|drug| {
                let mark = if self.input.drugs.iter().any(|d| d == drug) {
                    "[x]"
                } else {
                    "[ ]"
                };
                format!("{mark} {drug}")
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn file_status(&self) -> String {
        match &self.input.variant_file {
            Some(file) => format!("VCF: {} ({} bytes)", file.file_name, file.size()),
            None => "VCF: none".to_string(),
        }
    }

    fn drug_status(&self) -> String {
        if self.input.drugs.is_empty() {
            "Drugs: none".to_string()
        } else {
            format!("Drugs: {}", self.input.drugs.iter().collect::<Vec<_>>().join(", "))
        }
    }

    fn render(&self) -> Result<String, PharmGuardError> {
        super::render_state(&self.state, self.json_output, Surface::Session)
    }

    fn render_if_loaded(&self, fallback: String) -> Result<String, PharmGuardError> {
        if self.state.response().is_some() {
            self.render()
        } else {
            Ok(fallback)
        }
    }

    fn require_response(&self) -> Result<(), PharmGuardError> {
        if self.state.response().is_none() {
            return Err(PharmGuardError::InvalidArgument(
                "No analysis results yet. Use run first.".into(),
            ));
        }
        Ok(())
    }

    fn json_panel(&self) -> Result<String, PharmGuardError> {
        let viewer = self.require_viewer()?;
        if self.json_output {
            viewer.text()
        } else {
            json_panel_markdown(&viewer)
        }
    }

    fn require_viewer(&self) -> Result<crate::render::json::JsonViewer, PharmGuardError> {
        self.state.viewer().ok_or_else(|| {
            PharmGuardError::InvalidArgument("No JSON to show yet. Use run first.".into())
        })
    }
}

fn required<'a>(rest: &'a [String], usage: &str) -> Result<&'a str, PharmGuardError> {
    rest.first()
        .map(String::as_str)
        .ok_or_else(|| PharmGuardError::InvalidArgument(format!("Usage: {usage}")))
}

fn with_notes(notes: Vec<String>, status: String) -> String {
    if notes.is_empty() {
        return status;
    }
    format!("{}\n{status}", notes.join("\n"))
}

async fn write_line(
    stdout: &mut tokio::io::Stdout,
    text: &str,
) -> Result<(), PharmGuardError> {
    stdout.write_all(text.as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await?;
    Ok(())
}

/// Reads commands from stdin until `quit` or end of input.
pub async fn run(
    settings: Settings,
    vcf: Option<&Path>,
    drugs: Option<&str>,
    json_output: bool,
) -> Result<(), PharmGuardError> {
    let mut session = Session::new(settings, json_output)?;
    let mut stdout = tokio::io::stdout();

    if let Some(vcf) = vcf {
        let text = match session
            .choose_file(&[vcf.to_string_lossy().into_owned()])
            .await
        {
            Ok(text) => text,
            Err(err) => format!("Error: {err}"),
        };
        write_line(&mut stdout, &text).await?;
    }
    if let Some(drugs) = drugs {
        session.input.drugs.extend_delimited(drugs);
        write_line(&mut stdout, &session.drug_status()).await?;
    }
    write_line(&mut stdout, "Type help for commands, quit to leave.").await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        stdout.write_all(PROMPT.as_bytes()).await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        match session.handle_line(&line).await {
            Step::Output(text) if text.is_empty() => {}
            Step::Output(text) => write_line(&mut stdout, &text).await?,
            Step::Quit => break,
        }
    }
    Ok(())
}
