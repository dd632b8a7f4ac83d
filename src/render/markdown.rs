use std::sync::OnceLock;

use minijinja::{Environment, context};

use crate::error::PharmGuardError;
use crate::render::json::JsonViewer;
use crate::state::{AppState, Tab, ViewMode};
use crate::transform::analysis::AnalysisView;

static ENV: OnceLock<Environment<'static>> = OnceLock::new();

const EMPTY_RESPONSE: &str = "The backend returned no analyses for this submission.";

/// Where the dashboard is shown. Hints name the command that works there.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Surface {
    #[default]
    Command,
    Session,
}

impl Surface {
    fn select_hint(self) -> &'static str {
        match self {
            Self::Command => "--select <DRUG>",
            Self::Session => "select <drug|N>",
        }
    }

    fn no_results(self) -> &'static str {
        match self {
            Self::Command => {
                "No analysis results yet. Run `pharmguard analyze <VCF> --drugs <DRUGS>`."
            }
            Self::Session => "No analysis results yet. Choose a file and drugs, then type run.",
        }
    }
}

fn env() -> Result<&'static Environment<'static>, PharmGuardError> {
    if let Some(env) = ENV.get() {
        return Ok(env);
    }

    let mut env = Environment::new();
    env.set_trim_blocks(true);
    env.set_lstrip_blocks(true);
    env.add_template(
        "dashboard.md.j2",
        include_str!("../../templates/dashboard.md.j2"),
    )?;
    env.add_template(
        "analysis.md.j2",
        include_str!("../../templates/analysis.md.j2"),
    )?;

    Ok(ENV.get_or_init(|| env))
}

fn fenced_json(text: &str) -> String {
    format!("```json\n{text}\n```\n")
}

/// Renders one drug's panels. Output depends only on `view`, so switching the
/// selection never carries over data from the previous drug.
pub fn analysis_markdown(
    view: &AnalysisView,
    view_mode: ViewMode,
    tab: Tab,
) -> Result<String, PharmGuardError> {
    let tmpl = env()?.get_template("analysis.md.j2")?;
    Ok(tmpl.render(context! {
        view => view,
        view_mode => view_mode.to_string(),
        show_profile => tab.shows(Tab::Profile),
        show_recommendation => tab.shows(Tab::Recommendation),
        show_explanation => tab.shows(Tab::Explanation),
    })?)
}

pub fn dashboard_markdown(state: &AppState, surface: Surface) -> Result<String, PharmGuardError> {
    let Some(response) = state.response() else {
        let mut out = String::new();
        if let Some(err) = state.last_error() {
            out.push_str(&format!("Error: {err}\n\n"));
        }
        out.push_str(surface.no_results());
        out.push('\n');
        return Ok(out);
    };

    let body = match state.selected_view() {
        Some(view) => analysis_markdown(&view, state.view, state.tab)?,
        None => format!("{EMPTY_RESPONSE}\n"),
    };

    let tmpl = env()?.get_template("dashboard.md.j2")?;
    Ok(tmpl.render(context! {
        options => state.selector_options(),
        selected => state.selected_index(),
        total => response.analyses().len(),
        last_error => state.last_error().map(|err| err.replace('\n', "\n> ")),
        body => body,
        select_hint => surface.select_hint(),
    })?)
}

pub fn json_panel_markdown(viewer: &JsonViewer) -> Result<String, PharmGuardError> {
    Ok(format!("## Raw JSON\n\n{}", fenced_json(&viewer.text()?)))
}
