//! Application state: the response held for the session plus the visibility flags
//! (selected drug, genomic/clinical view, active tab) the renderer reads.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use tracing::warn;

use crate::entities::analysis::{AnalysisResponse, AnalysisResult};
use crate::error::PharmGuardError;
use crate::render::json::JsonViewer;
use crate::transform::analysis::AnalysisView;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    #[default]
    Genomic,
    Clinical,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Tab {
    #[default]
    Profile,
    Recommendation,
    Explanation,
    /// Every panel, one after another.
    All,
}

impl Tab {
    pub fn shows(self, panel: Tab) -> bool {
        self == Tab::All || self == panel
    }
}

impl FromStr for ViewMode {
    type Err = PharmGuardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "genomic" => Ok(Self::Genomic),
            "clinical" => Ok(Self::Clinical),
            other => Err(PharmGuardError::InvalidArgument(format!(
                "Unknown view '{other}'. Expected genomic or clinical."
            ))),
        }
    }
}

impl FromStr for Tab {
    type Err = PharmGuardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "profile" => Ok(Self::Profile),
            "recommendation" => Ok(Self::Recommendation),
            "explanation" => Ok(Self::Explanation),
            "all" => Ok(Self::All),
            other => Err(PharmGuardError::InvalidArgument(format!(
                "Unknown tab '{other}'. Expected profile, recommendation, explanation or all."
            ))),
        }
    }
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Genomic => "genomic",
            Self::Clinical => "clinical",
        })
    }
}

impl fmt::Display for Tab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Profile => "profile",
            Self::Recommendation => "recommendation",
            Self::Explanation => "explanation",
            Self::All => "all",
        })
    }
}

/// One entry of the drug selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectorOption {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

#[derive(Debug, Clone, Default)]
pub struct AppState {
    response: Option<AnalysisResponse>,
    selected: usize,
    pub view: ViewMode,
    pub tab: Tab,
    in_flight: bool,
    last_error: Option<String>,
    error_payload: Option<serde_json::Value>,
}

impl AppState {
    pub fn with_response(response: AnalysisResponse) -> Self {
        let mut state = Self::default();
        state.replace_response(response);
        state
    }

    pub fn response(&self) -> Option<&AnalysisResponse> {
        self.response.as_ref()
    }

    /// Replaces the held response wholesale and shows its first drug.
    pub fn replace_response(&mut self, response: AnalysisResponse) {
        self.response = Some(response);
        self.selected = 0;
        self.last_error = None;
        self.error_payload = None;
    }

    /// Records a failed submission. The previously held response stays untouched.
    pub fn record_failure(&mut self, err: &PharmGuardError) {
        self.last_error = Some(err.to_string());
        self.error_payload = match err {
            PharmGuardError::Backend {
                message, details, ..
            } => Some(serde_json::json!({ "error": message, "details": details })),
            _ => None,
        };
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Marks a submission as started. Returns `false` when one is already in flight.
    pub fn begin_submit(&mut self) -> bool {
        if self.in_flight {
            return false;
        }
        self.in_flight = true;
        true
    }

    pub fn end_submit(&mut self) {
        self.in_flight = false;
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    fn analyses(&self) -> &[AnalysisResult] {
        self.response
            .as_ref()
            .map(AnalysisResponse::analyses)
            .unwrap_or_default()
    }

    pub fn selector_options(&self) -> Vec<SelectorOption> {
        self.analyses()
            .iter()
            .enumerate()
            .map(|(idx, analysis)| {
                let drug = analysis
                    .drug
                    .as_deref()
                    .map(str::trim)
                    .filter(|d| !d.is_empty());
                SelectorOption {
                    value: drug
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("analysis-{}", idx + 1)),
                    label: drug
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("Analysis {}", idx + 1)),
                    selected: idx == self.selected,
                }
            })
            .collect()
    }

    /// Selects by selector value (drug name, case-insensitive) or 1-based position.
    /// An unknown value falls back to the first analysis.
    pub fn select(&mut self, value: &str) -> usize {
        let value = value.trim();
        let options = self.selector_options();
        let by_value = options
            .iter()
            .position(|opt| opt.value.eq_ignore_ascii_case(value));
        let by_position = value
            .parse::<usize>()
            .ok()
            .filter(|n| (1..=options.len()).contains(n))
            .map(|n| n - 1);

        self.selected = match by_value.or(by_position) {
            Some(idx) => idx,
            None => {
                if !options.is_empty() {
                    warn!(value, "Unknown selection; showing the first analysis");
                }
                0
            }
        };
        self.selected
    }

    pub fn selected_index(&self) -> usize {
        self.selected
    }

    pub fn set_view(&mut self, view: ViewMode) {
        self.view = view;
    }

    pub fn switch_tab(&mut self, tab: Tab) {
        self.tab = tab;
    }

    pub fn selected_result(&self) -> Option<&AnalysisResult> {
        self.analyses().get(self.selected)
    }

    pub fn selected_view(&self) -> Option<AnalysisView> {
        self.selected_result().map(AnalysisView::from_result)
    }

    pub fn views(&self) -> Vec<AnalysisView> {
        self.analyses().iter().map(AnalysisView::from_result).collect()
    }

    /// Drops a pending backend error payload so the viewer shows the held response again.
    /// Returns `false` when there is no response to show.
    pub fn refresh_viewer(&mut self) -> bool {
        if self.response.is_none() {
            return false;
        }
        self.error_payload = None;
        true
    }

    /// JSON viewer contents: the last backend error payload when one is pending,
    /// otherwise the held response.
    pub fn viewer(&self) -> Option<JsonViewer> {
        if let Some(payload) = &self.error_payload {
            return Some(JsonViewer::new(payload.clone()));
        }
        self.response
            .as_ref()
            .map(|response| JsonViewer::new(response.raw().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn two_drug_response() -> AnalysisResponse {
        AnalysisResponse::from_value(json!({
            "analyses": [
                {
                    "drug": "CODEINE",
                    "risk_assessment": {"risk_label": "Toxic", "severity": "critical", "confidence_score": 0.95},
                    "pharmacogenomic_profile": {"primary_gene": "CYP2D6", "diplotype": "*4/*4", "phenotype": "PM", "detected_variants": [{"rsid": "rs3892097", "star": "*4"}]}
                },
                {
                    "drug": "WARFARIN",
                    "risk_assessment": {"risk_label": "Safe", "severity": "none", "confidence_score": 0.9},
                    "pharmacogenomic_profile": {"primary_gene": "CYP2C9", "diplotype": "*1/*1", "phenotype": "NM", "detected_variants": []}
                }
            ]
        }))
        .expect("response")
    }

    #[test]
    fn selector_lists_one_option_per_drug_in_order() {
        let state = AppState::with_response(two_drug_response());
        let options = state.selector_options();
        assert_eq!(options.len(), 2);
        assert_eq!(options[0].label, "CODEINE");
        assert_eq!(options[1].label, "WARFARIN");
        assert!(options[0].selected);
        assert!(!options[1].selected);
    }

    #[test]
    fn unnamed_analyses_get_positional_labels() {
        let response = AnalysisResponse::from_value(json!({"analyses": [{}, {"drug": "  "}]}))
            .expect("response");
        let state = AppState::with_response(response);
        let labels: Vec<_> = state.selector_options().into_iter().map(|o| o.label).collect();
        assert_eq!(labels, vec!["Analysis 1", "Analysis 2"]);
        assert_eq!(state.selector_options()[1].value, "analysis-2");
    }

    #[test]
    fn select_switches_to_second_drug_and_falls_back_to_first() {
        let mut state = AppState::with_response(two_drug_response());
        assert_eq!(state.select("warfarin"), 1);
        let view = state.selected_view().expect("view");
        assert_eq!(view.drug, "WARFARIN");
        assert_eq!(view.profile.primary_gene, "CYP2C9");

        assert_eq!(state.select("2"), 1);
        assert_eq!(state.select("TAMOXIFEN"), 0);
        assert_eq!(state.select("5"), 0);
        assert_eq!(state.selected_index(), 0);
    }

    #[test]
    fn failure_keeps_previous_response() {
        let mut state = AppState::with_response(two_drug_response());
        state.select("WARFARIN");
        state.record_failure(&PharmGuardError::Backend {
            status: 400,
            message: "VCF parsing error".into(),
            details: "bad header".into(),
        });
        assert!(state.last_error().is_some_and(|e| e.contains("VCF parsing error")));
        assert_eq!(state.response().map(AnalysisResponse::total_analyses), Some(2));
        assert_eq!(state.selected_index(), 1);

        let viewer = state.viewer().expect("viewer");
        assert_eq!(viewer.value(), &json!({"error": "VCF parsing error", "details": "bad header"}));

        assert!(state.refresh_viewer());
        assert_eq!(state.viewer().expect("viewer").value(), two_drug_response().raw());
        assert!(state.last_error().is_some());

        state.replace_response(two_drug_response());
        assert!(state.last_error().is_none());
        assert_eq!(state.selected_index(), 0);
        assert_eq!(state.viewer().expect("viewer").value(), two_drug_response().raw());
    }

    #[test]
    fn refresh_without_response_has_nothing_to_show() {
        let mut state = AppState::default();
        state.record_failure(&PharmGuardError::Backend {
            status: 400,
            message: "VCF parsing error".into(),
            details: "bad header".into(),
        });
        assert!(!state.refresh_viewer());
        assert!(state.viewer().is_some());
    }

    #[test]
    fn submit_guard_allows_one_request_in_flight() {
        let mut state = AppState::default();
        assert!(state.begin_submit());
        assert!(!state.begin_submit());
        assert!(state.is_in_flight());
        state.end_submit();
        assert!(state.begin_submit());
    }

    #[test]
    fn view_and_tab_parse_from_text() {
        assert_eq!("Clinical".parse::<ViewMode>().expect("view"), ViewMode::Clinical);
        assert_eq!(" explanation ".parse::<Tab>().expect("tab"), Tab::Explanation);
        assert!("summary".parse::<Tab>().is_err());
        assert!(Tab::All.shows(Tab::Recommendation));
        assert!(!Tab::Profile.shows(Tab::Explanation));
    }
}
