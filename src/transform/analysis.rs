//! Normalization of per-drug analysis records into display-ready view models.

use serde::Serialize;

use crate::entities::analysis::{
    AnalysisResult, ClinicalRecommendation, LlmExplanation, PharmacogenomicProfile,
    RawConfidence, RawSeverity,
};

const NOT_APPLICABLE: &str = "N/A";
const NOT_AVAILABLE: &str = "Not available";
const NONE_LISTED: &str = "None listed";
const UNKNOWN_LABEL: &str = "UNKNOWN";
const DEFAULT_URGENCY: &str = "routine";

/// Ring circumference of the confidence gauge.
const GAUGE_CIRCUMFERENCE: f64 = 157.0;
const GAUGE_BAR_WIDTH: usize = 20;

const SEVERITY_CATEGORIES: &[(&str, f64)] = &[
    ("none", 0.0),
    ("low", 2.0),
    ("moderate", 5.0),
    ("high", 7.0),
    ("critical", 9.0),
];

const LABEL_SEVERITIES: &[(&str, f64)] = &[
    ("safe", 0.0),
    ("normal", 0.0),
    ("adjust dosage", 5.0),
    ("toxic", 9.0),
    ("ineffective", 7.0),
    ("unknown", 2.0),
];

fn lookup(table: &[(&str, f64)], key: &str) -> Option<f64> {
    let key = key.trim().to_ascii_lowercase();
    table
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, value)| *value)
}

fn parse_finite(value: &str) -> Option<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

pub(crate) fn resolve_severity(raw: Option<&RawSeverity>, risk_label: &str) -> f64 {
    let from_raw = match raw {
        Some(RawSeverity::Number(v)) if v.is_finite() => Some(*v),
        Some(RawSeverity::Text(text)) => {
            parse_finite(text).or_else(|| lookup(SEVERITY_CATEGORIES, text))
        }
        _ => None,
    };
    from_raw
        .or_else(|| lookup(LABEL_SEVERITIES, risk_label))
        .unwrap_or(0.0)
}

pub(crate) fn confidence_value(raw: Option<&RawConfidence>) -> Option<f64> {
    match raw? {
        RawConfidence::Number(v) => Some(*v).filter(|v| v.is_finite()),
        RawConfidence::Text(text) => parse_finite(text),
    }
}

pub(crate) fn display_score(confidence: Option<f64>, severity: f64) -> f64 {
    match confidence {
        Some(c) if c.is_finite() => c * 10.0,
        _ if severity.is_finite() => severity,
        _ => 0.0,
    }
}

pub(crate) fn severity_text(severity: f64, raw: Option<&RawSeverity>) -> String {
    if let Some(RawSeverity::Text(text)) = raw {
        let text = text.trim();
        if !text.is_empty() {
            return text.to_uppercase();
        }
    }
    let bucket = if severity < 1.0 {
        "NONE"
    } else if severity < 3.0 {
        "LOW"
    } else if severity < 6.0 {
        "MODERATE"
    } else if severity < 8.0 {
        "HIGH"
    } else {
        "CRITICAL"
    };
    bucket.to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskBucket {
    Safe,
    Moderate,
    High,
    Unknown,
}

impl RiskBucket {
    pub fn classify(risk_label: &str) -> Self {
        let label = risk_label.to_ascii_uppercase();
        let has = |needle: &str| label.contains(needle);
        if has("SAFE") || has("NORMAL") {
            Self::Safe
        } else if has("MODERATE") || has("CAUTION") {
            Self::Moderate
        } else if has("HIGH") || has("CRITICAL") || has("TOXIC") {
            Self::High
        } else {
            Self::Unknown
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            Self::Safe => "green",
            Self::Moderate => "yellow",
            Self::High => "red",
            Self::Unknown => "gray",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Gauge {
    pub fraction: f64,
    pub percent: u32,
    pub dash_offset: f64,
    pub color: &'static str,
    pub bar: String,
}

impl Gauge {
    pub fn from_confidence(confidence: Option<f64>, bucket: RiskBucket) -> Self {
        let fraction = confidence.unwrap_or(0.0).clamp(0.0, 1.0);
        let filled = (fraction * GAUGE_BAR_WIDTH as f64).round() as usize;
        let bar = format!(
            "[{}{}]",
            "#".repeat(filled),
            "-".repeat(GAUGE_BAR_WIDTH - filled)
        );
        Self {
            fraction,
            percent: (fraction * 100.0).round() as u32,
            dash_offset: GAUGE_CIRCUMFERENCE - GAUGE_CIRCUMFERENCE * fraction,
            color: bucket.color(),
            bar,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariantRow {
    pub rsid: String,
    pub star: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileView {
    pub primary_gene: String,
    pub diplotype: String,
    pub phenotype: String,
    pub variants: Vec<VariantRow>,
    pub variant_count: usize,
    pub detected_variant: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecommendationView {
    pub dosage_adjustment: String,
    pub monitoring: String,
    pub alternative_drugs: String,
    pub urgency: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExplanationView {
    pub summary: String,
    pub mechanism: String,
    pub interaction_notes: String,
    pub evidence_basis: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClinicalSummary {
    pub risk_label: String,
    pub severity: String,
    pub urgency: String,
    pub dosage_adjustment: String,
    pub monitoring: String,
}

/// Display record for one drug. Every field is resolved; nothing here is optional
/// except links that are legitimately absent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisView {
    pub drug: String,
    pub risk_label: String,
    pub risk: RiskBucket,
    pub badge_color: &'static str,
    pub severity: f64,
    pub severity_text: String,
    pub severity_score: String,
    pub confidence: Option<f64>,
    pub gauge: Gauge,
    pub profile: ProfileView,
    pub recommendation: RecommendationView,
    pub explanation: ExplanationView,
    pub clinical: ClinicalSummary,
    pub metadata: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guideline_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_completeness: Option<String>,
}

fn text_or(value: Option<&str>, default: &str) -> String {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(default)
        .to_string()
}

fn join_or(values: &[String], sep: &str) -> String {
    let items: Vec<&str> = values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .collect();
    if items.is_empty() {
        NONE_LISTED.to_string()
    } else {
        items.join(sep)
    }
}

fn profile_view(profile: Option<&PharmacogenomicProfile>) -> ProfileView {
    let default = PharmacogenomicProfile::default();
    let profile = profile.unwrap_or(&default);
    let primary_gene = text_or(profile.primary_gene.as_deref(), NOT_APPLICABLE);
    let diplotype = text_or(profile.diplotype.as_deref(), NOT_APPLICABLE);
    let variants: Vec<VariantRow> = profile
        .detected_variants
        .iter()
        .map(|v| VariantRow {
            rsid: text_or(v.rsid.as_deref(), "Unknown"),
            star: text_or(v.star.as_deref(), "Unknown"),
        })
        .collect();
    let variant_count = variants.len();
    ProfileView {
        detected_variant: format!("{primary_gene}: {diplotype} ({variant_count} variants)"),
        primary_gene,
        diplotype,
        phenotype: text_or(profile.phenotype.as_deref(), NOT_APPLICABLE),
        variants,
        variant_count,
    }
}

fn recommendation_view(rec: Option<&ClinicalRecommendation>) -> RecommendationView {
    let default = ClinicalRecommendation::default();
    let rec = rec.unwrap_or(&default);
    RecommendationView {
        dosage_adjustment: text_or(rec.dosage_adjustment.as_deref(), NOT_AVAILABLE),
        monitoring: text_or(rec.monitoring.as_deref(), NOT_AVAILABLE),
        alternative_drugs: join_or(&rec.alternative_drugs, ", "),
        urgency: text_or(rec.urgency.as_deref(), NOT_AVAILABLE),
    }
}

fn explanation_view(exp: Option<&LlmExplanation>) -> ExplanationView {
    let default = LlmExplanation::default();
    let exp = exp.unwrap_or(&default);
    ExplanationView {
        summary: text_or(exp.summary.as_deref(), NOT_AVAILABLE),
        mechanism: text_or(exp.mechanism.as_deref(), NOT_AVAILABLE),
        interaction_notes: join_or(&exp.interaction_notes, " • "),
        evidence_basis: text_or(exp.evidence_basis.as_deref(), NOT_AVAILABLE),
    }
}

impl AnalysisView {
    pub fn from_result(result: &AnalysisResult) -> Self {
        let risk = result.risk_assessment.as_ref();
        let raw_severity = risk.and_then(|r| r.severity.as_ref());
        let risk_label = text_or(risk.and_then(|r| r.risk_label.as_deref()), UNKNOWN_LABEL);

        let severity = resolve_severity(raw_severity, &risk_label);
        let confidence = confidence_value(risk.and_then(|r| r.confidence_score.as_ref()));
        let severity_text = severity_text(severity, raw_severity);
        let bucket = RiskBucket::classify(&risk_label);

        let profile = profile_view(result.pharmacogenomic_profile.as_ref());
        let recommendation = recommendation_view(result.clinical_recommendation.as_ref());
        let explanation = explanation_view(result.llm_generated_explanation.as_ref());

        let drug = text_or(result.drug.as_deref(), NOT_APPLICABLE);
        let urgency = result
            .clinical_recommendation
            .as_ref()
            .and_then(|r| r.urgency.as_deref())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(DEFAULT_URGENCY)
            .to_uppercase();

        Self {
            metadata: format!(
                "{drug} - {} ({})",
                profile.primary_gene, profile.diplotype
            ),
            clinical: ClinicalSummary {
                risk_label: risk_label.clone(),
                severity: severity_text.clone(),
                urgency,
                dosage_adjustment: recommendation.dosage_adjustment.clone(),
                monitoring: recommendation.monitoring.clone(),
            },
            drug,
            risk_label,
            risk: bucket,
            badge_color: bucket.color(),
            severity,
            severity_text,
            severity_score: format!("{:.1}", display_score(confidence, severity)),
            confidence,
            gauge: Gauge::from_confidence(confidence, bucket),
            profile,
            recommendation,
            explanation,
            guideline_url: result
                .guideline_url
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string),
            patient_id: result.patient_id.clone(),
            timestamp: result.timestamp.clone(),
            data_completeness: result
                .quality_metrics
                .as_ref()
                .and_then(|q| q.data_completeness.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn result(value: serde_json::Value) -> AnalysisResult {
        serde_json::from_value(value).expect("valid analysis result")
    }

    #[test]
    fn numeric_severity_is_returned_unchanged() {
        for value in [0.0, 3.5, 7.0, 12.25] {
            assert_eq!(resolve_severity(Some(&RawSeverity::Number(value)), "Toxic"), value);
            assert_eq!(
                resolve_severity(Some(&RawSeverity::Text(value.to_string())), "Toxic"),
                value
            );
        }
    }

    #[test]
    fn category_severity_maps_case_insensitively() {
        let cases = [
            ("none", 0.0),
            ("Low", 2.0),
            ("MODERATE", 5.0),
            ("High", 7.0),
            ("cRiTiCaL", 9.0),
        ];
        for (text, expected) in cases {
            assert_eq!(
                resolve_severity(Some(&RawSeverity::Text(text.into())), "Safe"),
                expected,
                "{text}"
            );
        }
    }

    #[test]
    fn label_table_and_zero_fallbacks() {
        assert_eq!(resolve_severity(None, "Adjust Dosage"), 5.0);
        assert_eq!(resolve_severity(None, "Ineffective"), 7.0);
        assert_eq!(resolve_severity(None, "UNKNOWN"), 2.0);
        assert_eq!(
            resolve_severity(Some(&RawSeverity::Text("severe-ish".into())), "Toxic"),
            9.0
        );
        assert_eq!(resolve_severity(None, "Something else"), 0.0);
        assert_eq!(
            resolve_severity(Some(&RawSeverity::Number(f64::NAN)), "Safe"),
            0.0
        );
    }

    #[test]
    fn high_bucket_covers_toxic_high_and_critical_anywhere() {
        for label in ["TOXIC", "very high risk", "Critical", "possibly toxic dose", "HiGh"] {
            let bucket = RiskBucket::classify(label);
            assert_eq!(bucket, RiskBucket::High, "{label}");
            assert_eq!(bucket.color(), "red");
        }
        assert_eq!(RiskBucket::classify("Safe").color(), "green");
        assert_eq!(RiskBucket::classify("Use caution").color(), "yellow");
        assert_eq!(RiskBucket::classify("Adjust Dosage").color(), "gray");
    }

    #[test]
    fn safe_bucket_wins_over_later_matches() {
        assert_eq!(RiskBucket::classify("normal-high"), RiskBucket::Safe);
        assert_eq!(RiskBucket::classify("moderate to high"), RiskBucket::Moderate);
    }

    #[test]
    fn confidence_drives_display_score() {
        let view = AnalysisView::from_result(&result(json!({
            "risk_assessment": {"risk_label": "Toxic", "confidence_score": 0.73, "severity": "critical"}
        })));
        assert_eq!(view.severity_score, "7.3");
        assert_eq!(view.severity_text, "CRITICAL");

        let view = AnalysisView::from_result(&result(json!({
            "risk_assessment": {"risk_label": "Toxic", "confidence_score": "0.73"}
        })));
        assert_eq!(view.severity_score, "7.3");
    }

    #[test]
    fn missing_confidence_falls_back_to_severity() {
        let view = AnalysisView::from_result(&result(json!({
            "risk_assessment": {"risk_label": "Ineffective", "confidence_score": "n/a"}
        })));
        assert_eq!(view.confidence, None);
        assert_eq!(view.severity_score, "7.0");
        assert_eq!(view.severity_text, "HIGH");
        assert_eq!(view.gauge.fraction, 0.0);
    }

    #[test]
    fn severity_text_prefers_raw_string() {
        assert_eq!(
            severity_text(9.0, Some(&RawSeverity::Text("  moderate ".into()))),
            "MODERATE"
        );
        assert_eq!(severity_text(0.5, None), "NONE");
        assert_eq!(severity_text(2.9, None), "LOW");
        assert_eq!(severity_text(5.9, Some(&RawSeverity::Number(5.9))), "MODERATE");
        assert_eq!(severity_text(7.9, None), "HIGH");
        assert_eq!(severity_text(8.0, Some(&RawSeverity::Text("   ".into()))), "CRITICAL");
    }

    #[test]
    fn gauge_fill_is_linear_in_confidence() {
        let gauge = Gauge::from_confidence(Some(0.5), RiskBucket::Moderate);
        assert_eq!(gauge.dash_offset, 78.5);
        assert_eq!(gauge.percent, 50);
        assert_eq!(gauge.color, "yellow");
        assert_eq!(gauge.bar, "[##########----------]");

        let full = Gauge::from_confidence(Some(1.4), RiskBucket::High);
        assert_eq!(full.dash_offset, 0.0);
        assert_eq!(full.color, RiskBucket::High.color());
    }

    #[test]
    fn empty_record_gets_documented_defaults() {
        let view = AnalysisView::from_result(&AnalysisResult::default());
        assert_eq!(view.risk_label, "UNKNOWN");
        assert_eq!(view.risk, RiskBucket::Unknown);
        assert_eq!(view.severity, 2.0);
        assert_eq!(view.severity_score, "2.0");
        assert_eq!(view.profile.primary_gene, "N/A");
        assert_eq!(view.profile.detected_variant, "N/A: N/A (0 variants)");
        assert_eq!(view.recommendation.dosage_adjustment, "Not available");
        assert_eq!(view.recommendation.alternative_drugs, "None listed");
        assert_eq!(view.explanation.interaction_notes, "None listed");
        assert_eq!(view.clinical.urgency, "ROUTINE");
        assert_eq!(view.metadata, "N/A - N/A (N/A)");
    }

    #[test]
    fn empty_variant_list_counts_zero() {
        let view = AnalysisView::from_result(&result(json!({
            "drug": "CODEINE",
            "pharmacogenomic_profile": {
                "primary_gene": "CYP2D6",
                "diplotype": "*1/*1",
                "phenotype": "NM",
                "detected_variants": []
            }
        })));
        assert_eq!(view.profile.variant_count, 0);
        assert!(view.profile.variants.is_empty());
        assert_eq!(view.profile.detected_variant, "CYP2D6: *1/*1 (0 variants)");
        assert_eq!(view.metadata, "CODEINE - CYP2D6 (*1/*1)");
    }

    #[test]
    fn lists_are_joined_for_display() {
        let view = AnalysisView::from_result(&result(json!({
            "clinical_recommendation": {
                "alternative_drugs": ["Morphine", "Tramadol"],
                "urgency": "urgent"
            },
            "llm_generated_explanation": {
                "interaction_notes": ["Avoid alcohol", "Report drowsiness"]
            }
        })));
        assert_eq!(view.recommendation.alternative_drugs, "Morphine, Tramadol");
        assert_eq!(view.recommendation.urgency, "urgent");
        assert_eq!(view.clinical.urgency, "URGENT");
        assert_eq!(
            view.explanation.interaction_notes,
            "Avoid alcohol • Report drowsiness"
        );
    }
}
