use serde::{Deserialize, Serialize};

use crate::error::PharmGuardError;

/// Severity as the backend sends it: a score, a category word, or a numeric string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawSeverity {
    Number(f64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawConfidence {
    Number(f64),
    Text(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RiskAssessment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<RawSeverity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_score: Option<RawConfidence>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectedVariant {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rsid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub star: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PharmacogenomicProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_gene: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diplotype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phenotype: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub detected_variants: Vec<DetectedVariant>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClinicalRecommendation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dosage_adjustment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitoring: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub alternative_drugs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urgency: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmExplanation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mechanism: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub interaction_notes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence_basis: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QualityMetrics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vcf_parsing_success: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_completeness: Option<String>,
}

/// One per-drug record of the analysis payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guideline_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_assessment: Option<RiskAssessment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pharmacogenomic_profile: Option<PharmacogenomicProfile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clinical_recommendation: Option<ClinicalRecommendation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_generated_explanation: Option<LlmExplanation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_metrics: Option<QualityMetrics>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct AnalysisEnvelope {
    #[serde(default)]
    total_analyses: Option<usize>,
    #[serde(default, deserialize_with = "null_as_default")]
    analyses: Vec<AnalysisResult>,
}

/// Backend payload as received, plus its typed per-drug records.
///
/// `raw` is kept untouched so the JSON viewer re-displays exactly what the
/// backend returned.
#[derive(Debug, Clone)]
pub struct AnalysisResponse {
    raw: serde_json::Value,
    total_analyses: Option<usize>,
    analyses: Vec<AnalysisResult>,
}

impl AnalysisResponse {
    pub fn from_value(raw: serde_json::Value) -> Result<Self, serde_json::Error> {
        let envelope = AnalysisEnvelope::deserialize(&raw)?;
        Ok(Self {
            raw,
            total_analyses: envelope.total_analyses,
            analyses: envelope.analyses,
        })
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, PharmGuardError> {
        let raw: serde_json::Value = serde_json::from_slice(bytes)?;
        Ok(Self::from_value(raw)?)
    }

    pub fn raw(&self) -> &serde_json::Value {
        &self.raw
    }

    pub fn analyses(&self) -> &[AnalysisResult] {
        &self.analyses
    }

    pub fn total_analyses(&self) -> usize {
        self.total_analyses.unwrap_or(self.analyses.len())
    }

    pub fn is_empty(&self) -> bool {
        self.analyses.is_empty()
    }
}

/// Error body of a non-2xx analysis response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn severity_and_confidence_accept_numbers_and_strings() {
        let risk: RiskAssessment = serde_json::from_value(json!({
            "risk_label": "Toxic",
            "severity": "critical",
            "confidence_score": "0.95"
        }))
        .expect("risk should deserialize");
        assert_eq!(risk.severity, Some(RawSeverity::Text("critical".into())));
        assert_eq!(risk.confidence_score, Some(RawConfidence::Text("0.95".into())));

        let risk: RiskAssessment =
            serde_json::from_value(json!({"severity": 7, "confidence_score": 0.8}))
                .expect("numeric risk should deserialize");
        assert_eq!(risk.severity, Some(RawSeverity::Number(7.0)));
        assert_eq!(risk.confidence_score, Some(RawConfidence::Number(0.8)));
        assert!(risk.risk_label.is_none());
    }

    #[test]
    fn null_sub_objects_and_lists_default() {
        let result: AnalysisResult = serde_json::from_value(json!({
            "drug": "CODEINE",
            "risk_assessment": null,
            "pharmacogenomic_profile": {"primary_gene": "CYP2D6", "detected_variants": null},
            "clinical_recommendation": {"alternative_drugs": null}
        }))
        .expect("result should deserialize");
        assert!(result.risk_assessment.is_none());
        let profile = result.pharmacogenomic_profile.expect("profile");
        assert!(profile.detected_variants.is_empty());
        assert!(
            result
                .clinical_recommendation
                .expect("recommendation")
                .alternative_drugs
                .is_empty()
        );
    }

    #[test]
    fn response_keeps_raw_payload_and_order() {
        let raw = json!({
            "total_analyses": 2,
            "analyses": [
                {"drug": "CODEINE", "extra": {"kept": true}},
                {"drug": "WARFARIN"}
            ]
        });
        let response = AnalysisResponse::from_value(raw.clone()).expect("response");
        assert_eq!(response.raw(), &raw);
        assert_eq!(response.total_analyses(), 2);
        let drugs: Vec<_> = response
            .analyses()
            .iter()
            .filter_map(|a| a.drug.as_deref())
            .collect();
        assert_eq!(drugs, vec!["CODEINE", "WARFARIN"]);
    }

    #[test]
    fn response_without_analyses_is_empty() {
        let response =
            AnalysisResponse::from_value(json!({"status": "ok"})).expect("response");
        assert!(response.is_empty());
        assert_eq!(response.total_analyses(), 0);
    }
}
