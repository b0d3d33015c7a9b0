//! Advisory helpers backed by an optional text-generation service
//!
//! Descriptions, risk assessments and compliance checklists are advisory
//! only. When no generator is configured, or its answer cannot be used,
//! deterministic fallbacks are returned instead of errors.

use async_trait::async_trait;
use lifecycle_ledger::AssetType;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Checklist returned whenever a generated one is unavailable
pub const DEFAULT_COMPLIANCE_CHECKLIST: [&str; 3] = [
    "KYC verification completed",
    "AML checks passed",
    "Documentation verified",
];

/// Neutral score used by the fallback assessments
pub const FALLBACK_RISK_SCORE: u8 = 50;

/// Text generator failure
#[derive(Error, Debug)]
pub enum AdvisoryError {
    /// Service not reachable or not configured
    #[error("Generator unavailable: {0}")]
    Unavailable(String),

    /// Service answered with an error
    #[error("Generation failed: {0}")]
    Failed(String),
}

/// External text-generation collaborator
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Complete `prompt` with at most `max_tokens` tokens
    async fn generate(&self, prompt: &str, max_tokens: u32) -> Result<String, AdvisoryError>;
}

/// Risk bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    /// Low risk
    Low,
    /// Medium risk
    Medium,
    /// High risk
    High,
    /// Critical risk
    Critical,
}

/// Risk assessment result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessment {
    /// Score 0-100
    pub risk_score: u8,

    /// Bucket
    pub risk_level: RiskLevel,

    /// Short explanation
    pub analysis: String,

    /// Suggested follow-ups
    #[serde(default)]
    pub recommendations: Vec<String>,
}

impl RiskAssessment {
    /// Fallback when no generator is configured
    pub fn unavailable() -> Self {
        Self::fallback("Risk assessment unavailable")
    }

    /// Fallback when the generator failed or answered unusably
    pub fn incomplete() -> Self {
        Self::fallback("Risk assessment could not be completed")
    }

    fn fallback(analysis: &str) -> Self {
        Self {
            risk_score: FALLBACK_RISK_SCORE,
            risk_level: RiskLevel::Medium,
            analysis: analysis.to_string(),
            recommendations: Vec::new(),
        }
    }
}

/// Shape accepted from the generator before range checks
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAssessment {
    risk_score: f64,
    risk_level: RiskLevel,
    analysis: String,
    #[serde(default)]
    recommendations: Vec<String>,
}

impl RawAssessment {
    fn validate(self) -> Option<RiskAssessment> {
        if !self.risk_score.is_finite() || !(0.0..=100.0).contains(&self.risk_score) {
            return None;
        }
        Some(RiskAssessment {
            risk_score: self.risk_score.round() as u8,
            risk_level: self.risk_level,
            analysis: self.analysis,
            recommendations: self.recommendations,
        })
    }
}

/// Advisory front end with fallbacks
#[derive(Clone, Default)]
pub struct Advisor {
    generator: Option<Arc<dyn TextGenerator>>,
}

impl std::fmt::Debug for Advisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Advisor")
            .field("generator", &self.generator.is_some())
            .finish()
    }
}

impl Advisor {
    /// Advisor using `generator`
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator: Some(generator),
        }
    }

    /// Advisor that always falls back
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Two to three sentence registry description, if one can be generated
    pub async fn describe(&self, asset_type: AssetType, metadata: &serde_json::Value) -> Option<String> {
        let Some(generator) = &self.generator else {
            debug!("No text generator configured, skipping description");
            return None;
        };

        let prompt = format!(
            "Write a professional, factual two to three sentence description of a {} asset \
             for a regulated asset registry. Basic information: {}. Highlight key \
             characteristics and value drivers without making compliance claims.",
            asset_type.name(),
            metadata
        );

        match generator.generate(&prompt, 1024).await {
            Ok(text) => {
                let text = text.trim();
                (!text.is_empty()).then(|| text.to_string())
            }
            Err(e) => {
                warn!(error = %e, "Description generation failed");
                None
            }
        }
    }

    /// Risk assessment, or the neutral fallback
    pub async fn assess_risk(&self, asset_type: AssetType, metadata: &serde_json::Value) -> RiskAssessment {
        let Some(generator) = &self.generator else {
            debug!("No text generator configured, skipping risk assessment");
            return RiskAssessment::unavailable();
        };

        let prompt = format!(
            "Assess the regulatory, liquidity and market risk of a {} asset with metadata {}. \
             Answer with JSON only: {{\"riskScore\": <0-100>, \"riskLevel\": \
             \"LOW|MEDIUM|HIGH|CRITICAL\", \"analysis\": \"<brief explanation>\", \
             \"recommendations\": [\"<recommendation>\"]}}",
            asset_type.name(),
            metadata
        );

        let text = match generator.generate(&prompt, 1024).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Risk assessment failed");
                return RiskAssessment::incomplete();
            }
        };

        match parse_risk_assessment(&text) {
            Some(assessment) => assessment,
            None => {
                warn!("Risk assessment response was not usable JSON");
                RiskAssessment::incomplete()
            }
        }
    }

    /// Verification checklist, or the default one
    pub async fn compliance_checklist(&self, asset_type: AssetType) -> Vec<String> {
        let default = || -> Vec<String> {
            DEFAULT_COMPLIANCE_CHECKLIST.iter().map(|s| s.to_string()).collect()
        };

        let Some(generator) = &self.generator else {
            return default();
        };

        let prompt = format!(
            "List the legal, regulatory and ledger-specific checks needed to verify a {} asset \
             in a regulated registry. Answer with a JSON array of strings only.",
            asset_type.name()
        );

        match generator.generate(&prompt, 512).await {
            Ok(text) => parse_checklist(&text).unwrap_or_else(|| {
                warn!("Compliance checklist response was not a JSON string array");
                default()
            }),
            Err(e) => {
                warn!(error = %e, "Compliance checklist generation failed");
                default()
            }
        }
    }
}

/// Outermost `{...}` span of free text
pub fn extract_json_object(text: &str) -> Option<&str> {
    extract_span(text, '{', '}')
}

/// Outermost `[...]` span of free text
pub fn extract_json_array(text: &str) -> Option<&str> {
    extract_span(text, '[', ']')
}

fn extract_span(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}

/// Parse and range-check a generated assessment
pub fn parse_risk_assessment(text: &str) -> Option<RiskAssessment> {
    let json = extract_json_object(text)?;
    serde_json::from_str::<RawAssessment>(json).ok()?.validate()
}

/// Parse a generated checklist; empty lists are rejected
pub fn parse_checklist(text: &str) -> Option<Vec<String>> {
    let json = extract_json_array(text)?;
    let items: Vec<String> = serde_json::from_str(json).ok()?;
    let items: Vec<String> = items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    (!items.is_empty()).then_some(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Canned(String);

    #[async_trait]
    impl TextGenerator for Canned {
        async fn generate(&self, _prompt: &str, _max_tokens: u32) -> Result<String, AdvisoryError> {
            Ok(self.0.clone())
        }
    }

    struct Broken;

    #[async_trait]
    impl TextGenerator for Broken {
        async fn generate(&self, _prompt: &str, _max_tokens: u32) -> Result<String, AdvisoryError> {
            Err(AdvisoryError::Failed("503".to_string()))
        }
    }

    fn canned(text: &str) -> Advisor {
        Advisor::new(Arc::new(Canned(text.to_string())))
    }

    #[tokio::test]
    async fn test_disabled_fallbacks() {
        let advisor = Advisor::disabled();
        let metadata = json!({"location": "Dubai"});

        assert!(advisor.describe(AssetType::RealEstate, &metadata).await.is_none());

        let risk = advisor.assess_risk(AssetType::RealEstate, &metadata).await;
        assert_eq!(risk.risk_score, 50);
        assert_eq!(risk.risk_level, RiskLevel::Medium);
        assert_eq!(risk.analysis, "Risk assessment unavailable");

        assert_eq!(
            advisor.compliance_checklist(AssetType::Bond).await,
            vec!["KYC verification completed", "AML checks passed", "Documentation verified"]
        );
    }

    #[tokio::test]
    async fn test_risk_extracted_from_prose() {
        let advisor = canned(
            "Here is the assessment:\n{\"riskScore\": 72, \"riskLevel\": \"HIGH\", \
             \"analysis\": \"Thin secondary market\", \"recommendations\": [\"Escrow\"]}\nThanks",
        );
        let risk = advisor.assess_risk(AssetType::Art, &json!({})).await;
        assert_eq!(risk.risk_score, 72);
        assert_eq!(risk.risk_level, RiskLevel::High);
        assert_eq!(risk.recommendations, vec!["Escrow"]);
    }

    #[tokio::test]
    async fn test_malformed_or_out_of_range_risk_falls_back() {
        for text in [
            "no json at all",
            "{\"riskScore\": 140, \"riskLevel\": \"LOW\", \"analysis\": \"x\"}",
            "{\"riskScore\": 10, \"riskLevel\": \"SEVERE\", \"analysis\": \"x\"}",
        ] {
            let risk = canned(text).assess_risk(AssetType::Equity, &json!({})).await;
            assert_eq!(risk, RiskAssessment::incomplete());
        }

        let risk = Advisor::new(Arc::new(Broken))
            .assess_risk(AssetType::Equity, &json!({}))
            .await;
        assert_eq!(risk.analysis, "Risk assessment could not be completed");
    }

    #[tokio::test]
    async fn test_checklist_parsing() {
        let advisor = canned("Checks: [\"Title deed\", \" \", \"Lien search\"]");
        assert_eq!(
            advisor.compliance_checklist(AssetType::RealEstate).await,
            vec!["Title deed", "Lien search"]
        );

        let advisor = canned("[]");
        assert_eq!(advisor.compliance_checklist(AssetType::RealEstate).await.len(), 3);
    }

    #[tokio::test]
    async fn test_describe() {
        let advisor = canned("  A senior secured bond.  ");
        assert_eq!(
            advisor.describe(AssetType::Bond, &json!({"coupon": "5%"})).await,
            Some("A senior secured bond.".to_string())
        );
        assert!(Advisor::new(Arc::new(Broken))
            .describe(AssetType::Bond, &json!({}))
            .await
            .is_none());
    }

    #[test]
    fn test_extract_span() {
        assert_eq!(extract_json_object("a {\"x\": {\"y\": 1}} b"), Some("{\"x\": {\"y\": 1}}"));
        assert_eq!(extract_json_array("] nope ["), None);
        assert_eq!(extract_json_array("x [1, 2] y"), Some("[1, 2]"));
    }
}
