//! Deterministic rule-based collaborator backends.
//!
//! Keyword classification and rule-based parcel scoring. Used as the
//! offline default when no remote collaborator endpoints are configured,
//! and by integration tests that need reproducible results.

use serde_json::{Map, Value, json};

use siteflow_core::collaborator::{AdvisoryService, DocumentIntelligence};
use siteflow_types::collaborator::{Classification, LeaseTerms, ParcelScore};
use siteflow_types::error::CollaboratorError;

// ---------------------------------------------------------------------------
// Document intelligence
// ---------------------------------------------------------------------------

/// Keyword tables per category. Order matters: the first category with the
/// highest hit count wins ties.
const CATEGORY_KEYWORDS: [(&str, &[&str]); 6] = [
    ("lease", &["lease", "lessor", "lessee", "rent", "term of years"]),
    ("ppa", &["power purchase", "offtake", "energy price", "megawatt"]),
    ("easement", &["easement", "right-of-way", "ingress", "egress"]),
    ("option", &["option to purchase", "option period", "exercise notice"]),
    ("survey", &["survey", "plat", "bearing", "monument"]),
    ("title_report", &["title", "schedule b", "exception", "vesting"]),
];

/// Keyword-matching document classifier and line-based field extractor.
pub struct HeuristicDocumentIntelligence;

impl DocumentIntelligence for HeuristicDocumentIntelligence {
    async fn classify(&self, text: &str) -> Result<Classification, CollaboratorError> {
        let lowered = text.to_lowercase();

        let mut best: Option<(&str, usize, usize)> = None;
        for (category, keywords) in CATEGORY_KEYWORDS {
            let hits = keywords.iter().filter(|k| lowered.contains(**k)).count();
            if hits > 0 && best.map(|(_, h, _)| hits > h).unwrap_or(true) {
                best = Some((category, hits, keywords.len()));
            }
        }

        Ok(match best {
            Some((category, hits, total)) => Classification {
                category: category.to_string(),
                // Scale into [0.5, 1.0]: one hit is a weak signal, a full
                // table is as sure as this classifier gets.
                confidence: 0.5 + 0.5 * (hits as f64 / total as f64),
            },
            None => Classification {
                category: "correspondence".to_string(),
                confidence: 0.4,
            },
        })
    }

    async fn extract(
        &self,
        text: &str,
        category: &str,
    ) -> Result<Map<String, Value>, CollaboratorError> {
        let mut fields = Map::new();
        fields.insert("category".to_string(), json!(category));

        // "Key: Value" lines become fields, normalized to snake_case keys.
        for line in text.lines() {
            if let Some((key, value)) = line.split_once(':') {
                let key = key.trim().to_lowercase().replace([' ', '-'], "_");
                let value = value.trim();
                if !key.is_empty() && !value.is_empty() && key.len() <= 40 {
                    fields.insert(key, json!(value));
                }
            }
        }
        Ok(fields)
    }
}

// ---------------------------------------------------------------------------
// Advisory service
// ---------------------------------------------------------------------------

/// Rule-based parcel scoring and lease term suggestion.
pub struct HeuristicAdvisoryService;

impl AdvisoryService for HeuristicAdvisoryService {
    async fn score_parcel(&self, parcel: &Value) -> Result<ParcelScore, CollaboratorError> {
        let mut score: f64 = 50.0;
        let mut factors = Vec::new();

        if let Some(acreage) = parcel.get("acreage").and_then(Value::as_f64) {
            if acreage >= 40.0 {
                score += 15.0;
                factors.push("large contiguous acreage".to_string());
            } else {
                score += 5.0;
                factors.push("limited acreage".to_string());
            }
        }

        if let Some(slope) = parcel.get("slope_pct").and_then(Value::as_f64) {
            if slope <= 5.0 {
                score += 15.0;
                factors.push("flat terrain".to_string());
            } else {
                score -= 10.0;
                factors.push("steep terrain".to_string());
            }
        }

        if let Some(distance) = parcel
            .get("distance_to_substation_km")
            .and_then(Value::as_f64)
        {
            if distance <= 3.0 {
                score += 20.0;
                factors.push("adjacent to substation".to_string());
            } else if distance <= 10.0 {
                score += 10.0;
                factors.push("near substation".to_string());
            }
        }

        if parcel.get("floodplain") == Some(&json!(true)) {
            score -= 25.0;
            factors.push("floodplain exposure".to_string());
        }

        Ok(ParcelScore {
            suitability: score.clamp(0.0, 100.0),
            factors,
        })
    }

    async fn suggest_terms(&self, context: &Value) -> Result<LeaseTerms, CollaboratorError> {
        let overall_score = context
            .get("overall_score")
            .and_then(Value::as_f64)
            .unwrap_or(50.0);
        let clean_diligence = context
            .pointer("/due_diligence/clean")
            .and_then(Value::as_bool)
            .unwrap_or(true);

        // Strong sites command higher rent; title issues attach conditions.
        let annual_rent_per_acre = 600.0 + 4.0 * overall_score;
        let mut conditions = Vec::new();
        if !clean_diligence {
            conditions.push("title curative required before execution".to_string());
        }

        Ok(LeaseTerms {
            annual_rent_per_acre,
            term_years: 25,
            escalation_pct: 2.0,
            conditions,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn classify_picks_category_with_most_hits() {
        let docs = HeuristicDocumentIntelligence;
        let text = "This LEASE between Lessor and Lessee sets annual rent...";
        let classification = docs.classify(text).await.unwrap();
        assert_eq!(classification.category, "lease");
        assert!(classification.confidence > 0.5);
    }

    #[tokio::test]
    async fn classify_falls_back_on_no_hits() {
        let docs = HeuristicDocumentIntelligence;
        let classification = docs.classify("hello there").await.unwrap();
        assert_eq!(classification.category, "correspondence");
        assert!((classification.confidence - 0.4).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn extract_pulls_key_value_lines() {
        let docs = HeuristicDocumentIntelligence;
        let text = "Lessor: Acme Land LLC\nAnnual Rent: $42,000\nnot a field line";
        let fields = docs.extract(text, "lease").await.unwrap();
        assert_eq!(fields["category"], json!("lease"));
        assert_eq!(fields["lessor"], json!("Acme Land LLC"));
        assert_eq!(fields["annual_rent"], json!("$42,000"));
    }

    #[tokio::test]
    async fn scoring_rewards_flat_close_parcels() {
        let advisor = HeuristicAdvisoryService;
        let good = advisor
            .score_parcel(&json!({
                "acreage": 120.0,
                "slope_pct": 2.0,
                "distance_to_substation_km": 1.5,
            }))
            .await
            .unwrap();
        assert_eq!(good.suitability, 100.0);

        let poor = advisor
            .score_parcel(&json!({
                "acreage": 10.0,
                "slope_pct": 12.0,
                "floodplain": true,
            }))
            .await
            .unwrap();
        assert_eq!(poor.suitability, 20.0);
        assert!(poor.factors.contains(&"floodplain exposure".to_string()));
    }

    #[tokio::test]
    async fn scoring_is_deterministic() {
        let advisor = HeuristicAdvisoryService;
        let parcel = json!({ "acreage": 60.0, "slope_pct": 4.0 });
        let first = advisor.score_parcel(&parcel).await.unwrap();
        let second = advisor.score_parcel(&parcel).await.unwrap();
        assert_eq!(first.suitability, second.suitability);
    }

    #[tokio::test]
    async fn terms_attach_conditions_on_dirty_diligence() {
        let advisor = HeuristicAdvisoryService;
        let terms = advisor
            .suggest_terms(&json!({
                "overall_score": 70.0,
                "due_diligence": { "clean": false },
            }))
            .await
            .unwrap();
        assert_eq!(terms.annual_rent_per_acre, 880.0);
        assert_eq!(terms.term_years, 25);
        assert_eq!(terms.conditions.len(), 1);
    }
}
