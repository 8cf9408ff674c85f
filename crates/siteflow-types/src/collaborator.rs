//! Data shapes exchanged with collaborator services.
//!
//! The engine treats document intelligence and advisory scoring as external
//! collaborators: it specifies only the shapes they return, never their
//! internal algorithms. These types are that wire contract.

use serde::{Deserialize, Serialize};

/// Result of classifying a document's text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    /// Document category (e.g. "lease", "ppa", "survey", "title_report").
    pub category: String,
    /// Classifier confidence in [0.0, 1.0].
    pub confidence: f64,
}

/// Suitability assessment for a single parcel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParcelScore {
    /// Suitability score in [0.0, 100.0].
    pub suitability: f64,
    /// Factors that drove the score (e.g. "flat terrain", "near substation").
    #[serde(default)]
    pub factors: Vec<String>,
}

/// Suggested lease terms for a parcel package.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaseTerms {
    /// Suggested annual rent per acre, in dollars.
    pub annual_rent_per_acre: f64,
    /// Suggested lease term in years.
    pub term_years: u32,
    /// Annual rent escalation percentage.
    pub escalation_pct: f64,
    /// Conditions attached to the offer.
    #[serde(default)]
    pub conditions: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_json_roundtrip() {
        let c = Classification {
            category: "easement".to_string(),
            confidence: 0.82,
        };
        let json = serde_json::to_string(&c).unwrap();
        let parsed: Classification = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.category, "easement");
        assert!((parsed.confidence - 0.82).abs() < f64::EPSILON);
    }

    #[test]
    fn parcel_score_defaults_empty_factors() {
        let parsed: ParcelScore = serde_json::from_str(r#"{"suitability": 73.5}"#).unwrap();
        assert!(parsed.factors.is_empty());
        assert!((parsed.suitability - 73.5).abs() < f64::EPSILON);
    }

    #[test]
    fn lease_terms_json_roundtrip() {
        let terms = LeaseTerms {
            annual_rent_per_acre: 850.0,
            term_years: 25,
            escalation_pct: 2.0,
            conditions: vec!["title curative required".to_string()],
        };
        let json = serde_json::to_string(&terms).unwrap();
        let parsed: LeaseTerms = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.term_years, 25);
        assert_eq!(parsed.conditions.len(), 1);
    }
}
