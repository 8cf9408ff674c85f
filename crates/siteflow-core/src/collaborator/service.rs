//! Collaborator trait definitions.
//!
//! Uses native async fn in traits (RPITIT, Rust 2024 edition). The boxed
//! wrappers in `boxed` provide dynamic dispatch for node constructors.

use serde_json::{Map, Value};

use siteflow_types::collaborator::{Classification, LeaseTerms, ParcelScore};
use siteflow_types::error::CollaboratorError;

/// Document intelligence service: classification and field extraction.
///
/// Consumed by the document-processing workflow's `classify` and `extract`
/// nodes. The engine does not specify the service's internal algorithm,
/// only the shapes it returns.
pub trait DocumentIntelligence: Send + Sync {
    /// Classify a document's text into a category with a confidence score.
    fn classify(
        &self,
        text: &str,
    ) -> impl std::future::Future<Output = Result<Classification, CollaboratorError>> + Send;

    /// Extract structured fields from a document of a known category.
    fn extract(
        &self,
        text: &str,
        category: &str,
    ) -> impl std::future::Future<Output = Result<Map<String, Value>, CollaboratorError>> + Send;
}

/// Advisory scoring service: parcel suitability and lease term suggestions.
///
/// Consumed by the land-acquisition workflow's `site_analysis` and
/// `lease_negotiation` nodes.
pub trait AdvisoryService: Send + Sync {
    /// Score a single parcel's suitability for development (0-100).
    fn score_parcel(
        &self,
        parcel: &Value,
    ) -> impl std::future::Future<Output = Result<ParcelScore, CollaboratorError>> + Send;

    /// Suggest lease terms for a parcel package.
    fn suggest_terms(
        &self,
        context: &Value,
    ) -> impl std::future::Future<Output = Result<LeaseTerms, CollaboratorError>> + Send;
}
