//! Object-safe dynamic dispatch wrappers for the collaborator traits.
//!
//! The collaborator traits use RPITIT and therefore cannot be trait
//! objects directly. Each gets the same treatment:
//! 1. An object-safe `*Dyn` trait with boxed futures
//! 2. A blanket impl of `*Dyn` for every implementor of the real trait
//! 3. A `Box*` wrapper that delegates and restores `async fn` ergonomics
//!
//! Nodes hold `Arc<Box*>` handles injected at construction, so concrete
//! backends (HTTP, heuristic) are selected at wiring time.

use std::future::Future;
use std::pin::Pin;

use serde_json::{Map, Value};

use siteflow_types::collaborator::{Classification, LeaseTerms, ParcelScore};
use siteflow_types::error::CollaboratorError;

use super::service::{AdvisoryService, DocumentIntelligence};

// ---------------------------------------------------------------------------
// DocumentIntelligence
// ---------------------------------------------------------------------------

/// Object-safe version of [`DocumentIntelligence`] with boxed futures.
pub trait DocumentIntelligenceDyn: Send + Sync {
    fn classify_boxed<'a>(
        &'a self,
        text: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Classification, CollaboratorError>> + Send + 'a>>;

    fn extract_boxed<'a>(
        &'a self,
        text: &'a str,
        category: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Map<String, Value>, CollaboratorError>> + Send + 'a>>;
}

impl<T: DocumentIntelligence> DocumentIntelligenceDyn for T {
    fn classify_boxed<'a>(
        &'a self,
        text: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Classification, CollaboratorError>> + Send + 'a>> {
        Box::pin(self.classify(text))
    }

    fn extract_boxed<'a>(
        &'a self,
        text: &'a str,
        category: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Map<String, Value>, CollaboratorError>> + Send + 'a>>
    {
        Box::pin(self.extract(text, category))
    }
}

/// Type-erased document intelligence client.
pub struct BoxDocumentIntelligence {
    inner: Box<dyn DocumentIntelligenceDyn>,
}

impl BoxDocumentIntelligence {
    /// Wrap a concrete service in a type-erased box.
    pub fn new<T: DocumentIntelligence + 'static>(service: T) -> Self {
        Self {
            inner: Box::new(service),
        }
    }

    /// Classify a document's text into a category with a confidence score.
    pub async fn classify(&self, text: &str) -> Result<Classification, CollaboratorError> {
        self.inner.classify_boxed(text).await
    }

    /// Extract structured fields from a document of a known category.
    pub async fn extract(
        &self,
        text: &str,
        category: &str,
    ) -> Result<Map<String, Value>, CollaboratorError> {
        self.inner.extract_boxed(text, category).await
    }
}

// ---------------------------------------------------------------------------
// AdvisoryService
// ---------------------------------------------------------------------------

/// Object-safe version of [`AdvisoryService`] with boxed futures.
pub trait AdvisoryServiceDyn: Send + Sync {
    fn score_parcel_boxed<'a>(
        &'a self,
        parcel: &'a Value,
    ) -> Pin<Box<dyn Future<Output = Result<ParcelScore, CollaboratorError>> + Send + 'a>>;

    fn suggest_terms_boxed<'a>(
        &'a self,
        context: &'a Value,
    ) -> Pin<Box<dyn Future<Output = Result<LeaseTerms, CollaboratorError>> + Send + 'a>>;
}

impl<T: AdvisoryService> AdvisoryServiceDyn for T {
    fn score_parcel_boxed<'a>(
        &'a self,
        parcel: &'a Value,
    ) -> Pin<Box<dyn Future<Output = Result<ParcelScore, CollaboratorError>> + Send + 'a>> {
        Box::pin(self.score_parcel(parcel))
    }

    fn suggest_terms_boxed<'a>(
        &'a self,
        context: &'a Value,
    ) -> Pin<Box<dyn Future<Output = Result<LeaseTerms, CollaboratorError>> + Send + 'a>> {
        Box::pin(self.suggest_terms(context))
    }
}

/// Type-erased advisory service client.
pub struct BoxAdvisoryService {
    inner: Box<dyn AdvisoryServiceDyn>,
}

impl BoxAdvisoryService {
    /// Wrap a concrete service in a type-erased box.
    pub fn new<T: AdvisoryService + 'static>(service: T) -> Self {
        Self {
            inner: Box::new(service),
        }
    }

    /// Score a single parcel's suitability for development (0-100).
    pub async fn score_parcel(&self, parcel: &Value) -> Result<ParcelScore, CollaboratorError> {
        self.inner.score_parcel_boxed(parcel).await
    }

    /// Suggest lease terms for a parcel package.
    pub async fn suggest_terms(&self, context: &Value) -> Result<LeaseTerms, CollaboratorError> {
        self.inner.suggest_terms_boxed(context).await
    }
}
