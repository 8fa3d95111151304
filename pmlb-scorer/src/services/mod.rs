//! Business logic services for pmlb-scorer

pub mod prompts;
pub mod request_builder;
pub mod retry;
pub mod submission;
pub mod transport;
pub mod upstream_client;

pub use request_builder::{AnnotationRequestBuilder, ChatCompletionRequest};
pub use retry::RetryPolicy;
pub use submission::{SubmissionError, SubmissionOrchestrator, SubmissionOutcome, SubmissionRequest};
pub use transport::{AnnotationTransport, HttpTransport, TransportError, TransportResponse};
pub use upstream_client::{
    Annotated, AnnotationError, AnnotationMeta, FailureDetail, UpstreamAnnotationClient,
};
