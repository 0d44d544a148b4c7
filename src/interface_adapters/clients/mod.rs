// Outbound reqwest clients for the answering endpoint and the identity service.

pub mod answer;
pub mod identity;

pub use answer::HttpAnswerClient;
pub use identity::RestIdentityClient;
