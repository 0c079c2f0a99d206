use thiserror::Error;

#[derive(Debug, Error)]
pub enum GeminiAgentError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("decision service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to parse generateContent response: {source}\n  body: {body}")]
    Parse {
        body: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("decision service returned no candidate text")]
    EmptyResponse,
}
