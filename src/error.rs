use thiserror::Error;

/// Failures that abort a whole run. Everything else is logged per entity.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("BLIZZARD_CLIENT_ID and BLIZZARD_CLIENT_SECRET must be set")]
    MissingCredentials,

    #[error("token exchange failed: {0}")]
    TokenExchange(String),
}
