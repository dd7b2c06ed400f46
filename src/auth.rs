use serde::Deserialize;

use crate::config::Credentials;
use crate::error::PipelineError;
use crate::http_client::Transport;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Client-credentials grant. Any failure here is fatal for the run.
pub fn fetch_access_token(
    transport: &dyn Transport,
    oauth_url: &str,
    credentials: &Credentials,
) -> Result<String, PipelineError> {
    let resp = transport
        .post_form_basic(
            oauth_url,
            &credentials.client_id,
            &credentials.client_secret,
            &[("grant_type", "client_credentials")],
        )
        .map_err(|err| PipelineError::TokenExchange(format!("{err:#}")))?;

    if !resp.is_success() {
        let body = String::from_utf8_lossy(&resp.body);
        let snippet: String = body.chars().take(200).collect();
        return Err(PipelineError::TokenExchange(format!(
            "http {}: {snippet}",
            resp.status
        )));
    }

    let parsed: TokenResponse = serde_json::from_slice(&resp.body)
        .map_err(|err| PipelineError::TokenExchange(format!("invalid token json: {err}")))?;
    if parsed.access_token.trim().is_empty() {
        return Err(PipelineError::TokenExchange("empty access token".to_string()));
    }
    Ok(parsed.access_token)
}
