use std::time::Duration;

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, RETRY_AFTER, USER_AGENT};

const REQUEST_TIMEOUT_SECS: u64 = 15;

static CLIENT: OnceCell<Client> = OnceCell::new();

pub fn http_client() -> Result<&'static Client> {
    CLIENT.get_or_try_init(|| {
        Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("failed to build http client")
    })
}

#[derive(Debug, Clone, Copy)]
pub struct GetRequest<'a> {
    pub url: &'a str,
    pub query: &'a [(&'a str, &'a str)],
    pub bearer: Option<&'a str>,
}

impl<'a> GetRequest<'a> {
    pub fn public(url: &'a str) -> Self {
        Self {
            url,
            query: &[],
            bearer: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RawResponse {
    pub status: u16,
    pub retry_after: Option<String>,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Wire seam between the fetch policy and the network. `Err` means the
/// request never produced a status (connect failure, timeout, broken body).
pub trait Transport: Sync {
    fn get(&self, req: &GetRequest<'_>) -> Result<RawResponse>;

    fn post_form_basic(
        &self,
        url: &str,
        user: &str,
        password: &str,
        form: &[(&str, &str)],
    ) -> Result<RawResponse>;
}

pub struct HttpTransport {
    client: &'static Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: http_client()?,
        })
    }
}

impl Transport for HttpTransport {
    fn get(&self, req: &GetRequest<'_>) -> Result<RawResponse> {
        let mut builder = self
            .client
            .get(req.url)
            .header(USER_AGENT, "arena-ladder/0.1");
        if !req.query.is_empty() {
            builder = builder.query(req.query);
        }
        if let Some(token) = req.bearer {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        let resp = builder.send().context("request failed")?;
        read_response(resp)
    }

    fn post_form_basic(
        &self,
        url: &str,
        user: &str,
        password: &str,
        form: &[(&str, &str)],
    ) -> Result<RawResponse> {
        let resp = self
            .client
            .post(url)
            .basic_auth(user, Some(password))
            .form(form)
            .send()
            .context("request failed")?;
        read_response(resp)
    }
}

fn read_response(resp: reqwest::blocking::Response) -> Result<RawResponse> {
    let status = resp.status().as_u16();
    let retry_after = resp
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string());
    let body = resp.bytes().context("failed reading body")?.to_vec();
    Ok(RawResponse {
        status,
        retry_after,
        body,
    })
}
