#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;

use anyhow::{Result, anyhow};
use serde_json::Value;

use arena_ladder::http_client::{GetRequest, RawResponse, Transport};
use arena_ladder::models::{BracketStat, Character};

pub fn json_response(value: Value) -> RawResponse {
    RawResponse {
        status: 200,
        retry_after: None,
        body: serde_json::to_vec(&value).expect("serializable json"),
    }
}

pub fn status(code: u16) -> RawResponse {
    RawResponse {
        status: code,
        retry_after: None,
        body: Vec::new(),
    }
}

pub fn rate_limited(retry_after: Option<&str>) -> RawResponse {
    RawResponse {
        status: 429,
        retry_after: retry_after.map(|s| s.to_string()),
        body: Vec::new(),
    }
}

/// Scripted transport keyed by URL. Each URL answers from its queue in
/// order and repeats the last answer once the queue is down to one.
/// Unknown URLs answer 404. `None` entries simulate a dropped connection.
#[derive(Default)]
pub struct FakeTransport {
    routes: Mutex<HashMap<String, VecDeque<Option<RawResponse>>>>,
    calls: Mutex<Vec<String>>,
    token: Mutex<Option<RawResponse>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(self, token: &str) -> Self {
        *self.token.lock().unwrap() = Some(json_response(serde_json::json!({
            "access_token": token,
            "token_type": "bearer",
            "expires_in": 86399
        })));
        self
    }

    pub fn token_response(self, resp: RawResponse) -> Self {
        *self.token.lock().unwrap() = Some(resp);
        self
    }

    pub fn route(self, url: &str, responses: Vec<RawResponse>) -> Self {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), responses.into_iter().map(Some).collect());
        self
    }

    pub fn route_json(self, url: &str, value: Value) -> Self {
        self.route(url, vec![json_response(value)])
    }

    pub fn route_script(self, url: &str, script: Vec<Option<RawResponse>>) -> Self {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), script.into_iter().collect());
        self
    }

    pub fn calls_to(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == url).count()
    }

    pub fn calls_starting_with(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }
}

impl Transport for FakeTransport {
    fn get(&self, req: &GetRequest<'_>) -> Result<RawResponse> {
        self.calls.lock().unwrap().push(req.url.to_string());
        let mut routes = self.routes.lock().unwrap();
        let Some(queue) = routes.get_mut(req.url) else {
            return Ok(status(404));
        };
        let next = if queue.len() > 1 {
            queue.pop_front().flatten()
        } else {
            queue.front().cloned().flatten()
        };
        next.ok_or_else(|| anyhow!("connection reset"))
    }

    fn post_form_basic(
        &self,
        _url: &str,
        _user: &str,
        _password: &str,
        _form: &[(&str, &str)],
    ) -> Result<RawResponse> {
        self.token
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| anyhow!("oauth endpoint unreachable"))
    }
}

pub fn character(name: &str, realm: &str, brackets: &[(&str, u32, u32, u32)]) -> Character {
    Character {
        name: name.to_string(),
        realm: realm.to_string(),
        realm_name: String::new(),
        level: 70,
        class: "Warrior".to_string(),
        race: "Orc".to_string(),
        faction: "HORDE".to_string(),
        guild: String::new(),
        brackets: brackets
            .iter()
            .map(|(bracket, rating, won, lost)| {
                (
                    bracket.to_string(),
                    BracketStat {
                        rating: *rating,
                        won: *won,
                        lost: *lost,
                        played: won + lost,
                        season_id: Some(1),
                    },
                )
            })
            .collect::<BTreeMap<_, _>>(),
        spec_groups: None,
        equipment: None,
        avatar: None,
    }
}

pub trait RawResponseExt {
    fn with_body(self, body: &[u8]) -> RawResponse;
}

impl RawResponseExt for RawResponse {
    fn with_body(mut self, body: &[u8]) -> RawResponse {
        self.body = body.to_vec();
        self
    }
}
