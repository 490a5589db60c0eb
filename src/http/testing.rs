//! Scripted transport for unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{HttpRequest, HttpResponse, Transport};
use crate::{Error, Result};

/// Replays queued responses in order and records every request it receives.
#[derive(Debug, Default)]
pub(crate) struct RecordingTransport {
    responses: Mutex<VecDeque<(u16, String)>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, status: u16, body: impl Into<String>) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back((status, body.into()));
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn urls(&self) -> Vec<String> {
        self.requests()
            .iter()
            .map(|r| r.url().unwrap())
            .collect()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn invoke(&self, request: HttpRequest) -> Result<HttpResponse> {
        let url = request.url()?;
        self.requests.lock().unwrap().push(request);

        let (status, body) = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Error::Config(format!("no scripted response for {url}")))?;

        if !(200..300).contains(&status) {
            return Err(Error::HttpStatus {
                status,
                message: "scripted".into(),
                url,
                response: body,
            });
        }
        Ok(HttpResponse::new(status, url, body))
    }
}
