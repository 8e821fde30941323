//! Scripted collaborators and a tiny HTTP responder for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::{Notify, Semaphore};

use crate::discovery::{DiscoveryError, PageSource};
use crate::domain::{id_from_url, FilterParams, ResourceDescriptor, UrlTemplates};
use crate::fetcher::{Probe, ProbeOutcome};

pub fn descriptors(ids: impl IntoIterator<Item = u64>) -> Vec<ResourceDescriptor> {
    let templates = UrlTemplates::default();
    ids.into_iter()
        .map(|id| ResourceDescriptor::from_numeric_id(id, &templates))
        .collect()
}

pub fn ids_of(items: &[ResourceDescriptor]) -> Vec<String> {
    items.iter().map(|d| d.id().to_string()).collect()
}

/// Probe answering from a per-ID table; unknown IDs are `NotFound`.
#[derive(Default)]
pub struct ScriptedProbe {
    outcomes: HashMap<u64, ProbeOutcome>,
    delays: HashMap<u64, Duration>,
    default_outcome: Option<ProbeOutcome>,
    calls: AtomicUsize,
    probed: Mutex<Vec<u64>>,
}

impl ScriptedProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn existing(ids: impl IntoIterator<Item = u64>) -> Self {
        let mut probe = Self::new();
        for id in ids {
            probe.outcomes.insert(id, ProbeOutcome::Exists);
        }
        probe
    }

    pub fn always(outcome: ProbeOutcome) -> Self {
        Self {
            default_outcome: Some(outcome),
            ..Self::default()
        }
    }

    pub fn with_outcome(mut self, id: u64, outcome: ProbeOutcome) -> Self {
        self.outcomes.insert(id, outcome);
        self
    }

    pub fn with_delay(mut self, id: u64, delay: Duration) -> Self {
        self.delays.insert(id, delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn probed(&self) -> Vec<u64> {
        self.probed.lock().unwrap().clone()
    }
}

#[async_trait]
impl Probe for ScriptedProbe {
    async fn probe(&self, url: &str) -> ProbeOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let id: u64 = id_from_url(url)
            .and_then(|s| s.parse().ok())
            .expect("scripted probe needs numeric ids");
        self.probed.lock().unwrap().push(id);

        if let Some(delay) = self.delays.get(&id) {
            tokio::time::sleep(*delay).await;
        }

        self.outcomes
            .get(&id)
            .copied()
            .or(self.default_outcome)
            .unwrap_or(ProbeOutcome::NotFound)
    }
}

pub type PageResponse = Result<Vec<ResourceDescriptor>, DiscoveryError>;

/// Page source replaying scripted responses, then repeating `otherwise`.
pub struct ScriptedPages {
    responses: Mutex<VecDeque<PageResponse>>,
    otherwise: PageResponse,
    calls: AtomicUsize,
    pages: Mutex<Vec<u32>>,
    gate: Option<Arc<Semaphore>>,
    entered: Arc<Notify>,
}

impl ScriptedPages {
    pub fn new(responses: Vec<PageResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            otherwise: Ok(Vec::new()),
            calls: AtomicUsize::new(0),
            pages: Mutex::new(Vec::new()),
            gate: None,
            entered: Arc::new(Notify::new()),
        }
    }

    pub fn failing() -> Self {
        Self::new(Vec::new()).otherwise(Err(DiscoveryError::SourceUnavailable(
            "scripted outage".into(),
        )))
    }

    pub fn otherwise(mut self, response: PageResponse) -> Self {
        self.otherwise = response;
        self
    }

    /// Block every fetch until the returned semaphore receives permits.
    pub fn gated(mut self) -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        self.gate = Some(gate.clone());
        (self, gate)
    }

    pub fn entered(&self) -> Arc<Notify> {
        self.entered.clone()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn pages(&self) -> Vec<u32> {
        self.pages.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageSource for ScriptedPages {
    async fn fetch_page(
        &self,
        page: u32,
        _page_size: u32,
        _filter: &FilterParams,
    ) -> Result<Vec<ResourceDescriptor>, DiscoveryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.pages.lock().unwrap().push(page);
        self.entered.notify_one();

        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate closed").forget();
        }

        let next = self.responses.lock().unwrap().pop_front();
        next.unwrap_or_else(|| self.otherwise.clone())
    }
}

/// Answer every connection with the same raw HTTP response.
pub async fn serve_forever(response: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            tokio::spawn(async move {
                let mut buf = vec![0u8; 4096];
                let mut read = Vec::new();
                while !read.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => read.extend_from_slice(&buf[..n]),
                    }
                }
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    format!("http://{}", addr)
}

/// Accept connections and never answer.
pub async fn serve_silently() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    format!("http://{}", addr)
}

/// A local address with nothing listening on it.
pub async fn closed_address() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}
