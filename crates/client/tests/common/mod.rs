#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::watch;

use salesdesk_auth::{AccessToken, Session};
use salesdesk_client::{
    Backend, BackendError, ClientConfig, ClientContext, MirrorStore, NetworkSignal, RemoteRow,
    TableQuery,
};
use salesdesk_core::UserId;

/// Scripted backend: per-table answers, call counters and an optional gate
/// that holds every fetch until opened.
pub struct FakeBackend {
    probe: Mutex<Result<(), BackendError>>,
    tables: Mutex<HashMap<String, Result<Vec<Value>, BackendError>>>,
    gate: watch::Sender<bool>,
    pub probe_calls: AtomicUsize,
    pub fetch_calls: AtomicUsize,
    pub last_query: Mutex<Option<TableQuery>>,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        let (gate, _) = watch::channel(true);
        Arc::new(Self {
            probe: Mutex::new(Ok(())),
            tables: Mutex::new(HashMap::new()),
            gate,
            probe_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
            last_query: Mutex::new(None),
        })
    }

    pub fn set_probe(&self, answer: Result<(), BackendError>) {
        *self.probe.lock().unwrap() = answer;
    }

    pub fn set_rows(&self, table: &str, rows: Vec<Value>) {
        self.tables.lock().unwrap().insert(table.to_string(), Ok(rows));
    }

    pub fn fail_table(&self, table: &str, err: BackendError) {
        self.tables.lock().unwrap().insert(table.to_string(), Err(err));
    }

    pub fn close_gate(&self) {
        self.gate.send_replace(false);
    }

    pub fn open_gate(&self) {
        self.gate.send_replace(true);
    }

    pub fn probes(&self) -> usize {
        self.probe_calls.load(Ordering::SeqCst)
    }

    pub fn fetches(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn probe(&self, _session: &Session) -> Result<(), BackendError> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        self.probe.lock().unwrap().clone()
    }

    async fn fetch_all(
        &self,
        _session: &Session,
        query: TableQuery,
    ) -> Result<Vec<RemoteRow>, BackendError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_query.lock().unwrap() = Some(query);

        let mut gate = self.gate.subscribe();
        let _ = gate.wait_for(|open| *open).await;

        self.tables
            .lock()
            .unwrap()
            .get(query.table)
            .cloned()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

pub fn customer(id: &str, name: &str) -> Value {
    json!({ "id": id, "name": name, "contact_name": "Ana", "active": true })
}

pub fn product(id: &str, name: &str, price: f64) -> Value {
    json!({ "id": id, "name": name, "code": format!("SKU-{id}"), "unit_price": price })
}

pub fn session() -> Session {
    Session::new(UserId::new(), "rep@shop.example", AccessToken::new("token"))
}

pub struct Harness {
    pub backend: Arc<FakeBackend>,
    pub network: NetworkSignal,
    pub ctx: Arc<ClientContext>,
    pub session: Session,
}

impl Harness {
    pub fn new(store: Arc<dyn MirrorStore>) -> Self {
        let backend = FakeBackend::new();
        let network = NetworkSignal::new(true);
        let ctx = Arc::new(ClientContext::new(
            ClientConfig::default(),
            backend.clone(),
            store,
            network.clone(),
        ));
        let session = session();
        ctx.sign_in(session.clone()).unwrap();

        Self {
            backend,
            network,
            ctx,
            session,
        }
    }

    pub fn user(&self) -> UserId {
        self.session.user_id
    }

    pub fn seed(&self, customers: Vec<Value>, products: Vec<Value>) {
        self.backend.set_rows("customers", customers);
        self.backend.set_rows("products", products);
    }
}
