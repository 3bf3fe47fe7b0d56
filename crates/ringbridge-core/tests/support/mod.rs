// Scripted vendor collaborators for bridge integration tests.

#![allow(dead_code, clippy::unwrap_used)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use tokio::sync::{Notify, mpsc};
use tokio_stream::wrappers::UnboundedReceiverStream;

use ringbridge_api::{
    Authorized, CredentialService, DeviceControl, DeviceEvent, DeviceKind, DeviceRecord,
    Directory, Error, EventKind, EventStream, LocationRecord, TokenUpdate, VendorClient,
};
use ringbridge_core::{
    Bridge, BridgeConfig, CoreError, Credentials, MemoryTokenStore, OutboundMessage, TokenStore,
};

pub type ErrorFactory = fn() -> Error;

// ── Vendor client ───────────────────────────────────────────────────

/// In-memory vendor client. Device events are injected with [`FakeVendor::emit`].
#[derive(Default)]
pub struct FakeVendor {
    locations: Mutex<Vec<LocationRecord>>,
    directory_error: Mutex<Option<ErrorFactory>>,
    subscribe_error: Mutex<Option<(EventKind, ErrorFactory)>>,
    sources: Mutex<HashMap<(String, EventKind), mpsc::UnboundedSender<Result<DeviceEvent, Error>>>>,
    unlock_results: Mutex<VecDeque<Result<Value, ErrorFactory>>>,
    unlock_gate: Mutex<Option<Arc<Notify>>>,
    unlock_calls: AtomicUsize,
    disconnected: AtomicBool,
}

impl FakeVendor {
    /// One location `L1` with intercom `D1` and doorbell `B1`.
    pub fn with_default_site() -> Arc<Self> {
        let vendor = Self::default();
        *vendor.locations.lock().unwrap() = vec![LocationRecord {
            id: "L1".into(),
            name: "Home".into(),
            devices: vec![
                record("D1", DeviceKind::Intercom, json!({ "lock": "locked" })),
                record("B1", DeviceKind::Doorbell, json!({ "battery": 90 })),
            ],
        }];
        Arc::new(vendor)
    }

    pub fn fail_directory(&self, error: ErrorFactory) {
        *self.directory_error.lock().unwrap() = Some(error);
    }

    pub fn fail_subscribe(&self, kind: EventKind, error: ErrorFactory) {
        *self.subscribe_error.lock().unwrap() = Some((kind, error));
    }

    pub fn push_unlock_result(&self, result: Result<Value, ErrorFactory>) {
        self.unlock_results.lock().unwrap().push_back(result);
    }

    /// Hold every unlock until the returned gate is notified.
    pub fn gate_unlocks(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.unlock_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    /// Push an event on the source for (`device_id`, `kind`).
    /// Returns `false` if no such source is open.
    pub fn emit(&self, device_id: &str, kind: EventKind, snapshot: Value) -> bool {
        self.emit_raw(device_id, kind, Ok(DeviceEvent { kind, snapshot }))
    }

    pub fn emit_raw(
        &self,
        device_id: &str,
        kind: EventKind,
        item: Result<DeviceEvent, Error>,
    ) -> bool {
        self.sources
            .lock()
            .unwrap()
            .get(&(device_id.to_owned(), kind))
            .is_some_and(|tx| tx.send(item).is_ok())
    }

    pub fn open_sources(&self) -> usize {
        self.sources.lock().unwrap().len()
    }

    pub fn unlock_calls(&self) -> usize {
        self.unlock_calls.load(Ordering::SeqCst)
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::SeqCst)
    }
}

pub fn record(id: &str, kind: DeviceKind, data: Value) -> DeviceRecord {
    DeviceRecord {
        id: id.into(),
        location_id: "L1".into(),
        kind,
        description: format!("{kind} {id}"),
        data,
    }
}

#[async_trait]
impl Directory for FakeVendor {
    async fn locations(&self) -> Result<Vec<LocationRecord>, Error> {
        // Suspend like a network call so concurrent callers interleave.
        tokio::task::yield_now().await;
        if let Some(error) = *self.directory_error.lock().unwrap() {
            return Err(error());
        }
        Ok(self.locations.lock().unwrap().clone())
    }

    fn subscribe(&self, device_id: &str, kind: EventKind) -> Result<EventStream, Error> {
        if let Some((failing, error)) = *self.subscribe_error.lock().unwrap() {
            if failing == kind {
                return Err(error());
            }
        }
        let (tx, rx) = mpsc::unbounded_channel();
        self.sources
            .lock()
            .unwrap()
            .insert((device_id.to_owned(), kind), tx);
        Ok(UnboundedReceiverStream::new(rx).boxed())
    }
}

#[async_trait]
impl DeviceControl for FakeVendor {
    async fn unlock(&self, _device_id: &str) -> Result<Value, Error> {
        self.unlock_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.unlock_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let next = self.unlock_results.lock().unwrap().pop_front();
        match next {
            Some(Ok(value)) => Ok(value),
            Some(Err(error)) => Err(error()),
            None => Ok(Value::Null),
        }
    }
}

impl VendorClient for FakeVendor {
    fn disconnect(&self) {
        self.disconnected.store(true, Ordering::SeqCst);
        // Dropping the senders ends every open source.
        self.sources.lock().unwrap().clear();
    }
}

// ── Credential service ──────────────────────────────────────────────

/// Accepts any token unless told to reject, and hands out [`FakeVendor`].
pub struct FakeCredentials {
    vendor: Arc<FakeVendor>,
    failure: Mutex<Option<ErrorFactory>>,
    exchanged: Mutex<Vec<String>>,
    rotations: Mutex<Option<mpsc::UnboundedSender<Result<TokenUpdate, Error>>>>,
}

impl FakeCredentials {
    pub fn new(vendor: Arc<FakeVendor>) -> Arc<Self> {
        Arc::new(Self {
            vendor,
            failure: Mutex::new(None),
            exchanged: Mutex::new(Vec::new()),
            rotations: Mutex::new(None),
        })
    }

    pub fn fail_with(&self, error: ErrorFactory) {
        *self.failure.lock().unwrap() = Some(error);
    }

    /// Tokens presented to `exchange`, in order.
    pub fn exchanged(&self) -> Vec<String> {
        self.exchanged.lock().unwrap().clone()
    }

    /// Push a rotated token. Returns `false` if nobody is listening.
    pub fn rotate(&self, old: &str, new: &str) -> bool {
        let update = TokenUpdate {
            old_token: Some(SecretString::from(old.to_owned())),
            new_token: SecretString::from(new.to_owned()),
        };
        self.rotations
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|tx| tx.send(Ok(update)).is_ok())
    }

    /// Push a failed delivery on the rotation stream.
    pub fn fail_rotation(&self, error: ErrorFactory) -> bool {
        self.rotations
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|tx| tx.send(Err(error())).is_ok())
    }
}

#[async_trait]
impl CredentialService for FakeCredentials {
    async fn exchange(&self, refresh_token: &SecretString) -> Result<Authorized, Error> {
        self.exchanged
            .lock()
            .unwrap()
            .push(refresh_token.expose_secret().to_owned());
        if let Some(error) = *self.failure.lock().unwrap() {
            return Err(error());
        }
        let (tx, rx) = mpsc::unbounded_channel();
        *self.rotations.lock().unwrap() = Some(tx);
        Ok(Authorized {
            refresh_token: refresh_token.clone(),
            client: Arc::clone(&self.vendor) as Arc<dyn VendorClient>,
            token_updates: UnboundedReceiverStream::new(rx).boxed(),
        })
    }
}

// ── Token store ─────────────────────────────────────────────────────

type SaveHook = Box<dyn Fn() + Send + Sync>;

/// [`MemoryTokenStore`] whose writes can be made to fail or to run a hook.
#[derive(Default)]
pub struct ScriptedStore {
    inner: MemoryTokenStore,
    fail_saves: AtomicBool,
    on_save: Mutex<Option<SaveHook>>,
}

impl ScriptedStore {
    pub fn new(inner: MemoryTokenStore) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Run `hook` at the start of every save.
    pub fn on_save(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.on_save.lock().unwrap() = Some(Box::new(hook));
    }
}

impl TokenStore for ScriptedStore {
    fn load(&self) -> Result<Option<SecretString>, CoreError> {
        self.inner.load()
    }

    fn save(&self, token: &SecretString) -> Result<(), CoreError> {
        if let Some(hook) = self.on_save.lock().unwrap().as_ref() {
            hook();
        }
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(CoreError::Persistence {
                message: "disk full".into(),
            });
        }
        self.inner.save(token)
    }

    fn clear(&self) -> Result<(), CoreError> {
        self.inner.clear()
    }
}

// ── Harness ─────────────────────────────────────────────────────────

pub struct Harness {
    pub bridge: Bridge,
    pub vendor: Arc<FakeVendor>,
    pub credentials: Arc<FakeCredentials>,
    pub store: Arc<ScriptedStore>,
    pub outbound: mpsc::UnboundedReceiver<OutboundMessage>,
}

impl Harness {
    /// Bridge seeded with `initial_token` and an empty token store.
    pub fn seeded(initial_token: &str) -> Self {
        Self::build(Some(initial_token), MemoryTokenStore::new(), BridgeConfig::default())
    }

    pub fn build(
        initial_token: Option<&str>,
        store: MemoryTokenStore,
        mut config: BridgeConfig,
    ) -> Self {
        init_tracing();
        let vendor = FakeVendor::with_default_site();
        let credentials = FakeCredentials::new(Arc::clone(&vendor));
        let store = Arc::new(ScriptedStore::new(store));
        let (tx, outbound) = mpsc::unbounded_channel();

        config.credentials = Credentials {
            initial_token: initial_token.map(|t| SecretString::from(t.to_owned())),
            token: None,
        };
        let bridge = Bridge::new(
            config,
            Arc::clone(&credentials) as Arc<dyn CredentialService>,
            Arc::clone(&store) as Arc<dyn TokenStore>,
            Arc::new(tx),
        );

        Self {
            bridge,
            vendor,
            credentials,
            store,
            outbound,
        }
    }

    /// Start the bridge and discard the directory announcements.
    pub async fn started(initial_token: &str) -> Self {
        let mut harness = Self::seeded(initial_token);
        harness.bridge.start().await.unwrap();
        harness.drain();
        harness
    }

    /// Next outbound message, failing the test after one second.
    pub async fn next_message(&mut self) -> OutboundMessage {
        tokio::time::timeout(Duration::from_secs(1), self.outbound.recv())
            .await
            .expect("timed out waiting for outbound message")
            .expect("outbound channel closed")
    }

    /// Assert nothing else is published after letting handlers run.
    pub async fn assert_quiet(&mut self) {
        settle().await;
        if let Ok(message) = self.outbound.try_recv() {
            panic!("unexpected outbound message on {}", message.topic);
        }
    }

    pub fn drain(&mut self) -> Vec<OutboundMessage> {
        std::iter::from_fn(|| self.outbound.try_recv().ok()).collect()
    }

    pub fn stored_token(&self) -> Option<String> {
        self.store
            .load()
            .unwrap()
            .map(|t| t.expose_secret().to_owned())
    }
}

/// Route bridge logs to the test output. Filter with `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Give spawned handler tasks a chance to run.
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    tokio::time::sleep(Duration::from_millis(20)).await;
}
