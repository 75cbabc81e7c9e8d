use std::sync::Arc;

use {
    carlink_channels::{ChannelOutbound, memory::MemoryOutbound},
    carlink_common::{ParticipantId, Tag},
    carlink_registry::{
        ExternalResolver, InMemoryRegistryStore, NoopResolver, RegistryRecord, RegistryStore,
    },
    carlink_sessions::SessionState,
};

use crate::service::{PairingConfig, PairingService};

pub(crate) fn tag(s: &str) -> Tag {
    Tag::parse(s).unwrap_or_else(|e| panic!("bad test tag {s}: {e}"))
}

pub(crate) struct Harness {
    pub service: Arc<PairingService>,
    pub store: Arc<InMemoryRegistryStore>,
    pub outbound: Arc<MemoryOutbound>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_resolver(NoopResolver)
    }

    pub fn with_resolver(resolver: impl ExternalResolver + 'static) -> Self {
        let store = Arc::new(InMemoryRegistryStore::new());
        let outbound = Arc::new(MemoryOutbound::new());
        let service = PairingService::new(
            Arc::clone(&store) as Arc<dyn RegistryStore>,
            Arc::new(resolver),
            Arc::clone(&outbound) as Arc<dyn ChannelOutbound>,
            PairingConfig::default(),
        );
        Self {
            service,
            store,
            outbound,
        }
    }

    /// Register `id` as the owner of `plate`, with handle `owner{id}`.
    pub async fn register(&self, id: ParticipantId, plate: &str, allow_direct: bool) {
        let record = RegistryRecord::local(
            id,
            tag(plate),
            Some(format!("+1555000{}", id.0)),
            Some(format!("owner{}", id.0)),
            allow_direct,
        );
        self.store
            .insert(&record)
            .await
            .unwrap_or_else(|e| panic!("insert {plate}: {e}"));
    }

    pub fn set(&self, id: ParticipantId, state: SessionState) {
        self.service
            .sessions
            .transact(|t| t.directory.set(id, state));
    }

    pub fn state(&self, id: ParticipantId) -> SessionState {
        self.service.sessions.state(id)
    }

    /// Pair `a` (searcher) with `b` and relay one message so both are
    /// `InDialog`.
    pub async fn in_dialog(&self, a: ParticipantId, b: ParticipantId) {
        self.register(b, &format!("P{}", b.0), false).await;
        self.set(a, SessionState::Searching);
        self.service
            .search(a, &format!("P{}", b.0))
            .await
            .unwrap_or_else(|e| panic!("search: {e}"));
        self.service.forward(a, "hi").await;
        self.outbound.clear();
    }

    pub fn assert_consistent(&self) {
        let violations = self.service.sessions.violations();
        assert!(violations.is_empty(), "violations: {violations:?}");
    }
}
