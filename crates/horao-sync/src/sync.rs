//! Threshold-triggered delta push to peer replicas over HMAC-signed
//! bearer auth.

use crate::error::SyncError;
use crate::store::{MemoryStore, Store};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use horao_core::crdt::Listener;
use horao_core::map::MapUpdate;
use horao_core::Update;
use horao_domain::data_center::Writer;
use horao_domain::{Cabinet, Claim, Constraint, DataCenter, DataCenterNetwork, LogicalInfrastructure};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Sync POST timeout: within the implementation-defined 5-30s range a
/// peer that hasn't responded is treated as unreachable for this tick.
const SYNC_POST_TIMEOUT: Duration = Duration::from_secs(10);

const LAST_SYNC_KEY: &str = "last_sync";

type HmacSha256 = Hmac<Sha256>;

/// The root document pushed to `/synchronize`: the update history for
/// every data center's rows (so a peer can merge through the ordinary
/// `apply` path rather than trust a materialized snapshot), plus a
/// per-data-center merkle root a peer can use to skip a data center that
/// has already converged without replaying its full history.
#[derive(Serialize, Deserialize)]
pub struct SyncEnvelope {
    pub(crate) host_id: String,
    pub(crate) data_centers: BTreeMap<String, Vec<Update<MapUpdate<u32, Vec<Cabinet>, Writer>>>>,
    pub(crate) merkle_roots: BTreeMap<String, horao_merkle::Hash>,
    pub(crate) networks: BTreeMap<String, Vec<DataCenterNetwork>>,
    pub(crate) constraints: Vec<Constraint>,
    pub(crate) claims: Vec<Claim>,
}

impl SyncEnvelope {
    fn from_infrastructure(host_id: &str, infrastructure: &LogicalInfrastructure) -> Self {
        let data_centers = infrastructure
            .data_centers
            .iter()
            .map(|dc| (dc.name.clone(), dc.history()))
            .collect();
        let merkle_roots = infrastructure
            .data_centers
            .iter()
            .map(|dc| (dc.name.clone(), dc.merkle_root()))
            .collect();
        Self {
            host_id: host_id.to_string(),
            data_centers,
            merkle_roots,
            networks: infrastructure.networks.clone(),
            constraints: infrastructure.constraints.clone(),
            claims: infrastructure.claims.clone(),
        }
    }

    /// Merge this envelope into `infrastructure`. Row histories replay
    /// through the ordinary CRDT `apply` path via `synchronizer`, so the
    /// merge is commutative and idempotent regardless of delivery order.
    ///
    /// `networks`, `constraints`, and `claims` are plain data rather than
    /// CRDTs in this implementation; they merge by name-keyed union
    /// (anything the peer has that this replica lacks is adopted,
    /// anything already present locally is left untouched) rather than a
    /// field-level conflict-free merge.
    pub(crate) fn apply_to(
        self,
        infrastructure: &mut LogicalInfrastructure,
        synchronizer: &PeerSynchronizer,
    ) -> Result<(), horao_core::CrdtError> {
        for (name, history) in self.data_centers {
            let Some(data_center) = infrastructure
                .data_centers
                .iter_mut()
                .find(|dc| dc.name == name)
            else {
                continue;
            };
            for update in history {
                synchronizer.apply_peer_update(data_center, update)?;
            }
        }

        for (name, networks) in self.networks {
            infrastructure.networks.entry(name).or_insert(networks);
        }

        for constraint in self.constraints {
            if !infrastructure
                .constraints
                .iter()
                .any(|existing| existing.tenant == constraint.tenant)
            {
                infrastructure.constraints.push(constraint);
            }
        }

        for claim in self.claims {
            if !infrastructure
                .claims
                .iter()
                .any(|existing| existing.name() == claim.name())
            {
                infrastructure.claims.push(claim);
            }
        }

        Ok(())
    }
}

/// Propagates local deltas to peers on a time-or-change-count trigger, and
/// applies peer-originated updates on the receiving side without
/// re-triggering its own change counter.
pub struct PeerSynchronizer {
    peers: Vec<String>,
    secret: String,
    host_id: String,
    sync_delta_secs: i64,
    max_changes: u64,
    change_count: Arc<AtomicU64>,
    suppressed: Arc<AtomicBool>,
    last_sync: Option<i64>,
    client: reqwest::Client,
    store: Box<dyn Store>,
}

impl PeerSynchronizer {
    pub fn new(peers: Vec<String>, secret: String, host_id: String, sync_delta_secs: i64, max_changes: u64) -> Self {
        Self::with_store(peers, secret, host_id, sync_delta_secs, max_changes, Box::new(MemoryStore::new()))
    }

    /// Construct with an explicit [`Store`] backing `last_sync`, so a
    /// replica that restarts doesn't forget it just synced and burst its
    /// first tick to every peer. `last_sync` is loaded from the store
    /// immediately, matching the persisted-timestamp contract in the
    /// external interfaces section.
    pub fn with_store(
        peers: Vec<String>,
        secret: String,
        host_id: String,
        sync_delta_secs: i64,
        max_changes: u64,
        store: Box<dyn Store>,
    ) -> Self {
        let last_sync = store
            .get(LAST_SYNC_KEY)
            .and_then(|v| v.as_str().map(str::to_string))
            .and_then(|raw| chrono::DateTime::parse_from_rfc3339(&raw).ok())
            .map(|dt| dt.timestamp());

        let client = reqwest::Client::builder()
            .timeout(SYNC_POST_TIMEOUT)
            .build()
            .unwrap_or_default();

        Self {
            peers,
            secret,
            host_id,
            sync_delta_secs,
            max_changes,
            change_count: Arc::new(AtomicU64::new(0)),
            suppressed: Arc::new(AtomicBool::new(false)),
            last_sync,
            client,
            store,
        }
    }

    /// A listener to attach to every `DataCenter` in the replica via
    /// `DataCenter::add_listener`, incrementing the change counter for
    /// every locally-originated row update. Suppressed while a
    /// peer-originated update is being applied through `apply_peer_update`.
    pub fn change_listener(&self) -> Listener<MapUpdate<u32, Vec<Cabinet>, Writer>> {
        let counter = Arc::clone(&self.change_count);
        let suppressed = Arc::clone(&self.suppressed);
        Box::new(move |_update| {
            if !suppressed.load(Ordering::SeqCst) {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        })
    }

    /// Apply an update received from a peer without incrementing the local
    /// change counter (a peer-originated update must not trigger a sync
    /// back to that same peer).
    pub fn apply_peer_update(
        &self,
        data_center: &mut DataCenter,
        update: horao_core::Update<MapUpdate<u32, Vec<Cabinet>, Writer>>,
    ) -> Result<(), horao_core::CrdtError> {
        self.suppressed.store(true, Ordering::SeqCst);
        let result = data_center.apply(update);
        self.suppressed.store(false, Ordering::SeqCst);
        result
    }

    fn should_sync(&self, now: i64) -> bool {
        self.trigger_reason(now).is_some()
    }

    /// Why this tick would fire, if it would. `"time"` wins over
    /// `"change-count"` when both thresholds are crossed, matching
    /// `should_sync`'s short-circuit order.
    fn trigger_reason(&self, now: i64) -> Option<&'static str> {
        let elapsed_enough = match self.last_sync {
            Some(last) => now - last >= self.sync_delta_secs,
            None => true,
        };
        if elapsed_enough {
            Some("time")
        } else if self.change_count.load(Ordering::SeqCst) >= self.max_changes {
            Some("change-count")
        } else {
            None
        }
    }

    pub(crate) fn secret(&self) -> &str {
        &self.secret
    }

    pub(crate) fn peers(&self) -> &[String] {
        &self.peers
    }

    fn bearer_token(&self) -> Result<String, SyncError> {
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
        let payload_json = serde_json::json!({ "peer": self.host_id }).to_string();
        let payload = URL_SAFE_NO_PAD.encode(payload_json);
        let signing_input = format!("{header}.{payload}");

        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| SyncError::Auth(e.to_string()))?;
        mac.update(signing_input.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{signing_input}.{signature}"))
    }

    /// Push the replica to every peer if the trigger predicate holds.
    /// Returns `Some(now)` (and resets the change counter) only if every
    /// peer accepted the push; returns `None` if the trigger did not fire
    /// or if any peer failed, so the next trigger retries.
    pub async fn sync_if_due(
        &mut self,
        infrastructure: &LogicalInfrastructure,
        now: i64,
    ) -> Result<Option<i64>, SyncError> {
        let Some(reason) = self.trigger_reason(now) else {
            return Ok(None);
        };
        let span = tracing::info_span!("sync_round", peers = self.peers.len(), trigger = reason);
        let _entered = span.enter();

        let envelope = SyncEnvelope::from_infrastructure(&self.host_id, infrastructure);
        let token = self.bearer_token()?;
        let mut all_succeeded = true;

        for peer in &self.peers {
            let url = format!("{}/synchronize", peer.trim_end_matches('/'));
            let outcome = self
                .client
                .post(&url)
                .header("Peer", "true")
                .bearer_auth(&token)
                .json(&envelope)
                .send()
                .await;

            match outcome {
                Ok(response) if response.status().is_success() => {
                    tracing::debug!(peer = %peer, "sync round accepted");
                }
                Ok(response) => {
                    tracing::error!(peer = %peer, status = %response.status(), "sync round rejected");
                    all_succeeded = false;
                }
                Err(error) => {
                    tracing::error!(peer = %peer, error = %error, "sync transport failure");
                    all_succeeded = false;
                }
            }
        }

        if all_succeeded {
            self.last_sync = Some(now);
            self.change_count.store(0, Ordering::SeqCst);
            if let Some(timestamp) = chrono::DateTime::from_timestamp(now, 0) {
                self.store.set(LAST_SYNC_KEY, serde_json::json!(timestamp.to_rfc3339()));
            }
            Ok(Some(now))
        } else {
            Ok(None)
        }
    }

    pub fn last_sync(&self) -> Option<i64> {
        self.last_sync
    }

    pub fn change_count(&self) -> u64 {
        self.change_count.load(Ordering::SeqCst)
    }
}

/// Verify an incoming `Authorization: Bearer` token against the shared
/// peer secret, returning the `peer` claim on success. Used by the
/// `/synchronize` receiver before any update is applied.
pub(crate) fn verify_bearer_token(token: &str, secret: &str) -> Result<String, SyncError> {
    let mut parts = token.split('.');
    let (Some(header), Some(payload), Some(signature)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(SyncError::Auth("malformed token".to_string()));
    };
    if parts.next().is_some() {
        return Err(SyncError::Auth("malformed token".to_string()));
    }

    let signing_input = format!("{header}.{payload}");
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| SyncError::Auth(e.to_string()))?;
    mac.update(signing_input.as_bytes());
    let expected = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
    if expected != signature {
        return Err(SyncError::Auth("signature mismatch".to_string()));
    }

    let payload_bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| SyncError::Auth(e.to_string()))?;
    let claims: serde_json::Value =
        serde_json::from_slice(&payload_bytes).map_err(|e| SyncError::Auth(e.to_string()))?;
    claims
        .get("peer")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| SyncError::Auth("missing peer claim".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_s7_sync_backpressure() {
        let synchronizer = PeerSynchronizer::new(vec![], "secret".to_string(), "host-a".to_string(), 1, 100);
        assert!(synchronizer.should_sync(0));
    }

    /// S7 in full: with no peers configured, `sync_if_due` vacuously
    /// succeeds (there is nothing to fail against), so this drives the
    /// trigger predicate and `last_sync` bookkeeping exactly as the
    /// scenario describes without needing a real peer to POST to.
    #[tokio::test]
    async fn scenario_s7_sync_backpressure_full_sequence() {
        let mut synchronizer =
            PeerSynchronizer::new(vec![], "secret".to_string(), "host-a".to_string(), 1, 100);
        let infrastructure = LogicalInfrastructure::new();
        synchronizer.change_count.store(1, Ordering::SeqCst);

        let first = synchronizer.sync_if_due(&infrastructure, 0).await.unwrap();
        assert_eq!(first, Some(0));

        synchronizer.change_count.store(1, Ordering::SeqCst);
        let immediate_repeat = synchronizer.sync_if_due(&infrastructure, 0).await.unwrap();
        assert_eq!(immediate_repeat, None);

        let after_delta = synchronizer.sync_if_due(&infrastructure, 1).await.unwrap();
        assert_eq!(after_delta, Some(1));
    }

    #[test]
    fn change_count_trigger_fires_before_time_trigger() {
        let synchronizer = PeerSynchronizer::new(vec![], "secret".to_string(), "host-a".to_string(), 3600, 1);
        synchronizer.change_count.store(1, Ordering::SeqCst);
        assert!(synchronizer.should_sync(0));
    }

    #[test]
    fn time_trigger_does_not_fire_before_delta_elapses() {
        let mut synchronizer = PeerSynchronizer::new(vec![], "secret".to_string(), "host-a".to_string(), 100, 1000);
        synchronizer.last_sync = Some(50);
        assert!(!synchronizer.should_sync(60));
        assert!(synchronizer.should_sync(151));
    }

    #[test]
    fn bearer_token_has_three_dot_separated_segments() {
        let synchronizer = PeerSynchronizer::new(vec![], "secret".to_string(), "host-a".to_string(), 1, 1);
        let token = synchronizer.bearer_token().unwrap();
        assert_eq!(token.split('.').count(), 3);
    }

    #[test]
    fn verify_bearer_token_round_trips_the_peer_claim() {
        let synchronizer = PeerSynchronizer::new(vec![], "secret".to_string(), "host-a".to_string(), 1, 1);
        let token = synchronizer.bearer_token().unwrap();
        assert_eq!(verify_bearer_token(&token, "secret").unwrap(), "host-a");
    }

    #[test]
    fn verify_bearer_token_rejects_wrong_secret() {
        let synchronizer = PeerSynchronizer::new(vec![], "secret".to_string(), "host-a".to_string(), 1, 1);
        let token = synchronizer.bearer_token().unwrap();
        assert!(verify_bearer_token(&token, "wrong-secret").is_err());
    }

    #[test]
    fn suppressed_listener_does_not_increment_change_count() {
        let synchronizer = PeerSynchronizer::new(vec![], "secret".to_string(), "host-a".to_string(), 1, 1);
        synchronizer.suppressed.store(true, Ordering::SeqCst);
        let listener = synchronizer.change_listener();
        let update = horao_core::Update::new(uuid::Uuid::new_v4(), 1, MapUpdate {
            key: 0u32,
            op: horao_core::map::MapOp::Unset { writer_id: "w".to_string() },
        });
        listener(&update);
        assert_eq!(synchronizer.change_count(), 0);
    }
}
