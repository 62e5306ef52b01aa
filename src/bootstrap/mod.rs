//! Application bootstrap state machine
//!
//! Sequences the two-step readiness flow: wait for the identity provider to
//! reach a terminal state, then (for authenticated sessions) exchange the
//! identity for a bearer token and load the access map. The outcome is a
//! single rendering verdict the web layer gates on.
//!
//! The controller owns no network logic; both collaborators are injected as
//! trait objects so tests can substitute fakes.
//!
//! ## Sequencing contract
//!
//! - The access-map request is never issued before a token is obtained.
//! - The load re-runs iff the authenticated flag transitions to true
//!   (`should_reload`); unrelated snapshot updates never re-trigger it.
//! - Each qualifying transition increments a generation counter; a completing
//!   load that carries a stale generation is discarded, not applied.
//! - A missing token is an explicit terminal state (error verdict), not an
//!   indefinite loading state.

use std::sync::Arc;
use tokio::sync::{mpsc, watch};

use crate::access::{AccessMapProvider, InitParams};
use crate::identity::{IdentityProvider, IdentitySnapshot};

/// Fixed message for an access-map load failure; the underlying cause is
/// logged, never rendered
pub const ACCESS_MAP_FAILED_MESSAGE: &str = "Access map failed to load";

/// Message for the token-unavailable terminal state
pub const TOKEN_UNAVAILABLE_MESSAGE: &str = "Access token unavailable";

/// The single rendering decision derived from identity and access-map state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    ShowLoading,
    ShowError(String),
    ShowApp,
}

/// Where the authenticated load sequence currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadPhase {
    /// No load in progress or required (unauthenticated sessions stay here)
    Idle,
    /// Token request issued, not yet answered
    FetchingToken,
    /// Token obtained, access-map request in flight
    LoadingAccessMap,
    /// Token request came back empty; terminal for this generation
    TokenUnavailable,
    /// Access map loaded and present
    Ready,
    /// Access map request settled without a map
    Failed,
}

/// Completion events sent back to the controller loop by load tasks
#[derive(Debug)]
enum LoadEvent {
    TokenObtained { generation: u64 },
    TokenUnavailable { generation: u64 },
    AccessMapSettled { generation: u64, present: bool },
}

impl LoadEvent {
    fn generation(&self) -> u64 {
        match self {
            LoadEvent::TokenObtained { generation }
            | LoadEvent::TokenUnavailable { generation }
            | LoadEvent::AccessMapSettled { generation, .. } => *generation,
        }
    }
}

/// Named re-run condition: reload iff the authenticated flag transitions
/// to true (from false, or from "never observed")
///
/// This narrowing is deliberate: identity snapshots update for many reasons,
/// but only an authentication transition invalidates the access map.
pub fn should_reload(previous: Option<bool>, current: bool) -> bool {
    current && previous != Some(true)
}

/// Machine state owned by the controller loop; mutated only there
struct Machine {
    last_authenticated: Option<bool>,
    generation: u64,
    phase: LoadPhase,
}

impl Machine {
    fn new() -> Self {
        Self {
            last_authenticated: None,
            generation: 0,
            phase: LoadPhase::Idle,
        }
    }

    /// Fold an identity snapshot into the machine; returns the generation of
    /// a load to start, if this snapshot fires the re-run condition
    fn observe_identity(&mut self, snapshot: &IdentitySnapshot) -> Option<u64> {
        // Non-terminal snapshots carry no trustworthy authenticated flag
        if !snapshot.is_terminal() || snapshot.error.is_some() {
            return None;
        }

        let previous = self.last_authenticated;
        self.last_authenticated = Some(snapshot.is_authenticated);

        if !snapshot.is_authenticated {
            if self.phase != LoadPhase::Idle {
                tracing::debug!("Authentication dropped, access-map state invalidated");
            }
            self.phase = LoadPhase::Idle;
            return None;
        }

        if should_reload(previous, snapshot.is_authenticated) {
            self.generation += 1;
            self.phase = LoadPhase::FetchingToken;
            tracing::info!(
                generation = self.generation,
                "Authenticated flag transition, loading access map"
            );
            Some(self.generation)
        } else {
            None
        }
    }

    /// Apply a load-task completion; events from superseded generations are
    /// discarded rather than applied
    fn apply_event(&mut self, event: LoadEvent) {
        if event.generation() != self.generation {
            tracing::debug!(
                event_generation = event.generation(),
                current_generation = self.generation,
                "Discarding stale load result"
            );
            return;
        }

        match event {
            LoadEvent::TokenObtained { .. } => {
                if self.phase == LoadPhase::FetchingToken {
                    self.phase = LoadPhase::LoadingAccessMap;
                }
            }
            LoadEvent::TokenUnavailable { .. } => {
                self.phase = LoadPhase::TokenUnavailable;
            }
            LoadEvent::AccessMapSettled { present, .. } => {
                self.phase = if present {
                    LoadPhase::Ready
                } else {
                    LoadPhase::Failed
                };
            }
        }
    }
}

/// Derive the rendering verdict; pure so the decision table is testable
/// without any provider wiring
fn derive_verdict(snapshot: &IdentitySnapshot, phase: LoadPhase) -> Verdict {
    if let Some(error) = &snapshot.error {
        return Verdict::ShowError(error.message.clone());
    }
    if snapshot.is_loading {
        return Verdict::ShowLoading;
    }
    if !snapshot.is_authenticated {
        // Routes render; per-route gating is the views' concern
        return Verdict::ShowApp;
    }
    match phase {
        // A stale map from a prior generation must not flicker to ShowApp,
        // so anything short of a settled current-generation load keeps loading
        LoadPhase::Idle | LoadPhase::FetchingToken | LoadPhase::LoadingAccessMap => {
            Verdict::ShowLoading
        }
        LoadPhase::TokenUnavailable => Verdict::ShowError(TOKEN_UNAVAILABLE_MESSAGE.to_string()),
        LoadPhase::Failed => Verdict::ShowError(ACCESS_MAP_FAILED_MESSAGE.to_string()),
        LoadPhase::Ready => Verdict::ShowApp,
    }
}

pub struct BootstrapController {
    identity: Arc<dyn IdentityProvider>,
    access: Arc<dyn AccessMapProvider>,
    service_url: String,
    verdict_tx: watch::Sender<Verdict>,
}

impl BootstrapController {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        access: Arc<dyn AccessMapProvider>,
        service_url: String,
    ) -> Self {
        Self {
            identity,
            access,
            service_url,
            verdict_tx: watch::Sender::new(Verdict::ShowLoading),
        }
    }

    /// Observe the rendering verdict; starts at `ShowLoading`
    pub fn subscribe(&self) -> watch::Receiver<Verdict> {
        self.verdict_tx.subscribe()
    }

    /// Drive the state machine until the identity provider goes away
    ///
    /// Single logical thread of control: identity updates and load-task
    /// completions are folded into the machine here and nowhere else.
    pub async fn run(&self) {
        let mut identity_rx = self.identity.subscribe();
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let mut machine = Machine::new();

        loop {
            let snapshot = identity_rx.borrow_and_update().clone();
            if let Some(generation) = machine.observe_identity(&snapshot) {
                self.spawn_load(generation, events_tx.clone());
            }
            self.publish(&snapshot, &machine);

            tokio::select! {
                changed = identity_rx.changed() => {
                    if changed.is_err() {
                        tracing::debug!("Identity provider dropped, bootstrap loop stopping");
                        break;
                    }
                }
                Some(event) = events_rx.recv() => {
                    machine.apply_event(event);
                }
            }
        }
    }

    fn publish(&self, snapshot: &IdentitySnapshot, machine: &Machine) {
        let verdict = derive_verdict(snapshot, machine.phase);
        self.verdict_tx.send_if_modified(|current| {
            if *current != verdict {
                tracing::debug!(verdict = ?verdict, "Bootstrap verdict changed");
                *current = verdict;
                true
            } else {
                false
            }
        });
    }

    /// Run the token exchange and access-map load off the control loop;
    /// completions come back as events tagged with the generation
    fn spawn_load(&self, generation: u64, events: mpsc::UnboundedSender<LoadEvent>) {
        let identity = Arc::clone(&self.identity);
        let access = Arc::clone(&self.access);
        let service_url = self.service_url.clone();

        tokio::spawn(async move {
            tracing::debug!(generation, "Requesting access token");

            let token = match identity.get_access_token_silently().await {
                Ok(Some(token)) if !token.is_empty() => token,
                Ok(_) => {
                    tracing::warn!(generation, "No access token available");
                    let _ = events.send(LoadEvent::TokenUnavailable { generation });
                    return;
                }
                Err(e) => {
                    tracing::warn!(generation, error = %e, "Access token request failed");
                    let _ = events.send(LoadEvent::TokenUnavailable { generation });
                    return;
                }
            };

            let _ = events.send(LoadEvent::TokenObtained { generation });

            access
                .init(InitParams {
                    service_url,
                    access_token: token,
                })
                .await;

            let present = access.subscribe().borrow().access_map.is_some();
            let _ = events.send(LoadEvent::AccessMapSettled {
                generation,
                present,
            });
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{AccessMap, AccessMapState};
    use crate::identity::IdentityError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::Semaphore;
    use tokio::time::timeout;

    // =========================================================================
    // Fakes (DI seam)
    // =========================================================================

    /// Identity fake with a fixed silent-token outcome and a call counter
    struct FakeIdentity {
        state_tx: watch::Sender<IdentitySnapshot>,
        token: Mutex<Result<Option<String>, String>>,
        token_calls: AtomicUsize,
    }

    impl FakeIdentity {
        fn new(token: Result<Option<String>, String>) -> Self {
            Self {
                state_tx: watch::Sender::new(IdentitySnapshot::default()),
                token: Mutex::new(token),
                token_calls: AtomicUsize::new(0),
            }
        }

        fn publish(&self, snapshot: IdentitySnapshot) {
            self.state_tx.send_replace(snapshot);
        }

        fn token_calls(&self) -> usize {
            self.token_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl IdentityProvider for FakeIdentity {
        fn subscribe(&self) -> watch::Receiver<IdentitySnapshot> {
            self.state_tx.subscribe()
        }

        async fn get_access_token_silently(&self) -> anyhow::Result<Option<String>> {
            self.token_calls.fetch_add(1, Ordering::SeqCst);
            match self.token.lock().unwrap().clone() {
                Ok(token) => Ok(token),
                Err(message) => Err(anyhow::anyhow!(message)),
            }
        }
    }

    /// Access-map fake; results are consumed in call order (last one
    /// repeats) and `gate` lets tests hold an init in flight
    struct FakeAccess {
        state_tx: watch::Sender<AccessMapState>,
        results: Mutex<Vec<Option<AccessMap>>>,
        init_calls: AtomicUsize,
        gate: Option<Semaphore>,
    }

    impl FakeAccess {
        fn new(result: Option<AccessMap>) -> Self {
            Self {
                state_tx: watch::Sender::new(AccessMapState::default()),
                results: Mutex::new(vec![result]),
                init_calls: AtomicUsize::new(0),
                gate: None,
            }
        }

        fn gated(results: Vec<Option<AccessMap>>) -> Self {
            Self {
                state_tx: watch::Sender::new(AccessMapState::default()),
                results: Mutex::new(results),
                init_calls: AtomicUsize::new(0),
                gate: Some(Semaphore::new(0)),
            }
        }

        fn release_one(&self) {
            if let Some(gate) = &self.gate {
                gate.add_permits(1);
            }
        }

        fn init_calls(&self) -> usize {
            self.init_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AccessMapProvider for FakeAccess {
        fn subscribe(&self) -> watch::Receiver<AccessMapState> {
            self.state_tx.subscribe()
        }

        async fn init(&self, _params: InitParams) {
            self.init_calls.fetch_add(1, Ordering::SeqCst);
            self.state_tx.send_replace(AccessMapState {
                loading: true,
                access_map: None,
            });

            if let Some(gate) = &self.gate {
                let permit = gate.acquire().await.unwrap();
                permit.forget();
            }

            let access_map = {
                let mut results = self.results.lock().unwrap();
                if results.len() > 1 {
                    results.remove(0)
                } else {
                    results[0].clone()
                }
            };
            self.state_tx.send_replace(AccessMapState {
                loading: false,
                access_map,
            });
        }
    }

    // =========================================================================
    // Harness
    // =========================================================================

    fn authenticated() -> IdentitySnapshot {
        IdentitySnapshot {
            is_loading: false,
            error: None,
            is_authenticated: true,
        }
    }

    fn unauthenticated() -> IdentitySnapshot {
        IdentitySnapshot {
            is_loading: false,
            error: None,
            is_authenticated: false,
        }
    }

    fn errored(message: &str) -> IdentitySnapshot {
        IdentitySnapshot {
            is_loading: false,
            error: Some(IdentityError::new(message)),
            is_authenticated: false,
        }
    }

    fn spawn_controller(
        identity: Arc<FakeIdentity>,
        access: Arc<FakeAccess>,
    ) -> watch::Receiver<Verdict> {
        let controller = Arc::new(BootstrapController::new(
            identity as Arc<dyn IdentityProvider>,
            access as Arc<dyn AccessMapProvider>,
            "http://localhost:3001".to_string(),
        ));
        let verdict_rx = controller.subscribe();
        tokio::spawn(async move { controller.run().await });
        verdict_rx
    }

    /// Let the controller loop drain pending updates; watch channels conflate
    /// rapid publishes, so tests must hand the loop the scheduler between them
    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    async fn expect_verdict(
        rx: &mut watch::Receiver<Verdict>,
        pred: impl FnMut(&Verdict) -> bool,
    ) -> Verdict {
        let verdict = timeout(Duration::from_secs(2), rx.wait_for(pred))
            .await
            .expect("timed out waiting for verdict")
            .expect("verdict sender dropped");
        (*verdict).clone()
    }

    // =========================================================================
    // Decision table (pure)
    // =========================================================================

    #[test]
    fn test_identity_error_wins_regardless_of_load_phase() {
        let snapshot = errored("token handshake exploded");
        for phase in [
            LoadPhase::Idle,
            LoadPhase::FetchingToken,
            LoadPhase::LoadingAccessMap,
            LoadPhase::Ready,
            LoadPhase::Failed,
        ] {
            assert_eq!(
                derive_verdict(&snapshot, phase),
                Verdict::ShowError("token handshake exploded".to_string())
            );
        }
    }

    #[test]
    fn test_loading_identity_shows_loading() {
        let snapshot = IdentitySnapshot::default();
        assert_eq!(
            derive_verdict(&snapshot, LoadPhase::Idle),
            Verdict::ShowLoading
        );
    }

    #[test]
    fn test_unauthenticated_shows_app() {
        assert_eq!(
            derive_verdict(&unauthenticated(), LoadPhase::Idle),
            Verdict::ShowApp
        );
    }

    #[test]
    fn test_authenticated_in_flight_shows_loading_never_stale_app() {
        // Even with a map from a prior generation around, an in-flight load
        // keeps the verdict at loading
        for phase in [
            LoadPhase::Idle,
            LoadPhase::FetchingToken,
            LoadPhase::LoadingAccessMap,
        ] {
            assert_eq!(
                derive_verdict(&authenticated(), phase),
                Verdict::ShowLoading
            );
        }
    }

    #[test]
    fn test_authenticated_terminal_phases() {
        assert_eq!(
            derive_verdict(&authenticated(), LoadPhase::Ready),
            Verdict::ShowApp
        );
        assert_eq!(
            derive_verdict(&authenticated(), LoadPhase::Failed),
            Verdict::ShowError(ACCESS_MAP_FAILED_MESSAGE.to_string())
        );
        assert_eq!(
            derive_verdict(&authenticated(), LoadPhase::TokenUnavailable),
            Verdict::ShowError(TOKEN_UNAVAILABLE_MESSAGE.to_string())
        );
    }

    #[test]
    fn test_should_reload_fires_only_on_transition_to_true() {
        assert!(should_reload(None, true));
        assert!(should_reload(Some(false), true));
        assert!(!should_reload(Some(true), true));
        assert!(!should_reload(None, false));
        assert!(!should_reload(Some(true), false));
        assert!(!should_reload(Some(false), false));
    }

    // =========================================================================
    // Machine (generation discard)
    // =========================================================================

    #[test]
    fn test_machine_discards_stale_generation_results() {
        let mut machine = Machine::new();

        assert_eq!(machine.observe_identity(&authenticated()), Some(1));
        machine.observe_identity(&unauthenticated());
        assert_eq!(machine.observe_identity(&authenticated()), Some(2));
        assert_eq!(machine.phase, LoadPhase::FetchingToken);

        // Generation-1 completions arrive late and must not be applied
        machine.apply_event(LoadEvent::AccessMapSettled {
            generation: 1,
            present: true,
        });
        assert_eq!(machine.phase, LoadPhase::FetchingToken);

        machine.apply_event(LoadEvent::TokenUnavailable { generation: 1 });
        assert_eq!(machine.phase, LoadPhase::FetchingToken);

        // The current generation still lands
        machine.apply_event(LoadEvent::TokenObtained { generation: 2 });
        assert_eq!(machine.phase, LoadPhase::LoadingAccessMap);
        machine.apply_event(LoadEvent::AccessMapSettled {
            generation: 2,
            present: true,
        });
        assert_eq!(machine.phase, LoadPhase::Ready);
    }

    #[test]
    fn test_machine_non_terminal_snapshot_records_nothing() {
        let mut machine = Machine::new();
        assert_eq!(machine.observe_identity(&IdentitySnapshot::default()), None);
        assert_eq!(machine.last_authenticated, None);

        // The false-while-loading flag must not eat the later transition
        assert_eq!(machine.observe_identity(&authenticated()), Some(1));
    }

    // =========================================================================
    // End-to-end controller behavior (fakes)
    // =========================================================================

    #[tokio::test]
    async fn test_initial_verdict_is_loading() {
        let identity = Arc::new(FakeIdentity::new(Ok(Some("tok".to_string()))));
        let access = Arc::new(FakeAccess::new(Some(AccessMap::default())));
        let verdict_rx = spawn_controller(identity, access);
        assert_eq!(*verdict_rx.borrow(), Verdict::ShowLoading);
    }

    #[tokio::test]
    async fn test_identity_error_is_surfaced_verbatim() {
        let identity = Arc::new(FakeIdentity::new(Ok(Some("tok".to_string()))));
        let access = Arc::new(FakeAccess::new(Some(AccessMap::default())));
        let mut verdict_rx = spawn_controller(identity.clone(), access.clone());

        identity.publish(errored("identity provider unreachable"));

        let verdict =
            expect_verdict(&mut verdict_rx, |v| matches!(v, Verdict::ShowError(_))).await;
        assert_eq!(
            verdict,
            Verdict::ShowError("identity provider unreachable".to_string())
        );
        // Terminal: no load was ever started
        assert_eq!(identity.token_calls(), 0);
        assert_eq!(access.init_calls(), 0);
    }

    #[tokio::test]
    async fn test_unauthenticated_shows_app_without_any_requests() {
        let identity = Arc::new(FakeIdentity::new(Ok(Some("tok".to_string()))));
        let access = Arc::new(FakeAccess::new(Some(AccessMap::default())));
        let mut verdict_rx = spawn_controller(identity.clone(), access.clone());

        identity.publish(unauthenticated());

        let verdict = expect_verdict(&mut verdict_rx, |v| *v == Verdict::ShowApp).await;
        assert_eq!(verdict, Verdict::ShowApp);
        assert_eq!(identity.token_calls(), 0);
        assert_eq!(access.init_calls(), 0);
    }

    #[tokio::test]
    async fn test_authenticated_happy_path_issues_one_request_each() {
        let identity = Arc::new(FakeIdentity::new(Ok(Some("tok".to_string()))));
        // An empty map is still a loaded map
        let access = Arc::new(FakeAccess::new(Some(AccessMap::default())));
        let mut verdict_rx = spawn_controller(identity.clone(), access.clone());

        identity.publish(authenticated());

        let verdict = expect_verdict(&mut verdict_rx, |v| *v == Verdict::ShowApp).await;
        assert_eq!(verdict, Verdict::ShowApp);
        assert_eq!(identity.token_calls(), 1);
        assert_eq!(access.init_calls(), 1);
    }

    #[tokio::test]
    async fn test_access_map_failure_yields_fixed_error_message() {
        let identity = Arc::new(FakeIdentity::new(Ok(Some("tok".to_string()))));
        let access = Arc::new(FakeAccess::new(None));
        let mut verdict_rx = spawn_controller(identity.clone(), access.clone());

        identity.publish(authenticated());

        let verdict =
            expect_verdict(&mut verdict_rx, |v| matches!(v, Verdict::ShowError(_))).await;
        assert_eq!(
            verdict,
            Verdict::ShowError(ACCESS_MAP_FAILED_MESSAGE.to_string())
        );
        assert_eq!(access.init_calls(), 1);
    }

    #[tokio::test]
    async fn test_absent_token_is_an_error_not_indefinite_loading() {
        let identity = Arc::new(FakeIdentity::new(Ok(None)));
        let access = Arc::new(FakeAccess::new(Some(AccessMap::default())));
        let mut verdict_rx = spawn_controller(identity.clone(), access.clone());

        identity.publish(authenticated());

        let verdict =
            expect_verdict(&mut verdict_rx, |v| matches!(v, Verdict::ShowError(_))).await;
        assert_eq!(
            verdict,
            Verdict::ShowError(TOKEN_UNAVAILABLE_MESSAGE.to_string())
        );
        // The access map is never requested without a token
        assert_eq!(access.init_calls(), 0);
    }

    #[tokio::test]
    async fn test_failed_token_request_is_treated_as_unavailable() {
        let identity = Arc::new(FakeIdentity::new(Err("token endpoint 500".to_string())));
        let access = Arc::new(FakeAccess::new(Some(AccessMap::default())));
        let mut verdict_rx = spawn_controller(identity.clone(), access.clone());

        identity.publish(authenticated());

        let verdict =
            expect_verdict(&mut verdict_rx, |v| matches!(v, Verdict::ShowError(_))).await;
        assert_eq!(
            verdict,
            Verdict::ShowError(TOKEN_UNAVAILABLE_MESSAGE.to_string())
        );
        assert_eq!(access.init_calls(), 0);
    }

    #[tokio::test]
    async fn test_repeated_snapshots_do_not_retrigger_requests() {
        let identity = Arc::new(FakeIdentity::new(Ok(Some("tok".to_string()))));
        let access = Arc::new(FakeAccess::new(Some(AccessMap::default())));
        let mut verdict_rx = spawn_controller(identity.clone(), access.clone());

        identity.publish(authenticated());
        expect_verdict(&mut verdict_rx, |v| *v == Verdict::ShowApp).await;

        // Same snapshot again: a wake-up without an authenticated transition
        identity.publish(authenticated());
        settle().await;
        identity.publish(authenticated());
        settle().await;

        // Force an observable verdict change so we know the loop has caught up
        identity.publish(errored("done"));
        expect_verdict(&mut verdict_rx, |v| matches!(v, Verdict::ShowError(_))).await;

        assert_eq!(identity.token_calls(), 1);
        assert_eq!(access.init_calls(), 1);
    }

    #[tokio::test]
    async fn test_relogin_reloads_once_per_transition() {
        let identity = Arc::new(FakeIdentity::new(Ok(Some("tok".to_string()))));
        let access = Arc::new(FakeAccess::new(Some(AccessMap::default())));
        let mut verdict_rx = spawn_controller(identity.clone(), access.clone());

        identity.publish(authenticated());
        expect_verdict(&mut verdict_rx, |v| *v == Verdict::ShowApp).await;

        identity.publish(unauthenticated());
        settle().await;
        identity.publish(authenticated());
        expect_verdict(&mut verdict_rx, |v| *v == Verdict::ShowApp).await;

        // Wait for the second load to fully settle before counting
        timeout(Duration::from_secs(2), async {
            while access.init_calls() < 2 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("second access-map load never issued");

        assert_eq!(identity.token_calls(), 2);
        assert_eq!(access.init_calls(), 2);
    }

    #[tokio::test]
    async fn test_stale_in_flight_load_is_discarded_on_relogin() {
        let identity = Arc::new(FakeIdentity::new(Ok(Some("tok".to_string()))));
        // First load would fail, second succeeds; only the second may count
        let access = Arc::new(FakeAccess::gated(vec![None, Some(AccessMap::default())]));
        let mut verdict_rx = spawn_controller(identity.clone(), access.clone());

        identity.publish(authenticated());

        // First init in flight (blocked on the gate); flip auth underneath it
        timeout(Duration::from_secs(2), async {
            while access.init_calls() < 1 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("first access-map load never issued");

        identity.publish(unauthenticated());
        expect_verdict(&mut verdict_rx, |v| *v == Verdict::ShowApp).await;
        settle().await;
        identity.publish(authenticated());

        timeout(Duration::from_secs(2), async {
            while access.init_calls() < 2 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("second access-map load never issued");

        // Let the stale generation-1 load (failure) complete first, then the
        // current one; the failure must be discarded, not rendered
        access.release_one();
        tokio::time::sleep(Duration::from_millis(20)).await;
        access.release_one();

        let verdict = expect_verdict(&mut verdict_rx, |v| *v == Verdict::ShowApp).await;
        assert_eq!(verdict, Verdict::ShowApp);
        assert_eq!(
            *verdict_rx.borrow(),
            Verdict::ShowApp,
            "stale failed load leaked into the verdict"
        );
    }
}
