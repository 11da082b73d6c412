//! Round Controller.
//!
//! Drives the input peer through its time slots:
//! 1. Wait for the privacy-peer quorum and activate the connections.
//! 2. Start a fresh [`RoundContext`]: sorted peers, dataset, shares, barrier
//!    and aggregator.
//! 3. Spawn one session per privacy peer.
//! 4. Collect final results until the aggregator reports completion, notify
//!    observers and write the round's output.
//! 5. Advance to the next slot, or terminate and stop all sessions.
//!
//! A round whose data cannot be loaded or shared halts without spawning any
//! session and without advancing the slot; calling [`RoundController::run`]
//! again retries it.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;
use std::sync::Arc;

use tokio::sync::{mpsc, Barrier};
use tokio::task::JoinHandle;

use crate::config::{ConfigError, IdrConfig};
use crate::dataset::TopologyDataset;
use crate::mpc::{SecretSplitter, ShamirSharing};
use crate::net::{ConnectionManager, NetError};
use crate::output::{self, OutputError};
use crate::protocol::messaging::{PeerId, SessionMessage};
use crate::protocol::state_machine::RoundState;
use crate::protocol::{ProtocolError, ResultAggregator, RoundCompletion, RoundObserver, RoundStateMachine};
use crate::session::{SessionContext, SessionFactory, StopFlag};
use crate::shares::{self, ShareFamily};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerError {
    Config(ConfigError),
    Net(NetError),
    Protocol(ProtocolError),
    Output(OutputError),
    /// `run` called before `initialize`.
    NotInitialized,
    /// The round could not start; the slot was not advanced.
    RoundHalted { time_slot: u32, reason: String },
    /// Every session ended before all final results arrived.
    SessionsLost { time_slot: u32, pending: usize },
}

impl fmt::Display for ControllerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerError::Config(e) => write!(f, "Config error: {}", e),
            ControllerError::Net(e) => write!(f, "Network error: {}", e),
            ControllerError::Protocol(e) => write!(f, "Protocol error: {}", e),
            ControllerError::Output(e) => write!(f, "Output error: {}", e),
            ControllerError::NotInitialized => write!(f, "Controller not initialized"),
            ControllerError::RoundHalted { time_slot, reason } => {
                write!(f, "Round {} halted: {}", time_slot, reason)
            }
            ControllerError::SessionsLost { time_slot, pending } => write!(
                f,
                "Sessions of round {} ended with {} final results missing",
                time_slot, pending
            ),
        }
    }
}

impl std::error::Error for ControllerError {}

impl From<ConfigError> for ControllerError {
    fn from(e: ConfigError) -> Self {
        ControllerError::Config(e)
    }
}

impl From<NetError> for ControllerError {
    fn from(e: NetError) -> Self {
        ControllerError::Net(e)
    }
}

impl From<ProtocolError> for ControllerError {
    fn from(e: ProtocolError) -> Self {
        ControllerError::Protocol(e)
    }
}

impl From<OutputError> for ControllerError {
    fn from(e: OutputError) -> Self {
        ControllerError::Output(e)
    }
}

/// State owned by one round. Rebuilt from scratch every time slot.
#[derive(Debug)]
pub struct RoundContext {
    pub time_slot: u32,
    /// Active privacy peers, sorted; a peer's position is its local index.
    pub peers: Vec<PeerId>,
    pub dataset: Arc<TopologyDataset>,
    pub shares: ShareFamily,
    pub barrier: Arc<Barrier>,
    pub aggregator: ResultAggregator,
}

impl RoundContext {
    pub fn new(time_slot: u32, peers: Vec<PeerId>, dataset: Arc<TopologyDataset>, shares: ShareFamily) -> Self {
        let n = peers.len();
        Self {
            time_slot,
            peers,
            dataset,
            shares,
            barrier: Arc::new(Barrier::new(n)),
            aggregator: ResultAggregator::new(time_slot, n),
        }
    }
}

pub struct RoundController {
    config: IdrConfig,
    connections: Arc<dyn ConnectionManager>,
    splitter: Box<dyn SecretSplitter>,
    sessions: Arc<dyn SessionFactory>,
    state: RoundStateMachine,
    time_slot: u32,
    stop: StopFlag,
    handles: Vec<JoinHandle<()>>,
}

impl RoundController {
    pub fn new(
        config: IdrConfig,
        connections: Arc<dyn ConnectionManager>,
        splitter: Box<dyn SecretSplitter>,
        sessions: Arc<dyn SessionFactory>,
    ) -> Result<Self, ControllerError> {
        config.validate()?;
        Ok(Self {
            config,
            connections,
            splitter,
            sessions,
            state: RoundStateMachine::new(),
            time_slot: 0,
            stop: StopFlag::new(),
            handles: Vec::new(),
        })
    }

    /// Controller sharing with [`ShamirSharing`] as configured.
    pub fn with_shamir(
        config: IdrConfig,
        connections: Arc<dyn ConnectionManager>,
        sessions: Arc<dyn SessionFactory>,
    ) -> Result<Self, ControllerError> {
        let splitter = ShamirSharing::new(&config.splitter_config()?);
        Self::new(config, connections, Box::new(splitter), sessions)
    }

    pub fn add_observer(&mut self, observer: Arc<dyn RoundObserver>) {
        self.state.add_observer(observer);
    }

    /// Starts counting time slots at 1.
    pub fn initialize(&mut self) {
        self.time_slot = 1;
        log::info!(
            "Input peer initialized: {} time slots, quorum {}, M = {}, randomness {}",
            self.config.time_slot_count,
            self.config.min_privacy_peers,
            self.config.classification_margin,
            self.config.randomness.label()
        );
    }

    pub fn current_time_slot(&self) -> u32 {
        self.time_slot
    }

    pub fn state(&self) -> RoundState {
        self.state.state()
    }

    pub fn stop_flag(&self) -> StopFlag {
        self.stop.clone()
    }

    pub fn config(&self) -> &IdrConfig {
        &self.config
    }

    /// Runs rounds until the last time slot completes.
    pub async fn run(&mut self) -> Result<(), ControllerError> {
        if self.time_slot == 0 {
            return Err(ControllerError::NotInitialized);
        }
        while self.state.state() != RoundState::Terminated {
            self.connections.wait_for_connections().await?;
            self.connections.activate_temporary_connections();
            if self.state.state() == RoundState::Idle {
                self.state.connections_ready()?;
            }

            let (ctx, completion) = self.run_round().await?;
            self.finish_round(&ctx, &completion)?;

            if self.time_slot < self.config.time_slot_count {
                self.time_slot += 1;
            } else {
                self.terminate().await?;
            }
        }
        Ok(())
    }

    async fn run_round(&mut self) -> Result<(RoundContext, RoundCompletion), ControllerError> {
        let mut peers = self.connections.active_peers(true);
        peers.sort();

        self.state.dataset_loaded()?;
        log::info!("Starting round {} with {} privacy peers", self.time_slot, peers.len());

        let mut ctx = self.prepare_round(peers)?;
        self.handles.retain(|h| !h.is_finished());

        let (tx, mut rx) = mpsc::unbounded_channel::<SessionMessage>();
        for (index, peer) in ctx.peers.iter().enumerate() {
            let peer_shares = match ctx.shares.for_peer(index) {
                Some(s) => Arc::new(s),
                None => return Err(self.halt(alloc::format!("no shares for peer {}", peer))),
            };
            let session = SessionContext::new(
                index,
                peer.clone(),
                ctx.time_slot,
                peer_shares,
                ctx.dataset.clone(),
                ctx.barrier.clone(),
                tx.clone(),
                self.stop.clone(),
            );
            self.handles.push(tokio::spawn(self.sessions.spawn_session(session)));
        }
        drop(tx);
        self.state.sessions_running()?;
        self.state.awaiting_results()?;

        while let Some(msg) = rx.recv().await {
            match ctx.aggregator.on_notification(msg) {
                Ok(Some(completion)) => return Ok((ctx, completion)),
                Ok(None) => {}
                Err(e) => {
                    log::error!("Round {}: {}", ctx.time_slot, e);
                    for obs in self.state.observers() {
                        obs.on_protocol_error(&e);
                    }
                }
            }
        }

        let pending = ctx.aggregator.pending();
        log::error!("Round {}: sessions ended with {} results pending", ctx.time_slot, pending);
        Err(ControllerError::SessionsLost {
            time_slot: ctx.time_slot,
            pending,
        })
    }

    /// Loads the dataset and generates every peer's shares.
    fn prepare_round(&mut self, peers: Vec<PeerId>) -> Result<RoundContext, ControllerError> {
        if peers.is_empty() {
            return Err(self.halt(String::from("no active privacy peers")));
        }

        let dataset = match TopologyDataset::load(&self.config.input_path, &self.config.topology_path) {
            Ok(d) => Arc::new(d),
            Err(e) => return Err(self.halt(alloc::format!("dataset load failed: {}", e))),
        };

        // Share generation runs under a provisional transition; any failure
        // drops it back to DatasetLoaded before the round halts.
        let generated = {
            let transition = self.state.begin_share_generation()?;
            self.splitter.set_peer_count(peers.len());
            let family = self
                .splitter
                .init()
                .map_err(|e| alloc::format!("splitter init failed: {}", e))
                .and_then(|()| {
                    shares::generate(
                        &dataset,
                        self.splitter.as_mut(),
                        peers.len(),
                        self.config.classification_margin,
                    )
                    .map_err(|e| alloc::format!("share generation failed: {}", e))
                });
            if family.is_ok() {
                transition.commit();
            }
            family
        };
        let family = match generated {
            Ok(f) => f,
            Err(reason) => return Err(self.halt(reason)),
        };

        Ok(RoundContext::new(self.time_slot, peers, dataset, family))
    }

    fn halt(&mut self, reason: String) -> ControllerError {
        log::error!("Halting round {}: {}", self.time_slot, reason);
        if let Err(e) = self.state.halt() {
            log::warn!("{}", e);
        }
        ControllerError::RoundHalted {
            time_slot: self.time_slot,
            reason,
        }
    }

    fn finish_round(&self, ctx: &RoundContext, completion: &RoundCompletion) -> Result<(), ControllerError> {
        let event = completion.to_event();
        for obs in self.state.observers() {
            obs.on_final_result(&event);
        }

        let (_, text) = output::write_round(
            &self.config.output_folder,
            ctx.time_slot,
            ctx.dataset.nodes(),
            &event.payload,
        )?;
        println!("{}", text);
        Ok(())
    }

    async fn terminate(&mut self) -> Result<(), ControllerError> {
        self.state.terminate()?;
        self.stop.stop();
        log::info!("Last time slot done, stopping {} sessions", self.handles.len());
        for res in futures::future::join_all(self.handles.drain(..)).await {
            if let Err(e) = res {
                log::warn!("Session task failed: {}", e);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entropy::Randomness;
    use crate::net::{PeerRegistry, PeerRole};
    use crate::protocol::messaging::{FinalResult, IdrMessage, Route};
    use crate::protocol::FinalResultEvent;
    use futures::future::BoxFuture;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const TWO_NODES: &str = "\
nitems = 2
Destination = 200
1_peerID = 100
1_peerType = 1
1_customers = 200
1_peers =
1_providers =
1_200 = 200
2_peerID = 200
2_peerType = 0
";

    const TOPOLOGY: &str = "100 = 200\n200 =\n";

    struct Fixture {
        dir: PathBuf,
        config: IdrConfig,
    }

    impl Fixture {
        fn new(name: &str, slots: u32) -> Self {
            let dir = std::env::temp_dir().join(format!("idr_controller_{}_{}", name, std::process::id()));
            let _ = std::fs::remove_dir_all(&dir);
            std::fs::create_dir_all(&dir).unwrap();
            std::fs::write(dir.join("input.txt"), TWO_NODES).unwrap();
            std::fs::write(dir.join("topology.txt"), TOPOLOGY).unwrap();

            let config = IdrConfig {
                input_path: dir.join("input.txt").to_string_lossy().into_owned(),
                topology_path: dir.join("topology.txt").to_string_lossy().into_owned(),
                output_folder: dir.join("out").to_string_lossy().into_owned(),
                time_slot_count: slots,
                min_privacy_peers: 3,
                degree_t: Some(1),
                randomness: Randomness::Seeded([9u8; 32]),
                ..IdrConfig::default()
            };
            Self { dir, config }
        }

        fn output(&self, slot: u32) -> PathBuf {
            output::artifact_path(&self.config.output_folder, slot)
        }
    }

    impl Drop for Fixture {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.dir);
        }
    }

    fn registry() -> Arc<PeerRegistry> {
        let registry = Arc::new(PeerRegistry::new(3));
        for id in ["pp3", "pp1", "pp2"] {
            registry.connect(PeerId::new(id), PeerRole::PrivacyPeer).unwrap();
        }
        registry
    }

    /// Peer 0 answers with a route for every node, the others with nothing.
    /// With `chatty`, every session first sends a stray hello.
    #[derive(Default)]
    struct ScriptedSessions {
        spawned: AtomicUsize,
        chatty: bool,
    }

    impl SessionFactory for ScriptedSessions {
        fn spawn_session(&self, ctx: SessionContext) -> BoxFuture<'static, ()> {
            self.spawned.fetch_add(1, Ordering::SeqCst);
            let chatty = self.chatty;
            Box::pin(async move {
                assert_eq!(ctx.shares.peer_index, ctx.local_index);
                assert_eq!(ctx.shares.classification.len(), ctx.dataset.node_count());
                ctx.synchronize().await;
                if chatty {
                    let _ = ctx.report(IdrMessage::Hello);
                }
                let message = if ctx.local_index == 0 {
                    let routes = ctx
                        .dataset
                        .nodes()
                        .iter()
                        .map(|n| Route {
                            as_path_length: if n.is_destination { 0 } else { 1 },
                            next_hop: ctx.dataset.destination(),
                        })
                        .collect();
                    IdrMessage::FinalResult(Some(FinalResult::new(routes)))
                } else if ctx.local_index == 1 {
                    IdrMessage::Dummy
                } else {
                    IdrMessage::FinalResult(None)
                };
                let _ = ctx.report(message);
            })
        }
    }

    #[derive(Default)]
    struct Recorder {
        loaded: AtomicUsize,
        generated: AtomicUsize,
        events: Mutex<Vec<FinalResultEvent>>,
        errors: Mutex<Vec<ProtocolError>>,
    }

    impl RoundObserver for Recorder {
        fn on_state_change(&self, _from: RoundState, to: RoundState) {
            if to == RoundState::DatasetLoaded {
                self.loaded.fetch_add(1, Ordering::SeqCst);
            }
            if to == RoundState::SharesGenerated {
                self.generated.fetch_add(1, Ordering::SeqCst);
            }
        }

        fn on_final_result(&self, event: &FinalResultEvent) {
            self.events.lock().unwrap().push(event.clone());
        }

        fn on_protocol_error(&self, error: &ProtocolError) {
            self.errors.lock().unwrap().push(error.clone());
        }
    }

    fn controller(fx: &Fixture, sessions: Arc<ScriptedSessions>) -> (RoundController, Arc<Recorder>) {
        let mut ctrl = RoundController::with_shamir(fx.config.clone(), registry(), sessions).unwrap();
        let recorder = Arc::new(Recorder::default());
        ctrl.add_observer(recorder.clone());
        ctrl.initialize();
        (ctrl, recorder)
    }

    #[tokio::test]
    async fn test_two_node_round() {
        let fx = Fixture::new("two_node", 1);
        let sessions = Arc::new(ScriptedSessions::default());
        let (mut ctrl, recorder) = controller(&fx, sessions.clone());

        ctrl.run().await.unwrap();

        assert_eq!(ctrl.state(), RoundState::Terminated);
        assert!(ctrl.stop_flag().is_stopped());
        assert_eq!(sessions.spawned.load(Ordering::SeqCst), 3);

        let text = std::fs::read_to_string(fx.output(1)).unwrap();
        assert_eq!(text.matches("Route for domain").count(), 2);
        assert!(text.starts_with("Route for domain 100:\nAS_PATH Length: 1\nNextHop: 200\n"));

        let events = recorder.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert!(events[0].has_result);
        assert!(events[0].verification_successful);
        assert_eq!(events[0].time_slot, 1);
    }

    #[tokio::test]
    async fn test_advances_through_every_slot() {
        let fx = Fixture::new("slots", 3);
        let sessions = Arc::new(ScriptedSessions::default());
        let (mut ctrl, recorder) = controller(&fx, sessions.clone());

        ctrl.run().await.unwrap();

        assert_eq!(recorder.loaded.load(Ordering::SeqCst), 3);
        assert_eq!(ctrl.current_time_slot(), 3);
        assert_eq!(sessions.spawned.load(Ordering::SeqCst), 9);
        for slot in 1..=3 {
            assert!(fx.output(slot).exists());
        }
        assert!(!fx.output(4).exists());
    }

    #[tokio::test]
    async fn test_missing_source_halts_round() {
        let mut fx = Fixture::new("missing", 2);
        fx.config.input_path = fx.dir.join("absent.txt").to_string_lossy().into_owned();
        let sessions = Arc::new(ScriptedSessions::default());
        let (mut ctrl, recorder) = controller(&fx, sessions.clone());

        let err = ctrl.run().await.unwrap_err();
        assert!(matches!(err, ControllerError::RoundHalted { time_slot: 1, .. }));
        assert_eq!(ctrl.state(), RoundState::Halted);
        assert_eq!(ctrl.current_time_slot(), 1);
        assert_eq!(sessions.spawned.load(Ordering::SeqCst), 0);
        assert!(!fx.output(1).exists());
        assert!(recorder.events.lock().unwrap().is_empty());

        // Retry once the data is there.
        std::fs::write(fx.dir.join("absent.txt"), TWO_NODES).unwrap();
        ctrl.run().await.unwrap();
        assert!(fx.output(1).exists());
        assert!(fx.output(2).exists());
    }

    #[tokio::test]
    async fn test_split_failure_halts_round() {
        let mut fx = Fixture::new("split_failure", 1);
        // Degree 3 needs at least 4 privacy peers.
        fx.config.degree_t = Some(3);
        let sessions = Arc::new(ScriptedSessions::default());
        let (mut ctrl, recorder) = controller(&fx, sessions.clone());

        let err = ctrl.run().await.unwrap_err();
        assert!(matches!(err, ControllerError::RoundHalted { time_slot: 1, .. }));
        assert_eq!(ctrl.state(), RoundState::Halted);
        assert_eq!(ctrl.current_time_slot(), 1);
        assert_eq!(recorder.generated.load(Ordering::SeqCst), 0);
        assert_eq!(sessions.spawned.load(Ordering::SeqCst), 0);
        assert!(!fx.output(1).exists());
    }

    #[tokio::test]
    async fn test_protocol_violations_are_reported() {
        let fx = Fixture::new("violations", 1);
        let sessions = Arc::new(ScriptedSessions {
            chatty: true,
            ..ScriptedSessions::default()
        });
        let (mut ctrl, recorder) = controller(&fx, sessions);

        ctrl.run().await.unwrap();

        let errors = recorder.errors.lock().unwrap();
        assert_eq!(errors.len(), 3);
        assert!(errors
            .iter()
            .all(|e| matches!(e, ProtocolError::UnexpectedMessage { .. })));
        assert_eq!(recorder.events.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_run_requires_initialize() {
        let fx = Fixture::new("uninit", 1);
        let mut ctrl =
            RoundController::with_shamir(fx.config.clone(), registry(), Arc::new(ScriptedSessions::default())).unwrap();
        assert_eq!(ctrl.run().await, Err(ControllerError::NotInitialized));
    }
}
