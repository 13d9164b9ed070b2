//! Director Core - shared library for the live auto-director.
//!
//! This crate implements the camera-selection and narration pipeline for a
//! multi-camera, multi-microphone production room: per-camera feature
//! scoring, a switching decision engine with hysteresis/cooldown/anti-ping-pong
//! policy, and a narration orchestrator that voices each switch. It is
//! designed to be embedded by the standalone headless server in
//! `apps/director-server`, or by any other host that can supply a
//! [`TaskSpawner`](runtime::TaskSpawner) and a media source.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`model`]: Shared data types (camera ids, observations, scores, decisions)
//! - [`ingress`]: Media room adapter; converts participant streams into
//!   canonical per-camera frame/audio channels
//! - [`analyzers`]: Capability traits (Detector, Tracker, SceneDescriber,
//!   SpeechRecognizer) plus deterministic reference implementations
//! - [`services`]: The long-lived pipeline tasks — sampler, ranker, decision
//!   engine, narration orchestrator — and the state each reads or writes
//! - [`bus`]: In-process pub/sub fanning pipeline events out to subscribers
//! - [`state`]: Configuration and policy types
//! - [`error`]: Centralized error type
//! - [`runtime`]: Task spawning abstraction for async runtime independence
//! - [`bootstrap`]: Composition root wiring every component together
//! - [`api`]: HTTP + WebSocket control/read surface
//!
//! # Abstraction Traits
//!
//! The crate defines several traits to decouple pipeline logic from
//! concrete implementations, so a host can swap any one of them without
//! touching the rest of the pipeline:
//!
//! - [`TaskSpawner`](runtime::TaskSpawner): spawning background tasks
//! - [`MediaRoom`](ingress::MediaRoom): the upstream media source
//! - [`analyzers::Detector`] / [`analyzers::Tracker`] / [`analyzers::SceneDescriber`]
//!   / [`analyzers::SpeechRecognizer`]: per-modality analysis
//! - [`services::TtsBackend`]: narration speech synthesis
//! - [`bus::BusEmitter`]: pipeline event sinks

#![warn(clippy::all)]

pub mod analyzers;
pub mod api;
pub mod bootstrap;
pub mod bus;
pub mod director_constants;
pub mod error;
pub mod ingress;
pub mod model;
pub mod runtime;
pub mod services;
pub mod state;
pub mod utils;

// Re-export commonly used types at the crate root.
pub use analyzers::AnalyzerRegistry;
pub use bootstrap::{bootstrap, BootstrappedServices};
pub use bus::{BroadcastBusBridge, BusEmitter, BusEvent};
pub use error::{DirectorError, DirectorResult, ErrorCode};
pub use ingress::{MediaIngressAdapter, MediaRoom, MockMediaRoom};
pub use model::{
    CameraFeatures, CameraId, CameraScore, DecisionAction, Narration, Observation, SwitchDecision,
};
pub use runtime::{TaskSpawner, TokioSpawner};
pub use state::{Config, ProgramState, SwitchPolicy, WeightConfig};

// Re-export API types.
pub use api::{start_server, AppState, AppStateBuilder, ServerError};
