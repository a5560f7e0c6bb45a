//! appsim — drives a web app with model-generated user interactions.
//!
//! One run is a single forward pass: the generator predicts a batch of
//! interactions from historical sessions, the simulator replays it against a
//! dispatch target, analytics summarizes the captured state and the
//! visualizer turns the summary into a chart definition.

pub mod analytics;
pub mod app;
pub mod config;
pub mod error;
pub mod features;
pub mod generator;
pub mod history;
pub mod network;
pub mod pipeline;
pub mod predictor;
pub mod simulator;
pub mod snapshot;
pub mod target;
pub mod types;
pub mod visualize;

pub use analytics::{AnalyticsEngine, AnalyticsSummary, TimelinePoint};
pub use app::SimulatedApp;
pub use config::{resolve_decode, Config};
pub use error::{PipelineError, SimError, Stage};
pub use features::{FeatureVector, FEATURE_ARITY};
pub use generator::{DecodePolicy, GeneratorConfig, InteractionGenerator};
pub use history::{HistoryProfile, HistoryRow, HistorySource, InteractionHistory};
pub use network::{Activation, DenseLayer, DenseNetwork};
pub use pipeline::{Pipeline, PipelineRun, ReplayRun};
pub use predictor::{Distribution, MarkovPredictor, Predictor};
pub use simulator::AppSimulator;
pub use snapshot::{RunOutcome, RunRecord};
pub use target::{DispatchError, DispatchTarget, EchoTarget, HttpTarget};
pub use types::{
    AppResponse, AppState, ElementKind, ElementState, EventType, InteractionBatch,
    InteractionValue, LoggedEvent, UserInteraction,
};
pub use visualize::{ChartArtifact, ChartKind, DataPoint, Series, Visualizer};
