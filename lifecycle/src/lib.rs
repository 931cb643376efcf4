//! # Courier Lifecycle Library
//!
//! Bootstrap and lifecycle control for the Courier messaging client. The
//! library sequences startup from an authenticated session to a loaded
//! interface, keeps a single authoritative instance per session, maps
//! startup failures to recovery actions and runs logout, refresh and
//! update requests once the app is ready.
//!
//! ## Modules
//!
//! - [`orchestrator`] - Startup state machine and its stages
//! - [`single_instance`] - Claiming and releasing the session slot
//! - [`failure`] - Failure classification and recovery
//! - [`controller`] - Logout, refresh, update and login redirection
//! - [`sign_out`] - Sign-out reasons and their classes
//! - [`collaborators`] - Contracts of the injected external services
//! - [`events`] - Lifecycle event bus
//! - [`platform`] - Online/offline and unload signals
//! - [`connectivity`] - Reacting to connectivity changes after startup
//! - [`progress`] - Loading progress checkpoints
//! - [`telemetry`] - Startup timings and statistics
//! - [`launch`] - Facts about how the page was opened
//! - [`taskpool`] - Cancellable background listeners
//! - [`config`] - Configuration loading and validation
//! - [`logger`] - Global logger setup
//! - [`error`] - Startup error types
//! - [`model`] - Domain snapshots read from collaborators

pub mod collaborators;
pub mod config;
pub mod connectivity;
pub mod controller;
pub mod error;
pub mod events;
pub mod failure;
pub mod launch;
pub mod logger;
pub mod model;
pub mod orchestrator;
pub mod platform;
pub mod progress;
pub mod sign_out;
pub mod single_instance;
pub mod taskpool;
pub mod telemetry;

pub use collaborators::Collaborators;
pub use config::{LifecycleConfig, load_config};
pub use controller::LifecycleController;
pub use error::StartupError;
pub use events::{EventBus, LifecycleEvent};
pub use failure::{FailureClassifier, RecoveryAction};
pub use orchestrator::{InitOutcome, InitState, InitializationOrchestrator};
pub use sign_out::{SignOutClass, SignOutReason};
pub use single_instance::{InstanceRegistry, SingleInstanceCoordinator};
