pub mod bus;
pub mod config;
pub mod directory;
pub mod metrics;
pub mod mirror;
pub mod orchestrator;
pub mod task;
pub mod testing;
pub mod transcoder;

pub use bus::{EventTemplate, Filter, MessageBus, SignedEvent, Signer, Subscription, Tag};
pub use config::{load_config, load_config_from_str, validate_config, Config, ConfigError, RelayConfig};
pub use directory::{WorkerDirectory, WorkerProfile};
pub use mirror::{Mirror, MirroredArtifact};
pub use orchestrator::{
    OrchestratorConfig, StartRequest, TaskEvent, TranscodeOrchestrator,
};
pub use task::{
    Artifact, Quality, SqliteTaskStore, Task, TaskPatch, TaskStatus, TaskStore, TranscodeState,
};
pub use transcoder::JobClient;
