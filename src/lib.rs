pub mod config;
pub mod engine;
pub mod errors;
pub mod input;
pub mod models;
pub mod server;
pub mod state;

// Re-export commonly used types
pub use config::{AppConfig, RunConfig, RunOverrides, UnknownTypePolicy, VolScenario};
pub use engine::{RankingReport, RunParameters, RunSummary};
pub use errors::{EngineError, EngineResult};
pub use input::OptionTable;
pub use models::black_scholes::{probability_of_exercise, BlackScholesExercise};
pub use models::{ExerciseModel, ExerciseParams};
pub use state::{ContractRecord, ContractType, ExerciseLabel};
