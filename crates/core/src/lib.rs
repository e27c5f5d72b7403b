pub mod config;
pub mod consistency;
pub mod context;
pub mod converter;
pub mod discovery;
pub mod formats;
pub mod identifier;
pub mod merge;
pub mod metrics;
pub mod orchestrator;
pub mod registry;
pub mod report;
pub mod routing;
pub mod runlog;
pub mod scheduler;
pub mod testing;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, FolderOverride,
    FormatSetting, RunConfig,
};
pub use consistency::{ConsistencyChecker, ConsistencySummary, FinalStatus};
pub use context::RunContext;
pub use converter::{Converter, ConverterCapability, ConverterError, ConverterRegistry};
pub use formats::FormatCode;
pub use identifier::{FileIdentity, Identifier, SiegfriedIdentifier};
pub use orchestrator::{ConversionRun, OrchestratorConfig, RunError, RunOutcome};
pub use registry::{FileRecord, FileRegistry};
pub use routing::{build_routes, RouteTable};
pub use scheduler::{ConversionScheduler, ProgressMode, ScheduleSummary};
