pub mod load;
pub mod types;

pub use load::{get_genflow_data_dir, load_default};
pub use types::{
    BreakerConfig, GenConfig, LoggingConfig, ProviderConfig, TelemetryOutConfig,
};
