pub mod case;
pub mod config;
pub mod ids;
pub mod run;
pub mod terminal;

pub use case::*;
pub use config::*;
pub use ids::RunId;
pub use run::*;
pub use terminal::*;

/// Maximum length for case patterns, bounding regex compilation cost.
pub const MAX_REGEX_PATTERN_LEN: usize = 1000;

/// Version of the JSON run report layout.
pub const RUN_REPORT_VERSION: u32 = 1;
