pub mod config;
pub mod corpus;
pub mod errors;
pub mod kernel;
pub mod metrics;
pub mod results;
pub mod scan;
pub mod target;

pub use config::{ConfigOverrides, ScanConfig};
pub use corpus::{Corpus, CorpusBuilder, CorpusManifest, CorpusStats};
pub use errors::{ScanError, ScanResult};
pub use kernel::{Backend, Kernel};
pub use metrics::{ScanMetrics, ScanStats};
pub use results::{Match, ScanOutcome, ScanReport};
pub use scan::{scan, Scanner};
pub use target::TargetDigest;
