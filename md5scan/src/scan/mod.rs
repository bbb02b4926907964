//! The parallel scan: partitioning, window building, boundary handling and dispatch.
//!
//! # Overview
//!
//! A scan evaluates every substring of length `L` that lies entirely inside one record:
//!
//! 1. [`partition()`] splits the start offsets `0..data_len` into one contiguous range per
//!    worker. Each range may read `L` bytes past its end so that windows starting near
//!    the end are complete.
//! 2. Each worker walks its range eight offsets at a time. A [`RecordCursor`] masks out
//!    windows that would reach the next sentinel and jumps over it once no further
//!    window fits.
//! 3. A [`WindowBuilder`] pads the eight windows into one transposed MD5 block, and the
//!    kernel reports which lanes hash to the target.
//! 4. The first hit raises a shared cancel flag; rayon's `find_map_any` returns it.
//!
//! ```rust,ignore
//! let corpus = Corpus::open("corpus.bin")?;
//! let target = TargetDigest::from_hex("...")?;
//! let report = scan(&corpus, &target, &ScanConfig::default())?;
//! ```

pub mod boundary;
pub mod engine;
pub mod partition;
pub mod window;

pub use boundary::RecordCursor;
pub use engine::{scan, Scanner};
pub use partition::{partition, Partition};
pub use window::WindowBuilder;
