//! File I/O, validation, and plotting for the seismo pipeline.

mod domain;
mod error;
mod plot;
mod reader;
mod writer;

pub use domain::{
    Block, FEATURE_COLUMNS, PositionalSplit, SEG_ID_COLUMN, SegmentId, StatsDataset,
    TARGET_COLUMN, TestDataset,
};
pub use error::IoError;
pub use plot::{NullReporter, PngReporter, Reporter};
pub use reader::{StatsReader, TestReader};
pub use writer::{OutputWriter, format_scientific};
