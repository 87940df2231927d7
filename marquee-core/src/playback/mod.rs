//! Watch-progress reconciliation.

pub mod batch_writer;
pub mod source_resolver;

pub use batch_writer::{
    BatchConfig, FlushError, FlushReport, PlaytimeBatchWriter, PlaytimeUpdate,
};
pub use source_resolver::{
    LastUsedSourceResolver, ResolvedSource, SourceOrigin, SourceUpdateOutcome,
};
