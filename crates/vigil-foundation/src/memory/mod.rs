//! Memory observation and memory-driven policy

pub mod manager;
pub mod probe;

pub use manager::{MemoryConfig, MemoryManager};
pub use probe::{
    DetailedMemoryReport, HistoryEntry, MemoryError, MemoryProbe, MemoryReading, MemorySource,
    MemoryTrend, RawMemory, SystemMemorySource,
};
