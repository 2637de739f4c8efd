pub mod metrics;
pub mod tracer;

/// Identifies one acquisition event in an input file.
pub type EventId = u64;

/// Identifies one digitiser channel.
pub type ChannelId = u32;
