// Media transformation layer
//
// The external encoder is an orchestrated collaborator: commands are
// assembled argument by argument and executed as blocking processes.

pub mod commands;
pub mod dedup;

pub use commands::MediaCommand;
pub use dedup::{bitrate_for_resolution, select_bitrate, Deduplicator};
