//! Persisted and displayed run output.
//!
//! - Chain: JSON lines written behind the sampler by a dedicated thread
//! - JSON: configuration, precomputed quantities and timing side files
//! - Terminal: human-readable run summary with colors and box drawing

mod chain_writer;
mod json;
mod terminal;

pub use chain_writer::{load_chain, ChainRecord, ChainWriter, LoadedChain, WriteReport};
pub use json::{
    read_json, to_json, to_json_pretty, write_json, PrecomputedOutput, ProfileTiming, TimingOutput,
};
pub use terminal::format_summary;
