pub mod frame;
pub mod relay;
pub mod token;

pub use frame::{DONE_SENTINEL, EventRecord, FrameBatch, FrameReassembler};
pub use relay::{
    ChunkOutcome, RelayOutcome, RelayReceiver, RelaySession, SessionState, run_relay, spawn_relay,
    watch_relay,
};
pub use token::{TokenFilter, extract_token, is_pure_newline};
