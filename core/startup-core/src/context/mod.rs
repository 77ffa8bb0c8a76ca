//! Per-agent conversation context: delegation capture and the
//! `<base>/<session>/<agent>.jsonl` store.

pub mod processor;
pub mod store;

pub use processor::{capture_delegation, capture_delegation_in, DelegationCapture, DelegationPhase};
pub use store::{
    find_latest_session_in, tail_in, write_context_in, ContextEntry, ContextError, Role,
};
