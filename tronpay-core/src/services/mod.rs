//! Application services
//!
//! Services hold the client logic and depend only on port traits.

mod api_client;
mod event_log;
mod payment;
mod poller;

pub use api_client::{ApiClient, RequestEnvelope, LOGIN_PATH, REISSUE_PATH};
pub use event_log::{
    ClientEvent, EntryPoint, EventFilter, EventLog, EventRecord, EventSummary, KindSummary,
    Outcome, COMMAND_EXECUTED, EVENTS_DB_FILE, FLOW_CANCELLED, FLOW_COMPLETED, FLOW_FAILED,
    SESSION_EXPIRED,
};
pub use payment::{
    FlowState, Notice, NoticeLevel, PaymentService, StatusReport, Submission, TransactionFlow,
};
pub use poller::{PollConfig, PollOutcome, Poller, DEFAULT_POLL_INTERVAL};
