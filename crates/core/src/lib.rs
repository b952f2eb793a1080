pub mod clock;
pub mod coverage;
pub mod error;
pub mod event;
pub mod fingerprint;
pub mod notification;

pub use clock::{Clock, ManualClock, SystemClock};
pub use coverage::{
    CoverageBody, EPSILON, QualityGatesSummary, TrendDirection, TrendInfo, pct_eq, saturate_pct,
};
pub use error::EventError;
pub use event::{CoverageEvent, EventType, Priority, Severity};
pub use fingerprint::{compute_fingerprint, content_id};
pub use notification::{Link, LinkKind, Notification, build_links};
