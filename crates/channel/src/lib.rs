pub mod channel;
pub mod error;
pub mod ratelimit;
pub mod registry;

pub use channel::{Channel, ChannelKind, Delivery, DynChannel};
pub use error::ChannelError;
pub use ratelimit::{Admission, RateLimits, TokenBucketLimiter};
pub use registry::{ChannelEntry, ChannelRegistry};
