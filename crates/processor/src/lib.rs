pub mod aggregator;
pub mod builder;
pub mod config;
pub mod dedup;
pub mod error;
pub mod filter;
pub mod history;
pub mod notify;
pub mod processor;
pub mod retry;
pub mod stats;
pub mod subscriber;

pub use aggregator::{AggregateFunc, Aggregator, AggregatorConfig, AggregatorSet, FlushFn};
pub use builder::ProcessorBuilder;
pub use config::ProcessorConfig;
pub use dedup::Deduplicator;
pub use error::PublishError;
pub use filter::{Filter, FilterAction, FilterCondition, FilterField, FnFilter, RuleFilter};
pub use history::EventHistory;
pub use notify::build_notification;
pub use processor::EventProcessor;
pub use retry::RetryPolicy;
pub use stats::{ChannelStats, StatsSnapshot};
pub use subscriber::{Subscriber, SubscriberError};
