use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::channel::DynChannel;
use crate::ratelimit::TokenBucketLimiter;

/// A registered channel together with its rate limiter.
#[derive(Clone)]
pub struct ChannelEntry {
    /// The channel implementation.
    pub channel: Arc<dyn DynChannel>,
    /// Token buckets enforcing the channel's quotas.
    pub limiter: Arc<TokenBucketLimiter>,
}

/// A registry that maps channel names to their implementations and limiters.
///
/// Channels are stored behind `Arc<dyn DynChannel>` so they can be shared
/// across tasks safely. The registry itself is not thread-safe for mutation;
/// it is intended to be built once at startup and then shared behind an
/// `Arc`.
pub struct ChannelRegistry {
    channels: HashMap<String, ChannelEntry>,
}

impl ChannelRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            channels: HashMap::new(),
        }
    }

    /// Register a channel. The channel's name is the lookup key; a limiter
    /// is created from the channel's declared quotas, with buckets full as
    /// of `now`.
    ///
    /// If a channel with the same name already exists, it is replaced.
    pub fn register(&mut self, channel: Arc<dyn DynChannel>, now: DateTime<Utc>) {
        let name = channel.name().to_owned();
        let limiter = Arc::new(TokenBucketLimiter::new(channel.rate_limits(), now));
        self.channels.insert(name, ChannelEntry { channel, limiter });
    }

    /// Look up a channel entry by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<ChannelEntry> {
        self.channels.get(name).cloned()
    }

    /// Return a sorted list of all registered channel names.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.channels.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Return the number of registered channels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Return `true` if no channels are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::new()
    }
}
