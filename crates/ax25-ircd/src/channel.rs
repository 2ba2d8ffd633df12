//! Channels

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::client::ClientId;

/// Check whether a name is channel-addressed (`#` or `&` prefix)
pub fn is_channel_name(name: &str) -> bool {
    name.starts_with('#') || name.starts_with('&')
}

/// A chat channel
#[derive(Debug, Clone)]
pub struct Channel {
    /// Display name including the prefix
    pub name: String,
    /// Topic, shown on JOIN/TOPIC/LIST
    pub topic: String,
    /// Message length limit in characters, 0 = unlimited
    pub max_len: usize,
    /// Joined clients
    pub members: BTreeSet<ClientId>,
}

impl Channel {
    /// Create an empty channel
    pub fn new(name: impl Into<String>, topic: impl Into<String>, max_len: usize) -> Self {
        Self {
            name: name.into(),
            topic: topic.into(),
            max_len,
            members: BTreeSet::new(),
        }
    }

    /// Snapshot for callers outside the server lock
    pub fn info(&self) -> ChannelInfo {
        ChannelInfo {
            name: self.name.clone(),
            topic: self.topic.clone(),
            max_len: self.max_len,
            members: self.members.len(),
        }
    }
}

/// Read-only view of a channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelInfo {
    /// Display name
    pub name: String,
    /// Topic
    pub topic: String,
    /// Message length limit, 0 = unlimited
    pub max_len: usize,
    /// Member count
    pub members: usize,
}
