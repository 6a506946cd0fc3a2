use serde::{Deserialize, Serialize};

use crate::error::InvalidData;
use crate::value::{EntityUuid, SnowflakeId};

/// Chat user identity (platform snowflake).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct UserId(pub SnowflakeId);

impl UserId {
    pub fn new(raw: u64) -> Result<Self, InvalidData> {
        Ok(Self(SnowflakeId::new(raw)?))
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Chat channel a task or profile is bound to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct ChannelId(pub SnowflakeId);

impl ChannelId {
    pub fn new(raw: u64) -> Result<Self, InvalidData> {
        Ok(Self(SnowflakeId::new(raw)?))
    }
}

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct ProfileId(pub EntityUuid);

impl ProfileId {
    pub fn new() -> Self {
        Self(EntityUuid::generate())
    }

    pub fn parse(s: &str) -> Result<Self, InvalidData> {
        Ok(Self(EntityUuid::new(s)?))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Default for ProfileId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ProfileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct TaskId(pub EntityUuid);

impl TaskId {
    pub fn new() -> Self {
        Self(EntityUuid::generate())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a notification should be delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Target {
    /// A shared chat channel.
    Channel(ChannelId),
    /// A direct message to a user.
    User(UserId),
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Channel(id) => write!(f, "channel:{id}"),
            Self::User(id) => write!(f, "user:{id}"),
        }
    }
}
