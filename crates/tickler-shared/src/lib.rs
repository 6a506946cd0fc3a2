//! Shared domain types for Tickler: validated values, identifiers, the
//! profile and task entities, the recurrence evaluator, due-string parsing
//! and the notification embed.

pub mod clock;
pub mod constants;
pub mod due;
pub mod embed;
pub mod error;
pub mod models;
pub mod recurrence;
pub mod types;
pub mod value;

pub use clock::{Clock, ManualClock, SystemClock};
pub use due::{BasicDueParser, DueParser};
pub use embed::{EmbedField, TaskEmbed, TaskStatus};
pub use error::{InvalidData, ParseError, TaskError};
pub use models::{Completion, Due, Profile, ScheduledTask, Task, TaskBase};
pub use recurrence::{Frequency, Recurrence, RepeatRule};
pub use types::{ChannelId, ProfileId, Target, TaskId, UserId};
pub use value::{
    EntityUuid, Importance, RecurrenceText, SnowflakeId, TaskCategory, TaskDescription, TaskTitle,
    Timestamp, UtcOffset,
};
