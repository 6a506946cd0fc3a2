//! Structured notification payload for a task.
//!
//! The field set is part of the contract with chat bridges: `Due Date`
//! appears only for scheduled tasks that have one, the footer carries the
//! recurrence description only for recurring tasks, and `Last Done` appears
//! only once the task has been completed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Task;
use crate::value::{Timestamp, UtcOffset};

const DATE_FORMAT: &str = "%Y-%m-%d %I:%M %p";

const COLOUR_DONE: u32 = 0x41_A1_45;
const COLOUR_OVERDUE: u32 = 0xFF_C0_48;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Done,
    Overdue,
    Pending,
}

impl TaskStatus {
    /// Accent colour, `None` for the bridge's default.
    pub fn colour(self) -> Option<u32> {
        match self {
            Self::Done => Some(COLOUR_DONE),
            Self::Overdue => Some(COLOUR_OVERDUE),
            Self::Pending => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskEmbed {
    pub title: String,
    pub author: String,
    pub status: TaskStatus,
    pub colour: Option<u32>,
    pub fields: Vec<EmbedField>,
    pub footer: Option<String>,
}

impl TaskEmbed {
    pub fn new(task: &Task, offset: UtcOffset, now: DateTime<Utc>) -> Self {
        let base = task.base();
        let status = if task.is_done() {
            TaskStatus::Done
        } else if task.is_overdue(now) {
            TaskStatus::Overdue
        } else {
            TaskStatus::Pending
        };

        let kind = if task.is_recurring() {
            if task.has_reminder() {
                "🔁"
            } else {
                "🔕 🔁"
            }
        } else if task.due_date().is_some() {
            if task.has_reminder() {
                "🔔"
            } else {
                "🔕"
            }
        } else {
            "📝"
        };
        let pin = if base.importance.is_important() {
            "📌 "
        } else {
            ""
        };

        let mut fields = Vec::new();
        if let Some(description) = &base.description {
            fields.push(field("Description", description.as_str().trim_end()));
        }
        if let Some(due) = task.due_date() {
            fields.push(field("Due Date", &render(due, offset)));
        }
        fields.push(field("Created", &render(base.created_at, offset)));
        if let Some(done) = base.last_done {
            fields.push(field("Last Done", &render(done, offset)));
        }

        Self {
            title: base.title.to_string(),
            author: format!("{pin}{kind} {}", base.category),
            status,
            colour: status.colour(),
            fields,
            footer: task.recurrence().map(|r| r.describe()),
        }
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.value.as_str())
    }
}

fn field(name: &str, value: &str) -> EmbedField {
    EmbedField {
        name: name.to_string(),
        value: value.to_string(),
    }
}

fn render(ts: Timestamp, offset: UtcOffset) -> String {
    ts.local(&offset).format(DATE_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use chrono::FixedOffset;

    use super::*;
    use crate::models::{Due, ScheduledTask, TaskBase};
    use crate::recurrence::Recurrence;
    use crate::types::{ProfileId, UserId};
    use crate::value::{Importance, TaskCategory, TaskDescription, TaskTitle};

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn base() -> TaskBase {
        TaskBase::new(
            ProfileId::new(),
            TaskTitle::new("water plants").unwrap(),
            TaskCategory::new("home").unwrap(),
            UserId::new(100_000_000_000_000_001).unwrap(),
            Timestamp::new(utc("2026-10-19T00:00:00Z")).unwrap(),
        )
    }

    fn names(embed: &TaskEmbed) -> Vec<&str> {
        embed.fields.iter().map(|f| f.name.as_str()).collect()
    }

    #[test]
    fn simple_task_fields() {
        let embed = TaskEmbed::new(
            &Task::Simple(base()),
            UtcOffset::UTC,
            utc("2026-10-19T01:00:00Z"),
        );
        assert_eq!(names(&embed), vec!["Created"]);
        assert_eq!(embed.author, "📝 home");
        assert_eq!(embed.footer, None);
        assert_eq!(embed.status, TaskStatus::Pending);
        assert_eq!(embed.colour, None);
    }

    #[test]
    fn scheduled_task_fields_in_profile_offset() {
        let mut task_base = base();
        task_base.importance = Importance::IMPORTANT;
        task_base.description = Some(TaskDescription::new("the ferns too").unwrap());
        let due = Timestamp::new(utc("2026-10-19T09:00:00Z")).unwrap();
        let task = Task::Scheduled(ScheduledTask::new(task_base, Due::At(due), false, false));

        let embed = TaskEmbed::new(&task, UtcOffset::new(8.0).unwrap(), utc("2026-10-19T10:00:00Z"));
        assert_eq!(names(&embed), vec!["Description", "Due Date", "Created"]);
        assert_eq!(embed.field("Due Date"), Some("2026-10-19 05:00 PM"));
        assert_eq!(embed.author, "📌 🔕 home");
        assert_eq!(embed.status, TaskStatus::Overdue);
        assert_eq!(embed.colour, Some(COLOUR_OVERDUE));
    }

    #[test]
    fn recurring_task_footer_and_last_done() {
        let rec = Recurrence::parse(
            "DTSTART:20261019T070000Z\nRRULE:FREQ=DAILY",
            FixedOffset::east_opt(0).unwrap(),
            utc("2026-10-19T00:00:00Z"),
        )
        .unwrap();
        let mut scheduled = ScheduledTask::new(base(), Due::Recurring(rec), true, false);
        scheduled.base.last_done = Some(Timestamp::new(utc("2026-10-19T07:05:00Z")).unwrap());
        scheduled.advance_reminder(utc("2026-10-19T07:00:00Z"));
        let task = Task::Scheduled(scheduled);

        let embed = TaskEmbed::new(&task, UtcOffset::UTC, utc("2026-10-19T08:00:00Z"));
        assert_eq!(names(&embed), vec!["Due Date", "Created", "Last Done"]);
        assert_eq!(embed.footer.as_deref(), Some("every day at 07:00"));
        assert_eq!(embed.author, "🔁 home");
        assert_eq!(embed.status, TaskStatus::Done);
    }
}
