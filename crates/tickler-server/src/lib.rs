//! # tickler-server
//!
//! The task service and the reminder dispatcher.
//!
//! - [`service::TaskService`] implements the task lifecycle (add/update,
//!   lookup, listing, completion, deletion, categories, profiles) on top of
//!   a [`book::TaskBook`], the typed view over a
//!   [`tickler_store::TaskRepository`].
//! - [`dispatcher::Dispatcher`] polls every profile's tasks, delivers due
//!   reminders through a [`notifier::Notifier`], advances schedules and
//!   auto-completes tasks that ask for it.
//! - [`confirm::ConfirmationBroker`] backs actions that need an explicit
//!   yes/no from the user within a deadline.

pub mod book;
pub mod config;
pub mod confirm;
pub mod dispatcher;
pub mod error;
pub mod notifier;
pub mod service;

pub use book::{StoredTask, TaskBook};
pub use config::ServerConfig;
pub use confirm::{Confirmation, ConfirmationBroker, ConfirmationRequest};
pub use dispatcher::{Delivery, Dispatcher, FireOutcome, Scan, ScanReport, REMINDER_TEXT};
pub use error::{Result, ServiceError};
pub use notifier::{DeliveryError, LogNotifier, Notifier, WebhookNotifier};
pub use service::{ActionOutcome, GatedAction, PendingAction, Summary, TaskDraft, TaskService, Upsert};
