// Incident alerts, scheduled reminders and per-user inboxes

pub mod channels;
pub mod rules;
pub mod service;

pub use channels::{NotificationChannel, OutgoingMessage, Recipient, TracingChannel};
pub use rules::{NotificationRule, CHANNELS};
pub use service::{
    spawn_sweep, ChannelConfig, ChannelUpdate, DispatchOutcome, IncidentAlert, Notification, NotificationService,
    SweepSummary,
};
