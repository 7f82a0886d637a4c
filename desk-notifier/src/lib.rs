//! Background pollers that watch a clinic's desk for unread chats and pending
//! appointments and raise a notification for each new one.

pub mod config;
pub mod error;
pub mod poller;
pub mod seen;
pub mod sink;
pub mod source;

pub use poller::{PollState, Poller};
pub use sink::{LogSink, Notification, NotificationSink};
pub use source::{AppointmentFeed, ChatFeed, DeskClient, FeedItem, FeedSource};
