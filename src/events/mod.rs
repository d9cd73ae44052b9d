//! Queue push notifications over server-sent events.
//!
//! - [`FrameDecoder`] - incremental `text/event-stream` framing
//! - [`PushEvent`] / [`decode_push_event`] - typed events, one decoder per event name
//! - [`EventStreamClient`] / [`Subscription`] - a reconnecting subscription
//!   that hands every decoded event to a callback until unsubscribed

mod client;
mod event;
mod frame;
mod transport;

pub use client::{EventStreamClient, STATUS_STREAM_PATH, Subscription};
pub use event::{
    DEFAULT_EVENT, DOWNLOAD_COMPLETE, DOWNLOAD_ERROR, DOWNLOAD_PROGRESS, PING, PushEvent,
    QUEUE_UPDATE, decode_push_event,
};
pub use frame::{FrameDecoder, SseFrame};
pub use transport::{MAX_RECONNECT_DELAY, ReconnectPolicy};
