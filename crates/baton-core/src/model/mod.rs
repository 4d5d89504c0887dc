//! Test entity model.
//!
//! A [`Test`] is identified by `(suite_name, test_id)` and only changes when a
//! [`NotificationMessage`] addressed to it is applied. Raw runner output is
//! normalized into messages by [`InboundEvent::parse`].

/// Raw event parsing and the normalized notification message.
pub mod message;
/// Closed test status enumeration.
pub mod status;

pub use message::{InboundEvent, NotificationKind, NotificationMessage};
pub use status::TestStatus;
pub use test::Test;
