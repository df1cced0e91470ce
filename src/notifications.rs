// SPDX-License-Identifier: GPL-3.0-only

//! Transient user notifications via the freedesktop Notifications D-Bus API
//!
//! Notifications are best-effort: failures are logged and swallowed.

use crate::constants::notifications;
use std::collections::HashMap;
use tracing::{debug, warn};
use zbus::zvariant::Value;

/// Notification collaborator
pub trait Notifier {
    /// Show a notification for `event` (e.g. "photoTaken")
    fn notify(&self, event: &str, title: &str, body: &str);
}

/// Sends notifications to `org.freedesktop.Notifications` on the session bus
#[derive(Debug, Default)]
pub struct DesktopNotifier;

impl DesktopNotifier {
    pub fn new() -> Self {
        Self
    }

    fn send(event: &str, title: &str, body: &str) -> zbus::Result<u32> {
        let connection = zbus::blocking::Connection::session()?;

        let mut hints: HashMap<&str, Value<'_>> = HashMap::new();
        hints.insert("category", Value::from("transfer.complete"));
        hints.insert("x-webcam-event", Value::from(event));

        // Notify(app_name, replaces_id, app_icon, summary, body, actions, hints, expire_timeout)
        let reply = connection.call_method(
            Some("org.freedesktop.Notifications"),
            "/org/freedesktop/Notifications",
            Some("org.freedesktop.Notifications"),
            "Notify",
            &(
                notifications::APP_NAME,
                0u32,
                notifications::ICON,
                title,
                body,
                Vec::<&str>::new(),
                hints,
                notifications::EXPIRE_TIMEOUT,
            ),
        )?;

        reply.body().deserialize::<u32>()
    }
}

impl Notifier for DesktopNotifier {
    fn notify(&self, event: &str, title: &str, body: &str) {
        match Self::send(event, title, body) {
            Ok(id) => debug!(event, id, "Notification sent"),
            Err(e) => warn!(event, error = %e, "Failed to send notification"),
        }
    }
}

/// Notifier that only logs, for headless use
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, event: &str, title: &str, body: &str) {
        tracing::info!(event, title, body, "Notification");
    }
}
