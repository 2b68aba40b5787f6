use std::time::Duration;

use time::OffsetDateTime;

use super::NotificationWindow;
use crate::configs::Notification;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub enabled: bool,
    pub window: Duration,
    pub max_per_window: u32,
}

impl From<&Notification> for RateLimitPolicy {
    fn from(notification: &Notification) -> Self {
        Self {
            enabled: notification.rate_limit_enabled,
            window: notification.window(),
            max_per_window: notification.max_per_window,
        }
    }
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self::from(&Notification::default())
    }
}

impl NotificationWindow {
    /// Admits a notification at `now` and records it, or counts it as suppressed.
    pub fn allow(&mut self, now: OffsetDateTime, policy: &RateLimitPolicy) -> bool {
        if !policy.enabled {
            return true;
        }

        let window = time::Duration::try_from(policy.window).unwrap_or(time::Duration::MAX);
        while let Some(oldest) = self.sent.front() {
            if now - *oldest >= window {
                self.sent.pop_front();
            } else {
                break;
            }
        }

        if self.sent.len() < policy.max_per_window as usize {
            self.sent.push_back(now);
            true
        } else {
            self.suppressed += 1;
            false
        }
    }

    /// Sends still counted against the window at `now`.
    pub fn in_window(&self, now: OffsetDateTime, policy: &RateLimitPolicy) -> usize {
        let window = time::Duration::try_from(policy.window).unwrap_or(time::Duration::MAX);
        self.sent.iter().filter(|sent| now - **sent < window).count()
    }
}
