//! Email dispatch metrics.

use metrics::{counter, histogram};
use std::time::Duration;

pub const DISPATCH_TOTAL: &str = "email_dispatch_total";
pub const DISPATCH_DURATION_SECONDS: &str = "email_dispatch_duration_seconds";

/// Dispatch metrics recorder
pub struct DispatchMetrics;

impl DispatchMetrics {
    /// Record a message accepted by the channel.
    pub fn record_sent(channel: &str, elapsed: Duration) {
        Self::record(channel, "sent");
        histogram!(DISPATCH_DURATION_SECONDS, "channel" => channel.to_string())
            .record(elapsed.as_secs_f64());
    }

    /// Record a send that was suppressed before reaching any channel.
    ///
    /// `reason` is the suppression reason label (`kill_switch`,
    /// `synthetic_recipient`).
    pub fn record_skipped(channel: &str, reason: &str) {
        counter!(
            DISPATCH_TOTAL,
            "channel" => channel.to_string(),
            "outcome" => "skipped",
            "reason" => reason.to_string()
        )
        .increment(1);
    }

    /// Record a failed dispatch attempt.
    ///
    /// `kind` is the failure classification (`timeout`, `provider_rejected`,
    /// `transport_error`).
    pub fn record_failed(channel: &str, kind: &str, elapsed: Duration) {
        Self::record(channel, kind);
        histogram!(DISPATCH_DURATION_SECONDS, "channel" => channel.to_string())
            .record(elapsed.as_secs_f64());
    }

    fn record(channel: &str, outcome: &str) {
        counter!(
            DISPATCH_TOTAL,
            "channel" => channel.to_string(),
            "outcome" => outcome.to_string()
        )
        .increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder_is_noop() {
        DispatchMetrics::record_sent("hosted_api", Duration::from_millis(12));
        DispatchMetrics::record_skipped("smtp_relay", "kill_switch");
        DispatchMetrics::record_failed("local_relay", "timeout", Duration::from_secs(30));
    }
}
