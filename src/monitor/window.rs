//! Operating-hours gate
//!
//! Monitoring only runs inside a configured daily window, evaluated in a
//! fixed UTC offset. Outside the window the scheduler waits in bounded
//! slices so clock changes are picked up, cancellable at every slice.

use crate::cancel::StopToken;
use crate::config::ScheduleConfig;
use chrono::{DateTime, FixedOffset, Offset, Timelike, Utc};
use std::time::Duration;

/// Re-check cadence while waiting for the window to open
const WAIT_SLICE: Duration = Duration::from_secs(300);

/// Daily operating window in a fixed offset zone
#[derive(Debug, Clone)]
pub struct OperatingWindow {
    start_hour: u32,
    end_hour: u32,
    offset: FixedOffset,
}

impl OperatingWindow {
    /// Builds the window from the schedule configuration
    pub fn from_config(config: &ScheduleConfig) -> Self {
        // Offset validated to -12..=14 by config validation
        let offset =
            FixedOffset::east_opt(config.utc_offset_hours * 3600).unwrap_or_else(|| Utc.fix());

        Self {
            start_hour: config.window_start_hour,
            end_hour: config.window_end_hour,
            offset,
        }
    }

    /// Whether `now` falls inside the window
    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        let local = now.with_timezone(&self.offset);
        (self.start_hour..self.end_hour).contains(&local.hour())
    }

    /// Waits until the window is open, in cancellable 5-minute slices
    ///
    /// Returns `true` once open, `false` if a stop arrived while waiting.
    pub async fn wait_until_open(&self, stop: &mut StopToken) -> bool {
        if self.contains(Utc::now()) {
            return true;
        }

        tracing::info!(
            "Outside operating window ({:02}:00-{:02}:00 at {}), waiting",
            self.start_hour,
            self.end_hour,
            self.offset
        );

        while !self.contains(Utc::now()) {
            if !stop.sleep(WAIT_SLICE).await {
                return false;
            }
        }

        tracing::info!("Operating window open, resuming");
        true
    }
}
