use std::fmt::Write as _;

use chrono::{DateTime, Datelike, Timelike, Utc};
use chrono_tz::Tz;

use crate::models::{Offer, truncate_chars};

/// Offers rendered in full per notification; the rest are summarized.
pub const MAX_DETAILED_OFFERS: usize = 5;
/// Characters of description shown per offer.
pub const DESCRIPTION_PREVIEW_LEN: usize = 60;

/// Renders one sweep's NEW/CHANGED offers into a single chat message.
#[derive(Debug, Clone)]
pub struct NotificationBatcher {
    timezone: Tz,
}

impl NotificationBatcher {
    pub fn new(timezone: Tz) -> Self {
        Self { timezone }
    }

    /// Render the notification, or `None` when there is nothing to report.
    ///
    /// The first [`MAX_DETAILED_OFFERS`] offers are listed in input order;
    /// any remainder becomes one summary line. The sweep completion time is
    /// appended in the configured time-zone.
    pub fn format(&self, offers: &[Offer], completed_at: DateTime<Utc>) -> Option<String> {
        if offers.is_empty() {
            return None;
        }

        let mut message = String::from("🏨 發現飯店新優惠！\n\n");

        for (index, offer) in offers.iter().take(MAX_DETAILED_OFFERS).enumerate() {
            let _ = writeln!(message, "{}. {}", index + 1, offer.source_name);
            let _ = writeln!(message, "📝 {}", offer.title);
            if let Some(price) = &offer.price {
                let _ = writeln!(message, "💰 {price}");
            }
            if let Some(description) = &offer.description {
                let preview = truncate_chars(description, DESCRIPTION_PREVIEW_LEN);
                let _ = writeln!(message, "📋 {preview}...");
            }
            let _ = writeln!(message, "🔗 {}\n", offer.source_location);
        }

        if offers.len() > MAX_DETAILED_OFFERS {
            let _ = writeln!(
                message,
                "... 還有 {} 個優惠",
                offers.len() - MAX_DETAILED_OFFERS
            );
        }

        let _ = write!(
            message,
            "⏰ 檢查時間：{}",
            format_local_time(completed_at, self.timezone)
        );
        Some(message)
    }
}

/// Human-readable local time in the zh-TW style, e.g. `2026/10/18 下午2:05:09`.
pub fn format_local_time(at: DateTime<Utc>, timezone: Tz) -> String {
    let local = at.with_timezone(&timezone);
    let (pm, hour) = local.hour12();
    format!(
        "{}/{}/{} {}{}:{:02}:{:02}",
        local.year(),
        local.month(),
        local.day(),
        if pm { "下午" } else { "上午" },
        hour,
        local.minute(),
        local.second()
    )
}
