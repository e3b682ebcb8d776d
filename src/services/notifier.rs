//! New-ad notifications.
//!
//! Delivery is fire-and-forget: a failed send is logged and dropped, and the
//! ad stays stored, so it is never retried on a later cycle.

use std::sync::Arc;

use crate::models::{CandidateAd, Messages, UserId, render};
use crate::services::MessagingChannel;

/// Result of notifying one user about a batch of new ads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NotifyReport {
    pub sent: usize,
    pub suppressed: usize,
    pub failed: usize,
}

/// Formats new ads and hands them to the messaging channel.
pub struct Notifier {
    channel: Arc<dyn MessagingChannel>,
    messages: Messages,
}

impl Notifier {
    pub fn new(channel: Arc<dyn MessagingChannel>, messages: Messages) -> Self {
        Self { channel, messages }
    }

    /// Message text for an ad, or `None` when the row is degenerate.
    ///
    /// Only recognized fields are listed; absent ones are left out entirely.
    pub fn compose(&self, ad: &CandidateAd) -> Option<String> {
        if ad.is_degenerate() {
            return None;
        }

        let m = &self.messages;
        let mut text = format!("{}\n\n{}", m.new_ad_header, ad.title_or_default());

        let lines = [
            (&m.ad_year, &ad.year),
            (&m.ad_engine, &ad.engine),
            (&m.ad_transmission, &ad.transmission),
            (&m.ad_price, &ad.price),
        ];
        for (template, value) in lines {
            if let Some(value) = value {
                text.push('\n');
                text.push_str(&render(template, &[("value", value.as_str())]));
            }
        }

        if !ad.url.is_empty() {
            text.push_str("\n\n");
            text.push_str(&ad.url);
        }

        Some(text)
    }

    /// Send one message per new ad, in order.
    pub async fn notify(&self, user_id: UserId, ads: &[CandidateAd]) -> NotifyReport {
        let mut report = NotifyReport::default();

        for ad in ads {
            let Some(text) = self.compose(ad) else {
                log::debug!("Suppressing degenerate ad {} for user {}", ad.id, user_id);
                report.suppressed += 1;
                continue;
            };

            match self.channel.send(user_id, &text, &[]).await {
                Ok(()) => report.sent += 1,
                Err(e) => {
                    report.failed += 1;
                    log::warn!("Failed to notify user {} about ad {}: {}", user_id, ad.id, e);
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingChannel;

    fn notifier(channel: Arc<RecordingChannel>) -> Notifier {
        Notifier::new(channel, Messages::default())
    }

    fn full_ad() -> CandidateAd {
        CandidateAd {
            id: "111".into(),
            title: Some("Audi A4 Avant".into()),
            url: "https://www.ss.com/msg/111.html".into(),
            price: Some("9 500 €".into()),
            year: Some("2015".into()),
            engine: Some("2.0 D".into()),
            transmission: Some("Automāts".into()),
            posted_date: Some("12.03.2024".into()),
        }
    }

    #[test]
    fn test_compose_full_ad() {
        let text = notifier(RecordingChannel::new()).compose(&full_ad()).unwrap();
        assert_eq!(
            text,
            "🟢 New ad!\n\nAudi A4 Avant\nYear: 2015\nEngine: 2.0 D\nTransmission: Automāts\nPrice: 9 500 €\n\nhttps://www.ss.com/msg/111.html"
        );
    }

    #[test]
    fn test_compose_omits_absent_fields() {
        let ad = CandidateAd {
            id: "2".into(),
            title: Some("BMW X5".into()),
            url: "https://www.ss.com/msg/2.html".into(),
            price: Some("14 900 €".into()),
            ..CandidateAd::default()
        };
        let text = notifier(RecordingChannel::new()).compose(&ad).unwrap();
        assert!(text.contains("Price: 14 900 €"));
        assert!(!text.contains("Year:"));
        assert!(!text.contains("Engine:"));
        assert!(!text.contains("Transmission:"));
        assert!(!text.contains("not specified"));
    }

    #[test]
    fn test_compose_sentinel_title_with_url_is_sent() {
        let ad = CandidateAd {
            id: "3".into(),
            url: "https://www.ss.com/msg/3.html".into(),
            ..CandidateAd::default()
        };
        let text = notifier(RecordingChannel::new()).compose(&ad).unwrap();
        assert!(text.contains("no title"));
        assert!(text.ends_with("https://www.ss.com/msg/3.html"));
    }

    #[test]
    fn test_compose_suppresses_degenerate() {
        let ad = CandidateAd {
            id: "4".into(),
            year: Some("2008".into()),
            ..CandidateAd::default()
        };
        assert_eq!(notifier(RecordingChannel::new()).compose(&ad), None);
    }

    #[tokio::test]
    async fn test_notify_counts() {
        let channel = RecordingChannel::new();
        let degenerate = CandidateAd {
            id: "5".into(),
            ..CandidateAd::default()
        };
        let report = notifier(channel.clone())
            .notify(42, &[full_ad(), degenerate])
            .await;

        assert_eq!(report, NotifyReport { sent: 1, suppressed: 1, failed: 0 });
        let sent = channel.messages();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, 42);
        assert!(sent[0].buttons.is_empty());
    }

    #[tokio::test]
    async fn test_send_failures_are_dropped() {
        let report = notifier(RecordingChannel::failing())
            .notify(1, &[full_ad(), full_ad()])
            .await;
        assert_eq!(report, NotifyReport { sent: 0, suppressed: 0, failed: 2 });
    }
}
