//! In-memory collaborators for tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::models::{Button, SearchDescriptor, UserId};
use crate::services::{ListingSource, MessagingChannel};

/// A message captured by [`RecordingChannel`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub to: UserId,
    pub text: String,
    pub buttons: Vec<Button>,
}

/// Channel that records everything it is asked to send.
#[derive(Default)]
pub struct RecordingChannel {
    sent: Mutex<Vec<SentMessage>>,
    acks: Mutex<Vec<(String, Option<String>)>>,
    fail: AtomicBool,
}

impl RecordingChannel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A channel whose sends always fail.
    pub fn failing() -> Arc<Self> {
        let channel = Self::default();
        channel.fail.store(true, Ordering::SeqCst);
        Arc::new(channel)
    }

    pub fn messages(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<SentMessage> {
        self.sent.lock().unwrap().last().cloned()
    }

    pub fn acks(&self) -> Vec<(String, Option<String>)> {
        self.acks.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }
}

#[async_trait]
impl MessagingChannel for RecordingChannel {
    async fn send(&self, recipient: UserId, text: &str, buttons: &[Button]) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::channel("bot was blocked by the user"));
        }
        self.sent.lock().unwrap().push(SentMessage {
            to: recipient,
            text: text.to_string(),
            buttons: buttons.to_vec(),
        });
        Ok(())
    }

    async fn acknowledge(&self, callback_id: &str, text: Option<&str>) -> Result<()> {
        self.acks
            .lock()
            .unwrap()
            .push((callback_id.to_string(), text.map(str::to_string)));
        Ok(())
    }
}

/// Listing source serving the same page for every query, except makes
/// marked as failing.
#[derive(Default)]
pub struct StaticSource {
    html: Mutex<String>,
    failing_makes: Mutex<HashSet<String>>,
    calls: AtomicUsize,
}

impl StaticSource {
    pub fn new(html: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            html: Mutex::new(html.into()),
            ..Self::default()
        })
    }

    pub fn set_html(&self, html: impl Into<String>) {
        *self.html.lock().unwrap() = html.into();
    }

    pub fn fail_for(&self, make: &str) {
        self.failing_makes.lock().unwrap().insert(make.to_string());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ListingSource for StaticSource {
    async fn fetch(&self, query: &SearchDescriptor) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_makes.lock().unwrap().contains(&query.make) {
            return Err(AppError::fetch(query.label(), "status 503 Service Unavailable"));
        }
        Ok(self.html.lock().unwrap().clone())
    }
}

/// Listing page in the default layout with one row per `(id, title, href, cells)`.
pub fn listing_page(rows: &[(&str, Option<(&str, &str)>, &[&str])]) -> String {
    let body: String = rows
        .iter()
        .map(|(id, title, cells)| {
            let anchor = title
                .map(|(text, href)| {
                    format!(r#"<td class="msg2"><a class="am" href="{href}">{text}</a></td>"#)
                })
                .unwrap_or_default();
            let tds: String = cells
                .iter()
                .map(|c| format!(r#"<td class="msga2-o">{c}</td>"#))
                .collect();
            format!(r#"<tr id="{id}">{anchor}{tds}</tr>"#)
        })
        .collect();
    format!(
        r#"<html><body><table><tr id="head_line" class="head_line"><td>Header</td></tr>{body}</table></body></html>"#
    )
}
