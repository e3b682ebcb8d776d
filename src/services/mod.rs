//! Service layer for the ad tracker.
//!
//! - Listing pages (`ListingSource`, `HttpListingSource`)
//! - Ad extraction (`AdParser`)
//! - Messaging (`MessagingChannel`, `TelegramChannel`)
//! - New-ad notifications (`Notifier`)
//! - Tiers and search limits (`QuotaService`)

mod channel;
mod notifier;
mod parser;
mod quota;
mod source;
mod telegram;

pub use channel::{Command, Inbound, InboundKind, InboundSource, MessagingChannel};
pub use notifier::{Notifier, NotifyReport};
pub use parser::{AdParser, CellField, RULES, Rule, classify};
pub use quota::{ApproveAll, PaymentVerifier, QuotaDecision, QuotaService, SearchCreation};
pub use source::{HttpListingSource, ListingSource, PathQueryEncoder, QueryEncoder};
pub use telegram::TelegramChannel;
