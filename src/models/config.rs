//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Polling cycle settings
    #[serde(default)]
    pub poller: PollerConfig,

    /// Listing source HTTP and query settings
    #[serde(default)]
    pub source: SourceConfig,

    /// Listing page selectors
    #[serde(default)]
    pub parser: ParserConfig,

    /// Database location
    #[serde(default)]
    pub storage: StorageConfig,

    /// Telegram bot settings
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// Subscription settings
    #[serde(default)]
    pub subscription: SubscriptionConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,

    /// User-facing message templates
    #[serde(default)]
    pub messages: Messages,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration, falling back to defaults only when the file does
    /// not exist. A file that exists but cannot be read or parsed is an error.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        match Self::load(&path) {
            Err(AppError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No config at {:?}, using defaults", path.as_ref());
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.poller.interval_secs == 0 {
            return Err(AppError::validation("poller.interval_secs must be > 0"));
        }
        if self.source.user_agent.trim().is_empty() {
            return Err(AppError::validation("source.user_agent is empty"));
        }
        if self.source.timeout_secs == 0 {
            return Err(AppError::validation("source.timeout_secs must be > 0"));
        }
        url::Url::parse(&self.source.base_url)
            .map_err(|e| AppError::validation(format!("source.base_url is invalid: {e}")))?;
        if !self.source.listing_path.contains("{make}") {
            return Err(AppError::validation(
                "source.listing_path must contain {make}",
            ));
        }
        if self.parser.promo_marker.is_empty() {
            return Err(AppError::validation("parser.promo_marker is empty"));
        }
        if self.subscription.period_days <= 0 {
            return Err(AppError::validation("subscription.period_days must be > 0"));
        }
        Ok(())
    }
}

/// Polling cycle settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollerConfig {
    /// Pause between the end of one cycle and the start of the next
    #[serde(default = "defaults::interval")]
    pub interval_secs: u64,

    /// Delay between searches within a cycle in milliseconds
    #[serde(default)]
    pub request_delay_ms: u64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_secs: defaults::interval(),
            request_delay_ms: 0,
        }
    }
}

/// Listing source settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Site root used for queries and for resolving relative ad links
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// Listing path template; `{category}`, `{make}` and `{model}` are substituted
    #[serde(default = "defaults::listing_path")]
    pub listing_path: String,

    /// Path segment inserted before the filter list when any filter is set
    #[serde(default = "defaults::filter_segment")]
    pub filter_segment: String,

    /// Category assigned to searches created through the wizard
    #[serde(default = "defaults::category")]
    pub category: String,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            listing_path: defaults::listing_path(),
            filter_segment: defaults::filter_segment(),
            category: defaults::category(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
        }
    }
}

/// Selectors and markers for listing pages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParserConfig {
    /// Selector for ad rows
    #[serde(default = "defaults::row_selector")]
    pub row_selector: String,

    /// Prefix stripped from the row `id` attribute to obtain the ad id
    #[serde(default = "defaults::id_prefix")]
    pub id_prefix: String,

    /// Substring of the row `id` marking promotional rows
    #[serde(default = "defaults::promo_marker")]
    pub promo_marker: String,

    /// Selector for the title anchor within a row
    #[serde(default = "defaults::title_selector")]
    pub title_selector: String,

    /// Selector for data cells within a row
    #[serde(default = "defaults::cell_selector")]
    pub cell_selector: String,

    /// Attribute holding the ad link
    #[serde(default = "defaults::attr_name")]
    pub attr_name: String,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            row_selector: defaults::row_selector(),
            id_prefix: defaults::id_prefix(),
            promo_marker: defaults::promo_marker(),
            title_selector: defaults::title_selector(),
            cell_selector: defaults::cell_selector(),
            attr_name: defaults::attr_name(),
        }
    }
}

/// Database location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "defaults::database_path")]
    pub database_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: defaults::database_path(),
        }
    }
}

/// Telegram Bot API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default = "defaults::telegram_api")]
    pub api_base: String,

    /// Bot token; `TELEGRAM_BOT_TOKEN` overrides it at startup
    #[serde(default)]
    pub token: String,

    /// Long-poll timeout for `getUpdates`
    #[serde(default = "defaults::poll_timeout")]
    pub poll_timeout_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            api_base: defaults::telegram_api(),
            token: String::new(),
            poll_timeout_secs: defaults::poll_timeout(),
        }
    }
}

/// Subscription settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionConfig {
    /// Length of a paid period recorded as the expiry on upgrade
    #[serde(default = "defaults::period_days")]
    pub period_days: i64,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            period_days: defaults::period_days(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

/// User-facing message templates.
///
/// Placeholders in braces (`{make}`, `{limit}` ...) are substituted at send time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Messages {
    pub welcome: String,
    pub help: String,
    pub ask_make: String,
    pub ask_model: String,
    pub ask_year_filter: String,
    pub ask_year_range: String,
    pub invalid_year_range: String,
    pub ask_price_filter: String,
    pub ask_price_range: String,
    pub invalid_price_range: String,
    pub empty_reply: String,
    pub search_saved: String,
    pub search_year_line: String,
    pub search_price_line: String,
    pub quota_exceeded: String,
    pub no_searches: String,
    pub search_entry: String,
    pub last_checked_line: String,
    pub search_deleted: String,
    pub offer_new_search: String,
    pub generic_error: String,
    pub retry_prompt: String,
    pub upgraded: String,
    pub already_subscribed: String,
    pub new_ad_header: String,
    pub ad_year: String,
    pub ad_engine: String,
    pub ad_transmission: String,
    pub ad_price: String,
    pub button_yes: String,
    pub button_no: String,
    pub button_premium: String,
    pub button_vip: String,
    pub button_delete: String,
    pub button_new_search: String,
    pub any_value: String,
}

impl Default for Messages {
    fn default() -> Self {
        Self {
            welcome: "👋 Hi! This bot follows new classified ads for you.\n\nUse /search to start a new search.".into(),
            help: "🆘 Help\n\nCommands:\n/start - Start the bot\n/search - Add a new search\n/mysearches - Show your searches\n/help - This help\n\nPlans:\n- Free: 1 search\n- Premium: 3 searches\n- VIP: unlimited searches\n\nNew ads are marked with 🟢".into(),
            ask_make: "Please enter the car make (e.g. Audi, BMW):".into(),
            ask_model: "Please enter the model for {make} (e.g. A4, X5):".into(),
            ask_year_filter: "Do you want to set a year range?".into(),
            ask_year_range: "Please enter the year range as 'from to' (e.g. 2010 2020):".into(),
            invalid_year_range: "Could not read that. Please enter the year range as 'from to' (e.g. 2010 2020):".into(),
            ask_price_filter: "Do you want to set a price range?".into(),
            ask_price_range: "Please enter the price range in EUR as 'from to' (e.g. 5000 15000):".into(),
            invalid_price_range: "Could not read that. Please enter the price range as 'from to' (e.g. 5000 15000):".into(),
            empty_reply: "Please send a non-empty reply.".into(),
            search_saved: "🔍 Search saved!\n\nMake: {make}\nModel: {model}{filters}\n\nYou will be notified about new ads.".into(),
            search_year_line: "\nYears: {range}".into(),
            search_price_line: "\nPrice: {range} EUR".into(),
            quota_exceeded: "⚠️ Your {tier} plan allows {limit} search(es). Upgrade to Premium or VIP to add more.".into(),
            no_searches: "You have no saved searches. Use /search to start one.".into(),
            search_entry: "🔍 {make} {model}{filters}".into(),
            last_checked_line: "\nLast checked: {time}".into(),
            search_deleted: "✅ Search deleted.".into(),
            offer_new_search: "Do you want to create a new search?".into(),
            generic_error: "Error: search not found or not yours.".into(),
            retry_prompt: "⚠️ Something went wrong. Please try again with /search".into(),
            upgraded: "Thank you! Your plan is now {tier}.".into(),
            already_subscribed: "You already have the {tier} plan or a higher one.".into(),
            new_ad_header: "🟢 New ad!".into(),
            ad_year: "Year: {value}".into(),
            ad_engine: "Engine: {value}".into(),
            ad_transmission: "Transmission: {value}".into(),
            ad_price: "Price: {value}".into(),
            button_yes: "Yes".into(),
            button_no: "No".into(),
            button_premium: "Premium (3 searches) - 5€/month".into(),
            button_vip: "VIP (unlimited) - 10€/month".into(),
            button_delete: "🗑️ Delete this search".into(),
            button_new_search: "🔍 Create a new search".into(),
            any_value: "any".into(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    // Poller defaults
    pub fn interval() -> u64 {
        30
    }

    // Source defaults
    pub fn base_url() -> String {
        "https://www.ss.com".into()
    }
    pub fn listing_path() -> String {
        "/lv/transport/{category}/{make}/{model}/".into()
    }
    pub fn filter_segment() -> String {
        "sell/".into()
    }
    pub fn category() -> String {
        "cars".into()
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; ad-tracker/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }

    // Parser defaults
    pub fn row_selector() -> String {
        r#"tr[id^="tr_"]:not(.head_line)"#.into()
    }
    pub fn id_prefix() -> String {
        "tr_".into()
    }
    pub fn promo_marker() -> String {
        "bnr".into()
    }
    pub fn title_selector() -> String {
        "a.am".into()
    }
    pub fn cell_selector() -> String {
        "td.msga2-o".into()
    }
    pub fn attr_name() -> String {
        "href".into()
    }

    // Storage defaults
    pub fn database_path() -> PathBuf {
        PathBuf::from("data/tracker.json")
    }

    // Telegram defaults
    pub fn telegram_api() -> String {
        "https://api.telegram.org".into()
    }
    pub fn poll_timeout() -> u64 {
        30
    }

    // Subscription defaults
    pub fn period_days() -> i64 {
        30
    }

    // Logging defaults
    pub fn log_level() -> String {
        "info".into()
    }
}

/// Substitute `{key}` placeholders in a template.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    vars.iter().fold(template.to_string(), |acc, (key, value)| {
        acc.replace(&format!("{{{key}}}"), value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_or_default_falls_back_only_when_missing() {
        let dir = tempfile::tempdir().unwrap();

        let missing = Config::load_or_default(dir.path().join("absent.toml")).unwrap();
        assert_eq!(missing.poller.interval_secs, 30);

        let broken = dir.path().join("broken.toml");
        fs::write(&broken, "[poller\ninterval_secs = ").unwrap();
        assert!(matches!(Config::load_or_default(&broken), Err(AppError::Toml(_))));

        let good = dir.path().join("config.toml");
        fs::write(&good, "[poller]\ninterval_secs = 90\n").unwrap();
        assert_eq!(Config::load_or_default(&good).unwrap().poller.interval_secs, 90);
    }

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_interval() {
        let mut config = Config::default();
        config.poller.interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_base_url() {
        let mut config = Config::default();
        config.source.base_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [poller]
            interval_secs = 60

            [messages]
            welcome = "Sveiki!"
            "#,
        )
        .unwrap();
        assert_eq!(config.poller.interval_secs, 60);
        assert_eq!(config.messages.welcome, "Sveiki!");
        assert_eq!(config.messages.ask_make, Messages::default().ask_make);
        assert_eq!(config.parser.promo_marker, "bnr");
    }

    #[test]
    fn render_substitutes_placeholders() {
        assert_eq!(
            render("{make} {model}", &[("make", "Audi"), ("model", "A4")]),
            "Audi A4"
        );
    }
}
