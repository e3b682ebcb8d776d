// src/bot/dispatcher.rs

//! Routing of inbound interactions: commands, wizard replies and buttons.

use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::models::{
    Button, Messages, NamedAction, Range, SearchDescriptor, SearchId, SubscriptionTier, UserId,
    WizardState, render,
};
use crate::services::{
    Command, Inbound, InboundKind, MessagingChannel, QuotaDecision, QuotaService, SearchCreation,
};
use crate::storage::Store;

/// Handles one interaction at a time on behalf of a user.
///
/// Wizard progress lives in the store, so a dispatcher can be dropped and
/// recreated without users losing their place.
pub struct Dispatcher {
    store: Arc<dyn Store>,
    channel: Arc<dyn MessagingChannel>,
    quota: QuotaService,
    messages: Messages,
    category: String,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn Store>,
        channel: Arc<dyn MessagingChannel>,
        quota: QuotaService,
        messages: Messages,
        category: impl Into<String>,
    ) -> Self {
        Self {
            store,
            channel,
            quota,
            messages,
            category: category.into(),
        }
    }

    /// Process an interaction. Failures are reported to the user and logged,
    /// never returned.
    pub async fn handle(&self, inbound: Inbound) {
        let user_id = inbound.user_id;

        if let InboundKind::Action {
            callback_id: Some(id),
            ..
        } = &inbound.kind
        {
            if let Err(e) = self.channel.acknowledge(id, None).await {
                log::debug!("Could not acknowledge callback {}: {}", id, e);
            }
        }

        match self.dispatch(inbound).await {
            Ok(()) => {}
            Err(AppError::OwnershipViolation { user_id, search_id }) => {
                log::warn!("User {} tried to modify search {}", user_id, search_id);
                self.say(user_id, &self.messages.generic_error, &[]).await;
            }
            Err(AppError::MalformedInteraction(reason)) => {
                log::warn!("Malformed interaction from user {}: {}", user_id, reason);
                self.reset(user_id).await;
                self.say(user_id, &self.messages.retry_prompt, &[]).await;
            }
            Err(e) => {
                log::error!("Interaction from user {} failed: {}", user_id, e);
                self.reset(user_id).await;
                self.say(user_id, &self.messages.retry_prompt, &[]).await;
            }
        }
    }

    async fn dispatch(&self, inbound: Inbound) -> Result<()> {
        let user_id = inbound.user_id;
        match inbound.kind {
            InboundKind::Command(command) => self.on_command(user_id, command).await,
            InboundKind::Text(text) => self.on_text(user_id, &text).await,
            InboundKind::Action { data, .. } => {
                let action: NamedAction = data.parse()?;
                self.on_action(user_id, action).await
            }
        }
    }

    async fn on_command(&self, user_id: UserId, command: Command) -> Result<()> {
        log::debug!("User {} sent {:?}", user_id, command);
        match command {
            Command::Start => {
                self.store.ensure_user(user_id).await?;
                self.store.clear_wizard(user_id).await?;
                self.say(user_id, &self.messages.welcome, &[]).await;
                Ok(())
            }
            Command::Help => {
                self.say(user_id, &self.messages.help, &[]).await;
                Ok(())
            }
            Command::Search => self.begin_search(user_id).await,
            Command::MySearches => self.list_searches(user_id).await,
        }
    }

    async fn on_text(&self, user_id: UserId, text: &str) -> Result<()> {
        let Some(state) = self.store.load_wizard(user_id).await? else {
            self.say(user_id, &self.messages.help, &[]).await;
            return Ok(());
        };

        let reply = text.trim();
        if reply.is_empty() && state.expects_text() {
            self.say(user_id, &self.messages.empty_reply, &[]).await;
            return Ok(());
        }

        let m = &self.messages;
        match state {
            WizardState::AwaitingMake => {
                let make = reply.to_string();
                let prompt = render(&m.ask_model, &[("make", make.as_str())]);
                self.advance(user_id, WizardState::AwaitingModel { make })
                    .await?;
                self.say(user_id, &prompt, &[]).await;
            }
            WizardState::AwaitingModel { make } => {
                let model = reply.to_string();
                self.advance(user_id, WizardState::AwaitingYearChoice { make, model })
                    .await?;
                self.ask_year_filter(user_id).await;
            }
            WizardState::AwaitingYearRange { make, model } => match Range::parse_pair(reply) {
                Some(year) => {
                    self.advance(user_id, WizardState::AwaitingPriceChoice { make, model, year })
                        .await?;
                    self.ask_price_filter(user_id).await;
                }
                None => self.say(user_id, &m.invalid_year_range, &[]).await,
            },
            WizardState::AwaitingPriceRange { make, model, year } => {
                match Range::parse_pair(reply) {
                    Some(price) => self.finish(user_id, make, model, year, price).await?,
                    None => self.say(user_id, &m.invalid_price_range, &[]).await,
                }
            }
            // A button is expected; repeat the question.
            WizardState::AwaitingYearChoice { .. } => self.ask_year_filter(user_id).await,
            WizardState::AwaitingPriceChoice { .. } => self.ask_price_filter(user_id).await,
        }
        Ok(())
    }

    async fn on_action(&self, user_id: UserId, action: NamedAction) -> Result<()> {
        log::debug!("User {} pressed {}", user_id, action);
        match action {
            NamedAction::YearFilter(wanted) => {
                let Some(WizardState::AwaitingYearChoice { make, model }) =
                    self.store.load_wizard(user_id).await?
                else {
                    return Err(stale(action));
                };
                if wanted {
                    self.advance(user_id, WizardState::AwaitingYearRange { make, model })
                        .await?;
                    self.say(user_id, &self.messages.ask_year_range, &[]).await;
                } else {
                    let year = Range::default();
                    self.advance(user_id, WizardState::AwaitingPriceChoice { make, model, year })
                        .await?;
                    self.ask_price_filter(user_id).await;
                }
                Ok(())
            }
            NamedAction::PriceFilter(wanted) => {
                let Some(WizardState::AwaitingPriceChoice { make, model, year }) =
                    self.store.load_wizard(user_id).await?
                else {
                    return Err(stale(action));
                };
                if wanted {
                    self.advance(user_id, WizardState::AwaitingPriceRange { make, model, year })
                        .await?;
                    self.say(user_id, &self.messages.ask_price_range, &[]).await;
                    Ok(())
                } else {
                    self.finish(user_id, make, model, year, Range::default())
                        .await
                }
            }
            NamedAction::Subscribe(tier) => self.subscribe(user_id, tier).await,
            NamedAction::DeleteSearch(search_id) => self.delete_search(user_id, search_id).await,
            NamedAction::StartNewSearch => self.begin_search(user_id).await,
        }
    }

    /// Start the wizard unless the user is already at quota.
    async fn begin_search(&self, user_id: UserId) -> Result<()> {
        if let QuotaDecision::Exceeded { tier, limit, .. } = self.quota.check(user_id).await? {
            self.store.clear_wizard(user_id).await?;
            self.offer_upgrade(user_id, tier, limit).await;
            return Ok(());
        }
        self.advance(user_id, WizardState::AwaitingMake).await?;
        self.say(user_id, &self.messages.ask_make, &[]).await;
        Ok(())
    }

    async fn finish(
        &self,
        user_id: UserId,
        make: String,
        model: String,
        year: Range,
        price: Range,
    ) -> Result<()> {
        self.store.clear_wizard(user_id).await?;
        let descriptor = SearchDescriptor::new(self.category.clone(), make, model)
            .with_year(year)
            .with_price(price);

        match self.quota.create_search(user_id, descriptor).await? {
            SearchCreation::Created(search) => {
                let d = &search.descriptor;
                let text = render(
                    &self.messages.search_saved,
                    &[
                        ("make", d.make.as_str()),
                        ("model", d.model.as_str()),
                        ("filters", self.describe_filters(d).as_str()),
                    ],
                );
                self.say(user_id, &text, &[]).await;
            }
            SearchCreation::QuotaExceeded { tier, limit, .. } => {
                self.offer_upgrade(user_id, tier, limit).await;
            }
        }
        Ok(())
    }

    async fn list_searches(&self, user_id: UserId) -> Result<()> {
        let searches = self.store.searches_for_user(user_id).await?;
        if searches.is_empty() {
            self.say(user_id, &self.messages.no_searches, &[]).await;
            return Ok(());
        }

        for search in &searches {
            let d = &search.descriptor;
            let mut text = render(
                &self.messages.search_entry,
                &[
                    ("make", d.make.as_str()),
                    ("model", d.model.as_str()),
                    ("filters", self.describe_filters(d).as_str()),
                ],
            );
            if let Some(at) = search.last_checked {
                let time = at.format("%Y-%m-%d %H:%M").to_string();
                text.push_str(&render(&self.messages.last_checked_line, &[("time", time.as_str())]));
            }
            let delete = Button::new(
                self.messages.button_delete.clone(),
                NamedAction::DeleteSearch(search.id),
            );
            self.say(user_id, &text, &[delete]).await;
        }
        Ok(())
    }

    async fn delete_search(&self, user_id: UserId, search_id: SearchId) -> Result<()> {
        let owned = match self.store.get_search(search_id).await? {
            Some(search) => search.user_id == user_id,
            None => false,
        };
        if !owned {
            return Err(AppError::OwnershipViolation { user_id, search_id });
        }

        self.store.delete_search(search_id).await?;
        log::info!("User {} deleted search {}", user_id, search_id);

        self.say(user_id, &self.messages.search_deleted, &[]).await;
        let again = Button::new(
            self.messages.button_new_search.clone(),
            NamedAction::StartNewSearch,
        );
        self.say(user_id, &self.messages.offer_new_search, &[again])
            .await;
        Ok(())
    }

    async fn subscribe(&self, user_id: UserId, tier: SubscriptionTier) -> Result<()> {
        match self.quota.upgrade(user_id, tier).await {
            Ok(user) => {
                let text = render(&self.messages.upgraded, &[("tier", user.tier.as_str())]);
                self.say(user_id, &text, &[]).await;
                Ok(())
            }
            Err(AppError::InvalidTransition { from, .. }) => {
                let text = render(&self.messages.already_subscribed, &[("tier", from.as_str())]);
                self.say(user_id, &text, &[]).await;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn offer_upgrade(&self, user_id: UserId, tier: SubscriptionTier, limit: usize) {
        let text = render(
            &self.messages.quota_exceeded,
            &[("tier", tier.as_str()), ("limit", limit.to_string().as_str())],
        );
        let buttons: Vec<Button> = [
            (SubscriptionTier::Premium, &self.messages.button_premium),
            (SubscriptionTier::Vip, &self.messages.button_vip),
        ]
        .into_iter()
        .filter(|(target, _)| tier.can_upgrade_to(*target))
        .map(|(target, label)| Button::new(label.clone(), NamedAction::Subscribe(target)))
        .collect();
        self.say(user_id, &text, &buttons).await;
    }

    async fn ask_year_filter(&self, user_id: UserId) {
        let buttons = self.yes_no(NamedAction::YearFilter);
        self.say(user_id, &self.messages.ask_year_filter, &buttons)
            .await;
    }

    async fn ask_price_filter(&self, user_id: UserId) {
        let buttons = self.yes_no(NamedAction::PriceFilter);
        self.say(user_id, &self.messages.ask_price_filter, &buttons)
            .await;
    }

    fn yes_no(&self, action: fn(bool) -> NamedAction) -> [Button; 2] {
        [
            Button::new(self.messages.button_yes.clone(), action(true)),
            Button::new(self.messages.button_no.clone(), action(false)),
        ]
    }

    /// Filter lines for a confirmation or listing; unset filters are omitted.
    fn describe_filters(&self, descriptor: &SearchDescriptor) -> String {
        let any = &self.messages.any_value;
        let mut out = String::new();
        if !descriptor.year.is_open() {
            let range = descriptor.year.describe(any);
            out.push_str(&render(&self.messages.search_year_line, &[("range", range.as_str())]));
        }
        if !descriptor.price.is_open() {
            let range = descriptor.price.describe(any);
            out.push_str(&render(&self.messages.search_price_line, &[("range", range.as_str())]));
        }
        out
    }

    async fn advance(&self, user_id: UserId, state: WizardState) -> Result<()> {
        self.store.save_wizard(user_id, &state).await
    }

    async fn reset(&self, user_id: UserId) {
        if let Err(e) = self.store.clear_wizard(user_id).await {
            log::warn!("Could not clear wizard for user {}: {}", user_id, e);
        }
    }

    async fn say(&self, user_id: UserId, text: &str, buttons: &[Button]) {
        if let Err(e) = self.channel.send(user_id, text, buttons).await {
            log::warn!("Failed to message user {}: {}", user_id, e);
        }
    }
}

fn stale(action: NamedAction) -> AppError {
    AppError::malformed(format!("'{action}' does not match the current step"))
}
