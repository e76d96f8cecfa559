//! Public contact-form intake.
//!
//! Submissions pass a cheap spam screen, are stored as immutable documents
//! under `data/contacts/<unix-millis>.json`, and are then fanned out to every
//! configured [`Notifier`]. Spam is acknowledged like a real submission so
//! bots learn nothing, but it is neither stored nor notified.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use pantry_store::keys::contact_key;
use pantry_store::{write_json_if, BlobStore, Precondition, StoreError};

use crate::error::{CatalogError, CatalogResult};

/// Timestamp bumps tried when two submissions land in the same millisecond.
const MAX_KEY_COLLISIONS: i64 = 16;

/// Minimum number of phone characters after an optional leading `+`.
const MIN_PHONE_CHARS: usize = 6;

/// The form as posted by the front-end. Every field is optional on the wire.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactForm {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub message: String,
    /// Honeypot: hidden from humans, so any value means a bot filled it in.
    pub website: String,
    pub ua: String,
    pub lang: String,
    pub page: String,
}

/// The stored document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactSubmission {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub message: String,
    pub ua: String,
    pub lang: String,
    pub page: String,
    pub received_at: String,
}

impl ContactSubmission {
    pub fn from_form(form: &ContactForm, received_at: DateTime<Utc>) -> Self {
        Self {
            name: form.name.trim().to_string(),
            email: form.email.trim().to_string(),
            phone: form.phone.trim().to_string(),
            message: form.message.trim().to_string(),
            ua: form.ua.clone(),
            lang: form.lang.clone(),
            page: form.page.clone(),
            received_at: received_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

/// Contact intake settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactConfig {
    pub max_message_chars: usize,
    /// Messages with more links than this are treated as spam.
    pub max_links: usize,
    pub notifiers: Vec<NotifierKind>,
}

impl Default for ContactConfig {
    fn default() -> Self {
        Self {
            max_message_chars: 5000,
            max_links: 2,
            notifiers: vec![NotifierKind::Log],
        }
    }
}

/// Built-in notifiers selectable from configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifierKind {
    Log,
}

impl NotifierKind {
    pub fn build(self) -> Arc<dyn Notifier> {
        match self {
            Self::Log => Arc::new(LogNotifier),
        }
    }
}

/// Outcome of screening a form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Spam(String),
    Invalid(String),
}

/// Heuristic spam and sanity screen for contact forms.
#[derive(Clone, Debug)]
pub struct SpamFilter {
    max_message_chars: usize,
    max_links: usize,
}

impl SpamFilter {
    pub fn new(config: &ContactConfig) -> Self {
        Self {
            max_message_chars: config.max_message_chars,
            max_links: config.max_links,
        }
    }

    pub fn assess(&self, form: &ContactForm) -> Verdict {
        if !form.website.trim().is_empty() {
            return Verdict::Spam("honeypot field filled".into());
        }
        let email = form.email.trim();
        let phone = form.phone.trim();
        if email.is_empty() && phone.is_empty() {
            return Verdict::Invalid("email or phone is required".into());
        }
        if !phone.is_empty() && !is_plausible_phone(phone) {
            return Verdict::Invalid("invalid phone number".into());
        }
        if !email.is_empty() && !is_plausible_email(email) {
            return Verdict::Invalid("invalid email address".into());
        }
        let message = form.message.trim();
        if message.chars().count() > self.max_message_chars {
            return Verdict::Invalid("message too long".into());
        }
        if count_links(message) > self.max_links {
            return Verdict::Spam("too many links".into());
        }
        Verdict::Accept
    }
}

/// `+?[0-9 ()-]{6,}`
fn is_plausible_phone(phone: &str) -> bool {
    let digits = phone.strip_prefix('+').unwrap_or(phone);
    digits.chars().count() >= MIN_PHONE_CHARS
        && digits
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_whitespace() || matches!(c, '-' | '(' | ')'))
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

fn count_links(message: &str) -> usize {
    let lower = message.to_lowercase();
    ["http://", "https://", "www."]
        .iter()
        .map(|needle| lower.matches(needle).count())
        .sum::<usize>()
        // "https://www.x" counts once, not twice.
        - lower.matches("://www.").count()
}

/// Receives accepted submissions after they are stored.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;
    async fn notify(&self, key: &str, submission: &ContactSubmission) -> CatalogResult<()>;
}

/// Writes accepted submissions to the log.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    async fn notify(&self, key: &str, submission: &ContactSubmission) -> CatalogResult<()> {
        info!(
            key,
            name = %submission.name,
            email = %submission.email,
            phone = %submission.phone,
            lang = %submission.lang,
            "new contact submission"
        );
        Ok(())
    }
}

/// What happened to a submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContactReceipt {
    Stored { key: String },
    Discarded { reason: String },
}

/// Screens, stores and fans out contact submissions.
#[derive(Clone)]
pub struct ContactDesk {
    store: Arc<dyn BlobStore>,
    filter: SpamFilter,
    notifiers: Vec<Arc<dyn Notifier>>,
}

impl ContactDesk {
    pub fn new(store: Arc<dyn BlobStore>, config: &ContactConfig) -> Self {
        Self {
            store,
            filter: SpamFilter::new(config),
            notifiers: config.notifiers.iter().map(|kind| kind.build()).collect(),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifiers.push(notifier);
        self
    }

    pub async fn submit(&self, form: &ContactForm) -> CatalogResult<ContactReceipt> {
        self.submit_at(form, Utc::now()).await
    }

    pub async fn submit_at(
        &self,
        form: &ContactForm,
        now: DateTime<Utc>,
    ) -> CatalogResult<ContactReceipt> {
        match self.filter.assess(form) {
            Verdict::Invalid(reason) => return Err(CatalogError::Validation(reason)),
            Verdict::Spam(reason) => {
                warn!(%reason, page = %form.page, "discarding contact submission");
                return Ok(ContactReceipt::Discarded { reason });
            }
            Verdict::Accept => {}
        }

        let submission = ContactSubmission::from_form(form, now);
        let key = self.store_submission(&submission, now.timestamp_millis()).await?;

        for notifier in &self.notifiers {
            if let Err(e) = notifier.notify(&key, &submission).await {
                warn!(notifier = notifier.name(), error = %e, "contact notification failed");
            }
        }
        Ok(ContactReceipt::Stored { key })
    }

    async fn store_submission(&self, submission: &ContactSubmission, millis: i64) -> CatalogResult<String> {
        for bump in 0..MAX_KEY_COLLISIONS {
            let key = contact_key(millis + bump);
            match write_json_if(self.store.as_ref(), &key, submission, Precondition::Absent).await {
                Ok(_) => return Ok(key),
                Err(StoreError::PreconditionFailed(_)) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(StoreError::PreconditionFailed(contact_key(millis)).into())
    }
}

impl std::fmt::Debug for ContactDesk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.notifiers.iter().map(|n| n.name()).collect();
        f.debug_struct("ContactDesk")
            .field("filter", &self.filter)
            .field("notifiers", &names)
            .finish_non_exhaustive()
    }
}
