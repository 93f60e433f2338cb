//! Field validation for [`ConfigModel`].
//!
//! One set of predicates feeds two presentations: the full pre-launch report
//! (every violated rule, one line each) and the inline per-field annotations
//! that drive the launch button. Both come from [`validate`], so they can never
//! disagree about whether a value is acceptable.

use crate::models::{ConfigModel, Field};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;
use url::Url;

/// Host the worker knows how to drive
pub const TICKET_HOST: &str = "kktix.com";

static DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+$").expect("Invalid digits regex"));

/// The rule a [`FieldError`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rule {
    /// Value is empty or whitespace only
    Required,

    /// Price contains something other than digits
    PriceDigits,

    /// Quantity is not an integer greater than zero
    QuantityPositive,

    /// URL is not `https://kktix.com/events/{id}/registrations/new`
    UrlFormat,

    /// Sale time is not strictly in the future
    SaleTimeFuture,
}

/// A single violated rule, scoped to one field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: Field,
    pub rule: Rule,
}

impl FieldError {
    fn new(field: Field, rule: Rule) -> Self {
        Self { field, rule }
    }

    pub fn message(&self) -> String {
        match self.rule {
            Rule::Required => format!("{} must not be empty or blank", self.field),
            Rule::PriceDigits => {
                "Ticket price must contain digits only (no commas, signs or decimal points)"
                    .to_string()
            }
            Rule::QuantityPositive => {
                "Ticket quantity must be a whole number greater than 0".to_string()
            }
            Rule::UrlFormat => format!(
                "Ticket URL must look like https://{}/events/{{event}}/registrations/new (event must not be empty)",
                TICKET_HOST
            ),
            Rule::SaleTimeFuture => "Sale time must be later than now".to_string(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

/// Ordered result of validating one config at one instant
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    errors: Vec<FieldError>,
}

impl ValidationReport {
    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Whether the launch action should be enabled
    pub fn can_launch(&self) -> bool {
        self.is_valid()
    }

    pub fn has_error(&self, field: Field) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    pub fn rules_for(&self, field: Field) -> Vec<Rule> {
        self.errors
            .iter()
            .filter(|e| e.field == field)
            .map(|e| e.rule)
            .collect()
    }

    /// One message per invalid field (its first violation), in field order.
    pub fn field_annotations(&self) -> IndexMap<Field, String> {
        let mut annotations = IndexMap::new();
        let mut fields: Vec<Field> = self.errors.iter().map(|e| e.field).collect();
        fields.sort();
        fields.dedup();

        for field in fields {
            if let Some(first) = self.errors.iter().find(|e| e.field == field) {
                annotations.insert(field, first.message());
            }
        }
        annotations
    }

    /// Full pre-launch report, one `- message` line per violation
    pub fn to_multiline(&self) -> String {
        self.errors
            .iter()
            .map(|e| format!("- {}", e.message()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// One or more field rules were violated. Blocks launch only, never save.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid input:\n{}", .0.to_multiline())]
pub struct ValidationError(pub ValidationReport);

impl ValidationReport {
    pub fn into_result(self) -> Result<(), ValidationError> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(ValidationError(self))
        }
    }
}

/// Check every rule against `config` at instant `now`.
///
/// Rules are independent: every violation is reported, none short-circuits
/// another. Pure and deterministic.
pub fn validate(config: &ConfigModel, now: DateTime<Utc>) -> ValidationReport {
    let mut errors = Vec::new();

    let required = [
        (Field::Username, &config.username),
        (Field::Password, &config.password),
        (Field::TicketName1, &config.ticket_name1),
        (Field::TicketPrice, &config.ticket_price),
        (Field::TicketQuantity, &config.ticket_quantity),
        (Field::TicketUrl, &config.ticket_url),
    ];
    for (field, value) in required {
        if is_blank(value) {
            errors.push(FieldError::new(field, Rule::Required));
        }
    }

    if !is_valid_price(&config.ticket_price) {
        errors.push(FieldError::new(Field::TicketPrice, Rule::PriceDigits));
    }

    if !is_valid_quantity(&config.ticket_quantity) {
        errors.push(FieldError::new(Field::TicketQuantity, Rule::QuantityPositive));
    }

    // Blank URLs are already covered by the required rule
    if !is_blank(&config.ticket_url) && !is_valid_ticket_url(&config.ticket_url) {
        errors.push(FieldError::new(Field::TicketUrl, Rule::UrlFormat));
    }

    if config.sale_time.with_timezone(&Utc) <= now {
        errors.push(FieldError::new(Field::SaleTime, Rule::SaleTimeFuture));
    }

    ValidationReport { errors }
}

/// Empty or whitespace only
pub fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// Digits only after trimming
pub fn is_valid_price(value: &str) -> bool {
    DIGITS.is_match(value.trim())
}

/// Digits only after trimming, and a 32-bit signed integer greater than zero
pub fn is_valid_quantity(value: &str) -> bool {
    let value = value.trim();
    DIGITS.is_match(value) && value.parse::<i32>().is_ok_and(|qty| qty > 0)
}

/// Absolute `https://kktix.com/events/{id}/registrations/new[/...]`, compared case-insensitively
pub fn is_valid_ticket_url(value: &str) -> bool {
    let Ok(url) = Url::parse(value.trim()) else {
        return false;
    };

    if !url.scheme().eq_ignore_ascii_case("https") {
        return false;
    }
    if !url
        .host_str()
        .is_some_and(|host| host.eq_ignore_ascii_case(TICKET_HOST))
    {
        return false;
    }

    let segments: Vec<&str> = url
        .path_segments()
        .map(|segments| segments.filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();

    segments.len() >= 4
        && segments[0].eq_ignore_ascii_case("events")
        && !is_blank(segments[1])
        && segments[2].eq_ignore_ascii_case("registrations")
        && segments[3].eq_ignore_ascii_case("new")
}
