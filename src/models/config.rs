use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::sale_time::taipei_now;

/// Operator settings persisted to `UserConfig.json`.
///
/// Keys are PascalCase so the file stays readable by the automation worker,
/// which looks fields up by these exact names. Missing keys fall back to
/// [`ConfigModel::default`].
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ConfigModel {
    pub username: String,

    /// Stored in cleartext; see DESIGN.md.
    pub password: String,

    pub ticket_name1: String,
    pub ticket_name2: String,

    /// Digits only, kept as text so leading zeros and raw input survive.
    pub ticket_price: String,
    pub ticket_quantity: String,
    pub ticket_url: String,

    /// `true` lets the site pick seats.
    pub is_auto_allocation: bool,
    pub is_auto_payment: bool,

    pub sale_time: DateTime<FixedOffset>,
}

impl Default for ConfigModel {
    fn default() -> Self {
        Self {
            username: String::new(),
            password: String::new(),
            ticket_name1: String::new(),
            ticket_name2: String::new(),
            ticket_price: String::new(),
            ticket_quantity: String::new(),
            ticket_url: String::new(),
            is_auto_allocation: true,
            is_auto_payment: false,
            sale_time: taipei_now(),
        }
    }
}

impl fmt::Debug for ConfigModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigModel")
            .field("username", &self.username)
            .field("password", &redact(&self.password))
            .field("ticket_name1", &self.ticket_name1)
            .field("ticket_name2", &self.ticket_name2)
            .field("ticket_price", &self.ticket_price)
            .field("ticket_quantity", &self.ticket_quantity)
            .field("ticket_url", &self.ticket_url)
            .field("is_auto_allocation", &self.is_auto_allocation)
            .field("is_auto_payment", &self.is_auto_payment)
            .field("sale_time", &self.sale_time)
            .finish()
    }
}

/// Masked form of a secret for display and logs
pub fn redact(secret: &str) -> &'static str {
    if secret.is_empty() { "" } else { "********" }
}

/// Every editable field of [`ConfigModel`].
///
/// Used to scope validation messages and to describe which fields an edit touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    Username,
    Password,
    TicketName1,
    TicketName2,
    TicketPrice,
    TicketQuantity,
    TicketUrl,
    IsAutoAllocation,
    IsAutoPayment,
    SaleTime,
}

impl Field {
    pub const ALL: [Field; 10] = [
        Field::Username,
        Field::Password,
        Field::TicketName1,
        Field::TicketName2,
        Field::TicketPrice,
        Field::TicketQuantity,
        Field::TicketUrl,
        Field::IsAutoAllocation,
        Field::IsAutoPayment,
        Field::SaleTime,
    ];

    /// Human-readable label used in messages
    pub fn label(self) -> &'static str {
        match self {
            Field::Username => "Account",
            Field::Password => "Password",
            Field::TicketName1 => "Ticket name (line 1)",
            Field::TicketName2 => "Ticket name (line 2)",
            Field::TicketPrice => "Ticket price",
            Field::TicketQuantity => "Ticket quantity",
            Field::TicketUrl => "Ticket URL",
            Field::IsAutoAllocation => "Seat allocation",
            Field::IsAutoPayment => "Payment",
            Field::SaleTime => "Sale time",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl ConfigModel {
    /// Fields whose values differ between `self` and `other`, in declaration order.
    pub fn changed_fields(&self, other: &ConfigModel) -> Vec<Field> {
        Field::ALL
            .into_iter()
            .filter(|field| match field {
                Field::Username => self.username != other.username,
                Field::Password => self.password != other.password,
                Field::TicketName1 => self.ticket_name1 != other.ticket_name1,
                Field::TicketName2 => self.ticket_name2 != other.ticket_name2,
                Field::TicketPrice => self.ticket_price != other.ticket_price,
                Field::TicketQuantity => self.ticket_quantity != other.ticket_quantity,
                Field::TicketUrl => self.ticket_url != other.ticket_url,
                Field::IsAutoAllocation => self.is_auto_allocation != other.is_auto_allocation,
                Field::IsAutoPayment => self.is_auto_payment != other.is_auto_payment,
                Field::SaleTime => self.sale_time != other.sale_time,
            })
            .collect()
    }
}
