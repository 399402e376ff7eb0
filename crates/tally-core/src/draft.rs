//! Boundary validation for user-constructed entries.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tally_domain::{Entry, EntryKind, Recurrence};

use crate::CoreError;

/// Values read off a receipt. Either field may be missing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceiptSuggestion {
    pub amount: Option<Decimal>,
    pub date: Option<DateTime<Utc>>,
}

/// An entry under construction. [`EntryDraft::build`] enforces the preconditions
/// the ledger relies on: a positive amount and a non-blank category.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryDraft {
    pub amount: Option<Decimal>,
    pub category: String,
    pub kind: EntryKind,
    pub date: DateTime<Utc>,
    pub recurrence: Recurrence,
    pub notes: Option<String>,
    pub icon: String,
}

impl EntryDraft {
    pub fn new(kind: EntryKind, date: DateTime<Utc>) -> Self {
        Self {
            amount: None,
            category: String::new(),
            kind,
            date,
            recurrence: Recurrence::OneTime,
            notes: None,
            icon: String::new(),
        }
    }

    /// Seeds the draft with whatever the receipt reader recognised.
    pub fn prefill(mut self, suggestion: &ReceiptSuggestion) -> Self {
        if let Some(amount) = suggestion.amount {
            self.amount = Some(amount);
        }
        if let Some(date) = suggestion.date {
            self.date = date;
        }
        self
    }

    pub fn amount(mut self, amount: Decimal) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn recurrence(mut self, recurrence: Recurrence) -> Self {
        self.recurrence = recurrence;
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = icon.into();
        self
    }

    pub fn build(self) -> Result<Entry, CoreError> {
        let amount = self
            .amount
            .ok_or_else(|| CoreError::Validation("amount is required".into()))?;
        if amount <= Decimal::ZERO {
            return Err(CoreError::Validation(format!(
                "amount must be positive, got {}",
                amount
            )));
        }
        let category = self.category.trim();
        if category.is_empty() {
            return Err(CoreError::Validation("category must not be empty".into()));
        }
        let mut entry = Entry::new(amount, category, self.kind, self.date, self.recurrence)
            .with_icon(self.icon);
        entry.notes = self.notes.filter(|notes| !notes.trim().is_empty());
        Ok(entry)
    }
}
