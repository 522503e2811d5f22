//! Assistant command language parser.
//!
//! # Responsibility
//! - Turn one free-text line into a `Command` intent.
//! - Parse the flexible `D/M/Y` date token.
//!
//! # Invariants
//! - Parsing is pure; resolution against stored records happens in
//!   `service::assistant_service`.
//! - The leading keyword decides the intent; fields may follow in any order
//!   and are matched case-insensitively.
//!
//! Grammar:
//! ```text
//! command       := flat-command | party-command
//! flat-command  := "flat" flat-ref field*
//! party-command := "party" party-ref field*
//! field         := "bank" number | "cash" number | "date" D/M/Y
//!                | "completion" integer
//! ```

use crate::model::RecordId;
use chrono::{Duration, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

static FLAT_REF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^flat\s+([^\s,]+)").expect("valid flat regex"));
static PARTY_REF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^party\s+([^\s,]+)").expect("valid party regex"));
static BANK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bbank\s+(\d+(?:\.\d+)?)").expect("valid bank regex"));
static CASH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bcash\s+(\d+(?:\.\d+)?)").expect("valid cash regex"));
static DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bdate\s+([^\s,]+)").expect("valid date regex"));
static COMPLETION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bcompletion\s+(\d+)").expect("valid completion regex"));

const FIELD_KEYWORDS: [&str; 4] = ["bank", "cash", "date", "completion"];

/// Completion percentage used when a party command omits `completion`.
pub const DEFAULT_COMPLETION_PERCENT: u32 = 100;

/// Parsed assistant intent.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Record a receipt against a flat.
    Flat(FlatCommand),
    /// Read-only balance query for a party.
    Party(PartyCommand),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlatCommand {
    pub flat_ref: String,
    pub bank: Option<f64>,
    pub cash: Option<f64>,
    /// Raw date token; parsed during execution so a bad token is reported
    /// only after the flat resolved.
    pub date: Option<String>,
}

impl FlatCommand {
    /// Validates amounts and returns `(bank, cash, total)`.
    pub fn amounts(&self) -> Result<(f64, f64, f64), CommandError> {
        if self.bank.is_none() && self.cash.is_none() {
            return Err(CommandError::MissingAmount);
        }
        let bank = self.bank.unwrap_or(0.0);
        let cash = self.cash.unwrap_or(0.0);
        let total = bank + cash;
        // Digit runs too long for f64 parse as infinity.
        if !(bank.is_finite() && cash.is_finite() && total.is_finite()) || total <= 0.0 {
            return Err(CommandError::InvalidAmount);
        }
        Ok((bank, cash, total))
    }

    /// Resolves the transaction date, falling back to `today`.
    pub fn resolve_date(&self, today: NaiveDate) -> Result<NaiveDate, CommandError> {
        match self.date.as_deref() {
            Some(token) => parse_flexible_date(token),
            None => Ok(today),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartyCommand {
    pub party_ref: String,
    pub completion: Option<u32>,
}

impl PartyCommand {
    pub fn completion_percent(&self) -> u32 {
        self.completion.unwrap_or(DEFAULT_COMPLETION_PERCENT)
    }
}

/// A flat matching an ambiguous reference, with its project name for the
/// disambiguation prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatCandidate {
    pub flat_id: RecordId,
    pub flat_no: String,
    pub project_id: RecordId,
    pub project_name: Option<String>,
}

/// Recoverable, user-visible command failure.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandError {
    /// Input does not start with `flat` or `party`.
    UnknownCommand,
    /// Keyword present but no usable reference token after it.
    MissingReference(&'static str),
    FlatNotFound(String),
    PartyNotFound(String),
    MissingAmount,
    InvalidAmount,
    /// `completion` value that does not fit a percentage counter.
    InvalidCompletion(String),
    InvalidDate(String),
    /// Several flats share the number; caller must pick one.
    AmbiguousReference {
        flat_ref: String,
        candidates: Vec<FlatCandidate>,
    },
}

impl Display for CommandError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownCommand => write!(f, "Start with \"flat\" or \"party\" command"),
            Self::MissingReference(keyword) => write!(f, "Missing {keyword} reference"),
            Self::FlatNotFound(flat_ref) => write!(f, "Flat {flat_ref} not found"),
            Self::PartyNotFound(party_ref) => write!(f, "Party {party_ref} not found"),
            Self::MissingAmount => write!(f, "Bank or Cash amount required"),
            Self::InvalidAmount => write!(f, "Total amount must be greater than zero"),
            Self::InvalidCompletion(value) => write!(f, "Invalid completion percentage {value}"),
            Self::InvalidDate(_) => write!(f, "Invalid transaction date"),
            Self::AmbiguousReference {
                flat_ref,
                candidates,
            } => {
                let projects = candidates
                    .iter()
                    .map(|candidate| candidate.project_name.as_deref().unwrap_or("Unknown"))
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(
                    f,
                    "Multiple projects found for flat {flat_ref}. Choose project: {projects}"
                )
            }
        }
    }
}

impl Error for CommandError {}

impl CommandError {
    /// Stable machine-readable code for logs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownCommand => "unknown_command",
            Self::MissingReference(_) => "missing_reference",
            Self::FlatNotFound(_) => "flat_not_found",
            Self::PartyNotFound(_) => "party_not_found",
            Self::MissingAmount => "missing_amount",
            Self::InvalidAmount => "invalid_amount",
            Self::InvalidCompletion(_) => "invalid_completion",
            Self::InvalidDate(_) => "invalid_date",
            Self::AmbiguousReference { .. } => "ambiguous_reference",
        }
    }
}

/// Parses one assistant line into an intent.
pub fn parse_command(input: &str) -> Result<Command, CommandError> {
    let input = input.trim();
    let lower = input.to_lowercase();

    if lower.starts_with("flat") {
        let flat_ref =
            reference(&FLAT_REF_RE, input).ok_or(CommandError::MissingReference("flat"))?;
        return Ok(Command::Flat(FlatCommand {
            flat_ref,
            bank: capture_number(&BANK_RE, input),
            cash: capture_number(&CASH_RE, input),
            date: capture(&DATE_RE, input),
        }));
    }

    if lower.starts_with("party") {
        let party_ref =
            reference(&PARTY_REF_RE, input).ok_or(CommandError::MissingReference("party"))?;
        let completion = capture(&COMPLETION_RE, input)
            .map(|value| value.parse().map_err(|_| CommandError::InvalidCompletion(value)))
            .transpose()?;
        return Ok(Command::Party(PartyCommand {
            party_ref,
            completion,
        }));
    }

    Err(CommandError::UnknownCommand)
}

/// Parses a `D/M/Y` token with rollover semantics.
///
/// Two-digit years (`< 100`) are promoted by adding 2000. Out-of-range days
/// and months roll into neighbouring months (`32/1/24` is 1 Feb 2024, day
/// `0` is the last day of the previous month); no other range check applies.
pub fn parse_flexible_date(token: &str) -> Result<NaiveDate, CommandError> {
    let invalid = || CommandError::InvalidDate(token.to_string());

    let parts: Vec<&str> = token.split('/').collect();
    let [day, month, year] = parts.as_slice() else {
        return Err(invalid());
    };
    let day: i64 = day.trim().parse().map_err(|_| invalid())?;
    let month: i64 = month.trim().parse().map_err(|_| invalid())?;
    let mut year: i64 = year.trim().parse().map_err(|_| invalid())?;
    if year < 100 {
        year += 2000;
    }

    let month_index = month - 1;
    let year = year + month_index.div_euclid(12);
    let month = month_index.rem_euclid(12) + 1;

    let year = i32::try_from(year).map_err(|_| invalid())?;
    let month = u32::try_from(month).map_err(|_| invalid())?;
    let first_of_month = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
    let offset = Duration::try_days(day - 1).ok_or_else(invalid)?;
    first_of_month.checked_add_signed(offset).ok_or_else(invalid)
}

fn reference(re: &Regex, input: &str) -> Option<String> {
    capture(re, input).filter(|token| !FIELD_KEYWORDS.contains(&token.to_lowercase().as_str()))
}

fn capture(re: &Regex, input: &str) -> Option<String> {
    re.captures(input)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn capture_number(re: &Regex, input: &str) -> Option<f64> {
    capture(re, input).and_then(|value| value.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::{parse_command, parse_flexible_date, Command, CommandError, FlatCommand};
    use chrono::NaiveDate;

    fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn parses_flat_command_with_all_fields() {
        let command = parse_command("flat A1, bank 100, cash 50, date 1/11/24").unwrap();
        assert_eq!(
            command,
            Command::Flat(FlatCommand {
                flat_ref: "A1".to_string(),
                bank: Some(100.0),
                cash: Some(50.0),
                date: Some("1/11/24".to_string()),
            })
        );
    }

    #[test]
    fn fields_are_order_and_case_insensitive() {
        let Command::Flat(command) = parse_command("  FLAT b2 Cash 12.5 BANK 7").unwrap() else {
            panic!("expected flat command");
        };
        assert_eq!(command.flat_ref, "b2");
        assert_eq!(command.bank, Some(7.0));
        assert_eq!(command.cash, Some(12.5));
        assert_eq!(command.date, None);
    }

    #[test]
    fn parses_party_command_with_default_completion() {
        let Command::Party(command) = parse_command("party John").unwrap() else {
            panic!("expected party command");
        };
        assert_eq!(command.party_ref, "John");
        assert_eq!(command.completion_percent(), 100);

        let Command::Party(command) = parse_command("party John, completion 50").unwrap() else {
            panic!("expected party command");
        };
        assert_eq!(command.completion_percent(), 50);
    }

    #[test]
    fn rejects_unknown_keyword_and_missing_reference() {
        assert_eq!(
            parse_command("pay A1 bank 10").unwrap_err(),
            CommandError::UnknownCommand
        );
        assert_eq!(
            parse_command("flat").unwrap_err(),
            CommandError::MissingReference("flat")
        );
        assert_eq!(
            parse_command("flat bank 100").unwrap_err(),
            CommandError::MissingReference("flat")
        );
    }

    #[test]
    fn amounts_require_bank_or_cash_and_positive_total() {
        let Command::Flat(command) = parse_command("flat A1, date 1/11/24").unwrap() else {
            panic!("expected flat command");
        };
        assert_eq!(command.amounts().unwrap_err(), CommandError::MissingAmount);

        let Command::Flat(command) = parse_command("flat A1 bank 0 cash 0").unwrap() else {
            panic!("expected flat command");
        };
        assert_eq!(command.amounts().unwrap_err(), CommandError::InvalidAmount);

        let Command::Flat(command) = parse_command("flat A1 cash 50").unwrap() else {
            panic!("expected flat command");
        };
        assert_eq!(command.amounts().unwrap(), (0.0, 50.0, 50.0));
    }

    #[test]
    fn overlong_digit_runs_are_invalid_amounts() {
        let digits = "9".repeat(400);

        let Command::Flat(command) = parse_command(&format!("flat A1 bank {digits}")).unwrap()
        else {
            panic!("expected flat command");
        };
        assert_eq!(command.bank, Some(f64::INFINITY));
        assert_eq!(command.amounts().unwrap_err(), CommandError::InvalidAmount);

        let command = FlatCommand {
            flat_ref: "A1".to_string(),
            bank: Some(f64::MAX),
            cash: Some(f64::MAX),
            date: None,
        };
        assert_eq!(command.amounts().unwrap_err(), CommandError::InvalidAmount);
    }

    #[test]
    fn completion_beyond_u32_is_rejected() {
        assert_eq!(
            parse_command("party John completion 5000000000").unwrap_err(),
            CommandError::InvalidCompletion("5000000000".to_string())
        );

        let Command::Party(command) = parse_command("party John completion 4294967295").unwrap()
        else {
            panic!("expected party command");
        };
        assert_eq!(command.completion_percent(), u32::MAX);
    }

    #[test]
    fn flexible_date_promotes_two_digit_years() {
        assert_eq!(parse_flexible_date("1/11/24").unwrap(), ymd(2024, 11, 1));
        assert_eq!(parse_flexible_date("15/3/2023").unwrap(), ymd(2023, 3, 15));
    }

    #[test]
    fn flexible_date_rolls_over_out_of_range_parts() {
        assert_eq!(parse_flexible_date("32/1/24").unwrap(), ymd(2024, 2, 1));
        assert_eq!(parse_flexible_date("1/13/24").unwrap(), ymd(2025, 1, 1));
        assert_eq!(parse_flexible_date("0/3/24").unwrap(), ymd(2024, 2, 29));
    }

    #[test]
    fn flexible_date_rejects_malformed_tokens() {
        for token in ["1-11-24", "1/11", "1/11/24/5", "a/11/24", "today"] {
            assert!(
                matches!(parse_flexible_date(token), Err(CommandError::InvalidDate(_))),
                "token {token} should be rejected"
            );
        }
    }

    #[test]
    fn missing_date_falls_back_to_today() {
        let Command::Flat(command) = parse_command("flat A1 bank 5").unwrap() else {
            panic!("expected flat command");
        };
        let today = ymd(2026, 10, 15);
        assert_eq!(command.resolve_date(today).unwrap(), today);
    }
}
