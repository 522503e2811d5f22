//! Assistant command execution.
//!
//! # Responsibility
//! - Resolve parsed commands against stored flats and parties.
//! - Record one transaction per successful flat command.
//! - Answer party balance queries without mutating anything.
//!
//! # Invariants
//! - Each call performs at most one store write.
//! - Rejections never mutate; they come back as `LogKind::Error` outcomes.
//! - Flat references that match several flats are never guessed; the
//!   caller resolves them through `execute_flat_with`.
//! - Party references take the first substring match in store order.

use crate::engine::command::{
    parse_command, Command, CommandError, FlatCandidate, FlatCommand, PartyCommand,
};
use crate::engine::reconcile::{party_balance, PartyBalance};
use crate::engine::suggest::SuggestionList;
use crate::model::flat::Flat;
use crate::model::party::Party;
use crate::model::project::Project;
use crate::model::transaction::Transaction;
use crate::model::RecordId;
use crate::repo::record_store::{RecordStore, RepoResult};
use crate::repo::RefField;
use chrono::{Local, NaiveDate};
use log::{info, warn};

const MESSAGE_DATE_FORMAT: &str = "%d/%m/%Y";

/// Classification of an assistant log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    Info,
    Success,
    Error,
}

/// One line of assistant feedback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssistantLog {
    pub kind: LogKind,
    pub message: String,
}

impl AssistantLog {
    fn new(kind: LogKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// The flat or party the last successful command acted on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectedContext {
    Flat { id: RecordId, flat_no: String },
    Party { id: RecordId, name: String },
}

/// What a command did.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandEffect {
    TransactionRecorded(Transaction),
    PartyBalance { party: Party, balance: PartyBalance },
    Rejected(CommandError),
}

/// Result of executing one assistant line.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandOutcome {
    pub log: AssistantLog,
    pub effect: CommandEffect,
    pub context: Option<SelectedContext>,
}

impl CommandOutcome {
    fn rejected(error: CommandError) -> Self {
        warn!(
            "event=assistant_command module=assistant status=rejected error_code={}",
            error.code()
        );
        Self {
            log: AssistantLog::new(LogKind::Error, error.to_string()),
            effect: CommandEffect::Rejected(error),
            context: None,
        }
    }

    /// Whether the shell should clear the input box.
    pub fn clears_input(&self) -> bool {
        !matches!(self.effect, CommandEffect::Rejected(_))
    }

    /// Candidates to offer when the flat reference was ambiguous.
    pub fn ambiguity(&self) -> Option<&[FlatCandidate]> {
        match &self.effect {
            CommandEffect::Rejected(CommandError::AmbiguousReference { candidates, .. }) => {
                Some(candidates)
            }
            _ => None,
        }
    }
}

/// Executes assistant commands against a record store.
pub struct AssistantService<'s, S: RecordStore> {
    store: &'s S,
}

impl<'s, S: RecordStore> AssistantService<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    /// Executes `input` with today's local date as the default date.
    pub fn execute(&self, input: &str) -> RepoResult<CommandOutcome> {
        self.execute_on(input, Local::now().date_naive())
    }

    /// Executes `input`, using `today` when the command has no `date`.
    pub fn execute_on(&self, input: &str, today: NaiveDate) -> RepoResult<CommandOutcome> {
        match parse_command(input) {
            Ok(Command::Flat(command)) => self.run_flat(&command, None, today),
            Ok(Command::Party(command)) => self.run_party(&command),
            Err(error) => Ok(CommandOutcome::rejected(error)),
        }
    }

    /// Re-runs a flat command after the caller picked one of the ambiguous
    /// candidates.
    pub fn execute_flat_with(
        &self,
        command: &FlatCommand,
        flat_id: RecordId,
        today: NaiveDate,
    ) -> RepoResult<CommandOutcome> {
        self.run_flat(command, Some(flat_id), today)
    }

    /// Transactions belonging to the flat or party of a context.
    pub fn context_transactions(&self, context: &SelectedContext) -> RepoResult<Vec<Transaction>> {
        match context {
            SelectedContext::Flat { id, .. } => self.store.query_by_field(RefField::FlatId, *id),
            SelectedContext::Party { id, .. } => self.store.query_by_field(RefField::PartyId, *id),
        }
    }

    fn run_flat(
        &self,
        command: &FlatCommand,
        chosen: Option<RecordId>,
        today: NaiveDate,
    ) -> RepoResult<CommandOutcome> {
        let flat_ref = command.flat_ref.to_uppercase();
        let matches: Vec<Flat> = self
            .store
            .list_all::<Flat>()?
            .into_iter()
            .filter(|flat| flat.flat_no.to_uppercase() == flat_ref)
            .collect();

        let matches = match chosen {
            Some(id) => matches.into_iter().filter(|flat| flat.id == id).collect(),
            None => matches,
        };
        if matches.is_empty() {
            return Ok(CommandOutcome::rejected(CommandError::FlatNotFound(flat_ref)));
        }

        let (bank, cash, _) = match command.amounts() {
            Ok(amounts) => amounts,
            Err(error) => return Ok(CommandOutcome::rejected(error)),
        };
        let transaction_date = match command.resolve_date(today) {
            Ok(date) => date,
            Err(error) => return Ok(CommandOutcome::rejected(error)),
        };

        let flat = match <[Flat; 1]>::try_from(matches) {
            Ok([flat]) => flat,
            Err(matches) => {
                let candidates = self.candidates(&matches)?;
                return Ok(CommandOutcome::rejected(CommandError::AmbiguousReference {
                    flat_ref,
                    candidates,
                }));
            }
        };

        let transaction = Transaction::new(flat.project_id, bank, cash, transaction_date)
            .for_flat(flat.id, flat.party_id);
        self.store.insert(&transaction)?;
        info!("event=assistant_command module=assistant status=ok intent=flat");

        Ok(CommandOutcome {
            log: AssistantLog::new(
                LogKind::Success,
                format!(
                    "Transaction added for flat {flat_ref}. Bank: {bank}, Cash: {cash}, Date: {}",
                    transaction_date.format(MESSAGE_DATE_FORMAT)
                ),
            ),
            effect: CommandEffect::TransactionRecorded(transaction),
            context: Some(SelectedContext::Flat {
                id: flat.id,
                flat_no: flat.flat_no,
            }),
        })
    }

    fn run_party(&self, command: &PartyCommand) -> RepoResult<CommandOutcome> {
        let needle = command.party_ref.to_lowercase();
        let party = self
            .store
            .list_all::<Party>()?
            .into_iter()
            .find(|party| party.name.to_lowercase().contains(&needle));
        let Some(party) = party else {
            return Ok(CommandOutcome::rejected(CommandError::PartyNotFound(
                command.party_ref.clone(),
            )));
        };

        let completion = command.completion_percent();
        let flats: Vec<Flat> = self.store.query_by_field(RefField::PartyId, party.id)?;
        let transactions: Vec<Transaction> =
            self.store.query_by_field(RefField::PartyId, party.id)?;
        let balance = party_balance(party.id, &flats, &transactions, f64::from(completion));
        info!("event=assistant_command module=assistant status=ok intent=party");

        let message = format!(
            "Party: {}, Completion: {completion}%, Expected: {}, Paid: {}, Balance: {}",
            party.name, balance.expected, balance.received, balance.balance
        );
        let context = SelectedContext::Party {
            id: party.id,
            name: party.name.clone(),
        };
        Ok(CommandOutcome {
            log: AssistantLog::new(LogKind::Info, message),
            effect: CommandEffect::PartyBalance { party, balance },
            context: Some(context),
        })
    }

    fn candidates(&self, flats: &[Flat]) -> RepoResult<Vec<FlatCandidate>> {
        flats
            .iter()
            .map(|flat| {
                let project_name = self
                    .store
                    .get::<Project>(flat.project_id)?
                    .map(|project| project.name);
                Ok(FlatCandidate {
                    flat_id: flat.id,
                    flat_no: flat.flat_no.clone(),
                    project_id: flat.project_id,
                    project_name,
                })
            })
            .collect()
    }
}

/// Navigation keys understood by the suggestion list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuggestionKey {
    Down,
    Up,
    Enter,
}

/// Interactive assistant state for a shell: input text, suggestions, log
/// history, last context and a pending disambiguation.
#[derive(Debug, Default)]
pub struct AssistantSession {
    input: String,
    suggestions: SuggestionList,
    logs: Vec<AssistantLog>,
    context: Option<SelectedContext>,
    pending: Option<FlatCommand>,
    last: Option<CommandOutcome>,
}

impl AssistantSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn suggestions(&self) -> &SuggestionList {
        &self.suggestions
    }

    pub fn logs(&self) -> &[AssistantLog] {
        &self.logs
    }

    pub fn context(&self) -> Option<&SelectedContext> {
        self.context.as_ref()
    }

    pub fn last_outcome(&self) -> Option<&CommandOutcome> {
        self.last.as_ref()
    }

    /// Flat command waiting for the caller to pick a candidate.
    pub fn pending(&self) -> Option<&FlatCommand> {
        self.pending.as_ref()
    }

    /// Replaces the input text and recomputes suggestions.
    pub fn set_input(&mut self, text: impl Into<String>, flats: &[Flat], parties: &[Party]) {
        self.input = text.into();
        self.suggestions.refresh(&self.input, flats, parties);
    }

    /// Handles a navigation key; returns `true` when the key was consumed.
    pub fn handle_key(&mut self, key: SuggestionKey) -> bool {
        if self.suggestions.is_empty() {
            return false;
        }
        match key {
            SuggestionKey::Down => self.suggestions.move_down(),
            SuggestionKey::Up => self.suggestions.move_up(),
            SuggestionKey::Enter => {
                if let Some(value) = self.suggestions.apply() {
                    self.input = value;
                }
            }
        }
        true
    }

    /// Executes the current input and records the outcome.
    pub fn submit<S: RecordStore>(
        &mut self,
        service: &AssistantService<'_, S>,
        today: NaiveDate,
    ) -> RepoResult<&CommandOutcome> {
        let input = self.input.trim().to_string();
        let outcome = service.execute_on(&input, today)?;
        self.pending = match parse_command(&input) {
            Ok(Command::Flat(command)) if outcome.ambiguity().is_some() => Some(command),
            _ => None,
        };
        Ok(self.record(outcome))
    }

    /// Drops a pending disambiguation; returns `true` when one was waiting.
    pub fn cancel_pending(&mut self) -> bool {
        let cancelled = self.pending.take().is_some();
        if cancelled {
            info!("event=assistant_pending module=assistant status=cancelled");
        }
        cancelled
    }

    /// Completes a pending ambiguous flat command with the chosen flat.
    pub fn resolve_pending<S: RecordStore>(
        &mut self,
        service: &AssistantService<'_, S>,
        flat_id: RecordId,
        today: NaiveDate,
    ) -> RepoResult<Option<&CommandOutcome>> {
        let Some(command) = self.pending.take() else {
            return Ok(None);
        };
        let outcome = service.execute_flat_with(&command, flat_id, today)?;
        Ok(Some(self.record(outcome)))
    }

    fn record(&mut self, outcome: CommandOutcome) -> &CommandOutcome {
        if outcome.clears_input() {
            self.input.clear();
            self.suggestions.clear();
        }
        if let Some(context) = &outcome.context {
            self.context = Some(context.clone());
        }
        self.logs.push(outcome.log.clone());
        &*self.last.insert(outcome)
    }
}
