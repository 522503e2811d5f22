//! Command-line shell over `homebook_core`.
//!
//! # Responsibility
//! - Open the configured store, gate on the persisted login session and
//!   forward commands to core services.
//! - Render outcomes as plain text; no business rules live here.

use anyhow::{bail, Context};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand, ValueEnum};
use homebook_core::{
    init_logging, open_db, parse_command, AppConfig, AssistantService, AssistantSession,
    Collection, Command, CommandOutcome, Flat, FlatCandidate, LogKind, NewFlat,
    NewTransaction, Party, PartyKey, PasswordGate, Project, RecordId, RecordService, RecordStore,
    ReconcileScope, ReportService, SessionState, SqliteRecordStore, Transaction, TransferService,
};
use log::info;
use std::io::{BufRead, Write};
use std::path::PathBuf;

/// Bookkeeping for home-construction projects.
#[derive(Debug, Parser)]
#[clap(version)]
struct Args {
    /// JSON config file; `HOMEBOOK_*` variables override it.
    #[clap(long, global = true)]
    config: Option<PathBuf>,
    /// Overrides the configured database path.
    #[clap(long, global = true)]
    db: Option<PathBuf>,
    #[clap(subcommand)]
    command: Cmd,
}

#[derive(Debug, Subcommand)]
enum Cmd {
    /// Unlock the session; reads the password from stdin when not given.
    Login {
        #[clap(long)]
        password: Option<String>,
    },
    Logout,
    /// Run one assistant command, e.g. `flat A1, bank 100, cash 50`.
    Run {
        text: String,
        /// Pick this flat when the reference is ambiguous.
        #[clap(long)]
        flat_id: Option<RecordId>,
        /// Default date for commands without `date`, as YYYY-MM-DD.
        #[clap(long)]
        today: Option<NaiveDate>,
    },
    /// Interactive assistant loop on stdin.
    Shell,
    /// Show completion suggestions for partial input.
    Suggest { text: String },
    /// Per-party reconciliation for one project.
    Dashboard {
        #[clap(long)]
        project: RecordId,
        #[clap(long, conflicts_with = "unassigned")]
        party: Option<RecordId>,
        /// Only the row for flats and payments with no party.
        #[clap(long)]
        unassigned: bool,
        #[clap(long)]
        completion: Option<u32>,
    },
    /// Write `Owner_Report_<date>.xlsx`.
    Report {
        #[clap(long)]
        out: PathBuf,
        #[clap(long)]
        project: Option<RecordId>,
        #[clap(long)]
        party: Option<RecordId>,
        #[clap(long)]
        completion: Option<u32>,
    },
    /// Dump every collection to `bookkeeping-export-<date>.xlsx`.
    Export {
        #[clap(long)]
        out: PathBuf,
    },
    /// Upsert every collection from an exported `.xlsx` workbook.
    Import { file: PathBuf },
    /// Delete every record.
    Clear {
        #[clap(long)]
        yes: bool,
    },
    #[clap(subcommand)]
    Add(AddCmd),
    #[clap(subcommand)]
    Edit(EditCmd),
    List {
        #[clap(value_enum)]
        collection: CollectionArg,
    },
    Delete {
        #[clap(value_enum)]
        collection: CollectionArg,
        id: RecordId,
    },
}

#[derive(Debug, Subcommand)]
enum AddCmd {
    Project {
        name: String,
        #[clap(long)]
        notes: Option<String>,
    },
    Party {
        name: String,
        #[clap(long)]
        contact: Option<String>,
        #[clap(long)]
        address: Option<String>,
    },
    Flat {
        #[clap(long)]
        project: RecordId,
        #[clap(long)]
        flat_no: String,
        #[clap(long)]
        area: f64,
        #[clap(long)]
        rate: f64,
        #[clap(long)]
        party: Option<RecordId>,
        #[clap(long)]
        notes: Option<String>,
    },
    Transaction {
        #[clap(long)]
        project: RecordId,
        #[clap(long)]
        flat: Option<RecordId>,
        #[clap(long)]
        party: Option<RecordId>,
        #[clap(long, default_value_t = 0.0)]
        bank: f64,
        #[clap(long, default_value_t = 0.0)]
        cash: f64,
        #[clap(long)]
        date: NaiveDate,
        #[clap(long)]
        reference: Option<String>,
        #[clap(long)]
        remarks: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
enum EditCmd {
    /// Replace a party's name, contact and address.
    Party {
        id: RecordId,
        #[clap(long)]
        name: String,
        #[clap(long)]
        contact: Option<String>,
        #[clap(long)]
        address: Option<String>,
    },
    /// Replace a transaction's links, amounts and date; the total is re-derived.
    Transaction {
        id: RecordId,
        #[clap(long)]
        project: RecordId,
        #[clap(long)]
        flat: Option<RecordId>,
        #[clap(long)]
        party: Option<RecordId>,
        #[clap(long, default_value_t = 0.0)]
        bank: f64,
        #[clap(long, default_value_t = 0.0)]
        cash: f64,
        #[clap(long)]
        date: NaiveDate,
        #[clap(long)]
        reference: Option<String>,
        #[clap(long)]
        remarks: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CollectionArg {
    Projects,
    Parties,
    Flats,
    Transactions,
}

impl From<CollectionArg> for Collection {
    fn from(value: CollectionArg) -> Self {
        match value {
            CollectionArg::Projects => Collection::Projects,
            CollectionArg::Parties => Collection::Parties,
            CollectionArg::Flats => Collection::Flats,
            CollectionArg::Transactions => Collection::Transactions,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let mut config = AppConfig::load(args.config.as_deref())?;
    if let Some(db) = args.db {
        config.db_path = db;
    }
    if let Err(err) = init_logging(&config.log_level, &config.log_dir) {
        eprintln!("logging disabled: {err}");
    }

    let conn = open_db(&config.db_path)
        .with_context(|| format!("opening {}", config.db_path.display()))?;
    let session = SessionState::new(&conn);

    let command = match args.command {
        Cmd::Login { password } => {
            let gate = PasswordGate::from_config(config.password_sha256.as_deref())?;
            let password = match password {
                Some(password) => password,
                None => read_line("Password: ")?,
            };
            session.login(&gate, &password)?;
            println!("Logged in.");
            return Ok(());
        }
        Cmd::Logout => {
            session.logout()?;
            println!("Logged out.");
            return Ok(());
        }
        command => command,
    };

    session
        .ensure_unlocked(config.password_sha256.as_deref())
        .context("set `password_sha256` and run `homebook login` first")?;
    info!(
        "event=cli_command module=cli status=start command={}",
        command_name(&command)
    );

    let store = SqliteRecordStore::new(&conn);
    let completion =
        |value: Option<u32>| f64::from(value.unwrap_or(config.default_completion_percent));

    match command {
        Cmd::Login { .. } | Cmd::Logout => {}
        Cmd::Run {
            text,
            flat_id,
            today,
        } => {
            let assistant = AssistantService::new(&store);
            let today = today.unwrap_or_else(|| Local::now().date_naive());
            let outcome = match (flat_id, parse_command(&text)) {
                (Some(flat_id), Ok(Command::Flat(command))) => {
                    assistant.execute_flat_with(&command, flat_id, today)?
                }
                _ => assistant.execute_on(&text, today)?,
            };
            print_outcome(&outcome);
            if let Some(candidates) = outcome.ambiguity() {
                for candidate in candidates {
                    println!("  {}\t{}", candidate.flat_id, candidate_label(candidate));
                }
                println!("Re-run with --flat-id <ID> to choose.");
            }
        }
        Cmd::Shell => run_shell(&store)?,
        Cmd::Suggest { text } => {
            let flats: Vec<Flat> = store.list_all()?;
            let parties: Vec<Party> = store.list_all()?;
            for suggestion in homebook_core::suggest(&text, &flats, &parties) {
                println!("{}", suggestion.display);
            }
        }
        Cmd::Dashboard {
            project,
            party,
            unassigned,
            completion: percent,
        } => {
            let filter = if unassigned {
                Some(PartyKey::Unassigned)
            } else {
                party.map(PartyKey::Assigned)
            };
            let dashboard =
                ReportService::new(&store).dashboard(project, filter, completion(percent))?;
            println!("S.No\tParty\tExpected\tReceived\t% Diff\tBalance");
            for row in &dashboard.rows {
                println!(
                    "{}\t{}\t{:.2}\t{:.2}\t{}%\t{:.2}",
                    row.s_no,
                    row.party_name,
                    row.expected,
                    row.received,
                    row.percent_difference,
                    row.balance_due
                );
            }
            println!(
                "Total expected {:.2}, received {:.2} ({:.1}%), outstanding {:.2}",
                dashboard.totals.total_expected,
                dashboard.totals.total_received,
                dashboard.totals.percent_collected,
                dashboard.totals.outstanding
            );
        }
        Cmd::Report {
            out,
            project,
            party,
            completion: percent,
        } => {
            let scope = ReconcileScope {
                project_id: project,
                party_id: party,
            };
            let path = ReportService::new(&store).write_owner_report(
                &out,
                scope,
                completion(percent),
                Local::now().date_naive(),
            )?;
            println!("Report written to {}", path.display());
        }
        Cmd::Export { out } => {
            let path = TransferService::new(&store).export_to(&out, Local::now().date_naive())?;
            println!("Exported to {}", path.display());
        }
        Cmd::Import { file } => {
            let summary = TransferService::new(&store).import_from(&file)?;
            println!(
                "Imported {} projects, {} parties, {} flats, {} transactions.",
                summary.projects, summary.parties, summary.flats, summary.transactions
            );
        }
        Cmd::Clear { yes } => {
            if !yes {
                bail!("refusing to clear all records without --yes");
            }
            TransferService::new(&store).clear_all()?;
            println!("All records deleted.");
        }
        Cmd::Add(add) => run_add(&RecordService::new(&store), add)?,
        Cmd::Edit(edit) => run_edit(&RecordService::new(&store), edit)?,
        Cmd::List { collection } => list(&store, collection.into())?,
        Cmd::Delete { collection, id } => {
            RecordService::new(&store).delete(collection.into(), id)?;
            println!("Deleted.");
        }
    }

    Ok(())
}

fn command_name(command: &Cmd) -> &'static str {
    match command {
        Cmd::Login { .. } => "login",
        Cmd::Logout => "logout",
        Cmd::Run { .. } => "run",
        Cmd::Shell => "shell",
        Cmd::Suggest { .. } => "suggest",
        Cmd::Dashboard { .. } => "dashboard",
        Cmd::Report { .. } => "report",
        Cmd::Export { .. } => "export",
        Cmd::Import { .. } => "import",
        Cmd::Clear { .. } => "clear",
        Cmd::Add(_) => "add",
        Cmd::Edit(_) => "edit",
        Cmd::List { .. } => "list",
        Cmd::Delete { .. } => "delete",
    }
}

fn run_add<S: RecordStore>(records: &RecordService<'_, S>, add: AddCmd) -> anyhow::Result<()> {
    let id = match add {
        AddCmd::Project { name, notes } => records.create_project(&name, notes.as_deref())?.id,
        AddCmd::Party {
            name,
            contact,
            address,
        } => {
            records
                .create_party(&name, contact.as_deref(), address.as_deref())?
                .id
        }
        AddCmd::Flat {
            project,
            flat_no,
            area,
            rate,
            party,
            notes,
        } => {
            records
                .create_flat(NewFlat {
                    project_id: project,
                    party_id: party,
                    flat_no,
                    area_sqft: area,
                    rate_per_sqft: rate,
                    notes,
                })?
                .id
        }
        AddCmd::Transaction {
            project,
            flat,
            party,
            bank,
            cash,
            date,
            reference,
            remarks,
        } => {
            records
                .record_transaction(NewTransaction {
                    project_id: project,
                    party_id: party,
                    flat_id: flat,
                    bank_amount: bank,
                    cash_amount: cash,
                    transaction_date: date,
                    reference,
                    remarks,
                })?
                .id
        }
    };
    println!("{id}");
    Ok(())
}

fn run_edit<S: RecordStore>(records: &RecordService<'_, S>, edit: EditCmd) -> anyhow::Result<()> {
    match edit {
        EditCmd::Party {
            id,
            name,
            contact,
            address,
        } => {
            records.update_party(id, &name, contact.as_deref(), address.as_deref())?;
        }
        EditCmd::Transaction {
            id,
            project,
            flat,
            party,
            bank,
            cash,
            date,
            reference,
            remarks,
        } => {
            let transaction = records.edit_transaction(
                id,
                NewTransaction {
                    project_id: project,
                    party_id: party,
                    flat_id: flat,
                    bank_amount: bank,
                    cash_amount: cash,
                    transaction_date: date,
                    reference,
                    remarks,
                },
            )?;
            println!("Total {:.2}", transaction.total_amount);
        }
    }
    println!("Updated.");
    Ok(())
}

fn list<S: RecordStore>(store: &S, collection: Collection) -> anyhow::Result<()> {
    match collection {
        Collection::Projects => {
            for project in store.list_all::<Project>()? {
                println!("{}\t{}", project.id, project.name);
            }
        }
        Collection::Parties => {
            for party in store.list_all::<Party>()? {
                println!(
                    "{}\t{}\t{}",
                    party.id,
                    party.name,
                    party.contact.as_deref().unwrap_or("-")
                );
            }
        }
        Collection::Flats => {
            for flat in store.list_all::<Flat>()? {
                println!(
                    "{}\t{}\t{:.2}\t{}",
                    flat.id,
                    flat.flat_no,
                    flat.amount,
                    flat.party_id.map_or_else(|| "-".to_string(), |id| id.to_string())
                );
            }
        }
        Collection::Transactions => {
            for transaction in store.list_all::<Transaction>()? {
                println!(
                    "{}\t{}\t{:.2}\t{:.2}\t{:.2}",
                    transaction.id,
                    transaction.transaction_date,
                    transaction.bank_amount,
                    transaction.cash_amount,
                    transaction.total_amount
                );
            }
        }
    }
    Ok(())
}

/// Reaction to a line typed while an ambiguous flat choice is pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingLine {
    Pick(RecordId),
    /// A number outside the offered range.
    OutOfRange,
    /// Empty line: drop the choice.
    Cancel,
    /// Anything else: drop the choice and run the line as a command.
    NewCommand,
}

fn classify_pending_line(outcome: Option<&CommandOutcome>, line: &str) -> PendingLine {
    if line.is_empty() {
        return PendingLine::Cancel;
    }
    match pick_candidate(outcome, line) {
        Some(flat_id) => PendingLine::Pick(flat_id),
        None if line.parse::<usize>().is_ok() => PendingLine::OutOfRange,
        None => PendingLine::NewCommand,
    }
}

/// Line-oriented assistant: each line is a command; after an ambiguous flat
/// reference the next line picks a candidate by number, an empty line
/// cancels and any other text runs as a new command.
fn run_shell<S: RecordStore>(store: &S) -> anyhow::Result<()> {
    let assistant = AssistantService::new(store);
    let mut session = AssistantSession::new();
    let stdin = std::io::stdin();

    prompt("> ")?;
    for line in stdin.lock().lines() {
        let line = line?;
        let line = line.trim();
        let today = Local::now().date_naive();

        if session.pending().is_some() {
            match classify_pending_line(session.last_outcome(), line) {
                PendingLine::Pick(flat_id) => {
                    if let Some(outcome) = session.resolve_pending(&assistant, flat_id, today)? {
                        print_outcome(outcome);
                    }
                    prompt("> ")?;
                    continue;
                }
                PendingLine::OutOfRange => {
                    println!("Pick one of the numbers above, or press Enter to cancel.");
                    prompt("> ")?;
                    continue;
                }
                PendingLine::Cancel => {
                    session.cancel_pending();
                    println!("Choice cancelled.");
                }
                PendingLine::NewCommand => {
                    session.cancel_pending();
                }
            }
        }

        if !line.is_empty() {
            let flats: Vec<Flat> = store.list_all()?;
            let parties: Vec<Party> = store.list_all()?;
            session.set_input(line, &flats, &parties);
            let outcome = session.submit(&assistant, today)?;
            print_outcome(outcome);
            if let Some(candidates) = outcome.ambiguity() {
                print_candidates(candidates);
            }
        }
        prompt("> ")?;
    }
    Ok(())
}

fn pick_candidate(outcome: Option<&CommandOutcome>, line: &str) -> Option<RecordId> {
    let candidates = outcome?.ambiguity()?;
    let index: usize = line.parse().ok()?;
    candidates
        .get(index.checked_sub(1)?)
        .map(|candidate| candidate.flat_id)
}

fn print_candidates(candidates: &[FlatCandidate]) {
    for (index, candidate) in candidates.iter().enumerate() {
        println!("  {}. {}", index + 1, candidate_label(candidate));
    }
}

fn candidate_label(candidate: &FlatCandidate) -> String {
    format!(
        "{} ({})",
        candidate.flat_no,
        candidate.project_name.as_deref().unwrap_or("Unknown project")
    )
}

fn print_outcome(outcome: &CommandOutcome) {
    let tag = match outcome.log.kind {
        LogKind::Info => "info",
        LogKind::Success => "ok",
        LogKind::Error => "error",
    };
    println!("[{tag}] {}", outcome.log.message);
}

fn prompt(text: &str) -> anyhow::Result<()> {
    print!("{text}");
    std::io::stdout().flush()?;
    Ok(())
}

fn read_line(label: &str) -> anyhow::Result<String> {
    prompt(label)?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

#[cfg(test)]
mod tests {
    use super::{classify_pending_line, PendingLine};
    use homebook_core::db::open_db_in_memory;
    use homebook_core::{
        AssistantService, AssistantSession, Flat, Project, RecordStore, SqliteRecordStore,
    };

    #[test]
    fn pending_choice_accepts_numbers_and_escapes() {
        let conn = open_db_in_memory().unwrap();
        let store = SqliteRecordStore::new(&conn);
        let north = Project::new("North");
        let south = Project::new("South");
        let north_flat = Flat::new(north.id, "C3", 1.0, 1.0);
        store.insert(&north).unwrap();
        store.insert(&south).unwrap();
        store.insert(&north_flat).unwrap();
        store.insert(&Flat::new(south.id, "C3", 1.0, 1.0)).unwrap();
        let assistant = AssistantService::new(&store);
        let mut session = AssistantSession::new();
        session.set_input("flat C3 bank 10", &[], &[]);
        let today = chrono::NaiveDate::from_ymd_opt(2025, 3, 15).unwrap();
        session.submit(&assistant, today).unwrap();

        let outcome = session.last_outcome();
        let candidates = outcome.and_then(|outcome| outcome.ambiguity()).unwrap();
        assert_eq!(
            classify_pending_line(outcome, "1"),
            PendingLine::Pick(candidates[0].flat_id)
        );
        assert_eq!(classify_pending_line(outcome, "3"), PendingLine::OutOfRange);
        assert_eq!(classify_pending_line(outcome, "0"), PendingLine::OutOfRange);
        assert_eq!(classify_pending_line(outcome, ""), PendingLine::Cancel);
        assert_eq!(
            classify_pending_line(outcome, "party John"),
            PendingLine::NewCommand
        );
    }
}
