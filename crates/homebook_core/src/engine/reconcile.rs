//! Party-level reconciliation of expected versus received amounts.
//!
//! # Responsibility
//! - Group flats (expected) and transactions (received) by party.
//! - Rank parties by how far they are from fully collected.
//!
//! # Invariants
//! - Output rows partition the distinct party keys of the inputs.
//! - `percent_difference` is `0` whenever `expected == 0`.
//! - Rows are non-increasing in `percent_difference`; ties keep first-seen
//!   order (flats scanned before transactions).
//! - Unresolved party ids never fail; they display as `Unknown Party`.

use crate::model::flat::Flat;
use crate::model::party::Party;
use crate::model::transaction::Transaction;
use crate::model::RecordId;
use std::collections::HashMap;
use std::fmt::{Display, Formatter};

/// Display name for keys that do not resolve to a stored party.
pub const UNKNOWN_PARTY_NAME: &str = "Unknown Party";
/// Textual form of the unassigned group key.
pub const UNASSIGNED_KEY: &str = "UNASSIGNED";

/// Grouping key: a party id, or the sentinel for records without one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartyKey {
    Assigned(RecordId),
    Unassigned,
}

impl PartyKey {
    pub fn from_party_id(party_id: Option<RecordId>) -> Self {
        party_id.map_or(Self::Unassigned, Self::Assigned)
    }

    pub fn party_id(self) -> Option<RecordId> {
        match self {
            Self::Assigned(id) => Some(id),
            Self::Unassigned => None,
        }
    }
}

impl Display for PartyKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Assigned(id) => write!(f, "{id}"),
            Self::Unassigned => f.write_str(UNASSIGNED_KEY),
        }
    }
}

/// One ranked party line of the reconciliation grid.
#[derive(Debug, Clone, PartialEq)]
pub struct PartyRow {
    /// 1-based rank assigned after sorting.
    pub s_no: usize,
    pub party_key: PartyKey,
    pub party_name: String,
    pub expected: f64,
    pub received: f64,
    /// `100 - round(received / expected * 100)`; may be negative when a
    /// party paid more than expected.
    pub percent_difference: i64,
    pub balance_due: f64,
}

/// Optional project/party restriction applied before aggregation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileScope {
    pub project_id: Option<RecordId>,
    pub party_id: Option<RecordId>,
}

impl ReconcileScope {
    pub fn project(project_id: RecordId) -> Self {
        Self {
            project_id: Some(project_id),
            party_id: None,
        }
    }

    pub fn admits_flat(&self, flat: &Flat) -> bool {
        self.project_id.map_or(true, |id| flat.project_id == id)
            && self.party_id.map_or(true, |id| flat.party_id == Some(id))
    }

    pub fn admits_transaction(&self, transaction: &Transaction) -> bool {
        self.project_id.map_or(true, |id| transaction.project_id == id)
            && self.party_id.map_or(true, |id| transaction.party_id == Some(id))
    }

    pub fn flats<'a>(&self, flats: &'a [Flat]) -> Vec<&'a Flat> {
        flats.iter().filter(|flat| self.admits_flat(flat)).collect()
    }

    pub fn transactions<'a>(&self, transactions: &'a [Transaction]) -> Vec<&'a Transaction> {
        transactions
            .iter()
            .filter(|transaction| self.admits_transaction(transaction))
            .collect()
    }
}

/// Portfolio-level KPIs over a set of reconciliation rows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconcileTotals {
    pub total_expected: f64,
    pub total_received: f64,
    /// Completion percentage the expectation was computed with.
    pub percent_expected: f64,
    /// `received / expected * 100`, `0` when nothing is expected.
    pub percent_collected: f64,
    pub outstanding: f64,
}

impl ReconcileTotals {
    pub fn from_rows(rows: &[PartyRow], completion_percent: f64) -> Self {
        let total_expected: f64 = rows.iter().map(|row| row.expected).sum();
        let total_received: f64 = rows.iter().map(|row| row.received).sum();
        let percent_collected = if total_expected == 0.0 {
            0.0
        } else {
            total_received / total_expected * 100.0
        };
        Self {
            total_expected,
            total_received,
            percent_expected: completion_percent,
            percent_collected,
            outstanding: total_expected - total_received,
        }
    }
}

/// Expected/received figures for a single party.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PartyBalance {
    pub completion_percent: f64,
    pub expected: f64,
    pub received: f64,
    pub balance: f64,
}

/// Share of a flat's amount that is due at `completion_percent`.
pub fn expected_share(flat: &Flat, completion_percent: f64) -> f64 {
    flat.amount * (completion_percent / 100.0)
}

/// Computes one party's balance across every project.
pub fn party_balance(
    party_id: RecordId,
    flats: &[Flat],
    transactions: &[Transaction],
    completion_percent: f64,
) -> PartyBalance {
    let expected: f64 = flats
        .iter()
        .filter(|flat| flat.party_id == Some(party_id))
        .map(|flat| expected_share(flat, completion_percent))
        .sum();
    let received: f64 = transactions
        .iter()
        .filter(|transaction| transaction.party_id == Some(party_id))
        .map(|transaction| transaction.total_amount)
        .sum();
    PartyBalance {
        completion_percent,
        expected,
        received,
        balance: expected - received,
    }
}

/// `100 - round_half_up(received / expected * 100)`, or `0` with nothing
/// expected.
///
/// Ratios beyond the `i64` range saturate instead of wrapping.
pub fn percent_difference(expected: f64, received: f64) -> i64 {
    if expected == 0.0 {
        return 0;
    }
    let collected = (received / expected * 100.0 + 0.5).floor();
    100i64.saturating_sub(collected as i64)
}

#[derive(Debug, Default)]
struct Accumulator {
    expected: f64,
    received: f64,
}

fn group_slot<'g>(
    groups: &'g mut HashMap<PartyKey, Accumulator>,
    order: &mut Vec<PartyKey>,
    key: PartyKey,
) -> &'g mut Accumulator {
    groups.entry(key).or_insert_with(|| {
        order.push(key);
        Accumulator::default()
    })
}

/// Builds the ranked per-party reconciliation grid.
///
/// Callers pre-filter `flats` and `transactions` (see `ReconcileScope`);
/// `filter_party` then keeps only the matching row after aggregation.
pub fn reconcile<'a, F, T>(
    flats: F,
    transactions: T,
    parties: &[Party],
    completion_percent: f64,
    filter_party: Option<PartyKey>,
) -> Vec<PartyRow>
where
    F: IntoIterator<Item = &'a Flat>,
    T: IntoIterator<Item = &'a Transaction>,
{
    let mut order: Vec<PartyKey> = Vec::new();
    let mut groups: HashMap<PartyKey, Accumulator> = HashMap::new();

    for flat in flats {
        let key = PartyKey::from_party_id(flat.party_id);
        group_slot(&mut groups, &mut order, key).expected +=
            expected_share(flat, completion_percent);
    }
    for transaction in transactions {
        let key = PartyKey::from_party_id(transaction.party_id);
        group_slot(&mut groups, &mut order, key).received += transaction.total_amount;
    }

    let names: HashMap<RecordId, &str> = parties
        .iter()
        .map(|party| (party.id, party.name.as_str()))
        .collect();

    let mut rows: Vec<PartyRow> = order
        .into_iter()
        .filter(|key| filter_party.map_or(true, |wanted| wanted == *key))
        .filter_map(|key| {
            let totals = groups.get(&key)?;
            let party_name = key
                .party_id()
                .and_then(|id| names.get(&id).copied())
                .unwrap_or(UNKNOWN_PARTY_NAME)
                .to_string();
            Some(PartyRow {
                s_no: 0,
                party_key: key,
                party_name,
                expected: totals.expected,
                received: totals.received,
                percent_difference: percent_difference(totals.expected, totals.received),
                balance_due: totals.expected - totals.received,
            })
        })
        .collect();

    rows.sort_by(|left, right| right.percent_difference.cmp(&left.percent_difference));
    for (index, row) in rows.iter_mut().enumerate() {
        row.s_no = index + 1;
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::{
        party_balance, percent_difference, reconcile, PartyKey, ReconcileScope, ReconcileTotals,
        UNKNOWN_PARTY_NAME,
    };
    use crate::model::flat::Flat;
    use crate::model::party::Party;
    use crate::model::transaction::Transaction;
    use chrono::NaiveDate;
    use std::collections::HashSet;
    use uuid::Uuid;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 11, 1).unwrap()
    }

    fn flat(project: Uuid, party: Option<Uuid>, amount: f64) -> Flat {
        let mut flat = Flat::new(project, "A1", 1.0, amount);
        flat.party_id = party;
        flat
    }

    fn receipt(project: Uuid, party: Option<Uuid>, total: f64) -> Transaction {
        let mut transaction = Transaction::new(project, total, 0.0, date());
        transaction.party_id = party;
        transaction
    }

    #[test]
    fn percent_difference_short_circuits_zero_expected() {
        assert_eq!(percent_difference(0.0, 0.0), 0);
        assert_eq!(percent_difference(0.0, 500.0), 0);
    }

    #[test]
    fn percent_difference_rounds_half_up_before_subtracting() {
        // 12.5% collected rounds to 13, not 12.
        assert_eq!(percent_difference(1000.0, 125.0), 87);
        assert_eq!(percent_difference(1000.0, 300.0), 70);
    }

    #[test]
    fn over_collection_keeps_negative_sign() {
        assert_eq!(percent_difference(100.0, 150.0), -50);
    }

    #[test]
    fn extreme_ratios_saturate() {
        assert_eq!(percent_difference(1.0, -1.0e17), i64::MAX);
        assert_eq!(percent_difference(1.0, 1.0e300), 100 - i64::MAX);
        assert_eq!(percent_difference(1.0e-300, 1.0e300), 100 - i64::MAX);
    }

    #[test]
    fn rows_partition_party_keys_including_unassigned() {
        let project = Uuid::new_v4();
        let alice = Party::new("Alice");
        let bob = Party::new("Bob");
        let ghost = Uuid::new_v4();
        let flats = vec![
            flat(project, Some(alice.id), 1000.0),
            flat(project, Some(alice.id), 500.0),
            flat(project, None, 200.0),
        ];
        let transactions = vec![
            receipt(project, Some(bob.id), 50.0),
            receipt(project, Some(ghost), 10.0),
            receipt(project, Some(alice.id), 100.0),
        ];

        let rows = reconcile(&flats, &transactions, &[alice.clone(), bob.clone()], 100.0, None);

        let keys: HashSet<PartyKey> = rows.iter().map(|row| row.party_key).collect();
        assert_eq!(rows.len(), 4);
        assert_eq!(keys.len(), 4);
        assert!(keys.contains(&PartyKey::Unassigned));
        assert!(keys.contains(&PartyKey::Assigned(ghost)));

        let alice_row = rows
            .iter()
            .find(|row| row.party_key == PartyKey::Assigned(alice.id))
            .unwrap();
        assert_eq!(alice_row.expected, 1500.0);
        assert_eq!(alice_row.received, 100.0);
        assert_eq!(alice_row.balance_due, 1400.0);

        let ghost_row = rows
            .iter()
            .find(|row| row.party_key == PartyKey::Assigned(ghost))
            .unwrap();
        assert_eq!(ghost_row.party_name, UNKNOWN_PARTY_NAME);
        assert_eq!(ghost_row.expected, 0.0);
        assert_eq!(ghost_row.percent_difference, 0);
    }

    #[test]
    fn rows_are_sorted_descending_and_ranked_after_sorting() {
        let project = Uuid::new_v4();
        let paid = Party::new("Paid");
        let partial = Party::new("Partial");
        let none = Party::new("Nothing");
        let flats = vec![
            flat(project, Some(paid.id), 100.0),
            flat(project, Some(partial.id), 100.0),
            flat(project, Some(none.id), 100.0),
        ];
        let transactions = vec![
            receipt(project, Some(paid.id), 100.0),
            receipt(project, Some(partial.id), 40.0),
        ];

        let rows = reconcile(&flats, &transactions, &[paid, partial, none], 100.0, None);

        let percents: Vec<i64> = rows.iter().map(|row| row.percent_difference).collect();
        assert_eq!(percents, vec![100, 60, 0]);
        let ranks: Vec<usize> = rows.iter().map(|row| row.s_no).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
        assert_eq!(rows[0].party_name, "Nothing");
    }

    #[test]
    fn ties_keep_first_seen_order() {
        let project = Uuid::new_v4();
        let first = Party::new("First");
        let second = Party::new("Second");
        let flats = vec![
            flat(project, Some(first.id), 100.0),
            flat(project, Some(second.id), 100.0),
        ];

        let none: Vec<Transaction> = Vec::new();

        let rows = reconcile(&flats, &none, &[second.clone(), first.clone()], 100.0, None);

        assert_eq!(rows[0].party_key, PartyKey::Assigned(first.id));
        assert_eq!(rows[1].party_key, PartyKey::Assigned(second.id));
    }

    #[test]
    fn completion_percent_scales_expected() {
        let project = Uuid::new_v4();
        let party = Party::new("Half");
        let flats = vec![flat(project, Some(party.id), 1000.0)];
        let transactions = vec![receipt(project, Some(party.id), 250.0)];

        let rows = reconcile(&flats, &transactions, &[party], 50.0, None);

        assert_eq!(rows[0].expected, 500.0);
        assert_eq!(rows[0].percent_difference, 50);
    }

    #[test]
    fn party_filter_keeps_only_matching_row() {
        let project = Uuid::new_v4();
        let alice = Party::new("Alice");
        let bob = Party::new("Bob");
        let flats = vec![
            flat(project, Some(alice.id), 100.0),
            flat(project, Some(bob.id), 100.0),
        ];

        let none: Vec<Transaction> = Vec::new();

        let rows = reconcile(
            &flats,
            &none,
            &[alice, bob.clone()],
            100.0,
            Some(PartyKey::Assigned(bob.id)),
        );

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].party_name, "Bob");
        assert_eq!(rows[0].s_no, 1);
    }

    #[test]
    fn reconcile_is_repeatable() {
        let project = Uuid::new_v4();
        let party = Party::new("Same");
        let flats = vec![flat(project, Some(party.id), 700.0), flat(project, None, 10.0)];
        let transactions = vec![receipt(project, Some(party.id), 70.0)];
        let parties = vec![party];

        let first = reconcile(&flats, &transactions, &parties, 80.0, None);
        let second = reconcile(&flats, &transactions, &parties, 80.0, None);
        assert_eq!(first, second);
    }

    #[test]
    fn scope_filters_by_project_and_party() {
        let project_a = Uuid::new_v4();
        let project_b = Uuid::new_v4();
        let party = Uuid::new_v4();
        let flats = vec![
            flat(project_a, Some(party), 100.0),
            flat(project_b, Some(party), 100.0),
            flat(project_a, None, 100.0),
        ];

        let by_project = ReconcileScope::project(project_a);
        assert_eq!(by_project.flats(&flats).len(), 2);

        let by_both = ReconcileScope {
            project_id: Some(project_a),
            party_id: Some(party),
        };
        assert_eq!(by_both.flats(&flats).len(), 1);
    }

    #[test]
    fn totals_and_party_balance_add_up() {
        let project = Uuid::new_v4();
        let party = Party::new("John Doe");
        let flats = vec![flat(project, Some(party.id), 1000.0)];
        let transactions = vec![receipt(project, Some(party.id), 300.0)];

        let balance = party_balance(party.id, &flats, &transactions, 50.0);
        assert_eq!(balance.expected, 500.0);
        assert_eq!(balance.received, 300.0);
        assert_eq!(balance.balance, 200.0);

        let rows = reconcile(&flats, &transactions, &[party], 50.0, None);
        let totals = ReconcileTotals::from_rows(&rows, 50.0);
        assert_eq!(totals.total_expected, 500.0);
        assert!((totals.percent_collected - 60.0).abs() < 1e-9);
        assert_eq!(totals.outstanding, 200.0);
    }
}
