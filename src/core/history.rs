//! History projection
//!
//! Turns ledger rows into account-centric views: a paginated history with the
//! direction of each entry from the account's perspective, and daily/weekly
//! expense and income summaries.
//!
//! Read paths only look participants up; an account that never transacted has
//! no participant and gets empty views.

use crate::core::participant::ParticipantResolver;
use crate::core::traits::LedgerStore;
use crate::types::{
    AccountId, ActivityRow, Amount, DailySummary, Direction, HistoryEntry, HistoryPage,
    HistoryRow, LedgerError, ParticipantId, ParticipantKind, WeeklySummary,
};
use chrono::{DateTime, Datelike, Months, NaiveDate, NaiveTime, TimeDelta, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Number of days covered by the daily summary, today included
pub const DAILY_SUMMARY_DAYS: i64 = 7;

/// Builds account-centric read views
#[derive(Clone)]
pub struct HistoryProjector {
    store: Arc<dyn LedgerStore>,
    resolver: ParticipantResolver,
}

impl HistoryProjector {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        HistoryProjector {
            resolver: ParticipantResolver::new(Arc::clone(&store)),
            store,
        }
    }

    /// List one page of an account's history, newest first
    ///
    /// # Arguments
    ///
    /// * `account` - Account whose history is listed
    /// * `page` - 1-indexed page number
    /// * `page_size` - Entries per page
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidPage`] for page 0.
    pub async fn list_history(
        &self,
        account: AccountId,
        page: u32,
        page_size: u32,
    ) -> Result<HistoryPage, LedgerError> {
        if page == 0 {
            return Err(LedgerError::invalid_page(page));
        }
        let page_size = page_size.max(1);

        let Some(participant) = self
            .resolver
            .lookup(ParticipantKind::Wallet, account)
            .await?
        else {
            return Ok(HistoryPage {
                page,
                page_size,
                entries: Vec::new(),
                total_count: 0,
                total_pages: 0,
            });
        };

        let offset = u64::from(page - 1) * u64::from(page_size);
        let (rows, total_count) = self.store.history(participant.id, page_size, offset).await?;

        Ok(HistoryPage {
            page,
            page_size,
            entries: rows
                .into_iter()
                .map(|row| history_entry(row, participant.id))
                .collect(),
            total_count,
            total_pages: total_count.div_ceil(u64::from(page_size)),
        })
    }

    /// Expense and income of each of the last seven days, oldest first
    pub async fn daily_summary(
        &self,
        account: AccountId,
        today: NaiveDate,
    ) -> Result<Vec<DailySummary>, LedgerError> {
        let first_day = today - TimeDelta::days(DAILY_SUMMARY_DAYS - 1);
        let (participant, rows) = self
            .activity(account, start_of(first_day), start_of(today + TimeDelta::days(1)))
            .await?;
        Ok(summarize_daily(&rows, participant, today))
    }

    /// Expense and income per week of the current month, for weeks with activity
    pub async fn weekly_summary(
        &self,
        account: AccountId,
        today: NaiveDate,
    ) -> Result<Vec<WeeklySummary>, LedgerError> {
        let (month_start, next_month_start) = month_bounds(today);
        let (participant, rows) = self
            .activity(account, start_of(month_start), start_of(next_month_start))
            .await?;
        Ok(summarize_weekly(&rows, participant))
    }

    async fn activity(
        &self,
        account: AccountId,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<(ParticipantId, Vec<ActivityRow>), LedgerError> {
        match self.resolver.lookup(ParticipantKind::Wallet, account).await? {
            Some(participant) => Ok((
                participant.id,
                self.store.activity(participant.id, since, until).await?,
            )),
            None => Ok((0, Vec::new())),
        }
    }
}

/// Project a stored row onto the perspective of `participant`
pub fn history_entry(row: HistoryRow, participant: ParticipantId) -> HistoryEntry {
    let tx = row.transaction;
    HistoryEntry {
        id: tx.id,
        kind: tx.kind,
        direction: if tx.sender == participant {
            Direction::Debit
        } else {
            Direction::Credit
        },
        amount: tx.amount,
        total: tx.total,
        note: tx.note,
        counterparty: row.counterparty,
        created_at: tx.created_at,
    }
}

/// Sum activity per day over the seven days ending at `today`
///
/// Always returns seven entries in ascending date order; days without activity
/// are zero. Expense sums the totals where `participant` sent, income where it
/// received.
pub fn summarize_daily(
    rows: &[ActivityRow],
    participant: ParticipantId,
    today: NaiveDate,
) -> Vec<DailySummary> {
    let mut days: BTreeMap<NaiveDate, DailySummary> = (0..DAILY_SUMMARY_DAYS)
        .rev()
        .map(|back| {
            let date = today - TimeDelta::days(back);
            (
                date,
                DailySummary {
                    date,
                    total_expense: 0,
                    total_income: 0,
                },
            )
        })
        .collect();

    for row in rows {
        if let Some(day) = days.get_mut(&row.created_at.date_naive()) {
            let (expense, income) = split(row, participant);
            day.total_expense = day.total_expense.saturating_add(expense);
            day.total_income = day.total_income.saturating_add(income);
        }
    }

    days.into_values().collect()
}

/// Sum activity per Monday-starting week, ascending, skipping empty weeks
pub fn summarize_weekly(rows: &[ActivityRow], participant: ParticipantId) -> Vec<WeeklySummary> {
    let mut weeks: BTreeMap<NaiveDate, WeeklySummary> = BTreeMap::new();

    for row in rows {
        let (expense, income) = split(row, participant);
        if expense == 0 && income == 0 {
            continue;
        }

        let week_start = week_start(row.created_at.date_naive());
        let week = weeks.entry(week_start).or_insert_with(|| WeeklySummary {
            week_start,
            week_end: week_start + TimeDelta::days(6),
            total_expense: 0,
            total_income: 0,
        });
        week.total_expense = week.total_expense.saturating_add(expense);
        week.total_income = week.total_income.saturating_add(income);
    }

    weeks.into_values().collect()
}

/// `(expense, income)` contribution of a row
fn split(row: &ActivityRow, participant: ParticipantId) -> (Amount, Amount) {
    let expense = if row.sender == participant { row.total } else { 0 };
    let income = if row.receiver == participant { row.total } else { 0 };
    (expense, income)
}

fn week_start(date: NaiveDate) -> NaiveDate {
    date - TimeDelta::days(i64::from(date.weekday().num_days_from_monday()))
}

fn month_bounds(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let month_start = today.with_day(1).unwrap_or(today);
    let next_month_start = month_start
        .checked_add_months(Months::new(1))
        .unwrap_or(NaiveDate::MAX);
    (month_start, next_month_start)
}

fn start_of(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}
