//! Journal entry and line rows

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, Postgres, QueryBuilder};
use std::collections::HashMap;
use uuid::Uuid;

use core_kernel::{AccountId, JournalEntryId, JournalLineId, UserId};
use domain_ledger::journal::{EntryStatus, EntryType, JournalEntry, JournalLine, JournalQuery};
use domain_ledger::ports::{PostedLine, PostedLineQuery};

use crate::error::DatabaseError;

/// Name of the counter row in `journal_sequences`
const ENTRY_SEQUENCE: &str = "journal_entry";

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "entry_type", rename_all = "snake_case")]
pub enum DbEntryType {
    Sales,
    Purchase,
    Payment,
    Receipt,
    Adjustment,
    Payroll,
    Manual,
}

impl From<EntryType> for DbEntryType {
    fn from(value: EntryType) -> Self {
        match value {
            EntryType::Sales => DbEntryType::Sales,
            EntryType::Purchase => DbEntryType::Purchase,
            EntryType::Payment => DbEntryType::Payment,
            EntryType::Receipt => DbEntryType::Receipt,
            EntryType::Adjustment => DbEntryType::Adjustment,
            EntryType::Payroll => DbEntryType::Payroll,
            EntryType::Manual => DbEntryType::Manual,
        }
    }
}

impl From<DbEntryType> for EntryType {
    fn from(value: DbEntryType) -> Self {
        match value {
            DbEntryType::Sales => EntryType::Sales,
            DbEntryType::Purchase => EntryType::Purchase,
            DbEntryType::Payment => EntryType::Payment,
            DbEntryType::Receipt => EntryType::Receipt,
            DbEntryType::Adjustment => EntryType::Adjustment,
            DbEntryType::Payroll => EntryType::Payroll,
            DbEntryType::Manual => EntryType::Manual,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "entry_status", rename_all = "snake_case")]
pub enum DbEntryStatus {
    Draft,
    Posted,
}

impl From<EntryStatus> for DbEntryStatus {
    fn from(value: EntryStatus) -> Self {
        match value {
            EntryStatus::Draft => DbEntryStatus::Draft,
            EntryStatus::Posted => DbEntryStatus::Posted,
        }
    }
}

impl From<DbEntryStatus> for EntryStatus {
    fn from(value: DbEntryStatus) -> Self {
        match value {
            DbEntryStatus::Draft => EntryStatus::Draft,
            DbEntryStatus::Posted => EntryStatus::Posted,
        }
    }
}

/// One row of `journal_entries`; lines are loaded separately
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EntryRow {
    pub entry_id: Uuid,
    pub entry_number: String,
    pub sequence: i64,
    pub entry_date: NaiveDate,
    pub entry_type: DbEntryType,
    pub description: String,
    pub reference_no: Option<String>,
    pub status: DbEntryStatus,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub posted_by: Option<Uuid>,
    pub posted_at: Option<DateTime<Utc>>,
    pub reversed_entry_id: Option<Uuid>,
    pub reversal_entry_id: Option<Uuid>,
    pub version: i64,
}

impl EntryRow {
    pub fn into_entry(self, lines: Vec<JournalLine>) -> JournalEntry {
        JournalEntry {
            id: JournalEntryId::from_uuid(self.entry_id),
            entry_number: self.entry_number,
            sequence: self.sequence,
            entry_date: self.entry_date,
            entry_type: self.entry_type.into(),
            description: self.description,
            reference_no: self.reference_no,
            status: self.status.into(),
            lines,
            created_by: UserId::from_uuid(self.created_by),
            created_at: self.created_at,
            updated_at: self.updated_at,
            posted_by: self.posted_by.map(UserId::from_uuid),
            posted_at: self.posted_at,
            reversed_entry_id: self.reversed_entry_id.map(JournalEntryId::from_uuid),
            reversal_entry_id: self.reversal_entry_id.map(JournalEntryId::from_uuid),
            version: self.version,
        }
    }
}

/// One row of `journal_lines`
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LineRow {
    pub line_id: Uuid,
    pub entry_id: Uuid,
    pub line_no: i32,
    pub account_id: Uuid,
    pub debit: Decimal,
    pub credit: Decimal,
    pub description: Option<String>,
}

impl TryFrom<LineRow> for JournalLine {
    type Error = DatabaseError;

    fn try_from(row: LineRow) -> Result<Self, Self::Error> {
        let line_no = u32::try_from(row.line_no)
            .map_err(|_| DatabaseError::DecodeFailed(format!("negative line_no {}", row.line_no)))?;
        Ok(JournalLine {
            id: JournalLineId::from_uuid(row.line_id),
            line_no,
            account_id: AccountId::from_uuid(row.account_id),
            debit: row.debit,
            credit: row.credit,
            description: row.description,
        })
    }
}

/// A posted line joined with its entry header
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PostedLineRow {
    pub entry_id: Uuid,
    pub entry_number: String,
    pub sequence: i64,
    pub entry_date: NaiveDate,
    pub entry_type: DbEntryType,
    pub entry_description: String,
    pub reference_no: Option<String>,
    pub line_no: i32,
    pub account_id: Uuid,
    pub debit: Decimal,
    pub credit: Decimal,
    pub description: Option<String>,
}

impl TryFrom<PostedLineRow> for PostedLine {
    type Error = DatabaseError;

    fn try_from(row: PostedLineRow) -> Result<Self, Self::Error> {
        let line_no = u32::try_from(row.line_no)
            .map_err(|_| DatabaseError::DecodeFailed(format!("negative line_no {}", row.line_no)))?;
        Ok(PostedLine {
            entry_id: JournalEntryId::from_uuid(row.entry_id),
            entry_number: row.entry_number,
            sequence: row.sequence,
            entry_date: row.entry_date,
            entry_type: row.entry_type.into(),
            entry_description: row.entry_description,
            reference_no: row.reference_no,
            line_no,
            account_id: AccountId::from_uuid(row.account_id),
            debit: row.debit,
            credit: row.credit,
            description: row.description,
        })
    }
}

const ENTRY_COLUMNS: &str = "entry_id, entry_number, sequence, entry_date, entry_type, description, \
     reference_no, status, created_by, created_at, updated_at, posted_by, posted_at, \
     reversed_entry_id, reversal_entry_id, version";

/// Increments the entry counter and returns the new value
///
/// The counter row stays locked until the transaction ends, which serialises
/// concurrent inserts and hands out gap-free numbers.
pub async fn next_sequence(conn: &mut PgConnection) -> Result<i64, DatabaseError> {
    Ok(sqlx::query_scalar::<_, i64>(
        "UPDATE journal_sequences SET last_value = last_value + 1 WHERE name = $1 RETURNING last_value",
    )
    .bind(ENTRY_SEQUENCE)
    .fetch_one(conn)
    .await?)
}

pub async fn insert_entry(conn: &mut PgConnection, entry: &JournalEntry) -> Result<(), DatabaseError> {
    sqlx::query(&format!(
        "INSERT INTO journal_entries ({ENTRY_COLUMNS}) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)"
    ))
    .bind(*entry.id.as_uuid())
    .bind(&entry.entry_number)
    .bind(entry.sequence)
    .bind(entry.entry_date)
    .bind(DbEntryType::from(entry.entry_type))
    .bind(&entry.description)
    .bind(&entry.reference_no)
    .bind(DbEntryStatus::from(entry.status))
    .bind(*entry.created_by.as_uuid())
    .bind(entry.created_at)
    .bind(entry.updated_at)
    .bind(entry.posted_by.map(Uuid::from))
    .bind(entry.posted_at)
    .bind(entry.reversed_entry_id.map(Uuid::from))
    .bind(entry.reversal_entry_id.map(Uuid::from))
    .bind(entry.version)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn insert_lines(
    conn: &mut PgConnection,
    entry_id: Uuid,
    lines: &[JournalLine],
) -> Result<(), DatabaseError> {
    if lines.is_empty() {
        return Ok(());
    }
    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
        "INSERT INTO journal_lines (line_id, entry_id, line_no, account_id, debit, credit, description) ",
    );
    let mut line_nos = Vec::with_capacity(lines.len());
    for line in lines {
        let line_no = i32::try_from(line.line_no)
            .map_err(|_| DatabaseError::ConstraintViolation(format!("line_no {} out of range", line.line_no)))?;
        line_nos.push(line_no);
    }
    builder.push_values(lines.iter().zip(line_nos), |mut row, (line, line_no)| {
        row.push_bind(*line.id.as_uuid())
            .push_bind(entry_id)
            .push_bind(line_no)
            .push_bind(Uuid::from(line.account_id))
            .push_bind(line.debit)
            .push_bind(line.credit)
            .push_bind(line.description.clone());
    });
    builder.build().execute(conn).await?;
    Ok(())
}

pub async fn find_entry(conn: &mut PgConnection, id: Uuid) -> Result<Option<EntryRow>, DatabaseError> {
    let sql = format!("SELECT {ENTRY_COLUMNS} FROM journal_entries WHERE entry_id = $1");
    Ok(sqlx::query_as::<_, EntryRow>(&sql).bind(id).fetch_optional(conn).await?)
}

/// Entry row locked for the rest of the transaction
pub async fn lock_entry(conn: &mut PgConnection, id: Uuid) -> Result<Option<EntryRow>, DatabaseError> {
    let sql = format!("SELECT {ENTRY_COLUMNS} FROM journal_entries WHERE entry_id = $1 FOR UPDATE");
    Ok(sqlx::query_as::<_, EntryRow>(&sql).bind(id).fetch_optional(conn).await?)
}

/// Lines of the given entries, ordered by entry then position
pub async fn lines_for(conn: &mut PgConnection, entry_ids: &[Uuid]) -> Result<Vec<LineRow>, DatabaseError> {
    Ok(sqlx::query_as::<_, LineRow>(
        "SELECT line_id, entry_id, line_no, account_id, debit, credit, description \
         FROM journal_lines WHERE entry_id = ANY($1) ORDER BY entry_id, line_no",
    )
    .bind(entry_ids)
    .fetch_all(conn)
    .await?)
}

/// Loads the lines of `rows` and assembles entries in the order given
pub async fn hydrate(conn: &mut PgConnection, rows: Vec<EntryRow>) -> Result<Vec<JournalEntry>, DatabaseError> {
    let ids: Vec<Uuid> = rows.iter().map(|r| r.entry_id).collect();
    let mut by_entry: HashMap<Uuid, Vec<JournalLine>> = HashMap::new();
    for line in lines_for(conn, &ids).await? {
        let entry_id = line.entry_id;
        by_entry.entry(entry_id).or_default().push(JournalLine::try_from(line)?);
    }
    Ok(rows
        .into_iter()
        .map(|row| {
            let lines = by_entry.remove(&row.entry_id).unwrap_or_default();
            row.into_entry(lines)
        })
        .collect())
}

pub async fn find_entries(conn: &mut PgConnection, query: &JournalQuery) -> Result<Vec<EntryRow>, DatabaseError> {
    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new(format!("SELECT {ENTRY_COLUMNS} FROM journal_entries e WHERE TRUE"));
    if let Some(from) = query.from {
        builder.push(" AND e.entry_date >= ").push_bind(from);
    }
    if let Some(to) = query.to {
        builder.push(" AND e.entry_date <= ").push_bind(to);
    }
    if let Some(entry_type) = query.entry_type {
        builder.push(" AND e.entry_type = ").push_bind(DbEntryType::from(entry_type));
    }
    if let Some(status) = query.status {
        builder.push(" AND e.status = ").push_bind(DbEntryStatus::from(status));
    }
    if let Some(account_id) = query.account_id {
        builder
            .push(" AND EXISTS (SELECT 1 FROM journal_lines l WHERE l.entry_id = e.entry_id AND l.account_id = ")
            .push_bind(Uuid::from(account_id))
            .push(")");
    }
    if let Some(text) = query.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        let pattern = format!("%{}%", escape_like(text));
        builder
            .push(" AND (e.entry_number ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR e.description ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR e.reference_no ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    builder.push(" ORDER BY e.entry_date, e.sequence");
    if let Some(limit) = query.limit {
        builder.push(" LIMIT ").push_bind(i64::from(limit));
    }
    if let Some(offset) = query.offset {
        builder.push(" OFFSET ").push_bind(i64::from(offset));
    }
    Ok(builder.build_query_as::<EntryRow>().fetch_all(conn).await?)
}

/// Rewrites a draft's header and version; lines are replaced separately
pub async fn update_header(conn: &mut PgConnection, entry: &JournalEntry) -> Result<(), DatabaseError> {
    sqlx::query(
        "UPDATE journal_entries SET entry_date = $2, entry_type = $3, description = $4, \
         reference_no = $5, updated_at = $6, version = $7 WHERE entry_id = $1",
    )
    .bind(*entry.id.as_uuid())
    .bind(entry.entry_date)
    .bind(DbEntryType::from(entry.entry_type))
    .bind(&entry.description)
    .bind(&entry.reference_no)
    .bind(entry.updated_at)
    .bind(entry.version)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn delete_lines(conn: &mut PgConnection, entry_id: Uuid) -> Result<(), DatabaseError> {
    sqlx::query("DELETE FROM journal_lines WHERE entry_id = $1")
        .bind(entry_id)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn delete_entry(conn: &mut PgConnection, entry_id: Uuid) -> Result<(), DatabaseError> {
    sqlx::query("DELETE FROM journal_entries WHERE entry_id = $1")
        .bind(entry_id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Flips a locked draft to posted and bumps its version
pub async fn mark_posted(
    conn: &mut PgConnection,
    entry_id: Uuid,
    posted_by: Uuid,
    posted_at: DateTime<Utc>,
) -> Result<EntryRow, DatabaseError> {
    let sql = format!(
        "UPDATE journal_entries SET status = 'posted', posted_by = $2, posted_at = $3, \
         updated_at = $3, version = version + 1 WHERE entry_id = $1 RETURNING {ENTRY_COLUMNS}"
    );
    Ok(sqlx::query_as::<_, EntryRow>(&sql)
        .bind(entry_id)
        .bind(posted_by)
        .bind(posted_at)
        .fetch_one(conn)
        .await?)
}

/// Points a locked original at its reversal and bumps its version
pub async fn link_reversal(
    conn: &mut PgConnection,
    original_id: Uuid,
    reversal_id: Uuid,
    at: DateTime<Utc>,
) -> Result<EntryRow, DatabaseError> {
    let sql = format!(
        "UPDATE journal_entries SET reversal_entry_id = $2, updated_at = $3, version = version + 1 \
         WHERE entry_id = $1 RETURNING {ENTRY_COLUMNS}"
    );
    Ok(sqlx::query_as::<_, EntryRow>(&sql)
        .bind(original_id)
        .bind(reversal_id)
        .bind(at)
        .fetch_one(conn)
        .await?)
}

pub async fn posted_lines(conn: &mut PgConnection, query: &PostedLineQuery) -> Result<Vec<PostedLineRow>, DatabaseError> {
    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
        "SELECT e.entry_id, e.entry_number, e.sequence, e.entry_date, e.entry_type, \
         e.description AS entry_description, e.reference_no, l.line_no, l.account_id, \
         l.debit, l.credit, l.description \
         FROM journal_lines l JOIN journal_entries e ON e.entry_id = l.entry_id \
         WHERE e.status = 'posted'",
    );
    if let Some(ids) = &query.account_ids {
        let ids: Vec<Uuid> = ids.iter().copied().map(Uuid::from).collect();
        builder.push(" AND l.account_id = ANY(").push_bind(ids).push(")");
    }
    if let Some(from) = query.from {
        builder.push(" AND e.entry_date >= ").push_bind(from);
    }
    if let Some(to) = query.to {
        builder.push(" AND e.entry_date <= ").push_bind(to);
    }
    if let Some(before) = query.before {
        builder.push(" AND e.entry_date < ").push_bind(before);
    }
    builder.push(" ORDER BY e.entry_date, e.sequence, l.line_no");
    Ok(builder.build_query_as::<PostedLineRow>().fetch_all(conn).await?)
}

pub async fn account_has_lines(conn: &mut PgConnection, account_id: Uuid) -> Result<bool, DatabaseError> {
    Ok(sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS (SELECT 1 FROM journal_lines WHERE account_id = $1)",
    )
    .bind(account_id)
    .fetch_one(conn)
    .await?)
}

/// Escapes `ILIKE` wildcards so search text matches literally
fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
