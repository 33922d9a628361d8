//! Chart of accounts rows

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, Postgres, QueryBuilder};
use uuid::Uuid;

use core_kernel::{AccountId, UserId};
use domain_ledger::account::{Account, AccountStatus, AccountType, NormalBalance};
use domain_ledger::ports::AccountQuery;

use crate::error::DatabaseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "account_type", rename_all = "snake_case")]
pub enum DbAccountType {
    Asset,
    Liability,
    Equity,
    Revenue,
    Expense,
}

impl From<AccountType> for DbAccountType {
    fn from(value: AccountType) -> Self {
        match value {
            AccountType::Asset => DbAccountType::Asset,
            AccountType::Liability => DbAccountType::Liability,
            AccountType::Equity => DbAccountType::Equity,
            AccountType::Revenue => DbAccountType::Revenue,
            AccountType::Expense => DbAccountType::Expense,
        }
    }
}

impl From<DbAccountType> for AccountType {
    fn from(value: DbAccountType) -> Self {
        match value {
            DbAccountType::Asset => AccountType::Asset,
            DbAccountType::Liability => AccountType::Liability,
            DbAccountType::Equity => AccountType::Equity,
            DbAccountType::Revenue => AccountType::Revenue,
            DbAccountType::Expense => AccountType::Expense,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "normal_balance", rename_all = "snake_case")]
pub enum DbNormalBalance {
    Debit,
    Credit,
}

impl From<NormalBalance> for DbNormalBalance {
    fn from(value: NormalBalance) -> Self {
        match value {
            NormalBalance::Debit => DbNormalBalance::Debit,
            NormalBalance::Credit => DbNormalBalance::Credit,
        }
    }
}

impl From<DbNormalBalance> for NormalBalance {
    fn from(value: DbNormalBalance) -> Self {
        match value {
            DbNormalBalance::Debit => NormalBalance::Debit,
            DbNormalBalance::Credit => NormalBalance::Credit,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "account_status", rename_all = "snake_case")]
pub enum DbAccountStatus {
    Active,
    Inactive,
}

impl From<AccountStatus> for DbAccountStatus {
    fn from(value: AccountStatus) -> Self {
        match value {
            AccountStatus::Active => DbAccountStatus::Active,
            AccountStatus::Inactive => DbAccountStatus::Inactive,
        }
    }
}

impl From<DbAccountStatus> for AccountStatus {
    fn from(value: DbAccountStatus) -> Self {
        match value {
            DbAccountStatus::Active => AccountStatus::Active,
            DbAccountStatus::Inactive => AccountStatus::Inactive,
        }
    }
}

/// One row of `accounts`
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AccountRow {
    pub account_id: Uuid,
    pub code: String,
    pub name: String,
    pub account_type: DbAccountType,
    pub normal_balance: DbNormalBalance,
    pub is_header: bool,
    pub opening_balance: Decimal,
    pub current_balance: Decimal,
    pub parent_id: Option<Uuid>,
    pub status: DbAccountStatus,
    pub description: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<AccountRow> for Account {
    fn from(row: AccountRow) -> Self {
        Account {
            id: AccountId::from_uuid(row.account_id),
            code: row.code,
            name: row.name,
            account_type: row.account_type.into(),
            normal_balance: row.normal_balance.into(),
            is_header: row.is_header,
            opening_balance: row.opening_balance,
            current_balance: row.current_balance,
            parent_id: row.parent_id.map(AccountId::from_uuid),
            status: row.status.into(),
            description: row.description,
            created_by: UserId::from_uuid(row.created_by),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const ACCOUNT_COLUMNS: &str = "account_id, code, name, account_type, normal_balance, is_header, \
     opening_balance, current_balance, parent_id, status, description, created_by, created_at, \
     updated_at";

pub async fn insert(conn: &mut PgConnection, account: &Account) -> Result<AccountRow, DatabaseError> {
    let sql = format!(
        "INSERT INTO accounts ({ACCOUNT_COLUMNS}) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
         RETURNING {ACCOUNT_COLUMNS}"
    );
    let row = sqlx::query_as::<_, AccountRow>(&sql)
        .bind(*account.id.as_uuid())
        .bind(&account.code)
        .bind(&account.name)
        .bind(DbAccountType::from(account.account_type))
        .bind(DbNormalBalance::from(account.normal_balance))
        .bind(account.is_header)
        .bind(account.opening_balance)
        .bind(account.current_balance)
        .bind(account.parent_id.map(Uuid::from))
        .bind(DbAccountStatus::from(account.status))
        .bind(&account.description)
        .bind(*account.created_by.as_uuid())
        .bind(account.created_at)
        .bind(account.updated_at)
        .fetch_one(conn)
        .await
        .map_err(|e| match DatabaseError::from(e) {
            DatabaseError::DuplicateEntry(_) => DatabaseError::duplicate("Account", "code", &account.code),
            other => other,
        })?;
    Ok(row)
}

pub async fn find_by_id(conn: &mut PgConnection, id: Uuid) -> Result<Option<AccountRow>, DatabaseError> {
    let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE account_id = $1");
    Ok(sqlx::query_as::<_, AccountRow>(&sql).bind(id).fetch_optional(conn).await?)
}

pub async fn find_by_code(conn: &mut PgConnection, code: &str) -> Result<Option<AccountRow>, DatabaseError> {
    let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE code = $1");
    Ok(sqlx::query_as::<_, AccountRow>(&sql).bind(code).fetch_optional(conn).await?)
}

pub async fn list(conn: &mut PgConnection, query: &AccountQuery) -> Result<Vec<AccountRow>, DatabaseError> {
    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new(format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE TRUE"));
    if let Some(account_type) = query.account_type {
        builder.push(" AND account_type = ").push_bind(DbAccountType::from(account_type));
    }
    if let Some(status) = query.status {
        builder.push(" AND status = ").push_bind(DbAccountStatus::from(status));
    }
    if let Some(is_header) = query.is_header {
        builder.push(" AND is_header = ").push_bind(is_header);
    }
    if let Some(parent_id) = query.parent_id {
        builder.push(" AND parent_id = ").push_bind(Uuid::from(parent_id));
    }
    builder.push(" ORDER BY code");
    Ok(builder.build_query_as::<AccountRow>().fetch_all(conn).await?)
}

/// Rows for `ids`, locked for the rest of the transaction, in id order
pub async fn lock_for_update(conn: &mut PgConnection, ids: &[Uuid]) -> Result<Vec<AccountRow>, DatabaseError> {
    let sql = format!(
        "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE account_id = ANY($1) \
         ORDER BY account_id FOR UPDATE"
    );
    Ok(sqlx::query_as::<_, AccountRow>(&sql).bind(ids).fetch_all(conn).await?)
}

/// Name, description and parent; status and balances are never written here
pub async fn update_details(conn: &mut PgConnection, account: &Account) -> Result<Option<AccountRow>, DatabaseError> {
    let sql = format!(
        "UPDATE accounts SET name = $2, description = $3, parent_id = $4, updated_at = $5 \
         WHERE account_id = $1 RETURNING {ACCOUNT_COLUMNS}"
    );
    Ok(sqlx::query_as::<_, AccountRow>(&sql)
        .bind(*account.id.as_uuid())
        .bind(&account.name)
        .bind(&account.description)
        .bind(account.parent_id.map(Uuid::from))
        .bind(account.updated_at)
        .fetch_optional(conn)
        .await?)
}

/// Marks the account inactive if it is active, empty and has no active children
///
/// Returns `None` when a guard does not hold.
pub async fn deactivate(
    conn: &mut PgConnection,
    id: Uuid,
    at: DateTime<Utc>,
) -> Result<Option<AccountRow>, DatabaseError> {
    let sql = format!(
        "UPDATE accounts SET status = 'inactive', updated_at = $2 \
         WHERE account_id = $1 AND status = 'active' AND current_balance = 0 \
         AND NOT EXISTS (SELECT 1 FROM accounts c WHERE c.parent_id = $1 AND c.status = 'active') \
         RETURNING {ACCOUNT_COLUMNS}"
    );
    Ok(sqlx::query_as::<_, AccountRow>(&sql)
        .bind(id)
        .bind(at)
        .fetch_optional(conn)
        .await?)
}

/// Marks the account active if it is inactive and its parent, if any, is active
///
/// Returns `None` when a guard does not hold.
pub async fn reactivate(
    conn: &mut PgConnection,
    id: Uuid,
    at: DateTime<Utc>,
) -> Result<Option<AccountRow>, DatabaseError> {
    let sql = format!(
        "UPDATE accounts a SET status = 'active', updated_at = $2 \
         WHERE a.account_id = $1 AND a.status = 'inactive' \
         AND (a.parent_id IS NULL OR EXISTS \
           (SELECT 1 FROM accounts p WHERE p.account_id = a.parent_id AND p.status = 'active')) \
         RETURNING {ACCOUNT_COLUMNS}"
    );
    Ok(sqlx::query_as::<_, AccountRow>(&sql)
        .bind(id)
        .bind(at)
        .fetch_optional(conn)
        .await?)
}

pub async fn has_active_children(conn: &mut PgConnection, id: Uuid) -> Result<bool, DatabaseError> {
    Ok(sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS (SELECT 1 FROM accounts WHERE parent_id = $1 AND status = 'active')",
    )
    .bind(id)
    .fetch_one(conn)
    .await?)
}

/// Adds `delta` to the stored balance and returns the new row
pub async fn add_to_balance(
    conn: &mut PgConnection,
    id: Uuid,
    delta: Decimal,
    at: DateTime<Utc>,
) -> Result<Option<AccountRow>, DatabaseError> {
    let sql = format!(
        "UPDATE accounts SET current_balance = current_balance + $2, updated_at = $3 \
         WHERE account_id = $1 RETURNING {ACCOUNT_COLUMNS}"
    );
    Ok(sqlx::query_as::<_, AccountRow>(&sql)
        .bind(id)
        .bind(delta)
        .bind(at)
        .fetch_optional(conn)
        .await?)
}

pub async fn has_children(conn: &mut PgConnection, id: Uuid) -> Result<bool, DatabaseError> {
    Ok(sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM accounts WHERE parent_id = $1)")
        .bind(id)
        .fetch_one(conn)
        .await?)
}

/// Returns false when no row matched
pub async fn delete(conn: &mut PgConnection, id: Uuid) -> Result<bool, DatabaseError> {
    let result = sqlx::query("DELETE FROM accounts WHERE account_id = $1")
        .bind(id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() > 0)
}
