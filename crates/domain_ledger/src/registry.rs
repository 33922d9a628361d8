//! Account Registry
//!
//! Authoritative store of the chart of accounts. Balances are only changed
//! through [`AccountRegistry::adjust_balance`] or by the posting engine's
//! unit of work; every other write here touches account details.

use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use core_kernel::{AccountId, PortError, UserId};

use crate::account::{
    Account, AccountNode, AccountStatus, AccountType, NewAccount, StandardChartOfAccounts,
    UpdateAccount,
};
use crate::error::{FieldError, LedgerError};
use crate::ports::{AccountQuery, LedgerStore};

/// Chart of accounts operations
#[derive(Clone)]
pub struct AccountRegistry {
    store: Arc<dyn LedgerStore>,
}

impl AccountRegistry {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Creates an account
    ///
    /// # Arguments
    ///
    /// * `request` - Account details; `normal_balance` is derived from the type when absent
    /// * `created_by` - Audit identity of the caller
    ///
    /// # Errors
    ///
    /// - `Validation` for malformed input or an inconsistent normal balance
    /// - `AccountConstraint` for a duplicate code or an unsuitable parent
    #[instrument(skip(self, request), fields(code = %request.code))]
    pub async fn create_account(
        &self,
        request: NewAccount,
        created_by: UserId,
    ) -> Result<Account, LedgerError> {
        request.check()?;

        if self.store.find_account_by_code(&request.code).await?.is_some() {
            return Err(LedgerError::account(format!(
                "account code {} already exists",
                request.code
            )));
        }
        if let Some(parent_id) = request.parent_id {
            let parent = self.get_account(parent_id).await?;
            check_parent(&parent, request.account_type)?;
        }

        let now = Utc::now();
        let account = Account {
            id: AccountId::new_v7(),
            code: request.code,
            name: request.name.trim().to_string(),
            account_type: request.account_type,
            normal_balance: request.account_type.normal_balance(),
            is_header: request.is_header,
            opening_balance: request.opening_balance,
            current_balance: request.opening_balance,
            parent_id: request.parent_id,
            status: AccountStatus::Active,
            description: request.description,
            created_by,
            created_at: now,
            updated_at: now,
        };

        let account = self.store.insert_account(account).await.map_err(|e| {
            if e.is_conflict() {
                LedgerError::account(e.to_string())
            } else {
                LedgerError::from_port("Account")(e)
            }
        })?;
        info!(account_id = %account.id, code = %account.code, "account created");
        Ok(account)
    }

    /// Updates name, description or parent
    ///
    /// Re-parenting rejects any move that would make the account its own
    /// ancestor.
    #[instrument(skip(self, update))]
    pub async fn update_account(
        &self,
        id: AccountId,
        update: UpdateAccount,
    ) -> Result<Account, LedgerError> {
        let mut account = self.get_account(id).await?;

        if let Some(name) = update.name {
            let name = name.trim().to_string();
            if name.is_empty() || name.chars().count() > 150 {
                return Err(LedgerError::field("name", "must be between 1 and 150 characters"));
            }
            account.name = name;
        }
        if let Some(description) = update.description {
            account.description = description;
        }
        if let Some(parent_id) = update.parent_id {
            if let Some(parent_id) = parent_id {
                let parent = self.get_account(parent_id).await?;
                check_parent(&parent, account.account_type)?;
                if self.is_descendant_or_self(parent_id, id).await? {
                    return Err(LedgerError::account(format!(
                        "moving {} under {} would create a cycle",
                        account.code, parent.code
                    )));
                }
            }
            account.parent_id = parent_id;
        }

        account.updated_at = Utc::now();
        self.save(account).await
    }

    /// Marks an account inactive; it can no longer be posted to
    ///
    /// A leaf account must have a zero balance, a header must have no
    /// active children. Both are checked again inside the store's unit, so
    /// a posting that lands first wins and the deactivation is rejected.
    #[instrument(skip(self))]
    pub async fn deactivate(&self, id: AccountId) -> Result<Account, LedgerError> {
        let account = self.get_account(id).await?;
        if !account.is_active() {
            return Ok(account);
        }
        if !account.current_balance.is_zero() {
            return Err(LedgerError::account(format!(
                "account {} has a balance of {} and cannot be deactivated",
                account.code, account.current_balance
            )));
        }
        let active_children = self
            .store
            .list_accounts(AccountQuery {
                status: Some(AccountStatus::Active),
                ..AccountQuery::children_of(id)
            })
            .await?;
        if !active_children.is_empty() {
            return Err(LedgerError::account(format!(
                "account {} has {} active child accounts",
                account.code,
                active_children.len()
            )));
        }

        let account = match self.store.deactivate_account(id, Utc::now()).await {
            Ok(account) => account,
            Err(e) => return self.status_change_failed(id, AccountStatus::Inactive, e).await,
        };
        info!(code = %account.code, "account deactivated");
        Ok(account)
    }

    #[instrument(skip(self))]
    pub async fn reactivate(&self, id: AccountId) -> Result<Account, LedgerError> {
        let account = self.get_account(id).await?;
        if account.is_active() {
            return Ok(account);
        }
        if let Some(parent_id) = account.parent_id {
            let parent = self.get_account(parent_id).await?;
            if !parent.is_active() {
                return Err(LedgerError::account(format!(
                    "parent account {} is inactive",
                    parent.code
                )));
            }
        }
        match self.store.reactivate_account(id, Utc::now()).await {
            Ok(account) => {
                info!(code = %account.code, "account reactivated");
                Ok(account)
            }
            Err(e) => self.status_change_failed(id, AccountStatus::Active, e).await,
        }
    }

    /// Deletes an account that nothing refers to
    ///
    /// Accounts with children or journal lines must be deactivated instead.
    #[instrument(skip(self))]
    pub async fn delete_account(&self, id: AccountId) -> Result<(), LedgerError> {
        let account = self.get_account(id).await?;
        let children = self.store.list_accounts(AccountQuery::children_of(id)).await?;
        if !children.is_empty() {
            return Err(LedgerError::account(format!(
                "account {} has child accounts; deactivate it instead",
                account.code
            )));
        }
        if self.store.account_has_lines(id).await? {
            return Err(LedgerError::account(format!(
                "account {} is referenced by journal lines; deactivate it instead",
                account.code
            )));
        }
        self.store.delete_account(id).await.map_err(|e| {
            if e.is_conflict() {
                LedgerError::account(e.to_string())
            } else {
                LedgerError::from_port("Account")(e)
            }
        })?;
        info!(code = %account.code, "account deleted");
        Ok(())
    }

    pub async fn get_account(&self, id: AccountId) -> Result<Account, LedgerError> {
        self.store
            .get_account(id)
            .await
            .map_err(LedgerError::from_port("Account"))
    }

    pub async fn find_by_code(&self, code: &str) -> Result<Account, LedgerError> {
        self.store
            .find_account_by_code(code)
            .await?
            .ok_or_else(|| LedgerError::not_found("Account", code))
    }

    pub async fn accounts_by_type(&self, account_type: AccountType) -> Result<Vec<Account>, LedgerError> {
        Ok(self.store.list_accounts(AccountQuery::by_type(account_type)).await?)
    }

    pub async fn list_accounts(&self, query: AccountQuery) -> Result<Vec<Account>, LedgerError> {
        Ok(self.store.list_accounts(query).await?)
    }

    /// Applies a signed delta to `current_balance` atomically
    ///
    /// The delta is relative to the account's normal balance.
    #[instrument(skip(self))]
    pub async fn adjust_balance(&self, id: AccountId, delta: Decimal) -> Result<Decimal, LedgerError> {
        let account = self.get_account(id).await?;
        account.ensure_postable()?;
        self.store
            .adjust_balance(id, delta)
            .await
            .map_err(LedgerError::from_port("Account"))
    }

    /// Ancestor chain of an account, root first, the account itself last
    pub async fn hierarchy_path(&self, id: AccountId) -> Result<Vec<Account>, LedgerError> {
        let accounts = self.account_map().await?;
        let mut path = Vec::new();
        let mut seen = HashSet::new();
        let mut cursor = Some(id);

        while let Some(current) = cursor {
            if !seen.insert(current) {
                warn!(account_id = %current, "cycle in account hierarchy");
                return Err(LedgerError::account(format!(
                    "account hierarchy contains a cycle at {}",
                    current
                )));
            }
            let account = accounts
                .get(&current)
                .ok_or_else(|| LedgerError::not_found("Account", current))?;
            cursor = account.parent_id;
            path.push(account.clone());
        }

        path.reverse();
        Ok(path)
    }

    /// The full chart as a forest, children ordered by code
    ///
    /// Built iteratively from one read of the chart.
    pub async fn account_tree(&self) -> Result<Vec<AccountNode>, LedgerError> {
        let accounts = self.store.list_accounts(AccountQuery::default()).await?;
        Ok(build_tree(accounts))
    }

    /// Creates every standard chart account whose code is not taken yet
    #[instrument(skip(self))]
    pub async fn seed_standard_chart(&self, created_by: UserId) -> Result<Vec<Account>, LedgerError> {
        let mut ids_by_code: HashMap<String, AccountId> = self
            .store
            .list_accounts(AccountQuery::default())
            .await?
            .into_iter()
            .map(|a| (a.code, a.id))
            .collect();

        let mut created = Vec::new();
        for template in StandardChartOfAccounts::templates() {
            if ids_by_code.contains_key(template.code) {
                debug!(code = template.code, "chart account already present");
                continue;
            }
            let mut request = NewAccount::new(template.code, template.name, template.account_type);
            request.is_header = template.is_header;
            if let Some(parent_code) = template.parent_code {
                let parent_id = ids_by_code.get(parent_code).copied().ok_or_else(|| {
                    LedgerError::not_found("Account", parent_code)
                })?;
                request.parent_id = Some(parent_id);
            }
            let account = self.create_account(request, created_by).await?;
            ids_by_code.insert(account.code.clone(), account.id);
            created.push(account);
        }
        info!(created = created.len(), "standard chart seeded");
        Ok(created)
    }

    /// Settles a rejected status change against the stored account
    ///
    /// The transition may already have been made by a concurrent caller;
    /// otherwise the guard that failed inside the unit is reported.
    async fn status_change_failed(
        &self,
        id: AccountId,
        wanted: AccountStatus,
        err: PortError,
    ) -> Result<Account, LedgerError> {
        let PortError::Conflict { message } = err else {
            return Err(LedgerError::from_port("Account")(err));
        };
        let account = self.get_account(id).await?;
        if account.status == wanted {
            return Ok(account);
        }
        warn!(code = %account.code, reason = %message, "account status change rejected");
        Err(LedgerError::account(message))
    }

    async fn save(&self, account: Account) -> Result<Account, LedgerError> {
        self.store
            .save_account_details(account)
            .await
            .map_err(LedgerError::from_port("Account"))
    }

    async fn account_map(&self) -> Result<HashMap<AccountId, Account>, LedgerError> {
        Ok(self
            .store
            .list_accounts(AccountQuery::default())
            .await?
            .into_iter()
            .map(|a| (a.id, a))
            .collect())
    }

    /// True if `candidate` is `ancestor` or lies beneath it
    async fn is_descendant_or_self(
        &self,
        candidate: AccountId,
        ancestor: AccountId,
    ) -> Result<bool, LedgerError> {
        let accounts = self.account_map().await?;
        let mut seen = HashSet::new();
        let mut cursor = Some(candidate);
        while let Some(current) = cursor {
            if current == ancestor {
                return Ok(true);
            }
            if !seen.insert(current) {
                return Ok(true);
            }
            cursor = accounts.get(&current).and_then(|a| a.parent_id);
        }
        Ok(false)
    }
}

fn check_parent(parent: &Account, account_type: AccountType) -> Result<(), LedgerError> {
    if !parent.is_header {
        return Err(LedgerError::validation(vec![FieldError::new(
            "parent_id",
            format!("parent {} is not a header account", parent.code),
        )]));
    }
    if parent.account_type != account_type {
        return Err(LedgerError::validation(vec![FieldError::new(
            "parent_id",
            format!(
                "parent {} is a {} account, not {}",
                parent.code, parent.account_type, account_type
            ),
        )]));
    }
    Ok(())
}

/// Assembles a forest from a flat account list without recursion
///
/// Accounts whose parent is missing become roots. Accounts only reachable
/// through a cycle are dropped.
pub fn build_tree(mut accounts: Vec<Account>) -> Vec<AccountNode> {
    accounts.sort_by(|a, b| a.code.cmp(&b.code));
    let known: HashSet<AccountId> = accounts.iter().map(|a| a.id).collect();

    let mut children: HashMap<AccountId, Vec<AccountId>> = HashMap::new();
    let mut roots = Vec::new();
    for account in &accounts {
        match account.parent_id.filter(|p| known.contains(p)) {
            Some(parent) => children.entry(parent).or_default().push(account.id),
            None => roots.push(account.id),
        }
    }

    // Pre-order walk; building nodes in reverse guarantees children exist first
    let mut order = Vec::with_capacity(accounts.len());
    let mut stack: Vec<AccountId> = roots.iter().rev().copied().collect();
    let mut visited = HashSet::new();
    while let Some(id) = stack.pop() {
        if !visited.insert(id) {
            continue;
        }
        order.push(id);
        if let Some(kids) = children.get(&id) {
            stack.extend(kids.iter().rev().copied());
        }
    }
    if order.len() < accounts.len() {
        warn!(
            dropped = accounts.len() - order.len(),
            "accounts unreachable from any root omitted from tree"
        );
    }

    let mut by_id: HashMap<AccountId, Account> = accounts.into_iter().map(|a| (a.id, a)).collect();
    let mut built: HashMap<AccountId, AccountNode> = HashMap::new();
    for id in order.into_iter().rev() {
        let Some(account) = by_id.remove(&id) else {
            continue;
        };
        let nodes = children
            .get(&id)
            .map(|kids| kids.iter().filter_map(|k| built.remove(k)).collect())
            .unwrap_or_default();
        built.insert(id, AccountNode { account, children: nodes });
    }

    roots.into_iter().filter_map(|id| built.remove(&id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryLedgerStore;
    use rust_decimal_macros::dec;

    fn registry() -> AccountRegistry {
        AccountRegistry::new(Arc::new(InMemoryLedgerStore::new()))
    }

    #[tokio::test]
    async fn test_create_derives_normal_balance() {
        let registry = registry();
        let account = registry
            .create_account(NewAccount::new("2100", "Payables", AccountType::Liability), UserId::new())
            .await
            .unwrap();
        assert_eq!(account.normal_balance, AccountType::Liability.normal_balance());
        assert_eq!(account.current_balance, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_duplicate_code_rejected() {
        let registry = registry();
        let user = UserId::new();
        registry
            .create_account(NewAccount::new("1100", "Cash", AccountType::Asset), user)
            .await
            .unwrap();
        let err = registry
            .create_account(NewAccount::new("1100", "Cash again", AccountType::Asset), user)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::AccountConstraint(_)));
    }

    #[tokio::test]
    async fn test_parent_must_be_header_of_same_type() {
        let registry = registry();
        let user = UserId::new();
        let assets = registry
            .create_account(NewAccount::new("1000", "Assets", AccountType::Asset).header(), user)
            .await
            .unwrap();
        let err = registry
            .create_account(
                NewAccount::new("4100", "Sales", AccountType::Revenue).with_parent(assets.id),
                user,
            )
            .await
            .unwrap_err();
        assert_eq!(err.field_errors()[0].path, "parent_id");
    }

    #[tokio::test]
    async fn test_reparenting_cycle_rejected() {
        let registry = registry();
        let user = UserId::new();
        let top = registry
            .create_account(NewAccount::new("1000", "Assets", AccountType::Asset).header(), user)
            .await
            .unwrap();
        let current = registry
            .create_account(
                NewAccount::new("1001", "Current Assets", AccountType::Asset)
                    .header()
                    .with_parent(top.id),
                user,
            )
            .await
            .unwrap();

        let update = UpdateAccount { parent_id: Some(Some(current.id)), ..Default::default() };
        let err = registry.update_account(top.id, update).await.unwrap_err();
        assert!(matches!(err, LedgerError::AccountConstraint(_)));
    }

    #[tokio::test]
    async fn test_hierarchy_path_and_tree() {
        let registry = registry();
        let user = UserId::new();
        registry.seed_standard_chart(user).await.unwrap();
        let bank = registry.find_by_code("1200").await.unwrap();

        let path = registry.hierarchy_path(bank.id).await.unwrap();
        let codes: Vec<&str> = path.iter().map(|a| a.code.as_str()).collect();
        assert_eq!(codes, vec!["1000", "1200"]);

        let tree = registry.account_tree().await.unwrap();
        assert_eq!(tree.len(), 5);
        assert_eq!(tree[0].account.code, "1000");
        assert_eq!(tree[0].children[0].account.code, "1100");
    }

    #[tokio::test]
    async fn test_seed_is_idempotent() {
        let registry = registry();
        let user = UserId::new();
        let first = registry.seed_standard_chart(user).await.unwrap();
        let second = registry.seed_standard_chart(user).await.unwrap();
        assert_eq!(first.len(), StandardChartOfAccounts::templates().len());
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn test_deactivate_requires_zero_balance() {
        let registry = registry();
        let user = UserId::new();
        let cash = registry
            .create_account(
                NewAccount::new("1100", "Cash", AccountType::Asset).with_opening_balance(dec!(50)),
                user,
            )
            .await
            .unwrap();
        assert!(registry.deactivate(cash.id).await.is_err());

        registry.adjust_balance(cash.id, dec!(-50)).await.unwrap();
        let cash = registry.deactivate(cash.id).await.unwrap();
        assert_eq!(cash.status, AccountStatus::Inactive);

        let err = registry.adjust_balance(cash.id, dec!(1)).await.unwrap_err();
        assert!(matches!(err, LedgerError::AccountConstraint(_)));

        let cash = registry.reactivate(cash.id).await.unwrap();
        assert!(cash.is_active());
    }

    #[tokio::test]
    async fn test_delete_blocked_by_children() {
        let registry = registry();
        let user = UserId::new();
        registry.seed_standard_chart(user).await.unwrap();
        let assets = registry.find_by_code("1000").await.unwrap();
        assert!(registry.delete_account(assets.id).await.is_err());

        let rent = registry.find_by_code("5300").await.unwrap();
        registry.delete_account(rent.id).await.unwrap();
        assert!(matches!(
            registry.find_by_code("5300").await.unwrap_err(),
            LedgerError::NotFound { .. }
        ));
    }

    #[test]
    fn test_build_tree_orphan_becomes_root() {
        let now = Utc::now();
        let orphan = Account {
            id: AccountId::new(),
            code: "9000".into(),
            name: "Suspense".into(),
            account_type: AccountType::Asset,
            normal_balance: AccountType::Asset.normal_balance(),
            is_header: false,
            opening_balance: Decimal::ZERO,
            current_balance: Decimal::ZERO,
            parent_id: Some(AccountId::new()),
            status: AccountStatus::Active,
            description: None,
            created_by: UserId::new(),
            created_at: now,
            updated_at: now,
        };
        let tree = build_tree(vec![orphan]);
        assert_eq!(tree.len(), 1);
        assert!(tree[0].children.is_empty());
    }
}
