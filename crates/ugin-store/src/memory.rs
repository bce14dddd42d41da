//! In-memory store implementations
//!
//! Each store keeps its rows behind one `RwLock`, so a listing computes its
//! counts and page under a single read guard and sees one consistent snapshot.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use ugin_core::{
    Account, AccountStore, ListingPage, ListingQuery, Post, PostDraft, PostStore, Result,
    UginError,
};

#[derive(Debug, Default)]
struct PostTable {
    last_id: i64,
    rows: BTreeMap<i64, Post>,
}

/// In-memory post store
#[derive(Debug, Default)]
pub struct InMemoryPostStore {
    table: RwLock<PostTable>,
}

impl InMemoryPostStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored posts
    pub async fn len(&self) -> usize {
        self.table.read().await.rows.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl PostStore for InMemoryPostStore {
    async fn query(&self, query: &ListingQuery) -> Result<ListingPage<Post>> {
        let table = self.table.read().await;

        let total = table.rows.len() as u64;

        let mut matching: Vec<&Post> = match query.search() {
            Some(filter) => table
                .rows
                .values()
                .filter(|post| {
                    filter.fields().iter().any(|field| match post.field(field) {
                        Some(ugin_core::FieldValue::Text(text)) => filter.matches_text(text),
                        _ => false,
                    })
                })
                .collect(),
            None => table.rows.values().collect(),
        };
        let filtered = matching.len() as u64;

        let field = query.sort_field();
        let order = query.sort_order();
        matching.sort_by(|a, b| order.orient(a.compare_by(b, field)));

        let offset = usize::try_from(query.offset()).unwrap_or(usize::MAX);
        let items = matching
            .into_iter()
            .skip(offset)
            .take(query.limit() as usize)
            .cloned()
            .collect();

        Ok(ListingPage {
            total,
            filtered,
            items,
        })
    }

    async fn get(&self, id: i64) -> Result<Post> {
        self.table
            .read()
            .await
            .rows
            .get(&id)
            .cloned()
            .ok_or_else(|| UginError::NotFound(format!("post {id}")))
    }

    async fn create(&self, draft: PostDraft) -> Result<Post> {
        let mut table = self.table.write().await;
        table.last_id += 1;

        let now = Utc::now();
        let post = Post {
            id: table.last_id,
            name: draft.name.unwrap_or_default(),
            description: draft.description.unwrap_or_default(),
            created_at: now,
            updated_at: now,
        };
        table.rows.insert(post.id, post.clone());

        Ok(post)
    }

    async fn update(&self, id: i64, draft: PostDraft) -> Result<Post> {
        let mut table = self.table.write().await;
        let post = table
            .rows
            .get_mut(&id)
            .ok_or_else(|| UginError::NotFound(format!("post {id}")))?;

        post.apply(draft, Utc::now());
        Ok(post.clone())
    }

    async fn delete(&self, id: i64) -> Result<()> {
        self.table
            .write()
            .await
            .rows
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| UginError::NotFound(format!("post {id}")))
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// In-memory account store keyed by identifier
#[derive(Debug, Default)]
pub struct InMemoryAccountStore {
    accounts: RwLock<HashMap<String, Account>>,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored accounts
    pub async fn len(&self) -> usize {
        self.accounts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn find_by_identifier(&self, identifier: &str) -> Result<Account> {
        self.accounts
            .read()
            .await
            .get(identifier)
            .cloned()
            .ok_or_else(|| UginError::NotFound("account".to_string()))
    }

    async fn create(&self, account: Account) -> Result<Account> {
        use std::collections::hash_map::Entry;

        match self.accounts.write().await.entry(account.identifier.clone()) {
            Entry::Occupied(_) => Err(UginError::Conflict(format!(
                "account {} already exists",
                account.identifier
            ))),
            Entry::Vacant(slot) => Ok(slot.insert(account).clone()),
        }
    }

    fn name(&self) -> &str {
        "memory"
    }
}
