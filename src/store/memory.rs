//! In-memory data store.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::products::model::Product;
use crate::store::{Command, DataStore, Execution, Query, StoreError};
use crate::trace::context::RequestContext;

/// Products kept in a concurrent map, ids assigned from 1.
#[derive(Debug)]
pub struct MemoryStore {
    rows: DashMap<u64, Product>,
    next_id: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            rows: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DataStore for MemoryStore {
    async fn query(&self, query: Query, _cx: &RequestContext) -> Result<Vec<Product>, StoreError> {
        match query {
            Query::ListProducts { start, count } => {
                let mut rows: Vec<Product> = self.rows.iter().map(|r| r.value().clone()).collect();
                rows.sort_unstable_by_key(|p| p.id);
                let start = usize::try_from(start).unwrap_or(usize::MAX);
                let count = usize::try_from(count).unwrap_or(usize::MAX);
                Ok(rows.into_iter().skip(start).take(count).collect())
            }
            Query::GetProduct { id } => Ok(self.rows.get(&id).map(|r| r.value().clone()).into_iter().collect()),
        }
    }

    async fn execute(&self, command: Command, _cx: &RequestContext) -> Result<Execution, StoreError> {
        match command {
            Command::InsertProduct(new) => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let product = new.with_id(id);
                self.rows.insert(id, product.clone());
                Ok(Execution {
                    rows_affected: 1,
                    returned: Some(product),
                })
            }
            Command::UpdateProduct(product) => match self.rows.get_mut(&product.id) {
                Some(mut row) => {
                    *row = product.clone();
                    Ok(Execution {
                        rows_affected: 1,
                        returned: Some(product),
                    })
                }
                None => Ok(Execution::default()),
            },
            Command::DeleteProduct { id } => Ok(Execution {
                rows_affected: u64::from(self.rows.remove(&id).is_some()),
                returned: None,
            }),
            Command::DeleteAllProducts => {
                let rows_affected = self.rows.len() as u64;
                self.rows.clear();
                Ok(Execution {
                    rows_affected,
                    returned: None,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::products::model::NewProduct;

    fn widget(name: &str) -> Command {
        Command::InsertProduct(NewProduct {
            name: name.to_string(),
            price: 1.0,
        })
    }

    #[tokio::test]
    async fn insert_assigns_increasing_ids() {
        let store = MemoryStore::new();
        let cx = RequestContext::background();

        let a = store.execute(widget("a"), &cx).await.unwrap();
        let b = store.execute(widget("b"), &cx).await.unwrap();

        assert_eq!(a.returned.unwrap().id, 1);
        assert_eq!(b.returned.unwrap().id, 2);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn list_pages_in_id_order() {
        let store = MemoryStore::new();
        let cx = RequestContext::background();
        for name in ["a", "b", "c", "d"] {
            store.execute(widget(name), &cx).await.unwrap();
        }

        let page = store
            .query(Query::ListProducts { start: 1, count: 2 }, &cx)
            .await
            .unwrap();
        let names: Vec<_> = page.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["b", "c"]);
    }

    #[tokio::test]
    async fn missing_rows_affect_nothing() {
        let store = MemoryStore::new();
        let cx = RequestContext::background();

        let update = store
            .execute(
                Command::UpdateProduct(Product {
                    id: 42,
                    name: "ghost".into(),
                    price: 0.0,
                }),
                &cx,
            )
            .await
            .unwrap();
        let delete = store.execute(Command::DeleteProduct { id: 42 }, &cx).await.unwrap();
        let get = store.query(Query::GetProduct { id: 42 }, &cx).await.unwrap();

        assert_eq!(update.rows_affected, 0);
        assert_eq!(delete.rows_affected, 0);
        assert!(get.is_empty());
    }

    #[tokio::test]
    async fn delete_all_reports_row_count() {
        let store = MemoryStore::new();
        let cx = RequestContext::background();
        store.execute(widget("a"), &cx).await.unwrap();
        store.execute(widget("b"), &cx).await.unwrap();

        let wiped = store.execute(Command::DeleteAllProducts, &cx).await.unwrap();
        assert_eq!(wiped.rows_affected, 2);
        assert!(store.is_empty());
    }
}
