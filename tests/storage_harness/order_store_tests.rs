//! Macro-generated contract suite for the order, product and user stores.
//!
//! # Usage
//!
//! ```rust,ignore
//! #[macro_use]
//! mod storage_harness;
//!
//! use storage_harness::*;
//!
//! order_store_tests!(InMemoryFixture::new());
//! ```
//!
//! # Generated Tests
//!
//! ## Orders
//! - `test_insert_and_find_one`: committed insert is readable with every field
//! - `test_find_one_missing`: no match is `StoreError::NotFound`
//! - `test_uncommitted_insert_is_discarded`: dropping the scope rolls back
//! - `test_identity_projection`: only `id` and `user_id` are loaded
//! - `test_find_many_sort_and_window`: newest first by default, limit/offset honoured
//! - `test_count_with_range_groups`: `>=` / `<=` groups and `IN` sets
//! - `test_update_locked_appends_history`: SET plus JSON append, RETURNING
//! - `test_update_locked_without_match`: NotFound when returning, `None` otherwise
//! - `test_locked_read_waits_for_commit`: a second locked read observes the committed row
//!
//! ## Products and users
//! - `test_products_by_ids_and_status`
//! - `test_products_search_any_group`
//! - `test_user_roles`

/// Generate the store contract suite.
///
/// `$factory` must evaluate to a [`Fixture`](super::Fixture); it is
/// re-evaluated for each test.
#[macro_export]
macro_rules! order_store_tests {
    ($factory:expr) => {
        mod order_store_contract_tests {
            use super::*;
            use order_engine::accounts::Role;
            use order_engine::catalog::ProductColumn;
            use order_engine::core::error::StoreError;
            use order_engine::core::predicate::{Assignments, Clause, Comparison, Group, OrderBy};
            use order_engine::core::query::{Projection, SortDirection, Window};
            use order_engine::core::service::{OrderStore, ProductStore, UserStore};
            use order_engine::core::transaction::TransactionScope;
            use order_engine::orders::{HistoryEntry, OrderColumn, OrderStatus};
            use std::time::Duration;

            fn by_id(id: &str) -> Clause<OrderColumn> {
                Clause::eq(OrderColumn::Id, id)
            }

            fn ids(rows: &[order_engine::orders::Order]) -> Vec<&str> {
                rows.iter().map(|o| o.id.as_str()).collect()
            }

            // ==================================================================
            // Orders: reads and writes
            // ==================================================================

            #[tokio::test]
            async fn test_insert_and_find_one() {
                let fixture = $factory;
                let store = fixture.orders();
                let original = order("o-1", "alice", 25.5, 0);
                store_order(store.as_ref(), &original).await;

                let found = store.find_one(&by_id("o-1"), Projection::Full).await.unwrap();
                assert_eq!(found.id, "o-1");
                assert_eq!(found.user_id, "alice");
                assert_eq!(found.status, OrderStatus::Pending);
                assert_eq!(found.reference, "market-o-1");
                assert_eq!(found.checksum, "checksum-o-1");
                assert_eq!(found.history, original.history);
                assert_eq!(found.invoice, original.invoice);
                assert_eq!(found.product_id.as_deref(), Some("p-1"));
                assert_eq!(found.created_at, original.created_at);
                assert!(found.paid_at.is_none());
                assert!(!found.cancelled);
                assert_amount(found.amount, 25.5);
            }

            #[tokio::test]
            async fn test_find_one_missing() {
                let fixture = $factory;
                let result = fixture
                    .orders()
                    .find_one(&by_id("missing"), Projection::Full)
                    .await;
                assert!(matches!(result, Err(StoreError::NotFound)));
            }

            #[tokio::test]
            async fn test_uncommitted_insert_is_discarded() {
                let fixture = $factory;
                let store = fixture.orders();
                let values = order("o-1", "alice", 10.0, 0).insert_assignments().unwrap();
                {
                    let mut scope = TransactionScope::begin(store.as_ref(), "discard").await.unwrap();
                    store.insert(scope.tx().unwrap(), &values).await.unwrap();
                }

                let result = store.find_one(&by_id("o-1"), Projection::Full).await;
                assert!(matches!(result, Err(StoreError::NotFound)));
                assert_eq!(store.count(&Clause::all()).await.unwrap(), 0);
            }

            #[tokio::test]
            async fn test_identity_projection() {
                let fixture = $factory;
                let store = fixture.orders();
                store_order(store.as_ref(), &order("o-1", "alice", 10.0, 0)).await;

                let found = store.find_one(&by_id("o-1"), Projection::Identity).await.unwrap();
                assert_eq!(found.id, "o-1");
                assert_eq!(found.user_id, "alice");
                assert!(found.reference.is_empty());
                assert!(found.history.is_empty());
            }

            #[tokio::test]
            async fn test_find_many_sort_and_window() {
                let fixture = $factory;
                let store = fixture.orders();
                store_order(store.as_ref(), &order("o-a", "alice", 10.0, 0)).await;
                store_order(store.as_ref(), &order("o-b", "alice", 10.0, 1)).await;
                store_order(store.as_ref(), &order("o-c", "alice", 10.0, 2)).await;
                store_order(store.as_ref(), &order("o-x", "bob", 10.0, 3)).await;

                let mine = Clause::eq(OrderColumn::UserId, "alice");
                let all = store
                    .find_many(&mine, Window::all(), &[], Projection::Full)
                    .await
                    .unwrap();
                assert_eq!(ids(&all), vec!["o-c", "o-b", "o-a"]);

                let middle = store
                    .find_many(&mine, Window::new(1, 1), &[], Projection::Full)
                    .await
                    .unwrap();
                assert_eq!(ids(&middle), vec!["o-b"]);

                let oldest_first = [OrderBy::new(OrderColumn::CreatedAt, SortDirection::Asc)];
                let asc = store
                    .find_many(&mine, Window::new(2, 0), &oldest_first, Projection::Identity)
                    .await
                    .unwrap();
                assert_eq!(ids(&asc), vec!["o-a", "o-b"]);
            }

            #[tokio::test]
            async fn test_count_with_range_groups() {
                let fixture = $factory;
                let store = fixture.orders();
                store_order(store.as_ref(), &order("o-1", "alice", 5.0, 0)).await;
                store_order(store.as_ref(), &order("o-2", "alice", 15.0, 1)).await;
                store_order(store.as_ref(), &order("o-3", "alice", 25.0, 2)).await;

                let band = Clause::all()
                    .group(Group::all(Comparison::GreaterThanOrEqual).with(OrderColumn::Amount, 10.0))
                    .group(Group::all(Comparison::LessThanOrEqual).with(OrderColumn::Amount, 20.0));
                assert_eq!(store.count(&band).await.unwrap(), 1);

                let picked = Clause::all()
                    .group(Group::all(Comparison::In).with_set(OrderColumn::Id, ["o-1", "o-3", "o-9"]));
                assert_eq!(store.count(&picked).await.unwrap(), 2);

                let nothing = Clause::all()
                    .group(Group::all(Comparison::In).with_set(OrderColumn::Id, Vec::<String>::new()));
                assert_eq!(store.count(&nothing).await.unwrap(), 0);
            }

            #[tokio::test]
            async fn test_update_locked_appends_history() {
                let fixture = $factory;
                let store = fixture.orders();
                store_order(store.as_ref(), &order("o-1", "alice", 10.0, 0)).await;

                let at = epoch() + chrono::Duration::hours(1);
                let entry = HistoryEntry::new("Cancelled order", "alice", at);
                let changes = Assignments::new()
                    .set(OrderColumn::Status, OrderStatus::Cancelled.as_str())
                    .set(OrderColumn::Cancelled, true)
                    .set(OrderColumn::CancelledAt, at)
                    .append(OrderColumn::History, serde_json::to_value(vec![entry.clone()]).unwrap())
                    .set(OrderColumn::UpdatedAt, at)
                    .returning_all();

                let mut scope = TransactionScope::begin(store.as_ref(), "update").await.unwrap();
                store
                    .find_one_locked(scope.tx().unwrap(), &by_id("o-1"), Projection::Full)
                    .await
                    .unwrap();
                let updated = store
                    .update_locked(scope.tx().unwrap(), &by_id("o-1"), &changes)
                    .await
                    .unwrap()
                    .unwrap();
                scope.commit().await.unwrap();

                assert_eq!(updated.status, OrderStatus::Cancelled);
                assert_eq!(updated.history.len(), 2);
                assert_eq!(updated.history[1], entry);

                let stored = store.find_one(&by_id("o-1"), Projection::Full).await.unwrap();
                assert!(stored.cancelled);
                assert_eq!(stored.cancelled_at, Some(at));
                assert_eq!(stored.updated_at, at);
                assert_eq!(stored.history.len(), 2);
            }

            #[tokio::test]
            async fn test_update_locked_without_match() {
                let fixture = $factory;
                let store = fixture.orders();
                let mut scope = TransactionScope::begin(store.as_ref(), "update").await.unwrap();

                let returning = Assignments::new()
                    .set(OrderColumn::Remark, "nothing")
                    .returning_all();
                let result = store
                    .update_locked(scope.tx().unwrap(), &by_id("missing"), &returning)
                    .await;
                assert!(matches!(result, Err(StoreError::NotFound)));

                let silent = Assignments::new().set(OrderColumn::Remark, "nothing");
                let result = store
                    .update_locked(scope.tx().unwrap(), &by_id("missing"), &silent)
                    .await
                    .unwrap();
                assert!(result.is_none());
            }

            #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
            async fn test_locked_read_waits_for_commit() {
                let fixture = $factory;
                let store = fixture.orders();
                store_order(store.as_ref(), &order("o-1", "alice", 10.0, 0)).await;

                let mut first = TransactionScope::begin(store.as_ref(), "first").await.unwrap();
                store
                    .find_one_locked(first.tx().unwrap(), &by_id("o-1"), Projection::Full)
                    .await
                    .unwrap();

                let contender = {
                    let store = store.clone();
                    tokio::spawn(async move {
                        let mut second = TransactionScope::begin(store.as_ref(), "second").await.unwrap();
                        let seen = store
                            .find_one_locked(second.tx().unwrap(), &by_id("o-1"), Projection::Full)
                            .await
                            .unwrap();
                        second.commit().await.unwrap();
                        seen
                    })
                };

                tokio::time::sleep(Duration::from_millis(200)).await;
                assert!(!contender.is_finished(), "second locked read must wait");

                let changes = Assignments::new()
                    .set(OrderColumn::Status, OrderStatus::Approved.as_str());
                store
                    .update_locked(first.tx().unwrap(), &by_id("o-1"), &changes)
                    .await
                    .unwrap();
                first.commit().await.unwrap();

                let seen = contender.await.unwrap();
                assert_eq!(seen.status, OrderStatus::Approved);
            }

            // ==================================================================
            // Products and users
            // ==================================================================

            #[tokio::test]
            async fn test_products_by_ids_and_status() {
                let fixture = $factory;
                fixture.add_product(product("p-b", "Chair", 40.0, 2)).await;
                fixture.add_product(product("p-a", "Desk", 120.0, 1)).await;
                let mut draft = product("p-c", "Shelf", 60.0, 4);
                draft.status = order_engine::catalog::ProductStatus::Draft;
                fixture.add_product(draft).await;

                let clause = Clause::all()
                    .group(Group::all(Comparison::In).with_set(ProductColumn::Id, ["p-a", "p-b", "p-c"]))
                    .group(Group::all(Comparison::Equal).with(ProductColumn::Status, "PUBLISHED"));
                let by_id = [OrderBy::new(ProductColumn::Id, SortDirection::Asc)];

                let products = fixture
                    .products()
                    .find_many(&clause, Window::all(), &by_id, Projection::Full)
                    .await
                    .unwrap();
                let names: Vec<&str> = products.iter().map(|p| p.name.as_str()).collect();
                assert_eq!(names, vec!["Desk", "Chair"]);
                assert_eq!(products[0].stock, 1);
                assert_amount(products[0].price, 120.0);
                assert_eq!(fixture.products().count(&clause).await.unwrap(), 2);
            }

            #[tokio::test]
            async fn test_products_search_any_group() {
                let fixture = $factory;
                fixture.add_product(product("p-1", "Desk Lamp", 30.0, 3)).await;
                let mut described = product("p-2", "Reading light", 20.0, 3);
                described.description = "A small LAMP for reading".into();
                fixture.add_product(described).await;
                fixture.add_product(product("p-3", "Chair", 40.0, 3)).await;

                let clause = Clause::all().group(
                    Group::any(Comparison::ILike)
                        .with(ProductColumn::Name, "%lamp%")
                        .with(ProductColumn::Description, "%lamp%"),
                );
                let by_id = [OrderBy::new(ProductColumn::Id, SortDirection::Asc)];
                let found = fixture
                    .products()
                    .find_many(&clause, Window::all(), &by_id, Projection::Full)
                    .await
                    .unwrap();
                let ids: Vec<&str> = found.iter().map(|p| p.id.as_str()).collect();
                assert_eq!(ids, vec!["p-1", "p-2"]);
            }

            #[tokio::test]
            async fn test_user_roles() {
                let fixture = $factory;
                fixture.add_user(user("alice")).await;
                let users = fixture.users();

                assert_eq!(users.find_by_id("alice").await.unwrap().role, Role::User);
                users.set_role("alice", Role::Admin).await.unwrap();
                assert!(users.find_by_id("alice").await.unwrap().is_admin());

                assert!(matches!(users.find_by_id("ghost").await, Err(StoreError::NotFound)));
                assert!(matches!(
                    users.set_role("ghost", Role::Admin).await,
                    Err(StoreError::NotFound)
                ));
            }
        }
    };
}
