//! Macro-generated service suite: checkout, cancellation, administrative
//! updates, listing, catalog and admin grants, run end to end over a
//! [`Fixture`](super::Fixture).
//!
//! # Usage
//!
//! ```rust,ignore
//! #[macro_use]
//! mod storage_harness;
//!
//! use storage_harness::*;
//!
//! order_lifecycle_tests!(InMemoryFixture::new());
//! ```

#[macro_export]
macro_rules! order_lifecycle_tests {
    ($factory:expr) => {
        mod order_lifecycle_suite {
            use super::*;
            use order_engine::accounts::{AccountService, Role};
            use order_engine::catalog::{CatalogService, ProductFilter, ProductStatus};
            use order_engine::core::error::ErrorKind;
            use order_engine::core::predicate::Clause;
            use order_engine::core::query::Projection;
            use order_engine::core::service::{OrderStore, UserStore};
            use order_engine::orders::{
                CancelOrder, CartItem, InitiateOrder, OrderColumn, OrderFilter, OrderStatus,
                UpdateOrder,
            };

            fn cart(items: &[(&str, i64)]) -> InitiateOrder {
                InitiateOrder {
                    items: items.iter().map(|(id, qty)| CartItem::new(*id, *qty)).collect(),
                }
            }

            fn cancel(order_id: &str) -> CancelOrder {
                CancelOrder {
                    order_id: order_id.to_string(),
                    cancel: true,
                }
            }

            fn update(order_id: &str, status: &str) -> UpdateOrder {
                UpdateOrder {
                    order_id: order_id.to_string(),
                    status: status.to_string(),
                }
            }

            // ==================================================================
            // InitiateOrder
            // ==================================================================

            #[tokio::test]
            async fn test_checkout_rejects_short_stock_then_reuses_order() {
                let fixture = $factory;
                fixture.add_user(user("alice")).await;
                fixture.add_product(product("product-a", "productA", 10.00, 5)).await;
                fixture.add_product(product("product-b", "productB", 5.00, 0)).await;
                let service = order_service(&fixture);
                let mine = Clause::eq(OrderColumn::UserId, "alice");

                let rejected = service
                    .initiate_order("alice", cart(&[("product-a", 2), ("product-b", 1)]))
                    .await;
                assert_order_error(
                    rejected,
                    ErrorKind::Validation,
                    "requested quantity for product 'productB' exceeds available stock",
                );
                assert_eq!(fixture.orders().count(&mine).await.unwrap(), 0);

                fixture.restock("product-b", 3).await;
                let first = service
                    .initiate_order("alice", cart(&[("product-a", 2), ("product-b", 1)]))
                    .await
                    .unwrap();
                assert_eq!(first.status, OrderStatus::Pending);
                assert_eq!(first.user_id, "alice");
                assert_amount(first.amount, 25.00);
                assert_eq!(first.invoice.len(), 2);
                assert_eq!(first.invoice[0].key, "product-a");
                assert_eq!(first.history.len(), 1);
                assert_eq!(first.history[0].action, "Initiated product(s) purchase");
                assert_eq!(first.remark, "Product(s) purchase");
                assert!(first.reference.starts_with("market-"));
                assert!(first.product_id.is_none());

                let again = service
                    .initiate_order("alice", cart(&[("product-b", 1), ("product-a", 2)]))
                    .await
                    .unwrap();
                assert_eq!(again.id, first.id);
                assert_eq!(fixture.orders().count(&mine).await.unwrap(), 1);
            }

            #[tokio::test]
            async fn test_changed_cart_creates_new_order() {
                let fixture = $factory;
                fixture.add_user(user("alice")).await;
                fixture.add_product(product("p-1", "Desk Lamp", 12.50, 10)).await;
                let service = order_service(&fixture);

                let one = service.initiate_order("alice", cart(&[("p-1", 1)])).await.unwrap();
                let two = service.initiate_order("alice", cart(&[("p-1", 3)])).await.unwrap();
                assert_ne!(one.id, two.id);
                assert_ne!(one.checksum, two.checksum);
                assert_eq!(one.product_id.as_deref(), Some("p-1"));
                assert_amount(two.amount, 37.50);
            }

            #[tokio::test]
            async fn test_cancelled_order_is_not_reused() {
                let fixture = $factory;
                fixture.add_user(user("alice")).await;
                fixture.add_product(product("p-1", "Desk Lamp", 10.0, 10)).await;
                let service = order_service(&fixture);

                let first = service.initiate_order("alice", cart(&[("p-1", 1)])).await.unwrap();
                service.cancel_order("alice", cancel(&first.id)).await.unwrap();
                let second = service.initiate_order("alice", cart(&[("p-1", 1)])).await.unwrap();
                assert_ne!(first.id, second.id);
            }

            #[tokio::test]
            async fn test_checkout_rejects_bad_carts() {
                let fixture = $factory;
                fixture.add_user(user("alice")).await;
                fixture.add_product(product("p-1", "Desk Lamp", 10.0, 10)).await;
                let mut draft = product("p-2", "Prototype", 10.0, 10);
                draft.status = ProductStatus::Draft;
                fixture.add_product(draft).await;
                let service = order_service(&fixture);

                assert_order_error(
                    service.initiate_order("alice", cart(&[])).await,
                    ErrorKind::Validation,
                    "you need to select at least one product to order",
                );
                assert_order_error(
                    service.initiate_order("alice", cart(&[("", 1)])).await,
                    ErrorKind::Validation,
                    "product id is required",
                );
                assert_order_error(
                    service.initiate_order("alice", cart(&[("p-1", 1), ("p-1", 2)])).await,
                    ErrorKind::Conflict,
                    "each product can only be selected once",
                );
                assert_order_error(
                    service.initiate_order("alice", cart(&[("p-1", 1), ("p-2", 1)])).await,
                    ErrorKind::Conflict,
                    "some of the selected products are no longer available. please refresh and try again",
                );
                assert_order_error(
                    service.initiate_order("alice", cart(&[("p-1", 0)])).await,
                    ErrorKind::Validation,
                    "item quantity is required",
                );
                assert_order_error(
                    service.initiate_order("ghost", cart(&[("p-1", 1)])).await,
                    ErrorKind::NotFound,
                    "looks like your account no longer exists. please contact support",
                );
                assert_eq!(fixture.orders().count(&Clause::all()).await.unwrap(), 0);
            }

            // ==================================================================
            // CancelOrder
            // ==================================================================

            #[tokio::test]
            async fn test_cancel_then_cancel_again() {
                let fixture = $factory;
                fixture.add_user(user("alice")).await;
                fixture.add_product(product("p-1", "Desk Lamp", 10.0, 10)).await;
                let service = order_service(&fixture);
                let order = service.initiate_order("alice", cart(&[("p-1", 1)])).await.unwrap();

                let cancelled = service.cancel_order("alice", cancel(&order.id)).await.unwrap();
                assert_eq!(cancelled.status, OrderStatus::Cancelled);
                assert!(cancelled.cancelled);
                assert!(cancelled.cancelled_at.is_some());
                assert_eq!(cancelled.remark, "Order cancelled");
                assert_eq!(cancelled.history.len(), 2);
                assert_eq!(cancelled.history[1].action, "Cancelled order");
                assert_eq!(cancelled.history[1].actor, "alice");

                assert_order_error(
                    service.cancel_order("alice", cancel(&order.id)).await,
                    ErrorKind::Conflict,
                    "order has already been cancelled",
                );
            }

            #[tokio::test]
            async fn test_cancel_false_leaves_order_untouched() {
                let fixture = $factory;
                fixture.add_user(user("alice")).await;
                fixture.add_product(product("p-1", "Desk Lamp", 10.0, 10)).await;
                let service = order_service(&fixture);
                let order = service.initiate_order("alice", cart(&[("p-1", 1)])).await.unwrap();

                let payload = CancelOrder {
                    order_id: order.id.clone(),
                    cancel: false,
                };
                let same = service.cancel_order("alice", payload).await.unwrap();
                assert_eq!(same.id, order.id);
                assert_eq!(same.status, OrderStatus::Pending);
                assert!(!same.cancelled);
                assert_eq!(same.history.len(), 1);
            }

            #[tokio::test]
            async fn test_cancel_is_scoped_to_owner() {
                let fixture = $factory;
                fixture.add_user(user("alice")).await;
                fixture.add_user(user("bob")).await;
                fixture.add_product(product("p-1", "Desk Lamp", 10.0, 10)).await;
                let service = order_service(&fixture);
                let order = service.initiate_order("alice", cart(&[("p-1", 1)])).await.unwrap();

                assert_order_error(
                    service.cancel_order("bob", cancel(&order.id)).await,
                    ErrorKind::NotFound,
                    "order not found",
                );
                assert_order_error(
                    service.cancel_order("alice", cancel("  ")).await,
                    ErrorKind::Validation,
                    "order id is required",
                );
            }

            #[tokio::test]
            async fn test_cancel_requires_pending() {
                let fixture = $factory;
                fixture.add_user(user("alice")).await;
                fixture.add_user(admin("root")).await;
                fixture.add_product(product("p-1", "Desk Lamp", 10.0, 10)).await;
                let service = order_service(&fixture);
                let order = service.initiate_order("alice", cart(&[("p-1", 1)])).await.unwrap();
                service.update_order("root", update(&order.id, "APPROVED")).await.unwrap();

                assert_order_error(
                    service.cancel_order("alice", cancel(&order.id)).await,
                    ErrorKind::Conflict,
                    "order cannot be cancelled",
                );
            }

            // ==================================================================
            // UpdateOrder
            // ==================================================================

            #[tokio::test]
            async fn test_admin_update_transitions() {
                let fixture = $factory;
                fixture.add_user(user("alice")).await;
                fixture.add_user(admin("root")).await;
                fixture.add_product(product("p-1", "Desk Lamp", 10.0, 10)).await;
                let service = order_service(&fixture);
                let order = service.initiate_order("alice", cart(&[("p-1", 1)])).await.unwrap();

                assert_order_error(
                    service.update_order("alice", update(&order.id, "COMPLETED")).await,
                    ErrorKind::Permission,
                    "you do not have the permission to access this feature",
                );
                assert_order_error(
                    service.update_order("root", update(&order.id, "SHIPPED")).await,
                    ErrorKind::Validation,
                    "order can either be completed, approved, rejected or cancelled",
                );
                assert_order_error(
                    service.update_order("root", update(&order.id, "PENDING")).await,
                    ErrorKind::Validation,
                    "order can either be completed, approved, rejected or cancelled",
                );
                let untouched = fixture
                    .orders()
                    .find_one(&Clause::eq(OrderColumn::Id, order.id.as_str()), Projection::Full)
                    .await
                    .unwrap();
                assert_eq!(untouched.status, OrderStatus::Pending);
                assert_eq!(untouched.history.len(), 1);

                let completed = service
                    .update_order("root", update(&order.id, "COMPLETED"))
                    .await
                    .unwrap();
                assert_eq!(completed.status, OrderStatus::Completed);
                assert_eq!(completed.remark, "Order completed");
                assert_eq!(completed.history.len(), 2);
                assert_eq!(completed.history[1].action, "Updated order status to COMPLETED");
                assert_eq!(completed.history[1].actor, "root");

                assert_order_error(
                    service.update_order("root", update(&order.id, "REJECTED")).await,
                    ErrorKind::Conflict,
                    "order can no longer be updated",
                );
                assert_order_error(
                    service.update_order("root", update("missing", "REJECTED")).await,
                    ErrorKind::NotFound,
                    "order not found",
                );
            }

            #[tokio::test]
            async fn test_admin_cancel_sets_flag() {
                let fixture = $factory;
                fixture.add_user(user("alice")).await;
                fixture.add_user(admin("root")).await;
                fixture.add_product(product("p-1", "Desk Lamp", 10.0, 10)).await;
                let service = order_service(&fixture);
                let order = service.initiate_order("alice", cart(&[("p-1", 1)])).await.unwrap();

                let cancelled = service
                    .update_order("root", update(&order.id, "CANCELLED"))
                    .await
                    .unwrap();
                assert_eq!(cancelled.status, OrderStatus::Cancelled);
                assert!(cancelled.cancelled);

                assert_order_error(
                    service.update_order("root", update(&order.id, "APPROVED")).await,
                    ErrorKind::Conflict,
                    "order has already been cancelled",
                );
            }

            // ==================================================================
            // Orders listing
            // ==================================================================

            #[tokio::test]
            async fn test_listing_paginates() {
                let fixture = $factory;
                fixture.add_user(user("alice")).await;
                fixture.add_user(user("bob")).await;
                for i in 0..45 {
                    let id = format!("o-{i:02}");
                    store_order(fixture.orders().as_ref(), &order(&id, "alice", 10.0, i)).await;
                }
                let service = order_service(&fixture);

                let filter = OrderFilter {
                    limit: Some(10),
                    paginate: true,
                    ..Default::default()
                };
                let first = service.orders("alice", filter.clone()).await.unwrap();
                assert_eq!(first.data.len(), 10);
                assert_eq!(first.data[0].id, "o-44");
                let pagination = first.pagination.unwrap();
                assert_eq!(pagination.total, 45);
                assert_eq!(pagination.pages, 5);
                assert!(pagination.has_next());

                let last = service
                    .orders("alice", OrderFilter { page: Some(5), ..filter.clone() })
                    .await
                    .unwrap();
                assert_eq!(last.data.len(), 5);
                assert_eq!(last.data[4].id, "o-00");
                assert!(!last.pagination.unwrap().has_next());

                let empty = service.orders("bob", filter).await.unwrap();
                assert!(empty.data.is_empty());
                let pagination = empty.pagination.unwrap();
                assert_eq!(pagination.total, 0);
                assert_eq!(pagination.pages, 0);

                let unpaginated = service.orders("alice", OrderFilter::default()).await.unwrap();
                assert_eq!(unpaginated.data.len(), 20);
                assert!(unpaginated.pagination.is_none());
            }

            #[tokio::test]
            async fn test_listing_far_page_is_empty() {
                let fixture = $factory;
                fixture.add_user(user("alice")).await;
                fixture.add_product(product("p-1", "Desk Lamp", 10.0, 3)).await;
                for i in 0..3 {
                    let id = format!("o-{i}");
                    store_order(fixture.orders().as_ref(), &order(&id, "alice", 10.0, i)).await;
                }
                let service = order_service(&fixture);

                let far = OrderFilter {
                    page: Some(i64::MAX / 10),
                    limit: Some(100),
                    paginate: true,
                    ..Default::default()
                };
                let page = service.orders("alice", far).await.unwrap();
                assert!(page.data.is_empty());
                let pagination = page.pagination.unwrap();
                assert_eq!(pagination.page, i64::MAX / 10);
                assert_eq!(pagination.total, 3);
                assert_eq!(pagination.pages, 1);

                let catalog = CatalogService::new(fixture.products(), fixture.users());
                let far = ProductFilter {
                    page: Some(i64::MAX),
                    limit: Some(100),
                    ..Default::default()
                };
                let page = catalog.products("alice", far).await.unwrap();
                assert!(page.data.is_empty());
            }

            #[tokio::test]
            async fn test_listing_visibility_and_filters() {
                let fixture = $factory;
                fixture.add_user(user("alice")).await;
                fixture.add_user(user("bob")).await;
                fixture.add_user(admin("root")).await;
                let orders = fixture.orders();
                store_order(orders.as_ref(), &order("o-1", "alice", 5.0, 0)).await;
                store_order(orders.as_ref(), &order("o-2", "alice", 50.0, 1)).await;
                store_order(orders.as_ref(), &order("o-3", "bob", 500.0, 2)).await;
                let service = order_service(&fixture);

                let foreign = OrderFilter {
                    user_id: Some("bob".into()),
                    ..Default::default()
                };
                let page = service.orders("alice", foreign.clone()).await.unwrap();
                let ids: Vec<&str> = page.data.iter().map(|o| o.id.as_str()).collect();
                assert_eq!(ids, vec!["o-2", "o-1"]);

                let page = service.orders("root", foreign).await.unwrap();
                assert_eq!(page.data.len(), 1);
                assert_eq!(page.data[0].id, "o-3");

                let band = OrderFilter {
                    min_amount: Some(10.0),
                    max_amount: Some(100.0),
                    ..Default::default()
                };
                let page = service.orders("root", band).await.unwrap();
                assert_eq!(page.data.len(), 1);
                assert_eq!(page.data[0].id, "o-2");

                let by_reference = OrderFilter {
                    reference: Some("market-o-1".into()),
                    status: Some("PENDING".into()),
                    ..Default::default()
                };
                let page = service.orders("alice", by_reference).await.unwrap();
                assert_eq!(page.data.len(), 1);
                assert_eq!(page.data[0].id, "o-1");

                let since = OrderFilter {
                    start_date: Some(epoch() + chrono::Duration::minutes(1)),
                    ..Default::default()
                };
                let page = service.orders("root", since).await.unwrap();
                assert_eq!(page.data.len(), 2);
            }

            // ==================================================================
            // Catalog and accounts
            // ==================================================================

            #[tokio::test]
            async fn test_catalog_visibility_and_search() {
                let fixture = $factory;
                fixture.add_user(user("alice")).await;
                fixture.add_user(admin("root")).await;
                fixture.add_product(product("p-1", "Desk Lamp", 30.0, 3)).await;
                fixture.add_product(product("p-2", "Chair", 45.0, 3)).await;
                let mut draft = product("p-3", "Lamp Prototype", 10.0, 1);
                draft.status = ProductStatus::Draft;
                fixture.add_product(draft).await;
                let catalog = CatalogService::new(fixture.products(), fixture.users());

                let search = ProductFilter {
                    search: Some("lamp".into()),
                    paginate: true,
                    ..Default::default()
                };
                let page = catalog.products("alice", search.clone()).await.unwrap();
                assert_eq!(page.data.len(), 1);
                assert_eq!(page.data[0].id, "p-1");
                assert_eq!(page.pagination.unwrap().total, 1);

                let page = catalog.products("root", search).await.unwrap();
                assert_eq!(page.data.len(), 2);

                let drafts = ProductFilter {
                    status: Some("DRAFT".into()),
                    ..Default::default()
                };
                let page = catalog.products("alice", drafts.clone()).await.unwrap();
                assert_eq!(page.data.len(), 2);
                assert!(page.data.iter().all(|p| p.status == ProductStatus::Published));
                let page = catalog.products("root", drafts).await.unwrap();
                assert_eq!(page.data.len(), 1);

                let priced = ProductFilter {
                    min_amount: Some(40.0),
                    ..Default::default()
                };
                let page = catalog.products("alice", priced).await.unwrap();
                assert_eq!(page.data.len(), 1);
                assert_eq!(page.data[0].name, "Chair");
            }

            #[tokio::test]
            async fn test_grant_admin() {
                let fixture = $factory;
                fixture.add_user(user("alice")).await;
                fixture.add_user(user("bob")).await;
                fixture.add_user(admin("root")).await;
                let accounts = AccountService::new(fixture.users());

                assert_order_error(
                    accounts.grant_admin("alice", "bob").await,
                    ErrorKind::Permission,
                    "you do not have the permission to add an admin",
                );

                let promoted = accounts.grant_admin("root", "bob").await.unwrap();
                assert_eq!(promoted.role, Role::Admin);
                assert!(fixture.users().find_by_id("bob").await.unwrap().is_admin());

                assert_order_error(
                    accounts.grant_admin("root", "bob").await,
                    ErrorKind::Conflict,
                    "user already have access to admin feature",
                );
                assert_order_error(
                    accounts.grant_admin("root", "ghost").await,
                    ErrorKind::NotFound,
                    "looks like your account no longer exists. please contact support",
                );
            }
        }
    };
}
