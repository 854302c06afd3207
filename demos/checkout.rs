//! Checkout walkthrough on the in-memory backend
//!
//! ```sh
//! RUST_LOG=order_engine=debug cargo run --example checkout
//! ```

use anyhow::Result;
use order_engine::prelude::*;
use std::sync::Arc;

fn product(id: &str, name: &str, price: f64, stock: i64) -> Product {
    let now = Utc::now();
    Product {
        id: id.to_string(),
        user_id: "seller-1".to_string(),
        name: name.to_string(),
        price,
        stock,
        status: ProductStatus::Published,
        created_at: now,
        updated_at: now,
        ..Default::default()
    }
}

fn user(id: &str, role: Role) -> User {
    let now = Utc::now();
    User {
        id: id.to_string(),
        email: format!("{id}@example.com"),
        role,
        created_at: now,
        updated_at: now,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    order_engine::logging::init("info,order_engine=debug");
    let config = EngineConfig::from_env()?;

    let orders = Arc::new(InMemoryOrderStore::new());
    let products = Arc::new(InMemoryProductStore::new());
    let users = Arc::new(InMemoryUserStore::new());

    products.seed([
        product("lamp", "Desk Lamp", 24.99, 10),
        product("chair", "Office Chair", 149.50, 2),
    ])?;
    users.seed([user("alice", Role::User), user("root", Role::Admin)])?;

    let service = OrderService::new(orders, products.clone(), users.clone())
        .with_config(config.clone());
    let catalog = CatalogService::new(products, users).with_config(config);

    let listing = catalog
        .products(
            "alice",
            ProductFilter {
                search: Some("lamp".into()),
                ..Default::default()
            },
        )
        .await?;
    println!("Catalog search 'lamp': {} product(s)", listing.data.len());

    let cart = InitiateOrder {
        items: vec![CartItem::new("lamp", 3), CartItem::new("chair", 1)],
    };
    let order = service.initiate_order("alice", cart.clone()).await?;
    println!("Initiated {} ({}) for {:.2}", order.id, order.reference, order.amount);

    let again = service.initiate_order("alice", cart).await?;
    println!("Resubmitted cart returns the same order: {}", again.id == order.id);

    let too_many = InitiateOrder {
        items: vec![CartItem::new("chair", 5)],
    };
    if let Err(err) = service.initiate_order("alice", too_many).await {
        println!("Rejected [{}]: {}", err.error_code(), err);
    }

    let approved = service
        .update_order(
            "root",
            UpdateOrder {
                order_id: order.id.clone(),
                status: "APPROVED".into(),
            },
        )
        .await?;
    println!("Admin moved order to {}", approved.status);

    let page = service
        .orders(
            "alice",
            OrderFilter {
                paginate: true,
                ..Default::default()
            },
        )
        .await?;
    if let Some(pagination) = page.pagination {
        println!(
            "Alice has {} order(s) across {} page(s)",
            pagination.total, pagination.pages
        );
    }
    for entry in &approved.history {
        println!("  {} by {} at {}", entry.action, entry.actor, entry.at);
    }

    Ok(())
}
