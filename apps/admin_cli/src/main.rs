use std::sync::Arc;

use anyhow::{Context, Result};
use api_client::HttpBackOfficeApi;
use clap::{Parser, Subcommand};
use shared::domain::{OrderId, OrderStatus, ProductId};
use shared::protocol::OrderFilter;
use store_core::{Assets, BackOfficeStore, NotificationKind, StoreEvent};
use tokio::sync::broadcast;
use url::Url;

mod config;

use config::load_settings;

#[derive(Parser, Debug)]
#[command(name = "admin_cli", about = "E-bazar back-office console")]
struct Args {
    /// Backend base URL; overrides admin.toml and environment.
    #[arg(long)]
    server_url: Option<String>,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    password: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List orders, optionally a single status bucket.
    Orders {
        #[arg(long)]
        status: Option<OrderStatus>,
    },
    /// Show one order with its lines and shipping details.
    Order { id: String },
    /// Change an order's status (applied optimistically, rolled back if the
    /// backend rejects it).
    SetStatus { id: String, status: OrderStatus },
    Products,
    Product { id: String },
    Categories,
    ProductCategories,
    Customers,
    Subscribers,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let args = Args::parse();
    let settings = load_settings();

    let server_url = args.server_url.unwrap_or(settings.server_url);
    tracing::debug!(server_url = %server_url, "starting back-office console");
    let asset_base = Url::parse(&settings.asset_base_url)
        .with_context(|| format!("invalid asset base url: {}", settings.asset_base_url))?;
    let api = Arc::new(HttpBackOfficeApi::new(server_url));
    let store = BackOfficeStore::new(api, Assets::new(asset_base, settings.fallback_image));
    let mut events = store.subscribe_events();

    let email = args.email.or(settings.email);
    let password = args.password.or(settings.password);
    if let (Some(email), Some(password)) = (email, password) {
        let session = store.login(email, password).await?;
        tracing::info!(user = %session.user.email, "authenticated");
        println!("Logged in as {}", session.user.email);
    }

    let outcome = run_command(&store, args.command).await;
    flush_notifications(&mut events);
    outcome
}

async fn run_command(store: &BackOfficeStore, command: Command) -> Result<()> {
    match command {
        Command::Orders { status } => {
            let filter = status.map(OrderFilter::with_status).unwrap_or_default();
            store.refresh_orders(filter).await?;
            let orders = match status {
                Some(status) => store.orders_by_status(status).await,
                None => store.orders().await,
            };
            for order in orders {
                println!(
                    "{}  {:<9}  {:>8.2}  {}  {}",
                    order.id,
                    order.status,
                    order.total_price,
                    order.payment_method,
                    order.created_at.format("%Y-%m-%d %H:%M")
                );
            }
        }
        Command::Order { id } => {
            let id = OrderId::new(id);
            store.fetch_order(&id).await?;
            let detail = store
                .order_detail(&id)
                .await
                .with_context(|| format!("order {id} not found"))?;
            println!("Order #{}", detail.order.id);
            println!("  placed:   {}", detail.order.created_at);
            println!("  status:   {}", detail.order.status);
            println!("  payment:  {}", detail.order.payment_method);
            println!(
                "  buyer:    {} <{}> {}",
                detail.order.buyer.name, detail.order.buyer.email, detail.order.buyer.phone_number
            );
            let addr = &detail.order.shipping_address;
            println!(
                "  ship to:  {}, {}, {} {}, {}",
                addr.name, addr.address, addr.zip_code, addr.city, addr.country
            );
            for line in &detail.lines {
                println!(
                    "    {:>2} x {:<24} @ {:>8.2} = {:>8.2}  [{}]",
                    line.quantity, line.name, line.unit_price, line.line_total, line.image
                );
            }
            println!("  total:    {:.2}", detail.order.total_price);
        }
        Command::SetStatus { id, status } => {
            let id = OrderId::new(id);
            store.fetch_order(&id).await?;
            store.update_order_status(&id, status).await?;
            println!("Order {id} is now {status}");
        }
        Command::Products => {
            store.refresh_products().await?;
            for view in store.products().await {
                println!(
                    "{}  {:<24}  {:>8.2}  stock={}  [{}]",
                    view.product.id,
                    view.product.name,
                    view.product.price,
                    view.product
                        .stock
                        .map(|n| n.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                    view.image
                );
            }
        }
        Command::Product { id } => {
            let id = ProductId::new(id);
            store.fetch_product(&id).await?;
            let view = store
                .product_detail(&id)
                .await
                .with_context(|| format!("product {id} not found"))?;
            println!("{}  {}  {:.2}  [{}]", view.product.id, view.product.name, view.product.price, view.image);
        }
        Command::Categories => {
            store.refresh_categories().await?;
            for category in store.categories().await {
                match &category.parent_id {
                    Some(parent) => println!("{}  {}  (parent {})", category.id, category.name, parent),
                    None => println!("{}  {}", category.id, category.name),
                }
            }
        }
        Command::ProductCategories => {
            store.refresh_product_categories().await?;
            for category in store.product_categories().await {
                println!("{}  {}", category.id, category.name);
            }
        }
        Command::Customers => {
            store.refresh_customers().await?;
            for customer in store.customers().await {
                println!(
                    "{}  {:<24}  {}  {}",
                    customer.id,
                    customer.name,
                    customer.email,
                    customer.phone_number.as_deref().unwrap_or("-")
                );
            }
        }
        Command::Subscribers => {
            store.refresh_subscribers().await?;
            for subscriber in store.subscribers().await {
                println!("{}  {}  {}", subscriber.id, subscriber.email, subscriber.created_at);
            }
        }
    }
    Ok(())
}

/// Print whatever user-facing notifications the store emitted while the
/// command ran. Failed optimistic writes surface here.
fn flush_notifications(events: &mut broadcast::Receiver<StoreEvent>) {
    while let Ok(event) = events.try_recv() {
        if let StoreEvent::Notification { kind, message } = event {
            match kind {
                NotificationKind::Error => eprintln!("! {message}"),
                NotificationKind::Success | NotificationKind::Info => println!("* {message}"),
            }
        }
    }
}
