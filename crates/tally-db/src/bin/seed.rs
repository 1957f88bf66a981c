//! # Seed Data Generator
//!
//! Populates a register database with a primary warehouse and a small demo
//! catalog with stock.
//!
//! ## Usage
//! ```bash
//! cargo run -p tally-db --bin seed
//!
//! # Specify database path and starting stock per product
//! cargo run -p tally-db --bin seed -- --db ./data/tally.db --stock 40
//! ```
//!
//! Every third product starts at low stock and the last one is untracked,
//! so the register shows all three stock statuses.

use std::env;
use tally_core::Product;
use tally_db::{Database, DbConfig};
use uuid::Uuid;

/// (sku, name, price in cents)
const CATALOG: &[(&str, &str, i64)] = &[
    ("BEV-TEA", "Masala Tea", 250),
    ("BEV-COF", "Filter Coffee", 300),
    ("BEV-SOD", "Soda 500ml", 150),
    ("BEV-WAT", "Water 1L", 100),
    ("BAK-MAN", "Mandazi", 50),
    ("BAK-SAM", "Beef Samosa", 80),
    ("BAK-BRD", "White Bread 400g", 65),
    ("SNK-CRS", "Crisps", 120),
    ("SNK-NUT", "Roasted Groundnuts", 90),
    ("DRY-MLK", "Fresh Milk 500ml", 60),
    ("DRY-YOG", "Yoghurt 250ml", 110),
    ("HSE-SOP", "Bar Soap", 135),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./tally_dev.db");
    let mut stock: i64 = 40;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--stock" | "-s" => {
                if i + 1 < args.len() {
                    stock = args[i + 1].parse().unwrap_or(40);
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Tally POS Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>     Database file path (default: ./tally_dev.db)");
                println!("  -s, --stock <N>     Starting stock per product (default: 40)");
                println!("  -h, --help          Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Tally POS Seed Data Generator");
    println!("================================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let warehouse = match db.inventory().primary_warehouse().await? {
        Some(w) => w,
        None => db.inventory().create_warehouse("Main Store", true).await?,
    };
    println!("✓ Primary warehouse: {} ({})", warehouse.name, warehouse.id);

    let untracked = CATALOG.len() - 1;
    for (idx, (sku, name, price_cents)) in CATALOG.iter().enumerate() {
        let product = Product {
            id: Uuid::new_v4().to_string(),
            sku: sku.to_string(),
            name: name.to_string(),
            price_cents: *price_cents,
            stock_quantity: None,
            low_stock_threshold: 5,
            allow_negative_stock: false,
            is_active: true,
        };

        if let Err(e) = db.products().insert(&product).await {
            eprintln!("Failed to insert {}: {}", product.sku, e);
            continue;
        }

        if idx == untracked {
            continue;
        }
        let qty = if idx % 3 == 2 { 3 } else { stock };
        db.inventory().restock(&product.id, &warehouse.id, qty).await?;
    }

    println!("✓ Seeded {} products", db.products().count().await?);
    for product in db.products().list_active(&warehouse.id, 50).await? {
        let stock = product
            .stock_quantity
            .map_or_else(|| "untracked".to_string(), |q| q.to_string());
        println!(
            "    {:<10} {:<24} {:>8}  stock {} ({:?})",
            product.sku,
            product.name,
            product.price().to_string(),
            stock,
            product.stock_status()
        );
    }
    println!();
    println!("✓ Seed complete!");

    Ok(())
}
