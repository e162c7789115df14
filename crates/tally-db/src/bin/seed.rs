//! # Seed Data Generator
//!
//! Populates the database with test products for development.
//!
//! ## Usage
//! ```bash
//! # Generate 200 products (default)
//! cargo run -p tally-db --bin seed
//!
//! # Generate custom amount
//! cargo run -p tally-db --bin seed -- --count 500
//!
//! # Specify database path
//! cargo run -p tally-db --bin seed -- --db ./data/tally.db
//! ```
//!
//! ## Generated Products
//! Each product gets a unique SKU `{CATEGORY}-{INDEX}`, a deterministic
//! pseudo-random price ($0.99 - $9.99) and opening stock (0 - 100). The
//! opening stock goes through the normal create path, so every seeded
//! product also gets its `initial` ledger entry.

use std::env;
use tally_core::NewProduct;
use tally_db::{Database, DbConfig};

/// Product categories for realistic test data
const CATEGORIES: &[(&str, &[&str])] = &[
    (
        "BEV",
        &[
            "Coca-Cola 330ml",
            "Pepsi 330ml",
            "Sprite 330ml",
            "Red Bull 250ml",
            "Mineral Water 500ml",
            "Orange Juice 1L",
            "Apple Juice 1L",
            "Iced Tea 500ml",
            "Cold Brew Coffee",
            "Lemonade 330ml",
        ],
    ),
    (
        "SNK",
        &[
            "Lays Classic",
            "Doritos Nacho",
            "Pringles Original",
            "Snickers Bar",
            "Kit Kat",
            "Twix",
            "Salted Peanuts",
            "Trail Mix",
            "Chocolate Cookies",
            "Granola Bar",
        ],
    ),
    (
        "DRY",
        &[
            "Whole Milk 1L",
            "Skim Milk 1L",
            "Cheddar Block",
            "Greek Yogurt",
            "Butter 250g",
            "Eggs Dozen",
            "Cream Cheese",
            "Sour Cream",
            "Mozzarella",
            "Heavy Cream",
        ],
    ),
    (
        "GRO",
        &[
            "White Bread",
            "Wheat Bread",
            "Spaghetti 500g",
            "Penne 500g",
            "White Rice 1kg",
            "Canned Beans",
            "Canned Tomatoes",
            "Peanut Butter",
            "Honey 350g",
            "Rolled Oats",
        ],
    ),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut count: usize = 200;
    let mut db_path = String::from("./tally_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(200);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Tally POS Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of products to generate (default: 200)");
                println!("  -d, --db <PATH>    Database file path (default: ./tally_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Tally POS Seed Data Generator");
    println!("================================");
    println!("Database: {}", db_path);
    println!("Products: {}", count);
    println!();

    // Connect to database
    let config = DbConfig::new(&db_path);
    let db = Database::new(config).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    // Check existing products
    let existing = db.catalog().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    // Generate products
    println!();
    println!("Generating products...");

    let mut generated = 0;
    let start = std::time::Instant::now();

    'outer: for (category_idx, (category_code, names)) in CATEGORIES.iter().enumerate() {
        for repeat in 0.. {
            for (name_idx, name) in names.iter().enumerate() {
                if generated >= count {
                    break 'outer;
                }

                let seed = category_idx * 1000 + repeat * names.len() + name_idx;
                let input = generate_product(category_code, name, seed);

                if let Err(e) = db.catalog().create(&input).await {
                    eprintln!("Failed to insert {}: {}", input.sku, e);
                    continue;
                }

                generated += 1;

                if generated % 50 == 0 {
                    println!("  Generated {} products...", generated);
                }
            }

            // Round-robin across categories rather than exhausting one.
            if repeat >= count / names.len() {
                break;
            }
        }
    }

    let elapsed = start.elapsed();
    println!();
    println!("✓ Generated {} products in {:?}", generated, elapsed);

    let total_stock: i64 = {
        let products = db.catalog().list(count as u32).await?;
        products.iter().map(|p| p.current_stock).sum()
    };
    println!("  Total opening stock across catalog: {} units", total_stock);

    println!();
    println!("✓ Seed complete!");

    Ok(())
}

/// Generates a single product with deterministic pseudo-random data.
fn generate_product(category: &str, name: &str, seed: usize) -> NewProduct {
    let sku = format!("{}-{:04}", category, seed);

    // Price: $0.99 - $9.99
    let price_cents = 99 + ((seed * 17) % 900) as i64;

    // Opening stock: 0 - 100
    let initial_stock = (seed % 101) as i64;

    NewProduct {
        sku,
        name: name.to_string(),
        price_cents,
        initial_stock,
    }
}
