//! # Seed Data Generator
//!
//! Populates the database with catalog products and coupons for development.
//!
//! ## Usage
//! ```bash
//! # Generate 500 products (default)
//! cargo run -p orchard-db --bin seed
//!
//! # Custom amount / database path
//! cargo run -p orchard-db --bin seed -- --count 2000 --db ./data/orchard.db
//! ```

use chrono::{Duration, Utc};
use std::env;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use orchard_core::{Coupon, CouponKind, Product};
use orchard_db::{Database, DbConfig};

/// Product families for realistic storefront data.
const CATEGORIES: &[(&str, &[&str])] = &[
    (
        "apparel",
        &[
            "Classic Tee",
            "Pocket Tee",
            "Long Sleeve Tee",
            "Zip Hoodie",
            "Pullover Hoodie",
            "Crewneck Sweatshirt",
            "Baseball Cap",
            "Beanie",
            "Canvas Tote",
            "Crew Socks",
        ],
    ),
    (
        "drinkware",
        &[
            "Ceramic Mug",
            "Travel Mug",
            "Enamel Camp Mug",
            "Water Bottle",
            "Tumbler",
            "Espresso Cup Set",
            "Cold Brew Glass",
            "Stein",
        ],
    ),
    (
        "prints",
        &[
            "Art Print",
            "Framed Poster",
            "Canvas Print",
            "Postcard Pack",
            "Sticker Sheet",
            "Calendar",
            "Notebook",
            "Greeting Card Set",
        ],
    ),
    (
        "home",
        &[
            "Throw Pillow",
            "Fleece Blanket",
            "Scented Candle",
            "Coaster Set",
            "Desk Mat",
            "Wall Clock",
            "Plant Pot",
            "Key Tray",
        ],
    ),
];

/// Size/variant suffixes with price addons in cents.
const VARIANTS: &[(&str, i64)] = &[
    ("S", 0),
    ("M", 0),
    ("L", 100),
    ("XL", 200),
    ("12oz", 0),
    ("16oz", 150),
    ("Small", 0),
    ("Large", 400),
    ("A3", 300),
    ("A2", 600),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = env::args().collect();

    let mut count: usize = 500;
    let mut db_path = String::from("./orchard_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(500);
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
                println!("Orchard Commerce Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of products to generate (default: 500)");
                println!("  -d, --db <PATH>    Database file path (default: ./orchard_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("Orchard Commerce Seed Data Generator");
    println!("====================================");
    println!("Database: {}", db_path);
    println!("Products: {}", count);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;

    println!("* Connected to database, migrations applied");

    let existing = db.products().count().await?;
    if existing > 0 {
        println!("! Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    println!();
    println!("Generating products...");

    let mut generated = 0;
    let start = std::time::Instant::now();

    'outer: for (category_idx, (category, names)) in CATEGORIES.iter().enumerate() {
        for (name_idx, name) in names.iter().enumerate() {
            for (variant_idx, (variant, price_addon)) in VARIANTS.iter().enumerate() {
                if generated >= count {
                    break 'outer;
                }

                let seed = category_idx * 1000 + name_idx * 20 + variant_idx;
                let product = generate_product(category, name, variant, *price_addon, seed);

                if let Err(e) = db.products().insert(&product).await {
                    eprintln!("Failed to insert {}: {}", product.sku, e);
                    continue;
                }

                generated += 1;

                if generated % 100 == 0 {
                    println!("  Generated {} products...", generated);
                }
            }
        }
    }

    let elapsed = start.elapsed();
    println!();
    println!("* Generated {} products in {:?}", generated, elapsed);

    println!();
    println!("Seeding coupons...");
    for coupon in seed_coupons() {
        db.coupons().insert(&coupon).await?;
        println!("  {}", coupon.code);
    }

    println!();
    println!("* Seed complete");

    Ok(())
}

/// Generates a single product with deterministic pseudo-random data.
fn generate_product(
    category: &str,
    name: &str,
    variant: &str,
    price_addon: i64,
    seed: usize,
) -> Product {
    let now = Utc::now();

    let sku = format!(
        "{}-{}-{:03}",
        category[..3].to_uppercase(),
        name.replace(' ', "")[..3].to_uppercase(),
        seed
    );

    // Base $9.99-$49.99 plus the variant addon
    let base_price = 999 + ((seed * 37) % 4000) as i64;
    let price_cents = base_price + price_addon;

    // Stock 0-60; roughly one in twelve starts sold out
    let stock = ((seed * 7) % 61) as i64;

    Product {
        id: Uuid::new_v4().to_string(),
        sku,
        name: format!("{} ({})", name, variant),
        description: Some(format!("{} from the {} collection.", name, category)),
        image_url: Some(format!(
            "https://cdn.orchard.example/{}/{}.jpg",
            category,
            name.replace(' ', "-").to_lowercase()
        )),
        category: Some(category.to_string()),
        price_cents,
        stock,
        sold_count: 0,
        is_active: true,
        created_at: now,
        updated_at: now,
        version: 0,
    }
}

/// A small stable set of coupons covering both kinds.
fn seed_coupons() -> Vec<Coupon> {
    let now = Utc::now();

    let coupon = |code: &str, kind: CouponKind, value: i64, min_order: i64, cap: Option<i64>| {
        Coupon {
            id: Uuid::new_v4().to_string(),
            code: code.to_string(),
            kind,
            value,
            starts_at: now - Duration::days(7),
            expires_at: now + Duration::days(90),
            min_order_cents: min_order,
            max_discount_cents: cap,
            is_active: true,
            created_at: now,
        }
    };

    let mut expired = coupon("LASTYEAR20", CouponKind::Percentage, 2000, 0, None);
    expired.expires_at = now - Duration::days(30);

    vec![
        coupon("WELCOME10", CouponKind::Percentage, 1000, 0, Some(2000)),
        coupon("BULK25", CouponKind::Percentage, 2500, 15000, Some(7500)),
        coupon("FIVEOFF", CouponKind::Fixed, 500, 2500, None),
        expired,
    ]
}
