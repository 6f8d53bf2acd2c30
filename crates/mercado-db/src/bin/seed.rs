//! # Seed Data Generator
//!
//! Populates a development database with a supermarket catalog and,
//! optionally, demo customers.
//!
//! ## Usage
//! ```bash
//! # 200 products (default)
//! cargo run -p mercado-db --bin seed
//!
//! # Custom amount plus 10 demo customers (password "mercado123")
//! cargo run -p mercado-db --bin seed -- --count 500 --customers 10
//!
//! # Specify database path
//! cargo run -p mercado-db --bin seed -- --db ./data/mercado.db
//! ```
//!
//! Each product gets a deterministic price between R$ 2,49 and R$ 39,99
//! plus a size surcharge, and stock between 0 and 60, so some products are
//! sold out and backorders can be tried right away.

use mercado_core::{cpf, CustomerProfile, Money, NewCustomer, NewProduct, PaymentMethod};
use mercado_db::{Database, DbConfig};
use std::env;

/// Product families by aisle.
const AISLES: &[(&str, &[&str])] = &[
    (
        "Mercearia",
        &[
            "Arroz Branco Tipo 1",
            "Arroz Integral",
            "Feijão Carioca",
            "Feijão Preto",
            "Açúcar Refinado",
            "Farinha de Mandioca",
            "Macarrão Espaguete",
            "Óleo de Soja",
            "Café Torrado e Moído",
            "Fubá Mimoso",
        ],
    ),
    (
        "Bebidas",
        &[
            "Guaraná",
            "Suco de Caju",
            "Água Mineral",
            "Refrigerante de Cola",
            "Mate Gelado",
            "Água de Coco",
        ],
    ),
    (
        "Laticínios",
        &[
            "Leite Integral",
            "Leite Desnatado",
            "Queijo Minas Frescal",
            "Requeijão Cremoso",
            "Manteiga com Sal",
            "Iogurte Natural",
        ],
    ),
    (
        "Padaria",
        &[
            "Pão de Queijo Congelado",
            "Pão Francês",
            "Bolo de Fubá",
            "Biscoito de Polvilho",
        ],
    ),
    (
        "Limpeza",
        &[
            "Sabão em Pó",
            "Detergente Neutro",
            "Água Sanitária",
            "Esponja Multiuso",
        ],
    ),
];

/// Package sizes with their surcharge in centavos.
const SIZES: &[(&str, i64)] = &[("pequeno", 0), ("médio", 350), ("grande", 890)];

const FIRST_NAMES: &[&str] = &["Ana", "Bruno", "Carla", "Diego", "Fernanda", "Gustavo", "Helena"];
const LAST_NAMES: &[&str] = &["Souza", "Oliveira", "Santos", "Lima", "Costa", "Almeida"];

const DEMO_PASSWORD: &str = "mercado123";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut count: usize = 200;
    let mut customers: usize = 0;
    let mut db_path = String::from("./mercado_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(200);
                    i += 1;
                }
            }
            "--customers" | "-u" => {
                if i + 1 < args.len() {
                    customers = args[i + 1].parse().unwrap_or(0);
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
                println!("Mercado Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>      Number of products to generate (default: 200)");
                println!("  -u, --customers <N>  Demo customers to register (default: 0)");
                println!("  -d, --db <PATH>      Database file path (default: ./mercado_dev.db)");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Mercado Seed Data Generator");
    println!("==============================");
    println!("Database:  {}", db_path);
    println!("Products:  {}", count);
    println!("Customers: {}", customers);
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

    println!();
    println!("Generating products...");

    let start = std::time::Instant::now();
    let mut generated = 0;

    'outer: for (aisle_idx, (aisle, names)) in AISLES.iter().enumerate() {
        for (name_idx, name) in names.iter().enumerate() {
            for (size_idx, (size, surcharge)) in SIZES.iter().enumerate() {
                if generated >= count {
                    break 'outer;
                }

                let seed = aisle_idx * 1000 + name_idx * 20 + size_idx;
                let product = generate_product(aisle, name, size, *surcharge, seed);

                if let Err(e) = db.products().create(&product).await {
                    eprintln!("Failed to insert {}: {}", product.name, e);
                    continue;
                }

                generated += 1;
                if generated % 50 == 0 {
                    println!("  Generated {} products...", generated);
                }
            }
        }
    }

    let elapsed = start.elapsed();
    println!();
    println!("✓ Generated {} products in {:?}", generated, elapsed);

    if customers > 0 {
        println!();
        println!("Registering demo customers (password: {})...", DEMO_PASSWORD);
        for n in 0..customers {
            let customer = generate_customer(n);
            match db.customers().register(&customer).await {
                Ok(c) => println!("  {} {}", cpf::format(&c.cpf), c.name),
                Err(e) => eprintln!("Failed to register {}: {}", customer.name, e),
            }
        }
    }

    println!();
    let sample = db.products().list("arroz").await?;
    println!("Search 'arroz': {} results", sample.len());
    println!("✓ Seed complete!");

    Ok(())
}

/// Builds one product from deterministic pseudo-random values.
fn generate_product(aisle: &str, name: &str, size: &str, surcharge: i64, seed: usize) -> NewProduct {
    let base_price = 249 + ((seed * 37) % 3750) as i64;
    let price_cents = base_price + surcharge;
    let stock = ((seed * 13) % 61) as i64;

    NewProduct {
        name: format!("{} ({})", name, size),
        description: format!("{} - {}", aisle, Money::from_cents(price_cents)),
        price_cents,
        stock,
        image_url: None,
    }
}

/// Builds a demo customer with a valid CPF and a checkout-ready profile.
fn generate_customer(n: usize) -> NewCustomer {
    let mut base = [0u8; 9];
    let mut x = 123_456_789usize.wrapping_add(n.wrapping_mul(7_919));
    for digit in base.iter_mut().rev() {
        *digit = (x % 10) as u8;
        x /= 10;
    }

    let first = FIRST_NAMES[n % FIRST_NAMES.len()];
    let last = LAST_NAMES[(n / FIRST_NAMES.len()) % LAST_NAMES.len()];

    NewCustomer {
        name: format!("{} {}", first, last),
        cpf: cpf::with_check_digits(base),
        password: DEMO_PASSWORD.to_string(),
        profile: CustomerProfile {
            email: Some(format!("{}.{}{}@exemplo.com.br", first, last, n).to_lowercase()),
            mobile_phone: Some(format!("119{:08}", 10_000_000 + n)),
            cep: Some("01310100".to_string()),
            street: Some("Avenida Paulista".to_string()),
            number: Some((100 + n).to_string()),
            city: Some("São Paulo".to_string()),
            state: Some("SP".to_string()),
            preferred_payment: Some(PaymentMethod::ALL[n % PaymentMethod::ALL.len()]),
            ..Default::default()
        },
    }
}
