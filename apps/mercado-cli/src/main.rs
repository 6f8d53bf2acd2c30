//! Mercado CLI - storefront and back-office operations.
//!
//! # Usage
//!
//! ```bash
//! # Catalog
//! mercado product add --name "Arroz Tipo 1 5kg" --price 24,90 --stock 40
//! mercado product list arroz
//!
//! # Shopping as a customer (the session survives between invocations)
//! mercado customer register --name "Ana Souza" --cpf 529.982.247-25 --password senha123 \
//!     --phone 11987654321 --cep 01310-100 --street "Av. Paulista" --number 1000 \
//!     --city "São Paulo" --state SP
//! mercado customer login --cpf 529.982.247-25 --password senha123
//! mercado cart add <product-id> --qty 3
//! mercado checkout --payment pix
//!
//! # Several shoppers on one machine
//! mercado --session balcao-2 cart show
//! ```
//!
//! Responses are printed as JSON on stdout. Failures print an error object on
//! stderr and exit with the status of its code (see `ErrorCode::exit_code`).

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde::Serialize;

use mercado_cli::commands::catalog::{ProductChanges, ProductInput};
use mercado_cli::commands::customer::ProfileInput;
use mercado_cli::commands::{cart, catalog, checkout, customer, order, Ack};
use mercado_cli::config::AppConfig;
use mercado_cli::error::ApiError;
use mercado_cli::{init_tracing, open_database, open_sessions};

#[derive(Parser)]
#[command(name = "mercado")]
#[command(author, version, about = "Mercado storefront and back office")]
struct Cli {
    /// Config file (default: platform config dir/mercado.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database file, overriding config and MERCADO_DB_PATH
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Session to act for
    #[arg(long, global = true, default_value = "default")]
    session: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Browse and maintain the catalog
    Product {
        #[command(subcommand)]
        action: ProductAction,
    },
    /// Customer accounts and login
    Customer {
        #[command(subcommand)]
        action: CustomerAction,
    },
    /// The session cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Place an order with the session cart
    Checkout {
        /// pix | credit_card | debit_card | boleto
        #[arg(short, long)]
        payment: Option<String>,
    },
    /// Order history
    Order {
        #[command(subcommand)]
        action: OrderAction,
    },
    /// Session maintenance
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },
    /// Show or write the configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ProductAction {
    /// Search products by name
    List {
        #[arg(default_value = "")]
        query: String,
    },
    /// Show one product
    Show { id: String },
    /// Create a product
    Add {
        #[arg(short, long)]
        name: String,
        /// Price such as 7,99 or 7.99
        #[arg(short, long)]
        price: String,
        #[arg(short, long, default_value_t = 0)]
        stock: i64,
        #[arg(short, long)]
        description: Option<String>,
        #[arg(long)]
        image: Option<String>,
    },
    /// Change product fields
    Update {
        id: String,
        #[arg(short, long)]
        name: Option<String>,
        #[arg(short, long)]
        price: Option<String>,
        #[arg(short, long)]
        stock: Option<i64>,
        #[arg(short, long)]
        description: Option<String>,
        #[arg(long, conflicts_with = "clear_image")]
        image: Option<String>,
        #[arg(long)]
        clear_image: bool,
    },
    /// Delete a product that no order references
    Delete { id: String },
    /// Mark products as sold out
    ZeroStock {
        #[arg(required = true)]
        ids: Vec<String>,
    },
}

#[derive(Subcommand)]
enum CustomerAction {
    /// Create an account
    Register {
        #[arg(short, long)]
        name: String,
        #[arg(short, long)]
        cpf: String,
        #[arg(short, long)]
        password: String,
        #[command(flatten)]
        profile: ProfileInput,
    },
    /// Log in on the current session
    Login {
        #[arg(short, long)]
        cpf: String,
        #[arg(short, long)]
        password: String,
    },
    /// End the current session
    Logout,
    /// Show the logged-in customer
    Whoami,
    /// Change the logged-in customer's password
    Passwd {
        #[arg(long)]
        current: String,
        #[arg(long)]
        new: String,
    },
    /// Show a customer
    Show { id: String },
    /// Search customers by name or CPF
    List {
        #[arg(default_value = "")]
        query: String,
    },
    /// Change name or profile fields (CPF is immutable)
    Update {
        id: String,
        #[arg(short, long)]
        name: Option<String>,
        #[command(flatten)]
        profile: ProfileInput,
    },
    /// Delete a customer without orders
    Delete { id: String },
}

#[derive(Subcommand)]
enum CartAction {
    /// Show the cart with totals
    Show,
    /// Add units of a product
    Add {
        product_id: String,
        #[arg(short, long, default_value_t = 1)]
        qty: i64,
    },
    /// Set the quantity of a line (0 removes it)
    Update { product_id: String, qty: i64 },
    /// Remove a line
    Remove { product_id: String },
    /// Empty the cart
    Clear,
}

#[derive(Subcommand)]
enum OrderAction {
    /// List orders, newest first
    List {
        /// Only this customer's orders
        #[arg(short, long)]
        customer: Option<String>,
        /// Only the logged-in customer's orders
        #[arg(short, long, conflicts_with = "customer")]
        mine: bool,
    },
    /// Show an order with its items
    Show { id: String },
    /// Create an order directly from PRODUCT_ID[:QTY] items
    Create {
        #[arg(short, long)]
        customer: String,
        #[arg(short, long = "item", required = true)]
        items: Vec<String>,
        #[arg(short, long)]
        payment: Option<String>,
    },
}

#[derive(Subcommand)]
enum SessionAction {
    /// Drop every idle session and its cart
    Evict,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Write the effective configuration to the config file
    Save,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EvictResponse {
    evicted: usize,
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        match serde_json::to_string_pretty(&e) {
            Ok(json) => eprintln!("{json}"),
            Err(_) => eprintln!("{e}"),
        }
        std::process::exit(e.exit_code());
    }
}

fn print<T: Serialize>(value: &T) -> Result<(), ApiError> {
    let json =
        serde_json::to_string_pretty(value).map_err(|e| ApiError::internal(e.to_string()))?;
    println!("{json}");
    Ok(())
}

async fn run(cli: Cli) -> Result<(), ApiError> {
    let mut config = AppConfig::load(cli.config.clone())?;
    if let Some(db) = cli.db {
        config.database_path = Some(db);
    }

    // Commands that need neither database nor sessions
    if let Commands::Config { action } = &cli.command {
        return match action {
            ConfigAction::Show => print(&config),
            ConfigAction::Save => {
                let path = config.save(cli.config)?;
                print(&Ack::new(format!("Config written to {}", path.display())))
            }
        };
    }

    let sessions = open_sessions(&config, &cli.session)?;
    if let Commands::Session {
        action: SessionAction::Evict,
    } = &cli.command
    {
        let evicted = sessions.evict_idle()?;
        return print(&EvictResponse { evicted });
    }

    let db = open_database(&config).await?;

    match cli.command {
        Commands::Product { action } => match action {
            ProductAction::List { query } => print(&catalog::list_products(&db, &query).await?),
            ProductAction::Show { id } => print(&catalog::get_product(&db, &id).await?),
            ProductAction::Add {
                name,
                price,
                stock,
                description,
                image,
            } => {
                let input = ProductInput {
                    name,
                    description,
                    price,
                    stock,
                    image_url: image,
                };
                print(&catalog::create_product(&db, input).await?)
            }
            ProductAction::Update {
                id,
                name,
                price,
                stock,
                description,
                image,
                clear_image,
            } => {
                let changes = ProductChanges {
                    name,
                    description,
                    price,
                    stock,
                    image_url: image,
                    clear_image,
                };
                print(&catalog::update_product(&db, &id, changes).await?)
            }
            ProductAction::Delete { id } => print(&catalog::delete_product(&db, &id).await?),
            ProductAction::ZeroStock { ids } => print(&catalog::zero_stock(&db, &ids).await?),
        },
        Commands::Customer { action } => match action {
            CustomerAction::Register {
                name,
                cpf,
                password,
                profile,
            } => print(&customer::register(&db, name, cpf, password, profile).await?),
            CustomerAction::Login { cpf, password } => {
                print(&customer::login(&db, &sessions, &cpf, &password).await?)
            }
            CustomerAction::Logout => print(&customer::logout(&sessions).await?),
            CustomerAction::Whoami => print(&customer::whoami(&db, &sessions).await?),
            CustomerAction::Passwd { current, new } => {
                print(&customer::change_password(&db, &sessions, &current, &new).await?)
            }
            CustomerAction::Show { id } => print(&customer::get_customer(&db, &id).await?),
            CustomerAction::List { query } => {
                print(&customer::list_customers(&db, &query).await?)
            }
            CustomerAction::Update { id, name, profile } => {
                print(&customer::update_customer(&db, &id, name, profile).await?)
            }
            CustomerAction::Delete { id } => print(&customer::delete_customer(&db, &id).await?),
        },
        Commands::Cart { action } => match action {
            CartAction::Show => print(&cart::get_cart(&db, &sessions).await?),
            CartAction::Add { product_id, qty } => {
                print(&cart::add_to_cart(&db, &sessions, &product_id, qty).await?)
            }
            CartAction::Update { product_id, qty } => {
                print(&cart::update_cart_item(&db, &sessions, &product_id, qty).await?)
            }
            CartAction::Remove { product_id } => {
                print(&cart::remove_from_cart(&db, &sessions, &product_id).await?)
            }
            CartAction::Clear => print(&cart::clear_cart(&db, &sessions).await?),
        },
        Commands::Checkout { payment } => print(
            &checkout::checkout(&db, &sessions, &config, payment.as_deref()).await?,
        ),
        Commands::Order { action } => match action {
            OrderAction::List { customer, mine } => print(
                &order::list_orders(&db, &sessions, customer.as_deref(), mine).await?,
            ),
            OrderAction::Show { id } => print(&order::get_order(&db, &id).await?),
            OrderAction::Create {
                customer,
                items,
                payment,
            } => print(
                &order::create_order(&db, &config, &customer, &items, payment.as_deref()).await?,
            ),
        },
        Commands::Session { .. } | Commands::Config { .. } => Ok(()),
    }
}
