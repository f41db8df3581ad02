//! Duka CLI - a command-line storefront.
//!
//! # Usage
//!
//! ```bash
//! # Sign in (the session persists in DUKA_STORAGE_DIR)
//! duka login -u amani -p 'siri-kali'
//!
//! # Browse and fill the cart
//! duka products
//! duka cart add kanga-ya-pwani --quantity 2
//! duka cart show
//!
//! # Create the order, then pay in one or more instalments
//! duka checkout --address "Sinza, Dar es Salaam"
//! duka pay 42 --phone 0741000111 --amount 1500
//! duka pay 42 --phone 0741000111 --amount 1000
//! ```
//!
//! # Commands
//!
//! - `register`, `login`, `logout`, `profile` - Account
//! - `products`, `product` - Catalog
//! - `cart` - Show and edit the cart
//! - `checkout`, `pay`, `orders`, `order` - Orders and payments

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use duka_client::{ClientConfig, ClientError, Storefront};
use rust_decimal::Decimal;
use secrecy::SecretString;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "duka")]
#[command(author, version, about = "Duka storefront CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account
    Register {
        #[arg(short, long)]
        username: String,

        #[arg(short, long)]
        email: String,

        /// First name
        #[arg(short, long)]
        name: String,

        #[arg(short, long)]
        password: String,
    },
    /// Sign in
    Login {
        #[arg(short, long)]
        username: String,

        #[arg(short, long)]
        password: String,
    },
    /// Sign out
    Logout,
    /// Show the signed-in profile
    Profile {
        /// Re-fetch the profile from the server
        #[arg(long)]
        refresh: bool,
    },
    /// List catalog products
    Products,
    /// Show a product
    Product { slug: String },
    /// Show and edit the cart
    Cart {
        #[command(subcommand)]
        action: CartCommand,
    },
    /// Create an order from the cart
    Checkout {
        /// Shipping address
        #[arg(short, long)]
        address: String,
    },
    /// Pay towards an order with mobile money
    Pay {
        /// Order ID
        order: i64,

        /// Mobile-money phone number (0741..., 741... or 255741...)
        #[arg(long)]
        phone: String,

        /// Amount to pay; may be less than the outstanding balance
        #[arg(long)]
        amount: Decimal,
    },
    /// List your orders
    Orders,
    /// Show an order
    Order { id: i64 },
}

#[derive(Subcommand)]
enum CartCommand {
    /// Show cart contents and totals
    Show,
    /// Add a product by slug
    Add {
        slug: String,

        #[arg(short, long, default_value_t = 1)]
        quantity: u32,
    },
    /// Set a line's quantity (minimum 1)
    Set { product: i64, quantity: u32 },
    /// Remove a line
    Remove { product: i64 },
    /// Empty the cart
    Clear,
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &ClientConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            sample_rate: config.sentry_sample_rate,
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    let config = ClientConfig::from_env().expect("Failed to load configuration");

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "duka_client=info,duka_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli, &config).await {
        e.report();
        print_error(&e);
        std::process::exit(1);
    }
}

#[allow(clippy::print_stderr)]
fn print_error(e: &ClientError) {
    eprintln!("error: {e}");
    if e.requires_sign_in() {
        eprintln!("hint: run `duka login` to sign in");
    }
}

async fn run(cli: Cli, config: &ClientConfig) -> Result<(), ClientError> {
    let storefront = Storefront::from_config(config)?;
    storefront.init().await?;

    match cli.command {
        Commands::Register {
            username,
            email,
            name,
            password,
        } => {
            let password = SecretString::from(password);
            commands::account::register(&storefront, username, email, name, &password).await?;
        }
        Commands::Login { username, password } => {
            let password = SecretString::from(password);
            commands::account::login(&storefront, &username, &password).await?;
        }
        Commands::Logout => commands::account::logout(&storefront).await?,
        Commands::Profile { refresh } => commands::account::profile(&storefront, refresh).await?,
        Commands::Products => commands::catalog::list(&storefront).await?,
        Commands::Product { slug } => commands::catalog::show(&storefront, &slug).await?,
        Commands::Cart { action } => match action {
            CartCommand::Show => commands::cart::show(&storefront).await,
            CartCommand::Add { slug, quantity } => {
                commands::cart::add(&storefront, &slug, quantity).await?;
            }
            CartCommand::Set { product, quantity } => {
                commands::cart::set(&storefront, product, quantity).await?;
            }
            CartCommand::Remove { product } => commands::cart::remove(&storefront, product).await?,
            CartCommand::Clear => commands::cart::clear(&storefront).await?,
        },
        Commands::Checkout { address } => commands::orders::checkout(&storefront, &address).await?,
        Commands::Pay {
            order,
            phone,
            amount,
        } => commands::orders::pay(&storefront, order, &phone, amount).await?,
        Commands::Orders => commands::orders::list(&storefront).await?,
        Commands::Order { id } => commands::orders::show(&storefront, id).await?,
    }
    Ok(())
}
