use std::{str::FromStr, sync::Arc};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use clap::{ArgAction, Args, Parser, Subcommand};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use airpark_api::{
    common::{SharedClock, SystemClock},
    config::{self, AppConfig},
    db::{self, DbPool},
    entities::{lot_pricing, UserRole, VehicleType},
    services::{
        catalog::{CatalogService, CreateServiceOfferingRequest},
        lots::{CreateLotRequest, LotService},
        pricing::{compute_quote, PricingService, UpsertPricingRequest},
        users::{CreateUserRequest, UserService},
    },
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Migrate => handle_migrate(&CliContext::initialize().await?).await?,
        Commands::CreateUser(args) => {
            handle_create_user(&CliContext::initialize().await?, args, cli.json).await?
        }
        Commands::Seed(args) => handle_seed(&CliContext::initialize().await?, args, cli.json).await?,
        Commands::Quote(args) => handle_quote(args, cli.json)?,
    }

    Ok(())
}

#[derive(Parser)]
#[command(name = "airpark", about = "Airpark administration CLI", version)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON when available"
    )]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,
    /// Create an operator or admin account
    CreateUser(CreateUserArgs),
    /// Create a demo lot with pricing and a few addon services
    Seed(SeedArgs),
    /// Price a stay without touching the database
    Quote(QuoteArgs),
}

#[derive(Args)]
struct CreateUserArgs {
    #[arg(long, help = "Email address for the account")]
    email: String,
    #[arg(long, help = "Display name")]
    name: String,
    #[arg(long, help = "Password (at least 10 characters, letters and digits)")]
    password: String,
    #[arg(long, default_value = "operator", help = "operator or admin")]
    role: String,
}

#[derive(Args)]
struct SeedArgs {
    #[arg(long, default_value = "KEF-P1", help = "Code of the demo lot")]
    code: String,
    #[arg(long, default_value_t = 200, help = "Number of spaces in the demo lot")]
    spaces: i32,
}

#[derive(Args)]
struct QuoteArgs {
    #[arg(long, help = "Price per day in minor units")]
    price_per_day: i64,
    #[arg(long, help = "Drop-off time, RFC 3339")]
    drop_off: DateTime<Utc>,
    #[arg(long, help = "Pick-up time, RFC 3339")]
    pick_up: DateTime<Utc>,
    #[arg(long, help = "Weekly discount percent")]
    weekly_discount: Option<Decimal>,
    #[arg(long, help = "Monthly discount percent")]
    monthly_discount: Option<Decimal>,
    #[arg(long, default_value = "medium")]
    vehicle_type: String,
}

struct CliContext {
    config: AppConfig,
    db: Arc<DbPool>,
    clock: SharedClock,
}

impl CliContext {
    async fn initialize() -> Result<Self> {
        let config = config::load_config().context("failed to load configuration")?;
        let pool = db::establish_connection_from_app_config(&config)
            .await
            .context("failed to connect to database")?;
        Ok(Self {
            config,
            db: Arc::new(pool),
            clock: Arc::new(SystemClock),
        })
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn handle_migrate(context: &CliContext) -> Result<()> {
    db::run_migrations(&context.db)
        .await
        .context("failed to run migrations")?;
    println!("Migrations applied");
    Ok(())
}

async fn handle_create_user(context: &CliContext, args: CreateUserArgs, json: bool) -> Result<()> {
    let role = UserRole::from_str(&args.role)
        .map_err(|_| anyhow!("unknown role '{}', expected operator or admin", args.role))?;
    let users = UserService::new(context.db.clone(), context.clock.clone());
    let user = users
        .create(CreateUserRequest {
            email: args.email,
            name: args.name,
            password: args.password,
            role,
        })
        .await
        .context("failed to create user")?;

    if json {
        print_json(&user)?;
    } else {
        println!("Created {} {} (id {})", user.role, user.email, user.id);
    }
    Ok(())
}

async fn handle_seed(context: &CliContext, args: SeedArgs, json: bool) -> Result<()> {
    let lots = LotService::new(context.db.clone(), context.clock.clone());
    let pricing = PricingService::new(context.db.clone());
    let catalog = CatalogService::new(context.db.clone(), context.clock.clone());

    let lot = lots
        .create(CreateLotRequest {
            code: args.code.clone(),
            name: format!("Long-term parking {}", args.code),
            names: None,
            address: None,
            total_spaces: args.spaces,
            is_active: Some(true),
        })
        .await
        .context("failed to create demo lot")?;

    let daily_rates = [
        (VehicleType::Small, 1_900),
        (VehicleType::Medium, 2_400),
        (VehicleType::Large, 2_900),
        (VehicleType::Xlarge, 3_900),
    ];
    for (vehicle_type, price_per_day) in daily_rates {
        pricing
            .upsert(
                lot.id,
                UpsertPricingRequest {
                    vehicle_type,
                    price_per_day,
                    weekly_discount_percent: Some(Decimal::new(10, 0)),
                    monthly_discount_percent: Some(Decimal::new(20, 0)),
                },
            )
            .await
            .with_context(|| format!("failed to price {} vehicles", vehicle_type))?;
    }

    let offerings = [
        ("Exterior wash", 4_900, 10),
        ("Interior cleaning", 6_900, 20),
        ("Tyre check", 1_500, 30),
    ];
    for (name, price, sort_order) in offerings {
        catalog
            .create(CreateServiceOfferingRequest {
                name: name.to_string(),
                description: None,
                price,
                is_active: Some(true),
                sort_order: Some(sort_order),
            })
            .await
            .with_context(|| format!("failed to create service '{}'", name))?;
    }

    if json {
        print_json(&lot)?;
    } else {
        println!(
            "Seeded lot {} ({} spaces, prices in {}) with {} services",
            lot.code,
            lot.total_spaces,
            context.config.currency,
            offerings.len()
        );
    }
    Ok(())
}

fn handle_quote(args: QuoteArgs, json: bool) -> Result<()> {
    let vehicle_type = VehicleType::from_str(&args.vehicle_type)
        .map_err(|_| anyhow!("unknown vehicle type '{}'", args.vehicle_type))?;
    let pricing = lot_pricing::Model {
        id: Uuid::nil(),
        lot_id: Uuid::nil(),
        vehicle_type,
        price_per_day: args.price_per_day,
        weekly_discount_percent: args.weekly_discount,
        monthly_discount_percent: args.monthly_discount,
        is_active: true,
        created_at: Utc::now(),
        updated_at: None,
    };
    let quote = compute_quote(&pricing, args.drop_off, args.pick_up)?;

    if json {
        print_json(&quote)?;
    } else {
        println!("Days:     {}", quote.days);
        println!("Subtotal: {}", quote.subtotal);
        if let Some(tier) = quote.discount_tier {
            println!("Discount: -{} ({:?})", quote.discount_amount, tier);
        }
        println!("Total:    {}", quote.total);
    }
    Ok(())
}
