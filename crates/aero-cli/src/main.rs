//! Operator CLI for the order backend.
//!
//! Direct database access for schema management plus an in-process
//! instance of the state machine service for manual order surgery. Every
//! transition driven from here goes through the same lock + guard +
//! history path as daemon traffic.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use aero_engine::StateMachineService;
use aero_issuer_sim::{SimIssuer, SimPayments};
use aero_model::{Actor, ActorRole, OrderEvent};

#[derive(Parser)]
#[command(name = "aero")]
#[command(about = "Airline order backend CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database commands
    Db {
        #[command(subcommand)]
        cmd: DbCmd,
    },

    /// Order commands
    Order {
        #[command(subcommand)]
        cmd: OrderCmd,
    },
}

#[derive(Subcommand)]
enum DbCmd {
    /// Connectivity + schema presence check
    Status,

    /// Apply SQL migrations
    Migrate,
}

#[derive(Subcommand)]
enum OrderCmd {
    /// Create an order in PENDING_PAYMENT and print its id and number.
    Create {
        /// Owning user id
        #[arg(long)]
        owner: String,

        /// Amount in minor units (cents)
        #[arg(long)]
        amount_cents: i64,

        /// ISO 4217 currency code
        #[arg(long, default_value = "EUR")]
        currency: String,
    },

    /// Print one order row.
    Show {
        /// Order id
        order_id: String,
    },

    /// Print the allowed events for an order's current state.
    AllowedEvents {
        /// Order id
        order_id: String,
    },

    /// Print the order's transition history, oldest first.
    History {
        /// Order id
        order_id: String,
    },

    /// Drive one event through the state machine service.
    Trigger {
        /// Order id
        order_id: String,

        /// Event name (e.g. PAY, CANCEL, PROCESS_TICKETING)
        event: String,

        /// Acting identity
        #[arg(long, default_value = "ops")]
        actor_id: String,

        /// Acting role: CUSTOMER | ADMIN | SYSTEM
        #[arg(long, default_value = "ADMIN")]
        actor_role: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let cli = Cli::parse();

    match cli.cmd {
        Commands::Db { cmd } => run_db(cmd).await,
        Commands::Order { cmd } => run_order(cmd).await,
    }
}

async fn run_db(cmd: DbCmd) -> Result<()> {
    let pool = aero_db::connect_from_env().await?;

    match cmd {
        DbCmd::Status => {
            let st = aero_db::status(&pool).await?;
            println!("connectivity: {}", if st.ok { "ok" } else { "FAILED" });
            println!(
                "schema:       {}",
                if st.has_orders_table {
                    "present"
                } else {
                    "missing (run `aero db migrate`)"
                }
            );
        }
        DbCmd::Migrate => {
            aero_db::migrate(&pool).await?;
            println!("migrations applied");
        }
    }

    Ok(())
}

async fn run_order(cmd: OrderCmd) -> Result<()> {
    let pool = aero_db::connect_from_env().await?;
    let config = aero_config::Config::load_from_env()?;
    let service = StateMachineService::new(
        pool.clone(),
        Arc::new(SimIssuer::new()),
        Arc::new(SimPayments::new()),
        Duration::from_secs(config.order_lease_secs),
    );

    match cmd {
        OrderCmd::Create {
            owner,
            amount_cents,
            currency,
        } => {
            let id = Uuid::new_v4();
            let order = aero_db::orders::NewOrder {
                id,
                order_number: aero_db::orders::generate_order_number(id),
                owner_user_id: owner,
                amount_cents,
                currency,
            };
            aero_db::orders::insert_order(&pool, &order).await?;
            println!("created {} ({})", order.id, order.order_number);
        }

        OrderCmd::Show { order_id } => {
            let id = parse_order_id(&order_id)?;
            let row = aero_db::orders::fetch_order(&pool, id)
                .await?
                .with_context(|| format!("order not found: {id}"))?;
            println!("id:            {}", row.id);
            println!("order_number:  {}", row.order_number);
            println!("owner:         {}", row.owner_user_id);
            println!("amount:        {} {}", row.amount_cents, row.currency);
            println!("state:         {}", row.state);
            println!("ticket_ref:    {}", row.ticket_ref.as_deref().unwrap_or("-"));
            println!("created_at:    {}", row.created_at);
            println!("updated_at:    {}", row.updated_at);
        }

        OrderCmd::AllowedEvents { order_id } => {
            let id = parse_order_id(&order_id)?;
            let events = service.allowed_events(id).await?;
            if events.is_empty() {
                println!("(none: order is terminal)");
            } else {
                for ev in events {
                    println!("{ev}");
                }
            }
        }

        OrderCmd::History { order_id } => {
            let id = parse_order_id(&order_id)?;
            for rec in service.history(id).await? {
                println!(
                    "{} {:7} {:<20} {} -> {}  by {} ({}){}",
                    rec.ts_utc.format("%Y-%m-%d %H:%M:%S"),
                    if rec.success { "ok" } else { "FAILED" },
                    rec.event,
                    rec.from_state.as_deref().unwrap_or("?"),
                    rec.to_state.as_deref().unwrap_or("-"),
                    rec.actor_id,
                    rec.actor_role,
                    rec.error_message
                        .map(|m| format!("  [{m}]"))
                        .unwrap_or_default(),
                );
            }
        }

        OrderCmd::Trigger {
            order_id,
            event,
            actor_id,
            actor_role,
        } => {
            let id = parse_order_id(&order_id)?;
            let event = OrderEvent::parse(event.trim())
                .with_context(|| format!("unknown event: {event}"))?;
            let role = ActorRole::parse(actor_role.trim())
                .with_context(|| format!("unknown role: {actor_role}"))?;

            let state = service
                .trigger(id, event, &Actor::new(actor_id, role), None)
                .await?;
            println!("order {id} is now {state}");
        }
    }

    Ok(())
}

fn parse_order_id(raw: &str) -> Result<Uuid> {
    raw.trim()
        .parse()
        .with_context(|| format!("invalid order id: {raw}"))
}
