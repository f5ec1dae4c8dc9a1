use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use credstore::{CredentialStore, CredentialView, Field, StoreConfig};
use prettytable::{Cell, Row as TableRow, Table};
use std::io::BufRead;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FIELDS: [Field; 3] = [Field::Name, Field::Role, Field::DisplayName];

#[derive(Parser, Debug)]
#[command(name = "pwstore")]
#[command(about = "Inspect or initialize the password store", long_about = None)]
struct Args {
    /// Directory holding the password index [env: PWSTORE_DATA_DIR]
    #[arg(short = 'd', long)]
    data_dir: Option<PathBuf>,

    /// bcrypt cost for newly hashed passwords [env: PWSTORE_HASH_COST]
    #[arg(long)]
    cost: Option<u32>,

    /// Create the password store with its default accounts if none exists.
    /// The defaults have well-known passwords: never use this in production.
    #[arg(long)]
    init_passwords: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// Print the number of accounts
    Count,
    /// Show the fields of one account
    Lookup {
        username: String,

        /// Comma separated: name, cost, passwordhash, role, display_name
        #[arg(short, long, value_delimiter = ',')]
        fields: Vec<Field>,
    },
    /// Check a password, read from stdin unless given
    Verify {
        username: String,

        #[arg(short, long)]
        password: Option<String>,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pwstore=info,credstore=info,storage=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let config = build_config(&args)?;

    let store = config.open().with_context(|| {
        format!(
            "Failed to open password store at {}",
            config.data_dir.display()
        )
    })?;
    info!("Using password store at {}", store.path().display());

    run(&store, args.command)
}

fn build_config(args: &Args) -> Result<StoreConfig> {
    let mut config = StoreConfig::from_env().context("Invalid environment configuration")?;
    if let Some(dir) = &args.data_dir {
        config = config.with_data_dir(dir);
    }
    if let Some(cost) = args.cost {
        config = config.with_hash_cost(cost);
    }
    Ok(config.with_authorize_init(args.init_passwords))
}

fn run(store: &CredentialStore, command: Command) -> Result<()> {
    match command {
        Command::Count => {
            println!("{}", store.count());
        }
        Command::Lookup { username, fields } => {
            let fields = if fields.is_empty() {
                DEFAULT_FIELDS.to_vec()
            } else {
                fields
            };
            let view = store
                .find_by_username(&username, &fields)
                .with_context(|| format!("Lookup of {} failed", username))?;
            print_view(&view, &fields);
        }
        Command::Verify { username, password } => {
            let password = match password {
                Some(p) => p,
                None => read_password()?,
            };
            let view = store
                .authenticate(&username, &password)
                .with_context(|| format!("Verification of {} failed", username))?;
            println!(
                "OK: {} ({})",
                view.display_name.unwrap_or_default(),
                view.role.unwrap_or_default()
            );
        }
    }
    Ok(())
}

fn read_password() -> Result<String> {
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read password from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn print_view(view: &CredentialView, fields: &[Field]) {
    let mut table = Table::new();

    let header: Vec<Cell> = fields.iter().map(|f| Cell::new(f.as_str())).collect();
    table.add_row(TableRow::new(header));

    let cells: Vec<Cell> = fields
        .iter()
        .map(|f| Cell::new(&view.get(*f).unwrap_or_else(|| "NULL".to_string())))
        .collect();
    table.add_row(TableRow::new(cells));

    table.printstd();
}
