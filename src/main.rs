mod commands;
mod output;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use std::path::PathBuf;

use commands::CustomerArgs;
use output::Output;
use winkel::config::Config;
use winkel::{logging, Database};

#[derive(Parser, Debug)]
#[command(name = "winkel")]
#[command(about = "Connected and disconnected access to the shop database")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/winkel/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// SQLite database file, overrides database.path
  #[arg(short, long, global = true)]
  database: Option<PathBuf>,

  /// Print JSON instead of text
  #[arg(long, global = true)]
  json: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// List customers
  List {
    #[arg(long)]
    city: Option<String>,
  },
  /// Show one customer
  Get { number: i64 },
  /// Add a customer
  Add(CustomerArgs),
  /// Update customer fields from `;`-separated name and value lists
  Update {
    number: i64,
    /// e.g. "contact_first_name;city;phone"
    #[arg(long)]
    fields: String,
    /// e.g. "ABC;DEF;xx32922000000"
    #[arg(long)]
    values: String,
  },
  /// Delete a customer
  Delete { number: i64 },
  /// List orders
  Orders {
    #[arg(long)]
    customer: Option<i64>,
  },
  /// Add a sample order for a customer
  AddOrder {
    #[arg(long)]
    customer: i64,
    /// Order number (default: next free number above 110000)
    #[arg(long)]
    number: Option<i64>,
  },
  /// Replay the shop exercise through the disconnected cache
  Demo,
}

fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  let mut config = Config::load(args.config.as_deref())?;
  if let Some(path) = args.database {
    config.database.path = Some(path);
  }

  let _guard = logging::init(&config.logging);

  let db = Database::open(config.database.path.as_deref(), config.busy_timeout())?;
  let out = Output::new(args.json);

  match args.command {
    Command::List { city } => commands::list(&db, &out, city),
    Command::Get { number } => commands::get(&db, &out, number),
    Command::Add(customer) => commands::add(&db, &out, customer),
    Command::Update {
      number,
      fields,
      values,
    } => commands::update(&db, &out, number, &fields, &values),
    Command::Delete { number } => commands::delete(&db, &out, number),
    Command::Orders { customer } => commands::list_orders(&db, &out, customer),
    Command::AddOrder { customer, number } => commands::add_order(&db, &out, customer, number),
    Command::Demo => commands::demo(&db, &config, &out),
  }
}
