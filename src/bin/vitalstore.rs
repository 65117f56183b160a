//! vitalstore CLI
//!
//! Operates on a durable herd store in a data directory: seeding, listing,
//! running fever simulation cycles and acknowledging sync.

use std::path::PathBuf;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vitalstore::storage::persistent::open_store;
use vitalstore::{
    Document, DocumentId, HealthStatus, RecordStore, SeedOutcome, SimulationDriver, StoreConfig,
    VitalsSample,
};

/// Command to run.
enum Command {
    Seed { file: Option<PathBuf> },
    List,
    Show { id: String },
    Simulate { id: String, cycles: u32 },
    Ack { id: String },
    Summary,
}

/// CLI configuration
struct Config {
    /// Data directory for persistent storage
    data_dir: PathBuf,
    /// Snapshot key inside the data directory
    storage_key: Option<String>,
    command: Command,
}

fn usage() {
    println!("vitalstore - livestock vitals record store");
    println!();
    println!("USAGE:");
    println!("    vitalstore [OPTIONS] <COMMAND>");
    println!();
    println!("COMMANDS:");
    println!("    seed [FILE]               Seed an empty store from a JSON array of documents");
    println!("                              (a demo herd when FILE is omitted)");
    println!("    list                      List animals ordered by tag");
    println!("    show <ID>                 Print one document as JSON");
    println!("    simulate <ID> [-n <N>]    Run N fever simulation cycles [default: 1]");
    println!("    ack <ID>                  Mark a document as synced");
    println!("    summary                   Print herd counters");
    println!();
    println!("OPTIONS:");
    println!("    -d, --data-dir <DIR>      Data directory [env: VITALSTORE_DATA_DIR]");
    println!("                              [default: ./vitalstore.db]");
    println!("    -k, --key <KEY>           Snapshot key [env: VITALSTORE_STORAGE_KEY]");
    println!("                              [default: livestock_db_docs_v1]");
    println!("    -h, --help                Print help information");
}

fn fail(msg: &str) -> ! {
    eprintln!("error: {msg}");
    std::process::exit(1);
}

fn required_id(positional: &mut impl Iterator<Item = String>, cmd: &str) -> String {
    positional
        .next()
        .unwrap_or_else(|| fail(&format!("{cmd} requires an <ID>")))
}

fn parse_args() -> Config {
    let args: Vec<String> = std::env::args().collect();
    let mut data_dir = std::env::var("VITALSTORE_DATA_DIR")
        .map_or_else(|_| PathBuf::from("./vitalstore.db"), PathBuf::from);
    let mut storage_key = std::env::var("VITALSTORE_STORAGE_KEY").ok();
    let mut positional: Vec<String> = Vec::new();
    let mut cycles: u32 = 1;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--data-dir" | "-d" => {
                let Some(value) = args.get(i + 1) else {
                    fail("--data-dir requires a value");
                };
                data_dir = PathBuf::from(value);
                i += 2;
            }
            "--key" | "-k" => {
                let Some(value) = args.get(i + 1) else {
                    fail("--key requires a value");
                };
                storage_key = Some(value.clone());
                i += 2;
            }
            "-n" | "--cycles" => {
                let Some(value) = args.get(i + 1) else {
                    fail("-n requires a value");
                };
                cycles = value
                    .parse()
                    .unwrap_or_else(|_| fail(&format!("invalid cycle count: {value}")));
                i += 2;
            }
            "--help" | "-h" => {
                usage();
                std::process::exit(0);
            }
            arg if arg.starts_with('-') => fail(&format!("unknown argument: {arg}")),
            arg => {
                positional.push(arg.to_string());
                i += 1;
            }
        }
    }

    let mut positional = positional.into_iter();
    let name = positional.next().unwrap_or_else(|| {
        usage();
        std::process::exit(1);
    });
    let command = match name.as_str() {
        "seed" => Command::Seed {
            file: positional.next().map(PathBuf::from),
        },
        "list" => Command::List,
        "show" => Command::Show {
            id: required_id(&mut positional, "show"),
        },
        "simulate" => Command::Simulate {
            id: required_id(&mut positional, "simulate"),
            cycles,
        },
        "ack" => Command::Ack {
            id: required_id(&mut positional, "ack"),
        },
        "summary" => Command::Summary,
        other => fail(&format!("unknown command: {other}")),
    };

    Config {
        data_dir,
        storage_key,
        command,
    }
}

fn demo_herd() -> Vec<Document> {
    let now = chrono::Utc::now();
    let healthy = |tag: &str, species: &str, weight: f64| {
        Document::new(tag, species).with_vitals(vec![VitalsSample::at(now)
            .temperature(38.6)
            .heart_rate(72)
            .weight(weight)
            .feed_intake(5.0)])
    };
    vec![
        healthy("C-101", "cow", 420.0).with_gender("female").with_age_months(30),
        healthy("C-102", "cow", 455.0).with_gender("male").with_age_months(26),
        healthy("G-201", "goat", 48.0).with_gender("female").with_age_months(14),
        Document::new("S-301", "sheep").with_gender("female"),
    ]
}

fn status_label(status: HealthStatus) -> &'static str {
    match status {
        HealthStatus::Healthy => "healthy",
        HealthStatus::Warning => "warning",
        HealthStatus::Critical => "critical",
    }
}

fn print_row(doc: &Document) {
    let id = doc.id.as_ref().map_or("-", DocumentId::as_str);
    let temp = doc
        .latest_vitals()
        .and_then(|v| v.temperature)
        .map_or_else(|| "-".to_string(), |t| format!("{t:.1}"));
    println!(
        "{id:<40} {:<8} {:<8} {:>6} {:<8} {}",
        doc.tag,
        doc.species,
        temp,
        status_label(doc.health_status()),
        if doc.synced { "synced" } else { "pending" }
    );
}

fn run(store: &Arc<RecordStore>, command: Command) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Seed { file } => {
            let docs = match file {
                Some(path) => {
                    serde_json::from_str::<Vec<Document>>(&std::fs::read_to_string(path)?)?
                }
                None => demo_herd(),
            };
            match store.seed_if_empty(docs)? {
                SeedOutcome::Seeded { ids } => println!("seeded {} documents", ids.len()),
                SeedOutcome::Skipped { existing } => {
                    println!("store already holds {existing} documents; nothing seeded");
                }
            }
        }
        Command::List => {
            for doc in store.list_by_tag()? {
                print_row(&doc);
            }
        }
        Command::Show { id } => {
            let doc = store.get(&DocumentId::new(id)?)?;
            println!("{}", serde_json::to_string_pretty(&doc)?);
        }
        Command::Simulate { id, cycles } => {
            let id = DocumentId::new(id)?;
            let driver = SimulationDriver::new(Arc::clone(store));
            for _ in 0..cycles {
                let doc = driver.simulate(&id)?;
                print_row(&doc);
                for alert in &doc.alerts {
                    println!("    {alert}");
                }
            }
        }
        Command::Ack { id } => {
            let doc = store.acknowledge_sync(&DocumentId::new(id)?)?;
            print_row(&doc);
        }
        Command::Summary => {
            let s = store.summary()?;
            println!("total:       {}", s.total);
            println!("healthy:     {}", s.healthy);
            println!("with alerts: {}", s.with_alerts);
            println!("critical:    {}", s.critical);
            println!("unsynced:    {}", s.unsynced);
        }
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vitalstore=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = parse_args();

    let mut store_config = StoreConfig::default();
    if let Some(key) = config.storage_key {
        store_config.storage_key = key;
    }

    // Holds the data directory lock for the process lifetime.
    let store = Arc::new(open_store(&config.data_dir, store_config, None)?);

    run(&store, config.command)
}
