use clap::{App, Arg};
use colored::*;
use simrun::session::HardwareBackend;
use simrun::{Config, Orchestrator, RadioCredentials};
use std::path::{Path, PathBuf};
use tokio::io::BufReader;
use tracing::{warn, Level};

const DEFAULT_CONFIG: &str = "config.json";
const DEFAULT_RADIO_KEYS: &str = "configs/radio_keys.json";
const DEFAULT_DATA_SUBDIR: &str = "logs";

#[tokio::main]
async fn main() {
    let matches = App::new("simrun")
        .version("0.1.0")
        .author("Space Systems Engineering Team")
        .about("🛰️  Interactive console for hardware-in-the-loop flight software runs")
        .arg(
            Arg::with_name("conf")
                .short("c")
                .long("conf")
                .value_name("FILE")
                .help("JSON file listing serial ports and flight computer names")
                .takes_value(true)
                .default_value(DEFAULT_CONFIG),
        )
        .arg(
            Arg::with_name("data-dir")
                .short("d")
                .long("data-dir")
                .value_name("DIR")
                .help("Directory for storing run data. Must be an absolute path. Defaults to logs/ under the working directory; each run gets its own subdirectory.")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("radio-keys")
                .short("k")
                .long("radio-keys")
                .value_name("FILE")
                .help("JSON file with the radio carrier credentials")
                .takes_value(true)
                .default_value(DEFAULT_RADIO_KEYS),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .help("Enable debug logging"),
        )
        .get_matches();

    let level = if matches.is_present("verbose") { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let data_dir = match matches.value_of("data-dir") {
        Some(dir) => PathBuf::from(dir),
        None => match std::env::current_dir() {
            Ok(cwd) => cwd.join(DEFAULT_DATA_SUBDIR),
            Err(e) => fail(&format!("Could not resolve the working directory: {}", e)),
        },
    };
    if !data_dir.is_absolute() {
        fail(&format!("Data directory {} must be an absolute path.", data_dir.display()));
    }

    let conf_path = matches.value_of("conf").unwrap_or(DEFAULT_CONFIG);
    let config = match Config::load(conf_path) {
        Ok(config) => config,
        Err(e) => fail(&format!("{} Exiting.", e)),
    };

    let keys_path = matches.value_of("radio-keys").unwrap_or(DEFAULT_RADIO_KEYS);
    let credentials = load_credentials(Path::new(keys_path));

    let mut orchestrator = match Orchestrator::new(config, credentials, &data_dir, Box::new(HardwareBackend)) {
        Ok(orchestrator) => orchestrator,
        Err(e) => fail(&e.to_string()),
    };

    orchestrator.start(BufReader::new(tokio::io::stdin())).await;
    std::process::exit(0);
}

fn load_credentials(path: &Path) -> Option<RadioCredentials> {
    if !path.exists() {
        warn!("No radio keys at {}; radios cannot be connected", path.display());
        return None;
    }
    match RadioCredentials::load(path) {
        Ok(credentials) => Some(credentials),
        Err(e) => fail(&format!("Malformed radio keys file. {} Exiting.", e)),
    }
}

fn fail(message: &str) -> ! {
    println!("{} {}", "❌".red(), message.bright_red());
    std::process::exit(1);
}
