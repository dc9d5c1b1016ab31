//! `homectl` command line.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::{ArgAction, Parser, Subcommand};
use homectl_protocol::{TcpConnector, TemperatureSetpoint};
use homectl_runner::logging::init_logging;
use homectl_runner::oneshot::{self, GarageAction};
use homectl_runner::telemetry::describe_metrics;
use homectl_runner::{Config, Daemon, HtmlPageSink, LogNotifier, Notifier, Result, SmtpNotifier};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "homectl", version, about = "Poll and control the home automation controller")]
struct Cli {
    /// YAML configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Controller host (overrides the config file)
    #[arg(long, global = true, value_name = "HOST")]
    host: Option<String>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll continuously, publish the status page and send door alerts
    Daemon,

    /// Poll once and print every field
    Status {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Change the thermostat set point
    SetTemp {
        /// New set point, e.g. 20.5
        #[arg(allow_negative_numbers = true)]
        value: TemperatureSetpoint,
    },

    /// Open the garage door if it is closed
    OpenGarage {
        /// Toggle the door without checking its state first
        #[arg(long)]
        force: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.verbose) {
        eprintln!("homectl: {}", e);
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("homectl: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(host) = &cli.host {
        config = config.with_host(host.clone());
        config.validate()?;
    }
    Ok(config)
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;

    match cli.command {
        Command::Daemon => run_daemon(&config),
        Command::Status { json } => {
            let record = oneshot::status(&TcpConnector, &config)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&record)?);
            } else {
                for (name, value) in record.iter() {
                    println!("{:<34} {}", name, value);
                }
            }
            Ok(())
        }
        Command::SetTemp { value } => {
            let echo = oneshot::set_temperature(&TcpConnector, &config, &value)?;
            println!("Set point is now {}", echo);
            Ok(())
        }
        Command::OpenGarage { force } => {
            match oneshot::open_garage(&TcpConnector, &config, force)? {
                GarageAction::Toggled(reply) => println!("{}", reply),
                GarageAction::AlreadyOpen => println!("Garage door is already open"),
            }
            Ok(())
        }
    }
}

fn run_daemon(config: &Config) -> Result<()> {
    describe_metrics();

    let notifier: Box<dyn Notifier> = match &config.smtp {
        Some(smtp) => Box::new(SmtpNotifier::from_config(smtp)?),
        None => Box::new(LogNotifier),
    };
    let sink = Box::new(HtmlPageSink::new(&config.page_path));

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    ctrlc::set_handler(move || {
        info!("Interrupt received, stopping after the current cycle");
        flag.store(true, Ordering::SeqCst);
    })?;

    let mut daemon = Daemon::new(TcpConnector, config, sink, notifier);
    daemon.run(&shutdown);
    Ok(())
}
