//! Command-line front end for the device registry.
//!
//! # Responsibility
//! - Wire config, logging, storage, repository and service explicitly.
//! - Map each subcommand onto one service call and print the JSON envelope.

use clap::{Args, Parser, Subcommand};
use devicehub_core::db::open_from_config;
use devicehub_core::{
    init_logging, Config, Device, DeviceId, DeviceService, Envelope, ErrorCode, PageRequest,
    SqliteDeviceRepository,
};
use log::error;
use serde_json::{json, Value};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(name = "devicehub", version, about = "Manage registered devices")]
struct Cli {
    /// SQLite database path; overrides `DB_HOST`.
    #[arg(long, global = true)]
    db: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Register a new device.
    Register(DeviceFields),
    /// List devices matching the given fields, one page at a time.
    Find {
        #[command(flatten)]
        filter: DeviceFields,
        #[arg(long)]
        id: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: u32,
        /// Rows per page; 0 lists everything.
        #[arg(long, default_value_t = 0)]
        number: u32,
    },
    /// Show one device.
    Get { id: String },
    /// Patch the given fields of one device.
    Update {
        id: String,
        #[command(flatten)]
        fields: DeviceFields,
    },
    /// Delete one device.
    Delete { id: String },
    /// Print the active configuration.
    Config,
}

#[derive(Debug, Args)]
struct DeviceFields {
    #[arg(long, default_value = "")]
    model: String,
    #[arg(long, default_value = "")]
    color: String,
    #[arg(long = "device-version", default_value = "")]
    version: String,
}

impl DeviceFields {
    fn into_device(self) -> Device {
        Device::new(self.model, self.color, self.version)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let mut config = Config::from_env();
    if let Some(db) = cli.db {
        config.database.host = db;
    }

    if let Err(err) = init_logging(&config.logger) {
        eprintln!("devicehub: {err}");
        return ExitCode::FAILURE;
    }

    if let Command::Config = cli.command {
        return match config.watch() {
            Ok(rendered) => {
                println!("{rendered}");
                ExitCode::SUCCESS
            }
            Err(err) => {
                eprintln!("devicehub: {err}");
                ExitCode::FAILURE
            }
        };
    }

    let conn = match open_from_config(&config.database) {
        Ok(conn) => conn,
        Err(err) => {
            error!("event=cli_start module=cli status=error error={err}");
            eprintln!("devicehub: {err}");
            return ExitCode::FAILURE;
        }
    };
    let repo = match SqliteDeviceRepository::try_new(&conn) {
        Ok(repo) => repo,
        Err(err) => {
            eprintln!("devicehub: {err}");
            return ExitCode::FAILURE;
        }
    };
    let service = DeviceService::new(repo);

    let (data, code) = run(&service, cli.command);
    let envelope = Envelope::from_code(code, data);
    match serde_json::to_string(&envelope) {
        Ok(body) => println!("{body}"),
        Err(err) => {
            eprintln!("devicehub: {err}");
            return ExitCode::FAILURE;
        }
    }

    if code.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn run(
    service: &DeviceService<SqliteDeviceRepository<'_>>,
    command: Command,
) -> (Option<Value>, ErrorCode) {
    match command {
        Command::Register(fields) => {
            let (device, code) = service.register(Some(&fields.into_device()));
            (device.map(|device| json!(device)), code)
        }
        Command::Find {
            filter,
            id,
            page,
            number,
        } => {
            let mut filter = filter.into_device();
            filter.id = DeviceId::from(id.unwrap_or_default());
            let request = PageRequest::new(page, number);
            let (devices, code) = service.find(Some(&filter), Some(&request));
            (Some(json!({ "datas": devices, "page": request })), code)
        }
        Command::Get { id } => {
            let (device, code) = service.get(&id);
            (device.map(|device| json!(device)), code)
        }
        Command::Update { id, fields } => {
            let patch = Device {
                id: DeviceId::from(id),
                ..fields.into_device()
            };
            let (affected, code) = service.update(&patch);
            (Some(json!({ "affect": affected })), code)
        }
        Command::Delete { id } => (None, service.delete(&id)),
        // Answered in `main` before storage is opened.
        Command::Config => (None, ErrorCode::BadRequest),
    }
}
