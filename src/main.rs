// Copyright (c) 2022 Unfolded Circle ApS, Markus Zehnder <markus.z@unfoldedcircle.com>
// SPDX-License-Identifier: MPL-2.0

#![forbid(non_ascii_idents)]
#![deny(unsafe_code)]

use actix::{Actor, Context, Handler, Message};
use actix_web::{App, HttpServer, middleware, web};
use clap::{Parser, Subcommand};
use futures::channel::oneshot;
use log::{info, warn};
use mood_light::client::DispatchSummary;
use mood_light::command::{Hsb, Preset};
use mood_light::configuration::{DEF_CONFIG_FILE, Settings, get_configuration};
use mood_light::registry::{DeviceRegistry, FileStore};
use mood_light::{
    APP_VERSION, ControllerConfig, MoodController, MoodEvent, ProcessMood, SendPreset, built_info,
    server,
};
use std::net::TcpListener;
use std::path::Path;
use std::process::exit;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(
    version = APP_VERSION,
    about = "Turn a mood into smart bulb light",
    long_about = None,
    author = "Unfolded Circle ApS"
)]
struct Opt {
    /// Configuration file. Default: configuration.yaml in the working directory, if it exists.
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<String>,
    /// Language model API key (overrides configuration and ML_API_KEY).
    #[arg(long, global = true)]
    api_key: Option<String>,
    /// Language model identifier, e.g. gemini-2.5-flash (overrides configuration).
    #[arg(long, global = true)]
    model: Option<String>,
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Translate a mood description into light and send it to all devices.
    Mood {
        /// Free-text mood description.
        #[arg(required = true)]
        text: Vec<String>,
    },
    /// Send a fixed light setting to all devices.
    Preset {
        /// Hue (0-359), saturation (0-100) and brightness (0-100), e.g. 30,80,90
        #[arg(long, value_name = "H,S,B")]
        hsb: Hsb,
        /// Dimmer level 0-100
        #[arg(long, default_value_t = 70)]
        dimmer: u8,
        /// Color temperature in mired: 153-500
        #[arg(long, default_value_t = 250)]
        ct: u16,
    },
    /// Manage the registered device addresses.
    Devices {
        #[command(subcommand)]
        action: DevicesCmd,
    },
    /// Start the REST API server.
    Serve,
}

#[derive(Subcommand, Debug)]
enum DevicesCmd {
    /// List registered addresses.
    List,
    /// Register a device IPv4 address.
    Add { address: String },
    /// Remove a device address.
    Remove { address: String },
    /// Replace all addresses. The addresses are not validated!
    Set { addresses: Vec<String> },
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let opt = Opt::parse();

    if rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .is_err()
    {
        warn!("A TLS crypto provider has already been installed");
    }

    let cfg_file = match opt.config.as_deref() {
        None => {
            if Path::new(DEF_CONFIG_FILE).exists() {
                info!("Loading default configuration file: {DEF_CONFIG_FILE}");
                Some(DEF_CONFIG_FILE)
            } else {
                None
            }
        }
        Some(c) => Some(c),
    };
    let cfg = get_configuration(cfg_file)?;

    let store = FileStore::new(cfg.storage.directory(), &cfg.storage.namespace)?;
    let registry = DeviceRegistry::new(Arc::new(store), &cfg.devices.defaults)?;
    let config = ControllerConfig::from_settings(&cfg.llm)?.reconfigure(opt.api_key, opt.model);

    match opt.command {
        Cmd::Devices { action } => manage_devices(&registry, action),
        Cmd::Serve => serve(&cfg, config, registry).await,
        Cmd::Mood { text } => {
            let request = Request::Mood(text.join(" "));
            run_request(&cfg, config, registry, request).await
        }
        Cmd::Preset { hsb, dimmer, ct } => {
            let request = Request::Preset(Preset::new(hsb, dimmer, ct)?);
            run_request(&cfg, config, registry, request).await
        }
    }
}

fn manage_devices(registry: &DeviceRegistry, action: DevicesCmd) -> anyhow::Result<()> {
    match action {
        DevicesCmd::List => {}
        DevicesCmd::Add { address } => {
            if !registry.add(&address)? {
                eprintln!("Address not added: invalid IPv4 address or already registered");
                exit(1);
            }
        }
        DevicesCmd::Remove { address } => {
            if !registry.remove(&address)? {
                eprintln!("Address not registered: {address}");
                exit(1);
            }
        }
        DevicesCmd::Set { addresses } => registry.replace_all(&addresses)?,
    }

    for address in registry.list() {
        println!("{address}");
    }
    println!("{} device(s): {}", registry.count(), registry.summary());
    Ok(())
}

async fn serve(
    cfg: &Settings,
    config: ControllerConfig,
    registry: DeviceRegistry,
) -> anyhow::Result<()> {
    let address = format!("{}:{}", cfg.server.interface, cfg.server.port);
    let listener = TcpListener::bind(&address)?;
    println!("{} listening on: {address}", built_info::PKG_NAME);

    let controller =
        web::Data::new(MoodController::from_settings(cfg, config, registry.clone()).start());
    let registry = web::Data::new(registry);

    HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .app_data(server::json_config())
            .app_data(registry.clone())
            .app_data(controller.clone())
            .configure(server::configure)
    })
    .workers(1)
    .listen(listener)?
    .run()
    .await?;

    Ok(())
}

enum Request {
    Mood(String),
    Preset(Preset),
}

/// Process a single request and print the progress events.
async fn run_request(
    cfg: &Settings,
    config: ControllerConfig,
    registry: DeviceRegistry,
    request: Request,
) -> anyhow::Result<()> {
    let controller = MoodController::from_settings(cfg, config, registry).start();
    let (report_tx, report_rx) = oneshot::channel();
    let presenter = ConsolePresenter {
        report: Some(report_tx),
    }
    .start();
    let recipient = Some(presenter.clone().recipient());

    let result = match request {
        Request::Mood(text) => controller.send(ProcessMood { text, recipient }).await?,
        Request::Preset(preset) => controller.send(SendPreset { preset, recipient }).await?,
    };
    // all events of the request have been queued at this point
    presenter.send(Flush).await?;

    match result {
        Ok(outcome) if outcome.devices > 0 => {
            // the device requests are aborted when the program exits
            let retry = cfg.devices.retry;
            let max_wait = (cfg.devices.request_timeout + retry.delay) * retry.attempts
                + Duration::from_secs(1);
            if actix::clock::timeout(max_wait, report_rx).await.is_err() {
                warn!("Timeout waiting for device responses");
            }
            Ok(())
        }
        Ok(_) => Ok(()),
        Err(_) => exit(1),
    }
}

/// Prints the mood events to the console.
struct ConsolePresenter {
    report: Option<oneshot::Sender<DispatchSummary>>,
}

impl Actor for ConsolePresenter {
    type Context = Context<Self>;
}

impl Handler<MoodEvent> for ConsolePresenter {
    type Result = ();

    fn handle(&mut self, msg: MoodEvent, _: &mut Self::Context) {
        match msg {
            MoodEvent::ColorReady { command, color } => {
                println!("Color:       {color} ({command})");
            }
            MoodEvent::Completed(outcome) => {
                println!("Command:     {}", outcome.command);
                println!("Explanation: {}", outcome.explanation);
                println!("Accent:      {}", outcome.accent);
                println!("Status:      {}", outcome.status);
            }
            MoodEvent::Failed { message } => {
                eprintln!("Failed:      {message}");
            }
            MoodEvent::DispatchReport(summary) => {
                println!(
                    "Devices:     {} of {} reached",
                    summary.succeeded, summary.attempted
                );
                if let Some(report) = self.report.take() {
                    let _ = report.send(summary);
                }
            }
        }
    }
}

/// Wait until all queued events have been printed.
#[derive(Message)]
#[rtype(result = "()")]
struct Flush;

impl Handler<Flush> for ConsolePresenter {
    type Result = ();

    fn handle(&mut self, _: Flush, _: &mut Self::Context) {}
}
