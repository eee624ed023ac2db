use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Duration;

use argh::FromArgs;
use exitcode::ExitCode;
use serf_sd::config::{self, Config};
use serf_sd::file_sd::FileSd;
use serf_sd::serf::SerfConnector;
use serf_sd::{signal, trace};
use tracing::{error, info, warn};

#[derive(FromArgs)]
#[argh(
    description = "Generate Prometheus file_sd targets from the members of a Serf cluster",
    help_triggers("-h", "--help")
)]
pub struct RootCommand {
    #[argh(switch, short = 'v', description = "show version")]
    version: bool,

    #[argh(
        option,
        short = 'l',
        default = "\"info\".to_string()",
        description = "log level, or an env filter directive"
    )]
    log_level: String,

    #[argh(switch, description = "output logs as json")]
    log_json: bool,

    #[argh(
        option,
        short = 'c',
        long = "config",
        description = "read configuration from a yaml file, flags override it"
    )]
    config: Option<PathBuf>,

    #[argh(
        option,
        long = "output-file",
        description = "output file for file_sd compatible file, default custom_sd.json"
    )]
    output_file: Option<PathBuf>,

    #[argh(
        option,
        long = "listen-address",
        description = "the address that Serf is listening on for requests, default localhost:7373"
    )]
    listen_address: Option<String>,

    #[argh(
        option,
        long = "refresh-interval",
        description = "seconds between two polls, default 30"
    )]
    refresh_interval: Option<u64>,

    #[argh(
        option,
        long = "tag-separator",
        description = "separator of member tags, default ','"
    )]
    tag_separator: Option<String>,

    #[argh(option, long = "serf-binary", description = "path of the serf executable")]
    serf_binary: Option<PathBuf>,

    #[argh(option, long = "rpc-auth", description = "serf RPC auth token")]
    rpc_auth: Option<String>,
}

impl RootCommand {
    #![allow(clippy::print_stdout)]
    fn show_version(&self) {
        println!("serf-sd {}", env!("CARGO_PKG_VERSION"));
    }

    fn load_config(&self) -> Result<Config, config::Error> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };

        if let Some(output) = &self.output_file {
            config.output = output.clone();
        }
        if let Some(address) = &self.listen_address {
            config.address = address.clone();
        }
        if let Some(interval) = self.refresh_interval {
            config.refresh_interval = interval;
        }
        if let Some(separator) = &self.tag_separator {
            config.tag_separator = separator.clone();
        }
        if let Some(binary) = &self.serf_binary {
            config.serf.binary = binary.clone();
        }
        if let Some(token) = &self.rpc_auth {
            config.serf.rpc_auth = Some(token.clone());
        }

        config.validate()?;

        Ok(config)
    }

    pub fn run(&self) -> Result<(), ExitCode> {
        if self.version {
            self.show_version();
            return Ok(());
        }

        let levels = std::env::var("SERF_SD_LOG")
            .unwrap_or_else(|_| trace::directives(&self.log_level));
        trace::init(std::io::stderr().is_terminal(), self.log_json, &levels);

        let config = self.load_config().map_err(|err| {
            error!(message = "invalid configuration", %err);
            exitcode::CONFIG
        })?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .thread_name("serf-sd-worker")
            .worker_threads(2)
            .enable_io()
            .enable_time()
            .build()
            .map_err(|err| {
                error!(message = "build tokio runtime failed", %err);
                exitcode::OSERR
            })?;

        let result = runtime.block_on(serve(config));

        runtime.shutdown_timeout(Duration::from_secs(5));

        result
    }
}

async fn serve(config: Config) -> Result<(), ExitCode> {
    info!(
        message = "Start serf-sd",
        version = env!("CARGO_PKG_VERSION"),
        address = config.address,
        refresh_interval = config.refresh_interval,
        output = ?config.output,
    );

    let connector = SerfConnector::new(&config.serf);
    let (batches, trigger) = discovery::start(config.discovery(), connector).map_err(|err| {
        error!(message = "start discovery failed", %err);
        exitcode::CONFIG
    })?;

    let sink = FileSd::new(config.name.clone(), config.output.clone());
    let mut forwarding = tokio::spawn(discovery::forward(batches, sink));

    tokio::select! {
        result = signal::shutdown() => {
            if let Err(err) = result {
                error!(message = "listen for os signals failed", %err);
            }

            info!(message = "Shutdown signal received");
            trigger.cancel();
        },
        result = &mut forwarding => {
            match result {
                Ok(_sink) => error!(message = "discovery stopped unexpectedly"),
                Err(err) => error!(message = "discovery task failed", %err),
            }

            return Err(exitcode::SOFTWARE);
        }
    }

    // the running poll is finished before the discovery stops, a second
    // signal stops waiting for it
    tokio::select! {
        result = forwarding => match result {
            Ok(sink) => info!(message = "Discovery stopped", output = ?sink.path()),
            Err(err) => {
                error!(message = "discovery task failed", %err);
                return Err(exitcode::SOFTWARE);
            }
        },
        _ = signal::shutdown() => {
            warn!(message = "Quit signal received");
        }
    }

    Ok(())
}
