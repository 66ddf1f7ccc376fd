mod config;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, info, info_span, warn, Instrument};

use dronenode_bridge::{ActionDispatcher, ActionName, ChannelSink, DispatchConfig, Discard, StateCache, TelemetryPoller};
use dronenode_fc::probe::probe_link;
use dronenode_fc::{doctor as fc_doctor, CommandEncoder, Mavlink2RestLink, ModeTable, TelemetryLink};
use dronenode_proto::Property;
use dronenode_registry::description::{describe, thing_id};
use dronenode_registry::{
    doctor as registry_doctor, CredentialManager, HttpAuthService, HttpDirectory, Registrar, RegistrationLoop,
};

use config::{load_config, Config};

#[derive(Debug, Parser)]
#[command(name = "dronenode", version, about = "Drone flight-command bridge over mavlink2rest")]
struct Cli {
    #[arg(long)]
    config: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Validate the configuration.
    Doctor,
    /// Poll telemetry and keep the drone registered until Ctrl-C.
    Run,
    /// Dispatch one action, e.g. `action takeoff '{"alt": 10}'`.
    Action { name: String, input: Option<String> },
    /// Poll once and print the property snapshot, or one property, as JSON.
    Status { property: Option<String> },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = load_config(&cli.config)?;

    let span = info_span!("drone", name = %cfg.drone.name);
    async move {
        match cli.cmd {
            Command::Doctor => doctor(&cfg),
            Command::Run => run(&cfg).await,
            Command::Action { name, input } => action(&cfg, &name, input.as_deref()).await,
            Command::Status { property } => status(&cfg, property.as_deref()).await,
        }
    }
    .instrument(span)
    .await
}

fn doctor(cfg: &Config) -> Result<()> {
    info!("doctor: starting");
    fc_doctor::check_fc(&cfg.fc, cfg.drone.sys_id)?;
    fc_doctor::check_modes(&cfg.modes)?;
    registry_doctor::check_registry(&cfg.registry)?;
    anyhow::ensure!(!cfg.drone.name.trim().is_empty(), "drone.name is empty");
    if cfg.registry.enable && cfg.registry.email.is_empty() && cfg.registry.token.is_none() {
        warn!("registry enabled without credentials; announcing anonymously");
    }
    info!("doctor: OK");
    println!("doctor: OK");
    Ok(())
}

struct Fc {
    link: Arc<dyn TelemetryLink>,
    modes: Arc<ModeTable>,
    cache: StateCache,
}

fn open_fc(cfg: &Config) -> Result<Fc> {
    let modes = ModeTable::from_config(&cfg.modes).context("modes table")?;
    let link = Mavlink2RestLink::new(&cfg.fc.base_url, cfg.drone.sys_id, cfg.fc.target_component);
    Ok(Fc { link: Arc::new(link), modes: Arc::new(modes), cache: StateCache::new() })
}

fn dispatcher(cfg: &Config, fc: &Fc) -> ActionDispatcher {
    let encoder = CommandEncoder::new(
        fc.link.clone(),
        cfg.fc.sender(),
        cfg.fc.target(cfg.drone.sys_id),
        fc.modes.clone(),
    );
    ActionDispatcher::new(encoder, fc.cache.clone(), Arc::new(Discard), DispatchConfig::from(&cfg.fc))
}

async fn run(cfg: &Config) -> Result<()> {
    info!(m2r = %cfg.fc.base_url, tdd = %cfg.registry.base_url, sys_id = cfg.drone.sys_id, "run: starting");
    let fc = open_fc(cfg)?;

    // Refuse to serve when the link is down.
    probe_link(fc.link.as_ref(), &cfg.fc.base_url).await.context("telemetry link probe")?;

    let (sink, mut changes) = ChannelSink::new();
    let poller = TelemetryPoller::new(
        fc.link.clone(),
        fc.modes.clone(),
        fc.cache.clone(),
        Arc::new(sink),
        Duration::from_millis(cfg.fc.poll_interval_ms),
    );
    let poll_task = tokio::spawn(poller.run().in_current_span());

    let registry_task = if cfg.registry.enable {
        let credentials = CredentialManager::new(
            Arc::new(HttpAuthService::new(&cfg.registry.base_url)),
            cfg.registry.credentials(),
        );
        if let Some(tok) = cfg.registry.token.clone() {
            credentials.seed(tok).await;
        }
        let td = describe(
            &cfg.drone.name,
            cfg.drone.sys_id,
            Property::ALL.iter().map(|p| p.as_str()),
            ActionName::ALL.iter().map(|a| a.as_str()),
        );
        let registrar = Registrar::new(
            Arc::new(HttpDirectory::new(&cfg.registry.base_url)),
            credentials,
            thing_id(cfg.drone.sys_id),
            td,
        );
        let reg = RegistrationLoop::new(registrar, cfg.registry.retry_interval(), cfg.registry.reannounce_interval());
        Some(tokio::spawn(reg.run().in_current_span()))
    } else {
        info!("registry disabled");
        None
    };

    loop {
        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                res.context("wait for ctrl-c")?;
                info!("run: shutting down");
                break;
            }
            Some(change) = changes.recv() => {
                debug!(property = %change.property, value = %change.value, "property changed");
            }
        }
    }

    poll_task.abort();
    if let Some(t) = registry_task {
        t.abort();
    }
    Ok(())
}

/// Actions that only touch the in-process cache are meaningless in a one-shot invocation.
fn one_shot_action(name: &str) -> Result<ActionName> {
    let action: ActionName = name.parse()?;
    anyhow::ensure!(
        action != ActionName::SimulateBattery,
        "{action} only affects a running `dronenode run` process; the one-shot cache is discarded on exit"
    );
    Ok(action)
}

async fn action(cfg: &Config, name: &str, input: Option<&str>) -> Result<()> {
    one_shot_action(name)?;
    let input: serde_json::Value = match input {
        Some(s) => serde_json::from_str(s).with_context(|| format!("action input is not JSON: {s}"))?,
        None => serde_json::Value::Null,
    };
    let fc = open_fc(cfg)?;
    dispatcher(cfg, &fc).invoke(name, &input).await.with_context(|| format!("action {name}"))?;
    println!("{name}: OK");
    Ok(())
}

async fn status(cfg: &Config, property: Option<&str>) -> Result<()> {
    let fc = open_fc(cfg)?;
    let poller = TelemetryPoller::new(
        fc.link.clone(),
        fc.modes.clone(),
        fc.cache.clone(),
        Arc::new(Discard),
        Duration::from_millis(cfg.fc.poll_interval_ms),
    );
    let report = poller.poll_once().await;
    if !report.failed.is_empty() {
        warn!(failed = ?report.failed, "some telemetry could not be read");
    }
    let out = match property {
        Some(name) => {
            let p = Property::ALL
                .into_iter()
                .find(|p| p.as_str() == name)
                .with_context(|| format!("unknown property: {name}"))?;
            fc.cache.read_property(p)
        }
        None => serde_json::to_value(fc.cache.snapshot())?,
    };
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
