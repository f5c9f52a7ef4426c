//! HORAO replica binary: seeds a demo infrastructure, runs the reservation
//! scheduler against a CLI-supplied request, and drives the peer
//! synchronizer's background sync loop.

mod config;

use clap::{Parser, Subcommand};
use config::Config;
use horao_domain::{
    Cabinet, Claim, Constraint, DataCenter, DataCenterNetwork, Hardware, LogicalInfrastructure,
    NetworkType, ResourceDefinition, ResourceTotals, Server, Tenant,
};
use horao_scheduler::{Scheduler, SchedulerConfig};
use horao_sync::{PeerSynchronizer, ReceiverState};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "horao", about = "Replicated data-center infrastructure orchestrator")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the peer synchronizer and `/synchronize` receiver.
    Serve {
        #[arg(long, default_value = "0.0.0.0:7878")]
        listen: SocketAddr,
    },
    /// Admit a single demo reservation against a seeded infrastructure and
    /// print the scheduling decision.
    Schedule {
        #[arg(long, default_value_t = 16)]
        cpu: u32,
        #[arg(long, default_value_t = 64)]
        ram_gb: u32,
        #[arg(long)]
        dynamic_start: bool,
    },
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.rust_log.clone()))
        .init();

    let cli = Cli::parse();
    match cli.command.unwrap_or(Command::Schedule {
        cpu: 16,
        ram_gb: 64,
        dynamic_start: false,
    }) {
        Command::Serve { listen } => serve(config, listen).await,
        Command::Schedule {
            cpu,
            ram_gb,
            dynamic_start,
        } => schedule_demo(config, cpu, ram_gb, dynamic_start),
    }
}

/// Build a small two-server data center, the kind of fixture the
/// scheduler's admission tests use, so the binary has something to
/// reason about without an external inventory source.
fn seed_infrastructure() -> LogicalInfrastructure {
    let mut infrastructure = LogicalInfrastructure::new();

    let server = |serial: &str| Server {
        hardware: Hardware::new(serial, "R640", 0),
        cpus: vec![horao_domain::Cpu {
            hardware: Hardware::new(format!("{serial}-cpu"), "Xeon", 0),
            cores: 8,
            clock_speed_mhz: 2400,
        }],
        ram: vec![horao_domain::Ram {
            hardware: Hardware::new(format!("{serial}-ram"), "DDR4", 0),
            capacity_gb: 64,
        }],
        nics: vec![],
        disks: vec![],
        accelerators: vec![],
        status: horao_domain::DeviceStatus::Up,
    };

    let mut data_center = DataCenter::new("dc-1");
    data_center.set_row(
        0,
        vec![Cabinet {
            hardware: Hardware::new("cab-1", "rack", 0),
            servers: vec![server("srv-1"), server("srv-2")],
            chassis: vec![],
            switches: vec![],
        }],
        "seed".to_string(),
    );
    infrastructure.add_data_center(data_center);

    let mut data_network = DataCenterNetwork::new("dc-1-data", NetworkType::Data);
    data_network.hsn = false;
    infrastructure.add_network("dc-1", data_network);

    infrastructure
}

fn schedule_demo(config: Config, cpu: u32, ram_gb: u32, dynamic_start: bool) {
    let mut infrastructure = seed_infrastructure();
    let tenant = Tenant {
        name: "acme".to_string(),
        owner: "acme-admin".to_string(),
        delegates: vec![],
        shares: config.shares,
    };
    infrastructure.constraints.push(Constraint::new(
        "acme",
        ResourceTotals {
            cpu: 64,
            ram_gb: 256,
            accelerators: 0,
            block_storage_gb: 0,
        },
    ));

    let reservation = Claim::Reservation {
        name: "demo-reservation".to_string(),
        end_user: "acme".to_string(),
        resources: vec![ResourceDefinition::Compute {
            cpu,
            ram_gb,
            accelerator: false,
            count: 1,
        }],
        hsn_only: false,
        start: if dynamic_start { None } else { Some(0) },
        end: Some(3600),
    };

    let scheduler_config = SchedulerConfig {
        dynamic_start,
        planning_window_secs: config.planning_window_secs,
        planning_interval_secs: config.planning_interval_secs,
    };
    let mut scheduler = Scheduler::new(&mut infrastructure, scheduler_config);

    match scheduler.schedule(reservation, &tenant, 0) {
        Ok(start) => tracing::info!(start, "reservation admitted"),
        Err(error) => tracing::warn!(%error, "reservation rejected"),
    }
}

async fn serve(config: Config, listen: SocketAddr) {
    let infrastructure = Arc::new(Mutex::new(seed_infrastructure()));
    let synchronizer = Arc::new(Mutex::new(PeerSynchronizer::new(
        config.peers.clone(),
        config.peer_secret.clone(),
        config.host_id.clone(),
        config.sync_delta_secs,
        config.max_changes,
    )));

    let receiver_state = ReceiverState::new(
        Arc::clone(&infrastructure),
        Arc::clone(&synchronizer),
        config.peer_strict,
    );
    let router = horao_sync::router(receiver_state);

    let sync_loop = {
        let infrastructure = Arc::clone(&infrastructure);
        let synchronizer = Arc::clone(&synchronizer);
        let sync_delta_secs = config.sync_delta_secs.max(1) as u64;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(std::time::Duration::from_secs(sync_delta_secs));
            loop {
                ticker.tick().await;
                let now = std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .map(|d| d.as_secs() as i64)
                    .unwrap_or(0);
                let infra = infrastructure.lock().await;
                let mut sync = synchronizer.lock().await;
                if let Err(error) = sync.sync_if_due(&infra, now).await {
                    tracing::error!(%error, "peer sync round failed");
                }
            }
        })
    };

    tracing::info!(%listen, peers = config.peers.len(), "horao replica listening");
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .expect("failed to bind listener");
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("server error");

    sync_loop.abort();
}
