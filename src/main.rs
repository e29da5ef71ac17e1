//! Boot sequence: config → worker pool → registry → event bus → periodic tasks → warp TLS server.
//! Grounded on the teacher's `main.rs` (`env_logger::init()`,
//! `warp::serve(...).tls().cert_path(...).key_path(...)`), with the GraphQL schema construction
//! replaced by the `SessionDispatcher`/`WsSession` wiring (§4.10).

use std::sync::Arc;

use clap::Parser;
use mediasoup::worker_manager::WorkerManager;
use warp::Filter;

use parley_relay::cmdline::{Opts, Run, SubCommand};
use parley_relay::config::Config;
use parley_relay::dispatcher::SessionDispatcher;
use parley_relay::events::EventBus;
use parley_relay::registry::Registry;
use parley_relay::session;
use parley_relay::tasks::PeriodicTasks;
use parley_relay::worker_pool::WorkerPool;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let opts = Opts::parse();
    let SubCommand::Run(run) = opts.subcommand;

    let mut config = Config::load(&run.config).unwrap_or_else(|err| {
        log::warn!("failed to load config from {}: {}; using defaults", run.config.display(), err);
        Config::default()
    });
    apply_cli_overrides(&mut config, &run);

    let worker_manager = WorkerManager::new();
    let worker_count = num_cpus::get().max(1);
    let worker_pool = WorkerPool::new(&worker_manager, worker_count, &config).await?;

    let events = Arc::new(EventBus::new());
    events.emit(parley_relay::events::Event::ServerStarted);

    let registry = Arc::new(Registry::new(worker_pool.clone(), config.clone(), events.clone()));

    let periodic = PeriodicTasks::start(worker_pool.clone(), registry.clone(), config.sweep_interval_ms);

    let dispatcher = Arc::new(SessionDispatcher::new(registry.clone(), events.clone(), config.clone()));

    let routes = warp::ws().map(move |ws: warp::ws::Ws| {
        let dispatcher = dispatcher.clone();
        let events = events.clone();
        ws.on_upgrade(move |websocket| async move {
            let (session, mut requests) = session::wrap(websocket);
            events.emit(parley_relay::events::Event::ClientConnected { session_id: session.session_id() });

            use futures::StreamExt;
            while let Some(request) = requests.next().await {
                dispatcher.handle(&session, request).await;
            }

            dispatcher.handle_disconnect(session.session_id()).await;
            events.emit(parley_relay::events::Event::ClientDisconnected { session_id: session.session_id() });
        })
    });

    log::info!("listening on {}", run.listen_addr);
    warp::serve(routes.with(warp::log("parley-relay")))
        .tls()
        .cert_path(&run.cert_path)
        .key_path(&run.key_path)
        .run(run.listen_addr)
        .await;

    periodic.stop();
    Ok(())
}

fn apply_cli_overrides(config: &mut Config, run: &Run) {
    if let Some(first) = config.transport_options.listen_ips.first_mut() {
        if let Some(rtc_ip) = run.rtc_ip {
            first.ip = rtc_ip;
        }
        if let Some(announce_ip) = run.rtc_announce_ip {
            first.announced_ip = Some(announce_ip);
        }
    }
}
