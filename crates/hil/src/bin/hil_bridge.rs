//! HIL bridge running against the built-in lightweight multirotor engine.
//!
//! Listens for an autopilot on UDP, streams HIL_SENSOR every step and
//! HIL_GPS at the configured interval once the first HIL_CONTROLS frame has
//! arrived.
//!
//! Usage:
//!   cargo run -p gazebo_hil_bridge --bin hil_bridge -- [OPTIONS]
//!
//! Options:
//!   -c, --config <PATH>   JSON configuration file
//!   --bind <ADDR>         Listen address (default: 0.0.0.0:14560)
//!   --remote <ADDR>       Static autopilot address (default: first sender)
//!   --structured          Use the JSON message bus instead of MAVLink
//!   --seed <N>            Seed for deterministic sensor noise

use std::env;
use std::net::SocketAddr;
use std::process;
use std::time::Duration;

use gazebo_hil_bridge::{
    BridgeConfig, HilBridge, LightweightConfig, LightweightEngine, SimulationEngine,
};

/// Steps between summary log lines.
const SUMMARY_INTERVAL_STEPS: u64 = 2_500;

struct Args {
    config: Option<String>,
    bind: Option<SocketAddr>,
    remote: Option<SocketAddr>,
    structured: bool,
    seed: Option<u64>,
}

fn parse_args() -> Args {
    let mut args = Args {
        config: None,
        bind: None,
        remote: None,
        structured: false,
        seed: None,
    };

    let raw: Vec<String> = env::args().collect();
    let mut i = 1;
    while i < raw.len() {
        match raw[i].as_str() {
            "-c" | "--config" => {
                i += 1;
                args.config = Some(parse_arg(&raw, i, "config"));
            }
            "--bind" => {
                i += 1;
                args.bind = Some(parse_arg(&raw, i, "bind"));
            }
            "--remote" => {
                i += 1;
                args.remote = Some(parse_arg(&raw, i, "remote"));
            }
            "--structured" => args.structured = true,
            "--seed" => {
                i += 1;
                args.seed = Some(parse_arg(&raw, i, "seed"));
            }
            "-h" | "--help" => {
                print_usage();
                process::exit(0);
            }
            other => {
                eprintln!("Unknown option: {other}");
                print_usage();
                process::exit(1);
            }
        }
        i += 1;
    }

    args
}

fn parse_arg<T: std::str::FromStr>(raw: &[String], i: usize, name: &str) -> T {
    raw.get(i)
        .unwrap_or_else(|| {
            eprintln!("Error: --{name} requires a value");
            process::exit(1);
        })
        .parse()
        .unwrap_or_else(|_| {
            eprintln!("Error: invalid value for --{name}");
            process::exit(1);
        })
}

fn print_usage() {
    eprintln!(
        "Usage: hil_bridge [OPTIONS]\n\
         \n\
         Options:\n\
         \x20 -c, --config <PATH>   JSON configuration file\n\
         \x20 --bind <ADDR>         Listen address (default: 0.0.0.0:14560)\n\
         \x20 --remote <ADDR>       Static autopilot address (default: first sender)\n\
         \x20 --structured          Use the JSON message bus instead of MAVLink\n\
         \x20 --seed <N>            Seed for deterministic sensor noise\n\
         \x20 -h, --help            Show this help"
    );
}

fn load_config(args: &Args) -> BridgeConfig {
    let mut config = match &args.config {
        Some(path) => BridgeConfig::load(path).unwrap_or_else(|e| {
            eprintln!("Error: cannot load {path}: {e}");
            process::exit(1);
        }),
        None => BridgeConfig::default(),
    };

    if args.structured {
        config.use_mavlink_udp = false;
    }
    if let Some(bind) = args.bind {
        if config.use_mavlink_udp {
            config.udp.bind_addr = bind;
        } else {
            config.bus.bind_addr = bind;
        }
    }
    if let Some(remote) = args.remote {
        if config.use_mavlink_udp {
            config.udp.remote_addr = Some(remote);
        } else {
            config.bus.remote_addr = Some(remote);
        }
    }
    config
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = parse_args();
    let config = load_config(&args);

    let engine_config = LightweightConfig {
        seed: args.seed,
        ..Default::default()
    };
    let step_size = Duration::from_micros(engine_config.step_size_us);
    let mut engine = LightweightEngine::new(engine_config);
    let mut bridge = HilBridge::from_config(&config);

    log::info!(
        "Bridge running ({} rotors, GPS every {} ms, {}). Press Ctrl+C to stop.",
        config.rotor_count,
        config.gps_interval_ms,
        bridge.link_kind().unwrap_or("inert")
    );

    let mut interval = tokio::time::interval(step_size);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut step_count: u64 = 0;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                log::info!("Shutdown requested.");
                break;
            }
            _ = interval.tick() => {
                bridge.step(&mut engine);
                engine.step();
                step_count += 1;

                if step_count.is_multiple_of(SUMMARY_INTERVAL_STEPS) {
                    let stats = bridge.stats();
                    let position = engine.world_position();
                    log::info!(
                        "[{:.1}s] {:?}, sensor {} / gps {} sent, {} failures, altitude {:.2} m",
                        engine.sim_time_us() as f64 / 1e6,
                        bridge.state(),
                        stats.sensor_sent,
                        stats.gps_sent,
                        stats.send_failures,
                        position.z
                    );
                }
            }
        }
    }

    bridge.shutdown();
    log::info!(
        "Simulation complete. {} steps, final time: {} us",
        step_count,
        engine.sim_time_us()
    );
}
