//! `csf`: a minimal driver for the consensus simulation framework.
//!
//! ```bash
//! csf --seed 42 --peers 5 --ledgers 1 --connect-delay-ns 2000000
//! ```
//!
//! Wires `--peers` peers into a fully-trusting, fully-connected topology,
//! submits one transaction per peer, runs until every peer has closed
//! `--ledgers` ledgers (or the scheduler drains), and prints a JSON summary.

use csf::time::SimDuration;
use csf::{PeerConfig, Sim, Tx};
use serde_json::json;

struct CliConfig {
    seed: u64,
    peers: usize,
    ledgers: u32,
    connect_delay_ns: u64,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            peers: 5,
            ledgers: 1,
            connect_delay_ns: 2_000_000, // 2ms
        }
    }
}

fn parse_args() -> CliConfig {
    let args: Vec<String> = std::env::args().collect();
    let mut config = CliConfig::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--seed" => {
                i += 1;
                if i < args.len() {
                    config.seed = args[i].parse().unwrap_or(0);
                }
            }
            "--peers" => {
                i += 1;
                if i < args.len() {
                    config.peers = args[i].parse().unwrap_or(5);
                }
            }
            "--ledgers" => {
                i += 1;
                if i < args.len() {
                    config.ledgers = args[i].parse().unwrap_or(1);
                }
            }
            "--connect-delay-ns" => {
                i += 1;
                if i < args.len() {
                    config.connect_delay_ns = args[i].parse().unwrap_or(2_000_000);
                }
            }
            other => {
                eprintln!("csf: ignoring unrecognized argument {other}");
            }
        }
        i += 1;
    }
    config
}

fn main() {
    let cli = parse_args();
    let mut sim = Sim::new(cli.seed);

    let mut peer_config = PeerConfig::default();
    peer_config.target_ledgers = cli.ledgers;

    let group = match sim.create_group(cli.peers, peer_config) {
        Ok(group) => group,
        Err(err) => {
            eprintln!("csf: {err}");
            std::process::exit(1);
        }
    };
    group.trust_and_connect(&mut sim, &group, SimDuration::from_nanos(cli.connect_delay_ns));

    for (i, &peer) in group.members().iter().enumerate() {
        sim.submit_tx(peer, Tx(i as u32));
    }

    sim.run(cli.ledgers);

    let results = sim.get_consensus_results();
    let summary = json!({
        "seed": cli.seed,
        "peers": cli.peers,
        "target_ledgers": cli.ledgers,
        "synchronized": sim.synchronized(&group),
        "branches": sim.branches(&group),
        "now_ns": sim.now().as_nanos(),
        "peers_summary": results,
    });
    println!("{}", serde_json::to_string_pretty(&summary).unwrap());
}
