//! Two peers in one process: alice calls bob over the loopback transport,
//! sends a second of tone, then hangs up.
//!
//! Run with `cargo run -p peercall-session-core --example loopback_call`.

use std::sync::Arc;
use std::time::Duration;

use peercall_infra_common::{log_welcome, setup_logging, LoggingConfig};
use peercall_session_core::prelude::*;
use tracing::Level;

const FRAME: usize = 160;

/// 20 ms chunks of a sine tone at 8 kHz
fn tone(frequency: f32, chunks: usize) -> Vec<Vec<i16>> {
    (0..chunks)
        .map(|c| {
            (0..FRAME)
                .map(|i| {
                    let t = (c * FRAME + i) as f32 / 8000.0;
                    ((t * frequency * std::f32::consts::TAU).sin() * 8000.0) as i16
                })
                .collect()
        })
        .collect()
}

async fn start_peer(
    id: &str,
    network: &LoopbackNetwork,
    relay: &MemoryRelay,
) -> anyhow::Result<(Arc<SignalingOrchestrator>, Arc<MemoryDevices>)> {
    let devices = Arc::new(MemoryDevices::new());
    let (channel, inbound) = relay.connect();
    let config = CallConfig::new(id).with_codec(CodecConfig::pcmu());

    let orchestrator = SignalingOrchestrator::new(config, Arc::new(network.engine(id)), Arc::new(channel), devices.clone())?;
    orchestrator.spawn_signaling_reader(inbound);
    orchestrator.register().await?;
    Ok((orchestrator, devices))
}

async fn wait_connected(orchestrator: &SignalingOrchestrator, remote: &PeerIdentity) -> anyhow::Result<()> {
    tokio::time::timeout(Duration::from_secs(5), async {
        while orchestrator.session_state(remote) != Some(ConnectionState::Connected) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .map_err(|_| anyhow::anyhow!("{} never connected to {}", orchestrator.local_id(), remote))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    setup_logging(LoggingConfig::new(Level::INFO, "loopback_call"))?;
    log_welcome("loopback_call", env!("CARGO_PKG_VERSION"));

    let network = LoopbackNetwork::new();
    let relay = MemoryRelay::new();
    let (alice, alice_devices) = start_peer("alice", &network, &relay).await?;
    let (bob, bob_devices) = start_peer("bob", &network, &relay).await?;

    let alice_id = PeerIdentity::from("alice");
    let bob_id = PeerIdentity::from("bob");

    alice.start_call(bob_id.clone()).await?;
    wait_connected(&alice, &bob_id).await?;
    wait_connected(&bob, &alice_id).await?;

    let sent = alice_devices
        .capture(&bob_id)
        .spawn_paced(tone(440.0, 50), Duration::from_millis(20))
        .await?;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let played = bob_devices.sink(&alice_id).chunk_count();
    if let Some(snapshot) = bob.session_snapshot(&alice_id) {
        println!(
            "alice sent {} chunks, bob played {} (lost {}, late {})",
            sent, played, snapshot.playback.packets_lost, snapshot.playback.late_drops
        );
    }

    alice.hang_up(bob_id).await?;
    alice.shutdown().await;
    bob.shutdown().await;
    Ok(())
}
