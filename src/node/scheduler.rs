//! Recurring mining and peer-sync tasks.
//!
//! Each loop waits out its own delay and then re-runs, until the shutdown
//! channel flips to `true` (or its sender is dropped). A running mining round
//! or proof search is never interrupted; shutdown is noticed at the next wait.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::watch;

use super::Node;
use crate::error::MiningError;
use crate::p2p::transport::Transport;

/// Sleep for `delay`, returning false if shutdown was signalled first.
async fn wait_or_shutdown(delay: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    if *shutdown.borrow() {
        return false;
    }
    tokio::select! {
        _ = tokio::time::sleep(delay) => true,
        changed = shutdown.changed() => changed.is_ok() && !*shutdown.borrow(),
    }
}

/// Mine, then wait `mining_speed + jitter`, forever.
pub async fn run_mining_loop<T: Transport + ?Sized>(
    node: Arc<Node>,
    transport: Arc<T>,
    mut shutdown: watch::Receiver<bool>,
) {
    info!("SCHEDULER - mining loop started");
    loop {
        match node.start_mining(transport.as_ref()).await {
            Ok(sent) => debug!("SCHEDULER - mined, {} messages delivered", sent),
            Err(MiningError::Busy) => debug!("SCHEDULER - mining already running, skipped"),
            Err(e) => warn!("SCHEDULER - mining round failed: {}", e),
        }
        let delay = node.next_mining_delay();
        debug!("SCHEDULER - next mining in {:.2}s", delay.as_secs_f64());
        if !wait_or_shutdown(delay, &mut shutdown).await {
            break;
        }
    }
    info!("SCHEDULER - mining loop stopped");
}

/// Sync peer lists and chains every `interval`, starting immediately.
pub async fn run_sync_loop<T: Transport + ?Sized>(
    node: Arc<Node>,
    transport: Arc<T>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    info!("SCHEDULER - sync loop started");
    loop {
        match node.sync_peers(transport.as_ref()).await {
            Some(sent) => debug!("SCHEDULER - synced, {} messages delivered", sent),
            None => debug!("SCHEDULER - sync already running, skipped"),
        }
        if !wait_or_shutdown(interval, &mut shutdown).await {
            break;
        }
    }
    info!("SCHEDULER - sync loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::tests::test_config;
    use crate::p2p::transport::loopback::Loopback;

    #[tokio::test]
    async fn wait_returns_false_once_shutdown_is_sent() {
        let (tx, mut rx) = watch::channel(false);
        assert!(wait_or_shutdown(Duration::from_millis(1), &mut rx).await);
        tx.send(true).unwrap();
        assert!(!wait_or_shutdown(Duration::from_secs(60), &mut rx).await);
    }

    #[tokio::test]
    async fn dropped_sender_stops_the_wait() {
        let (tx, mut rx) = watch::channel(false);
        drop(tx);
        assert!(!wait_or_shutdown(Duration::from_secs(60), &mut rx).await);
    }

    #[tokio::test]
    async fn mining_loop_mines_then_stops_on_shutdown() {
        let node = Arc::new(Node::new(test_config("a:1", &[])));
        let transport = Arc::new(Loopback::default());
        let (tx, rx) = watch::channel(false);

        let stopper = async {
            while node.blockchain().len() < 2 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            tx.send(true).unwrap();
        };
        tokio::join!(
            run_mining_loop(Arc::clone(&node), transport, rx),
            stopper
        );
        assert_eq!(node.blockchain().len(), 2);
    }

    #[tokio::test]
    async fn concurrent_triggers_mine_once() {
        let node = Arc::new(Node::new(test_config("a:1", &[])));
        let transport = Loopback::default();
        let (first, second) = tokio::join!(
            node.start_mining(&transport),
            node.start_mining(&transport)
        );
        let busy = [&first, &second]
            .iter()
            .filter(|r| matches!(r, Err(MiningError::Busy)))
            .count();
        assert_eq!(busy, 1);
        assert_eq!(node.blockchain().len(), 2);
    }

    #[tokio::test]
    async fn sync_loop_stops_on_shutdown() {
        let node = Arc::new(Node::new(test_config("a:1", &[])));
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();
        run_sync_loop(node, Arc::new(Loopback::default()), Duration::from_secs(60), rx).await;
    }
}
