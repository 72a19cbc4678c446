use std::collections::HashSet;
use std::sync::Mutex;

use log::{debug, info};

/// Lock-protected set of peer addresses (`host:port`).
#[derive(Debug)]
pub struct PeerList {
    name: &'static str,
    peers: Mutex<HashSet<String>>,
}

impl PeerList {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            peers: Mutex::new(HashSet::new()),
        }
    }

    /// Returns true if the peer was not already known.
    pub fn add(&self, peer: &str) -> bool {
        let mut peers = self.peers.lock().expect("mutex poisoned");
        let added = peers.insert(peer.to_string());
        if added {
            info!("PEERS - {} add {} (size={})", self.name, peer, peers.len());
        }
        added
    }

    pub fn remove(&self, peer: &str) -> bool {
        let mut peers = self.peers.lock().expect("mutex poisoned");
        let removed = peers.remove(peer);
        if removed {
            info!("PEERS - {} remove {} (size={})", self.name, peer, peers.len());
        }
        removed
    }

    /// Replace the whole set.
    pub fn overwrite<I: IntoIterator<Item = String>>(&self, new_peers: I) {
        let mut peers = self.peers.lock().expect("mutex poisoned");
        *peers = new_peers.into_iter().collect();
        debug!("PEERS - {} overwritten: {:?}", self.name, *peers);
    }

    /// Sorted copy of the current members.
    pub fn snapshot(&self) -> Vec<String> {
        let peers = self.peers.lock().expect("mutex poisoned");
        let mut list: Vec<String> = peers.iter().cloned().collect();
        list.sort();
        list
    }

    pub fn contains(&self, peer: &str) -> bool {
        self.peers.lock().expect("mutex poisoned").contains(peer)
    }

    pub fn len(&self) -> usize {
        self.peers.lock().expect("mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_remove_contains() {
        let list = PeerList::new("core");
        assert!(list.add("a:1"));
        assert!(!list.add("a:1"));
        assert!(list.contains("a:1"));
        assert_eq!(list.len(), 1);
        assert!(list.remove("a:1"));
        assert!(!list.remove("a:1"));
        assert!(list.is_empty());
    }

    #[test]
    fn overwrite_replaces_instead_of_merging() {
        let list = PeerList::new("core");
        list.add("old:1");
        list.overwrite(vec!["b:2".to_string(), "a:1".to_string()]);
        assert_eq!(list.snapshot(), vec!["a:1".to_string(), "b:2".to_string()]);
        assert!(!list.contains("old:1"));
    }
}
