use crate::meeting::peer_context::PeerContext;
use huddle_core::PeerId;
use std::collections::HashMap;

/// Owns the peer-id to context mapping. The meeting loop is the only
/// caller, so plain map operations are enough; each mutation completes
/// without an intervening await.
#[derive(Default)]
pub struct PeerRegistry {
    peers: HashMap<PeerId, PeerContext>,
}

impl PeerRegistry {
    pub fn get_or_create(&mut self, peer_id: &PeerId) -> &mut PeerContext {
        self.peers
            .entry(peer_id.clone())
            .or_insert_with(|| PeerContext::new(peer_id.clone()))
    }

    pub fn get_mut(&mut self, peer_id: &PeerId) -> Option<&mut PeerContext> {
        self.peers.get_mut(peer_id)
    }

    pub fn remove(&mut self, peer_id: &PeerId) -> Option<PeerContext> {
        self.peers.remove(peer_id)
    }

    pub fn contains(&self, peer_id: &PeerId) -> bool {
        self.peers.contains_key(peer_id)
    }

    pub fn peer_ids(&self) -> Vec<PeerId> {
        self.peers.keys().cloned().collect()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&PeerId, &mut PeerContext)> {
        self.peers.iter_mut()
    }

    pub fn drain(&mut self) -> Vec<PeerContext> {
        self.peers.drain().map(|(_, ctx)| ctx).collect()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}
