//! In-process bus: services advertise groups and host objects, clients discover and call them.
//!
//! Discovery callbacks fire on whichever thread advertised or withdrew the group.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::config::PING_METHOD;
use crate::identity::PeerId;
use crate::transport::{
    DiscoveryListener, InterfaceContract, RemoteCallError, RemoteHandle, Transport,
    TransportError, TRANSPORT_LOCAL,
};

/// Service-side object reachable at an object path inside a group.
pub trait BusObject: Send + Sync {
    fn interface(&self) -> &InterfaceContract;
    fn call(&self, method: &str, argument: &str) -> Result<String, RemoteCallError>;
}

/// The SimpleService object: `Ping` returns its argument.
pub struct SimpleService {
    interface: InterfaceContract,
}

impl SimpleService {
    pub fn new() -> Self {
        Self {
            interface: InterfaceContract::default(),
        }
    }
}

impl Default for SimpleService {
    fn default() -> Self {
        Self::new()
    }
}

impl BusObject for SimpleService {
    fn interface(&self) -> &InterfaceContract {
        &self.interface
    }

    fn call(&self, method: &str, argument: &str) -> Result<String, RemoteCallError> {
        match method {
            PING_METHOD => {
                tracing::debug!(argument, "Ping");
                Ok(argument.to_string())
            }
            other => Err(RemoteCallError::NoSuchMethod(other.to_string())),
        }
    }
}

struct Group {
    /// Distinguishes a re-advertised name from the one a handle was bound to.
    id: u64,
    host: PeerId,
    objects: HashMap<String, Arc<dyn BusObject>>,
    members: HashSet<PeerId>,
    accepting: bool,
}

struct Watch {
    id: u64,
    prefix: String,
    listener: Arc<dyn DiscoveryListener>,
}

#[derive(Default)]
struct BusState {
    groups: HashMap<String, Group>,
    watches: Vec<Watch>,
    next_id: u64,
    closed: bool,
}

impl BusState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn listeners_for(&self, group: &str) -> Vec<Arc<dyn DiscoveryListener>> {
        self.watches
            .iter()
            .filter(|w| group.starts_with(&w.prefix))
            .map(|w| w.listener.clone())
            .collect()
    }
}

fn lock(state: &Mutex<BusState>) -> MutexGuard<'_, BusState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

/// Shared bus. Clones refer to the same bus.
#[derive(Clone, Default)]
pub struct LoopbackBus {
    state: Arc<Mutex<BusState>>,
}

impl LoopbackBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a new client peer.
    pub fn attach(&self) -> LoopbackTransport {
        LoopbackTransport {
            state: self.state.clone(),
            peer: PeerId::generate(),
            watch: None,
            joined: HashSet::new(),
        }
    }

    /// Create and advertise `group`, hosting `object` at `object_path`. Returns the host's peer ID.
    pub fn advertise(
        &self,
        group: &str,
        object_path: &str,
        object: Arc<dyn BusObject>,
    ) -> Result<PeerId, TransportError> {
        let host = PeerId::generate();
        let listeners = {
            let mut s = lock(&self.state);
            if s.closed {
                return Err(TransportError::Unavailable("bus closed".into()));
            }
            if s.groups.contains_key(group) {
                return Err(TransportError::NameTaken(group.to_string()));
            }
            let id = s.next_id();
            let mut objects = HashMap::new();
            objects.insert(object_path.to_string(), object);
            s.groups.insert(
                group.to_string(),
                Group {
                    id,
                    host,
                    objects,
                    members: HashSet::new(),
                    accepting: true,
                },
            );
            s.listeners_for(group)
        };
        tracing::debug!(group, %host, "advertised");
        for l in listeners {
            l.found(group, TRANSPORT_LOCAL);
        }
        Ok(host)
    }

    /// Stop advertising and destroy `group`. Bound handles fail from now on.
    pub fn withdraw(&self, group: &str) -> bool {
        let listeners = {
            let mut s = lock(&self.state);
            if s.groups.remove(group).is_none() {
                return false;
            }
            s.listeners_for(group)
        };
        tracing::debug!(group, "withdrawn");
        for l in listeners {
            l.lost(group);
        }
        true
    }

    /// Make `group` refuse (or accept again) new members.
    pub fn set_accepting(&self, group: &str, accepting: bool) -> bool {
        let mut s = lock(&self.state);
        match s.groups.get_mut(group) {
            Some(g) => {
                g.accepting = accepting;
                true
            }
            None => false,
        }
    }

    /// Withdraw every group and refuse further discovery.
    pub fn close(&self) {
        let names: Vec<String> = {
            let mut s = lock(&self.state);
            s.closed = true;
            s.groups.keys().cloned().collect()
        };
        for name in names {
            self.withdraw(&name);
        }
    }

    pub fn members(&self, group: &str) -> usize {
        lock(&self.state)
            .groups
            .get(group)
            .map_or(0, |g| g.members.len())
    }

    pub fn watch_count(&self) -> usize {
        lock(&self.state).watches.len()
    }
}

/// One client peer's view of the bus.
pub struct LoopbackTransport {
    state: Arc<Mutex<BusState>>,
    peer: PeerId,
    watch: Option<u64>,
    joined: HashSet<String>,
}

impl LoopbackTransport {
    fn release(&mut self) {
        let mut s = lock(&self.state);
        if let Some(id) = self.watch.take() {
            s.watches.retain(|w| w.id != id);
        }
        for name in self.joined.drain() {
            if let Some(g) = s.groups.get_mut(&name) {
                g.members.remove(&self.peer);
            }
        }
    }
}

impl Transport for LoopbackTransport {
    fn start_discovery(
        &mut self,
        group_prefix: &str,
        listener: Arc<dyn DiscoveryListener>,
    ) -> Result<(), TransportError> {
        if self.watch.is_some() {
            return Err(TransportError::AlreadyDiscovering);
        }
        let existing: Vec<String> = {
            let mut s = lock(&self.state);
            if s.closed {
                return Err(TransportError::Unavailable("bus closed".into()));
            }
            let id = s.next_id();
            s.watches.push(Watch {
                id,
                prefix: group_prefix.to_string(),
                listener: listener.clone(),
            });
            self.watch = Some(id);
            s.groups
                .keys()
                .filter(|name| name.starts_with(group_prefix))
                .cloned()
                .collect()
        };
        for name in existing {
            listener.found(&name, TRANSPORT_LOCAL);
        }
        Ok(())
    }

    fn join_group(&mut self, group: &str) -> Result<(), TransportError> {
        let mut s = lock(&self.state);
        let g = s.groups.get_mut(group).ok_or(TransportError::NoSuchGroup)?;
        if !g.accepting {
            return Err(TransportError::Rejected);
        }
        g.members.insert(self.peer);
        self.joined.insert(group.to_string());
        Ok(())
    }

    fn leave_group(&mut self, group: &str) {
        if !self.joined.remove(group) {
            return;
        }
        if let Some(g) = lock(&self.state).groups.get_mut(group) {
            g.members.remove(&self.peer);
        }
    }

    fn host_peer(&self, group: &str) -> Result<PeerId, TransportError> {
        lock(&self.state)
            .groups
            .get(group)
            .map(|g| g.host)
            .ok_or(TransportError::NoSuchGroup)
    }

    fn remote_handle(
        &self,
        host: PeerId,
        group: &str,
        object_path: &str,
        interface: &InterfaceContract,
    ) -> Result<Box<dyn RemoteHandle>, TransportError> {
        let s = lock(&self.state);
        let g = s.groups.get(group).ok_or(TransportError::NoSuchGroup)?;
        if !g.members.contains(&self.peer) {
            return Err(TransportError::NotJoined);
        }
        let object = g
            .objects
            .get(object_path)
            .filter(|_| g.host == host)
            .ok_or_else(|| TransportError::NoSuchObject(object_path.to_string()))?;
        let offered = object.interface();
        if offered.name != interface.name || !interface.methods.iter().all(|m| offered.has_method(m))
        {
            return Err(TransportError::NoSuchInterface(interface.name.clone()));
        }
        Ok(Box::new(LoopbackHandle {
            state: self.state.clone(),
            group: group.to_string(),
            group_id: g.id,
            peer: self.peer,
            object: object.clone(),
        }))
    }

    fn teardown(&mut self) {
        self.release();
    }
}

impl Drop for LoopbackTransport {
    fn drop(&mut self) {
        self.release();
    }
}

struct LoopbackHandle {
    state: Arc<Mutex<BusState>>,
    group: String,
    group_id: u64,
    peer: PeerId,
    object: Arc<dyn BusObject>,
}

impl RemoteHandle for LoopbackHandle {
    fn invoke(&self, method: &str, argument: &str) -> Result<String, RemoteCallError> {
        {
            let s = lock(&self.state);
            let live = s
                .groups
                .get(&self.group)
                .is_some_and(|g| g.id == self.group_id && g.members.contains(&self.peer));
            if !live {
                return Err(RemoteCallError::SessionLost);
            }
        }
        if !self.object.interface().has_method(method) {
            return Err(RemoteCallError::NoSuchMethod(method.to_string()));
        }
        self.object.call(method, argument)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GROUP: &str = "org.alljoyn.bus.samples.simple.test";

    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    impl DiscoveryListener for Recorder {
        fn found(&self, group: &str, _transport: u16) {
            self.0.lock().unwrap().push(format!("found {group}"));
        }
        fn lost(&self, group: &str) {
            self.0.lock().unwrap().push(format!("lost {group}"));
        }
    }

    impl Recorder {
        fn events(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }
    }

    fn joined_handle(bus: &LoopbackBus, t: &mut LoopbackTransport) -> Box<dyn RemoteHandle> {
        t.join_group(GROUP).unwrap();
        let host = t.host_peer(GROUP).unwrap();
        t.remote_handle(host, GROUP, "/SimpleService", &InterfaceContract::default())
            .unwrap_or_else(|e| panic!("bind failed: {e}, members={}", bus.members(GROUP)))
    }

    #[test]
    fn discovery_reports_existing_and_new_matching_groups() {
        let bus = LoopbackBus::new();
        bus.advertise(GROUP, "/SimpleService", Arc::new(SimpleService::new()))
            .unwrap();
        bus.advertise("com.example.other", "/x", Arc::new(SimpleService::new()))
            .unwrap();

        let rec = Arc::new(Recorder::default());
        let mut t = bus.attach();
        t.start_discovery("org.alljoyn.bus.samples.simple", rec.clone())
            .unwrap();
        bus.advertise("org.alljoyn.bus.samples.simple.two", "/SimpleService", Arc::new(SimpleService::new()))
            .unwrap();
        assert!(bus.withdraw(GROUP));
        assert!(!bus.withdraw(GROUP));

        assert_eq!(
            rec.events(),
            vec![
                format!("found {GROUP}"),
                "found org.alljoyn.bus.samples.simple.two".to_string(),
                format!("lost {GROUP}"),
            ]
        );
    }

    #[test]
    fn discovery_twice_fails() {
        let bus = LoopbackBus::new();
        let mut t = bus.attach();
        t.start_discovery("a", Arc::new(Recorder::default())).unwrap();
        assert_eq!(
            t.start_discovery("a", Arc::new(Recorder::default())),
            Err(TransportError::AlreadyDiscovering)
        );
    }

    #[test]
    fn ping_echoes() {
        let bus = LoopbackBus::new();
        bus.advertise(GROUP, "/SimpleService", Arc::new(SimpleService::new()))
            .unwrap();
        let mut t = bus.attach();
        let h = joined_handle(&bus, &mut t);
        assert_eq!(h.invoke("Ping", "hello").unwrap(), "hello");
        assert_eq!(
            h.invoke("Pong", "hello"),
            Err(RemoteCallError::NoSuchMethod("Pong".into()))
        );
        assert_eq!(bus.members(GROUP), 1);
    }

    #[test]
    fn bind_errors() {
        let bus = LoopbackBus::new();
        let host = bus
            .advertise(GROUP, "/SimpleService", Arc::new(SimpleService::new()))
            .unwrap();
        let mut t = bus.attach();
        let iface = InterfaceContract::default();

        assert_eq!(t.join_group("nope"), Err(TransportError::NoSuchGroup));
        assert!(matches!(
            t.remote_handle(host, GROUP, "/SimpleService", &iface),
            Err(TransportError::NotJoined)
        ));
        t.join_group(GROUP).unwrap();
        assert!(matches!(
            t.remote_handle(host, GROUP, "/Other", &iface),
            Err(TransportError::NoSuchObject(_))
        ));
        let wrong = InterfaceContract::new("com.example.Other", &["Ping"]);
        assert!(matches!(
            t.remote_handle(host, GROUP, "/SimpleService", &wrong),
            Err(TransportError::NoSuchInterface(_))
        ));
    }

    #[test]
    fn leave_group_drops_membership() {
        let bus = LoopbackBus::new();
        bus.advertise(GROUP, "/SimpleService", Arc::new(SimpleService::new()))
            .unwrap();
        let mut t = bus.attach();
        let h = joined_handle(&bus, &mut t);
        t.leave_group(GROUP);
        assert_eq!(bus.members(GROUP), 0);
        assert_eq!(h.invoke("Ping", "x"), Err(RemoteCallError::SessionLost));
        // Not a member any more: nothing to do.
        t.leave_group(GROUP);
        t.leave_group("never.joined");
    }

    #[test]
    fn rejected_join() {
        let bus = LoopbackBus::new();
        bus.advertise(GROUP, "/SimpleService", Arc::new(SimpleService::new()))
            .unwrap();
        assert!(bus.set_accepting(GROUP, false));
        let mut t = bus.attach();
        assert_eq!(t.join_group(GROUP), Err(TransportError::Rejected));
    }

    #[test]
    fn handle_goes_stale_when_group_withdrawn_or_readvertised() {
        let bus = LoopbackBus::new();
        bus.advertise(GROUP, "/SimpleService", Arc::new(SimpleService::new()))
            .unwrap();
        let mut t = bus.attach();
        let h = joined_handle(&bus, &mut t);
        bus.withdraw(GROUP);
        assert_eq!(h.invoke("Ping", "x"), Err(RemoteCallError::SessionLost));

        bus.advertise(GROUP, "/SimpleService", Arc::new(SimpleService::new()))
            .unwrap();
        assert_eq!(h.invoke("Ping", "x"), Err(RemoteCallError::SessionLost));
    }

    #[test]
    fn teardown_releases_registrations() {
        let bus = LoopbackBus::new();
        bus.advertise(GROUP, "/SimpleService", Arc::new(SimpleService::new()))
            .unwrap();
        let mut t = bus.attach();
        t.start_discovery("org", Arc::new(Recorder::default())).unwrap();
        let h = joined_handle(&bus, &mut t);
        assert_eq!(bus.watch_count(), 1);
        t.teardown();
        assert_eq!(bus.watch_count(), 0);
        assert_eq!(bus.members(GROUP), 0);
        assert_eq!(h.invoke("Ping", "x"), Err(RemoteCallError::SessionLost));
    }

    #[test]
    fn closed_bus_refuses_discovery() {
        let bus = LoopbackBus::new();
        bus.close();
        let mut t = bus.attach();
        assert!(matches!(
            t.start_discovery("org", Arc::new(Recorder::default())),
            Err(TransportError::Unavailable(_))
        ));
    }
}
