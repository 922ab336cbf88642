//! Cluster-membership configuration consumed by the consensus layer.
//!
//! Configurations are appended to the durable log during membership
//! changes, so the suffrage and change-command integers and the msgpack
//! layout are wire contracts. Encoding of an already-validated in-memory
//! configuration panics on failure: corruption there is a programming bug,
//! not a protocol error.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;
use tide_crypto::{PublicKey, Signature};

/// Whether a server's vote is counted. Persisted; do not renumber.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum ServerSuffrage {
    /// Vote counted in elections; match index advances the commit index.
    #[default]
    Peer = 0,
    /// Receives log entries but never votes.
    Learner = 1,
    /// Non-voter that the leader promotes to Peer once caught up.
    Staging = 2,
}

impl ServerSuffrage {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(ServerSuffrage::Peer),
            1 => Some(ServerSuffrage::Learner),
            2 => Some(ServerSuffrage::Staging),
            _ => None,
        }
    }
}

impl fmt::Display for ServerSuffrage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ServerSuffrage::Peer => "Peer",
            ServerSuffrage::Learner => "Learner",
            ServerSuffrage::Staging => "Staging",
        })
    }
}

impl Serialize for ServerSuffrage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

impl<'de> Deserialize<'de> for ServerSuffrage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let v = u8::deserialize(deserializer)?;
        ServerSuffrage::from_u8(v)
            .ok_or_else(|| D::Error::custom(format!("invalid suffrage value {v}")))
    }
}

/// Unique server identity, stable for all time.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerId(pub String);

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Network address a transport can contact.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerAddress(pub String);

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One server in a configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Server {
    pub suffrage: ServerSuffrage,
    pub id: ServerId,
    pub address: ServerAddress,
    pub pub_key: Option<PublicKey>,
}

/// Which servers are in the cluster and whether they vote. Listed in no
/// particular order; each server appears at most once.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    pub term: u64,
    pub leader: Server,
    pub servers: Vec<Server>,
    pub signature: Option<Signature>,
}

/// The ways a leader can change the cluster configuration. Persisted; do
/// not renumber.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ConfigurationChangeCommand {
    /// Add a server that should eventually vote.
    AddStaging = 0,
    /// Add a server that never votes.
    AddLearner = 1,
    /// Make a server Learner unless absent.
    Demote = 2,
    /// Drop a server from the membership entirely.
    RemoveServer = 3,
    /// Turn a Staging server into a Peer (issued by the leader).
    Promote = 4,
}

impl ConfigurationChangeCommand {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(ConfigurationChangeCommand::AddStaging),
            1 => Some(ConfigurationChangeCommand::AddLearner),
            2 => Some(ConfigurationChangeCommand::Demote),
            3 => Some(ConfigurationChangeCommand::RemoveServer),
            4 => Some(ConfigurationChangeCommand::Promote),
            _ => None,
        }
    }
}

impl fmt::Display for ConfigurationChangeCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConfigurationChangeCommand::AddStaging => "AddStaging",
            ConfigurationChangeCommand::AddLearner => "AddLearner",
            ConfigurationChangeCommand::Demote => "Demote",
            ConfigurationChangeCommand::RemoveServer => "RemoveServer",
            ConfigurationChangeCommand::Promote => "Promote",
        })
    }
}

impl Serialize for ConfigurationChangeCommand {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

impl<'de> Deserialize<'de> for ConfigurationChangeCommand {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let v = u8::deserialize(deserializer)?;
        ConfigurationChangeCommand::from_u8(v)
            .ok_or_else(|| D::Error::custom(format!("invalid change command {v}")))
    }
}

/// A change a leader would like to apply to its current configuration.
/// Never serialized into the log.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfigurationChange {
    pub command: ConfigurationChangeCommand,
    pub server_id: ServerId,
    /// Only meaningful for AddStaging / AddLearner.
    pub server_address: ServerAddress,
    /// If nonzero, the only configuration index this change may apply to.
    pub prev_index: u64,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("configuration changed since index {requested} (latest is {latest})")]
    Stale { requested: u64, latest: u64 },
    #[error("empty server id in configuration")]
    EmptyId,
    #[error("empty address for server {0}")]
    EmptyAddress(ServerId),
    #[error("duplicate server id {0}")]
    DuplicateId(ServerId),
    #[error("duplicate server address {0}")]
    DuplicateAddress(ServerAddress),
    #[error("need at least one voter in configuration")]
    NoVoters,
}

/// True when `id` is a voting member of `configuration`.
pub fn is_peer(configuration: &Configuration, id: &ServerId) -> bool {
    configuration
        .servers
        .iter()
        .find(|s| &s.id == id)
        .map(|s| s.suffrage == ServerSuffrage::Peer)
        .unwrap_or(false)
}

/// Reject empty or duplicate ids/addresses and voterless memberships.
pub fn check_configuration(configuration: &Configuration) -> Result<(), ConfigError> {
    let mut ids: HashSet<&ServerId> = HashSet::new();
    let mut addresses: HashSet<&ServerAddress> = HashSet::new();
    let mut voters = 0usize;
    for server in &configuration.servers {
        if server.id.0.is_empty() {
            return Err(ConfigError::EmptyId);
        }
        if server.address.0.is_empty() {
            return Err(ConfigError::EmptyAddress(server.id.clone()));
        }
        if !ids.insert(&server.id) {
            return Err(ConfigError::DuplicateId(server.id.clone()));
        }
        if !addresses.insert(&server.address) {
            return Err(ConfigError::DuplicateAddress(server.address.clone()));
        }
        if server.suffrage == ServerSuffrage::Peer {
            voters += 1;
        }
    }
    if voters == 0 {
        return Err(ConfigError::NoVoters);
    }
    Ok(())
}

/// Produce the configuration that results from applying `change` to
/// `current`, validating the outcome. `current_index` is the log index
/// `current` was written at.
pub fn next_configuration(
    current: &Configuration,
    current_index: u64,
    change: &ConfigurationChange,
) -> Result<Configuration, ConfigError> {
    if change.prev_index > 0 && change.prev_index != current_index {
        return Err(ConfigError::Stale {
            requested: change.prev_index,
            latest: current_index,
        });
    }

    let mut configuration = current.clone();
    match change.command {
        ConfigurationChangeCommand::AddStaging => {
            // TODO: add as Staging and let Promote flip it to Peer once the
            // catch-up flow is wired; until then the server votes right away.
            let new_server = Server {
                suffrage: ServerSuffrage::Peer,
                id: change.server_id.clone(),
                address: change.server_address.clone(),
                pub_key: None,
            };
            let mut found = false;
            for server in configuration.servers.iter_mut() {
                if server.id == change.server_id {
                    if server.suffrage == ServerSuffrage::Peer {
                        server.address = change.server_address.clone();
                    } else {
                        *server = new_server.clone();
                    }
                    found = true;
                    break;
                }
            }
            if !found {
                configuration.servers.push(new_server);
            }
        }
        ConfigurationChangeCommand::AddLearner => {
            let new_server = Server {
                suffrage: ServerSuffrage::Learner,
                id: change.server_id.clone(),
                address: change.server_address.clone(),
                pub_key: None,
            };
            let mut found = false;
            for server in configuration.servers.iter_mut() {
                if server.id == change.server_id {
                    if server.suffrage != ServerSuffrage::Learner {
                        server.address = change.server_address.clone();
                    } else {
                        *server = new_server.clone();
                    }
                    found = true;
                    break;
                }
            }
            if !found {
                configuration.servers.push(new_server);
            }
        }
        ConfigurationChangeCommand::Demote => {
            for server in configuration.servers.iter_mut() {
                if server.id == change.server_id {
                    server.suffrage = ServerSuffrage::Learner;
                    break;
                }
            }
        }
        ConfigurationChangeCommand::RemoveServer => {
            configuration.servers.retain(|s| s.id != change.server_id);
        }
        ConfigurationChangeCommand::Promote => {
            for server in configuration.servers.iter_mut() {
                if server.id == change.server_id && server.suffrage == ServerSuffrage::Staging {
                    server.suffrage = ServerSuffrage::Peer;
                    break;
                }
            }
        }
    }

    // Catch anything bad, like removing the last voter.
    check_configuration(&configuration)?;
    Ok(configuration)
}

/// Membership state tracked on every server: the latest committed
/// configuration and the latest (possibly still uncommitted) one. There is
/// at most one uncommitted configuration at a time.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Configurations {
    pub committed: Configuration,
    pub committed_index: u64,
    pub latest: Configuration,
    pub latest_index: u64,
}

/// Legacy peer codec supplied by the transport layer. Required for rolling
/// upgrades from protocol version 1; new code still decodes it.
pub trait Transport {
    fn encode_peer(&self, id: &ServerId, address: &ServerAddress) -> Vec<u8>;
    fn decode_peer(&self, bytes: &[u8]) -> String;
}

/// Serialize only the voters, in the old peers format.
pub fn encode_peers(configuration: &Configuration, transport: &dyn Transport) -> Vec<u8> {
    let enc_peers: Vec<Vec<u8>> = configuration
        .servers
        .iter()
        .filter(|s| s.suffrage == ServerSuffrage::Peer)
        .map(|s| transport.encode_peer(&s.id, &s.address))
        .collect();
    rmp_serde::to_vec(&enc_peers).expect("failed to encode peers")
}

/// Deserialize an old peers list. Every entry comes back as a voting
/// server whose id and address are the transport-decoded string.
pub fn decode_peers(buf: &[u8], transport: &dyn Transport) -> Configuration {
    let enc_peers: Vec<Vec<u8>> =
        rmp_serde::from_slice(buf).expect("failed to decode peers");
    let servers = enc_peers
        .iter()
        .map(|enc| {
            let p = transport.decode_peer(enc);
            Server {
                suffrage: ServerSuffrage::Peer,
                id: ServerId(p.clone()),
                address: ServerAddress(p),
                pub_key: None,
            }
        })
        .collect();
    Configuration {
        servers,
        ..Configuration::default()
    }
}

/// Msgpack-encode a validated configuration, or panic.
pub fn encode_configuration(configuration: &Configuration) -> Vec<u8> {
    rmp_serde::to_vec(configuration).expect("failed to encode configuration")
}

/// Decode a configuration written by [`encode_configuration`], or panic.
pub fn decode_configuration(buf: &[u8]) -> Configuration {
    rmp_serde::from_slice(buf).expect("failed to decode configuration")
}
