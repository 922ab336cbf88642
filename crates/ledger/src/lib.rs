//! # TideSQL block-producer meta state
//!
//! The deterministic, in-memory world state of the block producer: it
//! accepts the totally ordered transaction stream the consensus layer hands
//! over, validates each transaction against the committed baseline, and
//! applies its effects through a dirty/readonly overlay that commits
//! atomically or is discarded wholesale.
//!
//! Given the same committed state and the same transaction sequence, every
//! replica reaches byte-identical state. The engine is single-threaded;
//! serialization of `apply` calls is the caller's job.

pub mod account;
pub mod address;
pub mod apply;
pub mod arith;
pub mod config;
pub mod genesis;
pub mod index;
pub mod membership;
pub mod profile;
pub mod state;
pub mod tx;

pub use account::{Account, TokenType};
pub use address::{Address, DatabaseId, ADDRESS_LEN};
pub use arith::{safe_add, safe_mul, safe_sub, ArithError};
pub use config::ChainConfig;
pub use genesis::{Block, Header, SignedHeader, BLOCK_VERSION};
pub use index::MetaIndex;
pub use membership::{
    check_configuration, decode_configuration, decode_peers, encode_configuration, encode_peers,
    is_peer, next_configuration, ConfigError, Configuration, ConfigurationChange,
    ConfigurationChangeCommand, Configurations, Server, ServerAddress, ServerId, ServerSuffrage,
    Transport,
};
pub use profile::{
    MinerInfo, ProviderProfile, SqlChainProfile, SqlChainUser, UserArrears, UserPermission,
    UserStatus,
};
pub use state::{MetaState, StateError};
pub use tx::{
    BaseAccount, Billing, CreateDatabase, IssueKeys, MinerIncome, MinerKey, ProvideService,
    ResourceMeta, Transaction, TransactionType, Transfer, UpdateBilling, UpdatePermission,
    UserCost,
};
