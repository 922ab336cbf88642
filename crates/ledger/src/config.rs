/// Platform knobs consulted by the transaction applier.
///
/// Injected into [`MetaState`](crate::MetaState) at construction so every
/// replica runs with explicit, identical values and tests can parameterize
/// them freely.
#[derive(Clone, Copy, Debug)]
pub struct ChainConfig {
    /// Queries per second a chain is provisioned for.
    pub qps: u64,
    /// Billing update period in minutes.
    pub update_period: u64,
    /// Stable-token deposit debited from a provider when it registers.
    pub min_provider_deposit: u64,
    /// Billing period stamped into new chain profiles, in minutes.
    pub sqlchain_period: u64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            qps: 1_000,
            update_period: 60,
            min_provider_deposit: 10_000,
            sqlchain_period: 60 * 24 * 30,
        }
    }
}

impl ChainConfig {
    /// Minimum deposit a user must hold on a chain:
    /// `gas_price × QPS × update_period × miner_count`.
    ///
    /// Saturating: an absurd gas price pins the requirement at `u64::MAX`
    /// instead of wrapping to something tiny.
    pub fn min_deposit(&self, gas_price: u64, miner_count: u64) -> u64 {
        gas_price
            .saturating_mul(self.qps)
            .saturating_mul(self.update_period)
            .saturating_mul(miner_count)
    }
}
