//! Provider pool and per-tier admission.
//!
//! `pool_size` permits bound outstanding provider calls. `premium_reserved`
//! of them sit in a separate semaphore only premium calls may draw from, so a
//! burst of free readings cannot starve premium ones. Premium interpretations
//! are additionally capped by `premium_concurrency`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};

use arcana_state::Tier;

/// Pool sizing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Total concurrent provider calls.
    pub pool_size: usize,
    /// Permits only premium calls may use (< `pool_size`).
    pub premium_reserved: usize,
    /// Concurrent premium interpretations.
    pub premium_concurrency: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            pool_size: 8,
            premium_reserved: 2,
            premium_concurrency: 4,
        }
    }
}

/// Held for the duration of one provider call.
#[derive(Debug)]
pub struct CallPermit {
    _permit: OwnedSemaphorePermit,
    reserved: bool,
}

impl CallPermit {
    /// Whether the permit came from the premium reserve.
    pub fn is_reserved(&self) -> bool {
        self.reserved
    }
}

/// Held for the duration of one premium interpretation. Free tier tickets
/// carry no permit.
#[derive(Debug)]
pub struct AdmissionTicket {
    _permit: Option<OwnedSemaphorePermit>,
}

/// Shared provider capacity.
#[derive(Debug)]
pub struct ProviderPool {
    shared: Arc<Semaphore>,
    reserved: Arc<Semaphore>,
    premium: Arc<Semaphore>,
}

impl ProviderPool {
    pub fn new(config: &PoolConfig) -> Self {
        let pool_size = config.pool_size.max(1);
        // free tier always keeps at least one permit
        let reserved = config.premium_reserved.min(pool_size - 1);
        Self {
            shared: Arc::new(Semaphore::new(pool_size - reserved)),
            reserved: Arc::new(Semaphore::new(reserved)),
            premium: Arc::new(Semaphore::new(config.premium_concurrency.max(1))),
        }
    }

    /// Admit one interpretation for `tier`.
    pub async fn admit(&self, tier: Tier) -> Result<AdmissionTicket, AcquireError> {
        let permit = match tier {
            Tier::Free => None,
            Tier::Premium => Some(self.premium.clone().acquire_owned().await?),
        };
        Ok(AdmissionTicket { _permit: permit })
    }

    /// Take a provider call slot. Premium calls fall back to the reserve
    /// when the shared permits are exhausted.
    pub async fn acquire_call(&self, tier: Tier) -> Result<CallPermit, AcquireError> {
        match tier {
            Tier::Free => Ok(CallPermit {
                _permit: self.shared.clone().acquire_owned().await?,
                reserved: false,
            }),
            Tier::Premium => {
                if let Ok(permit) = self.shared.clone().try_acquire_owned() {
                    return Ok(CallPermit {
                        _permit: permit,
                        reserved: false,
                    });
                }
                tokio::select! {
                    biased;
                    permit = self.shared.clone().acquire_owned() => Ok(CallPermit {
                        _permit: permit?,
                        reserved: false,
                    }),
                    permit = self.reserved.clone().acquire_owned() => Ok(CallPermit {
                        _permit: permit?,
                        reserved: true,
                    }),
                }
            }
        }
    }

    /// Shared (non-reserved) call permits currently free.
    pub fn available_shared(&self) -> usize {
        self.shared.available_permits()
    }

    /// Reserved call permits currently free.
    pub fn available_reserved(&self) -> usize {
        self.reserved.available_permits()
    }
}
