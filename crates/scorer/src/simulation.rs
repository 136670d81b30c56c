use common::error::FetchError;
use common::types::{
    EventKind, EventRole, PositionBalance, WalletAddress, WalletEvent, WalletHistory,
    WalletSnapshot,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::pipeline::WalletDataSource;

const SECONDS_PER_DAY: i64 = 86_400;
/// Synthetic histories span this many days before `as_of`.
pub const HISTORY_WINDOW_DAYS: i64 = 180;
const LIQUIDATION_CHANCE: f64 = 0.15;
const POSITION_CHANCE: f64 = 0.4;

const EVENT_KINDS: [(EventKind, f64); 4] = [
    (EventKind::Mint, 0.30),
    (EventKind::Borrow, 0.25),
    (EventKind::RepayBorrow, 0.25),
    (EventKind::Redeem, 0.20),
];

const ASSETS: [(&str, f64); 5] = [
    ("ETH", 0.30),
    ("DAI", 0.25),
    ("USDC", 0.25),
    ("USDT", 0.15),
    ("WBTC", 0.05),
];

const LIQUIDATED_ASSETS: [(&str, f64); 3] = [("ETH", 1.0), ("WBTC", 1.0), ("DAI", 1.0)];

/// Offline data source. The same address always yields the same history for a
/// given `as_of`.
#[derive(Debug, Clone)]
pub struct SimulatedSource {
    as_of: i64,
}

impl SimulatedSource {
    pub fn new(as_of: i64) -> Self {
        Self { as_of }
    }

    pub fn history_for(&self, address: &WalletAddress) -> WalletHistory {
        let mut rng = ChaCha8Rng::seed_from_u64(seed_for(address));

        let tx_count = rng.gen_range(5..=25);
        let mut events = Vec::with_capacity(tx_count + 3);
        for _ in 0..tx_count {
            let kind = pick(&mut rng, &EVENT_KINDS);
            let role = match kind {
                EventKind::Mint | EventKind::Redeem => EventRole::Supplier,
                _ => EventRole::Borrower,
            };
            events.push(WalletEvent {
                kind,
                asset: pick(&mut rng, &ASSETS).to_string(),
                amount: lognormal(&mut rng, 7.0, 1.5),
                timestamp: self.random_time(&mut rng),
                role,
            });
        }

        if rng.gen_bool(LIQUIDATION_CHANCE) {
            for _ in 0..rng.gen_range(1..=3) {
                events.push(WalletEvent {
                    kind: EventKind::LiquidateBorrow,
                    asset: pick(&mut rng, &LIQUIDATED_ASSETS).to_string(),
                    amount: lognormal(&mut rng, 8.0, 1.0),
                    timestamp: self.random_time(&mut rng),
                    role: EventRole::LiquidationTarget,
                });
            }
        }

        let mut snapshot = WalletSnapshot::default();
        for (asset, _) in ASSETS {
            if !rng.gen_bool(POSITION_CHANCE) {
                continue;
            }
            let supplied = if rng.gen_bool(0.7) {
                lognormal(&mut rng, 6.0, 2.0)
            } else {
                0.0
            };
            let borrowed = if rng.gen_bool(0.5) {
                lognormal(&mut rng, 5.0, 2.0)
            } else {
                0.0
            };
            snapshot
                .positions
                .insert(asset.to_string(), PositionBalance { supplied, borrowed });
        }

        WalletHistory::new(events, snapshot)
    }

    fn random_time(&self, rng: &mut ChaCha8Rng) -> i64 {
        let days = rng.gen_range(0..HISTORY_WINDOW_DAYS);
        let secs = rng.gen_range(0..SECONDS_PER_DAY);
        self.as_of - days * SECONDS_PER_DAY - secs
    }
}

impl WalletDataSource for SimulatedSource {
    fn source_name(&self) -> &'static str {
        "simulated"
    }

    async fn fetch_wallet(&self, address: &WalletAddress) -> Result<WalletHistory, FetchError> {
        Ok(self.history_for(address))
    }
}

/// Last 8 hex digits of the address.
fn seed_for(address: &WalletAddress) -> u64 {
    let digits = address.hex_digits();
    u64::from_str_radix(&digits[digits.len().saturating_sub(8)..], 16).unwrap_or_default()
}

fn pick<T: Copy>(rng: &mut ChaCha8Rng, choices: &[(T, f64)]) -> T {
    let total: f64 = choices.iter().map(|(_, w)| w).sum();
    let mut roll = rng.gen::<f64>() * total;
    for (value, weight) in choices {
        if roll < *weight {
            return *value;
        }
        roll -= weight;
    }
    choices[choices.len() - 1].0
}

/// Box-Muller normal sample, exponentiated.
fn lognormal(rng: &mut ChaCha8Rng, mu: f64, sigma: f64) -> f64 {
    let u1: f64 = 1.0 - rng.gen::<f64>();
    let u2: f64 = rng.gen();
    let z = (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos();
    (mu + sigma * z).exp()
}
