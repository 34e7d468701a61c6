//! Network condition simulation for testing

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Datagram loss and reordering applied before the mock server sends
#[derive(Clone, Debug)]
pub struct NetworkSimulator {
    /// Packet loss probability (0.0 to 1.0)
    pub loss_rate: f64,
    /// Probability of swapping a packet with its successor
    pub reorder_rate: f64,
}

impl NetworkSimulator {
    /// Perfect network (no issues)
    #[must_use]
    pub fn perfect() -> Self {
        Self {
            loss_rate: 0.0,
            reorder_rate: 0.0,
        }
    }

    /// Moderate `WiFi` conditions
    #[must_use]
    pub fn moderate_wifi() -> Self {
        Self {
            loss_rate: 0.01,
            reorder_rate: 0.01,
        }
    }

    /// Very poor conditions (stress test)
    #[must_use]
    pub fn stress_test() -> Self {
        Self {
            loss_rate: 0.10,
            reorder_rate: 0.10,
        }
    }

    /// Apply loss and reordering to a sequence of datagrams
    ///
    /// Uses a seeded generator so the outcome is reproducible.
    #[must_use]
    pub fn shape(&self, datagrams: Vec<Vec<u8>>, seed: u64) -> Vec<Vec<u8>> {
        let mut rng = StdRng::seed_from_u64(seed);
        let loss = self.loss_rate.clamp(0.0, 1.0);
        let reorder = self.reorder_rate.clamp(0.0, 1.0);

        let mut shaped: Vec<Vec<u8>> = datagrams
            .into_iter()
            .filter(|_| !rng.gen_bool(loss))
            .collect();

        let mut i = 0;
        while i + 1 < shaped.len() {
            if rng.gen_bool(reorder) {
                shaped.swap(i, i + 1);
                i += 2;
            } else {
                i += 1;
            }
        }
        shaped
    }
}
