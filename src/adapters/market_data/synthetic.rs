//! Synthetic Bar Feed
//!
//! Correlated geometric random walks for demos and soak runs:
//!
//!   r_exp = sigma_exp * z1
//!   r_dep = beta * r_exp + sigma_noise * z2   (+ ln(1 + jump) spread over the jump bars)
//!
//! z1, z2 are independent standard normals from a seeded RNG, so a given
//! seed always yields the same stream.

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::domain::bar::Bar;
use crate::ports::market_data::{BarFeed, FeedError};

/// One-off idiosyncratic move injected into the dependent leg
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JumpSpec {
    /// Bar index (0-based) at which the jump lands
    pub at: usize,
    /// Fractional move, 0.02 == +2%
    pub pct: f64,
    /// Number of consecutive bars the move is spread over
    #[serde(default = "default_spread")]
    pub spread: usize,
}

fn default_spread() -> usize {
    1
}

impl JumpSpec {
    /// Log-return added to the dependent leg at bar `i`
    pub fn contribution(&self, i: usize) -> f64 {
        let spread = self.spread.max(1);
        if i >= self.at && i < self.at + spread {
            (1.0 + self.pct).ln() / spread as f64
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticConfig {
    pub explanatory_symbol: String,
    pub dependent_symbol: String,
    pub bars: usize,
    pub seed: u64,
    pub beta: f64,
    /// Per-minute volatility of the explanatory leg
    pub explanatory_vol: f64,
    /// Per-minute idiosyncratic noise of the dependent leg
    pub noise_vol: f64,
    pub explanatory_start: f64,
    pub dependent_start: f64,
    pub start: DateTime<Utc>,
    pub jump: Option<JumpSpec>,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            explanatory_symbol: "BTCUSDT".to_string(),
            dependent_symbol: "ETHUSDT".to_string(),
            bars: 600,
            seed: 42,
            beta: 0.8,
            explanatory_vol: 0.001,
            noise_vol: 0.0002,
            explanatory_start: 60_000.0,
            dependent_start: 3_000.0,
            start: Utc
                .with_ymd_and_hms(2025, 1, 1, 0, 0, 0)
                .single()
                .unwrap_or_else(Utc::now),
            jump: None,
        }
    }
}

/// Box-Muller transform
pub fn standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    // u1 in (0, 1] keeps ln finite
    let u1: f64 = 1.0 - rng.gen::<f64>();
    let u2: f64 = rng.gen::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

#[derive(Debug, Clone)]
pub struct SyntheticFeed {
    config: SyntheticConfig,
}

impl SyntheticFeed {
    pub fn new(config: SyntheticConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SyntheticConfig {
        &self.config
    }

    /// Materialize the whole stream. Each minute yields the explanatory bar
    /// followed by the dependent bar.
    pub fn generate(&self) -> Vec<Bar> {
        let cfg = &self.config;
        let mut rng = StdRng::seed_from_u64(cfg.seed);
        let mut bars = Vec::with_capacity(cfg.bars * 2);
        let mut px_exp = cfg.explanatory_start;
        let mut px_dep = cfg.dependent_start;

        for i in 0..cfg.bars {
            if i > 0 {
                let r_exp = cfg.explanatory_vol * standard_normal(&mut rng);
                let mut r_dep = cfg.beta * r_exp + cfg.noise_vol * standard_normal(&mut rng);
                if let Some(jump) = &cfg.jump {
                    r_dep += jump.contribution(i);
                }
                px_exp *= r_exp.exp();
                px_dep *= r_dep.exp();
            }

            let open_time = cfg.start + Duration::minutes(i as i64);
            let close_time = open_time + Duration::milliseconds(59_999);
            bars.push(Bar::new(&cfg.explanatory_symbol, open_time, close_time, px_exp));
            bars.push(Bar::new(&cfg.dependent_symbol, open_time, close_time, px_dep));
        }
        bars
    }
}

#[async_trait]
impl BarFeed for SyntheticFeed {
    async fn subscribe(&self) -> Result<mpsc::Receiver<Bar>, FeedError> {
        let (tx, rx) = mpsc::channel(256);
        let bars = self.generate();
        tokio::spawn(async move {
            for bar in bars {
                if tx.send(bar).await.is_err() {
                    tracing::debug!("Synthetic feed receiver dropped");
                    break;
                }
            }
        });
        Ok(rx)
    }

    fn symbols(&self) -> Vec<String> {
        vec![
            self.config.explanatory_symbol.to_ascii_uppercase(),
            self.config.dependent_symbol.to_ascii_uppercase(),
        ]
    }
}
