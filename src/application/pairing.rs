//! Bar Pairing
//!
//! Joins the two legs of a pair on their canonical close minute. Guards
//! per-symbol ordering, parks the first leg of a minute until its partner
//! arrives, and resolves a parked leg as missing when either its deadline
//! passes or a newer bar of the other symbol shows it will never be matched.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;

use crate::domain::bar::Bar;
use crate::domain::error::PipelineError;

#[derive(Debug, Clone, PartialEq)]
pub enum PairingEvent {
    Paired {
        minute: DateTime<Utc>,
        explanatory: Bar,
        dependent: Bar,
    },
    /// Always `PipelineError::MissingLegTimeout`
    Missing(PipelineError),
}

#[derive(Debug, Clone)]
struct PendingLeg {
    minute: DateTime<Utc>,
    bar: Bar,
    deadline: Instant,
}

#[derive(Debug)]
pub struct BarPairer {
    explanatory: String,
    dependent: String,
    timeout: Duration,
    /// Last accepted (close_time, canonical minute) per symbol
    last_accepted: HashMap<String, (DateTime<Utc>, DateTime<Utc>)>,
    /// Parked legs, oldest first, all of the same symbol
    pending: VecDeque<PendingLeg>,
}

impl BarPairer {
    pub fn new(explanatory: &str, dependent: &str, timeout: Duration) -> Self {
        Self {
            explanatory: explanatory.trim().to_ascii_uppercase(),
            dependent: dependent.trim().to_ascii_uppercase(),
            timeout,
            last_accepted: HashMap::new(),
            pending: VecDeque::new(),
        }
    }

    pub fn handles(&self, symbol: &str) -> bool {
        symbol == self.explanatory || symbol == self.dependent
    }

    fn other(&self, symbol: &str) -> &str {
        if symbol == self.explanatory {
            &self.dependent
        } else {
            &self.explanatory
        }
    }

    fn missing(&self, leg: &PendingLeg) -> PairingEvent {
        PairingEvent::Missing(PipelineError::MissingLegTimeout {
            minute: leg.minute,
            present: leg.bar.symbol.clone(),
            missing: self.other(&leg.bar.symbol).to_string(),
        })
    }

    fn paired(&self, minute: DateTime<Utc>, a: Bar, b: Bar) -> PairingEvent {
        let (explanatory, dependent) = if a.symbol == self.explanatory { (a, b) } else { (b, a) };
        PairingEvent::Paired {
            minute,
            explanatory,
            dependent,
        }
    }

    /// Offer a closed bar. Rejected bars (unknown symbol, bad price,
    /// duplicate or out-of-order close) change nothing.
    pub fn offer(&mut self, bar: Bar, now: Instant) -> Result<Vec<PairingEvent>, PipelineError> {
        if !self.handles(&bar.symbol) {
            return Err(PipelineError::UnknownSymbol(bar.symbol));
        }
        bar.validate_price()?;
        let minute = bar.minute();
        // a later stamp for an already-accepted minute is still a duplicate
        if let Some(&(last_close, last_minute)) = self.last_accepted.get(&bar.symbol) {
            if bar.close_time <= last_close || minute <= last_minute {
                return Err(PipelineError::OutOfOrder {
                    symbol: bar.symbol,
                    close_time: bar.close_time,
                    last_close_time: last_close,
                });
            }
        }
        self.last_accepted.insert(bar.symbol.clone(), (bar.close_time, minute));
        let mut events = Vec::new();

        // Older legs of the other symbol can no longer be matched
        while self
            .pending
            .front()
            .is_some_and(|p| p.bar.symbol != bar.symbol && p.minute < minute)
        {
            if let Some(stale) = self.pending.pop_front() {
                events.push(self.missing(&stale));
            }
        }

        match self.pending.front() {
            Some(front) if front.bar.symbol != bar.symbol && front.minute == minute => {
                if let Some(partner) = self.pending.pop_front() {
                    events.push(self.paired(minute, partner.bar, bar));
                }
            }
            Some(front) if front.bar.symbol != bar.symbol => {
                // the other leg for this minute was already resolved
                let orphan = PendingLeg {
                    minute,
                    bar,
                    deadline: now,
                };
                events.push(self.missing(&orphan));
            }
            _ => self.pending.push_back(PendingLeg {
                minute,
                bar,
                deadline: now + self.timeout,
            }),
        }

        Ok(events)
    }

    /// Resolve every parked leg whose deadline has passed
    pub fn expire(&mut self, now: Instant) -> Vec<PairingEvent> {
        let mut events = Vec::new();
        while self.pending.front().is_some_and(|p| p.deadline <= now) {
            if let Some(leg) = self.pending.pop_front() {
                events.push(self.missing(&leg));
            }
        }
        events
    }

    /// Resolve everything still parked (input exhausted or shutting down)
    pub fn drain(&mut self) -> Vec<PairingEvent> {
        let legs: Vec<PendingLeg> = self.pending.drain(..).collect();
        legs.iter().map(|leg| self.missing(leg)).collect()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.front().map(|p| p.deadline)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}
