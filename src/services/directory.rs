//! Bus and stop name resolution
//!
//! Built once at startup from `Config` and never mutated afterwards.

use crate::domain::error::{SkillError, SlotKind};
use crate::domain::types::{RouteCode, StopCode};
use crate::infra::config::Config;
use crate::services::router::SlotValues;
use std::collections::HashMap;

/// Lowercase and trim a spoken name for lookup
pub fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

/// A fully resolved arrival query, ready for the network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedQuery {
    /// Normalized bus name as it will be spoken back
    pub bus: String,
    /// Normalized stop name as it will be spoken back
    pub stop: String,
    pub route: RouteCode,
    pub stop_code: StopCode,
}

#[derive(Debug, Clone, Default)]
pub struct TransitDirectory {
    stops: HashMap<String, StopCode>,
    routes: HashMap<String, RouteCode>,
}

impl TransitDirectory {
    pub fn new<S, R>(stops: S, routes: R) -> Self
    where
        S: IntoIterator<Item = (String, u64)>,
        R: IntoIterator<Item = (String, u64)>,
    {
        Self {
            stops: stops.into_iter().map(|(name, code)| (normalize(&name), StopCode(code))).collect(),
            routes: routes
                .into_iter()
                .map(|(name, code)| (normalize(&name), RouteCode(code)))
                .collect(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.stops().iter().map(|(k, v)| (k.clone(), *v)),
            config.routes().iter().map(|(k, v)| (k.clone(), *v)),
        )
    }

    pub fn stop_code(&self, name: &str) -> Option<StopCode> {
        self.stops.get(&normalize(name)).copied()
    }

    pub fn route_code(&self, name: &str) -> Option<RouteCode> {
        self.routes.get(&normalize(name)).copied()
    }

    pub fn stop_count(&self) -> usize {
        self.stops.len()
    }

    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    /// Resolve both slots. The stop is checked before the bus.
    pub fn resolve(&self, slots: &SlotValues) -> Result<ResolvedQuery, SkillError> {
        let stop = slots.stop.as_deref().map(normalize).filter(|s| !s.is_empty());
        let stop = stop.ok_or(SkillError::MissingSlot(SlotKind::Stop))?;
        let stop_code = self.stops.get(&stop).copied();
        let stop_code = stop_code.ok_or_else(|| SkillError::UnrecognizedStop(stop.clone()))?;

        let bus = slots.bus.as_deref().map(normalize).filter(|b| !b.is_empty());
        let bus = bus.ok_or(SkillError::MissingSlot(SlotKind::Bus))?;
        let route = self.routes.get(&bus).copied();
        let route = route.ok_or_else(|| SkillError::UnrecognizedBus(bus.clone()))?;

        Ok(ResolvedQuery { bus, stop, route, stop_code })
    }
}
