// 9.4 router.rs: swap routing facade. call data picks the venue, the router just forwards.
// venue selection policy lives with the caller.

use crate::amm::{SwapError, SwapVenue};
use crate::fp96::Fp96;
use crate::oracle::{OracleError, PriceOracle};
use crate::types::{SwapDirection, Timestamp};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SwapCallData {
    pub venue: usize,
}

impl SwapCallData {
    pub fn venue(venue: usize) -> Self {
        Self { venue }
    }
}

#[derive(Debug, Clone)]
pub struct SwapRouter<V> {
    venues: Vec<V>,
    default_route: SwapCallData,
}

impl<V: SwapVenue> SwapRouter<V> {
    pub fn new(venues: Vec<V>) -> Self {
        Self {
            venues,
            default_route: SwapCallData::default(),
        }
    }

    pub fn with_default_route(mut self, route: SwapCallData) -> Self {
        self.default_route = route;
        self
    }

    pub fn venue(&self, index: usize) -> Option<&V> {
        self.venues.get(index)
    }

    pub fn venue_mut(&mut self, index: usize) -> Option<&mut V> {
        self.venues.get_mut(index)
    }

    pub fn venue_count(&self) -> usize {
        self.venues.len()
    }

    fn route(&self, call: SwapCallData) -> Result<&V, SwapError> {
        self.venues.get(call.venue).ok_or(SwapError::UnknownVenue(call.venue))
    }

    fn route_mut(&mut self, call: SwapCallData) -> Result<&mut V, SwapError> {
        self.venues
            .get_mut(call.venue)
            .ok_or(SwapError::UnknownVenue(call.venue))
    }

    pub fn estimate_exact_input(
        &self,
        call: SwapCallData,
        direction: SwapDirection,
        amount_in: u128,
    ) -> Result<u128, SwapError> {
        self.route(call)?.quote_exact_input(direction, amount_in)
    }

    pub fn estimate_exact_output(
        &self,
        call: SwapCallData,
        direction: SwapDirection,
        amount_out: u128,
    ) -> Result<u128, SwapError> {
        self.route(call)?.quote_exact_output(direction, amount_out)
    }

    pub fn route_exact_input(
        &mut self,
        now: Timestamp,
        call: SwapCallData,
        direction: SwapDirection,
        amount_in: u128,
        min_amount_out: u128,
    ) -> Result<u128, SwapError> {
        self.route_mut(call)?
            .swap_exact_input(now, direction, amount_in, min_amount_out)
    }

    pub fn route_exact_output(
        &mut self,
        now: Timestamp,
        call: SwapCallData,
        direction: SwapDirection,
        max_amount_in: u128,
        amount_out: u128,
    ) -> Result<u128, SwapError> {
        self.route_mut(call)?
            .swap_exact_output(now, direction, max_amount_in, amount_out)
    }
}

// a pool can trade through the router directly. it uses the default route.
impl<V: SwapVenue> SwapVenue for SwapRouter<V> {
    fn quote_exact_input(&self, direction: SwapDirection, amount_in: u128) -> Result<u128, SwapError> {
        self.estimate_exact_input(self.default_route, direction, amount_in)
    }

    fn quote_exact_output(&self, direction: SwapDirection, amount_out: u128) -> Result<u128, SwapError> {
        self.estimate_exact_output(self.default_route, direction, amount_out)
    }

    fn swap_exact_input(
        &mut self,
        now: Timestamp,
        direction: SwapDirection,
        amount_in: u128,
        min_amount_out: u128,
    ) -> Result<u128, SwapError> {
        let route = self.default_route;
        self.route_exact_input(now, route, direction, amount_in, min_amount_out)
    }

    fn swap_exact_output(
        &mut self,
        now: Timestamp,
        direction: SwapDirection,
        max_amount_in: u128,
        amount_out: u128,
    ) -> Result<u128, SwapError> {
        let route = self.default_route;
        self.route_exact_output(now, route, direction, max_amount_in, amount_out)
    }
}

impl<V: SwapVenue + PriceOracle> PriceOracle for SwapRouter<V> {
    fn spot_price(&self) -> Result<Fp96, OracleError> {
        self.venues
            .get(self.default_route.venue)
            .ok_or(OracleError::NoObservations)?
            .spot_price()
    }

    fn twap_price(&self, now: Timestamp, window_secs: u64) -> Result<Fp96, OracleError> {
        self.venues
            .get(self.default_route.venue)
            .ok_or(OracleError::NoObservations)?
            .twap_price(now, window_secs)
    }
}
