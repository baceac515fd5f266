// 11.0: every state change produces an event. observers rebuild position and pool state from them.
// events carry the position as it is after the change, in discounted units.

use crate::fp96::Fp96;
use crate::position::{Coefficients, Position};
use crate::types::{AccountId, Asset, PoolMode, Timestamp};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub timestamp: Timestamp,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(id: EventId, timestamp: Timestamp, payload: EventPayload) -> Self {
        Self {
            id,
            timestamp,
            payload,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    // Transfer events
    Deposit(DepositEvent),
    Withdraw(WithdrawEvent),

    // Trade events
    Long(TradeEvent),
    Short(TradeEvent),
    ClosePosition(ClosePositionEvent),

    // Risk events
    ReceivePosition(ReceivePositionEvent),
    MarginCall(MarginCallEvent),
    BadDebtCovered(BadDebtEvent),

    // Pool events
    Reinit(ReinitEvent),
    EmergencyShutdown(EmergencyShutdownEvent),
    EmergencyWithdraw(EmergencyWithdrawEvent),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositEvent {
    pub account: AccountId,
    pub asset: Asset,
    pub amount: u128,
    // part of the deposit that repaid debt
    pub repaid: u128,
    pub position: Position,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawEvent {
    pub account: AccountId,
    pub asset: Asset,
    pub paid_as: Asset,
    pub amount: u128,
    pub position: Position,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeEvent {
    pub account: AccountId,
    pub base_amount: u128,
    pub quote_amount: u128,
    pub fee: u128,
    pub price: Fp96,
    pub position: Position,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClosePositionEvent {
    pub account: AccountId,
    // collateral sold to repay the debt
    pub collateral_sold: u128,
    pub debt_repaid: u128,
    pub fee: u128,
    pub position: Position,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceivePositionEvent {
    pub liquidator: AccountId,
    pub target: AccountId,
    pub base_amount: u128,
    pub quote_amount: u128,
    pub position: Position,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarginCallEvent {
    pub account: AccountId,
    pub collateral_asset: Asset,
    pub collateral_sold: u128,
    pub debt_repaid: u128,
    // collateral value left after repaying, shared with the debt asset's lenders
    pub surplus: u128,
    pub bad_debt: u128,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BadDebtEvent {
    pub account: AccountId,
    pub asset: Asset,
    pub amount: u128,
    pub insurance_balance: u128,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReinitEvent {
    pub elapsed_secs: u64,
    pub coefficients: Coefficients,
    pub base_fee: u128,
    pub quote_fee: u128,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmergencyShutdownEvent {
    pub mode: PoolMode,
    pub surviving_asset: Asset,
    pub swapped_in: u128,
    pub available: u128,
    pub emergency_withdraw_coeff: Fp96,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmergencyWithdrawEvent {
    pub account: AccountId,
    pub asset: Asset,
    pub paid_as: Asset,
    pub amount: u128,
}
