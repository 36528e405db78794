//! The supply conservation checker.

use super::Database;
use crate::domain::error::ChainError;
use ec_chain_params::MAX_PROXY_RECURSION_DEPTH;
use shared_types::{Asset, AssetSymbol};

macro_rules! invariant {
    ($cond:expr, $($arg:tt)*) => {
        if !$cond {
            return Err(ChainError::InvariantViolation(format!($($arg)*)));
        }
    };
}

impl Database {
    /// Walk all accounts, orders, escrows and funds and verify that every
    /// token the globals claim to exist is accounted for.
    pub fn validate_invariants(&self) -> Result<(), ChainError> {
        let gpo = self.state.gpo();

        let mut total_supply = Asset::ember(0);
        let mut total_eusd = Asset::eusd(0);
        let mut total_vests = Asset::vests(0);
        let mut pending_vesting_ember = Asset::ember(0);
        let mut total_vsf_votes: i128 = 0;

        for witness in self.state.witnesses.iter() {
            invariant!(
                witness.votes <= gpo.total_vesting_shares.amount,
                "witness {} has more votes than shares exist",
                witness.owner
            );
        }

        for account in self.state.accounts.iter() {
            total_supply += account.balance;
            total_supply += account.savings_balance;
            total_supply += account.reward_ember_balance;
            total_eusd += account.eusd_balance;
            total_eusd += account.savings_eusd_balance;
            total_eusd += account.reward_eusd_balance;
            total_vests += account.vesting_shares;
            total_vests += account.reward_vesting_balance;
            pending_vesting_ember += account.reward_vesting_ember;

            total_vsf_votes += if account.proxy.is_none() {
                account.witness_vote_weight()
            } else if MAX_PROXY_RECURSION_DEPTH > 0 {
                account.proxied_vsf_votes[MAX_PROXY_RECURSION_DEPTH - 1]
            } else {
                i128::from(account.vesting_shares.amount)
            };
        }

        for request in self.state.convert_requests.iter() {
            match request.amount.symbol {
                AssetSymbol::Ember => total_supply += request.amount,
                AssetSymbol::Eusd => total_eusd += request.amount,
                AssetSymbol::Vests => {
                    return Err(ChainError::InvariantViolation(
                        "conversion request holds vesting shares".into(),
                    ))
                }
            }
        }

        for order in self.state.limit_orders.iter() {
            match order.sell_price.base.symbol {
                AssetSymbol::Ember => total_supply += Asset::ember(order.for_sale),
                AssetSymbol::Eusd => total_eusd += Asset::eusd(order.for_sale),
                AssetSymbol::Vests => {
                    return Err(ChainError::InvariantViolation(
                        "limit order sells vesting shares".into(),
                    ))
                }
            }
        }

        for escrow in self.state.escrows.iter() {
            total_supply += escrow.ember_balance;
            total_eusd += escrow.eusd_balance;
            match escrow.pending_fee.symbol {
                AssetSymbol::Ember => total_supply += escrow.pending_fee,
                AssetSymbol::Eusd => total_eusd += escrow.pending_fee,
                AssetSymbol::Vests => {
                    return Err(ChainError::InvariantViolation(
                        "escrow fee held in vesting shares".into(),
                    ))
                }
            }
        }

        for withdraw in self.state.savings_withdraws.iter() {
            match withdraw.amount.symbol {
                AssetSymbol::Ember => total_supply += withdraw.amount,
                AssetSymbol::Eusd => total_eusd += withdraw.amount,
                AssetSymbol::Vests => {
                    return Err(ChainError::InvariantViolation(
                        "savings withdraw holds vesting shares".into(),
                    ))
                }
            }
        }

        for fund in self.state.reward_funds.iter() {
            total_supply += fund.reward_balance;
        }

        total_supply += gpo.total_vesting_fund_ember
            + gpo.total_reward_fund_ember
            + gpo.pending_rewarded_vesting_ember;

        invariant!(
            gpo.current_supply == total_supply,
            "current supply {} does not match accounted supply {}",
            gpo.current_supply,
            total_supply
        );
        invariant!(
            gpo.current_eusd_supply == total_eusd,
            "EUSD supply {} does not match accounted supply {}",
            gpo.current_eusd_supply,
            total_eusd
        );
        invariant!(
            gpo.total_vesting_shares + gpo.pending_rewarded_vesting_shares == total_vests,
            "vesting shares {} do not match accounted shares {}",
            gpo.total_vesting_shares + gpo.pending_rewarded_vesting_shares,
            total_vests
        );
        invariant!(
            i128::from(gpo.total_vesting_shares.amount) == total_vsf_votes,
            "vote weight {} does not match vesting shares {}",
            total_vsf_votes,
            gpo.total_vesting_shares
        );
        invariant!(
            gpo.pending_rewarded_vesting_ember == pending_vesting_ember,
            "pending rewarded vesting fund mismatch"
        );

        invariant!(
            gpo.virtual_supply >= gpo.current_supply,
            "virtual supply fell below current supply"
        );
        let median = self.state.feed_history().current_median_history;
        if !median.is_null() {
            invariant!(
                gpo.current_eusd_supply * median + gpo.current_supply == gpo.virtual_supply,
                "virtual supply does not match median-valued EUSD plus supply"
            );
        }

        Ok(())
    }
}
