//! Balance, supply and vesting adjustment helpers.

use super::Database;
use crate::domain::error::ChainError;
use ec_chain_params::{
    EUSD_INTEREST_COMPOUND_INTERVAL_SEC, PERCENT_100, SECONDS_PER_YEAR, START_VESTING_BLOCK,
};
use shared_types::operations::VirtualOperation;
use shared_types::{AccountName, Asset, AssetSymbol};
use tracing::warn;

impl Database {
    /// Adjust a liquid balance. Touching an EUSD balance accrues pending
    /// interest first: EUSD-seconds accumulate continuously and compound
    /// into the balance once per interval.
    pub(crate) fn adjust_balance(
        &mut self,
        name: &AccountName,
        delta: Asset,
    ) -> Result<(), ChainError> {
        let now = self.head_block_time();
        match delta.symbol {
            AssetSymbol::Ember => {
                self.state.accounts.modify(name, |acnt| acnt.balance += delta)?;
            }
            AssetSymbol::Eusd => {
                let account = self.state.get_account(name)?.clone();
                let mut interest_paid = Asset::eusd(0);

                if account.eusd_seconds_last_update != now {
                    let elapsed = now.saturating_sub(account.eusd_seconds_last_update);
                    let eusd_seconds = account.eusd_seconds
                        + u128::from(account.eusd_balance.amount as u64) * u128::from(elapsed);

                    let interest_due = eusd_seconds > 0
                        && now.saturating_sub(account.eusd_last_interest_payment)
                            > EUSD_INTEREST_COMPOUND_INTERVAL_SEC;

                    if interest_due {
                        let gpo_rate = self.state.gpo().eusd_interest_rate;
                        let mut interest = eusd_seconds / u128::from(SECONDS_PER_YEAR);
                        interest *= u128::from(gpo_rate);
                        interest /= u128::from(PERCENT_100);
                        interest_paid = Asset::eusd(interest as i64);

                        self.state.accounts.modify(name, |acnt| {
                            acnt.eusd_seconds = 0;
                            acnt.eusd_seconds_last_update = now;
                            acnt.eusd_last_interest_payment = now;
                            acnt.eusd_balance += interest_paid;
                        })?;
                    } else {
                        self.state.accounts.modify(name, |acnt| {
                            acnt.eusd_seconds = eusd_seconds;
                            acnt.eusd_seconds_last_update = now;
                        })?;
                    }
                }

                self.state.accounts.modify(name, |acnt| acnt.eusd_balance += delta)?;

                if interest_paid.amount > 0 {
                    self.push_virtual_operation(VirtualOperation::Interest {
                        owner: name.clone(),
                        interest: interest_paid,
                    });
                    let median = self.feed_median();
                    self.state.modify_gpo(|props| {
                        props.current_eusd_supply += interest_paid;
                        if !median.is_null() {
                            props.virtual_supply += interest_paid * median;
                        }
                    });
                }
            }
            AssetSymbol::Vests => {
                return Err(ChainError::EvaluatorReject(
                    "vesting shares are not a liquid balance".into(),
                ))
            }
        }
        Ok(())
    }

    /// Adjust a savings balance, with the same interest accrual on EUSD.
    pub(crate) fn adjust_savings_balance(
        &mut self,
        name: &AccountName,
        delta: Asset,
    ) -> Result<(), ChainError> {
        let now = self.head_block_time();
        match delta.symbol {
            AssetSymbol::Ember => {
                self.state.accounts.modify(name, |acnt| acnt.savings_balance += delta)?;
            }
            AssetSymbol::Eusd => {
                let account = self.state.get_account(name)?.clone();
                let mut interest_paid = Asset::eusd(0);

                if account.savings_eusd_seconds_last_update != now {
                    let elapsed = now.saturating_sub(account.savings_eusd_seconds_last_update);
                    let eusd_seconds = account.savings_eusd_seconds
                        + u128::from(account.savings_eusd_balance.amount as u64)
                            * u128::from(elapsed);

                    let interest_due = eusd_seconds > 0
                        && now.saturating_sub(account.savings_eusd_last_interest_payment)
                            > EUSD_INTEREST_COMPOUND_INTERVAL_SEC;

                    if interest_due {
                        let gpo_rate = self.state.gpo().eusd_interest_rate;
                        let mut interest = eusd_seconds / u128::from(SECONDS_PER_YEAR);
                        interest *= u128::from(gpo_rate);
                        interest /= u128::from(PERCENT_100);
                        interest_paid = Asset::eusd(interest as i64);

                        self.state.accounts.modify(name, |acnt| {
                            acnt.savings_eusd_seconds = 0;
                            acnt.savings_eusd_seconds_last_update = now;
                            acnt.savings_eusd_last_interest_payment = now;
                            acnt.savings_eusd_balance += interest_paid;
                        })?;
                    } else {
                        self.state.accounts.modify(name, |acnt| {
                            acnt.savings_eusd_seconds = eusd_seconds;
                            acnt.savings_eusd_seconds_last_update = now;
                        })?;
                    }
                }

                self.state
                    .accounts
                    .modify(name, |acnt| acnt.savings_eusd_balance += delta)?;

                if interest_paid.amount > 0 {
                    self.push_virtual_operation(VirtualOperation::Interest {
                        owner: name.clone(),
                        interest: interest_paid,
                    });
                    let median = self.feed_median();
                    self.state.modify_gpo(|props| {
                        props.current_eusd_supply += interest_paid;
                        if !median.is_null() {
                            props.virtual_supply += interest_paid * median;
                        }
                    });
                }
            }
            AssetSymbol::Vests => {
                return Err(ChainError::EvaluatorReject(
                    "vesting shares cannot be moved to savings".into(),
                ))
            }
        }
        Ok(())
    }

    pub(crate) fn adjust_reward_balance(
        &mut self,
        name: &AccountName,
        delta: Asset,
    ) -> Result<(), ChainError> {
        self.state.accounts.modify(name, |acnt| match delta.symbol {
            AssetSymbol::Ember => acnt.reward_ember_balance += delta,
            AssetSymbol::Eusd => acnt.reward_eusd_balance += delta,
            AssetSymbol::Vests => acnt.reward_vesting_balance += delta,
        })?;
        Ok(())
    }

    /// Adjust the global supply. With `vesting_match` set, nine further
    /// units land in the vesting fund for each unit issued (the legacy
    /// liquidity-reward match); disabled in the first week after genesis.
    pub(crate) fn adjust_supply(
        &mut self,
        delta: Asset,
        vesting_match: bool,
    ) -> Result<(), ChainError> {
        let vesting_match =
            vesting_match && self.head_block_num() >= START_VESTING_BLOCK;
        let median = self.feed_median();

        self.state.modify_gpo(|props| match delta.symbol {
            AssetSymbol::Ember => {
                let matched = Asset::ember(if vesting_match && delta.amount > 0 {
                    delta.amount * 9
                } else {
                    0
                });
                props.current_supply += delta + matched;
                props.virtual_supply += delta + matched;
                props.total_vesting_fund_ember += matched;
                assert!(props.current_supply.amount >= 0, "supply went negative");
            }
            AssetSymbol::Eusd => {
                props.current_eusd_supply += delta;
                props.virtual_supply = if median.is_null() {
                    props.current_supply
                } else {
                    props.current_eusd_supply * median + props.current_supply
                };
                assert!(props.current_eusd_supply.amount >= 0, "EUSD supply went negative");
            }
            AssetSymbol::Vests => unreachable!("vesting shares are not supply-adjusted here"),
        });
        Ok(())
    }

    pub(crate) fn pay_fee(&mut self, name: &AccountName, fee: Asset) -> Result<(), ChainError> {
        if fee.amount < 0 {
            return Err(ChainError::EvaluatorReject("negative fee".into()));
        }
        if fee.amount == 0 {
            return Ok(());
        }
        let balance = self.state.get_account(name)?.balance;
        if balance < fee {
            return Err(ChainError::EvaluatorReject(format!(
                "{name} cannot cover the {fee} fee"
            )));
        }
        self.adjust_balance(name, -fee)?;
        self.adjust_supply(-fee, false)?;
        Ok(())
    }

    /// Convert EMBER into vesting shares for `to`, preserving the share
    /// price. Reward-balance deposits go to the pending pools instead and do
    /// not move witness votes until claimed.
    pub(crate) fn create_vesting(
        &mut self,
        to: &AccountName,
        ember: Asset,
        to_reward_balance: bool,
    ) -> Result<Asset, ChainError> {
        debug_assert_eq!(ember.symbol, AssetSymbol::Ember);
        let cprops = self.state.gpo().clone();

        // The fund/share ratio must not move when a deposit joins:
        // V / C = (V + v) / (C + c), so v = (V * c) / C.
        let price = if to_reward_balance {
            cprops.reward_vesting_share_price()
        } else {
            cprops.vesting_share_price()
        };
        let new_vests = ember * price;

        self.state.accounts.modify(to, |a| {
            if to_reward_balance {
                a.reward_vesting_balance += new_vests;
                a.reward_vesting_ember += ember;
            } else {
                a.vesting_shares += new_vests;
            }
        })?;

        self.state.modify_gpo(|props| {
            if to_reward_balance {
                props.pending_rewarded_vesting_shares += new_vests;
                props.pending_rewarded_vesting_ember += ember;
            } else {
                props.total_vesting_fund_ember += ember;
                props.total_vesting_shares += new_vests;
            }
        });

        if !to_reward_balance {
            self.adjust_proxied_witness_votes_scalar(to, i128::from(new_vests.amount))?;
        }

        Ok(new_vests)
    }

    /// Convert EMBER into EUSD for `to`, throttled by the print rate; the
    /// clipped remainder stays EMBER. Returns `(eusd_minted, ember_kept)`.
    pub(crate) fn create_eusd(
        &mut self,
        to: &AccountName,
        ember: Asset,
        to_reward_balance: bool,
    ) -> Result<(Asset, Asset), ChainError> {
        debug_assert_eq!(ember.symbol, AssetSymbol::Ember);
        if ember.amount == 0 {
            return Ok((Asset::eusd(0), Asset::ember(0)));
        }

        let median = self.feed_median();
        if median.is_null() {
            self.adjust_balance(to, ember)?;
            return Ok((Asset::eusd(0), ember));
        }

        let print_rate = self.state.gpo().eusd_print_rate;
        let to_eusd_ember =
            Asset::ember(i64::from(print_rate) * ember.amount / i64::from(PERCENT_100));
        let kept_ember = ember - to_eusd_ember;
        let eusd = to_eusd_ember * median;

        if to_reward_balance {
            self.adjust_reward_balance(to, eusd)?;
            self.adjust_reward_balance(to, kept_ember)?;
        } else {
            self.adjust_balance(to, eusd)?;
            self.adjust_balance(to, kept_ember)?;
        }

        self.adjust_supply(-to_eusd_ember, false)?;
        self.adjust_supply(eusd, false)?;
        if eusd.amount == 0 && to_eusd_ember.amount > 0 {
            warn!("EUSD print rounded an entire conversion away");
        }
        Ok((eusd, kept_ember))
    }

    pub(crate) fn to_eusd(&self, ember: Asset) -> Asset {
        ec_reward_math::to_eusd(&self.feed_median(), ember)
    }

    pub(crate) fn to_ember(&self, eusd: Asset) -> Asset {
        ec_reward_math::to_ember(&self.feed_median(), eusd)
    }
}
