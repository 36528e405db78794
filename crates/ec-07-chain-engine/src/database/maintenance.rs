//! The block-close maintenance pipeline. Step order is part of the
//! protocol: reordering changes numeric outcomes.

use super::Database;
use crate::domain::error::ChainError;
use crate::domain::skip_flags::SkipFlags;
use ec_chain_params::{
    BLOCKS_PER_DAY, CONTENT_REWARD_PERCENT, FEED_HISTORY_WINDOW, FEED_HISTORY_WINDOW_PRE_HF16,
    FEED_INTERVAL_BLOCKS, IRREVERSIBLE_THRESHOLD, LIQUIDITY_APR_PERCENT,
    LIQUIDITY_REWARD_BLOCKS, MAX_FEED_AGE_SECONDS, MAX_UNDO_HISTORY, MAX_WITNESSES, MIN_FEEDS,
    MIN_LIQUIDITY_REWARD, NULL_ACCOUNT, PERCENT_100, START_VESTING_BLOCK,
    VESTING_WITHDRAW_INTERVAL_SECONDS,
};
use ec_reward_math::{eusd_print_rate, inflation_per_block, legacy_apr_reward_per_block};
use ec_state_store::{BlockSummary, WitnessScheduleSlot};
use shared_types::operations::VirtualOperation;
use shared_types::{AccountName, Asset, Price, PublicKey, SignedBlock, TimePointSec};
use std::ops::Bound;

/// The ascending-order threshold pick over the round's confirmations: the
/// value at `floor((1 - IRREVERSIBLE_THRESHOLD) * n)` cannot be rolled back
/// without the cooperation of more than the threshold share of witnesses.
pub fn select_irreversible(mut last_confirmed: Vec<u32>) -> u32 {
    if last_confirmed.is_empty() {
        return 0;
    }
    let offset = (usize::from(PERCENT_100 - IRREVERSIBLE_THRESHOLD) * last_confirmed.len())
        / usize::from(PERCENT_100);
    let (_, nth, _) = last_confirmed.select_nth_unstable(offset);
    *nth
}

impl Database {
    pub(crate) fn update_global_dynamic_data(&mut self, b: &SignedBlock) -> Result<(), ChainError> {
        let mut missed_blocks = 0u32;
        if self.head_block_time() != TimePointSec::MIN {
            missed_blocks = self.get_slot_at_time(b.header.timestamp);
            assert!(missed_blocks != 0, "block timestamp must land on a future slot");
            missed_blocks -= 1;

            for i in 0..missed_blocks {
                let missed_witness = self.get_scheduled_witness(i + 1);
                if missed_witness == b.header.witness {
                    continue;
                }
                let head_block_num = self.head_block_num();
                let has_hf14 = self.has_hardfork(14);
                let mut shutdown = None;
                self.state.witnesses.modify(&missed_witness, |w| {
                    w.total_missed += 1;
                    if has_hf14
                        && head_block_num.saturating_sub(w.last_confirmed_block_num)
                            > BLOCKS_PER_DAY
                    {
                        w.signing_key = PublicKey::null();
                        shutdown = Some(w.owner.clone());
                    }
                })?;
                if let Some(owner) = shutdown {
                    self.push_virtual_operation(VirtualOperation::ShutdownWitness { owner });
                }
            }
        }

        let block_num = b.block_num();
        let block_id = b.id();
        let timestamp = b.header.timestamp;
        self.state.modify_gpo(|dgp| {
            // Slide the participation window one bit per slot, filled only
            // for the slot this block landed in.
            for i in 0..=missed_blocks {
                dgp.participation_count -= ((dgp.recent_slots_filled >> 127) & 1) as u8;
                dgp.recent_slots_filled =
                    (dgp.recent_slots_filled << 1) + u128::from(i == 0);
                dgp.participation_count += u8::from(i == 0);
            }
            dgp.head_block_number = block_num;
            dgp.head_block_id = block_id;
            dgp.time = timestamp;
            dgp.current_aslot += u64::from(missed_blocks) + 1;
        });

        if !self.skip_flags.contains(SkipFlags::UNDO_HISTORY_CHECK) {
            let gpo = self.state.gpo();
            if gpo.head_block_number - gpo.last_irreversible_block_num >= MAX_UNDO_HISTORY {
                return Err(ChainError::UndoHistoryExhausted);
            }
        }
        Ok(())
    }

    pub(crate) fn update_signing_witness(
        &mut self,
        signing_witness: &AccountName,
        new_block: &SignedBlock,
    ) -> Result<(), ChainError> {
        let new_block_aslot =
            self.state.gpo().current_aslot + u64::from(self.get_slot_at_time(new_block.header.timestamp));
        let block_num = new_block.block_num();
        self.state.witnesses.modify(signing_witness, |w| {
            w.last_aslot = new_block_aslot;
            w.last_confirmed_block_num = block_num;
        })?;
        Ok(())
    }

    pub(crate) fn update_last_irreversible_block(&mut self) -> Result<(), ChainError> {
        let wso = self.state.schedule().clone();
        let confirmations: Vec<u32> = wso
            .current_shuffled_witnesses
            .iter()
            .filter_map(|name| self.state.witnesses.find(name))
            .map(|w| w.last_confirmed_block_num)
            .collect();

        let new_lib = select_irreversible(confirmations);
        if new_lib > self.state.gpo().last_irreversible_block_num {
            self.state.modify_gpo(|g| g.last_irreversible_block_num = new_lib);
        }

        let lib = self.state.gpo().last_irreversible_block_num;
        self.state.commit(i64::from(lib));

        if !self.skip_flags.contains(SkipFlags::BLOCK_LOG) {
            let mut log_head_num = self.block_log.head().map(|b| b.block_num()).unwrap_or(0);
            if log_head_num < lib {
                while log_head_num < lib {
                    let block = self
                        .fork_db
                        .fetch_block_on_main_branch_by_number(log_head_num + 1)
                        .ok_or_else(|| {
                            ChainError::BlockValidation(
                                "main branch does not contain the last irreversible block".into(),
                            )
                        })?;
                    self.block_log.append(&block.data)?;
                    log_head_num += 1;
                }
                self.block_log.flush()?;
            }
        }

        let gpo = self.state.gpo();
        self.fork_db
            .set_max_size(gpo.head_block_number - gpo.last_irreversible_block_num + 1);
        Ok(())
    }

    pub(crate) fn create_block_summary(&mut self, b: &SignedBlock) -> Result<(), ChainError> {
        let slot = (b.block_num() & 0xFFFF) as u16;
        let id = b.id();
        self.state
            .block_summaries
            .modify(&slot, |s: &mut BlockSummary| s.block_id = id)?;
        Ok(())
    }

    pub(crate) fn clear_expired_transactions(&mut self) -> Result<(), ChainError> {
        let now = self.head_block_time();
        while let Some((expiration, id)) = self.state.transaction_records.first_by_key().cloned() {
            if now <= expiration {
                break;
            }
            self.state.transaction_records.remove(&id)?;
        }
        Ok(())
    }

    pub(crate) fn clear_expired_orders(&mut self) -> Result<(), ChainError> {
        let now = self.head_block_time();
        while let Some((expiration, id)) = self.state.limit_orders.first_by_key().cloned() {
            if expiration >= now {
                break;
            }
            self.cancel_order(&id)?;
        }
        Ok(())
    }

    pub(crate) fn clear_expired_delegations(&mut self) -> Result<(), ChainError> {
        let now = self.head_block_time();
        while let Some((expiration, id)) = self.state.delegation_expirations.first_by_key().cloned()
        {
            if expiration >= now {
                break;
            }
            let row = self.state.delegation_expirations.remove(&id)?;
            self.state.accounts.modify(&row.delegator, |a| {
                a.delegated_vesting_shares -= row.vesting_shares;
            })?;
            self.push_virtual_operation(VirtualOperation::ReturnVestingDelegation {
                account: row.delegator,
                vesting_shares: row.vesting_shares,
            });
        }
        Ok(())
    }

    pub(crate) fn update_median_feed(&mut self) -> Result<(), ChainError> {
        if self.head_block_num() % FEED_INTERVAL_BLOCKS != 0 {
            return Ok(());
        }

        let now = self.head_block_time();
        let wso = self.state.schedule().clone();
        let has_hf19 = self.has_hardfork(19);
        let mut feeds: Vec<Price> = Vec::with_capacity(wso.current_shuffled_witnesses.len());
        for name in &wso.current_shuffled_witnesses {
            let Some(wit) = self.state.witnesses.find(name) else { continue };
            let fresh = if has_hf19 {
                now < wit.last_eusd_exchange_update + MAX_FEED_AGE_SECONDS
            } else {
                wit.last_eusd_exchange_update < now + MAX_FEED_AGE_SECONDS
            };
            if fresh && !wit.eusd_exchange_rate.is_null() {
                feeds.push(wit.eusd_exchange_rate);
            }
        }

        if feeds.len() < MIN_FEEDS {
            return Ok(());
        }
        feeds.sort_by(|a, b| a.cmp_same_pair(b));
        let median_feed = feeds[feeds.len() / 2];

        let window = if self.has_hardfork(16) {
            FEED_HISTORY_WINDOW
        } else {
            FEED_HISTORY_WINDOW_PRE_HF16
        };
        let has_hf14 = self.has_hardfork(14);
        let gpo = self.state.gpo().clone();
        self.state.modify_feed(|fho| {
            fho.price_history.push_back(median_feed);
            if fho.price_history.len() > window {
                fho.price_history.pop_front();
            }

            if !fho.price_history.is_empty() {
                let mut copy: Vec<Price> = fho.price_history.iter().copied().collect();
                copy.sort_by(|a, b| a.cmp_same_pair(b));
                fho.current_median_history = copy[copy.len() / 2];

                if has_hf14 {
                    // Cap EUSD at 10% of market cap by flooring the price.
                    let min_price = Price::new(
                        Asset::eusd(9 * gpo.current_eusd_supply.amount),
                        gpo.current_supply,
                    );
                    if min_price.cmp_same_pair(&fho.current_median_history).is_gt() {
                        fho.current_median_history = min_price;
                    }
                }
            }
        });
        Ok(())
    }

    pub(crate) fn update_virtual_supply(&mut self) -> Result<(), ChainError> {
        let median = self.feed_median();
        let has_hf14 = self.has_hardfork(14);
        self.state.modify_gpo(|dgp| {
            dgp.virtual_supply = dgp.current_supply
                + if median.is_null() {
                    Asset::ember(0)
                } else {
                    dgp.current_eusd_supply * median
                };

            if !median.is_null() && has_hf14 {
                let eusd_in_ember = (dgp.current_eusd_supply * median).amount;
                dgp.eusd_print_rate = eusd_print_rate(eusd_in_ember, dgp.virtual_supply.amount);
            }
        });
        Ok(())
    }

    pub(crate) fn clear_null_account_balance(&mut self) -> Result<(), ChainError> {
        if !self.has_hardfork(14) {
            return Ok(());
        }

        let null = AccountName::new(NULL_ACCOUNT).expect("reserved name is valid");
        let account = self.state.get_account(&null)?.clone();
        let mut total_ember = Asset::ember(0);
        let mut total_eusd = Asset::eusd(0);

        if account.balance.amount > 0 {
            total_ember += account.balance;
            self.adjust_balance(&null, -account.balance)?;
        }
        if account.savings_balance.amount > 0 {
            total_ember += account.savings_balance;
            self.adjust_savings_balance(&null, -account.savings_balance)?;
        }
        if account.eusd_balance.amount > 0 {
            total_eusd += account.eusd_balance;
            self.adjust_balance(&null, -account.eusd_balance)?;
        }
        if account.savings_eusd_balance.amount > 0 {
            total_eusd += account.savings_eusd_balance;
            self.adjust_savings_balance(&null, -account.savings_eusd_balance)?;
        }
        if account.vesting_shares.amount > 0 {
            let gpo = self.state.gpo().clone();
            let converted = account.vesting_shares * gpo.vesting_share_price();
            self.state.modify_gpo(|g| {
                g.total_vesting_shares -= account.vesting_shares;
                g.total_vesting_fund_ember -= converted;
            });
            self.state.accounts.modify(&null, |a| a.vesting_shares = Asset::vests(0))?;
            total_ember += converted;
        }
        if account.reward_ember_balance.amount > 0 {
            total_ember += account.reward_ember_balance;
            self.adjust_reward_balance(&null, -account.reward_ember_balance)?;
        }
        if account.reward_eusd_balance.amount > 0 {
            total_eusd += account.reward_eusd_balance;
            self.adjust_reward_balance(&null, -account.reward_eusd_balance)?;
        }
        if account.reward_vesting_balance.amount > 0 {
            total_ember += account.reward_vesting_ember;
            let shares = account.reward_vesting_balance;
            let in_ember = account.reward_vesting_ember;
            self.state.modify_gpo(|g| {
                g.pending_rewarded_vesting_shares -= shares;
                g.pending_rewarded_vesting_ember -= in_ember;
            });
            self.state.accounts.modify(&null, |a| {
                a.reward_vesting_balance = Asset::vests(0);
                a.reward_vesting_ember = Asset::ember(0);
            })?;
        }

        if total_ember.amount > 0 {
            self.adjust_supply(-total_ember, false)?;
        }
        if total_eusd.amount > 0 {
            self.adjust_supply(-total_eusd, false)?;
        }
        Ok(())
    }

    /// Split this block's issuance: content funds, the vesting fund, and the
    /// producer, weighted by slot type.
    pub(crate) fn process_funds(&mut self) -> Result<(), ChainError> {
        let gpo = self.state.gpo().clone();
        let wso = self.state.schedule().clone();

        if self.has_hardfork(16) {
            let new_ember =
                inflation_per_block(gpo.virtual_supply.amount, gpo.head_block_number);

            let mut content_reward =
                new_ember * i64::from(CONTENT_REWARD_PERCENT) / i64::from(PERCENT_100);
            if self.has_hardfork(17) {
                content_reward = self.pay_reward_funds(content_reward)?;
            }
            let vesting_reward = new_ember * i64::from(ec_chain_params::VESTING_FUND_PERCENT)
                / i64::from(PERCENT_100);
            let mut witness_reward = new_ember - content_reward - vesting_reward;

            let cwit = self.state.get_witness(&gpo.current_witness)?.clone();
            witness_reward *= MAX_WITNESSES as i64;
            witness_reward *= match cwit.schedule {
                WitnessScheduleSlot::Timeshare => i64::from(wso.timeshare_weight),
                WitnessScheduleSlot::Top | WitnessScheduleSlot::Miner => {
                    i64::from(wso.elected_weight)
                }
            };
            witness_reward /= i64::from(wso.witness_pay_normalization_factor);

            let new_ember = content_reward + vesting_reward + witness_reward;

            let has_hf17 = self.has_hardfork(17);
            self.state.modify_gpo(|p| {
                p.total_vesting_fund_ember += Asset::ember(vesting_reward);
                if !has_hf17 {
                    p.total_reward_fund_ember += Asset::ember(content_reward);
                }
                p.current_supply += Asset::ember(new_ember);
                p.virtual_supply += Asset::ember(new_ember);
            });

            let producer_reward =
                self.create_vesting(&cwit.owner, Asset::ember(witness_reward), false)?;
            self.push_virtual_operation(VirtualOperation::ProducerReward {
                producer: cwit.owner,
                vesting_shares: producer_reward,
            });
        } else {
            // Legacy APR issuance, all denominated against virtual supply.
            let content_reward = legacy_apr_reward_per_block(
                gpo.virtual_supply.amount,
                ec_chain_params::CONTENT_APR_PERCENT,
            )
            .max(ec_chain_params::MIN_CONTENT_REWARD.amount);
            let curate_reward = legacy_apr_reward_per_block(
                gpo.virtual_supply.amount,
                ec_chain_params::CURATE_APR_PERCENT,
            )
            .max(ec_chain_params::MIN_CURATE_REWARD.amount);
            let witness_pay = self.legacy_producer_reward()?;

            let mut vesting_reward = content_reward + curate_reward + witness_pay;
            if gpo.head_block_number < START_VESTING_BLOCK {
                vesting_reward = 0;
            } else {
                vesting_reward *= 9;
            }

            self.state.modify_gpo(|p| {
                p.total_vesting_fund_ember += Asset::ember(vesting_reward);
                p.total_reward_fund_ember += Asset::ember(content_reward + curate_reward);
                p.current_supply +=
                    Asset::ember(content_reward + curate_reward + witness_pay + vesting_reward);
                p.virtual_supply +=
                    Asset::ember(content_reward + curate_reward + witness_pay + vesting_reward);
            });
        }
        Ok(())
    }

    fn legacy_producer_reward(&mut self) -> Result<i64, ChainError> {
        let gpo = self.state.gpo().clone();
        let pay = legacy_apr_reward_per_block(
            gpo.virtual_supply.amount,
            ec_chain_params::PRODUCER_APR_PERCENT,
        )
        .max(ec_chain_params::MIN_PRODUCER_REWARD.amount);

        let witness_account = gpo.current_witness.clone();
        let vesting_balance = self.state.get_account(&witness_account)?.vesting_shares;
        if gpo.head_block_number >= ec_chain_params::START_MINER_VOTING_BLOCK
            || vesting_balance.amount == 0
        {
            let producer_reward =
                self.create_vesting(&witness_account, Asset::ember(pay), false)?;
            self.push_virtual_operation(VirtualOperation::ProducerReward {
                producer: witness_account,
                vesting_shares: producer_reward,
            });
        } else {
            self.state
                .accounts
                .modify(&witness_account, |a| a.balance += Asset::ember(pay))?;
        }
        Ok(pay)
    }

    /// Distribute a block's content reward over the configured funds.
    pub(crate) fn pay_reward_funds(&mut self, reward: i64) -> Result<i64, ChainError> {
        let mut used_rewards = 0i64;
        for name in self.state.reward_funds.ids() {
            let percent = self.state.reward_funds.get(&name)?.percent_content_rewards;
            let r = reward * i64::from(percent) / i64::from(PERCENT_100);
            self.state
                .reward_funds
                .modify(&name, |rfo| rfo.reward_balance += Asset::ember(r))?;
            used_rewards += r;
            assert!(used_rewards <= reward, "reward funds overdrew the block issuance");
        }
        Ok(used_rewards)
    }

    /// Fill due conversion requests at the current median.
    pub(crate) fn process_conversions(&mut self) -> Result<(), ChainError> {
        let now = self.head_block_time();
        let median = self.feed_median();
        if median.is_null() {
            return Ok(());
        }

        let mut net_eusd = Asset::eusd(0);
        let mut net_ember = Asset::ember(0);

        while let Some((date, id)) = self.state.convert_requests.first_by_key().cloned() {
            if date > now {
                break;
            }
            let request = self.state.convert_requests.remove(&id)?;
            let amount_to_issue = request.amount * median;

            self.adjust_balance(&request.owner, amount_to_issue)?;
            net_eusd += request.amount;
            net_ember += amount_to_issue;

            self.push_virtual_operation(VirtualOperation::FillConvertRequest {
                owner: request.owner,
                request_id: request.request_id,
                amount_in: request.amount,
                amount_out: amount_to_issue,
            });
        }

        if net_eusd.amount > 0 {
            let eusd_in_ember = net_eusd * median;
            self.state.modify_gpo(|p| {
                p.current_supply += net_ember;
                p.current_eusd_supply -= net_eusd;
                p.virtual_supply += net_ember;
                p.virtual_supply -= eusd_in_ember;
            });
        }
        Ok(())
    }

    /// Pay due weekly vesting tranches, split across withdraw routes.
    pub(crate) fn process_vesting_withdrawals(&mut self) -> Result<(), ChainError> {
        let now = self.head_block_time();

        loop {
            let due = self
                .state
                .accounts
                .first_by_key()
                .filter(|(when, _)| *when <= now)
                .map(|(_, name)| name.clone());
            let Some(from_name) = due else { break };

            let from_account = self.state.get_account(&from_name)?.clone();
            let cprops = self.state.gpo().clone();

            let to_withdraw = if from_account.to_withdraw - from_account.withdrawn
                < from_account.vesting_withdraw_rate.amount
            {
                from_account
                    .vesting_shares
                    .amount
                    .min(from_account.to_withdraw % from_account.vesting_withdraw_rate.amount.max(1))
            } else {
                from_account
                    .vesting_shares
                    .amount
                    .min(from_account.vesting_withdraw_rate.amount)
            };

            let mut deposited_as_ember = 0i64;
            let mut deposited_as_vests = 0i64;

            let routes: Vec<_> = self
                .state
                .withdraw_routes
                .range((from_name.clone(), AccountName::none())..)
                .take_while(|r| r.from_account == from_name)
                .cloned()
                .collect();

            // Vesting-preserving routes first, for share-price accuracy.
            for route in routes.iter().filter(|r| r.auto_vest) {
                let to_deposit = ((i128::from(to_withdraw) * i128::from(route.percent))
                    / i128::from(PERCENT_100)) as i64;
                deposited_as_vests += to_deposit;
                if to_deposit > 0 {
                    self.state.accounts.modify(&route.to_account, |a| {
                        a.vesting_shares += Asset::vests(to_deposit);
                    })?;
                    self.adjust_proxied_witness_votes_scalar(&route.to_account, i128::from(to_deposit))?;
                    self.push_virtual_operation(VirtualOperation::FillVestingWithdraw {
                        from_account: from_name.clone(),
                        to_account: route.to_account.clone(),
                        withdrawn: Asset::vests(to_deposit),
                        deposited: Asset::vests(to_deposit),
                    });
                }
            }

            for route in routes.iter().filter(|r| !r.auto_vest) {
                let to_deposit = ((i128::from(to_withdraw) * i128::from(route.percent))
                    / i128::from(PERCENT_100)) as i64;
                deposited_as_ember += to_deposit;
                let converted = Asset::vests(to_deposit) * cprops.vesting_share_price();
                if to_deposit > 0 {
                    self.state
                        .accounts
                        .modify(&route.to_account, |a| a.balance += converted)?;
                    self.state.modify_gpo(|o| {
                        o.total_vesting_fund_ember -= converted;
                        o.total_vesting_shares -= Asset::vests(to_deposit);
                    });
                    self.push_virtual_operation(VirtualOperation::FillVestingWithdraw {
                        from_account: from_name.clone(),
                        to_account: route.to_account.clone(),
                        withdrawn: Asset::vests(to_deposit),
                        deposited: converted,
                    });
                }
            }

            let to_convert = to_withdraw - deposited_as_ember - deposited_as_vests;
            assert!(to_convert >= 0, "withdrew more shares than the tranche");
            let converted_ember = Asset::vests(to_convert) * cprops.vesting_share_price();

            self.state.accounts.modify(&from_name, |a| {
                a.vesting_shares -= Asset::vests(to_withdraw);
                a.balance += converted_ember;
                a.withdrawn += to_withdraw;

                if a.withdrawn >= a.to_withdraw || a.vesting_shares.amount == 0 {
                    a.vesting_withdraw_rate.amount = 0;
                    a.next_vesting_withdrawal = TimePointSec::MAX;
                } else {
                    a.next_vesting_withdrawal =
                        a.next_vesting_withdrawal + VESTING_WITHDRAW_INTERVAL_SECONDS;
                }
            })?;

            self.state.modify_gpo(|o| {
                o.total_vesting_fund_ember -= converted_ember;
                o.total_vesting_shares -= Asset::vests(to_convert);
            });

            if to_withdraw > 0 {
                self.adjust_proxied_witness_votes_scalar(&from_name, -i128::from(to_withdraw))?;
            }

            self.push_virtual_operation(VirtualOperation::FillVestingWithdraw {
                from_account: from_name.clone(),
                to_account: from_name.clone(),
                withdrawn: Asset::vests(to_withdraw),
                deposited: converted_ember,
            });
        }
        Ok(())
    }

    pub(crate) fn process_savings_withdraws(&mut self) -> Result<(), ChainError> {
        let now = self.head_block_time();
        while let Some((complete, id)) = self.state.savings_withdraws.first_by_key().cloned() {
            if complete > now {
                break;
            }
            let withdraw = self.state.savings_withdraws.remove(&id)?;
            self.adjust_balance(&withdraw.to, withdraw.amount)?;
            self.state.accounts.modify(&withdraw.from, |a| {
                a.savings_withdraw_requests -= 1;
            })?;
            self.push_virtual_operation(VirtualOperation::FillTransferFromSavings {
                from: withdraw.from,
                to: withdraw.to,
                amount: withdraw.amount,
                request_id: withdraw.request_id,
                memo: withdraw.memo,
            });
        }
        Ok(())
    }

    /// Hourly market-maker payout; retired by HF12.
    pub(crate) fn pay_liquidity_reward(&mut self) -> Result<(), ChainError> {
        if self.has_hardfork(12) {
            return Ok(());
        }
        if self.head_block_num() % LIQUIDITY_REWARD_BLOCKS != 0 {
            return Ok(());
        }

        let gpo = self.state.gpo().clone();
        let reward = Asset::ember(
            legacy_apr_reward_per_block(gpo.virtual_supply.amount, LIQUIDITY_APR_PERCENT)
                .max(MIN_LIQUIDITY_REWARD.amount),
        );
        if reward.amount == 0 {
            return Ok(());
        }

        // Highest weight wins; ties resolve by owner ascending.
        let best = self
            .state
            .liquidity_rewards
            .iter()
            .filter(|r| r.weight > 0)
            .max_by(|a, b| a.weight.cmp(&b.weight).then_with(|| b.owner.cmp(&a.owner)))
            .map(|r| r.owner.clone());

        if let Some(owner) = best {
            let now = self.head_block_time();
            self.adjust_supply(reward, true)?;
            self.adjust_balance(&owner, reward)?;
            self.state.liquidity_rewards.modify(&owner, |obj| {
                obj.ember_volume = 0;
                obj.eusd_volume = 0;
                obj.last_update = now;
                obj.weight = 0;
            })?;
            self.push_virtual_operation(VirtualOperation::LiquidityReward { owner, payout: reward });
        }
        Ok(())
    }

    /// Apply recovery-account changes whose waiting period has elapsed.
    pub(crate) fn account_recovery_processing(&mut self) -> Result<(), ChainError> {
        let now = self.head_block_time();
        while let Some((effective_on, id)) = self.state.change_recovery_requests.first_by_key().cloned()
        {
            if effective_on > now {
                break;
            }
            let request = self.state.change_recovery_requests.remove(&id)?;
            self.state.accounts.modify(&request.account_to_recover, |a| {
                a.recovery_account = request.recovery_account.clone();
            })?;
        }
        Ok(())
    }

    /// Refund escrows that missed their ratification deadline.
    pub(crate) fn expire_escrow_ratification(&mut self) -> Result<(), ChainError> {
        let now = self.head_block_time();
        loop {
            let due = self
                .state
                .escrows
                .index_from(Bound::Unbounded)
                .next()
                .filter(|((approved, deadline), _)| !approved && *deadline <= now)
                .map(|(_, id)| id.clone());
            let Some(id) = due else { break };

            let old_escrow = self.state.escrows.remove(&id)?;
            self.adjust_balance(&old_escrow.from, old_escrow.ember_balance)?;
            self.adjust_balance(&old_escrow.from, old_escrow.eusd_balance)?;
            self.adjust_balance(&old_escrow.from, old_escrow.pending_fee)?;
        }
        Ok(())
    }

    pub(crate) fn process_decline_voting_rights(&mut self) -> Result<(), ChainError> {
        let now = self.head_block_time();
        while let Some((effective, id)) = self.state.decline_voting_requests.first_by_key().cloned()
        {
            if effective > now {
                break;
            }
            let request = self.state.decline_voting_requests.remove(&id)?;
            let account = self.state.get_account(&request.account)?.clone();

            // Remove all standing votes, direct and proxied.
            let mut delta = [0i128; ec_chain_params::MAX_PROXY_RECURSION_DEPTH + 1];
            delta[0] = -i128::from(account.vesting_shares.amount);
            for (i, proxied) in account.proxied_vsf_votes.iter().enumerate() {
                delta[i + 1] = -proxied;
            }
            self.adjust_proxied_witness_votes(&account.name, &delta, 0)?;
            self.clear_witness_votes(&account.name)?;

            self.state.accounts.modify(&request.account, |a| {
                a.can_vote = false;
                a.proxy = AccountName::none();
            })?;
        }
        Ok(())
    }

    pub(crate) fn feed_median(&self) -> Price {
        self.state.feed_history().current_median_history
    }

    pub(crate) fn get_curation_rewards_percent(&self, fund_name: &str) -> Result<u16, ChainError> {
        if self.has_hardfork(17) {
            Ok(self.state.reward_funds.get(&fund_name.to_string())?.percent_curation_rewards)
        } else if self.has_hardfork(8) {
            Ok(25 * ec_chain_params::PERCENT_1)
        } else {
            Ok(50 * ec_chain_params::PERCENT_1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::select_irreversible;

    #[test]
    fn test_threshold_selection_matches_round_of_21() {
        // 21 witnesses confirming 1..=21: offset 5, sixth smallest is 6.
        let confirmed: Vec<u32> = (1..=21).collect();
        assert_eq!(select_irreversible(confirmed), 6);
    }

    #[test]
    fn test_threshold_selection_examples() {
        assert_eq!(select_irreversible(vec![2, 2, 1, 1, 1, 2, 2, 2, 2, 2]), 2);
        assert_eq!(select_irreversible(vec![1, 1, 1, 1, 1, 1, 1, 2, 2, 2]), 1);
        assert_eq!(select_irreversible(vec![3; 10]), 3);
        assert_eq!(select_irreversible(Vec::new()), 0);
    }

    #[test]
    fn test_single_witness_confirms_immediately() {
        assert_eq!(select_irreversible(vec![42]), 42);
    }
}
