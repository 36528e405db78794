use ec_chain_params::{
    HARDFORK_REQUIRED_WITNESSES, MAX_TIMESHARE_WITNESSES, MAX_VOTED_WITNESSES,
    VIRTUAL_SCHEDULE_LAP_LENGTH2,
};
use ec_state_store::{StateStore, WitnessScheduleSlot};
use shared_types::{AccountName, ProtocolVersion};
use std::collections::BTreeMap;
use tracing::info;

/// Zero every witness's virtual schedule position and restart the lap from
/// virtual time zero. Run when the lap counter would overflow, and as the
/// HF4 migration.
pub fn reset_virtual_schedule_time(state: &mut StateStore) {
    state.modify_schedule(|wso| wso.current_virtual_time = 0);

    for owner in state.witnesses.ids() {
        let votes = state.witnesses.get(&owner).expect("witness listed").votes;
        state
            .witnesses
            .modify(&owner, |w| {
                w.virtual_position = 0;
                w.virtual_last_update = 0;
                w.virtual_scheduled_time =
                    VIRTUAL_SCHEDULE_LAP_LENGTH2 / (votes as u128 + 1);
            })
            .expect("witness listed");
    }
}

/// Tally scheduled witnesses' running versions and hardfork votes.
///
/// The majority version is the highest version at least
/// `HARDFORK_REQUIRED_WITNESSES` of the round are running at or above. A
/// hardfork vote shared by that many witnesses arms the hardfork processor.
pub fn update_majority_version(state: &mut StateStore) {
    let wso = state.schedule().clone();

    let mut versions: BTreeMap<ProtocolVersion, usize> = BTreeMap::new();
    let mut hf_votes: BTreeMap<(ProtocolVersion, shared_types::TimePointSec), usize> =
        BTreeMap::new();

    for name in &wso.current_shuffled_witnesses {
        let Some(wit) = state.witnesses.find(name) else { continue };
        *versions.entry(wit.running_version).or_insert(0) += 1;
        if wit.hardfork_version_vote != ProtocolVersion::default() {
            *hf_votes
                .entry((wit.hardfork_version_vote, wit.hardfork_time_vote))
                .or_insert(0) += 1;
        }
    }

    // Highest version with a supermajority running it or something newer.
    let mut majority = wso.majority_version;
    let mut at_or_above = 0usize;
    for (version, count) in versions.iter().rev() {
        at_or_above += count;
        if at_or_above >= HARDFORK_REQUIRED_WITNESSES {
            if *version > majority {
                majority = *version;
            }
            break;
        }
    }

    let mut next_fork: Option<(ProtocolVersion, shared_types::TimePointSec)> = None;
    for ((version, time), count) in &hf_votes {
        if *count >= HARDFORK_REQUIRED_WITNESSES {
            next_fork = Some((*version, *time));
        }
    }

    state.modify_schedule(|w| w.majority_version = majority);
    if let Some((version, time)) = next_fork {
        state.modify_hardforks(|h| {
            h.next_hardfork = version;
            h.next_hardfork_time = time;
        });
        info!(%version, "witness majority armed hardfork");
    }
}

/// Recompute the round at its first block: top-voted slots, the timeshare
/// slot from the virtual schedule, pay weights, majority version, and the
/// deterministic shuffle.
pub fn update_witness_schedule(state: &mut StateStore) {
    let head_block_num = state.head_block_num();
    let wso = state.schedule().clone();
    if head_block_num % u32::from(wso.num_scheduled_witnesses) != 0 {
        return;
    }

    let mut active: Vec<AccountName> = Vec::with_capacity(MAX_VOTED_WITNESSES + 1);

    // Top slots: by votes descending, owner ascending, live keys only.
    let mut by_votes: Vec<(i64, AccountName)> = state
        .witnesses
        .iter()
        .filter(|w| !w.signing_key.is_null())
        .map(|w| (w.votes, w.owner.clone()))
        .collect();
    by_votes.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
    for (_, owner) in by_votes.iter().take(MAX_VOTED_WITNESSES) {
        active.push(owner.clone());
        state
            .witnesses
            .modify(owner, |w| w.schedule = WitnessScheduleSlot::Top)
            .expect("witness listed");
    }

    // Timeshare slots: least virtual_scheduled_time first. Every witness we
    // walk past advances the round's virtual time.
    let mut new_virtual_time = wso.current_virtual_time;
    let mut by_schedule: Vec<(u128, AccountName)> = state
        .witnesses
        .iter()
        .map(|w| (w.virtual_scheduled_time, w.owner.clone()))
        .collect();
    by_schedule.sort();

    let mut processed: Vec<AccountName> = Vec::new();
    let mut selected = 0usize;
    for (scheduled_time, owner) in by_schedule {
        if selected >= MAX_TIMESHARE_WITNESSES {
            break;
        }
        new_virtual_time = scheduled_time;
        processed.push(owner.clone());
        let wit = state.witnesses.get(&owner).expect("witness listed");
        if wit.signing_key.is_null() || active.contains(&owner) {
            continue;
        }
        active.push(owner.clone());
        state
            .witnesses
            .modify(&owner, |w| w.schedule = WitnessScheduleSlot::Timeshare)
            .expect("witness listed");
        selected += 1;
    }

    // Advance processed witnesses one lap; a wrap means the lap counter
    // overflowed and the whole schedule restarts.
    let mut reset_lap = false;
    for owner in &processed {
        let votes = state.witnesses.get(owner).expect("witness listed").votes;
        let next =
            new_virtual_time.wrapping_add(VIRTUAL_SCHEDULE_LAP_LENGTH2 / (votes as u128 + 1));
        if next < new_virtual_time {
            reset_lap = true;
            break;
        }
        state
            .witnesses
            .modify(owner, |w| {
                w.virtual_position = 0;
                w.virtual_scheduled_time = next;
            })
            .expect("witness listed");
    }
    if reset_lap {
        reset_virtual_schedule_time(state);
        new_virtual_time = 0;
    }

    // Pay normalization: the producer-reward divisor for the round.
    let mut normalization: u16 = 0;
    for owner in &active {
        let wit = state.witnesses.get(owner).expect("witness listed");
        normalization += match wit.schedule {
            WitnessScheduleSlot::Timeshare => u16::from(wso.timeshare_weight),
            WitnessScheduleSlot::Top | WitnessScheduleSlot::Miner => {
                u16::from(wso.elected_weight)
            }
        };
    }

    // Deterministic shuffle seeded from head time.
    let now_hi = u64::from(state.head_block_time().secs()) << 32;
    let n = active.len();
    for i in 0..n {
        let mut k = now_hi.wrapping_add((i as u64).wrapping_mul(2_685_821_657_736_338_717));
        k ^= k >> 12;
        k ^= k << 25;
        k ^= k >> 27;
        k = k.wrapping_mul(2_685_821_657_736_338_717);

        let jmax = (n - i) as u64;
        let j = i + (k % jmax) as usize;
        active.swap(i, j);
    }

    let num_scheduled = active.len().max(1) as u8;
    state.modify_schedule(|w| {
        w.current_virtual_time = new_virtual_time;
        w.current_shuffled_witnesses = active.clone();
        w.num_scheduled_witnesses = num_scheduled;
        w.next_shuffle_block_num = head_block_num + u32::from(num_scheduled);
        w.witness_pay_normalization_factor = normalization;
    });

    update_majority_version(state);
}

#[cfg(test)]
mod tests {
    use super::*;
    use ec_state_store::{
        FeedHistory, GlobalProperties, HardforkProperties, Witness, WitnessScheduleState,
    };
    use shared_types::{PublicKey, TimePointSec};

    fn name(s: &str) -> AccountName {
        AccountName::new(s).unwrap()
    }

    fn key(tag: u8) -> PublicKey {
        let mut k = PublicKey::null();
        k.0[0] = 2;
        k.0[1] = tag;
        k
    }

    fn store_with_witnesses(count: u8) -> StateStore {
        let mut state = StateStore::new();
        state
            .globals
            .create(GlobalProperties::genesis(TimePointSec::new(0), 0, name("genesis")))
            .unwrap();
        state.feed.create(FeedHistory::default()).unwrap();
        state.hardfork_props.create(HardforkProperties::default()).unwrap();
        state.witness_schedule.create(WitnessScheduleState::default()).unwrap();

        for i in 0..count {
            let owner = name(&format!("wit{i}"));
            let mut wit = Witness::new(owner, key(i + 1), TimePointSec::new(0));
            wit.votes = i64::from(i) * 100;
            state.witnesses.create(wit).unwrap();
        }
        state
    }

    #[test]
    fn test_round_fills_from_top_votes() {
        let mut state = store_with_witnesses(30);
        update_witness_schedule(&mut state);

        let wso = state.schedule();
        assert_eq!(usize::from(wso.num_scheduled_witnesses), 21);
        // The least-voted witnesses are not in the round (one timeshare slot
        // may admit a low-vote witness).
        let scheduled: Vec<String> = wso
            .current_shuffled_witnesses
            .iter()
            .map(|w| w.to_string())
            .collect();
        let top_miss: usize = (0..9).filter(|i| scheduled.contains(&format!("wit{i}"))).count();
        assert!(top_miss <= 1, "at most the timeshare slot admits a low-vote witness");
    }

    #[test]
    fn test_shuffle_is_deterministic() {
        let mut a = store_with_witnesses(30);
        let mut b = store_with_witnesses(30);
        update_witness_schedule(&mut a);
        update_witness_schedule(&mut b);
        assert_eq!(
            a.schedule().current_shuffled_witnesses,
            b.schedule().current_shuffled_witnesses
        );
    }

    #[test]
    fn test_shutdown_witnesses_are_skipped() {
        let mut state = store_with_witnesses(25);
        // Shut down the strongest witness.
        state
            .witnesses
            .modify(&name("wit24"), |w| w.signing_key = PublicKey::null())
            .unwrap();
        update_witness_schedule(&mut state);
        assert!(!state
            .schedule()
            .current_shuffled_witnesses
            .contains(&name("wit24")));
    }

    #[test]
    fn test_pay_normalization_counts_weights() {
        let mut state = store_with_witnesses(30);
        update_witness_schedule(&mut state);
        // 20 elected at weight 1 plus 1 timeshare at weight 5.
        assert_eq!(state.schedule().witness_pay_normalization_factor, 25);
    }

    #[test]
    fn test_majority_version_needs_supermajority() {
        let mut state = store_with_witnesses(25);
        update_witness_schedule(&mut state);

        // 16 of 21 on the new version: not enough.
        let scheduled = state.schedule().current_shuffled_witnesses.clone();
        for owner in scheduled.iter().take(16) {
            state
                .witnesses
                .modify(owner, |w| w.running_version = ProtocolVersion::new(0, 19, 0))
                .unwrap();
        }
        update_majority_version(&mut state);
        assert_eq!(state.schedule().majority_version, ProtocolVersion::default());

        // The 17th tips it.
        state
            .witnesses
            .modify(&scheduled[16], |w| w.running_version = ProtocolVersion::new(0, 19, 0))
            .unwrap();
        update_majority_version(&mut state);
        assert_eq!(state.schedule().majority_version, ProtocolVersion::new(0, 19, 0));
    }
}
