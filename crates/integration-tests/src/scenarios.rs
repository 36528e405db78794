//! Literal end-to-end scenarios.

use crate::*;
use ec_chain_engine::SkipFlags;
use ec_chain_params::{NUM_INIT_EXTRAS, NUM_INIT_MINERS, POST_REWARD_FUND_NAME};
use ec_reward_math::CurveId;
use ec_state_store::Comment;
use shared_types::operations::PERCENT_100;
use shared_types::{Asset, Price, TimePointSec};

#[test]
fn test_genesis_initialization() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_chain(dir.path());

    assert_eq!(db.state.gpo().current_supply, Asset::ember(INITIAL_SUPPLY));
    assert_eq!(db.head_block_num(), 0);
    assert_eq!(db.last_irreversible_block_num(), 0);

    for reserved in ["genesis", "null", "temp"] {
        assert!(db.state.accounts.contains(&name(reserved)), "{reserved} must exist");
    }

    let count = NUM_INIT_MINERS + NUM_INIT_EXTRAS;
    let each = INITIAL_SUPPLY / count as i64;
    for i in 0..count {
        let account = if i == 0 {
            name("miner")
        } else {
            name(&format!("miner{i}"))
        };
        assert_eq!(
            db.state.get_account(&account).unwrap().balance,
            Asset::ember(each),
            "each mining account holds an equal share"
        );
    }

    db.validate_invariants().unwrap();
}

#[test]
fn test_conservation_on_transfer() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = open_chain(dir.path());
    produce_block(&mut db);

    // Fund a fresh pair of balances: A=1000 via an explicit transfer.
    let trx = transfer(&db, "miner", "miner1", Asset::ember(1_000));
    db.push_transaction(&trx, SkipFlags::NOTHING).unwrap();
    produce_block(&mut db);

    let a_before = db.state.get_account(&name("miner1")).unwrap().balance;
    let b_before = db.state.get_account(&name("miner2")).unwrap().balance;
    let supply_before = db.state.gpo().current_supply;

    let trx = transfer(&db, "miner1", "miner2", Asset::ember(300));
    db.push_transaction(&trx, SkipFlags::NOTHING).unwrap();
    produce_block(&mut db);

    let a_after = db.state.get_account(&name("miner1")).unwrap().balance;
    let b_after = db.state.get_account(&name("miner2")).unwrap().balance;
    assert_eq!(a_after, a_before - Asset::ember(300));
    assert_eq!(b_after, b_before + Asset::ember(300));

    // The transfer itself moved nothing in or out of the supply; the only
    // growth is block issuance, and the invariants hold over it.
    assert!(db.state.gpo().current_supply >= supply_before);
    db.validate_invariants().unwrap();
}

#[test]
fn test_irreversibility_threshold_advance() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = open_chain(dir.path());

    // Drive production until each witness in the 21-round has confirmed at
    // least one block.
    for _ in 0..63 {
        produce_block(&mut db);
    }

    let wso = db.state.schedule().clone();
    assert_eq!(wso.current_shuffled_witnesses.len(), 21);

    let mut confirmations: Vec<u32> = wso
        .current_shuffled_witnesses
        .iter()
        .map(|w| db.state.get_witness(w).unwrap().last_confirmed_block_num)
        .collect();
    confirmations.sort_unstable();

    // offset = floor(25% * 21) = 5: the sixth-smallest confirmation.
    assert_eq!(db.last_irreversible_block_num(), confirmations[5]);
}

#[test]
fn test_reward_payout_consumes_fund() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = open_chain(dir.path());
    produce_block(&mut db);

    let author = name("miner1");
    let now = db.head_block_time();
    let median = Price::new(Asset::eusd(1_000), Asset::ember(1_000));

    // Seed the exact scenario: one comment holding the fund's entire claim
    // (the pre-payout pass contributes evaluate_curve(1000) on its own), a
    // 100 000 EMBER fund that receives no further inflation, quadratic
    // curve, 25% curation with no curators, 50% EUSD split, 1:1 median.
    let fund_name = POST_REWARD_FUND_NAME.to_string();
    let fund_before = db.state.reward_funds.get(&fund_name).unwrap().reward_balance;

    let mut comment = Comment::new(author.clone(), "the-post".into(), now);
    comment.net_rshares = 1_000;
    comment.abs_rshares = 1_000;
    comment.percent_eusd = PERCENT_100 / 2;
    comment.cashout_time = db.get_slot_time(1);
    db.state.comments.create(comment).unwrap();

    db.state
        .reward_funds
        .modify(&fund_name, |rfo| {
            rfo.reward_balance = Asset::ember(100_000);
            rfo.recent_claims = 0;
            rfo.last_update = now;
            rfo.author_reward_curve = CurveId::Quadratic;
            rfo.percent_curation_rewards = 25 * ec_chain_params::PERCENT_1;
            rfo.percent_content_rewards = 0;
        })
        .unwrap();
    // Keep the books balanced for the seeded fund delta.
    let seeded = Asset::ember(100_000) - fund_before;
    db.state.modify_gpo(|g| {
        g.current_supply += seeded;
        g.virtual_supply += seeded;
    });
    db.state.modify_feed(|fho| fho.current_median_history = median);

    produce_block(&mut db);

    // The sole comment consumed the whole fund.
    let fund = db.state.reward_funds.get(&fund_name).unwrap();
    assert_eq!(fund.reward_balance, Asset::ember(0));

    // Author split: 25 000 through the EUSD path at 1:1, 75 000 vested.
    let account = db.state.get_account(&author).unwrap();
    assert_eq!(account.posting_rewards, 100_000);
    assert_eq!(account.reward_eusd_balance, Asset::eusd(25_000));
    assert_eq!(account.reward_vesting_ember, Asset::ember(75_000));

    // The comment reset on payout.
    let paid = db.state.comments.get(&(author, "the-post".into())).unwrap();
    assert_eq!(paid.net_rshares, 0);
    assert_eq!(paid.abs_rshares, 0);
    assert_eq!(paid.total_vote_weight, 0);
    assert_eq!(paid.cashout_time, TimePointSec::MAX);

    db.validate_invariants().unwrap();
}

#[test]
fn test_vesting_deposit_and_withdraw_route() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = open_chain(dir.path());
    produce_block(&mut db);

    let trx = sign(
        &db,
        {
            let mut t = shared_types::SignedTransaction::new(
                db.head_block_time() + 60,
                vec![shared_types::Operation::TransferToVesting {
                    from: name("miner1"),
                    to: shared_types::AccountName::none(),
                    amount: Asset::ember(10_000),
                }],
            );
            t.set_reference_block(&db.head_block_id());
            t
        },
    );
    db.push_transaction(&trx, SkipFlags::NOTHING).unwrap();
    produce_block(&mut db);

    let account = db.state.get_account(&name("miner1")).unwrap();
    assert!(account.vesting_shares.amount > 0);
    db.validate_invariants().unwrap();
}

#[test]
fn test_limit_orders_match_at_the_resting_price() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = open_chain(dir.path());
    produce_block(&mut db);

    // Give miner2 some EUSD to sell: mint via a direct balance seed with a
    // matching supply adjustment so invariants stay true.
    db.state
        .accounts
        .modify(&name("miner2"), |a| a.eusd_balance = Asset::eusd(1_000))
        .unwrap();
    db.state.modify_gpo(|g| g.current_eusd_supply += Asset::eusd(1_000));

    // miner2 rests an order selling 1.000 EUSD for at least 2.000 EMBER.
    let mut t = shared_types::SignedTransaction::new(
        db.head_block_time() + 60,
        vec![shared_types::Operation::LimitOrderCreate {
            owner: name("miner2"),
            order_id: 1,
            amount_to_sell: Asset::eusd(1_000),
            min_to_receive: Asset::ember(2_000),
            fill_or_kill: false,
            expiration: db.head_block_time() + 3_000,
        }],
    );
    t.set_reference_block(&db.head_block_id());
    db.push_transaction(&sign(&db, t), SkipFlags::NOTHING).unwrap();

    // miner1 crosses it, offering 4.000 EMBER for at least 1.000 EUSD.
    let mut t = shared_types::SignedTransaction::new(
        db.head_block_time() + 60,
        vec![shared_types::Operation::LimitOrderCreate {
            owner: name("miner1"),
            order_id: 7,
            amount_to_sell: Asset::ember(4_000),
            min_to_receive: Asset::eusd(1_000),
            fill_or_kill: false,
            expiration: db.head_block_time() + 3_000,
        }],
    );
    t.set_reference_block(&db.head_block_id());
    db.push_transaction(&sign(&db, t), SkipFlags::NOTHING).unwrap();
    produce_block(&mut db);

    // The resting order's price (2 EMBER per EUSD) governs: miner1 paid
    // 2.000 EMBER for the full 1.000 EUSD and keeps a residual order.
    let miner2 = db.state.get_account(&name("miner2")).unwrap();
    assert_eq!(miner2.eusd_balance, Asset::eusd(0));
    assert_eq!(miner2.balance.amount, INITIAL_SUPPLY / 25 + 2_000);

    let miner1 = db.state.get_account(&name("miner1")).unwrap();
    assert_eq!(miner1.eusd_balance, Asset::eusd(1_000));

    let residual = db.state.limit_orders.get(&(name("miner1"), 7)).unwrap();
    assert_eq!(residual.for_sale, 2_000);

    db.validate_invariants().unwrap();
}
