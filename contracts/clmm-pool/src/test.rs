#![cfg(test)]

use soroban_sdk::{
    contract, contractimpl, contracttype, map, testutils::Address as _, Address, Env, Map,
};

use crate::{math, ClmmPool, ClmmPoolClient, PoolError};

// sqrt(2) * 2^96
const SQRT_RATIO_2_1: u128 = 112045541949572279837463876454;

const ONE: i128 = 1_000_000_000_000_000_000;

// ─── Mock Token (simple SEP-41 subset) ──────────────────────────

#[contracttype]
#[derive(Clone)]
enum MockTokenKey {
    Balances,
}

#[contract]
pub struct MockToken;

#[contractimpl]
impl MockToken {
    pub fn init(env: Env) {
        let balances: Map<Address, i128> = map![&env];
        env.storage().instance().set(&MockTokenKey::Balances, &balances);
    }

    pub fn mint(env: Env, to: Address, amount: i128) {
        let mut balances: Map<Address, i128> =
            env.storage().instance().get(&MockTokenKey::Balances).unwrap();
        let prev = balances.get(to.clone()).unwrap_or(0);
        balances.set(to, prev + amount);
        env.storage().instance().set(&MockTokenKey::Balances, &balances);
    }

    pub fn transfer(env: Env, from: Address, to: Address, amount: i128) {
        // No require_auth in mock — avoids non-root auth issues in cross-contract calls
        let mut balances: Map<Address, i128> =
            env.storage().instance().get(&MockTokenKey::Balances).unwrap();
        let from_bal = balances.get(from.clone()).unwrap_or(0);
        assert!(from_bal >= amount, "insufficient balance");
        balances.set(from, from_bal - amount);
        let to_bal = balances.get(to.clone()).unwrap_or(0);
        balances.set(to, to_bal + amount);
        env.storage().instance().set(&MockTokenKey::Balances, &balances);
    }

    pub fn balance(env: Env, id: Address) -> i128 {
        let balances: Map<Address, i128> =
            env.storage().instance().get(&MockTokenKey::Balances).unwrap();
        balances.get(id).unwrap_or(0)
    }
}

// ─── Test Helpers ───────────────────────────────────────────────

struct TestEnv {
    env: Env,
    pool_id: Address,
    pool: ClmmPoolClient<'static>,
    token0: MockTokenClient<'static>,
    token1: MockTokenClient<'static>,
    admin: Address,
    lp: Address,
    trader: Address,
}

fn setup(fee_pips: u32, tick_spacing: i32, sqrt_price_x96: u128) -> TestEnv {
    let env = Env::default();
    env.mock_all_auths();

    let admin = Address::generate(&env);
    let lp = Address::generate(&env);
    let trader = Address::generate(&env);

    let token0_id = env.register(MockToken, ());
    let token0 = MockTokenClient::new(&env, &token0_id);
    token0.init();
    let token1_id = env.register(MockToken, ());
    let token1 = MockTokenClient::new(&env, &token1_id);
    token1.init();

    let pool_id = env.register(ClmmPool, ());
    let pool = ClmmPoolClient::new(&env, &pool_id);
    pool.initialize(
        &admin,
        &token0_id,
        &token1_id,
        &fee_pips,
        &tick_spacing,
        &sqrt_price_x96,
        &None,
    );

    token0.mint(&lp, &(1_000_000 * ONE));
    token1.mint(&lp, &(1_000_000 * ONE));
    token0.mint(&trader, &(1_000_000 * ONE));
    token1.mint(&trader, &(1_000_000 * ONE));

    TestEnv {
        env,
        pool_id,
        pool,
        token0,
        token1,
        admin,
        lp,
        trader,
    }
}

// ─── Initialization ─────────────────────────────────────────────

#[test]
fn test_initialize_and_views() {
    let t = setup(0, 1, SQRT_RATIO_2_1);
    let slot0 = t.pool.get_slot0();
    assert_eq!(slot0.sqrt_price_x96, SQRT_RATIO_2_1);
    assert_eq!(slot0.tick, 6931);
    assert_eq!(t.pool.get_liquidity(), 0);
    let config = t.pool.get_config();
    assert_eq!(config.fee_pips, 0);
    assert_eq!(config.tick_spacing, 1);
    assert_eq!(config.hook, None);
}

#[test]
#[should_panic(expected = "Already initialized")]
fn test_double_initialize() {
    let t = setup(0, 1, SQRT_RATIO_2_1);
    let other = Address::generate(&t.env);
    t.pool.initialize(
        &t.admin,
        &other,
        &t.pool_id,
        &0,
        &1,
        &SQRT_RATIO_2_1,
        &None,
    );
}

#[test]
#[should_panic(expected = "Invalid tick spacing")]
fn test_initialize_rejects_bad_spacing() {
    let env = Env::default();
    let admin = Address::generate(&env);
    let a = Address::generate(&env);
    let b = Address::generate(&env);
    let pool = ClmmPoolClient::new(&env, &env.register(ClmmPool, ()));
    pool.initialize(&admin, &a, &b, &0, &0, &SQRT_RATIO_2_1, &None);
}

// ─── Positions ──────────────────────────────────────────────────

#[test]
fn test_position_below_range_is_token0_only() {
    let t = setup(0, 1, SQRT_RATIO_2_1);
    let liquidity: i128 = 1_000 * ONE;
    let (amount0, amount1) = t
        .pool
        .modify_position(&t.lp, &t.lp, &15741, &20000, &liquidity);
    assert!(amount0 > 0);
    assert_eq!(amount1, 0);
    assert_eq!(t.token0.balance(&t.pool_id), amount0);
    // out-of-range liquidity is not active
    assert_eq!(t.pool.get_liquidity(), 0);
    assert_eq!(
        t.pool.get_position(&t.lp, &15741, &20000),
        liquidity as u128
    );

    // closing returns the tokens rounded down, never more than paid in
    let (back0, back1) = t
        .pool
        .modify_position(&t.lp, &t.lp, &15741, &20000, &(-liquidity));
    assert!(back0 < 0 && -back0 <= amount0);
    assert_eq!(back1, 0);
    assert_eq!(t.pool.get_position(&t.lp, &15741, &20000), 0);
}

#[test]
fn test_position_above_range_is_token1_only() {
    let t = setup(0, 1, SQRT_RATIO_2_1);
    let (amount0, amount1) = t
        .pool
        .modify_position(&t.lp, &t.lp, &0, &5000, &(1_000 * ONE));
    assert_eq!(amount0, 0);
    assert!(amount1 > 0);
    assert_eq!(t.pool.get_liquidity(), 0);
}

#[test]
fn test_position_straddling_range_takes_both_and_activates() {
    let t = setup(0, 1, SQRT_RATIO_2_1);
    let liquidity: i128 = 1_000 * ONE;
    let (amount0, amount1) = t
        .pool
        .modify_position(&t.lp, &t.lp, &6000, &8000, &liquidity);
    assert!(amount0 > 0 && amount1 > 0);
    assert_eq!(t.pool.get_liquidity(), liquidity as u128);
}

#[test]
fn test_modify_position_validation() {
    let t = setup(0, 60, SQRT_RATIO_2_1);
    assert_eq!(
        t.pool.try_modify_position(&t.lp, &t.lp, &6000, &6000, &ONE),
        Err(Ok(PoolError::InvalidTickRange))
    );
    assert_eq!(
        t.pool.try_modify_position(&t.lp, &t.lp, &6000, &8040, &0),
        Err(Ok(PoolError::InvalidAmount))
    );
    t.pool.modify_position(&t.lp, &t.lp, &6000, &8040, &ONE);
    assert_eq!(
        t.pool
            .try_modify_position(&t.lp, &t.lp, &6000, &8040, &(-2 * ONE)),
        Err(Ok(PoolError::PositionUnderflow))
    );
}

#[test]
fn test_unaligned_ticks_snap_to_spacing() {
    let t = setup(0, 60, SQRT_RATIO_2_1);
    t.pool
        .modify_position(&t.lp, &t.lp, &6001, &8015, &(1_000 * ONE));
    // stored under the snapped boundaries
    assert_eq!(t.pool.get_position(&t.lp, &6000, &7980), 1_000 * ONE as u128);
    assert_eq!(t.pool.get_position(&t.lp, &6001, &8015), 0);
}

// ─── Swaps ──────────────────────────────────────────────────────

#[test]
fn test_swap_moves_price_down_and_settles() {
    let t = setup(0, 1, SQRT_RATIO_2_1);
    t.pool
        .modify_position(&t.lp, &t.lp, &6000, &8000, &(100_000 * ONE));

    let trader0_before = t.token0.balance(&t.trader);
    let trader1_before = t.token1.balance(&t.trader);

    let limit = math::get_sqrt_ratio_at_tick(6000);
    let result = t
        .pool
        .swap(&t.trader, &t.trader, &true, &(10 * ONE), &limit);

    assert!(result.sqrt_price_x96 < SQRT_RATIO_2_1);
    assert!(result.tick <= 6931);
    assert_eq!(result.amount0, 10 * ONE);
    assert!(result.amount1 < 0);
    assert_eq!(t.token0.balance(&t.trader), trader0_before - result.amount0);
    assert_eq!(t.token1.balance(&t.trader), trader1_before + (-result.amount1));
}

#[test]
fn test_swap_moves_price_up() {
    let t = setup(0, 1, SQRT_RATIO_2_1);
    t.pool
        .modify_position(&t.lp, &t.lp, &6000, &8000, &(100_000 * ONE));

    let limit = math::get_sqrt_ratio_at_tick(8000);
    let result = t
        .pool
        .swap(&t.trader, &t.trader, &false, &(10 * ONE), &limit);
    assert!(result.sqrt_price_x96 > SQRT_RATIO_2_1);
    assert_eq!(result.amount1, 10 * ONE);
    assert!(result.amount0 < 0);
}

#[test]
fn test_swap_stops_exactly_at_limit() {
    let t = setup(0, 1, SQRT_RATIO_2_1);
    t.pool
        .modify_position(&t.lp, &t.lp, &6000, &8000, &(1_000 * ONE));

    // enormous input, tight limit: the limit wins
    let limit = math::get_sqrt_ratio_at_tick(6900);
    let result = t
        .pool
        .swap(&t.trader, &t.trader, &true, &(500_000 * ONE), &limit);
    assert_eq!(result.sqrt_price_x96, limit);
    assert_eq!(result.tick, 6900);
    assert!(result.amount0 < 500_000 * ONE);
}

#[test]
fn test_swap_on_empty_pool_slides_to_limit() {
    let t = setup(0, 1, SQRT_RATIO_2_1);
    let limit = math::get_sqrt_ratio_at_tick(2870);
    let result = t.pool.swap(&t.trader, &t.trader, &true, &(10 * ONE), &limit);
    assert_eq!(result.sqrt_price_x96, limit);
    assert_eq!(result.tick, 2870);
    assert_eq!(result.amount0, 0);
    assert_eq!(result.amount1, 0);
}

#[test]
fn test_swap_crosses_below_position_and_deactivates_it() {
    let t = setup(0, 1, SQRT_RATIO_2_1);
    t.pool
        .modify_position(&t.lp, &t.lp, &6000, &8000, &(1_000 * ONE));
    assert_eq!(t.pool.get_liquidity(), 1_000 * ONE as u128);

    let limit = math::get_sqrt_ratio_at_tick(5000);
    let result = t
        .pool
        .swap(&t.trader, &t.trader, &true, &(500_000 * ONE), &limit);
    assert_eq!(result.sqrt_price_x96, limit);
    assert_eq!(result.liquidity, 0);
    assert_eq!(t.pool.get_liquidity(), 0);
    assert_eq!(t.pool.get_slot0().tick, 5000);
}

#[test]
fn test_swap_validation() {
    let t = setup(0, 1, SQRT_RATIO_2_1);
    assert_eq!(
        t.pool
            .try_swap(&t.trader, &t.trader, &true, &0, &math::get_sqrt_ratio_at_tick(0)),
        Err(Ok(PoolError::InvalidAmount))
    );
    // limit on the wrong side of the price
    assert_eq!(
        t.pool.try_swap(
            &t.trader,
            &t.trader,
            &true,
            &ONE,
            &math::get_sqrt_ratio_at_tick(10000)
        ),
        Err(Ok(PoolError::PriceLimitOutOfRange))
    );
    assert_eq!(
        t.pool.try_swap(
            &t.trader,
            &t.trader,
            &false,
            &ONE,
            &math::get_sqrt_ratio_at_tick(0)
        ),
        Err(Ok(PoolError::PriceLimitOutOfRange))
    );
}

#[test]
fn test_swap_with_fee_charges_input() {
    let zero_fee = setup(0, 1, SQRT_RATIO_2_1);
    let with_fee = setup(3000, 1, SQRT_RATIO_2_1);
    for t in [&zero_fee, &with_fee] {
        t.pool
            .modify_position(&t.lp, &t.lp, &6000, &8000, &(100_000 * ONE));
    }
    let limit = math::get_sqrt_ratio_at_tick(6000);
    let free = zero_fee
        .pool
        .swap(&zero_fee.trader, &zero_fee.trader, &true, &(10 * ONE), &limit);
    let taxed = with_fee
        .pool
        .swap(&with_fee.trader, &with_fee.trader, &true, &(10 * ONE), &limit);
    assert!(-taxed.amount1 < -free.amount1);
}

#[test]
#[should_panic]
fn test_pause_blocks_swaps() {
    let t = setup(0, 1, SQRT_RATIO_2_1);
    t.pool.pause(&t.admin);
    let limit = math::get_sqrt_ratio_at_tick(2870);
    t.pool.swap(&t.trader, &t.trader, &true, &ONE, &limit);
}
