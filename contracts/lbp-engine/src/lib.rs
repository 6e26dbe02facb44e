#![no_std]

//! Liquidity bootstrapping engine.
//!
//! Sells a fixed quantity of a sale token over a time window at a linearly
//! decaying price floor. Each epoch the engine widens its single-sided
//! position on the host pool down to the scheduled floor and tops it up with
//! the newly scheduled amount; when the market price still sits inside the
//! shrinking range, the engine first sells into it, pushing the price just
//! past the new floor before reprovisioning.
//!
//! One engine instance serves many pools: all state is keyed by the pool
//! address. The engine registers itself as the pool's hook, so every trader
//! swap routed through [`LbpEngine::swap`] synchronizes the current epoch
//! before it executes.

use soroban_sdk::{
    contract, contracterror, contractimpl, contracttype, token::TokenClient, Address, Env, Symbol,
};

use clmm_pool::{math, ClmmPoolClient, SwapResult};

mod host;
mod orient;
mod schedule;


use host::PoolOp;

// TTL constants: extend instance storage proactively to prevent archival
const TTL_THRESHOLD: u32 = 17_280; // ~1 day at 5s/ledger
const TTL_EXTEND_TO: u32 = 518_400; // ~30 days

// ─── Storage Keys ────────────────────────────────────────────────

#[contracttype]
#[derive(Clone)]
pub enum DataKey {
    Schedule(Address),
    State(Address),
    EpochSynced(Address, u64),
}

// ─── Types ───────────────────────────────────────────────────────

/// Sale parameters, immutable after registration.
///
/// Ticks are canonical: the range the engine reasons about when selling
/// token0. With `is_token0 = false` the on-pool position lives at the
/// negated ticks.
#[contracttype]
#[derive(Clone, Debug)]
pub struct LiquidityInfo {
    pub total_amount: i128,
    pub start_time: u64,
    pub end_time: u64,
    pub min_tick: i32,
    pub max_tick: i32,
    pub is_token0: bool,
}

/// Registered schedule plus the pool wiring cached at registration.
#[contracttype]
#[derive(Clone, Debug)]
pub struct Schedule {
    pub info: LiquidityInfo,
    pub epoch_size: u64,
    pub owner: Address,
    pub token0: Address,
    pub token1: Address,
    pub tick_spacing: i32,
}

/// Per-pool dynamic state.
#[contracttype]
#[derive(Clone, Debug)]
pub struct SyncState {
    /// Cumulative sale tokens committed (placed or force-sold). Monotone
    /// non-decreasing, bounded by `total_amount`.
    pub amount_committed: i128,
    /// Canonical lower bound of the outstanding position. Starts at
    /// `max_tick`, monotone non-increasing, `min_tick` after the window.
    pub current_min_tick: i32,
    /// In-flight guard around engine-initiated swaps, and the permanent
    /// latch after exit.
    pub skip_sync: bool,
}

// ─── Errors ──────────────────────────────────────────────────────

#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum EngineError {
    AlreadyRegistered = 1,
    NotRegistered = 2,
    InvalidTimeRange = 3,
    InvalidTickRange = 4,
    BeforeEndTime = 5,
    Unauthorized = 6,
}

// ─── Helpers ─────────────────────────────────────────────────────

fn read_schedule(env: &Env, pool: &Address) -> Option<Schedule> {
    env.storage().persistent().get(&DataKey::Schedule(pool.clone()))
}

fn read_state(env: &Env, pool: &Address) -> SyncState {
    env.storage()
        .persistent()
        .get(&DataKey::State(pool.clone()))
        .expect("State not set")
}

fn write_state(env: &Env, pool: &Address, state: &SyncState) {
    env.storage()
        .persistent()
        .set(&DataKey::State(pool.clone()), state);
}

fn sale_token(schedule: &Schedule) -> Address {
    if schedule.info.is_token0 {
        schedule.token0.clone()
    } else {
        schedule.token1.clone()
    }
}

/// On-pool ticks of the engine's position for a canonical lower bound,
/// snapped onto the pool's spacing grid the same way the pool snaps them.
fn position_ticks(schedule: &Schedule, lower: i32) -> (i32, i32) {
    let (lower, upper) =
        orient::position_range(schedule.info.is_token0, lower, schedule.info.max_tick);
    (
        math::snap_tick_to_spacing(lower, schedule.tick_spacing),
        math::snap_tick_to_spacing(upper, schedule.tick_spacing),
    )
}

fn to_i128(amount: u128) -> i128 {
    i128::try_from(amount).expect("amount overflow")
}

// ─── Contract ────────────────────────────────────────────────────

#[contract]
pub struct LbpEngine;

#[contractimpl]
impl LbpEngine {
    /// Register a bootstrapping schedule for `pool` and take custody of the
    /// full sale balance. `sender` becomes the schedule owner.
    pub fn after_initialize(
        env: Env,
        sender: Address,
        pool: Address,
        info: LiquidityInfo,
        epoch_size: u64,
    ) -> Result<(), EngineError> {
        sender.require_auth();
        env.storage().instance().extend_ttl(TTL_THRESHOLD, TTL_EXTEND_TO);

        if read_schedule(&env, &pool).is_some() {
            return Err(EngineError::AlreadyRegistered);
        }
        assert!(epoch_size > 0, "Epoch size must be positive");
        assert!(info.total_amount > 0, "Total amount must be positive");

        let now = env.ledger().timestamp();
        if info.start_time > info.end_time || info.end_time < now {
            return Err(EngineError::InvalidTimeRange);
        }

        let pool_config = ClmmPoolClient::new(&env, &pool).get_config();
        if info.min_tick >= info.max_tick
            || info.min_tick < math::min_usable_tick(pool_config.tick_spacing)
            || info.max_tick > math::max_usable_tick(pool_config.tick_spacing)
        {
            return Err(EngineError::InvalidTickRange);
        }

        let schedule = Schedule {
            info: info.clone(),
            epoch_size,
            owner: sender.clone(),
            token0: pool_config.token0,
            token1: pool_config.token1,
            tick_spacing: pool_config.tick_spacing,
        };

        // take custody of the full sale balance up front
        TokenClient::new(&env, &sale_token(&schedule)).transfer(
            &sender,
            &env.current_contract_address(),
            &info.total_amount,
        );

        env.storage()
            .persistent()
            .set(&DataKey::Schedule(pool.clone()), &schedule);
        write_state(
            &env,
            &pool,
            &SyncState {
                amount_committed: 0,
                current_min_tick: info.max_tick,
                skip_sync: false,
            },
        );

        env.events().publish(
            (Symbol::new(&env, "registered"),),
            (pool, sender, info.total_amount),
        );
        Ok(())
    }

    /// Pre-swap guard. Silently does nothing for unregistered pools, before
    /// the schedule starts, while the engine itself is mid-swap, and after
    /// exit; otherwise synchronizes the current epoch.
    pub fn before_swap(env: Env, pool: Address) {
        if read_schedule(&env, &pool).is_none() {
            return;
        }
        run_sync(&env, &pool);
    }

    /// Trader entrypoint: synchronizes the epoch, then forwards the swap to
    /// the pool on the sender's behalf. The pool only accepts swaps carrying
    /// the engine's authorization, so this is the path external trades take.
    pub fn swap(
        env: Env,
        sender: Address,
        pool: Address,
        zero_for_one: bool,
        amount_specified: i128,
        sqrt_price_limit_x96: u128,
    ) -> SwapResult {
        sender.require_auth();
        Self::before_swap(env.clone(), pool.clone());
        ClmmPoolClient::new(&env, &pool).swap(
            &sender,
            &sender,
            &zero_for_one,
            &amount_specified,
            &sqrt_price_limit_x96,
        )
    }

    /// Permissionless epoch synchronization; idempotent within an epoch.
    pub fn sync(env: Env, pool: Address) -> Result<(), EngineError> {
        if read_schedule(&env, &pool).is_none() {
            return Err(EngineError::NotRegistered);
        }
        env.storage().instance().extend_ttl(TTL_THRESHOLD, TTL_EXTEND_TO);
        run_sync(&env, &pool);
        Ok(())
    }

    /// After the window closes, absorb the final epoch, hand the remaining
    /// position to the owner and seal the pool for good.
    pub fn exit(env: Env, pool: Address) -> Result<(), EngineError> {
        let Some(sched) = read_schedule(&env, &pool) else {
            return Err(EngineError::NotRegistered);
        };
        sched.owner.require_auth();
        env.storage().instance().extend_ttl(TTL_THRESHOLD, TTL_EXTEND_TO);

        let now = env.ledger().timestamp();
        if schedule::floor_to_epoch(sched.epoch_size, now) < sched.info.end_time {
            return Err(EngineError::BeforeEndTime);
        }

        run_sync(&env, &pool);

        let mut state = read_state(&env, &pool);
        let (lower, upper) = position_ticks(&sched, state.current_min_tick);
        let engine = env.current_contract_address();
        let held = ClmmPoolClient::new(&env, &pool).get_position(&engine, &lower, &upper);
        if held > 0 {
            host::execute(
                &env,
                &sched,
                &pool,
                PoolOp::ModifyPosition {
                    lower,
                    upper,
                    liquidity_delta: -to_i128(held),
                    take_to_owner: true,
                },
            );
        }

        state.skip_sync = true;
        write_state(&env, &pool, &state);

        env.events()
            .publish((Symbol::new(&env, "exited"),), (pool, sched.owner));
        Ok(())
    }

    /// Owner sweeps engine-held balances accumulated for this pool, e.g.
    /// quote proceeds of forced sells.
    pub fn withdraw(
        env: Env,
        pool: Address,
        token: Address,
        to: Address,
        amount: i128,
    ) -> Result<(), EngineError> {
        let Some(sched) = read_schedule(&env, &pool) else {
            return Err(EngineError::NotRegistered);
        };
        sched.owner.require_auth();
        assert!(amount > 0, "Amount must be positive");

        TokenClient::new(&env, &token).transfer(&env.current_contract_address(), &to, &amount);

        env.events()
            .publish((Symbol::new(&env, "withdraw"),), (token, to, amount));
        Ok(())
    }

    // ─── Views ───────────────────────────────────────────────────

    pub fn get_schedule(env: Env, pool: Address) -> Schedule {
        read_schedule(&env, &pool).expect("Pool not registered")
    }

    pub fn get_state(env: Env, pool: Address) -> SyncState {
        read_state(&env, &pool)
    }

    /// Schedule quote for an arbitrary time, evaluated on the epoch grid:
    /// (cumulative committed target, canonical floor tick).
    pub fn preview_targets(env: Env, pool: Address, at: u64) -> (i128, i32) {
        let sched = read_schedule(&env, &pool).expect("Pool not registered");
        let t = schedule::floor_to_epoch(sched.epoch_size, at);
        if t < sched.info.start_time {
            return (0, sched.info.max_tick);
        }
        (
            schedule::target_amount(&sched.info, t),
            schedule::target_min_tick(&sched.info, t),
        )
    }
}

// ─── Sync state machine ──────────────────────────────────────────

fn run_sync(env: &Env, pool: &Address) {
    let sched = read_schedule(env, pool).expect("Pool not registered");
    let mut state = read_state(env, pool);
    if state.skip_sync {
        return;
    }

    let now = env.ledger().timestamp();
    let t = schedule::floor_to_epoch(sched.epoch_size, now);
    // The epoch grid can floor past start_time; nothing is scheduled yet.
    if t < sched.info.start_time {
        return;
    }
    if env
        .storage()
        .persistent()
        .has(&DataKey::EpochSynced(pool.clone(), t))
    {
        return;
    }

    let target = schedule::target_amount(&sched.info, t);
    let delta = target - state.amount_committed;
    state.amount_committed = target;
    let floor = schedule::target_min_tick(&sched.info, t);

    let slot0 = ClmmPoolClient::new(env, pool).get_slot0();
    if orient::crossed_floor(sched.info.is_token0, slot0.tick, floor) {
        // price still sits inside (or beyond) the shrinking range: it has
        // to be pushed past the new floor before the range can be refilled
        if delta > 0 && orient::floor_clearable(sched.info.is_token0, floor) {
            let sold = force_sell(env, &sched, pool, &mut state, delta, floor);
            if sold < delta {
                reconcile_position(env, &sched, pool, &mut state, delta - sold, floor);
            }
        }
        // placement defers when the book absorbed the full intent or when
        // the floor sits on the pool's edge with no limit tick beyond it;
        // the advanced commitment shrinks the next epoch's delta either way
    } else if delta > 0 || floor != state.current_min_tick {
        reconcile_position(env, &sched, pool, &mut state, delta, floor);
    }

    write_state(env, pool, &state);
    env.storage()
        .persistent()
        .set(&DataKey::EpochSynced(pool.clone(), t), &true);
    env.events().publish(
        (Symbol::new(env, "synced"),),
        (pool.clone(), t, state.amount_committed, state.current_min_tick),
    );
}

/// Sell into the pool until the price clears the new floor or the epoch's
/// intent is consumed. Returns the amount actually sold.
fn force_sell(
    env: &Env,
    sched: &Schedule,
    pool: &Address,
    state: &mut SyncState,
    amount: i128,
    floor: i32,
) -> i128 {
    let token = sale_token(sched);
    let engine = env.current_contract_address();
    let balance_before = TokenClient::new(env, &token).balance(&engine);

    // guard the inner swap; a pre-swap callback landing here must no-op
    state.skip_sync = true;
    write_state(env, pool, state);

    let limit_tick = orient::sell_limit_tick(sched.info.is_token0, floor);
    host::execute(
        env,
        sched,
        pool,
        PoolOp::Swap {
            zero_for_one: sched.info.is_token0,
            amount_in: amount,
            sqrt_price_limit_x96: math::get_sqrt_ratio_at_tick(limit_tick),
        },
    );

    state.skip_sync = false;
    write_state(env, pool, state);

    let balance_after = TokenClient::new(env, &token).balance(&engine);
    let sold = balance_before - balance_after;
    env.events().publish(
        (Symbol::new(env, "force_sell"),),
        (pool.clone(), amount, sold),
    );
    sold
}

/// Close the outstanding position, carry its sale-token balance plus
/// `delta` into the widened range, and reopen there.
///
/// Only ever runs with the price outside both the old and the new range, so
/// the position is single-sided in the sale token throughout. The carry is
/// denominated in tokens, not liquidity units: the same tokens buy a
/// different number of units at a different range.
fn reconcile_position(
    env: &Env,
    sched: &Schedule,
    pool: &Address,
    state: &mut SyncState,
    delta: i128,
    new_floor: i32,
) {
    let is_token0 = sched.info.is_token0;
    let engine = env.current_contract_address();
    let client = ClmmPoolClient::new(env, pool);

    let (old_lower, old_upper) = position_ticks(sched, state.current_min_tick);
    let held = client.get_position(&engine, &old_lower, &old_upper);

    let carried = if held > 0 {
        let sqrt_a = math::get_sqrt_ratio_at_tick(old_lower);
        let sqrt_b = math::get_sqrt_ratio_at_tick(old_upper);
        let amount = if is_token0 {
            math::get_amount0_delta(sqrt_a, sqrt_b, held, false)
        } else {
            math::get_amount1_delta(sqrt_a, sqrt_b, held, false)
        };
        host::execute(
            env,
            sched,
            pool,
            PoolOp::ModifyPosition {
                lower: old_lower,
                upper: old_upper,
                liquidity_delta: -to_i128(held),
                take_to_owner: false,
            },
        );
        amount
    } else {
        0
    };

    let total = carried + u128::try_from(delta).expect("negative delta");
    let (new_lower, new_upper) = position_ticks(sched, new_floor);
    if total > 0 {
        let sqrt_a = math::get_sqrt_ratio_at_tick(new_lower);
        let sqrt_b = math::get_sqrt_ratio_at_tick(new_upper);
        let liquidity = if is_token0 {
            math::get_liquidity_for_amount0(sqrt_a, sqrt_b, total)
        } else {
            math::get_liquidity_for_amount1(sqrt_a, sqrt_b, total)
        };
        if liquidity > 0 {
            host::execute(
                env,
                sched,
                pool,
                PoolOp::ModifyPosition {
                    lower: new_lower,
                    upper: new_upper,
                    liquidity_delta: to_i128(liquidity),
                    take_to_owner: false,
                },
            );
        }
    }

    state.current_min_tick = new_floor;
}
