#![no_std]

//! Minimal concentrated-liquidity pool: tick-spacing aligned positions,
//! exact-input swaps bounded by a sqrt price limit, settlement done by the
//! pool itself. When a hook address is configured, swaps require the hook's
//! authorization, so trades are forced through the hook contract and its
//! before-swap logic runs ahead of every external swap.

use soroban_sdk::{
    contract, contracterror, contractimpl, contracttype, token::TokenClient, Address, BytesN, Env,
    Symbol, Vec,
};
use stellar_access::ownable::{self, Ownable};
use stellar_contract_utils::pausable::{self, Pausable};
use stellar_macros::{only_owner, when_not_paused};

pub mod math;
pub mod swap_math;
mod tick;

#[cfg(test)]
mod test;

// TTL constants: extend instance storage proactively to prevent archival
const TTL_THRESHOLD: u32 = 17_280; // ~1 day at 5s/ledger
const TTL_EXTEND_TO: u32 = 518_400; // ~30 days

// ─── Storage Keys ────────────────────────────────────────────────

#[contracttype]
#[derive(Clone)]
pub enum DataKey {
    Config,
    Slot0,
    Liquidity,
    Tick(i32),
    TickList,
    Position(PositionKey),
    Initialized,
}

// ─── Types ───────────────────────────────────────────────────────

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PositionKey {
    pub owner: Address,
    pub lower: i32,
    pub upper: i32,
}

#[contracttype]
#[derive(Clone, Debug)]
pub struct PoolConfig {
    pub token0: Address,
    pub token1: Address,
    /// Swap fee in hundredths of a basis point, taken from the input side.
    pub fee_pips: u32,
    pub tick_spacing: i32,
    /// When set, swaps require this contract's authorization.
    pub hook: Option<Address>,
}

#[contracttype]
#[derive(Clone, Debug)]
pub struct Slot0 {
    pub sqrt_price_x96: u128,
    pub tick: i32,
}

/// Signed convention: positive amounts flow into the pool, negative out.
#[contracttype]
#[derive(Clone, Debug, PartialEq)]
pub struct SwapResult {
    pub amount0: i128,
    pub amount1: i128,
    pub sqrt_price_x96: u128,
    pub tick: i32,
    pub liquidity: u128,
}

// ─── Errors ──────────────────────────────────────────────────────

#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum PoolError {
    AlreadyInitialized = 1,
    NotInitialized = 2,
    InvalidTickRange = 3,
    InvalidAmount = 4,
    PriceLimitOutOfRange = 5,
    PositionUnderflow = 6,
}

// ─── Helpers ─────────────────────────────────────────────────────

fn require_initialized(env: &Env) {
    let init: bool = env
        .storage()
        .instance()
        .get(&DataKey::Initialized)
        .unwrap_or(false);
    assert!(init, "Pool not initialized");
}

fn read_config(env: &Env) -> PoolConfig {
    env.storage()
        .instance()
        .get(&DataKey::Config)
        .expect("Config not set")
}

fn read_slot0(env: &Env) -> Slot0 {
    env.storage()
        .instance()
        .get(&DataKey::Slot0)
        .expect("Slot0 not set")
}

fn write_slot0(env: &Env, slot0: &Slot0) {
    env.storage().instance().set(&DataKey::Slot0, slot0);
}

fn read_liquidity(env: &Env) -> u128 {
    env.storage()
        .instance()
        .get(&DataKey::Liquidity)
        .unwrap_or(0u128)
}

fn write_liquidity(env: &Env, liquidity: u128) {
    env.storage().instance().set(&DataKey::Liquidity, &liquidity);
}

fn read_position(env: &Env, key: &PositionKey) -> u128 {
    env.storage()
        .persistent()
        .get(&DataKey::Position(key.clone()))
        .unwrap_or(0u128)
}

fn to_i128(amount: u128) -> i128 {
    i128::try_from(amount).expect("amount overflow")
}

// ─── Contract ────────────────────────────────────────────────────

#[contract]
pub struct ClmmPool;

#[contractimpl]
impl ClmmPool {
    /// One-shot pool setup. `hook`, when present, becomes the mandatory
    /// entrypoint for swaps.
    pub fn initialize(
        env: Env,
        admin: Address,
        token0: Address,
        token1: Address,
        fee_pips: u32,
        tick_spacing: i32,
        sqrt_price_x96: u128,
        hook: Option<Address>,
    ) {
        let already: bool = env
            .storage()
            .instance()
            .get(&DataKey::Initialized)
            .unwrap_or(false);
        assert!(!already, "Already initialized");
        assert!(token0 != token1, "Tokens must be different");
        assert!(tick_spacing > 0, "Invalid tick spacing");
        assert!(fee_pips < swap_math::FEE_DENOMINATOR, "Invalid fee");
        assert!(
            sqrt_price_x96 > math::get_sqrt_ratio_at_tick(math::MIN_TICK)
                && sqrt_price_x96 < math::get_sqrt_ratio_at_tick(math::MAX_TICK),
            "Initial price out of range"
        );

        ownable::set_owner(&env, &admin);

        let config = PoolConfig {
            token0,
            token1,
            fee_pips,
            tick_spacing,
            hook,
        };
        env.storage().instance().set(&DataKey::Config, &config);

        let tick = math::get_tick_at_sqrt_ratio(sqrt_price_x96);
        write_slot0(&env, &Slot0 { sqrt_price_x96, tick });
        write_liquidity(&env, 0);
        env.storage()
            .persistent()
            .set(&DataKey::TickList, &Vec::<i32>::new(&env));
        env.storage().instance().set(&DataKey::Initialized, &true);

        env.events().publish(
            (Symbol::new(&env, "initialized"),),
            (fee_pips, tick_spacing, sqrt_price_x96),
        );
    }

    // ─── Views ───────────────────────────────────────────────────

    pub fn get_config(env: Env) -> PoolConfig {
        require_initialized(&env);
        read_config(&env)
    }

    pub fn get_slot0(env: Env) -> Slot0 {
        require_initialized(&env);
        read_slot0(&env)
    }

    pub fn get_liquidity(env: Env) -> u128 {
        require_initialized(&env);
        read_liquidity(&env)
    }

    pub fn get_position(env: Env, owner: Address, lower: i32, upper: i32) -> u128 {
        require_initialized(&env);
        read_position(&env, &PositionKey { owner, lower, upper })
    }

    // ─── Liquidity ───────────────────────────────────────────────

    /// Add (positive delta) or remove (negative delta) position liquidity.
    /// Owed amounts are pulled from `sender` rounding up; freed amounts are
    /// paid to `recipient` rounding down. Returns signed (amount0, amount1).
    #[when_not_paused]
    pub fn modify_position(
        env: Env,
        sender: Address,
        recipient: Address,
        lower: i32,
        upper: i32,
        liquidity_delta: i128,
    ) -> Result<(i128, i128), PoolError> {
        require_initialized(&env);
        sender.require_auth();
        env.storage().instance().extend_ttl(TTL_THRESHOLD, TTL_EXTEND_TO);

        let config = read_config(&env);
        let lower = math::snap_tick_to_spacing(lower, config.tick_spacing);
        let upper = math::snap_tick_to_spacing(upper, config.tick_spacing);
        if lower >= upper
            || lower < math::min_usable_tick(config.tick_spacing)
            || upper > math::max_usable_tick(config.tick_spacing)
        {
            return Err(PoolError::InvalidTickRange);
        }
        if liquidity_delta == 0 {
            return Err(PoolError::InvalidAmount);
        }

        let key = PositionKey {
            owner: sender.clone(),
            lower,
            upper,
        };
        let held = read_position(&env, &key);
        if liquidity_delta < 0 && held < liquidity_delta.unsigned_abs() {
            return Err(PoolError::PositionUnderflow);
        }
        let updated = math::add_liquidity_delta(held, liquidity_delta);
        if updated == 0 {
            env.storage()
                .persistent()
                .remove(&DataKey::Position(key.clone()));
        } else {
            env.storage()
                .persistent()
                .set(&DataKey::Position(key.clone()), &updated);
        }

        tick::update_tick(&env, lower, liquidity_delta, false);
        tick::update_tick(&env, upper, liquidity_delta, true);

        let slot0 = read_slot0(&env);
        let sqrt_lower = math::get_sqrt_ratio_at_tick(lower);
        let sqrt_upper = math::get_sqrt_ratio_at_tick(upper);
        let adding = liquidity_delta > 0;
        let liq_abs = liquidity_delta.unsigned_abs();

        let (amount0, amount1) = if slot0.tick < lower {
            // price below the range: position is entirely token0
            (
                math::get_amount0_delta(sqrt_lower, sqrt_upper, liq_abs, adding),
                0u128,
            )
        } else if slot0.tick < upper {
            let active = read_liquidity(&env);
            write_liquidity(&env, math::add_liquidity_delta(active, liquidity_delta));
            (
                math::get_amount0_delta(slot0.sqrt_price_x96, sqrt_upper, liq_abs, adding),
                math::get_amount1_delta(sqrt_lower, slot0.sqrt_price_x96, liq_abs, adding),
            )
        } else {
            // price above the range: position is entirely token1
            (
                0u128,
                math::get_amount1_delta(sqrt_lower, sqrt_upper, liq_abs, adding),
            )
        };

        let (delta0, delta1) = if adding {
            (to_i128(amount0), to_i128(amount1))
        } else {
            (-to_i128(amount0), -to_i128(amount1))
        };

        let pool_addr = env.current_contract_address();
        if delta0 > 0 {
            TokenClient::new(&env, &config.token0).transfer(&sender, &pool_addr, &delta0);
        } else if delta0 < 0 {
            TokenClient::new(&env, &config.token0).transfer(&pool_addr, &recipient, &(-delta0));
        }
        if delta1 > 0 {
            TokenClient::new(&env, &config.token1).transfer(&sender, &pool_addr, &delta1);
        } else if delta1 < 0 {
            TokenClient::new(&env, &config.token1).transfer(&pool_addr, &recipient, &(-delta1));
        }

        env.events().publish(
            (Symbol::new(&env, "modify_position"),),
            (sender, lower, upper, liquidity_delta),
        );

        Ok((delta0, delta1))
    }

    // ─── Swap ────────────────────────────────────────────────────

    /// Exact-input swap. Consumes up to `amount_specified` of the input
    /// token, never moving the price past `sqrt_price_limit_x96`.
    #[when_not_paused]
    pub fn swap(
        env: Env,
        sender: Address,
        recipient: Address,
        zero_for_one: bool,
        amount_specified: i128,
        sqrt_price_limit_x96: u128,
    ) -> Result<SwapResult, PoolError> {
        require_initialized(&env);
        sender.require_auth();
        env.storage().instance().extend_ttl(TTL_THRESHOLD, TTL_EXTEND_TO);

        let config = read_config(&env);
        if let Some(hook) = &config.hook {
            hook.require_auth();
        }
        if amount_specified <= 0 {
            return Err(PoolError::InvalidAmount);
        }

        let slot0 = read_slot0(&env);
        let min_sqrt = math::get_sqrt_ratio_at_tick(math::MIN_TICK);
        let max_sqrt = math::get_sqrt_ratio_at_tick(math::MAX_TICK);
        let limit_ok = if zero_for_one {
            sqrt_price_limit_x96 < slot0.sqrt_price_x96 && sqrt_price_limit_x96 > min_sqrt
        } else {
            sqrt_price_limit_x96 > slot0.sqrt_price_x96 && sqrt_price_limit_x96 < max_sqrt
        };
        if !limit_ok {
            return Err(PoolError::PriceLimitOutOfRange);
        }

        let mut sqrt_price = slot0.sqrt_price_x96;
        let mut current_tick = slot0.tick;
        let mut liquidity = read_liquidity(&env);
        let mut remaining = amount_specified as u128;
        let mut total_in: u128 = 0;
        let mut total_out: u128 = 0;

        while remaining > 0 && sqrt_price != sqrt_price_limit_x96 {
            let next_tick = tick::next_initialized_tick(&env, current_tick, zero_for_one)
                .unwrap_or(if zero_for_one {
                    math::MIN_TICK
                } else {
                    math::MAX_TICK
                });
            let next_sqrt = math::get_sqrt_ratio_at_tick(next_tick);
            let target = if zero_for_one {
                next_sqrt.max(sqrt_price_limit_x96)
            } else {
                next_sqrt.min(sqrt_price_limit_x96)
            };

            let step = swap_math::compute_swap_step(
                sqrt_price,
                target,
                liquidity,
                remaining,
                config.fee_pips,
            );
            remaining -= step.amount_in + step.fee_amount;
            total_in += step.amount_in + step.fee_amount;
            total_out += step.amount_out;
            sqrt_price = step.sqrt_price_next_x96;

            if sqrt_price == next_sqrt {
                // transition through the tick, picking up or shedding its net
                if tick::is_initialized(&env, next_tick) {
                    let net = tick::cross_tick(&env, next_tick);
                    let applied = if zero_for_one { -net } else { net };
                    liquidity = math::add_liquidity_delta(liquidity, applied);
                }
                current_tick = if zero_for_one { next_tick - 1 } else { next_tick };
            } else {
                current_tick = math::get_tick_at_sqrt_ratio(sqrt_price);
            }
        }

        write_slot0(
            &env,
            &Slot0 {
                sqrt_price_x96: sqrt_price,
                tick: current_tick,
            },
        );
        write_liquidity(&env, liquidity);

        let consumed = to_i128(total_in);
        let paid_out = to_i128(total_out);
        let (amount0, amount1) = if zero_for_one {
            (consumed, -paid_out)
        } else {
            (-paid_out, consumed)
        };

        let pool_addr = env.current_contract_address();
        let (token_in, token_out) = if zero_for_one {
            (config.token0, config.token1)
        } else {
            (config.token1, config.token0)
        };
        if consumed > 0 {
            TokenClient::new(&env, &token_in).transfer(&sender, &pool_addr, &consumed);
        }
        if paid_out > 0 {
            TokenClient::new(&env, &token_out).transfer(&pool_addr, &recipient, &paid_out);
        }

        env.events().publish(
            (Symbol::new(&env, "swap"),),
            (zero_for_one, amount0, amount1),
        );

        Ok(SwapResult {
            amount0,
            amount1,
            sqrt_price_x96: sqrt_price,
            tick: current_tick,
            liquidity,
        })
    }

    /// Owner upgrades the contract WASM. Requires owner auth.
    #[only_owner]
    pub fn upgrade(env: Env, wasm_hash: BytesN<32>) {
        env.storage()
            .instance()
            .extend_ttl(TTL_THRESHOLD, TTL_EXTEND_TO);
        env.deployer().update_current_contract_wasm(wasm_hash);
    }
}

// Ownable (2-step transfer)
#[contractimpl]
impl Ownable for ClmmPool {
    fn get_owner(e: &Env) -> Option<Address> {
        ownable::get_owner(e)
    }

    fn transfer_ownership(e: &Env, new_owner: Address, live_until_ledger: u32) {
        ownable::transfer_ownership(e, &new_owner, live_until_ledger);
    }

    fn accept_ownership(e: &Env) {
        ownable::accept_ownership(e);
    }

    fn renounce_ownership(e: &Env) {
        ownable::renounce_ownership(e);
    }
}

// Pausable (owner-only)
#[contractimpl]
impl Pausable for ClmmPool {
    fn pause(e: &Env, _caller: Address) {
        ownable::enforce_owner_auth(e);
        pausable::pause(e);
    }

    fn unpause(e: &Env, _caller: Address) {
        ownable::enforce_owner_auth(e);
        pausable::unpause(e);
    }
}
