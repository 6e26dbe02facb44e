//! Host-pool operation funnel.
//!
//! Every mutation the engine performs on the pool goes through one typed
//! descriptor (one variant per host operation) and a single `execute`
//! that performs the invocation. The pool settles token transfers itself,
//! so `execute` also pre-authorizes the exact nested transfers the pool
//! will run against the engine's balance.

use soroban_sdk::{
    auth::{ContractContext, InvokerContractAuthEntry, SubContractInvocation},
    vec, Address, Env, IntoVal, Symbol,
};

use clmm_pool::{math, ClmmPoolClient, Slot0};

use crate::Schedule;

pub enum PoolOp {
    ModifyPosition {
        lower: i32,
        upper: i32,
        liquidity_delta: i128,
        /// Freed tokens go to the schedule owner instead of the engine.
        take_to_owner: bool,
    },
    Swap {
        zero_for_one: bool,
        amount_in: i128,
        sqrt_price_limit_x96: u128,
    },
}

/// Execute one pool operation on the engine's behalf. Returns the signed
/// (amount0, amount1) the pool settled; positive amounts were paid by the
/// engine into the pool.
pub fn execute(env: &Env, schedule: &Schedule, pool: &Address, op: PoolOp) -> (i128, i128) {
    let client = ClmmPoolClient::new(env, pool);
    let engine = env.current_contract_address();
    match op {
        PoolOp::ModifyPosition {
            lower,
            upper,
            liquidity_delta,
            take_to_owner,
        } => {
            if liquidity_delta > 0 {
                let slot0 = client.get_slot0();
                let (owed0, owed1) =
                    amounts_owed(&slot0, lower, upper, liquidity_delta.unsigned_abs());
                authorize_transfer(env, &schedule.token0, pool, owed0);
                authorize_transfer(env, &schedule.token1, pool, owed1);
            }
            let recipient = if take_to_owner {
                schedule.owner.clone()
            } else {
                engine.clone()
            };
            client.modify_position(&engine, &recipient, &lower, &upper, &liquidity_delta)
        }
        PoolOp::Swap {
            zero_for_one,
            amount_in,
            sqrt_price_limit_x96,
        } => {
            let token_in = if zero_for_one {
                schedule.token0.clone()
            } else {
                schedule.token1.clone()
            };
            authorize_transfer(env, &token_in, pool, amount_in);
            let result = client.swap(
                &engine,
                &engine,
                &zero_for_one,
                &amount_in,
                &sqrt_price_limit_x96,
            );
            (result.amount0, result.amount1)
        }
    }
}

// Mirror of the pool's owed-amount computation, needed up front because the
// authorization tree must carry the exact transfer arguments.
fn amounts_owed(slot0: &Slot0, lower: i32, upper: i32, liquidity: u128) -> (i128, i128) {
    let sqrt_lower = math::get_sqrt_ratio_at_tick(lower);
    let sqrt_upper = math::get_sqrt_ratio_at_tick(upper);
    let (amount0, amount1) = if slot0.tick < lower {
        (
            math::get_amount0_delta(sqrt_lower, sqrt_upper, liquidity, true),
            0u128,
        )
    } else if slot0.tick < upper {
        (
            math::get_amount0_delta(slot0.sqrt_price_x96, sqrt_upper, liquidity, true),
            math::get_amount1_delta(sqrt_lower, slot0.sqrt_price_x96, liquidity, true),
        )
    } else {
        (
            0u128,
            math::get_amount1_delta(sqrt_lower, sqrt_upper, liquidity, true),
        )
    };
    (
        i128::try_from(amount0).expect("amount overflow"),
        i128::try_from(amount1).expect("amount overflow"),
    )
}

// Pre-authorize the token transfer the pool executes on the engine's behalf.
// The engine is the direct invoker, so the pool-level require_auth passes on
// its own; only the nested transfer needs an explicit entry.
fn authorize_transfer(env: &Env, token: &Address, pool: &Address, amount: i128) {
    if amount <= 0 {
        return;
    }
    env.authorize_as_current_contract(vec![
        env,
        InvokerContractAuthEntry::Contract(SubContractInvocation {
            context: ContractContext {
                contract: token.clone(),
                fn_name: Symbol::new(env, "transfer"),
                args: vec![
                    env,
                    env.current_contract_address().into_val(env),
                    pool.clone().into_val(env),
                    amount.into_val(env),
                ],
            },
            sub_invocations: vec![env],
        }),
    ]);
}
