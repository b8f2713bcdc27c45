//! Built-in demo programs for exercising the engine from the command line.

use actra_runtime::{EffectCtx, Event, Program, ProgramResult, Value};
use actra_solver::PrimitiveVS;
use std::sync::Arc;

/// First concrete integer held by a summary (0 when empty). Only for
/// variables that are deterministic across paths, such as step counters.
fn int_of(vs: &PrimitiveVS<Value>) -> i64 {
    vs.guarded_values()
        .first()
        .and_then(|(v, _)| v.as_int())
        .unwrap_or(0)
}

/// The boolean summary held in a machine variable, guards intact.
fn bools_of(vs: &PrimitiveVS<Value>) -> PrimitiveVS<bool> {
    let mut out = PrimitiveVS::empty();
    for (v, g) in vs.guarded_values() {
        if let Value::Bool(b) = v {
            out = out.merge(PrimitiveVS::with_guard(*b, g.clone()));
        }
    }
    out
}

/// Value-wise conjunction of two boolean summaries.
fn and_bools(a: &PrimitiveVS<bool>, b: &PrimitiveVS<bool>) -> PrimitiveVS<bool> {
    let mut out = PrimitiveVS::empty();
    for (av, ag) in a.guarded_values() {
        for (bv, bg) in b.guarded_values() {
            let g = ag.and(bg);
            if !g.is_false() {
                out = out.merge(PrimitiveVS::with_guard(*av && *bv, g));
            }
        }
    }
    out
}

/// Ping sends to Pong, Pong answers, for a fixed number of rounds; each
/// round flips a coin deciding whether to stop early.
struct PingPong {
    rounds: i64,
}

impl Program for PingPong {
    fn name(&self) -> &str {
        "pingpong"
    }

    fn main_interface(&self) -> &str {
        "Ping"
    }

    fn on_start(&self, ctx: &mut EffectCtx) -> ProgramResult {
        if ctx.runtime.machine(ctx.self_id).interface == "Ping" {
            ctx.update_var(0, PrimitiveVS::new(Value::Int(0)));
            let pong = ctx.create("Pong");
            ctx.update_var(1, pong.map(|id| Value::Machine(*id)));
            ctx.send(&pong, Event::user("ping"), None);
        }
        Ok(())
    }

    fn on_event(
        &self,
        ctx: &mut EffectCtx,
        event: &Event,
        _payload: Option<&PrimitiveVS<Value>>,
    ) -> ProgramResult {
        match event.name() {
            "ping" => {
                // Pong answers to whoever pinged: the main machine
                let main = PrimitiveVS::new(actra_runtime::MachineId(0));
                ctx.send(&main, Event::user("pong"), None);
                Ok(())
            }
            "pong" => {
                let round = int_of(&ctx.var(0)) + 1;
                ctx.update_var(0, PrimitiveVS::new(Value::Int(round)));
                let done = ctx.choose_bool();
                let stop = done.guard_for_true();
                if round >= self.rounds || !stop.is_false() {
                    ctx.halt();
                } else {
                    let pong = ctx.var(1).map(|v| match v {
                        Value::Machine(id) => *id,
                        _ => actra_runtime::MachineId(0),
                    });
                    ctx.send(&pong, Event::user("ping"), None);
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

/// A ring of machines passing one token around twice.
struct Ring {
    size: usize,
}

impl Program for Ring {
    fn name(&self) -> &str {
        "ring"
    }

    fn main_interface(&self) -> &str {
        "Builder"
    }

    fn on_start(&self, ctx: &mut EffectCtx) -> ProgramResult {
        if ctx.runtime.machine(ctx.self_id).interface != "Builder" {
            return Ok(());
        }
        let mut nodes = Vec::new();
        for _ in 0..self.size {
            nodes.push(ctx.create("Node"));
        }
        // each node learns its successor; the builder kicks off the token
        for (i, node) in nodes.iter().enumerate() {
            let next = &nodes[(i + 1) % nodes.len()];
            ctx.send(
                node,
                Event::user("init"),
                Some(next.map(|id| Value::Machine(*id))),
            );
        }
        ctx.send(
            &nodes[0],
            Event::user("token"),
            Some(PrimitiveVS::new(Value::Int((2 * self.size) as i64))),
        );
        Ok(())
    }

    fn on_event(
        &self,
        ctx: &mut EffectCtx,
        event: &Event,
        payload: Option<&PrimitiveVS<Value>>,
    ) -> ProgramResult {
        match event.name() {
            "init" => {
                if let Some(next) = payload {
                    ctx.update_var(0, next.clone());
                }
                Ok(())
            }
            "token" => {
                let hops = payload.map(int_of).unwrap_or(0);
                if hops <= 0 {
                    ctx.halt();
                    return Ok(());
                }
                let next = ctx.var(0).map(|v| match v {
                    Value::Machine(id) => *id,
                    _ => actra_runtime::MachineId(0),
                });
                ctx.send(
                    &next,
                    Event::user("token"),
                    Some(PrimitiveVS::new(Value::Int(hops - 1))),
                );
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

/// A machine making a few boolean choices, asserting they are not all true.
struct Chooser {
    choices: usize,
}

impl Program for Chooser {
    fn name(&self) -> &str {
        "chooser"
    }

    fn main_interface(&self) -> &str {
        "Main"
    }

    fn on_start(&self, ctx: &mut EffectCtx) -> ProgramResult {
        ctx.update_var(0, PrimitiveVS::new(Value::Int(0)));
        ctx.update_var(1, PrimitiveVS::new(Value::Bool(true)));
        ctx.send_self(Event::user("pick"), None);
        Ok(())
    }

    fn on_event(
        &self,
        ctx: &mut EffectCtx,
        event: &Event,
        _payload: Option<&PrimitiveVS<Value>>,
    ) -> ProgramResult {
        if event.name() != "pick" {
            return Ok(());
        }
        let picked = int_of(&ctx.var(0));
        let coin = ctx.choose_bool();
        // fold the coin into the all-heads summary, guards intact, so the
        // final assertion fires only on the every-coin-true path
        let all_heads = and_bools(&bools_of(&ctx.var(1)), &coin);
        ctx.update_var(1, all_heads.map(|b| Value::Bool(*b)));
        if picked + 1 < self.choices as i64 {
            ctx.update_var(0, PrimitiveVS::new(Value::Int(picked + 1)));
            ctx.send_self(Event::user("pick"), None);
        } else {
            ctx.ensure(
                &all_heads.map(|b| !b),
                "not every coin came up heads",
            )?;
            ctx.halt();
        }
        Ok(())
    }
}

/// Look up a demo program by name.
pub fn demo(name: &str) -> Option<Arc<dyn Program>> {
    match name {
        "pingpong" => Some(Arc::new(PingPong { rounds: 3 })),
        "ring" => Some(Arc::new(Ring { size: 3 })),
        "chooser" => Some(Arc::new(Chooser { choices: 3 })),
        _ => None,
    }
}

pub const DEMO_NAMES: &[&str] = &["pingpong", "ring", "chooser"];
