// Statement execution with suspension and resumption.
//
// `run` drives one execution context as far as it can go on the executing
// unit's turn. `Interpreter::exec` is a recursive walk over the statement
// tree that mirrors the context's frame stack: at depth `d`, a frame at
// index `d` means "this statement was already entered, resume it";
// no frame means "enter it fresh".
//
// Entering a statement costs one unit of fuel. When fuel runs out the walk
// unwinds with `Flow::Yield`, leaving the cursor in place, and continues on
// the unit's next turn. An action statement starts the unit's activity,
// pushes `Frame::Action` and unwinds with `Flow::Suspend`; when the unit
// has finished, the walk re-enters the same frame and reads the outcome
// instead of starting the action again.
//
// See also: `context.rs` for the frame stack, `eval.rs` for expressions,
// `behavior.rs` which calls `run` from the per-unit tick loop.

use crate::error::TaskFault;
use crate::task::ast::{Expression, Statement};
use crate::task::context::{ExecutionContext, ExecutionState, Frame, Value};
use crate::task::eval::evaluate;
use crate::types::UnitId;
use crate::unit::ActionOutcome;
use crate::world::World;
use std::sync::Arc;

/// How a statement walk ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Flow {
    Done,
    /// Waiting for an action to finish.
    Suspend,
    /// A `Break` is unwinding towards its loop.
    Break,
    /// Out of fuel for this turn.
    Yield,
}

/// Result of one `run` call.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum RunOutcome {
    Suspended,
    Yielded,
    Completed,
    Failed(TaskFault),
}

/// Advance a context on its unit's turn. Each statement entry spends one
/// unit of `fuel`.
pub(crate) fn run(world: &mut World, ctx: &mut ExecutionContext, fuel: &mut u32) -> RunOutcome {
    let body = Arc::clone(&ctx.body);
    let mut interpreter = Interpreter {
        world,
        unit: ctx.unit(),
        fuel: *fuel,
    };
    let flow = interpreter.exec(ctx, &body, 0);
    *fuel = interpreter.fuel;
    let outcome = match flow {
        Ok(Flow::Done) => RunOutcome::Completed,
        Ok(Flow::Suspend) => RunOutcome::Suspended,
        Ok(Flow::Yield) => RunOutcome::Yielded,
        Ok(Flow::Break) => RunOutcome::Failed(TaskFault::IllegalAction(
            "break outside of a loop".to_string(),
        )),
        Err(fault) => RunOutcome::Failed(fault),
    };
    ctx.state = match outcome {
        RunOutcome::Suspended => ExecutionState::Suspended,
        RunOutcome::Yielded => ExecutionState::Running,
        RunOutcome::Completed => ExecutionState::Completed,
        RunOutcome::Failed(_) => ExecutionState::Failed,
    };
    if ctx.state != ExecutionState::Suspended && ctx.state != ExecutionState::Running {
        ctx.frames.clear();
    }
    outcome
}

struct Interpreter<'w> {
    world: &'w mut World,
    unit: UnitId,
    fuel: u32,
}

fn corrupt_cursor() -> TaskFault {
    TaskFault::IllegalAction("execution cursor does not match the program".to_string())
}

impl Interpreter<'_> {
    fn charge(&mut self) -> bool {
        if self.fuel == 0 {
            false
        } else {
            self.fuel -= 1;
            true
        }
    }

    fn eval(&self, ctx: &ExecutionContext, expr: &Expression) -> Result<Value, TaskFault> {
        evaluate(&*self.world, ctx, expr)
    }

    fn exec(
        &mut self,
        ctx: &mut ExecutionContext,
        stmt: &Statement,
        depth: usize,
    ) -> Result<Flow, TaskFault> {
        let resuming = depth < ctx.frames.len();
        if !resuming && !self.charge() {
            return Ok(Flow::Yield);
        }

        match stmt {
            Statement::Sequence { statements } => {
                if !resuming {
                    ctx.frames.push(Frame::Sequence { next: 0 });
                }
                loop {
                    let Some(&Frame::Sequence { next }) = ctx.frames.get(depth) else {
                        return Err(corrupt_cursor());
                    };
                    let Some(child) = statements.get(next) else {
                        ctx.frames.truncate(depth);
                        return Ok(Flow::Done);
                    };
                    match self.exec(ctx, child, depth + 1)? {
                        Flow::Done => ctx.frames[depth] = Frame::Sequence { next: next + 1 },
                        Flow::Break => {
                            ctx.frames.truncate(depth);
                            return Ok(Flow::Break);
                        }
                        flow => return Ok(flow),
                    }
                }
            }

            Statement::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let take_then = if resuming {
                    match ctx.frames.get(depth) {
                        Some(&Frame::If { then_branch }) => then_branch,
                        _ => return Err(corrupt_cursor()),
                    }
                } else {
                    let holds = self.eval(ctx, condition)?.as_bool()?;
                    if !holds && else_branch.is_none() {
                        return Ok(Flow::Done);
                    }
                    ctx.frames.push(Frame::If { then_branch: holds });
                    holds
                };
                let branch = if take_then {
                    &**then_branch
                } else {
                    else_branch.as_deref().ok_or_else(corrupt_cursor)?
                };
                let flow = self.exec(ctx, branch, depth + 1)?;
                if matches!(flow, Flow::Done | Flow::Break) {
                    ctx.frames.truncate(depth);
                }
                Ok(flow)
            }

            Statement::While { condition, body } => {
                if !resuming {
                    ctx.frames.push(Frame::While { in_body: false });
                }
                loop {
                    let Some(&Frame::While { in_body }) = ctx.frames.get(depth) else {
                        return Err(corrupt_cursor());
                    };
                    if !in_body {
                        if !self.eval(ctx, condition)?.as_bool()? {
                            ctx.frames.truncate(depth);
                            return Ok(Flow::Done);
                        }
                        ctx.frames[depth] = Frame::While { in_body: true };
                    }
                    match self.exec(ctx, body, depth + 1)? {
                        Flow::Done => {
                            ctx.frames[depth] = Frame::While { in_body: false };
                            // Each further iteration costs fuel, so empty
                            // loops cannot spin forever.
                            if !self.charge() {
                                return Ok(Flow::Yield);
                            }
                        }
                        Flow::Break => {
                            ctx.frames.truncate(depth);
                            return Ok(Flow::Done);
                        }
                        flow => return Ok(flow),
                    }
                }
            }

            Statement::Break => Ok(Flow::Break),

            Statement::Assign { name, value } => {
                let value = self.eval(ctx, value)?;
                ctx.bind(name, value);
                Ok(Flow::Done)
            }

            Statement::Print { value } => {
                let value = self.eval(ctx, value)?;
                self.world.record_print(self.unit, ctx.task(), value);
                Ok(Flow::Done)
            }

            action => {
                if resuming {
                    self.finish_action(ctx, depth)
                } else {
                    self.start_action(ctx, action)?;
                    ctx.frames.push(Frame::Action);
                    Ok(Flow::Suspend)
                }
            }
        }
    }

    fn start_action(&mut self, ctx: &ExecutionContext, action: &Statement) -> Result<(), TaskFault> {
        let unit = self.unit;
        match action {
            Statement::MoveTo { position } => {
                let target = self.eval(ctx, position)?.as_position()?;
                self.world.move_to(unit, target)?;
            }
            Statement::MoveToAdjacent { dx, dy, dz } => {
                self.world.move_to_adjacent(unit, *dx, *dy, *dz)?;
            }
            Statement::Work { position } => {
                let target = self.eval(ctx, position)?.as_position()?;
                self.world.work_at(unit, target)?;
            }
            Statement::Attack { unit: target } => {
                let target = self.eval(ctx, target)?.as_unit()?;
                self.world.attack(unit, target)?;
            }
            Statement::Follow { unit: target } => {
                let target = self.eval(ctx, target)?.as_unit()?;
                self.world.follow(unit, target)?;
            }
            Statement::Rest => self.world.rest(unit)?,
            _ => return Err(corrupt_cursor()),
        }
        Ok(())
    }

    fn finish_action(&mut self, ctx: &mut ExecutionContext, depth: usize) -> Result<Flow, TaskFault> {
        if ctx.frames.get(depth) != Some(&Frame::Action) {
            return Err(corrupt_cursor());
        }
        match self.world.take_action_result(self.unit) {
            Some(ActionOutcome::Completed) => {
                ctx.frames.truncate(depth);
                Ok(Flow::Done)
            }
            Some(ActionOutcome::Failed(reason)) => Err(TaskFault::IllegalAction(reason)),
            None => Ok(Flow::Suspend),
        }
    }
}
