// Expression evaluation.
//
// `evaluate` is a single exhaustive match over `Expression`. It reads the
// world but never mutates it, so conditions can be re-evaluated freely.
// "Nearest" queries measure the straight-line distance between positions
// and break ties by id (units) or coordinate order (cubes and items).

use crate::error::TaskFault;
use crate::task::ast::Expression;
use crate::task::context::{ExecutionContext, Value};
use crate::types::{CubeCoord, ItemKind, Position, TerrainType, UnitId};
use crate::unit::Unit;
use crate::world::World;

pub fn evaluate(world: &World, ctx: &ExecutionContext, expr: &Expression) -> Result<Value, TaskFault> {
    let this = executing_unit(world, ctx)?;
    Ok(match expr {
        Expression::True => Value::Bool(true),
        Expression::False => Value::Bool(false),
        Expression::ReadVariable { name } => ctx.lookup(name)?,

        Expression::This => Value::Unit(this.id()),
        Expression::Friend => Value::Unit(
            nearest_unit(world, this, |u| u.faction() == this.faction())
                .ok_or(TaskFault::NoSuchEntity("friend"))?,
        ),
        Expression::Enemy => Value::Unit(
            nearest_unit(world, this, |u| u.faction() != this.faction())
                .ok_or(TaskFault::NoSuchEntity("enemy"))?,
        ),
        Expression::Any => {
            Value::Unit(nearest_unit(world, this, |_| true).ok_or(TaskFault::NoSuchEntity("unit"))?)
        }

        Expression::Here => Value::Position(this.cube()),
        Expression::LiteralPosition { x, y, z } => Value::Position(CubeCoord::new(*x, *y, *z)),
        Expression::Workshop => Value::Position(
            nearest_cube(
                this.position(),
                world
                    .grid()
                    .coords()
                    .filter(|&c| world.grid().get(c) == TerrainType::Workshop),
            )
            .ok_or(TaskFault::NoSuchEntity("workshop"))?,
        ),
        Expression::Boulder => Value::Position(
            nearest_free_item(world, this.position(), ItemKind::Boulder)
                .ok_or(TaskFault::NoSuchEntity("boulder"))?,
        ),
        Expression::Log => Value::Position(
            nearest_free_item(world, this.position(), ItemKind::Log)
                .ok_or(TaskFault::NoSuchEntity("log"))?,
        ),
        Expression::Selected => {
            Value::Position(ctx.selected().ok_or(TaskFault::NoSuchEntity("selected cube"))?)
        }
        Expression::NextTo { position } => {
            let center = evaluate(world, ctx, position)?.as_position()?;
            Value::Position(
                center
                    .neighbors()
                    .find(|&c| world.grid().is_standable(c))
                    .ok_or(TaskFault::NoSuchEntity("standable neighbouring cube"))?,
            )
        }
        Expression::PositionOf { unit } => {
            let id = evaluate(world, ctx, unit)?.as_unit()?;
            Value::Position(live_unit(world, id)?.cube())
        }

        Expression::IsSolid { position } => {
            let cube = evaluate(world, ctx, position)?.as_position()?;
            Value::Bool(world.terrain_at(cube)?.is_solid())
        }
        Expression::IsPassable { position } => {
            let cube = evaluate(world, ctx, position)?.as_position()?;
            Value::Bool(world.terrain_at(cube)?.is_passable())
        }
        Expression::IsFriend { unit } => {
            let id = evaluate(world, ctx, unit)?.as_unit()?;
            Value::Bool(live_unit(world, id)?.faction() == this.faction())
        }
        Expression::IsEnemy { unit } => {
            let id = evaluate(world, ctx, unit)?.as_unit()?;
            Value::Bool(live_unit(world, id)?.faction() != this.faction())
        }
        Expression::IsAlive { unit } => {
            let id = evaluate(world, ctx, unit)?.as_unit()?;
            Value::Bool(world.unit(id).is_some_and(Unit::is_alive))
        }
        Expression::CarriesItem { unit } => {
            let id = evaluate(world, ctx, unit)?.as_unit()?;
            Value::Bool(live_unit(world, id)?.carried_item().is_some())
        }
        Expression::Not { operand } => Value::Bool(!evaluate(world, ctx, operand)?.as_bool()?),
        Expression::And { left, right } => Value::Bool(
            evaluate(world, ctx, left)?.as_bool()? && evaluate(world, ctx, right)?.as_bool()?,
        ),
        Expression::Or { left, right } => Value::Bool(
            evaluate(world, ctx, left)?.as_bool()? || evaluate(world, ctx, right)?.as_bool()?,
        ),
        Expression::Equals { left, right } => {
            Value::Bool(evaluate(world, ctx, left)? == evaluate(world, ctx, right)?)
        }
    })
}

fn executing_unit<'w>(world: &'w World, ctx: &ExecutionContext) -> Result<&'w Unit, TaskFault> {
    live_unit(world, ctx.unit())
}

fn live_unit(world: &World, id: UnitId) -> Result<&Unit, TaskFault> {
    world
        .unit(id)
        .filter(|u| u.is_alive())
        .ok_or(TaskFault::NoSuchEntity("unit"))
}

fn nearest_unit(world: &World, this: &Unit, accept: impl Fn(&Unit) -> bool) -> Option<UnitId> {
    let origin = this.position();
    world
        .units()
        .filter(|u| u.id() != this.id() && u.is_alive() && accept(u))
        .map(|u| (origin.distance_to(u.position()), u.id()))
        .min_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)))
        .map(|(_, id)| id)
}

fn nearest_cube(origin: Position, cubes: impl Iterator<Item = CubeCoord>) -> Option<CubeCoord> {
    cubes
        .map(|c| (origin.distance_to(c.center()), c))
        .min_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)))
        .map(|(_, c)| c)
}

fn nearest_free_item(world: &World, origin: Position, kind: ItemKind) -> Option<CubeCoord> {
    nearest_cube(
        origin,
        world
            .items()
            .filter(|i| i.kind() == kind && !i.is_carried())
            .map(|i| i.cube()),
    )
}
