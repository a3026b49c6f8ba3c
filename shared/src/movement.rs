//! Movement pass for velocity-carrying objects.
//!
//! Velocities are in cells per tick but an object crosses at most one
//! cell boundary per axis per tick; the remainder accumulates in the
//! object's sub-position. Pushes transfer velocity scaled by the mass
//! ratio, and anything moving faster than its strength shatters before
//! it moves.

use glam::{IVec2, Vec2};
use log::{debug, warn};

use crate::generation::ChunkGenerator;
use crate::grid;
use crate::level::Level;
use crate::object::{LevelObject, Movable, ObjectId, ObjectKind};

pub const GROUND_FRICTION: f32 = 1.0;
pub const ICE_FRICTION: f32 = 0.1;
/// Top speed movement input can accelerate to on its own.
pub const WALK_SPEED_CAP: f32 = 0.5;

pub const BOMB_RANGE: f32 = 10.0;
pub const BOMB_FORCE: f32 = 10.0;

/// Run one movement step for a single object.
pub fn tick_movable(level: &mut Level, generator: &mut dyn ChunkGenerator, id: ObjectId) {
    let mut pushable = true;
    process_velocity(level, generator, id, &mut pushable);
}

/// Apply an external impulse, scaled down by the object's mass. Unlike a
/// push this also works on kinds that block pushes, which is how
/// explosions shatter walls.
pub fn add_force(level: &mut Level, id: ObjectId, force: Vec2) {
    let Some(stats) = level.get(id).and_then(|object| object.kind.stats()) else {
        return;
    };
    if let Some(movable) = movable_mut(level, id) {
        movable.velocity += force / stats.mass;
    }
}

/// Accelerate from movement input toward the walking speed cap. Input
/// never pushes a velocity past the cap, but it also never slows an
/// object that external forces drove beyond it.
pub fn add_movement_force(level: &mut Level, id: ObjectId, direction: IVec2) {
    if direction == IVec2::ZERO {
        return;
    }
    let Some(object) = level.get(id) else { return };
    if object.kind.movable().is_none() {
        return;
    }
    let friction = friction_at(level, object.position);
    if let Some(movable) = movable_mut(level, id) {
        movable.velocity.x = accelerate(movable.velocity.x, direction.x, friction.x);
        movable.velocity.y = accelerate(movable.velocity.y, direction.y, friction.y);
    }
}

/// Radial impulse with linear falloff, strongest one cell out from the
/// center. The center cell itself is untouched.
pub fn apply_explosion(level: &mut Level, center: IVec2, range: f32, force: f32) {
    let reach = range.ceil() as i32;
    for y in -reach..=reach {
        for x in -reach..=reach {
            if x == 0 && y == 0 {
                continue;
            }
            let offset = Vec2::new(x as f32, y as f32);
            let distance = offset.length();
            if distance > range {
                continue;
            }
            let impulse = offset / distance * (1.0 - (distance - 1.0) / range) * force;
            let cell = center + IVec2::new(x, y);
            let hit: Vec<ObjectId> = level
                .objects_at(cell)
                .filter(|object| object.kind.stats().is_some())
                .map(|object| object.id)
                .collect();
            for id in hit {
                add_force(level, id, impulse);
            }
        }
    }
}

/// Returns whether the object ended up in a different cell. `pushable`
/// is cleared when the move was blocked by something pushes cannot move.
fn process_velocity(
    level: &mut Level,
    generator: &mut dyn ChunkGenerator,
    id: ObjectId,
    pushable: &mut bool,
) -> bool {
    let Some(id) = resolve_break(level, id) else {
        return false;
    };
    let Some(stats) = level.get(id).and_then(|object| object.kind.stats()) else {
        return false;
    };
    if !stats.can_push {
        if let Some(movable) = movable_mut(level, id) {
            movable.velocity = Vec2::ZERO;
        }
        *pushable = false;
        process_friction(level, id);
        return false;
    }

    let mut step = IVec2::ZERO;
    {
        let Some(movable) = movable_mut(level, id) else {
            return false;
        };
        movable.sub_position += Vec2::new(
            movable.velocity.x.clamp(-1.0, 1.0),
            movable.velocity.y.clamp(-1.0, 1.0),
        );
        if movable.sub_position.x >= 1.0 {
            movable.sub_position.x = 1.0;
            step.x = 1;
        } else if movable.sub_position.x <= -1.0 {
            movable.sub_position.x = -1.0;
            step.x = -1;
        }
        if movable.sub_position.y >= 1.0 {
            movable.sub_position.y = 1.0;
            step.y = 1;
        } else if movable.sub_position.y <= -1.0 {
            movable.sub_position.y = -1.0;
            step.y = -1;
        }
    }

    let mut moved = false;
    if step != IVec2::ZERO {
        moved = try_move(level, generator, id, step, pushable);
        if let Some(movable) = movable_mut(level, id) {
            if moved {
                movable.sub_position -= step.as_vec2();
            } else if !*pushable {
                if step.x != 0 {
                    movable.velocity.x = 0.0;
                }
                if step.y != 0 {
                    movable.velocity.y = 0.0;
                }
            }
        }
    }
    process_friction(level, id);
    moved
}

/// Shatter the object while it moves faster than its strength allows,
/// repeatedly in case the debris is itself too weak. Returns the id to
/// keep processing, or `None` when nothing is left.
fn resolve_break(level: &mut Level, id: ObjectId) -> Option<ObjectId> {
    let mut current = id;
    loop {
        if let Some(movable) = movable_mut(level, current) {
            if movable.velocity.x.is_nan() {
                warn!("Velocity x of {current} was NaN, resetting");
                movable.velocity.x = 0.0;
            }
            if movable.velocity.y.is_nan() {
                warn!("Velocity y of {current} was NaN, resetting");
                movable.velocity.y = 0.0;
            }
        }
        let object = level.get(current)?;
        let Some(stats) = object.kind.stats() else {
            return Some(current);
        };
        let Some(movable) = object.kind.movable() else {
            return Some(current);
        };
        if movable.velocity.length_squared() <= stats.strength * stats.strength {
            return Some(current);
        }
        current = break_object(level, current)?;
    }
}

/// Replace a shattered object with its debris kind in place. Debris gets
/// a fresh id and keeps the velocity state.
fn break_object(level: &mut Level, id: ObjectId) -> Option<ObjectId> {
    let object = level.remove(id)?;
    let name = object.kind.name();
    let Some(debris_kind) = object.kind.broken_kind() else {
        debug!("{name} {id} broke into nothing");
        return None;
    };
    let debris = LevelObject::new(object.position, debris_kind);
    let debris_id = debris.id;
    debug!("{name} {id} broke into {debris_id}");
    level.add(debris);
    // The debris layer slot can be taken, in which case the add was
    // dropped and the object is simply gone.
    if level.get(debris_id).is_none() {
        return None;
    }
    Some(debris_id)
}

fn try_move(
    level: &mut Level,
    generator: &mut dyn ChunkGenerator,
    id: ObjectId,
    step: IVec2,
    pushable: &mut bool,
) -> bool {
    let Some(velocity) = level.get(id).and_then(|object| object.kind.movable()).map(|m| m.velocity)
    else {
        return false;
    };
    if step.x != 0 && step.y != 0 {
        // Diagonal steps resolve as two single-axis legs, each carrying
        // only its axis of the velocity, in random order so neither axis
        // is systematically favored.
        let horizontal = (IVec2::new(step.x, 0), Vec2::new(velocity.x, 0.0));
        let vertical = (IVec2::new(0, step.y), Vec2::new(0.0, velocity.y));
        let (first, second) = if rand::random::<bool>() {
            (horizontal, vertical)
        } else {
            (vertical, horizontal)
        };
        let mut first_pushable = true;
        let mut second_pushable = true;
        let moved_first = try_step(level, generator, id, first.0, first.1, &mut first_pushable);
        let moved_second = try_step(level, generator, id, second.0, second.1, &mut second_pushable);
        *pushable = first_pushable || second_pushable;
        moved_first || moved_second
    } else {
        try_step(level, generator, id, step, velocity, pushable)
    }
}

fn try_step(
    level: &mut Level,
    generator: &mut dyn ChunkGenerator,
    id: ObjectId,
    step: IVec2,
    push_velocity: Vec2,
    pushable: &mut bool,
) -> bool {
    let (position, layer, mass) = match level.get(id) {
        Some(object) => match object.kind.stats() {
            Some(stats) => (object.position, object.layer(), stats.mass),
            None => return false,
        },
        None => return false,
    };
    let target = position + step;
    if let Some(occupant) = level.object_id_at(target, layer) {
        let pushed = try_push(level, generator, occupant, push_velocity, mass, pushable);
        // A failed push can still free the cell when the occupant broke
        // onto its debris layer.
        if !pushed && level.has_object_at(target, layer) {
            return false;
        }
    }
    level.move_object(id, target)
}

/// Transfer velocity into the occupant and let it try to get out of the
/// way. Clears `pushable` when the occupant is something pushes cannot
/// move; blockage deeper down a push chain does not propagate back here.
fn try_push(
    level: &mut Level,
    generator: &mut dyn ChunkGenerator,
    target_id: ObjectId,
    velocity: Vec2,
    pusher_mass: f32,
    pushable: &mut bool,
) -> bool {
    let Some(object) = level.get(target_id) else {
        return false;
    };
    let Some(stats) = object.kind.stats() else {
        *pushable = false;
        return false;
    };
    if !stats.can_push {
        *pushable = false;
        return false;
    }

    if let Some(movable) = movable_mut(level, target_id) {
        movable.velocity += Vec2::new(
            (velocity.x * pusher_mass / stats.mass).clamp(-1.0, 1.0),
            (velocity.y * pusher_mass / stats.mass).clamp(-1.0, 1.0),
        );
    }

    // The pushed object may be shoved into space nothing has loaded yet.
    if let Some((position, heading)) = level
        .get(target_id)
        .and_then(|object| object.kind.movable().map(|m| (object.position, m.velocity)))
    {
        let chunk_size = level.chunk_size();
        let toward = IVec2::new(sign(heading.x) as i32, sign(heading.y) as i32);
        level.load_chunk_at(grid::chunk_at(position, chunk_size), generator);
        level.load_chunk_at(grid::chunk_at(position + toward, chunk_size), generator);
    }

    let mut target_pushable = true;
    process_velocity(level, generator, target_id, &mut target_pushable)
}

fn process_friction(level: &mut Level, id: ObjectId) {
    let Some(object) = level.get(id) else { return };
    if object.kind.movable().is_none() {
        return;
    }
    let friction = friction_at(level, object.position);
    if let Some(movable) = movable_mut(level, id) {
        // Axes at rest lose their cell progress before this pass's
        // friction is applied, not after. An axis friction stops this
        // tick keeps its progress until the next pass.
        if movable.velocity.x == 0.0 {
            movable.sub_position.x = 0.0;
        }
        if movable.velocity.y == 0.0 {
            movable.sub_position.y = 0.0;
        }
        movable.velocity.x -=
            friction.x.clamp(0.0, movable.velocity.x.abs()) * sign(movable.velocity.x);
        movable.velocity.y -=
            friction.y.clamp(0.0, movable.velocity.y.abs()) * sign(movable.velocity.y);
    }
}

fn friction_at(level: &Level, position: IVec2) -> Vec2 {
    if level
        .objects_at(position)
        .any(|object| matches!(object.kind, ObjectKind::Ice))
    {
        Vec2::splat(ICE_FRICTION)
    } else {
        Vec2::splat(GROUND_FRICTION)
    }
}

fn accelerate(velocity: f32, direction: i32, friction: f32) -> f32 {
    let accel = direction as f32 * friction * 2.0;
    if direction > 0 && velocity < WALK_SPEED_CAP {
        (velocity + accel).min(WALK_SPEED_CAP)
    } else if direction < 0 && velocity > -WALK_SPEED_CAP {
        (velocity + accel).max(-WALK_SPEED_CAP)
    } else {
        velocity
    }
}

/// Zero-preserving sign, unlike `f32::signum`.
fn sign(value: f32) -> f32 {
    if value > 0.0 {
        1.0
    } else if value < 0.0 {
        -1.0
    } else {
        0.0
    }
}

fn movable_mut(level: &mut Level, id: ObjectId) -> Option<&mut Movable> {
    level.get_mut(id).and_then(|object| object.kind.movable_mut())
}
