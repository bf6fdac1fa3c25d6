//! Vehicle and trip entities and their state machines.
//!
//! Both types are plain data owned by [`crate::simulation::Simulation`] in
//! flat `Vec`s and referenced only by integer index — there is no
//! vehicle<->trip back-reference. A trip never stores which vehicle
//! serves it; callers that need that look it up by scanning vehicles
//! for a matching `trip_index`, which is cheap at the fleet sizes this
//! crate targets.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::city::{City, Direction, Location};

/// Vehicle lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VehiclePhase {
    /// Idle, not serving a trip.
    P1,
    /// En route to a pickup.
    P2,
    /// Carrying a rider, en route to the dropoff.
    P3,
}

#[derive(Debug, Clone)]
pub struct Vehicle {
    pub index: usize,
    pub location: Location,
    pub direction: Direction,
    pub phase: VehiclePhase,
    /// `None` iff `phase == P1`.
    pub trip_index: Option<usize>,
    pub pickup_location: Option<Location>,
    pub dropoff_location: Option<Location>,
    /// A trip queued onto this vehicle while still P3 on its current
    /// trip, to start the moment it drops off (forward dispatch).
    pub forward_dispatch_trip_index: Option<usize>,
    /// Reserved for a pickup dwell delay; this implementation never
    /// sets it (see the pickup-dwell resolution in `SPEC_FULL.md`).
    pub pickup_countdown: Option<u32>,
}

impl Vehicle {
    pub fn new(index: usize, location: Location, direction: Direction) -> Self {
        Self {
            index,
            location,
            direction,
            phase: VehiclePhase::P1,
            trip_index: None,
            pickup_location: None,
            dropoff_location: None,
            forward_dispatch_trip_index: None,
            pickup_countdown: None,
        }
    }

    pub fn is_dispatchable(&self, forward_dispatch_enabled: bool) -> bool {
        match self.phase {
            VehiclePhase::P1 => true,
            VehiclePhase::P3 => forward_dispatch_enabled && self.forward_dispatch_trip_index.is_none(),
            VehiclePhase::P2 => false,
        }
    }

    /// Assign an unassigned trip to this idle (or forward-dispatch
    /// eligible) vehicle. P1 -> P2 immediately; a P3 vehicle instead
    /// queues the trip to start on its own dropoff.
    pub fn assign(&mut self, trip_index: usize, origin: Location, destination: Location) {
        match self.phase {
            VehiclePhase::P1 => {
                self.phase = VehiclePhase::P2;
                self.trip_index = Some(trip_index);
                self.pickup_location = Some(origin);
                self.dropoff_location = Some(destination);
            }
            VehiclePhase::P3 => {
                debug_assert!(self.forward_dispatch_trip_index.is_none());
                self.forward_dispatch_trip_index = Some(trip_index);
            }
            VehiclePhase::P2 => panic!("cannot assign a trip to a vehicle already en route to a pickup"),
        }
    }

    /// Called when `location == pickup_location`. No dwell: the
    /// transition to P3 is immediate.
    pub fn arrive_at_pickup(&mut self) {
        debug_assert_eq!(self.phase, VehiclePhase::P2);
        self.phase = VehiclePhase::P3;
    }

    /// Called when `location == dropoff_location`. Returns the queued
    /// forward-dispatch trip index, if any, which becomes the
    /// vehicle's new current trip (vehicle stays logically "busy",
    /// transitioning straight to P2 of that trip rather than idling).
    pub fn arrive_at_dropoff(&mut self) -> Option<usize> {
        debug_assert_eq!(self.phase, VehiclePhase::P3);
        if let Some(next_trip) = self.forward_dispatch_trip_index.take() {
            Some(next_trip)
        } else {
            self.phase = VehiclePhase::P1;
            self.trip_index = None;
            self.pickup_location = None;
            self.dropoff_location = None;
            None
        }
    }

    /// Start the queued forward-dispatch trip returned by
    /// [`Vehicle::arrive_at_dropoff`]: the vehicle goes straight to P2
    /// for the new trip without ever touching P1.
    pub fn start_forward_dispatched_trip(&mut self, trip_index: usize, origin: Location, destination: Location) {
        self.phase = VehiclePhase::P2;
        self.trip_index = Some(trip_index);
        self.pickup_location = Some(origin);
        self.dropoff_location = Some(destination);
    }

    /// Re-derive `direction` for the next block. Must run after
    /// [`Vehicle::step_location`] in the same block (§4.2 ordering note).
    pub fn update_direction<R: Rng + ?Sized>(&mut self, city: &City, idle_vehicles_moving: bool, rng: &mut R) {
        match self.phase {
            VehiclePhase::P1 => {
                if idle_vehicles_moving {
                    self.direction = random_direction_no_uturn(self.direction, rng);
                }
            }
            VehiclePhase::P2 => {
                let target = self.pickup_location.expect("P2 vehicle must have a pickup location");
                self.direction = steer_towards(city, self.location, target, self.direction, rng);
            }
            VehiclePhase::P3 => {
                let target = self.dropoff_location.expect("P3 vehicle must have a dropoff location");
                self.direction = steer_towards(city, self.location, target, self.direction, rng);
            }
        }
    }

    /// Move one block along `direction`, unless the vehicle has nothing
    /// left to approach this block (idle-and-not-moving P1, or already
    /// sitting on its pickup/dropoff).
    pub fn step_location(&mut self, city: &City, idle_vehicles_moving: bool) {
        let should_move = match self.phase {
            VehiclePhase::P1 => idle_vehicles_moving,
            VehiclePhase::P2 => self.pickup_location != Some(self.location),
            VehiclePhase::P3 => self.dropoff_location != Some(self.location),
        };
        if should_move {
            let (dx, dy) = self.direction.vector();
            self.location = city.wrap_location(Location::new(self.location.x + dx, self.location.y + dy));
        }
    }
}

fn random_direction_no_uturn<R: Rng + ?Sized>(current: Direction, rng: &mut R) -> Direction {
    let forbidden = current.opposite();
    loop {
        let candidate = Direction::ALL[rng.gen_range(0..4)];
        if candidate != forbidden {
            return candidate;
        }
    }
}

/// Pick a direction that reduces toroidal distance to `target`. When
/// both axes still differ, pick between them uniformly at random; once
/// aligned on one axis, only the other axis's direction is offered;
/// when already at `target`, keep the current direction unchanged.
fn steer_towards<R: Rng + ?Sized>(
    city: &City,
    from: Location,
    target: Location,
    current: Direction,
    rng: &mut R,
) -> Direction {
    let x_step = axis_step(city.city_size, from.x, target.x, Direction::East, Direction::West, rng);
    let y_step = axis_step(city.city_size, from.y, target.y, Direction::North, Direction::South, rng);
    match (x_step, y_step) {
        (None, None) => current,
        (Some(d), None) => d,
        (None, Some(d)) => d,
        (Some(dx_dir), Some(dy_dir)) => {
            if rng.gen_bool(0.5) {
                dx_dir
            } else {
                dy_dir
            }
        }
    }
}

fn axis_step<R: Rng + ?Sized>(
    n: i32,
    from: i32,
    to: i32,
    positive: Direction,
    negative: Direction,
    rng: &mut R,
) -> Option<Direction> {
    if from == to {
        return None;
    }
    let forward = (to - from).rem_euclid(n);
    let backward = n - forward;
    if forward < backward {
        Some(positive)
    } else if backward < forward {
        Some(negative)
    } else if rng.gen_bool(0.5) {
        Some(positive)
    } else {
        Some(negative)
    }
}

/// Trip lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TripPhase {
    Inactive,
    Unassigned,
    Waiting,
    Riding,
    Completed,
    Cancelled,
}

pub const TRIP_PHASE_COUNT: usize = 6;

#[derive(Debug, Clone)]
pub struct Trip {
    pub index: usize,
    pub origin: Location,
    pub destination: Location,
    /// Distance at creation; does not change afterward even though the
    /// grid can be resized mid-run.
    pub distance: i32,
    pub phase: TripPhase,
    pub phase_time: [u32; TRIP_PHASE_COUNT],
    pub forward_dispatched: bool,
}

impl Trip {
    pub fn new(index: usize, origin: Location, destination: Location, distance: i32) -> Self {
        Self {
            index,
            origin,
            destination,
            distance,
            phase: TripPhase::Unassigned,
            phase_time: [0; TRIP_PHASE_COUNT],
            forward_dispatched: false,
        }
    }

    /// Record one more block spent in the current phase. Called once
    /// per active trip per block, before any transition is applied.
    pub fn tick(&mut self) {
        self.phase_time[self.phase as usize] += 1;
    }

    pub fn transition(&mut self, to: TripPhase) {
        self.phase = to;
    }

    /// Still going through the UNASSIGNED/WAITING/RIDING cycle.
    /// COMPLETED and CANCELLED trips are counted into the history
    /// exactly once (see `measures::push_block_history`), then flipped
    /// to INACTIVE so a later block's push does not recount them; both
    /// states, along with INACTIVE itself, are eligible for garbage
    /// collection (§4.6 step 10).
    pub fn is_active(&self) -> bool {
        matches!(self.phase, TripPhase::Unassigned | TripPhase::Waiting | TripPhase::Riding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn city() -> City {
        City::new(10, 0.0, false)
    }

    #[test]
    fn assign_transitions_idle_vehicle_to_p2() {
        let mut v = Vehicle::new(0, Location::new(0, 0), Direction::North);
        v.assign(3, Location::new(1, 1), Location::new(5, 5));
        assert_eq!(v.phase, VehiclePhase::P2);
        assert_eq!(v.trip_index, Some(3));
    }

    #[test]
    fn p1_not_moving_stays_put() {
        let c = city();
        let mut v = Vehicle::new(0, Location::new(2, 2), Direction::North);
        v.step_location(&c, false);
        assert_eq!(v.location, Location::new(2, 2));
    }

    #[test]
    fn p1_moving_advances_one_block() {
        let c = city();
        let mut v = Vehicle::new(0, Location::new(2, 2), Direction::North);
        v.step_location(&c, true);
        assert_eq!(v.location, Location::new(2, 3));
    }

    #[test]
    fn arrive_at_dropoff_with_no_queue_goes_idle() {
        let mut v = Vehicle::new(0, Location::new(5, 5), Direction::East);
        v.assign(1, Location::new(5, 5), Location::new(5, 5));
        v.arrive_at_pickup();
        let next = v.arrive_at_dropoff();
        assert!(next.is_none());
        assert_eq!(v.phase, VehiclePhase::P1);
        assert!(v.trip_index.is_none());
    }

    #[test]
    fn arrive_at_dropoff_with_queue_starts_next_trip() {
        let mut v = Vehicle::new(0, Location::new(5, 5), Direction::East);
        v.assign(1, Location::new(5, 5), Location::new(5, 5));
        v.arrive_at_pickup();
        v.assign(2, Location::new(6, 6), Location::new(7, 7));
        let next = v.arrive_at_dropoff();
        assert_eq!(next, Some(2));
    }

    #[test]
    fn trip_phase_time_accumulates() {
        let mut t = Trip::new(0, Location::new(0, 0), Location::new(1, 1), 2);
        t.tick();
        t.tick();
        assert_eq!(t.phase_time[TripPhase::Unassigned as usize], 2);
        t.transition(TripPhase::Waiting);
        t.tick();
        assert_eq!(t.phase_time[TripPhase::Waiting as usize], 1);
        assert_eq!(t.phase_time[TripPhase::Unassigned as usize], 2);
    }
}
