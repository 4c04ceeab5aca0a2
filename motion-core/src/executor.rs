//! Step executor: turns queued moves into step pulses.
//!
//! [`StepExecutor`] owns the move queue and the absolute motor position. A
//! timer context calls [`StepExecutor::tick`] once per step period and
//! drives the pins from the returned [`StepPulse`]; every motor of a move
//! is interleaved with Bresenham's line algorithm so all motors finish
//! together.
//!
//! The executor is plain data. A board crate shares it between the
//! interpreter and the timer context behind a critical-section mutex and
//! implements [`MotionQueue`](crate::MotionQueue) on top of it.

use core::marker::PhantomData;

use gcode_proto::{Target, AXIS_COUNT};
use heapless::Deque;

use crate::kinematics::{ActiveKinematics, AxesSteps, Kinematics, MovePlan};
use crate::motion::{EndstopCheck, EndstopMask, ExecutionControl, HomingTrigger, Move, QueueError};

/// Number of queued entries, moves and origin changes together.
pub const QUEUE_DEPTH: usize = 8;

/// Shortest step period the executor will request.
pub const MIN_STEP_INTERVAL_US: u32 = 20;

/// Feed rate used for moves requested at F0, in mm/min.
const CRAWL_FEED: u32 = 1;

/// One queue slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum Entry {
    Move(Move),
    /// Redefine the position once every earlier move has run.
    Origin(Target),
}

/// The step pulses for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StepPulse {
    /// Bit `i` set: motor `i` takes a step this tick.
    pub step: u8,
    /// Bit `i` set: motor `i` runs in the negative direction.
    pub reverse: u8,
    /// Time until the next tick.
    pub interval_us: u32,
}

impl StepPulse {
    /// True if motor `motor` steps this tick.
    #[inline]
    #[must_use]
    pub const fn steps(&self, motor: usize) -> bool {
        self.step & (1 << motor) != 0
    }

    /// True if motor `motor` runs in the negative direction.
    #[inline]
    #[must_use]
    pub const fn is_reverse(&self, motor: usize) -> bool {
        self.reverse & (1 << motor) != 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ActiveMove {
    target: Target,
    plan: MovePlan,
    endstop_check: Option<EndstopCheck>,
    /// Ticks the move takes: the step count of its longest motor.
    total: u32,
    taken: u32,
    error: [u32; AXIS_COUNT],
    reverse: u8,
    interval_us: u32,
}

impl ActiveMove {
    fn start(mv: &Move) -> Option<Self> {
        let total = mv
            .plan
            .steps
            .iter()
            .map(|s| s.unsigned_abs())
            .max()
            .unwrap_or(0);
        if total == 0 {
            return None;
        }

        let mut reverse = 0;
        for (i, s) in mv.plan.steps.iter().enumerate() {
            if *s < 0 {
                reverse |= 1 << i;
            }
        }

        Some(Self {
            target: mv.target,
            plan: mv.plan,
            endstop_check: mv.endstop_check,
            total,
            taken: 0,
            error: [total / 2; AXIS_COUNT],
            reverse,
            interval_us: step_interval_us(&mv.plan, mv.target.feed, total),
        })
    }

    /// True if the endstops call for this move to end now.
    fn endstop_reached(&self, triggered: EndstopMask) -> bool {
        let Some(check) = self.endstop_check else {
            return false;
        };
        let hit = triggered.0 & check.endstops.0 != 0;
        match check.trigger {
            HomingTrigger::UntilTriggered => hit,
            HomingTrigger::UntilReleased => !hit,
        }
    }
}

/// Move queue plus the state of the move being stepped.
///
/// The geometry `K` is only needed to turn the step position back into
/// axis coordinates.
#[derive(Debug)]
pub struct StepExecutor<K = ActiveKinematics> {
    queue: Deque<Entry, QUEUE_DEPTH>,
    active: Option<ActiveMove>,
    position: AxesSteps,
    feed: u32,
    steps_per_m: [u32; AXIS_COUNT],
    halted: bool,
    _kinematics: PhantomData<K>,
}

impl<K: Kinematics> StepExecutor<K> {
    /// Create an idle executor at the origin.
    #[must_use]
    pub const fn new(steps_per_m: [u32; AXIS_COUNT]) -> Self {
        Self {
            queue: Deque::new(),
            active: None,
            position: [0; AXIS_COUNT],
            feed: 0,
            steps_per_m,
            halted: false,
            _kinematics: PhantomData,
        }
    }

    /// Append a move.
    ///
    /// # Errors
    ///
    /// [`QueueError::Halted`] after [`halt`](Self::halt), [`QueueError::Full`]
    /// when every slot is taken.
    pub fn push(&mut self, mv: &Move) -> Result<(), QueueError> {
        self.push_entry(Entry::Move(*mv))
    }

    /// Redefine the position as `origin` once the queued moves have run.
    ///
    /// Applied immediately when nothing is queued.
    ///
    /// # Errors
    ///
    /// Same as [`push`](Self::push).
    pub fn push_origin(&mut self, origin: &Target) -> Result<(), QueueError> {
        if self.is_idle() && !self.halted {
            self.set_origin(origin);
            return Ok(());
        }
        self.push_entry(Entry::Origin(*origin))
    }

    fn push_entry(&mut self, entry: Entry) -> Result<(), QueueError> {
        if self.halted {
            return Err(QueueError::Halted);
        }
        self.queue.push_back(entry).map_err(|_| QueueError::Full)
    }

    /// Position in axis coordinates, from the step counters.
    #[must_use]
    pub fn position(&self) -> Target {
        Target::new(
            K::position_from_steps(&self.position, &self.steps_per_m),
            self.feed,
        )
    }

    /// Absolute motor position in steps.
    #[inline]
    #[must_use]
    pub fn motor_position(&self) -> &AxesSteps {
        &self.position
    }

    /// Queue entries still available.
    #[inline]
    #[must_use]
    pub fn free_slots(&self) -> usize {
        QUEUE_DEPTH - self.queue.len()
    }

    /// True when no move is running and none is queued.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.active.is_none() && self.queue.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Drop everything and refuse further moves.
    pub fn halt(&mut self) {
        self.halted = true;
        self.active = None;
        self.queue.clear();
    }

    /// Produce the pulses for one step period.
    ///
    /// Returns `None` when there is nothing left to step. `triggered` is the
    /// set of endstops currently reading triggered.
    pub fn tick(&mut self, triggered: EndstopMask) -> Option<StepPulse> {
        if self.halted {
            return None;
        }

        loop {
            if self.active.is_none() {
                self.start_next();
            }
            let active = self.active.as_mut()?;

            if active.endstop_reached(triggered) {
                debug!("endstop stop after {} of {} steps", active.taken, active.total);
                self.active = None;
                continue;
            }

            let mut pulse = StepPulse {
                step: 0,
                reverse: active.reverse,
                interval_us: active.interval_us,
            };
            for i in 0..AXIS_COUNT {
                let n = active.plan.steps[i].unsigned_abs();
                active.error[i] += n;
                if active.error[i] >= active.total {
                    active.error[i] -= active.total;
                    pulse.step |= 1 << i;
                    self.position[i] += active.plan.steps[i].signum();
                }
            }

            active.taken += 1;
            if active.taken >= active.total {
                self.active = None;
            }
            return Some(pulse);
        }
    }

    /// Pop queue entries until a move with steps starts or the queue is
    /// empty.
    fn start_next(&mut self) {
        while let Some(entry) = self.queue.pop_front() {
            match entry {
                Entry::Move(mv) => {
                    self.feed = mv.target.feed;
                    if let Some(active) = ActiveMove::start(&mv) {
                        trace!("starting move, {} ticks at {} us", active.total, active.interval_us);
                        self.active = Some(active);
                        return;
                    }
                }
                Entry::Origin(origin) => self.set_origin(&origin),
            }
        }
    }

    fn set_origin(&mut self, origin: &Target) {
        self.position = K::motor_steps(origin, &self.steps_per_m);
        self.feed = origin.feed;
    }
}

impl<K: Kinematics> ExecutionControl for StepExecutor<K> {
    fn in_flight(&self) -> bool {
        self.active.is_some()
    }

    fn achieved_position(&self) -> Target {
        let mut position = self.position();
        if let Some(active) = &self.active {
            position.feed = active.target.feed;
        }
        position
    }

    fn abort_current(&mut self) {
        self.active = None;
    }

    fn flush(&mut self) {
        self.queue.clear();
    }

    fn advance(&mut self) {
        if self.active.is_none() {
            self.start_next();
        }
    }

    fn set_start_point(&mut self, start: &Target) {
        self.set_origin(start);
    }
}

/// Step period for a move: path length at the feed rate, divided evenly
/// over its ticks.
fn step_interval_us(plan: &MovePlan, feed: u32, total: u32) -> u32 {
    let distance = plan
        .delta_um
        .iter()
        .fold(0, |acc, &d| approx_distance(acc, d));
    let feed = u64::from(feed.max(CRAWL_FEED));
    // um / (mm/min) = 60_000 us
    let duration_us = u64::from(distance) * 60_000 / feed;
    let interval = duration_us / u64::from(total.max(1));
    u32::try_from(interval)
        .unwrap_or(u32::MAX)
        .max(MIN_STEP_INTERVAL_US)
}

/// Euclidean length of `(a, b)` within about 1.5%, without a square root.
fn approx_distance(a: u32, b: u32) -> u32 {
    let (min, max) = if a < b { (u64::from(a), u64::from(b)) } else { (u64::from(b), u64::from(a)) };
    if min == 0 {
        return u32::try_from(max).unwrap_or(u32::MAX);
    }
    let mut approx = max * 1007 + min * 441;
    if max < min << 4 {
        approx -= max * 40;
    }
    u32::try_from((approx + 512) >> 10).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::kinematics::{Cartesian, CoreXy};
    use gcode_proto::Axis;
    use std::vec::Vec;

    const UNIT: [u32; AXIS_COUNT] = [1_000_000; AXIS_COUNT];
    const NONE: EndstopMask = EndstopMask(0);

    fn at(x: i32, y: i32, feed: u32) -> Target {
        let mut target = Target::ORIGIN;
        target[Axis::X] = x;
        target[Axis::Y] = y;
        target.feed = feed;
        target
    }

    fn linear<K: Kinematics>(from: &Target, to: Target) -> Move {
        Move {
            target: to,
            plan: K::plan(from, &to, &UNIT),
            endstop_check: None,
        }
    }

    fn drain<K: Kinematics>(exec: &mut StepExecutor<K>, triggered: EndstopMask) -> Vec<StepPulse> {
        core::iter::from_fn(|| exec.tick(triggered)).take(100_000).collect()
    }

    #[test]
    fn test_steps_every_motor_to_target() {
        let mut exec = StepExecutor::<Cartesian>::new(UNIT);
        exec.push(&linear::<Cartesian>(&Target::ORIGIN, at(30, -12, 600))).unwrap();

        let pulses = drain(&mut exec, NONE);
        assert_eq!(pulses.len(), 30);
        assert_eq!(pulses.iter().filter(|p| p.steps(0)).count(), 30);
        assert_eq!(pulses.iter().filter(|p| p.steps(1)).count(), 12);
        assert!(pulses.iter().all(|p| !p.is_reverse(0) && p.is_reverse(1)));

        assert!(exec.is_idle());
        assert_eq!(exec.position(), at(30, -12, 600));
    }

    #[test]
    fn test_corexy_position_read_back() {
        let mut exec = StepExecutor::<CoreXy>::new(UNIT);
        let first = at(100, 40, 1200);
        let second = at(-20, 10, 1200);
        exec.push(&linear::<CoreXy>(&Target::ORIGIN, first)).unwrap();
        exec.push(&linear::<CoreXy>(&first, second)).unwrap();

        drain(&mut exec, NONE);
        assert_eq!(exec.position(), second);
        assert_eq!(*exec.motor_position(), CoreXy::motor_steps(&second, &UNIT));
    }

    #[test]
    fn test_zero_length_move_only_sets_feed() {
        let mut exec = StepExecutor::<Cartesian>::new(UNIT);
        exec.push(&linear::<Cartesian>(&Target::ORIGIN, at(0, 0, 900))).unwrap();
        assert_eq!(exec.tick(NONE), None);
        assert_eq!(exec.position().feed, 900);
        assert!(exec.is_idle());
    }

    #[test]
    fn test_step_interval_follows_feed() {
        let mut exec = StepExecutor::<Cartesian>::new(UNIT);
        // 1 mm at 60 mm/min takes one second over 1000 steps
        exec.push(&linear::<Cartesian>(&Target::ORIGIN, at(1000, 0, 60))).unwrap();
        assert_eq!(exec.tick(NONE).map(|p| p.interval_us), Some(1000));

        let mut exec = StepExecutor::<Cartesian>::new(UNIT);
        exec.push(&linear::<Cartesian>(&Target::ORIGIN, at(1000, 0, 0))).unwrap();
        assert_eq!(exec.tick(NONE).map(|p| p.interval_us), Some(60_000));

        let mut exec = StepExecutor::<Cartesian>::new(UNIT);
        exec.push(&linear::<Cartesian>(&Target::ORIGIN, at(1000, 0, 1_000_000))).unwrap();
        assert_eq!(exec.tick(NONE).map(|p| p.interval_us), Some(MIN_STEP_INTERVAL_US));
    }

    #[test]
    fn test_approx_distance() {
        assert_eq!(approx_distance(0, 0), 0);
        assert_eq!(approx_distance(1000, 0), 1000);
        assert_eq!(approx_distance(0, 250), 250);
        let d = approx_distance(3000, 4000);
        assert!((4925..=5075).contains(&d), "{d}");
    }

    #[test]
    fn test_homing_stops_on_trigger_then_release() {
        let mut exec = StepExecutor::<Cartesian>::new(UNIT);
        let approach = Move {
            endstop_check: Some(EndstopCheck {
                endstops: EndstopMask::Y_MIN,
                trigger: HomingTrigger::UntilTriggered,
            }),
            ..linear::<Cartesian>(&Target::ORIGIN, at(0, -1000, 50))
        };
        let back_off = Move {
            endstop_check: Some(EndstopCheck {
                endstops: EndstopMask::Y_MIN,
                trigger: HomingTrigger::UntilReleased,
            }),
            ..linear::<Cartesian>(&at(0, -1000, 50), at(0, 0, 50))
        };
        exec.push(&approach).unwrap();
        exec.push(&back_off).unwrap();
        exec.push_origin(&at(0, 0, 50)).unwrap();

        for _ in 0..5 {
            assert!(exec.tick(NONE).is_some());
        }
        assert_eq!(exec.motor_position()[1], -5);

        // Switch closes: the approach ends and the back-off starts
        let pulse = exec.tick(EndstopMask::Y_MIN).unwrap();
        assert!(!pulse.is_reverse(1));
        assert_eq!(exec.motor_position()[1], -4);
        exec.tick(EndstopMask::Y_MIN).unwrap();

        // Switch opens: the back-off ends and the origin is applied
        assert_eq!(exec.tick(NONE), None);
        assert!(exec.is_idle());
        assert_eq!(*exec.motor_position(), [0; AXIS_COUNT]);
    }

    #[test]
    fn test_origin_waits_for_queued_moves() {
        let mut exec = StepExecutor::<Cartesian>::new(UNIT);
        exec.push(&linear::<Cartesian>(&Target::ORIGIN, at(10, 0, 100))).unwrap();
        exec.push_origin(&at(500, 500, 100)).unwrap();
        assert_eq!(exec.position()[Axis::X], 0);

        drain(&mut exec, NONE);
        assert_eq!(exec.position(), at(500, 500, 100));

        // Idle: applied at once
        exec.push_origin(&at(1, 2, 3)).unwrap();
        assert_eq!(exec.position(), at(1, 2, 3));
    }

    #[test]
    fn test_queue_full() {
        let mut exec = StepExecutor::<Cartesian>::new(UNIT);
        let mv = linear::<Cartesian>(&Target::ORIGIN, at(1, 0, 100));
        for _ in 0..QUEUE_DEPTH {
            exec.push(&mv).unwrap();
        }
        assert_eq!(exec.push(&mv), Err(QueueError::Full));
        assert_eq!(exec.free_slots(), 0);
    }

    #[test]
    fn test_halt_drops_everything() {
        let mut exec = StepExecutor::<Cartesian>::new(UNIT);
        let mv = linear::<Cartesian>(&Target::ORIGIN, at(100, 0, 100));
        exec.push(&mv).unwrap();
        exec.push(&mv).unwrap();
        exec.tick(NONE).unwrap();

        exec.halt();
        assert!(exec.is_halted());
        assert_eq!(exec.tick(NONE), None);
        assert_eq!(exec.push(&mv), Err(QueueError::Halted));
        assert_eq!(exec.push_origin(&Target::ORIGIN), Err(QueueError::Halted));
        assert_eq!(exec.motor_position()[0], 1);
    }

    #[test]
    fn test_controlled_stop_sequence() {
        let mut exec = StepExecutor::<Cartesian>::new(UNIT);
        let first = at(100, 0, 300);
        exec.push(&linear::<Cartesian>(&Target::ORIGIN, first)).unwrap();
        exec.push(&linear::<Cartesian>(&first, at(200, 0, 300))).unwrap();
        for _ in 0..25 {
            exec.tick(NONE).unwrap();
        }

        assert!(exec.in_flight());
        let reached = exec.achieved_position();
        assert_eq!(reached, at(25, 0, 300));

        exec.abort_current();
        exec.flush();
        exec.advance();
        exec.set_start_point(&reached);

        assert!(!exec.in_flight());
        assert!(exec.is_idle());
        assert_eq!(exec.tick(NONE), None);
        assert_eq!(exec.position(), reached);
    }
}
