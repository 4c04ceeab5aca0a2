//! G-code command interpreter.
//!
//! [`CommandInterpreter`] is the [`LineHandler`] behind a [`LineParser`]:
//! it turns each parsed line into position updates and dispatches the
//! supported commands to the motion queue.
//!
//! # Supported Commands
//!
//! | Code | Action |
//! |------|--------|
//! | `G1` | Linear move to X/Y at feed F |
//! | `G28` | Home Y against its minimum endstop, zero X in place |
//! | `G90` | Absolute positioning |
//! | `G91` | Relative positioning |
//! | `M0` | Controlled stop: drain the queue, keep position |
//! | `M112` | Emergency stop: disable motion until reset |
//! | `M114` | Report current position |
//! | `M119` | Report endstop states |
//! | `M202`, `M222` | Accepted, ignored |
//!
//! Coordinates are millimetres on the wire and micrometres inside.
//!
//! [`LineParser`]: gcode_proto::LineParser

use core::marker::PhantomData;

use gcode_proto::{
    Axis, EndstopReport, LineHandler, Parameter, PositionReport, Serialize, Target, AXIS_COUNT,
    MM_TO_UM, NATIVE,
};

use crate::config::{MachineConfig, DEFAULT_MACHINE_CONFIG};
use crate::kinematics::{ActiveKinematics, Kinematics};
use crate::motion::{
    Endstops, EndstopCheck, EndstopMask, ExecutionControl, HomingTrigger, Move, MotionQueue,
    QueueError, StatusSink, STATUS_LINE_CAPACITY,
};

/// How X/Y arguments are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MachineMode {
    /// Coordinates are absolute machine positions.
    #[default]
    Absolute,
    /// Coordinates are offsets from the start point.
    Relative,
}

/// A recognized command code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    LinearMove,
    Home,
    AbsolutePositioning,
    RelativePositioning,
    Stop,
    EmergencyStop,
    ReportPosition,
    ReportEndstops,
    SetAcceleration,
    SetSpeed,
}

impl Command {
    /// Look up a command by letter and number.
    #[must_use]
    pub fn from_code(letter: u8, code: u32) -> Option<Self> {
        Some(match (letter, code) {
            (b'G', 1) => Self::LinearMove,
            (b'G', 28) => Self::Home,
            (b'G', 90) => Self::AbsolutePositioning,
            (b'G', 91) => Self::RelativePositioning,
            (b'M', 0) => Self::Stop,
            (b'M', 112) => Self::EmergencyStop,
            (b'M', 114) => Self::ReportPosition,
            (b'M', 119) => Self::ReportEndstops,
            (b'M', 202) => Self::SetAcceleration,
            (b'M', 222) => Self::SetSpeed,
            _ => return None,
        })
    }
}

/// Why a parsed line could not be executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandError {
    /// The line had no tokens.
    MissingCommand,
    /// The command number carried a sign or a decimal point.
    InvalidCode(u8),
    /// No command with this letter and number.
    UnknownCommand { letter: u8, code: u32 },
    /// An emergency stop disabled the machine.
    Halted,
    /// The motion queue refused the move.
    Queue(QueueError),
}

impl From<QueueError> for CommandError {
    fn from(e: QueueError) -> Self {
        CommandError::Queue(e)
    }
}

/// Positioning state and command dispatch for one input channel.
///
/// Owns three positions:
///
/// - *next target*: assembled from the arguments of each line,
/// - *current position*: last position read back from the queue,
/// - *start point*: where the next queued move begins.
///
/// The geometry `K` defaults to the one selected at build time.
pub struct CommandInterpreter<Q, E, S, K = ActiveKinematics> {
    queue: Q,
    endstops: E,
    status: S,
    config: MachineConfig,
    next_target: Target,
    current: Target,
    start: Target,
    mode: MachineMode,
    halted: bool,
    _kinematics: PhantomData<K>,
}

impl<Q, E, S> CommandInterpreter<Q, E, S, ActiveKinematics>
where
    Q: MotionQueue,
    E: Endstops,
    S: StatusSink,
{
    /// Create an interpreter with the default machine configuration.
    pub fn new(queue: Q, endstops: E, status: S) -> Self {
        Self::with_config(queue, endstops, status, DEFAULT_MACHINE_CONFIG)
    }

    /// Create an interpreter with a custom machine configuration.
    pub fn with_config(queue: Q, endstops: E, status: S, config: MachineConfig) -> Self {
        Self::with_kinematics(queue, endstops, status, config)
    }
}

impl<Q, E, S, K> CommandInterpreter<Q, E, S, K>
where
    Q: MotionQueue,
    E: Endstops,
    S: StatusSink,
    K: Kinematics,
{
    /// Create an interpreter for an explicit geometry.
    pub fn with_kinematics(queue: Q, endstops: E, status: S, config: MachineConfig) -> Self {
        let mut next_target = Target::ORIGIN;
        next_target.feed = config.initial_feed();
        Self {
            queue,
            endstops,
            status,
            config,
            next_target,
            current: Target::ORIGIN,
            start: Target::ORIGIN,
            mode: MachineMode::Absolute,
            halted: false,
            _kinematics: PhantomData,
        }
    }

    /// Target assembled from the most recent line.
    #[inline]
    pub fn next_target(&self) -> &Target {
        &self.next_target
    }

    /// Position last read back from the motion queue.
    #[inline]
    pub fn current_position(&self) -> &Target {
        &self.current
    }

    /// Start point of the next queued move.
    #[inline]
    pub fn start_point(&self) -> &Target {
        &self.start
    }

    #[inline]
    pub fn mode(&self) -> MachineMode {
        self.mode
    }

    /// True after an emergency stop.
    #[inline]
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    /// Get a reference to the motion queue.
    pub fn queue(&self) -> &Q {
        &self.queue
    }

    /// Get a mutable reference to the motion queue.
    pub fn queue_mut(&mut self) -> &mut Q {
        &mut self.queue
    }

    /// Get a reference to the endstops.
    pub fn endstops(&self) -> &E {
        &self.endstops
    }

    /// Get a reference to the status sink.
    pub fn status(&self) -> &S {
        &self.status
    }

    /// Decompose the interpreter into its collaborators.
    pub fn into_parts(self) -> (Q, E, S) {
        (self.queue, self.endstops, self.status)
    }

    /// Fold the argument tokens of a line into the next target.
    fn apply_arguments(&mut self, args: &[Parameter]) {
        if self.mode == MachineMode::Relative {
            self.next_target[Axis::X] = 0;
            self.next_target[Axis::Y] = 0;
        }

        for param in args {
            match param.name {
                b'X' => self.next_target[Axis::X] = param.decode(MM_TO_UM),
                b'Y' => self.next_target[Axis::Y] = param.decode(MM_TO_UM),
                b'F' => self.next_target.feed = u32::try_from(param.decode(NATIVE)).unwrap_or(0),
                other => trace!("ignoring argument {}", other),
            }
        }

        if self.mode == MachineMode::Relative {
            for axis in [Axis::X, Axis::Y] {
                self.next_target[axis] = self.next_target[axis].saturating_add(self.start[axis]);
            }
        }
    }

    fn execute(&mut self, command: Command) -> Result<(), CommandError> {
        match command {
            Command::LinearMove => self.submit(self.next_target, None),
            Command::Home => self.home(),
            Command::AbsolutePositioning => {
                self.mode = MachineMode::Absolute;
                Ok(())
            }
            Command::RelativePositioning => {
                self.mode = MachineMode::Relative;
                Ok(())
            }
            Command::Stop => {
                self.controlled_stop();
                Ok(())
            }
            Command::EmergencyStop => {
                self.emergency_stop();
                Ok(())
            }
            Command::ReportPosition => {
                self.current = self.queue.current_position();
                self.emit(&PositionReport(self.current));
                Ok(())
            }
            Command::ReportEndstops => {
                self.report_endstops();
                Ok(())
            }
            Command::SetAcceleration | Command::SetSpeed => Ok(()),
        }
    }

    /// Plan a move from the start point and queue it.
    fn submit(&mut self, target: Target, endstop_check: Option<EndstopCheck>) -> Result<(), CommandError> {
        let plan = K::plan(&self.start, &target, &self.config.steps_per_m);
        self.queue.enqueue(&Move {
            target,
            plan,
            endstop_check,
        })?;
        self.start = target;
        Ok(())
    }

    /// G28. Only Y is searched; X is declared zero where it stands.
    ///
    /// Queues every homing entry or none of them. A refusal leaves *start
    /// point*, *next target* and *current position* as they were.
    fn home(&mut self) -> Result<(), CommandError> {
        let homing = self.config.homing;
        let back_off = homing.search_fast > homing.search_feed_y;
        // Approach, back-off, origin
        let needed = if back_off { 3 } else { 2 };
        let free = self.queue.free_slots();
        if free < needed {
            debug!("G28 needs {} queue slots, {} free", needed, free);
            return Err(QueueError::Full.into());
        }

        let saved = (self.start, self.next_target, self.current);
        let result = self.queue_homing(back_off);
        if result.is_err() {
            (self.start, self.next_target, self.current) = saved;
        }
        result
    }

    fn queue_homing(&mut self, back_off: bool) -> Result<(), CommandError> {
        self.next_target[Axis::X] = 0;
        self.next_target[Axis::Y] = 0;

        self.home_y(back_off)?;

        self.current[Axis::X] = 0;
        self.start[Axis::X] = 0;
        self.queue.set_start_point(&self.start)?;
        Ok(())
    }

    /// Queue the Y search moves and take Y to its homed position.
    ///
    /// The new origin is queued by the caller once X is zeroed too.
    fn home_y(&mut self, back_off: bool) -> Result<(), CommandError> {
        let homing = self.config.homing;
        let mut search = self.start;

        search[Axis::Y] = -homing.search_travel_um;
        search.feed = homing.search_fast.max(homing.search_feed_y);
        self.submit(
            search,
            Some(EndstopCheck {
                endstops: EndstopMask::Y_MIN,
                trigger: HomingTrigger::UntilTriggered,
            }),
        )?;

        if back_off {
            // Back off slowly until the switch releases
            search[Axis::Y] = homing.search_travel_um;
            search.feed = homing.search_feed_y;
            self.submit(
                search,
                Some(EndstopCheck {
                    endstops: EndstopMask::Y_MIN,
                    trigger: HomingTrigger::UntilReleased,
                }),
            )?;
        }

        self.start[Axis::Y] = homing.y_min_um;
        self.next_target[Axis::Y] = homing.y_min_um;
        debug!("Y homed at {} um", homing.y_min_um);
        Ok(())
    }

    /// M0. Runs entirely with the stepper interrupt excluded.
    fn controlled_stop(&mut self) {
        let Self {
            queue,
            current,
            start,
            ..
        } = self;

        let stopped = queue.critical_section(|exec| {
            if !exec.in_flight() {
                return false;
            }
            let reached = exec.achieved_position();
            *current = reached;
            *start = reached;
            exec.abort_current();
            exec.flush();
            exec.advance();
            exec.set_start_point(&reached);
            true
        });

        if stopped {
            info!("stopped at X={} Y={}", self.current[Axis::X], self.current[Axis::Y]);
        }
    }

    /// M112. Motion stays disabled until the device is reset.
    fn emergency_stop(&mut self) {
        self.queue.halt();
        self.halted = true;
        error!("emergency stop");
    }

    fn report_endstops(&mut self) {
        self.endstops.enable();
        let mut states = [None; AXIS_COUNT];
        for axis in Axis::ALL {
            states[axis.index()] = self.endstops.min_triggered(axis);
        }
        let report = EndstopReport(states);
        if !report.is_empty() {
            self.emit(&report);
        }
        self.endstops.disable();
    }

    /// Serialize a report and hand it to the status sink. Failures are
    /// logged, never fatal to the command.
    fn emit<R: Serialize>(&mut self, report: &R) {
        match report.serialize_to_vec::<STATUS_LINE_CAPACITY>() {
            Ok(line) => {
                if let Err(e) = self.status.send_status(&line) {
                    warn!("status line dropped: {:?}", e);
                }
            }
            Err(e) => warn!("status line not serialized: {:?}", e),
        }
    }
}

impl<Q, E, S, K> LineHandler for CommandInterpreter<Q, E, S, K>
where
    Q: MotionQueue,
    E: Endstops,
    S: StatusSink,
    K: Kinematics,
{
    type Error = CommandError;

    fn process(&mut self, line: &[Parameter]) -> Result<(), CommandError> {
        if self.halted {
            return Err(CommandError::Halted);
        }

        let (command, args) = line.split_first().ok_or(CommandError::MissingCommand)?;
        self.apply_arguments(args);

        let result = command
            .code()
            .ok_or(CommandError::InvalidCode(command.name))
            .and_then(|code| {
                Command::from_code(command.name, code).ok_or(CommandError::UnknownCommand {
                    letter: command.name,
                    code,
                })
            })
            .and_then(|cmd| {
                trace!("executing {:?}", cmd);
                self.execute(cmd)
            });

        if let Err(e) = &result {
            warn!("command rejected: {:?}", e);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::kinematics::{Cartesian, CoreXy};
    use gcode_proto::{LineParser, LineStatus};
    use std::vec;
    use std::vec::Vec;

    #[derive(Default)]
    struct MockExecution {
        in_flight: bool,
        achieved: Target,
        aborted: bool,
        flushed: bool,
        advanced: bool,
        start_point: Option<Target>,
    }

    impl ExecutionControl for MockExecution {
        fn in_flight(&self) -> bool {
            self.in_flight
        }

        fn achieved_position(&self) -> Target {
            self.achieved
        }

        fn abort_current(&mut self) {
            self.aborted = true;
            self.in_flight = false;
        }

        fn flush(&mut self) {
            self.flushed = true;
        }

        fn advance(&mut self) {
            self.advanced = true;
        }

        fn set_start_point(&mut self, start: &Target) {
            self.start_point = Some(*start);
        }
    }

    #[derive(Default)]
    struct MockQueue {
        moves: Vec<Move>,
        exec: MockExecution,
        position: Target,
        start_points: Vec<Target>,
        critical_sections: usize,
        halted: bool,
        full: bool,
        /// Entries accepted before reporting `Full`, origins included.
        capacity: Option<usize>,
        refuse_origin: bool,
    }

    impl MockQueue {
        fn with_capacity(capacity: usize) -> Self {
            Self {
                capacity: Some(capacity),
                ..Self::default()
            }
        }
    }

    impl MotionQueue for MockQueue {
        type Execution = MockExecution;

        fn enqueue(&mut self, mv: &Move) -> Result<(), QueueError> {
            if self.halted {
                return Err(QueueError::Halted);
            }
            if self.free_slots() == 0 {
                return Err(QueueError::Full);
            }
            self.moves.push(*mv);
            Ok(())
        }

        fn current_position(&mut self) -> Target {
            self.position
        }

        fn free_slots(&mut self) -> usize {
            if self.full {
                return 0;
            }
            let used = self.moves.len() + self.start_points.len();
            self.capacity.map_or(usize::MAX, |c| c.saturating_sub(used))
        }

        fn set_start_point(&mut self, start: &Target) -> Result<(), QueueError> {
            if self.halted {
                return Err(QueueError::Halted);
            }
            if self.refuse_origin || self.free_slots() == 0 {
                return Err(QueueError::Full);
            }
            self.start_points.push(*start);
            Ok(())
        }

        fn critical_section<R>(&mut self, f: impl FnOnce(&mut MockExecution) -> R) -> R {
            self.critical_sections += 1;
            f(&mut self.exec)
        }

        fn halt(&mut self) {
            self.halted = true;
            self.moves.clear();
        }
    }

    #[derive(Default)]
    struct MockEndstops {
        enabled: bool,
        enable_calls: usize,
        x_min: Option<bool>,
        y_min: Option<bool>,
    }

    impl Endstops for MockEndstops {
        fn enable(&mut self) {
            self.enabled = true;
            self.enable_calls += 1;
        }

        fn disable(&mut self) {
            self.enabled = false;
        }

        fn min_triggered(&mut self, axis: Axis) -> Option<bool> {
            assert!(self.enabled, "endstops read while disabled");
            match axis {
                Axis::X => self.x_min,
                Axis::Y => self.y_min,
                #[allow(unreachable_patterns)]
                _ => None,
            }
        }
    }

    #[derive(Default)]
    struct MockStatus {
        lines: Vec<Vec<u8>>,
    }

    impl StatusSink for MockStatus {
        fn send_status(&mut self, line: &[u8]) -> Result<(), crate::motion::StatusError> {
            self.lines.push(line.to_vec());
            Ok(())
        }
    }

    type Interp<K = Cartesian> = CommandInterpreter<MockQueue, MockEndstops, MockStatus, K>;

    /// Unit calibration: one step per micrometre.
    const UNIT_CONFIG: MachineConfig = MachineConfig {
        steps_per_m: [1_000_000; AXIS_COUNT],
        ..DEFAULT_MACHINE_CONFIG
    };

    fn interpreter() -> Interp {
        Interp::with_kinematics(
            MockQueue::default(),
            MockEndstops::default(),
            MockStatus::default(),
            UNIT_CONFIG,
        )
    }

    fn run<K: Kinematics>(
        parser: &mut LineParser,
        interp: &mut Interp<K>,
        input: &[u8],
    ) -> Vec<LineStatus> {
        input
            .iter()
            .map(|&b| parser.feed(b, interp))
            .filter(|s| *s != LineStatus::Continuing)
            .collect()
    }

    #[test]
    fn test_default_configuration() {
        let interp = CommandInterpreter::new(
            MockQueue::default(),
            MockEndstops::default(),
            MockStatus::default(),
        );
        assert_eq!(*interp.config(), DEFAULT_MACHINE_CONFIG);
        assert_eq!(interp.next_target().feed, DEFAULT_MACHINE_CONFIG.initial_feed());
        assert!(!interp.is_halted());
    }

    #[test]
    fn test_linear_move() {
        let mut parser = LineParser::new();
        let mut interp = interpreter();

        let statuses = run(&mut parser, &mut interp, b"G1 X10 Y20\n");
        assert_eq!(statuses, [LineStatus::Accepted]);
        assert_eq!(interp.next_target()[Axis::X], 10_000);
        assert_eq!(interp.next_target()[Axis::Y], 20_000);
        assert_eq!(interp.queue().moves.len(), 1);
        assert_eq!(interp.queue().moves[0].target, *interp.next_target());
        assert_eq!(interp.queue().moves[0].endstop_check, None);
        assert!(parser.is_idle());
    }

    #[test]
    fn test_move_advances_start_point() {
        let mut parser = LineParser::new();
        let mut interp = interpreter();

        run(&mut parser, &mut interp, b"G1 X10 Y20 F3000\nG1 X12\n");
        assert_eq!(interp.start_point()[Axis::X], 12_000);
        assert_eq!(interp.start_point()[Axis::Y], 20_000);

        let second = interp.queue().moves[1];
        assert_eq!(second.plan.delta_um[0], 2000);
        assert_eq!(second.plan.delta_um[1], 0);
        assert_eq!(second.plan.steps[0], 2000);
        assert_eq!(second.target.feed, 3000);
    }

    #[test]
    fn test_initial_feed_is_search_feed() {
        let interp = interpreter();
        assert_eq!(interp.next_target().feed, UNIT_CONFIG.initial_feed());
        assert_eq!(interp.mode(), MachineMode::Absolute);
    }

    #[test]
    fn test_relative_positioning() {
        let mut parser = LineParser::new();
        let mut interp = interpreter();

        run(&mut parser, &mut interp, b"G1 X5 Y5\nG91\n");
        assert_eq!(interp.mode(), MachineMode::Relative);

        run(&mut parser, &mut interp, b"G1 X1.5\n");
        assert_eq!(interp.next_target()[Axis::X], 5000 + 1500);
        // Y not given: relative zero, stays at the start point
        assert_eq!(interp.next_target()[Axis::Y], 5000);

        run(&mut parser, &mut interp, b"G1 X-0.5 Y-5\n");
        assert_eq!(interp.next_target()[Axis::X], 6000);
        assert_eq!(interp.next_target()[Axis::Y], 0);

        run(&mut parser, &mut interp, b"G90\nG1 X1\n");
        assert_eq!(interp.next_target()[Axis::X], 1000);
        assert_eq!(interp.next_target()[Axis::Y], 0);
    }

    #[test]
    fn test_feed_rate_and_ignored_arguments() {
        let mut parser = LineParser::new();
        let mut interp = interpreter();

        let statuses = run(&mut parser, &mut interp, b"G1 X1 E5 S3 F1500.6\n");
        assert_eq!(statuses, [LineStatus::Accepted]);
        assert_eq!(interp.next_target().feed, 1501);

        run(&mut parser, &mut interp, b"G1 F-20\n");
        assert_eq!(interp.next_target().feed, 0);
    }

    #[test]
    fn test_unknown_command_rejected_and_reset() {
        let mut parser = LineParser::new();
        let mut interp = interpreter();

        for line in [&b"G2 X1\n"[..], b"M999\n", b"T1\n", b"G-1\n", b"G1.5\n"] {
            let statuses = run(&mut parser, &mut interp, line);
            assert_eq!(statuses, [LineStatus::Rejected]);
            assert_eq!(parser.parameters(), LineParser::new().parameters());
            assert!(parser.is_idle());
        }
        assert!(interp.queue().moves.is_empty());

        // Still usable afterwards
        assert_eq!(run(&mut parser, &mut interp, b"G1 X1\n"), [LineStatus::Accepted]);
    }

    #[test]
    fn test_accepted_no_ops() {
        let mut parser = LineParser::new();
        let mut interp = interpreter();
        let statuses = run(&mut parser, &mut interp, b"M202 X1000\nM222 S100\n");
        assert_eq!(statuses, [LineStatus::Accepted, LineStatus::Accepted]);
        assert!(interp.queue().moves.is_empty());
    }

    #[test]
    fn test_report_position() {
        let mut parser = LineParser::new();
        let mut interp = interpreter();
        interp.queue_mut().position = Target::new([12_345, -500].into_axes(), 1200);

        let statuses = run(&mut parser, &mut interp, b"M114\n");
        assert_eq!(statuses, [LineStatus::Accepted]);
        assert_eq!(interp.current_position()[Axis::X], 12_345);
        assert_eq!(interp.status().lines, vec![b"X:12.345,Y:-0.500,F:1200\n".to_vec()]);
    }

    #[test]
    fn test_report_endstops() {
        let mut parser = LineParser::new();
        let mut interp: Interp = Interp::with_kinematics(
            MockQueue::default(),
            MockEndstops {
                x_min: Some(false),
                y_min: Some(true),
                ..MockEndstops::default()
            },
            MockStatus::default(),
            UNIT_CONFIG,
        );

        let statuses = run(&mut parser, &mut interp, b"M119\n");
        assert_eq!(statuses, [LineStatus::Accepted]);
        assert_eq!(interp.status().lines, vec![b"X:0,Y:1\n".to_vec()]);
        assert_eq!(interp.endstops().enable_calls, 1);
        assert!(!interp.endstops().enabled);
    }

    #[test]
    fn test_report_endstops_none_configured() {
        let mut parser = LineParser::new();
        let mut interp = interpreter();
        assert_eq!(run(&mut parser, &mut interp, b"M119\n"), [LineStatus::Accepted]);
        assert!(interp.status().lines.is_empty());
    }

    #[test]
    fn test_home_with_back_off() {
        let mut parser = LineParser::new();
        let mut interp = interpreter();
        run(&mut parser, &mut interp, b"G1 X30 Y40\n");

        let statuses = run(&mut parser, &mut interp, b"G28\n");
        assert_eq!(statuses, [LineStatus::Accepted]);

        let homing = UNIT_CONFIG.homing;
        let moves = &interp.queue().moves;
        assert_eq!(moves.len(), 3);

        let approach = moves[1];
        assert_eq!(approach.target[Axis::X], 30_000);
        assert_eq!(approach.target[Axis::Y], -homing.search_travel_um);
        assert_eq!(approach.target.feed, homing.search_fast);
        assert_eq!(
            approach.endstop_check,
            Some(EndstopCheck {
                endstops: EndstopMask::Y_MIN,
                trigger: HomingTrigger::UntilTriggered,
            })
        );

        let back_off = moves[2];
        assert_eq!(back_off.target[Axis::Y], homing.search_travel_um);
        assert_eq!(back_off.target.feed, homing.search_feed_y);
        assert_eq!(
            back_off.endstop_check.map(|c| c.trigger),
            Some(HomingTrigger::UntilReleased)
        );

        // X is zeroed without moving it
        assert_eq!(interp.start_point()[Axis::X], 0);
        assert_eq!(interp.start_point()[Axis::Y], homing.y_min_um);
        assert_eq!(interp.current_position()[Axis::X], 0);
        assert_eq!(interp.next_target()[Axis::X], 0);
        assert_eq!(interp.next_target()[Axis::Y], homing.y_min_um);
        // One origin change, queued behind the search moves
        assert_eq!(interp.queue().start_points, [*interp.start_point()]);
    }

    #[test]
    fn test_home_single_approach_when_fast_is_slow() {
        let mut config = UNIT_CONFIG;
        config.homing.search_fast = 10;
        config.homing.y_min_um = -2000;

        let mut parser = LineParser::new();
        let mut interp: Interp = Interp::with_kinematics(
            MockQueue::default(),
            MockEndstops::default(),
            MockStatus::default(),
            config,
        );

        run(&mut parser, &mut interp, b"G28\n");
        let moves = &interp.queue().moves;
        assert_eq!(moves.len(), 1);
        assert_eq!(moves[0].target.feed, config.homing.search_feed_y);
        assert_eq!(interp.start_point()[Axis::Y], -2000);
    }

    #[test]
    fn test_controlled_stop_mid_move() {
        let mut parser = LineParser::new();
        let mut interp = interpreter();
        run(&mut parser, &mut interp, b"G1 X100 Y100\nG1 X200\n");

        {
            let exec = &mut interp.queue_mut().exec;
            exec.in_flight = true;
            exec.achieved = Target::new([42_000, 17_000].into_axes(), 3000);
        }

        let statuses = run(&mut parser, &mut interp, b"M0\n");
        assert_eq!(statuses, [LineStatus::Accepted]);

        let queue = interp.queue();
        assert_eq!(queue.critical_sections, 1);
        assert!(queue.exec.aborted);
        assert!(queue.exec.flushed);
        assert!(queue.exec.advanced);
        assert_eq!(queue.exec.start_point, Some(queue.exec.achieved));
        assert_eq!(*interp.current_position(), queue.exec.achieved);
        assert_eq!(*interp.start_point(), queue.exec.achieved);

        // Relative moves now continue from where the machine stopped
        run(&mut parser, &mut interp, b"G91\nG1 X1\n");
        assert_eq!(interp.next_target()[Axis::X], 43_000);
        assert_eq!(interp.next_target()[Axis::Y], 17_000);
    }

    #[test]
    fn test_controlled_stop_when_idle() {
        let mut parser = LineParser::new();
        let mut interp = interpreter();
        run(&mut parser, &mut interp, b"G1 X1\n");

        assert_eq!(run(&mut parser, &mut interp, b"M0\n"), [LineStatus::Accepted]);
        assert_eq!(interp.queue().critical_sections, 1);
        assert!(!interp.queue().exec.aborted);
        assert_eq!(interp.start_point()[Axis::X], 1000);
    }

    #[test]
    fn test_emergency_stop_is_final() {
        let mut parser = LineParser::new();
        let mut interp = interpreter();

        let statuses = run(&mut parser, &mut interp, b"G1 X5\nM112\nG1 X6\nG90\n");
        assert_eq!(
            statuses,
            [
                LineStatus::Accepted,
                LineStatus::Accepted,
                LineStatus::Rejected,
                LineStatus::Rejected
            ]
        );
        assert!(interp.is_halted());
        assert!(interp.queue().halted);
        assert!(interp.queue().moves.is_empty());
    }

    #[test]
    fn test_full_queue_rejects_line() {
        let mut parser = LineParser::new();
        let mut interp = interpreter();
        interp.queue_mut().full = true;

        assert_eq!(run(&mut parser, &mut interp, b"G1 X5\n"), [LineStatus::Rejected]);
        // The move did not happen, so the start point stays put
        assert_eq!(interp.start_point()[Axis::X], 0);
    }

    #[test]
    fn test_home_refused_when_queue_too_short() {
        let mut parser = LineParser::new();
        // Room for the first move and one more entry; G28 needs three
        let mut interp: Interp = Interp::with_kinematics(
            MockQueue::with_capacity(2),
            MockEndstops::default(),
            MockStatus::default(),
            UNIT_CONFIG,
        );

        let statuses = run(&mut parser, &mut interp, b"G1 X10 Y10\nG28\n");
        assert_eq!(statuses, [LineStatus::Accepted, LineStatus::Rejected]);

        // Nothing of the homing was queued and no position moved
        assert_eq!(interp.queue().moves.len(), 1);
        assert!(interp.queue().start_points.is_empty());
        let after_move = interp.queue().moves[0].target;
        assert_eq!(*interp.start_point(), after_move);
        assert_eq!(*interp.next_target(), after_move);

        // The next move still plans from where the carriage really is
        interp.queue_mut().capacity = None;
        run(&mut parser, &mut interp, b"G1 X10 Y12\n");
        let next = interp.queue().moves[1].plan;
        assert_eq!(next.delta_um[0], 0);
        assert_eq!(next.delta_um[1], 2000);
    }

    #[test]
    fn test_home_refused_mid_way_restores_positions() {
        let mut parser = LineParser::new();
        let mut interp = interpreter();
        run(&mut parser, &mut interp, b"G1 X10 Y10\nM114\n");
        let start = *interp.start_point();
        let next_target = *interp.next_target();
        let current = *interp.current_position();

        // Room was reported, yet the origin change is refused after the
        // search moves went in
        interp.queue_mut().refuse_origin = true;
        let statuses = run(&mut parser, &mut interp, b"G28\n");
        assert_eq!(statuses, [LineStatus::Rejected]);
        assert!(interp.queue().start_points.is_empty());

        assert_eq!(*interp.start_point(), start);
        assert_eq!(*interp.next_target(), next_target);
        assert_eq!(*interp.current_position(), current);
        assert_eq!(interp.start_point()[Axis::Y], 10_000);
    }

    #[test]
    fn test_corexy_interpreter_plans_coupled_moves() {
        let mut parser = LineParser::new();
        let mut interp: Interp<CoreXy> = CommandInterpreter::with_kinematics(
            MockQueue::default(),
            MockEndstops::default(),
            MockStatus::default(),
            UNIT_CONFIG,
        );

        run(&mut parser, &mut interp, b"G1 X0.003 Y0.001\n");
        let plan = interp.queue().moves[0].plan;
        assert_eq!(plan.delta_um[0], 4);
        assert_eq!(plan.delta_um[1], 2);
    }

    #[test]
    fn test_cartesian_interpreter_plans_direct_moves() {
        let mut parser = LineParser::new();
        let mut interp: Interp<Cartesian> = CommandInterpreter::with_kinematics(
            MockQueue::default(),
            MockEndstops::default(),
            MockStatus::default(),
            UNIT_CONFIG,
        );

        run(&mut parser, &mut interp, b"G1 X0.003 Y0.001\n");
        let plan = interp.queue().moves[0].plan;
        assert_eq!(plan.delta_um[0], 3);
        assert_eq!(plan.delta_um[1], 1);
    }

    #[test]
    fn test_direct_process_without_parser() {
        let mut interp = interpreter();
        assert_eq!(interp.process(&[]), Err(CommandError::MissingCommand));

        let line = [Parameter {
            name: b'G',
            mantissa: 7,
            ..Parameter::EMPTY
        }];
        assert_eq!(
            interp.process(&line),
            Err(CommandError::UnknownCommand {
                letter: b'G',
                code: 7
            })
        );
    }

    #[test]
    fn test_command_lookup() {
        assert_eq!(Command::from_code(b'G', 1), Some(Command::LinearMove));
        assert_eq!(Command::from_code(b'M', 112), Some(Command::EmergencyStop));
        assert_eq!(Command::from_code(b'G', 0), None);
        assert_eq!(Command::from_code(b'X', 1), None);
    }

    #[test]
    fn test_same_input_same_moves() {
        let input = b"G1 X1.5 Y-2 F600\nG91\nG1 X0.25\nG28\nM114\n";

        let mut first = interpreter();
        let mut second = interpreter();
        let mut parser = LineParser::new();
        let a = run(&mut parser, &mut first, input);
        parser.reset();
        let b = run(&mut parser, &mut second, input);

        assert_eq!(a, b);
        assert_eq!(first.queue().moves, second.queue().moves);
        assert_eq!(first.status().lines, second.status().lines);
    }

    /// Builds an axis array from X/Y, padding any further axis with zero.
    trait IntoAxes {
        fn into_axes(self) -> [i32; AXIS_COUNT];
    }

    impl IntoAxes for [i32; 2] {
        fn into_axes(self) -> [i32; AXIS_COUNT] {
            let mut axis = [0; AXIS_COUNT];
            axis[..2].copy_from_slice(&self);
            axis
        }
    }
}
