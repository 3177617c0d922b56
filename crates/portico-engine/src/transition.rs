//! Per-kind transition tables.
//!
//! After a successful activation a device walks through a fixed list of
//! stages. Each stage waits `delay` after the previous stage completed,
//! publishes its updates in order and moves the device to `phase`. The last
//! stage always returns the device to [`Phase::Closed`].
//!
//! | kind | stage 0 (t=0) | stage 1 | stage 2 | stage 3 |
//! |---|---|---|---|---|
//! | Lock | Unsecured | +opened: Secured | | |
//! | Door | position 1 | +opened: Stopped, position 0 | | |
//! | GarageDoor | Opening | +closing: Open | +opened: Closing | +opening: Closed |
//! | Gate | Increasing | +closing: Open | +opened: Decreasing | +opening: Closed |
//! | Gate (not temporized) | position 100 | +opened: position 0 | | |
//!
//! Travel kinds take the *opening* travel from `closing_time` and the
//! *closing* travel from `opening_time`. Existing installations are tuned
//! against that mapping, so it is kept as is.

use std::fmt;
use std::time::Duration;

use portico_core::constants::{
    DOOR_POSITION_CLOSED, DOOR_POSITION_OPEN, GATE_POSITION_CLOSED, GATE_POSITION_OPEN,
};
use portico_core::{DeviceKind, DurationConfig};
use serde::{Deserialize, Serialize};

use crate::event::{DoorState, LockState, PositionState, StateUpdate, TargetDoorState};

/// Lifecycle phase of a simulated device.
///
/// Locks only use `Closed` (secured) and `Open` (unsecured).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Closed,
    Opening,
    Open,
    Closing,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Closed => "Closed",
            Phase::Opening => "Opening",
            Phase::Open => "Open",
            Phase::Closing => "Closing",
        };
        write!(f, "{s}")
    }
}

/// One step of a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    /// Wait after the previous stage before this one fires.
    pub delay: Duration,
    pub updates: Vec<StateUpdate>,
    pub phase: Phase,
}

impl Stage {
    fn new(delay: Duration, phase: Phase, updates: Vec<StateUpdate>) -> Self {
        Self {
            delay,
            updates,
            phase,
        }
    }
}

/// Ordered stages of one activation cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionTable {
    stages: Vec<Stage>,
}

impl TransitionTable {
    /// Build the cycle for `kind` with the given timings.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use portico_core::{DeviceKind, DurationConfig};
    /// use portico_engine::{Phase, TransitionTable};
    ///
    /// let mut durations = DurationConfig::fallback("Garage", DeviceKind::GarageDoor);
    /// durations.opening_time = 5;
    /// durations.closing_time = 8;
    /// durations.opened_time = 15;
    ///
    /// let table = TransitionTable::for_device(DeviceKind::GarageDoor, &durations);
    /// assert_eq!(table.fire_offsets(), vec![
    ///     Duration::ZERO,
    ///     Duration::from_secs(8),
    ///     Duration::from_secs(23),
    ///     Duration::from_secs(28),
    /// ]);
    /// assert_eq!(table.final_phase(), Phase::Closed);
    /// ```
    pub fn for_device(kind: DeviceKind, durations: &DurationConfig) -> Self {
        let stages = match kind {
            DeviceKind::Lock => lock_cycle(durations),
            DeviceKind::Door => door_cycle(durations),
            DeviceKind::GarageDoor => garage_door_cycle(durations),
            DeviceKind::Gate if durations.temporized => gate_cycle(durations),
            DeviceKind::Gate => instant_gate_cycle(durations),
        };
        Self { stages }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn into_stages(self) -> Vec<Stage> {
        self.stages
    }

    /// Offset of each stage from the start of the cycle.
    pub fn fire_offsets(&self) -> Vec<Duration> {
        self.stages
            .iter()
            .scan(Duration::ZERO, |elapsed, stage| {
                *elapsed += stage.delay;
                Some(*elapsed)
            })
            .collect()
    }

    /// Time from activation until the device is back in its initial state.
    pub fn total_duration(&self) -> Duration {
        self.stages.iter().map(|s| s.delay).sum()
    }

    pub fn final_phase(&self) -> Phase {
        self.stages.last().map_or(Phase::Closed, |s| s.phase)
    }

    /// Every update of the cycle in emission order.
    pub fn updates(&self) -> Vec<StateUpdate> {
        self.stages
            .iter()
            .flat_map(|s| s.updates.iter().copied())
            .collect()
    }
}

fn lock_cycle(d: &DurationConfig) -> Vec<Stage> {
    vec![
        Stage::new(
            Duration::ZERO,
            Phase::Open,
            vec![StateUpdate::LockState(LockState::Unsecured)],
        ),
        Stage::new(
            d.opened(),
            Phase::Closed,
            vec![StateUpdate::LockState(LockState::Secured)],
        ),
    ]
}

fn door_cycle(d: &DurationConfig) -> Vec<Stage> {
    vec![
        Stage::new(
            Duration::ZERO,
            Phase::Open,
            vec![
                StateUpdate::TargetPosition(DOOR_POSITION_OPEN),
                StateUpdate::CurrentPosition(DOOR_POSITION_OPEN),
            ],
        ),
        Stage::new(
            d.opened(),
            Phase::Closed,
            vec![
                StateUpdate::PositionState(PositionState::Stopped),
                StateUpdate::TargetPosition(DOOR_POSITION_CLOSED),
                StateUpdate::CurrentPosition(DOOR_POSITION_CLOSED),
            ],
        ),
    ]
}

fn garage_door_cycle(d: &DurationConfig) -> Vec<Stage> {
    vec![
        Stage::new(
            Duration::ZERO,
            Phase::Opening,
            vec![
                StateUpdate::CurrentDoorState(DoorState::Opening),
                StateUpdate::TargetDoorState(TargetDoorState::Open),
            ],
        ),
        Stage::new(
            d.closing(),
            Phase::Open,
            vec![StateUpdate::CurrentDoorState(DoorState::Open)],
        ),
        Stage::new(
            d.opened(),
            Phase::Closing,
            vec![
                StateUpdate::CurrentDoorState(DoorState::Closing),
                StateUpdate::TargetDoorState(TargetDoorState::Closed),
            ],
        ),
        Stage::new(
            d.opening(),
            Phase::Closed,
            vec![StateUpdate::CurrentDoorState(DoorState::Closed)],
        ),
    ]
}

fn gate_cycle(d: &DurationConfig) -> Vec<Stage> {
    vec![
        Stage::new(
            Duration::ZERO,
            Phase::Opening,
            vec![
                StateUpdate::PositionState(PositionState::Increasing),
                StateUpdate::TargetPosition(GATE_POSITION_OPEN),
            ],
        ),
        Stage::new(
            d.closing(),
            Phase::Open,
            vec![
                StateUpdate::PositionState(PositionState::Stopped),
                StateUpdate::CurrentPosition(GATE_POSITION_OPEN),
            ],
        ),
        Stage::new(
            d.opened(),
            Phase::Closing,
            vec![
                StateUpdate::PositionState(PositionState::Decreasing),
                StateUpdate::TargetPosition(GATE_POSITION_CLOSED),
            ],
        ),
        Stage::new(
            d.opening(),
            Phase::Closed,
            vec![
                StateUpdate::PositionState(PositionState::Stopped),
                StateUpdate::CurrentPosition(GATE_POSITION_CLOSED),
            ],
        ),
    ]
}

fn instant_gate_cycle(d: &DurationConfig) -> Vec<Stage> {
    vec![
        Stage::new(
            Duration::ZERO,
            Phase::Open,
            vec![
                StateUpdate::TargetPosition(GATE_POSITION_OPEN),
                StateUpdate::CurrentPosition(GATE_POSITION_OPEN),
            ],
        ),
        Stage::new(
            d.opened(),
            Phase::Closed,
            vec![
                StateUpdate::TargetPosition(GATE_POSITION_CLOSED),
                StateUpdate::CurrentPosition(GATE_POSITION_CLOSED),
            ],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn durations(kind: DeviceKind, o: u64, c: u64, t: u64) -> DurationConfig {
        DurationConfig {
            name: "Device".to_string(),
            kind,
            opening_time: o,
            closing_time: c,
            opened_time: t,
            temporized: true,
        }
    }

    fn secs(values: &[u64]) -> Vec<Duration> {
        values.iter().map(|s| Duration::from_secs(*s)).collect()
    }

    #[rstest]
    #[case(DeviceKind::Lock, &[0, 15])]
    #[case(DeviceKind::Door, &[0, 15])]
    #[case(DeviceKind::GarageDoor, &[0, 8, 23, 28])]
    #[case(DeviceKind::Gate, &[0, 8, 23, 28])]
    fn test_fire_offsets(#[case] kind: DeviceKind, #[case] expected: &[u64]) {
        let table = TransitionTable::for_device(kind, &durations(kind, 5, 8, 15));
        assert_eq!(table.fire_offsets(), secs(expected));
        assert_eq!(table.total_duration(), *secs(expected).last().unwrap());
    }

    #[rstest]
    #[case(DeviceKind::Lock)]
    #[case(DeviceKind::Door)]
    #[case(DeviceKind::GarageDoor)]
    #[case(DeviceKind::Gate)]
    fn test_every_cycle_returns_to_closed(#[case] kind: DeviceKind) {
        let table = TransitionTable::for_device(kind, &durations(kind, 1, 2, 3));
        assert_eq!(table.final_phase(), Phase::Closed);
        assert_eq!(table.stages()[0].delay, Duration::ZERO);
        assert_ne!(table.stages()[0].phase, Phase::Closed);
    }

    #[test]
    fn test_lock_updates() {
        let table =
            TransitionTable::for_device(DeviceKind::Lock, &durations(DeviceKind::Lock, 0, 0, 5));
        assert_eq!(
            table.updates(),
            vec![
                StateUpdate::LockState(LockState::Unsecured),
                StateUpdate::LockState(LockState::Secured),
            ]
        );
    }

    #[test]
    fn test_door_updates() {
        let table =
            TransitionTable::for_device(DeviceKind::Door, &durations(DeviceKind::Door, 0, 0, 10));
        assert_eq!(
            table.updates(),
            vec![
                StateUpdate::TargetPosition(1),
                StateUpdate::CurrentPosition(1),
                StateUpdate::PositionState(PositionState::Stopped),
                StateUpdate::TargetPosition(0),
                StateUpdate::CurrentPosition(0),
            ]
        );
    }

    /// Opening travel uses `closing_time`, closing travel uses `opening_time`.
    #[test]
    fn test_garage_door_travel_parameters_are_swapped() {
        let table = TransitionTable::for_device(
            DeviceKind::GarageDoor,
            &durations(DeviceKind::GarageDoor, 5, 8, 15),
        );
        let stages = table.stages();
        assert_eq!(stages[1].phase, Phase::Open);
        assert_eq!(stages[1].delay, Duration::from_secs(8));
        assert_eq!(stages[3].phase, Phase::Closed);
        assert_eq!(stages[3].delay, Duration::from_secs(5));
    }

    #[test]
    fn test_gate_reports_percentages() {
        let table =
            TransitionTable::for_device(DeviceKind::Gate, &durations(DeviceKind::Gate, 5, 8, 15));
        assert_eq!(
            table.updates(),
            vec![
                StateUpdate::PositionState(PositionState::Increasing),
                StateUpdate::TargetPosition(100),
                StateUpdate::PositionState(PositionState::Stopped),
                StateUpdate::CurrentPosition(100),
                StateUpdate::PositionState(PositionState::Decreasing),
                StateUpdate::TargetPosition(0),
                StateUpdate::PositionState(PositionState::Stopped),
                StateUpdate::CurrentPosition(0),
            ]
        );
    }

    #[test]
    fn test_non_temporized_gate_has_no_moving_phase() {
        let mut config = durations(DeviceKind::Gate, 5, 8, 15);
        config.temporized = false;
        let table = TransitionTable::for_device(DeviceKind::Gate, &config);

        assert_eq!(table.fire_offsets(), secs(&[0, 15]));
        assert!(
            table
                .stages()
                .iter()
                .all(|s| matches!(s.phase, Phase::Open | Phase::Closed))
        );
        assert!(
            !table
                .updates()
                .iter()
                .any(|u| matches!(u, StateUpdate::PositionState(_)))
        );
    }
}
