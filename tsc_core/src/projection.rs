//! Load-switch projection: maps `(PhaseState, FlashMode)` and the
//! process-wide `ControlMode` onto the three-lamp output each load switch
//! drives this tick.

use tsc_common::model::{ControlMode, FlashMode, LoadSwitchOutput, PhaseState};

/// Vehicle-head projection for a phase in `NORMAL` operation.
pub fn vehicle_normal(state: PhaseState, flash_mode: FlashMode, pulse_on: bool) -> LoadSwitchOutput {
    match state {
        PhaseState::Stop | PhaseState::MinStop | PhaseState::Rclr => LoadSwitchOutput::new(true, false, false),
        PhaseState::Caution => LoadSwitchOutput::new(false, true, false),
        PhaseState::Go | PhaseState::Extend => LoadSwitchOutput::new(false, false, true),
        PhaseState::Fya => match flash_mode {
            FlashMode::Red => LoadSwitchOutput::new(pulse_on, false, false),
            FlashMode::Yellow => LoadSwitchOutput::new(false, pulse_on, false),
        },
        PhaseState::Walk | PhaseState::Pclr => LoadSwitchOutput::new(true, false, false),
    }
}

/// Pedestrian-head projection for a phase in `NORMAL` operation. Returns
/// `None` for states that never drive a pedestrian head; the caller only
/// invokes this for pedestrian-capable phases.
pub fn pedestrian_normal(state: PhaseState, pulse_on: bool) -> LoadSwitchOutput {
    match state {
        PhaseState::Stop | PhaseState::Rclr | PhaseState::MinStop | PhaseState::Go | PhaseState::Extend => {
            LoadSwitchOutput::new(true, false, false)
        }
        PhaseState::Pclr => LoadSwitchOutput::new(false, pulse_on, false),
        PhaseState::Walk => LoadSwitchOutput::new(false, false, true),
        PhaseState::Caution | PhaseState::Fya => LoadSwitchOutput::new(true, false, false),
    }
}

/// Vehicle-head projection while in `LS_FLASH` (or `CET`, which runs the
/// flash projection for `cet-delay` seconds before advancing to `NORMAL`).
pub fn vehicle_flash(flash_mode: FlashMode, pulse_on: bool) -> LoadSwitchOutput {
    match flash_mode {
        FlashMode::Red => LoadSwitchOutput::new(pulse_on, false, false),
        FlashMode::Yellow => LoadSwitchOutput::new(false, pulse_on, false),
    }
}

/// Pedestrian-head projection while in `LS_FLASH`/`CET`: always dark-don't-walk.
pub const fn pedestrian_flash() -> LoadSwitchOutput {
    LoadSwitchOutput::new(true, false, false)
}

/// Top-level projection entry point, dispatching on `ControlMode`.
pub fn project_vehicle(
    mode: ControlMode,
    state: PhaseState,
    flash_mode: FlashMode,
    pulse_on: bool,
) -> LoadSwitchOutput {
    match mode {
        ControlMode::Off => LoadSwitchOutput::DARK,
        ControlMode::LsFlash | ControlMode::Cet => vehicle_flash(flash_mode, pulse_on),
        ControlMode::Cxt | ControlMode::Normal => vehicle_normal(state, flash_mode, pulse_on),
    }
}

pub fn project_pedestrian(mode: ControlMode, state: PhaseState, pulse_on: bool) -> LoadSwitchOutput {
    match mode {
        ControlMode::Off => LoadSwitchOutput::DARK,
        ControlMode::LsFlash | ControlMode::Cet => pedestrian_flash(),
        ControlMode::Cxt | ControlMode::Normal => pedestrian_normal(state, pulse_on),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vehicle_stop_is_steady_red() {
        assert_eq!(
            vehicle_normal(PhaseState::Stop, FlashMode::Red, true),
            LoadSwitchOutput::new(true, false, false)
        );
    }

    #[test]
    fn vehicle_go_and_extend_are_steady_green() {
        assert_eq!(
            vehicle_normal(PhaseState::Go, FlashMode::Red, true),
            LoadSwitchOutput::new(false, false, true)
        );
        assert_eq!(
            vehicle_normal(PhaseState::Extend, FlashMode::Red, false),
            LoadSwitchOutput::new(false, false, true)
        );
    }

    #[test]
    fn fya_pulses_yellow_line_per_flash_mode() {
        assert_eq!(
            vehicle_normal(PhaseState::Fya, FlashMode::Yellow, true),
            LoadSwitchOutput::new(false, true, false)
        );
        assert_eq!(
            vehicle_normal(PhaseState::Fya, FlashMode::Yellow, false),
            LoadSwitchOutput::new(false, false, false)
        );
    }

    #[test]
    fn pedestrian_walk_is_steady_walk_lamp() {
        assert_eq!(
            pedestrian_normal(PhaseState::Walk, true),
            LoadSwitchOutput::new(false, false, true)
        );
    }

    #[test]
    fn pedestrian_pclr_pulses_fdw() {
        assert_eq!(
            pedestrian_normal(PhaseState::Pclr, true),
            LoadSwitchOutput::new(false, true, false)
        );
        assert_eq!(
            pedestrian_normal(PhaseState::Pclr, false),
            LoadSwitchOutput::new(false, false, false)
        );
    }

    #[test]
    fn off_mode_is_dark_regardless_of_state() {
        assert_eq!(
            project_vehicle(ControlMode::Off, PhaseState::Go, FlashMode::Red, true),
            LoadSwitchOutput::DARK
        );
        assert_eq!(
            project_pedestrian(ControlMode::Off, PhaseState::Walk, true),
            LoadSwitchOutput::DARK
        );
    }

    #[test]
    fn ls_flash_mode_overrides_state_with_flash_mode() {
        assert_eq!(
            project_vehicle(ControlMode::LsFlash, PhaseState::Go, FlashMode::Yellow, true),
            LoadSwitchOutput::new(false, true, false)
        );
        assert_eq!(
            project_pedestrian(ControlMode::LsFlash, PhaseState::Walk, true),
            LoadSwitchOutput::new(true, false, false)
        );
    }

    #[test]
    fn cxt_mode_uses_normal_projection() {
        assert_eq!(
            project_vehicle(ControlMode::Cxt, PhaseState::Caution, FlashMode::Red, true),
            LoadSwitchOutput::new(false, true, false)
        );
    }
}
