//! Drive actuator trait and the dual H-bridge implementation.

use embedded_hal::digital::{OutputPin, PinState};
use embedded_hal::pwm::SetDutyCycle;
use pothole_proto::DriveCommand;

/// Motor speed applied at startup, in percent of full duty.
pub const DEFAULT_SPEED_PERCENT: u8 = 75;

/// Error type for actuator operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ActuatorError {
    /// Failed to set a direction pin low/high.
    Gpio,
    /// Failed to set an enable line's duty cycle.
    UnableToSetDuty,
    /// The actuator task has gone away.
    Disconnected,
}

impl core::fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Gpio => write!(f, "direction pin error"),
            Self::UnableToSetDuty => write!(f, "unable to set duty cycle"),
            Self::Disconnected => write!(f, "actuator disconnected"),
        }
    }
}

/// Something that moves the rover.
pub trait Actuator {
    fn apply(&mut self, command: DriveCommand) -> Result<(), ActuatorError>;
}

impl<T: Actuator + ?Sized> Actuator for &mut T {
    #[inline]
    fn apply(&mut self, command: DriveCommand) -> Result<(), ActuatorError> {
        (**self).apply(command)
    }
}

#[cfg(feature = "std")]
impl<T: Actuator + ?Sized> Actuator for std::boxed::Box<T> {
    #[inline]
    fn apply(&mut self, command: DriveCommand) -> Result<(), ActuatorError> {
        (**self).apply(command)
    }
}

/// Direction input levels `[in1, in2, in3, in4]` for a command.
///
/// `in1`/`in2` drive the left motor, `in3`/`in4` the right one.
#[must_use]
pub const fn direction_levels(command: DriveCommand) -> [bool; 4] {
    match command {
        DriveCommand::Forward => [true, false, true, false],
        DriveCommand::Backward => [false, true, false, true],
        DriveCommand::Left => [false, true, true, false],
        DriveCommand::Right => [true, false, false, true],
        DriveCommand::Stop => [false, false, false, false],
    }
}

/// L298N-style dual H-bridge: four direction inputs, two PWM enables.
pub struct HBridgeDrive<P, E> {
    inputs: [P; 4],
    enable_a: E,
    enable_b: E,
    speed_percent: u8,
}

impl<P: OutputPin, E: SetDutyCycle> HBridgeDrive<P, E> {
    /// Take the pins, stop both motors and set the default speed.
    pub fn new(inputs: [P; 4], enable_a: E, enable_b: E) -> Result<Self, ActuatorError> {
        let mut drive = Self {
            inputs,
            enable_a,
            enable_b,
            speed_percent: 0,
        };
        drive.apply(DriveCommand::Stop)?;
        drive.set_speed(DEFAULT_SPEED_PERCENT)?;
        Ok(drive)
    }

    /// Set both enables to `percent` of full duty (clamped to 100).
    pub fn set_speed(&mut self, percent: u8) -> Result<(), ActuatorError> {
        let percent = percent.min(100);
        self.enable_a
            .set_duty_cycle_percent(percent)
            .map_err(|_| ActuatorError::UnableToSetDuty)?;
        self.enable_b
            .set_duty_cycle_percent(percent)
            .map_err(|_| ActuatorError::UnableToSetDuty)?;
        self.speed_percent = percent;
        Ok(())
    }

    pub fn speed(&self) -> u8 {
        self.speed_percent
    }
}

impl<P: OutputPin, E: SetDutyCycle> Actuator for HBridgeDrive<P, E> {
    fn apply(&mut self, command: DriveCommand) -> Result<(), ActuatorError> {
        for (pin, level) in self.inputs.iter_mut().zip(direction_levels(command)) {
            pin.set_state(PinState::from(level))
                .map_err(|_| ActuatorError::Gpio)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use core::convert::Infallible;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Clone)]
    struct SharedPin(Rc<RefCell<bool>>);

    impl embedded_hal::digital::ErrorType for SharedPin {
        type Error = Infallible;
    }

    impl OutputPin for SharedPin {
        fn set_low(&mut self) -> Result<(), Infallible> {
            *self.0.borrow_mut() = false;
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Infallible> {
            *self.0.borrow_mut() = true;
            Ok(())
        }
    }

    #[derive(Clone)]
    struct SharedPwm(Rc<RefCell<u16>>);

    impl embedded_hal::pwm::ErrorType for SharedPwm {
        type Error = Infallible;
    }

    impl SetDutyCycle for SharedPwm {
        fn max_duty_cycle(&self) -> u16 {
            1000
        }

        fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Infallible> {
            *self.0.borrow_mut() = duty;
            Ok(())
        }
    }

    struct Rig {
        pins: [SharedPin; 4],
        ena: SharedPwm,
        enb: SharedPwm,
    }

    impl Rig {
        fn new() -> Self {
            Self {
                pins: core::array::from_fn(|_| SharedPin(Rc::new(RefCell::new(true)))),
                ena: SharedPwm(Rc::new(RefCell::new(0))),
                enb: SharedPwm(Rc::new(RefCell::new(0))),
            }
        }

        fn levels(&self) -> [bool; 4] {
            core::array::from_fn(|i| *self.pins[i].0.borrow())
        }

        fn drive(&self) -> HBridgeDrive<SharedPin, SharedPwm> {
            HBridgeDrive::new(self.pins.clone(), self.ena.clone(), self.enb.clone()).unwrap()
        }
    }

    #[test]
    fn test_new_stops_and_sets_default_speed() {
        let rig = Rig::new();
        let drive = rig.drive();
        assert_eq!(rig.levels(), [false; 4]);
        assert_eq!(*rig.ena.0.borrow(), 750);
        assert_eq!(*rig.enb.0.borrow(), 750);
        assert_eq!(drive.speed(), DEFAULT_SPEED_PERCENT);
    }

    #[test]
    fn test_direction_mapping() {
        let rig = Rig::new();
        let mut drive = rig.drive();

        drive.apply(DriveCommand::Forward).unwrap();
        assert_eq!(rig.levels(), [true, false, true, false]);
        drive.apply(DriveCommand::Backward).unwrap();
        assert_eq!(rig.levels(), [false, true, false, true]);
        drive.apply(DriveCommand::Left).unwrap();
        assert_eq!(rig.levels(), [false, true, true, false]);
        drive.apply(DriveCommand::Right).unwrap();
        assert_eq!(rig.levels(), [true, false, false, true]);
        drive.apply(DriveCommand::Stop).unwrap();
        assert_eq!(rig.levels(), [false; 4]);
    }

    #[test]
    fn test_speed_is_clamped() {
        let rig = Rig::new();
        let mut drive = rig.drive();
        drive.set_speed(150).unwrap();
        assert_eq!(drive.speed(), 100);
        assert_eq!(*rig.ena.0.borrow(), 1000);
    }
}
