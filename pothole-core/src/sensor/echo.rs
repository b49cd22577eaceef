use core::time::Duration;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use log::trace;

use super::{DistanceSensor, Reading};
use crate::time::{duration_ns, Clock};

/// Speed of sound in air at roughly 20 °C.
pub const SPEED_OF_SOUND_CM_PER_S: f64 = 34_300.0;

/// Ultrasonic ranging parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EchoConfig {
    /// Trigger pulse width in microseconds.
    pub trigger_pulse_us: u32,
    /// Bound on each of the two echo edge waits.
    pub edge_timeout: Duration,
    pub speed_of_sound_cm_per_s: f64,
}

impl Default for EchoConfig {
    fn default() -> Self {
        Self {
            trigger_pulse_us: 10,
            edge_timeout: Duration::from_millis(100),
            speed_of_sound_cm_per_s: SPEED_OF_SOUND_CM_PER_S,
        }
    }
}

/// Trigger/echo ultrasonic ranger (HC-SR04 style).
pub struct EchoSensor<TRIG, ECHO, D, C> {
    trigger: TRIG,
    echo: ECHO,
    delay: D,
    clock: C,
    config: EchoConfig,
}

impl<TRIG, ECHO, D, C> EchoSensor<TRIG, ECHO, D, C>
where
    TRIG: OutputPin,
    ECHO: InputPin,
    D: DelayNs,
    C: Clock,
{
    pub fn new(trigger: TRIG, echo: ECHO, delay: D, clock: C, config: EchoConfig) -> Self {
        Self {
            trigger,
            echo,
            delay,
            clock,
            config,
        }
    }

    /// Spin while the echo line is at `level`. Returns the time it changed,
    /// or `None` on timeout or pin error.
    fn wait_while(&mut self, level: bool, timeout_ns: u64) -> Option<u64> {
        let start = self.clock.now_ns();
        loop {
            let now = self.clock.now_ns();
            match self.echo.is_high() {
                Ok(high) if high != level => return Some(now),
                Ok(_) => {}
                Err(_) => return None,
            }
            if now.saturating_sub(start) > timeout_ns {
                return None;
            }
            core::hint::spin_loop();
        }
    }

    fn measure(&mut self) -> Option<u64> {
        self.trigger.set_high().ok()?;
        self.delay.delay_us(self.config.trigger_pulse_us);
        self.trigger.set_low().ok()?;

        let timeout_ns = duration_ns(self.config.edge_timeout);
        let Some(rise) = self.wait_while(false, timeout_ns) else {
            trace!("echo: no rising edge");
            return None;
        };
        let Some(fall) = self.wait_while(true, timeout_ns) else {
            trace!("echo: no falling edge");
            return None;
        };
        Some(fall - rise)
    }
}

impl<TRIG, ECHO, D, C> DistanceSensor for EchoSensor<TRIG, ECHO, D, C>
where
    TRIG: OutputPin,
    ECHO: InputPin,
    D: DelayNs,
    C: Clock,
{
    fn poll(&mut self) -> Reading {
        match self.measure() {
            Some(elapsed_ns) => {
                let elapsed_s = elapsed_ns as f64 / 1e9;
                Reading::from_cm(elapsed_s * self.config.speed_of_sound_cm_per_s / 2.0)
            }
            None => Reading::NoReading,
        }
    }
}
