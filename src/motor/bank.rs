// Shared duty/tick registers for the four wheels
//
// The control core writes duties and reads ticks through `BankActuator` and
// `BankEncoder`; the backend (bus bridge or simulated drivetrain) reads the
// duties and supplies the ticks. Everything runs on the control loop's task.

use std::cell::RefCell;
use std::rc::Rc;

use super::channel::{Actuator, Encoder};
use super::kinematics::WHEEL_COUNT;

#[derive(Debug, Default)]
struct Registers {
    duty: [f64; WHEEL_COUNT],
    ticks: [i64; WHEEL_COUNT],
}

#[derive(Debug, Clone, Default)]
pub struct WheelBank {
    registers: Rc<RefCell<Registers>>,
}

impl WheelBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Actuator handle for wheel `index`
    pub fn actuator(&self, index: usize) -> BankActuator {
        BankActuator {
            bank: self.clone(),
            index,
        }
    }

    /// Encoder handle for wheel `index` with `resolution` ticks per revolution
    pub fn encoder(&self, index: usize, resolution: f64) -> BankEncoder {
        BankEncoder {
            bank: self.clone(),
            index,
            resolution,
        }
    }

    pub fn duties(&self) -> [f64; WHEEL_COUNT] {
        self.registers.borrow().duty
    }

    pub fn ticks(&self) -> [i64; WHEEL_COUNT] {
        self.registers.borrow().ticks
    }

    pub fn set_ticks(&self, ticks: [i64; WHEEL_COUNT]) {
        self.registers.borrow_mut().ticks = ticks;
    }
}

pub struct BankActuator {
    bank: WheelBank,
    index: usize,
}

impl Actuator for BankActuator {
    fn set_duty(&mut self, duty: f64) {
        self.bank.registers.borrow_mut().duty[self.index] = duty;
    }
}

pub struct BankEncoder {
    bank: WheelBank,
    index: usize,
    resolution: f64,
}

impl Encoder for BankEncoder {
    fn ticks(&mut self) -> i64 {
        self.bank.registers.borrow().ticks[self.index]
    }

    fn resolution(&self) -> f64 {
        self.resolution
    }
}
