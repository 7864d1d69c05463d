//! Register allocation for one function.
//!
//! Permanent registers (environment, scope objects, register-resident
//! bindings) are handed out first and live for the whole function. Once the
//! allocator is sealed, temps are taken from a strict stack above the
//! permanent range: every temp is released in reverse acquisition order.

use lodestar_macros::ensure;

use crate::bytecode::Reg;
use crate::error::{EmitError, Result};

/// Register counts of a finished function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegisterLayout {
    /// Registers `0..permanent` hold bindings and scope objects
    pub permanent: u32,
    /// Total registers the frame needs
    pub total: u32,
}

/// Stack-disciplined register allocator.
#[derive(Debug, Default)]
pub struct RegisterAllocator {
    permanent: u32,
    sealed: bool,
    temps: Vec<Reg>,
    high_water: u32,
}

impl RegisterAllocator {
    /// Creates an allocator with no registers in use.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves a register for the lifetime of the function.
    pub fn acquire_permanent(&mut self) -> Result<Reg> {
        ensure!(!self.sealed, EmitError::PermanentAfterTemp);
        let reg = Reg(self.permanent);
        self.permanent += 1;
        self.high_water = self.high_water.max(self.permanent);
        Ok(reg)
    }

    /// Ends the permanent range; further permanent requests fail.
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    /// Pushes a fresh temp.
    pub fn acquire_temp(&mut self) -> Reg {
        self.sealed = true;
        let reg = Reg(self.permanent + self.temps.len() as u32);
        self.temps.push(reg);
        self.high_water = self.high_water.max(reg.0 + 1);
        reg
    }

    /// Pops `reg`, which must be the most recently acquired live temp.
    pub fn release(&mut self, reg: Reg) -> Result<()> {
        match self.temps.last() {
            Some(&top) if top == reg => {
                self.temps.pop();
                Ok(())
            }
            top => Err(EmitError::RegisterDiscipline {
                released: reg,
                expected: top.map_or_else(|| "empty".to_string(), |r| r.to_string()),
            }),
        }
    }

    /// Whether `reg` is in the temp range.
    pub fn is_temp(&self, reg: Reg) -> bool {
        reg.0 >= self.permanent
    }

    /// Number of live temps.
    pub fn depth(&self) -> u32 {
        self.temps.len() as u32
    }

    /// Fails with [`EmitError::TempLeak`] unless exactly `expected` temps are live.
    pub fn check_depth(&self, expected: u32) -> Result<()> {
        let depth = self.depth();
        ensure!(
            depth == expected,
            EmitError::TempLeak {
                count: depth.abs_diff(expected),
            }
        );
        Ok(())
    }

    /// Counts for the frame.
    pub fn layout(&self) -> RegisterLayout {
        RegisterLayout {
            permanent: self.permanent,
            total: self.high_water,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lodestar_macros::{assert_matches, assert_ok};

    #[test]
    fn test_permanents_then_temps() {
        let mut alloc = RegisterAllocator::new();
        let env = assert_ok!(alloc.acquire_permanent());
        let x = assert_ok!(alloc.acquire_permanent());
        alloc.seal();
        let t0 = alloc.acquire_temp();
        let t1 = alloc.acquire_temp();
        assert_eq!((env, x, t0, t1), (Reg(0), Reg(1), Reg(2), Reg(3)));
        assert!(alloc.is_temp(t0));
        assert!(!alloc.is_temp(x));
        assert_ok!(alloc.release(t1));
        assert_ok!(alloc.release(t0));
        assert_eq!(alloc.layout(), RegisterLayout { permanent: 2, total: 4 });
    }

    #[test]
    fn test_out_of_order_release() {
        let mut alloc = RegisterAllocator::new();
        let t0 = alloc.acquire_temp();
        let _t1 = alloc.acquire_temp();
        assert_matches!(
            alloc.release(t0),
            Err(EmitError::RegisterDiscipline { released, .. }) if released == t0
        );
    }

    #[test]
    fn test_double_release() {
        let mut alloc = RegisterAllocator::new();
        let t0 = alloc.acquire_temp();
        assert_ok!(alloc.release(t0));
        assert_matches!(alloc.release(t0), Err(EmitError::RegisterDiscipline { .. }));
    }

    #[test]
    fn test_permanent_after_temp() {
        let mut alloc = RegisterAllocator::new();
        let t = alloc.acquire_temp();
        assert_ok!(alloc.release(t));
        assert_matches!(alloc.acquire_permanent(), Err(EmitError::PermanentAfterTemp));
    }

    #[test]
    fn test_temps_reuse_numbers() {
        let mut alloc = RegisterAllocator::new();
        let a = alloc.acquire_temp();
        assert_ok!(alloc.release(a));
        let b = alloc.acquire_temp();
        assert_eq!(a, b);
        assert_matches!(alloc.check_depth(0), Err(EmitError::TempLeak { count: 1 }));
        assert_ok!(alloc.release(b));
        assert_ok!(alloc.check_depth(0));
        assert_eq!(alloc.layout().total, 1);
    }
}
