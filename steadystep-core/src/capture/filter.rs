//! Sample fields and filter selection

use crate::coils::CoilCurrents;
use crate::pid::PidTerms;

/// Number of defined sample fields
pub const FIELD_COUNT: usize = 13;

/// A control variable that can be sampled, in record order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Field {
    RawEncoderReading,
    CurrentPosition,
    TargetPosition,
    CurrentPhase,
    ControlSignal,
    PTerm,
    ITerm,
    DTerm,
    PhaseShift,
    DesiredPhase,
    CoilA,
    CoilB,
    CurrentError,
}

impl Field {
    pub const ALL: [Field; FIELD_COUNT] = [
        Field::RawEncoderReading,
        Field::CurrentPosition,
        Field::TargetPosition,
        Field::CurrentPhase,
        Field::ControlSignal,
        Field::PTerm,
        Field::ITerm,
        Field::DTerm,
        Field::PhaseShift,
        Field::DesiredPhase,
        Field::CoilA,
        Field::CoilB,
        Field::CurrentError,
    ];

    pub const fn bit(self) -> u16 {
        1 << (self as u16)
    }
}

/// Validated set of sampled fields
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FilterMask(u16);

impl FilterMask {
    const DEFINED: u16 = (1 << FIELD_COUNT) - 1;

    /// Accept a non-empty mask made only of defined field bits
    pub fn new(bits: u16) -> Option<Self> {
        if bits == 0 || bits & !Self::DEFINED != 0 {
            return None;
        }
        Some(Self(bits))
    }

    pub fn bits(self) -> u16 {
        self.0
    }

    /// Values per sample record
    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, field: Field) -> bool {
        self.0 & field.bit() != 0
    }

    /// Selected fields in record order
    pub fn fields(self) -> impl Iterator<Item = Field> {
        Field::ALL.into_iter().filter(move |f| self.contains(*f))
    }
}

/// Live values of every sampleable variable at one instant
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Snapshot {
    pub raw_reading: i32,
    pub current_position: f32,
    pub target_position: f32,
    pub current_phase: u16,
    pub control_signal: i16,
    pub terms: PidTerms,
    pub phase_shift: i32,
    pub desired_phase: u16,
    pub currents: CoilCurrents,
    pub error: f32,
}

impl Snapshot {
    pub const EMPTY: Snapshot = Snapshot {
        raw_reading: 0,
        current_position: 0.0,
        target_position: 0.0,
        current_phase: 0,
        control_signal: 0,
        terms: PidTerms {
            p: 0.0,
            i: 0.0,
            d: 0.0,
        },
        phase_shift: 0,
        desired_phase: 0,
        currents: CoilCurrents { a: 0, b: 0 },
        error: 0.0,
    };

    pub fn value(&self, field: Field) -> f32 {
        match field {
            Field::RawEncoderReading => self.raw_reading as f32,
            Field::CurrentPosition => self.current_position,
            Field::TargetPosition => self.target_position,
            Field::CurrentPhase => self.current_phase as f32,
            Field::ControlSignal => self.control_signal as f32,
            Field::PTerm => self.terms.p,
            Field::ITerm => self.terms.i,
            Field::DTerm => self.terms.d,
            Field::PhaseShift => self.phase_shift as f32,
            Field::DesiredPhase => self.desired_phase as f32,
            Field::CoilA => self.currents.a as f32,
            Field::CoilB => self.currents.b as f32,
            Field::CurrentError => self.error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_validation() {
        assert_eq!(FilterMask::new(0), None);
        assert_eq!(FilterMask::new(1 << FIELD_COUNT), None);
        assert!(FilterMask::new(0x1FFF).is_some());
        assert_eq!(FilterMask::new(0x1FFF).map(FilterMask::len), Some(FIELD_COUNT));
    }

    #[test]
    fn test_fields_in_record_order() {
        let mask = FilterMask::new(0b1_0000_0000_0101).unwrap();
        let mut fields = mask.fields();
        assert_eq!(fields.next(), Some(Field::RawEncoderReading));
        assert_eq!(fields.next(), Some(Field::TargetPosition));
        assert_eq!(fields.next(), Some(Field::CurrentError));
        assert_eq!(fields.next(), None);
        assert_eq!(mask.len(), 3);
    }

    #[test]
    fn test_snapshot_value() {
        let snapshot = Snapshot {
            raw_reading: -12,
            target_position: 3.5,
            currents: CoilCurrents { a: 100, b: -7 },
            ..Default::default()
        };
        assert_eq!(snapshot.value(Field::RawEncoderReading), -12.0);
        assert_eq!(snapshot.value(Field::TargetPosition), 3.5);
        assert_eq!(snapshot.value(Field::CoilB), -7.0);
    }
}
