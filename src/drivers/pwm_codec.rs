//! Conversions between PCA9685 on/off counter values, pulse width in ticks and
//! pulse width in milliseconds.
//!
//! A PWM cycle is 4096 ticks. The on and off counters hold the tick at which the
//! output switches, with 4096 as the "always" sentinel: on = 4096 is always on,
//! off = 4096 is always off, and off wins when both are set.
//!
//! Time values use fixed point so repeated conversions do not drift.

use fixed::types::U32F32;

use crate::consts::{
    PCA9685_CLOCK_MAXIMUM_HZ, PCA9685_PRESCALE_MAXIMUM, PCA9685_PRESCALE_MINIMUM, PWM_ALWAYS,
    PWM_MAXIMUM, PWM_TICKS_PER_CYCLE,
};
use crate::error::CodecError;

pub type Hertz = U32F32;
pub type Millis = U32F32;

/// Ticks the output is active for the given counters.
pub fn width(on: u16, off: u16) -> Result<u16, CodecError> {
    check_tick(on)?;
    check_tick(off)?;
    Ok(width_unchecked(on, off))
}

fn width_unchecked(on: u16, off: u16) -> u16 {
    if off > PWM_MAXIMUM {
        0
    } else if on > PWM_MAXIMUM {
        PWM_MAXIMUM
    } else if on <= off {
        off - on
    } else {
        // the pulse starts late in one cycle and ends in the next
        PWM_TICKS_PER_CYCLE + off - on
    }
}

/// Counters producing a pulse of `width` ticks that starts `delay` ticks into the cycle.
///
/// Widths of 4095 ticks or more, up to a whole cycle, are always on.
pub fn from_width(width: u16, delay: u16) -> Result<ChannelValue, CodecError> {
    if width > PWM_ALWAYS {
        return Err(CodecError::WidthOutOfRange(width.into()));
    }
    if delay > PWM_MAXIMUM {
        return Err(CodecError::DelayOutOfRange(delay.into()));
    }

    if width >= PWM_MAXIMUM {
        return Ok(ChannelValue::ALWAYS_ON);
    }
    if width == 0 {
        return Ok(ChannelValue::ALWAYS_OFF);
    }

    let mut off = delay + width;
    if off > PWM_MAXIMUM {
        off -= PWM_TICKS_PER_CYCLE;
    }

    Ok(ChannelValue { on: delay, off })
}

/// `width * 1000 / (4096 * frequency)`
pub fn width_to_ms(frequency: Hertz, width: u16) -> Result<Millis, CodecError> {
    if frequency == Hertz::ZERO {
        return Err(CodecError::InvalidFrequency);
    }
    if width > PWM_MAXIMUM {
        return Err(CodecError::WidthOutOfRange(width.into()));
    }

    let cycle = frequency
        .checked_mul_int(PWM_TICKS_PER_CYCLE.into())
        .ok_or(CodecError::Overflow)?;
    Millis::from_num(width)
        .checked_mul_int(1000)
        .and_then(|scaled| scaled.checked_div(cycle))
        .ok_or(CodecError::Overflow)
}

/// Inverse of [`width_to_ms`], rounded to the nearest tick.
///
/// Returns at most 4096 (one whole cycle); longer times are an error.
pub fn ms_to_ticks(ms: Millis, frequency: Hertz) -> Result<u16, CodecError> {
    if frequency == Hertz::ZERO {
        return Err(CodecError::InvalidFrequency);
    }

    let ticks = ms
        .checked_mul(frequency)
        .and_then(|cycles| cycles.checked_div_int(1000))
        .and_then(|cycles| cycles.checked_mul_int(PWM_TICKS_PER_CYCLE.into()))
        .and_then(|ticks| ticks.checked_round())
        .ok_or(CodecError::Overflow)?
        .to_num::<u32>();

    if ticks > u32::from(PWM_TICKS_PER_CYCLE) {
        return Err(CodecError::WidthOutOfRange(ticks));
    }
    Ok(ticks as u16)
}

/// Counters for a pulse given in milliseconds. Widths of a whole cycle or
/// more than 4095 ticks become always on.
pub fn width_from_ms(
    width_ms: Millis,
    frequency: Hertz,
    delay_ms: Millis,
) -> Result<ChannelValue, CodecError> {
    let width = ms_to_ticks(width_ms, frequency)?;
    let delay = ms_to_ticks(delay_ms, frequency)?;
    if delay > PWM_MAXIMUM {
        return Err(CodecError::DelayOutOfRange(delay.into()));
    }

    from_width(width, delay)
}

/// `clock / 4096 / (prescale + 1)`
pub fn frequency_from_prescale(prescale: u8, clock_hz: u32) -> Result<Hertz, CodecError> {
    check_clock(clock_hz)?;

    Hertz::from_num(clock_hz)
        .checked_div_int(PWM_TICKS_PER_CYCLE.into())
        .and_then(|base| base.checked_div_int(u64::from(prescale) + 1))
        .ok_or(CodecError::Overflow)
}

/// `round(clock / 4096 / frequency) - 1`, limited to the prescales the chip accepts.
///
/// Only a few frequencies are reachable, so callers should recompute the
/// effective frequency with [`frequency_from_prescale`].
pub fn prescale_from_frequency(frequency: Hertz, clock_hz: u32) -> Result<u8, CodecError> {
    if frequency == Hertz::ZERO {
        return Err(CodecError::InvalidFrequency);
    }
    check_clock(clock_hz)?;

    let divider = Hertz::from_num(clock_hz)
        .checked_div_int(PWM_TICKS_PER_CYCLE.into())
        .and_then(|base| base.checked_div(frequency))
        .and_then(|divider| divider.checked_round())
        .ok_or(CodecError::PrescaleOutOfRange)?
        .to_num::<u32>();

    let prescale = divider
        .checked_sub(1)
        .and_then(|prescale| u8::try_from(prescale).ok())
        .ok_or(CodecError::PrescaleOutOfRange)?;
    if !(PCA9685_PRESCALE_MINIMUM..=PCA9685_PRESCALE_MAXIMUM).contains(&prescale) {
        return Err(CodecError::PrescaleOutOfRange);
    }
    Ok(prescale)
}

fn check_tick(value: u16) -> Result<(), CodecError> {
    if value > PWM_ALWAYS {
        return Err(CodecError::TickOutOfRange(value));
    }
    Ok(())
}

fn check_clock(clock_hz: u32) -> Result<(), CodecError> {
    if clock_hz == 0 || clock_hz > PCA9685_CLOCK_MAXIMUM_HZ {
        return Err(CodecError::InvalidClockSpeed(clock_hz));
    }
    Ok(())
}

/// On and off counters of one PWM channel, as stored in its LEDn_ON_L..LEDn_OFF_H registers.
///
/// Never mutated; derive a new value instead.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelValue {
    on: u16,
    off: u16,
}

impl ChannelValue {
    pub const ALWAYS_ON: Self = Self {
        on: PWM_ALWAYS,
        off: 0,
    };
    pub const ALWAYS_OFF: Self = Self {
        on: 0,
        off: PWM_ALWAYS,
    };

    pub fn new(on: u16, off: u16) -> Result<Self, CodecError> {
        check_tick(on)?;
        check_tick(off)?;
        Ok(Self { on, off })
    }

    pub fn on(&self) -> u16 {
        self.on
    }

    pub fn off(&self) -> u16 {
        self.off
    }

    pub fn width(&self) -> u16 {
        width_unchecked(self.on, self.off)
    }

    pub fn from_width(width: u16, delay: u16) -> Result<Self, CodecError> {
        from_width(width, delay)
    }

    pub fn from_width_ms(
        width_ms: Millis,
        frequency: Hertz,
        delay_ms: Millis,
    ) -> Result<Self, CodecError> {
        width_from_ms(width_ms, frequency, delay_ms)
    }

    /// Same start tick, new width.
    pub fn with_width(&self, width: u16) -> Result<Self, CodecError> {
        let delay = if self.on > PWM_MAXIMUM { 0 } else { self.on };
        from_width(width, delay)
    }

    pub fn to_ms(&self, frequency: Hertz) -> Result<Millis, CodecError> {
        width_to_ms(frequency, self.width())
    }

    /// ON_L, ON_H, OFF_L, OFF_H
    pub fn to_bytes(&self) -> [u8; 4] {
        let on = self.on.to_le_bytes();
        let off = self.off.to_le_bytes();
        [on[0], on[1], off[0], off[1]]
    }

    /// Decodes a register group. The full on/off bit wins over the counter bits
    /// and the reserved top bits are ignored.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        let [on_low, on_high, off_low, off_high] = bytes
            .get(..4)
            .and_then(|group| <[u8; 4]>::try_from(group).ok())
            .ok_or(CodecError::ShortRegisterData(bytes.len()))?;

        Ok(Self {
            on: counter(u16::from_le_bytes([on_low, on_high])),
            off: counter(u16::from_le_bytes([off_low, off_high])),
        })
    }
}

fn counter(raw: u16) -> u16 {
    if raw & PWM_ALWAYS != 0 {
        PWM_ALWAYS
    } else {
        raw & PWM_MAXIMUM
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::PCA9685_INTERNAL_CLOCK_HZ;

    #[test]
    fn width_within_one_cycle() {
        assert_eq!(width(100, 400).unwrap(), 300);
        assert_eq!(width(250, 250).unwrap(), 0);
    }

    #[test]
    fn width_spanning_cycle_boundary() {
        assert_eq!(width(4000, 100).unwrap(), 196);
    }

    #[test]
    fn always_sentinels() {
        assert_eq!(width(PWM_ALWAYS, 0).unwrap(), 4095);
        assert_eq!(width(10, PWM_ALWAYS).unwrap(), 0);
        // off wins when both are set
        assert_eq!(width(PWM_ALWAYS, PWM_ALWAYS).unwrap(), 0);
        assert_eq!(ChannelValue::new(PWM_ALWAYS, PWM_ALWAYS).unwrap().width(), 0);

        assert_eq!(from_width(4095, 17).unwrap(), ChannelValue::ALWAYS_ON);
        assert_eq!(from_width(0, 17).unwrap(), ChannelValue::ALWAYS_OFF);
    }

    #[test]
    fn whole_cycle_width_is_always_on() {
        assert_eq!(from_width(PWM_ALWAYS, 0), Ok(ChannelValue::ALWAYS_ON));
        assert_eq!(from_width(PWM_ALWAYS, 4095), Ok(ChannelValue::ALWAYS_ON));
        assert_eq!(
            ChannelValue::from_width(1, 200).unwrap().with_width(PWM_ALWAYS),
            Ok(ChannelValue::ALWAYS_ON)
        );
        assert_eq!(
            from_width(PWM_ALWAYS + 1, 0),
            Err(CodecError::WidthOutOfRange(4097))
        );
    }

    #[test]
    fn from_width_wraps_off_into_next_cycle() {
        let value = from_width(300, 3900).unwrap();
        assert_eq!((value.on(), value.off()), (3900, 104));
        assert_eq!(value.width(), 300);
    }

    #[test]
    fn width_survives_from_width_for_any_delay() {
        for delay in [0u16, 1, 1000, 2048, 4000, 4095] {
            for w in 0..=PWM_MAXIMUM {
                let value = from_width(w, delay).unwrap();
                assert_eq!(value.width(), w, "width {} delay {}", w, delay);
            }
        }
    }

    #[test]
    fn bad_arguments_are_errors() {
        assert_eq!(width(4097, 0), Err(CodecError::TickOutOfRange(4097)));
        assert_eq!(ChannelValue::new(0, 5000), Err(CodecError::TickOutOfRange(5000)));
        assert_eq!(from_width(4097, 0), Err(CodecError::WidthOutOfRange(4097)));
        assert_eq!(from_width(10, 4096), Err(CodecError::DelayOutOfRange(4096)));
        assert_eq!(width_to_ms(Hertz::ZERO, 10), Err(CodecError::InvalidFrequency));
        assert_eq!(
            prescale_from_frequency(Hertz::ZERO, PCA9685_INTERNAL_CLOCK_HZ),
            Err(CodecError::InvalidFrequency)
        );
        assert_eq!(
            frequency_from_prescale(121, 60_000_000),
            Err(CodecError::InvalidClockSpeed(60_000_000))
        );
    }

    #[test]
    fn prescale_limits() {
        let clock = PCA9685_INTERNAL_CLOCK_HZ;
        // above what prescale 3 allows
        assert_eq!(
            prescale_from_frequency(Hertz::from_num(2000), clock),
            Err(CodecError::PrescaleOutOfRange)
        );
        // below what prescale 255 allows
        assert_eq!(
            prescale_from_frequency(Hertz::from_num(10), clock),
            Err(CodecError::PrescaleOutOfRange)
        );
        assert_eq!(prescale_from_frequency(Hertz::from_num(1526), clock), Ok(3));
        assert_eq!(prescale_from_frequency(Hertz::from_num(24), clock), Ok(253));
    }

    #[test]
    fn servo_frequency_quantization() {
        let clock = PCA9685_INTERNAL_CLOCK_HZ;
        let requested = Hertz::from_num(50);

        let prescale = prescale_from_frequency(requested, clock).unwrap();
        assert_eq!(prescale, 121);

        let effective = frequency_from_prescale(prescale, clock).unwrap();
        let step = frequency_from_prescale(prescale - 1, clock).unwrap() - effective;
        let error = if effective > requested {
            effective - requested
        } else {
            requested - effective
        };
        assert!(error <= step, "{} is more than one step from 50 Hz", effective);

        // going round again settles on the same prescale
        let again = prescale_from_frequency(effective, clock).unwrap();
        assert_eq!(again, prescale);
        assert_eq!(frequency_from_prescale(again, clock).unwrap(), effective);
    }

    #[test]
    fn milliseconds_to_ticks_and_back() {
        let frequency = Hertz::from_num(50);

        let value = width_from_ms(Millis::from_num(1.5), frequency, Millis::ZERO).unwrap();
        assert_eq!((value.on(), value.off()), (0, 307));

        let ms = value.to_ms(frequency).unwrap();
        assert!(ms > Millis::from_num(1.49) && ms < Millis::from_num(1.5));

        // a whole 20 ms cycle is always on, more than that is rejected
        assert_eq!(
            width_from_ms(Millis::from_num(20), frequency, Millis::ZERO).unwrap(),
            ChannelValue::ALWAYS_ON
        );
        assert!(matches!(
            width_from_ms(Millis::from_num(25), frequency, Millis::ZERO),
            Err(CodecError::WidthOutOfRange(_))
        ));
    }

    #[test]
    fn delay_in_milliseconds() {
        let frequency = Hertz::from_num(50);
        let value =
            width_from_ms(Millis::from_num(1), frequency, Millis::from_num(19.5)).unwrap();
        // 19.5 ms is tick 3994, the 205 tick pulse wraps
        assert_eq!(value.on(), 3994);
        assert_eq!(value.off(), 3994 + 205 - 4096);
        assert_eq!(value.width(), 205);
    }

    #[test]
    fn with_width_keeps_the_start() {
        let value = ChannelValue::new(100, 400).unwrap();
        let wider = value.with_width(1000).unwrap();
        assert_eq!((wider.on(), wider.off()), (100, 1100));
        assert_eq!(value.width(), 300);

        assert_eq!(ChannelValue::ALWAYS_ON.with_width(10).unwrap().on(), 0);
    }

    #[test]
    fn register_bytes() {
        let value = ChannelValue::new(0x0123, 0x0456).unwrap();
        assert_eq!(value.to_bytes(), [0x23, 0x01, 0x56, 0x04]);
        assert_eq!(ChannelValue::from_bytes(&value.to_bytes()).unwrap(), value);

        assert_eq!(ChannelValue::ALWAYS_OFF.to_bytes(), [0, 0, 0, 0x10]);
        // full off bit with stale counter bits still reads as always off
        let value = ChannelValue::from_bytes(&[0x10, 0x00, 0x34, 0x12]).unwrap();
        assert_eq!((value.on(), value.off()), (0x10, PWM_ALWAYS));
        assert_eq!(value.width(), 0);
        assert_eq!(
            ChannelValue::from_bytes(&[1, 2, 3]),
            Err(CodecError::ShortRegisterData(3))
        );
    }
}
