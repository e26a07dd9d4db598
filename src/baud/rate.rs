//! The closed set of standard serial rates the sniffer recognises

use std::fmt;

/// Recognised rates, in menu order
pub const STANDARD_RATES: [u32; 5] = [9600, 19200, 38400, 57600, 115200];

/// A standard serial bit rate. Construction is only possible from
/// `STANDARD_RATES`, so holding one means the rate is supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BaudRate(u32);

impl BaudRate {
    pub const B9600: Self = Self(9600);
    pub const B19200: Self = Self(19200);
    pub const B38400: Self = Self(38400);
    pub const B57600: Self = Self(57600);
    pub const B115200: Self = Self(115200);

    pub const ALL: [Self; 5] = [
        Self::B9600,
        Self::B19200,
        Self::B38400,
        Self::B57600,
        Self::B115200,
    ];

    /// Accept `value` only if it is exactly one of the standard rates
    pub fn from_standard(value: u32) -> Option<Self> {
        STANDARD_RATES.contains(&value).then_some(Self(value))
    }

    /// Map a manual menu key `'1'..='5'` to its rate
    pub fn from_menu_key(key: u8) -> Option<Self> {
        match key {
            b'1'..=b'5' => Some(Self::ALL[(key - b'1') as usize]),
            _ => None,
        }
    }

    pub fn bits_per_second(self) -> u32 {
        self.0
    }

    /// Nominal duration of one bit in microseconds
    #[cfg(test)]
    pub fn bit_period_us(self) -> u32 {
        1_000_000 / self.0
    }
}

impl fmt::Display for BaudRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_standard() {
        assert_eq!(BaudRate::from_standard(57600), Some(BaudRate::B57600));
        assert_eq!(BaudRate::from_standard(0), None);
        assert_eq!(BaudRate::from_standard(14400), None);
    }

    #[test]
    fn test_menu_keys() {
        assert_eq!(BaudRate::from_menu_key(b'1'), Some(BaudRate::B9600));
        assert_eq!(BaudRate::from_menu_key(b'3'), Some(BaudRate::B38400));
        assert_eq!(BaudRate::from_menu_key(b'5'), Some(BaudRate::B115200));
        assert_eq!(BaudRate::from_menu_key(b'0'), None);
        assert_eq!(BaudRate::from_menu_key(b'6'), None);
        assert_eq!(BaudRate::from_menu_key(b'\n'), None);
    }

    #[test]
    fn test_bit_period() {
        assert_eq!(BaudRate::B9600.bit_period_us(), 104);
        assert_eq!(BaudRate::B115200.bit_period_us(), 8);
    }
}
