use fixed::types::I32F32;
use serde::Deserialize;

/// A length in PDF points.
///
/// Stored as 32.32 fixed point so that wrap and pagination decisions come out
/// identical on every platform. Values built from floats are snapped to 1/1000pt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pt(I32F32);

impl Pt {
    pub const ZERO: Pt = Pt(I32F32::from_bits(0));

    pub fn from_f32(value: f32) -> Pt {
        if !value.is_finite() {
            return Pt::ZERO;
        }
        let milli = (value as f64 * 1000.0).round();
        Pt::from_milli(milli.clamp(i64::MIN as f64, i64::MAX as f64) as i64)
    }

    pub fn from_i32(value: i32) -> Pt {
        Pt(I32F32::saturating_from_num(value))
    }

    pub fn from_milli(milli: i64) -> Pt {
        let one = 1i128 << 32;
        let half = if milli >= 0 { 500 } else { -500 };
        let bits = (milli as i128 * one + half) / 1000;
        Pt(I32F32::from_bits(
            bits.clamp(i64::MIN as i128, i64::MAX as i128) as i64,
        ))
    }

    pub fn to_f32(self) -> f32 {
        self.0.to_num()
    }

    pub fn to_milli(self) -> i64 {
        self.0.saturating_mul_int(1000).round().to_num()
    }

    pub fn max(self, other: Pt) -> Pt {
        if self >= other { self } else { other }
    }

    /// `self * num / den`, computed without going through floats.
    pub fn mul_ratio(self, num: i32, den: i32) -> Pt {
        if den == 0 {
            return Pt::ZERO;
        }
        let scaled = self.0.saturating_mul_int(num as i64);
        Pt(scaled.checked_div_int(den as i64).unwrap_or(I32F32::ZERO))
    }
}

impl std::ops::Add for Pt {
    type Output = Pt;
    fn add(self, rhs: Pt) -> Pt {
        Pt(self.0.saturating_add(rhs.0))
    }
}

impl std::ops::AddAssign for Pt {
    fn add_assign(&mut self, rhs: Pt) {
        *self = *self + rhs;
    }
}

impl std::ops::Sub for Pt {
    type Output = Pt;
    fn sub(self, rhs: Pt) -> Pt {
        Pt(self.0.saturating_sub(rhs.0))
    }
}

impl std::ops::SubAssign for Pt {
    fn sub_assign(&mut self, rhs: Pt) {
        *self = *self - rhs;
    }
}

impl std::ops::Mul<i32> for Pt {
    type Output = Pt;
    fn mul(self, rhs: i32) -> Pt {
        Pt(self.0.saturating_mul_int(rhs as i64))
    }
}

impl std::ops::Div<i32> for Pt {
    type Output = Pt;
    fn div(self, rhs: i32) -> Pt {
        if rhs == 0 {
            Pt::ZERO
        } else {
            Pt(self.0.checked_div_int(rhs as i64).unwrap_or(I32F32::ZERO))
        }
    }
}

impl std::ops::Neg for Pt {
    type Output = Pt;
    fn neg(self) -> Pt {
        Pt(self.0.saturating_neg())
    }
}

impl std::iter::Sum for Pt {
    fn sum<I: Iterator<Item = Pt>>(iter: I) -> Pt {
        iter.fold(Pt::ZERO, |acc, v| acc + v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Size {
    pub width: Pt,
    pub height: Pt,
}

impl Size {
    pub fn a4() -> Self {
        Self {
            width: Pt::from_f32(595.28),
            height: Pt::from_f32(841.89),
        }
    }

    pub fn letter() -> Self {
        Self {
            width: Pt::from_i32(612),
            height: Pt::from_i32(792),
        }
    }

    pub fn from_inches(width_in: f32, height_in: f32) -> Self {
        Self {
            width: Pt::from_f32(width_in * 72.0),
            height: Pt::from_f32(height_in * 72.0),
        }
    }

    pub fn from_mm(width_mm: f32, height_mm: f32) -> Self {
        Self {
            width: Pt::from_f32(width_mm * 72.0 / 25.4),
            height: Pt::from_f32(height_mm * 72.0 / 25.4),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: Pt,
    pub y: Pt,
    pub width: Pt,
    pub height: Pt,
}

impl Rect {
    pub fn bottom(&self) -> Pt {
        self.y + self.height
    }

    pub fn center_x(&self) -> Pt {
        self.x + self.width.mul_ratio(1, 2)
    }
}

/// Base page margins, before any sidebar reservation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Margins {
    pub top: Pt,
    pub right: Pt,
    pub bottom: Pt,
    pub left: Pt,
}

impl Margins {
    pub fn all(value: f32) -> Self {
        let v = Pt::from_f32(value);
        Self {
            top: v,
            right: v,
            bottom: v,
            left: v,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(try_from = "String")]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const BLACK: Color = Color {
        r: 0.0,
        g: 0.0,
        b: 0.0,
    };

    pub const WHITE: Color = Color {
        r: 1.0,
        g: 1.0,
        b: 1.0,
    };

    pub fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Parses `#rgb` or `#rrggbb`.
    pub fn from_hex(raw: &str) -> Option<Self> {
        let hex = raw.trim().strip_prefix('#')?;
        if !hex.is_ascii() {
            return None;
        }
        let channel = |s: &str| u8::from_str_radix(s, 16).ok().map(|v| v as f32 / 255.0);
        match hex.len() {
            6 => Some(Self {
                r: channel(&hex[0..2])?,
                g: channel(&hex[2..4])?,
                b: channel(&hex[4..6])?,
            }),
            3 => {
                let expand = |i: usize| {
                    let c = &hex[i..i + 1];
                    channel(&format!("{c}{c}"))
                };
                Some(Self {
                    r: expand(0)?,
                    g: expand(1)?,
                    b: expand(2)?,
                })
            }
            _ => None,
        }
    }
}

impl TryFrom<String> for Color {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Color::from_hex(&value).ok_or_else(|| format!("invalid color {value:?}, expected #rrggbb"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pt_snaps_to_thousandths() {
        assert_eq!(Pt::from_f32(12.3456).to_milli(), 12346);
        assert_eq!(Pt::from_f32(f32::NAN), Pt::ZERO);
        assert_eq!(Pt::from_i32(3) + Pt::from_i32(4), Pt::from_i32(7));
    }

    #[test]
    fn pt_ratio_and_division() {
        let v = Pt::from_i32(18);
        assert_eq!(v.mul_ratio(6, 5).to_milli(), 21600);
        assert_eq!((v / 4).to_milli(), 4500);
        assert_eq!(v.mul_ratio(1, 0), Pt::ZERO);
        assert_eq!((Pt::from_i32(10) * 3).to_milli(), 30000);
    }

    #[test]
    fn color_parses_short_and_long_hex() {
        assert_eq!(Color::from_hex("#ffffff"), Some(Color::WHITE));
        assert_eq!(Color::from_hex("#000"), Some(Color::BLACK));
        assert!(Color::from_hex("red").is_none());
        assert!(Color::from_hex("#12345").is_none());
    }

    #[test]
    fn color_rejects_non_ascii_digits() {
        assert!(Color::from_hex("#1\u{e9}234").is_none());
        assert!(Color::from_hex("#\u{e9}f").is_none());
        assert!(Color::from_hex("#\u{1F409}").is_none());
    }
}
