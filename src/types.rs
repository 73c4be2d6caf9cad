use fixed::types::I32F32;

const PT_PER_INCH: f32 = 72.0;
const MM_PER_INCH: f32 = 25.4;

/// Length in PostScript points, stored as fixed point so that paper sizes
/// derived from millimetres compare exactly.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Pt(I32F32);

impl Pt {
    pub const ZERO: Pt = Pt(I32F32::from_bits(0));

    pub fn from_f32(value: f32) -> Pt {
        if !value.is_finite() {
            return Pt::ZERO;
        }
        let milli = (value as f64 * 1000.0).round();
        let milli = milli.clamp(i64::MIN as f64, i64::MAX as f64) as i64;
        Pt::from_milli_i64(milli)
    }

    pub fn to_f32(self) -> f32 {
        self.0.to_num()
    }

    pub fn to_mm(self) -> f32 {
        self.to_f32() * MM_PER_INCH / PT_PER_INCH
    }

    pub fn from_milli_i64(milli: i64) -> Pt {
        let denom = 1i128 << 32;
        let milli = milli as i128;
        let adj = if milli >= 0 { 500 } else { -500 };
        let bits = (milli * denom + adj) / 1000;
        let bits = bits.clamp(i64::MIN as i128, i64::MAX as i128) as i64;
        Pt(I32F32::from_bits(bits))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Size {
    pub width: Pt,
    pub height: Pt,
}

impl Size {
    pub fn from_inches(width_in: f32, height_in: f32) -> Self {
        Self {
            width: Pt::from_f32(width_in * PT_PER_INCH),
            height: Pt::from_f32(height_in * PT_PER_INCH),
        }
    }

    pub fn from_mm(width_mm: f32, height_mm: f32) -> Self {
        Self {
            width: Pt::from_f32(width_mm * PT_PER_INCH / MM_PER_INCH),
            height: Pt::from_f32(height_mm * PT_PER_INCH / MM_PER_INCH),
        }
    }

    pub fn is_landscape(self) -> bool {
        self.width > self.height
    }

    pub fn swapped(self) -> Self {
        Self {
            width: self.height,
            height: self.width,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn millimetre_sizes_round_trip_within_tolerance() {
        let a4 = Size::from_mm(210.0, 297.0);
        assert!((a4.width.to_mm() - 210.0).abs() < 0.01);
        assert!((a4.height.to_mm() - 297.0).abs() < 0.01);
        assert!(!a4.is_landscape());
        assert!(a4.swapped().is_landscape());
    }

    #[test]
    fn non_finite_lengths_collapse_to_zero() {
        assert_eq!(Pt::from_f32(f32::NAN), Pt::ZERO);
        assert_eq!(Pt::from_f32(f32::INFINITY), Pt::ZERO);
    }
}
