//! Element types and row-major array shapes.

use std::fmt;

/// Exponent bits retained by the pseudo-bfloat16 format.
pub const BFLOAT16_EXPONENT_BITS: u32 = 8;
/// Mantissa bits retained by the pseudo-bfloat16 format.
pub const BFLOAT16_MANTISSA_BITS: u32 = 7;

/// Scalar element types an instruction can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    Pred,
    S8,
    S16,
    S32,
    S64,
    U8,
    U16,
    U32,
    U64,
    F16,
    BF16,
    F32,
    F64,
    C64,
    C128,
}

impl PrimitiveType {
    /// Storage width in bits. `Pred` occupies a byte.
    pub fn bit_width(self) -> u32 {
        match self {
            PrimitiveType::Pred | PrimitiveType::S8 | PrimitiveType::U8 => 8,
            PrimitiveType::S16 | PrimitiveType::U16 | PrimitiveType::F16 | PrimitiveType::BF16 => {
                16
            }
            PrimitiveType::S32 | PrimitiveType::U32 | PrimitiveType::F32 => 32,
            PrimitiveType::S64 | PrimitiveType::U64 | PrimitiveType::F64 | PrimitiveType::C64 => {
                64
            }
            PrimitiveType::C128 => 128,
        }
    }

    pub fn is_signed_integral(self) -> bool {
        matches!(
            self,
            PrimitiveType::S8 | PrimitiveType::S16 | PrimitiveType::S32 | PrimitiveType::S64
        )
    }

    pub fn is_unsigned_integral(self) -> bool {
        matches!(
            self,
            PrimitiveType::U8 | PrimitiveType::U16 | PrimitiveType::U32 | PrimitiveType::U64
        )
    }

    /// Signed or unsigned integer. `Pred` is not integral.
    pub fn is_integral(self) -> bool {
        self.is_signed_integral() || self.is_unsigned_integral()
    }

    pub fn is_floating_point(self) -> bool {
        matches!(
            self,
            PrimitiveType::F16 | PrimitiveType::BF16 | PrimitiveType::F32 | PrimitiveType::F64
        )
    }

    pub fn is_complex(self) -> bool {
        matches!(self, PrimitiveType::C64 | PrimitiveType::C128)
    }

    /// Component type of a complex type.
    ///
    /// # Panics
    ///
    /// Panics if `self` is not complex.
    pub fn complex_component_type(self) -> PrimitiveType {
        match self {
            PrimitiveType::C64 => PrimitiveType::F32,
            PrimitiveType::C128 => PrimitiveType::F64,
            other => panic!("{other} is not a complex type"),
        }
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PrimitiveType::Pred => "PRED",
            PrimitiveType::S8 => "S8",
            PrimitiveType::S16 => "S16",
            PrimitiveType::S32 => "S32",
            PrimitiveType::S64 => "S64",
            PrimitiveType::U8 => "U8",
            PrimitiveType::U16 => "U16",
            PrimitiveType::U32 => "U32",
            PrimitiveType::U64 => "U64",
            PrimitiveType::F16 => "F16",
            PrimitiveType::BF16 => "BF16",
            PrimitiveType::F32 => "F32",
            PrimitiveType::F64 => "F64",
            PrimitiveType::C64 => "C64",
            PrimitiveType::C128 => "C128",
        };
        f.write_str(name)
    }
}

/// An array shape: element type and per-dimension extents, row-major.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Shape {
    element_type: PrimitiveType,
    dimensions: Vec<i64>,
}

impl Shape {
    pub fn new(element_type: PrimitiveType, dimensions: &[i64]) -> Self {
        assert!(
            dimensions.iter().all(|&d| d >= 0),
            "negative extent in shape {dimensions:?}"
        );
        Shape {
            element_type,
            dimensions: dimensions.to_vec(),
        }
    }

    pub fn scalar(element_type: PrimitiveType) -> Self {
        Shape::new(element_type, &[])
    }

    pub fn element_type(&self) -> PrimitiveType {
        self.element_type
    }

    pub fn dimensions(&self) -> &[i64] {
        &self.dimensions
    }

    pub fn dimension(&self, dim: usize) -> i64 {
        self.dimensions[dim]
    }

    pub fn rank(&self) -> usize {
        self.dimensions.len()
    }

    pub fn is_scalar(&self) -> bool {
        self.dimensions.is_empty()
    }

    /// Number of elements (1 for a scalar).
    pub fn elements(&self) -> i64 {
        self.dimensions.iter().product()
    }

    /// Same rank and extents, element type ignored.
    pub fn compatible_ignoring_element_type(&self, other: &Shape) -> bool {
        self.dimensions == other.dimensions
    }

    /// Copy of this shape with a different element type.
    pub fn with_element_type(&self, element_type: PrimitiveType) -> Shape {
        Shape {
            element_type,
            dimensions: self.dimensions.clone(),
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[", self.element_type)?;
        for (i, d) in self.dimensions.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{d}")?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_widths() {
        assert_eq!(PrimitiveType::Pred.bit_width(), 8);
        assert_eq!(PrimitiveType::BF16.bit_width(), 16);
        assert_eq!(PrimitiveType::F32.bit_width(), 32);
        assert_eq!(PrimitiveType::C64.bit_width(), 64);
        assert_eq!(PrimitiveType::C128.bit_width(), 128);
    }

    #[test]
    fn test_type_families() {
        assert!(PrimitiveType::S16.is_integral());
        assert!(!PrimitiveType::Pred.is_integral());
        assert!(PrimitiveType::BF16.is_floating_point());
        assert!(PrimitiveType::C128.is_complex());
        assert_eq!(
            PrimitiveType::C64.complex_component_type(),
            PrimitiveType::F32
        );
    }

    #[test]
    fn test_shape_display_and_elements() {
        let shape = Shape::new(PrimitiveType::F32, &[2, 3]);
        assert_eq!(shape.to_string(), "F32[2,3]");
        assert_eq!(shape.elements(), 6);
        assert_eq!(Shape::scalar(PrimitiveType::S32).elements(), 1);
    }
}
