//! # nestml-units
//!
//! C3: the physical-unit algebra underlying NESTML's type system.
//!
//! A [`Type`] pairs a numeric base (`integer`/`real`/`boolean`/`string`/
//! `void`) with an optional [`UnitVector`] — a scale factor plus a
//! rational-exponent vector over the seven SI base dimensions. Only `real`
//! values carry units; `integer`, `boolean`, `string` and `void` are always
//! dimensionless and the unit field is `None` for them.
//!
//! Exponents are rational rather than integral because unit expressions
//! like `1/ms**(1/2)` appear in noise-process models; `Rational` keeps them
//! exact instead of drifting under repeated multiplication.

use std::fmt;

use nestml_core::{Diagnostic, SourceRange};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DIMENSION_COUNT: usize = 7;

/// SI base dimensions, in the fixed order used by [`UnitVector::exponents`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Length,
    Mass,
    Time,
    Current,
    Temperature,
    Amount,
    Luminosity,
}

pub const DIMENSIONS: [Dimension; DIMENSION_COUNT] = [
    Dimension::Length,
    Dimension::Mass,
    Dimension::Time,
    Dimension::Current,
    Dimension::Temperature,
    Dimension::Amount,
    Dimension::Luminosity,
];

/// An exact fraction in lowest terms with a positive denominator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rational {
    pub numerator: i32,
    pub denominator: i32,
}

impl Rational {
    pub fn new(numerator: i32, denominator: i32) -> Self {
        assert!(denominator != 0, "rational exponent with zero denominator");
        let (mut n, mut d) = (numerator, denominator);
        if d < 0 {
            n = -n;
            d = -d;
        }
        let g = gcd(n.unsigned_abs(), d.unsigned_abs()).max(1);
        Self {
            numerator: n / g as i32,
            denominator: d / g as i32,
        }
    }

    pub const fn zero() -> Self {
        Self {
            numerator: 0,
            denominator: 1,
        }
    }

    pub const fn one() -> Self {
        Self {
            numerator: 1,
            denominator: 1,
        }
    }

    pub fn from_int(n: i32) -> Self {
        Self::new(n, 1)
    }

    pub fn is_zero(&self) -> bool {
        self.numerator == 0
    }

    pub fn as_f64(&self) -> f64 {
        self.numerator as f64 / self.denominator as f64
    }

    pub fn add(self, other: Rational) -> Rational {
        Rational::new(
            self.numerator * other.denominator + other.numerator * self.denominator,
            self.denominator * other.denominator,
        )
    }

    pub fn neg(self) -> Rational {
        Rational::new(-self.numerator, self.denominator)
    }

    pub fn sub(self, other: Rational) -> Rational {
        self.add(other.neg())
    }

    pub fn mul(self, other: Rational) -> Rational {
        Rational::new(self.numerator * other.numerator, self.denominator * other.denominator)
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.denominator == 1 {
            write!(f, "{}", self.numerator)
        } else {
            write!(f, "{}/{}", self.numerator, self.denominator)
        }
    }
}

fn gcd(a: u32, b: u32) -> u32 {
    if b == 0 {
        a.max(1)
    } else {
        gcd(b, a % b)
    }
}

/// A physical unit: a scale factor against the SI base unit plus a rational
/// exponent per base dimension. `mV` and `V` share the same exponent vector
/// (`Time^0 Length^2 Mass^1 Current^-1 Time^-3`, conventionally written
/// `kg*m^2*s^-3*A^-1`) but differ in `scale` (`1e-3` vs `1`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UnitVector {
    pub scale: f64,
    pub exponents: [Rational; DIMENSION_COUNT],
}

impl UnitVector {
    pub fn dimensionless() -> Self {
        Self {
            scale: 1.0,
            exponents: [Rational::zero(); DIMENSION_COUNT],
        }
    }

    pub fn is_dimensionless(&self) -> bool {
        self.exponents.iter().all(|e| e.is_zero())
    }

    /// Same physical dimension, ignoring scale — the criterion for `+`/`-`
    /// compatibility (spec.md's "unit arithmetic laws").
    pub fn same_dimension(&self, other: &UnitVector) -> bool {
        self.exponents == other.exponents
    }

    pub fn mul(&self, other: &UnitVector) -> UnitVector {
        let mut exponents = [Rational::zero(); DIMENSION_COUNT];
        for i in 0..DIMENSION_COUNT {
            exponents[i] = self.exponents[i].add(other.exponents[i]);
        }
        UnitVector {
            scale: self.scale * other.scale,
            exponents,
        }
    }

    pub fn div(&self, other: &UnitVector) -> UnitVector {
        let mut exponents = [Rational::zero(); DIMENSION_COUNT];
        for i in 0..DIMENSION_COUNT {
            exponents[i] = self.exponents[i].sub(other.exponents[i]);
        }
        UnitVector {
            scale: self.scale / other.scale,
            exponents,
        }
    }

    pub fn pow(&self, exponent: Rational) -> UnitVector {
        let mut exponents = [Rational::zero(); DIMENSION_COUNT];
        for i in 0..DIMENSION_COUNT {
            exponents[i] = self.exponents[i].mul(exponent);
        }
        UnitVector {
            scale: self.scale.powf(exponent.as_f64()),
            exponents,
        }
    }
}

impl fmt::Display for UnitVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_dimensionless() {
            return write!(f, "1");
        }
        let names = ["m", "kg", "s", "A", "K", "mol", "cd"];
        let parts: Vec<String> = self
            .exponents
            .iter()
            .zip(names)
            .filter(|(e, _)| !e.is_zero())
            .map(|(e, name)| if *e == Rational::one() { name.to_string() } else { format!("{name}^{e}") })
            .collect();
        write!(f, "{}", parts.join("*"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NumericBase {
    Integer,
    Real,
    Boolean,
    String,
    Void,
}

/// A fully resolved NESTML type: a numeric base plus, for `real`, an
/// optional unit. `unit: None` on a `Real` means a dimensionless real (e.g.
/// a gating variable in `[0, 1]`), distinct from `Integer`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Type {
    pub base: NumericBase,
    pub unit: Option<UnitVector>,
}

impl Type {
    pub fn integer() -> Self {
        Self {
            base: NumericBase::Integer,
            unit: None,
        }
    }

    pub fn boolean() -> Self {
        Self {
            base: NumericBase::Boolean,
            unit: None,
        }
    }

    pub fn string() -> Self {
        Self {
            base: NumericBase::String,
            unit: None,
        }
    }

    pub fn void() -> Self {
        Self {
            base: NumericBase::Void,
            unit: None,
        }
    }

    pub fn real(unit: UnitVector) -> Self {
        Self {
            base: NumericBase::Real,
            unit: Some(unit),
        }
    }

    pub fn dimensionless_real() -> Self {
        Self::real(UnitVector::dimensionless())
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self.base, NumericBase::Integer | NumericBase::Real)
    }

    fn unit_or_dimensionless(&self) -> UnitVector {
        self.unit.unwrap_or_else(UnitVector::dimensionless)
    }

    /// Integers are promoted to dimensionless reals when mixed with a real
    /// operand; this is the one implicit numeric coercion the checker
    /// performs (spec.md's "integer-to-real promotion").
    pub fn add(&self, other: &Type) -> Result<Type, UnitError> {
        if !self.is_numeric() || !other.is_numeric() {
            return Err(UnitError::NotNumeric);
        }
        if self.base == NumericBase::Integer && other.base == NumericBase::Integer {
            return Ok(Type::integer());
        }
        let lhs = self.unit_or_dimensionless();
        let rhs = other.unit_or_dimensionless();
        if !lhs.same_dimension(&rhs) {
            return Err(UnitError::IncompatibleAddends {
                lhs: lhs.to_string(),
                rhs: rhs.to_string(),
            });
        }
        Ok(Type::real(lhs))
    }

    pub fn sub(&self, other: &Type) -> Result<Type, UnitError> {
        self.add(other)
    }

    pub fn mul(&self, other: &Type) -> Result<Type, UnitError> {
        if !self.is_numeric() || !other.is_numeric() {
            return Err(UnitError::NotNumeric);
        }
        if self.base == NumericBase::Integer && other.base == NumericBase::Integer {
            return Ok(Type::integer());
        }
        let lhs = self.unit_or_dimensionless();
        let rhs = other.unit_or_dimensionless();
        Ok(Type::real(lhs.mul(&rhs)))
    }

    pub fn div(&self, other: &Type) -> Result<Type, UnitError> {
        if !self.is_numeric() || !other.is_numeric() {
            return Err(UnitError::NotNumeric);
        }
        if self.base == NumericBase::Integer && other.base == NumericBase::Integer {
            return Ok(Type::dimensionless_real());
        }
        let lhs = self.unit_or_dimensionless();
        let rhs = other.unit_or_dimensionless();
        Ok(Type::real(lhs.div(&rhs)))
    }

    /// `**` requires a compile-time-constant rational exponent (spec.md:
    /// the base of `x**n` may carry a unit only when `n` is a known
    /// rational at check time, since the result's unit depends on it).
    pub fn pow(&self, exponent: Rational) -> Result<Type, UnitError> {
        if !self.is_numeric() {
            return Err(UnitError::NotNumeric);
        }
        if self.base == NumericBase::Integer {
            if exponent.denominator != 1 || exponent.numerator < 0 {
                return Ok(Type::dimensionless_real());
            }
            return Ok(Type::integer());
        }
        let base = self.unit_or_dimensionless();
        Ok(Type::real(base.pow(exponent)))
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum UnitError {
    #[error("operand is not a numeric type")]
    NotNumeric,

    #[error("incompatible units in addition: {lhs} vs {rhs}")]
    IncompatibleAddends { lhs: String, rhs: String },

    #[error("unknown unit symbol '{0}'")]
    UnknownSymbol(String),

    #[error("malformed unit expression '{0}'")]
    MalformedExpression(String),
}

impl UnitError {
    /// Render as a CoCo-style diagnostic anchored at `range`.
    pub fn into_diagnostic(self, range: SourceRange) -> Diagnostic {
        Diagnostic::error("UnitMismatch", range, self.to_string())
    }
}

/// Parse a unit expression as produced by the parser's `PhysicalType::Unit`
/// text: a unit symbol, optionally followed by `/symbol` repeated (`mV`,
/// `1/ms`, `nS/ms`), or `*`-joined factors (`pA*ms`).
pub fn parse_unit_expr(text: &str) -> Result<UnitVector, UnitError> {
    let mut numerator = UnitVector::dimensionless();
    let mut chars = text.split(|c| c == '/' || c == '*').collect::<Vec<_>>().into_iter();
    let mut ops = Vec::new();
    {
        let mut rest = text;
        while let Some(idx) = rest.find(|c| c == '/' || c == '*') {
            ops.push(rest.as_bytes()[idx] as char);
            rest = &rest[idx + 1..];
        }
    }

    let first = chars.next().ok_or_else(|| UnitError::MalformedExpression(text.to_string()))?;
    numerator = numerator.mul(&atom_unit(first)?);

    for (op, atom_text) in ops.into_iter().zip(chars) {
        let atom = atom_unit(atom_text)?;
        numerator = if op == '/' { numerator.div(&atom) } else { numerator.mul(&atom) };
    }

    Ok(numerator)
}

fn atom_unit(symbol: &str) -> Result<UnitVector, UnitError> {
    let symbol = symbol.trim();
    if symbol == "1" {
        return Ok(UnitVector::dimensionless());
    }
    if let Some(unit) = lookup_base_unit(symbol) {
        return Ok(unit);
    }
    for (prefix, factor) in SI_PREFIXES {
        if let Some(stripped) = symbol.strip_prefix(prefix) {
            if stripped.is_empty() {
                continue;
            }
            if let Some(base) = lookup_base_unit(stripped) {
                let mut unit = base;
                unit.scale *= factor;
                return Ok(unit);
            }
        }
    }
    Err(UnitError::UnknownSymbol(symbol.to_string()))
}

const SI_PREFIXES: [(&str, f64); 8] = [
    ("p", 1e-12),
    ("n", 1e-9),
    ("u", 1e-6),
    ("m", 1e-3),
    ("c", 1e-2),
    ("k", 1e3),
    ("M", 1e6),
    ("G", 1e9),
];

/// `[Length, Mass, Time, Current, Temperature, Amount, Luminosity]`.
fn dims(l: i32, m: i32, t: i32, i: i32, k: i32, mol: i32, cd: i32) -> [Rational; DIMENSION_COUNT] {
    [
        Rational::from_int(l),
        Rational::from_int(m),
        Rational::from_int(t),
        Rational::from_int(i),
        Rational::from_int(k),
        Rational::from_int(mol),
        Rational::from_int(cd),
    ]
}

fn lookup_base_unit(symbol: &str) -> Option<UnitVector> {
    let (scale, exponents) = match symbol {
        "s" => (1.0, dims(0, 0, 1, 0, 0, 0, 0)),
        "Hz" => (1.0, dims(0, 0, -1, 0, 0, 0, 0)),
        "m" => (1.0, dims(1, 0, 0, 0, 0, 0, 0)),
        "g" => (1e-3, dims(0, 1, 0, 0, 0, 0, 0)),
        "V" => (1.0, dims(2, 1, -3, -1, 0, 0, 0)),
        "A" => (1.0, dims(0, 0, 0, 1, 0, 0, 0)),
        "F" => (1.0, dims(-2, -1, 4, 2, 0, 0, 0)),
        "S" => (1.0, dims(-2, -1, 3, 2, 0, 0, 0)),
        "Ohm" => (1.0, dims(2, 1, -3, -2, 0, 0, 0)),
        "W" => (1.0, dims(2, 1, -3, 0, 0, 0, 0)),
        "C" => (1.0, dims(0, 0, 1, 1, 0, 0, 0)),
        "K" => (1.0, dims(0, 0, 0, 0, 1, 0, 0)),
        "mol" => (1.0, dims(0, 0, 0, 0, 0, 1, 0)),
        "cd" => (1.0, dims(0, 0, 0, 0, 0, 0, 1)),
        _ => return None,
    };
    Some(UnitVector { scale, exponents })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mv_and_v_share_dimension_but_not_scale() {
        let mv = parse_unit_expr("mV").unwrap();
        let v = parse_unit_expr("V").unwrap();
        assert!(mv.same_dimension(&v));
        assert_eq!(mv.scale, 1e-3);
        assert_eq!(v.scale, 1.0);
    }

    #[test]
    fn compound_units_parse() {
        let per_ms = parse_unit_expr("1/ms").unwrap();
        assert_eq!(per_ms.exponents[2], Rational::from_int(-1));
        assert_eq!(per_ms.scale, 1e3);

        let ns_per_ms = parse_unit_expr("nS/ms").unwrap();
        assert!(!ns_per_ms.is_dimensionless());
    }

    #[test]
    fn addition_requires_same_dimension() {
        let mv = Type::real(parse_unit_expr("mV").unwrap());
        let pa = Type::real(parse_unit_expr("pA").unwrap());
        assert!(mv.add(&mv).is_ok());
        assert!(matches!(mv.add(&pa), Err(UnitError::IncompatibleAddends { .. })));
    }

    #[test]
    fn multiplication_combines_dimensions() {
        let ohm = Type::real(parse_unit_expr("Ohm").unwrap());
        let amp = Type::real(parse_unit_expr("A").unwrap());
        let volt = ohm.mul(&amp).unwrap();
        let expected = parse_unit_expr("V").unwrap();
        assert_eq!(volt.unit.unwrap().exponents, expected.exponents);
    }

    #[test]
    fn integer_arithmetic_stays_integer() {
        let a = Type::integer();
        let b = Type::integer();
        assert_eq!(a.add(&b).unwrap().base, NumericBase::Integer);
        assert_eq!(a.div(&b).unwrap().base, NumericBase::Real);
    }

    #[test]
    fn pow_scales_exponents() {
        let ms = Type::real(parse_unit_expr("ms").unwrap());
        let ms2 = ms.pow(Rational::from_int(2)).unwrap();
        assert_eq!(ms2.unit.unwrap().exponents[2], Rational::from_int(2));
    }

    #[test]
    fn unknown_unit_symbol_errors() {
        assert!(matches!(parse_unit_expr("frobnicate"), Err(UnitError::UnknownSymbol(_))));
    }
}
