//! Conversions between Rust values and archive nodes

use crate::error::{ArchiveError, Result};
use crate::node::{ArchiveNode, NodeKind, Payload};

/// Typed extraction from a node.
///
/// Numeric targets accept any numeric kind (boolean, integer, unsigned,
/// float). Integer targets truncate floats toward zero. A value outside
/// the target's range is `OutOfRange`, never wrapped. String and
/// container targets require the exact kind.
pub trait FromNode<'a>: Sized {
    fn from_node(node: &'a ArchiveNode) -> Result<Self>;
}

/// Numeric extraction clamped in the stored value's own domain, then
/// narrowed to the target
pub trait ClampFromNode<'a>: FromNode<'a> + PartialOrd {
    fn from_node_clamped(node: &'a ArchiveNode, min: Self, max: Self) -> Result<Self>;
}

fn clamp_wide<T: PartialOrd>(value: T, min: T, max: T) -> T {
    if value < min {
        min
    } else if value > max {
        max
    } else {
        value
    }
}

impl<'a> FromNode<'a> for bool {
    fn from_node(node: &'a ArchiveNode) -> Result<Self> {
        node.as_bool_lossy()
    }
}

macro_rules! integer_from_node {
    ($($t:ty),*) => {
        $(
            impl<'a> FromNode<'a> for $t {
                fn from_node(node: &'a ArchiveNode) -> Result<Self> {
                    let wide = node.as_wide_integer()?;
                    <$t>::try_from(wide).map_err(|_| ArchiveError::OutOfRange {
                        value: wide as f64,
                        min: <$t>::MIN as f64,
                        max: <$t>::MAX as f64,
                    })
                }
            }

            impl<'a> ClampFromNode<'a> for $t {
                fn from_node_clamped(node: &'a ArchiveNode, min: Self, max: Self) -> Result<Self> {
                    let wide = clamp_wide(node.as_wide_integer()?, min as i128, max as i128);
                    // One of min, max or a value between them
                    Ok(wide as $t)
                }
            }
        )*
    };
}

integer_from_node!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl<'a> FromNode<'a> for f32 {
    fn from_node(node: &'a ArchiveNode) -> Result<Self> {
        let wide = node.as_f64_lossy()?;
        if wide.is_finite() && wide.abs() > f64::from(f32::MAX) {
            return Err(ArchiveError::OutOfRange {
                value: wide,
                min: f64::from(f32::MIN),
                max: f64::from(f32::MAX),
            });
        }
        Ok(wide as f32)
    }
}

impl<'a> ClampFromNode<'a> for f32 {
    fn from_node_clamped(node: &'a ArchiveNode, min: Self, max: Self) -> Result<Self> {
        let wide = clamp_wide(node.as_f64_lossy()?, f64::from(min), f64::from(max));
        Ok(wide as f32)
    }
}

impl<'a> FromNode<'a> for f64 {
    fn from_node(node: &'a ArchiveNode) -> Result<Self> {
        node.as_f64_lossy()
    }
}

impl<'a> ClampFromNode<'a> for f64 {
    fn from_node_clamped(node: &'a ArchiveNode, min: Self, max: Self) -> Result<Self> {
        Ok(clamp_wide(node.as_f64_lossy()?, min, max))
    }
}

impl<'a> FromNode<'a> for &'a str {
    fn from_node(node: &'a ArchiveNode) -> Result<Self> {
        node.as_str()
    }
}

impl<'a> FromNode<'a> for String {
    fn from_node(node: &'a ArchiveNode) -> Result<Self> {
        node.as_str().map(str::to_owned)
    }
}

impl<'a> FromNode<'a> for &'a [ArchiveNode] {
    fn from_node(node: &'a ArchiveNode) -> Result<Self> {
        node.as_array()
    }
}

impl<'a, const N: usize> FromNode<'a> for [f32; N] {
    fn from_node(node: &'a ArchiveNode) -> Result<Self> {
        let items = node.as_array()?;
        if items.len() != N {
            return Err(ArchiveError::Length {
                expected: N,
                found: items.len(),
            });
        }

        let mut out = [0.0f32; N];
        for (slot, item) in out.iter_mut().zip(items) {
            *slot = f32::from_node(item)?;
        }
        Ok(out)
    }
}

impl<'a, T: FromNode<'a>> FromNode<'a> for Vec<T> {
    fn from_node(node: &'a ArchiveNode) -> Result<Self> {
        node.as_array()?.iter().map(T::from_node).collect()
    }
}

impl<'a, T: FromNode<'a>> FromNode<'a> for Option<T> {
    fn from_node(node: &'a ArchiveNode) -> Result<Self> {
        if node.is_null() {
            Ok(None)
        } else {
            T::from_node(node).map(Some)
        }
    }
}

impl From<bool> for ArchiveNode {
    fn from(v: bool) -> Self {
        Self::from_payload(Payload::Boolean(v))
    }
}

macro_rules! node_from_signed {
    ($($t:ty),*) => {
        $(
            impl From<$t> for ArchiveNode {
                fn from(v: $t) -> Self {
                    Self::from_payload(Payload::Integer(v as i64))
                }
            }
        )*
    };
}

macro_rules! node_from_unsigned {
    ($($t:ty),*) => {
        $(
            impl From<$t> for ArchiveNode {
                fn from(v: $t) -> Self {
                    Self::from_payload(Payload::Unsigned(v as u64))
                }
            }
        )*
    };
}

node_from_signed!(i8, i16, i32, i64, isize);
node_from_unsigned!(u8, u16, u32, u64, usize);

impl From<f32> for ArchiveNode {
    fn from(v: f32) -> Self {
        Self::from_payload(Payload::Float(v as f64))
    }
}

impl From<f64> for ArchiveNode {
    fn from(v: f64) -> Self {
        Self::from_payload(Payload::Float(v))
    }
}

impl From<&str> for ArchiveNode {
    fn from(v: &str) -> Self {
        Self::from_payload(Payload::String(v.to_owned()))
    }
}

impl From<String> for ArchiveNode {
    fn from(v: String) -> Self {
        Self::from_payload(Payload::String(v))
    }
}

impl From<NodeKind> for ArchiveNode {
    fn from(kind: NodeKind) -> Self {
        Self::with_kind(kind)
    }
}

impl From<Vec<ArchiveNode>> for ArchiveNode {
    fn from(items: Vec<ArchiveNode>) -> Self {
        Self::from_payload(Payload::Array(items))
    }
}

impl<const N: usize> From<[f32; N]> for ArchiveNode {
    fn from(v: [f32; N]) -> Self {
        Self::from_payload(Payload::Array(v.iter().map(|&x| ArchiveNode::from(x)).collect()))
    }
}

impl<T: Into<ArchiveNode>> From<Option<T>> for ArchiveNode {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or_default()
    }
}

impl<K: Into<String>, V: Into<ArchiveNode>> FromIterator<(K, V)> for ArchiveNode {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::from_payload(Payload::Object(
            iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_family_coerces() {
        assert_eq!(ArchiveNode::from(true).get::<i32>().unwrap(), 1);
        assert_eq!(ArchiveNode::from(3u64).get::<f32>().unwrap(), 3.0);
        assert_eq!(ArchiveNode::from(2.9).get::<i64>().unwrap(), 2);
        assert!(ArchiveNode::from(-4).get::<bool>().unwrap());
    }

    #[test]
    fn test_exact_kinds_do_not_coerce() {
        let err = ArchiveNode::from(5).get::<String>().unwrap_err();
        assert!(matches!(
            err,
            ArchiveError::TypeMismatch { expected: "string", found: "integer" }
        ));

        let err = ArchiveNode::from("5").get::<i32>().unwrap_err();
        assert!(err.is_type_mismatch());

        let err = ArchiveNode::from("x").get::<&[ArchiveNode]>().unwrap_err();
        assert!(matches!(
            err,
            ArchiveError::TypeMismatch { expected: "array", found: "string" }
        ));
    }

    #[test]
    fn test_null_is_not_numeric() {
        assert!(ArchiveNode::new().get::<f64>().unwrap_err().is_type_mismatch());
        assert_eq!(ArchiveNode::new().get::<Option<f64>>().unwrap(), None);
    }

    #[test]
    fn test_clamped_extraction() {
        let node = ArchiveNode::from(12);
        assert_eq!(node.get_clamped(0, 10).unwrap(), 10);
        assert_eq!(ArchiveNode::from(-0.5).get_clamped(0.0, 1.0).unwrap(), 0.0);
        assert_eq!(ArchiveNode::from(0.25f32).get_clamped(0.0f32, 1.0).unwrap(), 0.25);
    }

    #[test]
    fn test_clamp_happens_before_narrowing() {
        assert_eq!(ArchiveNode::from(300i64).get_clamped::<u8>(0, 100).unwrap(), 100);
        assert_eq!(ArchiveNode::from(-1i64).get_clamped::<u32>(0, 10).unwrap(), 0);
        assert_eq!(ArchiveNode::from(u64::MAX).get_clamped::<i64>(-5, 5).unwrap(), 5);
        assert_eq!(ArchiveNode::from(-7.9).get_clamped::<i8>(-100, 100).unwrap(), -7);
        assert_eq!(ArchiveNode::from(1e300).get_clamped::<f32>(0.0, 2.0).unwrap(), 2.0);
    }

    #[test]
    fn test_narrowing_out_of_range_is_reported() {
        let err = ArchiveNode::from(u64::MAX).get::<i64>().unwrap_err();
        assert!(matches!(err, ArchiveError::OutOfRange { .. }));

        let err = ArchiveNode::from(-1i64).get::<u32>().unwrap_err();
        match err {
            ArchiveError::OutOfRange { value, min, max } => {
                assert_eq!(value, -1.0);
                assert_eq!(min, 0.0);
                assert_eq!(max, u32::MAX as f64);
            }
            other => panic!("expected out of range, got {:?}", other),
        }

        assert!(matches!(
            ArchiveNode::from(300).get::<u8>(),
            Err(ArchiveError::OutOfRange { .. })
        ));
        assert!(matches!(
            ArchiveNode::from(f64::NAN).get::<i32>(),
            Err(ArchiveError::OutOfRange { .. })
        ));
        assert!(matches!(
            ArchiveNode::from(1e300).get::<f32>(),
            Err(ArchiveError::OutOfRange { .. })
        ));
        assert!(matches!(
            ArchiveNode::from(vec![ArchiveNode::from(1e300)]).get::<[f32; 1]>(),
            Err(ArchiveError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_boundary_values_fit() {
        assert_eq!(ArchiveNode::from(255).get::<u8>().unwrap(), 255);
        assert_eq!(ArchiveNode::from(i64::MIN).get::<i64>().unwrap(), i64::MIN);
        assert_eq!(ArchiveNode::from(u64::MAX).get::<u64>().unwrap(), u64::MAX);
        assert_eq!(ArchiveNode::from(f64::INFINITY).get::<f32>().unwrap(), f32::INFINITY);
    }

    #[test]
    fn test_fixed_vector_fields() {
        let node = ArchiveNode::from([1.0f32, 0.5, 0.25]);
        assert_eq!(node.get::<[f32; 3]>().unwrap(), [1.0, 0.5, 0.25]);

        let err = node.get::<[f32; 4]>().unwrap_err();
        assert!(matches!(err, ArchiveError::Length { expected: 4, found: 3 }));
    }

    #[test]
    fn test_collect_into_object_keeps_order() {
        let node: ArchiveNode = [("z", 1), ("a", 2), ("z", 3)].into_iter().collect();
        let keys: Vec<&str> = node.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["z", "a", "z"]);
        assert_eq!(node["z"].get::<i32>().unwrap(), 1);
    }

    #[test]
    fn test_vec_extraction() {
        let mut node = ArchiveNode::new();
        node.push(1).unwrap();
        node.push(2u8).unwrap();
        assert_eq!(node.get::<Vec<u32>>().unwrap(), vec![1, 2]);
    }
}
