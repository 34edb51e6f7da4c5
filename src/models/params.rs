//! Parameter collections supplied alongside SQL text.

use super::value::SqlValue;
use std::collections::{BTreeMap, HashMap};

/// A parameter collection: a tuple, a mapping, or a bare scalar.
///
/// A bare scalar is representable so that it can be rejected with a stable
/// error instead of being silently wrapped; callers always pass tuples or
/// mappings.
#[derive(Debug, Clone, PartialEq)]
pub enum Params {
    /// Ordered values bound to positional markers (`%s`, `?`).
    Positional(Vec<SqlValue>),
    /// Name/value pairs bound to `:name` markers, in insertion order.
    Named(Vec<(String, SqlValue)>),
    /// A single value that is not a collection.
    Scalar(SqlValue),
}

impl Params {
    /// Wrap a single value without tuplizing it.
    pub fn scalar(value: impl Into<SqlValue>) -> Self {
        Self::Scalar(value.into())
    }

    /// Build a mapping from name/value pairs.
    pub fn named<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<SqlValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self::Named(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Number of values carried; a scalar counts as one.
    pub fn len(&self) -> usize {
        match self {
            Self::Positional(values) => values.len(),
            Self::Named(pairs) => pairs.len(),
            Self::Scalar(_) => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, Self::Scalar(_))
    }

    /// Short description of the collection shape for error messages.
    pub fn shape(&self) -> &'static str {
        match self {
            Self::Positional(_) => "sequence",
            Self::Named(_) => "mapping",
            Self::Scalar(_) => "scalar",
        }
    }

    /// Look up a named value. Names compare case-sensitively.
    pub fn get_named(&self, name: &str) -> Option<&SqlValue> {
        match self {
            Self::Named(pairs) => pairs.iter().find(|(k, _)| k == name).map(|(_, v)| v),
            _ => None,
        }
    }
}

impl From<Vec<SqlValue>> for Params {
    fn from(values: Vec<SqlValue>) -> Self {
        Self::Positional(values)
    }
}

impl<T: Into<SqlValue> + Clone> From<&[T]> for Params {
    fn from(values: &[T]) -> Self {
        Self::Positional(values.iter().cloned().map(Into::into).collect())
    }
}

impl<T: Into<SqlValue>, const N: usize> From<[T; N]> for Params {
    fn from(values: [T; N]) -> Self {
        Self::Positional(values.into_iter().map(Into::into).collect())
    }
}

impl<K: Into<String>, V: Into<SqlValue>> From<HashMap<K, V>> for Params {
    fn from(map: HashMap<K, V>) -> Self {
        let mut pairs: Vec<(String, SqlValue)> =
            map.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        pairs.sort_by(|a, b| a.0.cmp(&b.0));
        Self::Named(pairs)
    }
}

impl<K: Into<String>, V: Into<SqlValue>> From<BTreeMap<K, V>> for Params {
    fn from(map: BTreeMap<K, V>) -> Self {
        Self::named(map)
    }
}

impl From<()> for Params {
    fn from(_: ()) -> Self {
        Self::Positional(Vec::new())
    }
}

macro_rules! impl_params_from_tuple {
    ($($name:ident),+) => {
        impl<$($name: Into<SqlValue>),+> From<($($name,)+)> for Params {
            #[allow(non_snake_case)]
            fn from(($($name,)+): ($($name,)+)) -> Self {
                Self::Positional(vec![$($name.into()),+])
            }
        }
    };
}

impl_params_from_tuple!(A);
impl_params_from_tuple!(A, B);
impl_params_from_tuple!(A, B, C);
impl_params_from_tuple!(A, B, C, D);
impl_params_from_tuple!(A, B, C, D, E);
impl_params_from_tuple!(A, B, C, D, E, F);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tuple_conversion() {
        let params: Params = ("python", "reptile").into();
        assert_eq!(
            params,
            Params::Positional(vec![
                SqlValue::Text("python".to_string()),
                SqlValue::Text("reptile".to_string()),
            ])
        );
        assert_eq!(params.len(), 2);
        assert_eq!(params.shape(), "sequence");
    }

    #[test]
    fn test_single_element_tuple_is_positional() {
        let params: Params = ("snake",).into();
        assert!(!params.is_scalar());
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn test_scalar_is_not_tuplized() {
        let params = Params::scalar("snake");
        assert!(params.is_scalar());
        assert_eq!(params.shape(), "scalar");
    }

    #[test]
    fn test_map_conversion() {
        let mut map = HashMap::new();
        map.insert("name", SqlValue::from("snake"));
        map.insert("category", SqlValue::from("reptile"));
        let params: Params = map.into();

        assert_eq!(params.shape(), "mapping");
        assert_eq!(
            params.get_named("name"),
            Some(&SqlValue::Text("snake".to_string()))
        );
        assert_eq!(params.get_named("missing"), None);
    }

    #[test]
    fn test_array_and_slice_conversion() {
        let params: Params = [1i64, 2, 3].into();
        assert_eq!(params.len(), 3);
        let values = vec![SqlValue::Int(1)];
        let params: Params = values.as_slice().into();
        assert_eq!(params, Params::Positional(vec![SqlValue::Int(1)]));
    }
}
