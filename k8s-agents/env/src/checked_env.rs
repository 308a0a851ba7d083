use std::{convert::Infallible, fmt, marker::PhantomData, str::FromStr};

use k8s_openapi::api::core::v1::{EnvVar, EnvVarSource, ObjectFieldSelector, SecretKeySelector};
use thiserror::Error;

use crate::{list, resource::ResourceAttributes};

/// A representation of an environment variable value.
pub trait EnvRepr {
    /// Type of the value, e.g `u32`.
    type Value;
    /// Error that can occur when producing the value representation.
    type IntoReprError;
    /// Error that can occur when reading the value from the representation.
    type FromReprError;

    /// Produces a representation for the given value.
    fn into_repr(value: &Self::Value) -> Result<String, Self::IntoReprError>;

    /// Reads a value from the given representation.
    fn from_repr(repr: &str) -> Result<Self::Value, Self::FromReprError>;
}

/// Implementation of [`EnvRepr`] that uses [`fmt::Display`] and [`FromStr`] to handle conversions.
pub struct StringRepr<T>(PhantomData<fn() -> T>);

/// Error that can occur when reading a value using [`StringRepr`] or [`CommaSeparatedRepr`].
#[derive(Error, Debug)]
#[error("failed to parse environment variable value: {0}")]
pub struct ParseEnvError<E>(#[source] pub E);

impl<T> EnvRepr for StringRepr<T>
where
    T: fmt::Display + FromStr,
{
    type Value = T;
    type IntoReprError = Infallible;
    type FromReprError = ParseEnvError<T::Err>;

    fn into_repr(value: &T) -> Result<String, Self::IntoReprError> {
        Ok(value.to_string())
    }

    fn from_repr(repr: &str) -> Result<T, Self::FromReprError> {
        repr.parse().map_err(ParseEnvError)
    }
}

/// Implementation of [`EnvRepr`] for vectors of values.
///
/// Final representation is a comma-separated list, e.g. the value of `OTEL_PROPAGATORS`.
pub struct CommaSeparatedRepr<T>(PhantomData<fn() -> T>);

impl<T> EnvRepr for CommaSeparatedRepr<T>
where
    T: fmt::Display + FromStr,
{
    type Value = Vec<T>;
    type IntoReprError = Infallible;
    type FromReprError = ParseEnvError<T::Err>;

    fn from_repr(repr: &str) -> Result<Self::Value, Self::FromReprError> {
        repr.split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(|item| item.parse::<T>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(ParseEnvError)
    }

    fn into_repr(value: &Self::Value) -> Result<String, Self::IntoReprError> {
        Ok(value
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(","))
    }
}

/// `key=value` pairs joined with `,`, the format of `OTEL_RESOURCE_ATTRIBUTES`.
///
/// Reading is lenient: a pair that does not split into exactly a key and a value is dropped.
pub struct ResourceAttributesRepr;

impl EnvRepr for ResourceAttributesRepr {
    type Value = ResourceAttributes;
    type IntoReprError = Infallible;
    type FromReprError = Infallible;

    fn into_repr(value: &ResourceAttributes) -> Result<String, Self::IntoReprError> {
        Ok(value.to_env_value())
    }

    fn from_repr(repr: &str) -> Result<ResourceAttributes, Self::FromReprError> {
        Ok(ResourceAttributes::parse(repr))
    }
}

/// An environment variable with strict value type checking.
pub struct CheckedEnv<R: EnvRepr> {
    /// Name of the variable.
    pub name: &'static str,
    repr: PhantomData<fn() -> R>,
}

impl<R: EnvRepr> CheckedEnv<R> {
    /// Creates a new instance.
    ///
    /// All instances should be kept together in [`super::envs`].
    pub(crate) const fn new(name: &'static str) -> Self {
        Self {
            name,
            repr: PhantomData,
        }
    }

    /// Produces an [`EnvVar`] spec, using the given value.
    pub fn try_as_k8s_spec(self, value: &R::Value) -> Result<EnvVar, R::IntoReprError> {
        let repr = R::into_repr(value)?;

        Ok(EnvVar {
            name: self.name.into(),
            value: Some(repr),
            value_from: None,
        })
    }

    /// Produces an [`EnvVar`] spec resolved by the kubelet from the pod's own fields
    /// (downward API), e.g. `metadata.name`.
    pub fn as_field_ref(self, field_path: &str) -> EnvVar {
        EnvVar {
            name: self.name.into(),
            value: None,
            value_from: Some(EnvVarSource {
                field_ref: Some(ObjectFieldSelector {
                    field_path: field_path.into(),
                    ..Default::default()
                }),
                ..Default::default()
            }),
        }
    }

    /// Produces an [`EnvVar`] spec that reads `key` from the `secret` in the pod's namespace.
    pub fn as_secret_key_ref(self, secret: &str, key: &str, optional: bool) -> EnvVar {
        EnvVar {
            name: self.name.into(),
            value: None,
            value_from: Some(EnvVarSource {
                secret_key_ref: Some(SecretKeySelector {
                    name: secret.into(),
                    key: key.into(),
                    optional: Some(optional),
                }),
                ..Default::default()
            }),
        }
    }

    /// `$(NAME)`, the form in which another variable's value can refer to this one.
    pub fn reference(self) -> String {
        format!("$({})", self.name)
    }

    /// Position of this variable in the given env list.
    pub fn index_in(self, env: &[EnvVar]) -> Option<usize> {
        list::index_of(env, self.name)
    }

    /// Reads this variable's literal value from the given env list.
    ///
    /// Variables sourced through `valueFrom` have no literal value and read as `None`.
    pub fn try_from_spec(self, env: &[EnvVar]) -> Result<Option<R::Value>, R::FromReprError> {
        match self
            .index_in(env)
            .and_then(|index| env.get(index))
            .and_then(|var| var.value.as_deref())
        {
            Some(repr) => R::from_repr(repr).map(Some),
            None => Ok(None),
        }
    }
}

impl<R: EnvRepr<IntoReprError = Infallible>> CheckedEnv<R> {
    /// Convenience method for producing an [`EnvVar`] spec
    /// when producing value representation cannot fail.
    pub fn as_k8s_spec(self, value: &R::Value) -> EnvVar {
        let Ok(env) = self.try_as_k8s_spec(value);
        env
    }
}

impl<R: EnvRepr> Clone for CheckedEnv<R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R: EnvRepr> Copy for CheckedEnv<R> {}

impl<R: EnvRepr> fmt::Debug for CheckedEnv<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl<R: EnvRepr> fmt::Display for CheckedEnv<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}
