use std::{fmt, marker::PhantomData};

use serde::{
    Deserialize, Deserializer,
    de::{self, Visitor},
};

/// Deserializer function that initialises a `null` value (such as a YAML section
/// header that is not followed by any fields) to `T::default()`.
///
/// # Example
///
/// ```yaml
/// # config.yaml
/// gestures:
/// ```
/// This evaluates to the JSON object `{ "gestures": null }`, which would otherwise
/// fail to deserialise into a struct.
pub fn deserialise_null_to_default<'de, T, D>(deserializer: D) -> Result<T, D::Error>
where
    T: Deserialize<'de> + Default,
    D: Deserializer<'de>,
{
    struct DefaultingVisitor<T>(PhantomData<T>);

    impl<'de, T> Visitor<'de> for DefaultingVisitor<T>
    where
        T: Deserialize<'de> + Default,
    {
        type Value = T;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("null or map")
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(T::default())
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(T::default())
        }

        fn visit_map<M>(self, map: M) -> Result<Self::Value, M::Error>
        where
            M: de::MapAccess<'de>,
        {
            Deserialize::deserialize(de::value::MapAccessDeserializer::new(map))
        }
    }

    deserializer.deserialize_any(DefaultingVisitor(PhantomData))
}
