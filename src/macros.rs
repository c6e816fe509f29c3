/// Создаёт новый доменный тип.
///
/// Строковые типы всегда проходят через функцию валидации, которая возвращает
/// [`ValidationError`](crate::error::ValidationError). Значение предварительно
/// очищается от пробелов по краям.
#[macro_export]
macro_rules! newtype {
    ($tname:ident, String, $validate_fn:ident) => {
        #[derive(
            std::fmt::Debug,
            std::clone::Clone,
            serde::Serialize,
            serde::Deserialize,
            std::cmp::PartialEq,
            std::cmp::Eq,
        )]
        #[serde(try_from = "String", into = "String")]
        pub struct $tname(String);

        impl $tname {
            pub fn new(value: &str) -> std::result::Result<Self, $crate::error::ValidationError> {
                let value = value.trim();
                $validate_fn(value)?;
                Ok(Self(value.to_owned()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::convert::From<$tname> for String {
            fn from(value: $tname) -> String {
                value.0
            }
        }

        impl std::convert::TryFrom<String> for $tname {
            type Error = $crate::error::ValidationError;

            fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
                $tname::new(&value)
            }
        }

        impl std::fmt::Display for $tname {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };

    ($tname:ident, $type:ty) => {
        #[derive(
            std::fmt::Debug,
            std::clone::Clone,
            std::marker::Copy,
            serde::Serialize,
            serde::Deserialize,
            std::cmp::PartialEq,
            std::cmp::Eq,
            std::cmp::PartialOrd,
            std::cmp::Ord,
            std::hash::Hash,
        )]
        #[serde(transparent)]
        pub struct $tname($type);

        impl $tname {
            pub fn new(value: $type) -> Self {
                Self(value)
            }

            pub fn get(self) -> $type {
                self.0
            }
        }

        impl std::convert::From<$type> for $tname {
            fn from(value: $type) -> Self {
                $tname::new(value)
            }
        }

        impl std::str::FromStr for $tname {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok($tname::new(<$type>::from_str(s.trim())?))
            }
        }

        impl std::fmt::Display for $tname {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}
