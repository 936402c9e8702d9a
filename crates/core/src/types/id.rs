//! Newtype IDs for type-safe entity references.
//!
//! Use the `define_id!` macro to create type-safe wrappers around the opaque
//! string identifiers the backend issues. The wrappers prevent accidentally
//! mixing IDs from different entity types and guarantee non-emptiness.

/// Error returned when parsing an opaque ID from a string.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind} id cannot be empty")]
pub struct IdError {
    /// Name of the ID type that failed to parse.
    pub kind: &'static str,
}

/// Macro to define a type-safe opaque ID wrapper.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`
/// - `parse()` enforcing non-emptiness, plus `as_str()`
/// - `Display` and `TryFrom<&str>` implementations
///
/// # Example
///
/// ```rust
/// # use vikareta_core::define_id;
/// define_id!(UserId);
/// define_id!(SessionId);
///
/// let user_id = UserId::parse("u1").unwrap();
/// assert_eq!(user_id.as_str(), "u1");
/// assert!(UserId::parse("").is_err());
///
/// // These are different types, so this won't compile:
/// // let _: UserId = SessionId::parse("s1").unwrap();
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Parse an ID from a string, rejecting empty input.
            ///
            /// # Errors
            ///
            /// Returns [`IdError`](crate::types::id::IdError) if the input
            /// is empty.
            pub fn parse(s: &str) -> ::core::result::Result<Self, $crate::types::id::IdError> {
                if s.is_empty() {
                    return Err($crate::types::id::IdError {
                        kind: stringify!($name),
                    });
                }
                Ok(Self(s.to_owned()))
            }

            /// Get the underlying string value.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl ::core::convert::TryFrom<&str> for $name {
            type Error = $crate::types::id::IdError;

            fn try_from(s: &str) -> ::core::result::Result<Self, Self::Error> {
                Self::parse(s)
            }
        }
    };
}

// Standard entity IDs issued by the backend.
define_id!(UserId);
define_id!(SessionId);
