//! Closed enumerations that travel over the wire.
//!
//! Each enum serializes as its `SCREAMING_SNAKE_CASE` name and lists every
//! variant in `ALL`, which the type registry uses to describe enum values.

/// Declare a wire enum with `as_str`, `ALL`, `Display` and `FromStr`.
#[macro_export]
macro_rules! define_wire_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $wire:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
        )]
        pub enum $name {
            $( $(#[$vmeta])* #[serde(rename = $wire)] $variant ),+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$name] = &[$( $name::$variant ),+];

            /// Wire names of every variant, in declaration order.
            pub const WIRE_NAMES: &'static [&'static str] = &[$( $wire ),+];

            /// Wire name of this variant.
            pub fn as_str(self) -> &'static str {
                match self {
                    $( $name::$variant => $wire ),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.to_ascii_uppercase().as_str() {
                    $( $wire => Ok($name::$variant), )+
                    other => Err(format!("unknown {} '{other}'", stringify!($name))),
                }
            }
        }
    };
}

define_wire_enum! {
    /// Lifecycle status of a pipeline run.
    RunStatus {
        Queued = "QUEUED",
        Starting = "STARTING",
        Started = "STARTED",
        Success = "SUCCESS",
        Failure = "FAILURE",
        Canceling = "CANCELING",
        Canceled = "CANCELED",
    }
}

impl RunStatus {
    /// Whether the run can no longer change status.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failure | Self::Canceled)
    }

    /// Whether a terminate request is meaningful in this status.
    pub fn can_terminate(self) -> bool {
        matches!(self, Self::Queued | Self::Starting | Self::Started)
    }
}
