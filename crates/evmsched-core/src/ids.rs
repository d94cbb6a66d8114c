//! Opaque 128-bit identifiers for domain entities.
//!
//! Each entity family gets its own newtype so that an `ActivityId` can never
//! be passed where a `ResourceId` is expected. The derived `Ord` gives the
//! deterministic tie-breaks the solver relies on.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! id_newtype {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generate a fresh random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing UUID.
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

id_newtype!(
    /// Identifier of a [`crate::Program`].
    ProgramId
);
id_newtype!(
    /// Identifier of a [`crate::WbsElement`].
    WbsId
);
id_newtype!(
    /// Identifier of an [`crate::Activity`].
    ActivityId
);
id_newtype!(
    /// Identifier of a [`crate::Dependency`] edge.
    DependencyId
);
id_newtype!(
    /// Identifier of a [`crate::Resource`].
    ResourceId
);
id_newtype!(
    /// Identifier of an [`crate::Assignment`].
    AssignmentId
);
id_newtype!(
    /// Identifier of an [`crate::EvmsPeriod`].
    PeriodId
);
id_newtype!(
    /// Identifier of a Jira integration.
    IntegrationId
);
id_newtype!(
    /// Identifier of a Jira entity mapping.
    MappingId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        let a = ActivityId::new();
        let b = ActivityId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn ids_order_deterministically() {
        let mut ids: Vec<ActivityId> = (0..8).map(|_| ActivityId::new()).collect();
        ids.sort();
        let resorted = {
            let mut v = ids.clone();
            v.sort();
            v
        };
        assert_eq!(ids, resorted);
    }

    #[test]
    fn display_round_trips_through_uuid() {
        let id = ProgramId::new();
        assert_eq!(id.to_string(), id.0.to_string());
    }
}
