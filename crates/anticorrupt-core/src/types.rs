//! Shared vocabulary: entity kinds, tagged references, closed enumerations.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Declares a closed enumeration whose on-disk form is a fixed lowercase string.
macro_rules! closed_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }

            /// Comma-separated list of accepted spellings, for error messages.
            pub fn expected() -> String {
                Self::ALL.iter().map(|v| v.as_str()).collect::<Vec<_>>().join(", ")
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(format!("unknown value '{}' (expected one of: {})", other, Self::expected())),
                }
            }
        }
    };
}

closed_enum! {
    /// The five record kinds held by the record store.
    EntityKind {
        Institution => "institution",
        Figure => "figure",
        Event => "event",
        Relationship => "relationship",
        Glossary => "glossary",
    }
}

impl EntityKind {
    /// Directory name under the data dir.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::Institution => "institutions",
            Self::Figure => "figures",
            Self::Event => "events",
            Self::Relationship => "relationships",
            Self::Glossary => "glossary",
        }
    }

    /// Key under which a multi-record file may list its records.
    pub fn collection_key(&self) -> &'static str {
        match self {
            Self::Glossary => "terms",
            _ => self.dir_name(),
        }
    }

    /// Kinds that become nodes in the relationship graph.
    pub fn is_node_kind(&self) -> bool {
        matches!(self, Self::Institution | Self::Figure | Self::Event)
    }

    pub const NODE_KINDS: &'static [EntityKind] =
        &[EntityKind::Institution, EntityKind::Figure, EntityKind::Event];
}

closed_enum! {
    /// Branch classification of an institution.
    InstitutionType {
        Executive => "executive",
        Legislative => "legislative",
        Judicial => "judicial",
        Independent => "independent",
        Military => "military",
        Other => "other",
    }
}

closed_enum! {
    EventType {
        Law => "law",
        Decision => "decision",
        Crisis => "crisis",
        Election => "election",
        Appointment => "appointment",
        Scandal => "scandal",
        Reform => "reform",
        Other => "other",
    }
}

closed_enum! {
    RelationshipType {
        AppointedBy => "appointed_by",
        MemberOf => "member_of",
        RuledOn => "ruled_on",
        AlliedWith => "allied_with",
        Opposed => "opposed",
        Investigated => "investigated",
        FundedBy => "funded_by",
        Succeeded => "succeeded",
        Oversees => "oversees",
        Checks => "checks",
        Caused => "caused",
        LedTo => "led_to",
        ActorIn => "actor_in",
        PartOf => "part_of",
    }
}

closed_enum! {
    RelationshipStrength {
        Strong => "strong",
        Moderate => "moderate",
        Weak => "weak",
    }
}

closed_enum! {
    /// Lifecycle of a controversy. `Ongoing` sits outside the ordered lifecycle.
    ControversyStatus {
        Alleged => "alleged",
        Investigated => "investigated",
        Charged => "charged",
        Convicted => "convicted",
        Acquitted => "acquitted",
        Ongoing => "ongoing",
        Closed => "closed",
    }
}

impl ControversyStatus {
    /// Position in the alleged → investigated → charged → outcome lifecycle.
    pub fn stage(&self) -> Option<u8> {
        match self {
            Self::Alleged => Some(0),
            Self::Investigated => Some(1),
            Self::Charged => Some(2),
            Self::Convicted | Self::Acquitted => Some(3),
            Self::Closed => Some(4),
            Self::Ongoing => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Convicted | Self::Acquitted | Self::Closed)
    }
}

/// Weak, typed reference to a record: `{kind, id}`.
///
/// Doubles as the graph node key. Ids are unique within a kind only.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: String,
}

/// Graph nodes are addressed by the same `{kind, id}` pair.
pub type NodeKey = EntityRef;

impl EntityRef {
    pub fn new(kind: EntityKind, id: impl Into<String>) -> Self {
        Self { kind, id: id.into() }
    }

    pub fn institution(id: impl Into<String>) -> Self {
        Self::new(EntityKind::Institution, id)
    }

    pub fn figure(id: impl Into<String>) -> Self {
        Self::new(EntityKind::Figure, id)
    }

    pub fn event(id: impl Into<String>) -> Self {
        Self::new(EntityKind::Event, id)
    }

    pub fn glossary(id: impl Into<String>) -> Self {
        Self::new(EntityKind::Glossary, id)
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_enum_parses_its_own_spelling() {
        for t in RelationshipType::ALL {
            assert_eq!(t.as_str().parse::<RelationshipType>().unwrap(), *t);
        }
        assert!("overseen".parse::<RelationshipType>().is_err());
    }

    #[test]
    fn unknown_value_lists_expected() {
        let err = "supreme".parse::<InstitutionType>().unwrap_err();
        assert!(err.contains("supreme"));
        assert!(err.contains("judicial"));
    }

    #[test]
    fn controversy_lifecycle_order() {
        assert!(ControversyStatus::Alleged.stage() < ControversyStatus::Charged.stage());
        assert_eq!(ControversyStatus::Ongoing.stage(), None);
        assert!(ControversyStatus::Acquitted.is_terminal());
        assert!(!ControversyStatus::Investigated.is_terminal());
    }

    #[test]
    fn entity_ref_display() {
        assert_eq!(EntityRef::institution("stf").to_string(), "institution:stf");
    }
}
