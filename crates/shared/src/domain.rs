use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Backends disagree on whether ids travel as JSON numbers or numeric
/// strings; accept both and always emit numbers.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Int(i64),
    Str(String),
}

fn deserialize_id<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match RawId::deserialize(deserializer)? {
        RawId::Int(value) => Ok(value),
        RawId::Str(raw) => raw
            .trim()
            .parse::<i64>()
            .map_err(|_| serde::de::Error::custom(format!("invalid numeric id: {raw:?}"))),
    }
}

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
        pub struct $name(pub i64);

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                deserialize_id(deserializer).map($name)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(UserId);
id_newtype!(GroupId);
id_newtype!(MessageId);

/// Logical channel a conversation is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub String);

impl RoomId {
    /// Room shared by two participants of a direct conversation. The lower id
    /// always comes first so both ends compute the same string.
    pub fn direct(a: UserId, b: UserId) -> Self {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        Self(format!("{}_{}", lo.0, hi.0))
    }

    pub fn group(group_id: GroupId) -> Self {
        Self(group_id.0.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    #[default]
    Text,
    File,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(alias = "_id")]
    pub id: UserId,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    #[serde(alias = "_id")]
    pub id: UserId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default)]
    pub unread: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSummary {
    #[serde(alias = "_id")]
    pub id: GroupId,
    #[serde(default)]
    pub name: String,
    #[serde(
        default,
        deserialize_with = "deserialize_member_count",
        skip_serializing_if = "Option::is_none"
    )]
    pub members: Option<u32>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawMembers {
    Count(u32),
    List(Vec<serde_json::Value>),
}

fn deserialize_member_count<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(
        Option::<RawMembers>::deserialize(deserializer)?.map(|raw| match raw {
            RawMembers::Count(count) => count,
            RawMembers::List(members) => u32::try_from(members.len()).unwrap_or(u32::MAX),
        }),
    )
}
