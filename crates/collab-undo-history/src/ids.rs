/// Identifiers shared by the document and the undo history.
use std::fmt;

/// Identifies one replica editing a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(u64);

impl ClientId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Generates a random client id for a new replica.
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().as_u128() as u64)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Globally unique id of a single character item: the inserting replica
/// plus that replica's clock at insertion time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId {
    pub client: ClientId,
    pub clock: u64,
}

impl ItemId {
    pub fn new(client: ClientId, clock: u64) -> Self {
        Self { client, clock }
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.clock, self.client)
    }
}

/// Name of a text container inside a document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContainerId(String);

impl ContainerId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ContainerId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Source tag of a transaction.
///
/// The undo history records only transactions whose origin is in its
/// tracked set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Origin {
    /// Plain local edit without a tag.
    Untagged,
    /// Replay of an undo or redo step by the history itself.
    History,
    /// Any named source: a remote provider, a paste handler, a formatter.
    Tag(String),
}

impl Origin {
    pub fn tag(name: impl Into<String>) -> Self {
        Self::Tag(name.into())
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Untagged => f.write_str("untagged"),
            Origin::History => f.write_str("history"),
            Origin::Tag(name) => write!(f, "tag:{name}"),
        }
    }
}
