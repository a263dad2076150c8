/// Stable key for a participant, valid for the lifetime of a match.
///
/// Equality, ordering and hashing only consider `id`. The `name` is carried
/// along for rendering and may differ between two identities that compare
/// equal (a player renaming mid-match).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PlayerIdentity {
    pub id: u64,
    pub name: String,
}

impl PlayerIdentity {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

impl PartialEq for PlayerIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for PlayerIdentity {}

impl core::hash::Hash for PlayerIdentity {
    fn hash<H: core::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialOrd for PlayerIdentity {
    fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PlayerIdentity {
    fn cmp(&self, other: &Self) -> core::cmp::Ordering {
        self.id.cmp(&other.id)
    }
}
