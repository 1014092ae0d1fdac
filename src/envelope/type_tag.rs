use std::fmt;

use prost::Name;

/// Routing key for a payload kind.
///
/// Either a bare fully-qualified message name (`poddeck.PodListRequest`) or a
/// complete type URL. An inbound type URL matches both forms, see
/// [`TypeTag::candidates`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeTag(String);

impl TypeTag {
    pub fn new(tag: impl Into<String>) -> Self {
        TypeTag(tag.into())
    }

    /// Tag for a prost message type.
    pub fn of<M: Name>() -> Self {
        TypeTag(M::full_name())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Tags an inbound `type_url` structurally matches: the URL itself and
    /// the message name after its last `/`. Deduplicated, URL first.
    pub fn candidates(type_url: &str) -> Vec<TypeTag> {
        let mut tags = vec![TypeTag::new(type_url)];
        if let Some((_, name)) = type_url.rsplit_once('/') {
            if !name.is_empty() && name != type_url {
                tags.push(TypeTag::new(name));
            }
        }
        tags
    }
}

impl fmt::Display for TypeTag {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TypeTag {
    fn from(tag: &str) -> Self {
        TypeTag::new(tag)
    }
}

impl From<String> for TypeTag {
    fn from(tag: String) -> Self {
        TypeTag(tag)
    }
}
