use ahash::{HashMap, HashMapExt};

/// A known relationship between two birds, e.g. `("a", "sibling", "b")`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub subject: String,
    pub kind: String,
    pub object: String,
}

/// subject name -> object name -> relationship type
#[derive(Debug, Default, Clone)]
pub struct RelationshipMap {
    map: HashMap<String, HashMap<String, String>>,
}

impl RelationshipMap {
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    pub fn insert(&mut self, subject: &str, object: &str, kind: &str) {
        self.map
            .entry(subject.to_owned())
            .or_default()
            .insert(object.to_owned(), kind.to_owned());
    }

    /// relationship recorded with `subject` as subject
    pub fn get(&self, subject: &str, object: &str) -> Option<&str> {
        self.map
            .get(subject)
            .and_then(|m| m.get(object))
            .map(String::as_str)
    }

    /// relationship recorded in either direction
    pub fn between(&self, a: &str, b: &str) -> Option<&str> {
        self.get(a, b).or_else(|| self.get(b, a))
    }

    pub fn len(&self) -> usize {
        self.map.values().map(|m| m.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FromIterator<Relationship> for RelationshipMap {
    fn from_iter<I: IntoIterator<Item = Relationship>>(iter: I) -> Self {
        let mut m = Self::new();
        for r in iter {
            m.insert(&r.subject, &r.object, &r.kind);
        }
        m
    }
}

#[test]
fn test_relationship_map() {
    let rels = vec![
        Relationship {
            subject: "chick".into(),
            kind: "child".into(),
            object: "sire".into(),
        },
        Relationship {
            subject: "chick".into(),
            kind: "sibling".into(),
            object: "nestmate".into(),
        },
    ];
    let m: RelationshipMap = rels.into_iter().collect();
    assert_eq!(m.len(), 2);
    assert_eq!(m.get("chick", "sire"), Some("child"));
    assert_eq!(m.get("sire", "chick"), None);
    assert_eq!(m.between("sire", "chick"), Some("child"));
    assert_eq!(m.between("sire", "nestmate"), None);
}
