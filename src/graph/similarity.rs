use crate::util::normalize_tag;

/// Normalized, sorted and deduplicated tag collection.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TagSet {
    tags: Vec<String>,
}

impl TagSet {
    pub fn new<S: AsRef<str>>(tags: &[S]) -> Self {
        let mut tags = tags
            .iter()
            .map(|tag| normalize_tag(tag.as_ref()))
            .filter(|tag| !tag.is_empty())
            .collect::<Vec<_>>();
        tags.sort_unstable();
        tags.dedup();
        Self { tags }
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().map(String::as_str)
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.tags.binary_search_by(|entry| entry.as_str().cmp(tag)).is_ok()
    }

    pub fn intersection_len(&self, other: &Self) -> usize {
        let (mut i, mut j, mut shared) = (0, 0, 0);
        while i < self.tags.len() && j < other.tags.len() {
            match self.tags[i].cmp(&other.tags[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    shared += 1;
                    i += 1;
                    j += 1;
                }
            }
        }
        shared
    }

    pub fn shares_any(&self, other: &Self) -> bool {
        let (small, large) = if self.len() <= other.len() {
            (self, other)
        } else {
            (other, self)
        };
        small.iter().any(|tag| large.contains(tag))
    }

    pub fn jaccard(&self, other: &Self) -> f32 {
        if self.is_empty() || other.is_empty() {
            return 0.0;
        }
        let shared = self.intersection_len(other);
        let union = self.len() + other.len() - shared;
        shared as f32 / union as f32
    }
}

pub fn jaccard<A: AsRef<str>, B: AsRef<str>>(a: &[A], b: &[B]) -> f32 {
    TagSet::new(a).jaccard(&TagSet::new(b))
}
