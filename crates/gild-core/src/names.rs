//! Fresh identifier generation.

use std::collections::HashSet;

/// Per-file generator for `__<prefix><n>` identifiers.
///
/// The counter is shared by every prefix and only grows, so a name is never
/// handed out twice. Names already present in the file are skipped.
#[derive(Clone, Debug, Default)]
pub struct FreshNames {
    next: u32,
    taken: HashSet<String>,
}

impl FreshNames {
    pub fn new<I, S>(existing: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            next: 0,
            taken: existing.into_iter().map(Into::into).collect(),
        }
    }

    pub fn fresh(&mut self, prefix: &str) -> String {
        loop {
            let name = format!("__{prefix}{}", self.next);
            self.next += 1;
            if self.taken.insert(name.clone()) {
                return name;
            }
        }
    }
}
