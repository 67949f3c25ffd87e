/// Case-insensitive whole-word matcher over the configured banned list.
/// An entry with several words matches only as a consecutive run.
#[derive(Debug, Clone, Default)]
pub struct WordFilter {
    entries: Vec<Vec<String>>,
}

fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect()
}

impl WordFilter {
    pub fn new<S: AsRef<str>>(banned: &[S]) -> Self {
        let entries = banned
            .iter()
            .map(|entry| words(entry.as_ref()))
            .filter(|w| !w.is_empty())
            .collect();
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First banned entry found in `text`, if any.
    pub fn check(&self, text: &str) -> Option<String> {
        if self.is_empty() {
            return None;
        }
        let tokens = words(text);
        self.entries
            .iter()
            .find(|entry| tokens.windows(entry.len()).any(|window| window == entry.as_slice()))
            .map(|entry| entry.join(" "))
    }

    /// Check several fields at once, reporting the first hit.
    pub fn check_all(&self, fields: &[&str]) -> Option<String> {
        fields.iter().find_map(|text| self.check(text))
    }
}
