use crate::vision::observation::DetectedElement;

/// Case-insensitive substring blocklist for exploration targets.
#[derive(Debug, Clone, Default)]
pub struct AvoidList {
    patterns: Vec<String>,
}

impl AvoidList {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            patterns: patterns
                .into_iter()
                .map(|p| p.as_ref().trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    /// The pattern that blocks `candidate`, if any.
    pub fn matching(&self, candidate: &str) -> Option<&str> {
        let lowered = candidate.to_lowercase();
        self.patterns
            .iter()
            .find(|p| lowered.contains(p.as_str()))
            .map(String::as_str)
    }

    pub fn blocks(&self, element: &DetectedElement) -> bool {
        self.matching(&element.identifier).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::observation::ElementState;

    fn element(id: &str) -> DetectedElement {
        DetectedElement {
            element_type: "button".into(),
            identifier: id.into(),
            state: ElementState::Enabled,
            position: None,
            interactive: true,
        }
    }

    #[test]
    fn test_substring_match_ignores_case() {
        let avoid = AvoidList::new(["logout", "Delete"]);
        assert!(avoid.blocks(&element("settings-LOGOUT-button")));
        assert!(avoid.blocks(&element("Delete account")));
        assert_eq!(avoid.matching("deleteAll"), Some("delete"));
        assert!(!avoid.blocks(&element("profile-tab")));
    }

    #[test]
    fn test_blank_patterns_are_ignored() {
        let avoid = AvoidList::new(["", "  "]);
        assert!(!avoid.blocks(&element("anything")));
    }
}
