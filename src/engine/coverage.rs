/// Rough 0-100 exploration coverage signal.
///
/// Screens weigh 5 points each up to 40, elements 1 point each up to 30,
/// any issue found adds 10, and each level of depth 5 up to 20.
pub fn coverage_score(screens: usize, elements: usize, issues_found: bool, depth: usize) -> u32 {
    let screens = (screens * 5).min(40);
    let elements = elements.min(30);
    let issues = if issues_found { 10 } else { 0 };
    let depth = (depth * 5).min(20);
    (screens + elements + issues + depth).min(100) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_exploration_scores_zero() {
        assert_eq!(coverage_score(0, 0, false, 0), 0);
    }

    #[test]
    fn test_components_are_capped() {
        assert_eq!(coverage_score(3, 12, false, 1), 15 + 12 + 5);
        assert_eq!(coverage_score(50, 500, true, 9), 100);
        assert_eq!(coverage_score(8, 0, false, 0), 40);
    }
}
