use std::collections::BTreeMap;

/// Reserved label marking an unoccupied lattice site.
pub const VACANCY_LABEL: &str = "X";

#[inline]
pub fn is_vacancy(label: &str) -> bool {
    label == VACANCY_LABEL
}

/// Counts how many sites carry each label.
pub fn composition<S: AsRef<str>>(labels: &[S]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for label in labels {
        *counts.entry(label.as_ref().to_string()).or_insert(0) += 1;
    }
    counts
}

/// Indices of the sites whose label satisfies `pred`, in ascending order.
pub fn indices_where<S, F>(labels: &[S], mut pred: F) -> Vec<usize>
where
    S: AsRef<str>,
    F: FnMut(&str) -> bool,
{
    labels
        .iter()
        .enumerate()
        .filter_map(|(i, label)| pred(label.as_ref()).then_some(i))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_vacancy_matches_only_placeholder() {
        assert!(is_vacancy("X"));
        assert!(!is_vacancy("Xe"));
        assert!(!is_vacancy("O"));
    }

    #[test]
    fn composition_counts_each_label() {
        let counts = composition(&["Mg", "O", "Mg", "X"]);
        assert_eq!(counts["Mg"], 2);
        assert_eq!(counts["O"], 1);
        assert_eq!(counts["X"], 1);
        assert_eq!(counts.len(), 3);
    }

    #[test]
    fn indices_where_returns_matching_sites_in_order() {
        let labels = vec!["A".to_string(), "B".to_string(), "A".to_string()];
        assert_eq!(indices_where(&labels, |l| l == "A"), vec![0, 2]);
        assert!(indices_where(&labels, |l| l == "C").is_empty());
    }
}
