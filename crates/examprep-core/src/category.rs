//! Category label normalization.
//!
//! Maps free-text category labels onto the fixed set of canonical sections:
//! exact label match first, then a case-insensitive keyword search, then
//! [`Section::GeneralInfo`]. Total: every input yields a section.

use crate::model::Section;

/// Labels matched verbatim (case-sensitive) before any fuzzy matching.
const LABELS: &[(&str, Section)] = &[
    ("Verbal Ability", Section::Verbal),
    ("Numerical Ability", Section::Numerical),
    ("Analytical Ability", Section::Analytical),
    ("General Information", Section::GeneralInfo),
    ("Clerical Ability", Section::Clerical),
    ("Philippine Constitution", Section::Constitution),
    ("verbal", Section::Verbal),
    ("numerical", Section::Numerical),
    ("analytical", Section::Analytical),
    ("generalInfo", Section::GeneralInfo),
    ("clerical", Section::Clerical),
    ("constitution", Section::Constitution),
];

/// Section-specific keywords searched in the lower-cased label, in priority order.
const KEYWORDS: &[(&str, Section)] = &[
    ("verbal", Section::Verbal),
    ("numerical", Section::Numerical),
    ("analytical", Section::Analytical),
    ("clerical", Section::Clerical),
    ("constitution", Section::Constitution),
    ("philippine", Section::Constitution),
];

/// How a label reached its section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Exact,
    Keyword,
    Default,
}

/// Normalize a category label to its canonical section.
pub fn normalize_category(label: &str) -> Section {
    classify_category(label).0
}

/// Normalize a category label and report which rule matched.
pub fn classify_category(label: &str) -> (Section, MatchKind) {
    if let Some((_, section)) = LABELS.iter().find(|(l, _)| *l == label) {
        return (*section, MatchKind::Exact);
    }

    let lowered = label.to_lowercase();
    if let Some((_, section)) = KEYWORDS.iter().find(|(k, _)| lowered.contains(k)) {
        return (*section, MatchKind::Keyword);
    }

    (Section::GeneralInfo, MatchKind::Default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_labels() {
        assert_eq!(normalize_category("Verbal Ability"), Section::Verbal);
        assert_eq!(normalize_category("Philippine Constitution"), Section::Constitution);
        assert_eq!(normalize_category("generalInfo"), Section::GeneralInfo);
        assert_eq!(classify_category("Clerical Ability").1, MatchKind::Exact);
    }

    #[test]
    fn keyword_fallback_is_case_insensitive() {
        assert_eq!(normalize_category("VERBAL reasoning"), Section::Verbal);
        assert_eq!(normalize_category("numerical ability"), Section::Numerical);
        assert_eq!(normalize_category("Analytical - Logic"), Section::Analytical);
        assert_eq!(normalize_category("clerical operations"), Section::Clerical);
        assert_eq!(normalize_category("The 1987 Constitution"), Section::Constitution);
        assert_eq!(normalize_category("Philippine History"), Section::Constitution);
        assert_eq!(classify_category("verbal analogies").1, MatchKind::Keyword);
    }

    #[test]
    fn unknown_labels_default_to_general_info() {
        assert_eq!(normalize_category(""), Section::GeneralInfo);
        assert_eq!(normalize_category("Current Events"), Section::GeneralInfo);
        assert_eq!(classify_category("Science").1, MatchKind::Default);
    }
}
