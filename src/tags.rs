/// Placeholder strings spreadsheets and dataframes leave behind for missing cells.
const MISSING_MARKERS: [&str; 4] = ["nan", "none", "null", "n/a"];

/// Single canonical form for tags on both the signal and the event side.
///
/// Trims whitespace and folds blanks and missing-value markers to `None`, so a
/// blank event tag can never equal a blank signal tag.
pub fn canonical_tag(raw: Option<&str>) -> Option<String> {
    let trimmed = raw?.trim();
    if trimmed.is_empty()
        || MISSING_MARKERS
            .iter()
            .any(|marker| trimmed.eq_ignore_ascii_case(marker))
    {
        return None;
    }
    Some(trimmed.to_string())
}

/// Same folding for free-form grouping labels (department, keyword, category).
pub fn canonical_label(raw: Option<&str>) -> Option<String> {
    canonical_tag(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blanks_and_markers_fold_to_none() {
        for raw in ["", "   ", "nan", "NaN", " none ", "NULL", "n/a"] {
            assert_eq!(canonical_tag(Some(raw)), None, "{raw:?}");
        }
        assert_eq!(canonical_tag(None), None);
    }

    #[test]
    fn real_tags_are_trimmed_only() {
        assert_eq!(canonical_tag(Some("  ai ")), Some("ai".to_string()));
        assert_eq!(canonical_tag(Some("Nano")), Some("Nano".to_string()));
    }
}
