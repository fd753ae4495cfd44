use crate::error::LabelError;
use glob::Pattern;

/// Which worksheets a read should return.
#[derive(Clone, Debug)]
pub struct Criteria {
    /// Glob patterns over sheet names; `None` accepts every sheet.
    pub(crate) sheet_name_patterns: Option<Vec<Pattern>>,

    /// Maximum number of sheets to read.
    pub(crate) sheet_limit: Option<usize>,
}

impl Criteria {
    /// The first sheet whose name matches `pattern`, or simply the first sheet.
    pub fn first_sheet(pattern: Option<&str>) -> Result<Criteria, LabelError> {
        let sheet_name_patterns = pattern
            .map(|pattern| Pattern::new(pattern).map(|pattern| vec![pattern]))
            .transpose()?;
        Ok(Criteria {
            sheet_name_patterns,
            sheet_limit: Some(1),
        })
    }

    pub(crate) fn accept(&self, sheet_name: &str) -> bool {
        match &self.sheet_name_patterns {
            Some(patterns) => patterns.iter().any(|pattern| pattern.matches(sheet_name)),
            None => true,
        }
    }

    /// Whether `count` sheets already satisfy the limit.
    pub(crate) fn is_full(&self, count: usize) -> bool {
        self.sheet_limit.map(|limit| count >= limit).unwrap_or(false)
    }
}

impl Default for Criteria {
    fn default() -> Self {
        Criteria {
            sheet_name_patterns: None,
            sheet_limit: Some(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_everything_without_patterns() {
        let criteria = Criteria::default();
        assert!(criteria.accept("Sheet1"));
        assert!(!criteria.is_full(0));
        assert!(criteria.is_full(1));
    }

    #[test]
    fn matches_sheet_globs() {
        let criteria = Criteria::first_sheet(Some("Inv*")).unwrap();
        assert!(criteria.accept("Inventory 2024"));
        assert!(!criteria.accept("Summary"));
    }

    #[test]
    fn rejects_malformed_globs() {
        assert!(Criteria::first_sheet(Some("[")).is_err());
    }
}
