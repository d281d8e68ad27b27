//! Windowing of page text into reasoning-service excerpts.

use crate::models::config::{ExcerptGranularity, ExcerptPolicy};

/// Build the excerpts to send for one document.
///
/// Per-document policy yields at most one excerpt; per-page policy yields one
/// excerpt per page that has text. Blank documents yield nothing.
pub fn build_excerpts(pages: &[String], policy: &ExcerptPolicy) -> Vec<String> {
    match policy.granularity {
        ExcerptGranularity::PerDocument => {
            let joined = pages
                .iter()
                .map(|p| p.trim())
                .filter(|p| !p.is_empty())
                .map(|p| truncate_chars(p, policy.per_page_chars))
                .collect::<Vec<_>>()
                .join(&policy.page_break);

            if joined.is_empty() {
                Vec::new()
            } else {
                vec![truncate_chars(&joined, policy.max_chars).to_string()]
            }
        }
        ExcerptGranularity::PerPage => {
            let cap = policy.per_page_chars.min(policy.max_chars);
            pages
                .iter()
                .map(|p| p.trim())
                .filter(|p| !p.is_empty())
                .map(|p| truncate_chars(p, cap).to_string())
                .collect()
        }
    }
}

/// First `max` characters of `s`, cut on a character boundary.
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn policy(granularity: ExcerptGranularity, max_chars: usize, per_page_chars: usize) -> ExcerptPolicy {
        ExcerptPolicy {
            granularity,
            max_chars,
            per_page_chars,
            page_break: "|".to_string(),
        }
    }

    #[test]
    fn test_per_document_joins_and_caps() {
        let pages = vec!["aaaaa".to_string(), "  ".to_string(), "bbbbb".to_string()];

        let excerpts = build_excerpts(&pages, &policy(ExcerptGranularity::PerDocument, 100, 3));
        assert_eq!(excerpts, vec!["aaa|bbb".to_string()]);

        let excerpts = build_excerpts(&pages, &policy(ExcerptGranularity::PerDocument, 5, 3));
        assert_eq!(excerpts, vec!["aaa|b".to_string()]);
    }

    #[test]
    fn test_per_page() {
        let pages = vec!["aaaaa".to_string(), "".to_string(), "bb".to_string()];
        let excerpts = build_excerpts(&pages, &policy(ExcerptGranularity::PerPage, 4, 10));
        assert_eq!(excerpts, vec!["aaaa".to_string(), "bb".to_string()]);
    }

    #[test]
    fn test_blank_document() {
        let pages = vec![" ".to_string()];
        assert!(build_excerpts(&pages, &ExcerptPolicy::default()).is_empty());
    }

    #[test]
    fn test_truncate_on_char_boundary() {
        assert_eq!(truncate_chars("zażółć", 3), "zaż");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }
}
