use super::{normalize_id, GameCatalog, GameRecord};

pub const DEFAULT_SEARCH_LIMIT: usize = 200;

#[derive(Debug, Clone)]
pub struct SearchHit<'a> {
    pub score: u32,
    pub record: &'a GameRecord,
}

/// Relevance of `record` for a free-text query. Zero means no match.
pub fn match_score(query: &str, record: &GameRecord) -> u32 {
    let query = query.trim().to_lowercase();
    let id = record.id.to_lowercase();
    let title = record.title.to_lowercase();
    let region = record.region.to_lowercase();

    if query == id {
        return 10_000;
    }
    if query == title {
        return 9_000;
    }
    if id.starts_with(&query) {
        return 8_000;
    }
    if title.starts_with(&query) {
        return 7_000;
    }

    let mut score: i64 = 0;
    if id.contains(&query) {
        score += 5_000;
    }
    if title.contains(&query) {
        score += 4_000;
    }
    if query == region {
        score += 3_000;
    }

    let query_words: Vec<&str> = query.split_whitespace().filter(|w| w.len() > 2).collect();
    let title_words: Vec<&str> = title.split_whitespace().collect();
    if !query_words.is_empty() {
        let exact = query_words
            .iter()
            .filter(|w| title_words.contains(w))
            .count();
        score += 500 * exact as i64;
        if exact == query_words.len() {
            score += 2_000;
        }

        for query_word in &query_words {
            for title_word in &title_words {
                if title_word.starts_with(query_word) {
                    score += 200;
                } else if title_word.contains(query_word) {
                    score += 100;
                }
            }
        }
    }

    // Short queries rarely target very long titles.
    if query.len() < 10 && record.title.chars().count() > 50 {
        score -= 500;
    }

    score.max(0) as u32
}

impl GameCatalog {
    /// Relevance-ranked search. An empty query lists records in id order.
    /// Equal scores keep id order.
    pub fn search(&self, query: &str, limit: usize) -> Vec<SearchHit<'_>> {
        if query.trim().is_empty() {
            return self
                .records()
                .take(limit)
                .map(|record| SearchHit { score: 0, record })
                .collect();
        }

        let mut hits: Vec<SearchHit<'_>> = self
            .records()
            .filter_map(|record| {
                let score = match_score(query, record);
                (score > 0).then_some(SearchHit { score, record })
            })
            .collect();
        hits.sort_by(|a, b| b.score.cmp(&a.score));
        hits.truncate(limit);
        hits
    }

    /// Ids whose alphanumeric form contains, or is contained in, that of `id`.
    pub fn similar_ids(&self, id: &str) -> Vec<&GameRecord> {
        let pattern = normalize_id(id);
        if pattern.is_empty() {
            return Vec::new();
        }
        self.records()
            .filter(|record| {
                let candidate = normalize_id(&record.id);
                candidate.contains(&pattern) || pattern.contains(&candidate)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> GameCatalog {
        GameCatalog::from_records(
            vec![
                GameRecord::new("T-1201N", "Power Stone", "USA"),
                GameRecord::new("T-1218N", "Power Stone 2", "USA"),
                GameRecord::new("MK-51000", "Sonic Adventure", "USA"),
                GameRecord::new("HDR-0041", "Sakura Taisen", "JPN"),
            ],
            "test",
        )
    }

    #[test]
    fn test_exact_id_ranks_first() {
        let catalog = catalog();
        let hits = catalog.search("t-1201n", 10);
        assert_eq!(hits[0].record.id, "T-1201N");
        assert_eq!(hits[0].score, 10_000);
    }

    #[test]
    fn test_title_words() {
        let catalog = catalog();
        let hits = catalog.search("power stone", 10);
        let ids: Vec<&str> = hits.iter().map(|h| h.record.id.as_str()).collect();
        assert_eq!(ids, vec!["T-1201N", "T-1218N"]);
    }

    #[test]
    fn test_no_match_and_empty_query() {
        let catalog = catalog();
        assert!(catalog.search("zzz", 10).is_empty());
        assert_eq!(catalog.search("  ", 2).len(), 2);
    }

    #[test]
    fn test_long_title_penalty_clamps_at_zero() {
        let long = GameRecord::new(
            "X-0001",
            "An Extremely Long Title That Goes On And On Past The Fifty Character Mark",
            "USA",
        );
        assert_eq!(match_score("zz", &long), 0);
    }

    #[test]
    fn test_similar_ids() {
        let catalog = catalog();
        let similar: Vec<&str> = catalog
            .similar_ids("T1201")
            .iter()
            .map(|r| r.id.as_str())
            .collect();
        assert_eq!(similar, vec!["T-1201N"]);
        assert!(catalog.similar_ids("--").is_empty());
    }
}
