//! Near-duplicate removal and lax entry checks for scraped records.
use crate::dataset::{Campus, Dataset, Restaurant};
use serde::Serialize;

/// Default similarity at or above which two names are the same place.
pub const DEFAULT_THRESHOLD: f64 = 0.85;

const MIN_NAME_CHARS: usize = 2;

/// Ratcliff/Obershelp similarity of two names, case-folded, in `[0, 1]`.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.to_lowercase().chars().collect();
    let b: Vec<char> = b.to_lowercase().chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    let matches = matching_chars(&a, &b);
    2.0 * matches as f64 / total as f64
}

/// Sum of all matching block sizes, found recursively around the longest
/// common block (leftmost in `a`, then leftmost in `b`, on ties).
fn matching_chars(a: &[char], b: &[char]) -> usize {
    let mut total = 0;
    let mut pending = vec![(0, a.len(), 0, b.len())];
    while let Some((alo, ahi, blo, bhi)) = pending.pop() {
        let (i, j, size) = longest_match(a, b, alo, ahi, blo, bhi);
        if size == 0 {
            continue;
        }
        total += size;
        if alo < i && blo < j {
            pending.push((alo, i, blo, j));
        }
        if i + size < ahi && j + size < bhi {
            pending.push((i + size, ahi, j + size, bhi));
        }
    }
    total
}

fn longest_match(
    a: &[char],
    b: &[char],
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let (mut best_i, mut best_j, mut best_size) = (alo, blo, 0);
    // run[j + 1] is the length of the common run ending at a[i], b[j].
    let mut run = vec![0usize; bhi - blo + 1];
    for (i, ca) in a.iter().enumerate().take(ahi).skip(alo) {
        let mut next = vec![0usize; bhi - blo + 1];
        for (j, cb) in b.iter().enumerate().take(bhi).skip(blo) {
            if ca != cb {
                continue;
            }
            let size = run[j - blo] + 1;
            next[j - blo + 1] = size;
            if size > best_size {
                best_i = i + 1 - size;
                best_j = j + 1 - size;
                best_size = size;
            }
        }
        run = next;
    }
    (best_i, best_j, best_size)
}

/// Drop later records whose name is too similar to an earlier one.
///
/// Order is preserved and the first occurrence always wins. Records without
/// a name are dropped.
pub fn dedupe(records: Vec<Restaurant>, threshold: f64) -> Vec<Restaurant> {
    let mut kept = Vec::with_capacity(records.len());
    let mut seen: Vec<String> = Vec::new();
    for record in records {
        let name = record.name().to_string();
        if name.is_empty() {
            continue;
        }
        if let Some(earlier) = seen
            .iter()
            .find(|earlier| similarity(&name, earlier) >= threshold)
        {
            tracing::info!(name = %name, earlier = %earlier, "dropping near-duplicate");
            continue;
        }
        seen.push(name);
        kept.push(record);
    }
    kept
}

/// Lax validity for scraped entries: a usable name, and a rating in range
/// when it parses. Unparsable ratings are tolerated.
pub fn is_valid_entry(record: &Restaurant) -> bool {
    let name = record.name();
    if name.is_empty() || name.chars().count() < MIN_NAME_CHARS {
        return false;
    }
    match record.rating() {
        Some(rating) => (0.0..=5.0).contains(&rating),
        None => true,
    }
}

/// Per-campus counts from a clean pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CampusCleanStats {
    pub campus: Campus,
    pub before: usize,
    pub valid: usize,
    pub unique: usize,
}

/// Filter invalid entries then remove near-duplicates in every campus.
pub fn clean_dataset(dataset: &mut Dataset, threshold: f64) -> Vec<CampusCleanStats> {
    let mut stats = Vec::new();
    for campus in Campus::ALL {
        let Some(data) = dataset.campus_mut(campus) else {
            continue;
        };
        let records = std::mem::take(&mut data.restaurants);
        let before = records.len();
        let validated: Vec<Restaurant> = records.into_iter().filter(is_valid_entry).collect();
        let valid = validated.len();
        data.restaurants = dedupe(validated, threshold);
        stats.push(CampusCleanStats {
            campus,
            before,
            valid,
            unique: data.restaurants.len(),
        });
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn named(names: &[&str]) -> Vec<Restaurant> {
        names.iter().map(|name| Restaurant::new(*name)).collect()
    }

    fn names(records: &[Restaurant]) -> Vec<&str> {
        records.iter().map(Restaurant::name).collect()
    }

    #[test]
    fn similarity_matches_sequence_matcher_ratios() {
        assert_eq!(similarity("abcd", "bcde"), 0.75);
        assert_eq!(similarity("Pasta", "pasta"), 1.0);
        assert_eq!(similarity("", ""), 1.0);
        assert_eq!(similarity("abc", "xyz"), 0.0);
        // "kim" + "s bbq" match: 2 * 8 / 17
        let ratio = similarity("Kim's BBQ", "Kims BBQ");
        assert!((ratio - 16.0 / 17.0).abs() < 1e-9, "ratio was {ratio}");
    }

    #[test]
    fn later_near_duplicates_are_dropped() {
        let records = named(&["Kim's BBQ", "Kims BBQ", "Pasta House"]);
        let unique = dedupe(records, DEFAULT_THRESHOLD);
        assert_eq!(names(&unique), vec!["Kim's BBQ", "Pasta House"]);
    }

    #[test]
    fn first_occurrence_wins_with_its_fields() {
        let mut first = Restaurant::new("Kims BBQ");
        first.set("phone", json!("first"));
        let mut second = Restaurant::new("KIM'S BBQ");
        second.set("phone", json!("second"));
        let unique = dedupe(vec![first, second], DEFAULT_THRESHOLD);
        assert_eq!(unique.len(), 1);
        assert_eq!(unique[0].get("phone"), Some(&json!("first")));
    }

    #[test]
    fn output_keeps_order_and_has_no_similar_pairs() {
        let records = named(&[
            "Noodle Bar",
            "Pasta House",
            "Noodle Bar ",
            "Burger Lab",
            "pasta house",
            "Sushi Go",
        ]);
        let unique = dedupe(records, DEFAULT_THRESHOLD);
        assert_eq!(
            names(&unique),
            vec!["Noodle Bar", "Pasta House", "Burger Lab", "Sushi Go"]
        );
        for (i, a) in unique.iter().enumerate() {
            for b in &unique[i + 1..] {
                assert!(similarity(a.name(), b.name()) < DEFAULT_THRESHOLD);
            }
        }
    }

    #[test]
    fn nameless_records_are_dropped() {
        let records = vec![Restaurant::new("  "), Restaurant::default(), Restaurant::new("Cafe")];
        assert_eq!(names(&dedupe(records, DEFAULT_THRESHOLD)), vec!["Cafe"]);
    }

    #[test]
    fn entry_validity_is_lax_about_unparsable_ratings() {
        let mut record = Restaurant::new("Pasta House");
        record.set("rating", json!("별점 없음"));
        assert!(is_valid_entry(&record));

        record.set("rating", json!(6));
        assert!(!is_valid_entry(&record));

        record.set("rating", json!("4.9"));
        assert!(is_valid_entry(&record));

        assert!(!is_valid_entry(&Restaurant::new("A")));
        assert!(!is_valid_entry(&Restaurant::new("   ")));
        assert!(is_valid_entry(&Restaurant::new("국밥")));
    }

    #[test]
    fn clean_dataset_filters_then_dedupes_each_campus() {
        let mut dataset = Dataset::default();
        let seoul = dataset.campus_entry(Campus::Seoul);
        seoul.restaurants = named(&["Kim's BBQ", "X", "Kims BBQ", "Pasta House"]);

        let stats = clean_dataset(&mut dataset, DEFAULT_THRESHOLD);

        assert_eq!(
            stats,
            vec![CampusCleanStats {
                campus: Campus::Seoul,
                before: 4,
                valid: 3,
                unique: 2,
            }]
        );
        let seoul = dataset.campus(Campus::Seoul).unwrap();
        assert_eq!(names(&seoul.restaurants), vec!["Kim's BBQ", "Pasta House"]);
    }
}
