use crate::model::{Document, Transaction};
use std::collections::HashMap;

/// Partitions transactions by trimmed linked path.
///
/// Transactions inside a document are stable-sorted by ident, documents are
/// stable-sorted by the base name of their path. Ties keep input order, so
/// the result is deterministic for a given journal.
pub fn group_by_document(transactions: Vec<Transaction>) -> Vec<Document> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<Transaction>> = HashMap::new();
    for tx in transactions {
        let key = tx.path.trim().to_string();
        if key.is_empty() {
            continue;
        }
        groups
            .entry(key.clone())
            .or_insert_with(|| {
                order.push(key);
                Vec::new()
            })
            .push(tx);
    }

    let mut documents: Vec<Document> = order
        .into_iter()
        .filter_map(|key| {
            let mut txs = groups.remove(&key)?;
            txs.sort_by(|a, b| a.ident.cmp(&b.ident));
            Some(Document::new(key, txs))
        })
        .collect();
    documents.sort_by_cached_key(|doc| doc.base_name());
    documents
}

/// For every row, whether it opens a new run of equal idents.
pub fn ident_group_starts(transactions: &[Transaction]) -> Vec<bool> {
    let mut previous: Option<&str> = None;
    transactions
        .iter()
        .map(|tx| {
            let starts = previous != Some(tx.ident.as_str());
            previous = Some(tx.ident.as_str());
            starts
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn tx(unique: &str, ident: &str, path: &str) -> Transaction {
        Transaction {
            unique: unique.to_string(),
            ident: ident.to_string(),
            path: path.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn empty_journal_yields_no_documents() {
        assert!(group_by_document(Vec::new()).is_empty());
    }

    #[test]
    fn groups_by_trimmed_path_and_sorts_by_base_name() {
        let docs = group_by_document(vec![
            tx("1", "B3", "z/alpha.pdf"),
            tx("2", "B1", " a/zulu.pdf"),
            tx("3", "B2", "z/alpha.pdf "),
            tx("4", "B9", "  "),
        ]);
        let paths: Vec<&str> = docs.iter().map(|d| d.path.as_str()).collect();
        assert_eq!(paths, vec!["z/alpha.pdf", "a/zulu.pdf"]);
        let uniques: Vec<&str> = docs[0].transactions.iter().map(|t| t.unique.as_str()).collect();
        assert_eq!(uniques, vec!["3", "1"]);
    }

    #[test]
    fn equal_base_names_keep_first_seen_order() {
        let docs = group_by_document(vec![
            tx("1", "B1", "2024/invoice.pdf"),
            tx("2", "B1", "2023/invoice.pdf"),
        ]);
        assert_eq!(docs[0].path, "2024/invoice.pdf");
        assert_eq!(docs[1].path, "2023/invoice.pdf");
    }

    #[test]
    fn equal_idents_keep_journal_order() {
        let docs = group_by_document(vec![
            tx("1", "B2", "r.pdf"),
            tx("2", "B1", "r.pdf"),
            tx("3", "B2", "r.pdf"),
        ]);
        let uniques: Vec<&str> = docs[0].transactions.iter().map(|t| t.unique.as_str()).collect();
        assert_eq!(uniques, vec!["2", "1", "3"]);
    }

    #[test]
    fn group_starts_mark_first_of_each_ident_run() {
        let rows: Vec<Transaction> = ["A", "A", "B", "B", "B", "C"]
            .iter()
            .enumerate()
            .map(|(i, ident)| tx(&i.to_string(), ident, "x.pdf"))
            .collect();
        let starts = ident_group_starts(&rows);
        let positions: Vec<usize> = starts
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.then_some(i))
            .collect();
        assert_eq!(positions, vec![0, 2, 5]);
    }

    proptest! {
        #[test]
        fn grouping_is_an_exact_partition(
            rows in prop::collection::vec(("[A-D]", "[ ]{0,2}[a-e]/[p-s]\\.pdf[ ]{0,2}"), 0..60)
        ) {
            let input: Vec<Transaction> = rows
                .iter()
                .enumerate()
                .map(|(i, (ident, path))| tx(&i.to_string(), ident, path))
                .collect();
            let docs = group_by_document(input.clone());

            let mut seen: Vec<String> = docs
                .iter()
                .flat_map(|d| d.transactions.iter().map(|t| t.unique.clone()))
                .collect();
            seen.sort();
            let mut expected: Vec<String> = input.iter().map(|t| t.unique.clone()).collect();
            expected.sort();
            prop_assert_eq!(seen, expected);

            for doc in &docs {
                for t in &doc.transactions {
                    prop_assert_eq!(t.path.trim(), doc.path.as_str());
                }
                prop_assert!(doc.transactions.windows(2).all(|w| w[0].ident <= w[1].ident));
            }
            prop_assert!(docs.windows(2).all(|w| w[0].base_name() <= w[1].base_name()));
            let paths: std::collections::BTreeSet<&str> = docs.iter().map(|d| d.path.as_str()).collect();
            prop_assert_eq!(paths.len(), docs.len());
        }
    }
}
