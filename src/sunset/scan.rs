use crate::sunset::cluster::SearchCluster;
use anyhow::Result;

pub const GIB: u64 = 1024 * 1024 * 1024;

pub fn threshold_bytes(threshold_gb: f64) -> u64 {
    (GIB as f64 * threshold_gb) as u64
}

/// Archived generations carry a trailing `-MMDDYYYY` stamp: a dash followed
/// by exactly eight ASCII digits.
pub fn is_archived_name(name: &str) -> bool {
    let bytes = name.as_bytes();
    if bytes.len() < 9 {
        return false;
    }
    let (head, tail) = bytes.split_at(bytes.len() - 8);
    head.last() == Some(&b'-') && tail.iter().all(u8::is_ascii_digit)
}

pub fn is_system_name(name: &str) -> bool {
    name.starts_with('.')
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LargeIndex {
    pub name: String,
    pub size_bytes: u64,
}

/// Scan the cluster for archival candidates at or above `threshold_bytes`,
/// in the order the cluster listed them. Already-archived generations and
/// system indices are skipped regardless of size. Each selected index is
/// refreshed so its reported size covers just-written data.
pub fn scan_large_indexes(
    cluster: &dyn SearchCluster,
    threshold_bytes: u64,
) -> Result<Vec<LargeIndex>> {
    let mut out = Vec::new();
    for stat in cluster.list_indices()? {
        if is_archived_name(&stat.name) || is_system_name(&stat.name) {
            continue;
        }
        if stat.size_bytes >= threshold_bytes {
            cluster.refresh(&stat.name)?;
            out.push(LargeIndex {
                name: stat.name,
                size_bytes: stat.size_bytes,
            });
        }
    }
    Ok(out)
}

pub fn find_large_indexes(cluster: &dyn SearchCluster, threshold_bytes: u64) -> Result<Vec<String>> {
    Ok(scan_large_indexes(cluster, threshold_bytes)?
        .into_iter()
        .map(|candidate| candidate.name)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sunset::cluster::mock::{MockCluster, MockIndex};

    #[test]
    fn archived_names_are_detected() {
        assert!(is_archived_name("telemetry-data-08062026"));
        assert!(!is_archived_name("telemetry-data"));
        assert!(!is_archived_name("telemetry-data-0806202"));
        assert!(!is_archived_name("telemetry-data-0806202a"));
        assert!(!is_archived_name("telemetry-data08062026"));
    }

    #[test]
    fn archived_and_system_indices_are_excluded_regardless_of_size() {
        let cluster = MockCluster::new();
        cluster.add_index("telemetry-data", MockIndex::with_docs(10, 5 * GIB));
        cluster.add_index("telemetry-data-08062026", MockIndex::with_docs(10, 50 * GIB));
        cluster.add_index(".kibana", MockIndex::with_docs(10, 50 * GIB));

        let found = find_large_indexes(&cluster, GIB).expect("scan");
        assert_eq!(found, vec!["telemetry-data".to_string()]);
    }

    #[test]
    fn threshold_is_inclusive() {
        let cluster = MockCluster::new();
        cluster.add_index("at-threshold", MockIndex::with_docs(1, GIB));
        cluster.add_index("below-threshold", MockIndex::with_docs(1, GIB - 1));

        let found = find_large_indexes(&cluster, GIB).expect("scan");
        assert_eq!(found, vec!["at-threshold".to_string()]);
    }

    #[test]
    fn cluster_order_is_preserved() {
        let cluster = MockCluster::new();
        cluster.add_index("zulu", MockIndex::with_docs(1, 2 * GIB));
        cluster.add_index("alpha", MockIndex::with_docs(1, 2 * GIB));

        let found = find_large_indexes(&cluster, GIB).expect("scan");
        assert_eq!(found, vec!["zulu".to_string(), "alpha".to_string()]);
    }

    #[test]
    fn fractional_threshold_rounds_down_to_bytes() {
        assert_eq!(threshold_bytes(1.0), GIB);
        assert_eq!(threshold_bytes(0.5), GIB / 2);
        assert!(threshold_bytes(0.00001) > 0);
    }
}
