use serde::Serialize;

/// A device endpoint polled every cycle and the snapshot key its payload is stored under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Endpoint {
    pub name: &'static str,
    pub path: &'static str,
}

pub const THROUGHPUT: &str = "throughput";
pub const STATUS_INFO_V4: &str = "status_info_v4";
pub const STATUS_INFO_V6: &str = "status_info_v6";
pub const CELLULAR_INFO_EX: &str = "cellular_info_ex";
pub const CELLULAR_INFO: &str = "cellular_info";
pub const SMS_INBOX_COUNT: &str = "sms_inbox_count";
pub const SMS_OUTBOX_COUNT: &str = "sms_outbox_count";
pub const CELLULAR_STATS: &str = "cellular_stats";
pub const TRAFFIC_MONTHLY: &str = "traffic_monthly";

/// Every source polled per cycle.
///
/// Adding a source is a data change here; the coordinator iterates whatever
/// this table holds.
pub const DEFAULT_CATALOG: &[Endpoint] = &[
    // {"up":"...","down":"..."}
    Endpoint {
        name: THROUGHPUT,
        path: "lte/throughput",
    },
    Endpoint {
        name: STATUS_INFO_V4,
        path: "CMGR/v4_status_info",
    },
    Endpoint {
        name: STATUS_INFO_V6,
        path: "CMGR/v6_status_info",
    },
    // {"data":[pcc, scc1]} with aggregation, flat pcc object without
    Endpoint {
        name: CELLULAR_INFO_EX,
        path: "lte/cellular_info_ex",
    },
    Endpoint {
        name: CELLULAR_INFO,
        path: "lte/cellular_info",
    },
    Endpoint {
        name: SMS_INBOX_COUNT,
        path: "sms/inbox_list_count",
    },
    Endpoint {
        name: SMS_OUTBOX_COUNT,
        path: "sms/outbox_list_count",
    },
    Endpoint {
        name: CELLULAR_STATS,
        path: "lte/cellular_stats",
    },
    // {"rx":"55.34GB","tx":"18.56GB","total":"73.90GB","updated_datetime":"..."}
    Endpoint {
        name: TRAFFIC_MONTHLY,
        path: "traffic/monthly",
    },
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_catalog_names_are_unique() {
        let names: HashSet<_> = DEFAULT_CATALOG.iter().map(|e| e.name).collect();
        assert_eq!(names.len(), DEFAULT_CATALOG.len());
        assert_eq!(DEFAULT_CATALOG.len(), 9);
    }

    #[test]
    fn test_catalog_paths_are_relative() {
        for endpoint in DEFAULT_CATALOG {
            assert!(!endpoint.path.starts_with('/'), "{}", endpoint.path);
        }
    }
}
