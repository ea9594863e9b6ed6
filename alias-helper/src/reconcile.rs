// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use namescheme::AliasMappingRequest;
use tracing::{debug, error, info};

use crate::error::AliasError;
use crate::links::LinkTable;

/// Outcome of one reconciliation pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PassReport {
    pub applied: usize,
    pub up_to_date: usize,
    pub missing: usize,
    pub failed: usize,
}

/// Give every source link its requested alias.
///
/// The link table is read once per pass. Links that do not exist yet are skipped; a failure to
/// set one alias does not stop the pass.
pub async fn reconcile_pass(
    table: &dyn LinkTable,
    requests: &[AliasMappingRequest],
) -> Result<PassReport, AliasError> {
    let links = table.links().await?;
    let mut report = PassReport::default();
    for request in requests {
        let Some(link) = links
            .iter()
            .find(|link| link.name == request.source_interface.as_str())
        else {
            debug!("Link {} not present", request.source_interface);
            report.missing += 1;
            continue;
        };
        if link.alias.as_deref() == Some(request.alias_name.as_str()) {
            report.up_to_date += 1;
            continue;
        }
        info!(
            "Setting alias {} on link {} (ifindex {})",
            request.alias_name, link.name, link.index
        );
        match table.set_alias(link.index, request.alias_name.as_str()).await {
            Ok(()) => report.applied += 1,
            Err(e) => {
                error!("{e}");
                report.failed += 1;
            }
        }
    }
    Ok(report)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::links::test::MemoryLinkTable;
    use crate::request::parse_requests;
    use pretty_assertions::assert_eq;
    use tracing_test::traced_test;

    fn requests() -> Vec<AliasMappingRequest> {
        parse_requests(
            r#"[{"sourceInterface":"tap1","aliasName":"tap37a8eec1ce1"},{"sourceInterface":"tap2","aliasName":"tap0123456789a"}]"#,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_converges_in_one_pass() {
        let table = MemoryLinkTable::new(&[
            (1, "lo", None),
            (5, "tap1", None),
            (6, "tap2", Some("old")),
        ]);
        let report = reconcile_pass(&table, &requests()).await.unwrap();
        assert_eq!(
            report,
            PassReport {
                applied: 2,
                ..Default::default()
            }
        );
        assert_eq!(table.alias("tap1").as_deref(), Some("tap37a8eec1ce1"));
        assert_eq!(table.alias("tap2").as_deref(), Some("tap0123456789a"));

        let report = reconcile_pass(&table, &requests()).await.unwrap();
        assert_eq!(
            report,
            PassReport {
                up_to_date: 2,
                ..Default::default()
            }
        );
        assert_eq!(table.sets(), 2);
    }

    #[tokio::test]
    async fn test_missing_link_is_skipped() {
        let table = MemoryLinkTable::new(&[(5, "tap1", None)]);
        let report = reconcile_pass(&table, &requests()).await.unwrap();
        assert_eq!(report.applied, 1);
        assert_eq!(report.missing, 1);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_failure_does_not_stop_the_pass() {
        let table = MemoryLinkTable::new(&[(5, "tap1", None), (6, "tap2", None)]).failing(5);
        let report = reconcile_pass(&table, &requests()).await.unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.applied, 1);
        assert_eq!(table.alias("tap1"), None);
        assert_eq!(table.alias("tap2").as_deref(), Some("tap0123456789a"));
        assert!(logs_contain("Failed to set alias of link 5"));
    }
}
