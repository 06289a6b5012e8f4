use super::{Context, execute, print_failures, select};
use crate::cli::FilterArgs;
use crate::config::Settings;
use crate::tasks::{StatusRow, merge_by_parent, status_rows};
use crate::ui;
use anyhow::Result;
use failover::{ConnectionPool, HttpConnector, HttpGetStub};
use playbook::{Playbook, SharedContext, Step, StepKind};
use topology::{DeployConfig, HostDirectory, Role, Topology};

/// mds metrics page; its body names the instance's role in the election
const MDS_STATUS_PATH: &str = "/vars/mds_status";
/// Port serving the metrics page when it differs from the listen port
const KEY_DUMMY_PORT: &str = "dummy.port";

pub fn run(ctx: &Context, filter: &FilterArgs) -> Result<()> {
    let topology = ctx.load_topology()?;
    let configs = select(&topology, &filter.options())?;
    let hosts = ctx.load_hosts()?;
    let mds_addresses = mds_addresses(&topology, &hosts);
    let builder = ctx.task_builder(hosts);

    let mut playbook = Playbook::new();
    playbook
        .add_step(Step::new(StepKind::InitServiceStatus, configs.clone()).silent_main_bar(true))
        .add_step(
            Step::new(StepKind::GetServiceStatus, configs)
                .concurrency(ctx.concurrency())
                .skip_error(true),
        );

    // rows for unreachable services stay Unknown; the table is still shown
    let report = execute(ctx, &playbook, &builder, None)?;
    if ctx.verbose > 0 {
        print_failures(ctx, &report);
    }

    let rows = status_rows(SharedContext::global());
    let (headers, table): (&[&str], Vec<Vec<String>>) = if ctx.verbose > 0 {
        (INSTANCE_HEADERS.as_slice(), rows.values().map(instance_row).collect())
    } else {
        (SERVICE_HEADERS.as_slice(), merge_by_parent(&rows).iter().map(service_row).collect())
    };

    ui::header(&format!("Cluster status ({})", topology.kind));
    ui::table(headers, &table);

    let up = rows.values().filter(|r| r.is_up()).count();
    println!();
    ui::kv("services up", &format!("{up}/{}", rows.len()));
    if !mds_addresses.is_empty() {
        let leader = find_mds_leader(&ctx.settings, &mds_addresses);
        ui::kv("mds leader", leader.as_deref().unwrap_or("-"));
    }

    if let Some(err) = report.error() {
        ui::warn(&format!("Some services could not be queried: {err}"));
    }
    Ok(())
}

static SERVICE_HEADERS: [&str; 8] = [
    "Id", "Role", "Host", "Replicas", "Container Id", "Ports", "Data Dir", "Status",
];

static INSTANCE_HEADERS: [&str; 8] = [
    "Id", "Role", "Host", "Parent", "Container Id", "Ports", "Data Dir", "Status",
];

fn service_row(row: &StatusRow) -> Vec<String> {
    vec![
        row.id.clone(),
        row.role.clone(),
        row.host.clone(),
        format!("{}/{}", row.up, row.instances),
        row.container_id.clone(),
        row.ports.clone(),
        row.data_dir.clone(),
        ui::status(&row.status),
    ]
}

fn instance_row(row: &StatusRow) -> Vec<String> {
    vec![
        row.id.clone(),
        row.role.clone(),
        row.host.clone(),
        row.parent_id.clone(),
        row.container_id.clone(),
        row.ports.clone(),
        row.data_dir.clone(),
        ui::status(&row.status),
    ]
}

/// `hostname:port` of every mds metrics endpoint, in topology order
fn mds_addresses(topology: &Topology, hosts: &HostDirectory) -> Vec<String> {
    topology
        .by_role(Role::Mds)
        .iter()
        .filter_map(|cfg| {
            let host = hosts.resolve(&cfg.host).ok()?;
            Some(format!("{}:{}", host.hostname, metrics_port(cfg)))
        })
        .collect()
}

fn metrics_port(cfg: &DeployConfig) -> u16 {
    cfg.get(KEY_DUMMY_PORT)
        .and_then(|p| p.parse().ok())
        .unwrap_or_else(|| cfg.listen_port())
}

/// Ask each mds for its status page and return the one reporting leader
fn find_mds_leader(settings: &Settings, addresses: &[String]) -> Option<String> {
    let pool = ConnectionPool::new(HttpConnector);
    let stub = HttpGetStub::new(MDS_STATUS_PATH);
    addresses.iter().find_map(|address| {
        let opts = settings.rpc_options(vec![address.clone()]);
        match failover::call(&opts, &pool, &stub) {
            Ok(response) if is_leader(&response.body) => Some(address.clone()),
            Ok(_) => None,
            Err(e) => {
                log::info!("mds {address}: {e}");
                None
            }
        }
    })
}

fn is_leader(body: &str) -> bool {
    body.lines()
        .filter(|l| l.contains("mds_status"))
        .any(|l| l.contains("leader"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::tests::{HOSTS, TOPOLOGY};
    use std::collections::BTreeMap;

    #[test]
    fn test_is_leader() {
        assert!(is_leader("mds_status : \"leader\"\n"));
        assert!(!is_leader("mds_status : \"follower\"\n"));
        assert!(!is_leader("leader_term : 3\n"));
    }

    #[test]
    fn test_mds_addresses_use_hostnames() {
        let topology = Topology::parse(TOPOLOGY).unwrap();
        let hosts = HostDirectory::parse(HOSTS).unwrap();
        let mds = &topology.by_role(Role::Mds)[0];
        assert_eq!(
            mds_addresses(&topology, &hosts),
            vec![format!("10.0.1.1:{}", mds.listen_port())]
        );
    }

    #[test]
    fn test_merged_row_shows_partial_health() {
        let topology = Topology::parse(TOPOLOGY).unwrap();
        let mut rows = BTreeMap::new();
        for (id, status, up) in [
            ("a", "Up 2 minutes", 1),
            ("b", "Up About a minute", 1),
            ("c", "Exited (1) 10 seconds ago", 0),
        ] {
            let mut row = StatusRow::new(&topology.by_role(Role::Etcd)[0]);
            row.id = id.to_string();
            row.parent_id = "a".to_string();
            row.status = status.to_string();
            row.up = up;
            rows.insert(row.id.clone(), row);
        }
        let merged = merge_by_parent(&rows);
        assert_eq!(service_row(&merged[0])[3], "2/3");

        rows.get_mut("c").unwrap().status = "Up 1 second".to_string();
        rows.get_mut("c").unwrap().up = 1;
        assert_eq!(service_row(&merge_by_parent(&rows)[0])[3], "3/3");
    }
}
