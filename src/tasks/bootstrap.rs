//! One-off cluster bootstrap run inside an mds container

use super::{OPTION_POOL_TOPOLOGY, Op, exec, exec_with_input, op};
use crate::ssh::Remote;
use crate::tasks::service::STAGING_DIR;
use playbook::{ConfigRef, ErrorCode, SharedContext, StepKind};
use serde_json::{Value, json};
use topology::{ClusterKind, DeployConfig, HostDirectory, Role};

const ZONES: usize = 3;
const REPLICAS: usize = 3;
const COPYSETS_PER_SERVER: usize = 100;

/// Pool layout for the storage servers of a topology.
///
/// Each chunkserver (or metaserver) instance becomes one server, spread over
/// three zones by host sequence.
pub fn pool_topology(configs: &[DeployConfig], hosts: &HostDirectory) -> topology::Result<Value> {
    let Some(kind) = configs.first().map(|c| c.kind) else {
        return Ok(json!({ "servers": [] }));
    };
    let storage_role = match kind {
        ClusterKind::CurveBs => Role::Chunkserver,
        ClusterKind::CurveFs => Role::Metaserver,
    };

    let mut servers = Vec::new();
    for cfg in configs.iter().filter(|c| c.role == storage_role) {
        let host = hosts.resolve(&cfg.host)?;
        servers.push(json!({
            "name": cfg.name(),
            "internalip": host.hostname,
            "internalport": cfg.listen_port(),
            "externalip": host.hostname,
            "externalport": cfg.listen_port(),
            "zone": format!("zone{}", cfg.host_sequence % ZONES + 1),
            "physicalpool": "pool1",
        }));
    }

    let copysets = (servers.len() * COPYSETS_PER_SERVER / REPLICAS).max(1);
    let layout = match kind {
        ClusterKind::CurveBs => json!({
            "servers": servers,
            "logicalpools": [{
                "name": "pool1",
                "physicalpool": "pool1",
                "type": 0,
                "replicasnum": REPLICAS,
                "copysetnum": copysets,
                "zonenum": ZONES,
                "scatterwidth": 0,
            }],
        }),
        ClusterKind::CurveFs => json!({
            "servers": servers,
            "pools": [{
                "name": "pool1",
                "replicasnum": REPLICAS,
                "copysetnum": copysets,
                "zonenum": ZONES,
            }],
        }),
    };
    Ok(layout)
}

/// Tool invocation for a bootstrap step; `None` when the kind has no such step
fn tool_command(kind: StepKind, cluster: ClusterKind, cluster_map: &str) -> Option<String> {
    match (cluster, kind) {
        (ClusterKind::CurveBs, StepKind::CreatePhysicalPool) => Some(format!(
            "curvebs-tool -op=create_physicalpool -cluster_map={cluster_map}"
        )),
        (ClusterKind::CurveBs, StepKind::CreateLogicalPool) => Some(format!(
            "curvebs-tool -op=create_logicalpool -cluster_map={cluster_map}"
        )),
        (ClusterKind::CurveFs, StepKind::CreatePhysicalPool) => Some(format!(
            "curvefs-tool create-topology -cluster_map={cluster_map}"
        )),
        (ClusterKind::CurveBs, StepKind::BalanceLeader) => {
            Some("curvebs-tool -op=rapid-leader-schedule".to_string())
        }
        _ => None,
    }
}

pub(super) fn create_pool(
    kind: StepKind,
    entry: ConfigRef<'_>,
    remote: Remote,
    ctx: &SharedContext,
) -> playbook::Result<Option<Op>> {
    let cfg = entry.as_deploy()?;
    let cluster_map = format!("/{}/tools/conf/topology.json", cfg.kind);
    let Some(tool) = tool_command(kind, cfg.kind, &cluster_map) else {
        log::debug!("{kind}: nothing to do for {}", cfg.kind);
        return Ok(None);
    };

    let layout = ctx.get(OPTION_POOL_TOPOLOGY).ok_or_else(|| {
        playbook::Error::construction(kind.name(), format!("missing {OPTION_POOL_TOPOLOGY} option"))
    })?;
    let document = serde_json::to_string_pretty(&layout)
        .map_err(|e| playbook::Error::construction(kind.name(), e))?;

    let container = cfg.container_name();
    let staged = format!("{STAGING_DIR}/topology-{}.json", cfg.id);

    Ok(op(move |tctx| {
        tctx.sub_step("upload topology");
        exec_with_input(
            &remote,
            &format!("mkdir -p {STAGING_DIR} && cat > {staged}"),
            document.as_bytes(),
            ErrorCode::CopyFailed,
        )?;
        exec(
            &remote,
            &format!("docker cp {staged} {container}:{cluster_map} && rm -f {staged}"),
            ErrorCode::CopyFailed,
        )?;

        tctx.sub_step("create pool");
        exec(
            &remote,
            &format!("docker exec {container} {tool}"),
            ErrorCode::RemoteCommandFailed,
        )
    }))
}

pub(super) fn balance_leader(entry: ConfigRef<'_>, remote: Remote) -> playbook::Result<Option<Op>> {
    let cfg = entry.as_deploy()?;
    let Some(tool) = tool_command(StepKind::BalanceLeader, cfg.kind, "") else {
        log::debug!("{}: nothing to do for {}", StepKind::BalanceLeader, cfg.kind);
        return Ok(None);
    };
    let container = cfg.container_name();

    Ok(op(move |_| {
        exec(
            &remote,
            &format!("docker exec {container} {tool}"),
            ErrorCode::RemoteCommandFailed,
        )
    }))
}
