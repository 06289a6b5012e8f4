//! Monitoring containers: prometheus, grafana, node_exporter

use super::{Op, exec, op};
use crate::ssh::{Remote, quote};
use playbook::{ConfigRef, ErrorCode};
use topology::MonitorConfig;

/// `docker run` for a monitor, reusing an existing container when present
pub fn start_command(cfg: &MonitorConfig) -> String {
    let name = cfg.container_name();
    let port = cfg.listen_port;
    let (env, args) = match cfg.role.as_str() {
        "grafana" => (format!("-e GF_SERVER_HTTP_PORT={port} "), String::new()),
        "prometheus" => (
            String::new(),
            format!(" --config.file=/etc/prometheus/prometheus.yml --web.listen-address=:{port}"),
        ),
        _ => (String::new(), format!(" --web.listen-address=:{port}")),
    };
    format!(
        "docker start {name} >/dev/null 2>&1 || docker run -d --name {name} --network host --restart always {env}{}{args}",
        quote(&cfg.image)
    )
}

pub(super) fn start_monitor(entry: ConfigRef<'_>, remote: Remote) -> playbook::Result<Option<Op>> {
    let command = start_command(entry.as_monitor()?);
    Ok(op(move |_| exec(&remote, &command, ErrorCode::RemoteCommandFailed)))
}

pub(super) fn stop_monitor(entry: ConfigRef<'_>, remote: Remote) -> playbook::Result<Option<Op>> {
    let command = format!("docker stop {}", entry.as_monitor()?.container_name());
    Ok(op(move |_| exec(&remote, &command, ErrorCode::RemoteCommandFailed)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use topology::parse_monitors;

    #[test]
    fn test_start_command_per_role() {
        let monitors = parse_monitors(
            r#"
monitors:
  - host: server-host1
    role: grafana
    container_image: grafana/grafana:9.0.0
    listen_port: 3000
  - host: server-host1
    role: node_exporter
    container_image: prom/node-exporter:v1.5.0
    listen_port: 9100
"#,
        )
        .unwrap();

        let grafana = start_command(&monitors[0]);
        assert!(grafana.contains("-e GF_SERVER_HTTP_PORT=3000 grafana/grafana:9.0.0"));
        assert!(grafana.starts_with(&format!("docker start {}", monitors[0].container_name())));

        let exporter = start_command(&monitors[1]);
        assert!(exporter.ends_with("prom/node-exporter:v1.5.0 --web.listen-address=:9100"));
    }
}
