use super::Context;
use crate::cli::ExecArgs;
use crate::tasks::{self, ClusterTaskBuilder};
use crate::ui;
use anyhow::{Context as _, Result, bail};
use playbook::{AggregateError, ErrorCode, NoProgress, SharedContext, Task, stream_tasks};
use topology::{ConfigRecord, FilterOptions, GenericConfig, filter_configs};

pub fn run(ctx: &Context, args: &ExecArgs) -> Result<()> {
    let hosts = ctx.load_hosts()?;
    let targets = filter_configs(
        &hosts.as_generic_configs(),
        &FilterOptions::default().host(&args.host),
    );
    if targets.is_empty() {
        bail!("No host matches '{}'", args.host);
    }

    let command = args.command.join(" ");
    let builder = ctx.task_builder(hosts);
    let tasks = build(&builder, &targets, &command)?;
    log::info!("running `{command}` on {} host(s)", tasks.len());

    let mut failures = Vec::new();
    stream_tasks(&tasks, SharedContext::global(), &NoProgress, |result| {
        ui::section(&result.host);
        match result.error() {
            None => {
                for line in result.output().lines() {
                    println!("  {line}");
                }
            }
            Some(err) => {
                for line in err.output.lines() {
                    println!("  {line}");
                }
                ui::error(&err.message);
                failures.push(err.clone());
            }
        }
    });

    if !failures.is_empty() {
        return Err(playbook::Error::from(AggregateError::new(failures)))
            .context("Command failed on some hosts");
    }
    Ok(())
}

/// One task per host, in host directory order
fn build(builder: &ClusterTaskBuilder, targets: &[GenericConfig], command: &str) -> Result<Vec<Task>> {
    targets
        .iter()
        .map(|target| -> Result<Task> {
            let remote = builder.remote(target.host())?;
            let command = command.to_string();
            Ok(Task::new("Exec", target.host(), move |_: &playbook::TaskContext<'_>| {
                tasks::exec(&remote, &command, ErrorCode::RemoteCommandFailed)
            }))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::tests::builder;

    #[test]
    fn test_runs_on_local_host() {
        let targets = vec![GenericConfig::new("local", "host")];
        let tasks = build(&builder(), &targets, "echo $((6 * 7))").unwrap();

        let mut outputs = Vec::new();
        stream_tasks(&tasks, &SharedContext::new(), &NoProgress, |r| {
            outputs.push(r.output().to_string());
        });
        assert_eq!(outputs, vec!["42"]);
    }

    #[test]
    fn test_unknown_host() {
        let targets = vec![GenericConfig::new("nowhere", "host")];
        assert!(build(&builder(), &targets, "true").is_err());
    }
}
