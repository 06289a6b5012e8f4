use super::Context;
use crate::audit::AuditLog;
use crate::ui;
use anyhow::Result;

pub fn run(ctx: &Context, limit: usize) -> Result<()> {
    let log = AuditLog::open(&ctx.settings.audit_path())?;
    let records = log.recent(limit)?;
    if records.is_empty() {
        ui::info("No invocations recorded yet");
        return Ok(());
    }

    let rows: Vec<Vec<String>> = records
        .iter()
        .map(|r| {
            vec![
                r.id.to_string(),
                r.executed_at.clone(),
                r.command.clone(),
                r.error_code.map_or_else(|| "-".to_string(), |c| c.to_string()),
                ui::status(r.status.as_str()),
            ]
        })
        .collect();
    ui::table(&["Id", "Executed At", "Command", "Code", "Status"], &rows);

    if ctx.verbose > 0 {
        println!();
        for r in &records {
            ui::kv(&r.id.to_string(), &r.cwd);
        }
    }
    Ok(())
}
