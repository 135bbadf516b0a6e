// Instance management commands
//
// With the in-memory store these only see instances created by the same
// command; point DATABASE_URL at PostgreSQL to manage instances across runs.

use anyhow::{anyhow, Result};
use orderflow_durable::persistence::{InstanceFilter, InstanceId, InstanceStore, WorkflowInstance, WorkflowStatus};

use super::App;
use crate::output::{print_field, print_table_header, print_table_row};

pub async fn status<S: InstanceStore>(app: &App<S>, instance_id: String, history: bool) -> Result<()> {
    let id = InstanceId::from(instance_id);
    let state = app
        .client
        .status(&id)
        .await?
        .ok_or_else(|| anyhow!("Instance not found: {}", id))?;

    if !app.output.is_text() {
        return app.output.print_value(&state);
    }

    print_instance(&state);
    if history {
        println!();
        print_history(&state);
    }
    Ok(())
}

pub async fn terminate<S: InstanceStore>(app: &App<S>, instance_id: String, reason: Option<String>) -> Result<()> {
    let id = InstanceId::from(instance_id);
    let state = match reason {
        Some(reason) => app.client.terminate_with_reason(&id, &reason).await?,
        None => app.client.terminate(&id).await?,
    }
    .ok_or_else(|| anyhow!("Instance not found: {}", id))?;

    if !app.output.is_text() {
        return app.output.print_value(&state);
    }

    if app.quiet {
        println!("{}", state.status);
    } else {
        print_instance(&state);
    }
    Ok(())
}

pub async fn list<S: InstanceStore>(
    app: &App<S>,
    statuses: &[String],
    workflow_type: Option<String>,
    limit: usize,
) -> Result<()> {
    let mut filter = InstanceFilter::default().with_limit(limit);
    for status in statuses {
        let status: WorkflowStatus = status.parse().map_err(|e: String| anyhow!(e))?;
        filter = filter.with_status(status);
    }
    if let Some(workflow_type) = workflow_type {
        filter = filter.with_workflow_type(workflow_type);
    }

    let records = app.engine().list_instances(&filter).await?;

    if !app.output.is_text() {
        return app.output.print_value(&records);
    }

    if records.is_empty() {
        println!("No instances found");
        return Ok(());
    }

    print_table_header(&[("ID", 36), ("TYPE", 24), ("STATUS", 10), ("CREATED", 20)]);
    for record in &records {
        print_table_row(&[
            (record.instance_id.as_str(), 36),
            (&record.workflow_type, 24),
            (record.status.as_str(), 10),
            (&record.created_at.format("%Y-%m-%d %H:%M:%S").to_string(), 20),
        ]);
    }
    Ok(())
}

pub async fn purge<S: InstanceStore>(app: &App<S>, instance_id: String) -> Result<()> {
    let id = InstanceId::from(instance_id);
    if !app.client.purge(&id).await? {
        return Err(anyhow!("Instance not found: {}", id));
    }

    if app.output.is_text() && !app.quiet {
        println!("Purged instance: {}", id);
    }
    Ok(())
}

fn print_instance(state: &WorkflowInstance) {
    print_field("ID", state.instance_id.as_str());
    print_field("Type", &state.workflow_type);
    print_field("Status", state.status.as_str());
    print_field("Input", &state.input.to_string());
    if let Some(output) = &state.output {
        print_field("Output", &output.to_string());
    }
    if let Some(error) = &state.error {
        match &error.code {
            Some(code) => print_field("Error", &format!("{} ({})", error.message, code)),
            None => print_field("Error", &error.message),
        }
    }
    print_field("Events", &state.history.len().to_string());
    print_field("Created", &state.created_at.to_rfc3339());
    print_field("Updated", &state.updated_at.to_rfc3339());
}

fn print_history(state: &WorkflowInstance) {
    print_table_header(&[("SEQ", 5), ("EVENT", 22), ("ACTIVITY", 20), ("RECORDED", 20)]);
    for record in &state.history {
        print_table_row(&[
            (&record.sequence.to_string(), 5),
            (record.event.kind(), 22),
            (record.event.activity_id().unwrap_or("-"), 20),
            (&record.recorded_at.format("%H:%M:%S%.3f").to_string(), 20),
        ]);
    }
}
