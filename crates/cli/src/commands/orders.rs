// Order commands

use std::time::Duration;

use anyhow::{bail, Context, Result};
use orderflow_durable::persistence::{InstanceFilter, InstanceId, InstanceStore, WorkflowInstance, WorkflowStatus};
use orderflow_durable::workflow::Workflow;
use orderflow_orders::{InventoryItem, OrderPayload, OrderProcessingWorkflow, OrderResult};
use serde::Serialize;
use tracing::warn;

use super::App;
use crate::output::{print_field, print_table_header, print_table_row};

/// Where an order stands once the CLI stops waiting
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OrderOutcome {
    instance_id: InstanceId,
    status: WorkflowStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<OrderResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl OrderOutcome {
    fn from_state(state: &WorkflowInstance) -> Self {
        Self {
            instance_id: state.instance_id.clone(),
            status: state.status,
            result: state.output_as::<OrderResult>().and_then(Result::ok),
            error: state.error.as_ref().map(|e| e.message.clone()),
        }
    }
}

#[derive(Debug, Serialize)]
struct OrderReport {
    orders: Vec<OrderOutcome>,
    inventory: Vec<InventoryItem>,
}

pub async fn place<S: InstanceStore>(
    app: &App<S>,
    name: &str,
    quantity: u32,
    count: usize,
    id: Option<String>,
    timeout: u64,
) -> Result<()> {
    if id.is_some() && count > 1 {
        bail!("--id can only be used with a single order");
    }

    let payload = OrderPayload::new(name, quantity);
    let mut ids = Vec::with_capacity(count);
    match id {
        Some(id) => ids.push(
            app.client
                .schedule_with_id(OrderProcessingWorkflow::TYPE, id, &payload)
                .await?,
        ),
        None => {
            for _ in 0..count.max(1) {
                ids.push(app.client.schedule(OrderProcessingWorkflow::TYPE, &payload).await?);
            }
        }
    }

    if app.output.is_text() && !app.quiet {
        for id in &ids {
            println!("Scheduled order {id}");
        }
    }

    wait_and_report(app, &ids, Duration::from_secs(timeout)).await
}

pub async fn resume<S: InstanceStore>(app: &App<S>, timeout: u64) -> Result<()> {
    let open = app
        .engine()
        .list_instances(&InstanceFilter::non_terminal())
        .await?;
    let resumed = app.engine().resume_incomplete().await?;

    if app.output.is_text() && !app.quiet {
        println!("Resumed {resumed} instance(s)");
    }

    let ids: Vec<InstanceId> = open.into_iter().map(|r| r.instance_id).collect();
    if ids.is_empty() {
        if app.output.is_text() {
            println!("No unfinished instances");
        }
        return Ok(());
    }

    wait_and_report(app, &ids, Duration::from_secs(timeout)).await
}

async fn wait_and_report<S: InstanceStore>(app: &App<S>, ids: &[InstanceId], timeout: Duration) -> Result<()> {
    let waiting = async {
        let mut outcomes = Vec::with_capacity(ids.len());
        for id in ids {
            outcomes.push(wait_for_order(app, id, timeout).await?);
        }
        Ok::<_, anyhow::Error>(outcomes)
    };

    let outcomes = tokio::select! {
        outcomes = waiting => outcomes?,
        _ = tokio::signal::ctrl_c() => {
            warn!("interrupted; orders keep their recorded progress");
            return Ok(());
        }
    };

    let report = OrderReport {
        orders: outcomes,
        inventory: app.services.inventory.all_items(),
    };

    if !app.output.is_text() {
        return app.output.print_value(&report);
    }

    print_table_header(&[("ID", 36), ("STATUS", 10), ("PROCESSED", 9), ("MESSAGE", 45)]);
    for outcome in &report.orders {
        let processed = match &outcome.result {
            Some(result) if result.processed => "yes",
            Some(_) => "no",
            None => "-",
        };
        let message = outcome
            .result
            .as_ref()
            .map(|r| r.message.as_str())
            .or(outcome.error.as_deref())
            .unwrap_or("-");
        print_table_row(&[
            (outcome.instance_id.as_str(), 36),
            (outcome.status.as_str(), 10),
            (processed, 9),
            (message, 45),
        ]);
    }

    if !app.quiet {
        println!();
        for item in &report.inventory {
            print_field(&item.name, &format!("{} in stock", item.quantity));
        }
    }

    Ok(())
}

/// Wait for start then completion; on timeout report the current state
async fn wait_for_order<S: InstanceStore>(
    app: &App<S>,
    id: &InstanceId,
    timeout: Duration,
) -> Result<OrderOutcome> {
    let waited = match app.client.wait_for_start(id, timeout).await {
        Ok(_) => app.client.wait_for_completion(id, timeout).await,
        Err(e) => Err(e),
    };

    let state = match waited {
        Ok(state) => state,
        Err(e) if e.is_timeout() => {
            warn!(instance_id = %id, "order still running after {timeout:?}");
            app.client
                .status(id)
                .await?
                .with_context(|| format!("Order {id} disappeared while waiting"))?
        }
        Err(e) => return Err(e.into()),
    };

    Ok(OrderOutcome::from_state(&state))
}
