//! Procedures the coordinator serves to its workers.

use crate::api::CoordinatorPing;
use chrono::Utc;
use tipc_core::{CallContext, ProcedureRouter, RouterError};
use tipc_types::Value;
use tracing::info;

/// Value of `CoordinatorPing::on`.
pub const COORDINATOR_NAME: &str = "coordinator";

/// `ping` and `woah.nested.yee`.
#[must_use]
pub fn router() -> ProcedureRouter {
    ProcedureRouter::new()
        .query("ping", |ctx: CallContext, _| async move {
            info!(call_id = %ctx.id, context = ?ctx.context, "coordinator.ping");
            Ok::<_, RouterError>(CoordinatorPing {
                date: Utc::now(),
                on: COORDINATOR_NAME.to_string(),
            })
        })
        .merge(
            "woah",
            ProcedureRouter::new().merge(
                "nested",
                ProcedureRouter::new()
                    .query("yee", |_, _| async { Ok::<_, RouterError>(Value::empty_object()) }),
            ),
        )
}
